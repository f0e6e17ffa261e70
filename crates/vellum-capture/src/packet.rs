use crate::PacketError;
use vellum_types::{
    BodyOffset, HEADER_SIZE, PacketHeader, PacketTag, TracerId, round_up_4,
};

/// Metadata stamped into a packet header at allocation time.
#[derive(Debug, Clone, Copy)]
pub struct PacketStamp {
    pub index: u64,
    pub tracer: TracerId,
    pub thread_id: u64,
    pub tag: PacketTag,
    pub begin_time: u64,
}

/// A trace packet: fixed header, inline payload, then trailing buffers appended through a
/// bump cursor.
///
/// Backing storage is a word vector so the header is always 8-aligned; only the first
/// `size` bytes are ever exposed. Every handle into the trailing region is a [`BodyOffset`],
/// so nothing has to be relocated before the bytes go on the wire.
pub struct Packet {
    words: Vec<u64>,
}

impl Packet {
    pub fn allocate(
        stamp: &PacketStamp,
        inline_size: u64,
        extra_capacity: u64,
    ) -> Result<Self, PacketError> {
        // Offset 0 is the null sentinel, so a trailing buffer must never start at the body
        // start. Without an inline payload, one padding word keeps the first buffer off zero.
        let lead = if inline_size == 0 && extra_capacity > 0 {
            4
        } else {
            0
        };
        let unpadded = (HEADER_SIZE as u64)
            .checked_add(inline_size)
            .and_then(|v| v.checked_add(lead))
            .and_then(|v| v.checked_add(extra_capacity))
            .filter(|v| *v <= u64::MAX - 3)
            .ok_or(PacketError::SizeOverflow)?;
        let total = round_up_4(unpadded);

        let mut packet = Self::zeroed(total)?;
        let body = packet.body_address();
        let header = packet.header_mut();
        header.size = total;
        header.global_packet_index = stamp.index;
        header.tracer_id = stamp.tracer.get();
        header.thread_id = stamp.thread_id;
        header.packet_tag = stamp.tag.get();
        header.capture_begin_time = stamp.begin_time;
        header.call_begin_time = stamp.begin_time;
        header.call_end_time = 0;
        header.capture_end_time = 0;
        header.next_buffers_offset = HEADER_SIZE as u64 + inline_size + lead;
        header.body = body;
        Ok(packet)
    }

    pub(crate) fn zeroed(total: u64) -> Result<Self, PacketError> {
        let len = usize::try_from(total).map_err(|_| PacketError::SizeOverflow)?;
        let word_count = len.div_ceil(8);
        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|err| {
                tracing::error!(bytes = total, %err, "packet allocation failed");
                PacketError::AllocationFailed { bytes: total }
            })?;
        words.resize(word_count, 0);
        Ok(Self { words })
    }

    pub fn header(&self) -> &PacketHeader {
        bytemuck::from_bytes(&bytemuck::cast_slice::<u64, u8>(&self.words)[..HEADER_SIZE])
    }

    pub(crate) fn header_mut(&mut self) -> &mut PacketHeader {
        bytemuck::from_bytes_mut(
            &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..HEADER_SIZE],
        )
    }

    pub fn size(&self) -> u64 {
        self.header().size
    }

    pub fn index(&self) -> u64 {
        self.header().global_packet_index
    }

    pub fn tag(&self) -> PacketTag {
        self.header().tag()
    }

    pub fn tracer(&self) -> TracerId {
        self.header().tracer()
    }

    pub fn next_buffers_offset(&self) -> u64 {
        self.header().next_buffers_offset
    }

    /// Bytes still available for trailing buffers.
    pub fn remaining_capacity(&self) -> u64 {
        self.size() - self.next_buffers_offset()
    }

    /// The whole packet exactly as it goes on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        let size = self.header().size as usize;
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..size]
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        let size = self.header().size as usize;
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..size]
    }

    /// Everything after the header: inline payload followed by the trailing region.
    pub fn body(&self) -> &[u8] {
        &self.as_bytes()[HEADER_SIZE..]
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.as_bytes_mut()[HEADER_SIZE..]
    }

    /// Address of the first body byte in this process.
    pub fn body_start(&self) -> *const u8 {
        self.as_bytes()[HEADER_SIZE..].as_ptr()
    }

    fn body_address(&self) -> u64 {
        self.body_start() as usize as u64
    }

    pub(crate) fn restore_body_address(&mut self) {
        let body = self.body_address();
        self.header_mut().body = body;
    }

    /// Copies `bytes` into the inline payload at `at` (relative to body start).
    pub fn write_inline(&mut self, at: usize, bytes: &[u8]) -> Result<(), PacketError> {
        let limit = self.next_buffers_offset() as usize - HEADER_SIZE;
        let end = at
            .checked_add(bytes.len())
            .filter(|end| *end <= limit)
            .ok_or(PacketError::OutOfBounds {
                offset: at as u64,
                len: bytes.len() as u64,
            })?;
        self.body_mut()[at..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Appends `source` to the trailing region and returns its body offset.
    ///
    /// The reservation is rounded up to a multiple of 4 and zero-padded. An empty source
    /// yields [`BodyOffset::NULL`] and leaves the cursor alone. Running past the capacity
    /// computed at allocation is a caller bug: it asserts in debug builds and is reported as
    /// [`PacketError::CapacityExceeded`] otherwise.
    pub fn append_trailing(&mut self, source: &[u8]) -> Result<BodyOffset, PacketError> {
        if source.is_empty() {
            return Ok(BodyOffset::NULL);
        }

        let reserved = round_up_4(source.len() as u64);
        let cursor = self.next_buffers_offset();
        let size = self.size();
        let fits = cursor
            .checked_add(reserved)
            .is_some_and(|end| end <= size);
        debug_assert!(
            fits,
            "trailing append exceeds packet capacity: cursor={cursor} reserved={reserved} size={size}"
        );
        if !fits {
            return Err(PacketError::CapacityExceeded {
                requested: reserved,
                cursor,
                size,
            });
        }

        let start = cursor as usize;
        let bytes = self.as_bytes_mut();
        bytes[start..start + source.len()].copy_from_slice(source);
        bytes[start + source.len()..start + reserved as usize].fill(0);
        self.header_mut().next_buffers_offset = cursor + reserved;

        Ok(BodyOffset::from_raw(cursor - HEADER_SIZE as u64))
    }

    /// Converts an address inside this packet's trailing region back into a body offset.
    pub fn offset_of(&self, ptr: *const u8) -> Option<BodyOffset> {
        let body = self.body_start() as usize;
        let addr = ptr as usize;
        let offset = addr.checked_sub(body)? as u64;
        let body_len = self.size() - HEADER_SIZE as u64;
        if offset == 0 || offset >= body_len {
            return None;
        }
        Some(BodyOffset::from_raw(offset))
    }

    /// Maps a body offset to an address in this process; the null offset maps to `None`.
    pub fn resolve(&self, offset: BodyOffset) -> Option<*const u8> {
        if offset.is_null() || offset.get() >= self.size() - HEADER_SIZE as u64 {
            return None;
        }
        Some(self.body()[offset.get() as usize..].as_ptr())
    }

    /// Bounds-checked view of `len` bytes at `offset`.
    pub fn slice(&self, offset: BodyOffset, len: u64) -> Option<&[u8]> {
        if offset.is_null() {
            return None;
        }
        let start = usize::try_from(offset.get()).ok()?;
        let len = usize::try_from(len).ok()?;
        let end = start.checked_add(len)?;
        self.body().get(start..end)
    }

    /// Reads a pointer-sized slot at `slot` (relative to body start) as an offset.
    pub fn read_offset_at(&self, slot: usize) -> Option<BodyOffset> {
        let raw = self.body().get(slot..slot.checked_add(8)?)?;
        Some(BodyOffset::from_raw(bytemuck::pod_read_unaligned::<u64>(raw)))
    }

    /// Stores `value` into the pointer-sized slot at `slot` (relative to body start).
    pub fn write_offset_at(&mut self, slot: usize, value: BodyOffset) -> Result<(), PacketError> {
        let out_of_bounds = PacketError::OutOfBounds {
            offset: slot as u64,
            len: 8,
        };
        let end = slot.checked_add(8).ok_or(out_of_bounds.clone())?;
        let dst = self.body_mut().get_mut(slot..end).ok_or(out_of_bounds)?;
        dst.copy_from_slice(&value.get().to_ne_bytes());
        Ok(())
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("header", self.header())
            .finish_non_exhaustive()
    }
}

/// A packet whose bytes are being filled from a stream (read path, `Received` state).
///
/// Only the size prefix is known; [`ReceivedPacket::restore_body`] validates the rest of the
/// header and recomputes the body address, producing a usable [`Packet`].
pub struct ReceivedPacket {
    packet: Packet,
}

impl ReceivedPacket {
    pub fn new(size: u64, max_size: u64) -> Result<Self, PacketError> {
        let mut probe = PacketHeader {
            size,
            next_buffers_offset: HEADER_SIZE as u64,
            ..bytemuck::Zeroable::zeroed()
        };
        probe.validate(max_size).map_err(PacketError::Invariant)?;
        probe.next_buffers_offset = 0;

        let mut packet = Packet::zeroed(size)?;
        *packet.header_mut() = probe;
        Ok(Self { packet })
    }

    pub fn size(&self) -> u64 {
        self.packet.header().size
    }

    /// The bytes following the 8-byte size prefix.
    pub fn remainder_mut(&mut self) -> &mut [u8] {
        &mut self.packet.as_bytes_mut()[8..]
    }

    pub fn restore_body(mut self, max_size: u64) -> Result<Packet, PacketError> {
        self.packet
            .header()
            .validate(max_size)
            .map_err(PacketError::Invariant)?;
        self.packet.restore_body_address();
        Ok(self.packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(tag: u16) -> PacketStamp {
        PacketStamp {
            index: 3,
            tracer: TracerId::new(2),
            thread_id: 77,
            tag: PacketTag::new(tag),
            begin_time: 1_000,
        }
    }

    fn assert_size_invariants(packet: &Packet) {
        assert_eq!(packet.size() % 4, 0);
        assert!(packet.next_buffers_offset() <= packet.size());
        assert_eq!(packet.as_bytes().len() as u64, packet.size());
    }

    #[test]
    fn allocate_rounds_and_stamps_header() {
        let packet = Packet::allocate(&stamp(9), 10, 5).expect("allocation should succeed");
        assert_eq!(packet.size(), round_up_4(HEADER_SIZE as u64 + 15));
        assert_eq!(packet.next_buffers_offset(), HEADER_SIZE as u64 + 10);
        let header = packet.header();
        assert_eq!(header.global_packet_index, 3);
        assert_eq!(header.tracer_id, 2);
        assert_eq!(header.thread_id, 77);
        assert_eq!(header.packet_tag, 9);
        assert_eq!(header.capture_begin_time, 1_000);
        assert_eq!(header.call_begin_time, 1_000);
        assert_eq!(header.call_end_time, 0);
        assert_eq!(header.capture_end_time, 0);
        assert_eq!(header.body, packet.body_start() as usize as u64);
        assert!(packet.body().iter().all(|b| *b == 0));
        assert_size_invariants(&packet);
    }

    #[test]
    fn append_copies_pads_and_advances() {
        let mut packet = Packet::allocate(&stamp(1), 8, 16).expect("allocation should succeed");
        let first = packet.append_trailing(&[1, 2, 3, 4, 5]).expect("first append fits");
        assert_eq!(first.get(), 8);
        assert_eq!(packet.next_buffers_offset(), HEADER_SIZE as u64 + 16);
        assert_eq!(packet.slice(first, 8).expect("in bounds"), &[1, 2, 3, 4, 5, 0, 0, 0]);
        assert_size_invariants(&packet);

        let second = packet.append_trailing(&[9; 8]).expect("second append fits");
        assert_eq!(second.get(), 16);
        assert_eq!(packet.remaining_capacity(), 0);
        assert_size_invariants(&packet);
    }

    #[test]
    fn empty_append_is_null_and_does_not_advance() {
        let mut packet = Packet::allocate(&stamp(1), 4, 8).expect("allocation should succeed");
        let before = packet.next_buffers_offset();
        let offset = packet.append_trailing(&[]).expect("empty append never fails");
        assert!(offset.is_null());
        assert_eq!(packet.next_buffers_offset(), before);
        assert_eq!(packet.resolve(offset), None);
    }

    #[test]
    fn trailing_buffer_never_lands_on_null_offset() {
        let mut packet = Packet::allocate(&stamp(1), 0, 4).expect("allocation should succeed");
        let offset = packet.append_trailing(&[7, 7, 7, 7]).expect("append fits");
        assert!(!offset.is_null());
        assert_size_invariants(&packet);
    }

    #[test]
    #[cfg_attr(
        debug_assertions,
        should_panic(expected = "trailing append exceeds packet capacity")
    )]
    fn append_past_capacity_is_a_contract_violation() {
        let mut packet = Packet::allocate(&stamp(1), 4, 4).expect("allocation should succeed");
        let err = packet
            .append_trailing(&[0; 12])
            .expect_err("append past capacity must fail");
        assert!(matches!(err, PacketError::CapacityExceeded { .. }));
    }

    #[test]
    fn offsets_resolve_to_appended_bytes() {
        let mut packet = Packet::allocate(&stamp(1), 4, 8).expect("allocation should succeed");
        let offset = packet.append_trailing(&[1, 2, 3, 4, 5, 6, 7, 8]).expect("append fits");
        let ptr = packet.resolve(offset).expect("non-null offset resolves");
        assert_eq!(packet.offset_of(ptr), Some(offset));
        let view = unsafe { std::slice::from_raw_parts(ptr, 8) };
        assert_eq!(view, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(packet.offset_of(std::ptr::null()), None);
    }

    #[test]
    fn offset_slots_roundtrip() {
        let mut packet = Packet::allocate(&stamp(1), 16, 0).expect("allocation should succeed");
        packet
            .write_offset_at(8, BodyOffset::from_raw(0x40))
            .expect("slot inside inline payload");
        assert_eq!(packet.read_offset_at(8), Some(BodyOffset::from_raw(0x40)));
        assert!(packet.write_offset_at(12, BodyOffset::NULL).is_err());
    }

    #[test]
    fn write_inline_stays_inside_payload() {
        let mut packet = Packet::allocate(&stamp(1), 12, 8).expect("allocation should succeed");
        packet.write_inline(0, &[0xAA; 12]).expect("payload fits");
        assert_eq!(&packet.body()[..12], &[0xAA; 12]);
        assert!(packet.write_inline(8, &[0; 8]).is_err());
    }

    #[test]
    fn received_packet_restores_body_address() {
        let original = Packet::allocate(&stamp(4), 8, 0).expect("allocation should succeed");
        let bytes = original.as_bytes().to_vec();

        let mut received =
            ReceivedPacket::new(original.size(), 1 << 20).expect("size prefix is valid");
        received.remainder_mut().copy_from_slice(&bytes[8..]);
        let restored = received.restore_body(1 << 20).expect("header is valid");

        assert_eq!(restored.body(), original.body());
        assert_eq!(restored.header().body, restored.body_start() as usize as u64);
        assert_eq!(restored.tag(), PacketTag::new(4));
    }

    #[test]
    fn received_packet_rejects_bad_sizes() {
        assert!(ReceivedPacket::new(6, 1 << 20).is_err());
        assert!(ReceivedPacket::new(HEADER_SIZE as u64 + 2, 1 << 20).is_err());
        assert!(ReceivedPacket::new(1 << 21, 1 << 20).is_err());
    }
}
