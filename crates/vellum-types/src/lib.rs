use bytemuck::{Pod, Zeroable};
use facet::Facet;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    ZeroOffset(&'static str),
    Misaligned { field: &'static str, value: u64 },
    OutOfRange { field: &'static str, value: u64, max: u64 },
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroOffset(field) => write!(f, "{field} must be non-zero"),
            Self::Misaligned { field, value } => {
                write!(f, "{field} must be a multiple of 4, got {value}")
            }
            Self::OutOfRange { field, value, max } => {
                write!(f, "{field} out of range: {value} > {max}")
            }
        }
    }
}

impl Error for InvariantError {}

/// Rounds `value` up to the next multiple of 4.
pub const fn round_up_4(value: u64) -> u64 {
    (value + 3) & !3
}

/// Identifies which capture library produced a packet.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct TracerId(u8);

impl TracerId {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Short integer identifying the API call (or marker) a packet represents.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct PacketTag(u16);

impl PacketTag {
    pub const MESSAGE: Self = Self(0);
    pub const MARKER_CHECKPOINT: Self = Self(1);
    pub const MARKER_API_BOUNDARY: Self = Self(2);
    pub const MARKER_API_GROUP_BEGIN: Self = Self(3);
    pub const MARKER_API_GROUP_END: Self = Self(4);
    /// Stream-terminating sentinel. Write failures on this tag are not fatal.
    pub const MARKER_TERMINATE_PROCESS: Self = Self(5);
    pub const PORTABILITY_TABLE: Self = Self(6);
    pub const BEGIN_API_HERE: Self = Self(7);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn is_terminate(self) -> bool {
        self == Self::MARKER_TERMINATE_PROCESS
    }

    pub fn marker_name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("message"),
            1 => Some("checkpoint"),
            2 => Some("api_boundary"),
            3 => Some("api_group_begin"),
            4 => Some("api_group_end"),
            5 => Some("terminate_process"),
            6 => Some("portability_table"),
            7 => Some("begin_api_here"),
            _ => None,
        }
    }
}

impl fmt::Display for PacketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte offset relative to a packet's body start. Zero encodes a null pointer.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[facet(transparent)]
pub struct BodyOffset(u64);

impl BodyOffset {
    pub const NULL: Self = Self(0);

    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn new(value: u64) -> Result<Self, InvariantError> {
        if value == 0 {
            return Err(InvariantError::ZeroOffset("body_offset"));
        }
        Ok(Self(value))
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Fixed packet header, laid out exactly as it appears on the wire (native endianness).
///
/// `body` is scratch space: writers store their local body address, readers overwrite it with
/// their own after loading, and nothing may interpret it across a reload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PacketHeader {
    pub size: u64,
    pub global_packet_index: u64,
    pub tracer_id: u8,
    pub _pad0: [u8; 7],
    pub thread_id: u64,
    pub packet_tag: u16,
    pub _pad1: [u8; 6],
    pub capture_begin_time: u64,
    pub call_begin_time: u64,
    pub call_end_time: u64,
    pub capture_end_time: u64,
    pub next_buffers_offset: u64,
    pub body: u64,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<PacketHeader>();

const _: () = assert!(HEADER_SIZE == 88);
const _: () = assert!(HEADER_SIZE % 4 == 0);

impl PacketHeader {
    pub fn tracer(&self) -> TracerId {
        TracerId(self.tracer_id)
    }

    pub fn tag(&self) -> PacketTag {
        PacketTag(self.packet_tag)
    }

    /// Checks the invariants a loaded header must satisfy before any offset is trusted.
    pub fn validate(&self, max_size: u64) -> Result<(), InvariantError> {
        if self.size < HEADER_SIZE as u64 {
            return Err(InvariantError::OutOfRange {
                field: "header_size",
                value: HEADER_SIZE as u64,
                max: self.size,
            });
        }
        if self.size % 4 != 0 {
            return Err(InvariantError::Misaligned {
                field: "size",
                value: self.size,
            });
        }
        if self.size > max_size {
            return Err(InvariantError::OutOfRange {
                field: "size",
                value: self.size,
                max: max_size,
            });
        }
        if self.next_buffers_offset < HEADER_SIZE as u64 || self.next_buffers_offset > self.size {
            return Err(InvariantError::OutOfRange {
                field: "next_buffers_offset",
                value: self.next_buffers_offset,
                max: self.size,
            });
        }
        Ok(())
    }

    pub fn summary(&self) -> PacketSummary {
        PacketSummary {
            index: self.global_packet_index,
            tag: self.packet_tag,
            marker: self.tag().marker_name().map(str::to_owned),
            tracer_id: self.tracer_id,
            thread_id: self.thread_id,
            size: self.size,
            call_duration_ns: self.call_end_time.saturating_sub(self.call_begin_time),
            capture_duration_ns: self.capture_end_time.saturating_sub(self.capture_begin_time),
        }
    }
}

/// Human-readable projection of a packet header.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct PacketSummary {
    pub index: u64,
    pub tag: u16,
    #[facet(skip_unless_truthy)]
    pub marker: Option<String>,
    pub tracer_id: u8,
    pub thread_id: u64,
    pub size: u64,
    pub call_duration_ns: u64,
    pub capture_duration_ns: u64,
}

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }

    pub fn to_raw(self) -> u64 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }
}

/// Packs up to 8 bytes of `name` into a `u64` in memory order, zero-filling the rest.
pub fn pack_name(name: &str) -> u64 {
    let mut raw = [0u8; 8];
    let bytes = name.as_bytes();
    let len = bytes.len().min(8);
    raw[..len].copy_from_slice(&bytes[..len]);
    u64::from_ne_bytes(raw)
}

/// Inverse of [`pack_name`], stopping at the first NUL.
pub fn unpack_name(raw: u64) -> String {
    let bytes = raw.to_ne_bytes();
    let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(size: u64, cursor: u64) -> PacketHeader {
        PacketHeader {
            size,
            next_buffers_offset: cursor,
            ..PacketHeader::zeroed()
        }
    }

    #[test]
    fn round_up_4_pads_to_word_boundary() {
        assert_eq!(round_up_4(0), 0);
        assert_eq!(round_up_4(1), 4);
        assert_eq!(round_up_4(4), 4);
        assert_eq!(round_up_4(101), 104);
    }

    #[test]
    fn header_field_offsets_are_fixed() {
        assert_eq!(std::mem::offset_of!(PacketHeader, tracer_id), 16);
        assert_eq!(std::mem::offset_of!(PacketHeader, thread_id), 24);
        assert_eq!(std::mem::offset_of!(PacketHeader, packet_tag), 32);
        assert_eq!(std::mem::offset_of!(PacketHeader, next_buffers_offset), 72);
        assert_eq!(std::mem::offset_of!(PacketHeader, body), 80);
    }

    #[test]
    fn validate_rejects_malformed_headers() {
        let max = 1 << 20;
        header(HEADER_SIZE as u64 + 8, HEADER_SIZE as u64)
            .validate(max)
            .expect("well-formed header should validate");
        assert!(header(8, 8).validate(max).is_err());
        assert!(header(HEADER_SIZE as u64 + 2, HEADER_SIZE as u64).validate(max).is_err());
        assert!(header(HEADER_SIZE as u64 + 8, HEADER_SIZE as u64 + 12).validate(max).is_err());
        assert!(header(HEADER_SIZE as u64 + 8, 4).validate(max).is_err());
        assert!(header(max + 4, HEADER_SIZE as u64).validate(max).is_err());
    }

    #[test]
    fn terminate_tag_is_only_sentinel() {
        assert!(PacketTag::MARKER_TERMINATE_PROCESS.is_terminate());
        assert!(!PacketTag::new(7).is_terminate());
        assert_eq!(PacketTag::new(300).marker_name(), None);
    }

    #[test]
    fn body_offset_zero_is_null() {
        assert!(BodyOffset::NULL.is_null());
        assert!(BodyOffset::new(0).is_err());
        assert_eq!(BodyOffset::new(12).expect("non-zero offset").get(), 12);
    }

    #[test]
    fn packed_names_roundtrip_truncated() {
        assert_eq!(unpack_name(pack_name("Linux")), "Linux");
        assert_eq!(unpack_name(pack_name("aarch64-extra")), "aarch64-");
    }
}
