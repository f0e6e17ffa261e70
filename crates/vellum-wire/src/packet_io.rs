use crate::stream::{ByteSink, ByteSource};
use crate::{DEFAULT_MAX_PACKET_BYTES, ReadError, WriteError, WriteOutcome};
use vellum_capture::{FinalizedPacket, Packet, ReceivedPacket};

const SIZE_PREFIX: usize = 8;

/// Writes the packet's `size` bytes to `sink` in one call.
///
/// A failed write is [`WriteError::Fatal`], except for the terminate-process marker: the
/// process is going away anyway, so that failure is logged and reported as
/// [`WriteOutcome::Dropped`].
pub fn write_packet<S: ByteSink + ?Sized>(
    packet: &FinalizedPacket,
    sink: &mut S,
) -> Result<WriteOutcome, WriteError> {
    let header = packet.header();
    match sink.write_raw(packet.as_bytes()) {
        Ok(()) => Ok(WriteOutcome::Written),
        Err(err) if header.tag().is_terminate() => {
            tracing::debug!(%err, index = header.global_packet_index, "dropping unwritable terminate marker");
            Ok(WriteOutcome::Dropped)
        }
        Err(source) => Err(WriteError::Fatal {
            index: header.global_packet_index,
            tag: header.tag(),
            source,
        }),
    }
}

/// Reads the next packet from `source`.
///
/// Returns `Ok(None)` when the stream ends cleanly before a size prefix. The size prefix and
/// the header are validated against `max_packet_bytes` before the packet is trusted.
pub fn read_packet<S: ByteSource + ?Sized>(
    source: &mut S,
    max_packet_bytes: u64,
) -> Result<Option<Packet>, ReadError> {
    let mut prefix = [0u8; SIZE_PREFIX];
    let got = source.read_raw(&mut prefix)?;
    if got == 0 {
        return Ok(None);
    }
    if got < SIZE_PREFIX {
        tracing::error!(got, "trace ends inside a packet size prefix");
        return Err(ReadError::Truncated {
            expected: SIZE_PREFIX as u64,
            actual: got as u64,
        });
    }

    let size = u64::from_ne_bytes(prefix);
    let mut received = ReceivedPacket::new(size, max_packet_bytes).inspect_err(|err| {
        tracing::error!(%err, size, "rejecting packet with malformed size prefix");
    })?;

    let rest = received.remainder_mut();
    let expected = rest.len();
    let got = source.read_raw(rest)?;
    if got < expected {
        tracing::error!(size, got = SIZE_PREFIX + got, "trace ends inside a packet");
        return Err(ReadError::Truncated {
            expected: size,
            actual: (SIZE_PREFIX + got) as u64,
        });
    }

    let packet = received.restore_body(max_packet_bytes).inspect_err(|err| {
        tracing::error!(%err, size, "rejecting packet with malformed header");
    })?;
    Ok(Some(packet))
}

pub fn read_packet_default<S: ByteSource + ?Sized>(
    source: &mut S,
) -> Result<Option<Packet>, ReadError> {
    read_packet(source, DEFAULT_MAX_PACKET_BYTES)
}
