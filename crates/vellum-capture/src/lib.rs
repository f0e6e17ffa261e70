//! Packet capture: the per-packet arena, the global index sequencer, platform probes, and the
//! create/finalize half of the packet lifecycle.

use std::error::Error;
use std::fmt;
use vellum_types::InvariantError;

pub mod lifecycle;
pub mod packet;
pub mod probes;
pub mod sequencer;

pub use lifecycle::{CaptureContext, Clock, FinalizedPacket, MonotonicClock};
pub use packet::{Packet, PacketStamp, ReceivedPacket};
pub use sequencer::{PacketSequencer, next_index};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    AllocationFailed {
        bytes: u64,
    },
    SizeOverflow,
    CapacityExceeded {
        requested: u64,
        cursor: u64,
        size: u64,
    },
    OutOfBounds {
        offset: u64,
        len: u64,
    },
    Invariant(InvariantError),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { bytes } => {
                write!(f, "failed to allocate {bytes} bytes for trace packet")
            }
            Self::SizeOverflow => write!(f, "trace packet size overflows the address space"),
            Self::CapacityExceeded {
                requested,
                cursor,
                size,
            } => write!(
                f,
                "trailing append of {requested} bytes at offset {cursor} exceeds packet size {size}"
            ),
            Self::OutOfBounds { offset, len } => {
                write!(f, "range {offset}..+{len} lies outside the packet body")
            }
            Self::Invariant(err) => write!(f, "invariant violated: {err}"),
        }
    }
}

impl Error for PacketError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invariant(source) => Some(source),
            _ => None,
        }
    }
}
