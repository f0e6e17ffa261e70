//! Extension-chain walking: copying `p_next` chains of graphics API structures into a packet
//! at capture time and restoring them at replay time.
//!
//! A persisted chain is position independent. Every pointer inside a copied node is replaced
//! by the [`BodyOffset`](vellum_types::BodyOffset) of its copy, and null stays null.

use std::error::Error;
use std::fmt;
use vellum_capture::PacketError;

pub mod decode;
pub mod encode;
pub mod layout;
pub mod live;
pub mod structs;

pub use decode::{DecodedChain, DecodedNode, ResolvedArray, decode_chain, decode_chain_at};
pub use encode::{ChainReport, append_chain, append_chain_at, chain_size};
pub use layout::{ArrayField, VARIANT_LAYOUTS, VariantLayout, layout_for};
pub use live::LiveChain;
pub use structs::{BaseInStructure, Extension, StructureType};

// Pointer slots are persisted as 8-byte offsets, which must line up with the live layout.
const _: () = assert!(
    std::mem::size_of::<*const u8>() == 8,
    "extension chains require 64-bit pointers"
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    Packet(PacketError),
    OffsetOutOfBounds { offset: u64, len: u64 },
    TooManyNodes { limit: usize },
    ArrayTooLarge { s_type: StructureType, count: u32 },
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Packet(err) => write!(f, "packet error while copying chain: {err}"),
            Self::OffsetOutOfBounds { offset, len } => {
                write!(f, "chain offset {offset} (+{len} bytes) lies outside the packet body")
            }
            Self::TooManyNodes { limit } => {
                write!(f, "chain has more than {limit} nodes; offsets likely form a cycle")
            }
            Self::ArrayTooLarge { s_type, count } => {
                write!(f, "array of {count} elements in structure {s_type} is too large")
            }
        }
    }
}

impl Error for ChainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Packet(source) => Some(source),
            _ => None,
        }
    }
}

impl From<PacketError> for ChainError {
    fn from(value: PacketError) -> Self {
        Self::Packet(value)
    }
}
