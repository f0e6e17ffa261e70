//! Trace stream I/O: the file header, packet write/read, and the writer/reader drivers.
//!
//! Packets go on the wire exactly as they sit in memory, native endianness, `size` bytes each.
//! A trace is a [`TraceFileHeader`] followed by packets back to back.

use std::fmt;
use std::io;
use vellum_capture::PacketError;
use vellum_types::{Endianness, PacketTag};

pub mod config;
pub mod file_header;
pub mod packet_io;
pub mod reader;
pub mod stream;
pub mod writer;

pub use config::WireConfig;
pub use file_header::{
    FILE_HEADER_SIZE, TRACE_FILE_VERSION, TRACE_MAGIC, TraceFileHeader, read_file_header,
    write_file_header,
};
pub use packet_io::{read_packet, read_packet_default, write_packet};
pub use reader::TraceReader;
pub use stream::{ByteSink, ByteSource, FileLike, SharedSink};
pub use writer::{FatalHandler, TraceWriter};

pub const DEFAULT_MAX_PACKET_BYTES: u64 = 256 * 1024 * 1024;
pub const DEFAULT_WRITE_RETRIES: u32 = 3;

/// What became of a packet handed to [`write_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All `size` bytes reached the sink.
    Written,
    /// The sink failed on a terminate-process marker and nothing was written.
    Dropped,
}

#[derive(Debug)]
pub enum WriteError {
    /// The sink rejected a packet the trace cannot do without.
    Fatal {
        index: u64,
        tag: PacketTag,
        source: io::Error,
    },
    Header(io::Error),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal { index, tag, source } => {
                write!(f, "failed to write packet {index} (tag {tag}): {source}")
            }
            Self::Header(source) => write!(f, "failed to write trace file header: {source}"),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fatal { source, .. } | Self::Header(source) => Some(source),
        }
    }
}

#[derive(Debug)]
pub enum ReadError {
    Io(io::Error),
    Truncated { expected: u64, actual: u64 },
    Malformed(PacketError),
    MagicMismatch { actual: [u8; 8] },
    UnsupportedVersion { expected: u16, actual: u16 },
    HeaderSizeMismatch { expected: u16, actual: u16 },
    ForeignEndianness { trace: Option<Endianness> },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Truncated { expected, actual } => {
                write!(f, "truncated read: expected {expected} bytes, got {actual}")
            }
            Self::Malformed(err) => write!(f, "malformed packet: {err}"),
            Self::MagicMismatch { actual } => {
                write!(f, "not a trace file: magic {:?}", String::from_utf8_lossy(actual))
            }
            Self::UnsupportedVersion { expected, actual } => {
                write!(f, "unsupported trace version {actual}, expected {expected}")
            }
            Self::HeaderSizeMismatch { expected, actual } => {
                write!(f, "trace header size {actual} does not match {expected}")
            }
            Self::ForeignEndianness { trace } => match trace {
                Some(trace) => write!(
                    f,
                    "trace was captured {trace:?}-endian, this machine is {:?}-endian",
                    Endianness::native()
                ),
                None => write!(f, "trace header has an unknown endianness marker"),
            },
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(source) => Some(source),
            Self::Malformed(source) => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<PacketError> for ReadError {
    fn from(value: PacketError) -> Self {
        Self::Malformed(value)
    }
}
