use crate::stream::{ByteSink, ByteSource};
use crate::{ReadError, WriteError};
use bytemuck::{Pod, Zeroable};
use vellum_capture::probes;
use vellum_types::{Endianness, TracerId, unpack_name};

pub const TRACE_MAGIC: [u8; 8] = *b"VLMTRACE";
pub const TRACE_FILE_VERSION: u16 = 1;

/// Fixed header at the start of every trace file, written in native byte order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TraceFileHeader {
    pub magic: [u8; 8],
    pub version: u16,
    pub header_size: u16,
    pub tracer_id: u8,
    pub pointer_size: u8,
    /// Single byte, so it reads the same on either byte order.
    pub endianness: u8,
    pub _pad: u8,
    pub uuid: [u8; 16],
    pub arch_id: u64,
    pub os_id: u64,
    /// Where the first packet starts, counted from the beginning of the file.
    pub first_packet_offset: u64,
}

pub const FILE_HEADER_SIZE: usize = std::mem::size_of::<TraceFileHeader>();

const _: () = assert!(FILE_HEADER_SIZE == 56);

impl TraceFileHeader {
    /// Describes a trace captured by `tracer` in this process on this machine.
    pub fn for_this_process(tracer: TracerId) -> Self {
        Self {
            magic: TRACE_MAGIC,
            version: TRACE_FILE_VERSION,
            header_size: FILE_HEADER_SIZE as u16,
            tracer_id: tracer.get(),
            pointer_size: probes::pointer_size(),
            endianness: probes::endianness().to_raw() as u8,
            _pad: 0,
            uuid: probes::generate_uuid(),
            arch_id: probes::arch_id(),
            os_id: probes::os_id(),
            first_packet_offset: FILE_HEADER_SIZE as u64,
        }
    }

    pub fn tracer(&self) -> TracerId {
        TracerId::new(self.tracer_id)
    }

    pub fn arch_name(&self) -> String {
        unpack_name(self.arch_id)
    }

    pub fn os_name(&self) -> String {
        unpack_name(self.os_id)
    }

    /// Byte order the trace was captured in; `None` for an unknown marker.
    pub fn endianness(&self) -> Option<Endianness> {
        Endianness::from_raw(self.endianness as u64)
    }

    pub fn uuid_hex(&self) -> String {
        uuid::Uuid::from_bytes(self.uuid).simple().to_string()
    }

    /// Checks that this header describes a trace this build can read on this machine.
    pub fn validate(&self) -> Result<(), ReadError> {
        if self.magic != TRACE_MAGIC {
            return Err(ReadError::MagicMismatch { actual: self.magic });
        }
        let trace = self.endianness();
        if trace != Some(Endianness::native()) {
            return Err(ReadError::ForeignEndianness { trace });
        }
        if self.version != TRACE_FILE_VERSION {
            return Err(ReadError::UnsupportedVersion {
                expected: TRACE_FILE_VERSION,
                actual: self.version,
            });
        }
        if self.header_size as usize != FILE_HEADER_SIZE {
            return Err(ReadError::HeaderSizeMismatch {
                expected: FILE_HEADER_SIZE as u16,
                actual: self.header_size,
            });
        }
        if self.first_packet_offset < FILE_HEADER_SIZE as u64 {
            return Err(ReadError::Truncated {
                expected: FILE_HEADER_SIZE as u64,
                actual: self.first_packet_offset,
            });
        }
        Ok(())
    }
}

pub fn write_file_header<S: ByteSink + ?Sized>(
    sink: &mut S,
    header: &TraceFileHeader,
) -> Result<(), WriteError> {
    sink.write_raw(bytemuck::bytes_of(header))
        .map_err(WriteError::Header)
}

/// Reads and validates the file header, then skips ahead to the first packet.
pub fn read_file_header<S: ByteSource + ?Sized>(
    source: &mut S,
) -> Result<TraceFileHeader, ReadError> {
    let mut header = TraceFileHeader::zeroed();
    let got = source.read_raw(bytemuck::bytes_of_mut(&mut header))?;
    if got < FILE_HEADER_SIZE {
        return Err(ReadError::Truncated {
            expected: FILE_HEADER_SIZE as u64,
            actual: got as u64,
        });
    }
    header.validate()?;

    let mut skip = header.first_packet_offset - FILE_HEADER_SIZE as u64;
    let mut scratch = [0u8; 256];
    while skip > 0 {
        let chunk = skip.min(scratch.len() as u64) as usize;
        let got = source.read_raw(&mut scratch[..chunk])?;
        if got < chunk {
            return Err(ReadError::Truncated {
                expected: header.first_packet_offset,
                actual: header.first_packet_offset - skip + got as u64,
            });
        }
        skip -= chunk as u64;
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips_and_describes_this_machine() {
        let header = TraceFileHeader::for_this_process(TracerId::new(4));
        let mut sink = Vec::new();
        write_file_header(&mut sink, &header).expect("vec sink never fails");
        assert_eq!(sink.len(), FILE_HEADER_SIZE);
        assert_eq!(&sink[..8], b"VLMTRACE");

        let mut source: &[u8] = &sink;
        let read = read_file_header(&mut source).expect("header should validate");
        assert_eq!(read, header);
        assert_eq!(read.tracer(), TracerId::new(4));
        assert_eq!(read.pointer_size as usize, std::mem::size_of::<usize>());
        assert!(!read.arch_name().is_empty());
        assert_eq!(read.uuid_hex().len(), 32);
        assert_eq!(read.endianness(), Some(Endianness::native()));
    }

    #[test]
    fn uuid_renders_as_simple_hex() {
        let mut header = TraceFileHeader::for_this_process(TracerId::new(1));
        header.uuid = [
            0x67, 0xe5, 0x50, 0x44, 0x10, 0xb1, 0x42, 0x6f, 0x92, 0x47, 0xbb, 0x68, 0x0e, 0x5f,
            0xe0, 0xc8,
        ];
        assert_eq!(header.uuid_hex(), "67e5504410b1426f9247bb680e5fe0c8");
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut header = TraceFileHeader::for_this_process(TracerId::new(1));
        header.magic = *b"NOTATRCE";
        assert!(matches!(header.validate(), Err(ReadError::MagicMismatch { .. })));
    }

    #[test]
    fn foreign_endianness_is_rejected() {
        let mut header = TraceFileHeader::for_this_process(TracerId::new(1));
        let foreign = match Endianness::native() {
            Endianness::Little => Endianness::Big,
            Endianness::Big => Endianness::Little,
        };
        header.endianness = foreign.to_raw() as u8;
        assert!(matches!(
            header.validate(),
            Err(ReadError::ForeignEndianness { trace: Some(t) }) if t == foreign
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut header = TraceFileHeader::for_this_process(TracerId::new(1));
        header.version = TRACE_FILE_VERSION + 1;
        assert!(matches!(
            header.validate(),
            Err(ReadError::UnsupportedVersion { actual, .. }) if actual == TRACE_FILE_VERSION + 1
        ));
    }

    #[test]
    fn reader_skips_to_first_packet_offset() {
        let mut header = TraceFileHeader::for_this_process(TracerId::new(1));
        header.first_packet_offset = FILE_HEADER_SIZE as u64 + 300;
        let mut bytes = bytemuck::bytes_of(&header).to_vec();
        bytes.extend_from_slice(&[0xEE; 300]);
        bytes.push(0x42);

        let mut source: &[u8] = &bytes;
        read_file_header(&mut source).expect("header should validate");
        assert_eq!(source, &[0x42u8]);
    }

    #[test]
    fn short_header_is_truncated() {
        let mut source: &[u8] = b"VLMTRACE";
        assert!(matches!(
            read_file_header(&mut source),
            Err(ReadError::Truncated { expected: 56, actual: 8 })
        ));
    }
}
