use crate::ReadError;
use crate::file_header::{TraceFileHeader, read_file_header};
use crate::packet_io::read_packet;
use crate::stream::ByteSource;
use vellum_capture::Packet;

/// Reads a trace stream: the file header on open, then packets until the stream ends.
///
/// As an iterator it yields `Err` at most once and then stops.
#[derive(Debug)]
pub struct TraceReader<S> {
    source: S,
    header: TraceFileHeader,
    max_packet_bytes: u64,
    done: bool,
}

impl<S: ByteSource> TraceReader<S> {
    pub fn open(mut source: S, max_packet_bytes: u64) -> Result<Self, ReadError> {
        let header = read_file_header(&mut source)?;
        tracing::debug!(uuid = %header.uuid_hex(), tracer = header.tracer_id, "trace stream opened for reading");
        Ok(Self {
            source,
            header,
            max_packet_bytes,
            done: false,
        })
    }

    pub fn header(&self) -> &TraceFileHeader {
        &self.header
    }

    pub fn next_packet(&mut self) -> Result<Option<Packet>, ReadError> {
        if self.done {
            return Ok(None);
        }
        let result = read_packet(&mut self.source, self.max_packet_bytes);
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }
}

impl<S: ByteSource> Iterator for TraceReader<S> {
    type Item = Result<Packet, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TraceWriter;
    use std::sync::Arc;
    use vellum_capture::{CaptureContext, PacketSequencer};
    use vellum_chain::structs::{Extension, ImageFormatListCreateInfo};
    use vellum_chain::{BaseInStructure, StructureType, append_chain_at, chain_size, decode_chain_at};
    use vellum_types::{PacketTag, TracerId};

    const MAX: u64 = 1 << 20;

    fn context() -> CaptureContext {
        CaptureContext::new(TracerId::new(5)).with_sequencer(Arc::new(PacketSequencer::new()))
    }

    fn trace_with(packets: usize) -> Vec<u8> {
        let ctx = context();
        let mut writer = TraceWriter::create(
            Vec::new(),
            TraceFileHeader::for_this_process(ctx.tracer()),
        )
        .expect("vec sink never fails");
        for i in 0..packets {
            let mut packet = ctx.create(PacketTag::new(30), 4, 4).expect("allocates");
            packet
                .write_inline(0, &(i as u32).to_ne_bytes())
                .expect("payload fits");
            packet.append_trailing(&[9, 9, 9, 9]).expect("buffer fits");
            writer.write(&ctx.finalize(packet)).expect("vec sink never fails");
        }
        writer.into_sink()
    }

    #[test]
    fn reads_back_every_packet_in_order() {
        let bytes = trace_with(4);
        let reader = TraceReader::open(&bytes[..], MAX).expect("header should validate");
        assert_eq!(reader.header().tracer(), TracerId::new(5));

        let packets: Vec<Packet> = reader
            .collect::<Result<_, _>>()
            .expect("every packet should read");
        assert_eq!(packets.len(), 4);
        for (i, packet) in packets.iter().enumerate() {
            assert_eq!(packet.index(), i as u64);
            assert_eq!(&packet.body()[..4], &(i as u32).to_ne_bytes());
        }
    }

    #[test]
    fn iteration_stops_after_first_error() {
        let mut bytes = trace_with(2);
        bytes.truncate(bytes.len() - 3);
        let mut reader = TraceReader::open(&bytes[..], MAX).expect("header should validate");

        assert!(matches!(reader.next(), Some(Ok(_))));
        assert!(matches!(reader.next(), Some(Err(ReadError::Truncated { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn extension_chain_survives_a_trace_file() {
        let formats = [100u32, 101, 102];
        let list = ImageFormatListCreateInfo {
            s_type: ImageFormatListCreateInfo::STRUCTURE_TYPE,
            p_next: std::ptr::null(),
            view_format_count: formats.len() as u32,
            p_view_formats: formats.as_ptr(),
        };
        let first = (&list as *const ImageFormatListCreateInfo).cast::<BaseInStructure>();

        let ctx = context();
        let mut packet = ctx
            .create(PacketTag::new(31), 16, unsafe { chain_size(first) })
            .expect("allocates");
        unsafe { append_chain_at(&mut packet, 8, first) }.expect("chain fits");

        let mut writer = TraceWriter::create(
            Vec::new(),
            TraceFileHeader::for_this_process(ctx.tracer()),
        )
        .expect("vec sink never fails");
        writer.write(&ctx.finalize(packet)).expect("vec sink never fails");
        let bytes = writer.into_sink();

        let mut reader = TraceReader::open(&bytes[..], MAX).expect("header should validate");
        let packet = reader
            .next_packet()
            .expect("packet should read")
            .expect("trace holds one packet");
        let chain = decode_chain_at(&packet, 8).expect("chain should decode");
        let node = chain
            .find(StructureType::IMAGE_FORMAT_LIST_CREATE_INFO)
            .expect("format list decoded");
        assert_eq!(
            node.array("p_view_formats").and_then(|a| a.elements::<u32>()),
            Some(vec![100, 101, 102])
        );
    }
}
