use crate::{WriteError, WriteOutcome};
use crate::file_header::{TraceFileHeader, write_file_header};
use crate::packet_io::write_packet;
use crate::stream::ByteSink;
use vellum_capture::FinalizedPacket;

/// Invoked when a packet cannot be written. The default terminates the process.
pub type FatalHandler = Box<dyn Fn(&WriteError) + Send + Sync>;

fn exit_process(err: &WriteError) {
    tracing::error!(%err, "trace stream is no longer writable; exiting");
    std::process::exit(1);
}

/// Drives a trace stream: writes the file header once, then finalized packets.
///
/// A trace with a hole in it is worse than no trace, so a failed packet write hands the
/// error to the fatal handler rather than letting capture carry on.
pub struct TraceWriter<S> {
    sink: S,
    header: TraceFileHeader,
    on_fatal: FatalHandler,
    packets_written: u64,
    bytes_written: u64,
}

impl<S: ByteSink> TraceWriter<S> {
    /// Writes `header` to `sink` and returns a writer positioned at the first packet.
    pub fn create(mut sink: S, header: TraceFileHeader) -> Result<Self, WriteError> {
        write_file_header(&mut sink, &header)?;
        tracing::debug!(uuid = %header.uuid_hex(), tracer = header.tracer_id, "trace stream opened");
        Ok(Self {
            sink,
            bytes_written: header.first_packet_offset,
            header,
            on_fatal: Box::new(exit_process),
            packets_written: 0,
        })
    }

    /// Replaces the fatal handler, e.g. to record the failure instead of exiting in tests.
    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.on_fatal = handler;
        self
    }

    /// Writes one packet. Only packets that reached the sink are counted.
    pub fn write(&mut self, packet: &FinalizedPacket) -> Result<WriteOutcome, WriteError> {
        match write_packet(packet, &mut self.sink) {
            Ok(WriteOutcome::Written) => {
                self.packets_written += 1;
                self.bytes_written += packet.packet().size();
                Ok(WriteOutcome::Written)
            }
            Ok(WriteOutcome::Dropped) => Ok(WriteOutcome::Dropped),
            Err(err) => {
                tracing::warn!(%err, "trace packet write failed");
                (self.on_fatal)(&err);
                Err(err)
            }
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.sink.flush()
    }

    pub fn header(&self) -> &TraceFileHeader {
        &self.header
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Bytes written so far, file header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S> std::fmt::Debug for TraceWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceWriter")
            .field("header", &self.header)
            .field("packets_written", &self.packets_written)
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vellum_capture::{CaptureContext, PacketSequencer};
    use vellum_types::{PacketTag, TracerId};

    /// Accepts the file header, then fails every write.
    struct FailAfterHeader {
        writes: usize,
    }

    impl ByteSink for FailAfterHeader {
        fn write_raw(&mut self, _bytes: &[u8]) -> io::Result<()> {
            self.writes += 1;
            if self.writes > 1 {
                return Err(io::Error::other("disk full"));
            }
            Ok(())
        }
    }

    fn context() -> CaptureContext {
        CaptureContext::new(TracerId::new(3)).with_sequencer(Arc::new(PacketSequencer::new()))
    }

    fn counting_handler() -> (Arc<AtomicUsize>, FatalHandler) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler: FatalHandler = Box::new(move |err| {
            assert!(matches!(err, WriteError::Fatal { .. }));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (calls, handler)
    }

    #[test]
    fn writer_counts_packets_and_bytes() {
        let ctx = context();
        let header = TraceFileHeader::for_this_process(ctx.tracer());
        let mut writer = TraceWriter::create(Vec::new(), header).expect("vec sink never fails");
        for _ in 0..3 {
            let packet = ctx.create(PacketTag::new(20), 12, 0).expect("allocates");
            let outcome = writer.write(&ctx.finalize(packet)).expect("vec sink never fails");
            assert_eq!(outcome, WriteOutcome::Written);
        }
        assert_eq!(writer.packets_written(), 3);
        let total = writer.bytes_written();
        assert_eq!(writer.into_sink().len() as u64, total);
    }

    #[test]
    fn failed_write_invokes_fatal_handler() {
        let ctx = context();
        let (calls, handler) = counting_handler();
        let mut writer = TraceWriter::create(
            FailAfterHeader { writes: 0 },
            TraceFileHeader::for_this_process(ctx.tracer()),
        )
        .expect("header write succeeds")
        .with_fatal_handler(handler);

        let packet = ctx.create(PacketTag::new(20), 4, 0).expect("allocates");
        let err = writer
            .write(&ctx.finalize(packet))
            .expect_err("sink rejects packets");
        assert!(matches!(err, WriteError::Fatal { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(writer.packets_written(), 0);
    }

    #[test]
    fn terminate_marker_failure_skips_fatal_handler() {
        let ctx = context();
        let (calls, handler) = counting_handler();
        let mut writer = TraceWriter::create(
            FailAfterHeader { writes: 0 },
            TraceFileHeader::for_this_process(ctx.tracer()),
        )
        .expect("header write succeeds")
        .with_fatal_handler(handler);

        let bytes_before = writer.bytes_written();
        let packet = ctx
            .create(PacketTag::MARKER_TERMINATE_PROCESS, 0, 0)
            .expect("allocates");
        let outcome = writer
            .write(&ctx.finalize(packet))
            .expect("terminate failures are ignored");
        assert_eq!(outcome, WriteOutcome::Dropped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(writer.packets_written(), 0);
        assert_eq!(writer.bytes_written(), bytes_before);
    }
}
