use crate::packet::{Packet, PacketStamp};
use crate::sequencer::{self, PacketSequencer};
use crate::{PacketError, probes};
use std::sync::Arc;
use vellum_types::{PacketHeader, PacketTag, TracerId};

/// Source of packet timestamps.
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// The platform monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        probes::now_ns()
    }
}

#[derive(Debug, Clone)]
enum SequencerHandle {
    Global,
    Scoped(Arc<PacketSequencer>),
}

impl SequencerHandle {
    fn get(&self) -> &PacketSequencer {
        match self {
            Self::Global => sequencer::global(),
            Self::Scoped(sequencer) => sequencer,
        }
    }
}

/// Everything a capture site needs to create packets: which tracer it is, where indices
/// come from, and which clock stamps the timestamps.
#[derive(Clone)]
pub struct CaptureContext {
    tracer: TracerId,
    sequencer: SequencerHandle,
    clock: Arc<dyn Clock>,
}

impl CaptureContext {
    /// Context using the process-wide sequencer and the monotonic clock.
    pub fn new(tracer: TracerId) -> Self {
        Self {
            tracer,
            sequencer: SequencerHandle::Global,
            clock: Arc::new(MonotonicClock),
        }
    }

    pub fn with_sequencer(mut self, sequencer: Arc<PacketSequencer>) -> Self {
        self.sequencer = SequencerHandle::Scoped(sequencer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tracer(&self) -> TracerId {
        self.tracer
    }

    /// Allocates a packet for one intercepted call.
    ///
    /// `inline_size` is the size of the call's fixed argument block; `extra_size` must cover
    /// every trailing buffer and extension chain that will be appended.
    pub fn create(
        &self,
        tag: PacketTag,
        inline_size: u64,
        extra_size: u64,
    ) -> Result<Packet, PacketError> {
        let stamp = PacketStamp {
            index: self.sequencer.get().next_index(),
            tracer: self.tracer,
            thread_id: probes::thread_id(),
            tag,
            begin_time: self.clock.now_ns(),
        };
        Packet::allocate(&stamp, inline_size, extra_size)
    }

    /// Records the moment the intercepted call returned.
    pub fn mark_call_exit(&self, packet: &mut Packet) {
        packet.header_mut().call_end_time = self.clock.now_ns();
    }

    /// Closes the packet's timing. Call exit is stamped now if it was never recorded.
    pub fn finalize(&self, mut packet: Packet) -> FinalizedPacket {
        if packet.header().call_end_time == 0 {
            self.mark_call_exit(&mut packet);
        }
        packet.header_mut().capture_end_time = self.clock.now_ns();
        FinalizedPacket { packet }
    }
}

impl std::fmt::Debug for CaptureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureContext")
            .field("tracer", &self.tracer)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

/// A packet whose timing is closed and which may now be written.
///
/// Only [`CaptureContext::finalize`] produces one, so a packet cannot be written twice-stamped
/// or unstamped.
#[derive(Debug)]
pub struct FinalizedPacket {
    packet: Packet,
}

impl FinalizedPacket {
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn header(&self) -> &PacketHeader {
        self.packet.header()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.packet.as_bytes()
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }
}
