use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out packet indices that are unique for the lifetime of the sequencer.
///
/// The process-wide instance is reached through [`global`]; capture contexts that need an
/// isolated numbering (tests, multiple independent traces) own their own.
#[derive(Debug, Default)]
pub struct PacketSequencer {
    next: AtomicU64,
}

impl PacketSequencer {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    pub fn next_index(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The index the next call to [`Self::next_index`] will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

static GLOBAL_SEQUENCER: PacketSequencer = PacketSequencer::new();

pub fn global() -> &'static PacketSequencer {
    &GLOBAL_SEQUENCER
}

/// Next index from the process-wide sequencer.
pub fn next_index() -> u64 {
    GLOBAL_SEQUENCER.next_index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_zero_and_increments() {
        let sequencer = PacketSequencer::new();
        assert_eq!(sequencer.next_index(), 0);
        assert_eq!(sequencer.next_index(), 1);
        assert_eq!(sequencer.peek(), 2);
    }

    #[test]
    fn concurrent_callers_get_dense_unique_indices() {
        const THREADS: u64 = 16;
        const PER_THREAD: u64 = 500;

        let sequencer = Arc::new(PacketSequencer::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let sequencer = Arc::clone(&sequencer);
                std::thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| sequencer.next_index())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = BTreeSet::new();
        for handle in handles {
            for index in handle.join().expect("sequencer thread panicked") {
                assert!(seen.insert(index), "index {index} handed out twice");
            }
        }
        let expected: BTreeSet<u64> = (0..THREADS * PER_THREAD).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn global_sequencer_is_monotonic() {
        let a = next_index();
        let b = next_index();
        assert!(b > a);
    }
}
