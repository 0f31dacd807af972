use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Identity of an emitted vertex, doubling as its position in emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
#[error("Sequence numbers are exhausted")]
pub struct SequenceExhaustedError;

/// Process-wide allocator of sequence numbers.
///
/// Shared by reference between every class and method processed in one run. Allocation is atomic,
/// so methods may be reconstructed on different threads as long as each gets its own engine.
#[derive(Debug, Default)]
pub struct Sequencer {
    last: AtomicU64,
}

impl Sequencer {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Continues numbering after sequence numbers that are already taken, e.g. by vertices a sink
    /// loaded from an earlier run.
    pub fn starting_after(last: Option<SequenceNumber>) -> Self {
        Self {
            last: AtomicU64::new(last.map_or(0, |seq| seq.0)),
        }
    }

    /// Allocates the number after the last one. Once `u64::MAX` is taken, every call fails.
    pub fn next(&self) -> Result<SequenceNumber, SequenceExhaustedError> {
        let previous = self
            .last
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| last.checked_add(1))
            .map_err(|_| SequenceExhaustedError)?;
        Ok(SequenceNumber(previous + 1))
    }

    pub fn last(&self) -> Option<SequenceNumber> {
        match self.last.load(Ordering::Relaxed) {
            0 => None,
            n => Some(SequenceNumber(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_at_one() {
        let sequencer = Sequencer::new();
        assert_eq!(sequencer.last(), None);
        assert_eq!(sequencer.next().ok(), Some(SequenceNumber(1)));
        assert_eq!(sequencer.next().ok(), Some(SequenceNumber(2)));
        assert_eq!(sequencer.last(), Some(SequenceNumber(2)));
    }

    #[test]
    fn resumes_after_existing_numbers() {
        let sequencer = Sequencer::starting_after(Some(SequenceNumber(41)));
        assert_eq!(sequencer.next().ok(), Some(SequenceNumber(42)));
    }

    #[test]
    fn exhaustion_is_an_error() {
        let sequencer = Sequencer::starting_after(Some(SequenceNumber(u64::MAX - 1)));
        assert_eq!(sequencer.next().ok(), Some(SequenceNumber(u64::MAX)));
        assert!(sequencer.next().is_err());
        assert!(sequencer.next().is_err());
        assert_eq!(sequencer.last(), Some(SequenceNumber(u64::MAX)));
    }

    #[test]
    fn concurrent_allocation_is_unique() {
        let sequencer = Sequencer::new();
        let mut all: Vec<SequenceNumber> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| {
                        (0..250)
                            .map(|_| sequencer.next().expect("allocate"))
                            .collect::<Vec<_>>()
                    }))
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().expect("allocator thread panicked"))
                .collect()
        });
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert_eq!(all.last(), Some(&SequenceNumber(1000)));
    }
}
