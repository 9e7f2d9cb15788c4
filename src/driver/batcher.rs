//! Batch-boundary bookkeeping for acknowledgements and commits
//!
//! Every worker counts the messages it has handled since its session opened.
//! After each handled message the count is checked against the batch size;
//! on a boundary the worker acknowledges (client-acknowledge mode) and/or
//! commits (transacted session).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decides whether a handled message closes a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckBatcher {
    batch_size: u32,
}

impl AckBatcher {
    /// `batch_size` must be at least 1
    pub fn new(batch_size: u32) -> Self {
        debug_assert!(batch_size >= 1);
        Self { batch_size }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// True iff `count_after_this_message` lands on a batch boundary
    ///
    /// ```
    /// use jms_tools::driver::AckBatcher;
    ///
    /// let batcher = AckBatcher::new(3);
    /// let boundaries: Vec<u64> = (1..=7).filter(|n| batcher.should_finalize(*n)).collect();
    /// assert_eq!(boundaries, vec![3, 6]);
    /// ```
    pub fn should_finalize(&self, count_after_this_message: u64) -> bool {
        should_finalize(count_after_this_message, self.batch_size)
    }
}

pub fn should_finalize(count_after_this_message: u64, batch_size: u32) -> bool {
    count_after_this_message % u64::from(batch_size) == 0
}

/// Messages handled by one worker since its session opened
///
/// Owned by the worker loop and never shared.
#[derive(Debug, Default)]
pub struct BatchCursor {
    handled: u64,
}

impl BatchCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more handled message and return the new total
    pub fn advance(&mut self) -> u64 {
        self.handled += 1;
        self.handled
    }

    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Take over the count reached by a push-delivery callback
    pub fn absorb(&mut self, counter: &ListenerCounter) {
        self.handled = self.handled.max(counter.get());
    }
}

/// Handled-message count shared with a push-delivery callback
///
/// Only ever incremented. Each callback uses the value its own increment
/// produced, so batch decisions stay per-message even when the worker reads
/// the counter concurrently.
#[derive(Debug, Clone, Default)]
pub struct ListenerCounter {
    received: Arc<AtomicU64>,
}

impl ListenerCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> u64 {
        self.received.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn get(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn reached(&self, target: u64) -> bool {
        self.get() >= target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_finalize_matches_modulo() {
        for batch_size in 1..=7u32 {
            for count in 1..=50u64 {
                assert_eq!(
                    should_finalize(count, batch_size),
                    count % u64::from(batch_size) == 0,
                    "count={count} batch_size={batch_size}"
                );
            }
        }
    }

    #[test]
    fn test_batch_size_one_finalizes_every_message() {
        let batcher = AckBatcher::new(1);
        assert!((1..=20).all(|count| batcher.should_finalize(count)));
    }

    #[test]
    fn test_batch_cursor_advances() {
        let mut cursor = BatchCursor::new();
        assert_eq!(cursor.handled(), 0);
        assert_eq!(cursor.advance(), 1);
        assert_eq!(cursor.advance(), 2);
        assert_eq!(cursor.handled(), 2);
    }

    #[test]
    fn test_batch_cursor_absorbs_listener_count() {
        let mut cursor = BatchCursor::new();
        let counter = ListenerCounter::new();
        for _ in 0..4 {
            counter.advance();
        }
        cursor.absorb(&counter);
        assert_eq!(cursor.handled(), 4);
    }

    #[tokio::test]
    async fn test_listener_counter_is_monotonic_across_tasks() {
        let counter = ListenerCounter::new();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            tasks.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..100 {
                    seen.push(counter.advance());
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for task in tasks {
            let seen = task.await.unwrap();
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            all.extend(seen);
        }

        all.sort_unstable();
        assert_eq!(all, (1..=800).collect::<Vec<u64>>());
        assert!(counter.reached(800));
        assert!(!counter.reached(801));
    }
}
