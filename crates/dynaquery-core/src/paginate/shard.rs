//! Shard-tailing variant of the pagination engine.
//!
//! Stream shards differ from list operations in one way: an empty batch with
//! a still-valid iterator is not the end of the stream, it just means no
//! records have arrived yet. The tail sleeps for a bounded delay and retries
//! with the returned iterator instead of terminating.

use std::time::Duration;

use tracing::trace;

use crate::error::Result;

/// One fetched batch of shard records plus the iterator for the next fetch.
/// An absent iterator means the shard is closed.
#[derive(Debug, Clone)]
pub struct RecordBatch<T, I> {
    pub records: Vec<T>,
    pub next_iterator: Option<I>,
}

/// Pull iterator tailing a single shard.
///
/// Potentially infinite: an open shard that stays empty keeps the tail
/// polling. The consumer bounds consumption externally (`take`, or simply
/// stopping pulling).
pub struct ShardTail<T, I, F> {
    fetch: F,
    iterator: Option<I>,
    buffer: std::vec::IntoIter<T>,
    delay: Duration,
    sleeper: Box<dyn FnMut(Duration)>,
}

impl<T, I, F> ShardTail<T, I, F>
where
    F: FnMut(&I) -> Result<RecordBatch<T, I>>,
{
    pub fn new(initial_iterator: I, delay: Duration, fetch: F) -> Self {
        Self {
            fetch,
            iterator: Some(initial_iterator),
            buffer: Vec::new().into_iter(),
            delay,
            sleeper: Box::new(std::thread::sleep),
        }
    }

    /// Replace the inter-attempt sleep. Used by tests to observe delays
    /// instead of waiting them out.
    pub fn with_sleeper(mut self, sleeper: impl FnMut(Duration) + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }
}

impl<T, I, F> Iterator for ShardTail<T, I, F>
where
    F: FnMut(&I) -> Result<RecordBatch<T, I>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            let iterator = self.iterator.as_ref()?;
            let batch = match (self.fetch)(iterator) {
                Ok(batch) => batch,
                Err(err) => {
                    self.iterator = None;
                    return Some(Err(err));
                }
            };
            let empty = batch.records.is_empty();
            self.iterator = batch.next_iterator;
            self.buffer = batch.records.into_iter();
            if empty && self.iterator.is_some() {
                // Open shard, nothing arrived yet: wait, then poll again.
                trace!(delay_ms = self.delay.as_millis() as u64, "shard empty, waiting");
                (self.sleeper)(self.delay);
            }
        }
    }
}
