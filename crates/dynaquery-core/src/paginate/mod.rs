//! Lazy, pull-driven page-to-item flattening.
//!
//! One abstraction covers every list-style backend: key-value query and scan
//! pages, object listings, topic listings, and stream shard records. The
//! consumer pulls items one at a time; exactly one page fetch is outstanding
//! at any moment, and the next fetch is not issued until the current page is
//! fully drained. Stopping pulling stops fetching.

mod listing;
mod shard;

pub use listing::{list_objects, list_topics, ObjectStore, ObjectSummary, TopicRegistry};
pub use shard::{RecordBatch, ShardTail};

use crate::error::{Error, Result};

/// One fetched page: items in backend order plus the continuation state for
/// the next fetch. An absent state marks the terminal page.
#[derive(Debug, Clone)]
pub struct Page<T, S> {
    pub items: Vec<T>,
    pub next: Option<S>,
}

impl<T, S> Page<T, S> {
    pub fn terminal(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn continued(items: Vec<T>, next: S) -> Self {
        Self {
            items,
            next: Some(next),
        }
    }
}

/// Pull iterator that flattens successive pages into single items.
///
/// Each pull drains the buffered page first; only when it is empty is one
/// more fetch issued with the current continuation state. A fetch error is
/// yielded once and fuses the iterator; no further backend calls follow.
/// The sequence is single-pass and bound to the request that created it.
pub struct Paginated<T, S, F> {
    fetch: F,
    state: Option<S>,
    buffer: std::vec::IntoIter<T>,
    done: bool,
}

impl<T, S, F> Paginated<T, S, F>
where
    F: FnMut(Option<&S>) -> Result<Page<T, S>>,
{
    /// Start a sequence. `initial` is the continuation state for the first
    /// fetch (`None` starts from the beginning).
    pub fn new(initial: Option<S>, fetch: F) -> Self {
        Self {
            fetch,
            state: initial,
            buffer: Vec::new().into_iter(),
            done: false,
        }
    }
}

impl<T, S, F> Iterator for Paginated<T, S, F>
where
    F: FnMut(Option<&S>) -> Result<Page<T, S>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            let page = match (self.fetch)(self.state.as_ref()) {
                Ok(page) => page,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            self.state = page.next;
            if self.state.is_none() {
                self.done = true;
            }
            self.buffer = page.items.into_iter();
        }
    }
}

/// Drain a paginated sequence, counting items without keeping them.
pub fn count_items<T>(sequence: impl Iterator<Item = std::result::Result<T, Error>>) -> Result<u64> {
    let mut total = 0u64;
    for item in sequence {
        item?;
        total += 1;
    }
    Ok(total)
}
