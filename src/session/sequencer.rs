//! In-order release of out-of-order completions.

use std::collections::BTreeMap;

/// Buffers completed items until every earlier sequence number has completed.
///
/// Sequence numbers start at 0 and must each be completed exactly once.
#[derive(Debug)]
pub struct ResponseSequencer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ResponseSequencer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Records completion of `seq` and returns everything now releasable, in
    /// order. Completions below the release point are ignored.
    pub fn complete(&mut self, seq: u64, item: T) -> Vec<T> {
        if seq < self.next {
            tracing::warn!(seq, next = self.next, "Ignoring duplicate completion");
            return Vec::new();
        }
        self.pending.insert(seq, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Number of completions held back by an earlier gap.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn next_seq(&self) -> u64 {
        self.next
    }
}

impl<T> Default for ResponseSequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}
