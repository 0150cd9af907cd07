//! Chunks: contiguous byte ranges with a download cursor.

mod plan;
mod state;

pub use plan::{plan_chunks, single_chunk};
pub use state::ChunkState;

use serde::{Deserialize, Serialize};

/// One contiguous byte range of the resource, tracked independently.
///
/// `end` is inclusive. It is `None` only for the single open-ended chunk used
/// when the server does not report a size; such a chunk completes at EOF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub start: u64,
    pub end: Option<u64>,
    /// Absolute offset of the next byte to fetch (`start <= position <= end + 1`).
    pub position: u64,
    #[serde(default)]
    pub retries_used: u32,
    #[serde(skip)]
    state: ChunkState,
}

impl Chunk {
    /// Fresh chunk covering `[start, end]`.
    pub fn new(id: usize, start: u64, end: u64) -> Self {
        Self {
            id,
            start,
            end: Some(end),
            position: start,
            retries_used: 0,
            state: ChunkState::Pending,
        }
    }

    /// Fresh chunk from `start` to EOF of a resource of unknown size.
    pub fn open_ended(id: usize, start: u64) -> Self {
        Self {
            id,
            start,
            end: None,
            position: start,
            retries_used: 0,
            state: ChunkState::Pending,
        }
    }

    /// Length of the range, if known.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end + 1 - self.start)
    }

    /// Bytes already fetched.
    pub fn received(&self) -> u64 {
        self.position.saturating_sub(self.start)
    }

    /// Bytes still to fetch, if known.
    pub fn remaining(&self) -> Option<u64> {
        self.end.map(|end| (end + 1).saturating_sub(self.position))
    }

    /// True once the cursor has passed `end`. Open-ended chunks are never
    /// complete by position alone.
    pub fn is_complete(&self) -> bool {
        self.end.map_or(false, |end| self.position == end + 1)
    }

    /// HTTP Range header value for the remaining bytes: `bytes=position-end`.
    pub fn range_header_value(&self) -> Option<String> {
        self.curl_range().map(|r| format!("bytes={}", r))
    }

    /// Remaining range in the form curl expects (`position-end`, no `bytes=`).
    pub fn curl_range(&self) -> Option<String> {
        match self.end {
            Some(end) if self.position <= end => Some(format!("{}-{}", self.position, end)),
            _ => None,
        }
    }

    /// Move the cursor back to `start` (non-resumable restart).
    pub fn rewind(&mut self) {
        self.position = self.start;
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Move to `next`, logging the transition. Illegal transitions are logged
    /// and ignored.
    pub fn transition(&mut self, next: ChunkState) {
        if !self.state.can_become(next) {
            tracing::warn!(chunk = self.id, from = ?self.state, to = ?next, "ignored illegal chunk transition");
            return;
        }
        tracing::debug!(chunk = self.id, from = ?self.state, to = ?next, position = self.position, "chunk state");
        self.state = next;
    }

    /// Reset the runtime state before a (re)run from the persisted cursor.
    pub(crate) fn prepare(&mut self) {
        self.state = if self.is_complete() {
            ChunkState::Completed
        } else {
            ChunkState::Pending
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_math() {
        let mut c = Chunk::new(0, 100, 199);
        assert_eq!(c.len(), Some(100));
        assert_eq!(c.remaining(), Some(100));
        assert!(!c.is_complete());
        c.position = 150;
        assert_eq!(c.received(), 50);
        assert_eq!(c.remaining(), Some(50));
        c.position = 200;
        assert!(c.is_complete());
        assert_eq!(c.remaining(), Some(0));
        c.rewind();
        assert_eq!(c.position, 100);
    }

    #[test]
    fn range_header_starts_at_position() {
        let mut c = Chunk::new(1, 0, 99);
        assert_eq!(c.range_header_value().as_deref(), Some("bytes=0-99"));
        c.position = 42;
        assert_eq!(c.range_header_value().as_deref(), Some("bytes=42-99"));
        assert_eq!(c.curl_range().as_deref(), Some("42-99"));
        c.position = 100;
        assert_eq!(c.range_header_value(), None);
    }

    #[test]
    fn single_byte_range() {
        let c = Chunk::new(0, 42, 42);
        assert_eq!(c.len(), Some(1));
        assert_eq!(c.range_header_value().as_deref(), Some("bytes=42-42"));
    }

    #[test]
    fn open_ended_chunk_has_no_range() {
        let mut c = Chunk::open_ended(0, 0);
        assert_eq!(c.len(), None);
        assert_eq!(c.curl_range(), None);
        c.position = 1000;
        assert!(!c.is_complete());
    }

    #[test]
    fn state_is_not_persisted() {
        let mut c = Chunk::new(2, 10, 19);
        c.transition(ChunkState::InProgress);
        c.position = 15;
        let json = serde_json::to_string(&c).unwrap();
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back.position, 15);
        assert_eq!(back.state(), ChunkState::Pending);
    }

    #[test]
    fn illegal_transition_is_ignored() {
        let mut c = Chunk::new(0, 0, 9);
        c.transition(ChunkState::Completed);
        assert_eq!(c.state(), ChunkState::Pending);
    }
}
