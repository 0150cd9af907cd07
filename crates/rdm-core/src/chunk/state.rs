//! Per-chunk lifecycle.

/// `Pending → InProgress → {Completed | Retrying | Aborted}`, with
/// `Retrying → InProgress` on reopen. Cancelled or stopped chunks go back to
/// `Pending` so a resume can pick them up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkState {
    #[default]
    Pending,
    InProgress,
    Retrying,
    Completed,
    Aborted,
}

impl ChunkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkState::Completed | ChunkState::Aborted)
    }

    pub fn can_become(self, next: ChunkState) -> bool {
        use ChunkState::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Retrying)
                | (InProgress, Aborted)
                | (InProgress, Pending)
                | (Retrying, InProgress)
                | (Retrying, Aborted)
                | (Retrying, Pending)
        )
    }
}
