//! Worker pool over a shared chunk queue.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;

use super::worker::{run_chunk, WorkerOutcome, WorkerReport};
use super::ChunkContext;
use crate::chunk::Chunk;
use crate::error::DownloadError;

/// How a run of the pool ended when no chunk failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    /// Every chunk reached its end.
    Completed,
    /// Cancelled by the caller; cursors are saved in the chunks.
    Cancelled,
    /// A ranged request came back as a full 200 body.
    RangeUnsupported,
}

/// Run every incomplete chunk to completion or interruption.
///
/// Chunks are moved into the queue and moved back into `chunks` (ordered by
/// id) when the workers are done, so the caller always gets the advanced
/// cursors, including after a failure.
pub(crate) fn run_chunks(
    ctx: &ChunkContext<'_>,
    chunks: &mut Vec<Chunk>,
    parallel: bool,
) -> Result<RunOutcome, DownloadError> {
    let (mut done, todo): (Vec<Chunk>, Vec<Chunk>) =
        std::mem::take(chunks).into_iter().partition(Chunk::is_complete);
    if todo.is_empty() {
        *chunks = done;
        return Ok(RunOutcome::Completed);
    }

    let workers = if parallel && ctx.supports_range {
        todo.len()
    } else {
        1
    };
    tracing::debug!(chunks = todo.len(), workers, "starting chunk workers");

    let queue: Mutex<VecDeque<Chunk>> = Mutex::new(todo.into_iter().collect());
    let (tx, rx) = mpsc::channel::<WorkerReport>();
    let reports: Vec<WorkerReport> = thread::scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            s.spawn(move || loop {
                let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                let Some(chunk) = next else {
                    break;
                };
                if tx.send(run_chunk(ctx, chunk)).is_err() {
                    break;
                }
            });
        }
        drop(tx);
        rx.iter().collect()
    });

    let mut failure: Option<DownloadError> = None;
    let mut range_ignored = false;
    let mut interrupted = false;
    for report in reports {
        match report.outcome {
            WorkerOutcome::Completed => {}
            WorkerOutcome::Interrupted(why) => {
                tracing::debug!(chunk = report.chunk.id, position = report.chunk.position, ?why, "chunk interrupted");
                interrupted = true;
            }
            WorkerOutcome::RangeIgnored => range_ignored = true,
            WorkerOutcome::Failed(e) => {
                // The first failure is the cause; later ones were stopped by it.
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }
        done.push(report.chunk);
    }
    done.sort_by_key(|c| c.id);
    *chunks = done;

    if let Some(e) = failure {
        return Err(e);
    }
    if (interrupted || range_ignored) && ctx.cancel.is_cancelled() {
        return Ok(RunOutcome::Cancelled);
    }
    if range_ignored {
        return Ok(RunOutcome::RangeUnsupported);
    }
    if interrupted {
        return Ok(RunOutcome::Cancelled);
    }
    Ok(RunOutcome::Completed)
}
