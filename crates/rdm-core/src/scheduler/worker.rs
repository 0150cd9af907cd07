//! One chunk worker: attempts, retries, and the curl transfer itself.

use std::cell::Cell;
use std::io::Write;
use std::str;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::{ChunkContext, Interruption};
use crate::chunk::{Chunk, ChunkState};
use crate::error::DownloadError;
use crate::fetch_head::status_code;
use crate::retry::{classify, ErrorKind, RetryDecision, TransferError};
use crate::storage::ChunkWriter;
use crate::throttle::{BudgetShare, ThrottledStream};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a worker finished with its chunk.
#[derive(Debug)]
pub(crate) enum WorkerOutcome {
    Completed,
    Interrupted(Interruption),
    /// The server answered a ranged GET with the whole body.
    RangeIgnored,
    Failed(DownloadError),
}

#[derive(Debug)]
pub(crate) struct WorkerReport {
    pub chunk: Chunk,
    pub outcome: WorkerOutcome,
}

/// How a single attempt ended without a transfer error.
enum AttemptEnd {
    /// Range fully delivered (or EOF for an open-ended chunk).
    Finished,
    Interrupted,
}

/// Download the rest of `chunk`, retrying transient failures from the
/// current cursor until it completes, the budget runs out, or the session
/// is interrupted.
pub(crate) fn run_chunk(ctx: &ChunkContext<'_>, mut chunk: Chunk) -> WorkerReport {
    let share = ctx.budget.join();
    let mut writer = ThrottledStream::with_limit(ctx.storage.writer(&chunk), share.limit())
        .interruptible_by(ctx.cancel.clone())
        .interruptible_by(ctx.stop.clone());
    debug!(chunk = chunk.id, start = chunk.start, end = ?chunk.end, position = chunk.position, "chunk worker started");

    loop {
        if let Some(why) = ctx.interruption() {
            if chunk.state() != ChunkState::Pending {
                chunk.transition(ChunkState::Pending);
            }
            return WorkerReport {
                chunk,
                outcome: WorkerOutcome::Interrupted(why),
            };
        }

        // Without range support every attempt is a fresh GET of the whole body.
        if !ctx.supports_range && chunk.position != chunk.start {
            ctx.tracker.discard(chunk.received());
            chunk.rewind();
        }
        writer.get_mut().seek(chunk.position);
        chunk.transition(ChunkState::InProgress);

        let err = match attempt(ctx, &mut chunk, &mut writer, &share) {
            Ok(AttemptEnd::Finished) => {
                chunk.transition(ChunkState::Completed);
                debug!(chunk = chunk.id, bytes = chunk.received(), "chunk complete");
                return WorkerReport {
                    chunk,
                    outcome: WorkerOutcome::Completed,
                };
            }
            Ok(AttemptEnd::Interrupted) => continue,
            Err(e) => e,
        };

        match err {
            TransferError::RangeIgnored => {
                warn!(chunk = chunk.id, "server ignored Range header");
                chunk.transition(ChunkState::Aborted);
                ctx.stop_others();
                return WorkerReport {
                    chunk,
                    outcome: WorkerOutcome::RangeIgnored,
                };
            }
            TransferError::Storage(e) => {
                error!(chunk = chunk.id, error = %e, "storage write failed");
                chunk.transition(ChunkState::Aborted);
                ctx.stop_others();
                return WorkerReport {
                    chunk,
                    outcome: WorkerOutcome::Failed(DownloadError::StorageWrite(e)),
                };
            }
            err => {
                let kind = classify(&err);
                match ctx.policy.decide(chunk.retries_used, kind) {
                    RetryDecision::RetryAfter(delay) => {
                        chunk.retries_used += 1;
                        chunk.transition(ChunkState::Retrying);
                        warn!(
                            chunk = chunk.id,
                            retry = chunk.retries_used,
                            position = chunk.position,
                            ?delay,
                            error = %err,
                            "chunk attempt failed, retrying"
                        );
                        ctx.sleep(delay);
                    }
                    RetryDecision::NoRetry => {
                        chunk.transition(ChunkState::Aborted);
                        ctx.stop_others();
                        let failure = if kind == ErrorKind::Other {
                            DownloadError::ChunkFailed {
                                chunk: chunk.id,
                                source: err,
                            }
                        } else {
                            DownloadError::RetryExhausted {
                                chunk: chunk.id,
                                retries: chunk.retries_used,
                                source: err,
                            }
                        };
                        error!(chunk = chunk.id, error = %failure.chain(), "chunk aborted");
                        return WorkerReport {
                            chunk,
                            outcome: WorkerOutcome::Failed(failure),
                        };
                    }
                }
            }
        }
    }
}

/// One GET for the chunk's remaining range. Advances `chunk.position` for
/// every block that reaches storage, so on any error the cursor is exactly
/// where the next attempt must resume.
fn attempt(
    ctx: &ChunkContext<'_>,
    chunk: &mut Chunk,
    writer: &mut ThrottledStream<ChunkWriter<'_>>,
    share: &BudgetShare<'_>,
) -> Result<AttemptEnd, TransferError> {
    let read_timeout = ctx.config.read_timeout();
    let block = ctx.config.buffer_block_size;
    let range = if ctx.supports_range {
        chunk.curl_range()
    } else {
        None
    };
    // A 200 to a range that covers the whole resource is still the right body.
    let whole_resource = chunk.position == 0 && chunk.end.map(|e| e + 1) == ctx.total_size;

    let mut easy = curl::easy::Easy::new();
    easy.url(ctx.url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.buffer_size(block)?;
    easy.progress(true)?;
    if let Some(range) = &range {
        easy.range(range)?;
    }

    let status = Cell::new(0u32);
    let last_data = Cell::new(Instant::now());
    let timed_out = Cell::new(false);
    let interrupted = Cell::new(false);
    let mut failure: Option<TransferError> = None;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(code) = str::from_utf8(line).ok().and_then(status_code) {
                status.set(code);
            }
            true
        })?;
        transfer.write_function(|data| {
            last_data.set(Instant::now());
            let code = status.get();
            if !(200..300).contains(&code) {
                failure = Some(TransferError::Http(code));
                return Ok(0);
            }
            if range.is_some() && code == 200 && !whole_resource {
                failure = Some(TransferError::RangeIgnored);
                return Ok(0);
            }
            for piece in data.chunks(block) {
                if ctx.is_interrupted() {
                    interrupted.set(true);
                    return Ok(0);
                }
                let take = match chunk.remaining() {
                    Some(left) => left.min(piece.len() as u64) as usize,
                    None => piece.len(),
                };
                if take == 0 {
                    break;
                }
                let piece = &piece[..take];
                writer.set_bandwidth_limit(share.limit());
                if let Err(e) = writer.write_all(piece) {
                    failure = Some(TransferError::Storage(e));
                    return Ok(0);
                }
                chunk.position += take as u64;
                ctx.tracker.record(chunk.id, chunk.position, piece);
            }
            last_data.set(Instant::now());
            Ok(data.len())
        })?;
        transfer.progress_function(|_, _, _, _| {
            if ctx.is_interrupted() {
                interrupted.set(true);
                return false;
            }
            if last_data.get().elapsed() >= read_timeout {
                timed_out.set(true);
                return false;
            }
            true
        })?;
        transfer.perform()
    };

    if let Some(e) = failure {
        return Err(e);
    }
    if interrupted.get() {
        return Ok(AttemptEnd::Interrupted);
    }
    if timed_out.get() && !chunk.is_complete() {
        return Err(TransferError::ReadTimeout(read_timeout));
    }
    if let Err(e) = performed {
        if !chunk.is_complete() {
            return Err(e.into());
        }
    }
    let code = match status.get() {
        0 => easy.response_code()?,
        code => code,
    };
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }
    match chunk.end {
        Some(end) if !chunk.is_complete() => Err(TransferError::PartialTransfer {
            expected: end + 1 - chunk.start,
            received: chunk.received(),
        }),
        _ => Ok(AttemptEnd::Finished),
    }
}
