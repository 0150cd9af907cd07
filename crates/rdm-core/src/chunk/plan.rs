//! Splitting a resource into chunks.

use super::Chunk;

/// Splits `[0, total_size)` into `chunk_count` contiguous, non-overlapping
/// chunks of equal size; the remainder of the integer division goes to the
/// last chunk.
///
/// `chunk_count` is clamped to `[1, total_size]` so no chunk is empty.
/// Returns an empty vec when `total_size` is 0.
pub fn plan_chunks(total_size: u64, chunk_count: usize) -> Vec<Chunk> {
    if total_size == 0 {
        return Vec::new();
    }
    let count = (chunk_count.max(1) as u64).min(total_size);
    let base = total_size / count;

    (0..count)
        .map(|i| {
            let start = i * base;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                start + base - 1
            };
            Chunk::new(i as usize, start, end)
        })
        .collect()
}

/// One chunk for the whole resource: `[0, size)` when the size is known,
/// open-ended otherwise. Empty for a zero-length resource.
pub fn single_chunk(total_size: Option<u64>) -> Vec<Chunk> {
    match total_size {
        Some(size) => plan_chunks(size, 1),
        None => vec![Chunk::open_ended(0, 0)],
    }
}
