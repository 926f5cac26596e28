// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chunking and bounding helpers for bulk operations.
//!
//! Bulk list/clear operations scan keys in server-sized batches, then
//! regroup them into fixed-size chunks so MGET/UNLINK calls stay bounded
//! regardless of how many keys match.
//!
//! # Example
//!
//! ```
//! use redis_repository::chunk::{chunked, Rebatcher};
//!
//! let chunks: Vec<&[i32]> = chunked(&[1, 2, 3, 4, 5], 2).collect();
//! assert_eq!(chunks, vec![&[1, 2][..], &[3, 4], &[5]]);
//!
//! let mut batcher = Rebatcher::new(3);
//! assert!(batcher.push(vec![1, 2]).is_empty());
//! assert_eq!(batcher.push(vec![3, 4]), vec![vec![1, 2, 3]]);
//! assert_eq!(batcher.flush(), Some(vec![4]));
//! ```

/// Split a slice into consecutive chunks of up to `chunk_size` items,
/// preserving order. Yields ⌈N/S⌉ chunks; only the last may be short.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
pub fn chunked<T>(items: &[T], chunk_size: usize) -> impl Iterator<Item = &[T]> {
    assert!(chunk_size > 0, "chunk_size must be greater than zero");
    items.chunks(chunk_size)
}

/// Regroups variably sized input batches into exact fixed-size chunks.
///
/// A cursor scan returns batches whose size the server chooses; bulk
/// operations need batches of an exact size. `push` buffers items and
/// returns every chunk that filled up; `flush` drains the remainder.
#[derive(Debug)]
pub struct Rebatcher<T> {
    size: usize,
    buf: Vec<T>,
}

impl<T> Rebatcher<T> {
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "batch size must be greater than zero");
        Self {
            size,
            buf: Vec::with_capacity(size),
        }
    }

    /// Add items, returning every chunk that reached the configured size.
    pub fn push(&mut self, items: impl IntoIterator<Item = T>) -> Vec<Vec<T>> {
        let mut full = Vec::new();
        for item in items {
            self.buf.push(item);
            if self.buf.len() == self.size {
                full.push(std::mem::replace(&mut self.buf, Vec::with_capacity(self.size)));
            }
        }
        full
    }

    /// Drain the trailing partial chunk, if any.
    pub fn flush(&mut self) -> Option<Vec<T>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }
}

/// Bound a produced sequence to at most `limit` items; `None` keeps all.
pub fn take_up_to<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(n) = limit {
        items.truncate(n);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_splits_evenly() {
        let items: Vec<u32> = (0..9).collect();
        let chunks: Vec<&[u32]> = chunked(&items, 3).collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn chunked_last_chunk_may_be_short() {
        let items: Vec<u32> = (0..10).collect();
        let chunks: Vec<&[u32]> = chunked(&items, 4).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], &[8, 9]);
    }

    #[test]
    fn chunked_preserves_order() {
        let items: Vec<u32> = (0..100).collect();
        let rejoined: Vec<u32> = chunked(&items, 7).flatten().copied().collect();
        assert_eq!(rejoined, items);
    }

    #[test]
    fn chunked_empty_input_yields_nothing() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(chunked(&items, 5).count(), 0);
    }

    #[test]
    #[should_panic(expected = "chunk_size must be greater than zero")]
    fn chunked_rejects_zero_size() {
        let _ = chunked(&[1, 2, 3], 0);
    }

    #[test]
    fn rebatcher_emits_exact_chunks() {
        let mut batcher = Rebatcher::new(4);
        // Uneven input batches, as a scan would produce.
        assert!(batcher.push(vec![1, 2, 3]).is_empty());
        assert_eq!(batcher.push(vec![4, 5]), vec![vec![1, 2, 3, 4]]);
        let chunks = batcher.push(vec![6, 7, 8, 9, 10, 11]);
        assert_eq!(chunks, vec![vec![5, 6, 7, 8]]);
        assert_eq!(batcher.len(), 3);
        assert_eq!(batcher.flush(), Some(vec![9, 10, 11]));
        assert!(batcher.is_empty());
    }

    #[test]
    fn rebatcher_flush_on_empty_is_none() {
        let mut batcher: Rebatcher<u32> = Rebatcher::new(2);
        assert_eq!(batcher.flush(), None);
    }

    #[test]
    #[should_panic(expected = "batch size must be greater than zero")]
    fn rebatcher_rejects_zero_size() {
        let _: Rebatcher<u32> = Rebatcher::new(0);
    }

    #[test]
    fn take_up_to_bounds() {
        assert_eq!(take_up_to(vec![1, 2, 3, 4], Some(2)), vec![1, 2]);
        assert_eq!(take_up_to(vec![1, 2], Some(10)), vec![1, 2]);
        assert_eq!(take_up_to(vec![1, 2, 3], None), vec![1, 2, 3]);
        assert!(take_up_to(vec![1, 2, 3], Some(0)).is_empty());
    }
}
