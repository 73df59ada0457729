//! Row-range planning for chunked transfers.

use std::ops::Range;

use crate::error::{HpccError, HpccResult};

/// A contiguous, half-open row range `[start, start + row_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in its plan.
    pub index: usize,
    pub start: usize,
    pub row_count: usize,
}

impl Chunk {
    /// One past the last row of the chunk.
    pub fn end(&self) -> usize {
        self.start + self.row_count
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Ordered, non-overlapping chunks covering `[0, total_rows)` exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    chunks: Vec<Chunk>,
}

impl ChunkPlan {
    /// Split `total_rows` rows into chunks of `chunk_size` rows; the last chunk holds the remainder.
    pub fn new(total_rows: usize, chunk_size: usize) -> HpccResult<Self> {
        if chunk_size == 0 {
            return Err(HpccError::invalid_input("chunk_size must be > 0"));
        }

        let mut chunks = Vec::with_capacity(total_rows.div_ceil(chunk_size));
        let mut start = 0usize;
        while start < total_rows {
            let end = (start + chunk_size).min(total_rows);
            chunks.push(Chunk {
                index: chunks.len(),
                start,
                row_count: end - start,
            });
            start = end;
        }

        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// `(start, row_count)` pairs in plan order.
    pub fn bounds(&self) -> Vec<(usize, usize)> {
        self.chunks.iter().map(|c| (c.start, c.row_count)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkPlan;

    #[test]
    fn splits_with_short_tail() {
        let plan = ChunkPlan::new(25, 10).unwrap();
        assert_eq!(plan.bounds(), vec![(0, 10), (10, 10), (20, 5)]);
        assert_eq!(plan.chunks()[2].end(), 25);
    }

    #[test]
    fn small_and_empty_inputs() {
        assert!(ChunkPlan::new(0, 10).unwrap().is_empty());
        assert_eq!(ChunkPlan::new(3, 10).unwrap().bounds(), vec![(0, 3)]);
        assert_eq!(ChunkPlan::new(10, 10).unwrap().bounds(), vec![(0, 10)]);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = ChunkPlan::new(5, 0).unwrap_err();
        assert!(err.to_string().contains("chunk_size must be > 0"));
    }

    #[test]
    fn plans_cover_every_row_exactly_once() {
        for total in 0..120usize {
            for chunk_size in 1..25usize {
                let plan = ChunkPlan::new(total, chunk_size).unwrap();
                assert_eq!(plan.len(), total.div_ceil(chunk_size), "total={total} size={chunk_size}");

                let mut next = 0usize;
                for (idx, chunk) in plan.chunks().iter().enumerate() {
                    assert_eq!(chunk.index, idx);
                    assert_eq!(chunk.start, next, "gap or overlap at chunk {idx}");
                    assert!(chunk.row_count > 0 && chunk.row_count <= chunk_size);
                    next = chunk.end();
                }
                assert_eq!(next, total);
            }
        }
    }
}
