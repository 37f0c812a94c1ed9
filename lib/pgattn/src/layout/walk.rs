// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::ops::Range;

use super::{BlockAddressContext, PerBatchInfo};
use crate::kernel::TileShape;
use crate::params::{CacheRole, Strides};

/// Which key blocks each compute unit owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSchedule {
    tile: TileShape,
    seqlen_k: usize,
    num_splits: usize,
    is_causal: bool,
}

impl BlockSchedule {
    /// `seqlen_k` is the launch-wide key length used to size the splits.
    pub fn new(tile: TileShape, seqlen_k: usize, num_splits: usize, is_causal: bool) -> Self {
        Self {
            tile,
            seqlen_k,
            num_splits: num_splits.max(1),
            is_causal,
        }
    }

    pub fn tile(&self) -> TileShape {
        self.tile
    }

    pub fn num_splits(&self) -> usize {
        self.num_splits
    }

    pub fn blocks_per_split(&self) -> usize {
        self.seqlen_k
            .div_ceil(self.tile.block_n)
            .div_ceil(self.num_splits)
    }

    /// Number of query tiles needed to cover `seqlen_q` rows.
    pub fn num_m_blocks(&self, seqlen_q: usize) -> usize {
        seqlen_q.div_ceil(self.tile.block_m)
    }

    /// Logical key blocks `[min, max)` for query tile `m_block` and split `split`.
    ///
    /// Empty when the query tile lies past the end of the sequence, or when the
    /// causal bound or the split leave nothing to do.
    pub fn range(&self, info: &PerBatchInfo, m_block: usize, split: usize) -> Range<usize> {
        if m_block * self.tile.block_m >= info.actual_seqlen_q() {
            return 0..0;
        }

        let per_split = self.blocks_per_split();
        let n_block_min = split * per_split;
        let mut n_block_max = info
            .actual_seqlen_k()
            .div_ceil(self.tile.block_n)
            .min((split + 1) * per_split);

        if self.is_causal {
            let visible = ((m_block + 1) * self.tile.block_m) as i64
                + info.actual_seqlen_k() as i64
                - info.actual_seqlen_q() as i64;
            let causal_max = if visible <= 0 {
                0
            } else {
                (visible as usize).div_ceil(self.tile.block_n)
            };
            n_block_max = n_block_max.min(causal_max);
        }

        if n_block_max <= n_block_min {
            0..0
        } else {
            n_block_min..n_block_max
        }
    }
}

/// Backward walk over a unit's key blocks.
///
/// Yields `(logical_block, offset)` from the newest block of the range down to
/// the oldest. Only the first offset is computed directly; every later one is
/// reached by adding the advance delta of the block just visited, the same way
/// a kernel moves its tile pointer.
#[derive(Debug, Clone)]
pub struct KeyBlockWalk<'c, 'a> {
    ctx: &'c BlockAddressContext<'a>,
    row_stride: i64,
    block_rows: usize,
    first: usize,
    next: Option<(usize, i64)>,
}

impl<'c, 'a> KeyBlockWalk<'c, 'a> {
    /// `head_offset` is added to every yielded offset, typically `kv_head * head_stride`.
    pub fn new<R: CacheRole>(
        ctx: &'c BlockAddressContext<'a>,
        strides: &Strides<R>,
        head_offset: i64,
        blocks: Range<usize>,
        block_rows: usize,
    ) -> Self {
        let next = if blocks.is_empty() {
            None
        } else {
            let last = blocks.end - 1;
            Some((last, ctx.key_offset_paged(strides, last, block_rows) + head_offset))
        };
        Self {
            ctx,
            row_stride: strides.row(),
            block_rows,
            first: blocks.start,
            next,
        }
    }
}

impl Iterator for KeyBlockWalk<'_, '_> {
    type Item = (usize, i64);

    fn next(&mut self) -> Option<Self::Item> {
        let (block, offset) = self.next?;
        self.next = if block > self.first {
            let delta = self
                .ctx
                .key_advance_paged(block, self.row_stride, self.block_rows);
            Some((block - 1, offset + delta))
        } else {
            None
        };
        Some((block, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.next.map_or(0, |(block, _)| block + 1 - self.first);
        (len, Some(len))
    }
}

impl ExactSizeIterator for KeyBlockWalk<'_, '_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BlockTable, Key, Strides};
    use crate::LaunchParams;
    use rstest::rstest;

    fn info(params: &LaunchParams) -> PerBatchInfo {
        crate::layout::SequenceLayoutResolver::resolve(params, 0)
    }

    fn params(seqlen_q: usize, seqlen_k: usize) -> LaunchParams {
        LaunchParams::builder()
            .batch_size(1)
            .num_heads(1)
            .num_heads_k(1)
            .head_dim(128)
            .seqlen_q(seqlen_q)
            .seqlen_k(seqlen_k)
            .q_strides(Strides::new(0, 128, 128))
            .k_strides(Strides::new(0, 128, 128))
            .v_strides(Strides::new(0, 128, 128))
            .build()
            .unwrap()
    }

    #[rstest]
    // 1000 keys in 128-row tiles -> 8 blocks; 3 splits of 3 blocks each
    #[case(1000, 3, 0, 0..3)]
    #[case(1000, 3, 1, 3..6)]
    #[case(1000, 3, 2, 6..8)]
    #[case(1000, 1, 0, 0..8)]
    #[case(100, 4, 1, 0..0)]
    fn test_split_ranges(
        #[case] seqlen_k: usize,
        #[case] num_splits: usize,
        #[case] split: usize,
        #[case] expected: Range<usize>,
    ) {
        let params = params(64, seqlen_k);
        let schedule = BlockSchedule::new(TileShape::for_variant(128, 0), seqlen_k, num_splits, false);
        assert_eq!(schedule.range(&info(&params), 0, split), expected);
    }

    #[rstest]
    // seqlen_q == seqlen_k: tile m sees keys up to (m + 1) * 64
    #[case(512, 512, 0, 0..1)]
    #[case(512, 512, 1, 0..1)]
    #[case(512, 512, 2, 0..2)]
    #[case(512, 512, 7, 0..4)]
    // decoding a single query against a long cache sees everything
    #[case(1, 1000, 0, 0..8)]
    // more queries than keys: the first tile has no visible key
    #[case(512, 32, 0, 0..0)]
    fn test_causal_ranges(
        #[case] seqlen_q: usize,
        #[case] seqlen_k: usize,
        #[case] m_block: usize,
        #[case] expected: Range<usize>,
    ) {
        let params = params(seqlen_q, seqlen_k);
        let schedule = BlockSchedule::new(TileShape::for_variant(128, 0), seqlen_k, 1, true);
        assert_eq!(schedule.range(&info(&params), m_block, 0), expected);
    }

    #[test]
    fn test_query_tile_past_end() {
        let params = params(64, 256);
        let schedule = BlockSchedule::new(TileShape::for_variant(128, 0), 256, 1, false);
        assert_eq!(schedule.num_m_blocks(64), 1);
        assert!(schedule.range(&info(&params), 1, 0).is_empty());
    }

    #[test]
    fn test_walk_strided() {
        let params = params(1, 384);
        let ctx = BlockAddressContext::new(&params, 0);
        let strides = Strides::<Key>::new(0, 128, 128);
        let walk = KeyBlockWalk::new(&ctx, &strides, 0, 0..3, 128);
        assert_eq!(walk.len(), 3);
        let visited: Vec<_> = walk.collect();
        assert_eq!(
            visited,
            vec![(2, 2 * 128 * 128), (1, 128 * 128), (0, 0)]
        );
    }

    #[test]
    fn test_walk_paged_stops_at_range_start() {
        let table = BlockTable::from_rows([vec![3, 1, 7, 4]], 64, 4096);
        let params = LaunchParams::builder()
            .batch_size(1)
            .num_heads(2)
            .num_heads_k(2)
            .head_dim(64)
            .seqlen_q(1)
            .seqlen_k(256)
            .q_strides(Strides::new(0, 128, 64))
            .k_strides(Strides::new(0, 128, 64))
            .v_strides(Strides::new(0, 128, 64))
            .block_table(table)
            .build()
            .unwrap();
        let ctx = BlockAddressContext::new(&params, 0);
        let strides = Strides::<Key>::new(0, 128, 64);

        let visited: Vec<_> = KeyBlockWalk::new(&ctx, &strides, 64, 1..4, 64).collect();
        assert_eq!(
            visited,
            vec![(3, 4 * 4096 + 64), (2, 7 * 4096 + 64), (1, 4096 + 64)]
        );
    }

    #[test]
    fn test_walk_empty() {
        let params = params(1, 0);
        let ctx = BlockAddressContext::new(&params, 0);
        let strides = Strides::<Key>::new(0, 128, 128);
        assert_eq!(KeyBlockWalk::new(&ctx, &strides, 0, 0..0, 128).count(), 0);
    }
}
