// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use super::PerBatchInfo;
use crate::params::{BlockTable, CacheRole, Strides};
use crate::LaunchParams;

/// How key/value rows are located in storage.
///
/// Decided once per batch element; the block loop itself never branches on it
/// beyond the match in [`PageTableTranslator`].
#[derive(Debug, Clone, Copy)]
pub enum KeyAddressing<'a> {
    /// Rows follow the batch and row strides of the cache tensor.
    Strided,
    /// Every logical block is indirected through the table.
    Paged(&'a BlockTable),
}

impl<'a> KeyAddressing<'a> {
    pub fn from_params(params: &'a LaunchParams) -> Self {
        match params.block_table() {
            Some(table) => KeyAddressing::Paged(table),
            None => KeyAddressing::Strided,
        }
    }
}

/// Translates `(batch, logical block)` into element offsets of the key/value cache.
#[derive(Debug, Clone, Copy)]
pub struct PageTableTranslator<'a> {
    addressing: KeyAddressing<'a>,
    batch: usize,
    cache_batch: usize,
    key_start: Option<usize>,
}

impl<'a> PageTableTranslator<'a> {
    pub fn new(params: &'a LaunchParams, info: &PerBatchInfo, batch: usize) -> Self {
        Self {
            addressing: KeyAddressing::from_params(params),
            batch,
            cache_batch: params.cache_batch(batch),
            key_start: info.key_start(),
        }
    }

    pub fn addressing(&self) -> KeyAddressing<'a> {
        self.addressing
    }

    /// Offset of the first row of this batch's keys under strided addressing.
    #[inline]
    pub fn strided_base<R: CacheRole>(&self, strides: &Strides<R>) -> i64 {
        match self.key_start {
            Some(start) => start as i64 * strides.row(),
            None => self.cache_batch as i64 * strides.batch(),
        }
    }

    /// Offset of the first row of `logical_block`.
    ///
    /// With a block table the batch and row strides are ignored: the physical
    /// block id times the cache block stride is the whole answer.
    #[inline]
    pub fn physical_offset<R: CacheRole>(
        &self,
        strides: &Strides<R>,
        logical_block: usize,
        block_rows: usize,
    ) -> i64 {
        match self.addressing {
            KeyAddressing::Strided => {
                self.strided_base(strides) + (logical_block * block_rows) as i64 * strides.row()
            }
            KeyAddressing::Paged(table) => {
                table.entry(self.batch, logical_block) as i64 * table.cache_block_stride()
            }
        }
    }

    /// Signed step from `current_block` to `current_block - 1`.
    ///
    /// `current_block` must be at least 1 when paged.
    #[inline]
    pub fn advance_delta(&self, current_block: usize, row_stride: i64, block_rows: usize) -> i64 {
        match self.addressing {
            KeyAddressing::Strided => -(block_rows as i64) * row_stride,
            KeyAddressing::Paged(table) => {
                debug_assert!(current_block > 0, "cannot advance past logical block 0");
                let prev = table.entry(self.batch, current_block - 1) as i64;
                let cur = table.entry(self.batch, current_block) as i64;
                (prev - cur) * table.cache_block_stride()
            }
        }
    }
}
