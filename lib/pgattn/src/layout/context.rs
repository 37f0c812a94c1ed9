// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use super::{PageTableTranslator, PerBatchInfo, SequenceLayoutResolver};
use crate::params::{CacheRole, Query, Strides};
use crate::LaunchParams;

/// Address queries for one compute unit of one batch element.
///
/// Built once at unit start and passed by reference to everything that needs
/// an address; it holds no mutable state.
#[derive(Debug, Clone, Copy)]
pub struct BlockAddressContext<'a> {
    batch: usize,
    info: PerBatchInfo,
    translator: PageTableTranslator<'a>,
}

impl<'a> BlockAddressContext<'a> {
    pub fn new(params: &'a LaunchParams, batch: usize) -> Self {
        let info = SequenceLayoutResolver::resolve(params, batch);
        let translator = PageTableTranslator::new(params, &info, batch);
        Self {
            batch,
            info,
            translator,
        }
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn info(&self) -> &PerBatchInfo {
        &self.info
    }

    /// First query row of this batch element.
    #[inline]
    pub fn query_offset(&self, strides: &Strides<Query>) -> i64 {
        match self.info.query_start() {
            Some(start) => start as i64 * strides.row(),
            None => self.batch as i64 * strides.batch(),
        }
    }

    /// First key row under strided addressing.
    #[inline]
    pub fn key_offset<R: CacheRole>(&self, strides: &Strides<R>) -> i64 {
        self.translator.strided_base(strides)
    }

    #[inline]
    pub fn key_offset_paged<R: CacheRole>(
        &self,
        strides: &Strides<R>,
        logical_block: usize,
        block_rows: usize,
    ) -> i64 {
        self.translator
            .physical_offset(strides, logical_block, block_rows)
    }

    #[inline]
    pub fn key_advance_paged(&self, current_block: usize, row_stride: i64, block_rows: usize) -> i64 {
        self.translator
            .advance_delta(current_block, row_stride, block_rows)
    }
}
