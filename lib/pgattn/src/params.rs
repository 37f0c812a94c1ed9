// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Launch parameters handed in by the cache manager.
//!
//! Everything in this module is read-only for the duration of a launch. The
//! address resolvers in [`crate::layout`] borrow a [`LaunchParams`] and never
//! mutate it, so any number of compute units may share one instance.

use std::marker::PhantomData;

use derive_builder::Builder;
use derive_getters::Getters;
use validator::Validate;

use crate::kernel::ElementKind;
use crate::{Error, Result};

mod sealed {
    pub trait Sealed {}
}

/// Marker for the tensor a set of strides belongs to.
///
/// Query and key tensors have unrelated strides; tagging [`Strides`] with the
/// role turns a swapped argument into a type error.
pub trait TensorRole:
    sealed::Sealed + Copy + Default + std::fmt::Debug + PartialEq + Eq + Send + Sync + 'static
{
}

/// Roles whose rows may live in the key/value cache, strided or paged.
pub trait CacheRole: TensorRole {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Query;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Key;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Value;

impl sealed::Sealed for Query {}
impl sealed::Sealed for Key {}
impl sealed::Sealed for Value {}

impl TensorRole for Query {}
impl TensorRole for Key {}
impl TensorRole for Value {}

impl CacheRole for Key {}
impl CacheRole for Value {}

/// Element strides of a `[batch, seqlen, heads, head_dim]` tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strides<R: TensorRole> {
    batch: i64,
    row: i64,
    head: i64,
    _role: PhantomData<R>,
}

impl<R: TensorRole> Strides<R> {
    pub fn new(batch: i64, row: i64, head: i64) -> Self {
        Self {
            batch,
            row,
            head,
            _role: PhantomData,
        }
    }

    /// Strides of a densely packed `[batch, seqlen, num_heads, head_dim]` tensor.
    pub fn contiguous(seqlen: usize, num_heads: usize, head_dim: usize) -> Self {
        let head = head_dim as i64;
        let row = num_heads as i64 * head;
        Self::new(seqlen as i64 * row, row, head)
    }

    pub fn batch(&self) -> i64 {
        self.batch
    }

    pub fn row(&self) -> i64 {
        self.row
    }

    pub fn head(&self) -> i64 {
        self.head
    }
}

/// Logical-to-physical block mapping for a paged key/value cache.
///
/// One row per batch element, `batch_stride` entries per row. Entry `j` of row
/// `b` is the physical block holding rows `[j * page_block_size, (j + 1) *
/// page_block_size)` of sequence `b`. Construction and eviction belong to the
/// cache manager; this type only reads.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct BlockTable {
    #[getter(skip)]
    entries: Vec<u32>,

    #[getter(copy)]
    batch_stride: usize,

    #[getter(copy)]
    page_block_size: usize,

    /// Elements occupied by one physical block
    #[getter(copy)]
    cache_block_stride: i64,

    /// Physical block count, when the caller knows it; enables the range check
    #[getter(copy)]
    num_cache_blocks: Option<usize>,
}

impl BlockTable {
    pub fn new(
        entries: Vec<u32>,
        batch_stride: usize,
        page_block_size: usize,
        cache_block_stride: i64,
    ) -> Self {
        Self {
            entries,
            batch_stride,
            page_block_size,
            cache_block_stride,
            num_cache_blocks: None,
        }
    }

    /// Builds a table from ragged rows. Short rows are padded with block 0,
    /// which is never read for valid sequence lengths.
    pub fn from_rows<I, R>(rows: I, page_block_size: usize, cache_block_stride: i64) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u32]>,
    {
        let rows: Vec<R> = rows.into_iter().collect();
        let batch_stride = rows
            .iter()
            .map(|row| row.as_ref().len())
            .max()
            .unwrap_or(0);

        let mut entries = Vec::with_capacity(rows.len() * batch_stride);
        for row in &rows {
            let row = row.as_ref();
            entries.extend_from_slice(row);
            entries.resize(entries.len() + batch_stride - row.len(), 0);
        }

        Self::new(entries, batch_stride, page_block_size, cache_block_stride)
    }

    pub fn with_num_cache_blocks(mut self, num_cache_blocks: usize) -> Self {
        self.num_cache_blocks = Some(num_cache_blocks);
        self
    }

    /// Physical block id of `logical_block` in sequence `batch`.
    #[inline]
    pub fn entry(&self, batch: usize, logical_block: usize) -> u32 {
        self.entries[batch * self.batch_stride + logical_block]
    }

    pub fn row(&self, batch: usize) -> &[u32] {
        let start = batch * self.batch_stride;
        &self.entries[start..start + self.batch_stride]
    }

    pub fn num_rows(&self) -> usize {
        if self.batch_stride == 0 {
            0
        } else {
            self.entries.len() / self.batch_stride
        }
    }
}

/// Everything a launch needs to locate the query, key and value rows of every
/// compute unit.
///
/// The two key-length encodings are separate fields: `cu_seqlens_k` carries
/// cumulative offsets into a packed key buffer, `cache_seqlens_k` carries the
/// per-batch number of cached keys. At most one of them may be set.
#[derive(Debug, Clone, Builder, Validate, Getters)]
#[builder(
    pattern = "owned",
    build_fn(private, name = "build_internal", error = "crate::Error")
)]
pub struct LaunchParams {
    #[validate(range(min = 1))]
    #[getter(copy)]
    batch_size: usize,

    /// Trailing batch entries past this index are padding and are skipped.
    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    actual_batch_size: Option<usize>,

    #[validate(range(min = 1))]
    #[getter(copy)]
    num_heads: usize,

    #[validate(range(min = 1))]
    #[getter(copy)]
    num_heads_k: usize,

    #[validate(range(min = 1))]
    #[getter(copy)]
    head_dim: usize,

    #[builder(default)]
    #[getter(copy)]
    element: ElementKind,

    #[getter(copy)]
    seqlen_q: usize,

    #[getter(copy)]
    seqlen_k: usize,

    /// Keys appended in this launch on top of the cached ones.
    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    seqlen_knew: Option<usize>,

    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    cu_seqlens_q: Option<Vec<u32>>,

    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    cu_seqlens_k: Option<Vec<u32>>,

    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    cache_seqlens_k: Option<Vec<u32>>,

    /// Batch `b` reads its strided keys from cache batch `cache_batch_idx[b]`.
    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    cache_batch_idx: Option<Vec<u32>>,

    /// Batch dimension of the key/value cache; defaults to `batch_size`.
    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    cache_batch_size: Option<usize>,

    #[builder(default, setter(strip_option))]
    #[getter(skip)]
    block_table: Option<BlockTable>,

    q_strides: Strides<Query>,

    k_strides: Strides<Key>,

    v_strides: Strides<Value>,

    #[builder(default = "false")]
    #[getter(copy)]
    is_causal: bool,

    /// Split-KV partitions per unit; 0 picks one with the occupancy heuristic.
    #[builder(default = "0")]
    #[validate(range(max = 256))]
    #[getter(copy)]
    num_splits: usize,
}

impl LaunchParamsBuilder {
    pub fn build(self) -> Result<LaunchParams> {
        let params = self.build_internal()?;
        params.validate()?;

        if params.cu_seqlens_k.is_some() && params.cache_seqlens_k.is_some() {
            return Err(Error::invalid_layout(
                "cu_seqlens_k and cache_seqlens_k are mutually exclusive",
            ));
        }

        Ok(params)
    }
}

impl LaunchParams {
    pub fn builder() -> LaunchParamsBuilder {
        LaunchParamsBuilder::default()
    }

    /// False when key lengths come from `cache_seqlens_k` rather than a cumulative array.
    pub fn is_seqlens_k_cumulative(&self) -> bool {
        self.cache_seqlens_k.is_none()
    }

    /// Number of batch entries that carry real sequences.
    pub fn active_batch_size(&self) -> usize {
        self.actual_batch_size
            .map_or(self.batch_size, |n| n.min(self.batch_size))
    }

    pub fn actual_batch_size(&self) -> Option<usize> {
        self.actual_batch_size
    }

    pub fn seqlen_knew(&self) -> usize {
        self.seqlen_knew.unwrap_or(0)
    }

    pub fn cu_seqlens_q(&self) -> Option<&[u32]> {
        self.cu_seqlens_q.as_deref()
    }

    pub fn cu_seqlens_k(&self) -> Option<&[u32]> {
        self.cu_seqlens_k.as_deref()
    }

    pub fn cache_seqlens_k(&self) -> Option<&[u32]> {
        self.cache_seqlens_k.as_deref()
    }

    pub fn cache_batch_idx(&self) -> Option<&[u32]> {
        self.cache_batch_idx.as_deref()
    }

    pub fn cache_batch_size(&self) -> usize {
        self.cache_batch_size.unwrap_or(self.batch_size)
    }

    pub fn block_table(&self) -> Option<&BlockTable> {
        self.block_table.as_ref()
    }

    pub fn is_paged(&self) -> bool {
        self.block_table.is_some()
    }

    /// Query heads sharing one key/value head.
    pub fn head_group_size(&self) -> usize {
        self.num_heads / self.num_heads_k.max(1)
    }

    /// Key/value head read by query head `head`.
    pub fn kv_head(&self, head: usize) -> usize {
        head / self.head_group_size().max(1)
    }

    /// Cache batch holding the strided keys of `batch`.
    pub fn cache_batch(&self, batch: usize) -> usize {
        self.cache_batch_idx
            .as_ref()
            .map_or(batch, |idx| idx[batch] as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LaunchParamsBuilder {
        LaunchParams::builder()
            .batch_size(2)
            .num_heads(8)
            .num_heads_k(2)
            .head_dim(64)
            .seqlen_q(16)
            .seqlen_k(128)
            .q_strides(Strides::contiguous(16, 8, 64))
            .k_strides(Strides::contiguous(128, 2, 64))
            .v_strides(Strides::contiguous(128, 2, 64))
    }

    #[test]
    fn test_contiguous_strides() {
        let s = Strides::<Query>::contiguous(16, 8, 64);
        assert_eq!(s.head(), 64);
        assert_eq!(s.row(), 512);
        assert_eq!(s.batch(), 16 * 512);
    }

    #[test]
    fn test_builder_defaults() {
        let params = base().build().unwrap();
        assert_eq!(params.element(), ElementKind::F16);
        assert_eq!(params.num_splits(), 0);
        assert_eq!(params.seqlen_knew(), 0);
        assert!(!params.is_causal());
        assert!(!params.is_paged());
        assert!(params.is_seqlens_k_cumulative());
        assert_eq!(params.active_batch_size(), 2);
        assert_eq!(params.head_group_size(), 4);
        assert_eq!(params.kv_head(5), 1);
    }

    #[test]
    fn test_missing_field_is_builder_error() {
        let err = LaunchParams::builder().batch_size(1).build().unwrap_err();
        assert!(matches!(err, Error::Builder(_)));
    }

    #[test]
    fn test_range_validation() {
        let err = base().batch_size(0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));

        let err = base().num_splits(1000).build().unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn test_key_length_encodings_are_exclusive() {
        let err = base()
            .cu_seqlens_k(vec![0, 10, 20])
            .cache_seqlens_k(vec![10, 10])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLayout { .. }));

        let params = base().cache_seqlens_k(vec![10, 10]).build().unwrap();
        assert!(!params.is_seqlens_k_cumulative());
    }

    #[test]
    fn test_block_table_from_rows_pads() {
        let table = BlockTable::from_rows([vec![3, 1, 7], vec![2]], 256, 4096);
        assert_eq!(table.batch_stride(), 3);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.row(0), &[3, 1, 7]);
        assert_eq!(table.row(1), &[2, 0, 0]);
        assert_eq!(table.entry(0, 2), 7);
        assert_eq!(table.num_cache_blocks(), None);
        assert_eq!(
            table.with_num_cache_blocks(8).num_cache_blocks(),
            Some(8)
        );
    }

    #[test]
    fn test_actual_batch_size_is_clamped() {
        let params = base().actual_batch_size(5).build().unwrap();
        assert_eq!(params.active_batch_size(), 2);
        assert_eq!(params.actual_batch_size(), Some(5));
    }
}
