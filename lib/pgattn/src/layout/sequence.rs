// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use derive_getters::Getters;

use crate::LaunchParams;

/// Sequence geometry of one batch element for one launch.
///
/// `query_start` / `key_start` are `None` when the tensor is laid out with a
/// fixed batch stride, and `Some(row)` when the sequence begins at `row` of a
/// packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct PerBatchInfo {
    #[getter(copy)]
    query_start: Option<usize>,

    #[getter(copy)]
    key_start: Option<usize>,

    #[getter(copy)]
    actual_seqlen_q: usize,

    /// Keys already resident in the cache
    #[getter(copy)]
    seqlen_k_cache: usize,

    /// Cached keys plus the keys appended by this launch
    #[getter(copy)]
    actual_seqlen_k: usize,
}

/// Decides fixed-length vs packed layout per batch element.
pub struct SequenceLayoutResolver;

impl SequenceLayoutResolver {
    pub fn resolve(params: &LaunchParams, batch: usize) -> PerBatchInfo {
        let (query_start, actual_seqlen_q) = match params.cu_seqlens_q() {
            Some(cu) => {
                let start = cu[batch] as usize;
                (Some(start), (cu[batch + 1] as usize).saturating_sub(start))
            }
            None => (None, params.seqlen_q()),
        };

        let (key_start, seqlen_k_cache) = match (params.cache_seqlens_k(), params.cu_seqlens_k()) {
            (Some(lengths), _) => (None, lengths[batch] as usize),
            (None, Some(cu)) => {
                let start = cu[batch] as usize;
                (Some(start), (cu[batch + 1] as usize).saturating_sub(start))
            }
            (None, None) => (None, params.seqlen_k()),
        };

        PerBatchInfo {
            query_start,
            key_start,
            actual_seqlen_q,
            seqlen_k_cache,
            actual_seqlen_k: seqlen_k_cache + params.seqlen_knew(),
        }
    }
}
