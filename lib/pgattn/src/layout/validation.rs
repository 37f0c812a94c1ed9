// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Once-per-launch checks of the caller-supplied layout.
//!
//! The address queries index the cumulative arrays and the block table without
//! bounds reasoning of their own. Running [`validate_layout`] before a launch
//! guarantees none of those indices can fall outside the arrays, that every
//! sequence fits the launch-wide `seqlen_q` / `seqlen_k` the grid is sized by,
//! and that every physical block id stays below the known block count.

use super::SequenceLayoutResolver;
use crate::{Error, LaunchParams, Result};

pub fn validate_layout(params: &LaunchParams) -> Result<()> {
    let num_batches = params.active_batch_size();

    if params.num_heads() % params.num_heads_k() != 0 {
        return Err(Error::invalid_layout(format!(
            "num_heads ({}) is not a multiple of num_heads_k ({})",
            params.num_heads(),
            params.num_heads_k()
        )));
    }

    if let Some(cu) = params.cu_seqlens_q() {
        validate_cumulative("cu_seqlens_q", cu, num_batches)?;
    }
    if let Some(cu) = params.cu_seqlens_k() {
        validate_cumulative("cu_seqlens_k", cu, num_batches)?;
    }
    if let Some(lengths) = params.cache_seqlens_k() {
        require_len("cache_seqlens_k", lengths.len(), num_batches)?;
    }

    if let Some(idx) = params.cache_batch_idx() {
        require_len("cache_batch_idx", idx.len(), num_batches)?;
        let cache_batches = params.cache_batch_size();
        if let Some((b, &cache_batch)) = idx[..num_batches]
            .iter()
            .enumerate()
            .find(|&(_, &c)| c as usize >= cache_batches)
        {
            return Err(Error::invalid_layout(format!(
                "cache_batch_idx[{b}] = {cache_batch} is out of range for {cache_batches} cache batches"
            )));
        }
    }

    let table = params.block_table();
    if let Some(table) = table
        && table.page_block_size() == 0
    {
        return Err(Error::invalid_layout("block table page size is zero"));
    }

    for b in 0..num_batches {
        let info = SequenceLayoutResolver::resolve(params, b);
        if info.actual_seqlen_q() > params.seqlen_q() {
            return Err(Error::invalid_layout(format!(
                "batch {b} has {} queries, more than seqlen_q ({})",
                info.actual_seqlen_q(),
                params.seqlen_q()
            )));
        }
        if info.actual_seqlen_k() > params.seqlen_k() {
            return Err(Error::invalid_layout(format!(
                "batch {b} has {} keys, more than seqlen_k ({})",
                info.actual_seqlen_k(),
                params.seqlen_k()
            )));
        }

        let Some(table) = table else {
            continue;
        };

        let needed = info.actual_seqlen_k().div_ceil(table.page_block_size());
        if needed == 0 {
            continue;
        }
        if b >= table.num_rows() {
            return Err(Error::invalid_layout(format!(
                "block table rows end at {}, batch {b} needs {needed} blocks",
                table.num_rows()
            )));
        }
        if needed > table.batch_stride() {
            return Err(Error::invalid_layout(format!(
                "batch {b} holds {} keys and needs {needed} blocks, block table rows have {}",
                info.actual_seqlen_k(),
                table.batch_stride()
            )));
        }

        if let Some(num_blocks) = table.num_cache_blocks()
            && let Some((j, &block)) = table.row(b)[..needed]
                .iter()
                .enumerate()
                .find(|&(_, &block)| block as usize >= num_blocks)
        {
            return Err(Error::invalid_layout(format!(
                "block_table[{b}][{j}] = {block} is out of range for {num_blocks} cache blocks"
            )));
        }
    }

    Ok(())
}

fn require_len(name: &str, len: usize, required: usize) -> Result<()> {
    if len < required {
        return Err(Error::invalid_layout(format!(
            "{name} has {len} entries, at least {required} required"
        )));
    }
    Ok(())
}

/// Entries past `num_batches + 1` are padding and are not inspected.
fn validate_cumulative(name: &str, cu: &[u32], num_batches: usize) -> Result<()> {
    require_len(name, cu.len(), num_batches + 1)?;
    if let Some(b) = cu[..=num_batches].windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::invalid_layout(format!(
            "{name} decreases at index {}: {} -> {}",
            b + 1,
            cu[b],
            cu[b + 1]
        )));
    }
    Ok(())
}
