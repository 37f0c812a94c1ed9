// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Host reference executor.
//!
//! [`HostStream`] runs the address side of a launch on the CPU: every compute
//! unit of the grid builds its own [`BlockAddressContext`], resolves its query
//! tile and walks its key/value blocks backward, exactly as a device unit
//! would before touching memory. The resolved addresses are kept as
//! [`UnitTrace`] records so they can be compared against a reference layout.

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::trace;

use super::launch::{ExecutionStream, KernelLaunch, UnitCoord};
use super::variant::VariantKey;
use crate::Result;
use crate::layout::{BlockAddressContext, KeyBlockWalk};

/// Addresses resolved by one compute unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTrace {
    pub variant: VariantKey,
    pub unit: UnitCoord,
    pub kv_head: usize,
    /// Offset of the first query row of the unit's tile, head included.
    pub query_offset: i64,
    /// `(logical_block, offset)` in walk order, newest block first.
    pub key_blocks: Vec<(usize, i64)>,
    pub value_blocks: Vec<(usize, i64)>,
}

/// Executes launches on the host thread pool and records every unit.
#[derive(Debug)]
pub struct HostStream {
    multiprocessors: usize,
    records: Mutex<Vec<UnitTrace>>,
}

impl HostStream {
    pub fn new(multiprocessors: usize) -> Self {
        Self {
            multiprocessors,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Drains the recorded units, sorted by coordinates.
    pub fn take_records(&self) -> Vec<UnitTrace> {
        let mut records = std::mem::take(&mut *self.records.lock());
        records.sort_by_key(|record| record.unit);
        records
    }
}

impl Default for HostStream {
    fn default() -> Self {
        Self::new(rayon::current_num_threads())
    }
}

impl ExecutionStream for HostStream {
    fn multiprocessor_count(&self) -> usize {
        self.multiprocessors
    }

    fn launch(&self, launch: &KernelLaunch<'_>) -> Result<()> {
        let grid = launch.grid();
        let traces: Vec<UnitTrace> = (0..grid.num_units())
            .into_par_iter()
            .filter_map(|index| run_unit(launch, grid.unit(index)))
            .collect();

        self.records.lock().extend(traces);
        Ok(())
    }
}

fn run_unit(launch: &KernelLaunch<'_>, unit: UnitCoord) -> Option<UnitTrace> {
    let params = launch.params();
    if unit.batch >= params.active_batch_size() {
        return None;
    }

    let ctx = BlockAddressContext::new(params, unit.batch);
    let tile = launch.tile();
    if unit.m_block * tile.block_m >= ctx.info().actual_seqlen_q() {
        return None;
    }

    let blocks = launch
        .schedule()
        .range(ctx.info(), unit.m_block, unit.split);
    let kv_head = params.kv_head(unit.head);

    let q = params.q_strides();
    let query_offset = ctx.query_offset(q)
        + (unit.m_block * tile.block_m) as i64 * q.row()
        + unit.head as i64 * q.head();

    let k = params.k_strides();
    let key_blocks: Vec<_> =
        KeyBlockWalk::new(&ctx, k, kv_head as i64 * k.head(), blocks.clone(), tile.block_n)
            .collect();

    let v = params.v_strides();
    let value_blocks: Vec<_> =
        KeyBlockWalk::new(&ctx, v, kv_head as i64 * v.head(), blocks, tile.block_n).collect();

    trace!(
        ?unit,
        query_offset,
        key_blocks = key_blocks.len(),
        "unit addresses resolved"
    );

    Some(UnitTrace {
        variant: launch.key(),
        unit,
        kv_head,
        query_offset,
        key_blocks,
        value_blocks,
    })
}
