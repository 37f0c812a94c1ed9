// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, warn};

use super::variant::{
    Element, TileShape, VariantKey, is_supported_head_dim, is_supported_page_block_size,
};
use crate::config::KernelConfig;
use crate::layout::{BlockSchedule, validate_layout};
use crate::{Error, LaunchParams, Result};

/// Resident compute units per multiprocessor assumed by the split heuristic.
pub const UNITS_PER_MULTIPROCESSOR: usize = 2;

/// Split count that best fills the device.
///
/// Returns 1 as soon as the unsplit launch already occupies most of the
/// device. Otherwise it scores every split count by how full its last wave is
/// and takes the smallest count whose score is within `efficiency_ratio` of
/// the best. Split counts that leave the per-split block count unchanged from
/// the next smaller count are never picked.
pub fn num_splits_heuristic(
    batch_nheads_mblocks: usize,
    num_units: usize,
    num_n_blocks: usize,
    config: &KernelConfig,
) -> usize {
    if batch_nheads_mblocks == 0 || num_units == 0 || num_n_blocks == 0 {
        return 1;
    }
    if batch_nheads_mblocks as f32 >= config.occupancy_threshold * num_units as f32 {
        return 1;
    }

    let max_splits = config.max_splits.min(num_units).min(num_n_blocks);
    let eligible = |splits: usize| {
        splits == 1 || num_n_blocks.div_ceil(splits) != num_n_blocks.div_ceil(splits - 1)
    };

    let efficiency: Vec<f32> = (1..=max_splits)
        .map(|splits| {
            if !eligible(splits) {
                return 0.0;
            }
            let n_waves = (batch_nheads_mblocks * splits) as f32 / num_units as f32;
            n_waves / n_waves.ceil()
        })
        .collect();

    let best = efficiency.iter().copied().fold(0.0f32, f32::max);

    (1..=max_splits)
        .find(|&splits| eligible(splits) && efficiency[splits - 1] >= config.efficiency_ratio * best)
        .unwrap_or(1)
}

/// Compute-unit grid of one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGrid {
    pub m_blocks: usize,
    pub batch: usize,
    pub heads: usize,
    pub splits: usize,
}

/// Coordinates of one compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitCoord {
    pub batch: usize,
    pub head: usize,
    pub m_block: usize,
    pub split: usize,
}

impl LaunchGrid {
    pub fn num_units(&self) -> usize {
        self.m_blocks * self.batch * self.heads * self.splits
    }

    /// Linear unit index to coordinates, m-block fastest.
    pub fn unit(&self, index: usize) -> UnitCoord {
        let m_block = index % self.m_blocks;
        let rest = index / self.m_blocks;
        let split = rest % self.splits;
        let rest = rest / self.splits;
        let head = rest % self.heads;
        let batch = rest / self.heads;
        UnitCoord {
            batch,
            head,
            m_block,
            split,
        }
    }
}

/// A fully planned launch of one compiled variant, handed to an [`ExecutionStream`].
#[derive(Debug, Clone, Copy)]
pub struct KernelLaunch<'p> {
    key: VariantKey,
    params: &'p LaunchParams,
    schedule: BlockSchedule,
    grid: LaunchGrid,
}

impl<'p> KernelLaunch<'p> {
    /// Plans the grid and split count for `params` on a device with `multiprocessors` SMs.
    pub fn plan(
        key: VariantKey,
        params: &'p LaunchParams,
        multiprocessors: usize,
        config: &KernelConfig,
    ) -> Self {
        let tile = key.tile_shape();
        let m_blocks = params.seqlen_q().div_ceil(tile.block_m);
        let num_n_blocks = params.seqlen_k().div_ceil(tile.block_n);

        let splits = match params.num_splits() {
            0 => num_splits_heuristic(
                params.batch_size() * params.num_heads() * m_blocks,
                multiprocessors * UNITS_PER_MULTIPROCESSOR,
                num_n_blocks,
                config,
            ),
            n => {
                if n > config.max_splits {
                    warn!(
                        requested = n,
                        max_splits = config.max_splits,
                        "num_splits above configured maximum, using it anyway"
                    );
                }
                n
            }
        };

        Self {
            key,
            params,
            schedule: BlockSchedule::new(tile, params.seqlen_k(), splits, params.is_causal()),
            grid: LaunchGrid {
                m_blocks,
                batch: params.batch_size(),
                heads: params.num_heads(),
                splits,
            },
        }
    }

    pub fn key(&self) -> VariantKey {
        self.key
    }

    pub fn params(&self) -> &'p LaunchParams {
        self.params
    }

    pub fn schedule(&self) -> &BlockSchedule {
        &self.schedule
    }

    pub fn tile(&self) -> TileShape {
        self.schedule.tile()
    }

    pub fn grid(&self) -> LaunchGrid {
        self.grid
    }
}

/// Device stream a planned launch is submitted to.
pub trait ExecutionStream: Send + Sync {
    /// Streaming multiprocessors available to the launch.
    fn multiprocessor_count(&self) -> usize;

    fn launch(&self, launch: &KernelLaunch<'_>) -> Result<()>;
}

/// Entry point shared by every compiled variant.
pub type KernelFn = fn(&LaunchParams, &dyn ExecutionStream, &KernelConfig) -> Result<()>;

/// Forward attention for one `(element, head dim, page size)` specialization.
///
/// `PAGE == 0` is the non-paged variant. Instantiating a head dimension or page
/// size outside the supported set fails to compile.
pub fn run_mha_fwd<T: Element, const HEAD_DIM: usize, const PAGE: usize>(
    params: &LaunchParams,
    stream: &dyn ExecutionStream,
    config: &KernelConfig,
) -> Result<()> {
    const {
        assert!(
            is_supported_head_dim(HEAD_DIM),
            "unsupported head dimension for a kernel variant"
        );
        assert!(
            is_supported_page_block_size(PAGE),
            "unsupported page block size for a kernel variant"
        );
    }

    let key = VariantKey::new(T::KIND, HEAD_DIM, (PAGE > 0).then_some(PAGE));
    check_params_match(&key, params)?;

    if config.validate_layouts {
        validate_layout(params)?;
    } else {
        warn!(variant = %key, "layout validation disabled, trusting caller-supplied layout");
    }

    let launch = KernelLaunch::plan(key, params, stream.multiprocessor_count(), config);
    debug!(
        variant = %key,
        grid = ?launch.grid(),
        block_n = launch.tile().block_n,
        "launching attention kernel"
    );

    stream.launch(&launch)
}

fn check_params_match(key: &VariantKey, params: &LaunchParams) -> Result<()> {
    if params.element() != key.element {
        return Err(Error::invalid_layout(format!(
            "{} parameters launched on variant {}",
            params.element(),
            key
        )));
    }
    if params.head_dim() > key.head_dim {
        return Err(Error::invalid_layout(format!(
            "head size {} does not fit variant {}",
            params.head_dim(),
            key
        )));
    }
    let page = params.block_table().map(|table| table.page_block_size());
    if page != key.page_block_size {
        return Err(Error::invalid_layout(format!(
            "page block size {:?} launched on variant {}",
            page, key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config() -> KernelConfig {
        KernelConfig::default()
    }

    #[test]
    fn test_heuristic_saturated_device() {
        // 200 units already cover 80% of 216 slots
        assert_eq!(num_splits_heuristic(200, 216, 64, &config()), 1);
    }

    #[rstest]
    // a single partial wave: efficiency grows with the split count
    #[case(1, 216, 8, 8)]
    #[case(4, 216, 16, 16)]
    // 7 splits reach 0.848 efficiency, within 85% of the best (about 0.97 at 8 or more splits)
    #[case(16, 132, 64, 7)]
    fn test_heuristic_underfilled_device(
        #[case] units: usize,
        #[case] slots: usize,
        #[case] n_blocks: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(num_splits_heuristic(units, slots, n_blocks, &config()), expected);
    }

    #[test]
    fn test_heuristic_respects_max_splits() {
        let config = KernelConfig {
            max_splits: 2,
            ..KernelConfig::default()
        };
        assert_eq!(num_splits_heuristic(1, 216, 64, &config), 2);
    }

    #[test]
    fn test_heuristic_degenerate_inputs() {
        assert_eq!(num_splits_heuristic(0, 216, 64, &config()), 1);
        assert_eq!(num_splits_heuristic(8, 216, 0, &config()), 1);
    }

    #[test]
    fn test_grid_unit_decoding() {
        let grid = LaunchGrid {
            m_blocks: 3,
            batch: 2,
            heads: 4,
            splits: 2,
        };
        assert_eq!(grid.num_units(), 48);
        assert_eq!(
            grid.unit(0),
            UnitCoord {
                batch: 0,
                head: 0,
                m_block: 0,
                split: 0
            }
        );
        assert_eq!(
            grid.unit(47),
            UnitCoord {
                batch: 1,
                head: 3,
                m_block: 2,
                split: 1
            }
        );
        let mut seen: Vec<_> = (0..grid.num_units()).map(|i| grid.unit(i)).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 48);
    }
}
