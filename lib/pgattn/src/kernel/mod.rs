// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Kernel variants and their dispatch.

mod host;
mod launch;
mod registry;
mod variant;

pub use host::{HostStream, UnitTrace};
pub use launch::{
    ExecutionStream, KernelFn, KernelLaunch, LaunchGrid, UNITS_PER_MULTIPROCESSOR, UnitCoord,
    num_splits_heuristic, run_mha_fwd,
};
pub use registry::{KernelVariantRegistry, VariantEntry};
pub use variant::{
    BLOCK_M, Element, ElementKind, HEAD_DIMS, PAGE_BLOCK_SIZES, TileShape, VariantKey,
    is_supported_head_dim, is_supported_page_block_size, round_head_dim,
};
