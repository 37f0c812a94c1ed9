// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Address resolution and kernel-variant dispatch for paged flash attention.
//!
//! A launch starts from [`LaunchParams`]. [`KernelVariantRegistry`] picks the
//! compiled routine for the launch's element type, head dimension and page
//! size; that routine validates the layout, plans the grid and hands it to an
//! [`ExecutionStream`]. Each compute unit then builds a
//! [`BlockAddressContext`](layout::BlockAddressContext) and walks its key
//! blocks from newest to oldest.
//!
//! ```no_run
//! use pgattn::{BlockTable, HostStream, KernelVariantRegistry, LaunchParams, Strides};
//!
//! # fn main() -> pgattn::Result<()> {
//! let table = BlockTable::from_rows([[3u32, 1, 7]], 256, 256 * 8 * 128);
//! let params = LaunchParams::builder()
//!     .batch_size(1)
//!     .num_heads(32)
//!     .num_heads_k(8)
//!     .head_dim(128)
//!     .seqlen_q(1)
//!     .seqlen_k(768)
//!     .cache_seqlens_k(vec![700])
//!     .block_table(table)
//!     .q_strides(Strides::contiguous(1, 32, 128))
//!     .k_strides(Strides::new(0, 8 * 128, 128))
//!     .v_strides(Strides::new(0, 8 * 128, 128))
//!     .build()?;
//!
//! let stream = HostStream::default();
//! KernelVariantRegistry::global().launch(&params, &stream)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod kernel;
pub mod layout;
pub mod logging;
pub mod params;

mod error;

pub use config::KernelConfig;
pub use error::{Error, Result};
pub use kernel::{
    ElementKind, ExecutionStream, HostStream, KernelLaunch, KernelVariantRegistry, UnitTrace,
    VariantKey,
};
pub use params::{BlockTable, Key, LaunchParams, LaunchParamsBuilder, Query, Strides, Value};
