// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Address resolution for the three key/value layouts.
//!
//! - fixed length: every batch element sits at `batch * batch_stride`
//! - packed (varlen): sequences are concatenated and located by cumulative offsets
//! - paged: key/value rows live in fixed-size physical blocks reached through a
//!   [`BlockTable`](crate::BlockTable)
//!
//! [`SequenceLayoutResolver`] derives the per-batch geometry,
//! [`PageTableTranslator`] turns logical key blocks into physical offsets, and
//! [`BlockAddressContext`] bundles both for one compute unit.

mod context;
mod page_table;
mod sequence;
mod validation;
mod walk;

pub use context::BlockAddressContext;
pub use page_table::{KeyAddressing, PageTableTranslator};
pub use sequence::{PerBatchInfo, SequenceLayoutResolver};
pub use validation::validate_layout;
pub use walk::{BlockSchedule, KeyBlockWalk};
