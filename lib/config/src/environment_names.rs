// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Environment variable names used across the workspace.
//!
//! Build-time names are read by `lib/pgattn/build.rs`; the runtime names are read
//! by `pgattn::config` and `pgattn::logging`.

/// Logging configuration
pub mod logging {
    /// Filter directives, e.g. `pgattn=debug`
    pub const PGATTN_LOG: &str = "PGATTN_LOG";

    /// Emit JSON lines instead of the compact readable format
    pub const PGATTN_LOGGING_JSONL: &str = "PGATTN_LOGGING_JSONL";

    /// Disable ANSI colors in readable output
    pub const PGATTN_DISABLE_ANSI_LOGGING: &str = "PGATTN_DISABLE_ANSI_LOGGING";
}

/// Runtime kernel configuration
pub mod kernel {
    /// Optional TOML file merged under the environment
    pub const PGATTN_CONFIG_PATH: &str = "PGATTN_CONFIG_PATH";

    /// Prefix for `KernelConfig` field overrides, e.g. `PGATTN_KERNEL_MAX_SPLITS`
    pub const PGATTN_KERNEL_PREFIX: &str = "PGATTN_KERNEL_";
}

/// Build-time selection of the compiled variant set
pub mod build {
    /// Comma separated element types: `f16`, `bf16`
    pub const PGATTN_BUILD_DTYPES: &str = "PGATTN_BUILD_DTYPES";

    /// Comma separated head dimensions
    pub const PGATTN_BUILD_HEAD_DIMS: &str = "PGATTN_BUILD_HEAD_DIMS";

    /// Comma separated page block sizes; `0` or `none` selects the non-paged variant
    pub const PGATTN_BUILD_PAGE_SIZES: &str = "PGATTN_BUILD_PAGE_SIZES";
}
