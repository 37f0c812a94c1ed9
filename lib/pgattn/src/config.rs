// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use derive_builder::Builder;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use pgattn_config::environment_names::kernel as env_kernel;

use crate::Result;

/// Default upper bound for the split-KV heuristic
pub const DEFAULT_MAX_SPLITS: usize = 128;

/// Default occupancy above which launches are not split
pub const DEFAULT_OCCUPANCY_THRESHOLD: f32 = 0.8;

/// Default fraction of the best wave efficiency a split count must reach
pub const DEFAULT_EFFICIENCY_RATIO: f32 = 0.85;

/// Launch-time knobs shared by every kernel variant.
#[derive(Serialize, Deserialize, Validate, Debug, Builder, Clone, PartialEq)]
#[builder(
    build_fn(private, name = "build_internal", error = "crate::Error"),
    derive(Debug)
)]
pub struct KernelConfig {
    /// Validate the caller-supplied layout once per launch
    #[builder(default = "true")]
    pub validate_layouts: bool,

    /// Largest split count the heuristic may pick
    #[validate(range(min = 1, max = 256))]
    #[builder(default = "DEFAULT_MAX_SPLITS")]
    pub max_splits: usize,

    /// Fraction of the device the unsplit launch must fill to skip splitting
    #[validate(range(min = 0.0, max = 1.0))]
    #[builder(default = "DEFAULT_OCCUPANCY_THRESHOLD")]
    pub occupancy_threshold: f32,

    /// Fraction of the best wave efficiency that is good enough
    #[validate(range(min = 0.0, max = 1.0))]
    #[builder(default = "DEFAULT_EFFICIENCY_RATIO")]
    pub efficiency_ratio: f32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            validate_layouts: true,
            max_splits: DEFAULT_MAX_SPLITS,
            occupancy_threshold: DEFAULT_OCCUPANCY_THRESHOLD,
            efficiency_ratio: DEFAULT_EFFICIENCY_RATIO,
        }
    }
}

impl KernelConfigBuilder {
    pub fn build(&self) -> Result<KernelConfig> {
        let config = self.build_internal()?;
        config.validate()?;
        Ok(config)
    }
}

impl KernelConfig {
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::default()
    }

    pub(crate) fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(KernelConfig::default()));

        if let Ok(path) = std::env::var(env_kernel::PGATTN_CONFIG_PATH)
            && !path.is_empty()
        {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(
            Env::prefixed(env_kernel::PGATTN_KERNEL_PREFIX).filter_map(|k| {
                let full_key = format!("{}{}", env_kernel::PGATTN_KERNEL_PREFIX, k.as_str());
                // filters out empty environment variables
                match std::env::var(&full_key) {
                    Ok(v) if !v.is_empty() => Some(k.into()),
                    _ => None,
                }
            }),
        )
    }

    /// Load the kernel configuration.
    ///
    /// Sources, last wins:
    /// 1. built-in defaults
    /// 2. the TOML file named by `PGATTN_CONFIG_PATH`, if set
    /// 3. `PGATTN_KERNEL_*` environment variables, e.g. `PGATTN_KERNEL_MAX_SPLITS=16`
    pub fn from_settings() -> Result<KernelConfig> {
        let config: KernelConfig = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }
}
