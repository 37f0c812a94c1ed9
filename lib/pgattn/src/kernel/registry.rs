// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::{debug, warn};

use super::launch::{ExecutionStream, KernelFn, run_mha_fwd};
use super::variant::{Element, ElementKind, VariantKey};
use crate::config::KernelConfig;
use crate::{Error, LaunchParams, Result};

/// One compiled specialization.
#[derive(Clone, Copy)]
pub struct VariantEntry {
    key: VariantKey,
    kernel: KernelFn,
}

impl VariantEntry {
    /// Instantiates [`run_mha_fwd`] for `T`, `HEAD_DIM` and `PAGE` (0 = not paged).
    pub const fn new<T: Element, const HEAD_DIM: usize, const PAGE: usize>() -> Self {
        let page_block_size = if PAGE == 0 { None } else { Some(PAGE) };
        Self {
            key: VariantKey::new(T::KIND, HEAD_DIM, page_block_size),
            kernel: run_mha_fwd::<T, HEAD_DIM, PAGE>,
        }
    }

    pub fn key(&self) -> VariantKey {
        self.key
    }

    pub fn kernel(&self) -> KernelFn {
        self.kernel
    }
}

impl std::fmt::Debug for VariantEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantEntry").field("key", &self.key).finish()
    }
}

// Generated by build.rs: `pub(crate) static COMPILED_VARIANTS: &[VariantEntry]`.
include!(concat!(env!("OUT_DIR"), "/variants.rs"));

/// Flat lookup from [`VariantKey`] to its compiled entry point.
///
/// The table is filled once from the build-generated variant list. A key that
/// was not compiled is simply absent; there is no generic fallback kernel.
pub struct KernelVariantRegistry {
    variants: HashMap<VariantKey, KernelFn>,
    config: KernelConfig,
}

impl KernelVariantRegistry {
    /// Registry of every variant compiled into this build, configured from the environment.
    pub fn global() -> &'static KernelVariantRegistry {
        static REGISTRY: OnceLock<KernelVariantRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            let config = KernelConfig::from_settings().unwrap_or_else(|err| {
                warn!(error = %err, "invalid kernel configuration, using defaults");
                KernelConfig::default()
            });
            Self::compiled(config)
        })
    }

    pub fn compiled(config: KernelConfig) -> Self {
        Self::from_entries(COMPILED_VARIANTS, config)
    }

    pub fn from_entries(entries: &[VariantEntry], config: KernelConfig) -> Self {
        let variants: HashMap<_, _> = entries
            .iter()
            .map(|entry| (entry.key, entry.kernel))
            .collect();
        debug!(variants = variants.len(), "kernel variant registry initialized");
        Self { variants, config }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn contains(&self, key: &VariantKey) -> bool {
        self.variants.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &VariantKey> {
        self.variants.keys()
    }

    /// Entry point for an exact `(element, head_dim, page_block_size)` triple.
    pub fn dispatch(
        &self,
        element: ElementKind,
        head_dim: usize,
        page_block_size: Option<usize>,
    ) -> Result<KernelFn> {
        self.dispatch_key(&VariantKey::new(element, head_dim, page_block_size))
    }

    pub fn dispatch_key(&self, key: &VariantKey) -> Result<KernelFn> {
        self.variants
            .get(key)
            .copied()
            .ok_or(Error::UnsupportedVariant(*key))
    }

    /// Selects the variant for `params` and runs it on `stream`.
    pub fn launch(&self, params: &LaunchParams, stream: &dyn ExecutionStream) -> Result<()> {
        let key = VariantKey::for_params(params)?;
        let kernel = self.dispatch_key(&key)?;
        kernel(params, stream, &self.config)
    }
}

impl std::fmt::Debug for KernelVariantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelVariantRegistry")
            .field("variants", &self.variants.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::{bf16, f16};

    const ENTRIES: &[VariantEntry] = &[
        VariantEntry::new::<f16, 64, 0>(),
        VariantEntry::new::<f16, 128, 256>(),
        VariantEntry::new::<bf16, 128, 256>(),
    ];

    #[test]
    fn test_dispatch_exact_keys() {
        let registry = KernelVariantRegistry::from_entries(ENTRIES, KernelConfig::default());
        assert_eq!(registry.len(), 3);
        assert!(registry.dispatch(ElementKind::F16, 64, None).is_ok());
        assert!(registry.dispatch(ElementKind::BF16, 128, Some(256)).is_ok());

        let err = registry
            .dispatch(ElementKind::BF16, 64, None)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::UnsupportedVariant(VariantKey {
                element: ElementKind::BF16,
                head_dim: 64,
                page_block_size: None
            })
        ));
    }

    #[test]
    fn test_entry_keys() {
        assert_eq!(
            ENTRIES[1].key(),
            VariantKey::new(ElementKind::F16, 128, Some(256))
        );
        assert_eq!(ENTRIES[0].key().page_block_size, None);
    }

    #[test]
    fn test_compiled_variants_are_supported() {
        let registry = KernelVariantRegistry::compiled(KernelConfig::default());
        assert!(!registry.is_empty());
        assert!(registry.keys().all(VariantKey::is_supported));
    }
}
