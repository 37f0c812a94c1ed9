// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, LaunchParams, Result};

/// Head dimensions a variant can be compiled for, ascending.
pub const HEAD_DIMS: [usize; 8] = [32, 64, 96, 128, 160, 192, 224, 256];

/// Page block sizes a paged variant can be compiled for, ascending.
pub const PAGE_BLOCK_SIZES: [usize; 6] = [32, 64, 128, 256, 512, 1024];

/// Rows per query tile, identical across variants.
pub const BLOCK_M: usize = 64;

/// Floating-point element type of the query/key/value tensors.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(i32)]
pub enum ElementKind {
    #[default]
    F16 = 0,
    BF16 = 1,
}

/// Rust element types a kernel variant can be instantiated with.
pub trait Element: Copy + Send + Sync + 'static {
    const KIND: ElementKind;
}

impl Element for half::f16 {
    const KIND: ElementKind = ElementKind::F16;
}

impl Element for half::bf16 {
    const KIND: ElementKind = ElementKind::BF16;
}

/// Query and key tile extents of one compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileShape {
    pub block_m: usize,
    pub block_n: usize,
}

impl TileShape {
    /// Tile used by the variant for `head_dim` and `page_block_size` (0 = not paged).
    ///
    /// A paged variant walks exactly one page per key tile, so one block-table
    /// entry always addresses one tile.
    pub const fn for_variant(head_dim: usize, page_block_size: usize) -> Self {
        let block_n = if page_block_size > 0 {
            page_block_size
        } else if head_dim <= 64 {
            256
        } else if head_dim <= 128 {
            128
        } else {
            64
        };
        Self {
            block_m: BLOCK_M,
            block_n,
        }
    }
}

pub const fn is_supported_head_dim(head_dim: usize) -> bool {
    let mut i = 0;
    while i < HEAD_DIMS.len() {
        if HEAD_DIMS[i] == head_dim {
            return true;
        }
        i += 1;
    }
    false
}

/// `0` stands for the non-paged variant.
pub const fn is_supported_page_block_size(page_block_size: usize) -> bool {
    if page_block_size == 0 {
        return true;
    }
    let mut i = 0;
    while i < PAGE_BLOCK_SIZES.len() {
        if PAGE_BLOCK_SIZES[i] == page_block_size {
            return true;
        }
        i += 1;
    }
    false
}

/// Smallest compiled head dimension that fits `head_size`.
pub fn round_head_dim(head_size: usize) -> Result<usize> {
    HEAD_DIMS
        .iter()
        .copied()
        .find(|&dim| head_size <= dim)
        .ok_or(Error::UnsupportedHeadDim(head_size))
}

/// Registry key: one compiled routine per distinct value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub element: ElementKind,
    pub head_dim: usize,
    pub page_block_size: Option<usize>,
}

impl VariantKey {
    pub const fn new(element: ElementKind, head_dim: usize, page_block_size: Option<usize>) -> Self {
        Self {
            element,
            head_dim,
            page_block_size,
        }
    }

    /// Key for a launch: the head size is rounded up to a compiled head
    /// dimension and the page size is taken from the block table, if any.
    pub fn for_params(params: &LaunchParams) -> Result<Self> {
        Ok(Self::new(
            params.element(),
            round_head_dim(params.head_dim())?,
            params.block_table().map(|table| table.page_block_size()),
        ))
    }

    pub fn tile_shape(&self) -> TileShape {
        TileShape::for_variant(self.head_dim, self.page_block_size.unwrap_or(0))
    }

    /// True when the key lies inside the set the build script knows how to compile.
    pub fn is_supported(&self) -> bool {
        is_supported_head_dim(self.head_dim)
            && is_supported_page_block_size(self.page_block_size.unwrap_or(0))
            && self.page_block_size != Some(0)
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/hdim{}", self.element, self.head_dim)?;
        match self.page_block_size {
            Some(page) => write!(f, "/page{}", page),
            None => write!(f, "/nopage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(1, 32)]
    #[case(32, 32)]
    #[case(33, 64)]
    #[case(80, 96)]
    #[case(128, 128)]
    #[case(129, 160)]
    #[case(200, 224)]
    #[case(256, 256)]
    fn test_round_head_dim(#[case] head_size: usize, #[case] expected: usize) {
        assert_eq!(round_head_dim(head_size).unwrap(), expected);
    }

    #[test]
    fn test_round_head_dim_too_large() {
        assert!(matches!(
            round_head_dim(257),
            Err(Error::UnsupportedHeadDim(257))
        ));
    }

    #[rstest]
    #[case(32, 0, 256)]
    #[case(64, 0, 256)]
    #[case(96, 0, 128)]
    #[case(128, 0, 128)]
    #[case(160, 0, 64)]
    #[case(256, 0, 64)]
    #[case(128, 256, 256)]
    #[case(256, 1024, 1024)]
    fn test_tile_shape(#[case] head_dim: usize, #[case] page: usize, #[case] block_n: usize) {
        let tile = TileShape::for_variant(head_dim, page);
        assert_eq!(tile.block_m, BLOCK_M);
        assert_eq!(tile.block_n, block_n);
    }

    #[test]
    fn test_element_kind_strings() {
        assert_eq!(ElementKind::BF16.to_string(), "bf16");
        assert_eq!(ElementKind::from_str("F16").unwrap(), ElementKind::F16);
        assert!(ElementKind::from_str("f32").is_err());
        assert_eq!(<half::bf16 as Element>::KIND, ElementKind::BF16);
    }

    #[test]
    fn test_variant_key_display_and_support() {
        let key = VariantKey::new(ElementKind::F16, 128, Some(256));
        assert_eq!(key.to_string(), "f16/hdim128/page256");
        assert!(key.is_supported());

        let key = VariantKey::new(ElementKind::BF16, 64, None);
        assert_eq!(key.to_string(), "bf16/hdim64/nopage");
        assert!(key.is_supported());

        assert!(!VariantKey::new(ElementKind::F16, 80, None).is_supported());
        assert!(!VariantKey::new(ElementKind::F16, 64, Some(48)).is_supported());
        assert!(!VariantKey::new(ElementKind::F16, 64, Some(0)).is_supported());
    }
}
