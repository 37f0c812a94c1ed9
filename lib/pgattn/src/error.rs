// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::kernel::VariantKey;

/// Errors surfaced by launch preparation.
///
/// Address queries themselves never fail; everything here is detected once per
/// launch, before any compute unit runs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("no compiled kernel variant for {0}")]
    UnsupportedVariant(VariantKey),

    #[error("head dimension {0} exceeds the largest compiled head dimension")]
    UnsupportedHeadDim(usize),

    #[error("parameter validation failed: {0}")]
    InvalidParams(#[from] validator::ValidationErrors),

    #[error("incomplete launch parameters: {0}")]
    Builder(#[from] derive_builder::UninitializedFieldError),

    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    #[error("launch failed: {reason}")]
    Launch { reason: String },
}

impl Error {
    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Error::InvalidLayout {
            reason: reason.into(),
        }
    }

    pub fn launch(reason: impl Into<String>) -> Self {
        Error::Launch {
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
