// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Environment parsing helpers.
//!
//! The `pgattn` build script reads the variant selection variables through this
//! crate, so it depends on `anyhow` only.

use std::str::FromStr;

pub mod environment_names;

/// Returns true for "1", "true", "on" and "yes" (case-insensitive).
///
/// Anything else, including the empty string, is not truthy.
pub fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Parse a comma separated list, skipping empty items.
///
/// ```
/// let dims: Vec<usize> = pgattn_config::parse_list("64, 128,,256").unwrap();
/// assert_eq!(dims, vec![64, 128, 256]);
/// ```
pub fn parse_list<T>(val: &str) -> anyhow::Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    val.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid list item '{}': {}", item, e))
        })
        .collect()
}

/// `false` when the variable is unset or not truthy.
pub fn env_is_truthy(env: &str) -> bool {
    std::env::var(env).is_ok_and(|val| is_truthy(&val))
}

/// `Ok(None)` when unset or blank, otherwise the parsed list.
pub fn env_parse_list<T>(env: &str) -> anyhow::Result<Option<Vec<T>>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match read_env(env)? {
        Some(val) if !val.trim().is_empty() => parse_list(&val)
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}: {}", env, e)),
        _ => Ok(None),
    }
}

fn read_env(env: &str) -> anyhow::Result<Option<String>> {
    match std::env::var(env) {
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => anyhow::bail!("failed to read environment variable {}: {}", env, e),
    }
}
