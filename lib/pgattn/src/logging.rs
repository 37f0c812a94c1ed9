// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Logging setup for binaries and tests that embed the crate.
//!
//! Filters come from the `PGATTN_LOG` environment variable using the usual
//! `EnvFilter` directive syntax, e.g. `PGATTN_LOG=pgattn=debug`. The default
//! level is `info`. Output goes to stderr in a compact readable format, or as
//! JSON lines when `PGATTN_LOGGING_JSONL` is truthy.

use std::sync::Once;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use pgattn_config::environment_names::logging as env_logging;
use pgattn_config::env_is_truthy;

/// Once instance to ensure the logger is only initialized once
static INIT: Once = Once::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        if let Err(e) = setup_logging() {
            eprintln!("Failed to initialize logging: {}", e);
        }
    });
}

fn jsonl_logging_enabled() -> bool {
    env_is_truthy(env_logging::PGATTN_LOGGING_JSONL)
}

fn disable_ansi_logging() -> bool {
    env_is_truthy(env_logging::PGATTN_DISABLE_ANSI_LOGGING)
}

fn setup_logging() -> Result<(), tracing_subscriber::util::TryInitError> {
    if jsonl_logging_enabled() {
        let l = fmt::layer()
            .json()
            .with_ansi(false)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .with_filter(filters());
        tracing_subscriber::registry().with(l).try_init()
    } else {
        let l = fmt::layer()
            .compact()
            .with_ansi(!disable_ansi_logging())
            .with_writer(std::io::stderr)
            .with_filter(filters());
        tracing_subscriber::registry().with(l).try_init()
    }
}

fn filters() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(env_logging::PGATTN_LOG)
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_default_to_info() {
        temp_env::with_var_unset(env_logging::PGATTN_LOG, || {
            assert_eq!(filters().max_level_hint(), Some(LevelFilter::INFO));
        });
    }

    #[test]
    fn test_filters_follow_env() {
        temp_env::with_var(env_logging::PGATTN_LOG, Some("pgattn=debug"), || {
            assert_eq!(filters().max_level_hint(), Some(LevelFilter::DEBUG));
        });
        temp_env::with_var(env_logging::PGATTN_LOG, Some("trace"), || {
            assert_eq!(filters().max_level_hint(), Some(LevelFilter::TRACE));
        });
    }

    #[test]
    fn test_format_switches() {
        temp_env::with_vars(
            vec![
                (env_logging::PGATTN_LOGGING_JSONL, Some("1")),
                (env_logging::PGATTN_DISABLE_ANSI_LOGGING, None),
            ],
            || {
                assert!(jsonl_logging_enabled());
                assert!(!disable_ansi_logging());
            },
        );
        temp_env::with_vars(
            vec![
                (env_logging::PGATTN_LOGGING_JSONL, Some("false")),
                (env_logging::PGATTN_DISABLE_ANSI_LOGGING, Some("true")),
            ],
            || {
                assert!(!jsonl_logging_enabled());
                assert!(disable_ansi_logging());
            },
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        assert!(INIT.is_completed());
        tracing::info!("logging initialized");
    }
}
