// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use pgattn_config::env_parse_list;
use pgattn_config::environment_names::build as env_build;

/// Element types known to the crate and their Rust type paths.
const ELEMENTS: &[(&str, &str)] = &[("f16", "::half::f16"), ("bf16", "::half::bf16")];

const HEAD_DIMS: &[usize] = &[32, 64, 96, 128, 160, 192, 224, 256];

/// `0` is the non-paged variant.
const PAGE_BLOCK_SIZES: &[usize] = &[0, 32, 64, 128, 256, 512, 1024];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed={}", env_build::PGATTN_BUILD_DTYPES);
    println!("cargo:rerun-if-env-changed={}", env_build::PGATTN_BUILD_HEAD_DIMS);
    println!("cargo:rerun-if-env-changed={}", env_build::PGATTN_BUILD_PAGE_SIZES);

    let elements = selected_elements();
    let head_dims = selected(env_build::PGATTN_BUILD_HEAD_DIMS, HEAD_DIMS, |s| {
        s.parse::<usize>().ok()
    });
    let page_sizes = selected(env_build::PGATTN_BUILD_PAGE_SIZES, PAGE_BLOCK_SIZES, |s| {
        if s.eq_ignore_ascii_case("none") {
            Some(0)
        } else {
            s.parse::<usize>().ok()
        }
    });

    let count = elements.len() * head_dims.len() * page_sizes.len();
    if count < ELEMENTS.len() * HEAD_DIMS.len() * PAGE_BLOCK_SIZES.len() {
        println!("cargo:warning=Compiling {} of the supported attention kernel variants", count);
    }

    let mut out = String::new();
    writeln!(out, "pub(crate) static COMPILED_VARIANTS: &[VariantEntry] = &[").unwrap();
    for (_, ty) in &elements {
        for head_dim in &head_dims {
            for page in &page_sizes {
                writeln!(out, "    VariantEntry::new::<{ty}, {head_dim}, {page}>(),").unwrap();
            }
        }
    }
    writeln!(out, "];").unwrap();

    let out_dir = env::var("OUT_DIR").unwrap();
    fs::write(Path::new(&out_dir).join("variants.rs"), out).unwrap();
}

fn selected_elements() -> Vec<(&'static str, &'static str)> {
    let names = match env_parse_list::<String>(env_build::PGATTN_BUILD_DTYPES) {
        Ok(Some(names)) => names,
        Ok(None) => return ELEMENTS.to_vec(),
        Err(e) => panic!("{e}"),
    };

    names
        .iter()
        .map(|name| {
            let name = name.to_ascii_lowercase();
            ELEMENTS
                .iter()
                .copied()
                .find(|(known, _)| *known == name)
                .unwrap_or_else(|| {
                    panic!(
                        "{}: unsupported element type '{}', expected one of {:?}",
                        env_build::PGATTN_BUILD_DTYPES,
                        name,
                        ELEMENTS.iter().map(|(n, _)| *n).collect::<Vec<_>>()
                    )
                })
        })
        .fold(Vec::new(), |mut acc, item| {
            if !acc.contains(&item) {
                acc.push(item);
            }
            acc
        })
}

/// Values from `var`, or the whole supported set when unset.
fn selected(var: &str, supported: &[usize], parse: impl Fn(&str) -> Option<usize>) -> Vec<usize> {
    let items = match env_parse_list::<String>(var) {
        Ok(Some(items)) => items,
        Ok(None) => return supported.to_vec(),
        Err(e) => panic!("{e}"),
    };

    let mut values: Vec<usize> = items
        .iter()
        .map(|item| match parse(item) {
            Some(value) if supported.contains(&value) => value,
            _ => panic!(
                "{}: unsupported value '{}', expected a subset of {:?}",
                var, item, supported
            ),
        })
        .collect();
    values.sort_unstable();
    values.dedup();
    values
}
