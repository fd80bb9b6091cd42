// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod capture;
pub mod components;
pub mod config;
pub mod constants;
pub mod error;
pub mod helm;
pub mod installer;
pub mod kubernetes;
pub mod readiness;

#[cfg(test)]
pub mod test_utils;
