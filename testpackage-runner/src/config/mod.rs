// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration support for testpackage.
//!
//! A [`RunConfig`] is layered from an embedded default config, the optional
//! `.testpackage/config.toml` in the working directory, and the `TESTPACKAGE_PACKAGE` environment
//! variable. Command-line flags are applied on top by the caller.
//!
//! Package names are resolved separately by [`resolve_packages`], since the manifest attribute
//! takes precedence over the config file.

mod fail_fast;
mod imp;
mod manifest;
mod max_fail;

pub use fail_fast::*;
pub use imp::*;
pub use manifest::*;
pub use max_fail::*;
