// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::RunConfig;
use crate::errors::ManifestReadError;
use camino::Utf8Path;
use std::{fs, io};
use toml::Value;
use tracing::debug;

/// Where the package names for a run came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PackageSource {
    /// Given on the command line.
    CommandLine,

    /// The `[package.metadata.testpackage] package` attribute in `Cargo.toml`.
    Manifest,

    /// The `package` key in the config file or the `TESTPACKAGE_PACKAGE` environment variable.
    Config,
}

/// Resolves the packages to run.
///
/// Packages given on the command line always win. Otherwise the `Cargo.toml` in the working
/// directory is consulted, and finally the config. Returns `None` if no source names a package.
pub fn resolve_packages(
    cli_packages: &[String],
    config: &RunConfig,
) -> Result<Option<(Vec<String>, PackageSource)>, ManifestReadError> {
    if !cli_packages.is_empty() {
        return Ok(Some((cli_packages.to_vec(), PackageSource::CommandLine)));
    }

    if let Some(packages) = read_manifest_packages(&config.workdir().join("Cargo.toml"))? {
        return Ok(Some((packages, PackageSource::Manifest)));
    }

    if !config.packages().is_empty() {
        return Ok(Some((config.packages().to_vec(), PackageSource::Config)));
    }

    Ok(None)
}

/// Reads `[package.metadata.testpackage] package` from a Cargo manifest.
///
/// Returns `None` if the manifest does not exist or has no such attribute.
pub fn read_manifest_packages(
    manifest_path: &Utf8Path,
) -> Result<Option<Vec<String>>, ManifestReadError> {
    let contents = match fs::read_to_string(manifest_path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!("no manifest at {manifest_path}");
            return Ok(None);
        }
        Err(error) => {
            return Err(ManifestReadError::Read {
                path: manifest_path.to_owned(),
                error,
            });
        }
    };

    let manifest: toml::Table =
        toml::from_str(&contents).map_err(|error| ManifestReadError::Parse {
            path: manifest_path.to_owned(),
            error,
        })?;

    let Some(attribute) = manifest
        .get("package")
        .and_then(|package| package.get("metadata"))
        .and_then(|metadata| metadata.get("testpackage"))
        .and_then(|testpackage| testpackage.get("package"))
    else {
        return Ok(None);
    };

    let invalid = || ManifestReadError::InvalidPackage {
        path: manifest_path.to_owned(),
    };
    let packages = match attribute {
        Value::String(package) => vec![package.clone()],
        Value::Array(packages) => packages
            .iter()
            .map(|package| package.as_str().map(str::to_owned).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(invalid()),
    };

    Ok((!packages.is_empty()).then_some(packages))
}
