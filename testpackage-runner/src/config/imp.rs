// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::FailFast;
use crate::{errors::ConfigParseError, history::HistoryStore};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Configuration for a single testpackage run.
///
/// Built once at startup and passed explicitly to the components that need it.
#[derive(Clone, Debug)]
pub struct RunConfig {
    workdir: Utf8PathBuf,
    packages: Vec<String>,
    fail_fast: FailFast,
    history_path: Utf8PathBuf,
    junit: Option<JunitConfig>,
}

impl RunConfig {
    /// The default config, which repository configuration is layered on top of.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The location of the config file, relative to the working directory.
    pub const CONFIG_PATH: &'static str = ".testpackage/config.toml";

    /// Environment configuration uses this prefix, plus a `_`.
    pub const ENVIRONMENT_PREFIX: &'static str = "TESTPACKAGE";

    /// The only key read from the environment.
    const ENVIRONMENT_KEY: &'static str = "package";

    /// Reads the config from the default config, the config file and the process environment.
    ///
    /// If `config_file` is `None`, `<workdir>/.testpackage/config.toml` is used if it exists.
    pub fn from_sources(
        workdir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_env(workdir, config_file, std::env::vars())
    }

    /// Like [`Self::from_sources`], but reads environment variables from `env` rather than the
    /// process environment.
    pub fn from_sources_with_env(
        workdir: &Utf8Path,
        config_file: Option<&Utf8Path>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workdir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let env_var = format!(
            "{}_{}",
            Self::ENVIRONMENT_PREFIX,
            Self::ENVIRONMENT_KEY.to_uppercase()
        );
        let env_source: config::Map<String, String> = env
            .into_iter()
            .filter(|(key, value)| *key == env_var && !value.is_empty())
            .collect();

        let builder = Self::make_default_config().add_source(source).add_source(
            Environment::with_prefix(Self::ENVIRONMENT_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key(Self::ENVIRONMENT_KEY)
                .source(Some(env_source)),
        );

        let (deserialized, unknown) = Self::build_and_deserialize_config(builder)
            .map_err(|error| ConfigParseError::new(&config_file, error))?;
        if !unknown.is_empty() {
            warn!(
                "ignoring unknown config keys in {config_file}: {}",
                itertools::join(&unknown, ", ")
            );
        }

        Ok(Self::from_deserialized(workdir, deserialized))
    }

    /// Returns the working directory that relative paths are resolved against.
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    /// Returns the configured default package names.
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Returns the fail-fast setting.
    pub fn fail_fast(&self) -> FailFast {
        self.fail_fast
    }

    /// Overrides the fail-fast setting, typically from the command line.
    pub fn set_fail_fast(&mut self, fail_fast: FailFast) -> &mut Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Returns the absolute path of the history file.
    pub fn history_path(&self) -> &Utf8Path {
        &self.history_path
    }

    /// Returns the JUnit settings, or `None` if JUnit reporting is disabled.
    pub fn junit(&self) -> Option<&JunitConfig> {
        self.junit.as_ref()
    }

    /// Disables JUnit reporting.
    pub fn disable_junit(&mut self) -> &mut Self {
        self.junit = None;
        self
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<(RunConfigDeserialize, BTreeSet<String>), config::ConfigError> {
        let config = builder.build()?;

        let mut ignored = BTreeSet::new();
        let deserialized: RunConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })?;

        Ok((deserialized, ignored))
    }

    fn from_deserialized(workdir: &Utf8Path, deserialized: RunConfigDeserialize) -> Self {
        let RunConfigDeserialize {
            package,
            fail_fast,
            history_path,
            junit,
        } = deserialized;

        let junit = junit.enabled.then(|| JunitConfig {
            path: workdir.join(junit.path),
            report_name: junit.report_name,
        });

        Self {
            workdir: workdir.to_owned(),
            packages: package,
            fail_fast,
            // join returns history_path unchanged if it is absolute.
            history_path: workdir.join(history_path),
            junit,
        }
    }
}

/// JUnit reporting settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JunitConfig {
    path: Utf8PathBuf,
    report_name: String,
}

impl JunitConfig {
    /// Creates new JUnit settings.
    pub fn new(path: impl Into<Utf8PathBuf>, report_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            report_name: report_name.into(),
        }
    }

    /// Returns the absolute path to the JUnit report.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the name of the report.
    pub fn report_name(&self) -> &str {
        &self.report_name
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunConfigDeserialize {
    #[serde(default)]
    package: Vec<String>,
    fail_fast: FailFast,
    #[serde(default = "default_history_path")]
    history_path: Utf8PathBuf,
    junit: JunitConfigDeserialize,
}

fn default_history_path() -> Utf8PathBuf {
    HistoryStore::DEFAULT_PATH.into()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunitConfigDeserialize {
    enabled: bool,
    path: Utf8PathBuf,
    report_name: String,
}
