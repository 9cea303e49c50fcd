// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::MaxFail;
use serde::Deserialize;
use std::fmt;

/// The `fail-fast` setting: a boolean, or a table with a `max-fail` key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FailFast {
    max_fail: MaxFail,
}

impl FailFast {
    /// Fail fast is disabled: every test runs.
    pub const DISABLED: Self = Self {
        max_fail: MaxFail::All,
    };

    /// Creates a new fail-fast setting from a max-fail value.
    pub fn new(max_fail: MaxFail) -> Self {
        Self { max_fail }
    }

    /// Creates a new fail-fast setting from a boolean flag.
    pub fn from_flag(fail_fast: bool) -> Self {
        Self::new(MaxFail::from_fail_fast(fail_fast))
    }

    /// Returns the max-fail value.
    pub fn max_fail(&self) -> MaxFail {
        self.max_fail
    }

    /// Returns true if the run can be aborted early.
    pub fn is_enabled(&self) -> bool {
        self.max_fail != MaxFail::All
    }
}

impl fmt::Display for FailFast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_fail {
            MaxFail::All => write!(f, "false"),
            max_fail if max_fail == MaxFail::from_fail_fast(true) => write!(f, "true"),
            MaxFail::Count(n) => write!(f, "max-fail = {n}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FailFastHelper {
    #[serde(rename = "max-fail")]
    max_fail: MaxFail,
}

impl<'de> Deserialize<'de> for FailFast {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = FailFast;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a boolean or a max-fail configuration")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(FailFast::from_flag(v))
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let helper =
                    FailFastHelper::deserialize(serde::de::value::MapAccessDeserializer::new(map))?;

                Ok(FailFast::new(helper.max_fail))
            }
        }

        deserializer.deserialize_any(V)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use std::num::NonZeroUsize;
    use test_case::test_case;

    #[test_case(
        "fail-fast = true",
        Some(FailFast::from_flag(true))
        ; "boolean true"
    )]
    #[test_case(
        "fail-fast = false",
        Some(FailFast::DISABLED)
        ; "boolean false"
    )]
    #[test_case(
        "fail-fast = { max-fail = 1 }",
        Some(FailFast::from_flag(true))
        ; "max-fail 1 is fail-fast"
    )]
    #[test_case(
        "fail-fast = { max-fail = 3 }",
        Some(FailFast::new(MaxFail::Count(NonZeroUsize::new(3).unwrap())))
        ; "max-fail 3"
    )]
    #[test_case(
        indoc! {r#"
            fail-fast = { max-fail = "all" }
        "#},
        Some(FailFast::DISABLED)
        ; "max-fail all"
    )]
    #[test_case(
        "fail-fast = { max-fail = 0 }",
        None
        ; "invalid zero max-fail"
    )]
    #[test_case(
        "fail-fast = { invalid-key = 1 }",
        None
        ; "invalid map key"
    )]
    #[test_case(
        r#"fail-fast = "true""#,
        None
        ; "string boolean not allowed"
    )]
    fn parse_fail_fast(config_contents: &str, fail_fast: Option<FailFast>) {
        let workdir = Utf8TempDir::new().unwrap();
        let config_file = workdir.path().join("config.toml");
        std::fs::write(&config_file, config_contents).unwrap();

        let config = RunConfig::from_sources_with_env(
            workdir.path(),
            Some(&config_file),
            std::iter::empty(),
        );

        match fail_fast {
            None => assert!(config.is_err(), "expected error, got {config:?}"),
            Some(expected) => assert_eq!(config.unwrap().fail_fast(), expected),
        }
    }
}
