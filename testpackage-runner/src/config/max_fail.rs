// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::errors::MaxFailParseError;
use serde::Deserialize;
use std::{cmp::Ordering, fmt, num::NonZeroUsize, str::FromStr};

/// The number of failing tests after which a run is aborted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaxFail {
    /// Abort once this many tests have failed.
    Count(NonZeroUsize),

    /// Never abort: run every test.
    All,
}

impl MaxFail {
    /// Returns the max-fail corresponding to a fail-fast flag.
    pub fn from_fail_fast(fail_fast: bool) -> Self {
        if fail_fast {
            Self::Count(NonZeroUsize::MIN)
        } else {
            Self::All
        }
    }

    /// Returns true if `failed` failing tests reach the limit.
    pub fn is_exceeded(&self, failed: usize) -> bool {
        match self {
            Self::Count(n) => failed >= n.get(),
            Self::All => false,
        }
    }
}

impl FromStr for MaxFail {
    type Err = MaxFailParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        match s.parse::<isize>() {
            Err(e) => Err(MaxFailParseError::new(format!("error parsing `{s}`: {e}"))),
            Ok(j) => usize::try_from(j)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(Self::Count)
                .ok_or_else(|| MaxFailParseError::new("max-fail may not be <= 0")),
        }
    }
}

impl fmt::Display for MaxFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Count(n) => write!(f, "{n}"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxFail {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = MaxFail;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a positive integer or the string \"all\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                MaxFail::from_str(v).map_err(serde::de::Error::custom)
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v.cmp(&0) {
                    Ordering::Equal | Ordering::Less => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &"a positive integer",
                    )),
                    Ordering::Greater => usize::try_from(v)
                        .ok()
                        .and_then(NonZeroUsize::new)
                        .map(MaxFail::Count)
                        .ok_or_else(|| {
                            serde::de::Error::invalid_value(
                                serde::de::Unexpected::Signed(v),
                                &"an integer that fits in usize",
                            )
                        }),
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match i64::try_from(v) {
                    Ok(v) => self.visit_i64(v),
                    Err(_) => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &"an integer that fits in i64",
                    )),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}
