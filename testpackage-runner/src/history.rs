// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage and retrieval of per-test failure history.
//!
//! The history file is line-oriented: one `<key>\t<runs since last failure>` entry per line,
//! sorted by key so that it diffs cleanly across runs. Fields after the count are ignored, and
//! lines that cannot be parsed are skipped with a warning: history only affects ordering, so a
//! damaged file should never stop a run.

use crate::{
    errors::{HistoryClearError, HistoryLoadError, HistorySaveError},
    list::TestKey,
};
use bstr::ByteSlice;
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::{self, Write},
};
use swrite::{SWrite, swriteln};
use tracing::{debug, warn};

/// A mapping from test keys to the number of runs since each key last failed.
pub type HistoryCounters = BTreeMap<TestKey, u32>;

static HEADER: &str = "# testpackage history: <key>\t<runs since last failure>";

/// The persisted failure history for a working directory.
#[derive(Clone, Debug)]
pub struct HistoryStore {
    path: Utf8PathBuf,
    counters: HistoryCounters,
}

impl HistoryStore {
    /// The default location of the history file, relative to the working directory.
    pub const DEFAULT_PATH: &'static str = ".testpackage/history.txt";

    /// Creates an empty store that will be saved to `path`.
    pub fn empty(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            counters: HistoryCounters::new(),
        }
    }

    /// Loads the store from `path`.
    ///
    /// A missing file produces an empty store.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self, HistoryLoadError> {
        let path = path.into();
        match fs::read(&path) {
            Ok(contents) => {
                let counters = parse_history(&path, &contents);
                debug!("loaded {} history entries from {path}", counters.len());
                Ok(Self { path, counters })
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("no history file at {path}, starting with empty history");
                Ok(Self::empty(path))
            }
            Err(error) => Err(HistoryLoadError::Read { path, error }),
        }
    }

    /// Returns the path this store is saved to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the counters.
    pub fn counters(&self) -> &HistoryCounters {
        &self.counters
    }

    /// Returns the number of runs since `key` last failed, if it is known.
    pub fn get(&self, key: &str) -> Option<u32> {
        self.counters.get(key).copied()
    }

    /// Iterates over the entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&TestKey, u32)> + '_ {
        self.counters.iter().map(|(key, &runs)| (key, runs))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns true if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Replaces the counters with the next generation.
    pub(crate) fn replace_counters(&mut self, counters: HistoryCounters) {
        self.counters = counters;
    }

    /// Writes every entry to disk, in key order.
    ///
    /// The file and its parent directory are created even if there are no entries.
    pub fn save(&self) -> Result<(), HistorySaveError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| HistorySaveError::CreateDir {
                path: parent.to_owned(),
                error,
            })?;
        }

        let contents = serialize_history(&self.counters);
        atomicwrites::AtomicFile::new(&self.path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(contents.as_bytes()))
            .map_err(|error| HistorySaveError::Write {
                path: self.path.clone(),
                error,
            })?;

        debug!(entries = self.counters.len(), path = %self.path, "saved history");
        Ok(())
    }

    /// Removes the history file.
    ///
    /// A missing file is not an error.
    pub fn clear(&mut self) -> Result<(), HistoryClearError> {
        self.counters.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(HistoryClearError::Remove {
                path: self.path.clone(),
                error,
            }),
        }
    }
}

/// Computes the counters for the next run.
///
/// Every key that is either already known or was started this run gets an entry. Keys that failed
/// reset to 0, previously known keys that did not fail age by one, and keys seen for the first
/// time start at 0.
pub fn next_generation(
    previous: &HistoryCounters,
    started: &BTreeSet<TestKey>,
    failed: &BTreeSet<TestKey>,
) -> HistoryCounters {
    let all_keys: BTreeSet<&TestKey> = previous.keys().chain(started).chain(failed).collect();

    all_keys
        .into_iter()
        .map(|key| {
            let next = if failed.contains(key) {
                0
            } else {
                previous
                    .get(key)
                    .map_or(0, |&runs| runs.saturating_add(1))
            };
            (key.clone(), next)
        })
        .collect()
}

fn parse_history(path: &Utf8Path, contents: &[u8]) -> HistoryCounters {
    let mut counters = HistoryCounters::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line_no = line_no + 1;
        let Ok(line) = line.to_str() else {
            warn!("{path}:{line_no}: skipping history line that is not valid UTF-8");
            continue;
        };
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split('\t');
        let key = fields.next().unwrap_or_default();
        let runs = fields.next().map(|runs| runs.trim().parse::<u32>());
        match (key, runs) {
            ("", _) => {
                warn!("{path}:{line_no}: skipping history line with an empty key");
            }
            (key, Some(Ok(runs))) => {
                counters.insert(TestKey::new(key), runs);
            }
            (key, Some(Err(error))) => {
                warn!("{path}:{line_no}: skipping history entry for `{key}`: invalid count ({error})");
            }
            (key, None) => {
                warn!("{path}:{line_no}: skipping history entry for `{key}`: missing count");
            }
        }
    }

    counters
}

fn serialize_history(counters: &HistoryCounters) -> String {
    let mut out = String::with_capacity(64 + counters.len() * 48);
    swriteln!(out, "{HEADER}");
    for (key, runs) in counters {
        swriteln!(out, "{key}\t{runs}");
    }
    out
}
