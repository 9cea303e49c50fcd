// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::{
    RunObserver,
    events::{TestEvent, TestEventKind},
};
use crate::{
    errors::{DisplayErrorChain, HistorySaveError},
    history::{HistoryStore, next_generation},
    list::TestKey,
    runner::RunControl,
};
use std::collections::BTreeSet;
use tracing::{debug, error};

/// Tracks which keys were started and which failed, and commits the next generation of counters
/// to a [`HistoryStore`].
///
/// The store is saved exactly once: by [`Self::finish`], or when the recorder is dropped without
/// being finished (for example, if the engine panicked mid-run). If the run never reached its
/// `RunFinished` event, the counters are advanced with whatever was recorded so far.
#[derive(Debug)]
pub struct HistoryRecorder {
    store: Option<HistoryStore>,
    started: BTreeSet<TestKey>,
    failed: BTreeSet<TestKey>,
    advanced: bool,
}

impl HistoryRecorder {
    /// Creates a recorder that will commit to `store`.
    pub fn new(store: HistoryStore) -> Self {
        Self {
            store: Some(store),
            started: BTreeSet::new(),
            failed: BTreeSet::new(),
            advanced: false,
        }
    }

    /// Marks a method and its declaring class as failed in this run.
    pub fn mark_failure(&mut self, key: &TestKey, class_key: &TestKey) {
        self.failed.insert(key.clone());
        self.failed.insert(class_key.clone());
    }

    /// Returns the keys marked as failed so far.
    pub fn failed_keys(&self) -> &BTreeSet<TestKey> {
        &self.failed
    }

    /// Advances the counters if that hasn't happened yet, and saves the store.
    pub fn finish(mut self) -> Result<(), HistorySaveError> {
        self.commit()
    }

    fn advance(&mut self) {
        if self.advanced {
            return;
        }
        self.advanced = true;
        if let Some(store) = &mut self.store {
            let next = next_generation(store.counters(), &self.started, &self.failed);
            debug!(
                "advancing history: {} keys started, {} failed, {} entries after commit",
                self.started.len(),
                self.failed.len(),
                next.len(),
            );
            store.replace_counters(next);
        }
    }

    fn commit(&mut self) -> Result<(), HistorySaveError> {
        self.advance();
        match self.store.take() {
            Some(store) => store.save(),
            None => Ok(()),
        }
    }
}

impl RunObserver for HistoryRecorder {
    fn handle_event(&mut self, event: &TestEvent<'_>, _control: &mut RunControl) {
        match &event.kind {
            TestEventKind::TestStarted { unit, .. } => {
                self.started.insert(unit.key().clone());
                self.started.insert(unit.class_key().clone());
            }
            TestEventKind::TestFailure { unit, .. } => {
                self.mark_failure(unit.key(), unit.class_key());
            }
            TestEventKind::RunFinished { .. } => self.advance(),
            TestEventKind::RunStarted { .. }
            | TestEventKind::TestFinished { .. }
            | TestEventKind::TestIgnored { .. }
            | TestEventKind::RunBeginCancel { .. } => {}
        }
    }
}

impl Drop for HistoryRecorder {
    fn drop(&mut self) {
        if self.store.is_none() {
            return;
        }
        if let Err(err) = self.commit() {
            error!("{}", DisplayErrorChain::new(err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::FailFast,
        history::HistoryCounters,
        list::TestCase,
        runner::RunCoordinator,
        test_helpers::{ScriptedEngine, plan_for, run_config},
    };
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn run_ages_and_resets_counters() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let config = run_config(temp_dir.path(), FailFast::DISABLED);
        let mut store = HistoryStore::empty(config.history_path());
        store.replace_counters(HistoryCounters::from([
            (TestKey::class("ClassName"), 0),
            (TestKey::method("methodName", "ClassName"), 0),
        ]));
        store.save().unwrap();

        let mut engine = ScriptedEngine::new([
            TestCase::new("ClassName", "methodName"),
            TestCase::new("JustFailedClass", "justFailedMethod"),
        ])
        .fail("justFailedMethod", "JustFailedClass", &["failed"]);
        let store = HistoryStore::load(config.history_path()).unwrap();
        let plan = plan_for(&engine, store.counters());

        let mut recorder = HistoryRecorder::new(store);
        RunCoordinator::new(&mut engine, &plan, &config)
            .unwrap()
            .run(&mut [&mut recorder]);
        recorder.finish().unwrap();

        let saved = HistoryStore::load(config.history_path()).unwrap();
        assert_eq!(
            saved.counters(),
            &HistoryCounters::from([
                (TestKey::class("ClassName"), 1),
                (TestKey::class("JustFailedClass"), 0),
                (TestKey::method("justFailedMethod", "JustFailedClass"), 0),
                (TestKey::method("methodName", "ClassName"), 1),
            ]),
        );
    }

    #[test]
    fn mark_failure_without_events() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let path = temp_dir.path().join("history.txt");
        let mut store = HistoryStore::empty(&path);
        store.replace_counters(HistoryCounters::from([
            (TestKey::class("ClassName"), 0),
            (TestKey::method("methodName", "ClassName"), 0),
        ]));

        let mut recorder = HistoryRecorder::new(store);
        recorder.mark_failure(
            &TestKey::method("justFailedMethod", "JustFailedClass"),
            &TestKey::class("JustFailedClass"),
        );
        assert_eq!(recorder.failed_keys().len(), 2);
        recorder.finish().unwrap();

        let saved = HistoryStore::load(&path).unwrap();
        assert_eq!(saved.get("ClassName"), Some(1));
        assert_eq!(saved.get("methodName(ClassName)"), Some(1));
        assert_eq!(saved.get("JustFailedClass"), Some(0));
        assert_eq!(saved.get("justFailedMethod(JustFailedClass)"), Some(0));
    }

    #[test]
    fn saved_on_drop_after_panic() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let config = run_config(temp_dir.path(), FailFast::DISABLED);
        let mut engine = ScriptedEngine::new([
            TestCase::new("c", "a"),
            TestCase::new("c", "b"),
            TestCase::new("c", "c"),
        ])
        .fail("a", "c", &["failed"])
        .panic("b", "c");
        let plan = plan_for(&engine, &HistoryCounters::new());

        let store = HistoryStore::load(config.history_path()).unwrap();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut recorder = HistoryRecorder::new(store);
            RunCoordinator::new(&mut engine, &plan, &config)
                .unwrap()
                .run(&mut [&mut recorder]);
        }));
        assert!(result.is_err(), "the scripted engine panicked");

        let saved = HistoryStore::load(config.history_path()).unwrap();
        assert_eq!(
            saved.counters(),
            &HistoryCounters::from([
                (TestKey::class("c"), 0),
                (TestKey::method("a", "c"), 0),
                (TestKey::method("b", "c"), 0),
            ]),
            "units that started before the panic are committed"
        );
    }

    #[test]
    fn saved_on_drop_without_finish() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let path = temp_dir.path().join(".testpackage/history.txt");

        drop(HistoryRecorder::new(HistoryStore::empty(&path)));
        assert!(path.exists(), "dropping an unfinished recorder saves the store");
    }

    #[test]
    fn finish_reports_save_error() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut recorder = HistoryRecorder::new(HistoryStore::empty(blocker.join("history.txt")));
        recorder.mark_failure(&TestKey::method("a", "c"), &TestKey::class("c"));
        let error = recorder.finish().unwrap_err();
        assert!(
            matches!(error, HistorySaveError::CreateDir { .. }),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn save_error_on_drop_is_logged() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("history.txt");

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut recorder = HistoryRecorder::new(HistoryStore::empty(&path));
            recorder.mark_failure(&TestKey::method("a", "c"), &TestKey::class("c"));
            drop(recorder);
        }));
        assert!(result.is_ok(), "a failed save on drop does not panic");
        assert!(!path.exists());
    }
}
