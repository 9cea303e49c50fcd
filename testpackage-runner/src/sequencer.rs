// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Ordering of discovered tests by failure history.
//!
//! Classes are ordered by `(rank(class), class name)`, and methods within a class by
//! `(rank(method), method name)`. A class with a recent failure is therefore promoted as a whole,
//! and within it the specific method that failed runs ahead of its siblings. Without any history,
//! the order is plain lexicographic.

use crate::{
    history::HistoryCounters,
    list::{ClassPlan, ExecutionPlan, MethodPlan, TestKey, TestList},
};
use std::{collections::BTreeMap, fmt};
use tracing::debug;

/// The sort weight of a key: how many runs ago it last failed, or never.
///
/// `SinceFailure(_)` always sorts before `NeverFailed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Rank {
    /// The key failed this many runs ago. 0 means it failed in the last run.
    SinceFailure(u32),

    /// The key is not in the history store.
    NeverFailed,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::SinceFailure(0) => write!(f, "failed last run"),
            Rank::SinceFailure(1) => write!(f, "1 run since failure"),
            Rank::SinceFailure(n) => write!(f, "{n} runs since failure"),
            Rank::NeverFailed => write!(f, "never failed"),
        }
    }
}

/// Produces [`ExecutionPlan`]s from a test list and the history counters.
#[derive(Clone, Copy, Debug)]
pub struct Sequencer<'h> {
    counters: &'h HistoryCounters,
}

impl<'h> Sequencer<'h> {
    /// Creates a new sequencer over the given counters.
    pub fn new(counters: &'h HistoryCounters) -> Self {
        Self { counters }
    }

    /// Returns the rank of a key.
    pub fn rank(&self, key: &TestKey) -> Rank {
        self.counters
            .get(key)
            .map_or(Rank::NeverFailed, |&runs| Rank::SinceFailure(runs))
    }

    /// Orders the test list into an execution plan.
    ///
    /// This is a pure function of the test list and the counters. Duplicate (class, method)
    /// pairs are collapsed into one unit; a method is considered ignored only if every
    /// occurrence of it is.
    pub fn order(&self, test_list: &TestList) -> ExecutionPlan {
        // Group by declaring class.
        let mut grouped: BTreeMap<&str, BTreeMap<&str, bool>> = BTreeMap::new();
        for test_case in test_list.iter() {
            grouped
                .entry(test_case.class_name.as_str())
                .or_default()
                .entry(test_case.method_name.as_str())
                .and_modify(|ignored| *ignored &= test_case.ignored)
                .or_insert(test_case.ignored);
        }

        let mut classes: Vec<_> = grouped
            .into_iter()
            .map(|(class_name, methods)| {
                let mut methods: Vec<_> = methods
                    .into_iter()
                    .map(|(method_name, ignored)| {
                        let key = TestKey::method(method_name, class_name);
                        MethodPlan {
                            name: method_name.to_owned(),
                            rank: self.rank(&key),
                            key,
                            ignored,
                        }
                    })
                    .collect();
                methods.sort_by(|a, b| (a.rank, &a.name).cmp(&(b.rank, &b.name)));

                let key = TestKey::class(class_name);
                ClassPlan {
                    name: class_name.to_owned(),
                    rank: self.rank(&key),
                    key,
                    methods,
                }
            })
            .collect();
        classes.sort_by(|a, b| (a.rank, &a.name).cmp(&(b.rank, &b.name)));

        let plan = ExecutionPlan::new(classes);
        debug!(
            "sequenced {} units in {} classes ({} classes with failure history)",
            plan.unit_count(),
            plan.classes().len(),
            plan.classes()
                .iter()
                .filter(|class| class.rank != Rank::NeverFailed)
                .count(),
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::TestCase;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn plan_names(plan: &ExecutionPlan) -> Vec<(String, Vec<String>)> {
        plan.classes()
            .iter()
            .map(|class| {
                (
                    class.name.clone(),
                    class.methods.iter().map(|m| m.name.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn no_history_is_lexicographic() {
        let counters = HistoryCounters::new();
        let test_list = TestList::new([
            TestCase::new("simpletests::SimpleTest", "testTrue2"),
            TestCase::new("simpletests::SimpleTest", "testTrue1"),
        ]);

        let plan = Sequencer::new(&counters).order(&test_list);

        assert_eq!(
            plan_names(&plan),
            vec![(
                "simpletests::SimpleTest".to_owned(),
                vec!["testTrue1".to_owned(), "testTrue2".to_owned()],
            )],
        );
        assert_eq!(plan.unit_count(), 2);
    }

    #[test]
    fn recent_failure_is_promoted() {
        let class = "failureprioritisationtests::zzz_JustFailedTest";
        let counters = HistoryCounters::from([
            (TestKey::class(class), 0),
            (TestKey::method("testTrue", class), 0),
        ]);
        let test_list = TestList::new([
            TestCase::new("failureprioritisationtests::aaa_NoRecentFailuresTest", "testTrue"),
            TestCase::new(class, "testThatHasNotFailed"),
            TestCase::new(class, "testTrue"),
        ]);

        let plan = Sequencer::new(&counters).order(&test_list);

        assert_eq!(
            plan_names(&plan),
            vec![
                (
                    class.to_owned(),
                    vec!["testTrue".to_owned(), "testThatHasNotFailed".to_owned()],
                ),
                (
                    "failureprioritisationtests::aaa_NoRecentFailuresTest".to_owned(),
                    vec!["testTrue".to_owned()],
                ),
            ],
        );
        assert_eq!(plan.classes()[0].rank, Rank::SinceFailure(0));
        assert_eq!(plan.classes()[1].rank, Rank::NeverFailed);
    }

    #[test]
    fn lower_counts_sort_first() {
        let counters = HistoryCounters::from([
            (TestKey::class("a"), 7),
            (TestKey::class("b"), 2),
            (TestKey::method("m3", "c"), 4),
            (TestKey::method("m2", "c"), 4),
        ]);
        let test_list = TestList::new([
            TestCase::new("a", "x"),
            TestCase::new("b", "x"),
            TestCase::new("c", "m1"),
            TestCase::new("c", "m2"),
            TestCase::new("c", "m3"),
        ]);

        let plan = Sequencer::new(&counters).order(&test_list);

        assert_eq!(
            plan_names(&plan),
            vec![
                ("b".to_owned(), vec!["x".to_owned()]),
                ("a".to_owned(), vec!["x".to_owned()]),
                (
                    "c".to_owned(),
                    vec!["m2".to_owned(), "m3".to_owned(), "m1".to_owned()],
                ),
            ],
        );
    }

    #[test]
    fn duplicates_collapse() {
        let counters = HistoryCounters::new();
        let test_list = TestList::new([
            TestCase::new("c", "m").ignored(),
            TestCase::new("c", "m"),
            TestCase::new("c", "n").ignored(),
        ]);

        let plan = Sequencer::new(&counters).order(&test_list);

        assert_eq!(plan.unit_count(), 2);
        assert_eq!(plan.run_count(), 1);
        let methods = &plan.classes()[0].methods;
        assert!(!methods[0].ignored, "m is run because one occurrence is not ignored");
        assert!(methods[1].ignored);
    }

    #[test]
    fn rank_ordering() {
        assert!(Rank::SinceFailure(0) < Rank::SinceFailure(1));
        assert!(Rank::SinceFailure(u32::MAX) < Rank::NeverFailed);
    }

    fn test_cases() -> impl Strategy<Value = Vec<TestCase>> {
        prop::collection::vec(("[a-e]{1,3}", "[a-e]{1,3}"), 0..24).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(class, method)| TestCase::new(class, method))
                .collect()
        })
    }

    #[proptest(cases = 64)]
    fn empty_history_is_lexicographic(#[strategy(test_cases())] test_cases: Vec<TestCase>) {
        let counters = HistoryCounters::new();
        let plan = Sequencer::new(&counters).order(&TestList::new(test_cases));

        let class_names: Vec<_> = plan.classes().iter().map(|c| c.name.clone()).collect();
        let mut sorted = class_names.clone();
        sorted.sort();
        prop_assert_eq!(class_names, sorted);

        for class in plan.classes() {
            let names: Vec<_> = class.methods.iter().map(|m| m.name.clone()).collect();
            let mut sorted = names.clone();
            sorted.sort();
            prop_assert_eq!(names, sorted);
        }
    }

    #[proptest(cases = 64)]
    fn just_failed_sorts_first(
        #[strategy(test_cases())] test_cases: Vec<TestCase>,
        #[strategy(prop::collection::vec(0u32..5, 24))] counts: Vec<u32>,
    ) {
        // Give roughly half of the keys a history entry.
        let mut counters = HistoryCounters::new();
        for (test_case, count) in test_cases.iter().zip(&counts) {
            if count % 2 == 0 {
                counters.insert(TestKey::class(&test_case.class_name), count / 2);
            }
            if count % 3 == 0 {
                counters.insert(
                    TestKey::method(&test_case.method_name, &test_case.class_name),
                    count / 3,
                );
            }
        }

        let plan = Sequencer::new(&counters).order(&TestList::new(test_cases));

        let class_ranks: Vec<_> = plan.classes().iter().map(|c| c.rank).collect();
        prop_assert!(class_ranks.windows(2).all(|w| w[0] <= w[1]));
        if let Some(last_zero) = class_ranks
            .iter()
            .rposition(|rank| *rank == Rank::SinceFailure(0))
        {
            prop_assert!(
                class_ranks[..=last_zero]
                    .iter()
                    .all(|rank| *rank == Rank::SinceFailure(0))
            );
        }
        for class in plan.classes() {
            let ranks: Vec<_> = class.methods.iter().map(|m| m.rank).collect();
            prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        }

        // Identical inputs produce identical plans.
        let again = Sequencer::new(&counters).order(&TestList::new(
            plan.units()
                .map(|unit| TestCase::new(&unit.class.name, &unit.method.name))
                .collect::<Vec<_>>(),
        ));
        prop_assert_eq!(plan_names(&plan), plan_names(&again));
    }
}
