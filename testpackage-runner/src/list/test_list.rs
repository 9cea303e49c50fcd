// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use std::{borrow::Borrow, fmt};

/// The identity of a test class or a test method, used as the key into the history store.
///
/// Class keys are the class name itself (`my_tests::parser`). Method keys have the form
/// `method(class)` (`parses_empty_input(my_tests::parser)`). The presence of `(` is the only thing
/// that distinguishes the two.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TestKey(String);

impl TestKey {
    /// Creates a key from its string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key for a test class.
    pub fn class(class_name: &str) -> Self {
        Self(class_name.to_owned())
    }

    /// Returns the key for a test method declared by `class_name`.
    pub fn method(method_name: &str, class_name: &str) -> Self {
        Self(format!("{method_name}({class_name})"))
    }

    /// Returns true if this is a method key.
    pub fn is_method(&self) -> bool {
        self.0.contains('(')
    }

    /// Returns the key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TestKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single test reported by an engine during discovery.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestCase {
    /// The declaring class.
    pub class_name: String,

    /// The method name, unique within its class.
    pub method_name: String,

    /// True if the engine reports this test as ignored: it is planned but never executed.
    pub ignored: bool,
}

impl TestCase {
    /// Creates a new, non-ignored test case.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            ignored: false,
        }
    }

    /// Marks this test case as ignored.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// The set of tests discovered in the requested packages.
///
/// Order is not significant.
#[derive(Clone, Debug, Default)]
pub struct TestList {
    test_cases: Vec<TestCase>,
}

impl TestList {
    /// Creates a new test list.
    pub fn new(test_cases: impl IntoIterator<Item = TestCase>) -> Self {
        Self {
            test_cases: test_cases.into_iter().collect(),
        }
    }

    /// Adds a test case.
    pub fn push(&mut self, test_case: TestCase) {
        self.test_cases.push(test_case);
    }

    /// Returns the number of test cases, including ignored ones.
    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    /// Returns true if no tests were discovered.
    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    /// Iterates over the discovered test cases.
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> + '_ {
        self.test_cases.iter()
    }
}

impl FromIterator<TestCase> for TestList {
    fn from_iter<T: IntoIterator<Item = TestCase>>(iter: T) -> Self {
        Self::new(iter)
    }
}
