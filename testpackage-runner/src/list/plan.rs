// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

use super::TestKey;
use crate::sequencer::Rank;
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};

/// An ordered tree of classes and methods, produced by the
/// [`Sequencer`](crate::sequencer::Sequencer).
///
/// Immutable once built.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionPlan {
    classes: Vec<ClassPlan>,
}

impl ExecutionPlan {
    pub(crate) fn new(classes: Vec<ClassPlan>) -> Self {
        Self { classes }
    }

    /// Returns the classes in execution order.
    pub fn classes(&self) -> &[ClassPlan] {
        &self.classes
    }

    /// Iterates over every unit in execution order.
    pub fn units(&self) -> impl Iterator<Item = TestUnit<'_>> + '_ {
        self.classes.iter().flat_map(|class| {
            class
                .methods
                .iter()
                .map(move |method| TestUnit { class, method })
        })
    }

    /// Returns the total number of units, including ignored ones.
    pub fn unit_count(&self) -> usize {
        self.classes.iter().map(|class| class.methods.len()).sum()
    }

    /// Returns the number of units that will be executed.
    pub fn run_count(&self) -> usize {
        self.units().filter(|unit| !unit.method.ignored).count()
    }

    /// Returns true if the plan has no units.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Writes the plan in execution order, one class per line followed by its methods, each
    /// annotated with the rank it was sequenced with.
    pub fn write_human(&self, mut writer: impl Write, colorize: bool) -> io::Result<()> {
        let mut styles = Styles::default();
        if colorize {
            styles.colorize();
        }

        for class in &self.classes {
            writeln!(
                writer,
                "{} ({})",
                class.name.style(styles.class),
                class.rank.style(styles.rank(class.rank)),
            )?;
            for method in &class.methods {
                write!(
                    writer,
                    "    {} ({})",
                    method.name.style(styles.method),
                    method.rank.style(styles.rank(method.rank)),
                )?;
                if method.ignored {
                    write!(writer, " {}", "[ignored]".style(styles.ignored))?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    }
}

/// A class in an [`ExecutionPlan`], with its methods in execution order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassPlan {
    /// The class name.
    pub name: String,

    /// The history key of this class.
    pub key: TestKey,

    /// The rank this class was sequenced with.
    pub rank: Rank,

    /// The methods of this class, in execution order.
    pub methods: Vec<MethodPlan>,
}

impl ClassPlan {
    /// Returns the last `::`-separated segment of the class name.
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit_once("::")
            .map_or(self.name.as_str(), |(_, short)| short)
    }
}

/// A method in a [`ClassPlan`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MethodPlan {
    /// The method name.
    pub name: String,

    /// The history key of this method.
    pub key: TestKey,

    /// The rank this method was sequenced with.
    pub rank: Rank,

    /// True if the engine reported this method as ignored.
    pub ignored: bool,
}

/// A single unit of execution: a method along with its declaring class.
#[derive(Clone, Copy, Debug)]
pub struct TestUnit<'a> {
    /// The declaring class.
    pub class: &'a ClassPlan,

    /// The method.
    pub method: &'a MethodPlan,
}

#[derive(Clone, Debug, Default)]
struct Styles {
    class: Style,
    method: Style,
    recent_failure: Style,
    ignored: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.class = Style::new().bold();
        self.method = Style::new().blue().bold();
        self.recent_failure = Style::new().red();
        self.ignored = Style::new().yellow();
    }

    fn rank(&self, rank: Rank) -> Style {
        match rank {
            Rank::SinceFailure(_) => self.recent_failure,
            Rank::NeverFailed => Style::new(),
        }
    }
}

impl<'a> TestUnit<'a> {
    /// Returns the method key.
    pub fn key(&self) -> &'a TestKey {
        &self.method.key
    }

    /// Returns the class key.
    pub fn class_key(&self) -> &'a TestKey {
        &self.class.key
    }
}
