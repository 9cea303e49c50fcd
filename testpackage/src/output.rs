// Copyright (c) The testpackage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal output: colors, clap styling and the log formatter.
//!
//! All human-facing diagnostics go through `tracing` and are written to stderr. Test results are
//! written by the reporters in `testpackage-runner`; this module only decides whether they are
//! colorized.

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::fmt;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
    warn,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Events logged to this target are written without an `error:`-style heading. Used for
/// continuation lines such as error causes.
pub(crate) const NO_HEADING_TARGET: &str = "testpackage::no_heading";

/// The environment variable used to filter log output, in `tracing_subscriber` target syntax.
const LOG_ENV: &str = "TESTPACKAGE_LOG";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects, Style},
    };

    const HEADER: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);
    const LITERAL: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const PLACEHOLDER: Style = AnsiColor::Green.on_default();
    const ERROR: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);

    pub(crate) const fn style() -> Styles {
        Styles::styled()
            .header(HEADER)
            .usage(HEADER)
            .literal(LITERAL)
            .placeholder(PLACEHOLDER)
            .error(ERROR)
            .valid(LITERAL)
            .invalid(ERROR)
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Log debug messages, including how each run was sequenced
    #[arg(long, short, global = true, env = "TESTPACKAGE_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "TESTPACKAGE_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    /// Installs the global log subscriber. Verbosity only affects logging, so it is consumed
    /// here.
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        let mut styles = LogStyles::default();
        if color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }
        init_logging(verbose, styles);

        OutputContext { color }
    }
}

/// Output settings resolved from the command line.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    color: Color,
}

impl OutputContext {
    /// Returns true if output written to stderr (the run progress and summary) should be colored.
    pub(crate) fn colorize_stderr(self) -> bool {
        self.color.should_colorize(supports_color::Stream::Stderr)
    }

    /// Returns true if output written to stdout (`list`, `history`) should be colored.
    pub(crate) fn colorize_stdout(self) -> bool {
        self.color.should_colorize(supports_color::Stream::Stdout)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

fn init_logging(verbose: bool, styles: LogStyles) {
    INIT_LOGGER.call_once(|| {
        let env_value = std::env::var(LOG_ENV).unwrap_or_default();
        let (targets, parse_error) = log_targets(verbose, &env_value);

        let layer = tracing_subscriber::fmt::layer()
            .event_format(LogFormatter { styles })
            .with_writer(std::io::stderr)
            .with_filter(targets);
        tracing_subscriber::registry().with(layer).init();

        if let Some(error) = parse_error {
            warn!("ignoring invalid {LOG_ENV} value `{env_value}`: {error}");
        }
    });
}

/// Resolves the log filter. A non-empty `TESTPACKAGE_LOG` wins over `--verbose`; if it doesn't
/// parse, the default is used and the error returned for reporting once logging is up.
fn log_targets(verbose: bool, env_value: &str) -> (Targets, Option<String>) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let default_targets = Targets::new().with_default(default_level);

    if env_value.is_empty() {
        return (default_targets, None);
    }
    match env_value.parse::<Targets>() {
        Ok(targets) => (targets, None),
        Err(error) => (default_targets, Some(error.to_string())),
    }
}

/// Formats events as `<level>: <message> <field>=<value>...`.
///
/// Debug and trace events also carry their target, so that `-v` output shows which part of the
/// run (history, sequencing, engine) logged them.
struct LogFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for LogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();

        if metadata.target() != NO_HEADING_TARGET {
            let (heading, heading_style) = self.styles.heading(level);
            write!(writer, "{}: ", heading.style(heading_style))?;
            if level >= Level::DEBUG {
                write!(writer, "[{}] ", metadata.target().style(self.styles.target))?;
            }
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        write!(writer, "{}", visitor.message)?;
        for (name, value) in &visitor.fields {
            write!(writer, " {}={value}", name.style(self.styles.field))?;
        }
        writeln!(writer)
    }
}

static MESSAGE_FIELD: &str = "message";

/// Splits an event into its message and its remaining fields, in recorded order.
#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message = value.to_owned();
        } else {
            self.fields.push((field.name(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    target: Style,
    field: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().green().bold();
        self.debug = style().blue();
        self.target = style().dimmed();
        self.field = style().italic();
    }

    fn heading(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warning),
            Level::INFO => ("info", self.info),
            Level::DEBUG => ("debug", self.debug),
            Level::TRACE => ("trace", self.debug),
        }
    }
}
