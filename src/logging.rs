//! Console logging with severity tags
//!
//! Diagnostics go to standard output as `[WARN] message key=value` lines.

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event formatter that prefixes each line with `[LEVEL]`
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedFormat;

/// Tag printed for a level
#[must_use]
pub fn tag(level: Level) -> &'static str {
    if level == Level::ERROR {
        "ERROR"
    } else if level == Level::WARN {
        "WARN"
    } else if level == Level::INFO {
        "INFO"
    } else if level == Level::DEBUG {
        "DEBUG"
    } else {
        "TRACE"
    }
}

impl<S, N> FormatEvent<S, N> for TaggedFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[{}] ", tag(*event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter directives for a `-v` count
#[must_use]
pub const fn directives(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,julia_assistant=debug",
        1 => "info,julia_assistant=trace",
        _ => "trace",
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the verbosity flag
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .event_format(TaggedFormat)
        .init();
}
