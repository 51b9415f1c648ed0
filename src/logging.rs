//! Stderr log formatting (§6): every line is `<program-name>: <tag><message>`,
//! where `tag` is an uppercase keyword (`+INFO: `, `-INFO: `, `-ERR: `) or
//! empty for trace-level wire/debug chatter. Built on `tracing` +
//! `tracing-subscriber`'s pluggable `FormatEvent`, so the crate keeps
//! `tracing`'s level/span machinery while still emitting byte-for-byte the
//! wire format the spec requires.

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Renders events as `<program>: <TAG><fields>\n`. Wire-trace lines (logged
/// at `target: "uxfs::wire"`) are passed through with no tag, since
/// `channel::wire` already prefixes them with `>> `/`<< `.
pub struct WireFormat {
    program: String,
}

impl WireFormat {
    pub fn new(program: impl Into<String>) -> Self {
        WireFormat { program: program.into() }
    }
}

impl<S, N> FormatEvent<S, N> for WireFormat
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
        let meta = event.metadata();
        let tag = if meta.target() == "uxfs::wire" {
            ""
        } else {
            match *meta.level() {
                Level::ERROR => "-ERR: ",
                Level::WARN => "-INFO: ",
                Level::INFO => "+INFO: ",
                Level::DEBUG | Level::TRACE => "-INFO: ",
            }
        };
        write!(writer, "{}: {}", self.program, tag)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Maps the repeatable `-v` flag and the `dbg=<N>` option to a `tracing`
/// level floor. No `-v` keeps only `WARN`/`ERROR` (still enough for the
/// mandatory `+INFO`/`-INFO`/`-ERR` lines, which are logged at those
/// levels); `-v` adds `DEBUG`; `-vv` adds `TRACE`. `dbg=<N>` overrides this
/// floor directly when it asks for something more verbose.
pub fn level_for(verbosity: u8, dbg_level: Option<u32>) -> Level {
    let from_v = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let from_dbg = match dbg_level {
        Some(0) | None => Level::WARN,
        Some(1) => Level::DEBUG,
        Some(_) => Level::TRACE,
    };
    // `tracing::Level` orders by verbosity (`TRACE` is the "largest"), so
    // the floor is whichever of the two asked for more detail.
    std::cmp::max(from_v, from_dbg)
}

/// Installs the global subscriber. `wire_debug` independently turns on the
/// `>> `/`<< ` wire trace (logged at `DEBUG` under `uxfs::wire`) regardless
/// of the verbosity-derived level floor.
pub fn init(program: &str, verbosity: u8, dbg_level: Option<u32>, wire_debug: bool) {
    let mut level = level_for(verbosity, dbg_level);
    if wire_debug && level < Level::DEBUG {
        level = Level::DEBUG;
    }
    let subscriber = tracing_subscriber::fmt()
        .event_format(WireFormat::new(program))
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("{program}: -INFO: logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_stays_at_warn() {
        assert_eq!(level_for(0, None), Level::WARN);
    }

    #[test]
    fn verbose_flags_escalate() {
        assert_eq!(level_for(1, None), Level::DEBUG);
        assert_eq!(level_for(2, None), Level::TRACE);
    }

    #[test]
    fn dbg_level_only_raises_the_floor_never_lowers_it() {
        assert_eq!(level_for(2, Some(0)), Level::TRACE);
        assert_eq!(level_for(0, Some(2)), Level::TRACE);
        assert_eq!(level_for(0, Some(1)), Level::DEBUG);
    }
}
