//! Console logging.
//!
//! Vizor logs through [`tracing`]. [`install`] sets up a subscriber that writes
//! to stderr with a `[vizor]` prefix and routes panics through the same
//! output.

use std::io::{self, Write};
use std::panic::{self, PanicHookInfo};
use std::sync::Once;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, writer::MakeWriter};
use tracing_subscriber::prelude::*;

use crate::config::LogSettings;

const LOG_PREFIX: &str = "[vizor] ";

static TRACING_INSTALLED: Once = Once::new();
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Installs the console subscriber (idempotent).
///
/// `RUST_LOG` takes precedence over the configured filter. When another
/// subscriber is already installed, this does nothing.
pub fn install(settings: &LogSettings) {
    TRACING_INSTALLED.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&settings.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let console = fmt::layer()
            .with_writer(PrefixedWriter)
            .with_ansi(false)
            .with_filter(filter);

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            eprintln!("{LOG_PREFIX}a tracing subscriber is already installed");
        }
    });
}

/// Logs panics as `tracing` errors before running the previous hook (idempotent).
pub fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(ToString::to_string)
                .unwrap_or_default();
            tracing::error!(
                target: "vizor::panic",
                panic = %panic_message(info),
                %location,
                "thread panicked"
            );
            previous(info);
        }));
    });
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Returns `true` if `filter` lets events at `level` through.
#[must_use]
pub const fn level_allows(filter: LevelFilter, level: Level) -> bool {
    match filter {
        LevelFilter::OFF => false,
        LevelFilter::ERROR => matches!(level, Level::ERROR),
        LevelFilter::WARN => matches!(level, Level::ERROR | Level::WARN),
        LevelFilter::INFO => matches!(level, Level::ERROR | Level::WARN | Level::INFO),
        LevelFilter::DEBUG => matches!(
            level,
            Level::ERROR | Level::WARN | Level::INFO | Level::DEBUG
        ),
        LevelFilter::TRACE => true,
    }
}

#[derive(Clone, Copy, Default)]
struct PrefixedWriter;

impl<'a> MakeWriter<'a> for PrefixedWriter {
    type Writer = Prefixed<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        Prefixed::new(io::stderr())
    }
}

struct Prefixed<W> {
    inner: W,
    wrote_prefix: bool,
}

impl<W> Prefixed<W> {
    const fn new(inner: W) -> Self {
        Self {
            inner,
            wrote_prefix: false,
        }
    }
}

impl<W: Write> Write for Prefixed<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.wrote_prefix {
            self.inner.write_all(LOG_PREFIX.as_bytes())?;
            self.wrote_prefix = true;
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filters_are_ordered() {
        assert!(!level_allows(LevelFilter::OFF, Level::ERROR));
        assert!(level_allows(LevelFilter::WARN, Level::ERROR));
        assert!(!level_allows(LevelFilter::WARN, Level::INFO));
        assert!(level_allows(LevelFilter::DEBUG, Level::DEBUG));
        assert!(!level_allows(LevelFilter::DEBUG, Level::TRACE));
        assert!(level_allows(LevelFilter::TRACE, Level::TRACE));
    }

    #[test]
    fn prefix_is_written_once_per_event() {
        let mut out = Prefixed::new(Vec::new());
        out.write_all(b"INFO vizor: ").unwrap();
        out.write_all(b"update fulfilled\n").unwrap();
        assert_eq!(
            String::from_utf8(out.inner).unwrap(),
            "[vizor] INFO vizor: update fulfilled\n"
        );
    }

    #[test]
    fn install_is_idempotent() {
        let settings = LogSettings::default();
        install(&settings);
        install(&settings);
        install_panic_hook();
        install_panic_hook();
        tracing::info!("logging installed");
    }
}
