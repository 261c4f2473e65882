//! Logging shims.
//!
//! With the `defmt` feature the macros forward to the matching `defmt` level.
//! Without it they format through `core::fmt` into the sink installed with
//! [`set_sink`], so host tooling can show the same lines; with no sink the
//! lines are dropped. Format strings must stay within the `{}` subset both
//! back-ends understand.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

/// Severity of a log line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receiver for log lines on builds without `defmt`.
pub type LogSink = fn(LogLevel, fmt::Arguments<'_>);

static SINK: Mutex<Cell<Option<LogSink>>> = Mutex::new(Cell::new(None));

/// Installs (or with `None` removes) the process-wide log sink.
pub fn set_sink(sink: Option<LogSink>) {
    critical_section::with(|cs| SINK.borrow(cs).set(sink));
}

#[doc(hidden)]
pub fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    let sink = critical_section::with(|cs| SINK.borrow(cs).get());
    if let Some(sink) = sink {
        sink(level, args);
    }
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        $crate::log::emit($crate::log::LogLevel::Debug, ::core::format_args!($($arg)*));
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        $crate::log::emit($crate::log::LogLevel::Info, ::core::format_args!($($arg)*));
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        $crate::log::emit($crate::log::LogLevel::Warn, ::core::format_args!($($arg)*));
    }};
}
