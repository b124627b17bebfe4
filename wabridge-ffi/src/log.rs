//! Log forwarding to the host, plus optional stderr output.

use std::ffi::{CStr, c_char};
use std::fmt::Write as _;
use std::sync::OnceLock;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::config::{DEFAULT_LOG_FILTER, LOG_ENV};

/// Host log level for a tracing level: 0 = error, 1 = warn, 2 = info, 3 = debug.
#[must_use]
pub const fn host_level(level: Level) -> u8 {
    match level {
        Level::ERROR => 0,
        Level::WARN => 1,
        Level::INFO => 2,
        _ => 3,
    }
}

/// Forwards every event to the registered host log handler, unfiltered.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostLogLayer;

impl<S: Subscriber> Layer<S> for HostLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        crate::host::log(&render(event), host_level(*event.metadata().level()));
    }
}

/// Format an event the way the host receives it.
pub(crate) fn render(event: &Event<'_>) -> String {
    let mut line = LineVisitor::default();
    event.record(&mut line);
    line.finish()
}

/// Renders `message key=value ...`.
#[derive(Debug, Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_owned()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

static SUBSCRIBER_INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. Returns whether this call installed it.
pub(crate) fn install(stderr_filter: Option<EnvFilter>) -> bool {
    let mut installed = false;
    SUBSCRIBER_INIT.get_or_init(|| {
        let stderr = stderr_filter.map(|filter| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter)
        });
        installed = tracing_subscriber::registry()
            .with(HostLogLayer)
            .with(stderr)
            .try_init()
            .is_ok();
    });
    installed
}

/// Filter directive for stderr output: `level`, else `$WABRIDGE_LOG`, else `info`.
fn filter_directive(level: Option<&str>) -> String {
    level
        .map(str::to_owned)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned())
}

/// Initialize logging with stderr output. `level` is an `EnvFilter`
/// directive such as "debug" or "wabridge_ffi=trace"; pass null to read
/// `WABRIDGE_LOG`, falling back to "info".
///
/// The global subscriber is installed once. Call this before
/// `wa_set_log_handler` to get stderr output. Returns 0 when this call
/// installed the subscriber, -1 otherwise.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wa_init_logger(level: *const c_char) -> i32 {
    let level = if level.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(level) }.to_str().ok()
    };
    let filter = EnvFilter::builder().parse_lossy(filter_directive(level));
    if install(Some(filter)) { 0 } else { -1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping() {
        assert_eq!(host_level(Level::ERROR), 0);
        assert_eq!(host_level(Level::WARN), 1);
        assert_eq!(host_level(Level::INFO), 2);
        assert_eq!(host_level(Level::DEBUG), 3);
        assert_eq!(host_level(Level::TRACE), 3);
    }

    #[test]
    fn explicit_level_wins() {
        assert_eq!(filter_directive(Some("debug")), "debug");
    }

    #[test]
    fn line_rendering() {
        let mut v = LineVisitor::default();
        v.message = "media download failed".into();
        v.fields = " error=boom".into();
        assert_eq!(v.finish(), "media download failed error=boom");

        let v = LineVisitor {
            message: String::new(),
            fields: " a=1 b=2".into(),
        };
        assert_eq!(v.finish(), "a=1 b=2");
    }
}
