//! Scoped capture of `tracing` events for assertions in tests.
//!
//! [`capture_logs`] installs a thread-local subscriber for the duration of a
//! closure, so captured events never leak between tests running in parallel.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing::field::{Field, Visit};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;

/// One event seen while capturing.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Value of structured field `name`, as recorded by `Debug`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Events captured by one [`capture_logs`] call, oldest first.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Vec<CapturedEvent>);

impl CapturedLogs {
    #[must_use]
    pub fn events(&self) -> &[CapturedEvent] {
        &self.0
    }

    /// First event at `level` whose message contains `needle`.
    #[must_use]
    pub fn find(&self, level: Level, needle: &str) -> Option<&CapturedEvent> {
        self.0
            .iter()
            .find(|event| event.level == level && event.message.contains(needle))
    }

    #[must_use]
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.find(level, needle).is_some()
    }
}

struct CaptureLayer {
    sink: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct EventVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut Vec<(String, String)>,
}

impl Visit for EventVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        match field.name() {
            "message" => *self.message = rendered,
            name => self.fields.push((name.to_string(), rendered)),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => *self.message = value.to_string(),
            name => self.fields.push((name.to_string(), value.to_string())),
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut EventVisitor {
            message: &mut message,
            fields: &mut fields,
        });

        let metadata = event.metadata();
        self.sink.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

/// Run `body` with every event at `level` or above captured on this thread.
pub fn capture_logs<T>(level: Level, body: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(CaptureLayer {
            sink: Arc::clone(&sink),
        });

    let value = tracing::subscriber::with_default(subscriber, body);
    let events = std::mem::take(&mut *sink.lock());
    (value, CapturedLogs(events))
}

/// Assert that `$logs` holds an event at `$level` whose message contains `$needle`.
#[macro_export]
macro_rules! assert_logged {
    ($logs:expr, $level:expr, $needle:expr) => {{
        let logs: &$crate::test_utils::logging::CapturedLogs = &$logs;
        assert!(
            logs.contains($level, $needle),
            "expected {} event containing {:?}; captured: {:#?}",
            $level,
            $needle,
            logs.events()
        );
    }};
}
