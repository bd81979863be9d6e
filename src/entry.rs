use crate::state::LogState;
use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Severity of a captured entry.
///
/// `None` marks a disabled level: [`MemoryLogger`](crate::logger::MemoryLogger)
/// drops calls made with it. The sink itself records any level it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "Trace",
            LogLevel::Debug => "Debug",
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Critical => "Critical",
            LogLevel::None => "None",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`LogLevel`] from text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "information" | "info" => Ok(LogLevel::Information),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" | "fatal" => Ok(LogLevel::Critical),
            "none" => Ok(LogLevel::None),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::WARN => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }
}

/// Identifies the kind of a log statement independently of its text.
///
/// Two ids are equal when their numeric `id` matches; `name` is a label.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventId {
    pub id: i32,
    pub name: Option<String>,
}

impl EventId {
    pub fn new(id: i32) -> Self {
        EventId { id, name: None }
    }

    pub fn with_name(id: i32, name: impl Into<String>) -> Self {
        EventId {
            id,
            name: Some(name.into()),
        }
    }
}

impl PartialEq for EventId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventId {}

impl From<i32> for EventId {
    fn from(id: i32) -> Self {
        EventId::new(id)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Error attached to a captured entry.
///
/// Cloning shares the same underlying error. Equality is identity: two
/// handles are equal only if they point at the same captured error.
#[derive(Clone)]
pub struct Exception(Arc<dyn Error + Send + Sync + 'static>);

impl Exception {
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Exception(Arc::new(error))
    }

    pub fn from_arc(error: Arc<dyn Error + Send + Sync + 'static>) -> Self {
        Exception(error)
    }

    /// Borrow the error as its concrete type, if it is one.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn is<E: Error + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }
}

impl PartialEq for Exception {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl Serialize for Exception {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One captured log record.
///
/// Entries are built once by [`MemorySink::write`](crate::memory_sink::MemorySink::write)
/// and only ever handed out behind an `Arc`. `time_offset` is not part of
/// equality.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Local capture time, with its UTC offset.
    pub time_offset: DateTime<FixedOffset>,
    /// Category of the logger (the event target for `tracing` events).
    pub category: String,
    pub level: LogLevel,
    pub event_id: EventId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<Exception>,
    /// Final text produced by the formatter.
    pub message: String,
    pub state: LogState,
    /// Active scopes, outermost first.
    pub scopes: Vec<LogState>,
}

impl LogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time_offset: DateTime<FixedOffset>,
        category: impl Into<String>,
        level: LogLevel,
        event_id: EventId,
        exception: Option<Exception>,
        message: impl Into<String>,
        state: LogState,
        scopes: Vec<LogState>,
    ) -> Self {
        LogEntry {
            time_offset,
            category: category.into(),
            level,
            event_id,
            exception,
            message: message.into(),
            state,
            scopes,
        }
    }
}

impl PartialEq for LogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
            && self.level == other.level
            && self.event_id == other.event_id
            && self.exception == other.exception
            && self.message == other.message
            && self.state == other.state
            && self.scopes == other.scopes
    }
}
