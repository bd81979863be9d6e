use crate::entry::{EventId, Exception, LogLevel};
use crate::memory_sink::MemorySink;
use crate::scope::{ScopeChain, ScopeGuard, ScopeProvider, ThreadScopeProvider};
use crate::sink::LogSink;
use crate::state::StateValues;
use crate::template::FormattedLogValues;
use crate::DIAGNOSTICS_TARGET;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

type SharedScopes = Arc<RwLock<Arc<dyn ScopeProvider>>>;

/// Hands out one [`MemoryLogger`] per category, all writing into the same
/// [`MemorySink`] and sharing one scope provider.
pub struct MemoryLoggerProvider {
    sink: Arc<MemorySink>,
    loggers: DashMap<String, Arc<MemoryLogger>>,
    scopes: SharedScopes,
}

impl MemoryLoggerProvider {
    /// Create a provider over `sink` with its own [`ThreadScopeProvider`].
    pub fn new(sink: Arc<MemorySink>) -> Self {
        MemoryLoggerProvider {
            sink,
            loggers: DashMap::new(),
            scopes: Arc::new(RwLock::new(Arc::new(ThreadScopeProvider::new()))),
        }
    }

    /// Logger for `category`.
    ///
    /// The first call for a category creates the logger; later calls, from
    /// any thread, return the same instance.
    pub fn create_logger(&self, category: &str) -> Arc<MemoryLogger> {
        if let Some(logger) = self.loggers.get(category) {
            return Arc::clone(logger.value());
        }

        let logger = self
            .loggers
            .entry(category.to_string())
            .or_insert_with(|| {
                tracing::debug!(target: DIAGNOSTICS_TARGET, category, "created memory logger");
                Arc::new(MemoryLogger {
                    category: category.to_string(),
                    sink: Arc::clone(&self.sink),
                    scopes: Arc::clone(&self.scopes),
                })
            });
        Arc::clone(logger.value())
    }

    /// Replace the scope provider used by every logger of this provider,
    /// including loggers created before the call.
    pub fn set_scope_provider(&self, provider: Arc<dyn ScopeProvider>) {
        *self.scopes.write() = provider;
    }

    pub fn scope_provider(&self) -> Arc<dyn ScopeProvider> {
        Arc::clone(&self.scopes.read())
    }

    /// The sink every logger of this provider writes into.
    pub fn sink(&self) -> Arc<MemorySink> {
        Arc::clone(&self.sink)
    }

    /// Read-only handle to the captured entries.
    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone()
    }
}

impl fmt::Debug for MemoryLoggerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLoggerProvider")
            .field("loggers", &self.loggers.len())
            .field("captured", &self.sink.len())
            .finish()
    }
}

/// Logger for a single category.
///
/// Obtained from [`MemoryLoggerProvider::create_logger`]; every call is
/// forwarded to the provider's sink together with the scopes active on the
/// calling thread.
pub struct MemoryLogger {
    category: String,
    sink: Arc<MemorySink>,
    scopes: SharedScopes,
}

impl MemoryLogger {
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Every level except [`LogLevel::None`] is enabled.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None
    }

    /// Capture one log statement.
    ///
    /// Does nothing for [`LogLevel::None`]. `formatter` renders the entry
    /// message from `state` and `exception`.
    pub fn log<S, F>(
        &self,
        level: LogLevel,
        event_id: EventId,
        state: &S,
        exception: Option<Exception>,
        formatter: F,
    ) where
        S: StateValues + ?Sized,
        F: FnOnce(&S, Option<&Exception>) -> String,
    {
        if !self.is_enabled(level) {
            return;
        }

        let scopes = Arc::clone(&self.scopes.read());
        let chain: &dyn ScopeChain = &*scopes;
        self.sink.write(
            level,
            &self.category,
            event_id,
            Some(state),
            exception,
            |state, exception| match state {
                Some(state) => formatter(state, exception),
                None => String::new(),
            },
            Some(chain),
        );
    }

    /// Capture a templated message; the entry message is the rendered
    /// template.
    pub fn log_values(
        &self,
        level: LogLevel,
        event_id: EventId,
        exception: Option<Exception>,
        values: FormattedLogValues,
    ) {
        self.log(level, event_id, &values, exception, |values, _| values.to_string());
    }

    pub fn trace(&self, values: FormattedLogValues) {
        self.log_values(LogLevel::Trace, EventId::default(), None, values);
    }

    pub fn debug(&self, values: FormattedLogValues) {
        self.log_values(LogLevel::Debug, EventId::default(), None, values);
    }

    pub fn information(&self, values: FormattedLogValues) {
        self.log_values(LogLevel::Information, EventId::default(), None, values);
    }

    pub fn warning(&self, values: FormattedLogValues) {
        self.log_values(LogLevel::Warning, EventId::default(), None, values);
    }

    pub fn error(&self, exception: Option<Exception>, values: FormattedLogValues) {
        self.log_values(LogLevel::Error, EventId::default(), exception, values);
    }

    pub fn critical(&self, exception: Option<Exception>, values: FormattedLogValues) {
        self.log_values(LogLevel::Critical, EventId::default(), exception, values);
    }

    /// Open a scope on the calling thread; it stays active for every logger
    /// of the same provider until the guard is dropped.
    pub fn begin_scope<S>(&self, state: S) -> ScopeGuard
    where
        S: StateValues + 'static,
    {
        let scopes = Arc::clone(&self.scopes.read());
        scopes.push(Box::new(state))
    }
}

impl fmt::Debug for MemoryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLogger")
            .field("category", &self.category)
            .finish()
    }
}
