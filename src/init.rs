use crate::env::{env_flag, TRACING_MEMORY_SINK_SCOPES_ENV, TRACING_MEMORY_SINK_STDOUT_ENV};
use crate::layer::MemoryLayer;
use crate::memory_sink::MemorySink;
use crate::DIAGNOSTICS_TARGET;
use std::sync::Arc;
use tracing::subscriber::{DefaultGuard, SetGlobalDefaultError};
use tracing::Subscriber;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Registry;

/// Конфигурация слоя захвата логов.
///
/// Определяет, прикреплять ли к записям активные span'ы как scope'ы и
/// нужно ли дополнительно печатать события через `fmt`‑слой.
///
/// **Поля**
/// - `enable_stdout`: если `true`, рядом с [`MemoryLayer`] подключается
///   `tracing_subscriber::fmt::Layer`, пишущий через test writer.
/// - `include_scopes`: если `false`, поля span'ов не отслеживаются и
///   записи сохраняются без scope'ов.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub enable_stdout: bool,
    pub include_scopes: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            enable_stdout: false,
            include_scopes: true,
        }
    }
}

impl LayerConfig {
    /// Defaults overridden by `TRACING_MEMORY_SINK_STDOUT` and
    /// `TRACING_MEMORY_SINK_SCOPES`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_stdout: env_flag(TRACING_MEMORY_SINK_STDOUT_ENV, defaults.enable_stdout),
            include_scopes: env_flag(TRACING_MEMORY_SINK_SCOPES_ENV, defaults.include_scopes),
        }
    }
}

/// Error type returned when installing the capture subscriber globally.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),
}

/// Registration hook for any subscriber built on a span registry.
///
/// ```
/// use std::sync::Arc;
/// use tracing_memory_sink::init::MemorySubscriberExt;
/// use tracing_memory_sink::memory_sink::MemorySink;
///
/// let sink = Arc::new(MemorySink::new());
/// let subscriber = tracing_subscriber::registry().with_memory(sink.clone());
/// tracing::subscriber::with_default(subscriber, || tracing::info!("captured"));
/// assert_eq!(sink.logs()[0].message, "captured");
/// ```
pub trait MemorySubscriberExt: Subscriber + for<'span> LookupSpan<'span> + Sized {
    /// Add a [`MemoryLayer`] writing into `sink`.
    fn with_memory(self, sink: Arc<MemorySink>) -> Layered<MemoryLayer, Self> {
        self.with(MemoryLayer::new(sink))
    }
}

impl<S> MemorySubscriberExt for S where S: Subscriber + for<'span> LookupSpan<'span> {}

fn build_subscriber(sink: Arc<MemorySink>, config: &LayerConfig) -> impl Subscriber + Send + Sync {
    let layer = MemoryLayer::new(sink).with_scopes(config.include_scopes);
    // `Option<Layer>` is itself a layer, so one subscriber type covers both cases.
    let fmt_layer = config
        .enable_stdout
        .then(|| tracing_subscriber::fmt::layer().with_test_writer());
    Registry::default().with(layer).with(fmt_layer)
}

/// Install the capture layer as the global default subscriber.
///
/// **Parameters**
/// - `sink`: [`MemorySink`] receiving every captured entry.
/// - `config`: [`LayerConfig`] controlling scopes and console output.
///
/// **Returns**
/// - `Err(InitError::AlreadyInstalled)` if the process already has a global
///   subscriber.
pub fn init_tracing_with_config(sink: Arc<MemorySink>, config: LayerConfig) -> Result<(), InitError> {
    tracing::subscriber::set_global_default(build_subscriber(sink, &config))?;
    tracing::debug!(target: DIAGNOSTICS_TARGET, ?config, "memory log capture installed");
    Ok(())
}

/// Install the capture layer globally with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<MemorySink>) -> Result<(), InitError> {
    init_tracing_with_config(sink, LayerConfig::default())
}

/// Install the capture layer as the default subscriber of the current thread
/// until the returned guard is dropped. This is the usual entry point in
/// tests, since it does not interfere with other tests running in parallel.
pub fn set_default(sink: Arc<MemorySink>) -> DefaultGuard {
    set_default_with_config(sink, LayerConfig::default())
}

pub fn set_default_with_config(sink: Arc<MemorySink>, config: LayerConfig) -> DefaultGuard {
    tracing::subscriber::set_default(build_subscriber(sink, &config))
}

/// Create a fresh sink and capture this thread's events into it.
pub fn capture() -> (Arc<MemorySink>, DefaultGuard) {
    let sink = Arc::new(MemorySink::new());
    let guard = set_default(Arc::clone(&sink));
    (sink, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_is_scoped_to_guard() {
        let (sink, guard) = capture();
        tracing::info!("while capturing");
        drop(guard);
        tracing::info!("after");

        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "while capturing");
    }

    #[test]
    fn config_without_scopes() {
        let sink = Arc::new(MemorySink::new());
        let config = LayerConfig {
            include_scopes: false,
            ..LayerConfig::default()
        };
        let _guard = set_default_with_config(Arc::clone(&sink), config);

        let span = tracing::info_span!("outer");
        let _entered = span.enter();
        tracing::info!("inside");

        assert!(sink.logs()[0].scopes.is_empty());
    }

    #[test]
    fn stdout_layer_does_not_change_capture() {
        let sink = Arc::new(MemorySink::new());
        let config = LayerConfig {
            enable_stdout: true,
            ..LayerConfig::default()
        };
        let _guard = set_default_with_config(Arc::clone(&sink), config);

        tracing::warn!(attempt = 2, "retrying");
        assert_eq!(sink.logs()[0].message, "retrying");
    }

    #[test]
    fn default_config_keeps_scopes() {
        let config = LayerConfig::default();
        assert!(config.include_scopes);
        assert!(!config.enable_stdout);
    }
}
