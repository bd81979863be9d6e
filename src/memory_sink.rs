use crate::entry::{EventId, Exception, LogEntry, LogLevel};
use crate::scope::ScopeChain;
use crate::sink::LogSink;
use crate::state::{LogState, StateValues};
use crate::DIAGNOSTICS_TARGET;
use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;

#[cfg(feature = "async")]
use std::time::Duration;

/// Unbounded, thread-safe buffer of captured [`LogEntry`]s.
///
/// Appends and snapshots take the same short lock; [`clear`](Self::clear)
/// swaps the whole buffer for an empty one under that lock, so an entry
/// written concurrently with a clear lands in exactly one of the two
/// buffers.
#[derive(Default)]
pub struct MemorySink {
    logs: Mutex<Vec<Arc<LogEntry>>>,
    #[cfg(feature = "async")]
    changed: tokio::sync::Notify,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture one log statement.
    ///
    /// **Parameters**
    /// - `level`, `category`, `event_id`: recorded as given. No level
    ///   filtering happens here.
    /// - `state`: payload of the call; `None` is recorded as
    ///   [`LogState::empty`].
    /// - `exception`: error attached to the call, if any.
    /// - `formatter`: renders the entry message from the raw state and
    ///   exception. A panic inside it propagates to the caller and nothing
    ///   is recorded.
    /// - `scopes`: scope chain active on the calling thread; each frame is
    ///   normalized outermost first.
    #[allow(clippy::too_many_arguments)]
    pub fn write<S, F>(
        &self,
        level: LogLevel,
        category: &str,
        event_id: EventId,
        state: Option<&S>,
        exception: Option<Exception>,
        formatter: F,
        scopes: Option<&dyn ScopeChain>,
    ) where
        S: StateValues + ?Sized,
        F: FnOnce(Option<&S>, Option<&Exception>) -> String,
    {
        let message = formatter(state, exception.as_ref());
        let time_offset = Local::now().fixed_offset();

        let state = match state {
            Some(state) => LogState::from_state(state),
            None => LogState::empty().clone(),
        };

        let mut frames = Vec::new();
        if let Some(chain) = scopes {
            chain.for_each_scope(&mut |frame| frames.push(LogState::from_state(frame)));
        }

        let entry = Arc::new(LogEntry::new(
            time_offset,
            category,
            level,
            event_id,
            exception,
            message,
            state,
            frames,
        ));

        self.logs.lock().push(entry);

        #[cfg(feature = "async")]
        self.changed.notify_waiters();
    }

    /// Snapshot of all captured entries, in capture order.
    pub fn logs(&self) -> Vec<Arc<LogEntry>> {
        self.logs.lock().clone()
    }

    /// Drop every captured entry.
    pub fn clear(&self) {
        let discarded = self.take();
        tracing::trace!(
            target: DIAGNOSTICS_TARGET,
            discarded = discarded.len(),
            "cleared captured logs"
        );
    }

    /// Remove and return every captured entry in one step.
    ///
    /// An entry written concurrently is either in the returned batch or
    /// stays in the buffer.
    pub fn take(&self) -> Vec<Arc<LogEntry>> {
        let taken = std::mem::take(&mut *self.logs.lock());

        #[cfg(feature = "async")]
        self.changed.notify_waiters();

        taken
    }

    pub fn len(&self) -> usize {
        self.logs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.lock().is_empty()
    }

    /// Wait until the captured entries satisfy `predicate`.
    ///
    /// Useful when the code under test logs from spawned tasks. The
    /// predicate is evaluated on a fresh snapshot after every change to the
    /// buffer.
    ///
    /// **Returns**
    /// - `Ok(snapshot)`: the first snapshot that satisfied the predicate.
    /// - `Err(WaitTimeout)`: `timeout` elapsed first.
    #[cfg(feature = "async")]
    pub async fn wait_for<P>(
        &self,
        mut predicate: P,
        timeout: Duration,
    ) -> Result<Vec<Arc<LogEntry>>, WaitTimeout>
    where
        P: FnMut(&[Arc<LogEntry>]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before taking the snapshot so an append in
            // between still wakes us.
            let mut notified = std::pin::pin!(self.changed.notified());
            notified.as_mut().enable();

            let logs = self.logs();
            if predicate(&logs) {
                return Ok(logs);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(WaitTimeout(timeout));
            }
        }
    }
}

impl LogSink for MemorySink {
    fn logs(&self) -> Vec<Arc<LogEntry>> {
        MemorySink::logs(self)
    }

    fn clear(&self) {
        MemorySink::clear(self)
    }
}

/// Error returned by [`MemorySink::wait_for`] when the deadline passes.
#[cfg(feature = "async")]
#[derive(thiserror::Error, Debug)]
#[error("captured logs did not match within {0:?}")]
pub struct WaitTimeout(pub Duration);
