use crate::entry::LogEntry;
use std::sync::Arc;

/// Read access to captured log entries.
///
/// This is the surface application and test code holds on to; the writing
/// side stays with the logging pipeline (see
/// [`MemorySink::write`](crate::memory_sink::MemorySink::write)).
pub trait LogSink: Send + Sync {
    /// Point-in-time snapshot of every entry captured so far, in capture
    /// order.
    ///
    /// **Returns**
    /// - The entries present when the snapshot was taken. Entries appended
    ///   afterwards are not reflected in it.
    fn logs(&self) -> Vec<Arc<LogEntry>>;

    /// Discard every captured entry.
    ///
    /// Readers observe either the full buffer before the call or an empty
    /// one, never a partial buffer.
    fn clear(&self);
}
