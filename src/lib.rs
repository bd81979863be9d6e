//! In-memory capture of structured log output, for asserting on logs in
//! tests.
//!
//! Entries are captured either from `tracing` through [`layer::MemoryLayer`]
//! or from the per-category [`logger::MemoryLogger`] facade, and read back
//! from a [`memory_sink::MemorySink`].

pub mod entry;
pub mod env;
pub mod init;
pub mod layer;
pub mod logger;
pub mod memory_sink;
pub mod scope;
pub mod sink;
pub mod state;
pub mod template;

pub use entry::{EventId, Exception, LogEntry, LogLevel};
pub use memory_sink::MemorySink;
pub use sink::LogSink;
pub use state::{LogState, PropertyList, StateValues, ORIGINAL_FORMAT_KEY};

/// Target of the crate's own diagnostics; the capture layer never records it.
pub(crate) const DIAGNOSTICS_TARGET: &str = "tracing_memory_sink";

#[doc(hidden)]
pub mod __private {
    pub use serde_json::Value;
}
