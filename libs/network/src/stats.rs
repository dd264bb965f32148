//! IO statistics hooks.
//!
//! A connection reports every read/write transition to an injected
//! stats driver. Every hook has an empty default body, so a collector
//! only implements what it cares about and the no-op driver compiles
//! away entirely.

/// Statistics hooks fired by the connection core.
pub trait StatsDriver: Send + 'static {
    /// An inline (non-suspending) write is about to be attempted.
    fn sync_write_started(&self, _bytes: usize) {}

    /// An inline write completed in full.
    fn sync_write_finished(&self, _transferred: usize) {}

    /// An asynchronous write was started for this many remaining bytes.
    fn async_write_started(&self, _bytes: usize) {}

    /// An asynchronous write completed in full.
    fn async_write_finished(&self, _transferred: usize) {}

    /// The socket could not take the bytes immediately; the write fell
    /// through to the asynchronous path.
    fn hit_would_block(&self, _remaining: usize) {}

    /// A read delivered this many bytes.
    fn bytes_received(&self, _bytes: usize) {}
}

/// The default driver: collects nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsDriver for NoopStats {}
