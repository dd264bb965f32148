//! Epoch-keyed operation watchdog.
//!
//! Bounds any asynchronous operation with a cancelable timeout. The
//! core problem it solves is the race between a late-firing timer and a
//! newer operation: every arm/cancel advances an epoch counter, the
//! timeout callback receives the epoch that was current when the timer
//! was armed, and a firing whose epoch no longer matches is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Identifies one arming of a watchdog.
pub type EpochKey = u64;

/// A cloneable view of a watchdog's epoch counter, for comparing from
/// the firing context.
#[derive(Debug, Clone, Default)]
pub struct EpochHandle(Arc<AtomicU64>);

impl EpochHandle {
    pub fn current(&self) -> EpochKey {
        self.0.load(Ordering::Acquire)
    }
}

/// A cancelable, epoch-keyed timeout for one operation at a time.
///
/// Selected as a compile-time strategy: [`TimerWatchdog`] where timeout
/// policy is wanted, [`NoopWatchdog`] where overhead must be eliminated.
pub trait OperationWatchdog: Send + 'static {
    /// Arm the timer. Re-arming cancels the previous operation and
    /// advances the epoch; the returned key is the epoch the callback
    /// will receive if this arming fires.
    fn start(&mut self, timeout: Duration, on_timeout: Box<dyn FnOnce(EpochKey) + Send>)
        -> EpochKey;

    /// Cancel any armed timer and invalidate its epoch.
    fn cancel(&mut self);

    /// The live epoch.
    fn current_epoch(&self) -> EpochKey;

    /// A handle for epoch comparison from the firing context.
    fn epoch_handle(&self) -> EpochHandle;
}

/// Watchdog backed by the tokio timer wheel.
#[derive(Debug, Default)]
pub struct TimerWatchdog {
    epoch: EpochHandle,
    timer: Option<tokio::task::JoinHandle<()>>,
}

impl TimerWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl OperationWatchdog for TimerWatchdog {
    fn start(
        &mut self,
        timeout: Duration,
        on_timeout: Box<dyn FnOnce(EpochKey) + Send>,
    ) -> EpochKey {
        self.abort_timer();
        let key = self.epoch.0.fetch_add(1, Ordering::AcqRel) + 1;
        let epoch = self.epoch.clone();

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // A cancel may have slipped in while this task sat in the
            // run queue; the callback still receives the armed key so
            // the receiver can re-check at action time.
            if epoch.current() == key {
                on_timeout(key);
            } else {
                trace!(armed = key, current = epoch.current(), "stale watchdog firing suppressed");
            }
        }));

        key
    }

    fn cancel(&mut self) {
        self.abort_timer();
        self.epoch.0.fetch_add(1, Ordering::AcqRel);
    }

    fn current_epoch(&self) -> EpochKey {
        self.epoch.current()
    }

    fn epoch_handle(&self) -> EpochHandle {
        self.epoch.clone()
    }
}

impl Drop for TimerWatchdog {
    fn drop(&mut self) {
        self.abort_timer();
    }
}

/// A watchdog that watches nothing.
///
/// All methods are constant-time identities; the armed callback is
/// dropped without ever firing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatchdog;

impl OperationWatchdog for NoopWatchdog {
    fn start(
        &mut self,
        _timeout: Duration,
        _on_timeout: Box<dyn FnOnce(EpochKey) + Send>,
    ) -> EpochKey {
        0
    }

    fn cancel(&mut self) {}

    fn current_epoch(&self) -> EpochKey {
        0
    }

    fn epoch_handle(&self) -> EpochHandle {
        EpochHandle::default()
    }
}
