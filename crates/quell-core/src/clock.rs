//! Time source capability.
//!
//! The engine and pipeline never read the wall clock directly; they hold an
//! `Arc<dyn Clock>` so scenario tests can drive time deterministically.
//! Swapping the clock under concurrent readers is not supported; tests set it
//! up before exercising the engine.
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Seconds since the unix epoch.
    fn epoch_secs(&self) -> i64;
}

/// Wall-clock time. The production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_secs(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            // Pre-epoch host clocks saturate to zero.
            Err(_) => 0,
        }
    }
}

/// Settable clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(epoch_secs: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(epoch_secs),
        })
    }

    pub fn set(&self, epoch_secs: i64) {
        self.now.store(epoch_secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn epoch_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
