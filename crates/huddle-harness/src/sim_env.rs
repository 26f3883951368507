//! Virtual clock environment.
//!
//! Time only moves when a test calls [`SimEnv::advance`]. Clones share the
//! clock, so a test can hold one handle while the session holds another.

use std::{
    ops::Sub,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use huddle_core::Environment;
use huddle_proto::Timestamp;

/// Wall-clock time at virtual zero: 2024-01-01T00:00:00Z.
const EPOCH_SECS: i64 = 1_704_067_200;

/// Monotonic instant in virtual milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(u64);

impl SimInstant {
    /// Milliseconds since the simulation started.
    pub fn as_millis(self) -> u64 {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// Shared virtual clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    millis: Arc<AtomicU64>,
    epoch: Timestamp,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Start at virtual zero.
    pub fn new() -> Self {
        Self::with_epoch(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(EPOCH_SECS))
    }

    /// Start at virtual zero, reporting `epoch` as the wall clock.
    pub fn with_epoch(epoch: Timestamp) -> Self {
        Self { millis: Arc::new(AtomicU64::new(0)), epoch }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let _ = self.millis.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            Some(current.saturating_add(millis))
        });
    }

    /// Time since virtual zero.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.millis.load(Ordering::SeqCst))
    }

    fn wall_clock(&self) -> Timestamp {
        let millis = i64::try_from(self.millis.load(Ordering::SeqCst)).unwrap_or(i64::MAX);
        let offset = TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX);
        self.epoch.checked_add_signed(offset).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
