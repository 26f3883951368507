//! Environment abstraction for deterministic testing.
//!
//! Decouples synchronization logic from the system clock. Production uses
//! `std::time::Instant` and the real wall clock; the simulation harness uses
//! a virtual clock that only moves when a test advances it.

use std::{fmt::Debug, ops::Sub, time::Duration};

use huddle_proto::Timestamp;

/// Abstract environment providing monotonic and wall-clock time.
///
/// # Invariants
///
/// - `now()` never goes backwards within one execution context.
/// - `Instant` subtraction saturates at zero instead of panicking.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type. Drives typing timers.
    type Instant: Copy + Ord + Debug + Send + Sync + Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time. Used for optimistic `read_at` stamps.
    fn wall_clock(&self) -> Timestamp;
}
