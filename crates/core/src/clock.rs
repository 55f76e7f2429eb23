use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Logical monotonic timestamp in milliseconds.
///
/// The debounce window is measured in ticks supplied by the caller, so the
/// controller never reads a wall clock to decide when to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Tick(pub u64);

impl Tick {
    pub fn after(self, millis: u64) -> Tick {
        Tick(self.0.saturating_add(millis))
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Produces ticks from a real monotonic clock, relative to its creation.
#[derive(Debug, Clone, Copy)]
pub struct TickSource {
    origin: std::time::Instant,
}

impl TickSource {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }

    pub fn now(&self) -> Tick {
        Tick(self.origin.elapsed().as_millis() as u64)
    }
}

impl Default for TickSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock time used for project metadata timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
