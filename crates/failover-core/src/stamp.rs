//! Timestamped identifiers for final snapshots and renamed instances.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hands out strictly increasing second-resolution timestamps.
///
/// Two requests inside the same wall-clock second get distinct stamps: the
/// second one is bumped one second past the previous stamp.
pub struct Stamper {
    clock: Box<dyn Clock>,
    last: Mutex<Option<DateTime<Utc>>>,
}

impl Stamper {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            last: Mutex::new(None),
        }
    }

    pub fn system() -> Self {
        Self::new(SystemClock)
    }

    fn next(&self) -> DateTime<Utc> {
        // Names carry whole seconds only; compare at that resolution.
        let now = self.clock.now().trunc_subsecs(0);
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::seconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    /// `<identifier><YYYYMMDDTHHMMSS>`, the final-snapshot name for a deletion.
    pub fn snapshot_name(&self, identifier: &str) -> String {
        format!("{identifier}{}", self.next().format("%Y%m%dT%H%M%S"))
    }

    /// `<identifier>-<YYYYMMDD-HHMMSS>`, the identifier an instance is renamed to.
    pub fn renamed_identifier(&self, identifier: &str) -> String {
        format!("{identifier}-{}", self.next().format("%Y%m%d-%H%M%S"))
    }
}

impl std::fmt::Debug for Stamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stamper").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
