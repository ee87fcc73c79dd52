//! Worker liveness tracker (C6, §4.6).
//!
//! A plain, non-async map guarded by a `parking_lot::Mutex`: heartbeat
//! writes never need to `.await` while holding the lock, so a blocking
//! mutex is correct and cheaper than an async one here — the same
//! "only lock what needs locking" discipline the teacher applies when
//! separating Queue 2's index cache (`backend/src/models/queue_index.rs`)
//! from the rest of simulation state, rebuilt opportunistically rather than
//! on a background timer.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

struct Inner {
    last_seen: HashMap<String, DateTime<Utc>>,
    last_swept: DateTime<Utc>,
}

pub struct HeartbeatTracker {
    timeout: Duration,
    sweep_interval: Duration,
    inner: Mutex<Inner>,
}

impl HeartbeatTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sweep_interval: Duration::from_secs(60),
            inner: Mutex::new(Inner {
                last_seen: HashMap::new(),
                last_swept: Utc::now(),
            }),
        }
    }

    /// Record a liveness ping. Triggers the coarse periodic sweep if the
    /// interval has elapsed, per §4.6.
    pub fn heartbeat(&self, worker_id: &str) -> DateTime<Utc> {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        inner.last_seen.insert(worker_id.to_string(), now);
        self.maybe_sweep(&mut inner, now);
        now
    }

    /// Last heartbeat timestamp and its age, for `/api/worker/online/:id`.
    /// Liveness is informational only: `allocator::next_bucket` gates on
    /// `assigned_workers` membership (§4.2 step (c)), never on this tracker.
    pub fn status(&self, worker_id: &str) -> (bool, Option<DateTime<Utc>>, Option<i64>) {
        let inner = self.inner.lock();
        match inner.last_seen.get(worker_id) {
            Some(last) => {
                let a = age(*last);
                (a <= self.timeout, Some(*last), Some(a.as_millis() as i64))
            }
            None => (false, None, None),
        }
    }

    /// Remove entries older than `WORKER_TIMEOUT`, lazily on every
    /// heartbeat (rate-limited by `sweep_interval`) or on demand from an
    /// external periodic tick.
    pub fn sweep(&self) {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        self.sweep_locked(&mut inner, now);
    }

    fn maybe_sweep(&self, inner: &mut Inner, now: DateTime<Utc>) {
        if (now - inner.last_swept).to_std().unwrap_or(Duration::ZERO) < self.sweep_interval {
            return;
        }
        self.sweep_locked(inner, now);
    }

    fn sweep_locked(&self, inner: &mut Inner, now: DateTime<Utc>) {
        let timeout = self.timeout;
        inner.last_seen.retain(|_, last| age_at(*last, now) <= timeout);
        inner.last_swept = now;
    }
}

fn age(last: DateTime<Utc>) -> Duration {
    age_at(last, Utc::now())
}

fn age_at(last: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - last).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_right_after_heartbeat() {
        let tracker = HeartbeatTracker::new(Duration::from_secs(60));
        tracker.heartbeat("w1");
        assert!(tracker.status("w1").0);
    }

    #[test]
    fn offline_when_never_seen() {
        let tracker = HeartbeatTracker::new(Duration::from_secs(60));
        assert!(!tracker.status("ghost").0);
    }

    #[test]
    fn status_reports_age() {
        let tracker = HeartbeatTracker::new(Duration::from_secs(60));
        tracker.heartbeat("w1");
        let (online, last, age_ms) = tracker.status("w1");
        assert!(online);
        assert!(last.is_some());
        assert!(age_ms.unwrap() >= 0);
    }
}
