//! Error wrapping, failure tracking and periodic retry.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use laguna_scene::EntityId;

use crate::error::RenderError;

/// Default interval between recovery cycles.
pub const DEFAULT_RECOVERY_INTERVAL: Duration = Duration::from_secs(5);

/// Result of an operation run with a fallback.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    /// The primary operation succeeded.
    Rendered(T),
    /// The primary operation failed and the fallback produced this value.
    Degraded(T),
    /// Both failed; the id is now in the failure set.
    Failed,
}

impl<T> Outcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Rendered(v) | Outcome::Degraded(v) => Some(v),
            Outcome::Failed => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Rendered(v) => Outcome::Rendered(f(v)),
            Outcome::Degraded(v) => Outcome::Degraded(f(v)),
            Outcome::Failed => Outcome::Failed,
        }
    }
}

/// What one recovery cycle did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub attempted: usize,
    pub recovered: Vec<EntityId>,
    pub still_failing: Vec<EntityId>,
}

/// Lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub failures: u64,
    pub fallbacks: u64,
    pub cycles: u64,
    pub recovered: u64,
}

/// Wraps fallible render calls and retries failed ids on an interval.
///
/// The retry loop is cooperative: the owner calls [`tick`](Self::tick) every
/// frame and a cycle runs once the interval has elapsed. After
/// [`shutdown`](Self::shutdown) no further cycles run.
pub struct ErrorRecoveryCoordinator {
    failed: BTreeSet<EntityId>,
    interval: Duration,
    next_cycle: Option<Instant>,
    shut_down: bool,
    fallback_mode: bool,
    stats: RecoveryStats,
}

impl ErrorRecoveryCoordinator {
    pub fn new(interval: Duration) -> Self {
        Self {
            failed: BTreeSet::new(),
            interval,
            next_cycle: None,
            shut_down: false,
            fallback_mode: false,
            stats: RecoveryStats::default(),
        }
    }

    /// Run `op`, returning its value. On error the failure is logged and `id`
    /// joins the failure set.
    pub fn run<C, T>(
        &mut self,
        kind: &str,
        id: &EntityId,
        ctx: &mut C,
        op: impl FnOnce(&mut C) -> Result<T, RenderError>,
    ) -> Option<T> {
        match op(ctx) {
            Ok(value) => {
                self.failed.remove(id);
                Some(value)
            }
            Err(error) => {
                self.record_failure(kind, id, &error);
                None
            }
        }
    }

    /// Run `op`; if it fails, run `fallback` instead. Only when both fail
    /// does `id` join the failure set.
    pub fn run_with_fallback<C, T>(
        &mut self,
        kind: &str,
        id: &EntityId,
        ctx: &mut C,
        op: impl FnOnce(&mut C) -> Result<T, RenderError>,
        fallback: impl FnOnce(&mut C) -> Result<T, RenderError>,
    ) -> Outcome<T> {
        let error = match op(ctx) {
            Ok(value) => {
                self.failed.remove(id);
                return Outcome::Rendered(value);
            }
            Err(error) => error,
        };
        tracing::warn!(
            kind,
            id = %id,
            category = error.category(),
            error = %error,
            "Render failed, trying fallback"
        );

        match fallback(ctx) {
            Ok(value) => {
                self.stats.fallbacks += 1;
                Outcome::Degraded(value)
            }
            Err(fallback_error) => {
                self.record_failure(kind, id, &fallback_error);
                Outcome::Failed
            }
        }
    }

    /// Log `error` and park `id` for the next recovery cycle.
    pub fn record_failure(&mut self, kind: &str, id: &EntityId, error: &RenderError) {
        tracing::warn!(
            kind,
            id = %id,
            category = error.category(),
            error = %error,
            "Render failed"
        );
        self.stats.failures += 1;
        self.failed.insert(id.clone());
    }

    /// Drop `id` from the failure set without retrying it.
    pub fn forget(&mut self, id: &EntityId) -> bool {
        self.failed.remove(id)
    }

    pub fn is_failed(&self, id: &EntityId) -> bool {
        self.failed.contains(id)
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.failed.iter()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Arm the retry loop. Later calls are no-ops, as are calls after
    /// [`shutdown`](Self::shutdown).
    pub fn start(&mut self, now: Instant) {
        if self.next_cycle.is_none() && !self.shut_down {
            self.next_cycle = Some(now + self.interval);
            tracing::debug!(interval = ?self.interval, "Recovery loop started");
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_cycle.is_some() && !self.shut_down
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.shut_down && self.next_cycle.is_some_and(|at| now >= at)
    }

    /// Run a recovery cycle if one is due.
    ///
    /// The failure set is copied out and cleared, then `retry` is called with
    /// each id. Ids whose retry fails re-enter the set for the next cycle.
    pub fn tick<C>(
        &mut self,
        now: Instant,
        ctx: &mut C,
        mut retry: impl FnMut(&mut C, &EntityId) -> Result<(), RenderError>,
    ) -> Option<RecoveryReport> {
        if !self.is_due(now) {
            return None;
        }
        self.next_cycle = Some(now + self.interval);
        self.stats.cycles += 1;

        let pending = std::mem::take(&mut self.failed);
        let mut report = RecoveryReport {
            attempted: pending.len(),
            ..RecoveryReport::default()
        };
        for id in pending {
            match retry(ctx, &id) {
                Ok(()) => report.recovered.push(id),
                Err(error) => {
                    tracing::debug!(id = %id, error = %error, "Still failing");
                    self.failed.insert(id.clone());
                    report.still_failing.push(id);
                }
            }
        }
        self.stats.recovered += report.recovered.len() as u64;

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                recovered = report.recovered.len(),
                still_failing = report.still_failing.len(),
                "Recovery cycle finished"
            );
        }
        Some(report)
    }

    /// Stop the retry loop for good. The failure set is kept for inspection.
    pub fn shutdown(&mut self) {
        if !self.shut_down {
            self.shut_down = true;
            tracing::debug!(pending = self.failed.len(), "Recovery loop shut down");
        }
    }

    /// Set the degraded-rendering flag. Returns `true` if it changed.
    pub fn set_fallback_mode(&mut self, active: bool) -> bool {
        let changed = self.fallback_mode != active;
        self.fallback_mode = active;
        changed
    }

    pub fn is_fallback_mode(&self) -> bool {
        self.fallback_mode
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> RecoveryStats {
        self.stats
    }
}

impl Default for ErrorRecoveryCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_RECOVERY_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laguna_scene::GeometryError;

    fn fail() -> Result<(), RenderError> {
        Err(GeometryError::TooFewVertices(1).into())
    }

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    #[test]
    fn test_run_success_returns_value() {
        let mut rec = ErrorRecoveryCoordinator::default();
        let mut calls = 0;
        let out = rec.run("land", &id("a"), &mut calls, |c| {
            *c += 1;
            Ok(7)
        });
        assert_eq!(out, Some(7));
        assert_eq!(calls, 1);
        assert_eq!(rec.failed_count(), 0);
    }

    #[test]
    fn test_run_failure_records_id() {
        let mut rec = ErrorRecoveryCoordinator::default();
        let out = rec.run("land", &id("a"), &mut (), |_| fail());
        assert_eq!(out, None);
        assert!(rec.is_failed(&id("a")));
        assert_eq!(rec.stats().failures, 1);
    }

    #[test]
    fn test_fallback_result_is_degraded_and_not_recorded() {
        let mut rec = ErrorRecoveryCoordinator::default();
        let out = rec.run_with_fallback(
            "land",
            &id("a"),
            &mut (),
            |_| fail().map(|_| 1),
            |_| Ok(2),
        );
        assert_eq!(out, Outcome::Degraded(2));
        assert!(!rec.is_failed(&id("a")));
    }

    #[test]
    fn test_failing_fallback_records_id() {
        let mut rec = ErrorRecoveryCoordinator::default();
        let out: Outcome<()> = rec.run_with_fallback("land", &id("a"), &mut (), |_| fail(), |_| fail());
        assert!(out.is_failed());
        assert!(rec.is_failed(&id("a")));
    }

    #[test]
    fn test_tick_waits_for_interval() {
        let mut rec = ErrorRecoveryCoordinator::new(Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(rec.tick(t0, &mut (), |_, _| Ok(())).is_none(), "not started");

        rec.start(t0);
        rec.start(t0 + Duration::from_secs(4));
        assert!(rec.tick(t0 + Duration::from_secs(4), &mut (), |_, _| Ok(())).is_none());
        assert!(rec.tick(t0 + Duration::from_secs(5), &mut (), |_, _| Ok(())).is_some());
        assert!(rec.tick(t0 + Duration::from_secs(6), &mut (), |_, _| Ok(())).is_none());
    }

    /// A retried entity leaves the set on success and stays while it keeps failing.
    #[test]
    fn test_recovery_convergence() {
        let mut rec = ErrorRecoveryCoordinator::new(Duration::from_secs(5));
        let t0 = Instant::now();
        rec.start(t0);
        rec.run("bldg", &id("good"), &mut (), |_| fail());
        rec.run("bldg", &id("bad"), &mut (), |_| fail());

        let report = rec
            .tick(t0 + Duration::from_secs(5), &mut (), |_, id| {
                if id.as_str() == "good" { Ok(()) } else { fail() }
            })
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.recovered, vec![id("good")]);
        assert_eq!(report.still_failing, vec![id("bad")]);
        assert!(!rec.is_failed(&id("good")));
        assert!(rec.is_failed(&id("bad")));

        let report = rec
            .tick(t0 + Duration::from_secs(10), &mut (), |_, _| fail())
            .unwrap();
        assert_eq!(report.still_failing, vec![id("bad")]);
    }

    #[test]
    fn test_shutdown_stops_cycles() {
        let mut rec = ErrorRecoveryCoordinator::new(Duration::from_secs(1));
        let t0 = Instant::now();
        rec.start(t0);
        rec.run("bldg", &id("x"), &mut (), |_| fail());
        rec.shutdown();
        assert!(!rec.is_running());
        assert!(rec.tick(t0 + Duration::from_secs(10), &mut (), |_, _| Ok(())).is_none());
        assert!(rec.is_failed(&id("x")));

        rec.start(t0 + Duration::from_secs(11));
        assert!(!rec.is_running());
    }

    #[test]
    fn test_fallback_mode_flag() {
        let mut rec = ErrorRecoveryCoordinator::default();
        assert!(rec.set_fallback_mode(true));
        assert!(!rec.set_fallback_mode(true));
        assert!(rec.is_fallback_mode());
        assert!(rec.set_fallback_mode(false));
    }
}
