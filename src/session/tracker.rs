use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::utils::clock::Clock;

use super::{
    entities::{CompletedSessionEntity, SessionSnapshot},
    history::HistoryLedger,
    store::SessionStore,
};

/// How often a running session is re-persisted from the display tick, so a
/// hard kill loses at most this much bookkeeping (recovery re-adds the wall
/// time anyway).
pub const AUTOSAVE_INTERVAL: StdDuration = StdDuration::from_secs(10);

/// The session state machine. Owns the in-memory [SessionSnapshot] for the
/// lifetime of the process; the store is its sole durable mirror, written
/// whole on every transition.
///
/// Persistence failures are absorbed here: the in-memory state stays
/// authoritative for the rest of the run and the failure is surfaced through
/// [Tracker::persistence_degraded] instead of an error. Losing the ability to
/// persist must not lose the ability to keep tracking.
pub struct Tracker<S, H> {
    store: S,
    ledger: H,
    clock: Box<dyn Clock>,
    snapshot: SessionSnapshot,
    last_autosave: Instant,
    last_persist_failed: bool,
}

impl<S: SessionStore, H: HistoryLedger> Tracker<S, H> {
    pub fn new(store: S, ledger: H, clock: Box<dyn Clock>) -> Self {
        let last_autosave = clock.instant();
        Self {
            store,
            ledger,
            clock,
            snapshot: SessionSnapshot::empty(),
            last_autosave,
            last_persist_failed: false,
        }
    }

    /// Picks up whatever the previous process left behind. When the record
    /// still says running, the whole gap since the persisted start counts as
    /// tracked time: the user's intent is "still working" regardless of how
    /// that process ended. Re-anchors the start time and re-persists.
    ///
    /// Returns the recovered gap when a running session was resumed.
    pub async fn recover_on_load(&mut self) -> Option<Duration> {
        let Some(loaded) = self.store.load().await else {
            return None;
        };
        self.snapshot = loaded;

        if !self.snapshot.is_running {
            return None;
        }

        let Some(start) = self.snapshot.start_time else {
            warn!("Loaded record was running without a start time, treating as stopped");
            self.snapshot.is_running = false;
            self.persist().await;
            return None;
        };

        let now = self.clock.time();
        let gap = clamp_non_negative(now - start);
        self.snapshot.total += gap;
        self.snapshot.start_time = Some(now);
        self.persist().await;
        info!("Recovered running session, {}s passed since last start", gap.num_seconds());
        Some(gap)
    }

    /// Begins a running interval. Silent no-op when already running, so a
    /// speculative call from the UI never resets the start time.
    pub async fn start(&mut self) {
        if self.snapshot.is_running {
            return;
        }
        self.snapshot.start_time = Some(self.clock.time());
        self.snapshot.is_running = true;
        self.persist().await;
    }

    /// Ends the running interval, folds it into the total, and commits one
    /// history entry carrying the cumulative total of this tracked session.
    /// Silent no-op when already stopped.
    pub async fn stop(&mut self) {
        if !self.snapshot.is_running {
            return;
        }
        let now = self.clock.time();
        if let Some(start) = self.snapshot.start_time {
            self.snapshot.total += clamp_non_negative(now - start);
        }
        self.snapshot.is_running = false;
        self.snapshot.start_time = None;
        self.persist().await;

        if self.snapshot.total > Duration::zero() {
            let entity = CompletedSessionEntity {
                timestamp: now,
                duration: self.snapshot.total,
            };
            if let Err(e) = self.ledger.append(&entity).await {
                warn!("Failed to append session to history: {e:?}");
                self.last_persist_failed = true;
            }
        }
    }

    /// Clears the tracked total and the durable record. History is untouched.
    pub async fn reset(&mut self) {
        self.snapshot = SessionSnapshot::empty();
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear session record: {e:?}");
            self.last_persist_failed = true;
        }
    }

    /// Live elapsed time. Pure query, never mutates state.
    pub fn elapsed(&self) -> Duration {
        match (self.snapshot.is_running, self.snapshot.start_time) {
            (true, Some(start)) => {
                self.snapshot.total + clamp_non_negative(self.clock.time() - start)
            }
            _ => self.snapshot.total,
        }
    }

    pub fn is_running(&self) -> bool {
        self.snapshot.is_running
    }

    /// True once any persistence write has failed this run. The screen shows
    /// a warning; tracking itself keeps going from memory.
    pub fn persistence_degraded(&self) -> bool {
        self.last_persist_failed
    }

    /// Called from the one-second display tick. Re-persists a running session
    /// every [AUTOSAVE_INTERVAL] as crash insurance.
    pub async fn autosave_tick(&mut self) {
        if !self.snapshot.is_running {
            return;
        }
        let now = self.clock.instant();
        if now.duration_since(self.last_autosave) >= AUTOSAVE_INTERVAL {
            self.persist().await;
            self.last_autosave = now;
        }
    }

    /// Persists the current snapshot unconditionally. Used by the interrupt
    /// path, which must write before teardown and must never prompt or block.
    pub async fn persist_now(&mut self) {
        self.persist().await;
    }

    async fn persist(&mut self) {
        match self.store.save(&self.snapshot).await {
            Ok(_) => self.last_persist_failed = false,
            Err(e) => {
                warn!("Failed to save session record: {e:?}");
                self.last_persist_failed = true;
            }
        }
    }
}

/// Wall clocks can step backwards; a negative interval is treated as empty
/// rather than shrinking the total.
fn clamp_non_negative(d: Duration) -> Duration {
    d.max(Duration::zero())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration as StdDuration,
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::time::Instant;

    use crate::{
        session::{
            entities::SessionSnapshot,
            history::{HistoryLedger, HistoryLedgerImpl},
            store::{SessionStore, SessionStoreImpl},
        },
        utils::clock::Clock,
    };

    use super::Tracker;

    /// Clock driven entirely by the test. Starts at a fixed moment and only
    /// moves when told to; instants advance in lockstep with the wall time.
    #[derive(Clone)]
    struct ManualClock {
        start: DateTime<Utc>,
        base: Instant,
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        fn new(start: DateTime<Utc>) -> Self {
            Self {
                start,
                base: Instant::now(),
                now: Arc::new(Mutex::new(start)),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn time(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn instant(&self) -> Instant {
            let passed = (self.time() - self.start).to_std().unwrap_or_default();
            self.base + passed
        }

        async fn sleep(&self, _duration: StdDuration) {}

        async fn sleep_until(&self, _instant: Instant) {}
    }

    fn test_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
    }

    fn make_tracker(
        dir: &std::path::Path,
        clock: &ManualClock,
    ) -> Tracker<SessionStoreImpl, HistoryLedgerImpl> {
        Tracker::new(
            SessionStoreImpl::new(dir.join("current_session.json")),
            HistoryLedgerImpl::new(dir.join("history.jsonl")),
            Box::new(clock.clone()),
        )
    }

    #[tokio::test]
    async fn test_fresh_tracker_is_stopped_and_zero() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        assert_eq!(tracker.recover_on_load().await, None);
        assert!(!tracker.is_running());
        assert_eq!(tracker.elapsed(), Duration::zero());
        Ok(())
    }

    #[tokio::test]
    async fn test_start_wait_stop_records_elapsed() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        clock.advance(Duration::seconds(5));
        tracker.stop().await;

        assert_eq!(tracker.elapsed(), Duration::seconds(5));

        let ledger = HistoryLedgerImpl::new(dir.path().join("history.jsonl"));
        let history = ledger.read_all().await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].duration, Duration::seconds(5));
        Ok(())
    }

    #[tokio::test]
    async fn test_elapsed_while_running_includes_live_interval() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        clock.advance(Duration::seconds(3));
        assert_eq!(tracker.elapsed(), Duration::seconds(3));
        clock.advance(Duration::seconds(4));
        assert_eq!(tracker.elapsed(), Duration::seconds(7));
        assert!(tracker.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_totals_sum_across_intervals() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        clock.advance(Duration::seconds(5));
        tracker.stop().await;

        // A pause between intervals does not count.
        clock.advance(Duration::seconds(100));

        tracker.start().await;
        clock.advance(Duration::seconds(7));
        tracker.stop().await;

        assert_eq!(tracker.elapsed(), Duration::seconds(12));
        Ok(())
    }

    #[tokio::test]
    async fn test_start_twice_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        clock.advance(Duration::seconds(5));
        // Speculative second start must not re-anchor the interval.
        tracker.start().await;
        clock.advance(Duration::seconds(5));
        tracker.stop().await;

        assert_eq!(tracker.elapsed(), Duration::seconds(10));
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_a_no_op() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.stop().await;
        assert_eq!(tracker.elapsed(), Duration::zero());

        let ledger = HistoryLedgerImpl::new(dir.path().join("history.jsonl"));
        assert_eq!(ledger.read_all().await?.len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_with_zero_total_never_appends() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        tracker.stop().await;

        let ledger = HistoryLedgerImpl::new(dir.path().join("history.jsonl"));
        assert_eq!(ledger.read_all().await?.len(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_counts_the_whole_gap() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());

        {
            let mut tracker = make_tracker(dir.path(), &clock);
            tracker.start().await;
            clock.advance(Duration::seconds(30));
            tracker.autosave_tick().await;
            // Process dies here; the record still says running.
        }

        clock.advance(Duration::seconds(100));

        let mut tracker = make_tracker(dir.path(), &clock);
        let recovered = tracker.recover_on_load().await;

        assert_eq!(recovered, Some(Duration::seconds(130)));
        assert!(tracker.is_running());
        assert_eq!(tracker.elapsed(), Duration::seconds(130));
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_of_stopped_record_resumes_total_only() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());

        {
            let mut tracker = make_tracker(dir.path(), &clock);
            tracker.start().await;
            clock.advance(Duration::seconds(42));
            tracker.stop().await;
        }

        clock.advance(Duration::seconds(1000));

        let mut tracker = make_tracker(dir.path(), &clock);
        assert_eq!(tracker.recover_on_load().await, None);
        assert!(!tracker.is_running());
        assert_eq!(tracker.elapsed(), Duration::seconds(42));
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_reanchors_start_time() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());

        {
            let mut tracker = make_tracker(dir.path(), &clock);
            tracker.start().await;
            clock.advance(Duration::seconds(100));
            tracker.persist_now().await;
        }

        let mut tracker = make_tracker(dir.path(), &clock);
        tracker.recover_on_load().await;

        // The persisted record must now be anchored at recovery time, so a
        // second recovery with no wall time passing adds nothing.
        let store = SessionStoreImpl::new(dir.path().join("current_session.json"));
        let saved = store.load().await.unwrap();
        assert_eq!(saved.start_time, Some(clock.time()));
        assert_eq!(saved.total, Duration::seconds(100));
        assert!(saved.is_running);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_clears_state_and_record_but_not_history() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        clock.advance(Duration::seconds(8));
        tracker.stop().await;
        tracker.reset().await;

        assert_eq!(tracker.elapsed(), Duration::zero());
        assert!(!tracker.is_running());

        let store = SessionStoreImpl::new(dir.path().join("current_session.json"));
        assert_eq!(store.load().await, None);

        let ledger = HistoryLedgerImpl::new(dir.path().join("history.jsonl"));
        assert_eq!(ledger.read_all().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_while_running() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        clock.advance(Duration::seconds(8));
        tracker.reset().await;

        assert_eq!(tracker.elapsed(), Duration::zero());
        assert!(!tracker.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_stops_append_cumulative_totals() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        let mut tracker = make_tracker(dir.path(), &clock);

        tracker.start().await;
        clock.advance(Duration::seconds(5));
        tracker.stop().await;

        tracker.start().await;
        clock.advance(Duration::seconds(7));
        tracker.stop().await;

        let ledger = HistoryLedgerImpl::new(dir.path().join("history.jsonl"));
        let history = ledger.read_all().await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].duration, Duration::seconds(5));
        assert_eq!(history[1].duration, Duration::seconds(12));
        Ok(())
    }

    #[tokio::test]
    async fn test_running_record_without_start_time_degrades_to_stopped() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());

        let store = SessionStoreImpl::new(dir.path().join("current_session.json"));
        store
            .save(&SessionSnapshot {
                start_time: None,
                total: Duration::seconds(60),
                is_running: true,
            })
            .await?;

        let mut tracker = make_tracker(dir.path(), &clock);
        assert_eq!(tracker.recover_on_load().await, None);
        assert!(!tracker.is_running());
        assert_eq!(tracker.elapsed(), Duration::seconds(60));
        Ok(())
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_memory_authoritative() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        // Point the store at a path whose parent does not exist so saves fail.
        let mut tracker = Tracker::new(
            SessionStoreImpl::new(dir.path().join("missing").join("current_session.json")),
            HistoryLedgerImpl::new(dir.path().join("missing").join("history.jsonl")),
            Box::new(clock.clone()),
        );

        tracker.start().await;
        assert!(tracker.persistence_degraded());
        clock.advance(Duration::seconds(5));
        tracker.stop().await;

        // Tracking kept working in memory despite every write failing.
        assert_eq!(tracker.elapsed(), Duration::seconds(5));
        Ok(())
    }
}
