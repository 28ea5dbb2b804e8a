//! Timer engine — server-authoritative countdown for one session.
//!
//! The remaining time is always derived from a deadline held as a
//! [`tokio::time::Instant`], never from a decrementing counter, so repeated
//! broadcasts cannot drift. Expiry and tick events are posted into the
//! session worker's event stream by scheduled tasks; no client message is
//! involved in ending an expired exam.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use examhall_core::error::AppError;
use examhall_core::result::AppResult;

use super::state::TimerState;

/// Events the timer posts back into the session worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Periodic cadence event while the timer is running.
    Tick,
    /// The deadline was reached.
    Expired,
}

/// Internal clock state while a timer exists.
#[derive(Debug)]
struct TimerClock {
    duration: Duration,
    started_at: DateTime<Utc>,
    /// Authoritative deadline while running.
    deadline: Instant,
    /// Frozen remaining time while paused.
    frozen_remaining: Option<Duration>,
    paused_since: Option<Instant>,
    paused_at: Option<DateTime<Utc>>,
    accumulated_pause: Duration,
    extended: Duration,
}

impl TimerClock {
    fn total_pause(&self) -> Duration {
        match self.paused_since {
            Some(since) => self.accumulated_pause + Instant::now().saturating_duration_since(since),
            None => self.accumulated_pause,
        }
    }

    fn remaining(&self) -> Duration {
        match self.frozen_remaining {
            Some(frozen) => frozen,
            None => self.deadline.saturating_duration_since(Instant::now()),
        }
    }

    fn snapshot(&self) -> TimerState {
        let total = self.duration + self.total_pause() + self.extended;
        let ends_at = self.started_at + chrono::Duration::from_std(total).unwrap_or_default();
        TimerState {
            duration_seconds: self.duration.as_secs(),
            started_at: self.started_at,
            ends_at,
            paused_at: self.paused_at,
            accumulated_pause_seconds: self.total_pause().as_secs(),
            extended_seconds: self.extended.as_secs(),
            remaining_seconds: self.remaining().as_secs(),
        }
    }
}

/// Countdown timer for one exam session.
#[derive(Debug)]
pub struct TimerEngine {
    tick_interval: Duration,
    events_tx: mpsc::Sender<TimerEvent>,
    events_rx: Option<mpsc::Receiver<TimerEvent>>,
    clock: Option<TimerClock>,
    expiry_task: Option<JoinHandle<()>>,
    tick_task: Option<JoinHandle<()>>,
}

impl TimerEngine {
    /// Create an idle engine with the given tick cadence.
    pub fn new(tick_interval_seconds: u64) -> Self {
        let (events_tx, events_rx) = mpsc::channel(8);
        Self {
            tick_interval: Duration::from_secs(tick_interval_seconds.max(1)),
            events_tx,
            events_rx: Some(events_rx),
            clock: None,
            expiry_task: None,
            tick_task: None,
        }
    }

    /// Take the event receiver. Called once by the owning session worker.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TimerEvent>> {
        self.events_rx.take()
    }

    /// Start the countdown.
    ///
    /// Fails with `TimerAlreadyRunning` if called twice without a stop.
    pub fn start(&mut self, duration_seconds: u64) -> AppResult<TimerState> {
        if self.clock.is_some() {
            return Err(AppError::timer_already_running(
                "a timer is already running for this session",
            ));
        }
        if duration_seconds == 0 {
            return Err(AppError::validation("timer duration must be positive"));
        }

        let duration = Duration::from_secs(duration_seconds);
        let deadline = Instant::now() + duration;
        let clock = TimerClock {
            duration,
            started_at: Utc::now(),
            deadline,
            frozen_remaining: None,
            paused_since: None,
            paused_at: None,
            accumulated_pause: Duration::ZERO,
            extended: Duration::ZERO,
        };
        let state = clock.snapshot();
        self.clock = Some(clock);
        self.schedule(deadline);

        debug!(duration_seconds, "Timer started");
        Ok(state)
    }

    /// Freeze the remaining time and cancel the scheduled expiry.
    pub fn pause(&mut self) -> AppResult<TimerState> {
        let clock = self
            .clock
            .as_mut()
            .ok_or_else(|| AppError::timer_not_running("no timer to pause"))?;
        if clock.frozen_remaining.is_some() {
            return Err(AppError::invalid_transition("timer is already paused"));
        }

        clock.frozen_remaining = Some(clock.deadline.saturating_duration_since(Instant::now()));
        clock.paused_since = Some(Instant::now());
        clock.paused_at = Some(Utc::now());
        self.cancel_tasks();

        let state = self.clock.as_ref().map(TimerClock::snapshot);
        state.ok_or_else(|| AppError::internal("timer state vanished during pause"))
    }

    /// Recompute the deadline from the frozen remaining time and reschedule.
    ///
    /// Fails with `NotPaused` if the timer is not paused.
    pub fn resume(&mut self) -> AppResult<TimerState> {
        let clock = self
            .clock
            .as_mut()
            .ok_or_else(|| AppError::timer_not_running("no timer to resume"))?;
        let frozen = clock
            .frozen_remaining
            .take()
            .ok_or_else(|| AppError::not_paused("timer is not paused"))?;

        if let Some(since) = clock.paused_since.take() {
            clock.accumulated_pause += Instant::now().saturating_duration_since(since);
        }
        clock.paused_at = None;
        clock.deadline = Instant::now() + frozen;
        let deadline = clock.deadline;
        let state = clock.snapshot();
        self.schedule(deadline);

        debug!(remaining_seconds = frozen.as_secs(), "Timer resumed");
        Ok(state)
    }

    /// Push the deadline out by the given number of seconds.
    ///
    /// Valid only while the timer is running (not paused).
    pub fn extend(&mut self, additional_seconds: u64) -> AppResult<TimerState> {
        let clock = self
            .clock
            .as_mut()
            .ok_or_else(|| AppError::timer_not_running("no timer to extend"))?;
        if clock.frozen_remaining.is_some() {
            return Err(AppError::invalid_transition("cannot extend a paused timer"));
        }
        if additional_seconds == 0 {
            return Err(AppError::validation("extension must be positive"));
        }

        let extra = Duration::from_secs(additional_seconds);
        clock.deadline += extra;
        clock.extended += extra;
        let deadline = clock.deadline;
        let state = clock.snapshot();
        self.schedule(deadline);

        debug!(additional_seconds, "Timer extended");
        Ok(state)
    }

    /// Cancel scheduled tasks and discard the clock.
    pub fn stop(&mut self) {
        self.cancel_tasks();
        self.clock = None;
    }

    /// Remaining time: frozen while paused, otherwise derived from the
    /// deadline. `None` when no timer exists.
    pub fn remaining(&self) -> Option<Duration> {
        self.clock.as_ref().map(TimerClock::remaining)
    }

    /// Remaining whole seconds, if a timer exists.
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.remaining().map(|d| d.as_secs())
    }

    /// Whether a timer exists (running or paused).
    pub fn is_running(&self) -> bool {
        self.clock.is_some()
    }

    /// Whether the timer exists and is paused.
    pub fn is_paused(&self) -> bool {
        self.clock
            .as_ref()
            .is_some_and(|c| c.frozen_remaining.is_some())
    }

    /// Serializable snapshot, if a timer exists.
    pub fn snapshot(&self) -> Option<TimerState> {
        self.clock.as_ref().map(TimerClock::snapshot)
    }

    /// (Re)schedule the expiry and tick tasks against the given deadline.
    fn schedule(&mut self, deadline: Instant) {
        self.cancel_tasks();

        let expiry_tx = self.events_tx.clone();
        self.expiry_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = expiry_tx.send(TimerEvent::Expired).await;
        }));

        let tick_tx = self.events_tx.clone();
        let period = self.tick_interval;
        self.tick_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tick_tx.send(TimerEvent::Tick).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel_tasks(&mut self) {
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examhall_core::error::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_remaining_right_after_start() {
        let mut engine = TimerEngine::new(1);
        engine.start(1800).expect("start");

        let remaining = engine.remaining_seconds().expect("timer exists");
        assert!(
            (1799..=1800).contains(&remaining),
            "remaining was {remaining}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_fails() {
        let mut engine = TimerEngine::new(1);
        engine.start(60).expect("start");
        let err = engine.start(60).expect_err("second start must fail");
        assert_eq!(err.kind, ErrorKind::TimerAlreadyRunning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_remaining() {
        let mut engine = TimerEngine::new(1);
        engine.start(60).expect("start");

        tokio::time::advance(Duration::from_secs(20)).await;
        engine.pause().expect("pause");
        let frozen = engine.remaining_seconds().expect("timer exists");

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(engine.remaining_seconds(), Some(frozen));
        assert!(engine.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_then_resume_shifts_ends_at() {
        let mut engine = TimerEngine::new(1);
        let started = engine.start(30).expect("start");

        engine.pause().expect("pause");
        tokio::time::advance(Duration::from_secs(10)).await;
        let resumed = engine.resume().expect("resume");

        let shift = (resumed.ends_at - started.ends_at).num_seconds();
        assert!((9..=11).contains(&shift), "ends_at shifted by {shift}s");
        assert_eq!(resumed.accumulated_pause_seconds, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_without_pause_fails() {
        let mut engine = TimerEngine::new(1);
        engine.start(60).expect("start");
        let err = engine.resume().expect_err("resume must fail");
        assert_eq!(err.kind, ErrorKind::NotPaused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_shifts_deadline() {
        let mut engine = TimerEngine::new(1);
        engine.start(60).expect("start");

        let extended = engine.extend(30).expect("extend");
        assert_eq!(extended.extended_seconds, 30);

        let remaining = engine.remaining_seconds().expect("timer exists");
        assert!((89..=90).contains(&remaining), "remaining was {remaining}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_event_fires() {
        let mut engine = TimerEngine::new(1);
        let mut events = engine.take_events().expect("events");
        engine.start(5).expect("start");

        let mut expired = false;
        for _ in 0..16 {
            match events.recv().await {
                Some(TimerEvent::Expired) => {
                    expired = true;
                    break;
                }
                Some(TimerEvent::Tick) => {}
                None => break,
            }
        }
        assert!(expired, "expiry event never arrived");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_while_running() {
        let mut engine = TimerEngine::new(1);
        let mut events = engine.take_events().expect("events");
        engine.start(60).expect("start");

        let ev = events.recv().await;
        assert_eq!(ev, Some(TimerEvent::Tick));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_expiry() {
        let mut engine = TimerEngine::new(1);
        let mut events = engine.take_events().expect("events");
        engine.start(5).expect("start");
        engine.stop();
        assert!(!engine.is_running());

        tokio::time::advance(Duration::from_secs(10)).await;
        // Only ticks queued before the stop may remain; no expiry.
        while let Ok(ev) = events.try_recv() {
            assert_ne!(ev, TimerEvent::Expired);
        }
    }
}
