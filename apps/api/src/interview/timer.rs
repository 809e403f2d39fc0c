//! Timer Service — per-question countdown, total elapsed counter and the
//! tick source that drives them.
//!
//! `QuestionTimer` is pure bookkeeping: it knows nothing about schedules.
//! `Ticker` is the schedule: one tokio task per active session that emits a
//! `TimerEvent` over a channel once per period. The consumer decides what a
//! tick means.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use uuid::Uuid;

/// What a single tick did to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time remains on the current question.
    Running,
    /// The countdown hit zero on this tick. Reported once per question.
    Expired,
    /// The countdown was already at zero and expiry was already reported.
    AlreadyExpired,
}

/// Countdown for the current question plus the session-wide elapsed counter.
/// All quantities are in ticks (one tick == one second of budget).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionTimer {
    time_left: u64,
    elapsed_total: u64,
    expiry_signalled: bool,
}

impl QuestionTimer {
    pub fn new(budget: u64) -> Self {
        Self {
            time_left: budget,
            elapsed_total: 0,
            expiry_signalled: false,
        }
    }

    /// Advances both counters by one unit. The countdown saturates at zero.
    pub fn tick(&mut self) -> TickOutcome {
        self.elapsed_total += 1;
        self.time_left = self.time_left.saturating_sub(1);

        if self.time_left > 0 {
            TickOutcome::Running
        } else if self.expiry_signalled {
            TickOutcome::AlreadyExpired
        } else {
            self.expiry_signalled = true;
            TickOutcome::Expired
        }
    }

    /// Re-arms the countdown for a new question. Total elapsed is untouched.
    pub fn reset(&mut self, budget: u64) {
        self.time_left = budget;
        self.expiry_signalled = false;
    }

    pub fn time_left(&self) -> u64 {
        self.time_left
    }

    pub fn elapsed_total(&self) -> u64 {
        self.elapsed_total
    }
}

/// One tick for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub session_id: Uuid,
}

/// Background tick source for a single session. Aborted on `stop` or drop.
#[derive(Debug)]
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(session_id: Uuid, period: Duration, tx: mpsc::Sender<TimerEvent>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the countdown starts one period later.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(TimerEvent { session_id }).await.is_err() {
                    debug!("Timer channel closed; ticker for session {session_id} exiting");
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_down_and_accumulates_total() {
        let mut timer = QuestionTimer::new(3);
        assert_eq!(timer.tick(), TickOutcome::Running);
        assert_eq!(timer.time_left(), 2);
        assert_eq!(timer.elapsed_total(), 1);
        assert_ne!(timer.time_left(), 0);
    }

    #[test]
    fn test_expiry_is_reported_exactly_once() {
        let mut timer = QuestionTimer::new(2);
        assert_eq!(timer.tick(), TickOutcome::Running);
        assert_eq!(timer.tick(), TickOutcome::Expired);
        assert_eq!(timer.time_left(), 0);
        assert_eq!(timer.tick(), TickOutcome::AlreadyExpired);
        assert_eq!(timer.tick(), TickOutcome::AlreadyExpired);
        assert_eq!(timer.time_left(), 0);
        assert_eq!(timer.elapsed_total(), 4);
    }

    #[test]
    fn test_reset_rearms_expiry_but_keeps_total() {
        let mut timer = QuestionTimer::new(1);
        assert_eq!(timer.tick(), TickOutcome::Expired);
        timer.reset(2);
        assert_eq!(timer.time_left(), 2);
        assert_ne!(timer.time_left(), 0);
        assert_eq!(timer.tick(), TickOutcome::Running);
        assert_eq!(timer.tick(), TickOutcome::Expired);
        assert_eq!(timer.elapsed_total(), 3);
    }

    #[test]
    fn test_zero_budget_expires_on_first_tick() {
        let mut timer = QuestionTimer::new(0);
        assert_eq!(timer.time_left(), 0);
        assert_eq!(timer.tick(), TickOutcome::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_emits_one_event_per_period() {
        let (tx, mut rx) = mpsc::channel(16);
        let id = Uuid::new_v4();
        let ticker = Ticker::spawn(id, Duration::from_secs(1), tx);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        ticker.stop();

        let mut received = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.session_id, id);
            received += 1;
        }
        assert_eq!(received, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_exits_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let ticker = Ticker::spawn(Uuid::new_v4(), Duration::from_secs(1), tx);
        drop(rx);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tokio::task::yield_now().await;
        assert!(ticker.handle.is_finished());
    }
}
