use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

const SECONDS_PER_MINUTE: i64 = 60;
const URGENCY_THRESHOLD_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CountdownEvent {
    Tick { remaining_seconds: i64 },
    /// The final event of an armed countdown, emitted exactly once.
    Expired,
}

/// Counts a fixed number of whole minutes down from its own start, one tick
/// per second. The countdown is anchored to monotonic runtime time, not the
/// wall clock, so a wrong device clock cannot stretch or shrink an attempt.
#[derive(Debug)]
pub(crate) struct CountdownTimer {
    events: mpsc::Receiver<CountdownEvent>,
    remaining_seconds: i64,
    expired: bool,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    pub(crate) fn arm(duration_minutes: i64) -> Self {
        let total_seconds = duration_minutes.max(0) * SECONDS_PER_MINUTE;
        let (tx, events) = mpsc::channel(32);
        let task = tokio::spawn(run_ticks(total_seconds, tx));
        Self { events, remaining_seconds: total_seconds, expired: false, task }
    }

    /// Next countdown event. Returns `None` once the countdown has expired or
    /// been canceled; `Expired` is guaranteed to be the last real event.
    pub(crate) async fn next_event(&mut self) -> Option<CountdownEvent> {
        if self.expired {
            return None;
        }
        let event = self.events.recv().await;
        match event {
            Some(CountdownEvent::Tick { remaining_seconds }) => {
                self.remaining_seconds = remaining_seconds;
            }
            Some(CountdownEvent::Expired) => {
                self.remaining_seconds = 0;
                self.expired = true;
            }
            None => {}
        }
        event
    }

    pub(crate) fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds
    }

    /// Presentational urgency flag only; expiry handling never depends on it.
    pub(crate) fn under_one_minute(&self) -> bool {
        self.remaining_seconds < URGENCY_THRESHOLD_SECONDS
    }

    /// Stops the tick task. Idempotent; canceling after expiry has no effect.
    pub(crate) fn cancel(&mut self) {
        self.task.abort();
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn format_remaining(remaining_seconds: i64) -> String {
    let clamped = remaining_seconds.max(0);
    format!("{:02}:{:02}", clamped / 60, clamped % 60)
}

async fn run_ticks(total_seconds: i64, tx: mpsc::Sender<CountdownEvent>) {
    let mut remaining = total_seconds;
    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so the
    // countdown starts a full second away from its first decrement.
    tick.tick().await;

    while remaining > 0 {
        tick.tick().await;
        remaining -= 1;
        if remaining == 0 {
            break;
        }
        if tx.send(CountdownEvent::Tick { remaining_seconds: remaining }).await.is_err() {
            return;
        }
    }

    let _ = tx.send(CountdownEvent::Expired).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn one_minute_countdown_expires_exactly_once() {
        let mut timer = CountdownTimer::arm(1);
        let mut ticks = 0;
        let mut expiries = 0;

        while let Some(event) = timer.next_event().await {
            match event {
                CountdownEvent::Tick { .. } => ticks += 1,
                CountdownEvent::Expired => expiries += 1,
            }
        }

        assert_eq!(ticks, 59);
        assert_eq!(expiries, 1);
        assert!(timer.next_event().await.is_none());
        assert_eq!(timer.remaining_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_expiry_before_the_duration_elapses() {
        let mut timer = CountdownTimer::arm(1);

        for expected in (30..60).rev() {
            let event = timer.next_event().await;
            assert_eq!(event, Some(CountdownEvent::Tick { remaining_seconds: expected }));
        }

        assert_eq!(timer.remaining_seconds(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn urgency_flag_flips_under_one_minute() {
        let mut timer = CountdownTimer::arm(2);

        while timer.remaining_seconds() > 60 {
            timer.next_event().await;
        }
        assert!(!timer.under_one_minute());

        timer.next_event().await;
        assert_eq!(timer.remaining_seconds(), 59);
        assert!(timer.under_one_minute());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_expires_immediately() {
        let mut timer = CountdownTimer::arm(0);
        assert_eq!(timer.next_event().await, Some(CountdownEvent::Expired));
        assert!(timer.next_event().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_and_silences_the_timer() {
        let mut timer = CountdownTimer::arm(5);
        timer.cancel();
        timer.cancel();
        assert!(timer.next_event().await.is_none());

        // Canceling after expiry changes nothing.
        let mut expired = CountdownTimer::arm(0);
        assert_eq!(expired.next_event().await, Some(CountdownEvent::Expired));
        expired.cancel();
        assert!(expired.next_event().await.is_none());
    }

    #[test]
    fn format_remaining_pads_minutes_and_seconds() {
        assert_eq!(format_remaining(600), "10:00");
        assert_eq!(format_remaining(59), "00:59");
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(-5), "00:00");
    }
}
