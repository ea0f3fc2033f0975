// Turn-timer controller: a per-session countdown that forces a turn advance
// when it expires.
//
// The timer itself is a spawned task that sleeps until the deadline and then
// sends a [`TimerExpired`] event to the app loop. The app loop is the only
// place that mutates sessions, so the expiry effect is applied there -- after
// checking that the event's generation still matches the session's armed
// timer and that the session is still drafting. A queued expiry can therefore
// never act on a session that was reset, completed, or re-armed in the
// meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Expiry notification delivered to the app loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerExpired {
    /// Room key of the session whose timer ran out.
    pub room_key: String,
    /// Generation of the armed timer that produced this event.
    pub generation: u64,
}

/// Process-wide generation source. Generations are unique across all timers
/// in the process, so an expiry queued for a session that has since been
/// replaced can never match the replacement session's timer.
///
/// u64 overflow is not a practical concern: at one increment per second it
/// would take ~584 billion years to wrap.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// The armed state of a running countdown.
#[derive(Debug)]
struct Armed {
    generation: u64,
    deadline: Instant,
    task: JoinHandle<()>,
}

/// Cancellable countdown owned by a draft session.
///
/// At most one countdown runs per timer: arming replaces (and aborts) any
/// previous task. Dropping the timer aborts the task as well, so a session
/// discarded by the registry can never fire afterwards.
#[derive(Debug)]
pub struct TurnTimer {
    room_key: String,
    duration: Duration,
    tx: mpsc::Sender<TimerExpired>,
    armed: Option<Armed>,
}

impl TurnTimer {
    pub fn new(room_key: &str, duration: Duration, tx: mpsc::Sender<TimerExpired>) -> Self {
        TurnTimer {
            room_key: room_key.to_string(),
            duration,
            tx,
            armed: None,
        }
    }

    /// Start (or restart) the countdown. Any previous task is aborted first,
    /// so no two countdowns ever run concurrently for the same session.
    pub fn arm(&mut self) {
        self.cancel();

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + self.duration;
        let tx = self.tx.clone();
        let room_key = self.room_key.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            debug!("Turn timer expired for room {room_key} (generation {generation})");
            let _ = tx
                .send(TimerExpired {
                    room_key,
                    generation,
                })
                .await;
        });

        self.armed = Some(Armed {
            generation,
            deadline,
            task,
        });
    }

    /// Stop the countdown. Idempotent: cancelling an idle timer is a no-op.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
        }
    }

    /// Whether a countdown is currently running.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Generation of the currently armed countdown, if any. The app loop
    /// compares this against [`TimerExpired::generation`] to discard stale
    /// events.
    pub fn generation(&self) -> Option<u64> {
        self.armed.as_ref().map(|a| a.generation)
    }

    /// Time left until expiry, if armed. Zero once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .as_ref()
            .map(|a| a.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURN: Duration = Duration::from_secs(1800);

    fn test_timer(capacity: usize) -> (TurnTimer, mpsc::Receiver<TimerExpired>) {
        let (tx, rx) = mpsc::channel(capacity);
        (TurnTimer::new("room-1", TURN, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_sends_event_with_matching_generation() {
        let (mut timer, mut rx) = test_timer(4);
        timer.arm();
        let generation = timer.generation().expect("timer should be armed");

        tokio::time::advance(TURN + Duration::from_secs(1)).await;

        let event = rx.recv().await.expect("expiry event");
        assert_eq!(event.room_key, "room-1");
        assert_eq!(event.generation, generation);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_expiry() {
        let (mut timer, mut rx) = test_timer(4);
        timer.arm();
        timer.cancel();
        assert!(!timer.is_armed());
        assert_eq!(timer.generation(), None);

        tokio::time::advance(TURN * 2).await;

        // Give the (aborted) task a chance to run if it somehow survived.
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_the_previous_countdown() {
        let (mut timer, mut rx) = test_timer(4);
        timer.arm();
        let first = timer.generation().expect("armed");

        tokio::time::advance(Duration::from_secs(600)).await;
        timer.arm();
        let second = timer.generation().expect("armed");
        assert_ne!(first, second);

        tokio::time::advance(TURN + Duration::from_secs(1)).await;

        // Only the second countdown fires; the first was aborted mid-sleep.
        let event = rx.recv().await.expect("expiry event");
        assert_eq!(event.generation, second);
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let (mut timer, _rx) = test_timer(4);
        assert_eq!(timer.remaining(), None);

        timer.arm();
        assert_eq!(timer.remaining(), Some(TURN));

        tokio::time::advance(Duration::from_secs(61)).await;
        let remaining = timer.remaining().expect("armed");
        assert_eq!(remaining, TURN - Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_aborts_the_countdown() {
        let (tx, mut rx) = mpsc::channel(4);
        {
            let mut timer = TurnTimer::new("room-1", TURN, tx);
            timer.arm();
        }

        tokio::time::advance(TURN * 2).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn generations_are_unique_across_timers() {
        let (tx, _rx) = mpsc::channel::<TimerExpired>(4);
        let mut a = TurnTimer::new("room-a", TURN, tx.clone());
        let mut b = TurnTimer::new("room-b", TURN, tx);
        a.arm();
        b.arm();
        assert_ne!(a.generation(), b.generation());
    }
}
