// Room registry: one draft session per chat channel, created lazily and
// replaced only by an explicit reset.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::draft::session::DraftSession;
use crate::timer::TimerExpired;

/// Owned map from room key (channel id) to its draft session. The registry
/// lives inside the app loop's state and is passed by reference; there is no
/// ambient/static room table.
pub struct RoomRegistry {
    rooms: HashMap<String, DraftSession>,
    turn_duration: Duration,
    timer_tx: mpsc::Sender<TimerExpired>,
}

impl RoomRegistry {
    pub fn new(turn_duration: Duration, timer_tx: mpsc::Sender<TimerExpired>) -> Self {
        RoomRegistry {
            rooms: HashMap::new(),
            turn_duration,
            timer_tx,
        }
    }

    /// Session for `key`, creating an idle one on first reference.
    pub fn get_or_create(&mut self, key: &str) -> &mut DraftSession {
        let turn_duration = self.turn_duration;
        let timer_tx = &self.timer_tx;
        self.rooms.entry(key.to_string()).or_insert_with(|| {
            info!("Creating draft session for room {key}");
            DraftSession::new(key, turn_duration, timer_tx.clone())
        })
    }

    /// Existing session for `key`, if any. Never creates.
    pub fn get(&self, key: &str) -> Option<&DraftSession> {
        self.rooms.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut DraftSession> {
        self.rooms.get_mut(key)
    }

    /// Discard any session for `key` and install a fresh idle one. The old
    /// session's timer is cancelled before the swap, so an expiry already in
    /// flight can never act on the replacement (its generation no longer
    /// matches any armed timer).
    pub fn reset(&mut self, key: &str) -> &mut DraftSession {
        if let Some(old) = self.rooms.get_mut(key) {
            old.cancel_timer();
            info!("Resetting draft session for room {key}");
        }
        self.rooms.insert(
            key.to_string(),
            DraftSession::new(key, self.turn_duration, self.timer_tx.clone()),
        );
        self.get_or_create(key)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::session::Phase;

    const TURN: Duration = Duration::from_secs(1800);

    fn test_registry() -> (RoomRegistry, mpsc::Receiver<TimerExpired>) {
        let (tx, rx) = mpsc::channel(64);
        (RoomRegistry::new(TURN, tx), rx)
    }

    #[tokio::test]
    async fn get_or_create_is_lazy_and_stable() {
        let (mut registry, _rx) = test_registry();
        assert!(registry.is_empty());

        registry.get_or_create("room-1").start("Alice", "https://example.com/a.png");
        assert_eq!(registry.len(), 1);

        // Same key returns the same session, not a fresh one.
        let session = registry.get_or_create("room-1");
        assert_eq!(session.phase, Phase::Waiting);
    }

    #[tokio::test]
    async fn rooms_are_isolated_by_key() {
        let (mut registry, _rx) = test_registry();
        registry.get_or_create("room-1").start("Alice", "https://example.com/a.png");
        registry.get_or_create("room-2");

        assert_eq!(registry.get("room-1").map(|s| s.phase), Some(Phase::Waiting));
        assert_eq!(registry.get("room-2").map(|s| s.phase), Some(Phase::Idle));
    }

    #[tokio::test]
    async fn get_never_creates() {
        let (registry, _rx) = test_registry();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn reset_replaces_session_and_cancels_its_timer() {
        let (mut registry, _rx) = test_registry();
        {
            let session = registry.get_or_create("room-1");
            session.start("Alice", "https://example.com/a.png");
            session.join("Bob", "https://example.com/b.png").unwrap();
            assert!(session.timer().is_armed());
        }
        let old_generation = registry.get("room-1").and_then(|s| s.timer().generation());
        assert!(old_generation.is_some());

        let fresh = registry.reset("room-1");
        assert_eq!(fresh.phase, Phase::Idle);
        assert_eq!(fresh.available().len(), 20);
        assert!(!fresh.timer().is_armed());
        // The replacement holds no armed timer, so the old generation can
        // never match again.
        assert_eq!(fresh.timer().generation(), None);
    }

    #[tokio::test]
    async fn reset_on_unknown_key_creates_fresh_session() {
        let (mut registry, _rx) = test_registry();
        let session = registry.reset("brand-new");
        assert_eq!(session.phase, Phase::Idle);
        assert_eq!(registry.len(), 1);
    }
}
