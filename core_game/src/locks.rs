use std::sync::Arc;

use ahash::AHashMap;
use game_schema::PlayerId;
use parking_lot::Mutex;

/// One mutex per player id. Holding a player's slot is the only way to
/// mutate that player, whether from a chat action or a background sweep.
#[derive(Default)]
pub struct PlayerLocks {
    slots: Mutex<AHashMap<PlayerId, Arc<Mutex<()>>>>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, player: PlayerId) -> Arc<Mutex<()>> {
        Arc::clone(self.slots.lock().entry(player).or_default())
    }

    /// Runs `f` while holding the player's slot.
    pub fn with<R>(&self, player: PlayerId, f: impl FnOnce() -> R) -> R {
        let slot = self.slot(player);
        let _held = slot.lock();
        f()
    }

    /// Drops slots nobody holds. Run from the daily sweep to bound growth.
    pub fn prune_idle(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1 || slot.is_locked());
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_player_is_serialised() {
        let locks = Arc::new(PlayerLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    locks.with(PlayerId(1), || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(2));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_players_do_not_block() {
        let locks = PlayerLocks::new();
        let first = locks.slot(PlayerId(1));
        let _held = first.lock();
        assert!(locks.slot(PlayerId(2)).try_lock().is_some());
        assert!(locks.slot(PlayerId(1)).try_lock().is_none());
    }

    #[test]
    fn idle_slots_are_pruned() {
        let locks = PlayerLocks::new();
        let held = locks.slot(PlayerId(1));
        locks.with(PlayerId(2), || ());
        assert_eq!(locks.prune_idle(), 1);
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.prune_idle(), 1);
        assert!(locks.is_empty());
    }
}
