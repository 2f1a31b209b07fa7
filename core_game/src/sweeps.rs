//! Background maintenance over every stored player.
//!
//! Each sweep walks the stored ids in parallel, takes the same per-player
//! lock as chat actions, and keeps going when a single player fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use game_schema::{PlayerId, PlayerState};
use rayon::prelude::*;

use crate::calendar::GameCalendar;
use crate::config::FeatureFlags;
use crate::controller::GameController;
use crate::error::GameResult;
use crate::scheduler::Scheduler;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub visited: usize,
    pub changed: usize,
    pub failed: usize,
}

fn sweep(
    controller: &GameController,
    name: &'static str,
    apply: impl Fn(&mut PlayerState, i64) -> bool + Sync,
) -> SweepReport {
    let ids = match controller.store().list_players() {
        Ok(ids) => ids,
        Err(err) => {
            tracing::error!(target: "tide_pet::sweeps", sweep = name, error = %err, "sweep.list_failed");
            controller.metrics().record_sweep(1);
            return SweepReport {
                failed: 1,
                ..SweepReport::default()
            };
        }
    };

    let results: Vec<(PlayerId, GameResult<Option<bool>>)> = ids
        .par_iter()
        .map(|&id| (id, controller.update_stored(id, |player, now| apply(player, now))))
        .collect();

    let mut report = SweepReport::default();
    for (id, result) in results {
        match result {
            Ok(Some(changed)) => {
                report.visited += 1;
                if changed {
                    report.changed += 1;
                }
            }
            Ok(None) => {}
            Err(err) => {
                report.failed += 1;
                tracing::warn!(
                    target: "tide_pet::sweeps",
                    sweep = name,
                    player = %id,
                    error = %err,
                    "sweep.player_failed"
                );
            }
        }
    }
    controller.metrics().record_sweep(report.failed as u64);
    tracing::info!(
        target: "tide_pet::sweeps",
        sweep = name,
        visited = report.visited,
        changed = report.changed,
        failed = report.failed,
        "sweep.completed"
    );
    report
}

/// Midnight rollover: zeroes daily counters and drops streaks that missed a day.
pub fn daily_reset(controller: &GameController) -> SweepReport {
    let calendar = GameCalendar::new(&controller.config().calendar);
    let report = sweep(controller, "daily_reset", |player, now| {
        let today = calendar.date_of(now);
        let before = (
            player.combat.battles_today,
            player.miniboss.attempts_today,
            player.miniboss.bonus_attempts,
            player.ads.ads_today,
            player.daily_reward.streak,
        );
        player.combat.roll_over(today);
        player.miniboss.roll_over(today);
        player.ads.roll_over(today);
        if player.daily_reward.streak > 0
            && calendar.days_between(player.daily_reward.last_claim, now) > 1
        {
            player.daily_reward.streak = 0;
        }
        before
            != (
                player.combat.battles_today,
                player.miniboss.attempts_today,
                player.miniboss.bonus_attempts,
                player.ads.ads_today,
                player.daily_reward.streak,
            )
    });
    let pruned = controller.locks().prune_idle();
    tracing::debug!(target: "tide_pet::sweeps", pruned, "locks.pruned");
    report
}

/// Clears subscription flags whose expiry has passed.
pub fn premium_expiry(controller: &GameController) -> SweepReport {
    sweep(controller, "premium_expiry", |player, now| {
        let premium = &mut player.premium;
        let mut changed = false;
        if premium.premium_active && premium.premium_expires_at <= now {
            premium.premium_active = false;
            changed = true;
        }
        if premium.auto_collector_active && premium.auto_collector_expires_at <= now {
            premium.auto_collector_active = false;
            changed = true;
        }
        if premium.daily_bonus_active && premium.daily_bonus_expires_at <= now {
            premium.daily_bonus_active = false;
            changed = true;
        }
        if changed {
            tracing::info!(target: "tide_pet::sweeps", player = %player.id, "premium.expired");
        }
        changed
    })
}

/// Gives premium players their weekly fragments once per interval.
pub fn weekly_premium_distribution(controller: &GameController) -> SweepReport {
    let rules = controller.config().sweeps.clone();
    sweep(controller, "weekly_premium", |player, now| {
        if !player.is_premium(now)
            || now - player.premium.last_weekly_distribution < rules.weekly_distribution_interval_secs
        {
            return false;
        }
        player.premium.fragments += rules.weekly_distribution_fragments;
        player.premium.last_weekly_distribution = now;
        true
    })
}

/// Writes a store checkpoint and logs the running counters.
pub fn autosave(controller: &GameController) -> GameResult<()> {
    let snapshot = controller.metrics().snapshot();
    tracing::info!(
        target: "tide_pet::metrics",
        actions = snapshot.actions,
        rejections = snapshot.rejections,
        failures = snapshot.failures,
        saves = snapshot.saves,
        skipped_saves = snapshot.skipped_saves,
        sweep_runs = snapshot.sweep_runs,
        "metrics.snapshot"
    );
    if !controller.config().feature_enabled(FeatureFlags::AUTOSAVE) {
        return Ok(());
    }
    let result = controller.checkpoint_store();
    controller
        .metrics()
        .record_sweep(u64::from(result.is_err()));
    result
}

/// Schedules every sweep on `scheduler` with the configured cadence.
pub fn register_sweeps(scheduler: &dyn Scheduler, controller: Arc<GameController>) {
    let rules = controller.config().sweeps.clone();
    let calendar = GameCalendar::new(&controller.config().calendar);

    let daily = Arc::clone(&controller);
    scheduler.run_daily(
        "daily_reset",
        NaiveTime::MIN,
        calendar,
        Arc::new(move || {
            daily_reset(&daily);
        }),
    );

    let saver = Arc::clone(&controller);
    scheduler.run_repeating(
        "autosave",
        Duration::from_secs(rules.autosave_interval_secs),
        Arc::new(move || {
            if let Err(err) = autosave(&saver) {
                tracing::error!(target: "tide_pet::sweeps", error = %err, "autosave.failed");
            }
        }),
    );

    let expiry = Arc::clone(&controller);
    scheduler.run_repeating(
        "premium_expiry",
        Duration::from_secs(rules.premium_expiry_interval_secs),
        Arc::new(move || {
            premium_expiry(&expiry);
        }),
    );

    let weekly = controller;
    scheduler.run_repeating(
        "weekly_premium",
        Duration::from_secs(rules.weekly_check_interval_secs),
        Arc::new(move || {
            weekly_premium_distribution(&weekly);
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::{AdError, AdHandle, AdNetwork};
    use crate::calendar::ManualClock;
    use crate::config::GameConfig;
    use crate::controller::Collaborators;
    use crate::payment::RejectAllPayments;
    use crate::storage::{MemoryStore, PlayerStore};
    use crate::transport::RecordingTransport;
    use parking_lot::Mutex;

    // 2024-03-01 12:00 at UTC+1.
    const DAY_ONE_NOON: i64 = 1_709_290_800;
    const DAY: i64 = 86_400;

    struct NoAds;

    impl AdNetwork for NoAds {
        fn request_ad(&self, _player: PlayerId) -> Result<AdHandle, AdError> {
            Err(AdError::Unavailable("none".to_string()))
        }

        fn confirm_ad_viewed(&self, _handle: &AdHandle, _timeout: Duration) -> bool {
            false
        }
    }

    fn controller(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> GameController {
        GameController::new(
            GameConfig::builtin(),
            Collaborators {
                store,
                transport: Arc::new(RecordingTransport::new()),
                ads: Arc::new(NoAds),
                payments: Arc::new(RejectAllPayments),
                clock,
            },
        )
    }

    fn seeded(store: &MemoryStore, id: u64, edit: impl FnOnce(&mut PlayerState)) {
        let mut player = PlayerState::new(PlayerId(id), DAY_ONE_NOON);
        edit(&mut player);
        store.save_player(&player).unwrap();
    }

    #[test]
    fn daily_reset_zeroes_counters_and_lapsed_streaks() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(DAY_ONE_NOON));
        let today = GameCalendar::default().date_of(DAY_ONE_NOON);
        seeded(&store, 1, |p| {
            p.combat.battles_today = 7;
            p.combat.last_battle_date = Some(today);
            p.daily_reward.last_claim = DAY_ONE_NOON;
            p.daily_reward.streak = 4;
        });
        seeded(&store, 2, |p| {
            p.daily_reward.last_claim = DAY_ONE_NOON - 2 * DAY;
            p.daily_reward.streak = 9;
        });
        let controller = controller(store.clone(), clock.clone());

        clock.set(DAY_ONE_NOON + DAY / 2);
        let report = daily_reset(&controller);
        assert_eq!(report.failed, 0);
        assert_eq!(report.visited, 2);

        let kept = store.load_player(PlayerId(1)).unwrap().unwrap();
        assert_eq!(kept.combat.battles_today, 0);
        assert_eq!(kept.daily_reward.streak, 4);
        let lapsed = store.load_player(PlayerId(2)).unwrap().unwrap();
        assert_eq!(lapsed.daily_reward.streak, 0);
    }

    #[test]
    fn expiry_clears_only_lapsed_flags() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(DAY_ONE_NOON));
        seeded(&store, 1, |p| {
            p.premium.premium_active = true;
            p.premium.premium_expires_at = DAY_ONE_NOON - 1;
            p.premium.auto_collector_active = true;
            p.premium.auto_collector_expires_at = DAY_ONE_NOON + DAY;
        });
        let controller = controller(store.clone(), clock);
        let report = premium_expiry(&controller);
        assert_eq!(report.changed, 1);
        let player = store.load_player(PlayerId(1)).unwrap().unwrap();
        assert!(!player.premium.premium_active);
        assert!(player.premium.auto_collector_active);
    }

    #[test]
    fn weekly_fragments_go_to_premium_players_once_per_week() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(DAY_ONE_NOON));
        seeded(&store, 1, |p| {
            p.premium.premium_active = true;
            p.premium.premium_expires_at = DAY_ONE_NOON + 30 * DAY;
        });
        seeded(&store, 2, |_| {});
        let controller = controller(store.clone(), clock.clone());

        assert_eq!(weekly_premium_distribution(&controller).changed, 1);
        assert_eq!(weekly_premium_distribution(&controller).changed, 0);
        clock.advance(7 * DAY);
        assert_eq!(weekly_premium_distribution(&controller).changed, 1);

        assert_eq!(store.load_player(PlayerId(1)).unwrap().unwrap().premium.fragments, 6);
        assert_eq!(store.load_player(PlayerId(2)).unwrap().unwrap().premium.fragments, 0);
    }

    /// Store whose document for one player always fails to save.
    struct FailingFor {
        inner: MemoryStore,
        broken: PlayerId,
        attempts: Mutex<u32>,
    }

    impl PlayerStore for FailingFor {
        fn load_player(&self, id: PlayerId) -> Result<Option<PlayerState>, crate::storage::StoreError> {
            self.inner.load_player(id)
        }

        fn save_player(&self, player: &PlayerState) -> Result<(), crate::storage::StoreError> {
            if player.id == self.broken {
                *self.attempts.lock() += 1;
                return Err(crate::storage::StoreError::Unavailable("disk full".to_string()));
            }
            self.inner.save_player(player)
        }

        fn list_players(&self) -> Result<Vec<PlayerId>, crate::storage::StoreError> {
            self.inner.list_players()
        }
    }

    #[test]
    fn one_failing_player_does_not_stop_the_sweep() {
        let inner = MemoryStore::new();
        for id in 1..=3 {
            seeded(&inner, id, |p| {
                p.premium.premium_active = true;
                p.premium.premium_expires_at = DAY_ONE_NOON - 1;
            });
        }
        let store = Arc::new(FailingFor {
            inner,
            broken: PlayerId(2),
            attempts: Mutex::new(0),
        });
        let mut config = GameConfig::builtin().as_ref().clone();
        config.server.storage_retry_backoff_ms = 0;
        let controller = GameController::new(
            Arc::new(config),
            Collaborators {
                store: store.clone(),
                transport: Arc::new(RecordingTransport::new()),
                ads: Arc::new(NoAds),
                payments: Arc::new(RejectAllPayments),
                clock: Arc::new(ManualClock::new(DAY_ONE_NOON)),
            },
        );

        let report = premium_expiry(&controller);
        assert_eq!(report.failed, 1);
        assert_eq!(report.changed, 2);
        assert_eq!(*store.attempts.lock(), 3);
        let broken = store.inner.load_player(PlayerId(2)).unwrap().unwrap();
        assert!(broken.premium.premium_active);
        assert_eq!(controller.metrics().snapshot().sweep_player_errors, 1);
    }
}
