//! Five-stage MiniBoss gauntlet.
//!
//! A run starts at stage 1 and fights it immediately. After each cleared
//! stage the player either advances to the next one or retreats with half of
//! the accumulated rewards. Losing forfeits everything but leaves a snapshot
//! that one ad-backed retry can resume.

use game_schema::{MinibossRun, PlayerState, RewardBundle, MINIBOSS_STAGES};
use rand::Rng;

use crate::calendar::GameCalendar;
use crate::combat::grant_combat_exp;
use crate::config::GameConfig;
use crate::economy::{miniboss_rewards, miniboss_win_probability};
use crate::error::{DailyLimitKind, GameError, GameResult, LevelTrack};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MinibossOutcome {
    /// Stage won below the boss; waiting for advance or retreat.
    StageCleared {
        reward: RewardBundle,
        accumulated: RewardBundle,
        next_win_chance: f64,
    },
    Completed {
        reward: RewardBundle,
        total: RewardBundle,
        levels_gained: u32,
    },
    Defeated {
        forfeited: RewardBundle,
    },
    Retreated {
        paid: RewardBundle,
        forfeited: RewardBundle,
        levels_gained: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinibossReport {
    pub stage: u8,
    pub win_chance: f64,
    pub outcome: MinibossOutcome,
}

pub fn start_miniboss<R: Rng + ?Sized>(
    player: &mut PlayerState,
    now: i64,
    config: &GameConfig,
    rng: &mut R,
) -> GameResult<MinibossReport> {
    let rules = &config.miniboss;
    if player.combat.level < rules.combat_level_requirement {
        return Err(GameError::LevelRequirement {
            track: LevelTrack::Combat,
            required: rules.combat_level_requirement,
            current: player.combat.level,
        });
    }
    if player.miniboss.active_run.is_some() {
        return Err(GameError::RunInProgress);
    }

    let today = GameCalendar::new(&config.calendar).date_of(now);
    player.miniboss.roll_over(today);
    let cap = rules.attempt_cap(player.is_premium(now), player.miniboss.bonus_attempts);
    if player.miniboss.attempts_today >= cap {
        return Err(GameError::DailyLimit {
            kind: DailyLimitKind::MinibossAttempts,
            limit: cap,
        });
    }
    if player.pet.gold < rules.entry_fee_gold {
        return Err(GameError::InsufficientGold {
            required: rules.entry_fee_gold,
            available: player.pet.gold,
        });
    }

    player.pet.gold -= rules.entry_fee_gold;
    player.miniboss.attempts_today += 1;
    player.miniboss.retry_snapshot = None;
    Ok(fight_stage(player, MinibossRun::fresh(), now, config, rng))
}

pub fn advance_miniboss<R: Rng + ?Sized>(
    player: &mut PlayerState,
    now: i64,
    config: &GameConfig,
    rng: &mut R,
) -> GameResult<MinibossReport> {
    let mut run = player.miniboss.active_run.ok_or(GameError::NoActiveRun)?;
    run.current_enemy_index = (run.current_enemy_index + 1).min(MINIBOSS_STAGES);
    Ok(fight_stage(player, run, now, config, rng))
}

/// Ends the run paying out half of everything accumulated so far.
pub fn retreat_miniboss(player: &mut PlayerState) -> GameResult<MinibossOutcome> {
    let run = player.miniboss.active_run.take().ok_or(GameError::NoActiveRun)?;
    let paid = run.accumulated.halved();
    let forfeited = RewardBundle {
        gold: run.accumulated.gold - paid.gold,
        coral: run.accumulated.coral - paid.coral,
        exp: run.accumulated.exp - paid.exp,
    };
    let levels_gained = pay_out(player, paid);
    Ok(MinibossOutcome::Retreated {
        paid,
        forfeited,
        levels_gained,
    })
}

/// The lost run a retry would resume, if any.
pub fn retry_candidate(player: &PlayerState) -> GameResult<MinibossRun> {
    if player.miniboss.active_run.is_some() {
        return Err(GameError::RunInProgress);
    }
    player.miniboss.retry_snapshot.ok_or(GameError::NothingToRetry)
}

/// Resumes the last lost run at the stage it was lost, consuming the
/// snapshot. Does not use a daily attempt. Callers confirm the ad view first.
pub fn retry_miniboss<R: Rng + ?Sized>(
    player: &mut PlayerState,
    now: i64,
    config: &GameConfig,
    rng: &mut R,
) -> GameResult<MinibossReport> {
    let run = retry_candidate(player)?;
    player.miniboss.retry_snapshot = None;
    tracing::info!(
        target: "tide_pet::miniboss",
        player = %player.id,
        stage = run.current_enemy_index,
        "miniboss.retry_resumed"
    );
    Ok(fight_stage(player, run, now, config, rng))
}

fn fight_stage<R: Rng + ?Sized>(
    player: &mut PlayerState,
    mut run: MinibossRun,
    now: i64,
    config: &GameConfig,
    rng: &mut R,
) -> MinibossReport {
    let rules = &config.miniboss;
    let stage = run.current_enemy_index;
    let win_chance = miniboss_win_probability(rules, stage, player.combat.level);

    if rng.gen::<f64>() >= win_chance {
        player.miniboss.active_run = None;
        player.miniboss.retry_snapshot = Some(run);
        return MinibossReport {
            stage,
            win_chance,
            outcome: MinibossOutcome::Defeated {
                forfeited: run.accumulated,
            },
        };
    }

    let reward = miniboss_rewards(rules, stage, player.is_premium(now), rng);
    run.accumulated.add(reward);
    let outcome = if stage >= MINIBOSS_STAGES {
        player.miniboss.active_run = None;
        let levels_gained = pay_out(player, run.accumulated);
        MinibossOutcome::Completed {
            reward,
            total: run.accumulated,
            levels_gained,
        }
    } else {
        player.miniboss.active_run = Some(run);
        MinibossOutcome::StageCleared {
            reward,
            accumulated: run.accumulated,
            next_win_chance: miniboss_win_probability(rules, stage + 1, player.combat.level),
        }
    };
    MinibossReport {
        stage,
        win_chance,
        outcome,
    }
}

fn pay_out(player: &mut PlayerState, rewards: RewardBundle) -> u32 {
    player.pet.gold = player.pet.gold.saturating_add(rewards.gold);
    player.combat.fire_coral = player.combat.fire_coral.saturating_add(rewards.coral);
    grant_combat_exp(&mut player.combat, rewards.exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_schema::PlayerId;
    use rand::rngs::mock::StepRng;

    const T0: i64 = 1_700_000_000;

    fn challenger(gold: u64) -> PlayerState {
        let mut player = PlayerState::new(PlayerId(77), T0);
        player.pet.gold = gold;
        player
    }

    fn config_losing_at(stage: usize) -> GameConfig {
        let mut config = (*GameConfig::builtin()).clone();
        config.miniboss.stages[stage - 1].win_base = 0.0;
        config.miniboss.stages[stage - 1].win_ceiling = 0.0;
        config
    }

    #[test]
    fn clearing_all_stages_pays_the_sum_of_stage_rewards() {
        let config = GameConfig::builtin();
        let mut player = challenger(1);
        let mut rng = StepRng::new(0, 0);

        let report = start_miniboss(&mut player, T0, &config, &mut rng).unwrap();
        assert_eq!(report.stage, 1);
        for _ in 2..=4 {
            let report = advance_miniboss(&mut player, T0, &config, &mut rng).unwrap();
            assert!(matches!(report.outcome, MinibossOutcome::StageCleared { .. }));
        }
        let report = advance_miniboss(&mut player, T0, &config, &mut rng).unwrap();

        let mut expected = RewardBundle::default();
        for index in 1..=5 {
            expected.add(miniboss_rewards(&config.miniboss, index, false, &mut StepRng::new(0, 0)));
        }
        let MinibossOutcome::Completed { total, .. } = report.outcome else {
            panic!("expected completion, got {:?}", report.outcome);
        };
        assert_eq!(total, expected);
        assert_eq!(total, RewardBundle { gold: 17_500, coral: 74, exp: 2_817 });
        assert_eq!(player.pet.gold, 17_500);
        assert_eq!(player.combat.fire_coral, 74);
        assert_eq!(player.combat.level, 6);
        assert!(player.miniboss.active_run.is_none());
    }

    #[test]
    fn retreat_pays_half_and_ends_the_run() {
        let config = GameConfig::builtin();
        let mut player = challenger(100);
        let mut rng = StepRng::new(0, 0);
        start_miniboss(&mut player, T0, &config, &mut rng).unwrap();
        advance_miniboss(&mut player, T0, &config, &mut rng).unwrap();

        let outcome = retreat_miniboss(&mut player).unwrap();
        assert_eq!(
            outcome,
            MinibossOutcome::Retreated {
                paid: RewardBundle { gold: 250, coral: 2, exp: 71 },
                forfeited: RewardBundle { gold: 250, coral: 2, exp: 72 },
                levels_gained: 0,
            }
        );
        assert_eq!(player.pet.gold, 349);
        assert!(matches!(retreat_miniboss(&mut player), Err(GameError::NoActiveRun)));
    }

    #[test]
    fn defeat_leaves_a_single_attempt_neutral_retry() {
        let losing = config_losing_at(2);
        let config = GameConfig::builtin();
        let mut player = challenger(10);
        let mut rng = StepRng::new(0, 0);
        start_miniboss(&mut player, T0, &losing, &mut rng).unwrap();
        let report = advance_miniboss(&mut player, T0, &losing, &mut rng).unwrap();
        let first_stage = RewardBundle { gold: 0, coral: 1, exp: 22 };
        assert_eq!(report.outcome, MinibossOutcome::Defeated { forfeited: first_stage });
        assert!(player.miniboss.active_run.is_none());
        assert_eq!(player.pet.gold, 9);
        assert_eq!(player.combat.exp, 0);

        let snapshot = retry_candidate(&player).unwrap();
        assert_eq!(snapshot.current_enemy_index, 2);

        let report = retry_miniboss(&mut player, T0, &config, &mut rng).unwrap();
        assert_eq!(report.stage, 2);
        let MinibossOutcome::StageCleared { accumulated, .. } = report.outcome else {
            panic!("expected stage clear, got {:?}", report.outcome);
        };
        assert_eq!(accumulated, RewardBundle { gold: 500, coral: 4, exp: 143 });
        assert_eq!(player.miniboss.attempts_today, 1);
        assert!(player.miniboss.retry_snapshot.is_none());
        assert!(matches!(
            retry_miniboss(&mut player, T0, &config, &mut rng),
            Err(GameError::RunInProgress)
        ));
        retreat_miniboss(&mut player).unwrap();
        assert!(matches!(retry_candidate(&player), Err(GameError::NothingToRetry)));
    }

    #[test]
    fn entry_is_gated_by_attempts_gold_and_open_runs() {
        let losing = config_losing_at(1);
        let mut player = challenger(3);
        let mut rng = StepRng::new(0, 0);
        for _ in 0..3 {
            start_miniboss(&mut player, T0, &losing, &mut rng).unwrap();
        }
        assert_eq!(player.pet.gold, 0);
        assert!(matches!(
            start_miniboss(&mut player, T0, &losing, &mut rng),
            Err(GameError::DailyLimit { kind: DailyLimitKind::MinibossAttempts, limit: 3 })
        ));

        // Ad milestones add attempts for the day.
        player.miniboss.bonus_attempts = 1;
        assert!(matches!(
            start_miniboss(&mut player, T0, &losing, &mut rng),
            Err(GameError::InsufficientGold { required: 1, available: 0 })
        ));
        assert_eq!(player.miniboss.attempts_today, 3);

        // A new day restores the attempts and clears the bonus.
        player.pet.gold = 1;
        start_miniboss(&mut player, T0 + 86_400, &losing, &mut rng).unwrap();
        assert_eq!(player.miniboss.attempts_today, 1);
        assert_eq!(player.miniboss.bonus_attempts, 0);

        let config = GameConfig::builtin();
        player.pet.gold = 5;
        start_miniboss(&mut player, T0 + 86_400, &config, &mut rng).unwrap();
        assert!(matches!(
            start_miniboss(&mut player, T0 + 86_400, &config, &mut rng),
            Err(GameError::RunInProgress)
        ));
    }

    #[test]
    fn premium_allows_more_attempts_and_richer_rewards() {
        let config = GameConfig::builtin();
        let mut player = challenger(100);
        player.premium.premium_active = true;
        player.premium.premium_expires_at = T0 + 86_400;
        player.miniboss.roll_over(GameCalendar::new(&config.calendar).date_of(T0));
        player.miniboss.attempts_today = 9;
        let report = start_miniboss(&mut player, T0, &config, &mut StepRng::new(0, 0)).unwrap();
        let MinibossOutcome::StageCleared { reward, .. } = report.outcome else {
            panic!("expected stage clear");
        };
        assert_eq!(reward, RewardBundle { gold: 0, coral: 1, exp: 33 });
    }
}
