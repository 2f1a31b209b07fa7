use game_schema::{CombatStats, PlayerState};
use rand::Rng;

use crate::calendar::GameCalendar;
use crate::config::GameConfig;
use crate::economy::{combat_profile, combat_rewards, exp_needed_for_level, CombatRewards};
use crate::error::{DailyLimitKind, GameError, GameResult, LevelTrack};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuickCombatOutcome {
    pub enemy_level: u32,
    pub victory_chance: f64,
    pub rewards: Option<CombatRewards>,
    pub levels_gained: u32,
    pub battles_left: u32,
}

impl QuickCombatOutcome {
    pub fn won(&self) -> bool {
        self.rewards.is_some()
    }
}

pub fn victory_chance(config: &GameConfig, agility: u32) -> f64 {
    config.combat.base_victory_chance + f64::from(agility) / 1000.0
}

/// Single-roll fight against an enemy close to the player's combat level.
pub fn quick_combat<R: Rng + ?Sized>(
    player: &mut PlayerState,
    now: i64,
    config: &GameConfig,
    rng: &mut R,
) -> GameResult<QuickCombatOutcome> {
    let rules = &config.combat;
    if player.pet.level < rules.pet_level_requirement {
        return Err(GameError::LevelRequirement {
            track: LevelTrack::Pet,
            required: rules.pet_level_requirement,
            current: player.pet.level,
        });
    }

    let today = GameCalendar::new(&config.calendar).date_of(now);
    player.combat.roll_over(today);
    let premium = player.is_premium(now);
    let cap = rules.battle_cap(premium);
    if player.combat.battles_today >= cap {
        return Err(GameError::DailyLimit {
            kind: DailyLimitKind::Battles,
            limit: cap,
        });
    }

    let enemy_level = (player.combat.level + rng.gen_range(0..=2)).saturating_sub(1);
    let chance = victory_chance(config, player.combat.agi);
    let won = rng.gen::<f64>() < chance;

    let mut levels_gained = 0;
    let rewards = if won {
        let rewards = combat_rewards(enemy_level, player.combat.level, premium);
        player.pet.gold_per_minute += rewards.gold_per_minute;
        player.combat.fire_coral += rewards.coral;
        levels_gained = grant_combat_exp(&mut player.combat, rewards.exp);
        Some(rewards)
    } else {
        None
    };
    player.combat.battles_today += 1;

    Ok(QuickCombatOutcome {
        enemy_level,
        victory_chance: chance,
        rewards,
        levels_gained,
        battles_left: cap.saturating_sub(player.combat.battles_today),
    })
}

/// Adds exp and runs the leveling loop. Returns the number of levels gained.
pub fn grant_combat_exp(stats: &mut CombatStats, exp: u64) -> u32 {
    stats.exp = stats.exp.saturating_add(exp);
    let mut gained = 0;
    loop {
        let needed = exp_needed_for_level(stats.level);
        if stats.exp < needed {
            break;
        }
        stats.exp -= needed;
        stats.level += 1;
        gained += 1;
    }
    if gained > 0 {
        let derived = combat_profile(stats.level);
        stats.hp = derived.hp;
        stats.atk = derived.atk;
        stats.mp = derived.mp;
        stats.def_phys = derived.def_phys;
        stats.def_mag = derived.def_mag;
        stats.agi = derived.agi;
        stats.sta = derived.sta;
    }
    gained
}
