//! Pure economy formulas.
//!
//! Nothing here touches a [`PlayerState`](game_schema::PlayerState); callers
//! pass levels and flags in and apply the results themselves. Randomised
//! formulas take the RNG explicitly so engines and tests control every draw.

use game_schema::{CombatStats, RewardBundle};
use rand::Rng;

use crate::config::{DailyConfig, DailyTierConfig, MinibossConfig, StreakStep};
use crate::shop::ShopItem;

pub const PET_GROWTH_BASE: f64 = 2.0;
pub const PRESTIGE_GROWTH_BASE: f64 = 2.0;
pub const PREMIUM_MULTIPLIER: f64 = 1.5;
pub const MAX_COMBAT_LEVEL: u32 = 100;

/// Gold per minute produced by a pet at `level`.
pub fn gold_production(level: u32, prestige_level: u32, is_premium: bool) -> u64 {
    let base = PET_GROWTH_BASE.powi(level.saturating_sub(1) as i32);
    let prestige = PRESTIGE_GROWTH_BASE.powi(prestige_level as i32);
    let premium = if is_premium { PREMIUM_MULTIPLIER } else { 1.0 };
    // `as` saturates for values beyond u64.
    (base * prestige * premium).floor() as u64
}

pub fn exp_needed_for_level(level: u32) -> u64 {
    (100.0 * 1.5_f64.powi(level as i32)).floor() as u64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatRewards {
    pub exp: u64,
    pub gold_per_minute: f64,
    pub coral: u64,
}

pub fn combat_rewards(enemy_level: u32, combat_level: u32, is_premium: bool) -> CombatRewards {
    let scale = 1.0 + 0.05 * combat_level as f64;
    let premium = if is_premium { PREMIUM_MULTIPLIER } else { 1.0 };
    let enemy = enemy_level as f64;
    CombatRewards {
        exp: ((10.0 + 5.0 * enemy) * scale * premium).floor() as u64,
        gold_per_minute: round_to((1.0 + 0.5 * enemy) * scale * premium, 2),
        coral: ((1.0 + f64::from(enemy_level / 5)) * scale * premium).floor() as u64,
    }
}

pub fn miniboss_win_probability(config: &MinibossConfig, enemy_index: u8, combat_level: u32) -> f64 {
    let Some(stage) = config.stage(enemy_index) else {
        return 0.0;
    };
    let level = combat_level.clamp(1, MAX_COMBAT_LEVEL);
    let step = (stage.win_ceiling - stage.win_base) / f64::from(MAX_COMBAT_LEVEL - 1);
    round_to(stage.win_base + step * f64::from(level - 1), 3)
}

pub fn miniboss_rewards<R: Rng + ?Sized>(
    config: &MinibossConfig,
    enemy_index: u8,
    is_premium: bool,
    rng: &mut R,
) -> RewardBundle {
    let Some(stage) = config.stage(enemy_index) else {
        return RewardBundle::default();
    };
    let gold = uniform(stage.gold, rng);
    let coral = uniform(stage.coral, rng);
    let exp = (stage.base_exp as f64 * config.exp_growth.powi(i32::from(enemy_index))).floor();
    if is_premium {
        let premium = config.premium_reward_multiplier;
        RewardBundle {
            gold: (gold as f64 * premium).floor() as u64,
            coral: (coral as f64 * premium).floor() as u64,
            exp: (exp * premium).floor() as u64,
        }
    } else {
        RewardBundle {
            gold,
            coral,
            exp: exp as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardTier {
    Basic,
    Premium,
}

/// Multiplier of the highest streak threshold reached, 1.0 below all of them.
pub fn streak_multiplier(steps: &[StreakStep], streak: u32) -> f64 {
    steps
        .iter()
        .filter(|step| streak >= step.days)
        .max_by_key(|step| step.days)
        .map(|step| step.multiplier)
        .unwrap_or(1.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyRewardAmounts {
    pub gold: u64,
    pub coral: u64,
    pub food: u64,
    pub exp: u64,
    pub fragments: u64,
}

pub fn daily_reward_amounts<R: Rng + ?Sized>(
    config: &DailyConfig,
    tier: RewardTier,
    streak: u32,
    rng: &mut R,
) -> DailyRewardAmounts {
    let (ranges, steps): (&DailyTierConfig, &[StreakStep]) = match tier {
        RewardTier::Basic => (&config.basic, &config.basic_streak),
        RewardTier::Premium => (&config.premium, &config.premium_streak),
    };
    let multiplier = streak_multiplier(steps, streak);
    let mut draw = |range: (u64, u64)| (uniform(range, rng) as f64 * multiplier).floor() as u64;
    DailyRewardAmounts {
        gold: draw(ranges.gold),
        coral: draw(ranges.coral),
        food: draw(ranges.food),
        exp: draw(ranges.exp),
        fragments: draw(ranges.fragments),
    }
}

/// Combat stats for a fresh character at `level`.
pub fn combat_profile(level: u32) -> CombatStats {
    CombatStats::at_level(level)
}

pub fn shop_cost_at_level(item: &ShopItem, growth_factor: f64, level: u32) -> u64 {
    scale_by_level(item.base_cost as f64, growth_factor, level)
}

pub fn shop_production_at_level(item: &ShopItem, growth_factor: f64, level: u32) -> u64 {
    scale_by_level(item.base_production as f64, growth_factor, level)
}

fn scale_by_level(base: f64, growth_factor: f64, level: u32) -> u64 {
    let exponent = level.max(1) - 1;
    (base * growth_factor.powi(exponent as i32)).floor() as u64
}

fn uniform<R: Rng + ?Sized>((low, high): (u64, u64), rng: &mut R) -> u64 {
    if low >= high {
        return low;
    }
    rng.gen_range(low..=high)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
