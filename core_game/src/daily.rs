use game_schema::{PlayerState, MAX_ENERGY};
use rand::Rng;

use crate::calendar::GameCalendar;
use crate::combat::grant_combat_exp;
use crate::config::GameConfig;
use crate::economy::{daily_reward_amounts, DailyRewardAmounts, RewardTier};
use crate::error::{GameError, GameResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyClaim {
    pub tier: RewardTier,
    pub streak: u32,
    pub amounts: DailyRewardAmounts,
    pub weekly_bonus: Option<u64>,
    pub levels_gained: u32,
}

pub fn can_claim(player: &PlayerState, now: i64, calendar: &GameCalendar) -> bool {
    calendar.date_of(now) != calendar.date_of(player.daily_reward.last_claim)
}

/// Claims today's reward, advancing or restarting the streak.
pub fn claim_daily<R: Rng + ?Sized>(
    player: &mut PlayerState,
    now: i64,
    config: &GameConfig,
    rng: &mut R,
) -> GameResult<DailyClaim> {
    let calendar = GameCalendar::new(&config.calendar);
    if !can_claim(player, now, &calendar) {
        return Err(GameError::AlreadyClaimed);
    }

    let consecutive = calendar.days_between(player.daily_reward.last_claim, now) == 1;
    let streak = if consecutive {
        player.daily_reward.streak + 1
    } else {
        1
    };

    let bonus_active = player.premium.daily_bonus_at(now);
    let tier = if player.is_premium(now) || bonus_active {
        RewardTier::Premium
    } else {
        RewardTier::Basic
    };
    let amounts = daily_reward_amounts(&config.daily, tier, streak, rng);

    player.pet.gold = player.pet.gold.saturating_add(amounts.gold);
    player.combat.fire_coral += amounts.coral;
    player.food += amounts.food;
    player.premium.fragments += amounts.fragments;
    player.pet.energy = MAX_ENERGY;
    let levels_gained = grant_combat_exp(&mut player.combat, amounts.exp);

    let mut weekly_bonus = None;
    if bonus_active
        && now - player.daily_reward.last_weekly_bonus >= config.daily.weekly_bonus_interval_secs
    {
        player.premium.fragments += config.daily.weekly_bonus_fragments;
        player.daily_reward.last_weekly_bonus = now;
        weekly_bonus = Some(config.daily.weekly_bonus_fragments);
    }

    player.daily_reward.streak = streak;
    player.daily_reward.last_claim = now;

    Ok(DailyClaim {
        tier,
        streak,
        amounts,
        weekly_bonus,
        levels_gained,
    })
}
