use game_schema::PlayerState;

use crate::config::GameConfig;
use crate::economy::gold_production;
use crate::error::{GameError, GameResult, LevelTrack};

/// What a reconcile pass produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub minutes: i64,
    pub gold_gained: u64,
    pub food_collected: u64,
}

/// Folds the real time elapsed since the last update into passive income,
/// hunger, energy and auto-collected food.
///
/// Calling it again with the same `now` changes nothing.
pub fn reconcile(player: &mut PlayerState, now: i64, config: &GameConfig) -> Reconciled {
    let minutes = (now - player.last_update_time).div_euclid(60);
    if minutes <= 0 {
        return Reconciled::default();
    }
    let rules = &config.progression;
    let premium = player.is_premium(now);
    let multiplier = if premium {
        rules.premium_gold_multiplier
    } else {
        1.0
    };

    let gold_gained = (player.pet.gold_per_minute * minutes as f64 * multiplier).floor() as u64;
    player.pet.gold = player.pet.gold.saturating_add(gold_gained);

    let minutes_u32 = u32::try_from(minutes).unwrap_or(u32::MAX);
    player
        .pet
        .drain_hunger(minutes_u32.saturating_mul(rules.hunger_loss_per_minute));
    player
        .pet
        .add_energy(minutes_u32.saturating_mul(rules.energy_gain_per_minute));

    let mut food_collected = 0;
    if player.premium.auto_collector_at(now) && rules.auto_collector_minutes_per_food > 0 {
        let units = minutes / rules.auto_collector_minutes_per_food;
        let units = u32::try_from(units).unwrap_or(u32::MAX).min(player.pet.energy);
        if units > 0 && player.pet.spend_energy(units) {
            food_collected = u64::from(units);
            player.food += food_collected;
        }
    }

    player.last_update_time = now;
    Reconciled {
        minutes,
        gold_gained,
        food_collected,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoodCollected {
    pub food: u64,
    pub energy_spent: u32,
}

pub fn collect_food(player: &mut PlayerState, config: &GameConfig) -> GameResult<FoodCollected> {
    let rules = &config.progression;
    let cost = rules.collect_food_energy_cost;
    if !player.pet.spend_energy(cost) {
        return Err(GameError::InsufficientEnergy {
            required: cost,
            available: player.pet.energy,
        });
    }
    player.food += rules.collect_food_amount;
    Ok(FoodCollected {
        food: rules.collect_food_amount,
        energy_spent: cost,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fed {
    pub level: u32,
    pub food_spent: u64,
    pub gold_per_minute: f64,
}

/// Feeding costs `level * feed_cost_per_level` food and levels the pet up,
/// resetting its production to the pet-level curve.
pub fn feed_pet(player: &mut PlayerState, now: i64, config: &GameConfig) -> GameResult<Fed> {
    let rules = &config.progression;
    if player.pet.level >= rules.pet_max_level {
        return Err(GameError::PetAtMaxLevel(rules.pet_max_level));
    }
    let cost = u64::from(player.pet.level) * rules.feed_cost_per_level;
    if player.food < cost {
        return Err(GameError::InsufficientFood {
            required: cost,
            available: player.food,
        });
    }

    player.food -= cost;
    player.pet.add_hunger(rules.feed_hunger_restore);
    player.pet.level += 1;
    player.pet.gold_per_minute =
        gold_production(player.pet.level, player.prestige_level, player.is_premium(now)) as f64;
    player.last_feed_time = now;

    Ok(Fed {
        level: player.pet.level,
        food_spent: cost,
        gold_per_minute: player.pet.gold_per_minute,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prestiged {
    pub prestige_level: u32,
    pub gold_kept: u64,
    pub gold_per_minute: f64,
}

/// Trades a max-level pet for a permanent doubling of future production.
pub fn prestige(player: &mut PlayerState, now: i64, config: &GameConfig) -> GameResult<Prestiged> {
    let rules = &config.progression;
    if player.pet.level < rules.pet_max_level {
        return Err(GameError::LevelRequirement {
            track: LevelTrack::Pet,
            required: rules.pet_max_level,
            current: player.pet.level,
        });
    }

    let gold_kept = player.pet.gold.saturating_mul(rules.prestige_gold_kept_percent) / 100;
    player.prestige_level += 1;
    player.pet.gold = gold_kept;
    player.pet.level = 1;
    player.pet.gold_per_minute =
        gold_production(1, player.prestige_level, player.is_premium(now)) as f64;

    tracing::info!(
        target: "tide_pet::progression",
        player = %player.id,
        prestige_level = player.prestige_level,
        gold_kept,
        "prestige.applied"
    );

    Ok(Prestiged {
        prestige_level: player.prestige_level,
        gold_kept,
        gold_per_minute: player.pet.gold_per_minute,
    })
}
