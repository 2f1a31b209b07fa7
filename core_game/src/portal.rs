//! Portal of Tides: weighted rarity draws with pity counters.

use game_runtime::SpinMode;
use game_schema::{PlayerState, PortalStats};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{GameConfig, PortalConfig, RarityTierConfig};
use crate::error::{GameError, GameResult};
use crate::shop::{extend_subscription, PremiumFeature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortalReward {
    Gold { amount: u64 },
    Coral { amount: u64 },
    Energy { amount: u32 },
    Food { amount: u64 },
    /// Multiplies gold production by `1 + factor`.
    GoldBoost { factor: f64 },
    /// Gives back quick-combat battles already used today.
    CombatRefund { battles: u32 },
    /// Premium for `days`, only when the player has none.
    Premium { days: u32 },
    Watershard { amount: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalDraw {
    pub rarity: Rarity,
    pub reward: PortalReward,
    /// Set when a pity threshold forced the rarity.
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpinResult {
    pub draws: Vec<PortalDraw>,
    pub fragments_spent: u64,
    pub fragments_left: u64,
}

pub fn spin_cost(config: &PortalConfig, mode: SpinMode) -> u64 {
    match mode {
        SpinMode::Single => config.single_cost,
        SpinMode::Bulk => config.bulk_cost,
    }
}

/// Spends fragments and performs every spin of the batch, applying each
/// reward before the next spin is drawn.
pub fn spin<R: Rng + ?Sized>(
    player: &mut PlayerState,
    mode: SpinMode,
    now: i64,
    config: &GameConfig,
    rng: &mut R,
) -> GameResult<SpinResult> {
    let portal = &config.portal;
    let cost = spin_cost(portal, mode);
    if player.premium.fragments < cost {
        return Err(GameError::InsufficientFragments {
            required: cost,
            available: player.premium.fragments,
        });
    }

    player.premium.fragments -= cost;
    let bulk = matches!(mode, SpinMode::Bulk);
    let mut draws = Vec::with_capacity(mode.spins() as usize);
    for _ in 0..mode.spins() {
        let (rarity, forced) = next_rarity(&mut player.portal, portal, bulk, rng);
        let reward = pick_reward(portal, rarity, rng);
        apply_reward(player, reward, now);
        draws.push(PortalDraw {
            rarity,
            reward,
            forced,
        });
    }

    tracing::debug!(
        target: "tide_pet::portal",
        player = %player.id,
        spins = draws.len(),
        best = ?draws.iter().map(|d| d.rarity).max(),
        "portal.spun"
    );

    Ok(SpinResult {
        draws,
        fragments_spent: cost,
        fragments_left: player.premium.fragments,
    })
}

/// Advances the pity counters by one spin and picks the rarity.
fn next_rarity<R: Rng + ?Sized>(
    stats: &mut PortalStats,
    portal: &PortalConfig,
    bulk: bool,
    rng: &mut R,
) -> (Rarity, bool) {
    stats.total_spins += 1;
    stats.spins_since_legendary += 1;
    stats.spins_since_epic += 1;
    stats.spins_since_rare += 1;

    let forced = [Rarity::Legendary, Rarity::Epic, Rarity::Rare]
        .into_iter()
        .find(|&rarity| pity_reached(stats, portal.tier(rarity), bulk));
    let (rarity, was_forced) = match forced {
        Some(rarity) => (rarity, true),
        None => (draw_rarity(portal, rng), false),
    };
    reset_pity(stats, rarity);
    (rarity, was_forced)
}

fn pity_reached(stats: &PortalStats, tier: Option<&RarityTierConfig>, bulk: bool) -> bool {
    let Some(tier) = tier else {
        return false;
    };
    let Some(threshold) = tier.pity else {
        return false;
    };
    if tier.pity_bulk_only && !bulk {
        return false;
    }
    let counter = match tier.rarity {
        Rarity::Legendary => stats.spins_since_legendary,
        Rarity::Epic => stats.spins_since_epic,
        Rarity::Rare => stats.spins_since_rare,
        Rarity::Common => return false,
    };
    counter >= threshold
}

fn reset_pity(stats: &mut PortalStats, rarity: Rarity) {
    if rarity >= Rarity::Legendary {
        stats.spins_since_legendary = 0;
    }
    if rarity >= Rarity::Epic {
        stats.spins_since_epic = 0;
    }
    if rarity >= Rarity::Rare {
        stats.spins_since_rare = 0;
    }
}

fn draw_rarity<R: Rng + ?Sized>(portal: &PortalConfig, rng: &mut R) -> Rarity {
    match WeightedIndex::new(portal.tiers.iter().map(|tier| tier.weight)) {
        Ok(index) => portal.tiers[index.sample(rng)].rarity,
        Err(_) => Rarity::Common,
    }
}

fn pick_reward<R: Rng + ?Sized>(portal: &PortalConfig, rarity: Rarity, rng: &mut R) -> PortalReward {
    let fallback = PortalReward::Gold { amount: 0 };
    let Some(tier) = portal.tier(rarity) else {
        return fallback;
    };
    match WeightedIndex::new(tier.rewards.iter().map(|entry| entry.weight)) {
        Ok(index) => tier.rewards[index.sample(rng)].reward,
        Err(_) => fallback,
    }
}

pub fn apply_reward(player: &mut PlayerState, reward: PortalReward, now: i64) {
    match reward {
        PortalReward::Gold { amount } => player.pet.gold = player.pet.gold.saturating_add(amount),
        PortalReward::Coral { amount } => player.combat.fire_coral += amount,
        PortalReward::Energy { amount } => player.pet.add_energy(amount),
        PortalReward::Food { amount } => player.food += amount,
        PortalReward::GoldBoost { factor } => player.pet.gold_per_minute *= 1.0 + factor,
        PortalReward::CombatRefund { battles } => {
            player.combat.battles_today = player.combat.battles_today.saturating_sub(battles)
        }
        PortalReward::Premium { days } => {
            if !player.is_premium(now) {
                extend_subscription(player, PremiumFeature::Premium, now, days);
            }
        }
        PortalReward::Watershard { amount } => player.watershard += amount,
    }
}
