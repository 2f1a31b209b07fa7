//! Persisted data contracts for Tide Pet.
//!
//! Everything a player owns lives in one [`PlayerState`] document. The types
//! here are plain serde values; the rules that move them forward live in
//! `core_game`.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MAX_HUNGER: u32 = 100;
pub const MAX_ENERGY: u32 = 100;
pub const MINIBOSS_STAGES: u8 = 5;

/// Identifier of a player; equal to the chat user id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetState {
    pub hunger: u32,
    pub energy: u32,
    pub level: u32,
    pub gold: u64,
    pub gold_per_minute: f64,
}

impl PetState {
    pub fn add_energy(&mut self, amount: u32) {
        self.energy = self.energy.saturating_add(amount).min(MAX_ENERGY);
    }

    /// Removes `amount` energy, returning `false` without touching the pet
    /// when not enough is available.
    pub fn spend_energy(&mut self, amount: u32) -> bool {
        if self.energy < amount {
            return false;
        }
        self.energy -= amount;
        true
    }

    pub fn add_hunger(&mut self, amount: u32) {
        self.hunger = self.hunger.saturating_add(amount).min(MAX_HUNGER);
    }

    pub fn drain_hunger(&mut self, amount: u32) {
        self.hunger = self.hunger.saturating_sub(amount).min(MAX_HUNGER);
    }
}

impl Default for PetState {
    fn default() -> Self {
        Self {
            hunger: MAX_HUNGER,
            energy: MAX_ENERGY,
            level: 1,
            gold: 0,
            gold_per_minute: 1.0,
        }
    }
}

/// Combat track. Every stat below `level` is a pure function of the level;
/// see [`CombatStats::derive_from_level`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    pub level: u32,
    pub hp: u32,
    pub atk: u32,
    pub mp: u32,
    pub def_phys: f64,
    pub def_mag: f64,
    pub agi: u32,
    pub sta: u32,
    pub battles_today: u32,
    pub last_battle_date: Option<NaiveDate>,
    pub exp: u64,
    pub fire_coral: u64,
}

impl CombatStats {
    pub fn at_level(level: u32) -> Self {
        let mut stats = Self {
            level,
            hp: 0,
            atk: 0,
            mp: 0,
            def_phys: 0.0,
            def_mag: 0.0,
            agi: 0,
            sta: 0,
            battles_today: 0,
            last_battle_date: None,
            exp: 0,
            fire_coral: 0,
        };
        stats.derive_from_level();
        stats
    }

    /// Recomputes hp/atk/mp/def/agi/sta from `level`, overwriting previous values.
    pub fn derive_from_level(&mut self) {
        let level = self.level;
        self.hp = 100 + 10 * level;
        self.atk = 10 + 2 * level;
        self.mp = 50 + 5 * level;
        self.def_phys = 5.0 + 1.5 * level as f64;
        self.def_mag = 5.0 + 1.5 * level as f64;
        self.agi = 10 + level;
        self.sta = 100 + 5 * level;
    }

    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.last_battle_date != Some(today) {
            self.battles_today = 0;
            self.last_battle_date = Some(today);
        }
    }
}

impl Default for CombatStats {
    fn default() -> Self {
        Self::at_level(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyRewardState {
    pub last_claim: i64,
    pub streak: u32,
    pub last_weekly_bonus: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PremiumFeatures {
    pub premium_active: bool,
    pub premium_expires_at: i64,
    pub auto_collector_active: bool,
    pub auto_collector_expires_at: i64,
    pub daily_bonus_active: bool,
    #[serde(default)]
    pub daily_bonus_expires_at: i64,
    pub fragments: u64,
    #[serde(default)]
    pub last_weekly_distribution: i64,
}

impl PremiumFeatures {
    /// Premium counts only while the flag is set and the expiry lies ahead,
    /// so a lapsed subscription stops paying out before the expiry sweep runs.
    pub fn premium_at(&self, now: i64) -> bool {
        self.premium_active && self.premium_expires_at > now
    }

    pub fn auto_collector_at(&self, now: i64) -> bool {
        self.auto_collector_active && self.auto_collector_expires_at > now
    }

    pub fn daily_bonus_at(&self, now: i64) -> bool {
        self.daily_bonus_active && self.daily_bonus_expires_at > now
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBundle {
    pub gold: u64,
    pub coral: u64,
    pub exp: u64,
}

impl RewardBundle {
    pub fn add(&mut self, other: RewardBundle) {
        self.gold = self.gold.saturating_add(other.gold);
        self.coral = self.coral.saturating_add(other.coral);
        self.exp = self.exp.saturating_add(other.exp);
    }

    pub fn halved(self) -> RewardBundle {
        RewardBundle {
            gold: self.gold / 2,
            coral: self.coral / 2,
            exp: self.exp / 2,
        }
    }
}

/// A MiniBoss gauntlet in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinibossRun {
    pub current_enemy_index: u8,
    pub accumulated: RewardBundle,
}

impl MinibossRun {
    pub fn fresh() -> Self {
        Self {
            current_enemy_index: 1,
            accumulated: RewardBundle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinibossStats {
    pub attempts_today: u32,
    pub last_attempt_date: Option<NaiveDate>,
    #[serde(default)]
    pub bonus_attempts: u32,
    pub active_run: Option<MinibossRun>,
    /// Run lost most recently; consumed by a single ad-backed retry.
    #[serde(default)]
    pub retry_snapshot: Option<MinibossRun>,
}

impl MinibossStats {
    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.last_attempt_date != Some(today) {
            self.attempts_today = 0;
            self.bonus_attempts = 0;
            self.last_attempt_date = Some(today);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalStats {
    pub total_spins: u64,
    pub spins_since_legendary: u32,
    pub spins_since_epic: u32,
    pub spins_since_rare: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdStats {
    pub ads_today: u32,
    pub last_ad_date: Option<NaiveDate>,
}

impl AdStats {
    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.last_ad_date != Some(today) {
            self.ads_today = 0;
            self.last_ad_date = Some(today);
        }
    }
}

/// Complete persisted progress of one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub pet: PetState,
    pub food: u64,
    pub last_feed_time: i64,
    pub last_update_time: i64,
    pub inventory: BTreeMap<String, u32>,
    pub combat: CombatStats,
    pub daily_reward: DailyRewardState,
    pub premium: PremiumFeatures,
    pub miniboss: MinibossStats,
    pub portal: PortalStats,
    #[serde(default)]
    pub ads: AdStats,
    pub watershard: u64,
    pub prestige_level: u32,
}

impl PlayerState {
    pub fn new(id: PlayerId, now: i64) -> Self {
        Self {
            id,
            pet: PetState::default(),
            food: 0,
            last_feed_time: now,
            last_update_time: now,
            inventory: BTreeMap::new(),
            combat: CombatStats::default(),
            daily_reward: DailyRewardState::default(),
            premium: PremiumFeatures::default(),
            miniboss: MinibossStats::default(),
            portal: PortalStats::default(),
            ads: AdStats::default(),
            watershard: 0,
            prestige_level: 0,
        }
    }

    pub fn item_level(&self, item_id: &str) -> u32 {
        self.inventory.get(item_id).copied().unwrap_or(0)
    }

    pub fn is_premium(&self, now: i64) -> bool {
        self.premium.premium_at(now)
    }
}

pub fn encode_player(player: &PlayerState) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(player)
}

pub fn decode_player(bytes: &[u8]) -> serde_json::Result<PlayerState> {
    serde_json::from_slice(bytes)
}

/// Stable content hash of a player document, used to detect no-op actions.
pub fn player_fingerprint(player: &PlayerState) -> u64 {
    let encoded = serde_json::to_vec(player).unwrap_or_default();
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    hasher.finish()
}
