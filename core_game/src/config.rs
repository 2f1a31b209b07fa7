use std::{
    env, fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::portal::{PortalReward, Rarity};
use crate::shop::{PremiumItem, ShopItem};

pub const BUILTIN_GAME_CONFIG: &str = include_str!("data/game_config.json");

bitflags! {
    /// Player-facing features that can be switched off without a rebuild.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FeatureFlags: u32 {
        const COMBAT = 1 << 0;
        const MINIBOSS = 1 << 1;
        const SHOP = 1 << 2;
        const PORTAL = 1 << 3;
        const PREMIUM_SHOP = 1 << 4;
        const PRESTIGE = 1 << 5;
        const ADS = 1 << 6;
        const AUTOSAVE = 1 << 7;
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        FeatureFlags::all()
    }
}

/// Every tunable of the game economy plus the server wiring.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub miniboss: MinibossConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub daily: DailyConfig,
    #[serde(default)]
    pub shop: ShopConfig,
    #[serde(default)]
    pub ads: AdConfig,
    #[serde(default)]
    pub sweeps: SweepConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl GameConfig {
    /// The embedded config, parsed once per process.
    pub fn builtin() -> Arc<Self> {
        static BUILTIN: OnceLock<Arc<GameConfig>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| {
            Arc::new(
                GameConfig::from_json_str(BUILTIN_GAME_CONFIG)
                    .expect("builtin game config should parse"),
            )
        }))
    }

    pub fn from_json_str(json: &str) -> Result<Self, GameConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, GameConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| GameConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        GameConfig::from_json_str(&contents)
    }

    pub fn feature_enabled(&self, feature: FeatureFlags) -> bool {
        self.features.contains(feature)
    }

    fn validate(&self) -> Result<(), GameConfigError> {
        if self.miniboss.stages.len() != usize::from(game_schema::MINIBOSS_STAGES) {
            return Err(GameConfigError::Invalid(format!(
                "miniboss needs {} stages, found {}",
                game_schema::MINIBOSS_STAGES,
                self.miniboss.stages.len()
            )));
        }
        for tier in &self.portal.tiers {
            if tier.rewards.is_empty() || tier.rewards.iter().all(|r| r.weight == 0) {
                return Err(GameConfigError::Invalid(format!(
                    "portal tier {:?} has no weighted rewards",
                    tier.rarity
                )));
            }
        }
        if self.portal.tiers.iter().all(|tier| tier.weight == 0) {
            return Err(GameConfigError::Invalid(
                "portal tiers have no weight".to_string(),
            ));
        }
        if self.calendar.reference_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(GameConfigError::Invalid(format!(
                "reference offset {} minutes is out of range",
                self.calendar.reference_utc_offset_minutes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum GameConfigError {
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read game config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid game config: {0}")]
    Invalid(String),
}

pub fn load_game_config_from_env() -> Arc<GameConfig> {
    let override_path = env::var("GAME_CONFIG_PATH").ok().map(PathBuf::from);
    let default_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/game_config.json");

    let candidates: Vec<PathBuf> = match override_path {
        Some(ref path) => vec![path.clone()],
        None => vec![default_path.clone()],
    };

    for path in candidates {
        match GameConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "tide_pet::config",
                    path = %path.display(),
                    "game_config.loaded=file"
                );
                return Arc::new(config);
            }
            Err(err) => {
                tracing::warn!(
                    target: "tide_pet::config",
                    path = %path.display(),
                    error = %err,
                    "game_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "tide_pet::config", "game_config.loaded=builtin");
    GameConfig::builtin()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Offset of the reference timezone used for day boundaries.
    pub reference_utc_offset_minutes: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            reference_utc_offset_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub hunger_loss_per_minute: u32,
    pub energy_gain_per_minute: u32,
    pub premium_gold_multiplier: f64,
    pub auto_collector_minutes_per_food: i64,
    pub collect_food_amount: u64,
    pub collect_food_energy_cost: u32,
    pub feed_cost_per_level: u64,
    pub feed_hunger_restore: u32,
    pub pet_max_level: u32,
    pub prestige_gold_kept_percent: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            hunger_loss_per_minute: 1,
            energy_gain_per_minute: 2,
            premium_gold_multiplier: 1.5,
            auto_collector_minutes_per_food: 60,
            collect_food_amount: 10,
            collect_food_energy_cost: 10,
            feed_cost_per_level: 5,
            feed_hunger_restore: 10,
            pet_max_level: 100,
            prestige_gold_kept_percent: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub pet_level_requirement: u32,
    pub max_battles_per_day: u32,
    pub premium_extra_battles: u32,
    pub base_victory_chance: f64,
}

impl CombatConfig {
    pub fn battle_cap(&self, premium: bool) -> u32 {
        if premium {
            self.max_battles_per_day + self.premium_extra_battles
        } else {
            self.max_battles_per_day
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            pet_level_requirement: 1,
            max_battles_per_day: 20,
            premium_extra_battles: 10,
            base_victory_chance: 0.75,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinibossStageConfig {
    pub gold: (u64, u64),
    pub coral: (u64, u64),
    pub base_exp: u64,
    pub win_base: f64,
    pub win_ceiling: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinibossConfig {
    pub combat_level_requirement: u32,
    pub attempts_per_day: u32,
    pub premium_attempts_per_day: u32,
    pub entry_fee_gold: u64,
    pub exp_growth: f64,
    pub premium_reward_multiplier: f64,
    pub stages: Vec<MinibossStageConfig>,
}

impl MinibossConfig {
    /// Stage `index` is 1-based.
    pub fn stage(&self, index: u8) -> Option<&MinibossStageConfig> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|slot| self.stages.get(slot))
    }

    pub fn attempt_cap(&self, premium: bool, bonus_attempts: u32) -> u32 {
        let base = if premium {
            self.premium_attempts_per_day
        } else {
            self.attempts_per_day
        };
        base + bonus_attempts
    }
}

impl Default for MinibossConfig {
    fn default() -> Self {
        GameConfig::builtin().miniboss.clone()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalRewardEntry {
    pub reward: PortalReward,
    pub weight: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RarityTierConfig {
    pub rarity: Rarity,
    pub weight: u32,
    pub pity: Option<u32>,
    /// Pity only forces this tier during bulk spins.
    pub pity_bulk_only: bool,
    pub rewards: Vec<PortalRewardEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub single_cost: u64,
    pub bulk_cost: u64,
    pub tiers: Vec<RarityTierConfig>,
}

impl PortalConfig {
    pub fn tier(&self, rarity: Rarity) -> Option<&RarityTierConfig> {
        self.tiers.iter().find(|tier| tier.rarity == rarity)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        GameConfig::builtin().portal.clone()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyTierConfig {
    pub gold: (u64, u64),
    pub coral: (u64, u64),
    pub food: (u64, u64),
    pub exp: (u64, u64),
    pub fragments: (u64, u64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreakStep {
    pub days: u32,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyConfig {
    pub basic: DailyTierConfig,
    pub premium: DailyTierConfig,
    pub basic_streak: Vec<StreakStep>,
    pub premium_streak: Vec<StreakStep>,
    pub weekly_bonus_fragments: u64,
    pub weekly_bonus_interval_secs: i64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        GameConfig::builtin().daily.clone()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
    pub growth_factor: f64,
    pub fragment_gold_price: u64,
    pub items: Vec<ShopItem>,
    pub premium_items: Vec<PremiumItem>,
}

impl ShopConfig {
    pub fn item(&self, id: &str) -> Option<&ShopItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn premium_item(&self, id: &str) -> Option<&PremiumItem> {
        self.premium_items.iter().find(|item| item.id == id)
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        GameConfig::builtin().shop.clone()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdMilestone {
    pub ads: u32,
    pub bonus_attempts: u32,
    pub gold_multiplier: Option<f64>,
    pub fragments: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdConfig {
    pub energy_reward: u32,
    pub combat_refund: u32,
    pub max_daily_ads: u32,
    pub confirm_timeout_secs: u64,
    pub link_base: String,
    pub milestones: Vec<AdMilestone>,
}

impl Default for AdConfig {
    fn default() -> Self {
        Self {
            energy_reward: 25,
            combat_refund: 1,
            max_daily_ads: 10,
            confirm_timeout_secs: 120,
            link_base: "https://ads.tidepet.local/watch".to_string(),
            milestones: vec![
                AdMilestone {
                    ads: 3,
                    bonus_attempts: 1,
                    gold_multiplier: None,
                    fragments: 0,
                },
                AdMilestone {
                    ads: 5,
                    bonus_attempts: 2,
                    gold_multiplier: Some(1.01),
                    fragments: 0,
                },
                AdMilestone {
                    ads: 10,
                    bonus_attempts: 3,
                    gold_multiplier: None,
                    fragments: 1,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub autosave_interval_secs: u64,
    pub premium_expiry_interval_secs: u64,
    pub weekly_check_interval_secs: u64,
    pub weekly_distribution_fragments: u64,
    pub weekly_distribution_interval_secs: i64,
    pub max_backups: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 300,
            premium_expiry_interval_secs: 3_600,
            weekly_check_interval_secs: 3_600,
            weekly_distribution_fragments: 3,
            weekly_distribution_interval_secs: 604_800,
            max_backups: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub command_bind: SocketAddr,
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub storage_retry_attempts: u32,
    pub storage_retry_backoff_ms: u64,
    /// Fixed seed for reproducible sessions; entropy when absent.
    pub rng_seed: Option<u64>,
    pub payment_ledger_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command_bind: SocketAddr::from(([127, 0, 0, 1], 41100)),
            data_dir: PathBuf::from("data/players"),
            backup_dir: PathBuf::from("data/backups"),
            storage_retry_attempts: 3,
            storage_retry_backoff_ms: 50,
            rng_seed: None,
            payment_ledger_path: None,
        }
    }
}
