use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ahash::AHashMap;
use crossbeam_channel::{bounded, Receiver, Sender};
use game_schema::{PlayerId, PlayerState};
use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;

use crate::calendar::GameCalendar;
use crate::config::GameConfig;
use crate::error::{DailyLimitKind, GameError, GameResult};

/// An ad the player was asked to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdHandle {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum AdError {
    #[error("no ad available: {0}")]
    Unavailable(String),
}

pub trait AdNetwork: Send + Sync {
    fn request_ad(&self, player: PlayerId) -> Result<AdHandle, AdError>;

    /// Blocks until the view is confirmed or `timeout` passes.
    fn confirm_ad_viewed(&self, handle: &AdHandle, timeout: Duration) -> bool;
}

/// Hands out watch links and waits for the `ad_viewed <id>` callback that the
/// ad landing page reports back through the server.
pub struct LinkAdNetwork {
    link_base: String,
    issued: AtomicU64,
    pending: Mutex<AHashMap<String, (Sender<()>, Receiver<()>)>>,
}

impl LinkAdNetwork {
    pub fn new(link_base: impl Into<String>) -> Self {
        Self {
            link_base: link_base.into(),
            issued: AtomicU64::new(0),
            pending: Mutex::new(AHashMap::new()),
        }
    }

    /// Records a completed view. Returns `false` for unknown or expired ads.
    pub fn mark_viewed(&self, ad_id: &str) -> bool {
        let pending = self.pending.lock();
        match pending.get(ad_id) {
            Some((sender, _)) => sender.try_send(()).is_ok(),
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl AdNetwork for LinkAdNetwork {
    fn request_ad(&self, player: PlayerId) -> Result<AdHandle, AdError> {
        let serial = self.issued.fetch_add(1, Ordering::Relaxed);
        let nonce: u32 = rand::thread_rng().gen();
        let id = format!("{serial:x}{nonce:08x}");
        self.pending.lock().insert(id.clone(), bounded(1));
        tracing::debug!(target: "tide_pet::ads", %player, ad = %id, "ad.requested");
        Ok(AdHandle {
            url: format!("{}?ad={}", self.link_base, id),
            id,
        })
    }

    fn confirm_ad_viewed(&self, handle: &AdHandle, timeout: Duration) -> bool {
        let receiver = match self.pending.lock().get(&handle.id) {
            Some((_, receiver)) => receiver.clone(),
            None => return false,
        };
        let viewed = receiver.recv_timeout(timeout).is_ok();
        self.pending.lock().remove(&handle.id);
        viewed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdMilestoneReward {
    pub ads: u32,
    pub bonus_attempts: u32,
    pub gold_multiplier: Option<f64>,
    pub fragments: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdReward {
    pub energy: u32,
    pub battles_refunded: u32,
    pub ads_today: u32,
    pub milestone: Option<AdMilestoneReward>,
}

/// Checks the daily ad cap before an ad is requested.
pub fn ensure_ad_allowance(player: &mut PlayerState, now: i64, config: &GameConfig) -> GameResult<()> {
    let today = GameCalendar::new(&config.calendar).date_of(now);
    player.ads.roll_over(today);
    if player.ads.ads_today >= config.ads.max_daily_ads {
        return Err(GameError::DailyLimit {
            kind: DailyLimitKind::Ads,
            limit: config.ads.max_daily_ads,
        });
    }
    Ok(())
}

/// Pays out one confirmed ad view and any milestone it reaches.
pub fn reward_ad_view(player: &mut PlayerState, now: i64, config: &GameConfig) -> GameResult<AdReward> {
    ensure_ad_allowance(player, now, config)?;
    let rules = &config.ads;
    let today = GameCalendar::new(&config.calendar).date_of(now);
    player.combat.roll_over(today);
    player.miniboss.roll_over(today);

    let before = player.combat.battles_today;
    player.combat.battles_today = before.saturating_sub(rules.combat_refund);
    player.pet.add_energy(rules.energy_reward);
    player.ads.ads_today += 1;

    let milestone = rules
        .milestones
        .iter()
        .find(|m| m.ads == player.ads.ads_today)
        .map(|m| {
            player.miniboss.bonus_attempts += m.bonus_attempts;
            if let Some(multiplier) = m.gold_multiplier {
                player.pet.gold_per_minute *= multiplier;
            }
            player.premium.fragments += m.fragments;
            AdMilestoneReward {
                ads: m.ads,
                bonus_attempts: m.bonus_attempts,
                gold_multiplier: m.gold_multiplier,
                fragments: m.fragments,
            }
        });

    Ok(AdReward {
        energy: rules.energy_reward,
        battles_refunded: before - player.combat.battles_today,
        ads_today: player.ads.ads_today,
        milestone,
    })
}
