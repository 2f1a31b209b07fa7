use game_schema::PlayerState;
use serde::{Deserialize, Serialize};

use crate::calendar::SECONDS_PER_DAY;
use crate::config::{GameConfig, ShopConfig};
use crate::economy::{shop_cost_at_level, shop_production_at_level};
use crate::error::{GameError, GameResult};
use crate::payment::PaymentVerifier;

/// Repeatable gold upgrade sold in the regular shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: String,
    pub name: String,
    pub base_cost: u64,
    pub base_production: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumFeature {
    Premium,
    AutoCollector,
    DailyBonus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PremiumItemKind {
    Subscription { feature: PremiumFeature, days: u32 },
    Consumable { fragments: u64 },
}

/// Item sold for an externally verified payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremiumItem {
    pub id: String,
    pub name: String,
    /// Price in nano-units of the payment currency.
    pub price_nano: u64,
    pub item: PremiumItemKind,
}

impl PremiumItem {
    pub fn price_label(&self) -> String {
        format!("{:.2} TON", self.price_nano as f64 / 1e9)
    }
}

/// Next purchasable level of an item with its price and yield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopOffer {
    pub item_id: String,
    pub name: String,
    pub owned_level: u32,
    pub next_cost: u64,
    pub next_production: u64,
}

pub fn shop_offers(player: &PlayerState, shop: &ShopConfig) -> Vec<ShopOffer> {
    shop.items
        .iter()
        .map(|item| {
            let owned_level = player.item_level(&item.id);
            let next = owned_level + 1;
            ShopOffer {
                item_id: item.id.clone(),
                name: item.name.clone(),
                owned_level,
                next_cost: shop_cost_at_level(item, shop.growth_factor, next),
                next_production: shop_production_at_level(item, shop.growth_factor, next),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub item_id: String,
    pub level: u32,
    pub cost: u64,
    pub production_added: u64,
}

pub fn buy_item(player: &mut PlayerState, item_id: &str, config: &GameConfig) -> GameResult<Purchase> {
    let shop = &config.shop;
    let item = shop
        .item(item_id)
        .ok_or_else(|| GameError::ItemNotFound(item_id.to_string()))?;
    let level = player.item_level(&item.id) + 1;
    let cost = shop_cost_at_level(item, shop.growth_factor, level);
    if player.pet.gold < cost {
        return Err(GameError::InsufficientGold {
            required: cost,
            available: player.pet.gold,
        });
    }

    let production = shop_production_at_level(item, shop.growth_factor, level);
    player.pet.gold -= cost;
    player.inventory.insert(item.id.clone(), level);
    player.pet.gold_per_minute += production as f64;

    Ok(Purchase {
        item_id: item.id.clone(),
        level,
        cost,
        production_added: production,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PremiumGrant {
    Subscription {
        feature: PremiumFeature,
        expires_at: i64,
    },
    Fragments {
        amount: u64,
        total: u64,
    },
}

pub fn premium_item<'a>(config: &'a GameConfig, item_id: &str) -> GameResult<&'a PremiumItem> {
    config
        .shop
        .premium_item(item_id)
        .ok_or_else(|| GameError::ItemNotFound(item_id.to_string()))
}

/// Verifies the payment for `item_id` and applies the item. Nothing changes
/// unless the verifier confirms the transaction.
pub fn buy_premium_item(
    player: &mut PlayerState,
    item_id: &str,
    tx_ref: &str,
    now: i64,
    config: &GameConfig,
    verifier: &dyn PaymentVerifier,
) -> GameResult<PremiumGrant> {
    let item = premium_item(config, item_id)?;
    let verified = verifier
        .verify_payment(tx_ref, item.price_nano)
        .map_err(|err| GameError::transient("payment", err))?;
    if !verified {
        return Err(GameError::PaymentNotVerified {
            tx_ref: tx_ref.to_string(),
        });
    }
    let grant = apply_premium_item(player, item, now);
    tracing::info!(
        target: "tide_pet::shop",
        player = %player.id,
        item = %item.id,
        tx_ref,
        "premium.purchase_applied"
    );
    Ok(grant)
}

pub fn apply_premium_item(player: &mut PlayerState, item: &PremiumItem, now: i64) -> PremiumGrant {
    match item.item {
        PremiumItemKind::Subscription { feature, days } => {
            let expires_at = extend_subscription(player, feature, now, days);
            PremiumGrant::Subscription {
                feature,
                expires_at,
            }
        }
        PremiumItemKind::Consumable { fragments } => {
            player.premium.fragments += fragments;
            PremiumGrant::Fragments {
                amount: fragments,
                total: player.premium.fragments,
            }
        }
    }
}

/// Activates `feature` and pushes its expiry `days` past the later of now and
/// the current expiry.
pub fn extend_subscription(player: &mut PlayerState, feature: PremiumFeature, now: i64, days: u32) -> i64 {
    let premium = &mut player.premium;
    let (active, expires_at) = match feature {
        PremiumFeature::Premium => (&mut premium.premium_active, &mut premium.premium_expires_at),
        PremiumFeature::AutoCollector => (
            &mut premium.auto_collector_active,
            &mut premium.auto_collector_expires_at,
        ),
        PremiumFeature::DailyBonus => (
            &mut premium.daily_bonus_active,
            &mut premium.daily_bonus_expires_at,
        ),
    };
    let start = if *active { (*expires_at).max(now) } else { now };
    *active = true;
    *expires_at = start + i64::from(days) * SECONDS_PER_DAY;
    *expires_at
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentsBought {
    pub amount: u64,
    pub cost: u64,
}

/// Exchanges gold for portal fragments at the configured rate.
pub fn buy_fragments(player: &mut PlayerState, amount: u32, config: &GameConfig) -> GameResult<FragmentsBought> {
    let amount = u64::from(amount.max(1));
    let cost = amount.saturating_mul(config.shop.fragment_gold_price);
    if player.pet.gold < cost {
        return Err(GameError::InsufficientGold {
            required: cost,
            available: player.pet.gold,
        });
    }
    player.pet.gold -= cost;
    player.premium.fragments += amount;
    Ok(FragmentsBought { amount, cost })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{LedgerPaymentVerifier, RejectAllPayments};
    use game_schema::PlayerId;

    const T0: i64 = 1_700_000_000;

    fn player_with_gold(gold: u64) -> PlayerState {
        let mut player = PlayerState::new(PlayerId(3), T0);
        player.pet.gold = gold;
        player
    }

    #[test]
    fn purchase_one_gold_short_changes_nothing() {
        let config = GameConfig::builtin();
        let mut player = player_with_gold(49);
        let before = player.clone();
        let err = buy_item(&mut player, "toy", &config).unwrap_err();
        assert!(matches!(err, GameError::InsufficientGold { required: 50, available: 49 }));
        assert_eq!(player, before);
    }

    #[test]
    fn repeated_purchases_follow_the_curve() {
        let config = GameConfig::builtin();
        let mut player = player_with_gold(150);
        let first = buy_item(&mut player, "toy", &config).unwrap();
        assert_eq!((first.level, first.cost, first.production_added), (1, 50, 1));
        let second = buy_item(&mut player, "toy", &config).unwrap();
        assert_eq!((second.level, second.cost, second.production_added), (2, 100, 2));
        assert_eq!(player.pet.gold, 0);
        assert_eq!(player.item_level("toy"), 2);
        assert_eq!(player.pet.gold_per_minute, 4.0);
    }

    #[test]
    fn unknown_items_are_rejected() {
        let config = GameConfig::builtin();
        let mut player = player_with_gold(1_000_000);
        assert!(matches!(
            buy_item(&mut player, "castle", &config),
            Err(GameError::ItemNotFound(id)) if id == "castle"
        ));
    }

    #[test]
    fn offers_show_the_next_level() {
        let config = GameConfig::builtin();
        let mut player = player_with_gold(0);
        player.inventory.insert("house".to_string(), 2);
        let offers = shop_offers(&player, &config.shop);
        let house = offers.iter().find(|o| o.item_id == "house").unwrap();
        assert_eq!((house.owned_level, house.next_cost, house.next_production), (2, 800, 20));
    }

    #[test]
    fn premium_needs_a_verified_payment() {
        let config = GameConfig::builtin();
        let mut player = player_with_gold(0);
        let before = player.clone();
        let err = buy_premium_item(&mut player, "premium_status", "tx-1", T0, &config, &RejectAllPayments)
            .unwrap_err();
        assert!(matches!(err, GameError::PaymentNotVerified { .. }));
        assert_eq!(player, before);
    }

    #[test]
    fn subscriptions_stack_and_consumables_add_fragments() {
        let config = GameConfig::builtin();
        let verifier = LedgerPaymentVerifier::in_memory([
            ("tx-a".to_string(), 3_000_000_000),
            ("tx-b".to_string(), 3_000_000_000),
            ("tx-c".to_string(), 1_000_000_000),
        ]);
        let mut player = player_with_gold(0);

        let grant = buy_premium_item(&mut player, "premium_status", "tx-a", T0, &config, &verifier).unwrap();
        assert_eq!(
            grant,
            PremiumGrant::Subscription {
                feature: PremiumFeature::Premium,
                expires_at: T0 + 30 * SECONDS_PER_DAY,
            }
        );
        buy_premium_item(&mut player, "premium_status", "tx-b", T0 + 10, &config, &verifier).unwrap();
        assert!(player.premium.premium_active);
        assert_eq!(player.premium.premium_expires_at, T0 + 60 * SECONDS_PER_DAY);

        let grant = buy_premium_item(&mut player, "fragments_5", "tx-c", T0, &config, &verifier).unwrap();
        assert_eq!(grant, PremiumGrant::Fragments { amount: 5, total: 5 });

        // Ledger entries redeem once.
        assert!(matches!(
            buy_premium_item(&mut player, "fragments_5", "tx-c", T0, &config, &verifier),
            Err(GameError::PaymentNotVerified { .. })
        ));
    }

    #[test]
    fn lapsed_subscription_restarts_from_now() {
        let mut player = player_with_gold(0);
        player.premium.auto_collector_active = false;
        player.premium.auto_collector_expires_at = T0 - 100;
        let expires = extend_subscription(&mut player, PremiumFeature::AutoCollector, T0, 1);
        assert_eq!(expires, T0 + SECONDS_PER_DAY);
        assert!(player.premium.auto_collector_active);
    }

    #[test]
    fn fragments_cost_gold() {
        let config = GameConfig::builtin();
        let mut player = player_with_gold(24);
        assert!(matches!(
            buy_fragments(&mut player, 5, &config),
            Err(GameError::InsufficientGold { required: 25, .. })
        ));
        let bought = buy_fragments(&mut player, 4, &config).unwrap();
        assert_eq!(bought, FragmentsBought { amount: 4, cost: 20 });
        assert_eq!((player.pet.gold, player.premium.fragments), (4, 4));
    }
}
