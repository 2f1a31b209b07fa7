//! Player-facing text and keyboards for every action outcome.

use std::fmt::Write as _;

use game_runtime::{Button, Keyboard, PlayerAction, SpinMode};
use game_schema::{PlayerState, RewardBundle, MAX_ENERGY, MAX_HUNGER, MINIBOSS_STAGES};

use crate::ads::{AdHandle, AdReward};
use crate::combat::QuickCombatOutcome;
use crate::config::{FeatureFlags, GameConfig};
use crate::daily::DailyClaim;
use crate::economy::RewardTier;
use crate::error::{DailyLimitKind, GameError, LevelTrack};
use crate::miniboss::{MinibossOutcome, MinibossReport};
use crate::portal::{PortalReward, Rarity, SpinResult};
use crate::progression::{Fed, FoodCollected, Prestiged, Reconciled};
use crate::shop::{FragmentsBought, PremiumGrant, PremiumFeature, PremiumItem, PremiumItemKind, Purchase, ShopOffer};

pub const GENERIC_FAILURE: &str = "Something went wrong on our side. Please try again in a moment.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Screen {
    fn new(text: String, keyboard: Keyboard) -> Self {
        Self { text, keyboard }
    }
}

pub fn main_menu_keyboard(features: FeatureFlags) -> Keyboard {
    let mut care = vec![
        Button::new("Collect food", &PlayerAction::CollectFood),
        Button::new("Feed", &PlayerAction::FeedPet),
        Button::new("Status", &PlayerAction::ViewStatus),
    ];
    if features.contains(FeatureFlags::SHOP) {
        care.push(Button::new("Shop", &PlayerAction::OpenShop));
    }

    let mut fights = Vec::new();
    if features.contains(FeatureFlags::COMBAT) {
        fights.push(Button::new("Fight", &PlayerAction::QuickCombat));
        fights.push(Button::new("Combat stats", &PlayerAction::ViewCombatStats));
    }
    if features.contains(FeatureFlags::MINIBOSS) {
        fights.push(Button::new("MiniBoss", &PlayerAction::StartMiniboss));
    }

    let mut rewards = vec![Button::new("Daily reward", &PlayerAction::ClaimDaily)];
    if features.contains(FeatureFlags::PORTAL) {
        rewards.push(Button::new("Portal of Tides", &PlayerAction::OpenPortal));
    }
    if features.contains(FeatureFlags::ADS) {
        rewards.push(Button::new("Watch ad", &PlayerAction::WatchAd));
    }

    let mut extras = Vec::new();
    if features.contains(FeatureFlags::PREMIUM_SHOP) {
        extras.push(Button::new("Premium", &PlayerAction::OpenPremiumShop));
    }
    if features.contains(FeatureFlags::PRESTIGE) {
        extras.push(Button::new("Prestige", &PlayerAction::Prestige));
    }

    Keyboard::new().row(care).row(fights).row(rewards).row(extras)
}

fn back_to_menu() -> Keyboard {
    Keyboard::single("Main menu", &PlayerAction::MainMenu)
}

fn with_menu(keyboard: Keyboard) -> Keyboard {
    keyboard.row(vec![Button::new("Main menu", &PlayerAction::MainMenu)])
}

fn pet_summary(out: &mut String, player: &PlayerState) {
    let pet = &player.pet;
    let _ = writeln!(out, "Pet level {} | gold {} ({:.2}/min)", pet.level, pet.gold, pet.gold_per_minute);
    let _ = writeln!(
        out,
        "Hunger {}/{} | energy {}/{} | food {}",
        pet.hunger, MAX_HUNGER, pet.energy, MAX_ENERGY, player.food
    );
}

pub fn welcome(player: &PlayerState, created: bool, config: &GameConfig) -> Screen {
    let mut text = String::new();
    if created {
        text.push_str("Welcome to Tide Pet! Your pet has hatched.\n");
    } else {
        text.push_str("Welcome back!\n");
    }
    pet_summary(&mut text, player);
    Screen::new(text, main_menu_keyboard(config.features))
}

pub fn main_menu(player: &PlayerState, config: &GameConfig) -> Screen {
    let mut text = String::from("Main menu\n");
    pet_summary(&mut text, player);
    Screen::new(text, main_menu_keyboard(config.features))
}

pub fn status(player: &PlayerState, reconciled: &Reconciled, now: i64, config: &GameConfig) -> Screen {
    let mut text = String::from("Status\n");
    pet_summary(&mut text, player);
    if reconciled.minutes > 0 {
        let _ = writeln!(
            text,
            "While you were away ({} min): +{} gold, +{} food",
            reconciled.minutes, reconciled.gold_gained, reconciled.food_collected
        );
    }
    let _ = writeln!(
        text,
        "Fragments {} | watershard {} | prestige {}",
        player.premium.fragments, player.watershard, player.prestige_level
    );
    if player.is_premium(now) {
        let _ = writeln!(text, "Premium active until {}", player.premium.premium_expires_at);
    }
    if !player.inventory.is_empty() {
        let owned: Vec<String> = player
            .inventory
            .iter()
            .map(|(item, level)| format!("{item} L{level}"))
            .collect();
        let _ = writeln!(text, "Upgrades: {}", owned.join(", "));
    }
    Screen::new(text, main_menu_keyboard(config.features))
}

pub fn combat_stats(player: &PlayerState, now: i64, config: &GameConfig) -> Screen {
    let stats = &player.combat;
    let mut text = String::new();
    let _ = writeln!(text, "Combat level {} ({} exp)", stats.level, stats.exp);
    let _ = writeln!(text, "HP {} | ATK {} | MP {}", stats.hp, stats.atk, stats.mp);
    let _ = writeln!(
        text,
        "DEF {:.1} phys / {:.1} mag | AGI {} | STA {}",
        stats.def_phys, stats.def_mag, stats.agi, stats.sta
    );
    let _ = writeln!(
        text,
        "Battles today {}/{} | fire coral {}",
        stats.battles_today,
        config.combat.battle_cap(player.is_premium(now)),
        stats.fire_coral
    );
    Screen::new(text, main_menu_keyboard(config.features))
}

pub fn food_collected(collected: &FoodCollected, player: &PlayerState) -> Screen {
    let text = format!(
        "You gathered {} food for {} energy. Food {}, energy {}.",
        collected.food, collected.energy_spent, player.food, player.pet.energy
    );
    Screen::new(
        text,
        with_menu(Keyboard::new().row(vec![
            Button::new("Collect again", &PlayerAction::CollectFood),
            Button::new("Feed", &PlayerAction::FeedPet),
        ])),
    )
}

pub fn fed(fed: &Fed) -> Screen {
    let text = format!(
        "Your pet ate {} food and grew to level {}. Income is now {:.2} gold/min.",
        fed.food_spent, fed.level, fed.gold_per_minute
    );
    Screen::new(
        text,
        with_menu(Keyboard::single("Feed again", &PlayerAction::FeedPet)),
    )
}

pub fn shop(offers: &[ShopOffer], player: &PlayerState) -> Screen {
    let mut text = format!("Shop (you have {} gold)\n", player.pet.gold);
    let mut keyboard = Keyboard::new();
    for offer in offers {
        let _ = writeln!(
            text,
            "{} L{}: next level {} gold, +{} gold/min",
            offer.name, offer.owned_level, offer.next_cost, offer.next_production
        );
        keyboard = keyboard.row(vec![Button::new(
            format!("{} ({})", offer.name, offer.next_cost),
            &PlayerAction::BuyItem {
                item_id: offer.item_id.clone(),
            },
        )]);
    }
    Screen::new(text, with_menu(keyboard))
}

pub fn purchase(purchase: &Purchase, player: &PlayerState) -> Screen {
    let text = format!(
        "Bought {} level {} for {} gold (+{} gold/min). Gold left: {}.",
        purchase.item_id, purchase.level, purchase.cost, purchase.production_added, player.pet.gold
    );
    Screen::new(
        text,
        with_menu(Keyboard::single("Back to shop", &PlayerAction::OpenShop)),
    )
}

pub fn quick_combat(outcome: &QuickCombatOutcome) -> Screen {
    let mut text = format!(
        "You met a level {} enemy ({:.0}% to win).\n",
        outcome.enemy_level,
        outcome.victory_chance * 100.0
    );
    match &outcome.rewards {
        Some(rewards) => {
            let _ = writeln!(
                text,
                "Victory! +{} exp, +{:.2} gold/min, +{} fire coral",
                rewards.exp, rewards.gold_per_minute, rewards.coral
            );
            if outcome.levels_gained > 0 {
                let _ = writeln!(text, "Combat level up x{}!", outcome.levels_gained);
            }
        }
        None => text.push_str("Defeat. Better luck next time.\n"),
    }
    let _ = writeln!(text, "Battles left today: {}", outcome.battles_left);
    Screen::new(
        text,
        with_menu(Keyboard::single("Fight again", &PlayerAction::QuickCombat)),
    )
}

fn bundle(rewards: &RewardBundle) -> String {
    format!(
        "{} gold, {} coral, {} exp",
        rewards.gold, rewards.coral, rewards.exp
    )
}

pub fn miniboss(report: &MinibossReport) -> Screen {
    let mut text = format!(
        "MiniBoss stage {}/{} ({:.0}% to win)\n",
        report.stage,
        MINIBOSS_STAGES,
        report.win_chance * 100.0
    );
    let keyboard = match &report.outcome {
        MinibossOutcome::StageCleared {
            reward,
            accumulated,
            next_win_chance,
        } => {
            let _ = writeln!(text, "Stage cleared: {}", bundle(reward));
            let _ = writeln!(text, "Run total: {}", bundle(accumulated));
            let _ = writeln!(
                text,
                "Next stage: {:.0}% to win. Retreat now to keep half.",
                next_win_chance * 100.0
            );
            Keyboard::new().row(vec![
                Button::new("Advance", &PlayerAction::AdvanceMiniboss),
                Button::new("Retreat", &PlayerAction::RetreatMiniboss),
            ])
        }
        other => return outcome_screen(text, other),
    };
    Screen::new(text, keyboard)
}

pub fn miniboss_retreat(outcome: &MinibossOutcome) -> Screen {
    outcome_screen(String::new(), outcome)
}

fn outcome_screen(mut text: String, outcome: &MinibossOutcome) -> Screen {
    let keyboard = match outcome {
        MinibossOutcome::Completed {
            reward,
            total,
            levels_gained,
        } => {
            let _ = writeln!(text, "The boss falls! Final stage: {}", bundle(reward));
            let _ = writeln!(text, "Run paid out: {}", bundle(total));
            if *levels_gained > 0 {
                let _ = writeln!(text, "Combat level up x{levels_gained}!");
            }
            back_to_menu()
        }
        MinibossOutcome::Defeated { forfeited } => {
            let _ = writeln!(text, "Defeated. Lost the run: {}", bundle(forfeited));
            text.push_str("Watch an ad to retry this stage.\n");
            with_menu(Keyboard::single(
                "Watch ad and retry",
                &PlayerAction::RetryMinibossViaAd,
            ))
        }
        MinibossOutcome::Retreated {
            paid,
            forfeited,
            levels_gained,
        } => {
            let _ = writeln!(text, "You retreated with {}", bundle(paid));
            let _ = writeln!(text, "Left behind: {}", bundle(forfeited));
            if *levels_gained > 0 {
                let _ = writeln!(text, "Combat level up x{levels_gained}!");
            }
            back_to_menu()
        }
        MinibossOutcome::StageCleared { accumulated, .. } => {
            let _ = writeln!(text, "Run total: {}", bundle(accumulated));
            Keyboard::new().row(vec![
                Button::new("Advance", &PlayerAction::AdvanceMiniboss),
                Button::new("Retreat", &PlayerAction::RetreatMiniboss),
            ])
        }
    };
    Screen::new(text, keyboard)
}

pub fn daily(claim: &DailyClaim) -> Screen {
    let tier = match claim.tier {
        RewardTier::Basic => "Daily reward",
        RewardTier::Premium => "Premium daily reward",
    };
    let amounts = &claim.amounts;
    let mut text = format!("{tier} (streak {} days)\n", claim.streak);
    let _ = writeln!(
        text,
        "+{} gold, +{} coral, +{} food, +{} exp, +{} fragments. Energy refilled.",
        amounts.gold, amounts.coral, amounts.food, amounts.exp, amounts.fragments
    );
    if let Some(bonus) = claim.weekly_bonus {
        let _ = writeln!(text, "Weekly bonus: +{bonus} fragments");
    }
    if claim.levels_gained > 0 {
        let _ = writeln!(text, "Combat level up x{}!", claim.levels_gained);
    }
    Screen::new(text, back_to_menu())
}

fn portal_keyboard(config: &GameConfig) -> Keyboard {
    with_menu(Keyboard::new().row(vec![
        Button::new(
            format!("Spin x1 ({})", config.portal.single_cost),
            &PlayerAction::SpinPortal(SpinMode::Single),
        ),
        Button::new(
            format!("Spin x10 ({})", config.portal.bulk_cost),
            &PlayerAction::SpinPortal(SpinMode::Bulk),
        ),
    ]))
}

pub fn portal(player: &PlayerState, config: &GameConfig) -> Screen {
    let stats = &player.portal;
    let mut text = format!("Portal of Tides. Fragments: {}\n", player.premium.fragments);
    for tier in &config.portal.tiers {
        let _ = write!(text, "{:?} {}%", tier.rarity, tier.weight);
        if let Some(pity) = tier.pity {
            let since = match tier.rarity {
                Rarity::Legendary => stats.spins_since_legendary,
                Rarity::Epic => stats.spins_since_epic,
                Rarity::Rare => stats.spins_since_rare,
                Rarity::Common => 0,
            };
            let scope = if tier.pity_bulk_only { ", x10 only" } else { "" };
            let _ = write!(text, " (guaranteed within {pity}{scope}, {since} so far)");
        }
        text.push('\n');
    }
    Screen::new(text, portal_keyboard(config))
}

pub fn describe_reward(reward: &PortalReward) -> String {
    match reward {
        PortalReward::Gold { amount } => format!("{amount} gold"),
        PortalReward::Coral { amount } => format!("{amount} fire coral"),
        PortalReward::Energy { amount } => format!("{amount} energy"),
        PortalReward::Food { amount } => format!("{amount} food"),
        PortalReward::GoldBoost { factor } => format!("+{:.0}% gold income", factor * 100.0),
        PortalReward::CombatRefund { battles } => format!("{battles} extra battles today"),
        PortalReward::Premium { days } => format!("{days} days of premium"),
        PortalReward::Watershard { amount } => format!("{amount} watershard"),
    }
}

pub fn spin(result: &SpinResult, config: &GameConfig) -> Screen {
    let mut text = format!("The portal opens ({} fragments spent)\n", result.fragments_spent);
    for draw in &result.draws {
        let pity = if draw.forced { " (pity)" } else { "" };
        let _ = writeln!(text, "{:?}{pity}: {}", draw.rarity, describe_reward(&draw.reward));
    }
    let _ = writeln!(text, "Fragments left: {}", result.fragments_left);
    Screen::new(text, portal_keyboard(config))
}

pub fn premium_shop(player: &PlayerState, config: &GameConfig) -> Screen {
    let mut text = format!(
        "Premium shop. Fragments: {}. You can also trade {} gold for one fragment.\n",
        player.premium.fragments, config.shop.fragment_gold_price
    );
    let mut keyboard = Keyboard::new();
    for item in &config.shop.premium_items {
        let _ = writeln!(text, "{}: {}", item.name, item.price_label());
        keyboard = keyboard.row(vec![Button::new(
            format!("{} ({})", item.name, item.price_label()),
            &PlayerAction::ShowPayment {
                item_id: item.id.clone(),
            },
        )]);
    }
    keyboard = keyboard.row(vec![
        Button::new("1 fragment for gold", &PlayerAction::BuyFragments { amount: 1 }),
        Button::new("10 fragments for gold", &PlayerAction::BuyFragments { amount: 10 }),
    ]);
    Screen::new(text, with_menu(keyboard))
}

pub fn payment_instructions(item: &PremiumItem) -> Screen {
    let text = format!(
        "{} costs {}.\nSend the payment, then confirm with:\n/buypremium {} <transaction id>",
        item.name,
        item.price_label(),
        item.id
    );
    Screen::new(
        text,
        with_menu(Keyboard::single("Back", &PlayerAction::OpenPremiumShop)),
    )
}

pub fn premium_granted(item: &PremiumItem, grant: &PremiumGrant) -> Screen {
    let text = match grant {
        PremiumGrant::Subscription { feature, expires_at } => {
            let name = match feature {
                PremiumFeature::Premium => "Premium",
                PremiumFeature::AutoCollector => "Auto collector",
                PremiumFeature::DailyBonus => "Daily bonus",
            };
            format!("Payment confirmed. {name} is active until {expires_at}.")
        }
        PremiumGrant::Fragments { amount, total } => {
            format!("Payment confirmed. +{amount} fragments (now {total}).")
        }
    };
    let extra = match item.item {
        PremiumItemKind::Consumable { .. } => {
            Keyboard::single("Open portal", &PlayerAction::OpenPortal)
        }
        PremiumItemKind::Subscription { .. } => Keyboard::new(),
    };
    Screen::new(text, with_menu(extra))
}

pub fn fragments_bought(bought: &FragmentsBought, player: &PlayerState) -> Screen {
    let text = format!(
        "Traded {} gold for {} fragments. Fragments: {}, gold: {}.",
        bought.cost, bought.amount, player.premium.fragments, player.pet.gold
    );
    Screen::new(
        text,
        with_menu(Keyboard::single("Open portal", &PlayerAction::OpenPortal)),
    )
}

pub fn ad_link(handle: &AdHandle) -> Screen {
    let text = format!(
        "Watch the ad here, the reward arrives once it finishes:\n{}",
        handle.url
    );
    Screen::new(text, Keyboard::new())
}

pub fn ad_reward(reward: &AdReward) -> Screen {
    let mut text = format!(
        "Thanks for watching! +{} energy, {} battle(s) refunded. Ads today: {}.\n",
        reward.energy, reward.battles_refunded, reward.ads_today
    );
    if let Some(milestone) = &reward.milestone {
        let _ = write!(text, "Milestone {} ads:", milestone.ads);
        if milestone.bonus_attempts > 0 {
            let _ = write!(text, " +{} MiniBoss attempts", milestone.bonus_attempts);
        }
        if let Some(multiplier) = milestone.gold_multiplier {
            let _ = write!(text, " gold income x{multiplier}");
        }
        if milestone.fragments > 0 {
            let _ = write!(text, " +{} fragments", milestone.fragments);
        }
        text.push('\n');
    }
    Screen::new(
        text,
        with_menu(Keyboard::single("Watch another", &PlayerAction::WatchAd)),
    )
}

pub fn prestiged(prestiged: &Prestiged) -> Screen {
    let text = format!(
        "Prestige {}! Your pet starts over keeping {} gold. Income {:.2} gold/min.",
        prestiged.prestige_level, prestiged.gold_kept, prestiged.gold_per_minute
    );
    Screen::new(text, back_to_menu())
}

/// Player-facing explanation of a refused or failed action.
pub fn error_text(err: &GameError) -> String {
    match err {
        GameError::NoSuchPlayer(_) => "You have no pet yet. Send /start to hatch one.".to_string(),
        GameError::LevelRequirement {
            track,
            required,
            current,
        } => {
            let track = match track {
                LevelTrack::Pet => "Pet",
                LevelTrack::Combat => "Combat",
            };
            format!("{track} level {required} needed (you are level {current}).")
        }
        GameError::DailyLimit { kind, limit } => {
            let what = match kind {
                DailyLimitKind::Battles => "battles",
                DailyLimitKind::MinibossAttempts => "MiniBoss attempts",
                DailyLimitKind::Ads => "ad views",
            };
            format!("You used all {limit} {what} for today. Come back tomorrow.")
        }
        GameError::InsufficientGold {
            required,
            available,
        } => format!("Not enough gold: {required} needed, you have {available}."),
        GameError::InsufficientFragments {
            required,
            available,
        } => format!("Not enough fragments: {required} needed, you have {available}."),
        GameError::InsufficientEnergy {
            required,
            available,
        } => format!("Not enough energy: {required} needed, you have {available}."),
        GameError::InsufficientFood {
            required,
            available,
        } => format!("Not enough food: {required} needed, you have {available}."),
        GameError::AlreadyClaimed => {
            "You already claimed today's reward. Come back tomorrow.".to_string()
        }
        GameError::ItemNotFound(item) => format!("There is no item called '{item}'."),
        GameError::PaymentNotVerified { tx_ref } => {
            format!("Payment {tx_ref} could not be confirmed. Nothing was charged in game.")
        }
        GameError::PetAtMaxLevel(level) => format!("Your pet is already at the top level {level}."),
        GameError::RunInProgress => {
            "You are in the middle of a MiniBoss run. Advance or retreat first.".to_string()
        }
        GameError::NoActiveRun => "There is no MiniBoss run in progress.".to_string(),
        GameError::NothingToRetry => "There is no lost MiniBoss run to retry.".to_string(),
        GameError::AdNotConfirmed => {
            "The ad view was not confirmed in time. Back to the main menu.".to_string()
        }
        GameError::FeatureDisabled(feature) => {
            format!("The {feature} is closed right now.")
        }
        GameError::TransientIo { .. } => GENERIC_FAILURE.to_string(),
    }
}

pub fn error(err: &GameError, config: &GameConfig) -> Screen {
    Screen::new(error_text(err), main_menu_keyboard(config.features))
}
