mod common;

use std::fs;
use std::path::PathBuf;

use common::Harness;
use core_game::{CombatStats, MAX_ENERGY, MAX_HUNGER};
use game_runtime::{PlayerAction, SpinMode};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn action_pool() -> Vec<PlayerAction> {
    vec![
        PlayerAction::CollectFood,
        PlayerAction::FeedPet,
        PlayerAction::ViewStatus,
        PlayerAction::ViewCombatStats,
        PlayerAction::OpenShop,
        PlayerAction::BuyItem {
            item_id: "toy".to_string(),
        },
        PlayerAction::BuyItem {
            item_id: "house".to_string(),
        },
        PlayerAction::QuickCombat,
        PlayerAction::StartMiniboss,
        PlayerAction::AdvanceMiniboss,
        PlayerAction::RetreatMiniboss,
        PlayerAction::ClaimDaily,
        PlayerAction::OpenPortal,
        PlayerAction::SpinPortal(SpinMode::Single),
        PlayerAction::SpinPortal(SpinMode::Bulk),
        PlayerAction::OpenPremiumShop,
        PlayerAction::BuyPremiumItem {
            item_id: "premium_status".to_string(),
            tx_ref: "tx-unknown".to_string(),
        },
        PlayerAction::BuyFragments { amount: 1 },
        PlayerAction::Prestige,
        PlayerAction::MainMenu,
    ]
}

#[test]
fn random_play_keeps_every_player_invariant() {
    let harness = Harness::new();
    let config = harness.controller.config();
    let id = harness.player(500, |p| {
        p.pet.gold = 50_000;
        p.premium.fragments = 30;
    });
    let pool = action_pool();
    let mut rng = ChaCha8Rng::seed_from_u64(0x71de);

    for step in 0..400 {
        if rng.gen_bool(0.1) {
            harness.clock.advance(rng.gen_range(60..6 * 3_600));
        }
        let action = pool.choose(&mut rng).expect("pool is not empty").clone();
        let before = harness.stored(id);
        let reply = harness.controller.handle(id, action.clone());
        let after = harness.stored(id);

        if !reply.is_applied() {
            assert_eq!(after, before, "step {step}: rejected {action:?} changed the player");
        }
        assert!(after.pet.energy <= MAX_ENERGY, "step {step}");
        assert!(after.pet.hunger <= MAX_HUNGER, "step {step}");
        assert!(after.pet.level >= 1, "step {step}");

        let mut derived = after.combat.clone();
        derived.derive_from_level();
        assert_eq!(derived, after.combat, "step {step}: stats drifted from level");
        assert!(after.combat.level >= CombatStats::default().level);

        // Portal draws can grant premium mid-walk, so bound by the premium cap.
        assert!(after.combat.battles_today <= config.combat.battle_cap(true));
        if let Some(run) = after.miniboss.active_run {
            assert!((1..=5).contains(&run.current_enemy_index), "step {step}");
        }
    }
}

#[test]
fn fixture_config_is_what_the_harness_runs_with() -> anyhow::Result<()> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("test_game_config.json");
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let config = common::test_config();

    assert_eq!(raw["server"]["rng_seed"].as_u64(), config.server.rng_seed);
    assert_eq!(
        raw["ads"]["confirm_timeout_secs"].as_u64(),
        Some(config.ads.confirm_timeout_secs)
    );
    assert_eq!(config.ads.link_base, "https://ads.test/watch");
    // Sections the fixture leaves out come from the built-in config.
    assert!(config.shop.item("toy").is_some());
    Ok(())
}
