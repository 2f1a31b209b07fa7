use std::sync::Arc;

use core_game::{
    AdError, AdHandle, AdNetwork, Collaborators, FeatureFlags, GameConfig, GameController,
    ManualClock, MemoryStore, PlayerId, RecordingTransport, RejectAllPayments, SpinMode,
};

struct NoAds;

impl AdNetwork for NoAds {
    fn request_ad(&self, _player: PlayerId) -> Result<AdHandle, AdError> {
        Err(AdError::Unavailable("offline".to_string()))
    }

    fn confirm_ad_viewed(&self, _handle: &AdHandle, _timeout: std::time::Duration) -> bool {
        false
    }
}

fn controller_with(features: FeatureFlags) -> GameController {
    let mut config = GameConfig::builtin().as_ref().clone();
    config.features = features;
    GameController::new(
        Arc::new(config),
        Collaborators {
            store: Arc::new(MemoryStore::new()),
            transport: Arc::new(RecordingTransport::new()),
            ads: Arc::new(NoAds),
            payments: Arc::new(RejectAllPayments),
            clock: Arc::new(ManualClock::new(1_709_290_800)),
        },
    )
}

#[test]
fn default_flags_enable_everything() {
    let flags = FeatureFlags::default();
    assert_eq!(flags, FeatureFlags::all());
    assert!(GameConfig::builtin().feature_enabled(FeatureFlags::PORTAL | FeatureFlags::ADS));
}

#[test]
fn features_parse_from_config_text() {
    let config = GameConfig::from_json_str(r#"{ "features": "COMBAT | SHOP" }"#).unwrap();
    assert!(config.feature_enabled(FeatureFlags::COMBAT));
    assert!(config.feature_enabled(FeatureFlags::SHOP));
    assert!(!config.features.intersects(FeatureFlags::PORTAL | FeatureFlags::MINIBOSS));
    // Sections left out fall back to the builtin tables.
    assert_eq!(config.miniboss.stages.len(), 5);
}

#[test]
fn disabled_combat_refuses_fights_but_not_care() {
    let controller = controller_with(FeatureFlags::all() - FeatureFlags::COMBAT - FeatureFlags::MINIBOSS);
    let player = PlayerId(1);
    assert!(controller.start(player).is_applied());

    let fight = controller.quick_combat(player);
    assert!(!fight.is_applied());
    assert!(fight.text.contains("closed"));
    assert!(!controller.start_miniboss(player).is_applied());

    assert!(controller.view_status(player).is_applied());
    assert!(controller.claim_daily(player).is_applied());
}

#[test]
fn menu_hides_disabled_features() {
    let controller = controller_with(FeatureFlags::COMBAT);
    let reply = controller.start(PlayerId(1));
    let labels: Vec<&str> = reply.keyboard.buttons().map(|b| b.label.as_str()).collect();
    assert!(labels.contains(&"Fight"));
    assert!(!labels.contains(&"Shop"));
    assert!(!labels.contains(&"Portal of Tides"));

    let spin = controller.spin_portal(PlayerId(1), SpinMode::Bulk);
    assert!(!spin.is_applied());
}
