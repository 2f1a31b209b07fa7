#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use core_game::{
    load_game_config_from_env, Collaborators, GameConfig, GameController, LinkAdNetwork,
    ManualClock, MemoryStore, PaymentVerifier, PlayerId, PlayerState, PlayerStore,
    RecordingTransport, RejectAllPayments,
};

static INIT: Once = Once::new();

/// 2024-03-01 12:00 at the game's reference offset (UTC+1).
pub const DAY_ONE_NOON: i64 = 1_709_290_800;
pub const DAY: i64 = 86_400;

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_game_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test game config at {}",
            config_path.display()
        );

        std::env::set_var("GAME_CONFIG_PATH", &config_path);
    });
}

pub fn test_config() -> Arc<GameConfig> {
    ensure_test_config();
    load_game_config_from_env()
}

pub struct Harness {
    pub controller: Arc<GameController>,
    pub store: Arc<dyn PlayerStore>,
    pub transport: Arc<RecordingTransport>,
    pub clock: Arc<ManualClock>,
    pub ads: Arc<LinkAdNetwork>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn PlayerStore>) -> Self {
        Self::build(test_config(), store, Arc::new(RejectAllPayments))
    }

    pub fn build(
        config: Arc<GameConfig>,
        store: Arc<dyn PlayerStore>,
        payments: Arc<dyn PaymentVerifier>,
    ) -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(DAY_ONE_NOON));
        let ads = Arc::new(LinkAdNetwork::new(config.ads.link_base.clone()));
        let controller = Arc::new(GameController::new(
            config,
            Collaborators {
                store: Arc::clone(&store),
                transport: transport.clone(),
                ads: ads.clone(),
                payments,
                clock: clock.clone(),
            },
        ));
        Self {
            controller,
            store,
            transport,
            clock,
            ads,
        }
    }

    /// Starts a player and applies `edit` straight to the stored document.
    pub fn player(&self, id: u64, edit: impl FnOnce(&mut PlayerState)) -> PlayerId {
        let id = PlayerId(id);
        assert!(self.controller.start(id).is_applied());
        let mut player = self.stored(id);
        edit(&mut player);
        self.store.save_player(&player).expect("seed player");
        id
    }

    pub fn stored(&self, id: PlayerId) -> PlayerState {
        self.store
            .load_player(id)
            .expect("load player")
            .expect("player exists")
    }
}
