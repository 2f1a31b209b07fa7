//! Routes player actions through load, reconcile, engine, save and render.
//!
//! Every mutation of a stored player happens inside [`GameController::mutate`],
//! which holds that player's lock for the whole read-modify-write. The ad
//! flows are the one exception to a single critical section: they check under
//! the lock, wait for the ad outside it, then apply under a fresh lock.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use game_runtime::{
    parse_callback_data, parse_command_line, ChatId, Keyboard, PlayerAction, Update, UpdateKind,
};
use game_schema::{player_fingerprint, PlayerId, PlayerState};
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ads::{ensure_ad_allowance, reward_ad_view, AdNetwork};
use crate::calendar::Clock;
use crate::combat::quick_combat;
use crate::config::{FeatureFlags, GameConfig};
use crate::daily::claim_daily;
use crate::error::{GameError, GameResult};
use crate::locks::PlayerLocks;
use crate::metrics::GameMetrics;
use crate::miniboss::{
    advance_miniboss, retreat_miniboss, retry_candidate, retry_miniboss, start_miniboss,
};
use crate::payment::PaymentVerifier;
use crate::portal::spin;
use crate::progression::{collect_food, feed_pet, prestige, reconcile, Reconciled};
use crate::render::{self, Screen};
use crate::shop::{buy_fragments, buy_item, buy_premium_item, premium_item, shop_offers};
use crate::storage::{PlayerStore, StoreError};
use crate::transport::{ChatTransport, TransportError};

/// What the player sees after an action, plus the state that was persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReply {
    pub text: String,
    pub keyboard: Keyboard,
    /// `None` when the action was refused or failed.
    pub player: Option<PlayerState>,
}

impl ActionReply {
    pub fn is_applied(&self) -> bool {
        self.player.is_some()
    }
}

/// The external services the controller talks to.
pub struct Collaborators {
    pub store: Arc<dyn PlayerStore>,
    pub transport: Arc<dyn ChatTransport>,
    pub ads: Arc<dyn AdNetwork>,
    pub payments: Arc<dyn PaymentVerifier>,
    pub clock: Arc<dyn Clock>,
}

/// Per-action inputs handed to the engine step.
pub struct ActionContext {
    pub now: i64,
    pub created: bool,
    pub reconciled: Reconciled,
    pub rng: ChaCha8Rng,
}

pub struct GameController {
    config: Arc<GameConfig>,
    store: Arc<dyn PlayerStore>,
    transport: Arc<dyn ChatTransport>,
    ads: Arc<dyn AdNetwork>,
    payments: Arc<dyn PaymentVerifier>,
    clock: Arc<dyn Clock>,
    locks: PlayerLocks,
    metrics: GameMetrics,
    rng: Mutex<ChaCha8Rng>,
}

impl GameController {
    pub fn new(config: Arc<GameConfig>, collaborators: Collaborators) -> Self {
        let rng = match config.server.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            store: collaborators.store,
            transport: collaborators.transport,
            ads: collaborators.ads,
            payments: collaborators.payments,
            clock: collaborators.clock,
            locks: PlayerLocks::new(),
            metrics: GameMetrics::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn metrics(&self) -> &GameMetrics {
        &self.metrics
    }

    pub fn locks(&self) -> &PlayerLocks {
        &self.locks
    }

    pub fn store(&self) -> &dyn PlayerStore {
        self.store.as_ref()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Runs one player action end to end. Never panics on game errors; they
    /// come back as text with the main menu.
    pub fn handle(&self, player: PlayerId, action: PlayerAction) -> ActionReply {
        self.metrics.record_action();
        let result = match &action {
            PlayerAction::WatchAd => self.watch_ad_flow(player),
            PlayerAction::RetryMinibossViaAd => self.retry_miniboss_flow(player),
            other => {
                let allow_create = matches!(other, PlayerAction::Start);
                self.mutate(player, allow_create, |state, ctx| {
                    self.run_engine(state, other, ctx)
                })
            }
        };

        match result {
            Ok((screen, state)) => {
                tracing::debug!(
                    target: "tide_pet::controller",
                    %player,
                    action = action.name(),
                    "action.completed"
                );
                ActionReply {
                    text: screen.text,
                    keyboard: screen.keyboard,
                    player: Some(state),
                }
            }
            Err(err) => self.reply_error(player, &action, err),
        }
    }

    pub fn start(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::Start)
    }

    pub fn collect_food(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::CollectFood)
    }

    pub fn feed_pet(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::FeedPet)
    }

    pub fn view_status(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::ViewStatus)
    }

    pub fn view_combat_stats(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::ViewCombatStats)
    }

    pub fn open_shop(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::OpenShop)
    }

    pub fn buy_item(&self, player: PlayerId, item_id: &str) -> ActionReply {
        self.handle(
            player,
            PlayerAction::BuyItem {
                item_id: item_id.to_string(),
            },
        )
    }

    pub fn quick_combat(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::QuickCombat)
    }

    pub fn start_miniboss(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::StartMiniboss)
    }

    pub fn advance_miniboss(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::AdvanceMiniboss)
    }

    pub fn retreat_miniboss(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::RetreatMiniboss)
    }

    pub fn retry_miniboss_via_ad(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::RetryMinibossViaAd)
    }

    pub fn claim_daily(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::ClaimDaily)
    }

    pub fn open_portal(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::OpenPortal)
    }

    pub fn spin_portal(&self, player: PlayerId, mode: game_runtime::SpinMode) -> ActionReply {
        self.handle(player, PlayerAction::SpinPortal(mode))
    }

    pub fn open_premium_shop(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::OpenPremiumShop)
    }

    pub fn buy_premium_item(&self, player: PlayerId, item_id: &str, tx_ref: &str) -> ActionReply {
        self.handle(
            player,
            PlayerAction::BuyPremiumItem {
                item_id: item_id.to_string(),
                tx_ref: tx_ref.to_string(),
            },
        )
    }

    pub fn buy_fragments(&self, player: PlayerId, amount: u32) -> ActionReply {
        self.handle(player, PlayerAction::BuyFragments { amount })
    }

    pub fn watch_ad(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::WatchAd)
    }

    pub fn prestige(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::Prestige)
    }

    pub fn main_menu(&self, player: PlayerId) -> ActionReply {
        self.handle(player, PlayerAction::MainMenu)
    }

    /// Parses a chat update, runs it and delivers the reply. Callback
    /// presses are answered first and edit the message they came from.
    pub fn dispatch(&self, update: &Update) -> Result<(), TransportError> {
        let parsed = match &update.kind {
            UpdateKind::Command { text } => parse_command_line(text),
            UpdateKind::Callback {
                callback_id, data, ..
            } => {
                self.transport.answer_callback(callback_id)?;
                parse_callback_data(data)
            }
        };

        let reply = match parsed {
            Ok(action) => self.handle(update.user_id, action),
            Err(err) => {
                tracing::debug!(
                    target: "tide_pet::controller",
                    player = %update.user_id,
                    error = %err,
                    "action.unparsed"
                );
                ActionReply {
                    text: format!("I did not understand that ({err})."),
                    keyboard: render::main_menu_keyboard(self.config.features),
                    player: None,
                }
            }
        };

        match &update.kind {
            UpdateKind::Callback {
                message_id: Some(message),
                ..
            } => self
                .transport
                .edit_message(update.chat_id, *message, &reply.text, &reply.keyboard),
            _ => self
                .transport
                .send_message(update.chat_id, &reply.text, &reply.keyboard)
                .map(|_| ()),
        }
    }

    /// Loads a stored player under its lock, applies `f`, and saves the
    /// result when it differs from what was loaded. Returns `Ok(None)` for
    /// unknown players. Used by background sweeps.
    pub fn update_stored<T>(
        &self,
        player: PlayerId,
        f: impl FnOnce(&mut PlayerState, i64) -> T,
    ) -> GameResult<Option<T>> {
        self.locks.with(player, || {
            let Some(mut state) = self.load(player)? else {
                return Ok(None);
            };
            let before = player_fingerprint(&state);
            let output = f(&mut state, self.clock.now());
            self.persist(&state, Some(before))?;
            Ok(Some(output))
        })
    }

    /// Checkpoints the store with the same retry policy as saves.
    pub fn checkpoint_store(&self) -> GameResult<()> {
        self.with_retries("checkpoint", || self.store.checkpoint())
    }

    fn mutate<T>(
        &self,
        player: PlayerId,
        allow_create: bool,
        step: impl FnOnce(&mut PlayerState, &mut ActionContext) -> GameResult<T>,
    ) -> GameResult<(T, PlayerState)> {
        self.locks.with(player, || {
            let now = self.clock.now();
            let (mut state, created) = match self.load(player)? {
                Some(state) => (state, false),
                None if allow_create => (PlayerState::new(player, now), true),
                None => return Err(GameError::NoSuchPlayer(player)),
            };
            let before = (!created).then(|| player_fingerprint(&state));
            let reconciled = reconcile(&mut state, now, &self.config);
            let mut ctx = ActionContext {
                now,
                created,
                reconciled,
                rng: self.action_rng(),
            };
            let output = step(&mut state, &mut ctx)?;
            self.persist(&state, before)?;
            Ok((output, state))
        })
    }

    fn run_engine(
        &self,
        state: &mut PlayerState,
        action: &PlayerAction,
        ctx: &mut ActionContext,
    ) -> GameResult<Screen> {
        let config = self.config.as_ref();
        let now = ctx.now;
        let screen = match action {
            PlayerAction::Start => {
                if ctx.created {
                    tracing::info!(target: "tide_pet::controller", player = %state.id, "player.created");
                }
                render::welcome(state, ctx.created, config)
            }
            PlayerAction::CollectFood => {
                let collected = collect_food(state, config)?;
                render::food_collected(&collected, state)
            }
            PlayerAction::FeedPet => render::fed(&feed_pet(state, now, config)?),
            PlayerAction::ViewStatus => render::status(state, &ctx.reconciled, now, config),
            PlayerAction::ViewCombatStats => {
                self.require(FeatureFlags::COMBAT, "arena")?;
                render::combat_stats(state, now, config)
            }
            PlayerAction::OpenShop => {
                self.require(FeatureFlags::SHOP, "shop")?;
                render::shop(&shop_offers(state, &config.shop), state)
            }
            PlayerAction::BuyItem { item_id } => {
                self.require(FeatureFlags::SHOP, "shop")?;
                let purchase = buy_item(state, item_id, config)?;
                render::purchase(&purchase, state)
            }
            PlayerAction::QuickCombat => {
                self.require(FeatureFlags::COMBAT, "arena")?;
                render::quick_combat(&quick_combat(state, now, config, &mut ctx.rng)?)
            }
            PlayerAction::StartMiniboss => {
                self.require(FeatureFlags::MINIBOSS, "MiniBoss lair")?;
                render::miniboss(&start_miniboss(state, now, config, &mut ctx.rng)?)
            }
            PlayerAction::AdvanceMiniboss => {
                self.require(FeatureFlags::MINIBOSS, "MiniBoss lair")?;
                render::miniboss(&advance_miniboss(state, now, config, &mut ctx.rng)?)
            }
            PlayerAction::RetreatMiniboss => {
                self.require(FeatureFlags::MINIBOSS, "MiniBoss lair")?;
                render::miniboss_retreat(&retreat_miniboss(state)?)
            }
            PlayerAction::ClaimDaily => {
                render::daily(&claim_daily(state, now, config, &mut ctx.rng)?)
            }
            PlayerAction::OpenPortal => {
                self.require(FeatureFlags::PORTAL, "portal")?;
                render::portal(state, config)
            }
            PlayerAction::SpinPortal(mode) => {
                self.require(FeatureFlags::PORTAL, "portal")?;
                render::spin(&spin(state, *mode, now, config, &mut ctx.rng)?, config)
            }
            PlayerAction::OpenPremiumShop => {
                self.require(FeatureFlags::PREMIUM_SHOP, "premium shop")?;
                render::premium_shop(state, config)
            }
            PlayerAction::ShowPayment { item_id } => {
                self.require(FeatureFlags::PREMIUM_SHOP, "premium shop")?;
                render::payment_instructions(premium_item(config, item_id)?)
            }
            PlayerAction::BuyPremiumItem { item_id, tx_ref } => {
                self.require(FeatureFlags::PREMIUM_SHOP, "premium shop")?;
                let grant =
                    buy_premium_item(state, item_id, tx_ref, now, config, self.payments.as_ref())?;
                render::premium_granted(premium_item(config, item_id)?, &grant)
            }
            PlayerAction::BuyFragments { amount } => {
                self.require(FeatureFlags::PREMIUM_SHOP, "premium shop")?;
                let bought = buy_fragments(state, *amount, config)?;
                render::fragments_bought(&bought, state)
            }
            PlayerAction::Prestige => {
                self.require(FeatureFlags::PRESTIGE, "prestige altar")?;
                render::prestiged(&prestige(state, now, config)?)
            }
            // Ad flows wait outside the lock and never come through here.
            PlayerAction::MainMenu | PlayerAction::WatchAd | PlayerAction::RetryMinibossViaAd => {
                render::main_menu(state, config)
            }
        };
        Ok(screen)
    }

    fn watch_ad_flow(&self, player: PlayerId) -> GameResult<(Screen, PlayerState)> {
        self.require(FeatureFlags::ADS, "ad corner")?;
        self.mutate(player, false, |state, ctx| {
            ensure_ad_allowance(state, ctx.now, &self.config)
        })?;
        self.await_ad_view(player)?;
        self.mutate(player, false, |state, ctx| {
            let reward = reward_ad_view(state, ctx.now, &self.config)?;
            Ok(render::ad_reward(&reward))
        })
    }

    fn retry_miniboss_flow(&self, player: PlayerId) -> GameResult<(Screen, PlayerState)> {
        self.require(FeatureFlags::MINIBOSS, "MiniBoss lair")?;
        self.mutate(player, false, |state, _| retry_candidate(state))?;
        self.await_ad_view(player)?;
        self.mutate(player, false, |state, ctx| {
            let report = retry_miniboss(state, ctx.now, &self.config, &mut ctx.rng)?;
            Ok(render::miniboss(&report))
        })
    }

    fn await_ad_view(&self, player: PlayerId) -> GameResult<()> {
        let handle = self
            .ads
            .request_ad(player)
            .map_err(|err| GameError::transient("ads", err))?;
        let link = render::ad_link(&handle);
        self.transport
            .send_message(ChatId::from(player), &link.text, &link.keyboard)
            .map_err(|err| GameError::transient("transport", err))?;

        let timeout = Duration::from_secs(self.config.ads.confirm_timeout_secs);
        if self.ads.confirm_ad_viewed(&handle, timeout) {
            Ok(())
        } else {
            tracing::info!(target: "tide_pet::ads", %player, ad = %handle.id, "ad.unconfirmed");
            Err(GameError::AdNotConfirmed)
        }
    }

    fn require(&self, feature: FeatureFlags, name: &'static str) -> GameResult<()> {
        if self.config.feature_enabled(feature) {
            Ok(())
        } else {
            Err(GameError::FeatureDisabled(name))
        }
    }

    fn action_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.rng.lock().next_u64())
    }

    fn load(&self, player: PlayerId) -> GameResult<Option<PlayerState>> {
        self.with_retries("load", || self.store.load_player(player))
    }

    fn persist(&self, state: &PlayerState, loaded: Option<u64>) -> GameResult<()> {
        if loaded == Some(player_fingerprint(state)) {
            self.metrics.record_save(false);
            return Ok(());
        }
        self.with_retries("save", || self.store.save_player(state))?;
        self.metrics.record_save(true);
        Ok(())
    }

    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> GameResult<T> {
        let attempts = self.config.server.storage_retry_attempts.max(1);
        let backoff = self.config.server.storage_retry_backoff_ms;
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                // A corrupt document will not heal by retrying.
                Err(err @ StoreError::Corrupt { .. }) => return Err(err.into()),
                Err(err) if attempt >= attempts => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(
                        target: "tide_pet::storage",
                        operation,
                        attempt,
                        error = %err,
                        "storage.retry"
                    );
                    thread::sleep(Duration::from_millis(backoff * u64::from(attempt)));
                    attempt += 1;
                }
            }
        }
    }

    fn reply_error(&self, player: PlayerId, action: &PlayerAction, err: GameError) -> ActionReply {
        if err.is_rejection() {
            self.metrics.record_rejection();
            tracing::debug!(
                target: "tide_pet::controller",
                %player,
                action = action.name(),
                reason = %err,
                "action.rejected"
            );
        } else {
            self.metrics.record_failure();
            tracing::error!(
                target: "tide_pet::controller",
                %player,
                action = action.name(),
                error = %err,
                "action.failed"
            );
        }
        let screen = render::error(&err, &self.config);
        ActionReply {
            text: screen.text,
            keyboard: screen.keyboard,
            player: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::{AdError, AdHandle};
    use crate::calendar::ManualClock;
    use crate::payment::{LedgerPaymentVerifier, RejectAllPayments};
    use crate::storage::MemoryStore;
    use crate::transport::RecordingTransport;
    use game_runtime::{MessageId, OutboundFrame, SpinMode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const T0: i64 = 1_709_290_800;

    struct ScriptedAds {
        confirm: bool,
        requests: AtomicUsize,
    }

    impl ScriptedAds {
        fn new(confirm: bool) -> Self {
            Self {
                confirm,
                requests: AtomicUsize::new(0),
            }
        }
    }

    impl AdNetwork for ScriptedAds {
        fn request_ad(&self, _player: PlayerId) -> Result<AdHandle, AdError> {
            let n = self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(AdHandle {
                id: format!("ad{n}"),
                url: format!("https://ads.test/{n}"),
            })
        }

        fn confirm_ad_viewed(&self, _handle: &AdHandle, _timeout: Duration) -> bool {
            self.confirm
        }
    }

    struct Fixture {
        controller: GameController,
        store: Arc<MemoryStore>,
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
    }

    fn fixture_with(
        config: GameConfig,
        ads: Arc<dyn AdNetwork>,
        payments: Arc<dyn PaymentVerifier>,
    ) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(T0));
        let mut config = config;
        config.server.rng_seed = Some(7);
        config.server.storage_retry_backoff_ms = 0;
        let controller = GameController::new(
            Arc::new(config),
            Collaborators {
                store: store.clone(),
                transport: transport.clone(),
                ads,
                payments,
                clock: clock.clone(),
            },
        );
        Fixture {
            controller,
            store,
            transport,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            GameConfig::builtin().as_ref().clone(),
            Arc::new(ScriptedAds::new(true)),
            Arc::new(RejectAllPayments),
        )
    }

    #[test]
    fn actions_before_start_are_refused() {
        let fx = fixture();
        let reply = fx.controller.feed_pet(PlayerId(1));
        assert!(!reply.is_applied());
        assert!(reply.text.contains("/start"));
        assert!(fx.store.list_players().unwrap().is_empty());
    }

    #[test]
    fn start_creates_and_persists_defaults() {
        let fx = fixture();
        let reply = fx.controller.start(PlayerId(1));
        let player = reply.player.unwrap();
        assert_eq!(player.pet.gold_per_minute, 1.0);
        assert_eq!(fx.store.load_player(PlayerId(1)).unwrap(), Some(player));
        assert!(reply.text.contains("hatched"));
        let again = fx.controller.start(PlayerId(1));
        assert!(again.text.contains("Welcome back"));
    }

    #[test]
    fn elapsed_time_is_reconciled_before_the_engine() {
        let fx = fixture();
        fx.controller.start(PlayerId(1));
        fx.clock.advance(30 * 60);
        let reply = fx.controller.view_status(PlayerId(1));
        let player = reply.player.unwrap();
        assert_eq!(player.pet.gold, 30);
        assert_eq!(player.pet.hunger, 70);
        assert_eq!(fx.store.load_player(PlayerId(1)).unwrap().unwrap().pet.gold, 30);
    }

    #[test]
    fn rejected_actions_leave_the_store_untouched() {
        let fx = fixture();
        fx.controller.start(PlayerId(1));
        let before = fx.store.raw_document(PlayerId(1));
        let reply = fx.controller.buy_item(PlayerId(1), "house");
        assert!(!reply.is_applied());
        assert!(reply.text.contains("Not enough gold"));
        assert_eq!(fx.store.raw_document(PlayerId(1)), before);
        assert_eq!(fx.controller.metrics().snapshot().rejections, 1);
    }

    #[test]
    fn unverified_payment_grants_nothing() {
        let fx = fixture();
        fx.controller.start(PlayerId(1));
        let reply = fx
            .controller
            .buy_premium_item(PlayerId(1), "fragments_5", "tx-1");
        assert!(!reply.is_applied());
        let stored = fx.store.load_player(PlayerId(1)).unwrap().unwrap();
        assert_eq!(stored.premium.fragments, 0);
    }

    #[test]
    fn verified_payment_is_redeemed_once() {
        let ledger = LedgerPaymentVerifier::in_memory([("tx-9".to_string(), 1_000_000_000)]);
        let fx = fixture_with(
            GameConfig::builtin().as_ref().clone(),
            Arc::new(ScriptedAds::new(true)),
            Arc::new(ledger),
        );
        fx.controller.start(PlayerId(1));
        let first = fx
            .controller
            .buy_premium_item(PlayerId(1), "fragments_5", "tx-9");
        assert_eq!(first.player.unwrap().premium.fragments, 5);
        let second = fx
            .controller
            .buy_premium_item(PlayerId(1), "fragments_5", "tx-9");
        assert!(!second.is_applied());
    }

    #[test]
    fn disabled_features_are_refused() {
        let mut config = GameConfig::builtin().as_ref().clone();
        config.features.remove(FeatureFlags::PORTAL);
        let fx = fixture_with(
            config,
            Arc::new(ScriptedAds::new(true)),
            Arc::new(RejectAllPayments),
        );
        fx.controller.start(PlayerId(1));
        let reply = fx.controller.spin_portal(PlayerId(1), SpinMode::Single);
        assert!(!reply.is_applied());
        assert!(reply.text.contains("closed"));
    }

    #[test]
    fn watched_ad_pays_out_and_sends_link_first() {
        let fx = fixture();
        fx.controller.start(PlayerId(3));
        let reply = fx.controller.watch_ad(PlayerId(3));
        let player = reply.player.unwrap();
        assert_eq!(player.ads.ads_today, 1);
        let texts = fx.transport.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("https://ads.test/0"));
    }

    #[test]
    fn unconfirmed_ad_returns_to_menu_without_reward() {
        let fx = fixture_with(
            GameConfig::builtin().as_ref().clone(),
            Arc::new(ScriptedAds::new(false)),
            Arc::new(RejectAllPayments),
        );
        fx.controller.start(PlayerId(3));
        let reply = fx.controller.watch_ad(PlayerId(3));
        assert!(!reply.is_applied());
        assert!(reply
            .keyboard
            .buttons()
            .any(|b| b.data == PlayerAction::ClaimDaily.callback_data()));
        let stored = fx.store.load_player(PlayerId(3)).unwrap().unwrap();
        assert_eq!(stored.ads.ads_today, 0);
    }

    #[test]
    fn retry_needs_a_lost_run() {
        let fx = fixture();
        fx.controller.start(PlayerId(4));
        let reply = fx.controller.retry_miniboss_via_ad(PlayerId(4));
        assert!(reply.text.contains("no lost MiniBoss run"));
        // The ad is never requested when there is nothing to retry.
        assert!(fx.transport.texts().is_empty());
    }

    #[test]
    fn dispatch_edits_callback_messages_and_answers_them() {
        let fx = fixture();
        fx.controller.start(PlayerId(8));
        fx.controller
            .dispatch(&Update {
                user_id: PlayerId(8),
                chat_id: ChatId(8),
                kind: UpdateKind::Callback {
                    callback_id: "cb1".to_string(),
                    data: "status".to_string(),
                    message_id: Some(MessageId(42)),
                },
            })
            .unwrap();
        let frames = fx.transport.frames();
        assert!(matches!(&frames[0], OutboundFrame::CallbackAnswer { callback_id } if callback_id == "cb1"));
        assert!(matches!(
            &frames[1],
            OutboundFrame::Edit { message_id: MessageId(42), text, .. } if text.starts_with("Status")
        ));
    }

    #[test]
    fn dispatch_reports_unknown_commands() {
        let fx = fixture();
        fx.controller
            .dispatch(&Update {
                user_id: PlayerId(8),
                chat_id: ChatId(8),
                kind: UpdateKind::Command {
                    text: "/dance".to_string(),
                },
            })
            .unwrap();
        assert!(fx.transport.texts()[0].starts_with("I did not understand"));
    }

    #[test]
    fn unchanged_players_are_not_rewritten() {
        let fx = fixture();
        fx.controller.start(PlayerId(1));
        let saves = fx.controller.metrics().snapshot().saves;
        fx.controller.main_menu(PlayerId(1));
        let snapshot = fx.controller.metrics().snapshot();
        assert_eq!(snapshot.saves, saves);
        assert_eq!(snapshot.skipped_saves, 1);
    }
}
