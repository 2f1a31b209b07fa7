use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PlayerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PlayerId> for ChatId {
    /// Private chats share the id of the user they belong to.
    fn from(player: PlayerId) -> Self {
        ChatId(player.0 as i64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Portal spin batch size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpinMode {
    Single,
    Bulk,
}

impl SpinMode {
    pub fn spins(self) -> u32 {
        match self {
            SpinMode::Single => 1,
            SpinMode::Bulk => 10,
        }
    }

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            1 => Some(SpinMode::Single),
            10 => Some(SpinMode::Bulk),
            _ => None,
        }
    }
}

/// Every action a player can take from a command or a keyboard button.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    Start,
    CollectFood,
    FeedPet,
    ViewStatus,
    ViewCombatStats,
    OpenShop,
    BuyItem { item_id: String },
    QuickCombat,
    StartMiniboss,
    AdvanceMiniboss,
    RetreatMiniboss,
    RetryMinibossViaAd,
    ClaimDaily,
    OpenPortal,
    SpinPortal(SpinMode),
    OpenPremiumShop,
    ShowPayment { item_id: String },
    BuyPremiumItem { item_id: String, tx_ref: String },
    BuyFragments { amount: u32 },
    WatchAd,
    Prestige,
    MainMenu,
}

impl PlayerAction {
    /// Short stable name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerAction::Start => "start",
            PlayerAction::CollectFood => "collect_food",
            PlayerAction::FeedPet => "feed_pet",
            PlayerAction::ViewStatus => "view_status",
            PlayerAction::ViewCombatStats => "view_combat_stats",
            PlayerAction::OpenShop => "open_shop",
            PlayerAction::BuyItem { .. } => "buy_item",
            PlayerAction::QuickCombat => "quick_combat",
            PlayerAction::StartMiniboss => "start_miniboss",
            PlayerAction::AdvanceMiniboss => "advance_miniboss",
            PlayerAction::RetreatMiniboss => "retreat_miniboss",
            PlayerAction::RetryMinibossViaAd => "retry_miniboss_via_ad",
            PlayerAction::ClaimDaily => "claim_daily",
            PlayerAction::OpenPortal => "open_portal",
            PlayerAction::SpinPortal(_) => "spin_portal",
            PlayerAction::OpenPremiumShop => "open_premium_shop",
            PlayerAction::ShowPayment { .. } => "show_payment",
            PlayerAction::BuyPremiumItem { .. } => "buy_premium_item",
            PlayerAction::BuyFragments { .. } => "buy_fragments",
            PlayerAction::WatchAd => "watch_ad",
            PlayerAction::Prestige => "prestige",
            PlayerAction::MainMenu => "main_menu",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Command {
        text: String,
    },
    Callback {
        callback_id: String,
        data: String,
        message_id: Option<MessageId>,
    },
}

/// Inbound event from the chat transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub user_id: PlayerId,
    pub chat_id: ChatId,
    pub kind: UpdateKind,
}

/// One line of the server's inbound text protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundLine {
    Player {
        user_id: PlayerId,
        message_id: Option<MessageId>,
        payload: String,
    },
    AdViewed {
        ad_id: String,
    },
}
