use std::num::ParseIntError;

use thiserror::Error;

use crate::{InboundLine, MessageId, PlayerAction, PlayerId, SpinMode};

#[derive(Debug, Error)]
pub enum ActionParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown callback data: {0}")]
    UnknownCallback(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("unsupported spin count {0}; use 1 or 10")]
    InvalidSpinCount(u32),
}

/// Parses a slash command such as `/buy toy` or `/spin 10`.
pub fn parse_command_line(input: &str) -> Result<PlayerAction, ActionParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ActionParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.trim_start_matches('/').to_ascii_lowercase())
        .ok_or(ActionParseError::Empty)?;
    // Group chats address commands as `/cmd@botname`.
    let verb = verb.split('@').next().unwrap_or_default().to_string();

    match verb.as_str() {
        "start" => Ok(PlayerAction::Start),
        "collect" => Ok(PlayerAction::CollectFood),
        "feed" => Ok(PlayerAction::FeedPet),
        "status" => Ok(PlayerAction::ViewStatus),
        "stats" => Ok(PlayerAction::ViewCombatStats),
        "shop" => Ok(PlayerAction::OpenShop),
        "buy" => {
            let item_id = parts
                .next()
                .ok_or(ActionParseError::MissingArgument("item"))?;
            Ok(PlayerAction::BuyItem {
                item_id: item_id.to_ascii_lowercase(),
            })
        }
        "fight" | "combat" => Ok(PlayerAction::QuickCombat),
        "miniboss" => Ok(PlayerAction::StartMiniboss),
        "advance" => Ok(PlayerAction::AdvanceMiniboss),
        "retreat" => Ok(PlayerAction::RetreatMiniboss),
        "retry" => Ok(PlayerAction::RetryMinibossViaAd),
        "daily" => Ok(PlayerAction::ClaimDaily),
        "portal" => Ok(PlayerAction::OpenPortal),
        "spin" => {
            let count = parse_u32(parts.next().unwrap_or("1"), "spin count")?;
            spin_action(count)
        }
        "premium" => Ok(PlayerAction::OpenPremiumShop),
        "buypremium" => {
            let item_id = parts
                .next()
                .ok_or(ActionParseError::MissingArgument("premium item"))?;
            let tx_ref = parts
                .next()
                .ok_or(ActionParseError::MissingArgument("transaction reference"))?;
            Ok(PlayerAction::BuyPremiumItem {
                item_id: item_id.to_ascii_lowercase(),
                tx_ref: tx_ref.to_string(),
            })
        }
        "fragments" => {
            let amount = parse_u32(parts.next().unwrap_or("1"), "fragment amount")?;
            Ok(PlayerAction::BuyFragments { amount })
        }
        "ad" => Ok(PlayerAction::WatchAd),
        "prestige" => Ok(PlayerAction::Prestige),
        "menu" | "help" => Ok(PlayerAction::MainMenu),
        other => Err(ActionParseError::UnknownCommand(other.to_string())),
    }
}

/// Parses keyboard callback data produced by [`PlayerAction::callback_data`].
pub fn parse_callback_data(data: &str) -> Result<PlayerAction, ActionParseError> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Err(ActionParseError::Empty);
    }
    let unknown = || ActionParseError::UnknownCallback(trimmed.to_string());

    let parts: Vec<&str> = trimmed.split(':').collect();
    match parts.as_slice() {
        ["start"] => Ok(PlayerAction::Start),
        ["collect"] => Ok(PlayerAction::CollectFood),
        ["feed"] => Ok(PlayerAction::FeedPet),
        ["status"] => Ok(PlayerAction::ViewStatus),
        ["combat_stats"] => Ok(PlayerAction::ViewCombatStats),
        ["shop"] => Ok(PlayerAction::OpenShop),
        ["buy", item] if !item.is_empty() => Ok(PlayerAction::BuyItem {
            item_id: item.to_string(),
        }),
        ["combat"] => Ok(PlayerAction::QuickCombat),
        ["miniboss"] => Ok(PlayerAction::StartMiniboss),
        ["miniboss", "advance"] => Ok(PlayerAction::AdvanceMiniboss),
        ["miniboss", "retreat"] => Ok(PlayerAction::RetreatMiniboss),
        ["miniboss", "retry"] => Ok(PlayerAction::RetryMinibossViaAd),
        ["daily"] => Ok(PlayerAction::ClaimDaily),
        ["portal"] => Ok(PlayerAction::OpenPortal),
        ["portal", "spin", count] => spin_action(parse_u32(count, "spin count")?),
        ["premium_shop"] => Ok(PlayerAction::OpenPremiumShop),
        ["premium", "pay", item] if !item.is_empty() => Ok(PlayerAction::ShowPayment {
            item_id: item.to_string(),
        }),
        ["fragments", amount] => Ok(PlayerAction::BuyFragments {
            amount: parse_u32(amount, "fragment amount")?,
        }),
        ["watch_ad"] => Ok(PlayerAction::WatchAd),
        ["prestige"] => Ok(PlayerAction::Prestige),
        ["menu"] => Ok(PlayerAction::MainMenu),
        _ => Err(unknown()),
    }
}

/// Parses one inbound protocol line: `<user_id> [#<message_id>] <payload>` or
/// `ad_viewed <ad_id>`.
pub fn parse_inbound_line(line: &str) -> Result<InboundLine, ActionParseError> {
    let trimmed = line.trim();
    let (head, rest) = trimmed
        .split_once(char::is_whitespace)
        .ok_or(ActionParseError::Empty)?;
    if head == "ad_viewed" {
        let ad_id = rest.trim();
        if ad_id.is_empty() {
            return Err(ActionParseError::MissingArgument("ad id"));
        }
        return Ok(InboundLine::AdViewed {
            ad_id: ad_id.to_string(),
        });
    }

    let user_id = PlayerId(parse_u64(head, "user id")?);
    let rest = rest.trim_start();
    let (message_id, payload) = match rest.strip_prefix('#') {
        Some(tagged) => {
            let (id, payload) = tagged
                .split_once(char::is_whitespace)
                .ok_or(ActionParseError::MissingArgument("payload"))?;
            (Some(MessageId(parse_i64(id, "message id")?)), payload.trim())
        }
        None => (None, rest),
    };
    if payload.is_empty() {
        return Err(ActionParseError::MissingArgument("payload"));
    }
    Ok(InboundLine::Player {
        user_id,
        message_id,
        payload: payload.to_string(),
    })
}

impl PlayerAction {
    /// Callback data understood by [`parse_callback_data`].
    pub fn callback_data(&self) -> String {
        match self {
            PlayerAction::Start => "start".to_string(),
            PlayerAction::CollectFood => "collect".to_string(),
            PlayerAction::FeedPet => "feed".to_string(),
            PlayerAction::ViewStatus => "status".to_string(),
            PlayerAction::ViewCombatStats => "combat_stats".to_string(),
            PlayerAction::OpenShop => "shop".to_string(),
            PlayerAction::BuyItem { item_id } => format!("buy:{item_id}"),
            PlayerAction::QuickCombat => "combat".to_string(),
            PlayerAction::StartMiniboss => "miniboss".to_string(),
            PlayerAction::AdvanceMiniboss => "miniboss:advance".to_string(),
            PlayerAction::RetreatMiniboss => "miniboss:retreat".to_string(),
            PlayerAction::RetryMinibossViaAd => "miniboss:retry".to_string(),
            PlayerAction::ClaimDaily => "daily".to_string(),
            PlayerAction::OpenPortal => "portal".to_string(),
            PlayerAction::SpinPortal(mode) => format!("portal:spin:{}", mode.spins()),
            PlayerAction::OpenPremiumShop => "premium_shop".to_string(),
            PlayerAction::ShowPayment { item_id } => format!("premium:pay:{item_id}"),
            // Purchases need a transaction reference typed by the player.
            PlayerAction::BuyPremiumItem { item_id, .. } => format!("premium:pay:{item_id}"),
            PlayerAction::BuyFragments { amount } => format!("fragments:{amount}"),
            PlayerAction::WatchAd => "watch_ad".to_string(),
            PlayerAction::Prestige => "prestige".to_string(),
            PlayerAction::MainMenu => "menu".to_string(),
        }
    }
}

fn spin_action(count: u32) -> Result<PlayerAction, ActionParseError> {
    SpinMode::from_count(count)
        .map(PlayerAction::SpinPortal)
        .ok_or(ActionParseError::InvalidSpinCount(count))
}

fn parse_u32(value: &str, context: &'static str) -> Result<u32, ActionParseError> {
    value
        .parse::<u32>()
        .map_err(|source| ActionParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_u64(value: &str, context: &'static str) -> Result<u64, ActionParseError> {
    value
        .parse::<u64>()
        .map_err(|source| ActionParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_i64(value: &str, context: &'static str) -> Result<i64, ActionParseError> {
    value
        .parse::<i64>()
        .map_err(|source| ActionParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}
