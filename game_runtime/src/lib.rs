//! Shared runtime vocabulary for Tide Pet.
//!
//! Re-exports the persisted contracts from `game_schema` and adds the
//! request/response types the server and the console client both speak:
//! player actions, inbound updates, their text encodings and outbound frames.

pub use game_schema::*;

mod action_text;
mod actions;
mod frames;

pub use action_text::{parse_callback_data, parse_command_line, parse_inbound_line, ActionParseError};
pub use actions::{ChatId, InboundLine, MessageId, PlayerAction, SpinMode, Update, UpdateKind};
pub use frames::{Button, Keyboard, OutboundFrame};
