//! Game core for the Tide Pet chat game.
//!
//! Holds the economy formulas, the progression/combat/gacha/daily/shop
//! engines that mutate a [`PlayerState`], the collaborator traits the game
//! talks to (storage, chat transport, ads, payments, scheduling) and the
//! [`GameController`] that ties one player action to one locked
//! read-modify-write of that player.

pub mod ads;
pub mod calendar;
pub mod combat;
pub mod config;
pub mod controller;
pub mod daily;
pub mod economy;
mod error;
pub mod locks;
pub mod metrics;
pub mod miniboss;
pub mod network;
pub mod payment;
pub mod portal;
pub mod progression;
pub mod render;
pub mod scheduler;
pub mod shop;
pub mod storage;
pub mod sweeps;
pub mod transport;

pub use game_runtime::*;

pub use ads::{AdError, AdHandle, AdNetwork, LinkAdNetwork};
pub use calendar::{Clock, GameCalendar, ManualClock, SystemClock};
pub use config::{load_game_config_from_env, FeatureFlags, GameConfig, GameConfigError};
pub use controller::{ActionReply, Collaborators, GameController};
pub use error::{DailyLimitKind, GameError, GameResult, LevelTrack};
pub use metrics::{GameMetrics, MetricsSnapshot};
pub use network::{ChatServer, ServerEvent};
pub use payment::{LedgerPaymentVerifier, PaymentError, PaymentVerifier, RejectAllPayments};
pub use portal::{PortalReward, Rarity};
pub use scheduler::{Scheduler, ThreadScheduler};
pub use storage::{JsonFileStore, MemoryStore, PlayerStore, StoreError};
pub use sweeps::{register_sweeps, SweepReport};
pub use transport::{ChatTransport, RecordingTransport, TransportError};
