use game_schema::PlayerId;
use thiserror::Error;

use crate::storage::StoreError;

/// Which progression track a level gate checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTrack {
    Pet,
    Combat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyLimitKind {
    Battles,
    MinibossAttempts,
    Ads,
}

/// Every way a player action can be refused or fail.
///
/// Engine operations validate before they mutate, so receiving any of the
/// rejection variants means the player state is untouched.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("player {0} has not started the game")]
    NoSuchPlayer(PlayerId),
    #[error("{track:?} level {required} required, current level is {current}")]
    LevelRequirement {
        track: LevelTrack,
        required: u32,
        current: u32,
    },
    #[error("daily {kind:?} limit of {limit} reached")]
    DailyLimit { kind: DailyLimitKind, limit: u32 },
    #[error("needs {required} gold, has {available}")]
    InsufficientGold { required: u64, available: u64 },
    #[error("needs {required} fragments, has {available}")]
    InsufficientFragments { required: u64, available: u64 },
    #[error("needs {required} energy, has {available}")]
    InsufficientEnergy { required: u32, available: u32 },
    #[error("needs {required} food, has {available}")]
    InsufficientFood { required: u64, available: u64 },
    #[error("daily reward already claimed today")]
    AlreadyClaimed,
    #[error("unknown catalog item '{0}'")]
    ItemNotFound(String),
    #[error("payment {tx_ref} could not be verified")]
    PaymentNotVerified { tx_ref: String },
    #[error("pet is already at the maximum level {0}")]
    PetAtMaxLevel(u32),
    #[error("a miniboss run is already in progress")]
    RunInProgress,
    #[error("no miniboss run in progress")]
    NoActiveRun,
    #[error("no defeated miniboss run to retry")]
    NothingToRetry,
    #[error("ad view was not confirmed")]
    AdNotConfirmed,
    #[error("feature '{0}' is disabled")]
    FeatureDisabled(&'static str),
    #[error("transient failure in {collaborator}: {message}")]
    TransientIo {
        collaborator: &'static str,
        message: String,
    },
}

impl GameError {
    pub fn transient(collaborator: &'static str, err: impl std::fmt::Display) -> Self {
        GameError::TransientIo {
            collaborator,
            message: err.to_string(),
        }
    }

    /// Rejections are expected game outcomes; everything else is a failure.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, GameError::TransientIo { .. })
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        GameError::transient("storage", err)
    }
}

pub type GameResult<T> = Result<T, GameError>;
