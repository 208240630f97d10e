use std::sync::PoisonError;
use std::time::Duration;

use thiserror::Error;

/// What a player sees when something unexpected goes wrong on the server.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred, please start a new game";

/// Errors returned by game and registry operations.
///
/// `Failure`, `NotFound` and `RateLimited` are expected outcomes of bad input and are relayed
/// verbatim to the player who caused them. `Internal` is logged and replaced with
/// [`INTERNAL_ERROR_MESSAGE`] before it reaches anyone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("{0}")]
    Failure(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Too many new games have been started, please wait {} seconds and try again", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },
    #[error("internal error: {0}")]
    Internal(String),
}

pub type GameResult<T> = Result<T, GameError>;

impl GameError {
    pub fn failure(message: impl Into<String>) -> Self {
        GameError::Failure(message.into())
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, GameError::Internal(_))
    }

    /// The message delivered to the offending player.
    pub fn user_message(&self) -> String {
        match self {
            GameError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl<T> From<PoisonError<T>> for GameError {
    fn from(e: PoisonError<T>) -> Self {
        GameError::Internal(format!("poisoned lock: {e}"))
    }
}
