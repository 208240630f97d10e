//! Server side engine for a live, team based name guessing party game.
//!
//! Players join a [`Game`] by its four letter code and are balanced across two teams. During
//! setup everyone puts names in the hat. Each of three rounds then walks through the whole hat:
//! clue givers take turns, alternating teams, to get their team to guess as many names as they
//! can before their [`RoundTimer`] runs out. When a turn expires the other team gets one chance
//! to steal the name on screen.
//!
//! A [`GameRegistry`] hosts every game on a server. Each player is reached through an unbounded
//! channel of [`ServerMsg`] frames and talks back with [`ClientMsg`] frames passed to
//! [`Player::receive`].
//!
//! ## Example usage
//! ```
//! use threenames::{GameConfig, GameRegistry, Unlimited};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> threenames::GameResult<()> {
//! let registry = GameRegistry::new(GameConfig::default(), Unlimited);
//! let game = registry.create("127.0.0.1")?;
//!
//! let (tx, _rx) = mpsc::unbounded_channel();
//! let ann = registry.join(game.code(), "ann", tx).await?;
//! assert!(ann.is_leader());
//! # Ok(())
//! # }
//! ```

pub mod code;
pub mod config;
pub mod error;
pub mod game;
pub mod message;
pub mod player;
pub mod rate_limit;
pub mod registry;
pub mod snapshot;
pub mod stats;
pub mod team;
pub mod timer;
pub mod validation;

#[cfg(test)]
mod tests;

pub use config::GameConfig;
pub use error::{GameError, GameResult, INTERNAL_ERROR_MESSAGE};
pub use game::{Game, Stage};
pub use message::{ClientMsg, JoinRequest, ServerMsg, Sound};
pub use player::{Outbound, Player};
pub use rate_limit::{CreationLimiter, RateDelay, Unlimited};
pub use registry::GameRegistry;
pub use snapshot::GameSnapshot;
pub use stats::Side;
pub use team::Team;
pub use timer::RoundTimer;
