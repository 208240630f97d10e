use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;

use crate::code;
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::game::Game;
use crate::message::ServerMsg;
use crate::player::Player;
use crate::rate_limit::CreationLimiter;

/// Every live game on this server, by join code.
#[derive(Clone)]
pub struct GameRegistry {
    games: Arc<RwLock<HashMap<String, Arc<Game>>>>,
    limiter: Arc<dyn CreationLimiter>,
    config: GameConfig,
}

impl GameRegistry {
    pub fn new(config: GameConfig, limiter: impl CreationLimiter + 'static) -> Self {
        GameRegistry {
            games: Arc::new(RwLock::new(HashMap::new())),
            limiter: Arc::new(limiter),
            config,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Create a game with a fresh code, if `requester` has not been creating too many.
    pub fn create(&self, requester: &str) -> GameResult<Arc<Game>> {
        if let Err(e) = self.limiter.attempt(requester) {
            tracing::warn!(%requester, "game creation rate limited");
            return Err(e);
        }

        let mut games = self.games.write()?;
        let code = code::generate_code(|c| games.contains_key(c));
        let game = Game::new(code.clone(), self.config);
        games.insert(code.clone(), game.clone());
        tracing::info!(%code, total = games.len(), "game created");
        Ok(game)
    }

    pub fn find(&self, code: &str) -> GameResult<Arc<Game>> {
        let games = self.games.read()?;
        games
            .get(&code::normalize(code))
            .cloned()
            .ok_or_else(|| GameError::NotFound("Invalid game code, try again".to_string()))
    }

    pub async fn join(
        &self,
        code: &str,
        name: &str,
        outbound: mpsc::UnboundedSender<ServerMsg>,
    ) -> GameResult<Arc<Player>> {
        let game = self.find(code)?;
        game.join(name, outbound).await
    }

    pub fn remove(&self, code: &str) -> GameResult<()> {
        let mut games = self.games.write()?;
        games
            .remove(&code::normalize(code))
            .map(|_| ())
            .ok_or_else(|| GameError::NotFound("Invalid game code, try again".to_string()))
    }

    pub fn codes(&self) -> GameResult<Vec<String>> {
        Ok(self.games.read()?.keys().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.games.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep every game for unresponsive players, then drop games nobody is left in.
    /// Games younger than one reap interval are spared so their creator has time to join.
    pub async fn reap(&self) -> GameResult<usize> {
        let all: Vec<Arc<Game>> = self.games.read()?.values().cloned().collect();

        let mut sweeps = JoinSet::new();
        for game in all {
            sweeps.spawn(async move {
                if let Err(e) = game.clean_players().await {
                    tracing::error!(game = %game.code(), %e, "liveness sweep failed");
                }
            });
        }
        while sweeps.join_next().await.is_some() {}

        let grace = self.config.reap_interval();
        let mut games = self.games.write()?;
        let before = games.len();
        games.retain(|code, game| {
            let dead = game.is_dead() && game.age() >= grace;
            if dead {
                tracing::info!(%code, "removing abandoned game");
            }
            !dead
        });
        Ok(before - games.len())
    }

    /// Reap on a fixed interval for as long as the returned task lives.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let registry = self.clone();
        let every = self.config.reap_interval();
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + every, every);
            loop {
                ticker.tick().await;
                if let Err(e) = registry.reap().await {
                    tracing::error!(%e, "reaper failed");
                }
            }
        })
    }
}
