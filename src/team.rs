use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::game::Game;
use crate::message::ServerMsg;
use crate::player::Player;
use crate::snapshot::{GameSnapshot, PlayerSnapshot, TeamSnapshot};

/// An ordered group of players. Order decides who gives clues next.
#[derive(Debug)]
pub struct Team {
    name: String,
    color: String,
    players: Vec<Arc<Player>>,
}

impl Team {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Team {
        Team {
            name: name.into(),
            color: color.into(),
            players: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> &[Arc<Player>] {
        &self.players
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Player>> {
        self.players.get(index)
    }

    pub fn player(&self, name: &str) -> Option<&Arc<Player>> {
        self.players.iter().find(|p| p.name() == name)
    }

    pub fn contains(&self, player: &Player) -> bool {
        self.players.iter().any(|p| std::ptr::eq(p.as_ref(), player))
    }

    pub fn add_new_player(
        &mut self,
        name: &str,
        game: Weak<Game>,
        outbound: mpsc::UnboundedSender<ServerMsg>,
        ping_timeout: Duration,
    ) -> Arc<Player> {
        let player = Player::new(name, game, outbound, ping_timeout);
        self.players.push(player.clone());
        player
    }

    pub fn add_existing_player(&mut self, player: Arc<Player>) {
        self.players.push(player);
    }

    /// Returns whether a player with that name was on the team.
    pub fn remove_player(&mut self, name: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.name() != name);
        self.players.len() != before
    }

    /// Drop exactly these players, leaving anyone who has since rejoined under the same name.
    pub fn remove_players(&mut self, gone: &[Arc<Player>]) -> Vec<Arc<Player>> {
        let (removed, kept) = std::mem::take(&mut self.players)
            .into_iter()
            .partition(|p| gone.iter().any(|g| Arc::ptr_eq(g, p)));
        self.players = kept;
        removed
    }

    pub fn send(&self, msg: &ServerMsg) {
        for p in &self.players {
            p.send(msg.clone());
        }
    }

    pub fn update_players(&self, snapshot: &GameSnapshot) {
        self.send(&ServerMsg::State(snapshot.clone()));
    }

    pub fn clear_names(&self) {
        for p in &self.players {
            p.clear_names();
        }
    }

    pub fn snapshot(&self) -> TeamSnapshot {
        TeamSnapshot {
            name: self.name.clone(),
            color: self.color.clone(),
            players: self
                .players
                .iter()
                .map(|p| PlayerSnapshot {
                    name: p.name().to_string(),
                    name_count: p.name_count(),
                })
                .collect(),
        }
    }
}

/// Ping every player at once and return the ones that did not answer in time.
///
/// Must not be called while holding a game lock: each ping waits up to the player's timeout.
pub async fn unresponsive(roster: Vec<Arc<Player>>) -> Vec<Arc<Player>> {
    let mut pings = JoinSet::new();
    for player in roster {
        pings.spawn(async move {
            let alive = player.ping().await;
            (player, alive)
        });
    }

    let mut gone = Vec::new();
    while let Some(result) = pings.join_next().await {
        match result {
            Ok((player, false)) => gone.push(player),
            Ok(_) => {}
            Err(e) => tracing::error!(%e, "liveness probe task failed"),
        }
    }
    gone
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(team: &mut Team, name: &str) -> (Arc<Player>, mpsc::UnboundedReceiver<ServerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let p = team.add_new_player(name, Weak::new(), tx, Duration::from_millis(100));
        (p, rx)
    }

    #[tokio::test]
    async fn test_remove_players_matches_identity_not_name() {
        let mut team = Team::new("Team 1", "red");
        let (ann, _a) = member(&mut team, "ann");
        let (_bob, _b) = member(&mut team, "bob");

        let (tx, _rx) = mpsc::unbounded_channel();
        let impostor = Player::new("ann", Weak::new(), tx, Duration::from_millis(100));
        assert!(team.remove_players(&[impostor]).is_empty());

        let removed = team.remove_players(&[ann.clone()]);
        assert_eq!(removed.len(), 1);
        assert!(!team.contains(&ann));
        assert_eq!(team.snapshot().players[0].name, "bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_collects_silent_players() {
        let mut team = Team::new("Team 2", "blue");
        let (ann, mut ann_rx) = member(&mut team, "ann");
        let (_bob, _bob_rx) = member(&mut team, "bob");

        let responder = ann.clone();
        tokio::spawn(async move {
            while let Some(msg) = ann_rx.recv().await {
                if msg == ServerMsg::Ping {
                    responder.pong();
                }
            }
        });

        let gone = unresponsive(team.players().to_vec()).await;
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].name(), "bob");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member() {
        let mut team = Team::new("Team 1", "red");
        let (_ann, mut a) = member(&mut team, "ann");
        let (_bob, mut b) = member(&mut team, "bob");
        team.send(&ServerMsg::StartCheck);
        assert_eq!(a.recv().await, Some(ServerMsg::StartCheck));
        assert_eq!(b.recv().await, Some(ServerMsg::StartCheck));
    }
}
