use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::time;

use crate::error::{GameError, GameResult};
use crate::game::Game;
use crate::message::{ClientMsg, ServerMsg};

/// Receiving half of a player's outbound queue, drained by the connection writer.
pub type Outbound = mpsc::UnboundedReceiver<ServerMsg>;

/// A participant in one game, and the channel used to reach them.
///
/// Inbound frames are handled one at a time, in arrival order, on a task owned by the player.
/// Pongs bypass that queue so a liveness probe can be answered while an earlier action is still
/// waiting on one.
#[derive(Debug)]
pub struct Player {
    name: String,
    game: Weak<Game>,
    names: Mutex<Vec<String>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<ServerMsg>>>,
    inbox: mpsc::UnboundedSender<ClientMsg>,
    pong: Notify,
    ping_timeout: Duration,
}

impl Player {
    pub(crate) fn new(
        name: &str,
        game: Weak<Game>,
        outbound: mpsc::UnboundedSender<ServerMsg>,
        ping_timeout: Duration,
    ) -> Arc<Player> {
        let (inbox, mut inbox_rx) = mpsc::unbounded_channel();
        let player = Arc::new(Player {
            name: name.to_string(),
            game,
            names: Mutex::new(Vec::new()),
            outbound: Mutex::new(Some(outbound)),
            inbox,
            pong: Notify::new(),
            ping_timeout,
        });

        let weak = Arc::downgrade(&player);
        tokio::spawn(async move {
            while let Some(msg) = inbox_rx.recv().await {
                let Some(player) = weak.upgrade() else {
                    break;
                };
                player.dispatch(msg).await;
            }
        });

        player
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The game this player belongs to, while it is still hosted.
    pub fn current_game(&self) -> Option<Arc<Game>> {
        self.game.upgrade()
    }

    fn game(&self) -> GameResult<Arc<Game>> {
        self.game
            .upgrade()
            .ok_or_else(|| GameError::Internal(format!("game for player {} is gone", self.name)))
    }

    fn names_guard(&self) -> MutexGuard<'_, Vec<String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbound_guard(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<ServerMsg>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The names this player has put in the hat.
    pub fn names(&self) -> Vec<String> {
        self.names_guard().clone()
    }

    pub fn name_count(&self) -> usize {
        self.names_guard().len()
    }

    pub(crate) fn push_name(&self, name: &str, limit: usize) -> GameResult<()> {
        let mut names = self.names_guard();
        if names.len() >= limit {
            return Err(GameError::failure(format!(
                "You have already submitted {limit} names"
            )));
        }
        if names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return Err(GameError::failure(format!("You have already submitted {name}")));
        }
        names.push(name.to_string());
        Ok(())
    }

    pub(crate) fn pull_name(&self, name: &str) {
        self.names_guard().retain(|n| n != name);
    }

    pub(crate) fn clear_names(&self) {
        self.names_guard().clear();
    }

    /// Queue a message for this player. Returns false once the connection is gone.
    pub fn send(&self, msg: ServerMsg) -> bool {
        let mut outbound = self.outbound_guard();
        let delivered = outbound.as_ref().is_some_and(|tx| tx.send(msg).is_ok());
        if !delivered {
            *outbound = None;
        }
        delivered
    }

    pub fn is_connected(&self) -> bool {
        self.outbound_guard().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Point this player at a new connection.
    pub(crate) fn attach(&self, outbound: mpsc::UnboundedSender<ServerMsg>) {
        *self.outbound_guard() = Some(outbound);
    }

    /// Whether messages to this player currently go down `outbound`.
    pub fn is_attached_to(&self, outbound: &mpsc::UnboundedSender<ServerMsg>) -> bool {
        self.outbound_guard().as_ref().is_some_and(|tx| tx.same_channel(outbound))
    }

    pub fn disconnect(&self) {
        *self.outbound_guard() = None;
    }

    /// Ask the client to prove it is still there. Waits at most the configured ping timeout.
    pub async fn ping(&self) -> bool {
        let notified = self.pong.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.send(ServerMsg::Ping) {
            return false;
        }
        time::timeout(self.ping_timeout, notified).await.is_ok()
    }

    pub fn pong(&self) {
        self.pong.notify_waiters();
    }

    pub fn is_leader(&self) -> bool {
        self.game()
            .map(|g| g.is_leader(self))
            .unwrap_or(false)
    }

    pub async fn add_name(self: &Arc<Self>, name: &str) -> GameResult<()> {
        self.game()?.add_name(self, name).await
    }

    pub async fn remove_name(self: &Arc<Self>, name: &str) -> GameResult<()> {
        self.game()?.remove_name(self, name).await
    }

    /// Accept one raw frame from the connection.
    pub fn receive(&self, text: &str) {
        match ClientMsg::parse(text) {
            Ok(ClientMsg::Pong) => self.pong(),
            Ok(msg) => {
                if self.inbox.send(msg).is_err() {
                    tracing::warn!(player = %self.name, "inbox closed, dropping message");
                }
            }
            Err(e) => {
                self.send(ServerMsg::Error(e.user_message()));
            }
        }
    }

    /// Run one action, reporting any failure back to this player only.
    pub async fn dispatch(self: &Arc<Self>, msg: ClientMsg) {
        if let Err(err) = self.handle(msg).await {
            if err.is_internal() {
                tracing::error!(player = %self.name, %err, "failed to handle player message");
            }
            self.send(ServerMsg::Error(err.user_message()));
        }
    }

    async fn handle(self: &Arc<Self>, msg: ClientMsg) -> GameResult<()> {
        let game = self.game()?;
        match msg {
            ClientMsg::Join(_) => Err(GameError::failure("You have already joined this game")),
            ClientMsg::Pong => {
                self.pong();
                Ok(())
            }
            ClientMsg::NamesPerPlayer(n) => game.set_names_per_player(self, n).await,
            ClientMsg::Start => game.start_game(self).await,
            ClientMsg::SwitchTeams => game.switch_teams(self).await,
            ClientMsg::AddName(name) => game.add_name(self, &name).await,
            ClientMsg::RemoveName(name) => game.remove_name(self, &name).await,
            ClientMsg::StartTurn => game.start_turn(self).await,
            ClientMsg::NextName => game.next_name(self).await,
            ClientMsg::StealYes => game.steal_confirm(self, true).await,
            ClientMsg::StealNo => game.steal_confirm(self, false).await,
            ClientMsg::Reset => game.reset(self).await,
            ClientMsg::RequestUpdate => game.send_state(self),
        }
    }
}
