use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::GameConfig;
use crate::game::{Game, Stage};
use crate::message::{ServerMsg, Sound};
use crate::player::Player;
use crate::snapshot::GameSnapshot;

pub fn test_config() -> GameConfig {
    GameConfig {
        default_names_per_player: 1,
        ping_timeout_ms: 200,
        ..GameConfig::default()
    }
}

/// A fake connection that records everything it is sent and answers pings until told not to.
pub struct TestClient {
    pub player: Arc<Player>,
    log: Arc<Mutex<Vec<ServerMsg>>>,
    answering: Arc<AtomicBool>,
}

impl TestClient {
    pub async fn join(game: &Arc<Game>, name: &str) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = game.join(name, tx).await.expect("join should succeed");
        TestClient::listen(player, rx)
    }

    pub fn listen(player: Arc<Player>, mut rx: mpsc::UnboundedReceiver<ServerMsg>) -> TestClient {
        let log = Arc::new(Mutex::new(Vec::new()));
        let answering = Arc::new(AtomicBool::new(true));

        let (weak, task_log, task_answering) = (Arc::downgrade(&player), log.clone(), answering.clone());
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if msg == ServerMsg::Ping && task_answering.load(Ordering::SeqCst) {
                    if let Some(p) = weak.upgrade() {
                        p.receive(r#"{"type":"pong"}"#);
                    }
                }
                task_log.lock().unwrap().push(msg);
            }
        });

        TestClient { player, log, answering }
    }

    pub fn name(&self) -> &str {
        self.player.name()
    }

    /// Stop answering pings, as if the browser tab was closed without a goodbye.
    pub fn go_silent(&self) {
        self.answering.store(false, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<ServerMsg> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    pub fn received(&self, msg: &ServerMsg) -> bool {
        self.messages().contains(msg)
    }

    pub fn heard(&self, sound: Sound) -> bool {
        self.received(&ServerMsg::PlaySound(sound))
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                ServerMsg::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn last_state(&self) -> Option<GameSnapshot> {
        self.messages().into_iter().rev().find_map(|m| match m {
            ServerMsg::State(s) => Some(s),
            _ => None,
        })
    }
}

pub fn client<'a>(clients: &'a [TestClient], name: &str) -> &'a TestClient {
    clients.iter().find(|c| c.name() == name).expect("no such client")
}

/// Let spawned work run, advancing the paused clock a little.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Poll the game until `done` holds, letting virtual time pass in between.
pub async fn wait_for(game: &Arc<Game>, done: impl Fn(&GameSnapshot) -> bool) -> GameSnapshot {
    for _ in 0..4000 {
        let snapshot = game.snapshot().unwrap();
        if done(&snapshot) {
            settle().await;
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("game never reached the expected state: {:?}", game.snapshot());
}

pub async fn wait_for_stage(game: &Arc<Game>, stage: Stage) -> GameSnapshot {
    wait_for(game, |s| s.stage == stage).await
}

/// A pregame lobby with players joined in order, so they alternate teams starting with team 1.
pub async fn lobby(names: &[&str]) -> (Arc<Game>, Vec<TestClient>) {
    let game = Game::new("ABCD", test_config());
    let mut clients = Vec::new();
    for name in names {
        clients.push(TestClient::join(&game, name).await);
    }
    (game, clients)
}

/// Start the game, have everyone submit their names and wait for the first clue giver.
pub async fn start_playing(game: &Arc<Game>, clients: &[TestClient]) -> GameSnapshot {
    let names_each = game.snapshot().unwrap().names_per_player;
    game.start_game(&clients[0].player).await.unwrap();
    assert_eq!(game.snapshot().unwrap().stage, Stage::Setup);

    for c in clients {
        for i in 0..names_each {
            game.add_name(&c.player, &format!("{} pick {i}", c.name())).await.unwrap();
        }
    }
    wait_for(game, |s| s.stage == Stage::Playing && s.clue_giver.is_some()).await
}

pub fn clue_giver<'a>(game: &Arc<Game>, clients: &'a [TestClient]) -> &'a TestClient {
    let name = game.snapshot().unwrap().clue_giver.expect("no clue giver");
    client(clients, &name)
}

/// The current clue giver gets every remaining name of the round.
pub async fn sweep_round(game: &Arc<Game>, clients: &[TestClient]) {
    let snapshot = game.snapshot().unwrap();
    let total: usize = snapshot
        .team1
        .players
        .iter()
        .chain(&snapshot.team2.players)
        .map(|p| p.name_count)
        .sum();
    let giver = clue_giver(game, clients);
    game.start_turn(&giver.player).await.unwrap();
    for _ in 0..total {
        game.next_name(&giver.player).await.unwrap();
    }
}
