//! The authoritative state machine for one session.
//!
//! Every mutation takes the game's write lock, changes state, queues whatever messages it wants
//! to send in an [`Outbox`], releases the lock and only then delivers the messages and a fresh
//! snapshot. Liveness probes and anything else that waits are done with no lock held.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::message::{ServerMsg, Sound};
use crate::player::Player;
use crate::snapshot::{GameSnapshot, TimerSnapshot};
use crate::stats::{Side, Stats};
use crate::team::{self, Team};
use crate::timer::RoundTimer;
use crate::validation;

pub const MIN_NAMES_PER_PLAYER: u32 = 1;
pub const MAX_NAMES_PER_PLAYER: u32 = 20;
pub const MIN_TEAM_SIZE: usize = 2;
pub const FINAL_ROUND: u8 = 3;

const NOT_ENOUGH_PLAYERS: &str = "Not enough players to continue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Players join and pick teams.
    Pregame,
    /// Players put names in the hat.
    Setup,
    Playing,
    Stealing,
    RoundChange,
    End,
}

#[derive(Debug, Clone)]
struct QueuedName {
    name: String,
    submitter: String,
}

/// Whose turn is next. Indexes are `None` until a team has given its first clue.
#[derive(Debug, Clone, Copy, Default)]
struct ClueGiverTrack {
    team1: bool,
    team1_index: Option<usize>,
    team2_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPhase {
    Setup,
    Turn,
    Steal,
    RoundChange(u8),
}

#[derive(Debug, Default)]
struct TimerState {
    seconds: u32,
    left: u32,
    duration_left: Duration,
    handle: Option<RoundTimer>,
    // Bumped whenever a countdown starts or stops so late callbacks can tell they are stale.
    generation: u64,
}

impl TimerState {
    fn running(&self) -> bool {
        self.handle.as_ref().is_some_and(RoundTimer::is_active)
    }

    fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.cancel();
        }
        self.generation += 1;
        self.left = 0;
        self.duration_left = Duration::ZERO;
    }

    /// Tick every second in the last half of the countdown and every poll in the last quarter.
    fn tick_due(&self) -> bool {
        if self.seconds == 0 {
            return false;
        }
        let ratio = f64::from(self.left) / f64::from(self.seconds);
        if ratio <= 0.25 {
            return true;
        }
        ratio <= 0.5 && self.duration_left.as_secs_f64().round() as u32 == self.left
    }
}

enum Followup {
    ChangeRound(u8),
    EndGame,
}

/// Messages and work queued while the write lock is held.
#[derive(Default)]
struct Outbox {
    messages: Vec<(Arc<Player>, ServerMsg)>,
    then: Vec<Followup>,
}

impl Outbox {
    fn player(&mut self, player: &Arc<Player>, msg: ServerMsg) {
        self.messages.push((player.clone(), msg));
    }

    fn team(&mut self, team: &Team, msg: ServerMsg) {
        for p in team.players() {
            self.player(p, msg.clone());
        }
    }
}

struct GameState {
    names_per_player: u32,
    team1: Team,
    team2: Team,
    leader: Option<Arc<Player>>,
    stage: Stage,
    round: u8,
    timer: TimerState,
    clue_giver: Option<Arc<Player>>,
    name_queue: VecDeque<QueuedName>,
    track: ClueGiverTrack,
    can_steal: bool,
    stats: Stats,
    name_started: Option<Instant>,
}

fn same(a: &Option<Arc<Player>>, b: &Player) -> bool {
    a.as_ref().is_some_and(|p| std::ptr::eq(p.as_ref(), b))
}

impl GameState {
    fn new(names_per_player: u32) -> GameState {
        GameState {
            names_per_player,
            team1: Team::new("Team 1", "red"),
            team2: Team::new("Team 2", "blue"),
            leader: None,
            stage: Stage::Pregame,
            round: 0,
            timer: TimerState::default(),
            clue_giver: None,
            name_queue: VecDeque::new(),
            track: ClueGiverTrack::default(),
            can_steal: false,
            stats: Stats::default(),
            name_started: None,
        }
    }

    fn team(&self, side: Side) -> &Team {
        match side {
            Side::Team1 => &self.team1,
            Side::Team2 => &self.team2,
        }
    }

    fn team_mut(&mut self, side: Side) -> &mut Team {
        match side {
            Side::Team1 => &mut self.team1,
            Side::Team2 => &mut self.team2,
        }
    }

    /// The side currently giving clues.
    fn guessing_side(&self) -> Side {
        if self.track.team1 { Side::Team1 } else { Side::Team2 }
    }

    fn find_player(&self, name: &str) -> Option<&Arc<Player>> {
        self.team1.player(name).or_else(|| self.team2.player(name))
    }

    fn is_member(&self, player: &Player) -> bool {
        self.team1.contains(player) || self.team2.contains(player)
    }

    fn is_leader(&self, player: &Player) -> bool {
        same(&self.leader, player)
    }

    fn is_clue_giver(&self, player: &Player) -> bool {
        same(&self.clue_giver, player)
    }

    fn roster(&self) -> Vec<Arc<Player>> {
        self.team1.players().iter().chain(self.team2.players()).cloned().collect()
    }

    fn everyone(&self, out: &mut Outbox, msg: ServerMsg) {
        out.team(&self.team1, msg.clone());
        out.team(&self.team2, msg);
    }

    fn short_handed(&self) -> bool {
        self.team1.len() < MIN_TEAM_SIZE || self.team2.len() < MIN_TEAM_SIZE
    }

    fn all_names_in(&self) -> bool {
        let quota = self.names_per_player as usize;
        self.roster().iter().all(|p| p.name_count() >= quota)
    }

    fn any_names_in(&self) -> bool {
        self.roster().iter().any(|p| p.name_count() > 0)
    }

    /// Who hears the clock for a phase.
    fn audience(&self, phase: TimerPhase) -> Vec<&Team> {
        match phase {
            TimerPhase::Setup => vec![&self.team1, &self.team2],
            TimerPhase::Turn => vec![self.team(self.guessing_side())],
            TimerPhase::Steal => vec![self.team(self.guessing_side().other())],
            TimerPhase::RoundChange(_) => Vec::new(),
        }
    }

    fn snapshot(&self, code: &str) -> GameSnapshot {
        GameSnapshot {
            code: code.to_string(),
            names_per_player: self.names_per_player,
            team1: self.team1.snapshot(),
            team2: self.team2.snapshot(),
            leader: self.leader.as_ref().map(|p| p.name().to_string()),
            stage: self.stage,
            round: self.round,
            timer: TimerSnapshot {
                seconds: self.timer.seconds,
                left: self.timer.left,
            },
            clue_giver: self.clue_giver.as_ref().map(|p| p.name().to_string()),
            stats: self.stats.snapshot(),
        }
    }

    /// Back to the lobby, keeping everyone on their teams.
    fn reset(&mut self, reason: &str, out: &mut Outbox) {
        self.timer.stop();
        self.stage = Stage::Pregame;
        self.round = 0;
        self.clue_giver = None;
        self.track = ClueGiverTrack::default();
        self.name_queue.clear();
        self.team1.clear_names();
        self.team2.clear_names();
        self.can_steal = false;
        self.stats = Stats::default();
        self.name_started = None;

        if !reason.is_empty() {
            self.everyone(out, ServerMsg::Notification(reason.to_string()));
        }
    }

    fn load_names(&mut self) {
        self.name_queue = self
            .roster()
            .iter()
            .flat_map(|p| {
                let submitter = p.name().to_string();
                p.names().into_iter().map(move |name| QueuedName {
                    name,
                    submitter: submitter.clone(),
                })
            })
            .collect();
        self.shuffle_names();
    }

    fn shuffle_names(&mut self) {
        self.name_queue.make_contiguous().shuffle(&mut rand::thread_rng());
    }

    fn start_round(&mut self, round: u8, out: &mut Outbox) {
        self.stage = Stage::Playing;
        self.round = round;
        self.can_steal = false;
        if round == 1 {
            self.track = ClueGiverTrack::default();
        }
        self.load_names();
        tracing::debug!(round, names = self.name_queue.len(), "round started");
        self.advance_turn(out);
    }

    /// Hand the clues to the next player, alternating teams and rotating within each.
    fn advance_turn(&mut self, out: &mut Outbox) {
        self.timer.stop();
        self.stage = Stage::Playing;
        self.can_steal = false;
        self.name_started = None;
        self.shuffle_names();

        self.track.team1 = !self.track.team1;
        let side = self.guessing_side();
        let len = self.team(side).len();
        let cursor = match side {
            Side::Team1 => &mut self.track.team1_index,
            Side::Team2 => &mut self.track.team2_index,
        };
        let next = cursor.map_or(0, |i| i + 1);
        let next = if next >= len { 0 } else { next };
        *cursor = Some(next);

        self.clue_giver = self.team(side).get(next).cloned();
        if let Some(clue_giver) = &self.clue_giver {
            out.player(clue_giver, ServerMsg::PlaySound(Sound::Notify));
            out.player(clue_giver, ServerMsg::StartCheck);
        }
    }

    /// Pop the current name and credit `side`, then move on.
    fn score_name(&mut self, side: Side, stolen: bool, out: &mut Outbox) {
        let Some(guessed) = self.name_queue.pop_front() else {
            return;
        };
        let took = self.name_started.map(|t| t.elapsed()).unwrap_or_default();
        if let Some(clue_giver) = &self.clue_giver {
            self.stats.record_guess(clue_giver.name(), &guessed.name, &guessed.submitter, took, stolen);
        }
        self.stats.credit(side);
        out.team(self.team(side), ServerMsg::PlaySound(Sound::Score));

        if self.name_queue.is_empty() {
            self.timer.stop();
            self.clue_giver = None;
            self.name_started = None;
            out.then.push(if self.round >= FINAL_ROUND {
                Followup::EndGame
            } else {
                Followup::ChangeRound(self.round + 1)
            });
            return;
        }

        if stolen {
            self.advance_turn(out);
        } else {
            self.show_current_name(out);
        }
    }

    fn show_current_name(&mut self, out: &mut Outbox) {
        let (Some(clue_giver), Some(head)) = (&self.clue_giver, self.name_queue.front()) else {
            return;
        };
        self.name_started = Some(Instant::now());
        out.player(clue_giver, ServerMsg::Name(head.name.clone()));
    }

    /// Forget about players who left, and keep the game playable without them.
    fn after_departure(&mut self, gone: &[Arc<Player>], out: &mut Outbox) {
        if gone.is_empty() {
            return;
        }
        for p in gone {
            p.disconnect();
            tracing::debug!(player = %p.name(), "player removed");
        }

        if gone.iter().any(|p| self.is_leader(p)) {
            self.leader = self.team1.get(0).or_else(|| self.team2.get(0)).cloned();
        }

        if self.short_handed() {
            if self.stage != Stage::Pregame {
                self.reset(NOT_ENOUGH_PLAYERS, out);
            }
            return;
        }

        let lost_clue_giver = gone.iter().any(|p| self.is_clue_giver(p));
        if lost_clue_giver && matches!(self.stage, Stage::Playing | Stage::Stealing) {
            self.advance_turn(out);
        }
    }
}

/// A live session, shared by every connection and timer that touches it.
pub struct Game {
    code: String,
    config: GameConfig,
    created_at: Instant,
    state: RwLock<GameState>,
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game").field("code", &self.code).finish_non_exhaustive()
    }
}

impl Game {
    pub fn new(code: impl Into<String>, config: GameConfig) -> Arc<Game> {
        Arc::new(Game {
            code: code.into(),
            config,
            created_at: Instant::now(),
            state: RwLock::new(GameState::new(config.default_names_per_player)),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    fn read(&self) -> GameResult<RwLockReadGuard<'_, GameState>> {
        Ok(self.state.read()?)
    }

    fn write(&self) -> GameResult<RwLockWriteGuard<'_, GameState>> {
        Ok(self.state.write()?)
    }

    pub fn snapshot(&self) -> GameResult<GameSnapshot> {
        Ok(self.read()?.snapshot(&self.code))
    }

    /// Send the current snapshot to every player.
    pub fn update_players(&self) {
        match self.read() {
            Ok(state) => {
                let snapshot = state.snapshot(&self.code);
                state.team1.update_players(&snapshot);
                state.team2.update_players(&snapshot);
            }
            Err(e) => tracing::error!(game = %self.code, %e, "could not snapshot game"),
        }
    }

    pub fn send_state(&self, player: &Player) -> GameResult<()> {
        let snapshot = self.snapshot()?;
        player.send(ServerMsg::State(snapshot));
        Ok(())
    }

    pub fn is_leader(&self, player: &Player) -> bool {
        self.read().map(|s| s.is_leader(player)).unwrap_or(false)
    }

    /// Both teams are empty.
    pub fn is_dead(&self) -> bool {
        self.read()
            .map(|s| s.team1.is_empty() && s.team2.is_empty())
            .unwrap_or(true)
    }

    /// Apply `f` under the write lock, then deliver what it queued.
    fn mutate<T>(
        self: &Arc<Self>,
        f: impl FnOnce(&mut GameState, &mut Outbox) -> GameResult<T>,
    ) -> GameResult<T> {
        let mut out = Outbox::default();
        let result = {
            let mut state = self.write()?;
            f(&mut state, &mut out)
        };
        self.flush(out);
        result
    }

    fn flush(self: &Arc<Self>, out: Outbox) {
        for (player, msg) in out.messages {
            player.send(msg);
        }
        self.update_players();

        for next in out.then {
            let game = self.clone();
            tokio::spawn(async move {
                let result = match next {
                    Followup::ChangeRound(round) => game.change_round(round).await,
                    Followup::EndGame => game.end_game(),
                };
                if let Err(e) = result {
                    tracing::error!(game = %game.code, %e, "failed to advance game");
                }
            });
        }
    }

    fn start_timer(self: &Arc<Self>, state: &mut GameState, phase: TimerPhase, seconds: u32) {
        let timer = &mut state.timer;
        timer.generation += 1;
        timer.seconds = seconds;
        timer.left = seconds;
        timer.duration_left = Duration::from_secs(u64::from(seconds));

        let generation = timer.generation;
        let (tick, finish, timeout) = (Arc::downgrade(self), Arc::downgrade(self), Arc::downgrade(self));
        let handle = RoundTimer::new(timer.duration_left)
            .poll(self.config.timer_poll())
            .on_tick(move |elapsed| {
                if let Some(game) = tick.upgrade() {
                    game.on_timer_tick(generation, phase, elapsed);
                }
            })
            .on_timeout(move || {
                if let Some(game) = timeout.upgrade() {
                    game.on_timer_timeout(generation, phase);
                }
            })
            .on_finish(move || {
                if let Some(game) = finish.upgrade() {
                    // Finishing re-enters the game lock, so it runs on its own task.
                    tokio::spawn(async move {
                        if let Err(e) = game.on_timer_finish(generation, phase).await {
                            tracing::error!(game = %game.code, %e, "timer finish failed");
                        }
                    });
                }
            })
            .start();
        timer.handle = Some(handle);
    }

    fn on_timer_tick(self: &Arc<Self>, generation: u64, phase: TimerPhase, elapsed: Duration) {
        let result = self.mutate(|s, out| {
            if s.timer.generation != generation {
                return Ok(());
            }
            s.timer.duration_left = s.timer.duration_left.saturating_sub(elapsed);
            s.timer.left = s.timer.duration_left.as_secs() as u32;

            if s.timer.tick_due() {
                for team in s.audience(phase) {
                    out.team(team, ServerMsg::PlaySound(Sound::Tick));
                }
            }

            // Everyone is done early, no need to wait out the clock.
            if phase == TimerPhase::Setup && s.all_names_in() {
                if let Some(handle) = s.timer.handle.as_mut() {
                    handle.finish_early();
                }
            }
            Ok(())
        });
        if let Err(e) = result {
            tracing::error!(game = %self.code, %e, "timer tick failed");
        }
    }

    fn on_timer_timeout(self: &Arc<Self>, generation: u64, phase: TimerPhase) {
        let result = self.mutate(|s, out| {
            if s.timer.generation == generation {
                for team in s.audience(phase) {
                    out.team(team, ServerMsg::PlaySound(Sound::TimerAlarm));
                }
            }
            Ok(())
        });
        if let Err(e) = result {
            tracing::error!(game = %self.code, %e, "timer timeout failed");
        }
    }

    async fn on_timer_finish(self: &Arc<Self>, generation: u64, phase: TimerPhase) -> GameResult<()> {
        match phase {
            TimerPhase::Setup => {
                let begin = self.mutate(|s, _| {
                    if s.timer.generation != generation || s.stage != Stage::Setup {
                        return Ok(false);
                    }
                    if !s.any_names_in() {
                        tracing::debug!("nobody submitted names, back to pregame");
                        s.timer.stop();
                        s.stage = Stage::Pregame;
                        return Ok(false);
                    }
                    Ok(true)
                })?;
                if begin {
                    self.change_round(1).await?;
                }
                Ok(())
            }
            TimerPhase::Turn => {
                let steal = self.mutate(|s, out| {
                    if s.timer.generation != generation || s.stage != Stage::Playing {
                        return Ok(false);
                    }
                    if s.can_steal {
                        self.begin_steal(s, out);
                        return Ok(false);
                    }
                    Ok(true)
                })?;
                if steal {
                    self.pass_turn(generation, Stage::Playing).await?;
                }
                Ok(())
            }
            TimerPhase::Steal => self.pass_turn(generation, Stage::Stealing).await,
            TimerPhase::RoundChange(round) => {
                self.clean_players().await?;
                self.mutate(|s, out| {
                    if s.timer.generation == generation && s.stage == Stage::RoundChange {
                        s.start_round(round, out);
                    }
                    Ok(())
                })
            }
        }
    }

    fn begin_steal(self: &Arc<Self>, s: &mut GameState, out: &mut Outbox) {
        s.stage = Stage::Stealing;
        self.start_timer(s, TimerPhase::Steal, self.config.seconds_to_steal);
        if let Some(clue_giver) = &s.clue_giver {
            out.player(clue_giver, ServerMsg::StealCheck);
        }
    }

    /// Move on to the next clue giver if the game is still where the expired timer left it.
    async fn pass_turn(self: &Arc<Self>, generation: u64, from: Stage) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, out| {
            if s.timer.generation == generation && s.stage == from {
                s.advance_turn(out);
            }
            Ok(())
        })
    }

    async fn change_round(self: &Arc<Self>, round: u8) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, out| {
            if !matches!(s.stage, Stage::Setup | Stage::Playing | Stage::Stealing) {
                return Ok(());
            }
            s.timer.stop();
            s.stage = Stage::RoundChange;
            s.clue_giver = None;
            s.everyone(out, ServerMsg::PlaySound(Sound::RoundEnd));
            tracing::debug!(game = %self.code, round, "changing round");
            self.start_timer(s, TimerPhase::RoundChange(round), self.config.round_change_seconds);
            Ok(())
        })
    }

    fn end_game(self: &Arc<Self>) -> GameResult<()> {
        self.mutate(|s, out| {
            if !matches!(s.stage, Stage::Playing | Stage::Stealing) {
                return Ok(());
            }
            s.timer.stop();
            s.stage = Stage::End;
            s.clue_giver = None;
            s.stats.finish();
            if let Some(winner) = s.stats.winner {
                out.team(s.team(winner), ServerMsg::PlaySound(Sound::GameWin));
                out.team(s.team(winner.other()), ServerMsg::PlaySound(Sound::GameLose));
            }
            tracing::info!(
                game = %self.code,
                team1 = s.stats.team1_score,
                team2 = s.stats.team2_score,
                "game over"
            );
            Ok(())
        })
    }

    /// Ping everyone and drop whoever does not answer.
    pub async fn clean_players(self: &Arc<Self>) -> GameResult<()> {
        let roster = self.read()?.roster();
        let unresponsive = team::unresponsive(roster).await;
        if unresponsive.is_empty() {
            return Ok(());
        }
        self.mutate(|s, out| {
            let mut gone = s.team1.remove_players(&unresponsive);
            gone.extend(s.team2.remove_players(&unresponsive));
            s.after_departure(&gone, out);
            Ok(())
        })
    }

    /// Remove a player who left on purpose.
    pub fn remove_player(self: &Arc<Self>, name: &str) -> GameResult<bool> {
        self.mutate(|s, out| {
            let Some(player) = s.find_player(name).cloned() else {
                return Ok(false);
            };
            if !s.team1.remove_player(name) {
                s.team2.remove_player(name);
            }
            s.after_departure(&[player], out);
            Ok(true)
        })
    }

    /// Add a player, or reattach one whose old connection has stopped answering.
    pub async fn join(
        self: &Arc<Self>,
        name: &str,
        outbound: mpsc::UnboundedSender<ServerMsg>,
    ) -> GameResult<Arc<Player>> {
        let name = validation::validate_player_name(name).map_err(GameError::Failure)?;
        let taken = || {
            GameError::failure(format!(
                "A player with the name {name} is already connected, please choose a new name"
            ))
        };

        let existing = self.read()?.find_player(&name).cloned();
        if let Some(player) = existing {
            if player.ping().await {
                return Err(taken());
            }
            player.attach(outbound);
            tracing::info!(game = %self.code, player = %name, "player reconnected");
            self.update_players();
            return Ok(player);
        }

        self.mutate(|s, _| {
            if s.find_player(&name).is_some() {
                return Err(taken());
            }
            if s.stage != Stage::Pregame {
                return Err(GameError::failure("You cannot join a game in progress"));
            }
            let side = if s.team1.len() <= s.team2.len() { Side::Team1 } else { Side::Team2 };
            let player = s.team_mut(side).add_new_player(
                &name,
                Arc::downgrade(self),
                outbound,
                self.config.ping_timeout(),
            );
            if s.leader.is_none() {
                s.leader = Some(player.clone());
            }
            tracing::info!(game = %self.code, player = %name, team = side.number(), "player joined");
            Ok(player)
        })
    }

    pub async fn set_names_per_player(self: &Arc<Self>, who: &Arc<Player>, n: u32) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, _| {
            if s.stage != Stage::Pregame {
                return Err(GameError::failure(
                    "The number of names per player cannot be set after the game has started",
                ));
            }
            if !s.is_leader(who) {
                return Err(GameError::failure("Only game leaders can change the number of names"));
            }
            if n < MIN_NAMES_PER_PLAYER {
                return Err(GameError::failure("Number of names must be greater than 0"));
            }
            if n > MAX_NAMES_PER_PLAYER {
                return Err(GameError::failure(format!(
                    "The maximum number of names is {MAX_NAMES_PER_PLAYER}"
                )));
            }
            s.names_per_player = n;
            Ok(())
        })
    }

    /// Leader only. Stays in pregame without complaint until both teams have two live players.
    pub async fn start_game(self: &Arc<Self>, who: &Arc<Player>) -> GameResult<()> {
        {
            let s = self.read()?;
            if !s.is_leader(who) {
                let leader = s.leader.as_ref().map(|p| p.name().to_string()).unwrap_or_default();
                return Err(GameError::failure(format!("Only {leader} can start the game")));
            }
            if s.stage != Stage::Pregame {
                return Err(GameError::failure("The game has already started"));
            }
        }

        self.clean_players().await?;
        self.mutate(|s, _| {
            if s.stage != Stage::Pregame || s.short_handed() {
                return Ok(());
            }
            s.stage = Stage::Setup;
            let seconds = self.config.setup_seconds_per_name.saturating_mul(s.names_per_player);
            self.start_timer(s, TimerPhase::Setup, seconds);
            tracing::info!(game = %self.code, names_per_player = s.names_per_player, "setup started");
            Ok(())
        })
    }

    pub async fn switch_teams(self: &Arc<Self>, who: &Arc<Player>) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, _| {
            if s.stage != Stage::Pregame {
                return Err(GameError::failure("Teams cannot be changed once the game has started"));
            }
            if s.team1.remove_player(who.name()) {
                s.team2.add_existing_player(who.clone());
            } else if s.team2.remove_player(who.name()) {
                s.team1.add_existing_player(who.clone());
            } else {
                return Err(GameError::failure("You are no longer part of this game"));
            }
            Ok(())
        })
    }

    pub async fn add_name(self: &Arc<Self>, who: &Arc<Player>, name: &str) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, _| {
            if s.stage != Stage::Setup {
                return Err(GameError::failure("Names can only be added during setup"));
            }
            if !s.is_member(who) {
                return Err(GameError::failure("You are no longer part of this game"));
            }
            let name = validation::validate_hat_name(name).map_err(GameError::Failure)?;
            who.push_name(&name, s.names_per_player as usize)
        })
    }

    pub async fn remove_name(self: &Arc<Self>, who: &Arc<Player>, name: &str) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, _| {
            if s.stage != Stage::Setup {
                return Err(GameError::failure("Names can only be removed during setup"));
            }
            who.pull_name(name.trim());
            Ok(())
        })
    }

    /// The clue giver starts their clock. Ignored from anyone else or once the turn has begun,
    /// including the moment between the clock running out and the steal opening.
    pub async fn start_turn(self: &Arc<Self>, who: &Arc<Player>) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, out| {
            if s.stage != Stage::Playing || !s.is_clue_giver(who) || s.can_steal {
                return Ok(());
            }
            s.can_steal = true;
            self.start_timer(s, TimerPhase::Turn, self.config.seconds_per_turn);
            s.show_current_name(out);
            Ok(())
        })
    }

    /// The clue giver's team got the current name. A no-op unless the turn clock is running.
    pub async fn next_name(self: &Arc<Self>, who: &Arc<Player>) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, out| {
            if s.stage != Stage::Playing || !s.is_clue_giver(who) || !s.timer.running() {
                return Ok(());
            }
            let side = s.guessing_side();
            s.score_name(side, false, out);
            Ok(())
        })
    }

    /// The clue giver reports whether the other team's steal attempt was right.
    pub async fn steal_confirm(self: &Arc<Self>, who: &Arc<Player>, correct: bool) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, out| {
            if s.stage != Stage::Stealing {
                return Err(GameError::failure("Turn is not being stolen currently"));
            }
            if !s.is_clue_giver(who) {
                return Ok(());
            }
            s.timer.stop();
            if correct {
                let side = s.guessing_side().other();
                s.score_name(side, true, out);
            } else {
                s.advance_turn(out);
            }
            Ok(())
        })
    }

    pub async fn reset(self: &Arc<Self>, who: &Arc<Player>) -> GameResult<()> {
        self.clean_players().await?;
        self.mutate(|s, out| {
            if s.stage != Stage::End {
                return Err(GameError::failure("Game has not yet ended"));
            }
            if !s.is_leader(who) {
                return Err(GameError::failure("Only the game leader can reset the game"));
            }
            tracing::info!(game = %self.code, "game reset by leader");
            s.reset(&format!("{} started a new game", who.name()), out);
            Ok(())
        })
    }
}
