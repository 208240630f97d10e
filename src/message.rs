use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};
use crate::snapshot::GameSnapshot;

/// Connection details sent with the first frame of a websocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub code: String,
    pub name: String,
}

/// Frames sent by a player, as `{ "type": ..., "data": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ClientMsg {
    Join(JoinRequest),
    Pong,
    NamesPerPlayer(u32),
    Start,
    SwitchTeams,
    AddName(String),
    RemoveName(String),
    StartTurn,
    NextName,
    StealYes,
    StealNo,
    Reset,
    RequestUpdate,
}

impl ClientMsg {
    pub fn parse(text: &str) -> GameResult<ClientMsg> {
        serde_json::from_str(text).map_err(|e| {
            tracing::debug!(%e, "rejected inbound frame");
            GameError::failure("Invalid message")
        })
    }
}

/// Frames pushed to a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMsg {
    State(GameSnapshot),
    Error(String),
    Ping,
    Name(String),
    StartCheck,
    StealCheck,
    PlaySound(Sound),
    Notification(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sound {
    Tick,
    TimerAlarm,
    Score,
    Notify,
    RoundEnd,
    GameWin,
    GameLose,
}
