use serde::{Deserialize, Serialize};

use crate::game::Stage;

/// Read-only view of a game handed to every player after each change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub code: String,
    pub names_per_player: u32,
    pub team1: TeamSnapshot,
    pub team2: TeamSnapshot,
    pub leader: Option<String>,
    pub stage: Stage,
    pub round: u8,
    pub timer: TimerSnapshot,
    pub clue_giver: Option<String>,
    pub stats: StatsSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub name: String,
    pub color: String,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub name: String,
    pub name_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub seconds: u32,
    pub left: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// 1 or 2, 0 while undecided or on a tie.
    pub winner: u8,
    pub team1_score: u32,
    pub team2_score: u32,
    pub best_clue_giver: BestClueGiver,
    pub most_stolen: MostStolen,
    pub easiest_name: NameTiming,
    pub hardest_name: NameTiming,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestClueGiver {
    pub player: String,
    pub guesses: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostStolen {
    pub player: String,
    pub steals: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameTiming {
    pub name: String,
    pub submitter: String,
    pub guess_time: String,
}
