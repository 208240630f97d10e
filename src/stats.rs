use std::collections::BTreeMap;
use std::time::Duration;

use crate::snapshot::{BestClueGiver, MostStolen, NameTiming, StatsSnapshot};

/// One of the two sides of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Team1,
    Team2,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Team1 => Side::Team2,
            Side::Team2 => Side::Team1,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Side::Team1 => 1,
            Side::Team2 => 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TimedName {
    name: String,
    submitter: String,
    time: Duration,
}

impl TimedName {
    fn snapshot(&self) -> NameTiming {
        if self.name.is_empty() {
            return NameTiming::default();
        }
        NameTiming {
            name: self.name.clone(),
            submitter: self.submitter.clone(),
            guess_time: format_guess_time(self.time),
        }
    }
}

pub fn format_guess_time(d: Duration) -> String {
    format!("{:.1} seconds", d.as_secs_f64())
}

/// Running score and awards for one game. Per-player counters never leave the server.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub winner: Option<Side>,
    pub team1_score: u32,
    pub team2_score: u32,
    guesses: BTreeMap<String, u32>,
    steals: BTreeMap<String, u32>,
    best_clue_giver: BestClueGiver,
    most_stolen: MostStolen,
    easiest: Option<TimedName>,
    hardest: Option<TimedName>,
}

impl Stats {
    pub fn credit(&mut self, side: Side) {
        match side {
            Side::Team1 => self.team1_score += 1,
            Side::Team2 => self.team2_score += 1,
        }
    }

    /// Record a guessed name. `stolen` guesses count against the clue giver instead of for them.
    pub fn record_guess(&mut self, clue_giver: &str, name: &str, submitter: &str, took: Duration, stolen: bool) {
        let counters = if stolen { &mut self.steals } else { &mut self.guesses };
        *counters.entry(clue_giver.to_string()).or_insert(0) += 1;

        let timed = TimedName {
            name: name.to_string(),
            submitter: submitter.to_string(),
            time: took,
        };
        if self.hardest.as_ref().is_none_or(|h| took > h.time) {
            self.hardest = Some(timed.clone());
        }
        if self.easiest.as_ref().is_none_or(|e| took < e.time) {
            self.easiest = Some(timed);
        }
    }

    /// Decide the winner and hand out the end of game awards.
    pub fn finish(&mut self) {
        self.winner = match self.team1_score.cmp(&self.team2_score) {
            std::cmp::Ordering::Greater => Some(Side::Team1),
            std::cmp::Ordering::Less => Some(Side::Team2),
            std::cmp::Ordering::Equal => None,
        };

        self.best_clue_giver = BestClueGiver::default();
        for (player, &guesses) in &self.guesses {
            if guesses > self.best_clue_giver.guesses {
                self.best_clue_giver = BestClueGiver { player: player.clone(), guesses };
            }
        }

        self.most_stolen = MostStolen::default();
        for (player, &steals) in &self.steals {
            if steals > self.most_stolen.steals {
                self.most_stolen = MostStolen { player: player.clone(), steals };
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            winner: self.winner.map(Side::number).unwrap_or(0),
            team1_score: self.team1_score,
            team2_score: self.team2_score,
            best_clue_giver: self.best_clue_giver.clone(),
            most_stolen: self.most_stolen.clone(),
            easiest_name: self.easiest.as_ref().map(TimedName::snapshot).unwrap_or_default(),
            hardest_name: self.hardest.as_ref().map(TimedName::snapshot).unwrap_or_default(),
        }
    }
}
