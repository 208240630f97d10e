use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and sizing knobs for every game hosted by a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// How much time each clue giver gets per turn.
    pub seconds_per_turn: u32,
    /// Setup time granted per name each player must submit.
    pub setup_seconds_per_name: u32,
    /// How long the opposing team has to steal a name.
    pub seconds_to_steal: u32,
    /// Pause between rounds.
    pub round_change_seconds: u32,
    pub default_names_per_player: u32,
    /// Poll interval of round timers.
    pub timer_poll_ms: u64,
    /// How long a player gets to answer a ping before being considered gone.
    pub ping_timeout_ms: u64,
    /// How often the registry looks for abandoned games.
    pub reap_interval_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            seconds_per_turn: 30,
            setup_seconds_per_name: 30,
            seconds_to_steal: 15,
            round_change_seconds: 10,
            default_names_per_player: 3,
            timer_poll_ms: 500,
            ping_timeout_ms: 2000,
            reap_interval_secs: 60,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl GameConfig {
    /// Defaults overridden by any `THREENAMES_*` variables that parse.
    pub fn from_env() -> Self {
        let d = GameConfig::default();
        GameConfig {
            seconds_per_turn: env_or("THREENAMES_SECONDS_PER_TURN", d.seconds_per_turn),
            setup_seconds_per_name: env_or("THREENAMES_SETUP_SECONDS_PER_NAME", d.setup_seconds_per_name),
            seconds_to_steal: env_or("THREENAMES_SECONDS_TO_STEAL", d.seconds_to_steal),
            round_change_seconds: env_or("THREENAMES_ROUND_CHANGE_SECONDS", d.round_change_seconds),
            default_names_per_player: env_or("THREENAMES_NAMES_PER_PLAYER", d.default_names_per_player),
            timer_poll_ms: env_or("THREENAMES_TIMER_POLL_MS", d.timer_poll_ms),
            ping_timeout_ms: env_or("THREENAMES_PING_TIMEOUT_MS", d.ping_timeout_ms),
            reap_interval_secs: env_or("THREENAMES_REAP_INTERVAL_SECS", d.reap_interval_secs),
        }
    }

    pub fn timer_poll(&self) -> Duration {
        Duration::from_millis(self.timer_poll_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}
