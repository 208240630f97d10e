use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{GameError, GameResult};

/// Decides whether a requester may create another game.
pub trait CreationLimiter: Send + Sync {
    fn attempt(&self, requester: &str) -> GameResult<()>;
}

/// Lets everything through.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl CreationLimiter for Unlimited {
    fn attempt(&self, _requester: &str) -> GameResult<()> {
        Ok(())
    }
}

/// Allows `limit` creations per `period` for free, then makes each extra one wait a growing
/// multiple of `delay` after the previous, never more than `max`.
#[derive(Debug)]
pub struct RateDelay {
    limit: usize,
    delay: Duration,
    period: Duration,
    max: Duration,
    history: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateDelay {
    pub fn new(limit: usize, delay: Duration, period: Duration, max: Duration) -> Self {
        RateDelay {
            limit,
            delay,
            period,
            max,
            history: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for RateDelay {
    fn default() -> Self {
        RateDelay::new(10, Duration::from_secs(5), Duration::from_secs(5 * 60), Duration::from_secs(60))
    }
}

impl CreationLimiter for RateDelay {
    fn attempt(&self, requester: &str) -> GameResult<()> {
        let now = Instant::now();
        let mut history = self.history.lock()?;

        for stamps in history.values_mut() {
            while stamps.front().is_some_and(|t| now.duration_since(*t) >= self.period) {
                stamps.pop_front();
            }
        }
        history.retain(|_, stamps| !stamps.is_empty());

        let stamps = history.entry(requester.to_string()).or_default();
        if stamps.len() >= self.limit {
            let excess = (stamps.len() + 1 - self.limit) as u32;
            let wait = self.delay.saturating_mul(excess).min(self.max);
            let since = stamps.back().map_or(wait, |t| now.duration_since(*t));
            if since < wait {
                return Err(GameError::RateLimited { retry_after: wait - since });
            }
        }
        stamps.push_back(now);
        Ok(())
    }
}
