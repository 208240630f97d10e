//! A cancellable countdown that knows nothing about games.
//!
//! A [`RoundTimer`] runs on its own tokio task. While it counts down it calls `on_tick` every
//! poll interval with the time passed since the previous tick. When the full duration elapses
//! it calls `on_timeout` and then `on_finish`. [`RoundTimer::finish_early`] skips straight to
//! `on_finish`, and [`RoundTimer::cancel`] (or dropping the handle) stops it silently.
//!
//! Callbacks run on the timer task itself, so one that needs to await or re-enter a lock held
//! by whoever started the timer should hand its work to a fresh task.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};

pub const DEFAULT_POLL: Duration = Duration::from_millis(500);

type TickFn = Box<dyn FnMut(Duration) + Send + 'static>;
type DoneFn = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
enum Stop {
    Cancel,
    Finish,
}

/// Handle to a running countdown.
#[derive(Debug)]
pub struct RoundTimer {
    stop: Option<oneshot::Sender<Stop>>,
}

pub struct RoundTimerBuilder {
    duration: Duration,
    poll: Duration,
    on_tick: Option<TickFn>,
    on_finish: Option<DoneFn>,
    on_timeout: Option<DoneFn>,
}

impl RoundTimer {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(duration: Duration) -> RoundTimerBuilder {
        RoundTimerBuilder {
            duration,
            poll: DEFAULT_POLL,
            on_tick: None,
            on_finish: None,
            on_timeout: None,
        }
    }

    /// True until the countdown has expired, been finished early, or been cancelled.
    pub fn is_active(&self) -> bool {
        self.stop.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Stop without firing any further callbacks. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(Stop::Cancel);
        }
    }

    /// Stop now and fire `on_finish` (but not `on_timeout`). Safe to call repeatedly.
    pub fn finish_early(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(Stop::Finish);
        }
    }
}

impl RoundTimerBuilder {
    pub fn poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn on_tick(mut self, f: impl FnMut(Duration) + Send + 'static) -> Self {
        self.on_tick = Some(Box::new(f));
        self
    }

    pub fn on_finish(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(f));
        self
    }

    pub fn on_timeout(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_timeout = Some(Box::new(f));
        self
    }

    /// Spawn the countdown. Must be called from within a tokio runtime.
    pub fn start(self) -> RoundTimer {
        let (tx, mut rx) = oneshot::channel();
        let RoundTimerBuilder {
            duration,
            poll,
            mut on_tick,
            on_finish,
            on_timeout,
        } = self;

        tokio::spawn(async move {
            let started = Instant::now();
            let deadline = time::sleep_until(started + duration);
            tokio::pin!(deadline);
            let mut ticker = time::interval_at(started + poll, poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = started;

            loop {
                tokio::select! {
                    biased;
                    stop = &mut rx => {
                        // A dropped handle counts as a cancel.
                        if let Ok(Stop::Finish) = stop {
                            if let Some(f) = on_finish {
                                f();
                            }
                        }
                        return;
                    }
                    _ = &mut deadline => {
                        if let Some(f) = on_timeout {
                            f();
                        }
                        if let Some(f) = on_finish {
                            f();
                        }
                        return;
                    }
                    now = ticker.tick() => {
                        if let Some(f) = on_tick.as_mut() {
                            f(now - last);
                        }
                        last = now;
                    }
                }
            }
        });

        RoundTimer { stop: Some(tx) }
    }
}
