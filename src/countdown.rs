//! Wait State and the one-second countdown that gates submissions.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Formats a duration in seconds as `m:ss`.
pub fn format_wait_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// How the countdown advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountdownMode {
    /// A background task decrements once per second while the wait is positive.
    #[default]
    Scheduled,
    /// Only explicit [`Countdown::tick`] calls decrement.
    Manual,
}

/// Seconds until the next submission is permitted. Zero means allowed.
///
/// Writes are last-write-wins: [`Countdown::set`] overwrites whatever is
/// currently counting down and restarts the ticker.
#[derive(Debug)]
pub struct Countdown {
    tx: Arc<watch::Sender<u64>>,
    started_from: u64,
    mode: CountdownMode,
    ticker: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn new(mode: CountdownMode) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            tx: Arc::new(tx),
            started_from: 0,
            mode,
            ticker: None,
        }
    }

    pub fn mode(&self) -> CountdownMode {
        self.mode
    }

    pub fn remaining(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Overwrites the wait. In scheduled mode a positive wait (re)starts the
    /// ticker; zero stops it.
    ///
    /// Scheduled mode must be driven from within a Tokio runtime.
    pub fn set(&mut self, seconds: u64) {
        self.stop();
        self.started_from = seconds;
        self.tx.send_replace(seconds);
        debug!(seconds, "wait state set");

        if seconds > 0 && self.mode == CountdownMode::Scheduled {
            self.ticker = Some(spawn_ticker(Arc::clone(&self.tx)));
        }
    }

    /// Decrements by one, floored at zero. Returns the new value.
    pub fn tick(&self) -> u64 {
        decrement(&self.tx)
    }

    /// Fraction of the current cooldown already elapsed, in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.started_from == 0 {
            return 1.0;
        }
        let elapsed = self.started_from.saturating_sub(self.remaining());
        elapsed as f32 / self.started_from as f32
    }

    /// Whether the background ticker is still running.
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the background ticker. The current value is kept.
    pub fn stop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(CountdownMode::default())
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decrement(tx: &watch::Sender<u64>) -> u64 {
    let mut left = 0;
    tx.send_if_modified(|seconds| {
        if *seconds == 0 {
            return false;
        }
        *seconds -= 1;
        left = *seconds;
        true
    });
    left
}

fn spawn_ticker(tx: Arc<watch::Sender<u64>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        loop {
            interval.tick().await;
            if decrement(&tx) == 0 {
                debug!("cooldown elapsed");
                break;
            }
        }
    })
}
