use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Snapshot of a running clock's origin; cheap to copy into background tasks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClockReading {
    base_seconds: u64,
    started: Instant,
}

impl ClockReading {
    pub(crate) fn elapsed_seconds(&self) -> u64 {
        self.base_seconds + self.started.elapsed().as_secs()
    }
}

/// Elapsed-time counter for one session. A ticker task publishes the running total
/// once per tick; the task is aborted when the clock stops or is dropped.
#[derive(Debug)]
pub struct SessionClock {
    reading: ClockReading,
    ticks: watch::Receiver<u64>,
    stopped_at: Option<u64>,
    ticker: Option<JoinHandle<()>>,
}

impl SessionClock {
    /// Start counting from `base_seconds`, carried over from an earlier visit.
    pub fn start(base_seconds: u64, tick: Duration) -> Self {
        let reading = ClockReading {
            base_seconds,
            started: Instant::now(),
        };
        let (sender, ticks) = watch::channel(base_seconds);
        let tick = tick.max(Duration::from_millis(1));
        let ticker = tokio::spawn(run_ticker(reading, tick, sender));

        Self {
            reading,
            ticks,
            stopped_at: None,
            ticker: Some(ticker),
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.stopped_at
            .unwrap_or_else(|| self.reading.elapsed_seconds())
    }

    /// Receiver that observes every tick.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.ticks.clone()
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Freeze the clock and return the final elapsed seconds.
    pub fn stop(&mut self) -> u64 {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let elapsed = self.elapsed_seconds();
        self.stopped_at = Some(elapsed);
        elapsed
    }

    pub(crate) fn reading(&self) -> ClockReading {
        self.reading
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

async fn run_ticker(reading: ClockReading, tick: Duration, sender: watch::Sender<u64>) {
    let mut interval = tokio::time::interval_at(reading.started + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if sender.send(reading.elapsed_seconds()).is_err() {
            break;
        }
    }
}

/// Render elapsed seconds as `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
