//! Progress reporting for the batch (`progress` feature).
//!
//! [`BatchClock`] counts completed and failed flares and keeps the mean flare rate
//! since the batch started, plus a smoothed gap between completions
//! (`gap ← α·dt + (1–α)·gap`). Workers complete flares concurrently, so the clock is
//! shared behind a mutex and the gap is wall-clock time between two completions, not
//! the cost of one flare.
use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Smoothing factor of the completion gap.
const GAP_SMOOTHING: f64 = 0.2;

pub(crate) struct BatchClock {
    start: Instant,
    last: Instant,
    gap: Option<f64>,
    done: u64,
    failed: u64,
}

impl BatchClock {
    pub(crate) fn starting_at(start: Instant) -> Self {
        BatchClock {
            start,
            last: start,
            gap: None,
            done: 0,
            failed: 0,
        }
    }

    /// Record one flare completed at `now`.
    pub(crate) fn record(&mut self, now: Instant, ok: bool) {
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        self.done += 1;
        if !ok {
            self.failed += 1;
        }
        self.gap = Some(match self.gap {
            None => dt,
            Some(gap) => GAP_SMOOTHING * dt + (1.0 - GAP_SMOOTHING) * gap,
        });
    }

    /// Mean completed flares per second since the start.
    pub(crate) fn rate(&self) -> f64 {
        let elapsed = self.last.saturating_duration_since(self.start).as_secs_f64();
        if elapsed > 0.0 {
            self.done as f64 / elapsed
        } else {
            0.0
        }
    }

    pub(crate) fn message(&self) -> String {
        let gap = self
            .gap
            .map_or_else(|| "-".to_string(), |g| fmt_seconds(Duration::from_secs_f64(g)));
        format!(
            "{} failed | {:.1} flares/s | gap {gap}",
            self.failed,
            self.rate()
        )
    }
}

/// `"850ms"`, `"12.3s"` or `"4m07s"`.
pub(crate) fn fmt_seconds(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = d.as_secs();
        format!("{}m{:02}s", whole / 60, whole % 60)
    }
}

/// Progress bar over `total` flares.
pub(crate) struct BatchProgress {
    bar: ProgressBar,
    clock: Mutex<BatchClock>,
}

impl BatchProgress {
    pub(crate) fn new(total: usize) -> Self {
        let bar = ProgressBar::new((total as u64).max(1));
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} flares | ETA {eta} | {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(200));
        BatchProgress {
            bar,
            clock: Mutex::new(BatchClock::starting_at(Instant::now())),
        }
    }

    /// Record one completed flare and whether it succeeded.
    pub(crate) fn inc(&self, ok: bool) {
        if let Ok(mut clock) = self.clock.lock() {
            clock.record(Instant::now(), ok);
            self.bar.set_message(clock.message());
        }
        self.bar.inc(1);
    }

    pub(crate) fn finish(&self, message: &'static str) {
        self.bar.set_message(message);
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}
