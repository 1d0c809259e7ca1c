//! Playback clock and the periodic progress sampler.

use std::time::{Duration, Instant};

/// Wall-clock position of the current track.
///
/// Tracks the start time and the time accumulated before the last pause.
#[derive(Debug, Clone, Default)]
pub struct PlayClock {
    started_at: Option<Instant>,
    accumulated: Duration,
}

impl PlayClock {
    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(st) = self.started_at.take() {
            self.accumulated += now.saturating_duration_since(st);
        }
    }

    /// Jump to `position`, running if `running`.
    pub fn set(&mut self, position: Duration, now: Instant, running: bool) {
        self.accumulated = position;
        self.started_at = running.then_some(now);
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.accumulated = Duration::ZERO;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.accumulated
            + self
                .started_at
                .map_or(Duration::ZERO, |st| now.saturating_duration_since(st))
    }
}

/// One progress sample. Recomputed each tick, never stored for long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub elapsed: Duration,
    /// Always within 0..=100; 0 while the duration is unknown.
    pub percent: f64,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            elapsed: Duration::ZERO,
            percent: 0.0,
        }
    }
}

impl ProgressSnapshot {
    pub fn compute(elapsed: Duration, duration: Option<Duration>) -> Self {
        let percent = match duration {
            Some(d) if !d.is_zero() => {
                let p = elapsed.as_secs_f64() / d.as_secs_f64() * 100.0;
                if p.is_finite() { p.clamp(0.0, 100.0) } else { 0.0 }
            }
            _ => 0.0,
        };
        Self { elapsed, percent }
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed)
    }
}

/// Format a duration as `M:SS` (`H:MM:SS` past an hour).
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SamplerState {
    Running { next_due: Instant },
    Suspended,
    Disposed,
}

/// Periodic sampler. Runs only while playback is active.
#[derive(Debug)]
pub struct ProgressTracker {
    interval: Duration,
    state: SamplerState,
    last: ProgressSnapshot,
}

impl ProgressTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            state: SamplerState::Suspended,
            last: ProgressSnapshot::default(),
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if self.state == SamplerState::Suspended {
            self.state = SamplerState::Running {
                next_due: now + self.interval,
            };
        }
    }

    pub fn suspend(&mut self) {
        if matches!(self.state, SamplerState::Running { .. }) {
            self.state = SamplerState::Suspended;
        }
    }

    pub fn dispose(&mut self) {
        self.state = SamplerState::Disposed;
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        matches!(self.state, SamplerState::Running { .. })
    }

    /// Take a sample if one is due. Returns whether the snapshot changed.
    pub fn poll(&mut self, now: Instant, elapsed: Duration, duration: Option<Duration>) -> bool {
        let SamplerState::Running { next_due } = self.state else {
            return false;
        };
        if now < next_due {
            return false;
        }
        self.state = SamplerState::Running {
            next_due: now + self.interval,
        };
        self.last = ProgressSnapshot::compute(elapsed, duration);
        true
    }

    /// Sample immediately, outside the schedule (after a seek).
    pub fn resync(&mut self, elapsed: Duration, duration: Option<Duration>) {
        if self.state != SamplerState::Disposed {
            self.last = ProgressSnapshot::compute(elapsed, duration);
        }
    }

    /// Back to zero for a new track.
    pub fn reset(&mut self) {
        self.last = ProgressSnapshot::default();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.last
    }
}
