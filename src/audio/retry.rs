//! Error/retry handler: every failure class gets the same recovery, a fixed
//! delay followed by an advance to the next track.

use std::time::{Duration, Instant};

use tracing::info;

use crate::error::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRetry {
    due: Instant,
    failed_index: usize,
}

#[derive(Debug)]
pub struct RetryHandler {
    delay: Duration,
    pending: Option<PendingRetry>,
}

impl RetryHandler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule an advance past `failed_index`. Replaces any pending retry.
    pub fn schedule(&mut self, now: Instant, failed_index: usize, error: &PlaybackError) {
        info!(
            track = failed_index,
            kind = ?error.kind,
            delay_ms = self.delay.as_millis() as u64,
            "scheduling skip past failed track"
        );
        self.pending = Some(PendingRetry {
            due: now + self.delay,
            failed_index,
        });
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Consume the retry if its delay has passed, yielding the failed index.
    pub fn take_due(&mut self, now: Instant) -> Option<usize> {
        match self.pending {
            Some(p) if now >= p.due => {
                self.pending = None;
                Some(p.failed_index)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn retry_fires_once_after_the_delay() {
        let t0 = Instant::now();
        let err = PlaybackError::new(ErrorKind::NetworkFailure, "timeout");
        let mut r = RetryHandler::new(Duration::from_secs(2));

        r.schedule(t0, 4, &err);
        assert!(r.is_pending());
        assert_eq!(r.take_due(t0 + Duration::from_millis(1_999)), None);
        assert_eq!(r.take_due(t0 + Duration::from_secs(2)), Some(4));
        assert_eq!(r.take_due(t0 + Duration::from_secs(3)), None);
    }

    #[test]
    fn cancel_drops_the_pending_retry() {
        let t0 = Instant::now();
        let err = PlaybackError::new(ErrorKind::Unknown, "?");
        let mut r = RetryHandler::new(Duration::from_secs(2));
        r.schedule(t0, 1, &err);
        r.cancel();
        assert!(!r.is_pending());
        assert_eq!(r.take_due(t0 + Duration::from_secs(5)), None);
    }
}
