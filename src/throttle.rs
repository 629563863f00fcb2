use std::time::Duration;

use tokio::time::Instant;

/// Leading-edge rate limiter.
///
/// The first call in a window executes immediately; calls arriving before the
/// window elapses are dropped, not queued. This is the server-protection
/// mechanism preventing reconnect storms.
#[derive(Debug)]
pub struct LeadingEdgeThrottle {
    window: Duration,
    last_fired: Option<Instant>,
}

impl LeadingEdgeThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
        }
    }

    /// Returns true when the caller may execute now, consuming the window.
    pub fn try_fire(&mut self) -> bool {
        let now = Instant::now();
        if let Some(fired) = self.last_fired {
            if now.duration_since(fired) < self.window {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
