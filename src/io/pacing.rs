// src/io/pacing.rs
//
// Read pacing between chunks. Decoupled from framing so a blocking or
// event-driven source can drop the sleeps without touching the parser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Delay (ms) after a read that completed at least one line.
pub const PRODUCTIVE_DELAY_MS: u64 = 10;

/// Delay (ms) after a read that completed no line.
pub const IDLE_DELAY_MS: u64 = 200;

/// Longest uninterrupted sleep (ms) while waiting, so cancellation is seen promptly.
pub const CANCEL_POLL_MS: u64 = 10;

/// Backoff between reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PacingPolicy {
    /// Short sleep after a productive read, longer sleep after an unproductive one
    Sleep {
        #[serde(default = "default_productive_ms")]
        productive_ms: u64,
        #[serde(default = "default_idle_ms")]
        idle_ms: u64,
    },
    /// No delay; the source's own read blocks until data or timeout
    Immediate,
}

fn default_productive_ms() -> u64 {
    PRODUCTIVE_DELAY_MS
}
fn default_idle_ms() -> u64 {
    IDLE_DELAY_MS
}

impl Default for PacingPolicy {
    fn default() -> Self {
        PacingPolicy::Sleep {
            productive_ms: PRODUCTIVE_DELAY_MS,
            idle_ms: IDLE_DELAY_MS,
        }
    }
}

impl PacingPolicy {
    /// Delay to apply after a read that completed `lines` lines
    pub fn delay_after(&self, lines: usize) -> Duration {
        match self {
            PacingPolicy::Sleep {
                productive_ms,
                idle_ms,
            } => {
                if lines > 0 {
                    Duration::from_millis(*productive_ms)
                } else {
                    Duration::from_millis(*idle_ms)
                }
            }
            PacingPolicy::Immediate => Duration::ZERO,
        }
    }
}

/// Sleep for `delay`, waking early if `cancel` is raised.
/// Returns false when the wait was cut short by cancellation.
pub fn wait_cancellable(delay: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let slice = (deadline - now).min(Duration::from_millis(CANCEL_POLL_MS));
        std::thread::sleep(slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let policy = PacingPolicy::default();
        assert!(policy.delay_after(1) < policy.delay_after(0));
        assert_eq!(policy.delay_after(3), Duration::from_millis(PRODUCTIVE_DELAY_MS));
        assert_eq!(policy.delay_after(0), Duration::from_millis(IDLE_DELAY_MS));
    }

    #[test]
    fn test_immediate_never_waits() {
        assert_eq!(PacingPolicy::Immediate.delay_after(0), Duration::ZERO);
        assert_eq!(PacingPolicy::Immediate.delay_after(5), Duration::ZERO);
    }

    #[test]
    fn test_wait_cancelled_returns_early() {
        let cancel = AtomicBool::new(true);
        let started = Instant::now();
        assert!(!wait_cancellable(Duration::from_secs(10), &cancel));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_completes() {
        let cancel = AtomicBool::new(false);
        assert!(wait_cancellable(Duration::from_millis(1), &cancel));
    }

    #[test]
    fn test_policy_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            pacing: PacingPolicy,
        }

        let parsed: Wrapper = toml::from_str("pacing = { mode = \"sleep\", idle_ms = 50 }").unwrap();
        assert_eq!(
            parsed.pacing,
            PacingPolicy::Sleep {
                productive_ms: PRODUCTIVE_DELAY_MS,
                idle_ms: 50,
            }
        );

        let parsed: Wrapper = toml::from_str("pacing = { mode = \"immediate\" }").unwrap();
        assert_eq!(parsed.pacing, PacingPolicy::Immediate);
    }
}
