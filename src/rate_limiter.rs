use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Denied; the caller may retry after this many whole seconds.
    Denied { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Admission timestamps of one caller, oldest first.
#[derive(Debug, Default)]
struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-caller sliding-window request governor.
///
/// Each caller key owns an independent window of at most `limit` admissions
/// within the trailing `window`. The prune/check/append sequence for a key runs
/// under one lock, so two concurrent requests from the same caller can never
/// both be admitted on a stale count.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per `window_secs` seconds
    /// per caller. A zero window is treated as one second.
    pub fn new(limit: usize, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs.max(1)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Checks and records one request for `caller_key` at the current instant.
    pub fn try_acquire(&self, caller_key: &str) -> Admission {
        self.try_acquire_at(caller_key, Instant::now())
    }

    /// Checks and records one request for `caller_key` as of `now`.
    pub fn try_acquire_at(&self, caller_key: &str, now: Instant) -> Admission {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = windows.entry(caller_key.to_string()).or_default();
        entry.prune(now, self.window);

        if entry.timestamps.len() >= self.limit {
            let retry_after_secs = match entry.timestamps.front() {
                Some(oldest) => {
                    let elapsed = now.saturating_duration_since(*oldest);
                    ceil_secs(self.window.saturating_sub(elapsed))
                }
                // limit == 0: nothing will ever free up before a full window.
                None => self.window.as_secs(),
            };
            tracing::warn!(
                "Rate limit exceeded for caller {} ({} requests in {}s window), retry after {}s",
                caller_key,
                entry.timestamps.len(),
                self.window.as_secs(),
                retry_after_secs
            );
            return Admission::Denied { retry_after_secs };
        }

        entry.timestamps.push_back(now);
        Admission::Allowed
    }

    /// Drops callers whose windows are empty as of `now`. Returns how many
    /// caller entries were removed.
    pub fn purge_idle(&self, now: Instant) -> usize {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = windows.len();
        windows.retain(|_, w| {
            w.prune(now, self.window);
            !w.timestamps.is_empty()
        });
        before - windows.len()
    }

    /// Number of callers currently tracked.
    pub fn tracked_callers(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
