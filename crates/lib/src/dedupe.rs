//! Retry deduplication for inbound webhook messages.
//!
//! WhatsApp redelivers a webhook when it does not get a prompt 200. Inference plus delivery
//! can easily outlast that deadline, so every message id is remembered for a short window
//! and repeats inside it are dropped.
//!
//! Expired entries are swept on every lookup; there is no background timer. With a
//! capacity set, the entry closest to expiry is evicted to make room for a new one.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default dedupe window: 5 minutes.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Remembers recently handled message ids until their window expires.
///
/// The lock is never held across an await, so a whole check-and-insert is atomic with
/// respect to other webhook tasks.
pub struct DedupeCache {
    window: Duration,
    /// 0 = unbounded.
    max_entries: usize,
    seen: Mutex<HashMap<String, Instant>>,
}

impl Default for DedupeCache {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl DedupeCache {
    pub fn new(window: Duration) -> Self {
        Self::with_capacity(window, 0)
    }

    /// Cache that keeps at most `max_entries` ids (0 = unbounded).
    pub fn with_capacity(window: Duration, max_entries: usize) -> Self {
        Self {
            window,
            max_entries,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True if `id` was already seen within the window. Records `id` on first sight.
    /// An absent or empty id is never a duplicate and is not recorded.
    pub fn is_duplicate(&self, id: Option<&str>) -> bool {
        self.is_duplicate_at(id, Instant::now())
    }

    /// Same as [`is_duplicate`](Self::is_duplicate) with an explicit current instant.
    pub fn is_duplicate_at(&self, id: Option<&str>, now: Instant) -> bool {
        let Some(id) = id.filter(|s| !s.is_empty()) else {
            return false;
        };
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.retain(|_, expires_at| *expires_at > now);
        if seen.contains_key(id) {
            return true;
        }
        if self.max_entries > 0 {
            while seen.len() >= self.max_entries {
                let oldest = seen
                    .iter()
                    .min_by_key(|(_, expires_at)| **expires_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        log::debug!("dedupe: at capacity, evicting {}", k);
                        seen.remove(&k);
                    }
                    None => break,
                }
            }
        }
        seen.insert(id.to_string(), now + self.window);
        false
    }

    /// Number of resident entries (expired ones linger until the next lookup).
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
