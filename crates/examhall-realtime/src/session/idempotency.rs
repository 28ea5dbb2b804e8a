//! Idempotency-key window for mutating inbound messages.
//!
//! Every mutating message may carry a caller-assigned key; a repeat of a
//! recently-seen (kind, key) pair is a no-op, not an error. This is the
//! general contract a misbehaving transport is allowed to lean on — the
//! same message delivered twice mutates once.

use std::collections::HashMap;

use tokio::time::{Duration, Instant};

use examhall_core::types::id::MessageId;

/// Outcome of checking a key against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    /// First sighting within the window; proceed and use this server id.
    Fresh(MessageId),
    /// Seen recently; suppress, replying with the original server id.
    Duplicate(MessageId),
}

/// Short-lived window of recently-seen idempotency keys per (kind, key).
///
/// Owned by a single session worker, so no interior locking is needed.
#[derive(Debug)]
pub struct IdempotencyWindow {
    window: Duration,
    seen: HashMap<(String, String), (Instant, MessageId)>,
}

impl IdempotencyWindow {
    /// Create a window of the given length.
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window: Duration::from_secs(window_seconds),
            seen: HashMap::new(),
        }
    }

    /// Check a (kind, key) pair, recording it when fresh.
    pub fn check(&mut self, kind: &str, key: &str) -> KeyCheck {
        let now = Instant::now();

        if let Some((at, server_id)) = self.seen.get(&(kind.to_string(), key.to_string())) {
            if now.saturating_duration_since(*at) < self.window {
                return KeyCheck::Duplicate(*server_id);
            }
        }

        let server_id = MessageId::new();
        self.seen
            .insert((kind.to_string(), key.to_string()), (now, server_id));
        self.cleanup(now);
        KeyCheck::Fresh(server_id)
    }

    /// Drop entries older than the window.
    fn cleanup(&mut self, now: Instant) {
        if self.seen.len() < 1024 {
            return;
        }
        let window = self.window;
        self.seen
            .retain(|_, (at, _)| now.saturating_duration_since(*at) < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_within_window() {
        let mut window = IdempotencyWindow::new(60);

        let first = window.check("chat", "abc");
        let KeyCheck::Fresh(id) = first else {
            panic!("expected fresh");
        };
        assert_eq!(window.check("chat", "abc"), KeyCheck::Duplicate(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_different_kind_is_fresh() {
        let mut window = IdempotencyWindow::new(60);
        window.check("chat", "abc");
        assert!(matches!(window.check("signal", "abc"), KeyCheck::Fresh(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_expires_after_window() {
        let mut window = IdempotencyWindow::new(60);
        window.check("chat", "abc");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(matches!(window.check("chat", "abc"), KeyCheck::Fresh(_)));
    }
}
