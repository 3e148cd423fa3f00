//! Reconnect policy
//!
//! One retry, fixed delay. The feed runs on the same machine or LAN, so a
//! drop that survives a single 3-second retry is treated as fatal rather
//! than papered over with an endless backoff loop.

/// Fixed delay before the single reconnect attempt (seconds).
pub const RECONNECT_DELAY_SECS: u64 = 3;

/// Tracks whether an unexpected connection loss has earned a reconnect.
#[derive(Debug)]
pub struct RetryPolicy {
    /// True between a successful stream start request and a stop request
    streaming_intent: bool,
    /// The one allowed attempt for the current connection has been spent
    attempt_spent: bool,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            streaming_intent: false,
            attempt_spent: false,
        }
    }

    pub fn set_streaming_intent(&mut self, intent: bool) {
        self.streaming_intent = intent;
    }

    pub fn streaming_intent(&self) -> bool {
        self.streaming_intent
    }

    /// Call after every successful connect: the retry budget refreshes.
    pub fn mark_connected(&mut self) {
        self.attempt_spent = false;
    }

    /// Decide whether a just-observed close warrants a retry. Consumes the
    /// attempt when it says yes.
    pub fn should_retry(&mut self, deliberate: bool) -> bool {
        if deliberate || !self.streaming_intent || self.attempt_spent {
            return false;
        }
        self.attempt_spent = true;
        true
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
