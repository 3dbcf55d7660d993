//! Confirmable retransmission with bounded exponential back-off
//! (RFC 7252 §4.2), capped by the exchange deadline.

use std::time::Duration;

use crate::core::{ACK_RANDOM_FACTOR, ACK_TIMEOUT, BACKOFF_MULTIPLIER, MAX_RETRANSMIT};

/// Retransmission parameters for confirmable messages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetransmitPolicy {
    /// Initial timeout before the first retransmission.
    pub ack_timeout: Duration,
    /// Upper bound of the random factor applied to the initial timeout (>= 1.0).
    pub ack_random_factor: f64,
    /// Retransmissions after the first transmission.
    pub max_retransmit: u32,
    /// Multiplier applied to the timeout after each retransmission.
    pub backoff_multiplier: u32,
}

impl Default for RetransmitPolicy {
    fn default() -> Self {
        Self {
            ack_timeout: ACK_TIMEOUT,
            ack_random_factor: ACK_RANDOM_FACTOR,
            max_retransmit: MAX_RETRANSMIT,
            backoff_multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetransmitPolicy {
    /// A policy that never retransmits.
    pub fn disabled() -> Self {
        Self {
            max_retransmit: 0,
            ..Self::default()
        }
    }

    /// Initial timeout, randomised within `[ack_timeout, ack_timeout * ack_random_factor)`.
    ///
    /// Saturates at [`Duration::MAX`].
    pub fn initial_timeout(&self) -> Duration {
        let spread = (self.ack_random_factor - 1.0).max(0.0);
        let factor = 1.0 + spread * rand::random::<f64>();
        Duration::try_from_secs_f64(self.ack_timeout.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// Start tracking one confirmable message.
    pub fn start(&self) -> RetransmitState {
        RetransmitState {
            timeout: self.initial_timeout(),
            attempts: 0,
            max_retransmit: self.max_retransmit,
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// Back-off state of one confirmable message.
#[derive(Debug, Clone)]
pub struct RetransmitState {
    timeout: Duration,
    attempts: u32,
    max_retransmit: u32,
    backoff_multiplier: u32,
}

impl RetransmitState {
    /// Time to wait for a reply before the next retransmission.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retransmissions performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another retransmission is allowed.
    pub fn can_retransmit(&self) -> bool {
        self.attempts < self.max_retransmit
    }

    /// Record a retransmission and back off.
    ///
    /// Returns `false` without changing state when the budget is spent.
    pub fn on_retransmit(&mut self) -> bool {
        if !self.can_retransmit() {
            return false;
        }
        self.attempts += 1;
        self.timeout = self.timeout.saturating_mul(self.backoff_multiplier);
        true
    }
}
