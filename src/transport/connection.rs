//! Connection lifecycle state.
//!
//! ```text
//! Ready --(registration reply 2.xx)--> Open
//! Ready | Open --(close / stop observe / fatal read)--> Closed
//! ```
//!
//! There is no transition out of `Closed`. The state is shared between the
//! request path and the reader task, so it lives in an atomic.

use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionPhase {
    /// Socket established, no subscription yet. Requests may be sent.
    Ready = 0,
    /// An observe subscription has been accepted; notifications are delivered.
    Open = 1,
    /// Closed; every operation fails.
    Closed = 2,
}

impl ConnectionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Ready,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Atomic connection phase.
#[derive(Debug)]
pub struct ConnectionState {
    phase: AtomicU8,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Create a state in [`ConnectionPhase::Ready`].
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ConnectionPhase::Ready as u8),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether notifications are being delivered.
    pub fn is_open(&self) -> bool {
        self.phase() == ConnectionPhase::Open
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.phase() == ConnectionPhase::Closed
    }

    /// Move `Ready` to `Open`.
    ///
    /// Returns `false` if the connection is already closed.
    pub fn mark_open(&self) -> bool {
        match self.phase.compare_exchange(
            ConnectionPhase::Ready as u8,
            ConnectionPhase::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => ConnectionPhase::from_u8(current) == ConnectionPhase::Open,
        }
    }

    /// Move to `Closed`, returning the previous phase.
    pub fn close(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(
            self.phase
                .swap(ConnectionPhase::Closed as u8, Ordering::AcqRel),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_lifecycle() {
        let state = ConnectionState::new();
        assert_eq!(state.phase(), ConnectionPhase::Ready);
        assert!(!state.is_open());

        assert!(state.mark_open());
        assert!(state.is_open());
        // Idempotent
        assert!(state.mark_open());

        assert_eq!(state.close(), ConnectionPhase::Open);
        assert!(state.is_closed());
    }

    #[test]
    fn test_no_reopen_after_close() {
        let state = ConnectionState::new();
        assert_eq!(state.close(), ConnectionPhase::Ready);
        assert!(!state.mark_open());
        assert_eq!(state.phase(), ConnectionPhase::Closed);
        assert_eq!(state.close(), ConnectionPhase::Closed);
    }
}
