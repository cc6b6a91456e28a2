//! Connection-phase types.
//!
//! A session moves through three phases, in order:
//!
//! ```text
//!  HANDSHAKE ──handshake complete──▶ TRANSFER ──last ACK──▶ CLOSURE
//!                                    (window | slow_start ⇄ aimd)
//! ```
//!
//! Transitions are driven by [`crate::connection::Connection`]; the handshake
//! and teardown exchanges themselves are owned by an external collaborator
//! and only signalled here.

use std::fmt;

use crate::congestion::Phase;

/// Sub-phase of data transfer, as reported by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransferPhase {
    /// Fixed window, no congestion control.
    Window,
    SlowStart,
    Aimd,
}

impl TransferPhase {
    /// Map a sender snapshot phase; `None` when the stream is complete.
    pub fn from_sender(phase: Option<Phase>) -> Option<Self> {
        match phase {
            None => Some(TransferPhase::Window),
            Some(Phase::SlowStart) => Some(TransferPhase::SlowStart),
            Some(Phase::Aimd) => Some(TransferPhase::Aimd),
            Some(Phase::Closure) => None,
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferPhase::Window => "window",
            TransferPhase::SlowStart => "slow_start",
            TransferPhase::Aimd => "aimd",
        };
        f.write_str(s)
    }
}

/// Lifecycle phase of the simulated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConnectionPhase {
    /// Waiting for the handshake collaborator to finish.
    #[default]
    Handshake,
    Transfer(TransferPhase),
    /// All data acknowledged; teardown belongs to the closure collaborator.
    Closure,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Handshake => f.write_str("handshake"),
            ConnectionPhase::Transfer(p) => write!(f, "transfer({p})"),
            ConnectionPhase::Closure => f.write_str("closure"),
        }
    }
}
