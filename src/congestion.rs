//! Congestion-control policies.
//!
//! A [`Policy`] never touches the window directly.  Each hook is a pure
//! transition over [`CongestionState`]: it takes the current state by value
//! and returns the next one, staging a *target* in `required_window_size`.
//! Copying that target into `cwnd` is the sender's job and, for gated
//! policies, only happens on an explicit operator command.
//!
//! | Policy    | Full window ACKed            | Timeout                                   |
//! |-----------|------------------------------|-------------------------------------------|
//! | Fixed     | no change                    | no change                                 |
//! | SlowStart | `min(cwnd * 2, cap)`         | `1`                                       |
//! | Aimd      | `cwnd + 1`                   | `max(1, cwnd / 2)`, ssthresh likewise     |
//! | Combined  | SlowStart until `>= ssthresh`, then Aimd | ssthresh halves; `1` in slow start, halve in AIMD |

use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Congestion phase of the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    SlowStart,
    Aimd,
    /// Every segment has been acknowledged; terminal.
    Closure,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::SlowStart => "slow_start",
            Phase::Aimd => "aimd",
            Phase::Closure => "closure",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// CongestionState
// ---------------------------------------------------------------------------

/// Window-size bookkeeping shared by every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionState {
    pub phase: Phase,
    /// Current congestion window, in segments.
    pub cwnd: u32,
    /// Slow-start threshold.
    pub ssthresh: u32,
    /// Policy target, staged until an apply command copies it into `cwnd`.
    pub required_window_size: u32,
    /// ACKs counted towards the next full-window burst.
    pub acks_received_for_current_window: u32,
}

impl CongestionState {
    /// A settled state: no pending change, no ACKs counted yet.
    pub fn new(phase: Phase, cwnd: u32, ssthresh: u32) -> Self {
        Self {
            phase,
            cwnd,
            ssthresh,
            required_window_size: cwnd,
            acks_received_for_current_window: 0,
        }
    }

    /// `true` while a staged target differs from the live window.
    pub fn has_pending_change(&self) -> bool {
        self.required_window_size != self.cwnd
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// The congestion-control variant, selected once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Plain sliding window: Stop-and-Wait (`cwnd = 1`) or Go-Back-N.
    Fixed,
    /// Exponential growth capped at `cap`; collapse to 1 on timeout.
    SlowStart { cap: u32 },
    /// Additive increase, multiplicative decrease.
    Aimd,
    /// Slow start until the target reaches `ssthresh`, AIMD afterwards.
    Combined { cap: u32 },
}

impl Policy {
    pub fn name(self) -> &'static str {
        match self {
            Policy::Fixed => "fixed",
            Policy::SlowStart { .. } => "slow-start",
            Policy::Aimd => "aimd",
            Policy::Combined { .. } => "combined",
        }
    }

    /// Phase a fresh session starts in.
    pub fn initial_phase(self) -> Phase {
        match self {
            Policy::Aimd => Phase::Aimd,
            _ => Phase::SlowStart,
        }
    }

    /// Fixed windows have no congestion control and therefore nothing to gate.
    pub fn is_adaptive(self) -> bool {
        !matches!(self, Policy::Fixed)
    }

    /// Upper bound on the window, if the policy has one.
    pub fn cap(self) -> Option<u32> {
        match self {
            Policy::SlowStart { cap } | Policy::Combined { cap } => Some(cap),
            Policy::Fixed | Policy::Aimd => None,
        }
    }

    /// A full window of ACKs has been counted: stage the next target.
    pub fn on_window_acked(self, mut state: CongestionState) -> CongestionState {
        match self {
            Policy::Fixed => {}
            Policy::SlowStart { cap } => {
                state.required_window_size = state.cwnd.saturating_mul(2).min(cap);
            }
            Policy::Aimd => {
                state.required_window_size = state.cwnd.saturating_add(1);
            }
            Policy::Combined { cap } => match state.phase {
                Phase::SlowStart => {
                    state.required_window_size = state.cwnd.saturating_mul(2).min(cap);
                    if state.required_window_size >= state.ssthresh {
                        state.phase = Phase::Aimd;
                    }
                }
                Phase::Aimd => {
                    state.required_window_size = state.cwnd.saturating_add(1);
                }
                Phase::Closure => {}
            },
        }
        state.acks_received_for_current_window = 0;
        state
    }

    /// The retransmission timer expired: stage the reset target.
    pub fn on_timeout(self, mut state: CongestionState) -> CongestionState {
        let halved = (state.cwnd / 2).max(1);
        match self {
            Policy::Fixed => {}
            Policy::SlowStart { .. } => {
                state.required_window_size = 1;
            }
            Policy::Aimd => {
                state.ssthresh = halved;
                state.required_window_size = halved;
            }
            Policy::Combined { .. } => {
                state.ssthresh = halved;
                match state.phase {
                    Phase::SlowStart => state.required_window_size = 1,
                    Phase::Aimd => state.required_window_size = halved,
                    Phase::Closure => {}
                }
            }
        }
        state.acks_received_for_current_window = 0;
        state
    }

    /// A staged target was just copied into `cwnd`.
    pub fn on_applied(self, mut state: CongestionState) -> CongestionState {
        if let Policy::Combined { .. } = self {
            if state.phase == Phase::SlowStart && state.cwnd >= state.ssthresh {
                state.phase = Phase::Aimd;
            }
        }
        state
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
