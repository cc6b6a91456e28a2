//! Command and event messages exchanged with the engines.
//!
//! This is an in-process event bus, not a wire format: every engine takes a
//! command and returns the events it produced, in the order they were
//! generated.

use std::fmt;

use crate::congestion::{CongestionState, Phase};
use crate::simulator::Arrival;
use crate::state::ConnectionPhase;
use crate::window::Window;

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Parameters for [`SenderCommand::Init`].
///
/// `window` and `congestion` carry state over from a previous connection
/// phase; `None` starts from the policy defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderInit {
    pub total_segments: u32,
    pub timeout_secs: u32,
    pub window: Option<Window>,
    pub congestion: Option<CongestionState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderCommand {
    Init(SenderInit),
    SendWindow,
    MoveWindow,
    ResendWindow,
    ReceiveAck { ack: u32 },
    IncreaseWindowManual,
    DecreaseWindowManual,
}

/// Full sender state as reported in every `StateUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderSnapshot {
    pub base: u32,
    pub window_base: u32,
    pub next_seq: u32,
    pub cwnd: u32,
    /// `None` for policies without a threshold.
    pub ssthresh: Option<u32>,
    pub required_window_size: u32,
    pub acks_received_for_current_window: u32,
    /// `None` for fixed windows until the stream completes.
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderEvent {
    SendSegment { seq: u32 },
    StateUpdate(SenderSnapshot),
    Log { text: String },
    TimerTick { seconds_left: u32, base: u32 },
    TimerStop,
    TimeoutEvent,
}

impl SenderEvent {
    pub(crate) fn log(text: impl Into<String>) -> Self {
        SenderEvent::Log { text: text.into() }
    }
}

impl fmt::Display for SenderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderEvent::SendSegment { seq } => write!(f, "(Sender): -> segment {seq}"),
            SenderEvent::StateUpdate(s) => {
                write!(
                    f,
                    "(Sender): base={} window_base={} next={} cwnd={} required={} acks={}",
                    s.base,
                    s.window_base,
                    s.next_seq,
                    s.cwnd,
                    s.required_window_size,
                    s.acks_received_for_current_window
                )?;
                if let Some(ssthresh) = s.ssthresh {
                    write!(f, " ssthresh={ssthresh}")?;
                }
                if let Some(phase) = s.phase {
                    write!(f, " phase={phase}")?;
                }
                Ok(())
            }
            SenderEvent::Log { text } => write!(f, "(Sender): {text}"),
            SenderEvent::TimerTick { seconds_left, base } => {
                write!(f, "(Timer): {seconds_left}s left for base {base}")
            }
            SenderEvent::TimerStop => write!(f, "(Timer): stopped"),
            SenderEvent::TimeoutEvent => write!(f, "(Timer): TIMEOUT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverCommand {
    Init { expected_seq: Option<u32> },
    ReceivePacket { seq: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    SendAck { ack: u32 },
    StateUpdate { expected_seq: u32 },
    Log { text: String },
}

impl fmt::Display for ReceiverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverEvent::SendAck { ack } => write!(f, "(Receiver): -> ACK {ack}"),
            ReceiverEvent::StateUpdate { expected_seq } => {
                write!(f, "(Receiver): expected={expected_seq}")
            }
            ReceiverEvent::Log { text } => write!(f, "(Receiver): {text}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection and session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    PhaseChanged {
        from: ConnectionPhase,
        to: ConnectionPhase,
    },
    Log { text: String },
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::PhaseChanged { from, to } => {
                write!(f, "(Connection): phase {from} -> {to}")
            }
            ConnectionEvent::Log { text } => write!(f, "(Connection): {text}"),
        }
    }
}

/// Any event produced inside a session, tagged by origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Sender(SenderEvent),
    Receiver(ReceiverEvent),
    Network(Arrival),
    Connection(ConnectionEvent),
    /// Operator-facing notice from the session itself (status, loss toggles).
    Notice { text: String },
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimEvent::Sender(e) => e.fmt(f),
            SimEvent::Receiver(e) => e.fmt(f),
            SimEvent::Network(Arrival::Delivered(p)) => write!(f, "(Network): {p} delivered"),
            SimEvent::Network(Arrival::Lost(p)) => write!(f, "(Network): {p} was lost"),
            SimEvent::Connection(e) => e.fmt(f),
            SimEvent::Notice { text } => write!(f, "(Session): {text}"),
        }
    }
}
