//! Connection lifecycle: handshake, transfer, closure.
//!
//! A [`Connection`] owns one [`SenderEngine`] and one [`ReceiverEngine`] and
//! sequences them through the [`ConnectionPhase`]s:
//!
//! - **Handshake**: transfer commands are refused until
//!   [`Connection::complete_handshake`] is called.  The handshake exchange
//!   itself belongs to an external collaborator; this only records that it
//!   finished.
//! - **Transfer**: commands are forwarded to the engines.  When the sender's
//!   congestion phase moves from slow start to AIMD, both engines are
//!   re-initialized from a snapshot of their own state, as a new connection
//!   phase would.  A re-init never interrupts a live timer; it is deferred
//!   until the timer is idle.
//! - **Closure**: entered when the sender reports that every segment was
//!   acknowledged.
//!
//! Every method returns the events it produced, tagged by origin.  Network
//! delivery is the caller's job.

use crate::config::SimConfig;
use crate::error::Rejection;
use crate::event::{ConnectionEvent, ReceiverCommand, SenderCommand, SenderInit, SimEvent};
use crate::receiver::ReceiverEngine;
use crate::sender::{SenderEngine, SenderOptions};
use crate::state::{ConnectionPhase, TransferPhase};

pub struct Connection {
    /// Current lifecycle phase.
    phase: ConnectionPhase,
    pub sender: SenderEngine,
    pub receiver: ReceiverEngine,
    total_segments: u32,
    timeout_secs: u32,
    handshake: bool,
    /// A sender phase change is waiting for the timer to go idle.
    reinit_pending: bool,
}

impl Connection {
    /// Build a connection for `cfg`.  Call [`Connection::open`] before use.
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            phase: ConnectionPhase::Handshake,
            sender: SenderEngine::new(SenderOptions::from(cfg)),
            receiver: ReceiverEngine::new(),
            total_segments: cfg.total_segments,
            timeout_secs: cfg.timer.timeout_secs,
            handshake: cfg.handshake,
            reinit_pending: false,
        }
    }

    /// Start the lifecycle.  Without a handshake this goes straight to transfer.
    pub fn open(&mut self) -> Vec<SimEvent> {
        let mut out = Vec::new();
        self.phase = ConnectionPhase::Handshake;
        self.reinit_pending = false;
        if self.handshake {
            log::info!("[session] waiting for handshake");
            out.push(connection_log("Waiting for the handshake to complete."));
        } else {
            self.start_transfer(&mut out);
        }
        out
    }

    /// Signal that the external handshake exchange finished.
    pub fn complete_handshake(&mut self) -> Vec<SimEvent> {
        let mut out = Vec::new();
        if self.phase != ConnectionPhase::Handshake {
            out.push(connection_log(format!(
                "Handshake already complete (phase {}).",
                self.phase
            )));
            return out;
        }
        out.push(connection_log("Handshake complete."));
        self.start_transfer(&mut out);
        out
    }

    /// Forward an operator or network command to the sender.
    pub fn sender_command(&mut self, cmd: SenderCommand) -> Vec<SimEvent> {
        let mut out = Vec::new();
        if self.phase == ConnectionPhase::Handshake {
            let rejection = Rejection::HandshakePending;
            log::warn!("[session] rejected {cmd:?}: {rejection}");
            out.push(connection_log(rejection.to_string()));
            return out;
        }
        out.extend(self.sender.handle(cmd).into_iter().map(SimEvent::Sender));
        self.observe(&mut out);
        out
    }

    /// Forward a segment arrival (or re-init) to the receiver.
    pub fn receiver_command(&mut self, cmd: ReceiverCommand) -> Vec<SimEvent> {
        if self.phase == ConnectionPhase::Handshake {
            log::debug!("[session] dropped {cmd:?} before handshake");
            return Vec::new();
        }
        self.receiver
            .handle(cmd)
            .into_iter()
            .map(SimEvent::Receiver)
            .collect()
    }

    /// Advance the sender's retransmission timer by one second.
    pub fn tick_timer(&mut self) -> Vec<SimEvent> {
        let mut out: Vec<SimEvent> = self
            .sender
            .tick()
            .into_iter()
            .map(SimEvent::Sender)
            .collect();
        self.observe(&mut out);
        out
    }

    /// Throw away both engines and start the lifecycle over.
    pub fn reset(&mut self, cfg: &SimConfig) -> Vec<SimEvent> {
        *self = Self::new(cfg);
        let mut out = vec![connection_log("Session reset.")];
        out.extend(self.open());
        out
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// `true` while a sender phase change waits for the timer to go idle.
    pub fn is_reinit_pending(&self) -> bool {
        self.reinit_pending
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn start_transfer(&mut self, out: &mut Vec<SimEvent>) {
        let init = SenderInit {
            total_segments: self.total_segments,
            timeout_secs: self.timeout_secs,
            window: None,
            congestion: None,
        };
        out.extend(
            self.sender
                .handle(SenderCommand::Init(init))
                .into_iter()
                .map(SimEvent::Sender),
        );
        out.extend(
            self.receiver
                .handle(ReceiverCommand::Init { expected_seq: None })
                .into_iter()
                .map(SimEvent::Receiver),
        );
        let sub = TransferPhase::from_sender(self.sender.snapshot().phase)
            .unwrap_or(TransferPhase::Window);
        self.transition(ConnectionPhase::Transfer(sub), out);
    }

    /// Follow the sender after every command it processed.
    fn observe(&mut self, out: &mut Vec<SimEvent>) {
        let ConnectionPhase::Transfer(current) = self.phase else {
            return;
        };
        let Some(reported) = TransferPhase::from_sender(self.sender.snapshot().phase) else {
            self.reinit_pending = false;
            out.push(connection_log(
                "Transfer complete, entering connection closure.",
            ));
            self.transition(ConnectionPhase::Closure, out);
            return;
        };

        self.reinit_pending = reported != current;
        if !self.reinit_pending {
            return;
        }
        if self.sender.timer().is_active() {
            log::debug!("[session] phase change to {reported} deferred, timer live");
            return;
        }
        self.reinit(reported, out);
    }

    /// Re-initialize both engines from their own state under a new sub-phase.
    fn reinit(&mut self, next: TransferPhase, out: &mut Vec<SimEvent>) {
        self.reinit_pending = false;
        let init = SenderInit {
            total_segments: self.total_segments,
            timeout_secs: self.timeout_secs,
            window: Some(self.sender.window()),
            congestion: Some(self.sender.congestion()),
        };
        let expected_seq = self.receiver.expected_seq();
        log::info!("[session] re-initializing engines for {next}");

        out.extend(
            self.sender
                .handle(SenderCommand::Init(init))
                .into_iter()
                .map(SimEvent::Sender),
        );
        out.extend(
            self.receiver
                .handle(ReceiverCommand::Init {
                    expected_seq: Some(expected_seq),
                })
                .into_iter()
                .map(SimEvent::Receiver),
        );
        self.transition(ConnectionPhase::Transfer(next), out);
    }

    fn transition(&mut self, to: ConnectionPhase, out: &mut Vec<SimEvent>) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        log::info!("[session] phase {from} -> {to}");
        out.push(SimEvent::Connection(ConnectionEvent::PhaseChanged { from, to }));
    }
}

fn connection_log(text: impl Into<String>) -> SimEvent {
    SimEvent::Connection(ConnectionEvent::Log { text: text.into() })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
