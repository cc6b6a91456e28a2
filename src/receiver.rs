//! Receive-side state machine.
//!
//! [`ReceiverEngine`] accepts only the segment it expects next and answers
//! with cumulative ACKs:
//!
//! - `seq == expected_seq`: accept, send `ACK expected_seq`, advance.
//! - anything else (gap or duplicate): discard and re-ACK the last in-order
//!   segment, `expected_seq - 1`.  Nothing is sent before the first segment
//!   has been accepted, since there is no ACK below zero.
//!
//! No timer and no buffering of out-of-order data; like the sender, the
//! engine returns events and leaves delivery to the caller.

use crate::event::{ReceiverCommand, ReceiverEvent};

#[derive(Debug, Default)]
pub struct ReceiverEngine {
    expected_seq: u32,
}

impl ReceiverEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, cmd: ReceiverCommand) -> Vec<ReceiverEvent> {
        match cmd {
            ReceiverCommand::Init { expected_seq } => self.init(expected_seq.unwrap_or(0)),
            ReceiverCommand::ReceivePacket { seq } => self.on_segment(seq),
        }
    }

    /// Next in-order sequence number.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    fn init(&mut self, expected_seq: u32) -> Vec<ReceiverEvent> {
        self.expected_seq = expected_seq;
        log::debug!("[receiver] init expected={expected_seq}");
        vec![ReceiverEvent::StateUpdate { expected_seq }]
    }

    fn on_segment(&mut self, seq: u32) -> Vec<ReceiverEvent> {
        if seq == self.expected_seq {
            let ack = self.expected_seq;
            self.expected_seq += 1;
            log::debug!("[receiver] accepted {seq}; ACK {ack}");
            return vec![
                ReceiverEvent::Log {
                    text: format!("Segment {seq} received correctly. Sending ACK {ack}."),
                },
                ReceiverEvent::SendAck { ack },
                ReceiverEvent::StateUpdate {
                    expected_seq: self.expected_seq,
                },
            ];
        }

        log::debug!("[receiver] discarded {seq} (expected {})", self.expected_seq);
        match self.expected_seq.checked_sub(1) {
            Some(last) => vec![
                ReceiverEvent::Log {
                    text: format!(
                        "Segment {seq} discarded (expected {}). Resending ACK {last}.",
                        self.expected_seq
                    ),
                },
                ReceiverEvent::SendAck { ack: last },
            ],
            None => vec![ReceiverEvent::Log {
                text: format!("Segment {seq} discarded (expected 0). Nothing to ACK yet."),
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
