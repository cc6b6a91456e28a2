//! Error types for the simulator.
//!
//! Engines never fail on operator input.  A command that violates a window or
//! policy guard is turned into a [`Rejection`], whose `Display` text is what
//! the operator sees in the resulting `Log` event.  The remaining types cover
//! configuration, command parsing, and the async session handle.

use thiserror::Error;

/// A guard violation: the command was refused and no state was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("All segments acknowledged, no further sends are accepted.")]
    Closed,

    #[error("Handshake not complete, transfer commands are not accepted yet.")]
    HandshakePending,

    #[error("Please wait for the timeout to occur before sending more segments!")]
    AwaitTimeout,

    #[error("Please adjust the window size to the required size of {required} before {action}!")]
    AdjustWindow { required: u32, action: &'static str },

    #[error("Please move the window!")]
    MoveWindowFirst,

    #[error("Please move the window before resending segments!")]
    MoveBeforeResend,

    #[error("Segment {seq} already sent, please use resend window or move window!")]
    AlreadySent { seq: u32 },

    #[error("No segments left to send.")]
    NothingToSend,

    #[error("Cannot move window beyond base {base}.")]
    MoveBeyondBase { base: u32 },

    #[error("Cannot resend segments during an active timeout!")]
    ResendDuringTimer,

    #[error("No segments to resend!")]
    NothingToResend,

    #[error("Cannot {action} window size during an active timeout!")]
    WindowChangeDuringTimer { action: &'static str },

    #[error("No pending window {direction} (cwnd {cwnd}, required {required}).")]
    NoPendingChange {
        direction: &'static str,
        cwnd: u32,
        required: u32,
    },

    #[error("Window size cannot be less than 1.")]
    BelowOne,

    #[error("Window size cannot exceed the cap of {cap}.")]
    AboveCap { cap: u32 },

    #[error("ACK {ack} is for a segment that was never sent (next {next_seq}).")]
    AckBeyondNext { ack: u32, next_seq: u32 },
}

/// Invalid [`crate::config::SimConfig`] values, reported before a session starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("total segments must be at least 1")]
    NoSegments,
    #[error("timeout must be at least 1 second")]
    ZeroTimeout,
    #[error("initial window must be at least 1")]
    ZeroWindow,
    #[error("ssthresh must be at least 1")]
    ZeroSsthresh,
    #[error("initial window {window} exceeds the window cap {cap}")]
    WindowAboveCap { window: u32, cap: u32 },
    #[error("loss rate {0} is outside [0, 1]")]
    LossRate(f64),
}

/// An operator command line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("command `{0}` requires a numeric argument")]
    MissingArgument(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// Errors surfaced by the async [`crate::session::SessionHandle`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The background task has exited and no longer accepts commands.
    #[error("session closed")]
    Closed,
    #[error(transparent)]
    Config(#[from] ConfigError),
}
