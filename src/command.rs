//! Operator commands and their one-line text form.
//!
//! ```text
//! send | move | resend | inc | dec | handshake
//! tick [n] | lose-seg <seq> | lose-ack <seq> | status | reset
//! ```
//!
//! Words are case-insensitive; extra whitespace is ignored.

use std::str::FromStr;

use crate::error::ParseCommandError;

/// Grammar summary printed by the CLI.
pub const COMMAND_HELP: &str = "commands: send | move | resend | inc | dec | handshake | \
tick [n] | lose-seg <seq> | lose-ack <seq> | status | reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Send,
    Move,
    Resend,
    Increase,
    Decrease,
    /// Report the external handshake as finished.
    Handshake,
    /// Advance the simulated clock by this many seconds.
    Tick(u32),
    /// Toggle the loss flag of a segment.
    LoseSegment(u32),
    /// Toggle the loss flag of an ACK.
    LoseAck(u32),
    Status,
    Reset,
}

impl FromStr for OperatorCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let word = words.next().ok_or(ParseCommandError::Empty)?.to_lowercase();
        let arg = words.next();

        let cmd = match word.as_str() {
            "send" => OperatorCommand::Send,
            "move" => OperatorCommand::Move,
            "resend" => OperatorCommand::Resend,
            "inc" | "increase" => OperatorCommand::Increase,
            "dec" | "decrease" => OperatorCommand::Decrease,
            "handshake" => OperatorCommand::Handshake,
            "tick" => match arg {
                Some(n) => OperatorCommand::Tick(number(n)?),
                None => OperatorCommand::Tick(1),
            },
            "lose-seg" => OperatorCommand::LoseSegment(number(required(arg, "lose-seg")?)?),
            "lose-ack" => OperatorCommand::LoseAck(number(required(arg, "lose-ack")?)?),
            "status" => OperatorCommand::Status,
            "reset" => OperatorCommand::Reset,
            _ => return Err(ParseCommandError::Unknown(word)),
        };
        Ok(cmd)
    }
}

fn required<'a>(arg: Option<&'a str>, command: &'static str) -> Result<&'a str, ParseCommandError> {
    arg.ok_or(ParseCommandError::MissingArgument(command))
}

fn number(s: &str) -> Result<u32, ParseCommandError> {
    s.parse()
        .map_err(|_| ParseCommandError::InvalidNumber(s.to_string()))
}
