//! Session configuration.
//!
//! Every demo mode of the simulator is a preset over one engine: the same
//! sender runs Stop-and-Wait, Go-Back-N, Slow Start, AIMD and the combined
//! TCP policy, differing only in the policy and the three gating knobs below.
//! [`SimConfig::preset`] builds the preset; individual fields may then be
//! overridden (the CLI does this from flags) before [`SimConfig::validate`].

use std::fmt;
use std::str::FromStr;

use crate::congestion::Policy;
use crate::error::ConfigError;
use crate::timer::TimerConfig;

/// Default cap for exponential window growth.
pub const DEFAULT_WINDOW_CAP: u32 = 100;

// ---------------------------------------------------------------------------
// Knobs
// ---------------------------------------------------------------------------

/// When the retransmission timer is cancelled after an ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRenewal {
    /// Cancel once `base` reaches the end of the sent window; otherwise leave
    /// the running countdown untouched.
    OnDrain,
    /// Cancel once nothing is outstanding; otherwise restart the countdown
    /// for the new oldest segment.
    PerAck,
}

/// When `ResendWindow` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendGate {
    Anytime,
    /// Only while the timer is idle (it fired, or a drain cancelled it).
    WhenTimerIdle,
}

/// How policy targets reach `cwnd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyGate {
    /// Staged in `required_window_size` until Increase/Decrease is issued.
    Manual,
    /// Copied into `cwnd` as soon as the policy computes them.
    Auto,
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Demo mode presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    StopAndWait,
    GoBackN,
    SlowStart,
    Aimd,
    Tcp,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "stop-and-wait" | "sw" => Ok(Mode::StopAndWait),
            "go-back-n" | "gbn" => Ok(Mode::GoBackN),
            "slow-start" => Ok(Mode::SlowStart),
            "aimd" => Ok(Mode::Aimd),
            "tcp" | "combined" => Ok(Mode::Tcp),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::StopAndWait => "stop-and-wait",
            Mode::GoBackN => "go-back-n",
            Mode::SlowStart => "slow-start",
            Mode::Aimd => "aimd",
            Mode::Tcp => "tcp",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub mode: Mode,
    pub policy: Policy,
    /// Segments in the stream.
    pub total_segments: u32,
    pub timer: TimerConfig,
    pub initial_window: u32,
    pub ssthresh: u32,
    pub timer_renewal: TimerRenewal,
    pub resend_gate: ResendGate,
    pub apply_gate: ApplyGate,
    /// Start in the handshake phase instead of directly in transfer.
    pub handshake: bool,
    /// One-way network delay, in ticks.
    pub transit_ticks: u32,
    /// Probability of losing each segment and each ACK in a generated plan.
    pub loss_rate: f64,
    /// Seed for the generated loss plan.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::preset(Mode::Tcp)
    }
}

impl SimConfig {
    pub fn preset(mode: Mode) -> Self {
        let base = Self {
            mode,
            policy: Policy::Fixed,
            total_segments: 20,
            timer: TimerConfig::default(),
            initial_window: 1,
            ssthresh: 1,
            timer_renewal: TimerRenewal::PerAck,
            resend_gate: ResendGate::Anytime,
            apply_gate: ApplyGate::Manual,
            handshake: false,
            transit_ticks: 1,
            loss_rate: 0.0,
            seed: 0,
        };
        match mode {
            Mode::StopAndWait => base,
            Mode::GoBackN => Self {
                initial_window: 4,
                ssthresh: 4,
                ..base
            },
            Mode::SlowStart => Self {
                policy: Policy::SlowStart {
                    cap: DEFAULT_WINDOW_CAP,
                },
                ssthresh: DEFAULT_WINDOW_CAP,
                resend_gate: ResendGate::WhenTimerIdle,
                ..base
            },
            Mode::Aimd => Self {
                policy: Policy::Aimd,
                initial_window: 4,
                ssthresh: 4,
                timer_renewal: TimerRenewal::OnDrain,
                resend_gate: ResendGate::WhenTimerIdle,
                ..base
            },
            Mode::Tcp => Self {
                policy: Policy::Combined {
                    cap: DEFAULT_WINDOW_CAP,
                },
                ssthresh: 4,
                timer_renewal: TimerRenewal::OnDrain,
                resend_gate: ResendGate::WhenTimerIdle,
                handshake: true,
                ..base
            },
        }
    }

    /// Replace the growth cap of capped policies.
    pub fn with_cap(mut self, cap: u32) -> Self {
        self.policy = match self.policy {
            Policy::SlowStart { .. } => Policy::SlowStart { cap },
            Policy::Combined { .. } => Policy::Combined { cap },
            other => other,
        };
        self
    }

    /// `true` when policy targets wait for an operator apply command.
    pub fn is_gated(&self) -> bool {
        self.policy.is_adaptive() && self.apply_gate == ApplyGate::Manual
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_segments == 0 {
            return Err(ConfigError::NoSegments);
        }
        if self.timer.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.initial_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.ssthresh == 0 {
            return Err(ConfigError::ZeroSsthresh);
        }
        if let Some(cap) = self.policy.cap() {
            if self.initial_window > cap {
                return Err(ConfigError::WindowAboveCap {
                    window: self.initial_window,
                    cap,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(ConfigError::LossRate(self.loss_rate));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
