//! Send-side state machine shared by every ARQ variant.
//!
//! [`SenderEngine`] owns the window pointers, the segment table, the
//! congestion state and the single retransmission timer.  It never performs
//! I/O: each command returns the events it produced, and the caller routes
//! `SendSegment` events into the network.
//!
//! # Protocol contract
//!
//! - New segments are only sent from a fully drained window whose
//!   `window_base` has been moved up to `base`, and only when no policy
//!   change is pending (`cwnd == required_window_size`).
//! - ACKs are **cumulative**: `ack = k` confirms every segment `<= k`, so
//!   `base` becomes `k + 1`.  ACKs below `base` are stale and ignored.
//! - The timer is started when the first segment of an empty window goes out
//!   and restarted on resend; when it stops depends on [`TimerRenewal`].
//! - Policy targets are staged in `required_window_size`.  Under a manual
//!   apply gate only Increase/Decrease copy them into `cwnd`.
//! - Acknowledging the last segment moves the phase to `closure`; no send is
//!   accepted afterwards.
//!
//! Guard violations leave the state untouched and produce a single `Log`
//! event carrying the [`Rejection`] text.

use crate::config::{ApplyGate, ResendGate, SimConfig, TimerRenewal};
use crate::congestion::{CongestionState, Phase, Policy};
use crate::error::Rejection;
use crate::event::{SenderCommand, SenderEvent, SenderInit, SenderSnapshot};
use crate::timer::{RetransmitTimer, TickOutcome, TimerConfig};
use crate::window::{SegmentTable, Window};

// ---------------------------------------------------------------------------
// SenderOptions
// ---------------------------------------------------------------------------

/// Construction-time choices: the policy and the gating rules around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderOptions {
    pub policy: Policy,
    pub timer_renewal: TimerRenewal,
    pub resend_gate: ResendGate,
    pub apply_gate: ApplyGate,
    /// `cwnd` used when `Init` carries no congestion state.
    pub initial_window: u32,
    /// `ssthresh` used when `Init` carries no congestion state.
    pub ssthresh: u32,
}

impl From<&SimConfig> for SenderOptions {
    fn from(cfg: &SimConfig) -> Self {
        Self {
            policy: cfg.policy,
            timer_renewal: cfg.timer_renewal,
            resend_gate: cfg.resend_gate,
            apply_gate: cfg.apply_gate,
            initial_window: cfg.initial_window,
            ssthresh: cfg.ssthresh,
        }
    }
}

// ---------------------------------------------------------------------------
// SenderEngine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SenderEngine {
    options: SenderOptions,
    total: u32,
    window: Window,
    congestion: CongestionState,
    segments: SegmentTable,
    timer: RetransmitTimer,
    out: Vec<SenderEvent>,
}

impl SenderEngine {
    /// Create an engine with an empty stream.  Issue [`SenderCommand::Init`]
    /// before anything else.
    pub fn new(options: SenderOptions) -> Self {
        let congestion = CongestionState::new(
            options.policy.initial_phase(),
            options.initial_window.max(1),
            options.ssthresh.max(1),
        );
        Self {
            options,
            total: 0,
            window: Window::default(),
            congestion,
            segments: SegmentTable::default(),
            timer: RetransmitTimer::new(TimerConfig::default()),
            out: Vec::new(),
        }
    }

    /// Process one operator or network command.
    pub fn handle(&mut self, cmd: SenderCommand) -> Vec<SenderEvent> {
        let result = match cmd {
            SenderCommand::Init(init) => {
                self.init(init);
                Ok(())
            }
            SenderCommand::SendWindow => self.send_window(),
            SenderCommand::MoveWindow => self.move_window(),
            SenderCommand::ResendWindow => self.resend_window(),
            SenderCommand::ReceiveAck { ack } => self.receive_ack(ack),
            SenderCommand::IncreaseWindowManual => self.increase_window(),
            SenderCommand::DecreaseWindowManual => self.decrease_window(),
        };
        if let Err(rejection) = result {
            log::warn!("[sender] rejected: {rejection}");
            self.out.push(SenderEvent::log(rejection.to_string()));
        }
        std::mem::take(&mut self.out)
    }

    /// Advance the retransmission timer by one simulated second.
    pub fn tick(&mut self) -> Vec<SenderEvent> {
        match self.timer.tick() {
            None => {}
            Some(TickOutcome::Running { seconds_left, base }) => {
                self.out.push(SenderEvent::TimerTick { seconds_left, base });
            }
            Some(TickOutcome::Expired { base }) => {
                self.out.push(SenderEvent::TimerTick {
                    seconds_left: 0,
                    base,
                });
                self.on_timeout(base);
            }
        }
        std::mem::take(&mut self.out)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn options(&self) -> &SenderOptions {
        &self.options
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn congestion(&self) -> CongestionState {
        self.congestion
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }

    pub fn total_segments(&self) -> u32 {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.congestion.phase == Phase::Closure
    }

    /// `true` when policy targets wait for an explicit apply command.
    pub fn is_gated(&self) -> bool {
        self.options.policy.is_adaptive() && self.options.apply_gate == ApplyGate::Manual
    }

    pub fn snapshot(&self) -> SenderSnapshot {
        let adaptive = self.options.policy.is_adaptive();
        let phase = self.congestion.phase;
        SenderSnapshot {
            base: self.window.base,
            window_base: self.window.window_base,
            next_seq: self.window.next_seq,
            cwnd: self.congestion.cwnd,
            ssthresh: adaptive.then_some(self.congestion.ssthresh),
            required_window_size: self.congestion.required_window_size,
            acks_received_for_current_window: self.congestion.acks_received_for_current_window,
            phase: (adaptive || phase == Phase::Closure).then_some(phase),
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn init(&mut self, init: SenderInit) {
        self.total = init.total_segments;
        self.timer.config.timeout_secs = init.timeout_secs;
        self.window = init.window.unwrap_or_default().clamped(self.total);

        let mut congestion = init.congestion.unwrap_or_else(|| {
            CongestionState::new(
                self.options.policy.initial_phase(),
                self.options.initial_window,
                self.options.ssthresh,
            )
        });
        congestion.cwnd = congestion.cwnd.max(1);
        congestion.ssthresh = congestion.ssthresh.max(1);
        congestion.required_window_size = congestion.required_window_size.max(1);
        if self.total > 0 && self.window.base == self.total {
            congestion.phase = Phase::Closure;
        }
        self.congestion = congestion;
        self.segments = SegmentTable::new(self.total, &self.window);

        self.timer.cancel();
        self.out.push(SenderEvent::TimerStop);
        log::info!(
            "[sender] init total={} timeout={}s policy={} cwnd={} base={}",
            self.total,
            init.timeout_secs,
            self.options.policy,
            self.congestion.cwnd,
            self.window.base
        );
        self.push_state();
    }

    fn send_window(&mut self) -> Result<(), Rejection> {
        self.ensure_open()?;
        if self.congestion.has_pending_change() {
            if self.timer.is_active() {
                return Err(Rejection::AwaitTimeout);
            }
            return Err(Rejection::AdjustWindow {
                required: self.congestion.required_window_size,
                action: "sending more segments",
            });
        }
        if self.window.window_base != self.window.base {
            return Err(Rejection::MoveWindowFirst);
        }
        if self.window.has_unacked() {
            // The first slot of the window is still in flight.
            return Err(Rejection::AlreadySent {
                seq: self.window.window_base,
            });
        }

        let end = self
            .window
            .window_base
            .saturating_add(self.congestion.cwnd)
            .min(self.total);
        if self.window.next_seq >= end {
            return Err(Rejection::NothingToSend);
        }

        for seq in self.window.next_seq..end {
            if self.window.base == self.window.next_seq {
                self.start_timer();
            }
            self.out.push(SenderEvent::SendSegment { seq });
            self.segments.mark_sent(seq);
            self.window.next_seq += 1;
            self.push_state();
        }
        log::debug!(
            "[sender] sent window [{}, {}) cwnd={}",
            self.window.window_base,
            end,
            self.congestion.cwnd
        );
        Ok(())
    }

    fn move_window(&mut self) -> Result<(), Rejection> {
        if self.window.window_base >= self.window.base {
            return Err(Rejection::MoveBeyondBase {
                base: self.window.base,
            });
        }
        self.window.window_base += 1;
        self.out.push(SenderEvent::log(format!(
            "Window moved to start at segment {}.",
            self.window.window_base
        )));
        self.push_state();
        Ok(())
    }

    fn resend_window(&mut self) -> Result<(), Rejection> {
        self.ensure_open()?;
        let idle_only = self.options.resend_gate == ResendGate::WhenTimerIdle;
        if idle_only && self.timer.is_active() {
            return Err(Rejection::ResendDuringTimer);
        }
        if !self.window.has_unacked() {
            return Err(Rejection::NothingToResend);
        }
        if idle_only && self.window.window_base != self.window.base {
            return Err(Rejection::MoveBeforeResend);
        }
        if self.congestion.has_pending_change() {
            return Err(Rejection::AdjustWindow {
                required: self.congestion.required_window_size,
                action: "resending segments",
            });
        }

        let base = self.window.base;
        let end = base
            .saturating_add(self.congestion.cwnd)
            .min(self.window.next_seq);
        self.out.push(SenderEvent::log(format!(
            "Resending window from {} to {}.",
            base,
            end - 1
        )));
        for seq in base..end {
            self.out.push(SenderEvent::SendSegment { seq });
            self.segments.mark_sent(seq);
        }
        self.start_timer();
        self.push_state();
        Ok(())
    }

    fn receive_ack(&mut self, ack: u32) -> Result<(), Rejection> {
        if ack < self.window.base {
            log::debug!("[sender] stale ACK {ack} (base {})", self.window.base);
            return Ok(());
        }
        if ack >= self.window.next_seq {
            return Err(Rejection::AckBeyondNext {
                ack,
                next_seq: self.window.next_seq,
            });
        }

        // Drain detection uses the window the segments were sent with.
        let sent_cwnd = self.congestion.cwnd;

        self.congestion.acks_received_for_current_window += 1;
        if self.congestion.acks_received_for_current_window >= self.congestion.cwnd {
            self.on_window_acked();
        }

        self.window.base = ack + 1;
        self.segments.mark_acked_through(ack);
        log::debug!("[sender] ACK {ack} -> base {}", self.window.base);

        if self.window.base == self.total {
            self.stop_timer();
            self.congestion.phase = Phase::Closure;
            self.out.push(SenderEvent::log("All segments acknowledged!"));
            log::info!("[sender] stream complete ({} segments)", self.total);
            self.push_state();
            return Ok(());
        }

        match self.options.timer_renewal {
            TimerRenewal::OnDrain => {
                let drain_end = self
                    .window
                    .window_base
                    .saturating_add(sent_cwnd)
                    .min(self.window.next_seq);
                if self.window.base >= drain_end {
                    self.stop_timer();
                } else {
                    self.timer.rebind(self.window.base);
                }
            }
            TimerRenewal::PerAck => {
                if self.window.has_unacked() {
                    self.start_timer();
                } else {
                    self.stop_timer();
                }
            }
        }
        self.push_state();
        Ok(())
    }

    fn increase_window(&mut self) -> Result<(), Rejection> {
        self.ensure_open()?;
        if self.is_gated() {
            if self.timer.is_active() {
                return Err(Rejection::WindowChangeDuringTimer { action: "increase" });
            }
            if self.congestion.required_window_size <= self.congestion.cwnd {
                return Err(Rejection::NoPendingChange {
                    direction: "increase",
                    cwnd: self.congestion.cwnd,
                    required: self.congestion.required_window_size,
                });
            }
            self.apply_staged();
            return Ok(());
        }

        if let Some(cap) = self.options.policy.cap() {
            if self.congestion.cwnd >= cap {
                return Err(Rejection::AboveCap { cap });
            }
        }
        self.step_window(self.congestion.cwnd + 1, "increased");
        Ok(())
    }

    fn decrease_window(&mut self) -> Result<(), Rejection> {
        self.ensure_open()?;
        if self.is_gated() {
            if self.timer.is_active() {
                return Err(Rejection::WindowChangeDuringTimer { action: "decrease" });
            }
            if self.congestion.required_window_size < self.congestion.cwnd {
                self.apply_staged();
                return Ok(());
            }
            if self.congestion.cwnd <= 1 {
                return Err(Rejection::BelowOne);
            }
            return Err(Rejection::NoPendingChange {
                direction: "decrease",
                cwnd: self.congestion.cwnd,
                required: self.congestion.required_window_size,
            });
        }

        if self.congestion.cwnd <= 1 {
            return Err(Rejection::BelowOne);
        }
        self.step_window(self.congestion.cwnd - 1, "decreased");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Policy plumbing
    // -----------------------------------------------------------------------

    fn on_window_acked(&mut self) {
        let before = self.congestion;
        self.congestion = self.options.policy.on_window_acked(before);
        if self.congestion.required_window_size != before.required_window_size {
            self.out.push(SenderEvent::log(format!(
                "Full window ACK'd. Required window size is now {}.",
                self.congestion.required_window_size
            )));
        }
        self.log_phase_change(before.phase);
        if !self.is_gated() && self.congestion.has_pending_change() {
            self.apply_staged();
        }
    }

    fn on_timeout(&mut self, base: u32) {
        let before = self.congestion;
        self.congestion = self.options.policy.on_timeout(before);
        self.push_state();

        let text = if !self.options.policy.is_adaptive() {
            format!("TIMEOUT for segments starting from base {base}. Manual resend required.")
        } else if self.is_gated() && self.congestion.has_pending_change() {
            format!(
                "TIMEOUT for segments starting from base {base}. ssthresh is now {} and cwnd is {}; adjust the window to {}.",
                self.congestion.ssthresh,
                self.congestion.cwnd,
                self.congestion.required_window_size
            )
        } else {
            format!(
                "TIMEOUT for segments starting from base {base}. ssthresh is now {} and cwnd is {}.",
                self.congestion.ssthresh, self.congestion.cwnd
            )
        };
        log::info!("[sender] timeout base={base} required={}", self.congestion.required_window_size);
        self.out.push(SenderEvent::Log { text });
        self.out.push(SenderEvent::TimeoutEvent);

        if !self.is_gated() && self.congestion.has_pending_change() {
            self.apply_staged();
        }
    }

    /// Copy the staged target into `cwnd`.
    fn apply_staged(&mut self) {
        let before = self.congestion;
        self.congestion.cwnd = self.congestion.required_window_size;
        self.congestion = self.options.policy.on_applied(self.congestion);
        self.out.push(SenderEvent::log(format!(
            "Window size changed from {} to {} (ssthresh {}).",
            before.cwnd, self.congestion.cwnd, self.congestion.ssthresh
        )));
        self.log_phase_change(before.phase);
        self.push_state();
    }

    /// Operator override for ungated windows: `cwnd` and the target move together.
    fn step_window(&mut self, cwnd: u32, verb: &str) {
        let before = self.congestion.phase;
        self.congestion.cwnd = cwnd;
        self.congestion.required_window_size = cwnd;
        self.congestion = self.options.policy.on_applied(self.congestion);
        self.out.push(SenderEvent::log(format!(
            "Window size manually {verb} to {cwnd}."
        )));
        self.log_phase_change(before);
        self.push_state();
    }

    fn log_phase_change(&mut self, before: Phase) {
        if self.congestion.phase != before && self.congestion.phase == Phase::Aimd {
            self.out.push(SenderEvent::log("Transitioning to AIMD phase."));
            log::info!("[sender] phase {before} -> aimd");
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ensure_open(&self) -> Result<(), Rejection> {
        if self.is_complete() {
            Err(Rejection::Closed)
        } else {
            Ok(())
        }
    }

    fn start_timer(&mut self) {
        let base = self.window.base;
        let seconds_left = self.timer.start(base);
        self.out.push(SenderEvent::TimerTick { seconds_left, base });
    }

    fn stop_timer(&mut self) {
        if self.timer.cancel() {
            self.out.push(SenderEvent::TimerStop);
        }
    }

    fn push_state(&mut self) {
        let snapshot = self.snapshot();
        debug_assert!(self.window.is_consistent(self.total));
        self.out.push(SenderEvent::StateUpdate(snapshot));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
