//! Retransmission timer.
//!
//! One simulated countdown per sender, bound to the oldest unacknowledged
//! segment.  Time only moves when the owner calls [`RetransmitTimer::tick`],
//! once per simulated second, so tests can drive it without real delays.
//!
//! Lifecycle:
//! - [`RetransmitTimer::start`] arms the countdown at `timeout_secs`.  Starting
//!   an armed timer replaces the running countdown; there is never more than
//!   one.
//! - [`RetransmitTimer::tick`] decrements by one second.  On reaching zero the
//!   timer disarms itself and reports [`TickOutcome::Expired`].
//! - [`RetransmitTimer::cancel`] disarms without firing.

/// Adjustable timeout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Seconds from arming to expiry.
    pub timeout_secs: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self { timeout_secs: 7 }
    }
}

/// What one tick did to an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting down.
    Running { seconds_left: u32, base: u32 },
    /// Reached zero; the timer is now disarmed.
    Expired { base: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Countdown {
    seconds_left: u32,
    owner_base: u32,
}

/// The single retransmission timer owned by a sender.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    pub config: TimerConfig,
    armed: Option<Countdown>,
}

impl Default for RetransmitTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl RetransmitTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self { config, armed: None }
    }

    /// Arm (or re-arm) the countdown for segment `base`.
    ///
    /// Returns the full timeout, which the caller reports as the first tick.
    pub fn start(&mut self, base: u32) -> u32 {
        if let Some(prev) = self.armed {
            log::debug!(
                "[timer] replacing countdown for base {} ({}s left)",
                prev.owner_base,
                prev.seconds_left
            );
        }
        self.armed = Some(Countdown {
            seconds_left: self.config.timeout_secs,
            owner_base: base,
        });
        self.config.timeout_secs
    }

    /// Hand a running countdown to a new oldest segment without resetting it.
    pub fn rebind(&mut self, base: u32) {
        if let Some(countdown) = self.armed.as_mut() {
            countdown.owner_base = base;
        }
    }

    /// Disarm.  Returns `true` if a countdown was actually running.
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    /// Advance one simulated second.  `None` when disarmed.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        let countdown = self.armed.as_mut()?;
        countdown.seconds_left = countdown.seconds_left.saturating_sub(1);
        let base = countdown.owner_base;
        if countdown.seconds_left == 0 {
            self.armed = None;
            log::debug!("[timer] expired for base {base}");
            Some(TickOutcome::Expired { base })
        } else {
            Some(TickOutcome::Running {
                seconds_left: countdown.seconds_left,
                base,
            })
        }
    }

    pub fn is_active(&self) -> bool {
        self.armed.is_some()
    }

    pub fn seconds_left(&self) -> Option<u32> {
        self.armed.map(|c| c.seconds_left)
    }

    /// Segment the running countdown protects.
    pub fn owner_base(&self) -> Option<u32> {
        self.armed.map(|c| c.owner_base)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
