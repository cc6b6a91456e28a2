//! In-process network boundary for deterministic simulation.
//!
//! The engines never talk to each other directly.  Every `SendSegment` and
//! `SendAck` is handed to a [`Network`], which holds it for a configurable
//! number of ticks and then either delivers it to the peer or drops it.
//!
//! Loss is not random at send time.  The operator decides ahead of time,
//! per sequence number, whether a segment and its ACK will survive, and that
//! decision is stored in a [`LossPlan`].  Flags persist: a segment marked as
//! lost is lost again on every retransmission until the operator toggles it
//! back.  A plan can also be generated from a seeded RNG so that random runs
//! are reproducible.
//!
//! Transit is FIFO per tick: payloads that arrive in the same tick are
//! delivered in the order they were sent.

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for the transit model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig {
    /// Ticks between transmission and arrival; `0` delivers synchronously.
    pub transit_ticks: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { transit_ticks: 1 }
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// What travels over the simulated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Segment { seq: u32 },
    Ack { ack: u32 },
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Segment { seq } => write!(f, "Segment {seq}"),
            Payload::Ack { ack } => write!(f, "ACK {ack}"),
        }
    }
}

/// Outcome of a payload leaving the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Delivered(Payload),
    Lost(Payload),
}

// ---------------------------------------------------------------------------
// LossPlan
// ---------------------------------------------------------------------------

/// Per-sequence success flags for segments and ACKs.
///
/// Sequence numbers outside the plan always succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LossPlan {
    segment_ok: Vec<bool>,
    ack_ok: Vec<bool>,
}

impl LossPlan {
    /// Everything succeeds.
    pub fn reliable(total: u32) -> Self {
        Self {
            segment_ok: vec![true; total as usize],
            ack_ok: vec![true; total as usize],
        }
    }

    /// Each segment and each ACK is independently lost with probability `loss_rate`.
    pub fn random(total: u32, loss_rate: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        // NaN survives `clamp`, and `random_bool` panics on it.
        let rate = if loss_rate.is_nan() {
            0.0
        } else {
            loss_rate.clamp(0.0, 1.0)
        };
        let segment_ok = (0..total).map(|_| !rng.random_bool(rate)).collect();
        let ack_ok = (0..total).map(|_| !rng.random_bool(rate)).collect();
        Self { segment_ok, ack_ok }
    }

    pub fn segment_ok(&self, seq: u32) -> bool {
        self.segment_ok.get(seq as usize).copied().unwrap_or(true)
    }

    pub fn ack_ok(&self, ack: u32) -> bool {
        self.ack_ok.get(ack as usize).copied().unwrap_or(true)
    }

    pub fn set_segment(&mut self, seq: u32, ok: bool) {
        if let Some(flag) = self.segment_ok.get_mut(seq as usize) {
            *flag = ok;
        }
    }

    pub fn set_ack(&mut self, ack: u32, ok: bool) {
        if let Some(flag) = self.ack_ok.get_mut(ack as usize) {
            *flag = ok;
        }
    }

    /// Flip the segment flag; returns the new value.
    pub fn toggle_segment(&mut self, seq: u32) -> bool {
        let ok = !self.segment_ok(seq);
        self.set_segment(seq, ok);
        self.segment_ok(seq)
    }

    /// Flip the ACK flag; returns the new value.
    pub fn toggle_ack(&mut self, ack: u32) -> bool {
        let ok = !self.ack_ok(ack);
        self.set_ack(ack, ok);
        self.ack_ok(ack)
    }

    fn survives(&self, payload: Payload) -> bool {
        match payload {
            Payload::Segment { seq } => self.segment_ok(seq),
            Payload::Ack { ack } => self.ack_ok(ack),
        }
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct InTransit {
    payload: Payload,
    ticks_left: u32,
    lost: bool,
}

/// The simulated link between sender and receiver.
#[derive(Debug, Clone)]
pub struct Network {
    pub config: NetworkConfig,
    pub plan: LossPlan,
    in_transit: VecDeque<InTransit>,
}

impl Network {
    pub fn new(config: NetworkConfig, plan: LossPlan) -> Self {
        Self {
            config,
            plan,
            in_transit: VecDeque::new(),
        }
    }

    /// Put `payload` on the link.
    ///
    /// The survive/lose decision is taken now, from the current plan.  With a
    /// zero transit delay the arrival is returned immediately.
    pub fn transmit(&mut self, payload: Payload) -> Option<Arrival> {
        let lost = !self.plan.survives(payload);
        log::debug!(
            "[net] {payload} on the wire{}",
            if lost { " (will be lost)" } else { "" }
        );
        let entry = InTransit {
            payload,
            ticks_left: self.config.transit_ticks,
            lost,
        };
        if entry.ticks_left == 0 {
            return Some(Self::arrive(entry));
        }
        self.in_transit.push_back(entry);
        None
    }

    /// Advance one tick; return everything that left the link, in send order.
    pub fn tick(&mut self) -> Vec<Arrival> {
        let mut arrived = Vec::new();
        let mut still = VecDeque::with_capacity(self.in_transit.len());
        for mut entry in self.in_transit.drain(..) {
            entry.ticks_left = entry.ticks_left.saturating_sub(1);
            if entry.ticks_left == 0 {
                arrived.push(Self::arrive(entry));
            } else {
                still.push_back(entry);
            }
        }
        self.in_transit = still;
        arrived
    }

    /// Payloads currently on the link, oldest first.
    pub fn in_flight(&self) -> impl Iterator<Item = Payload> + '_ {
        self.in_transit.iter().map(|e| e.payload)
    }

    pub fn is_idle(&self) -> bool {
        self.in_transit.is_empty()
    }

    /// Forget everything on the link.
    pub fn clear(&mut self) {
        self.in_transit.clear();
    }

    fn arrive(entry: InTransit) -> Arrival {
        if entry.lost {
            log::debug!("[net] {} lost", entry.payload);
            Arrival::Lost(entry.payload)
        } else {
            Arrival::Delivered(entry.payload)
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_delivers_synchronously() {
        let mut net = Network::new(NetworkConfig { transit_ticks: 0 }, LossPlan::reliable(4));
        let arrival = net.transmit(Payload::Segment { seq: 1 });
        assert_eq!(arrival, Some(Arrival::Delivered(Payload::Segment { seq: 1 })));
        assert!(net.is_idle());
    }

    #[test]
    fn delivers_in_send_order_after_delay() {
        let mut net = Network::new(NetworkConfig { transit_ticks: 2 }, LossPlan::reliable(4));
        assert_eq!(net.transmit(Payload::Segment { seq: 0 }), None);
        assert_eq!(net.transmit(Payload::Segment { seq: 1 }), None);

        assert!(net.tick().is_empty());
        assert_eq!(
            net.tick(),
            vec![
                Arrival::Delivered(Payload::Segment { seq: 0 }),
                Arrival::Delivered(Payload::Segment { seq: 1 }),
            ]
        );
        assert!(net.is_idle());
    }

    #[test]
    fn random_plan_treats_nan_rate_as_reliable() {
        let plan = LossPlan::random(8, f64::NAN, 3);
        assert!((0..8).all(|seq| plan.segment_ok(seq) && plan.ack_ok(seq)));

        let lossy = LossPlan::random(8, 7.5, 3);
        assert!((0..8).all(|seq| !lossy.segment_ok(seq) && !lossy.ack_ok(seq)));
    }

    #[test]
    fn loss_flags_are_persistent_until_toggled() {
        let mut plan = LossPlan::reliable(4);
        assert!(!plan.toggle_segment(2));
        let mut net = Network::new(NetworkConfig { transit_ticks: 0 }, plan);

        let first = net.transmit(Payload::Segment { seq: 2 });
        let again = net.transmit(Payload::Segment { seq: 2 });
        assert_eq!(first, Some(Arrival::Lost(Payload::Segment { seq: 2 })));
        assert_eq!(again, first);

        assert!(net.plan.toggle_segment(2));
        assert_eq!(
            net.transmit(Payload::Segment { seq: 2 }),
            Some(Arrival::Delivered(Payload::Segment { seq: 2 }))
        );
    }

    #[test]
    fn ack_flags_are_independent() {
        let mut plan = LossPlan::reliable(3);
        plan.set_ack(1, false);
        assert!(plan.segment_ok(1));
        assert!(!plan.ack_ok(1));
        // Out-of-range sequence numbers always succeed.
        assert!(plan.ack_ok(99));
    }

    #[test]
    fn random_plan_is_reproducible() {
        let a = LossPlan::random(50, 0.3, 7);
        let b = LossPlan::random(50, 0.3, 7);
        assert_eq!(a, b);
        assert_eq!(LossPlan::random(20, 0.0, 1), LossPlan::reliable(20));
        let all_lost = LossPlan::random(5, 1.0, 1);
        assert!((0..5).all(|s| !all_lost.segment_ok(s) && !all_lost.ack_ok(s)));
    }
}
