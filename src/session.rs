//! A complete simulated session: connection, engines and network.
//!
//! # Architecture
//!
//! ```text
//!  operator ──OperatorCommand──▶ Simulation ──SimEvent──▶ transcript / caller
//!                                    │
//!                    ┌───────────────┼────────────────┐
//!                    ▼               ▼                ▼
//!               Connection ◀──── Network ────▶ Connection
//!              (SenderEngine)  (loss, delay)  (ReceiverEngine)
//! ```
//!
//! [`Simulation`] is deterministic and synchronous: every `SendSegment` and
//! `SendAck` produced by a command is put on the [`Network`]; arrivals are
//! fed back to the peer engine, and so on until nothing is left to route.
//! One [`Simulation::tick`] is one simulated second: network deliveries
//! resolve first, then the retransmission timer ticks.
//!
//! [`spawn`] runs a `Simulation` on a tokio task driven by a real 1-second
//! interval, with commands and events carried over channels.
//!
//! ```ignore
//! let mut session = session::spawn(SimConfig::preset(Mode::GoBackN))?;
//! session.send(OperatorCommand::Send).await?;
//! while let Some(event) = session.next_event().await {
//!     println!("{event}");
//! }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::command::OperatorCommand;
use crate::config::SimConfig;
use crate::connection::Connection;
use crate::error::{ConfigError, SessionError};
use crate::event::{ReceiverCommand, ReceiverEvent, SenderCommand, SenderEvent, SimEvent};
use crate::simulator::{Arrival, LossPlan, Network, NetworkConfig, Payload};

/// Real time between two simulated seconds in the async driver.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

pub struct Simulation {
    config: SimConfig,
    connection: Connection,
    network: Network,
    transcript: Vec<SimEvent>,
    /// Simulated seconds since start or reset.
    now: u64,
}

impl Simulation {
    /// Validate `config` and open the connection.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let network = Network::new(
            NetworkConfig {
                transit_ticks: config.transit_ticks,
            },
            loss_plan(&config),
        );
        let mut sim = Self {
            connection: Connection::new(&config),
            network,
            config,
            transcript: Vec::new(),
            now: 0,
        };
        log::info!(
            "[session] mode={} segments={} cwnd={} timeout={}s transit={}",
            sim.config.mode,
            sim.config.total_segments,
            sim.config.initial_window,
            sim.config.timer.timeout_secs,
            sim.config.transit_ticks
        );
        let opened = sim.connection.open();
        sim.route(opened);
        Ok(sim)
    }

    /// Execute one operator command and return every event it caused.
    pub fn apply(&mut self, cmd: OperatorCommand) -> Vec<SimEvent> {
        log::debug!("[session] t={} command {cmd:?}", self.now);
        let events = match cmd {
            OperatorCommand::Send => self.connection.sender_command(SenderCommand::SendWindow),
            OperatorCommand::Move => self.connection.sender_command(SenderCommand::MoveWindow),
            OperatorCommand::Resend => self.connection.sender_command(SenderCommand::ResendWindow),
            OperatorCommand::Increase => self
                .connection
                .sender_command(SenderCommand::IncreaseWindowManual),
            OperatorCommand::Decrease => self
                .connection
                .sender_command(SenderCommand::DecreaseWindowManual),
            OperatorCommand::Handshake => self.connection.complete_handshake(),
            OperatorCommand::Tick(n) => {
                let mut out = Vec::new();
                for _ in 0..n {
                    out.extend(self.tick());
                }
                return out;
            }
            OperatorCommand::LoseSegment(seq) => {
                let ok = self.network.plan.toggle_segment(seq);
                vec![notice(format!(
                    "Segment {seq} will be {}.",
                    if ok { "delivered" } else { "lost" }
                ))]
            }
            OperatorCommand::LoseAck(ack) => {
                let ok = self.network.plan.toggle_ack(ack);
                vec![notice(format!(
                    "ACK {ack} will be {}.",
                    if ok { "delivered" } else { "lost" }
                ))]
            }
            OperatorCommand::Status => vec![notice(self.status_line())],
            OperatorCommand::Reset => {
                self.network.clear();
                self.network.plan = loss_plan(&self.config);
                self.now = 0;
                self.connection.reset(&self.config)
            }
        };
        self.route(events)
    }

    /// Advance the simulated clock by one second.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        self.now += 1;
        let mut out = Vec::new();
        for arrival in self.network.tick() {
            out.extend(self.route(vec![SimEvent::Network(arrival)]));
        }
        let fired = self.connection.tick_timer();
        out.extend(self.route(fired));
        out
    }

    /// Tick until nothing is in transit, at most `max_ticks` times.
    pub fn run_until_idle(&mut self, max_ticks: u32) -> Vec<SimEvent> {
        let mut out = Vec::new();
        for _ in 0..max_ticks {
            if self.network.is_idle() {
                break;
            }
            out.extend(self.tick());
        }
        out
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Mutable access for adjusting the loss plan directly.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Every event produced so far, in order.
    pub fn transcript(&self) -> &[SimEvent] {
        &self.transcript
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Record `events` and follow them through the network until quiescent.
    ///
    /// Events are processed in generation order; anything they trigger is
    /// queued behind them.
    fn route(&mut self, events: Vec<SimEvent>) -> Vec<SimEvent> {
        let mut queue: VecDeque<SimEvent> = events.into();
        let mut out = Vec::new();
        while let Some(event) = queue.pop_front() {
            match &event {
                SimEvent::Sender(SenderEvent::SendSegment { seq }) => {
                    if let Some(arrival) = self.network.transmit(Payload::Segment { seq: *seq }) {
                        queue.push_back(SimEvent::Network(arrival));
                    }
                }
                SimEvent::Receiver(ReceiverEvent::SendAck { ack }) => {
                    if let Some(arrival) = self.network.transmit(Payload::Ack { ack: *ack }) {
                        queue.push_back(SimEvent::Network(arrival));
                    }
                }
                SimEvent::Network(Arrival::Delivered(Payload::Segment { seq })) => {
                    queue.extend(
                        self.connection
                            .receiver_command(ReceiverCommand::ReceivePacket { seq: *seq }),
                    );
                }
                SimEvent::Network(Arrival::Delivered(Payload::Ack { ack })) => {
                    queue.extend(
                        self.connection
                            .sender_command(SenderCommand::ReceiveAck { ack: *ack }),
                    );
                }
                _ => {}
            }
            self.transcript.push(event.clone());
            out.push(event);
        }
        out
    }

    fn status_line(&self) -> String {
        let snap = self.connection.sender.snapshot();
        let timer = self.connection.sender.timer();
        let mut line = format!(
            "t={} phase={} base={} window_base={} next={} cwnd={} required={} expected={} in_transit={}",
            self.now,
            self.connection.phase(),
            snap.base,
            snap.window_base,
            snap.next_seq,
            snap.cwnd,
            snap.required_window_size,
            self.connection.receiver.expected_seq(),
            self.network.in_flight().count()
        );
        if let Some(ssthresh) = snap.ssthresh {
            line.push_str(&format!(" ssthresh={ssthresh}"));
        }
        match timer.seconds_left() {
            Some(left) => line.push_str(&format!(" timer={left}s")),
            None => line.push_str(" timer=idle"),
        }
        line
    }
}

fn loss_plan(config: &SimConfig) -> LossPlan {
    if config.loss_rate > 0.0 {
        LossPlan::random(config.total_segments, config.loss_rate, config.seed)
    } else {
        LossPlan::reliable(config.total_segments)
    }
}

fn notice(text: impl Into<String>) -> SimEvent {
    SimEvent::Notice { text: text.into() }
}

// ---------------------------------------------------------------------------
// Async driver
// ---------------------------------------------------------------------------

/// Handle to a [`Simulation`] running on a background task.
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<OperatorCommand>,

    /// Events in the order the simulation produced them.
    pub events: mpsc::UnboundedReceiver<SimEvent>,

    handle: JoinHandle<Simulation>,
}

impl SessionHandle {
    /// Queue an operator command.
    pub async fn send(&self, cmd: OperatorCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Wait for the next event; `None` once the task has exited.
    pub async fn next_event(&mut self) -> Option<SimEvent> {
        self.events.recv().await
    }

    /// Stop the task and hand back the simulation for inspection.
    pub async fn close(self) -> Result<Simulation, SessionError> {
        // Closing the command channel ends the event loop.
        drop(self.cmd_tx);
        self.handle.await.map_err(|_| SessionError::Closed)
    }
}

/// Run a simulation for `config` with a 1-second tick.
pub fn spawn(config: SimConfig) -> Result<SessionHandle, SessionError> {
    spawn_with_tick(config, TICK_PERIOD)
}

/// Run a simulation for `config`, ticking once every `period`.
pub fn spawn_with_tick(config: SimConfig, period: Duration) -> Result<SessionHandle, SessionError> {
    let sim = Simulation::new(config)?;
    let (cmd_tx, cmd_rx) = mpsc::channel::<OperatorCommand>(64);
    let (event_tx, events) = mpsc::unbounded_channel::<SimEvent>();

    for event in sim.transcript() {
        // The receiver is still held here, so this cannot fail.
        let _ = event_tx.send(event.clone());
    }
    let handle = tokio::spawn(event_loop(sim, cmd_rx, event_tx, period));

    Ok(SessionHandle {
        cmd_tx,
        events,
        handle,
    })
}

async fn event_loop(
    mut sim: Simulation,
    mut cmd_rx: mpsc::Receiver<OperatorCommand>,
    event_tx: mpsc::UnboundedSender<SimEvent>,
    period: Duration,
) -> Simulation {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    interval.tick().await;

    'session: loop {
        let events = tokio::select! {
            maybe_cmd = cmd_rx.recv() => match maybe_cmd {
                Some(cmd) => sim.apply(cmd),
                None => {
                    log::debug!("[session] command channel closed at t={}", sim.now());
                    break;
                }
            },
            _ = interval.tick() => sim.tick(),
        };
        for event in events {
            if event_tx.send(event).is_err() {
                log::debug!("[session] event receiver dropped at t={}", sim.now());
                break 'session;
            }
        }
    }
    sim
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::state::{ConnectionPhase, TransferPhase};

    fn sim(mode: Mode, transit: u32) -> Simulation {
        let mut cfg = SimConfig::preset(mode);
        cfg.total_segments = 6;
        cfg.transit_ticks = transit;
        Simulation::new(cfg).expect("valid config")
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = SimConfig::preset(Mode::GoBackN);
        cfg.total_segments = 0;
        assert!(matches!(Simulation::new(cfg), Err(ConfigError::NoSegments)));
    }

    #[test]
    fn zero_transit_resolves_within_one_command() {
        let mut s = sim(Mode::GoBackN, 0);
        s.apply(OperatorCommand::Send);
        let window = s.connection().sender.window();
        assert_eq!(window.base, 4);
        assert_eq!(window.next_seq, 4);
        assert_eq!(s.connection().receiver.expected_seq(), 4);
        assert!(!s.connection().sender.timer().is_active());
    }

    #[test]
    fn segments_then_acks_take_one_tick_each() {
        let mut s = sim(Mode::StopAndWait, 1);
        s.apply(OperatorCommand::Send);
        assert_eq!(s.network().in_flight().count(), 1);

        s.tick();
        assert_eq!(s.connection().receiver.expected_seq(), 1);
        assert_eq!(s.connection().sender.window().base, 0);

        s.tick();
        assert_eq!(s.connection().sender.window().base, 1);
        assert!(s.network().is_idle());
    }

    #[test]
    fn lost_segment_times_out() {
        let mut s = sim(Mode::StopAndWait, 1);
        s.apply(OperatorCommand::LoseSegment(0));
        s.apply(OperatorCommand::Send);
        let events = s.apply(OperatorCommand::Tick(7));
        assert!(events.contains(&SimEvent::Network(Arrival::Lost(Payload::Segment { seq: 0 }))));
        assert!(events.contains(&SimEvent::Sender(SenderEvent::TimeoutEvent)));
        assert_eq!(s.now(), 7);
    }

    #[test]
    fn ack_arriving_at_deadline_wins() {
        let mut cfg = SimConfig::preset(Mode::StopAndWait);
        cfg.timer.timeout_secs = 2;
        cfg.transit_ticks = 1;
        let mut s = Simulation::new(cfg).expect("valid config");
        s.apply(OperatorCommand::Send);
        s.tick();
        // ACK arrives on the tick the timer would reach zero.
        let events = s.tick();
        assert!(!events.contains(&SimEvent::Sender(SenderEvent::TimeoutEvent)));
        assert_eq!(s.connection().sender.window().base, 1);
    }

    #[test]
    fn handshake_gates_tcp_preset() {
        let mut s = sim(Mode::Tcp, 0);
        assert_eq!(s.connection().phase(), ConnectionPhase::Handshake);
        s.apply(OperatorCommand::Send);
        assert_eq!(s.connection().sender.window().next_seq, 0);

        s.apply(OperatorCommand::Handshake);
        assert_eq!(
            s.connection().phase(),
            ConnectionPhase::Transfer(TransferPhase::SlowStart)
        );
    }

    #[test]
    fn reset_starts_over() {
        let mut s = sim(Mode::GoBackN, 1);
        s.apply(OperatorCommand::Send);
        s.tick();
        s.apply(OperatorCommand::Reset);
        assert_eq!(s.now(), 0);
        assert!(s.network().is_idle());
        assert_eq!(s.connection().sender.window().next_seq, 0);
        assert_eq!(s.connection().receiver.expected_seq(), 0);
    }

    #[test]
    fn transcript_records_everything() {
        let mut s = sim(Mode::GoBackN, 0);
        let before = s.transcript().len();
        let events = s.apply(OperatorCommand::Status);
        assert_eq!(events.len(), 1);
        assert_eq!(s.transcript().len(), before + 1);
        assert!(events[0].to_string().starts_with("(Session): t=0 phase=transfer(window)"));
    }
}
