//! Walk-throughs of the classic ARQ and congestion-control situations,
//! driving the sender engine directly with hand-delivered ACKs.

use arq_sim::{
    config::{ApplyGate, Mode, SimConfig},
    congestion::Phase,
    error::Rejection,
    event::{SenderCommand, SenderEvent, SenderInit},
    sender::{SenderEngine, SenderOptions},
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine(cfg: &SimConfig) -> SenderEngine {
    let mut s = SenderEngine::new(SenderOptions::from(cfg));
    s.handle(SenderCommand::Init(SenderInit {
        total_segments: cfg.total_segments,
        timeout_secs: cfg.timer.timeout_secs,
        window: None,
        congestion: None,
    }));
    s
}

fn sent(events: &[SenderEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            SenderEvent::SendSegment { seq } => Some(*seq),
            _ => None,
        })
        .collect()
}

fn count(events: &[SenderEvent], wanted: &SenderEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}

fn logs(events: &[SenderEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            SenderEvent::Log { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

/// The command must be refused with `rejection` and leave the sender as it was.
fn assert_rejected(s: &mut SenderEngine, cmd: SenderCommand, rejection: Rejection) {
    let before = s.snapshot();
    let timer = (s.timer().seconds_left(), s.timer().owner_base());
    let ev = s.handle(cmd);
    assert_eq!(
        ev,
        vec![SenderEvent::Log {
            text: rejection.to_string()
        }]
    );
    assert_eq!(s.snapshot(), before);
    assert_eq!((s.timer().seconds_left(), s.timer().owner_base()), timer);
}

fn ack_range(s: &mut SenderEngine, acks: std::ops::Range<u32>) -> Vec<SenderEvent> {
    acks.flat_map(|ack| s.handle(SenderCommand::ReceiveAck { ack }))
        .collect()
}

// ---------------------------------------------------------------------------
// Scenario A: Go-Back-N, everything delivered
// ---------------------------------------------------------------------------

#[test]
fn go_back_n_full_window_drains() {
    let mut cfg = SimConfig::preset(Mode::GoBackN);
    cfg.total_segments = 10;
    let mut s = engine(&cfg);

    let ev = s.handle(SenderCommand::SendWindow);
    assert_eq!(sent(&ev), vec![0, 1, 2, 3]);
    assert!(s.timer().is_active());

    let ev = ack_range(&mut s, 0..4);
    assert_eq!(s.window().base, 4);
    assert_eq!(count(&ev, &SenderEvent::TimerStop), 1);
    assert!(!s.timer().is_active());
}

// ---------------------------------------------------------------------------
// Scenario B: Stop-and-Wait timeout and resend
// ---------------------------------------------------------------------------

#[test]
fn stop_and_wait_times_out_once() {
    let cfg = SimConfig::preset(Mode::StopAndWait);
    let mut s = engine(&cfg);
    s.handle(SenderCommand::SendWindow);

    let ticks: Vec<SenderEvent> = (0..cfg.timer.timeout_secs).flat_map(|_| s.tick()).collect();
    assert_eq!(count(&ticks, &SenderEvent::TimeoutEvent), 1);
    assert_eq!(s.window().base, 0);

    // Further ticks with no timer running are silent.
    assert!(s.tick().is_empty());

    let ev = s.handle(SenderCommand::ResendWindow);
    assert_eq!(sent(&ev), vec![0]);
    assert!(s.timer().is_active());
}

// ---------------------------------------------------------------------------
// Scenario C: Slow Start doubling into AIMD
// ---------------------------------------------------------------------------

#[test]
fn slow_start_doubles_until_threshold() {
    let cfg = SimConfig::preset(Mode::Tcp);
    assert_eq!(cfg.ssthresh, 4);
    let mut s = engine(&cfg);

    s.handle(SenderCommand::SendWindow);
    s.handle(SenderCommand::ReceiveAck { ack: 0 });
    assert_eq!(s.congestion().required_window_size, 2);
    assert_eq!(s.congestion().cwnd, 1);
    assert_eq!(s.congestion().phase, Phase::SlowStart);

    s.handle(SenderCommand::IncreaseWindowManual);
    assert_eq!(s.congestion().cwnd, 2);

    s.handle(SenderCommand::MoveWindow);
    let ev = s.handle(SenderCommand::SendWindow);
    assert_eq!(sent(&ev), vec![1, 2]);
    let ev = ack_range(&mut s, 1..3);
    assert_eq!(s.congestion().required_window_size, 4);
    assert_eq!(s.congestion().phase, Phase::Aimd);
    assert!(ev.contains(&SenderEvent::Log {
        text: "Transitioning to AIMD phase.".into()
    }));

    s.handle(SenderCommand::IncreaseWindowManual);
    assert_eq!(s.congestion().cwnd, 4);
}

#[test]
fn slow_start_preset_stops_at_cap() {
    let mut cfg = SimConfig::preset(Mode::SlowStart).with_cap(2);
    cfg.total_segments = 10;
    let mut s = engine(&cfg);

    s.handle(SenderCommand::SendWindow);
    s.handle(SenderCommand::ReceiveAck { ack: 0 });
    s.handle(SenderCommand::IncreaseWindowManual);
    s.handle(SenderCommand::MoveWindow);
    s.handle(SenderCommand::SendWindow);
    ack_range(&mut s, 1..3);

    assert_eq!(s.congestion().cwnd, 2);
    assert_eq!(s.congestion().required_window_size, 2);
    assert_eq!(s.congestion().phase, Phase::SlowStart);
}

// ---------------------------------------------------------------------------
// Scenario D: AIMD timeout halving
// ---------------------------------------------------------------------------

#[test]
fn aimd_timeout_halves_window() {
    let mut cfg = SimConfig::preset(Mode::Aimd);
    cfg.initial_window = 8;
    cfg.total_segments = 20;
    let mut s = engine(&cfg);

    s.handle(SenderCommand::SendWindow);
    for _ in 0..cfg.timer.timeout_secs {
        s.tick();
    }
    assert_eq!(s.congestion().required_window_size, 4);
    assert_eq!(s.congestion().cwnd, 8);

    // Nothing may go out until the halving is applied.
    let ev = s.handle(SenderCommand::ResendWindow);
    assert!(sent(&ev).is_empty());

    s.handle(SenderCommand::DecreaseWindowManual);
    assert_eq!(s.congestion().cwnd, 4);
    assert_eq!(s.congestion().ssthresh, 4);

    let ev = s.handle(SenderCommand::ResendWindow);
    assert_eq!(sent(&ev), vec![0, 1, 2, 3]);
}

#[test]
fn aimd_full_window_adds_one() {
    let mut cfg = SimConfig::preset(Mode::Aimd);
    cfg.total_segments = 20;
    let mut s = engine(&cfg);

    s.handle(SenderCommand::SendWindow);
    ack_range(&mut s, 0..4);
    assert_eq!(s.congestion().required_window_size, 5);

    let ev = s.handle(SenderCommand::DecreaseWindowManual);
    assert!(ev.iter().any(|e| matches!(e, SenderEvent::Log { .. })));
    assert_eq!(s.congestion().cwnd, 4);

    s.handle(SenderCommand::IncreaseWindowManual);
    assert_eq!(s.congestion().cwnd, 5);
}

// ---------------------------------------------------------------------------
// Scenario E: completion
// ---------------------------------------------------------------------------

#[test]
fn last_ack_closes_the_stream() {
    let mut cfg = SimConfig::preset(Mode::GoBackN);
    cfg.total_segments = 10;
    let mut s = engine(&cfg);

    let mut acks = 0;
    let mut events = Vec::new();
    while !s.is_complete() {
        while s.window().window_base < s.window().base {
            s.handle(SenderCommand::MoveWindow);
        }
        let burst = sent(&s.handle(SenderCommand::SendWindow));
        for ack in burst {
            events.extend(s.handle(SenderCommand::ReceiveAck { ack }));
            acks += 1;
        }
    }
    assert_eq!(acks, 10);
    assert_eq!(s.congestion().phase, Phase::Closure);
    assert_eq!(s.snapshot().phase, Some(Phase::Closure));
    assert!(events.contains(&SenderEvent::Log {
        text: "All segments acknowledged!".into()
    }));

    let ev = s.handle(SenderCommand::SendWindow);
    assert_eq!(
        ev,
        vec![SenderEvent::Log {
            text: Rejection::Closed.to_string()
        }]
    );
}

// ---------------------------------------------------------------------------
// Guard violations
// ---------------------------------------------------------------------------

#[test]
fn send_waits_for_timeout_while_change_is_staged() {
    let mut cfg = SimConfig::preset(Mode::Aimd);
    cfg.total_segments = 20;
    let mut s = engine(&cfg);

    // One cumulative ACK drains the first window but counts once.
    s.handle(SenderCommand::SendWindow);
    s.handle(SenderCommand::ReceiveAck { ack: 3 });
    for _ in 0..4 {
        s.handle(SenderCommand::MoveWindow);
    }
    s.handle(SenderCommand::SendWindow);
    ack_range(&mut s, 4..7);
    assert_eq!(s.congestion().required_window_size, 5);
    assert!(s.timer().is_active());

    assert_rejected(&mut s, SenderCommand::SendWindow, Rejection::AwaitTimeout);
}

#[test]
fn empty_stream_has_nothing_to_send() {
    let mut cfg = SimConfig::preset(Mode::GoBackN);
    cfg.total_segments = 0;
    let mut s = engine(&cfg);
    assert_rejected(&mut s, SenderCommand::SendWindow, Rejection::NothingToSend);
}

#[test]
fn resend_without_outstanding_segments() {
    let cfg = SimConfig::preset(Mode::GoBackN);
    let mut s = engine(&cfg);
    assert_rejected(&mut s, SenderCommand::ResendWindow, Rejection::NothingToResend);

    s.handle(SenderCommand::SendWindow);
    ack_range(&mut s, 0..4);
    assert_rejected(&mut s, SenderCommand::ResendWindow, Rejection::NothingToResend);
}

#[test]
fn ungated_increase_stops_at_cap() {
    let mut cfg = SimConfig::preset(Mode::SlowStart).with_cap(2);
    cfg.apply_gate = ApplyGate::Auto;
    let mut s = engine(&cfg);

    let ev = s.handle(SenderCommand::IncreaseWindowManual);
    assert_eq!(logs(&ev), vec!["Window size manually increased to 2."]);
    assert_eq!(s.congestion().cwnd, 2);

    assert_rejected(
        &mut s,
        SenderCommand::IncreaseWindowManual,
        Rejection::AboveCap { cap: 2 },
    );
}

#[test]
fn auto_gate_applies_timeout_halving() {
    let mut cfg = SimConfig::preset(Mode::Aimd);
    cfg.apply_gate = ApplyGate::Auto;
    cfg.total_segments = 20;
    cfg.timer.timeout_secs = 2;
    let mut s = engine(&cfg);

    s.handle(SenderCommand::SendWindow);
    s.tick();
    let ev = s.tick();
    assert!(ev.contains(&SenderEvent::TimeoutEvent));
    assert!(logs(&ev).contains(&"Window size changed from 4 to 2 (ssthresh 2)."));
    assert_eq!(s.congestion().cwnd, 2);
    assert_eq!(s.congestion().ssthresh, 2);
    assert!(!s.congestion().has_pending_change());

    let ev = s.handle(SenderCommand::ResendWindow);
    assert_eq!(sent(&ev), vec![0, 1]);
}
