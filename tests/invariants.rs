//! Seeded random command sequences against every preset.
//!
//! After each command the sender's pointers must stay ordered, ACKs must be
//! cumulative, the timer bookkeeping must be balanced, and gated presets must
//! never change `cwnd` outside an explicit apply command.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arq_sim::{
    config::{Mode, SimConfig},
    event::{ReceiverCommand, ReceiverEvent, SenderCommand, SenderEvent, SenderInit},
    receiver::ReceiverEngine,
    sender::{SenderEngine, SenderOptions},
};

const MODES: [Mode; 5] = [
    Mode::StopAndWait,
    Mode::GoBackN,
    Mode::SlowStart,
    Mode::Aimd,
    Mode::Tcp,
];

/// One step of a random run: either a command or a timer tick.
#[derive(Debug, Clone)]
enum Step {
    Command(SenderCommand),
    Tick,
}

fn random_step(rng: &mut StdRng, total: u32) -> Step {
    match rng.random_range(0..9) {
        0 => Step::Command(SenderCommand::SendWindow),
        1 => Step::Command(SenderCommand::MoveWindow),
        2 => Step::Command(SenderCommand::ResendWindow),
        3 => Step::Command(SenderCommand::IncreaseWindowManual),
        4 => Step::Command(SenderCommand::DecreaseWindowManual),
        5 | 6 => Step::Command(SenderCommand::ReceiveAck {
            ack: rng.random_range(0..total + 2),
        }),
        _ => Step::Tick,
    }
}

fn init(cfg: &SimConfig) -> SenderInit {
    SenderInit {
        total_segments: cfg.total_segments,
        timeout_secs: cfg.timer.timeout_secs,
        window: None,
        congestion: None,
    }
}

#[test]
fn window_pointers_stay_ordered() {
    for mode in MODES {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut cfg = SimConfig::preset(mode);
            cfg.total_segments = rng.random_range(1..16);
            cfg.timer.timeout_secs = rng.random_range(1..5);
            let total = cfg.total_segments;
            let mut s = SenderEngine::new(SenderOptions::from(&cfg));
            s.handle(SenderCommand::Init(init(&cfg)));

            for _ in 0..300 {
                let events = match random_step(&mut rng, total) {
                    Step::Command(cmd) => s.handle(cmd),
                    Step::Tick => s.tick(),
                };
                for event in &events {
                    if let SenderEvent::StateUpdate(snap) = event {
                        assert!(
                            snap.window_base <= snap.base
                                && snap.base <= snap.next_seq
                                && snap.next_seq <= total,
                            "{mode} seed {seed}: {snap:?}"
                        );
                        assert!(snap.cwnd >= 1 && snap.required_window_size >= 1);
                    }
                }
                assert!(s.window().is_consistent(total), "{mode} seed {seed}");
            }
        }
    }
}

#[test]
fn acks_are_cumulative() {
    for mode in MODES {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed ^ 0xA5);
            let mut cfg = SimConfig::preset(mode);
            cfg.total_segments = 12;
            let mut s = SenderEngine::new(SenderOptions::from(&cfg));
            s.handle(SenderCommand::Init(init(&cfg)));

            for _ in 0..300 {
                let before = s.window();
                match random_step(&mut rng, cfg.total_segments) {
                    Step::Command(SenderCommand::ReceiveAck { ack }) => {
                        s.handle(SenderCommand::ReceiveAck { ack });
                        let after = s.window();
                        if ack >= before.base && ack < before.next_seq {
                            assert_eq!(after.base, ack + 1, "{mode} seed {seed}");
                        } else {
                            assert_eq!(after.base, before.base, "{mode} seed {seed}");
                        }
                    }
                    Step::Command(cmd) => {
                        s.handle(cmd);
                        assert!(s.window().base >= before.base);
                    }
                    Step::Tick => {
                        s.tick();
                    }
                }
            }
        }
    }
}

#[test]
fn timer_stop_follows_start_or_init() {
    for mode in MODES {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(31));
            let mut cfg = SimConfig::preset(mode);
            cfg.total_segments = 10;
            cfg.timer.timeout_secs = 3;
            let mut s = SenderEngine::new(SenderOptions::from(&cfg));
            let first = s.handle(SenderCommand::Init(init(&cfg)));
            assert_eq!(first.first(), Some(&SenderEvent::TimerStop));

            // A TimerStop outside Init must close a running countdown.
            let mut running = false;
            for _ in 0..300 {
                let events = match random_step(&mut rng, cfg.total_segments) {
                    Step::Command(cmd) => s.handle(cmd),
                    Step::Tick => s.tick(),
                };
                for event in &events {
                    match event {
                        SenderEvent::TimerTick { seconds_left, .. } => running = *seconds_left > 0,
                        SenderEvent::TimerStop => {
                            assert!(running, "{mode} seed {seed}: stop without a running timer");
                            running = false;
                        }
                        _ => {}
                    }
                }
                assert_eq!(running, s.timer().is_active(), "{mode} seed {seed}");
            }
        }
    }
}

#[test]
fn gated_targets_only_apply_on_command() {
    for mode in [Mode::SlowStart, Mode::Aimd, Mode::Tcp] {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed + 1000);
            let mut cfg = SimConfig::preset(mode);
            cfg.total_segments = 30;
            cfg.timer.timeout_secs = 2;
            assert!(cfg.is_gated());
            let mut s = SenderEngine::new(SenderOptions::from(&cfg));
            s.handle(SenderCommand::Init(init(&cfg)));

            for _ in 0..400 {
                let cwnd = s.congestion().cwnd;
                let step = random_step(&mut rng, cfg.total_segments);
                let applies = matches!(
                    step,
                    Step::Command(
                        SenderCommand::IncreaseWindowManual | SenderCommand::DecreaseWindowManual
                    )
                );
                match step {
                    Step::Command(cmd) => s.handle(cmd),
                    Step::Tick => s.tick(),
                };
                if !applies {
                    assert_eq!(s.congestion().cwnd, cwnd, "{mode} seed {seed}");
                }
            }
        }
    }
}

#[test]
fn receiver_reacks_last_in_order_segment() {
    for seed in 0..50u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut r = ReceiverEngine::new();
        for _ in 0..200 {
            let expected = r.expected_seq();
            let seq = rng.random_range(0..expected + 3);
            let events = r.handle(ReceiverCommand::ReceivePacket { seq });
            let acks: Vec<u32> = events
                .iter()
                .filter_map(|e| match e {
                    ReceiverEvent::SendAck { ack } => Some(*ack),
                    _ => None,
                })
                .collect();

            if seq == expected {
                assert_eq!(acks, vec![expected]);
                assert_eq!(r.expected_seq(), expected + 1);
            } else {
                let want: Vec<u32> = expected.checked_sub(1).into_iter().collect();
                assert_eq!(acks, want, "seed {seed}");
                assert_eq!(r.expected_seq(), expected);
            }
        }
    }
}
