//! `arq-sim` — a step-by-step simulator for sliding-window ARQ and TCP-style
//! congestion control.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   segments   ┌──────────┐
//!  │  Sender  │─────────────▶│ Receiver │
//!  │  Engine  │              │  Engine  │
//!  └────┬─────┘◀─────────────└─────┬────┘
//!       │          ACKs            │
//!  ┌────▼──────────────────────────▼───┐
//!  │            Connection             │
//!  │  (handshake → transfer → closure) │
//!  └────┬──────────────────────────────┘
//!       │ SendSegment / SendAck
//!  ┌────▼──────┐
//!  │  Network  │  (per-seq loss plan, transit delay in ticks)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`sender`]      — window pointers, guards, timer and policy plumbing
//! - [`receiver`]    — in-order detector and cumulative-ACK generator
//! - [`congestion`]  — Fixed / SlowStart / AIMD / Combined policy arithmetic
//! - [`timer`]       — the single simulated retransmission countdown
//! - [`window`]      — window pointers and the per-segment status table
//! - [`event`]       — command and event messages
//! - [`state`]       — connection-phase types
//! - [`connection`]  — lifecycle sequencing and re-init on phase change
//! - [`simulator`]   — deterministic lossy network boundary
//! - [`session`]     — end-to-end simulation and its async driver
//! - [`command`]     — operator command grammar
//! - [`config`]      — presets and tunables
//! - [`error`]       — rejection, configuration and session errors

pub mod command;
pub mod config;
pub mod congestion;
pub mod connection;
pub mod error;
pub mod event;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod simulator;
pub mod state;
pub mod timer;
pub mod window;
