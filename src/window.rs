//! Sliding-window pointers and the per-segment status table.
//!
//! # Sequence-number layout
//!
//! ```text
//!  window_base   base             next_seq
//!      │          │                  │
//!  ────┼──────────┼──────────────────┼──────────────▶ seq space
//!      │ acked,   │ <── in flight ──▶│ <── unsent ──▶
//!      │ not yet  │                  │
//!      │ moved    │                  │
//! ```
//!
//! Invariant: `window_base <= base <= next_seq <= total`.  The window size
//! itself is the congestion window and lives in
//! [`crate::congestion::CongestionState`].

use std::fmt;

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Unsent,
    Sent,
    Acknowledged,
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentStatus::Unsent => "unsent",
            SegmentStatus::Sent => "sent",
            SegmentStatus::Acknowledged => "acked",
        };
        f.write_str(s)
    }
}

/// One slot of the stream, created at init and kept until the session resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub seq: u32,
    pub status: SegmentStatus,
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Window pointers.  Carried across connection phases as part of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    /// Oldest unacknowledged sequence number.
    pub base: u32,
    /// Operator-visible start of the window; advanced only by MoveWindow.
    pub window_base: u32,
    /// First sequence number never sent.
    pub next_seq: u32,
}

impl Window {
    /// `true` when at least one segment is awaiting acknowledgement.
    pub fn has_unacked(&self) -> bool {
        self.base != self.next_seq
    }

    /// Pointer ordering holds for a stream of `total` segments.
    pub fn is_consistent(&self, total: u32) -> bool {
        self.window_base <= self.base && self.base <= self.next_seq && self.next_seq <= total
    }

    /// Clamp a carried-over snapshot into a valid window for `total` segments.
    pub fn clamped(self, total: u32) -> Self {
        let next_seq = self.next_seq.min(total);
        let base = self.base.min(next_seq);
        let window_base = self.window_base.min(base);
        Self {
            base,
            window_base,
            next_seq,
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentTable
// ---------------------------------------------------------------------------

/// Status of every segment in the stream.
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    segments: Vec<Segment>,
}

impl SegmentTable {
    /// Build the table for `total` segments, deriving each status from `window`.
    pub fn new(total: u32, window: &Window) -> Self {
        let segments = (0..total)
            .map(|seq| Segment {
                seq,
                status: if seq < window.base {
                    SegmentStatus::Acknowledged
                } else if seq < window.next_seq {
                    SegmentStatus::Sent
                } else {
                    SegmentStatus::Unsent
                },
            })
            .collect();
        Self { segments }
    }

    pub fn get(&self, seq: u32) -> Option<&Segment> {
        self.segments.get(seq as usize)
    }

    /// Mark `seq` as transmitted.  Acknowledged segments stay acknowledged.
    pub fn mark_sent(&mut self, seq: u32) {
        if let Some(seg) = self.segments.get_mut(seq as usize) {
            if seg.status == SegmentStatus::Unsent {
                seg.status = SegmentStatus::Sent;
            }
        }
    }

    /// Cumulative ACK: everything up to and including `ack` is acknowledged.
    pub fn mark_acked_through(&mut self, ack: u32) {
        let end = (ack as usize + 1).min(self.segments.len());
        for seg in &mut self.segments[..end] {
            seg.status = SegmentStatus::Acknowledged;
        }
    }

    pub fn count(&self, status: SegmentStatus) -> usize {
        self.segments.iter().filter(|s| s.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_derives_status_from_snapshot() {
        let w = Window {
            base: 2,
            window_base: 1,
            next_seq: 4,
        };
        let t = SegmentTable::new(6, &w);
        assert_eq!(t.count(SegmentStatus::Acknowledged), 2);
        assert_eq!(t.count(SegmentStatus::Sent), 2);
        assert_eq!(t.count(SegmentStatus::Unsent), 2);
    }

    #[test]
    fn cumulative_ack_marks_prefix() {
        let mut t = SegmentTable::new(5, &Window::default());
        for seq in 0..4 {
            t.mark_sent(seq);
        }
        t.mark_acked_through(2);
        assert_eq!(t.get(2).unwrap().status, SegmentStatus::Acknowledged);
        assert_eq!(t.get(3).unwrap().status, SegmentStatus::Sent);
        assert_eq!(t.get(4).unwrap().status, SegmentStatus::Unsent);
    }

    #[test]
    fn resend_does_not_unack() {
        let mut t = SegmentTable::new(2, &Window::default());
        t.mark_sent(0);
        t.mark_acked_through(0);
        t.mark_sent(0);
        assert_eq!(t.get(0).unwrap().status, SegmentStatus::Acknowledged);
    }

    #[test]
    fn clamped_restores_ordering() {
        let w = Window {
            base: 9,
            window_base: 12,
            next_seq: 30,
        }
        .clamped(10);
        assert!(w.is_consistent(10));
        assert_eq!(w.next_seq, 10);
        assert_eq!(w.base, 9);
        assert_eq!(w.window_base, 9);
    }
}
