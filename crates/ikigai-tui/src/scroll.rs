// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Mouse-wheel burst detection.
//!
//! Many terminals translate wheel ticks into rapid bursts of arrow-key
//! sequences.  The detector watches inter-arrival times: two arrows inside
//! the threshold are a wheel tick; a lone arrow that outlives the threshold
//! was a real keystroke.  Timestamps are passed in explicitly so the state
//! machine is testable without a clock.

/// Default burst threshold in milliseconds.
pub const BURST_THRESHOLD_MS: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowDirection {
    Up,
    Down,
}

/// What the caller should do with an arrow it just fed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollResult {
    /// Nothing yet; the arrow is pending classification.
    None,
    /// Emit a wheel tick.
    WheelUp,
    WheelDown,
    /// Emit a keyboard arrow (the previously pending one).
    ArrowUp,
    ArrowDown,
    /// Part of an ongoing wheel burst; swallow it.
    Absorbed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Waiting,
    Absorbing,
}

#[derive(Debug)]
pub struct ScrollDetector {
    state: State,
    pending_dir: ArrowDirection,
    timer_start_ms: i64,
    burst_threshold_ms: i64,
}

impl Default for ScrollDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollDetector {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            pending_dir: ArrowDirection::Up,
            timer_start_ms: 0,
            burst_threshold_ms: BURST_THRESHOLD_MS,
        }
    }

    #[cfg(test)]
    fn with_threshold(threshold_ms: i64) -> Self {
        Self { burst_threshold_ms: threshold_ms, ..Self::new() }
    }

    fn wheel_result(dir: ArrowDirection) -> ScrollResult {
        match dir {
            ArrowDirection::Up => ScrollResult::WheelUp,
            ArrowDirection::Down => ScrollResult::WheelDown,
        }
    }

    fn arrow_result(dir: ArrowDirection) -> ScrollResult {
        match dir {
            ArrowDirection::Up => ScrollResult::ArrowUp,
            ArrowDirection::Down => ScrollResult::ArrowDown,
        }
    }

    /// Process an up/down arrow observed at `timestamp_ms`.
    pub fn process_arrow(&mut self, dir: ArrowDirection, timestamp_ms: i64) -> ScrollResult {
        let elapsed = timestamp_ms - self.timer_start_ms;
        match self.state {
            State::Idle => {
                self.state = State::Waiting;
                self.pending_dir = dir;
                self.timer_start_ms = timestamp_ms;
                ScrollResult::None
            }
            State::Waiting => {
                if elapsed <= self.burst_threshold_ms {
                    // Second arrow within the window: a wheel burst.
                    let result = Self::wheel_result(self.pending_dir);
                    self.state = State::Absorbing;
                    self.timer_start_ms = timestamp_ms;
                    result
                } else {
                    // The pending arrow was a real keystroke; this new one
                    // starts its own classification window.
                    let result = Self::arrow_result(self.pending_dir);
                    self.pending_dir = dir;
                    self.timer_start_ms = timestamp_ms;
                    result
                }
            }
            State::Absorbing => {
                if elapsed <= self.burst_threshold_ms {
                    self.timer_start_ms = timestamp_ms;
                    ScrollResult::Absorbed
                } else {
                    // Burst over; a new one may be starting.
                    self.state = State::Waiting;
                    self.pending_dir = dir;
                    self.timer_start_ms = timestamp_ms;
                    ScrollResult::None
                }
            }
        }
    }

    /// Flush a pending arrow whose window expired by `timestamp_ms`.
    pub fn check_timeout(&mut self, timestamp_ms: i64) -> ScrollResult {
        if self.state == State::Idle {
            return ScrollResult::None;
        }
        let elapsed = timestamp_ms - self.timer_start_ms;
        if elapsed <= self.burst_threshold_ms {
            return ScrollResult::None;
        }
        if self.state == State::Waiting {
            let result = Self::arrow_result(self.pending_dir);
            self.state = State::Idle;
            return result;
        }
        // Absorbing: the burst simply ended.
        self.state = State::Idle;
        ScrollResult::None
    }

    /// Milliseconds until a pending entry must be flushed; `None` when idle.
    pub fn timeout_ms(&self, timestamp_ms: i64) -> Option<i64> {
        if self.state == State::Idle {
            return None;
        }
        let remaining = self.burst_threshold_ms - (timestamp_ms - self.timer_start_ms);
        Some(remaining.max(0))
    }

    /// Force the pending arrow out immediately.
    pub fn flush(&mut self) -> ScrollResult {
        if self.state == State::Waiting {
            let result = Self::arrow_result(self.pending_dir);
            self.state = State::Idle;
            return result;
        }
        // Idle or absorbing: nothing pending (a burst already emitted its
        // wheel event).
        self.state = State::Idle;
        ScrollResult::None
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
