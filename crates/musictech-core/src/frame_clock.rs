//! Fixed-rate render pacing
//!
//! The clock hands out one tick per frame interval. When the caller falls
//! behind, the missed deadlines are counted and skipped; they are never
//! delivered as a burst of catch-up ticks.

use crate::config::FrameConfig;
use crate::{CoreError, Result};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// One render tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Frames delivered so far, starting at 1
    pub index: u64,
    /// Fixed frame interval in seconds
    pub dt: f32,
    /// Time since the clock started
    pub elapsed: Duration,
    /// Deadlines skipped right before this tick
    pub skipped: u64,
}

/// Deadline-based frame scheduler
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    start: Instant,
    next_deadline: Instant,
    frames: u64,
    skipped_total: u64,
}

impl FrameClock {
    /// Clock starting now; the first tick is due one interval from now
    pub fn new(target_fps: f32) -> Result<Self> {
        Self::starting_at(target_fps, Instant::now())
    }

    /// Clock using the configured frame rate
    pub fn from_config(config: &FrameConfig) -> Result<Self> {
        Self::new(config.target_fps)
    }

    /// Clock whose time origin is `start`
    pub fn starting_at(target_fps: f32, start: Instant) -> Result<Self> {
        if !target_fps.is_finite() || target_fps <= 0.0 {
            return Err(CoreError::InvalidFrameRate(target_fps));
        }
        let interval = Duration::from_secs_f64(1.0 / target_fps as f64);
        debug!(
            "FrameClock created: {} fps ({:.3} ms)",
            target_fps,
            interval.as_secs_f64() * 1000.0
        );
        Ok(Self {
            interval,
            start,
            next_deadline: start + interval,
            frames: 0,
            skipped_total: 0,
        })
    }

    /// Non-blocking poll: a tick if the next deadline has passed
    pub fn advance_to(&mut self, now: Instant) -> Option<FrameTick> {
        if now < self.next_deadline {
            return None;
        }

        let late = now.duration_since(self.next_deadline);
        let missed = late.as_nanos() / self.interval.as_nanos();
        let skipped = u64::try_from(missed).unwrap_or(u64::MAX);
        self.next_deadline = self
            .next_deadline
            .checked_add(span(self.interval, missed.saturating_add(1)))
            .unwrap_or(now + self.interval);
        self.frames += 1;
        self.skipped_total = self.skipped_total.saturating_add(skipped);

        if skipped > 0 {
            trace!("FrameClock skipped {} frame(s) before #{}", skipped, self.frames);
        }

        Some(FrameTick {
            index: self.frames,
            dt: self.interval.as_secs_f32(),
            elapsed: now.duration_since(self.start),
            skipped,
        })
    }

    /// Sleep until the next deadline and return its tick
    pub fn wait_next(&mut self) -> FrameTick {
        loop {
            let now = Instant::now();
            if let Some(tick) = self.advance_to(now) {
                return tick;
            }
            std::thread::sleep(self.next_deadline.saturating_duration_since(now));
        }
    }

    /// Time left until the next deadline
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }

    /// Fixed frame interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks delivered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Deadlines skipped so far
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total
    }
}

/// `interval * steps` without truncating the step count
fn span(interval: Duration, steps: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let nanos = interval.as_nanos().saturating_mul(steps);
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}
