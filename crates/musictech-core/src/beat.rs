//! Beat detection on the per-frame spectrum peak
//!
//! A beat is flagged when the current peak rises above the rolling mean of
//! recent peaks by a threshold ratio, at most once per cooldown window.
//! Confirmed beats also feed a tempo estimate.

use crate::config::BeatConfig;
use crate::{ensure_capacity, Result};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Number of beat timestamps kept for the tempo estimate
const TEMPO_WINDOW: usize = 16;

/// Beats required before a tempo is reported
const MIN_TEMPO_BEATS: usize = 4;

/// Details of a detected beat, handed to the on-beat hook
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Elapsed time at detection
    pub time: f32,
    /// Peak magnitude that triggered the beat
    pub magnitude: f32,
    /// How far above the rolling mean the peak was (0.0 - 1.0)
    pub strength: f32,
}

/// Rolling-mean beat detector
#[derive(Debug, Clone)]
pub struct BeatDetector {
    history: VecDeque<f32>,
    capacity: usize,
    threshold: f32,
    cooldown: f32,
    last_beat: Option<f32>,
    detected: bool,
    strength: f32,
    beat_times: VecDeque<f32>,
    tempo_bpm: Option<f32>,
}

impl BeatDetector {
    /// Create a detector from configuration
    pub fn new(config: &BeatConfig) -> Result<Self> {
        config.validate()?;
        let capacity = ensure_capacity("beat history", config.history)?;

        debug!(
            "BeatDetector created: history={}, threshold={}, cooldown={}",
            capacity, config.threshold, config.cooldown
        );

        Ok(Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            threshold: config.threshold,
            cooldown: config.cooldown,
            last_beat: None,
            detected: false,
            strength: 0.0,
            beat_times: VecDeque::with_capacity(TEMPO_WINDOW + 1),
            tempo_bpm: None,
        })
    }

    /// Feed one peak magnitude. Returns true only on the update that detects a beat.
    pub fn update(&mut self, peak: f32, is_playing: bool, elapsed: f32) -> bool {
        self.update_with(peak, is_playing, elapsed, |_| {})
    }

    /// Like [`update`](Self::update), invoking `on_beat` when a beat is detected
    pub fn update_with<F>(&mut self, peak: f32, is_playing: bool, elapsed: f32, on_beat: F) -> bool
    where
        F: FnOnce(&BeatEvent),
    {
        self.detected = false;

        if !is_playing {
            return false;
        }

        let peak = if peak.is_finite() { peak.max(0.0) } else { 0.0 };

        self.history.push_back(peak);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let mean = self.history.iter().sum::<f32>() / self.history.len() as f32;

        self.strength = if mean > 0.0 {
            (peak / mean - 1.0).clamp(0.0, 2.0) / 2.0
        } else {
            0.0
        };

        let cooled_down = match self.last_beat {
            Some(last) => elapsed - last > self.cooldown,
            None => true,
        };

        if peak > mean * (1.0 + self.threshold) && cooled_down {
            self.detected = true;
            self.last_beat = Some(elapsed);
            self.record_beat(elapsed);

            let event = BeatEvent {
                time: elapsed,
                magnitude: peak,
                strength: self.strength,
            };
            trace!("Beat at {:.3}s (peak {:.4}, mean {:.4})", elapsed, peak, mean);
            on_beat(&event);
        }

        self.detected
    }

    fn record_beat(&mut self, time: f32) {
        self.beat_times.push_back(time);
        if self.beat_times.len() > TEMPO_WINDOW {
            self.beat_times.pop_front();
        }
        self.tempo_bpm = self.estimate_tempo();
    }

    /// Trimmed mean of the recent beat intervals, folded into 60-200 BPM
    fn estimate_tempo(&self) -> Option<f32> {
        if self.beat_times.len() < MIN_TEMPO_BEATS {
            return None;
        }

        let mut intervals: Vec<f32> = self
            .beat_times
            .iter()
            .zip(self.beat_times.iter().skip(1))
            .map(|(a, b)| b - a)
            .collect();
        intervals.sort_by(|a, b| a.total_cmp(b));

        // Drop the outer quarters
        let trim = intervals.len() / 4;
        let kept = &intervals[trim..intervals.len() - trim];
        if kept.is_empty() {
            return None;
        }

        let mean_interval = kept.iter().sum::<f32>() / kept.len() as f32;
        if mean_interval <= 0.001 {
            return None;
        }

        let bpm = 60.0 / mean_interval;
        let bpm = if (60.0..=200.0).contains(&bpm) {
            bpm
        } else if (200.0..=400.0).contains(&bpm) {
            bpm / 2.0
        } else if (30.0..60.0).contains(&bpm) {
            bpm * 2.0
        } else {
            return None;
        };

        Some((bpm * 10.0).round() / 10.0)
    }

    /// Whether the last update detected a beat
    pub fn is_beat(&self) -> bool {
        self.detected
    }

    /// Strength of the last playing update (0.0 - 1.0)
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Estimated tempo, once enough beats have been seen
    pub fn tempo_bpm(&self) -> Option<f32> {
        self.tempo_bpm
    }

    /// Time of the most recent beat
    pub fn last_beat_time(&self) -> Option<f32> {
        self.last_beat
    }

    /// Number of peaks currently in the rolling history
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.history.clear();
        self.beat_times.clear();
        self.last_beat = None;
        self.detected = false;
        self.strength = 0.0;
        self.tempo_bpm = None;
    }
}
