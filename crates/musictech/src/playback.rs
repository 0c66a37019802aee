//! Transport state shared between the audio and render threads

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Playing flag and position, written by the audio thread
#[derive(Debug)]
pub struct PlaybackState {
    playing: AtomicBool,
    samples_played: AtomicU64,
    sample_rate: u32,
    total_nanos: AtomicU64,
}

const UNKNOWN_TOTAL: u64 = u64::MAX;

impl PlaybackState {
    /// Stopped state at position zero
    pub fn new(sample_rate: u32, total: Option<Duration>) -> Self {
        Self {
            playing: AtomicBool::new(false),
            samples_played: AtomicU64::new(0),
            sample_rate: sample_rate.max(1),
            total_nanos: AtomicU64::new(total_to_nanos(total)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    /// Count `samples` as played
    pub fn advance(&self, samples: usize) {
        self.samples_played.fetch_add(samples as u64, Ordering::AcqRel);
    }

    /// Rewind to zero, e.g. after switching sources
    pub fn rewind(&self) {
        self.samples_played.store(0, Ordering::Release);
    }

    pub fn samples_played(&self) -> u64 {
        self.samples_played.load(Ordering::Acquire)
    }

    /// Position derived from the samples played
    pub fn elapsed(&self) -> Duration {
        let samples = self.samples_played();
        let rate = u64::from(self.sample_rate);
        Duration::from_secs(samples / rate)
            + Duration::from_nanos((samples % rate) * 1_000_000_000 / rate)
    }

    /// Length of the current source, if known
    pub fn total(&self) -> Option<Duration> {
        match self.total_nanos.load(Ordering::Acquire) {
            UNKNOWN_TOTAL => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    pub fn set_total(&self, total: Option<Duration>) {
        self.total_nanos.store(total_to_nanos(total), Ordering::Release);
    }

    /// Playback progress in [0, 1], when the length is known
    pub fn progress(&self) -> Option<f32> {
        let total = self.total()?.as_secs_f32();
        if total <= 0.0 {
            return Some(1.0);
        }
        Some((self.elapsed().as_secs_f32() / total).min(1.0))
    }
}

fn total_to_nanos(total: Option<Duration>) -> u64 {
    total.map_or(UNKNOWN_TOTAL, |t| {
        u64::try_from(t.as_nanos()).map_or(UNKNOWN_TOTAL - 1, |n| n.min(UNKNOWN_TOTAL - 1))
    })
}
