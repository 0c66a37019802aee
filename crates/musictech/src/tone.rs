//! Synthetic test signal standing in for a decoded track

use musictech_core::SampleSource;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::Duration;

/// Test tone settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    /// Partial frequencies in Hz
    pub frequencies: Vec<f32>,
    /// Peak amplitude of each partial; missing entries use the last one
    pub amplitudes: Vec<f32>,
    /// Tempo of the amplitude pulse; 0 for a steady tone
    pub bpm: f32,
    /// Stop after this many seconds; unlimited when absent
    pub duration_secs: Option<f32>,
}

impl ToneSettings {
    /// Track length, if limited
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f32)
    }
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            frequencies: vec![55.0, 440.0, 3520.0],
            amplitudes: vec![0.6, 0.25, 0.1],
            bpm: 120.0,
            duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Partial {
    step: f64,
    amplitude: f32,
    phase: f64,
}

/// Sum of sine partials with an optional decaying pulse on every beat
#[derive(Debug, Clone)]
pub struct ToneSource {
    partials: Vec<Partial>,
    sample_rate: u32,
    beat_samples: u64,
    position: u64,
    remaining: Option<u64>,
}

impl ToneSource {
    /// Silent source; add partials with [`ToneSource::with_partial`]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            partials: Vec::new(),
            sample_rate: sample_rate.max(1),
            beat_samples: 0,
            position: 0,
            remaining: None,
        }
    }

    pub fn from_settings(settings: &ToneSettings, sample_rate: u32) -> Self {
        let last = settings.amplitudes.last().copied().unwrap_or(0.5);
        let mut tone = settings
            .frequencies
            .iter()
            .enumerate()
            .fold(Self::new(sample_rate), |tone, (i, &frequency)| {
                let amplitude = settings.amplitudes.get(i).copied().unwrap_or(last);
                tone.with_partial(frequency, amplitude)
            })
            .with_pulse(settings.bpm);
        if let Some(seconds) = settings.duration_secs {
            tone = tone.with_duration(seconds);
        }
        tone
    }

    /// Add a sine at `frequency` Hz
    pub fn with_partial(mut self, frequency: f32, amplitude: f32) -> Self {
        self.partials.push(Partial {
            step: f64::from(frequency) / f64::from(self.sample_rate),
            amplitude,
            phase: 0.0,
        });
        self
    }

    /// Pulse the amplitude at `bpm` beats per minute
    pub fn with_pulse(mut self, bpm: f32) -> Self {
        self.beat_samples = if bpm.is_finite() && bpm > 0.0 {
            (60.0 * f64::from(self.sample_rate) / f64::from(bpm)) as u64
        } else {
            0
        };
        self
    }

    /// End after `seconds` of audio
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.remaining = Some((seconds.max(0.0) * self.sample_rate as f32).round() as u64);
        self
    }

    fn envelope(&self) -> f32 {
        if self.beat_samples == 0 {
            return 1.0;
        }
        let since_beat = (self.position % self.beat_samples) as f32 / self.sample_rate as f32;
        0.25 + 0.75 * (-8.0 * since_beat).exp()
    }

    fn next_sample(&mut self) -> f32 {
        let envelope = self.envelope();
        let mut sample = 0.0;
        for partial in &mut self.partials {
            sample += partial.amplitude * (partial.phase * TAU).sin() as f32;
            partial.phase = (partial.phase + partial.step).fract();
        }
        self.position += 1;
        sample * envelope
    }
}

impl SampleSource for ToneSource {
    fn read(&mut self, buffer: &mut [f32], offset: usize, count: usize) -> usize {
        let available = buffer.len().saturating_sub(offset).min(count);
        let count = match self.remaining {
            Some(remaining) => available.min(remaining as usize),
            None => available,
        };

        for slot in &mut buffer[offset..offset + count] {
            *slot = self.next_sample();
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= count as u64;
        }
        count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_respects_offset_and_count() {
        let mut tone = ToneSource::new(8_000).with_partial(1_000.0, 1.0);
        let mut buffer = [9.0f32; 10];
        assert_eq!(tone.read(&mut buffer, 2, 4), 4);
        assert_eq!(buffer[..2], [9.0, 9.0]);
        assert_eq!(buffer[6..], [9.0; 4]);
        // 1 kHz at 8 kHz: eight samples per cycle
        assert!(buffer[2].abs() < 1e-6);
        assert!((buffer[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_duration_runs_dry() {
        let mut tone = ToneSource::new(1_000).with_partial(10.0, 0.5).with_duration(0.005);
        let mut buffer = [0.0f32; 8];
        assert_eq!(tone.read(&mut buffer, 0, 8), 5);
        assert_eq!(tone.read(&mut buffer, 0, 8), 0);
        assert_eq!(tone.remaining, Some(0));
    }

    #[test]
    fn test_pulse_decays_between_beats() {
        let settings = ToneSettings {
            frequencies: vec![250.0],
            amplitudes: vec![1.0],
            bpm: 60.0,
            duration_secs: None,
        };
        let mut tone = ToneSource::from_settings(&settings, 1_000);
        let mut buffer = vec![0.0f32; 1_000];
        tone.read(&mut buffer, 0, 1_000);

        let early = buffer[..100].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let late = buffer[900..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(early > late * 2.0);
    }

    #[test]
    fn test_missing_amplitudes_reuse_last() {
        let settings = ToneSettings {
            frequencies: vec![100.0, 200.0, 300.0],
            amplitudes: vec![0.3],
            bpm: 0.0,
            duration_secs: None,
        };
        let tone = ToneSource::from_settings(&settings, 44_100);
        assert!(tone.partials.iter().all(|p| p.amplitude == 0.3));
    }
}
