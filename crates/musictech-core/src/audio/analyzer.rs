//! Spectral Analyzer - streaming FFT over fixed-size sample frames
//!
//! Samples are appended one at a time into a frame of `fft_size` complex
//! values. When the frame is full it is transformed in place with rustfft,
//! the first `fft_size / 2` magnitudes are published, and the frame starts
//! over from position zero. Frames do not overlap.

use super::spectrum::{spectrum_channel, SpectrumPublisher, SpectrumReader};
use crate::config::{AnalyzerConfig, WindowFunction};
use crate::{CoreError, Result};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use tracing::{debug, trace};

/// Streaming magnitude-spectrum analyzer
///
/// Published bins cover `0 .. fft_size / 2`: the DC bin is included and the
/// Nyquist bin is not. Magnitudes are scaled by `1 / fft_size`, so a full
/// scale sinusoid centered on bin `k` reads `0.5` at bin `k`.
pub struct SpectralAnalyzer {
    /// FFT instance
    fft: Arc<dyn Fft<f32>>,

    /// Configuration
    config: AnalyzerConfig,

    /// Frame being filled, transformed in place
    frame: Vec<Complex<f32>>,

    /// FFT scratch buffer
    scratch: Vec<Complex<f32>>,

    /// Window coefficients (None for rectangular)
    window: Option<Vec<f32>>,

    /// Next write position in `frame`
    write_pos: usize,

    /// Where finished spectra go
    publisher: SpectrumPublisher,

    /// Debug: sample count
    total_samples: u64,

    /// Debug: FFT count
    frames_analyzed: u64,
}

impl SpectralAnalyzer {
    /// Create an analyzer together with the reader for its spectra
    pub fn new(config: AnalyzerConfig) -> Result<(Self, SpectrumReader)> {
        config.validate()?;
        let (publisher, reader) = spectrum_channel(config.bins());
        let analyzer = Self::with_publisher(config, publisher)?;
        Ok((analyzer, reader))
    }

    /// Create an analyzer that publishes into an existing slot.
    ///
    /// Used when the audio source changes: the fresh analyzer starts from an
    /// empty frame while readers keep the last published spectrum.
    pub fn with_publisher(config: AnalyzerConfig, publisher: SpectrumPublisher) -> Result<Self> {
        config.validate()?;
        if publisher.bins() != config.bins() {
            return Err(CoreError::InvalidParameter(format!(
                "spectrum slot holds {} bins but fft_size {} produces {}",
                publisher.bins(),
                config.fft_size,
                config.bins()
            )));
        }

        let fft_size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        let window = match config.window {
            WindowFunction::Rectangular => None,
            WindowFunction::Hann => Some(hann_window(fft_size)),
        };

        debug!(
            "SpectralAnalyzer created: fft_size={}, bins={}, window={:?}",
            fft_size,
            config.bins(),
            config.window
        );

        Ok(Self {
            fft,
            frame: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            window,
            write_pos: 0,
            publisher,
            total_samples: 0,
            frames_analyzed: 0,
            config,
        })
    }

    /// Append one sample; transforms and publishes when the frame fills up
    pub fn add_sample(&mut self, value: f32) {
        if self.publisher.take_reset_request() {
            self.reset();
        }

        // Non-finite input would poison every bin of the frame
        let value = if value.is_finite() { value } else { 0.0 };

        self.frame[self.write_pos] = Complex::new(value, 0.0);
        self.write_pos += 1;
        self.total_samples += 1;

        if self.write_pos >= self.config.fft_size {
            self.perform_fft();
            self.write_pos = 0;
        }
    }

    /// Append a block of samples
    pub fn add_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.add_sample(sample);
        }
    }

    /// Transform the full frame and publish its magnitudes
    fn perform_fft(&mut self) {
        self.frames_analyzed += 1;

        if let Some(window) = &self.window {
            for (bin, w) in self.frame.iter_mut().zip(window) {
                bin.re *= w;
            }
        }

        self.fft
            .process_with_scratch(&mut self.frame, &mut self.scratch);

        let norm_factor = 1.0 / self.config.fft_size as f32;
        let magnitudes: Vec<f32> = self.frame[..self.config.bins()]
            .iter()
            .map(|c| {
                let magnitude = c.norm() * norm_factor;
                if magnitude.is_finite() {
                    magnitude
                } else {
                    0.0
                }
            })
            .collect();

        let sequence = self.publisher.publish(magnitudes);
        self.frame.fill(Complex::new(0.0, 0.0));

        if self.frames_analyzed % 100 == 0 {
            trace!(
                "FFT #{}: published sequence {}, {} samples total",
                self.frames_analyzed,
                sequence,
                self.total_samples
            );
        }
    }

    /// Discard the partially filled frame. The published spectrum stays.
    pub fn reset(&mut self) {
        self.frame.fill(Complex::new(0.0, 0.0));
        self.write_pos = 0;

        debug!("SpectralAnalyzer reset");
    }

    /// Position the next sample will be written to
    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Transform size
    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    /// Bins per published spectrum
    pub fn bins(&self) -> usize {
        self.config.bins()
    }

    /// Number of completed transforms
    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    /// Number of samples ingested since creation
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Publisher side of the spectrum slot
    pub fn publisher(&self) -> &SpectrumPublisher {
        &self.publisher
    }

    /// Active configuration
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}

/// Periodic Hann window of `size` coefficients
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / size as f32;
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(fft_size: usize) -> (SpectralAnalyzer, SpectrumReader) {
        SpectralAnalyzer::new(AnalyzerConfig {
            fft_size,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_create_analyzer() {
        let (analyzer, reader) = analyzer(1024);
        assert_eq!(analyzer.fft_size(), 1024);
        assert_eq!(analyzer.bins(), 512);
        assert_eq!(reader.latest().len(), 512);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let result = SpectralAnalyzer::new(AnalyzerConfig {
            fft_size: 1000,
            ..Default::default()
        });
        assert!(matches!(result, Err(CoreError::InvalidFftSize(1000))));
    }

    #[test]
    fn test_rejects_mismatched_publisher() {
        let (publisher, _reader) = spectrum_channel(128);
        let result = SpectralAnalyzer::with_publisher(AnalyzerConfig::default(), publisher);
        assert!(matches!(result, Err(CoreError::InvalidParameter(_))));
    }

    #[test]
    fn test_publishes_once_per_frame() {
        let (mut analyzer, reader) = analyzer(64);

        for i in 0..63 {
            analyzer.add_sample((i as f32 * 0.1).sin());
        }
        assert_eq!(reader.sequence(), 0);
        assert_eq!(analyzer.write_position(), 63);

        analyzer.add_sample(0.0);
        assert_eq!(reader.sequence(), 1);
        assert_eq!(analyzer.write_position(), 0);
        assert_eq!(analyzer.frames_analyzed(), 1);
    }

    #[test]
    fn test_dc_bin_included() {
        let (mut analyzer, reader) = analyzer(32);
        analyzer.add_samples(&[1.0; 32]);

        let spectrum = reader.latest();
        assert!((spectrum[0] - 1.0).abs() < 1e-5, "DC was {}", spectrum[0]);
        assert!(spectrum[1..].iter().all(|&m| m < 1e-5));
    }

    #[test]
    fn test_nyquist_bin_excluded() {
        // Alternating +1/-1 lives entirely in the Nyquist bin, which is not published
        let (mut analyzer, reader) = analyzer(32);
        let samples: Vec<f32> = (0..32).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        analyzer.add_samples(&samples);

        let spectrum = reader.latest();
        assert_eq!(spectrum.len(), 16);
        assert!(spectrum.iter().all(|&m| m < 1e-5));
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let (mut analyzer, reader) = analyzer(16);
        analyzer.add_samples(&[1.0; 16]);
        let published = reader.latest();

        analyzer.add_samples(&[0.5; 7]);
        analyzer.reset();
        assert_eq!(analyzer.write_position(), 0);
        assert_eq!(reader.latest(), published);

        // The next frame holds only post-reset samples
        analyzer.add_samples(&[0.0; 16]);
        assert!(reader.latest().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_remote_reset_request() {
        let (mut analyzer, reader) = analyzer(16);
        analyzer.add_samples(&[1.0; 10]);
        reader.request_reset();

        analyzer.add_sample(0.0);
        assert_eq!(analyzer.write_position(), 1);
    }

    #[test]
    fn test_resilience_to_bad_input() {
        let (mut analyzer, reader) = analyzer(16);
        let mut samples = vec![0.0; 16];
        samples[0] = f32::NAN;
        samples[1] = f32::INFINITY;
        samples[2] = f32::NEG_INFINITY;
        analyzer.add_samples(&samples);

        let spectrum = reader.latest();
        assert_eq!(spectrum.sequence(), 1);
        assert!(spectrum.iter().all(|m| m.is_finite() && *m == 0.0));
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(8);
        assert_eq!(window.len(), 8);
        assert!(window[0].abs() < 1e-6);
        assert!((window[4] - 1.0).abs() < 1e-6);
    }
}
