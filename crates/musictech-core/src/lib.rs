//! MusicTech Core - Audio Analysis and Visual Domain Model
//!
//! This crate contains the real-time core of MusicTech, including:
//! - Streaming spectral analysis and the lock-free spectrum handoff
//! - The pass-through sample tap that feeds the analyzer
//! - Beat detection and particle simulation
//! - The abstract 2D canvas contract consumed by the visualizers
//! - Frame pacing, smoothing primitives and configuration

#![warn(missing_docs)]

use thiserror::Error;

pub mod audio;
pub mod beat;
pub mod canvas;
pub mod color;
pub mod config;
pub mod frame_clock;
pub mod logging;
pub mod particles;
pub mod smoothing;

pub use glam::{Affine2, Vec2};

// --- Re-exports grouped by category ---

// Audio
pub use audio::{
    spectrum_channel, BufferSource, MagnitudeSpectrum, SampleSource, SampleTap,
    SpectralAnalyzer, SpectrumPublisher, SpectrumReader,
};

// Reactive state
pub use beat::{BeatDetector, BeatEvent};
pub use particles::{Particle, ParticleSystem};
pub use smoothing::{approach, BandEnergies, PeakHold, SpringBar};

// Drawing contract
pub use canvas::{
    BlendMode, Canvas, GradientStop, Paint, PaintStyle, Path, PixelBuffer, Rect, Shader,
};
pub use color::Rgba;

// Pacing & configuration
pub use config::{
    AnalyzerConfig, BeatConfig, FractalConfig, FrameConfig, ParticleConfig, VisualizerConfig,
    WindowFunction,
};
pub use frame_clock::{FrameClock, FrameTick};
pub use logging::LogConfig;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// FFT frame size is not a power of two (or too small to hold a spectrum)
    #[error("Invalid FFT size {0}: must be a power of two and at least 2")]
    InvalidFftSize(usize),

    /// A pool or history capacity is zero
    #[error("Invalid capacity for {name}: {value}")]
    InvalidCapacity {
        /// Which capacity was rejected
        name: &'static str,
        /// The rejected value
        value: usize,
    },

    /// Target frame rate is not a finite positive number
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f32),

    /// Any other out-of-range configuration value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Fail with [`CoreError::InvalidCapacity`] when `value` is zero.
pub(crate) fn ensure_capacity(name: &'static str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(CoreError::InvalidCapacity { name, value });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_capacity_rejects_zero() {
        assert_eq!(
            ensure_capacity("particles", 0),
            Err(CoreError::InvalidCapacity {
                name: "particles",
                value: 0
            })
        );
        assert_eq!(ensure_capacity("particles", 5), Ok(5));
    }

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidFftSize(1000);
        assert!(err.to_string().contains("1000"));
    }
}
