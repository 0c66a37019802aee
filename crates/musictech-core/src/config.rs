//! Configuration surface for the analysis and rendering pipeline.
//!
//! Every tunable the pipeline needs is passed in through these structs; nothing
//! reads a global constant. All sections deserialize with `#[serde(default)]`
//! so a partial TOML file only overrides what it names.

use crate::{ensure_capacity, CoreError, Result};
use serde::{Deserialize, Serialize};

/// Window applied to each sample frame before the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// No windowing; bin-aligned tones land in exactly one bin
    #[default]
    Rectangular,
    /// Hann window; lower leakage for tones between bins
    Hann,
}

/// Spectral analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// FFT frame size (power of two)
    pub fft_size: usize,
    /// Window applied before the transform
    pub window: WindowFunction,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            window: WindowFunction::Rectangular,
        }
    }
}

impl AnalyzerConfig {
    /// Number of magnitude bins published per frame
    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Check that the frame size is usable by the transform
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(CoreError::InvalidFftSize(self.fft_size));
        }
        Ok(())
    }
}

/// Beat detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Ratio above the rolling mean that counts as a beat
    pub threshold: f32,
    /// Minimum time between two beats
    pub cooldown: f32,
    /// Number of recent peaks kept for the rolling mean
    pub history: usize,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            cooldown: 0.2,
            history: 30,
        }
    }
}

impl BeatConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        ensure_capacity("beat history", self.history)?;
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(CoreError::InvalidParameter(format!(
                "beat threshold must be >= 0, got {}",
                self.threshold
            )));
        }
        if !self.cooldown.is_finite() || self.cooldown < 0.0 {
            return Err(CoreError::InvalidParameter(format!(
                "beat cooldown must be >= 0, got {}",
                self.cooldown
            )));
        }
        Ok(())
    }
}

/// Particle pool sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    /// Pool capacity of the kaleidoscope engine
    pub capacity: usize,
    /// Particles spawned by one beat explosion
    pub explosion_size: usize,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            explosion_size: 20,
        }
    }
}

impl ParticleConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        ensure_capacity("particle pool", self.capacity)?;
        Ok(())
    }
}

/// Render loop pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Target frames per second
    pub target_fps: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { target_fps: 60.0 }
    }
}

impl FrameConfig {
    /// Fixed frame interval in seconds
    pub fn frame_interval(&self) -> f32 {
        1.0 / self.target_fps
    }

    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(CoreError::InvalidFrameRate(self.target_fps));
        }
        Ok(())
    }
}

/// Escape-time fractal budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalConfig {
    /// Off-screen buffer is `display / render_scale`
    pub render_scale: u32,
    /// Hard cap on the off-screen buffer width
    pub max_render_width: u32,
    /// Hard cap on the off-screen buffer height
    pub max_render_height: u32,
    /// Iteration cap before audio boost
    pub base_max_iterations: u32,
}

impl Default for FractalConfig {
    fn default() -> Self {
        Self {
            render_scale: 2,
            max_render_width: 800,
            max_render_height: 600,
            base_max_iterations: 60,
        }
    }
}

impl FractalConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        ensure_capacity("fractal render scale", self.render_scale as usize)?;
        ensure_capacity("fractal render width", self.max_render_width as usize)?;
        ensure_capacity("fractal render height", self.max_render_height as usize)?;
        ensure_capacity("fractal iterations", self.base_max_iterations as usize)?;
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Spectral analyzer
    pub analyzer: AnalyzerConfig,
    /// Beat detection
    pub beat: BeatConfig,
    /// Particle pools
    pub particles: ParticleConfig,
    /// Frame pacing
    pub frame: FrameConfig,
    /// Escape-time fractal
    pub fractal: FractalConfig,
}

impl VisualizerConfig {
    /// Validate every section, failing on the first bad value
    pub fn validate(&self) -> Result<()> {
        self.analyzer.validate()?;
        self.beat.validate()?;
        self.particles.validate()?;
        self.frame.validate()?;
        self.fractal.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = VisualizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analyzer.bins(), 512);
        assert!((config.frame.frame_interval() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let config = AnalyzerConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(CoreError::InvalidFftSize(1000)));

        let tiny = AnalyzerConfig {
            fft_size: 1,
            ..Default::default()
        };
        assert!(tiny.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_capacities() {
        let mut config = VisualizerConfig::default();
        config.particles.capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidCapacity { .. })
        ));

        let mut config = VisualizerConfig::default();
        config.frame.target_fps = 0.0;
        assert_eq!(config.validate(), Err(CoreError::InvalidFrameRate(0.0)));
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: VisualizerConfig = toml::from_str(
            r#"
            [analyzer]
            fft_size = 2048
            window = "hann"

            [beat]
            cooldown = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.analyzer.fft_size, 2048);
        assert_eq!(config.analyzer.window, WindowFunction::Hann);
        assert_eq!(config.beat.cooldown, 0.5);
        assert_eq!(config.beat.threshold, 0.6);
        assert_eq!(config.particles.capacity, 100);
    }
}
