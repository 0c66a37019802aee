//! The contract every visualizer engine implements

use musictech_core::{Canvas, MagnitudeSpectrum, Rect, Vec2};
use std::sync::Arc;

/// Fixed per-frame time step at the reference rate
pub const FRAME_STEP: f32 = 1.0 / 60.0;

/// Fraction of the frame step that animation advances by while paused
pub const PAUSED_TIME_SCALE: f32 = 0.15;

/// Per-frame multiplier applied to audio energies while paused
pub const PAUSED_DECAY: f32 = 0.975;

/// Per-frame render parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Surface width in pixels
    pub width: f32,
    /// Surface height in pixels
    pub height: f32,
    /// Frame interval in seconds
    pub dt: f32,
    /// Monotonic frame counter
    pub frame_index: u64,
}

impl FrameInfo {
    /// Frame of the given size at the reference step
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            dt: FRAME_STEP,
            frame_index: 0,
        }
    }

    /// Builder: frame interval
    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    /// Builder: frame counter
    pub fn with_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }

    /// Time step to advance animation by; slowed down while paused
    pub fn step(&self, playing: bool) -> f32 {
        let dt = if self.dt.is_finite() { self.dt.max(0.0) } else { 0.0 };
        if playing {
            dt
        } else {
            dt * PAUSED_TIME_SCALE
        }
    }

    /// Surface center
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Shorter side
    pub fn min_dimension(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Whole-surface rectangle
    pub fn bounds(&self) -> Rect {
        Rect::from_xywh(0.0, 0.0, self.width, self.height)
    }
}

/// Turn a per-reference-frame multiplier into one for `step` seconds
#[inline]
pub(crate) fn per_frame(factor: f32, step: f32) -> f32 {
    factor.powf(step / FRAME_STEP)
}

/// An audio-reactive renderer with private animation state
pub trait Visualizer: Send {
    /// Display name
    fn name(&self) -> &'static str;

    /// Update the playing flag
    fn set_playing(&mut self, playing: bool);

    /// Current playing flag
    fn is_playing(&self) -> bool;

    /// Hand over the latest spectrum snapshot
    fn set_magnitudes(&mut self, magnitudes: Arc<MagnitudeSpectrum>);

    /// Advance animation by one frame and draw it
    fn render(&mut self, canvas: &mut dyn Canvas, frame: &FrameInfo);

    /// Accumulated animation time in seconds
    fn animation_time(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paused_step_is_scaled() {
        let frame = FrameInfo::new(800.0, 600.0);
        assert_eq!(frame.step(true), FRAME_STEP);
        assert!((frame.step(false) - FRAME_STEP * PAUSED_TIME_SCALE).abs() < 1e-9);
        assert_eq!(frame.with_dt(f32::NAN).step(true), 0.0);
    }

    #[test]
    fn test_per_frame_factor() {
        assert!((per_frame(0.95, FRAME_STEP) - 0.95).abs() < 1e-6);
        assert!((per_frame(0.95, FRAME_STEP * 2.0) - 0.9025).abs() < 1e-6);
        assert_eq!(per_frame(0.95, 0.0), 1.0);
    }

    #[test]
    fn test_frame_geometry() {
        let frame = FrameInfo::new(800.0, 600.0);
        assert_eq!(frame.center(), Vec2::new(400.0, 300.0));
        assert_eq!(frame.min_dimension(), 600.0);
        assert_eq!(frame.bounds().right(), 800.0);
    }
}
