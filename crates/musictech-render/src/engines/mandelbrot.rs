//! Escape-time Mandelbrot engine
//!
//! The fractal is computed into an off-screen [`PixelBuffer`] smaller than
//! the display and stretched over it. Rows are independent, so the kernel
//! hands each rayon task its own row slice.

use crate::engine::{FrameInfo, Visualizer, FRAME_STEP, PAUSED_DECAY};
use crate::Result;
use musictech_core::{
    approach, Canvas, FractalConfig, MagnitudeSpectrum, Paint, PixelBuffer, Rgba, Vec2,
    VisualizerConfig,
};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, trace};

/// Squared magnitude at which an orbit counts as escaped
pub const BAILOUT: f32 = 4.0;
/// Floor on the per-frame iteration cap
pub const MIN_ITERATIONS: u32 = 40;

const ANALYSIS_BINS: usize = 8;
const BIN_SMOOTHING: f32 = 0.3;
const BIN_GAIN: f32 = 100.0;

/// Inputs to one evaluation of the escape-time kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscapeTimeParams {
    /// Magnification; 1 maps the buffer onto roughly [-1, 1] on both axes
    pub zoom: f32,
    /// Complex-plane point at the buffer center
    pub offset: Vec2,
    /// View rotation in radians
    pub rotation: f32,
    /// Constant added to every iteration (`z = z² + c + morph`)
    pub morph: Vec2,
    /// Iteration cap
    pub max_iterations: u32,
    /// Palette hue offset in degrees
    pub color_shift: f32,
    /// Band energies in [0, 1] tinting the palette
    pub bass: f32,
    /// Mid energy
    pub mid: f32,
    /// High energy
    pub high: f32,
    /// Aggregate energy
    pub energy: f32,
}

impl Default for EscapeTimeParams {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: Vec2::new(-0.5, 0.0),
            rotation: 0.0,
            morph: Vec2::ZERO,
            max_iterations: 60,
            color_shift: 0.0,
            bass: 0.0,
            mid: 0.0,
            high: 0.0,
            energy: 0.0,
        }
    }
}

/// Fractional escape count. Falls back to the integer count when the
/// log-log term is not finite.
pub fn smooth_iterations(iterations: u32, magnitude_sq: f32) -> f32 {
    let smooth = iterations as f32 + 1.0 - magnitude_sq.sqrt().ln().ln() / std::f32::consts::LN_2;
    if smooth.is_finite() {
        smooth
    } else {
        iterations as f32
    }
}

/// Fill `buffer` with the fractal described by `params`. Every pixel is
/// written and fully opaque.
pub fn escape_time(buffer: &mut PixelBuffer, params: &EscapeTimeParams) {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let stride = buffer.stride();
    if width == 0 || height == 0 {
        return;
    }

    let (sin_r, cos_r) = params.rotation.sin_cos();
    let scale_x = 0.5 * params.zoom * width as f32;
    let scale_y = 0.5 * params.zoom * height as f32;

    buffer
        .data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let py = (y as f32 - height as f32 * 0.5) / scale_y;
            for (x, pixel) in row.chunks_exact_mut(PixelBuffer::CHANNELS).enumerate() {
                let px = (x as f32 - width as f32 * 0.5) / scale_x;
                let c = Vec2::new(
                    px * cos_r - py * sin_r + params.offset.x,
                    px * sin_r + py * cos_r + params.offset.y,
                );
                let color = shade(c, params);
                pixel.copy_from_slice(&[color.r, color.g, color.b, 255]);
            }
        });
}

fn shade(c: Vec2, params: &EscapeTimeParams) -> Rgba {
    let max = params.max_iterations;
    let (mut zx, mut zy) = (c.x, c.y);
    let (mut zx2, mut zy2) = (zx * zx, zy * zy);
    let mut iterations = 0;

    while zx2 + zy2 < BAILOUT && iterations < max {
        zy = 2.0 * zx * zy + c.y + params.morph.y;
        zx = zx2 - zy2 + c.x + params.morph.x;
        zx2 = zx * zx;
        zy2 = zy * zy;
        iterations += 1;
    }

    if iterations == max {
        return Rgba::from_hsv(
            params.color_shift + params.bass * 60.0,
            20.0 + params.energy * 30.0,
            10.0 + params.bass * 20.0,
        );
    }

    let smooth = smooth_iterations(iterations, zx2 + zy2);
    let hue = params.color_shift
        + smooth * 12.0
        + params.bass * 120.0
        + params.mid * 60.0
        + params.high * 180.0;
    let mut saturation = 70.0 + params.energy * 30.0;
    let mut brightness = 30.0 + smooth / max.max(1) as f32 * 70.0 + params.energy * 20.0;
    if params.bass > 0.7 {
        brightness += 30.0;
        saturation += 20.0;
    }
    Rgba::from_hsv(hue, saturation.min(100.0), brightness.min(100.0))
}

/// Smoothed view of the fractal. Targets move with the music; the
/// displayed values chase them at fixed per-frame rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalCamera {
    /// Current zoom
    pub zoom: f32,
    /// Current pan
    pub offset: Vec2,
    /// Current rotation, radians
    pub rotation: f32,
    /// Current hue offset, degrees
    pub color_shift: f32,
    /// Current morph factor
    pub morph: f32,

    target_zoom: f32,
    target_offset: Vec2,
    target_rotation: f32,
    target_color_shift: f32,
    target_morph: f32,
}

impl Default for FractalCamera {
    fn default() -> Self {
        let offset = Vec2::new(-0.5, 0.0);
        Self {
            zoom: 1.0,
            offset,
            rotation: 0.0,
            color_shift: 0.0,
            morph: 0.0,
            target_zoom: 1.0,
            target_offset: offset,
            target_rotation: 0.0,
            target_color_shift: 0.0,
            target_morph: 0.0,
        }
    }
}

impl FractalCamera {
    /// Per-frame smoothing rate for zoom
    pub const ZOOM_SMOOTH: f32 = 0.08;
    /// Per-frame smoothing rate for pan
    pub const MOVE_SMOOTH: f32 = 0.06;
    /// Per-frame smoothing rate for rotation
    pub const ROTATION_SMOOTH: f32 = 0.04;
    /// Per-frame smoothing rate for hue
    pub const COLOR_SMOOTH: f32 = 0.15;
    /// Per-frame smoothing rate for morph
    pub const MORPH_SMOOTH: f32 = 0.1;

    /// Move the targets for `frames` reference frames of music at `time`
    pub fn steer(&mut self, energies: &MandelbrotEnergies, time: f32, frames: f32) {
        let MandelbrotEnergies {
            bass,
            mid,
            high,
            total,
        } = *energies;

        self.target_zoom = 1.0 + (time * 0.3).sin() * 0.05 + bass * 0.1;
        if bass > 0.8 {
            self.target_zoom += 0.05;
        }

        let orbit = time * mid * 0.02;
        self.target_offset = Vec2::new(-0.5 + orbit.sin() * mid * 0.1, orbit.cos() * mid * 0.1);

        self.target_rotation += high * 0.05 * frames;
        if total > 0.9 {
            self.target_rotation += 0.1 * frames;
        }
        self.target_color_shift += (total * 2.0 + time * 10.0) * frames;
        self.target_morph = (time * 0.5 + bass * 3.0).sin() * total;
    }

    /// Chase the targets for `frames` reference frames
    pub fn smooth(&mut self, frames: f32) {
        let rate = |k: f32| 1.0 - (1.0 - k).powf(frames);
        self.zoom = approach(self.zoom, self.target_zoom, rate(Self::ZOOM_SMOOTH));
        let move_rate = rate(Self::MOVE_SMOOTH);
        self.offset = Vec2::new(
            approach(self.offset.x, self.target_offset.x, move_rate),
            approach(self.offset.y, self.target_offset.y, move_rate),
        );
        self.rotation = approach(self.rotation, self.target_rotation, rate(Self::ROTATION_SMOOTH));
        self.color_shift =
            approach(self.color_shift, self.target_color_shift, rate(Self::COLOR_SMOOTH));
        self.morph = approach(self.morph, self.target_morph, rate(Self::MORPH_SMOOTH));

        // Keep the hue accumulators small; both shift by whole turns
        if self.color_shift >= 360.0 {
            let turns = (self.color_shift / 360.0).floor() * 360.0;
            self.color_shift -= turns;
            self.target_color_shift -= turns;
        }
    }
}

/// Band energies of the first eight bins, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MandelbrotEnergies {
    /// Lowest third of the analysed bins
    pub bass: f32,
    /// Middle third
    pub mid: f32,
    /// Upper third
    pub high: f32,
    /// All analysed bins
    pub total: f32,
}

impl MandelbrotEnergies {
    fn from_bins(bins: &[f32]) -> Self {
        let bands = bins.len();
        if bands == 0 {
            return Self::default();
        }

        let (mut bass, mut mid, mut high, mut total) = (0.0, 0.0, 0.0, 0.0);
        for (i, &bin) in bins.iter().enumerate() {
            let energy = bin * BIN_GAIN;
            total += energy;
            if i < bands / 3 {
                bass += energy;
            } else if i < 2 * bands / 3 {
                mid += energy;
            } else {
                high += energy;
            }
        }

        let third = (bands / 3).max(1) as f32;
        Self {
            bass: (bass / third).min(1.0),
            mid: (mid / third).min(1.0),
            high: (high / third).min(1.0),
            total: (total / bands as f32).min(1.0),
        }
    }

    fn decay(&mut self, factor: f32) {
        self.bass *= factor;
        self.mid *= factor;
        self.high *= factor;
        self.total *= factor;
    }
}

/// Audio-reactive Mandelbrot visualizer
pub struct MandelbrotEngine {
    config: FractalConfig,
    magnitudes: Arc<MagnitudeSpectrum>,
    playing: bool,
    time: f32,
    frame_counter: u64,

    smoothed: [f32; ANALYSIS_BINS],
    energies: MandelbrotEnergies,
    camera: FractalCamera,

    buffer: PixelBuffer,
    kernel_runs: u64,
}

impl MandelbrotEngine {
    /// Create the engine with the fractal section of `config`
    pub fn new(config: &VisualizerConfig) -> Result<Self> {
        config.fractal.validate()?;
        debug!(
            "MandelbrotEngine created: scale 1/{}, cap {}x{}, {} base iterations",
            config.fractal.render_scale,
            config.fractal.max_render_width,
            config.fractal.max_render_height,
            config.fractal.base_max_iterations
        );

        Ok(Self {
            config: config.fractal.clone(),
            magnitudes: Arc::new(MagnitudeSpectrum::silent(0)),
            playing: false,
            time: 0.0,
            frame_counter: 0,
            smoothed: [0.0; ANALYSIS_BINS],
            energies: MandelbrotEnergies::default(),
            camera: FractalCamera::default(),
            buffer: PixelBuffer::new(0, 0),
            kernel_runs: 0,
        })
    }

    /// Current view
    pub fn camera(&self) -> &FractalCamera {
        &self.camera
    }

    /// Current band energies
    pub fn energies(&self) -> MandelbrotEnergies {
        self.energies
    }

    /// Off-screen fractal image
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Number of times the kernel has filled the buffer
    pub fn kernel_runs(&self) -> u64 {
        self.kernel_runs
    }

    /// Off-screen size for a display of `width` x `height`
    pub fn render_size(&self, width: f32, height: f32) -> (u32, u32) {
        let scale = self.config.render_scale.max(1);
        let w = (width.max(0.0) as u32 / scale).min(self.config.max_render_width);
        let h = (height.max(0.0) as u32 / scale).min(self.config.max_render_height);
        (w, h)
    }

    /// Iteration cap at the current energy
    pub fn max_iterations(&self) -> u32 {
        let boosted = self.config.base_max_iterations as f32 + self.energies.total * 40.0;
        (boosted as u32).max(MIN_ITERATIONS)
    }

    /// Kernel inputs for the current state
    pub fn params(&self) -> EscapeTimeParams {
        let MandelbrotEnergies {
            bass,
            mid,
            high,
            total,
        } = self.energies;
        EscapeTimeParams {
            zoom: self.camera.zoom,
            offset: self.camera.offset,
            rotation: self.camera.rotation,
            morph: Vec2::new(self.camera.morph * 0.1, self.camera.morph * 0.05),
            max_iterations: self.max_iterations(),
            color_shift: self.camera.color_shift,
            bass,
            mid,
            high,
            energy: total,
        }
    }

    fn analyze(&mut self) {
        let bins = self.magnitudes.bins();
        let bands = bins.len().min(ANALYSIS_BINS);
        for (smoothed, &bin) in self.smoothed.iter_mut().zip(&bins[..bands]) {
            let bin = if bin.is_finite() { bin } else { 0.0 };
            *smoothed = approach(*smoothed, bin, BIN_SMOOTHING);
        }
        self.energies = MandelbrotEnergies::from_bins(&self.smoothed[..bands]);
    }

    fn needs_update(&self, resized: bool) -> bool {
        resized
            || self.frame_counter % 2 == 0
            || self.energies.total > 0.1
            || self.energies.bass > 0.3
    }
}

impl Visualizer for MandelbrotEngine {
    fn name(&self) -> &'static str {
        "Mandelbrot"
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn set_magnitudes(&mut self, magnitudes: Arc<MagnitudeSpectrum>) {
        self.magnitudes = magnitudes;
    }

    fn render(&mut self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let step = frame.step(self.playing);
        self.time += step;

        if self.magnitudes.is_empty() {
            canvas.clear(Rgba::BLACK);
            return;
        }
        self.frame_counter += 1;

        if self.playing {
            self.analyze();
        } else {
            self.smoothed.iter_mut().for_each(|s| *s *= PAUSED_DECAY);
            self.energies.decay(PAUSED_DECAY);
        }

        let frames = step / FRAME_STEP;
        self.camera.steer(&self.energies, self.time, frames);
        self.camera.smooth(frames);

        let (w, h) = self.render_size(frame.width, frame.height);
        let resized = self.buffer.resize(w, h);
        if w == 0 || h == 0 {
            canvas.clear(Rgba::BLACK);
            return;
        }

        if self.needs_update(resized) {
            let params = self.params();
            escape_time(&mut self.buffer, &params);
            self.kernel_runs += 1;
        }

        canvas.draw_image(&self.buffer, frame.bounds(), &Paint::fill(Rgba::WHITE));

        if self.frame_counter % 600 == 0 {
            trace!(
                "Mandelbrot frame {}: {}x{}, {} iterations, {} kernel runs",
                self.frame_counter,
                w,
                h,
                self.max_iterations(),
                self.kernel_runs
            );
        }
    }

    fn animation_time(&self) -> f32 {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingCanvas};

    fn engine() -> MandelbrotEngine {
        MandelbrotEngine::new(&VisualizerConfig::default()).unwrap()
    }

    #[test]
    fn test_origin_is_interior() {
        let mut buffer = PixelBuffer::new(9, 9);
        let params = EscapeTimeParams {
            offset: Vec2::ZERO,
            ..Default::default()
        };
        escape_time(&mut buffer, &params);

        let interior = Rgba::from_hsv(0.0, 20.0, 10.0);
        assert_eq!(buffer.pixel(4, 4), Some(interior));
        // Corners lie outside the set
        assert_ne!(buffer.pixel(0, 0), Some(interior));
        assert!(buffer.data().chunks(4).all(|p| p[3] == 255));
    }

    #[test]
    fn test_smooth_iterations_guard() {
        assert!(smooth_iterations(3, 16.0).is_finite());
        assert_eq!(smooth_iterations(5, 0.0), 5.0);
        assert_eq!(smooth_iterations(5, f32::NAN), 5.0);
    }

    #[test]
    fn test_render_size_is_scaled_and_capped() {
        let engine = engine();
        assert_eq!(engine.render_size(640.0, 480.0), (320, 240));
        assert_eq!(engine.render_size(3840.0, 2160.0), (800, 600));
        assert_eq!(engine.render_size(1.0, 1.0), (0, 0));
    }

    #[test]
    fn test_iteration_cap() {
        let mut engine = engine();
        assert_eq!(engine.max_iterations(), 60);
        engine.energies.total = 1.0;
        assert_eq!(engine.max_iterations(), 100);

        let config = VisualizerConfig {
            fractal: FractalConfig {
                base_max_iterations: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = MandelbrotEngine::new(&config).unwrap();
        assert_eq!(engine.max_iterations(), MIN_ITERATIONS);
    }

    #[test]
    fn test_quiet_input_reuses_buffer_on_odd_frames() {
        let mut engine = engine();
        engine.set_playing(true);
        engine.set_magnitudes(Arc::new(MagnitudeSpectrum::silent(64)));
        let mut canvas = RecordingCanvas::new(100.0, 80.0);
        let frame = FrameInfo::new(100.0, 80.0);

        // Frame 1 allocates, frames 2 and 4 are even, frames 3 and 5 reuse
        for _ in 0..5 {
            engine.render(&mut canvas, &frame);
        }
        assert_eq!(engine.kernel_runs(), 3);
        assert_eq!(canvas.count("image"), 5);
    }

    #[test]
    fn test_loud_input_recomputes_every_frame() {
        let mut engine = engine();
        engine.set_playing(true);
        engine.set_magnitudes(Arc::new(MagnitudeSpectrum::new(vec![0.5; 64], 1)));
        let mut canvas = RecordingCanvas::new(100.0, 80.0);
        let frame = FrameInfo::new(100.0, 80.0);

        for _ in 0..5 {
            engine.render(&mut canvas, &frame);
        }
        assert_eq!(engine.kernel_runs(), 5);
        assert_eq!(engine.energies().total, 1.0);

        match canvas.commands().last() {
            Some(DrawCommand::Image { width, height, dest, .. }) => {
                assert_eq!((*width, *height), (50, 40));
                assert_eq!(dest.width, 100.0);
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_spectrum_clears() {
        let mut engine = engine();
        let mut canvas = RecordingCanvas::new(100.0, 80.0);
        engine.render(&mut canvas, &FrameInfo::new(100.0, 80.0));
        assert_eq!(canvas.count("clear"), 1);
        assert_eq!(engine.kernel_runs(), 0);
    }

    #[test]
    fn test_camera_hue_stays_bounded() {
        let mut camera = FractalCamera::default();
        let energies = MandelbrotEnergies {
            total: 1.0,
            ..Default::default()
        };
        for i in 0..10_000 {
            camera.steer(&energies, i as f32 * FRAME_STEP, 1.0);
            camera.smooth(1.0);
        }
        assert!(camera.color_shift < 360.0);
        assert!(camera.color_shift.is_finite());
    }
}
