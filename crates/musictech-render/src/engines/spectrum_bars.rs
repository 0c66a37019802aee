//! Spectrum bars engine
//!
//! Up to [`MAX_BANDS`] spring-damped bars, each drawn twice: once left of
//! the center axis and once right of it at the same distance. Layers, back
//! to front: background with floating particles, glow, reflection, bars,
//! peak markers.

use super::{group_bands, MAX_BANDS};
use crate::engine::{FrameInfo, Visualizer, PAUSED_DECAY};
use musictech_core::canvas::GradientStop;
use musictech_core::color::alpha_from_f32;
use musictech_core::{
    Canvas, MagnitudeSpectrum, Paint, PeakHold, Rect, Rgba, Shader, SpringBar, Vec2,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{PI, TAU};
use std::sync::Arc;
use tracing::debug;

/// Spring constant for bar heights
pub const STIFFNESS: f32 = 0.5;
/// Velocity damping for bar heights
pub const DAMPING: f32 = 0.65;
/// Per-frame peak marker decay
pub const PEAK_DECAY: f32 = 0.88;

const MAX_STEP: f32 = 1.0 / 30.0;
const AUDIO_SENSITIVITY: f32 = 3.0;
const HEIGHT_MULTIPLIER: f32 = 0.8;
const GLOW_INTENSITY: f32 = 4.0;
const COLOR_VIBRANCY: f32 = 1.5;
const PULSE_SPEED: f32 = 4.0;
const WAVE_SPEED: f32 = 2.0;
const FLOATING_PARTICLES: usize = 20;
const PEAK_THICKNESS: f32 = 3.0;
const NEON_HUES: [f32; 6] = [0.0, 60.0, 120.0, 180.0, 240.0, 300.0];

/// Horizontal placement of mirrored bars
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarLayout {
    /// Mirror axis
    pub center_x: f32,
    /// Width of one bar
    pub bar_width: f32,
    /// Distance between neighbouring bar centers
    pub spacing: f32,
}

impl BarLayout {
    /// Layout for `bars` bars on a surface `width` pixels wide
    pub fn new(width: f32, bars: usize) -> Self {
        let bars = bars.max(1) as f32;
        let total_width = width * 0.85;
        Self {
            center_x: width * 0.5,
            bar_width: (total_width / (bars * 2.2)).max(10.0),
            spacing: total_width / bars,
        }
    }

    /// Distance of bar `index`'s center from the axis
    pub fn offset(&self, index: usize) -> f32 {
        (index as f32 + 0.5) * self.spacing
    }

    /// Left edge of the bar left of the axis; `sway` moves it toward the axis
    pub fn left_x(&self, index: usize, sway: f32) -> f32 {
        self.center_x - self.offset(index) - self.bar_width * 0.5 + sway
    }

    /// Left edge of the bar right of the axis; `sway` moves it toward the axis
    pub fn right_x(&self, index: usize, sway: f32) -> f32 {
        self.center_x + self.offset(index) - self.bar_width * 0.5 - sway
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BarState {
    spring: SpringBar,
    peak: PeakHold,
    color_offset: f32,
    pulse_timer: f32,
    wave_offset: f32,
}

/// Mirrored spectrum bar visualizer
pub struct SpectrumBarsEngine {
    magnitudes: Arc<MagnitudeSpectrum>,
    playing: bool,
    time: f32,

    bars: Vec<BarState>,
    bands: Vec<f32>,
    global_color_shift: f32,
    pulse_intensity: f32,
    wave_time: f32,
    rng: StdRng,
}

impl Default for SpectrumBarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumBarsEngine {
    /// Engine seeded from the OS
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Engine with deterministic per-bar color offsets
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        debug!("SpectrumBarsEngine created: max bars={}", MAX_BANDS);
        Self {
            magnitudes: Arc::new(MagnitudeSpectrum::silent(0)),
            playing: false,
            time: 0.0,
            bars: Vec::with_capacity(MAX_BANDS),
            bands: Vec::with_capacity(MAX_BANDS),
            global_color_shift: 0.0,
            pulse_intensity: 0.0,
            wave_time: 0.0,
            rng,
        }
    }

    /// Number of bars per side
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Smoothed height of bar `index` (0.0 - 1.0 nominal)
    pub fn bar_height(&self, index: usize) -> Option<f32> {
        self.bars.get(index).map(|b| b.spring.position)
    }

    /// Peak marker of bar `index`
    pub fn peak(&self, index: usize) -> Option<f32> {
        self.bars.get(index).map(|b| b.peak.peak)
    }

    fn resize_bars(&mut self, count: usize) {
        if self.bars.len() == count {
            return;
        }
        debug!("SpectrumBarsEngine: {} bars", count);
        let rng = &mut self.rng;
        self.bars = (0..count)
            .map(|i| BarState {
                color_offset: rng.random_range(0.0..360.0),
                pulse_timer: rng.random_range(0.0..TAU),
                wave_offset: i as f32 * 0.2,
                ..Default::default()
            })
            .collect();
    }

    fn update(&mut self, step: f32) {
        if self.playing {
            self.global_color_shift = (self.global_color_shift + step * 60.0).rem_euclid(360.0);
            self.wave_time += step * WAVE_SPEED;

            let head = &self.bands[..self.bands.len().min(16)];
            self.pulse_intensity = if head.is_empty() {
                0.0
            } else {
                head.iter().sum::<f32>() / head.len() as f32 * 2.0
            };

            for (bar, &magnitude) in self.bars.iter_mut().zip(&self.bands) {
                let target = (magnitude * AUDIO_SENSITIVITY).min(1.0);
                let height = bar.spring.update(target, STIFFNESS, DAMPING, step);
                bar.peak.update(height, PEAK_DECAY);

                bar.color_offset =
                    (bar.color_offset + step * (40.0 + height * 80.0)).rem_euclid(360.0);
                bar.pulse_timer =
                    (bar.pulse_timer + step * PULSE_SPEED * (1.0 + height * 2.0)).rem_euclid(TAU);
            }
        } else {
            self.wave_time += step * WAVE_SPEED;
            self.pulse_intensity *= PAUSED_DECAY;
            for bar in &mut self.bars {
                bar.spring.position *= PAUSED_DECAY;
                bar.spring.velocity = 0.0;
                bar.peak.update(bar.spring.position, PEAK_DECAY);
            }
        }
    }

    fn dynamic_color(&self, index: usize, magnitude: f32) -> Rgba {
        let bar = &self.bars[index];
        let position = index as f32 / self.bars.len() as f32;

        let base_hue = self.global_color_shift + bar.color_offset + position * 120.0;
        let wave_effect = (self.wave_time + bar.wave_offset).sin() * 60.0;
        let pulse_effect = bar.pulse_timer.sin() * magnitude * 40.0;
        let rainbow_shift = (self.wave_time * 0.5 + position * PI).sin() * 80.0;
        let mut hue = base_hue + wave_effect + pulse_effect + rainbow_shift;

        let mut saturation = (95.0 + magnitude * 5.0).min(100.0) * COLOR_VIBRANCY;
        let mut brightness = (70.0 + magnitude * 30.0).min(100.0);
        brightness = (brightness + (bar.pulse_timer * 2.0).sin() * magnitude * 15.0).min(100.0);
        brightness = (brightness * (0.8 + COLOR_VIBRANCY * 0.2)).min(100.0);

        if magnitude > 0.8 {
            saturation = 100.0;
            brightness = (brightness + 20.0).min(100.0);
            let slot = ((self.wave_time + index as f32 * 0.1) * 2.0).max(0.0) as usize;
            let neon = slot % NEON_HUES.len();
            hue = NEON_HUES[neon] + wave_effect * 0.5;
        }

        Rgba::from_hsv(hue, saturation, brightness)
    }

    fn draw_background(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        canvas.clear(Rgba::BLACK);

        let hue_shift = self.global_color_shift * 0.3 + self.pulse_intensity * 20.0;
        let pulse = (self.wave_time * 2.0).sin() * 0.3 + 0.7;
        let shader = Shader::Radial {
            center: frame.center(),
            radius: frame.width.max(frame.height) * 0.8,
            stops: vec![
                GradientStop::new(0.0, Rgba::from_hsv(280.0 + hue_shift, 85.0, 8.0 * pulse)),
                GradientStop::new(0.3, Rgba::from_hsv(240.0 + hue_shift, 95.0, 15.0 * pulse)),
                GradientStop::new(0.7, Rgba::from_hsv(320.0 + hue_shift, 100.0, 18.0 * pulse)),
                GradientStop::new(1.0, Rgba::from_hsv(200.0 + hue_shift, 90.0, 12.0 * pulse)),
            ],
        };
        canvas.draw_rect(frame.bounds(), &Paint::fill(Rgba::WHITE).with_shader(shader));

        for i in 0..FLOATING_PARTICLES {
            let fi = i as f32;
            let t = self.wave_time + fi * 0.5;
            let x = frame.width * 0.1 + frame.width * 0.8 * (((t * 0.3 + fi).sin() + 1.0) / 2.0);
            let y = frame.height * 0.2
                + frame.height * 0.6 * (((t * 0.2 + fi * 1.5).cos() + 1.0) / 2.0);
            let size = 2.0 + self.pulse_intensity * 8.0 + (t * 2.0 + fi).sin() * 3.0;
            if size <= 0.0 {
                continue;
            }

            let hue = self.global_color_shift + fi * 30.0 + t * 20.0;
            let color = Rgba::from_hsva(
                hue,
                90.0,
                60.0 + self.pulse_intensity * 40.0,
                alpha_from_f32(120.0 + self.pulse_intensity * 135.0),
            );
            canvas.draw_circle(Vec2::new(x, y), size, &Paint::fill(color));
        }
    }

    fn draw_glow(&self, canvas: &mut dyn Canvas, layout: &BarLayout, mid_y: f32, height: f32) {
        let bw = layout.bar_width;
        for (i, bar) in self.bars.iter().enumerate() {
            let m = bar.spring.position;
            let bar_height = m * height * HEIGHT_MULTIPLIER;
            if bar_height < height * 0.05 {
                continue;
            }

            let color = self.dynamic_color(i, m);
            let neon = (bar.pulse_timer * 3.0).sin() * 0.3 + 0.7;
            let glow_alpha = (m * 3.0).min(1.0) * GLOW_INTENSITY * neon;
            let outer =
                Paint::fill(color.with_alpha(alpha_from_f32(220.0 * glow_alpha))).with_blur(20.0);
            let expand = 12.0 + m * 8.0;
            let radius = (bw * 0.4).min(10.0);

            for x in [layout.left_x(i, 0.0), layout.right_x(i, 0.0)] {
                let rect = Rect::from_ltrb(
                    x - expand,
                    mid_y - bar_height - expand,
                    x + bw + expand,
                    mid_y + expand,
                );
                canvas.draw_round_rect(rect, radius, &outer);
            }

            if bar_height < height * 0.08 {
                continue;
            }
            let inner = Paint::fill(color.with_alpha(alpha_from_f32(200.0 * m))).with_blur(10.0);
            let radius = (bw * 0.3).min(8.0);
            for x in [layout.left_x(i, 0.0), layout.right_x(i, 0.0)] {
                let rect =
                    Rect::from_ltrb(x - 5.0, mid_y - bar_height - 5.0, x + bw + 5.0, mid_y + 5.0);
                canvas.draw_round_rect(rect, radius, &inner);
            }
        }
    }

    fn draw_reflection(
        &self,
        canvas: &mut dyn Canvas,
        layout: &BarLayout,
        mid_y: f32,
        height: f32,
    ) {
        let bw = layout.bar_width;
        let radius = (bw * 0.25).min(8.0);
        for (i, bar) in self.bars.iter().enumerate() {
            let m = bar.spring.position;
            let reflection = m * height * HEIGHT_MULTIPLIER * 0.7;
            if reflection < 2.0 {
                continue;
            }

            let base = self.dynamic_color(i, m * 0.8);
            let shader = Shader::linear(
                Vec2::new(0.0, mid_y),
                Vec2::new(0.0, mid_y + reflection),
                &[base.fade(0.5), Rgba::TRANSPARENT],
            );
            let paint = Paint::fill(Rgba::WHITE).with_shader(shader);
            for x in [layout.left_x(i, 0.0), layout.right_x(i, 0.0)] {
                canvas.draw_round_rect(Rect::from_xywh(x, mid_y, bw, reflection), radius, &paint);
            }
        }
    }

    fn draw_bars(&self, canvas: &mut dyn Canvas, layout: &BarLayout, mid_y: f32, height: f32) {
        let bw = layout.bar_width;
        let radius = (bw * 0.25).min(8.0);
        for (i, bar) in self.bars.iter().enumerate() {
            let m = bar.spring.position;
            let fi = i as f32;
            let wave = (self.wave_time + fi * 0.3).sin() * 0.1 + 1.0;
            let bar_height = m * height * HEIGHT_MULTIPLIER * wave;
            if bar_height < 2.0 {
                continue;
            }

            let sway = (self.wave_time + fi * 0.15).sin() * 2.0;
            let color = self.dynamic_color(i, m);
            let top = brighten(color, 60);
            let bottom = color.fade(0.8);
            let shader = Shader::Linear {
                start: Vec2::new(0.0, mid_y - bar_height),
                end: Vec2::new(0.0, mid_y),
                stops: vec![
                    GradientStop::new(0.0, top),
                    GradientStop::new(0.6, color),
                    GradientStop::new(1.0, bottom),
                ],
            };
            let paint = Paint::fill(Rgba::WHITE).with_shader(shader);

            let scale = 1.0 + bar.pulse_timer.sin() * m * 0.15;
            let grow = bw * (scale - 1.0) * 0.5;
            let pulsed_height = bar_height * scale;
            for x in [layout.left_x(i, sway), layout.right_x(i, sway)] {
                let rect = Rect::from_ltrb(x - grow, mid_y - pulsed_height, x + bw + grow, mid_y);
                canvas.draw_round_rect(rect, radius, &paint);
            }
        }
    }

    fn draw_peaks(&self, canvas: &mut dyn Canvas, layout: &BarLayout, mid_y: f32, height: f32) {
        let bw = layout.bar_width;
        for (i, bar) in self.bars.iter().enumerate() {
            let peak_height = bar.peak.peak * height * HEIGHT_MULTIPLIER;
            if peak_height < 5.0 {
                continue;
            }

            let color = brighten(self.dynamic_color(i, 1.0), 50).with_alpha_unit(bar.peak.decay);
            let paint = Paint::fill(color);
            let top = mid_y - peak_height - PEAK_THICKNESS;
            for x in [layout.left_x(i, 0.0), layout.right_x(i, 0.0)] {
                canvas.draw_round_rect(
                    Rect::from_xywh(x, top, bw, PEAK_THICKNESS),
                    bw * 0.3,
                    &paint,
                );
            }
        }
    }
}

fn brighten(color: Rgba, amount: u8) -> Rgba {
    Rgba::new(
        color.r.saturating_add(amount),
        color.g.saturating_add(amount),
        color.b.saturating_add(amount),
        color.a,
    )
}

impl Visualizer for SpectrumBarsEngine {
    fn name(&self) -> &'static str {
        "Spectrum Bars"
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
        let step = frame.step(self.playing).min(MAX_STEP);

        group_bands(self.magnitudes.bins(), MAX_BANDS, &mut self.bands);
        self.resize_bars(self.bands.len());
        self.update(step);
        self.time += step;

        self.draw_background(canvas, frame);
        if self.bars.is_empty() {
            return;
        }

        let layout = BarLayout::new(frame.width, self.bars.len());
        let mid_y = frame.height * 0.5;
        self.draw_glow(canvas, &layout, mid_y, frame.height);
        self.draw_reflection(canvas, &layout, mid_y, frame.height);
        self.draw_bars(canvas, &layout, mid_y, frame.height);
        self.draw_peaks(canvas, &layout, mid_y, frame.height);
    }

    fn animation_time(&self) -> f32 {
        self.time
    }
}
