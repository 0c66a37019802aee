//! Layered pseudo-3D fractal engine
//!
//! Stacked spiral, mandala and flower-of-life figures under a reactive
//! camera, over one of five rotating backgrounds. Extra effects switch on
//! with band energy: quantum rings, orbiting particles, lightning and
//! holographic projections.

use crate::engine::{FrameInfo, Visualizer, FRAME_STEP, PAUSED_DECAY};
use crate::post;
use musictech_core::canvas::GradientStop;
use musictech_core::color::{alpha_from_f32, alpha_from_unit};
use musictech_core::{
    BandEnergies, BlendMode, Canvas, MagnitudeSpectrum, Paint, Path, Rgba, Shader, Vec2,
};
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Seconds of animation time each background is shown
pub const BACKGROUND_PERIOD: f32 = 15.0;
/// Layer cap
pub const MAX_LAYERS: usize = 16;

const SMOOTHING: f32 = 0.12;
const PERSPECTIVE: f32 = 800.0;
const GOLDEN_RATIO: f32 = 0.618;
const INV_GOLDEN_RATIO: f32 = 0.382;

/// Background drawn behind the fractal layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundMode {
    /// Wobbling additive grid
    #[default]
    NeonGrid,
    /// Three overlapping radial tunnels
    PlasmaTunnel,
    /// Drifting stars
    StarField,
    /// Interfering sine waves
    QuantumWaves,
    /// Concentric rings
    HolographicRings,
}

impl BackgroundMode {
    /// List all modes in rotation order
    pub fn all() -> &'static [BackgroundMode] {
        &[
            BackgroundMode::NeonGrid,
            BackgroundMode::PlasmaTunnel,
            BackgroundMode::StarField,
            BackgroundMode::QuantumWaves,
            BackgroundMode::HolographicRings,
        ]
    }

    /// The mode after this one, wrapping around
    pub fn next(self) -> Self {
        let all = Self::all();
        all[(self as usize + 1) % all.len()]
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackgroundMode::NeonGrid => "neon grid",
            BackgroundMode::PlasmaTunnel => "plasma tunnel",
            BackgroundMode::StarField => "star field",
            BackgroundMode::QuantumWaves => "quantum waves",
            BackgroundMode::HolographicRings => "holographic rings",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Figure {
    Spiral,
    Mandala,
    Flower,
}

/// Phase accumulators advanced by band energy
#[derive(Debug, Clone, Copy, Default)]
struct Phases {
    global_rotation: f32,
    spiral: f32,
    fold: f32,
    pulse: f32,
    color_shift: f32,
    tunnel: f32,
    hologram: f32,
    particles: f32,
    morph: f32,
    lighting: f32,
    background_hue: f32,
}

/// Layered 3D fractal visualizer
pub struct FractalLayersEngine {
    magnitudes: Arc<MagnitudeSpectrum>,
    playing: bool,
    time: f32,
    frame_counter: u64,

    bands: BandEnergies,
    energy: f32,
    phases: Phases,
    rotation_x: f32,
    rotation_y: f32,
    rotation_z: f32,

    background: BackgroundMode,
    background_timer: f32,
}

impl Default for FractalLayersEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FractalLayersEngine {
    /// Create the engine
    pub fn new() -> Self {
        debug!("FractalLayersEngine created");
        Self {
            magnitudes: Arc::new(MagnitudeSpectrum::silent(0)),
            playing: false,
            time: 0.0,
            frame_counter: 0,
            bands: BandEnergies::default(),
            energy: 0.0,
            phases: Phases::default(),
            rotation_x: 0.0,
            rotation_y: 0.0,
            rotation_z: 0.0,
            background: BackgroundMode::default(),
            background_timer: 0.0,
        }
    }

    /// Background currently shown
    pub fn background(&self) -> BackgroundMode {
        self.background
    }

    /// Smoothed low/mid/high energies
    pub fn bands(&self) -> BandEnergies {
        self.bands
    }

    /// Aggregate energy
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Layers drawn at the current energy
    pub fn layer_count(&self) -> usize {
        if self.playing {
            (10 + (self.energy * 6.0) as usize).min(MAX_LAYERS)
        } else {
            6
        }
    }

    fn analyze(&mut self, step: f32) {
        let frames = step / FRAME_STEP;
        let rate = 1.0 - (1.0 - SMOOTHING).powf(frames);
        self.bands.track(self.magnitudes.bins(), rate);
        self.energy = self.bands.energy();

        let BandEnergies { low, mid, high } = self.bands;
        let p = &mut self.phases;
        p.global_rotation += (mid * 0.03 + high * 0.012 + 0.002) * frames;
        p.spiral += (low * 0.08 + mid * 0.025 + 0.01) * frames;
        p.fold += (high * 0.1 + low * 0.02 + 0.008) * frames;
        p.pulse += (low * 0.15 + 0.02) * frames;
        p.color_shift += (self.energy * 0.6 + 0.25) * frames;
        p.background_hue = (p.background_hue + (low * 2.0 + mid * 1.2 + 0.4) * frames) % 360.0;
        p.tunnel += (low * 0.05 + 0.008) * frames;
        p.hologram += (mid * 0.12 + 0.015) * frames;
        p.particles += (self.energy * 0.8 + 0.3) * frames;
        p.morph += (high * 0.06 + 0.012) * frames;
        p.lighting += (low * 0.04 + high * 0.02 + 0.01) * frames;

        self.rotation_x += (mid * 0.015 + high * 0.008) * frames;
        self.rotation_y += (low * 0.02 + mid * 0.012) * frames;
        self.rotation_z += (high * 0.025 + low * 0.01) * frames;
    }

    fn decay(&mut self) {
        self.bands.decay(PAUSED_DECAY);
        self.energy *= PAUSED_DECAY;
    }

    fn advance_background(&mut self, step: f32) {
        self.background_timer += step;
        if self.background_timer >= BACKGROUND_PERIOD {
            self.background_timer = 0.0;
            self.background = self.background.next();
            debug!("FractalLayersEngine background: {}", self.background);
        }
    }

    // Backgrounds

    fn draw_background(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        match self.background {
            BackgroundMode::NeonGrid => self.draw_neon_grid(canvas, frame),
            BackgroundMode::PlasmaTunnel => self.draw_plasma_tunnel(canvas, frame),
            BackgroundMode::StarField => self.draw_star_field(canvas, frame),
            BackgroundMode::QuantumWaves => self.draw_quantum_waves(canvas, frame),
            BackgroundMode::HolographicRings => self.draw_holographic_rings(canvas, frame),
        }
    }

    fn draw_neon_grid(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let hue = self.phases.background_hue;
        let BandEnergies { low, mid, .. } = self.bands;
        let on = self.playing;

        canvas.clear(if on {
            Rgba::from_hsv(hue + 180.0, 80.0, 12.0 + self.energy * 8.0)
        } else {
            Rgba::from_hsv(hue, 40.0, 6.0)
        });

        let width = 1.0 + if on { low * 1.5 } else { 0.0 };
        let grid = 40.0 + if on { mid * 20.0 } else { 0.0 };
        let alpha = if on { 80.0 + (self.energy * 60.0).trunc() } else { 30.0 };
        let color = Rgba::from_hsv(hue, 70.0, 60.0).with_alpha(alpha_from_f32(alpha));
        let paint = Paint::stroke(color, width).with_blend(BlendMode::Plus);

        let sway_y = if on { low * 10.0 } else { 2.0 };
        let mut y = 0.0;
        while y < frame.height {
            let offset = (y * 0.01 + self.time * 2.0).sin() * sway_y;
            canvas.draw_line(
                Vec2::new(0.0, y + offset),
                Vec2::new(frame.width, y + offset),
                &paint,
            );
            y += grid;
        }

        let sway_x = if on { mid * 8.0 } else { 1.5 };
        let mut x = 0.0;
        while x < frame.width {
            let offset = (x * 0.01 + self.time * 1.5).cos() * sway_x;
            canvas.draw_line(
                Vec2::new(x + offset, 0.0),
                Vec2::new(x + offset, frame.height),
                &paint,
            );
            x += grid;
        }
    }

    fn draw_plasma_tunnel(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let hue = self.phases.background_hue;
        let BandEnergies { low, mid, high } = self.bands;
        let e = self.energy;

        let colors = if self.playing {
            [
                Rgba::from_hsv(hue, 90.0, 5.0),
                Rgba::from_hsv(hue + 60.0, 80.0 + low * 20.0, 15.0 + e * 20.0),
                Rgba::from_hsv(hue + 120.0, 70.0 + mid * 30.0, 25.0 + e * 25.0),
                Rgba::from_hsv(hue + 180.0, 60.0 + high * 25.0, 20.0 + e * 20.0),
                Rgba::BLACK,
            ]
        } else {
            [
                Rgba::from_hsv(hue, 50.0, 3.0),
                Rgba::from_hsv(hue + 90.0, 40.0, 8.0),
                Rgba::from_hsv(hue + 180.0, 30.0, 12.0),
                Rgba::from_hsv(hue + 270.0, 20.0, 6.0),
                Rgba::BLACK,
            ]
        };
        let positions = [0.0, 0.2, 0.5, 0.8, 1.0];
        let tunnel = if self.playing { self.phases.tunnel * 0.2 } else { 0.0 };

        for i in 0..3 {
            let fi = i as f32;
            let center = Vec2::new(
                frame.width * (0.3 + fi * 0.2 + (self.time + fi).sin() * 0.1),
                frame.height * (0.3 + fi * 0.2 + (self.time * 0.7 + fi).cos() * 0.1),
            );
            let shader = Shader::Radial {
                center,
                radius: frame.min_dimension() * (0.6 + fi * 0.3 + tunnel),
                stops: positions
                    .iter()
                    .zip(colors)
                    .map(|(&p, c)| GradientStop::new(p, c))
                    .collect(),
            };
            let blend = if i == 0 { BlendMode::Src } else { BlendMode::Plus };
            let paint = Paint::fill(Rgba::WHITE).with_shader(shader).with_blend(blend);
            canvas.draw_rect(frame.bounds(), &paint);
        }
    }

    fn draw_star_field(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let hue = self.phases.background_hue;
        let on = self.playing;
        let BandEnergies { low, high, .. } = self.bands;

        canvas.clear(Rgba::from_hsv(
            hue + 200.0,
            30.0,
            8.0 + if on { self.energy * 6.0 } else { 0.0 },
        ));
        if frame.width <= 0.0 || frame.height <= 0.0 {
            return;
        }

        let stars = if on {
            (100 + (self.energy * 50.0) as usize).min(200)
        } else {
            60
        };
        for i in 0..stars {
            let fi = i as f32;
            let x = (frame.width * ((fi * GOLDEN_RATIO) % 1.0)
                + self.time * (10.0 + (i % 20) as f32))
                .rem_euclid(frame.width);
            let y = (frame.height * ((fi * INV_GOLDEN_RATIO) % 1.0)
                + self.time * (5.0 + (i % 15) as f32))
                .rem_euclid(frame.height);

            let mut brightness = 0.3 + (self.time * 2.0 + fi).sin() * 0.3;
            if on {
                brightness += high * 0.4;
            }
            if brightness < 0.1 {
                continue;
            }

            let size = 0.5 + brightness * 2.0 + if on { low * 1.5 } else { 0.0 };
            let color = Rgba::from_hsv(hue + fi * 10.0, 60.0, brightness * 100.0)
                .with_alpha_unit(brightness);
            let paint = Paint::fill(color).with_blend(BlendMode::Plus);
            canvas.draw_circle(Vec2::new(x, y), size, &paint);
        }
    }

    fn draw_quantum_waves(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let hue = self.phases.background_hue;
        let on = self.playing;
        let BandEnergies { low, mid, .. } = self.bands;

        canvas.clear(Rgba::from_hsv(
            hue,
            20.0,
            4.0 + if on { self.energy * 8.0 } else { 0.0 },
        ));

        let waves = if on { 6 } else { 3 };
        for wave in 0..waves {
            let fw = wave as f32;
            let phase = self.time * (0.5 + fw * 0.1) + fw * 1.2;
            let amplitude = (10.0 + fw * 5.0) * if on { 1.0 + low * 0.8 } else { 0.5 };
            let frequency = 0.01 + fw * 0.003;
            let base_y = frame.height * (0.3 + fw * 0.1);

            let points = (0..)
                .map(|k| k as f32 * 8.0)
                .take_while(|&x| x <= frame.width)
                .map(|x| {
                    let y = base_y
                        + (x * frequency + phase).sin() * amplitude
                        + (x * frequency * 1.7 + phase * 1.3).sin() * amplitude * 0.3;
                    Vec2::new(x, y)
                });

            let color = Rgba::from_hsv(
                hue + fw * 45.0,
                70.0,
                40.0 + if on { self.energy * 30.0 } else { 0.0 },
            )
            .with_alpha(100);
            let width = 1.0 + if on { mid * 2.0 } else { 0.0 };
            let paint = Paint::stroke(color, width).with_blend(BlendMode::Plus);
            canvas.draw_path(&Path::polyline(points), &paint);
        }
    }

    fn draw_holographic_rings(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let hue = self.phases.background_hue;
        let hologram = self.phases.hologram;
        let on = self.playing;
        let BandEnergies { low, mid, high } = self.bands;

        canvas.clear(Rgba::from_hsv(
            hue + 120.0,
            40.0,
            6.0 + if on { self.energy * 10.0 } else { 0.0 },
        ));

        let rings = if on { 8 } else { 4 };
        let scale = if on { 1.0 + mid * 0.3 } else { 1.0 };
        for i in 0..rings {
            let fi = i as f32;
            let radius = ((fi + 1.0) * 25.0 + (hologram + fi * 0.5).sin() * 15.0) * scale;
            let alpha = (150.0 - fi * 10.0 + if on { high * 80.0 } else { 0.0 }).max(20.0);
            if alpha < 25.0 {
                continue;
            }

            let color = Rgba::from_hsv(hue + fi * 30.0 + hologram * 50.0, 80.0, 70.0)
                .with_alpha(alpha_from_f32(alpha));
            let width = 1.0 + if on { low * 2.0 } else { 0.0 };
            let paint = Paint::stroke(color, width).with_blend(BlendMode::Screen);
            canvas.draw_circle(frame.center(), radius, &paint);
        }
    }

    // Fractal layers

    fn apply_camera(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let center = frame.center();
        canvas.translate(center.x, center.y);
        if self.playing {
            let zoom = 1.0 + (self.phases.pulse * 2.5).sin() * 0.12 + self.bands.low * 0.2;
            canvas.scale(zoom, zoom);
            canvas.rotate(self.rotation_z.to_degrees());
            canvas.scale(1.0 + self.rotation_x.sin() * 0.3, 1.0);
        } else {
            let zoom = 1.0 + (self.time * 0.8).sin() * 0.02;
            canvas.scale(zoom, zoom);
            canvas.rotate((self.time * 0.08).to_degrees());
        }
    }

    fn draw_layers(&self, canvas: &mut dyn Canvas, base_size: f32) {
        let total = self.layer_count();
        for layer in 0..total {
            let depth = layer as f32 / (total - 1).max(1) as f32;
            let z = depth - 0.5;
            let scale = (1.0 - depth * 0.3) * PERSPECTIVE / (PERSPECTIVE + z * 200.0);

            let speed = if self.playing { 1.0 - depth * 0.5 } else { 0.15 };
            let rotation =
                layer as f32 * 0.4 + self.phases.spiral * speed + self.rotation_z * (1.0 - depth);

            canvas.save();
            canvas.scale(scale, scale);
            canvas.rotate(rotation.to_degrees());

            let radius = base_size * scale;
            match self.figure_for(layer) {
                Figure::Spiral => self.draw_spiral(canvas, radius, layer),
                Figure::Mandala => self.draw_mandala(canvas, radius, layer),
                Figure::Flower => self.draw_flower(canvas, radius, layer),
            }
            canvas.restore();
        }
    }

    fn figure_for(&self, layer: usize) -> Figure {
        let morph = (self.phases.morph + layer as f32 * 0.3).sin() * 0.5 + 0.5;
        if morph > 0.7 {
            Figure::Spiral
        } else if morph > 0.4 {
            Figure::Mandala
        } else {
            Figure::Flower
        }
    }

    fn layer_paint(&self, layer: usize, figure: Figure) -> Paint {
        let BandEnergies { low, mid, high } = self.bands;
        let fl = layer as f32;
        let p = &self.phases;
        let hue = p.color_shift * 15.0 + fl * 30.0 + self.time * 8.0 + p.lighting * 20.0;

        let (saturation, brightness, width) = if self.playing {
            match figure {
                Figure::Spiral => (
                    85.0 + low * 15.0,
                    75.0 + low * 25.0 + (p.lighting + fl).sin() * 15.0,
                    2.2 + low * 2.8,
                ),
                Figure::Mandala => (
                    75.0 + mid * 20.0,
                    70.0 + mid * 30.0 + (p.lighting * 1.3 + fl).cos() * 12.0,
                    1.8 + mid * 2.2,
                ),
                Figure::Flower => (
                    65.0 + high * 25.0,
                    65.0 + high * 35.0 + (p.lighting * 0.8 + fl).sin() * 18.0,
                    1.4 + high * 2.6,
                ),
            }
        } else {
            (55.0, 45.0, 1.2)
        };

        let mut alpha = 0.85 - fl * 0.05 + if self.playing { self.energy * 0.15 } else { 0.0 };
        alpha += (p.hologram + fl * 0.4).sin() * 0.1;
        let color = Rgba::from_hsv(hue, saturation, brightness)
            .with_alpha(alpha_from_unit(alpha.max(0.15)));

        let blend = match layer % 4 {
            0 => BlendMode::Plus,
            1 => BlendMode::Screen,
            2 => BlendMode::ColorDodge,
            _ => BlendMode::Lighten,
        };
        Paint::stroke(color, (width - fl * 0.06).max(0.4)).with_blend(blend)
    }

    fn draw_spiral(&self, canvas: &mut dyn Canvas, radius: f32, layer: usize) {
        let paint = self.layer_paint(layer, Figure::Spiral);
        let BandEnergies { low, mid, high } = self.bands;
        let arms = if self.playing { (5 + (low * 4.0) as usize).min(8) } else { 4 };
        let points = if self.playing { 140 } else { 80 };
        let fl = layer as f32;
        let p = &self.phases;

        let arm: Vec<Vec2> = (0..points)
            .map(|i| {
                let t = i as f32 / (points - 1) as f32;
                let angle = t * PI * 8.0 + p.spiral + fl * 0.2;
                let spiral_radius = radius * (0.05 + t * t * 0.95);

                let mut modulation = (angle * 1.5).sin() * 0.18
                    + (angle * 2.3 + self.time * 1.2).cos() * 0.12
                    + (angle * 0.8 + p.tunnel).sin() * 0.1;
                if self.playing {
                    modulation += low * (angle * 2.0 + p.pulse).sin() * 0.35
                        + mid * (angle * 3.2 + self.time * 1.8).cos() * 0.25
                        + high * (angle * 4.1 + self.time * 2.5).sin() * 0.15;
                }

                let z = (angle * 1.1 + fl * 0.5).sin() * 50.0;
                let r = spiral_radius * (1.0 + modulation) * PERSPECTIVE / (PERSPECTIVE + z);
                Vec2::from_angle(angle) * r
            })
            .collect();
        let path = Path::polyline(arm);

        for a in 0..arms {
            let rotation = a as f32 * TAU / arms as f32 + p.spiral * 0.3;
            canvas.save();
            canvas.rotate(rotation.to_degrees());
            canvas.draw_path(&path, &paint);
            canvas.restore();
        }
    }

    fn draw_mandala(&self, canvas: &mut dyn Canvas, radius: f32, layer: usize) {
        let paint = self.layer_paint(layer, Figure::Mandala);
        let BandEnergies { mid, high, .. } = self.bands;
        let sides = if self.playing { (6 + (mid * 5.0) as usize).min(12) } else { 5 };
        let step = TAU / sides as f32;

        for ring in 0..3 {
            let fr = ring as f32;
            let ring_radius = radius * (0.3 + fr * 0.3);
            let points: Vec<Vec2> = (0..sides)
                .map(|i| {
                    let angle = i as f32 * step + self.phases.global_rotation * (0.5 + fr * 0.2);
                    let reach = if self.playing { high * 0.3 } else { 0.0 };
                    let mut distance = ring_radius * (0.8 + reach);
                    distance *= 1.0 + (angle * 2.0 + self.time * 1.5 + fr).sin() * 0.1;
                    Vec2::from_angle(angle) * distance
                })
                .collect();
            canvas.draw_path(&Path::polygon(&points), &paint);
        }
    }

    fn draw_flower(&self, canvas: &mut dyn Canvas, radius: f32, layer: usize) {
        let paint = self.layer_paint(layer, Figure::Flower);
        let BandEnergies { low, mid, .. } = self.bands;
        let petals = if self.playing { (7 + (low * 3.0) as usize).min(12) } else { 6 };
        let petal_radius = radius * (0.4 + if self.playing { mid * 0.2 } else { 0.0 });
        let fl = layer as f32;

        let petal = Path::polyline((0..=30).map(|i| {
            let t = i as f32 / 30.0;
            let a = t * PI;
            Vec2::new(
                petal_radius * t * a.cos(),
                petal_radius * a.sin() * (a * 2.0 + self.time + fl * 0.3).sin() * 0.8,
            )
        }));

        for i in 0..petals {
            let angle = i as f32 * TAU / petals as f32 + self.phases.fold * 0.5;
            canvas.save();
            canvas.rotate(angle.to_degrees());
            canvas.draw_path(&petal, &paint);
            canvas.restore();
        }
    }

    // Energy-gated effects

    fn draw_advanced_effects(&self, canvas: &mut dyn Canvas, center: Vec2, base_size: f32) {
        let BandEnergies { low, mid, high } = self.bands;
        if self.energy > 0.2 {
            self.draw_energy_rings(canvas, center, base_size);
        }
        if high > 0.25 {
            self.draw_orbit_particles(canvas, center, base_size);
        }
        if low > 0.3 {
            self.draw_lightning(canvas, center, base_size);
        }
        if mid > 0.35 {
            self.draw_projections(canvas, center, base_size);
        }
    }

    fn draw_energy_rings(&self, canvas: &mut dyn Canvas, center: Vec2, base_size: f32) {
        let rings = ((self.energy * 8.0) as usize).min(6);
        for i in 0..rings {
            let fi = i as f32;
            let radius = base_size * (0.7 + fi * 0.25 + (self.time * 4.0 + fi).sin() * 0.15);
            let hue = self.phases.color_shift * 12.0 + fi * 72.0 + self.time * 30.0;
            let pulse = (self.phases.pulse * 3.0 + fi * 0.8).sin() * 0.5 + 0.5;
            let glow = self.energy * pulse;

            let color = Rgba::from_hsv(hue, 80.0 + glow * 20.0, 70.0 + glow * 30.0)
                .with_alpha(alpha_from_f32(140.0 + glow * 80.0));
            let width = 1.5 + self.bands.low * 3.0 + pulse * 2.0;
            let paint = Paint::stroke(color, width).with_blend(BlendMode::Plus);
            canvas.draw_circle(center, radius, &paint);

            if i % 2 == 0 {
                let inner = Paint::stroke(color.with_alpha(80), width * 0.3)
                    .with_blend(BlendMode::Plus);
                canvas.draw_circle(center, radius * 0.7, &inner);
            }
        }
    }

    fn draw_orbit_particles(&self, canvas: &mut dyn Canvas, center: Vec2, base_size: f32) {
        let high = self.bands.high;
        let count = ((high * 40.0 + self.energy * 20.0) as usize).min(35);
        let pt = self.phases.particles;

        for i in 0..count {
            let fi = i as f32;
            let system_angle = fi * GOLDEN_RATIO * TAU + pt * 1.5;
            let system_radius = base_size * (0.3 + (pt * 1.2 + fi * 0.1).sin() * 0.5);
            let orbit_angle = system_angle * 3.0 + self.time * 2.0;
            let orbit_radius = system_radius * 0.2 * (1.0 + (self.time * 3.0 + fi).sin() * 0.3);

            let position = center
                + Vec2::from_angle(system_angle) * system_radius
                + Vec2::from_angle(orbit_angle) * orbit_radius;

            let hue = pt * 80.0 + fi * 25.0 + high * 50.0;
            let brightness = 60.0 + high * 40.0 + (self.time * 4.0 + fi).sin() * 20.0;
            let color = Rgba::from_hsv(hue, 90.0, brightness).with_alpha(180);
            let size = 1.2 + high * 4.0 + (self.time * 5.0 + fi * 0.3).sin() * 1.5;
            canvas.draw_circle(position, size, &Paint::fill(color).with_blend(BlendMode::Plus));

            if i % 3 == 0 {
                let trail = position - Vec2::from_angle(system_angle) * size * 3.0;
                let paint = Paint::fill(color.with_alpha(60)).with_blend(BlendMode::Plus);
                canvas.draw_circle(trail, size * 0.4, &paint);
            }
        }
    }

    fn draw_lightning(&self, canvas: &mut dyn Canvas, center: Vec2, base_size: f32) {
        let low = self.bands.low;
        let bolts = ((low * 6.0) as usize).min(4);
        let t = self.time;

        for bolt in 0..bolts {
            let fb = bolt as f32;
            let angle = fb * TAU / bolts as f32 + t * 2.0;
            let intensity = low + (t * 6.0 + fb).sin() * 0.3;

            let mut path = Path::new();
            path.move_to(center + Vec2::from_angle(angle) * base_size * 0.2);
            for seg in 1..=8 {
                let fs = seg as f32;
                let distance = base_size * (0.2 + fs / 8.0 * 0.6);
                let jitter = (t * 10.0 + fb * 3.0 + fs).sin() * base_size * 0.1 * intensity;
                let seg_angle = angle + jitter * 0.1;
                let wobble = Vec2::new((t * 8.0 + fs * 2.0).sin(), (t * 7.0 + fs * 1.5).cos());
                path.line_to(center + Vec2::from_angle(seg_angle) * distance + wobble * jitter);
            }

            let color = Rgba::from_hsv(t * 100.0 + fb * 90.0, 70.0, 90.0)
                .with_alpha(alpha_from_f32(intensity * 200.0));
            let paint = Paint::stroke(color, 2.0 + intensity.max(0.0) * 4.0)
                .with_blend(BlendMode::Plus);
            canvas.draw_path(&path, &paint);
        }
    }

    fn draw_projections(&self, canvas: &mut dyn Canvas, center: Vec2, base_size: f32) {
        let mid = self.bands.mid;
        let hologram = self.phases.hologram;
        let count = ((mid * 5.0) as usize).min(3);

        for proj in 0..count {
            let fp = proj as f32;
            let angle = fp * TAU / count as f32 + hologram;
            let target = center + Vec2::from_angle(angle) * base_size * (1.2 + fp * 0.3);
            let intensity = mid * (0.7 + (hologram * 2.0 + fp).sin() * 0.3);
            let color = Rgba::from_hsv(hologram * 60.0 + fp * 120.0, 60.0, 80.0);

            for layer in 0..3 {
                let fl = layer as f32;
                let layer_alpha = intensity * (1.0 - fl * 0.3);
                let color = color.with_alpha(alpha_from_f32(layer_alpha * 120.0));
                let ring = Paint::stroke(color, 1.0 + mid * 2.0).with_blend(BlendMode::Screen);
                canvas.draw_circle(target, base_size * 0.3 * (1.0 - fl * 0.2), &ring);

                let beam = Paint::stroke(color, 0.5 + mid).with_blend(BlendMode::Screen);
                canvas.draw_line(center, target, &beam);
            }
        }
    }

    fn draw_post_effects(&self, canvas: &mut dyn Canvas) {
        if self.energy > 0.1 || !self.playing {
            let (mid, edge) = post::vignette_colors(self.phases.background_hue, self.playing);
            post::vignette(canvas, mid, edge);
        }
        if self.playing && self.bands.mid > 0.2 {
            post::scanlines(canvas, self.time, self.phases.hologram * 40.0, self.bands.mid);
        }
        if self.playing && self.energy > 0.4 {
            post::chromatic_aberration(canvas, self.energy);
        }
    }
}

impl Visualizer for FractalLayersEngine {
    fn name(&self) -> &'static str {
        "Fractal Layers"
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
        self.frame_counter += 1;
        self.time += step;

        if self.playing {
            self.analyze(step);
        } else {
            self.decay();
        }
        self.advance_background(step);

        self.draw_background(canvas, frame);

        let base_size = frame.min_dimension() * 0.4;
        canvas.save();
        self.apply_camera(canvas, frame);
        self.draw_layers(canvas, base_size);
        canvas.restore();

        if self.playing && self.energy > 0.08 {
            self.draw_advanced_effects(canvas, frame.center(), base_size);
        }
        self.draw_post_effects(canvas);

        if self.frame_counter % 600 == 0 {
            trace!(
                "FractalLayers frame {}: energy={:.3}, layers={}, background={}",
                self.frame_counter,
                self.energy,
                self.layer_count(),
                self.background
            );
        }
    }

    fn animation_time(&self) -> f32 {
        self.time
    }
}
