//! Kaleidoscope engine: radial spectrum, pulse rings, beat-driven particles
//!
//! The radial spectrum is drawn in mirrored pairs: every slot appears at
//! the same offset on both sides of a slowly rotating axis.

use super::{group_bands, MAX_BANDS};
use crate::engine::{per_frame, FrameInfo, Visualizer, FRAME_STEP, PAUSED_DECAY};
use crate::post;
use crate::Result;
use musictech_core::color::alpha_from_f32;
use musictech_core::{
    BandEnergies, BeatDetector, Canvas, MagnitudeSpectrum, Paint, ParticleSystem, Path, Rgba,
    Shader, Vec2, VisualizerConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, trace};

/// Particles drawn per spectrum band
pub const PARTICLES_PER_BAND: usize = 8;
const WAVE_LINES: usize = 8;
const WEDGES: usize = 6;
const PULSE_RINGS: usize = 3;

const WAVEFORM_GAIN: f32 = 4000.0;
const RADIAL_GAIN: f32 = 5000.0;
const MAX_RADIAL_INTENSITY: f32 = 40.0;
const SMOOTHING: f32 = 0.12;
const HUE_DRIFT: f32 = 20.0;

/// Waveform gradient, red through pink
const PALETTE: [Rgba; 7] = [
    Rgba::rgb(255, 0, 0),
    Rgba::rgb(255, 191, 0),
    Rgba::rgb(255, 255, 0),
    Rgba::rgb(0, 255, 0),
    Rgba::rgb(0, 0, 255),
    Rgba::rgb(170, 0, 255),
    Rgba::rgb(255, 0, 170),
];

/// One radial-spectrum particle in the rotating axis frame.
/// Its mirror image sits at `(offset.x, -offset.y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialSlot {
    /// Position relative to the center, axis along +x
    pub offset: Vec2,
    /// Circle radius
    pub size: f32,
    /// Hue in degrees
    pub hue: f32,
    /// Band index
    pub band: usize,
    /// Index within the band
    pub index: usize,
}

/// Radial layout for `bands` at animation time `time`. Slots are spread over
/// a half circle; the caller draws each slot and its mirror.
pub fn radial_layout(bands: &[f32], time: f32, pulse_size: f32, out: &mut Vec<RadialSlot>) {
    out.clear();
    if bands.is_empty() {
        return;
    }

    let total = (bands.len() * PARTICLES_PER_BAND) as f32;
    let spacing = 180.0 / total;

    for (i, &magnitude) in bands.iter().enumerate() {
        let intensity = (magnitude * RADIAL_GAIN).min(MAX_RADIAL_INTENSITY);
        if intensity < 0.1 {
            continue;
        }

        let fi = i as f32;
        let mut base_radius = 100.0 + intensity * 5.0 + (time * 0.8 + fi * 0.1).sin() * 50.0;
        base_radius *= pulse_size * (1.0 + 0.2 * (time * 4.0 + fi * 0.2).sin());

        for j in 0..PARTICLES_PER_BAND {
            let fj = j as f32;
            let slot = (i * PARTICLES_PER_BAND + j) as f32;
            let angle = ((slot + 0.5) * spacing).to_radians();

            let wobble = (intensity * 0.1).min(0.5);
            let distortion = 1.0 + wobble * (time * 3.0 + fi * 0.3 + fj * 0.1).sin();
            let radius = base_radius * distortion;

            out.push(RadialSlot {
                offset: Vec2::new(angle.cos(), angle.sin()) * radius,
                size: 2.0 + magnitude.min(1.0) * 80.0 * pulse_size,
                hue: fi * 360.0 / bands.len() as f32 + fj * 18.0 + time * 30.0,
                band: i,
                index: j,
            });
        }
    }
}

/// Radial kaleidoscope visualizer
pub struct KaleidoscopeEngine {
    magnitudes: Arc<MagnitudeSpectrum>,
    playing: bool,
    time: f32,
    frame_counter: u64,

    background_hue: f32,
    wave_intensity: f32,
    pulse_size: f32,
    rotation_speed: f32,
    kaleidoscope_intensity: f32,
    beat_active: bool,

    energies: BandEnergies,
    beat: BeatDetector,
    particles: ParticleSystem,
    explosion_size: usize,
    rng: StdRng,

    bands: Vec<f32>,
    slots: Vec<RadialSlot>,
}

impl KaleidoscopeEngine {
    /// Engine seeded from the OS
    pub fn new(config: &VisualizerConfig) -> Result<Self> {
        let particles = ParticleSystem::new(config.particles.capacity)?;
        Self::build(config, particles, StdRng::from_os_rng())
    }

    /// Engine with deterministic particles and spawning
    pub fn with_seed(config: &VisualizerConfig, seed: u64) -> Result<Self> {
        Self::build(
            config,
            ParticleSystem::with_seed(config.particles.capacity, seed)?,
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        )
    }

    fn build(config: &VisualizerConfig, particles: ParticleSystem, rng: StdRng) -> Result<Self> {
        let beat = BeatDetector::new(&config.beat)?;
        debug!(
            "KaleidoscopeEngine created: particles={}, explosion={}",
            config.particles.capacity, config.particles.explosion_size
        );
        Ok(Self {
            magnitudes: Arc::new(MagnitudeSpectrum::silent(0)),
            playing: false,
            time: 0.0,
            frame_counter: 0,
            background_hue: 0.0,
            wave_intensity: 0.0,
            pulse_size: 1.0,
            rotation_speed: 0.5,
            kaleidoscope_intensity: 0.0,
            beat_active: false,
            energies: BandEnergies::default(),
            beat,
            particles,
            explosion_size: config.particles.explosion_size,
            rng,
            bands: Vec::with_capacity(MAX_BANDS),
            slots: Vec::with_capacity(MAX_BANDS * PARTICLES_PER_BAND),
        })
    }

    /// Live particles
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Current wedge opacity factor
    pub fn kaleidoscope_intensity(&self) -> f32 {
        self.kaleidoscope_intensity
    }

    /// Current pulse ring scale
    pub fn pulse_size(&self) -> f32 {
        self.pulse_size
    }

    /// Beat detector state
    pub fn beat(&self) -> &BeatDetector {
        &self.beat
    }

    /// Smoothed band energies driving hue drift and ambient spawning
    pub fn energies(&self) -> BandEnergies {
        self.energies
    }

    fn update(&mut self, step: f32) {
        let peak = self.magnitudes.peak();

        if self.playing {
            let frames = step / FRAME_STEP;
            self.energies
                .track(self.magnitudes.bins(), 1.0 - (1.0 - SMOOTHING).powf(frames));

            // Transients are judged against the detector's own history
            self.beat_active = self.beat.update(peak, true, self.time);
            if self.beat_active {
                self.trigger_beat();
            }

            let drift = self.energies.energy() * HUE_DRIFT * frames;
            self.background_hue = (self.background_hue + drift).rem_euclid(360.0);
            self.pulse_size = (self.pulse_size * per_frame(0.95, step)).max(1.0);
            self.wave_intensity = (self.wave_intensity * per_frame(0.97, step)).max(0.1);
            self.kaleidoscope_intensity *= per_frame(0.95, step);
            self.rotation_speed = (self.rotation_speed * per_frame(0.77, step)).max(0.2);

            if self.rng.random::<f32>() < self.energies.average() {
                self.particles.spawn_ambient();
            }
        } else {
            self.beat_active = self.beat.update(peak, false, self.time);
            self.energies.decay(PAUSED_DECAY);
            self.pulse_size = (self.pulse_size * PAUSED_DECAY).max(1.0);
            self.wave_intensity = (self.wave_intensity * PAUSED_DECAY).max(0.1);
            self.kaleidoscope_intensity *= PAUSED_DECAY;
        }

        self.particles.set_base_hue(self.background_hue);
        self.particles.set_hue_rotation(self.time * 20.0);
        self.particles.advance(step, &self.magnitudes);
    }

    fn trigger_beat(&mut self) {
        self.particles.spawn_explosion(self.explosion_size);
        self.pulse_size = 1.8;
        self.wave_intensity += 0.5;
        self.kaleidoscope_intensity = 1.0;
        self.rotation_speed *= 0.9;
        self.background_hue = (self.background_hue + 40.0).rem_euclid(360.0);
    }

    fn draw_background(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let shader = Shader::radial(
            frame.center(),
            frame.width * 0.7,
            &[
                Rgba::from_hsv(self.background_hue, 70.0, 20.0),
                Rgba::from_hsv(self.background_hue + 180.0, 80.0, 10.0),
            ],
        );
        canvas.draw_rect(frame.bounds(), &Paint::fill(Rgba::WHITE).with_shader(shader));

        let amplitude = frame.height * 0.1 * (1.0 + self.wave_intensity * 0.5);
        for i in 0..WAVE_LINES {
            let fi = i as f32;
            let alpha = 40 + (i % 2) as u8 * 40;
            let color = Rgba::from_hsva(self.background_hue + fi * 10.0, 80.0, 50.0, alpha);
            let frequency = 0.005 + fi * 0.001;
            let phase = self.time * (0.5 + fi * 0.1);

            let points = (0..)
                .map(|k| k as f32 * 20.0)
                .take_while(|&x| x < frame.width)
                .map(|x| {
                    let y = frame.height * 0.5
                        + amplitude * (x * frequency + phase).sin()
                        + amplitude * 0.5 * (x * frequency * 2.0 + phase * 1.5).sin();
                    Vec2::new(x, y)
                });
            canvas.draw_path(&Path::polyline(points), &Paint::stroke(color, 2.0));
        }
    }

    fn draw_waveform(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let bins = self.magnitudes.bins();
        if bins.is_empty() {
            return;
        }

        let step_x = frame.width / bins.len() as f32;
        let center_y = frame.height * 0.5;
        let limit = center_y;
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, center_y));
        for (i, &m) in bins.iter().enumerate() {
            let intensity = (m * WAVEFORM_GAIN * (1.0 + self.wave_intensity)).min(limit);
            let y = center_y + intensity * (self.time * 2.0 + i as f32 * 0.2).sin();
            path.line_to(Vec2::new(i as f32 * step_x, y));
        }

        let shader = Shader::linear(Vec2::ZERO, Vec2::new(frame.width, 0.0), &PALETTE);
        canvas.draw_path(&path, &Paint::stroke(Rgba::WHITE, 3.0).with_shader(shader));
    }

    fn draw_radial_spectrum(&mut self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        group_bands(self.magnitudes.bins(), MAX_BANDS, &mut self.bands);
        radial_layout(&self.bands, self.time, self.pulse_size, &mut self.slots);
        if self.slots.is_empty() {
            return;
        }

        let center = frame.center();
        canvas.save();
        canvas.translate(center.x, center.y);
        canvas.rotate(self.time * self.rotation_speed * 6.0);

        for slot in &self.slots {
            let mirrored = Vec2::new(slot.offset.x, -slot.offset.y);
            let mut size = slot.size;
            if self.beat_active && slot.index == 0 {
                let glow = Paint::fill(Rgba::from_hsva(slot.hue, 100.0, 100.0, 100));
                canvas.draw_circle(slot.offset, size * 2.0, &glow);
                canvas.draw_circle(mirrored, size * 2.0, &glow);
                size *= 1.5;
            }
            let paint = Paint::fill(Rgba::from_hsva(slot.hue, 100.0, 100.0, 200));
            canvas.draw_circle(slot.offset, size, &paint);
            canvas.draw_circle(mirrored, size, &paint);
        }

        canvas.restore();
    }

    fn draw_central_pulse(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let center = frame.center();
        let base_radius = 50.0 * self.pulse_size;

        for i in 0..PULSE_RINGS {
            let fi = i as f32;
            let phase = self.time * 2.0 + fi * std::f32::consts::PI / PULSE_RINGS as f32;
            let radius = base_radius * (1.0 + fi * 0.5) * (1.0 + 0.5 * phase.sin());
            let width = (2.0 + 3.0 * (phase * 0.7 + fi).sin()).max(0.5);
            let alpha = alpha_from_f32(150.0 + 100.0 * phase.sin());
            let color = Rgba::from_hsva(
                self.background_hue + fi * 30.0 + self.time * 20.0,
                100.0,
                100.0,
                alpha,
            );
            canvas.draw_circle(center, radius, &Paint::stroke(color, width));
        }

        if self.beat_active {
            let shader = Shader::radial(
                center,
                base_radius * 2.0,
                &[
                    Rgba::from_hsva(self.background_hue, 100.0, 100.0, 200),
                    Rgba::from_hsva(self.background_hue, 100.0, 100.0, 0),
                ],
            );
            canvas.draw_circle(
                center,
                base_radius * 3.0,
                &Paint::fill(Rgba::WHITE).with_shader(shader),
            );
        }
    }

    fn draw_wedges(&self, canvas: &mut dyn Canvas, frame: &FrameInfo) {
        let center = frame.center();
        let radius = frame.min_dimension() * 0.4;
        let sweep = 360.0 / WEDGES as f32;
        let alpha = alpha_from_f32(50.0 * self.kaleidoscope_intensity);

        for segment in 0..WEDGES {
            let start = segment as f32 * sweep;
            let color = Rgba::from_hsva(
                self.background_hue + start + self.time * 10.0,
                90.0,
                70.0,
                alpha,
            );
            canvas.draw_path(
                &Path::wedge(center, radius, start, sweep),
                &Paint::fill(color),
            );
        }
    }
}

impl Visualizer for KaleidoscopeEngine {
    fn name(&self) -> &'static str {
        "Kaleidoscope"
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
        self.update(step);

        self.draw_background(canvas, frame);
        self.draw_waveform(canvas, frame);
        self.draw_radial_spectrum(canvas, frame);
        self.particles.render(canvas, frame.center());
        self.draw_central_pulse(canvas, frame);
        if self.kaleidoscope_intensity > 0.2 {
            self.draw_wedges(canvas, frame);
        }

        let (mid, edge) = post::vignette_colors(self.background_hue, self.playing);
        post::vignette(canvas, mid, edge);

        self.time += step;

        if self.frame_counter % 600 == 0 {
            trace!(
                "Kaleidoscope frame {}: particles={}, tempo={:?}",
                self.frame_counter,
                self.particles.len(),
                self.beat.tempo_bpm()
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
    use crate::recording::RecordingCanvas;

    fn spectrum(value: f32, len: usize) -> Arc<MagnitudeSpectrum> {
        Arc::new(MagnitudeSpectrum::new(vec![value; len], 1))
    }

    #[test]
    fn test_quiet_bands_are_skipped() {
        let mut slots = Vec::new();
        radial_layout(&[0.0, 0.001, 0.0], 0.0, 1.0, &mut slots);
        assert_eq!(slots.len(), PARTICLES_PER_BAND);
        assert!(slots.iter().all(|s| s.band == 1));
    }

    #[test]
    fn test_layout_stays_in_upper_half_circle() {
        let mut slots = Vec::new();
        radial_layout(&[0.01; 16], 1.0, 1.0, &mut slots);
        assert_eq!(slots.len(), 16 * PARTICLES_PER_BAND);
        assert!(slots.iter().all(|s| s.offset.y > 0.0));
    }

    #[test]
    fn test_beat_triggers_explosion() {
        let config = VisualizerConfig::default();
        let mut engine = KaleidoscopeEngine::with_seed(&config, 3).unwrap();
        engine.set_playing(true);
        let mut canvas = RecordingCanvas::new(320.0, 240.0);
        let frame = FrameInfo::new(320.0, 240.0);

        engine.set_magnitudes(spectrum(0.001, 64));
        for _ in 0..30 {
            engine.render(&mut canvas, &frame);
        }
        let before = engine.particle_count();

        engine.set_magnitudes(spectrum(0.01, 64));
        engine.render(&mut canvas, &frame);

        assert!(engine.beat().is_beat(), "loud frame should register as a beat");
        assert!(engine.kaleidoscope_intensity() > 0.9);
        assert!(engine.particle_count() > before);
    }

    #[test]
    fn test_silent_paused_frame_layers() {
        let config = VisualizerConfig::default();
        let mut engine = KaleidoscopeEngine::with_seed(&config, 9).unwrap();
        let mut canvas = RecordingCanvas::new(200.0, 200.0);
        engine.render(&mut canvas, &FrameInfo::new(200.0, 200.0));

        // No bins: no waveform, no radial spectrum, no wedges
        assert_eq!(canvas.count("path"), WAVE_LINES);
        assert_eq!(canvas.count("circle"), PULSE_RINGS);
        assert_eq!(canvas.count("rect"), 2);
    }

    #[test]
    fn test_single_spike_is_smoothed() {
        let config = VisualizerConfig::default();
        let mut engine = KaleidoscopeEngine::with_seed(&config, 5).unwrap();
        engine.set_playing(true);
        let mut canvas = RecordingCanvas::new(160.0, 120.0);
        let frame = FrameInfo::new(160.0, 120.0);

        engine.set_magnitudes(spectrum(0.0, 64));
        for _ in 0..10 {
            engine.render(&mut canvas, &frame);
        }
        assert_eq!(engine.energies().average(), 0.0);

        engine.set_magnitudes(spectrum(0.5, 64));
        engine.render(&mut canvas, &frame);
        let after_spike = engine.energies().average();
        assert!(after_spike > 0.0);
        assert!(after_spike < 0.5 * 0.2, "one frame moved energy to {after_spike}");

        for _ in 0..120 {
            engine.render(&mut canvas, &frame);
        }
        assert!(engine.energies().average() > 0.5 * 0.9);
    }

    #[test]
    fn test_pause_clears_beat() {
        let config = VisualizerConfig::default();
        let mut engine = KaleidoscopeEngine::with_seed(&config, 3).unwrap();
        engine.set_playing(true);
        let mut canvas = RecordingCanvas::new(320.0, 240.0);
        let frame = FrameInfo::new(320.0, 240.0);

        engine.set_magnitudes(spectrum(0.001, 64));
        for _ in 0..30 {
            engine.render(&mut canvas, &frame);
        }
        engine.set_magnitudes(spectrum(0.01, 64));
        engine.render(&mut canvas, &frame);
        assert!(engine.beat().is_beat());

        engine.set_playing(false);
        engine.render(&mut canvas, &frame);
        assert!(!engine.beat().is_beat());
    }
}
