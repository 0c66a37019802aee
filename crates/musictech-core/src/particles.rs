//! Bounded particle pool with audio-reactive forces
//!
//! Positions are offsets from an origin supplied at render time. Velocities
//! are expressed per 1/60 s frame and scaled by `dt * 60` when integrating,
//! so the motion is the same at any frame rate.

use crate::canvas::{Canvas, Paint};
use crate::color::{alpha_from_f32, Rgba};
use crate::smoothing::REFERENCE_FPS;
use crate::{ensure_capacity, Result};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{FRAC_PI_2, TAU};
use tracing::debug;

/// Speed cap, per reference frame
pub const MAX_SPEED: f32 = 15.0;

/// Spectrum magnitude to tangential force
const AUDIO_FORCE_GAIN: f32 = 50.0 * 0.05;

/// Data for a single particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Offset from the origin
    pub position: Vec2,
    /// Displacement per reference frame
    pub velocity: Vec2,
    /// Radius at birth
    pub size: f32,
    /// Hue in degrees
    pub hue: f32,
    /// Alpha at birth
    pub opacity: u8,
    /// Seconds the particle lives
    pub lifetime: f32,
    /// Seconds lived so far
    pub elapsed: f32,
}

impl Particle {
    /// Remaining life fraction, `max(0, 1 - elapsed / lifetime)`
    pub fn remaining(&self) -> f32 {
        if self.lifetime <= 0.0 {
            return 0.0;
        }
        (1.0 - self.elapsed / self.lifetime).max(0.0)
    }

    /// Whether the particle has used up its lifetime
    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.lifetime
    }
}

/// Bounded particle pool
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    capacity: usize,
    rng: StdRng,
    base_hue: f32,
    hue_rotation: f32,
}

impl ParticleSystem {
    /// Pool seeded from the OS
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    /// Pool with a deterministic random source
    pub fn with_seed(capacity: usize, seed: u64) -> Result<Self> {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Result<Self> {
        let capacity = ensure_capacity("particle pool", capacity)?;
        debug!("ParticleSystem created: capacity={}", capacity);
        Ok(Self {
            particles: Vec::with_capacity(capacity),
            capacity,
            rng,
            base_hue: 0.0,
            hue_rotation: 0.0,
        })
    }

    /// Add a ready-made particle; false when the pool is full
    pub fn push(&mut self, particle: Particle) -> bool {
        if self.is_full() {
            return false;
        }
        self.particles.push(particle);
        true
    }

    /// One slow particle near the origin. No-op at capacity.
    pub fn spawn_ambient(&mut self) -> bool {
        if self.is_full() {
            return false;
        }

        let rng = &mut self.rng;
        let particle = Particle {
            position: Vec2::new(
                rng.random_range(-20.0..20.0f32).trunc(),
                rng.random_range(-20.0..20.0f32).trunc(),
            ),
            velocity: Vec2::new(rng.random_range(-5.0..5.0), rng.random_range(-5.0..5.0)),
            size: rng.random_range(1.0..5.0),
            hue: (self.base_hue + rng.random_range(0.0..180.0f32)).rem_euclid(360.0),
            opacity: rng.random_range(100..=255),
            lifetime: rng.random_range(3.0..8.0),
            elapsed: 0.0,
        };
        self.particles.push(particle);
        true
    }

    /// Up to `count` particles radiating from the origin; stops at capacity.
    /// Returns how many were spawned.
    pub fn spawn_explosion(&mut self, count: usize) -> usize {
        let room = self.capacity - self.particles.len();
        let count = count.min(room);

        for _ in 0..count {
            let rng = &mut self.rng;
            let angle = rng.random_range(0.0..TAU);
            let speed = rng.random_range(2.0..10.0f32);
            let particle = Particle {
                position: Vec2::new(
                    rng.random_range(-20.0..20.0f32).trunc(),
                    rng.random_range(-20.0..20.0f32).trunc(),
                ),
                velocity: Vec2::from_angle(angle) * speed,
                size: rng.random_range(2.0..8.0),
                hue: (self.base_hue + rng.random_range(0.0..360.0f32)).rem_euclid(360.0),
                opacity: rng.random_range(150..=255),
                lifetime: rng.random_range(1.0..4.0),
                elapsed: 0.0,
            };
            self.particles.push(particle);
        }
        count
    }

    /// Integrate motion and age; expired particles are dropped.
    ///
    /// Particle `i` is pushed sideways by the magnitude of band
    /// `i % spectrum.len()`, perpendicular to its offset from the origin.
    pub fn advance(&mut self, dt: f32, spectrum: &[f32]) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let frames = dt * REFERENCE_FPS;
        let mut index = 0usize;

        self.particles.retain_mut(|p| {
            let band = index;
            index += 1;

            p.position += p.velocity * frames;

            if !spectrum.is_empty() {
                let magnitude = spectrum[band % spectrum.len()];
                let force = if magnitude.is_finite() {
                    magnitude * AUDIO_FORCE_GAIN
                } else {
                    0.0
                };
                let tangent = Vec2::from_angle(p.position.y.atan2(p.position.x) + FRAC_PI_2);
                p.velocity += tangent * force * frames;
                p.velocity = p.velocity.clamp_length_max(MAX_SPEED);
            }

            p.elapsed += dt;
            !p.is_expired()
        });
    }

    /// Draw every live particle around `origin`, fading with age
    pub fn render(&self, canvas: &mut dyn Canvas, origin: Vec2) {
        for p in &self.particles {
            let remaining = p.remaining();
            if remaining <= 0.0 {
                continue;
            }

            let hue = (p.hue + self.hue_rotation).rem_euclid(360.0);
            let alpha = alpha_from_f32(p.opacity as f32 * remaining);
            let paint = Paint::fill(Rgba::from_hsva(hue, 100.0, 100.0, alpha));
            canvas.draw_circle(origin + p.position, p.size * remaining, &paint);
        }
    }

    /// Hue new particles are derived from
    pub fn set_base_hue(&mut self, hue: f32) {
        self.base_hue = hue;
    }

    /// Hue offset applied when drawing
    pub fn set_hue_rotation(&mut self, degrees: f32) {
        self.hue_rotation = degrees;
    }

    /// Live particles
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Number of live particles
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// No live particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Maximum live particles
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pool is at capacity
    pub fn is_full(&self) -> bool {
        self.particles.len() >= self.capacity
    }

    /// Remove every particle
    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
