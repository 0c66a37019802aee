//! Smoothing primitives shared by the visualizer engines

/// Reference frame rate that per-frame constants are tuned for
pub const REFERENCE_FPS: f32 = 60.0;

/// First-order exponential smoothing step toward `target`
///
/// `rate` is clamped to 0.0 - 1.0; 1.0 snaps to the target.
#[inline]
pub fn approach(current: f32, target: f32, rate: f32) -> f32 {
    let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    current + (target - current) * rate
}

/// Low/mid/high energy of a spectrum, split into thirds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandEnergies {
    /// Lowest third
    pub low: f32,
    /// Middle third
    pub mid: f32,
    /// Highest third
    pub high: f32,
}

impl BandEnergies {
    /// Relative tracking speed of the low band
    pub const LOW_RATE: f32 = 0.85;
    /// Relative tracking speed of the high band
    pub const HIGH_RATE: f32 = 1.15;

    /// Weighted means of the three thirds of `spectrum`.
    ///
    /// The low band leans toward its lowest bins and the high band toward its
    /// highest. Spectra shorter than three bins use the overall mean for every band.
    pub fn from_spectrum(spectrum: &[f32]) -> Self {
        let len = spectrum.len();
        if len == 0 {
            return Self::default();
        }

        let third = len / 3;
        if third == 0 {
            let mean = finite_mean(spectrum.iter().map(|&m| (m, 1.0)));
            return Self {
                low: mean,
                mid: mean,
                high: mean,
            };
        }

        let upper = len - third * 2;
        let low = finite_mean(
            spectrum[..third]
                .iter()
                .enumerate()
                .map(|(i, &m)| (m, 1.0 - i as f32 / third as f32 * 0.5)),
        );
        let mid = finite_mean(spectrum[third..third * 2].iter().map(|&m| (m, 1.0)));
        let high = finite_mean(
            spectrum[third * 2..]
                .iter()
                .enumerate()
                .map(|(i, &m)| (m, 1.0 + i as f32 / upper as f32 * 0.3)),
        );

        Self { low, mid, high }
    }

    /// Track `spectrum` with exponential smoothing at `rate`
    pub fn track(&mut self, spectrum: &[f32], rate: f32) {
        let target = Self::from_spectrum(spectrum);
        self.low = approach(self.low, target.low, rate * Self::LOW_RATE);
        self.mid = approach(self.mid, target.mid, rate);
        self.high = approach(self.high, target.high, rate * Self::HIGH_RATE);
    }

    /// Decay-only update used while paused
    pub fn decay(&mut self, factor: f32) {
        self.low *= factor;
        self.mid *= factor;
        self.high *= factor;
    }

    /// Bass-weighted aggregate energy
    pub fn energy(&self) -> f32 {
        (self.low * 1.2 + self.mid + self.high * 0.8) / 3.0
    }

    /// Plain mean of the three bands
    pub fn average(&self) -> f32 {
        (self.low + self.mid + self.high) / 3.0
    }
}

fn finite_mean(values: impl Iterator<Item = (f32, f32)>) -> f32 {
    let (sum, weight) = values
        .filter(|(m, _)| m.is_finite())
        .fold((0.0, 0.0), |(s, w), (m, wt)| (s + m * wt, w + wt));
    if weight > 0.0 {
        sum / weight
    } else {
        0.0
    }
}

/// Spring-damped scalar, used for bar heights
///
/// Each step: `force = (target - x) * stiffness`,
/// `v = (v + force) * damping`, `x = max(0, x + v * dt * 60)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpringBar {
    /// Current height
    pub position: f32,
    /// Current velocity per reference frame
    pub velocity: f32,
}

impl SpringBar {
    /// Advance one step toward `target`
    pub fn update(&mut self, target: f32, stiffness: f32, damping: f32, dt: f32) -> f32 {
        let force = (target - self.position) * stiffness;
        self.velocity = (self.velocity + force) * damping;
        self.position = (self.position + self.velocity * dt * REFERENCE_FPS).max(0.0);
        if !self.position.is_finite() {
            *self = Self::default();
        }
        self.position
    }
}

/// Peak marker that sits above a value and falls geometrically
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakHold {
    /// Current marker height
    pub peak: f32,
    /// Accumulated decay multiplier; resets to 1 on a new peak
    pub decay: f32,
}

impl Default for PeakHold {
    fn default() -> Self {
        Self {
            peak: 0.0,
            decay: 1.0,
        }
    }
}

impl PeakHold {
    /// Re-trigger on a higher value, otherwise decay toward `value`
    pub fn update(&mut self, value: f32, rate: f32) -> f32 {
        if value > self.peak {
            self.peak = value;
            self.decay = 1.0;
        } else {
            self.decay *= rate;
            self.peak = value.max(self.peak * self.decay);
        }
        self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approach() {
        assert_eq!(approach(0.0, 10.0, 0.5), 5.0);
        assert_eq!(approach(0.0, 10.0, 2.0), 10.0);
        assert_eq!(approach(3.0, 10.0, f32::NAN), 3.0);
    }

    #[test]
    fn test_band_thirds() {
        let mut spectrum = vec![0.0; 30];
        spectrum[15] = 3.0;
        let bands = BandEnergies::from_spectrum(&spectrum);
        assert_eq!(bands.low, 0.0);
        assert!((bands.mid - 0.3).abs() < 1e-6);
        assert_eq!(bands.high, 0.0);
    }

    #[test]
    fn test_band_edge_cases() {
        assert_eq!(BandEnergies::from_spectrum(&[]), BandEnergies::default());
        let short = BandEnergies::from_spectrum(&[1.0, f32::NAN]);
        assert_eq!(short.low, 1.0);
        assert_eq!(short.high, 1.0);
    }

    #[test]
    fn test_track_and_decay() {
        let mut bands = BandEnergies::default();
        let spectrum = vec![1.0; 12];
        for _ in 0..200 {
            bands.track(&spectrum, 0.12);
        }
        assert!((bands.average() - 1.0).abs() < 1e-3);

        bands.decay(0.5);
        assert!((bands.mid - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_spring_overshoots_then_settles() {
        let mut bar = SpringBar::default();
        let mut max = 0.0f32;
        for _ in 0..240 {
            max = max.max(bar.update(1.0, 0.5, 0.65, 1.0 / 60.0));
        }
        assert!(max > 1.0, "spring should overshoot, max {}", max);
        assert!((bar.position - 1.0).abs() < 1e-3, "settled at {}", bar.position);
    }

    #[test]
    fn test_spring_never_negative() {
        let mut bar = SpringBar {
            position: 0.1,
            velocity: -5.0,
        };
        bar.update(0.0, 0.5, 0.65, 1.0 / 30.0);
        assert_eq!(bar.position, 0.0);
    }

    #[test]
    fn test_peak_hold_decays_geometrically() {
        let mut peak = PeakHold::default();
        assert_eq!(peak.update(1.0, 0.88), 1.0);

        let first = peak.update(0.0, 0.88);
        assert!((first - 0.88).abs() < 1e-6);
        let second = peak.update(0.0, 0.88);
        assert!(second < first);

        // A higher value re-triggers
        assert_eq!(peak.update(2.0, 0.88), 2.0);
        assert_eq!(peak.decay, 1.0);
    }
}
