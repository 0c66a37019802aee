//! Visualizer engine implementations

pub mod fractal_layers;
pub mod kaleidoscope;
pub mod mandelbrot;
pub mod spectrum_bars;

pub use fractal_layers::{BackgroundMode, FractalLayersEngine};
pub use kaleidoscope::KaleidoscopeEngine;
pub use mandelbrot::{
    escape_time, smooth_iterations, EscapeTimeParams, FractalCamera, MandelbrotEnergies,
    MandelbrotEngine,
};
pub use spectrum_bars::SpectrumBarsEngine;

/// Upper bound on displayed bands for the bar and radial layouts
pub const MAX_BANDS: usize = 64;

/// Group `bins` into at most `max_bands` bands, each the loudest bin of
/// its group. Non-finite bins read as silence.
pub(crate) fn group_bands(bins: &[f32], max_bands: usize, out: &mut Vec<f32>) {
    out.clear();
    if bins.is_empty() || max_bands == 0 {
        return;
    }

    let bands = bins.len().min(max_bands);
    let per_band = bins.len() / bands;
    out.extend((0..bands).map(|band| {
        let start = band * per_band;
        let end = if band + 1 == bands {
            bins.len()
        } else {
            start + per_band
        };
        bins[start..end]
            .iter()
            .copied()
            .filter(|m| m.is_finite())
            .fold(0.0, f32::max)
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_bands_keeps_short_spectra() {
        let mut out = Vec::new();
        group_bands(&[0.1, 0.2, 0.3], MAX_BANDS, &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_group_bands_takes_group_maximum() {
        let bins: Vec<f32> = (0..256).map(|i| i as f32).collect();
        let mut out = Vec::new();
        group_bands(&bins, 64, &mut out);
        assert_eq!(out.len(), 64);
        assert_eq!(out[0], 3.0);
        assert_eq!(out[63], 255.0);
    }

    #[test]
    fn test_group_bands_ignores_non_finite() {
        let mut out = Vec::new();
        group_bands(&[f32::NAN, f32::INFINITY], 1, &mut out);
        assert_eq!(out, vec![0.0]);
        group_bands(&[], 8, &mut out);
        assert!(out.is_empty());
    }
}
