use musictech_core::{MagnitudeSpectrum, VisualizerConfig};
use musictech_render::{EngineKind, PixmapCanvas, VisualizerRegistry};
use std::sync::Arc;

#[test]
fn test_every_engine_paints_the_pixmap() {
    let mut registry = VisualizerRegistry::new(&VisualizerConfig::default()).unwrap();
    registry.set_playing(true);
    let bins: Vec<f32> = (0..256).map(|i| 0.02 / (1.0 + i as f32 * 0.05)).collect();
    registry.set_magnitudes(Arc::new(MagnitudeSpectrum::new(bins, 1)));

    for &kind in EngineKind::all() {
        registry.select(kind);
        let mut canvas = PixmapCanvas::new(160, 120).unwrap();
        for _ in 0..4 {
            registry.render(&mut canvas, 160.0, 120.0);
        }

        let pixels = canvas.to_pixel_buffer();
        let lit = pixels
            .data()
            .chunks(4)
            .any(|p| p[0] > 0 || p[1] > 0 || p[2] > 0);
        assert!(lit, "{kind} left the surface black");
    }
}
