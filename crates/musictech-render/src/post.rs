//! Full-surface overlays drawn after an engine's layers

use musictech_core::canvas::GradientStop;
use musictech_core::color::alpha_from_f32;
use musictech_core::{BlendMode, Canvas, Paint, Rect, Rgba, Shader, Vec2};

/// Spacing between scanlines in pixels
pub const SCANLINE_SPACING: f32 = 6.0;

/// Darkened radial edge. `mid` and `edge` are the colors at 70% and 100%
/// of the radius; the center stays untouched.
pub fn vignette(canvas: &mut dyn Canvas, mid: Rgba, edge: Rgba) {
    let (w, h) = (canvas.width(), canvas.height());
    let shader = Shader::Radial {
        center: Vec2::new(w * 0.5, h * 0.5),
        radius: w.min(h) * 0.8,
        stops: vec![
            GradientStop::new(0.0, Rgba::TRANSPARENT),
            GradientStop::new(0.7, mid),
            GradientStop::new(1.0, edge),
        ],
    };
    let paint = Paint::fill(Rgba::WHITE)
        .with_shader(shader)
        .with_blend(BlendMode::Multiply);
    canvas.draw_rect(Rect::from_xywh(0.0, 0.0, w, h), &paint);
}

/// Vignette colors: tinted by `hue` while playing, plain black when paused
pub fn vignette_colors(hue: f32, playing: bool) -> (Rgba, Rgba) {
    if playing {
        (
            Rgba::from_hsva(hue, 30.0, 5.0, 40),
            Rgba::from_hsva(hue + 180.0, 50.0, 8.0, 120),
        )
    } else {
        (Rgba::BLACK.with_alpha(20), Rgba::BLACK.with_alpha(80))
    }
}

/// Scrolling additive horizontal lines
pub fn scanlines(canvas: &mut dyn Canvas, time: f32, hue: f32, strength: f32) {
    let (w, h) = (canvas.width(), canvas.height());
    let alpha = strength * 60.0;
    let color = Rgba::from_hsv(hue, 40.0, 70.0);
    let mut paint = Paint::stroke(color, 1.0).with_blend(BlendMode::Plus);
    paint.anti_alias = false;

    let mut y = (time * 200.0).rem_euclid(SCANLINE_SPACING);
    while y < h {
        let line_alpha = alpha * (0.3 + (y * 0.1 + time * 3.0).sin() * 0.7);
        paint.color = color.with_alpha(alpha_from_f32(line_alpha));
        canvas.draw_line(Vec2::new(0.0, y), Vec2::new(w, y), &paint);
        y += SCANLINE_SPACING;
    }
}

/// Red border just inside and blue border just outside the surface
pub fn chromatic_aberration(canvas: &mut dyn Canvas, energy: f32) {
    let (w, h) = (canvas.width(), canvas.height());
    let intensity = energy * 0.5;
    let width = 2.0 + energy * 3.0;

    let red = Rgba::rgb(255, 0, 0).with_alpha(alpha_from_f32(intensity * 40.0));
    let red = Paint::stroke(red, width).with_blend(BlendMode::Plus);
    canvas.draw_rect(Rect::from_xywh(2.0, 2.0, w - 4.0, h - 4.0), &red);

    let blue = Rgba::rgb(0, 0, 255).with_alpha(alpha_from_f32(intensity * 35.0));
    let blue = Paint::stroke(blue, width).with_blend(BlendMode::Plus);
    canvas.draw_rect(Rect::from_xywh(-2.0, -2.0, w + 4.0, h + 4.0), &blue);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingCanvas};

    #[test]
    fn test_vignette_covers_surface() {
        let mut canvas = RecordingCanvas::new(200.0, 100.0);
        let (mid, edge) = vignette_colors(0.0, false);
        vignette(&mut canvas, mid, edge);

        match &canvas.commands()[0] {
            DrawCommand::Rect { rect, paint, .. } => {
                assert_eq!(rect.width, 200.0);
                assert_eq!(paint.blend_mode, BlendMode::Multiply);
                match paint.shader.as_ref().unwrap() {
                    Shader::Radial { radius, stops, .. } => {
                        assert_eq!(*radius, 80.0);
                        assert_eq!(stops.len(), 3);
                        assert_eq!(stops[1].position, 0.7);
                    }
                    other => panic!("expected radial shader, got {:?}", other),
                }
            }
            other => panic!("expected rect, got {:?}", other),
        }
    }

    #[test]
    fn test_scanline_count() {
        let mut canvas = RecordingCanvas::new(100.0, 60.0);
        scanlines(&mut canvas, 0.0, 90.0, 0.5);
        assert_eq!(canvas.count("line"), 10);
    }

    #[test]
    fn test_aberration_draws_two_borders() {
        let mut canvas = RecordingCanvas::new(100.0, 60.0);
        chromatic_aberration(&mut canvas, 0.8);
        assert_eq!(canvas.count("rect"), 2);
        let widths: Vec<f32> = canvas
            .commands()
            .iter()
            .filter_map(|c| c.paint().map(|p| p.stroke_width()))
            .collect();
        assert!(widths.iter().all(|&w| (w - 4.4).abs() < 1e-5));
    }
}
