//! CPU raster canvas backed by tiny-skia
//!
//! Colors arrive straight-alpha and are premultiplied on the way into the
//! pixmap. `Paint::blur` has no tiny-skia counterpart and is ignored.

use crate::{RenderError, Result};
use musictech_core::canvas::TransformStack;
use musictech_core::{
    Affine2, BlendMode, Canvas, Paint, PaintStyle, Path, PixelBuffer, Rect, Rgba, Shader, Vec2,
};
use tiny_skia as sk;
use tracing::{debug, warn};

/// Canvas rasterizing into an owned `tiny_skia::Pixmap`
pub struct PixmapCanvas {
    pixmap: sk::Pixmap,
    transforms: TransformStack,
    image_scratch: Option<sk::Pixmap>,
}

impl PixmapCanvas {
    /// Allocate a transparent surface
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = allocate(width, height)?;
        debug!("PixmapCanvas created: {}x{}", width, height);
        Ok(Self {
            pixmap,
            transforms: TransformStack::new(),
            image_scratch: None,
        })
    }

    /// Reallocate for a new size; contents are discarded
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.pixmap.width() == width && self.pixmap.height() == height {
            return Ok(());
        }
        self.pixmap = allocate(width, height)?;
        debug!("PixmapCanvas resized: {}x{}", width, height);
        Ok(())
    }

    /// Underlying pixmap (premultiplied RGBA)
    pub fn pixmap(&self) -> &sk::Pixmap {
        &self.pixmap
    }

    /// Straight-alpha color at a pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            Rgba::new(c.red(), c.green(), c.blue(), c.alpha())
        })
    }

    /// Copy the surface out as a straight-alpha buffer
    pub fn to_pixel_buffer(&self) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(self.pixmap.width(), self.pixmap.height());
        for (dst, src) in buffer
            .data_mut()
            .chunks_exact_mut(PixelBuffer::CHANNELS)
            .zip(self.pixmap.pixels())
        {
            let c = src.demultiply();
            dst.copy_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        buffer
    }

    fn transform(&self) -> sk::Transform {
        to_sk_transform(self.transforms.current())
    }

    fn fill_or_stroke(&mut self, path: &sk::Path, paint: &Paint) {
        let Some(sk_paint) = to_sk_paint(paint) else {
            return;
        };
        let transform = self.transform();
        match paint.style {
            PaintStyle::Fill => {
                self.pixmap
                    .fill_path(path, &sk_paint, sk::FillRule::Winding, transform, None);
            }
            PaintStyle::Stroke { width } => {
                let stroke = sk::Stroke {
                    width: width.max(0.0),
                    line_cap: sk::LineCap::Round,
                    ..Default::default()
                };
                self.pixmap
                    .stroke_path(path, &sk_paint, &stroke, transform, None);
            }
        }
    }

    fn scratch_for(&mut self, width: u32, height: u32) -> Option<&mut sk::Pixmap> {
        let reuse = self
            .image_scratch
            .as_ref()
            .is_some_and(|p| p.width() == width && p.height() == height);
        if !reuse {
            self.image_scratch = sk::Pixmap::new(width, height);
        }
        self.image_scratch.as_mut()
    }
}

impl Canvas for PixmapCanvas {
    fn width(&self) -> f32 {
        self.pixmap.width() as f32
    }

    fn height(&self) -> f32 {
        self.pixmap.height() as f32
    }

    fn clear(&mut self, color: Rgba) {
        self.pixmap.fill(to_sk_color(color));
    }

    fn save(&mut self) {
        self.transforms.save();
    }

    fn restore(&mut self) {
        self.transforms.restore();
    }

    fn concat(&mut self, transform: Affine2) {
        self.transforms.concat(transform);
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        let Some(r) = to_sk_rect(rect) else {
            return;
        };
        let path = sk::PathBuilder::from_rect(r);
        self.fill_or_stroke(&path, paint);
    }

    fn draw_round_rect(&mut self, rect: Rect, radius: f32, paint: &Paint) {
        if let Some(path) = round_rect_path(rect, radius) {
            self.fill_or_stroke(&path, paint);
        }
    }

    fn draw_circle(&mut self, center: Vec2, radius: f32, paint: &Paint) {
        if !(radius.is_finite() && radius > 0.0) {
            return;
        }
        if let Some(path) = sk::PathBuilder::from_circle(center.x, center.y, radius) {
            self.fill_or_stroke(&path, paint);
        }
    }

    fn draw_line(&mut self, from: Vec2, to: Vec2, paint: &Paint) {
        let mut pb = sk::PathBuilder::new();
        pb.move_to(from.x, from.y);
        pb.line_to(to.x, to.y);
        let Some(path) = pb.finish() else {
            return;
        };
        // Lines only make sense stroked
        let mut stroked = paint.clone();
        if stroked.style == PaintStyle::Fill {
            stroked.style = PaintStyle::Stroke { width: 1.0 };
        }
        self.fill_or_stroke(&path, &stroked);
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        if let Some(path) = to_sk_path(path) {
            self.fill_or_stroke(&path, paint);
        }
    }

    fn draw_image(&mut self, image: &PixelBuffer, dest: Rect, paint: &Paint) {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 || !dest.is_drawable() {
            return;
        }

        let transform = self.transforms.current()
            * Affine2::from_translation(Vec2::new(dest.x, dest.y))
            * Affine2::from_scale(Vec2::new(dest.width / w as f32, dest.height / h as f32));
        let transform = to_sk_transform(transform);
        let pixmap_paint = sk::PixmapPaint {
            opacity: paint.color.a as f32 / 255.0,
            blend_mode: to_sk_blend(paint.blend_mode),
            quality: sk::FilterQuality::Bilinear,
        };

        let Some(scratch) = self.scratch_for(w, h) else {
            warn!("Image scratch allocation failed for {}x{}", w, h);
            return;
        };
        for (dst, src) in scratch
            .pixels_mut()
            .iter_mut()
            .zip(image.data().chunks_exact(PixelBuffer::CHANNELS))
        {
            *dst = sk::ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
        }

        // Borrow split: take the scratch out while drawing into the main pixmap
        if let Some(scratch) = self.image_scratch.take() {
            self.pixmap
                .draw_pixmap(0, 0, scratch.as_ref(), &pixmap_paint, transform, None);
            self.image_scratch = Some(scratch);
        }
    }
}

fn allocate(width: u32, height: u32) -> Result<sk::Pixmap> {
    sk::Pixmap::new(width, height).ok_or_else(|| {
        warn!("Pixmap allocation failed for {}x{}", width, height);
        RenderError::SurfaceAllocation { width, height }
    })
}

fn to_sk_color(color: Rgba) -> sk::Color {
    sk::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

fn to_sk_transform(t: Affine2) -> sk::Transform {
    let m = t.matrix2;
    sk::Transform::from_row(
        m.x_axis.x,
        m.x_axis.y,
        m.y_axis.x,
        m.y_axis.y,
        t.translation.x,
        t.translation.y,
    )
}

fn to_sk_rect(rect: Rect) -> Option<sk::Rect> {
    if !rect.is_drawable() {
        return None;
    }
    sk::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
}

fn to_sk_blend(mode: BlendMode) -> sk::BlendMode {
    match mode {
        BlendMode::SrcOver => sk::BlendMode::SourceOver,
        BlendMode::Src => sk::BlendMode::Source,
        BlendMode::Plus => sk::BlendMode::Plus,
        BlendMode::Screen => sk::BlendMode::Screen,
        BlendMode::Multiply => sk::BlendMode::Multiply,
        BlendMode::ColorDodge => sk::BlendMode::ColorDodge,
        BlendMode::Lighten => sk::BlendMode::Lighten,
    }
}

/// Gradient stops take the paint alpha as a multiplier
fn to_sk_shader(shader: &Shader, alpha: u8) -> Option<sk::Shader<'static>> {
    let stops: Vec<sk::GradientStop> = shader
        .stops()
        .iter()
        .map(|s| sk::GradientStop::new(s.position, to_sk_color(s.color.fade(alpha as f32 / 255.0))))
        .collect();
    if stops.is_empty() {
        return None;
    }

    match shader {
        Shader::Linear { start, end, .. } => sk::LinearGradient::new(
            sk::Point::from_xy(start.x, start.y),
            sk::Point::from_xy(end.x, end.y),
            stops,
            sk::SpreadMode::Pad,
            sk::Transform::identity(),
        ),
        Shader::Radial { center, radius, .. } => {
            if !(radius.is_finite() && *radius > 0.0) {
                return None;
            }
            let c = sk::Point::from_xy(center.x, center.y);
            sk::RadialGradient::new(
                c,
                c,
                *radius,
                stops,
                sk::SpreadMode::Pad,
                sk::Transform::identity(),
            )
        }
    }
}

fn to_sk_paint(paint: &Paint) -> Option<sk::Paint<'static>> {
    let mut sk_paint = sk::Paint {
        anti_alias: paint.anti_alias,
        blend_mode: to_sk_blend(paint.blend_mode),
        ..Default::default()
    };

    match paint.shader.as_ref().and_then(|s| to_sk_shader(s, paint.color.a)) {
        Some(shader) => sk_paint.shader = shader,
        None => {
            if paint.color.a == 0 {
                return None;
            }
            sk_paint.set_color(to_sk_color(paint.color));
        }
    }
    Some(sk_paint)
}

fn to_sk_path(path: &Path) -> Option<sk::Path> {
    let mut pb = sk::PathBuilder::new();
    for contour in path.contours() {
        let mut points = contour.points.iter().filter(|p| p.is_finite());
        let Some(first) = points.next() else {
            continue;
        };
        pb.move_to(first.x, first.y);
        for p in points {
            pb.line_to(p.x, p.y);
        }
        if contour.closed {
            pb.close();
        }
    }
    pb.finish()
}

fn round_rect_path(rect: Rect, radius: f32) -> Option<sk::Path> {
    if !rect.is_drawable() {
        return None;
    }
    let r = radius.clamp(0.0, rect.width.min(rect.height) * 0.5);
    if r <= 0.0 {
        return to_sk_rect(rect).map(sk::PathBuilder::from_rect);
    }

    let (l, t, rt, b) = (rect.x, rect.y, rect.right(), rect.bottom());
    let mut pb = sk::PathBuilder::new();
    pb.move_to(l + r, t);
    pb.line_to(rt - r, t);
    pb.quad_to(rt, t, rt, t + r);
    pb.line_to(rt, b - r);
    pb.quad_to(rt, b, rt - r, b);
    pb.line_to(l + r, b);
    pb.quad_to(l, b, l, b - r);
    pb.line_to(l, t + r);
    pb.quad_to(l, t, l + r, t);
    pb.close();
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_surface_is_an_error() {
        assert!(matches!(
            PixmapCanvas::new(0, 10),
            Err(RenderError::SurfaceAllocation { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_clear_and_fill_rect() {
        let mut canvas = PixmapCanvas::new(16, 16).unwrap();
        canvas.clear(Rgba::BLACK);
        assert_eq!(canvas.pixel(0, 0), Some(Rgba::BLACK));

        let paint = Paint::fill(Rgba::rgb(255, 0, 0));
        canvas.draw_rect(Rect::from_xywh(4.0, 4.0, 8.0, 8.0), &paint);
        assert_eq!(canvas.pixel(8, 8), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(canvas.pixel(1, 1), Some(Rgba::BLACK));
    }

    #[test]
    fn test_transform_is_applied() {
        let mut canvas = PixmapCanvas::new(32, 32).unwrap();
        canvas.clear(Rgba::BLACK);
        canvas.save();
        canvas.translate(20.0, 20.0);
        canvas.draw_circle(Vec2::ZERO, 4.0, &Paint::fill(Rgba::WHITE));
        canvas.restore();

        assert_eq!(canvas.pixel(20, 20), Some(Rgba::WHITE));
        assert_eq!(canvas.pixel(4, 4), Some(Rgba::BLACK));
    }

    #[test]
    fn test_image_is_stretched_into_dest() {
        let mut canvas = PixmapCanvas::new(20, 20).unwrap();
        canvas.clear(Rgba::BLACK);

        let mut image = PixelBuffer::new(2, 2);
        for y in 0..2 {
            for x in 0..2 {
                image.set_pixel(x, y, Rgba::rgb(0, 255, 0));
            }
        }
        canvas.draw_image(&image, Rect::from_xywh(0.0, 0.0, 20.0, 20.0), &Paint::default());

        let center = canvas.pixel(10, 10).unwrap();
        assert_eq!(center.g, 255);
        assert_eq!(center.r, 0);
    }

    #[test]
    fn test_pixel_buffer_copy_matches_surface() {
        let mut canvas = PixmapCanvas::new(4, 3).unwrap();
        canvas.clear(Rgba::rgb(10, 20, 30));
        let buffer = canvas.to_pixel_buffer();
        assert_eq!(buffer.width(), 4);
        assert_eq!(buffer.pixel(3, 2), Some(Rgba::rgb(10, 20, 30)));
    }

    #[test]
    fn test_transparent_paint_draws_nothing() {
        let mut canvas = PixmapCanvas::new(8, 8).unwrap();
        canvas.clear(Rgba::BLACK);
        canvas.draw_rect(
            Rect::from_xywh(0.0, 0.0, 8.0, 8.0),
            &Paint::fill(Rgba::TRANSPARENT),
        );
        assert_eq!(canvas.pixel(4, 4), Some(Rgba::BLACK));
    }
}
