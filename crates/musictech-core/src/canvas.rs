//! Canvas - the abstract 2D drawing contract the visualizers draw against
//!
//! Backends live in `musictech-render`; engines only ever see `&mut dyn Canvas`.
//! Coordinates are in pixels with the origin at the top-left corner and the
//! y axis pointing down. Angles are in degrees unless stated otherwise.

use crate::color::Rgba;
use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

/// How colors are combined with what is already on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Normal alpha compositing
    #[default]
    SrcOver,
    /// Replace destination
    Src,
    /// Additive
    Plus,
    /// Screen
    Screen,
    /// Multiply
    Multiply,
    /// Color dodge
    ColorDodge,
    /// Component-wise maximum
    Lighten,
}

/// Fill or outline
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PaintStyle {
    /// Fill the interior
    #[default]
    Fill,
    /// Stroke the outline
    Stroke {
        /// Line width in pixels
        width: f32,
    },
}

/// Color position along a gradient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// 0.0 - 1.0 along the gradient
    pub position: f32,
    /// Color at this position
    pub color: Rgba,
}

impl GradientStop {
    /// Construct a stop
    pub fn new(position: f32, color: Rgba) -> Self {
        Self { position, color }
    }
}

/// Gradient source replacing the paint's flat color
#[derive(Debug, Clone, PartialEq)]
pub enum Shader {
    /// Linear gradient between two points
    Linear {
        /// Start point
        start: Vec2,
        /// End point
        end: Vec2,
        /// Stops, ascending by position
        stops: Vec<GradientStop>,
    },
    /// Radial gradient around a center
    Radial {
        /// Center point
        center: Vec2,
        /// Radius at which the last stop is reached
        radius: f32,
        /// Stops, ascending by position
        stops: Vec<GradientStop>,
    },
}

impl Shader {
    /// Linear gradient with `colors` spread evenly from start to end
    pub fn linear(start: Vec2, end: Vec2, colors: &[Rgba]) -> Self {
        Shader::Linear {
            start,
            end,
            stops: even_stops(colors),
        }
    }

    /// Radial gradient with `colors` spread evenly from center to radius
    pub fn radial(center: Vec2, radius: f32, colors: &[Rgba]) -> Self {
        Shader::Radial {
            center,
            radius,
            stops: even_stops(colors),
        }
    }

    /// Stops of this gradient
    pub fn stops(&self) -> &[GradientStop] {
        match self {
            Shader::Linear { stops, .. } | Shader::Radial { stops, .. } => stops,
        }
    }
}

fn even_stops(colors: &[Rgba]) -> Vec<GradientStop> {
    match colors.len() {
        0 => Vec::new(),
        1 => vec![GradientStop::new(0.0, colors[0])],
        n => colors
            .iter()
            .enumerate()
            .map(|(i, &c)| GradientStop::new(i as f32 / (n - 1) as f32, c))
            .collect(),
    }
}

/// Drawing attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    /// Flat color, or the alpha multiplier when a shader is set
    pub color: Rgba,
    /// Fill or stroke
    pub style: PaintStyle,
    /// Optional gradient
    pub shader: Option<Shader>,
    /// Compositing mode
    pub blend_mode: BlendMode,
    /// Gaussian blur sigma in pixels; 0 for none
    pub blur: f32,
    /// Antialiased edges
    pub anti_alias: bool,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: Rgba::WHITE,
            style: PaintStyle::Fill,
            shader: None,
            blend_mode: BlendMode::SrcOver,
            blur: 0.0,
            anti_alias: true,
        }
    }
}

impl Paint {
    /// Solid fill
    pub fn fill(color: Rgba) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// Solid stroke of `width` pixels
    pub fn stroke(color: Rgba, width: f32) -> Self {
        Self {
            color,
            style: PaintStyle::Stroke {
                width: width.max(0.0),
            },
            ..Default::default()
        }
    }

    /// Builder: attach a gradient
    pub fn with_shader(mut self, shader: Shader) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Builder: set the blend mode
    pub fn with_blend(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Builder: soften edges
    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.blur = sigma.max(0.0);
        self
    }

    /// Stroke width, or 0 for fills
    pub fn stroke_width(&self) -> f32 {
        match self.style {
            PaintStyle::Fill => 0.0,
            PaintStyle::Stroke { width } => width,
        }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rect {
    /// From position and size
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// From edges
    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::from_xywh(left, top, right - left, bottom - top)
    }

    /// Square centered on `center`
    pub fn centered(center: Vec2, half_extent: f32) -> Self {
        Self::from_xywh(
            center.x - half_extent,
            center.y - half_extent,
            half_extent * 2.0,
            half_extent * 2.0,
        )
    }

    /// Right edge
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Center point
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Whether `point` lies inside (edges inclusive)
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Positive, finite size
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// One polyline of a [`Path`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    /// Vertices in drawing order
    pub points: Vec<Vec2>,
    /// Whether the last point connects back to the first
    pub closed: bool,
}

/// Polyline path made of one or more contours
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    contours: Vec<Contour>,
}

impl Path {
    /// Empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new contour at `point`
    pub fn move_to(&mut self, point: Vec2) -> &mut Self {
        self.contours.push(Contour {
            points: vec![point],
            closed: false,
        });
        self
    }

    /// Extend the current contour; starts one if there is none
    pub fn line_to(&mut self, point: Vec2) -> &mut Self {
        match self.contours.last_mut() {
            Some(contour) if !contour.closed => contour.points.push(point),
            _ => {
                self.move_to(point);
            }
        }
        self
    }

    /// Append an arc of `sweep` degrees starting at `start` degrees
    ///
    /// Connects to the current contour with a straight segment, like a
    /// canvas `arcTo` with `forceMoveTo = false`.
    pub fn arc_to(&mut self, center: Vec2, radius: f32, start: f32, sweep: f32) -> &mut Self {
        // Roughly one vertex every 5 degrees
        let segments = ((sweep.abs() / 5.0).ceil() as usize).max(1);
        for i in 0..=segments {
            let angle = (start + sweep * i as f32 / segments as f32).to_radians();
            self.line_to(center + Vec2::new(angle.cos(), angle.sin()) * radius);
        }
        self
    }

    /// Close the current contour
    pub fn close(&mut self) -> &mut Self {
        if let Some(contour) = self.contours.last_mut() {
            contour.closed = true;
        }
        self
    }

    /// Pie wedge from `center`, used for kaleidoscope segments
    pub fn wedge(center: Vec2, radius: f32, start: f32, sweep: f32) -> Self {
        let mut path = Path::new();
        path.move_to(center);
        path.arc_to(center, radius, start, sweep);
        path.close();
        path
    }

    /// Closed polygon through `points`
    pub fn polygon(points: &[Vec2]) -> Self {
        let mut path = Path::new();
        if let Some((first, rest)) = points.split_first() {
            path.move_to(*first);
            for p in rest {
                path.line_to(*p);
            }
            path.close();
        }
        path
    }

    /// Open polyline through `points`
    pub fn polyline(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut path = Path::new();
        for point in points {
            path.line_to(point);
        }
        path
    }

    /// Contours in drawing order
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// No vertices
    pub fn is_empty(&self) -> bool {
        self.contours.iter().all(|c| c.points.is_empty())
    }

    /// Total vertex count
    pub fn point_count(&self) -> usize {
        self.contours.iter().map(|c| c.points.len()).sum()
    }

    /// Bounding box of all vertices
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.contours.iter().flat_map(|c| c.points.iter());
        let first = *points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Rect::from_ltrb(min.x, min.y, max.x, max.y))
    }
}

/// Owned RGBA8 image, straight alpha, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Bytes per pixel
    pub const CHANNELS: usize = 4;

    /// Transparent image of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * Self::CHANNELS],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * Self::CHANNELS
    }

    /// Raw RGBA bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw RGBA bytes; rows are `stride()` long and disjoint
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Color at (x, y), or None out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some(Rgba::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    /// Write the color at (x, y); ignored out of bounds
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        self.data[i..i + Self::CHANNELS].copy_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    /// Reallocate if the size changed; returns true when it did
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        *self = Self::new(width, height);
        true
    }
}

/// Current transform plus the save/restore stack, shared by canvas backends
#[derive(Debug, Clone)]
pub struct TransformStack {
    current: Affine2,
    saved: Vec<Affine2>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self {
            current: Affine2::IDENTITY,
            saved: Vec::new(),
        }
    }
}

impl TransformStack {
    /// Identity with an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Active transform
    pub fn current(&self) -> Affine2 {
        self.current
    }

    /// Push the active transform
    pub fn save(&mut self) {
        self.saved.push(self.current);
    }

    /// Pop the last saved transform; unbalanced restores are ignored
    pub fn restore(&mut self) {
        if let Some(t) = self.saved.pop() {
            self.current = t;
        }
    }

    /// Post-multiply the active transform
    pub fn concat(&mut self, transform: Affine2) {
        self.current = self.current * transform;
    }

    /// Number of outstanding saves
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Map a point through the active transform
    pub fn map_point(&self, point: Vec2) -> Vec2 {
        self.current.transform_point2(point)
    }
}

/// Abstract 2D drawing surface
pub trait Canvas {
    /// Surface width in pixels
    fn width(&self) -> f32;

    /// Surface height in pixels
    fn height(&self) -> f32;

    /// Fill the whole surface, ignoring the transform
    fn clear(&mut self, color: Rgba);

    /// Push the current transform
    fn save(&mut self);

    /// Pop to the last saved transform
    fn restore(&mut self);

    /// Post-multiply the current transform
    fn concat(&mut self, transform: Affine2);

    /// Translate subsequent drawing
    fn translate(&mut self, dx: f32, dy: f32) {
        self.concat(Affine2::from_translation(Vec2::new(dx, dy)));
    }

    /// Scale subsequent drawing
    fn scale(&mut self, sx: f32, sy: f32) {
        self.concat(Affine2::from_scale(Vec2::new(sx, sy)));
    }

    /// Rotate subsequent drawing by `degrees` (clockwise on screen)
    fn rotate(&mut self, degrees: f32) {
        self.concat(Affine2::from_angle(degrees.to_radians()));
    }

    /// Rectangle
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);

    /// Rectangle with rounded corners
    fn draw_round_rect(&mut self, rect: Rect, radius: f32, paint: &Paint);

    /// Circle
    fn draw_circle(&mut self, center: Vec2, radius: f32, paint: &Paint);

    /// Single line segment
    fn draw_line(&mut self, from: Vec2, to: Vec2, paint: &Paint);

    /// Arbitrary path
    fn draw_path(&mut self, path: &Path, paint: &Paint);

    /// Image stretched into `dest`
    fn draw_image(&mut self, image: &PixelBuffer, dest: Rect, paint: &Paint);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wedge_is_closed_fan() {
        let wedge = Path::wedge(Vec2::ZERO, 10.0, 0.0, 60.0);
        assert_eq!(wedge.contours().len(), 1);
        let contour = &wedge.contours()[0];
        assert!(contour.closed);
        assert_eq!(contour.points[0], Vec2::ZERO);

        let last = *contour.points.last().unwrap();
        let expected = Vec2::new(60f32.to_radians().cos(), 60f32.to_radians().sin()) * 10.0;
        assert!((last - expected).length() < 1e-4);
    }

    #[test]
    fn test_line_to_after_close_starts_new_contour() {
        let mut path = Path::polygon(&[Vec2::ZERO, Vec2::X, Vec2::Y]);
        path.line_to(Vec2::ONE);
        assert_eq!(path.contours().len(), 2);
        assert_eq!(path.point_count(), 4);
    }

    #[test]
    fn test_path_bounds() {
        let path = Path::polyline([Vec2::new(-1.0, 2.0), Vec2::new(3.0, -4.0)]);
        let bounds = path.bounds().unwrap();
        assert_eq!(bounds, Rect::from_ltrb(-1.0, -4.0, 3.0, 2.0));
        assert!(Path::new().bounds().is_none());
    }

    #[test]
    fn test_even_gradient_stops() {
        let shader = Shader::linear(Vec2::ZERO, Vec2::X, &[Rgba::BLACK, Rgba::WHITE, Rgba::BLACK]);
        let positions: Vec<f32> = shader.stops().iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_pixel_buffer_access() {
        let mut buffer = PixelBuffer::new(4, 3);
        assert_eq!(buffer.stride(), 16);
        buffer.set_pixel(3, 2, Rgba::WHITE);
        assert_eq!(buffer.pixel(3, 2), Some(Rgba::WHITE));
        assert_eq!(buffer.pixel(4, 0), None);
        buffer.set_pixel(10, 10, Rgba::WHITE);

        assert!(!buffer.resize(4, 3));
        assert!(buffer.resize(2, 2));
        assert_eq!(buffer.data().len(), 16);
    }

    #[test]
    fn test_transform_stack_balance() {
        let mut stack = TransformStack::new();
        stack.save();
        stack.concat(Affine2::from_translation(Vec2::new(5.0, 0.0)));
        assert_eq!(stack.map_point(Vec2::ZERO), Vec2::new(5.0, 0.0));
        stack.restore();
        assert_eq!(stack.map_point(Vec2::ZERO), Vec2::ZERO);

        // Extra restore is harmless
        stack.restore();
        assert_eq!(stack.depth(), 0);
    }
}
