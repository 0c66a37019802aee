//! Recording canvas: keeps every draw call as a command list
//!
//! Used by tests and by hosts that want to inspect or replay a frame.

use musictech_core::canvas::TransformStack;
use musictech_core::{Affine2, Canvas, Paint, Path, PixelBuffer, Rect, Rgba, Vec2};

/// One recorded draw call with the transform active at the time
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Whole-surface clear
    Clear(Rgba),
    /// Rectangle
    Rect {
        /// Rectangle in local coordinates
        rect: Rect,
        /// Paint
        paint: Paint,
        /// Active transform
        transform: Affine2,
    },
    /// Rounded rectangle
    RoundRect {
        /// Rectangle in local coordinates
        rect: Rect,
        /// Corner radius
        radius: f32,
        /// Paint
        paint: Paint,
        /// Active transform
        transform: Affine2,
    },
    /// Circle
    Circle {
        /// Center in local coordinates
        center: Vec2,
        /// Radius
        radius: f32,
        /// Paint
        paint: Paint,
        /// Active transform
        transform: Affine2,
    },
    /// Line segment
    Line {
        /// Start point
        from: Vec2,
        /// End point
        to: Vec2,
        /// Paint
        paint: Paint,
        /// Active transform
        transform: Affine2,
    },
    /// Path
    Path {
        /// Path in local coordinates
        path: Path,
        /// Paint
        paint: Paint,
        /// Active transform
        transform: Affine2,
    },
    /// Stretched image
    Image {
        /// Source width
        width: u32,
        /// Source height
        height: u32,
        /// Destination rectangle
        dest: Rect,
        /// Paint
        paint: Paint,
        /// Active transform
        transform: Affine2,
    },
}

impl DrawCommand {
    /// Paint used by this command, if any
    pub fn paint(&self) -> Option<&Paint> {
        match self {
            DrawCommand::Clear(_) => None,
            DrawCommand::Rect { paint, .. }
            | DrawCommand::RoundRect { paint, .. }
            | DrawCommand::Circle { paint, .. }
            | DrawCommand::Line { paint, .. }
            | DrawCommand::Path { paint, .. }
            | DrawCommand::Image { paint, .. } => Some(paint),
        }
    }

    /// Transform active when the command was recorded
    pub fn transform(&self) -> Affine2 {
        match self {
            DrawCommand::Clear(_) => Affine2::IDENTITY,
            DrawCommand::Rect { transform, .. }
            | DrawCommand::RoundRect { transform, .. }
            | DrawCommand::Circle { transform, .. }
            | DrawCommand::Line { transform, .. }
            | DrawCommand::Path { transform, .. }
            | DrawCommand::Image { transform, .. } => *transform,
        }
    }

    /// Short name of the command kind
    pub fn kind(&self) -> &'static str {
        match self {
            DrawCommand::Clear(_) => "clear",
            DrawCommand::Rect { .. } => "rect",
            DrawCommand::RoundRect { .. } => "round_rect",
            DrawCommand::Circle { .. } => "circle",
            DrawCommand::Line { .. } => "line",
            DrawCommand::Path { .. } => "path",
            DrawCommand::Image { .. } => "image",
        }
    }
}

/// Canvas that records instead of rasterizing
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: f32,
    height: f32,
    transforms: TransformStack,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    /// Empty recording of the given size
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            transforms: TransformStack::new(),
            commands: Vec::new(),
        }
    }

    /// Recorded commands in order
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the canvas empty
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of commands of the given kind
    pub fn count(&self, kind: &str) -> usize {
        self.commands.iter().filter(|c| c.kind() == kind).count()
    }

    /// Outstanding `save` calls
    pub fn save_depth(&self) -> usize {
        self.transforms.depth()
    }

    fn current(&self) -> Affine2 {
        self.transforms.current()
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn clear(&mut self, color: Rgba) {
        self.commands.push(DrawCommand::Clear(color));
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
        let transform = self.current();
        self.commands.push(DrawCommand::Rect {
            rect,
            paint: paint.clone(),
            transform,
        });
    }

    fn draw_round_rect(&mut self, rect: Rect, radius: f32, paint: &Paint) {
        let transform = self.current();
        self.commands.push(DrawCommand::RoundRect {
            rect,
            radius,
            paint: paint.clone(),
            transform,
        });
    }

    fn draw_circle(&mut self, center: Vec2, radius: f32, paint: &Paint) {
        let transform = self.current();
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            paint: paint.clone(),
            transform,
        });
    }

    fn draw_line(&mut self, from: Vec2, to: Vec2, paint: &Paint) {
        let transform = self.current();
        self.commands.push(DrawCommand::Line {
            from,
            to,
            paint: paint.clone(),
            transform,
        });
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        let transform = self.current();
        self.commands.push(DrawCommand::Path {
            path: path.clone(),
            paint: paint.clone(),
            transform,
        });
    }

    fn draw_image(&mut self, image: &PixelBuffer, dest: Rect, paint: &Paint) {
        let transform = self.current();
        self.commands.push(DrawCommand::Image {
            width: image.width(),
            height: image.height(),
            dest,
            paint: paint.clone(),
            transform,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order_with_transform() {
        let mut canvas = RecordingCanvas::new(100.0, 50.0);
        canvas.clear(Rgba::BLACK);
        canvas.save();
        canvas.translate(10.0, 5.0);
        canvas.draw_circle(Vec2::ZERO, 3.0, &Paint::fill(Rgba::WHITE));
        canvas.restore();
        canvas.draw_line(Vec2::ZERO, Vec2::ONE, &Paint::stroke(Rgba::WHITE, 1.0));

        let kinds: Vec<&str> = canvas.commands().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["clear", "circle", "line"]);

        let moved = canvas.commands()[1].transform();
        assert_eq!(moved.transform_point2(Vec2::ZERO), Vec2::new(10.0, 5.0));
        assert_eq!(canvas.commands()[2].transform(), Affine2::IDENTITY);
        assert_eq!(canvas.save_depth(), 0);
    }

    #[test]
    fn test_take_commands_empties() {
        let mut canvas = RecordingCanvas::new(10.0, 10.0);
        canvas.draw_rect(Rect::from_xywh(0.0, 0.0, 1.0, 1.0), &Paint::default());
        assert_eq!(canvas.take_commands().len(), 1);
        assert!(canvas.commands().is_empty());
    }
}
