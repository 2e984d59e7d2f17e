use std::rc::Rc;

use crate::geometry::{Point, Rect};
use crate::style::Color;
use crate::text::TextPaint;

/// The drawing capability a platform backend provides.
///
/// Calls arrive in strict paint order; implementations must not reorder them.
pub trait Canvas {
    fn save(&mut self);
    fn restore(&mut self);
    fn clip_rect(&mut self, rect: Rect);
    fn draw_rect(&mut self, rect: Rect, color: Color);
    fn draw_round_rect(&mut self, rect: Rect, radius: f32, color: Color);
    /// `origin.y` is the baseline.
    fn draw_text(&mut self, text: &str, origin: Point, paint: &Rc<TextPaint>);
    fn draw_line(&mut self, from: Point, to: Point, thickness: f32, color: Color);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    ClipRect(Rect),
    Rect {
        rect: Rect,
        color: Color,
    },
    RoundRect {
        rect: Rect,
        radius: f32,
        color: Color,
    },
    Text {
        text: String,
        origin: Point,
        paint: Rc<TextPaint>,
    },
    Line {
        from: Point,
        to: Point,
        thickness: f32,
        color: Color,
    },
}

/// Records every call. Used by headless hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
    depth: usize,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn save_depth(&self) -> usize {
        self.depth
    }

    /// Text runs in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.depth += 1;
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.commands.push(DrawCommand::Restore);
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::ClipRect(rect));
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::Rect { rect, color });
    }

    fn draw_round_rect(&mut self, rect: Rect, radius: f32, color: Color) {
        self.commands
            .push(DrawCommand::RoundRect { rect, radius, color });
    }

    fn draw_text(&mut self, text: &str, origin: Point, paint: &Rc<TextPaint>) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            origin,
            paint: Rc::clone(paint),
        });
    }

    fn draw_line(&mut self, from: Point, to: Point, thickness: f32, color: Color) {
        self.commands.push(DrawCommand::Line {
            from,
            to,
            thickness,
            color,
        });
    }
}
