use std::any::Any;
use std::rc::Rc;

use trellis::geometry::{Point, Size};
use trellis::render::Canvas;
use trellis::style::{Color, FontWeight, HorizontalTextAlignment, LineBreakMode, TextWrapping};
use trellis::text::{Font, TextContext, TextMeasurer, clean_run_text, fit_text};
use trellis::ui::{AccessibilityRole, Binding, PropertyBindings};
use trellis::view::{ElementCore, TextElementCore, UiElement};

const ELLIPSIS: &str = "\u{2026}";

#[derive(Debug, Clone, PartialEq)]
pub struct LabelLine {
    pub text: String,
    pub width: f32,
}

/// Single-style text that wraps, limits its line count and optionally
/// truncates with an ellipsis.
pub struct Label {
    core: ElementCore,
    text: TextElementCore,
    wrapping: TextWrapping,
    max_lines: Option<usize>,
    line_break_mode: LineBreakMode,
    alignment: HorizontalTextAlignment,
    lines: Vec<LabelLine>,
    bindings: PropertyBindings<Label>,
}

impl Label {
    pub fn new(context: Rc<TextContext>, text: impl Into<String>) -> Self {
        let core = ElementCore::new();
        let mut text_core = TextElementCore::new(context, &core);
        text_core.set_text(text);
        Self {
            core,
            text: text_core,
            wrapping: TextWrapping::NoWrap,
            max_lines: None,
            line_break_mode: LineBreakMode::Clip,
            alignment: HorizontalTextAlignment::Left,
            lines: Vec::new(),
            bindings: PropertyBindings::new(),
        }
    }

    pub fn text(&self) -> &str {
        self.text.text()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text.set_text(text);
    }

    pub fn text_core(&self) -> &TextElementCore {
        &self.text
    }

    pub fn text_core_mut(&mut self) -> &mut TextElementCore {
        &mut self.text
    }

    pub fn wrapping(&self) -> TextWrapping {
        self.wrapping
    }

    pub fn set_wrapping(&mut self, wrapping: TextWrapping) {
        if self.wrapping != wrapping {
            self.wrapping = wrapping;
            self.core.invalidate_measure();
        }
    }

    pub fn max_lines(&self) -> Option<usize> {
        self.max_lines
    }

    /// `Some(0)` means unlimited.
    pub fn set_max_lines(&mut self, max_lines: Option<usize>) {
        let max_lines = max_lines.filter(|lines| *lines > 0);
        if self.max_lines != max_lines {
            self.max_lines = max_lines;
            self.core.invalidate_measure();
        }
    }

    pub fn line_break_mode(&self) -> LineBreakMode {
        self.line_break_mode
    }

    pub fn set_line_break_mode(&mut self, mode: LineBreakMode) {
        if self.line_break_mode != mode {
            self.line_break_mode = mode;
            self.core.invalidate_measure();
        }
    }

    pub fn set_text_alignment(&mut self, alignment: HorizontalTextAlignment) {
        self.alignment = alignment;
    }

    pub fn with_wrapping(mut self, wrapping: TextWrapping) -> Self {
        self.set_wrapping(wrapping);
        self
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.set_max_lines(Some(max_lines));
        self
    }

    pub fn with_line_break_mode(mut self, mode: LineBreakMode) -> Self {
        self.set_line_break_mode(mode);
        self
    }

    pub fn with_text_alignment(mut self, alignment: HorizontalTextAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.text.set_font_size(size);
        self
    }

    pub fn with_font_weight(mut self, weight: FontWeight) -> Self {
        self.text.set_font_weight(weight);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.text.set_color(color);
        self
    }

    pub fn bind_text(&mut self, source: Binding<String>) {
        self.bindings
            .bind("text", move |label: &mut Label| label.set_text(source.get()));
    }

    pub fn bind_color(&mut self, source: Binding<Color>) {
        self.bindings.bind("color", move |label: &mut Label| {
            label.text.set_color(source.get())
        });
    }

    /// Lines from the last measure pass.
    pub fn lines(&self) -> &[LabelLine] {
        &self.lines
    }

    /// Left end of line `index` on its baseline.
    pub fn line_origin(&mut self, index: usize) -> Point {
        let metrics = self.text.metrics();
        let bounds = self.core.bounds();
        let width = self.lines.get(index).map_or(0.0, |line| line.width);
        let x = match self.alignment {
            HorizontalTextAlignment::Left => bounds.x,
            HorizontalTextAlignment::Center => bounds.x + (bounds.width - width) / 2.0,
            HorizontalTextAlignment::Right => bounds.right() - width,
        };
        let y = bounds.y + index as f32 * metrics.line_height() - metrics.ascent;
        Point::new(x, y)
    }

    fn break_lines(&mut self, max_width: f32) -> Vec<LabelLine> {
        let font = self.text.font();
        let context = self.text.context().clone();
        let measurer = context.measurer();
        let cleaned = clean_run_text(self.text.text());

        let mut lines = Vec::new();
        let mut rest = cleaned.as_str();
        let mut truncated = false;
        while !rest.is_empty() {
            if self.max_lines.is_some_and(|limit| lines.len() == limit) {
                truncated = true;
                break;
            }
            let fit = fit_text(rest, max_width, &font, self.wrapping, measurer);
            let consumed = if fit.is_empty() {
                // nothing fits: one character per line
                rest.chars().next().map_or(rest.len(), char::len_utf8)
            } else {
                fit.consumed
            };
            let text = if fit.is_empty() { &rest[..consumed] } else { fit.text };
            lines.push(LabelLine {
                text: text.to_string(),
                width: measurer.measure_width(text, &font),
            });
            rest = &rest[consumed.min(rest.len())..];
        }

        if self.line_break_mode == LineBreakMode::TailTruncation {
            if let Some(last) = lines.last_mut() {
                if truncated || last.width > max_width {
                    *last = ellipsize(&last.text, max_width, &font, measurer);
                }
            }
        }
        lines
    }
}

/// Shortens `text` so that it plus an ellipsis fits `max_width`.
fn ellipsize(text: &str, max_width: f32, font: &Font, measurer: &dyn TextMeasurer) -> LabelLine {
    let budget = max_width - measurer.measure_width(ELLIPSIS, font);
    let head = if budget > 0.0 {
        fit_text(text, budget, font, TextWrapping::Wrap, measurer).text
    } else {
        ""
    };
    let text = format!("{}{ELLIPSIS}", head.trim_end());
    let width = measurer.measure_width(&text, font);
    LabelLine { text, width }
}

impl UiElement for Label {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
        self.lines = self.break_lines(available.width);
        let line_height = self.text.line_height();
        let width = self.lines.iter().fold(0.0_f32, |max, line| max.max(line.width));
        let height = line_height * self.lines.len().max(1) as f32;
        Size::new(width, height).min(available)
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        if self.lines.is_empty() {
            return;
        }
        let paint = self.text.paint();
        canvas.save();
        canvas.clip_rect(self.core.bounds());
        for index in 0..self.lines.len() {
            let origin = self.line_origin(index);
            canvas.draw_text(&self.lines[index].text, origin, &paint);
        }
        canvas.restore();
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::Text
    }

    fn computed_accessibility_label(&self) -> Option<String> {
        self.core
            .accessibility_label()
            .map(str::to_string)
            .or_else(|| Some(self.text.text().to_string()))
    }

    fn refresh_bindings(&mut self) -> usize {
        let mut bindings = std::mem::take(&mut self.bindings);
        let applied = bindings.apply(self);
        self.bindings = bindings;
        applied
    }

    fn dispose(&mut self) {
        self.text.release();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use trellis::geometry::Rect;
    use trellis::render::{DrawCommand, RecordingCanvas};
    use trellis::style::{HorizontalAlignment, VerticalAlignment};
    use trellis::view::ElementBuilder;

    use super::*;
    use crate::testing::context;

    fn texts(label: &Label) -> Vec<&str> {
        label.lines().iter().map(|line| line.text.as_str()).collect()
    }

    fn top_left(label: Label) -> Label {
        label.with_alignment(HorizontalAlignment::Left, VerticalAlignment::Top)
    }

    #[test]
    fn word_wrap_breaks_at_spaces() {
        let mut label = top_left(Label::new(context(), "aaa bbb ccc").with_wrapping(TextWrapping::WordWrap));
        let size = label.measure(Size::new(70.0, 100.0));
        assert_eq!(texts(&label), ["aaa bbb", "ccc"]);
        assert_eq!(size, Size::new(70.0, 20.0));
    }

    #[test]
    fn max_lines_with_tail_truncation_adds_an_ellipsis() {
        let mut label = top_left(
            Label::new(context(), "aaa bbb ccc ddd eee")
                .with_wrapping(TextWrapping::WordWrap)
                .with_max_lines(2)
                .with_line_break_mode(LineBreakMode::TailTruncation),
        );
        label.measure(Size::new(70.0, 100.0));
        assert_eq!(texts(&label), ["aaa bbb", "ccc dd\u{2026}"]);
    }

    #[test]
    fn max_lines_with_clip_just_stops() {
        let mut label = top_left(
            Label::new(context(), "aaa bbb ccc ddd")
                .with_wrapping(TextWrapping::WordWrap)
                .with_max_lines(1),
        );
        let size = label.measure(Size::new(70.0, 100.0));
        assert_eq!(texts(&label), ["aaa bbb"]);
        assert_eq!(size.height, 10.0);
    }

    #[test]
    fn no_wrap_overflow_is_ellipsized() {
        let mut label = top_left(
            Label::new(context(), "abcdefghij").with_line_break_mode(LineBreakMode::TailTruncation),
        );
        label.measure(Size::new(50.0, 20.0));
        assert_eq!(texts(&label), ["abcd\u{2026}"]);
        assert_eq!(label.lines()[0].width, 50.0);
    }

    #[test]
    fn zero_max_lines_means_unlimited() {
        let mut label = Label::new(context(), "x");
        label.set_max_lines(Some(0));
        assert_eq!(label.max_lines(), None);
    }

    #[test]
    fn lines_align_independently() {
        let mut label = Label::new(context(), "aaaa bb")
            .with_wrapping(TextWrapping::WordWrap)
            .with_text_alignment(HorizontalTextAlignment::Right);
        label.measure(Size::new(40.0, 100.0));
        label.arrange(Rect::new(0.0, 0.0, 40.0, 100.0));
        let mut canvas = RecordingCanvas::new();
        label.render(&mut canvas);
        let origins: Vec<_> = canvas
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, origin, .. } => Some((text.as_str(), *origin)),
                _ => None,
            })
            .collect();
        assert_eq!(
            origins,
            [("aaaa", Point::new(0.0, 8.0)), ("bb", Point::new(20.0, 18.0))]
        );
    }

    #[test]
    fn bound_text_remeasures() {
        let source = Binding::new(String::from("one"));
        let mut label = top_left(Label::new(context(), ""));
        label.bind_text(source.clone());
        label.refresh_bindings();
        assert_eq!(label.measure(Size::new(200.0, 50.0)).width, 30.0);
        source.set(String::from("three"));
        label.refresh_bindings();
        assert_eq!(label.measure(Size::new(200.0, 50.0)).width, 50.0);
    }
}
