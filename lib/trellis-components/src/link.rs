use std::any::Any;
use std::rc::Rc;

use tracing::debug;
use trellis::geometry::{Point, Size};
use trellis::render::Canvas;
use trellis::style::{Color, TextWrapping};
use trellis::text::TextContext;
use trellis::ui::{
    AccessibilityRole, AccessibilityTraits, Key, KeyModifiers, MouseButton, PointerEvent,
};
use trellis::view::{ElementCore, UiControl, UiElement};

use crate::label::Label;
use crate::theme::Palette;

/// Underlined text that runs a command when activated.
pub struct Link {
    label: Label,
    url: Option<String>,
    command: Option<Rc<dyn Fn(Option<&str>)>>,
    underline_color: Color,
}

impl Link {
    pub fn new(context: Rc<TextContext>, text: impl Into<String>) -> Self {
        let accent = Palette::default().accent;
        Self {
            label: Label::new(context, text).with_color(accent),
            url: None,
            command: None,
            underline_color: accent,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Receives the url, if any.
    pub fn with_command(mut self, command: impl Fn(Option<&str>) + 'static) -> Self {
        self.command = Some(Rc::new(command));
        self
    }

    pub fn with_wrapping(mut self, wrapping: TextWrapping) -> Self {
        self.label.set_wrapping(wrapping);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.label.text_core_mut().set_color(color);
        self.underline_color = color;
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn label_mut(&mut self) -> &mut Label {
        &mut self.label
    }

    /// Returns whether a command ran.
    pub fn activate(&self) -> bool {
        let Some(command) = &self.command else {
            return false;
        };
        debug!(url = self.url.as_deref(), "link activated");
        command(self.url.as_deref());
        true
    }
}

impl UiElement for Link {
    fn core(&self) -> &ElementCore {
        self.label.core()
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        self.label.core_mut()
    }

    fn measure_internal(&mut self, available: Size, dont_stretch: bool) -> Size {
        self.label.measure_internal(available, dont_stretch)
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        self.label.render_internal(canvas);
        let descent = self.label.text_core_mut().metrics().descent;
        let thickness = (descent / 4.0).max(1.0);
        let bounds = self.label.core().bounds();
        let widths: Vec<f32> = self.label.lines().iter().map(|line| line.width).collect();
        canvas.save();
        canvas.clip_rect(bounds);
        for (index, width) in widths.into_iter().enumerate() {
            let origin = self.label.line_origin(index);
            let y = origin.y + thickness;
            canvas.draw_line(
                Point::new(origin.x, y),
                Point::new(origin.x + width, y),
                thickness,
                self.underline_color,
            );
        }
        canvas.restore();
    }

    fn is_focusable(&self) -> bool {
        true
    }

    fn on_pointer_pressed(&mut self, event: &PointerEvent, control: &mut UiControl<'_>) -> bool {
        if event.button != MouseButton::Left {
            return false;
        }
        let activated = self.activate();
        if activated {
            control.request_redraw();
        }
        activated
    }

    fn on_key_pressed(
        &mut self,
        key: Key,
        _modifiers: KeyModifiers,
        _control: &mut UiControl<'_>,
    ) -> bool {
        key.is_activation() && self.activate()
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::Link
    }

    fn computed_accessibility_label(&self) -> Option<String> {
        self.label.computed_accessibility_label()
    }

    fn computed_accessibility_value(&self) -> Option<String> {
        self.url.clone()
    }

    fn computed_accessibility_traits(&self) -> AccessibilityTraits {
        let mut traits = AccessibilityTraits::LINK | AccessibilityTraits::FOCUSABLE;
        if !self.core().is_visible() {
            traits |= AccessibilityTraits::HIDDEN;
        }
        traits
    }

    fn refresh_bindings(&mut self) -> usize {
        self.label.refresh_bindings()
    }

    fn dispose(&mut self) {
        self.label.dispose();
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
    use std::cell::RefCell;

    use trellis::geometry::Rect;
    use trellis::render::{DrawCommand, RecordingCanvas};

    use super::*;
    use crate::testing::context;

    #[test]
    fn press_runs_the_command_with_the_url() {
        let opened = Rc::new(RefCell::new(None));
        let sink = opened.clone();
        let mut link = Link::new(context(), "docs")
            .with_url("https://example.org/docs")
            .with_command(move |url| *sink.borrow_mut() = url.map(str::to_string));
        let mut control = UiControl::new(None, Rect::new(0.0, 0.0, 100.0, 100.0));

        assert!(!link.on_pointer_pressed(&PointerEvent::right(1.0, 1.0), &mut control));
        assert!(link.on_pointer_pressed(&PointerEvent::left(1.0, 1.0), &mut control));
        assert_eq!(opened.borrow().as_deref(), Some("https://example.org/docs"));
        assert!(control.redraw_requested());
    }

    #[test]
    fn enter_activates_and_other_keys_do_not() {
        let count = Rc::new(std::cell::Cell::new(0));
        let counter = count.clone();
        let mut link = Link::new(context(), "go").with_command(move |_| counter.set(counter.get() + 1));
        let mut control = UiControl::new(None, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(link.on_key_pressed(Key::Enter, KeyModifiers::default(), &mut control));
        assert!(!link.on_key_pressed(Key::Left, KeyModifiers::default(), &mut control));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn every_line_is_underlined() {
        let mut link = Link::new(context(), "aaaa bb").with_wrapping(TextWrapping::WordWrap);
        link.measure(Size::new(40.0, 100.0));
        link.arrange(Rect::new(0.0, 0.0, 40.0, 100.0));
        let mut canvas = RecordingCanvas::new();
        link.render(&mut canvas);
        let lines: Vec<_> = canvas
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Line { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            lines,
            [
                (Point::new(0.0, 9.0), Point::new(40.0, 9.0)),
                (Point::new(0.0, 19.0), Point::new(20.0, 19.0)),
            ]
        );
    }

    #[test]
    fn reports_link_semantics() {
        let link = Link::new(context(), "home").with_url("/");
        assert_eq!(link.accessibility_role(), AccessibilityRole::Link);
        assert!(link.computed_accessibility_traits().contains(AccessibilityTraits::LINK));
        assert_eq!(link.computed_accessibility_value().as_deref(), Some("/"));
    }
}
