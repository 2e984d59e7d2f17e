use std::any::Any;
use std::rc::Rc;

use tracing::trace;
use trellis::config::EntryMetrics;
use trellis::geometry::{Margin, Point, Rect, Size};
use trellis::render::Canvas;
use trellis::text::TextContext;
use trellis::ui::{
    AccessibilityRole, AccessibilityTraits, Binding, Key, KeyModifiers, MouseButton,
    PointerEvent, PropertyBindings,
};
use trellis::view::{ElementCore, TextElementCore, UiControl, UiElement};

use crate::theme::Palette;

const BULLET: char = '\u{2022}';

/// Single-line editable text field.
///
/// The caret is a char index into the text. Edits made through the keyboard
/// or text input fire `on_text_changed` and write back to a bound
/// [`Binding`]; programmatic [`Entry::set_text`] does neither callback.
pub struct Entry {
    core: ElementCore,
    text: TextElementCore,
    placeholder: TextElementCore,
    metrics: EntryMetrics,
    palette: Palette,
    cursor_char: usize,
    scroll_x: f32,
    max_length: Option<usize>,
    is_password: bool,
    read_only: bool,
    is_focused: bool,
    on_text_changed: Option<Box<dyn FnMut(&str)>>,
    text_binding: Option<Binding<String>>,
    bindings: PropertyBindings<Entry>,
}

impl Entry {
    pub fn new(context: Rc<TextContext>, metrics: EntryMetrics) -> Self {
        let core = ElementCore::new();
        let palette = Palette::default();
        let mut text = TextElementCore::new(Rc::clone(&context), &core);
        text.set_color(palette.text);
        let mut placeholder = TextElementCore::new(context, &core);
        placeholder.set_color(palette.secondary_text);
        Self {
            core,
            text,
            placeholder,
            metrics,
            palette,
            cursor_char: 0,
            scroll_x: 0.0,
            max_length: None,
            is_password: false,
            read_only: false,
            is_focused: false,
            on_text_changed: None,
            text_binding: None,
            bindings: PropertyBindings::new(),
        }
    }

    pub fn text(&self) -> &str {
        self.text.text()
    }

    /// Replaces the content, cut to `max_length`. The caret is kept where it
    /// was, clamped to the new length.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        let text = match self.max_length {
            Some(limit) => truncate_to_chars(&text, limit),
            None => text,
        };
        if self.text.set_text(text) {
            self.clamp_cursor();
        }
    }

    pub fn placeholder(&self) -> &str {
        self.placeholder.text()
    }

    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.placeholder.set_text(placeholder);
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub fn set_max_length(&mut self, max_length: Option<usize>) {
        self.max_length = max_length;
        if let Some(limit) = max_length {
            let cut = truncate_to_chars(self.text.text(), limit);
            if self.text.set_text(cut) {
                self.clamp_cursor();
                self.sync_bound_text();
            }
        }
    }

    pub fn is_password(&self) -> bool {
        self.is_password
    }

    pub fn set_password(&mut self, is_password: bool) {
        if self.is_password != is_password {
            self.is_password = is_password;
            self.core.invalidate_measure();
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_focused(&self) -> bool {
        self.is_focused
    }

    pub fn cursor(&self) -> usize {
        self.cursor_char
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor_char = cursor;
        self.clamp_cursor();
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.set_placeholder(placeholder);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.set_max_length(Some(max_length));
        self
    }

    pub fn with_password(mut self, is_password: bool) -> Self {
        self.set_password(is_password);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.text.set_color(palette.text);
        self.placeholder.set_color(palette.secondary_text);
        self.palette = palette;
        self
    }

    pub fn on_text_changed(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_text_changed = Some(Box::new(callback));
    }

    /// Two-way: refreshes pull from `source`, edits push into it.
    pub fn bind_text(&mut self, source: Binding<String>) {
        self.text_binding = Some(source.clone());
        self.bindings
            .bind("text", move |entry: &mut Entry| entry.set_text(source.get()));
    }

    /// The string actually drawn: bullets when masked.
    pub fn display_text(&self) -> String {
        if self.is_password {
            self.text.text().chars().map(|_| BULLET).collect()
        } else {
            self.text.text().to_string()
        }
    }

    fn content_rect(&self) -> Rect {
        self.core.bounds().deflate(Margin::symmetric(
            self.metrics.padding_x,
            self.metrics.padding_y,
        ))
    }

    fn clamp_cursor(&mut self) {
        let len = self.text.text().chars().count();
        self.cursor_char = self.cursor_char.min(len);
    }

    fn can_insert_chars(&self) -> usize {
        match self.max_length {
            Some(limit) => limit.saturating_sub(self.text.text().chars().count()),
            None => usize::MAX,
        }
    }

    fn insert_text(&mut self, text: &str) -> bool {
        let filtered: String = text.chars().filter(|ch| !ch.is_control()).collect();
        let incoming = truncate_to_chars(&filtered, self.can_insert_chars());
        if incoming.is_empty() {
            return false;
        }
        let mut content = self.text.text().to_string();
        let insert_at = byte_index_at_char(&content, self.cursor_char);
        content.insert_str(insert_at, &incoming);
        self.text.set_text(content);
        self.cursor_char += incoming.chars().count();
        self.text_edited();
        true
    }

    fn delete_backspace(&mut self) -> bool {
        if self.cursor_char == 0 {
            return false;
        }
        let mut content = self.text.text().to_string();
        let end = byte_index_at_char(&content, self.cursor_char);
        let start = byte_index_at_char(&content, self.cursor_char - 1);
        content.replace_range(start..end, "");
        self.text.set_text(content);
        self.cursor_char -= 1;
        self.text_edited();
        true
    }

    fn delete_forward(&mut self) -> bool {
        let mut content = self.text.text().to_string();
        if self.cursor_char >= content.chars().count() {
            return false;
        }
        let start = byte_index_at_char(&content, self.cursor_char);
        let end = byte_index_at_char(&content, self.cursor_char + 1);
        content.replace_range(start..end, "");
        self.text.set_text(content);
        self.text_edited();
        true
    }

    fn move_cursor_to(&mut self, cursor: usize) -> bool {
        let len = self.text.text().chars().count();
        let cursor = cursor.min(len);
        if cursor == self.cursor_char {
            return false;
        }
        self.cursor_char = cursor;
        true
    }

    fn text_edited(&mut self) {
        trace!(id = %self.core.id(), len = self.text.text().len(), "entry edited");
        self.sync_bound_text();
        if let Some(callback) = self.on_text_changed.as_mut() {
            callback(self.text.text());
        }
    }

    fn sync_bound_text(&self) {
        let Some(binding) = self.text_binding.as_ref() else {
            return;
        };
        if binding.get() != self.text.text() {
            binding.set(self.text.text().to_string());
        }
    }

    /// Width of the displayed text up to `chars` characters.
    fn prefix_width(&mut self, display: &str, chars: usize) -> f32 {
        let end = byte_index_at_char(display, chars);
        self.text.measure_str(&display[..end])
    }

    /// Char index whose caret position is closest to `x` (window coordinates).
    fn cursor_at(&mut self, x: f32) -> usize {
        let display = self.display_text();
        let target = x - self.content_rect().x + self.scroll_x;
        let count = display.chars().count();
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for index in 0..=count {
            let distance = (self.prefix_width(&display, index) - target).abs();
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }
        best
    }

    /// Scrolls horizontally just enough to keep the caret inside the content rect.
    fn scroll_to_cursor(&mut self, display: &str) -> f32 {
        let caret_x = self.prefix_width(display, self.cursor_char);
        let visible = (self.content_rect().width - self.metrics.caret_width).max(0.0);
        if caret_x - self.scroll_x > visible {
            self.scroll_x = caret_x - visible;
        } else if caret_x < self.scroll_x {
            self.scroll_x = caret_x;
        }
        let text_width = self.text.measure_str(display);
        let max_scroll = (text_width - visible).max(0.0);
        self.scroll_x = self.scroll_x.clamp(0.0, max_scroll);
        caret_x
    }
}

impl UiElement for Entry {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
        let display = self.display_text();
        let text_width = self.text.measure_str(&display);
        let placeholder = self.placeholder.text().to_string();
        let placeholder_width = self.placeholder.measure_str(&placeholder);
        let width = text_width.max(placeholder_width)
            + 2.0 * self.metrics.padding_x
            + self.metrics.caret_width;
        let height = self.text.line_height() + 2.0 * self.metrics.padding_y;
        Size::new(width, height).min(available)
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        let bounds = self.core.bounds();
        let border = if self.is_focused {
            self.palette.accent
        } else {
            self.palette.border
        };
        canvas.draw_rect(bounds, border);
        canvas.draw_rect(bounds.deflate(Margin::uniform(1.0)), self.palette.surface);

        let content = self.content_rect();
        let display = self.display_text();
        let caret_x = self.scroll_to_cursor(&display);
        let metrics = self.text.metrics();
        let line_height = metrics.line_height();
        let top = content.y + (content.height - line_height) / 2.0;
        let baseline = top - metrics.ascent;

        canvas.save();
        canvas.clip_rect(content);
        if display.is_empty() {
            if !self.placeholder.text().is_empty() {
                let paint = self.placeholder.paint();
                canvas.draw_text(self.placeholder.text(), Point::new(content.x, baseline), &paint);
            }
        } else {
            let paint = self.text.paint();
            canvas.draw_text(&display, Point::new(content.x - self.scroll_x, baseline), &paint);
        }
        if self.is_focused && !self.read_only {
            let caret = Rect::new(
                content.x + caret_x - self.scroll_x,
                top,
                self.metrics.caret_width,
                line_height,
            );
            canvas.draw_rect(caret, self.palette.text);
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
        control.set_focus(Some(self.core.id()));
        self.cursor_char = self.cursor_at(event.position.x);
        control.request_redraw();
        true
    }

    fn on_key_pressed(
        &mut self,
        key: Key,
        _modifiers: KeyModifiers,
        control: &mut UiControl<'_>,
    ) -> bool {
        let len = self.text.text().chars().count();
        let handled = match key {
            Key::Left => self.move_cursor_to(self.cursor_char.saturating_sub(1)),
            Key::Right => self.move_cursor_to(self.cursor_char + 1),
            Key::Home => self.move_cursor_to(0),
            Key::End => self.move_cursor_to(len),
            Key::Backspace if !self.read_only => self.delete_backspace(),
            Key::Delete if !self.read_only => self.delete_forward(),
            _ => false,
        };
        if handled {
            control.request_redraw();
        }
        handled
    }

    fn on_text_input(&mut self, text: &str, control: &mut UiControl<'_>) -> bool {
        if self.read_only || !self.is_focused {
            return false;
        }
        let inserted = self.insert_text(text);
        if inserted {
            control.request_redraw();
        }
        inserted
    }

    fn on_focus_changed(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::TextField
    }

    fn computed_accessibility_label(&self) -> Option<String> {
        self.core
            .accessibility_label()
            .map(str::to_string)
            .or_else(|| {
                let placeholder = self.placeholder.text();
                (!placeholder.is_empty()).then(|| placeholder.to_string())
            })
    }

    fn computed_accessibility_value(&self) -> Option<String> {
        (!self.is_password).then(|| self.text.text().to_string())
    }

    fn computed_accessibility_traits(&self) -> AccessibilityTraits {
        let mut traits = AccessibilityTraits::FOCUSABLE;
        if self.is_focused {
            traits |= AccessibilityTraits::FOCUSED;
        }
        if self.is_password {
            traits |= AccessibilityTraits::PASSWORD;
        }
        if self.read_only {
            traits |= AccessibilityTraits::READ_ONLY;
        }
        if !self.core.is_visible() {
            traits |= AccessibilityTraits::HIDDEN;
        }
        traits
    }

    fn refresh_bindings(&mut self) -> usize {
        let mut bindings = std::mem::take(&mut self.bindings);
        let applied = bindings.apply(self);
        self.bindings = bindings;
        applied
    }

    fn dispose(&mut self) {
        self.text.release();
        self.placeholder.release();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn byte_index_at_char(value: &str, char_index: usize) -> usize {
    value
        .char_indices()
        .nth(char_index)
        .map_or(value.len(), |(index, _)| index)
}

fn truncate_to_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use trellis::render::{DrawCommand, RecordingCanvas};
    use trellis::style::{HorizontalAlignment, VerticalAlignment};
    use trellis::view::{ElementBuilder, Viewport};

    use super::*;
    use crate::testing::context;

    fn entry() -> Entry {
        Entry::new(context(), EntryMetrics::default())
            .with_alignment(HorizontalAlignment::Left, VerticalAlignment::Top)
    }

    fn focused(mut entry: Entry) -> Entry {
        entry.on_focus_changed(true);
        entry
    }

    fn control() -> UiControl<'static> {
        UiControl::new(None, Rect::new(0.0, 0.0, 400.0, 300.0))
    }

    fn drawn_text(canvas: &RecordingCanvas) -> Vec<(String, Point)> {
        canvas
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, origin, .. } => Some((text.clone(), *origin)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn typing_inserts_at_the_caret_and_reports_changes() {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        let mut entry = focused(entry().with_text("ac"));
        entry.on_text_changed(move |text| sink.borrow_mut().push(text.to_string()));
        let mut control = control();

        entry.set_cursor(1);
        assert!(entry.on_text_input("b", &mut control));
        assert_eq!(entry.text(), "abc");
        assert_eq!(entry.cursor(), 2);
        assert_eq!(*changes.borrow(), ["abc"]);
        assert!(control.redraw_requested());
    }

    #[test]
    fn programmatic_text_does_not_fire_the_callback() {
        let fired = Rc::new(std::cell::Cell::new(false));
        let sink = Rc::clone(&fired);
        let mut entry = entry();
        entry.on_text_changed(move |_| sink.set(true));
        entry.set_text("hello");
        assert!(!fired.get());
    }

    #[test]
    fn max_length_limits_input() {
        let mut entry = focused(entry().with_max_length(4).with_text("abcdef"));
        assert_eq!(entry.text(), "abcd");
        entry.set_cursor(4);
        assert!(!entry.on_text_input("x", &mut control()));
        entry.on_key_pressed(Key::Backspace, KeyModifiers::default(), &mut control());
        assert!(entry.on_text_input("xyz", &mut control()));
        assert_eq!(entry.text(), "abcx");
    }

    #[test]
    fn control_characters_are_dropped() {
        let mut entry = focused(entry());
        assert!(!entry.on_text_input("\n\t", &mut control()));
        assert!(entry.on_text_input("a\u{7f}b", &mut control()));
        assert_eq!(entry.text(), "ab");
    }

    #[test]
    fn editing_keys_work_on_chars_not_bytes() {
        let mut entry = focused(entry().with_text("h\u{e9}llo"));
        let mut control = control();
        let modifiers = KeyModifiers::default();

        assert!(entry.on_key_pressed(Key::End, modifiers, &mut control));
        assert_eq!(entry.cursor(), 5);
        assert!(!entry.on_key_pressed(Key::Right, modifiers, &mut control));
        assert!(entry.on_key_pressed(Key::Home, modifiers, &mut control));
        assert!(entry.on_key_pressed(Key::Right, modifiers, &mut control));
        assert!(entry.on_key_pressed(Key::Delete, modifiers, &mut control));
        assert_eq!(entry.text(), "hllo");
        assert!(entry.on_key_pressed(Key::Backspace, modifiers, &mut control));
        assert_eq!(entry.text(), "llo");
        assert_eq!(entry.cursor(), 0);
        assert!(!entry.on_key_pressed(Key::Backspace, modifiers, &mut control));
    }

    #[test]
    fn read_only_allows_navigation_only() {
        let mut entry = focused(entry().with_text("abc").with_read_only(true));
        let modifiers = KeyModifiers::default();
        assert!(entry.on_key_pressed(Key::End, modifiers, &mut control()));
        assert!(!entry.on_key_pressed(Key::Backspace, modifiers, &mut control()));
        assert!(!entry.on_text_input("d", &mut control()));
        assert_eq!(entry.text(), "abc");
    }

    #[test]
    fn unfocused_entry_ignores_text_input() {
        let mut entry = entry();
        assert!(!entry.on_text_input("a", &mut control()));
    }

    #[test]
    fn measures_text_plus_padding_and_caret() {
        let mut entry = entry().with_text("abc").with_placeholder("search");
        let size = entry.measure(Size::new(400.0, 300.0));
        assert_eq!(size, Size::new(60.0 + 16.0 + 1.0, 10.0 + 12.0));
    }

    #[test]
    fn password_entries_draw_bullets_and_hide_their_value() {
        let mut entry = entry().with_text("pw").with_password(true);
        entry.measure(Size::new(400.0, 300.0));
        entry.arrange(Rect::new(0.0, 0.0, 400.0, 300.0));
        let mut canvas = RecordingCanvas::new();
        entry.render(&mut canvas);
        assert_eq!(drawn_text(&canvas)[0].0, "\u{2022}\u{2022}");
        assert_eq!(entry.computed_accessibility_value(), None);
        assert!(entry.computed_accessibility_traits().contains(AccessibilityTraits::PASSWORD));
    }

    #[test]
    fn empty_entries_draw_the_placeholder() {
        let mut entry = entry().with_placeholder("name");
        entry.measure(Size::new(400.0, 300.0));
        entry.arrange(Rect::new(0.0, 0.0, 400.0, 300.0));
        let mut canvas = RecordingCanvas::new();
        entry.render(&mut canvas);
        assert_eq!(drawn_text(&canvas), [(String::from("name"), Point::new(8.0, 14.0))]);
    }

    #[test]
    fn long_text_scrolls_to_keep_the_caret_visible() {
        let mut entry = focused(entry().with_text("abcdefghij").with_desired_width(57.0));
        entry.set_cursor(10);
        entry.measure(Size::new(400.0, 300.0));
        entry.arrange(Rect::new(0.0, 0.0, 400.0, 300.0));
        let mut canvas = RecordingCanvas::new();
        entry.render(&mut canvas);
        // content is 41px wide, 40px of it usable before the caret
        assert_eq!(drawn_text(&canvas)[0].1.x, 8.0 - 60.0);
        let caret = canvas.commands().iter().rev().find_map(|command| match command {
            DrawCommand::Rect { rect, .. } => Some(*rect),
            _ => None,
        });
        assert_eq!(caret.map(|rect| rect.x), Some(48.0));
    }

    #[test]
    fn pressing_focuses_and_places_the_caret() {
        let mut viewport = Viewport::new(400.0, 300.0);
        let id = viewport.push_root(entry().with_text("abcd").boxed());
        viewport.layout();

        assert!(viewport.dispatch_pointer_pressed(&PointerEvent::left(32.0, 10.0)));
        assert_eq!(viewport.focused(), Some(id));
        let Some(entry) = viewport.find(id).and_then(|node| node.as_any().downcast_ref::<Entry>())
        else {
            panic!("entry should be in the tree");
        };
        assert!(entry.is_focused());
        assert_eq!(entry.cursor(), 2);
    }

    #[test]
    fn bound_text_flows_both_ways() {
        let source = Binding::new(String::from("one"));
        let mut entry = focused(entry());
        entry.bind_text(source.clone());
        entry.refresh_bindings();
        assert_eq!(entry.text(), "one");

        entry.set_cursor(3);
        entry.on_text_input("!", &mut control());
        assert_eq!(source.get(), "one!");

        source.set(String::from("two"));
        entry.refresh_bindings();
        assert_eq!(entry.text(), "two");
    }
}
