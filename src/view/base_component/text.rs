use std::any::Any;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::geometry::{Point, Size};
use crate::render::Canvas;
use crate::style::{Color, FontStyle, FontWeight, HorizontalTextAlignment};
use crate::text::{Font, FontMetrics, RunStyleKey, TextContext, TextPaint};
use crate::ui::{AccessibilityRole, Binding, PropertyBindings};

use super::{ElementCore, InvalidationHandle, UiElement};

/// Single-style text state: content, font, color and the one paint they map
/// to. Size-affecting setters invalidate the owning element.
pub struct TextElementCore {
    context: Rc<TextContext>,
    invalidation: InvalidationHandle,
    text: String,
    font_family: SmolStr,
    font_size: f32,
    font_weight: FontWeight,
    font_style: FontStyle,
    color: Color,
    paint: Option<(RunStyleKey, Rc<TextPaint>)>,
}

impl TextElementCore {
    pub fn new(context: Rc<TextContext>, owner: &ElementCore) -> Self {
        let defaults = context.defaults().clone();
        Self {
            context,
            invalidation: owner.invalidation().clone(),
            text: String::new(),
            font_family: defaults.font_family,
            font_size: defaults.font_size,
            font_weight: FontWeight::NORMAL,
            font_style: FontStyle::Normal,
            color: defaults.color,
            paint: None,
        }
    }

    pub fn context(&self) -> &Rc<TextContext> {
        &self.context
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns whether the text changed.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.text == text {
            return false;
        }
        self.text = text;
        self.invalidation.invalidate();
        true
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn set_font_size(&mut self, size: f32) {
        let size = crate::geometry::non_negative(size);
        if self.font_size != size {
            self.font_size = size;
            self.invalidation.invalidate();
        }
    }

    pub fn font_weight(&self) -> FontWeight {
        self.font_weight
    }

    pub fn set_font_weight(&mut self, weight: FontWeight) {
        if self.font_weight != weight {
            self.font_weight = weight;
            self.invalidation.invalidate();
        }
    }

    pub fn font_style(&self) -> FontStyle {
        self.font_style
    }

    pub fn set_font_style(&mut self, style: FontStyle) {
        if self.font_style != style {
            self.font_style = style;
            self.invalidation.invalidate();
        }
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn set_font_family(&mut self, family: impl Into<SmolStr>) {
        let family = family.into();
        if self.font_family != family {
            self.font_family = family;
            self.invalidation.invalidate();
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Color does not affect size; the paint is swapped on next use.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn style_key(&self) -> RunStyleKey {
        RunStyleKey::new(
            self.color,
            self.font_size,
            self.font_weight,
            self.font_style,
            self.font_family.clone(),
        )
    }

    /// The paint for the current style, reacquired when the style changed.
    pub fn paint(&mut self) -> Rc<TextPaint> {
        let key = self.style_key();
        if let Some((current, paint)) = &self.paint {
            if *current == key {
                return Rc::clone(paint);
            }
        }
        self.release();
        let paint = self.context.acquire_paint(&key);
        self.paint = Some((key, Rc::clone(&paint)));
        paint
    }

    pub fn font(&mut self) -> Font {
        self.paint().font.clone()
    }

    pub fn metrics(&mut self) -> FontMetrics {
        self.paint().metrics
    }

    pub fn line_height(&mut self) -> f32 {
        self.metrics().line_height()
    }

    pub fn measure_str(&mut self, text: &str) -> f32 {
        let paint = self.paint();
        self.context.measurer().measure_width(text, &paint.font)
    }

    /// Returns the held paint to the pool.
    pub fn release(&mut self) {
        if let Some((key, _)) = self.paint.take() {
            self.context.paints().release(&key);
        }
    }
}

impl Drop for TextElementCore {
    fn drop(&mut self) {
        self.release();
    }
}

/// Plain single-line text.
pub struct TextBlock {
    core: ElementCore,
    text: TextElementCore,
    alignment: HorizontalTextAlignment,
    bindings: PropertyBindings<TextBlock>,
}

impl TextBlock {
    pub fn new(context: Rc<TextContext>, text: impl Into<String>) -> Self {
        let core = ElementCore::new();
        let mut text_core = TextElementCore::new(context, &core);
        text_core.set_text(text);
        Self {
            core,
            text: text_core,
            alignment: HorizontalTextAlignment::Left,
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

    pub fn set_text_alignment(&mut self, alignment: HorizontalTextAlignment) {
        self.alignment = alignment;
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
            .bind("text", move |block: &mut TextBlock| block.set_text(source.get()));
    }

    pub fn bind_color(&mut self, source: Binding<Color>) {
        self.bindings.bind("color", move |block: &mut TextBlock| {
            block.text.set_color(source.get())
        });
    }
}

impl UiElement for TextBlock {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
        let width = self.text.measure_str(&self.text.text().to_owned());
        let height = self.text.line_height();
        Size::new(width, height).min(available)
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        if self.text.text().is_empty() {
            return;
        }
        let paint = self.text.paint();
        let bounds = self.core.bounds();
        let width = self
            .text
            .context()
            .measurer()
            .measure_width(self.text.text(), &paint.font);
        let x = match self.alignment {
            HorizontalTextAlignment::Left => bounds.x,
            HorizontalTextAlignment::Center => bounds.x + (bounds.width - width) / 2.0,
            HorizontalTextAlignment::Right => bounds.right() - width,
        };
        canvas.save();
        canvas.clip_rect(bounds);
        canvas.draw_text(
            self.text.text(),
            Point::new(x, bounds.y - paint.metrics.ascent),
            &paint,
        );
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
    use super::*;
    use crate::config::TextDefaults;
    use crate::render::{DrawCommand, RecordingCanvas};
    use crate::view::base_component::{ElementBuilder, UiLayoutElement, StackPanel};

    fn context() -> Rc<TextContext> {
        TextContext::estimated(TextDefaults::default())
    }

    #[test]
    fn measure_is_cached_until_text_changes() {
        let mut block = TextBlock::new(context(), "hello").with_alignment(
            crate::style::HorizontalAlignment::Left,
            crate::style::VerticalAlignment::Top,
        );
        let available = Size::new(500.0, 100.0);
        let first = block.measure(available);
        let second = block.measure(available);
        assert_eq!(first, second);
        assert_eq!(block.core().measure_pass_count(), 1);

        block.set_text("hello world");
        let third = block.measure(available);
        assert!(third.width > first.width);
        assert_eq!(block.core().measure_pass_count(), 2);
    }

    #[test]
    fn nested_text_change_remeasures_the_root() {
        let ctx = context();
        let mut inner = StackPanel::vertical();
        inner.add_child(Box::new(TextBlock::new(ctx.clone(), "a")));
        let mut root = StackPanel::vertical();
        root.add_child(Box::new(inner));

        let available = Size::new(300.0, 300.0);
        root.measure(available);
        root.measure(available);
        assert_eq!(root.core().measure_pass_count(), 1);

        let leaf = root.children_mut().and_then(|c| c[0].children_mut()).and_then(|c| {
            c[0].as_any_mut().downcast_mut::<TextBlock>()
        });
        let Some(leaf) = leaf else {
            panic!("leaf text block missing");
        };
        leaf.set_text("abc");
        assert!(root.core().is_measure_dirty());
        root.measure(available);
        assert_eq!(root.core().measure_pass_count(), 2);
    }

    #[test]
    fn color_changes_swap_the_shared_paint() {
        let ctx = context();
        let mut block = TextBlock::new(ctx.clone(), "x");
        let black = block.text_core_mut().paint();
        assert_eq!(ctx.paints().live_entries(), 1);
        block.text_core_mut().set_color(Color::WHITE);
        let white = block.text_core_mut().paint();
        assert!(!Rc::ptr_eq(&black, &white));
        assert_eq!(ctx.paints().live_entries(), 1);
        drop(block);
        assert_eq!(ctx.paints().live_entries(), 0);
    }

    #[test]
    fn renders_at_the_baseline_inside_a_clip() {
        let mut block = TextBlock::new(context(), "hi").with_alignment(
            crate::style::HorizontalAlignment::Left,
            crate::style::VerticalAlignment::Top,
        );
        block.measure(Size::new(100.0, 100.0));
        block.arrange(crate::geometry::Rect::new(0.0, 0.0, 100.0, 100.0));
        let mut canvas = RecordingCanvas::new();
        block.render(&mut canvas);
        assert!(matches!(canvas.commands()[0], DrawCommand::Save));
        let Some(DrawCommand::Text { origin, .. }) = canvas.commands().get(2) else {
            panic!("expected text command");
        };
        // default 14px estimate: ascent is -0.8em
        assert!((origin.y - 11.2).abs() < 1e-4);
        assert_eq!(canvas.save_depth(), 0);
    }

    #[test]
    fn bound_text_refresh_is_idempotent() {
        let source = Binding::new("one".to_string());
        let mut block = TextBlock::new(context(), "");
        block.bind_text(source.clone());
        block.refresh_bindings();
        assert_eq!(block.text(), "one");
        block.measure(Size::new(100.0, 100.0));
        block.refresh_bindings();
        assert!(!block.core().is_measure_dirty());
        source.set("two".to_string());
        block.refresh_bindings();
        assert_eq!(block.text(), "two");
        assert!(block.core().is_measure_dirty());
    }
}
