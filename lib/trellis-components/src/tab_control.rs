use std::any::Any;
use std::rc::Rc;

use tracing::debug;
use trellis::config::TabMetrics;
use trellis::geometry::{Point, Rect, Size};
use trellis::render::Canvas;
use trellis::text::{RunPaintCache, RunStyleKey, TextContext, TextPaint};
use trellis::ui::{
    AccessibilityRole, AccessibilityTraits, Key, KeyModifiers, MouseButton, PointerEvent,
};
use trellis::view::{ElementCore, ElementId, LayoutChildren, TextElementCore, UiControl, UiElement};

use crate::theme::Palette;

/// Which edge of the control the headers sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabStripPlacement {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

impl TabStripPlacement {
    fn is_horizontal(self) -> bool {
        matches!(self, TabStripPlacement::Top | TabStripPlacement::Bottom)
    }
}

#[derive(Debug, Clone)]
struct TabHeader {
    text: String,
    size: Size,
    rect: Rect,
}

/// Headers in a strip plus one content element per tab. Only the selected
/// tab's content is measured, rendered and hit.
pub struct TabControl {
    core: ElementCore,
    header_text: TextElementCore,
    metrics: TabMetrics,
    palette: Palette,
    headers: Vec<TabHeader>,
    contents: LayoutChildren,
    placement: TabStripPlacement,
    strip: Rect,
    selected: Option<usize>,
    hovered: Option<usize>,
    paints: RunPaintCache,
    on_selection_changed: Option<Box<dyn FnMut(usize)>>,
}

impl TabControl {
    pub fn new(context: Rc<TextContext>, metrics: TabMetrics) -> Self {
        let core = ElementCore::new();
        let header_text = TextElementCore::new(context, &core);
        Self {
            core,
            header_text,
            metrics,
            palette: Palette::default(),
            headers: Vec::new(),
            contents: LayoutChildren::new(),
            placement: TabStripPlacement::Top,
            strip: Rect::default(),
            selected: None,
            hovered: None,
            paints: RunPaintCache::default(),
            on_selection_changed: None,
        }
    }

    pub fn with_tab(mut self, header: impl Into<String>, content: impl UiElement) -> Self {
        self.add_tab(header, Box::new(content));
        self
    }

    pub fn with_placement(mut self, placement: TabStripPlacement) -> Self {
        self.set_placement(placement);
        self
    }

    /// Appends a tab and returns its index. The first tab added is selected.
    pub fn add_tab(&mut self, header: impl Into<String>, mut content: Box<dyn UiElement>) -> usize {
        let index = self.headers.len();
        content.core_mut().set_visible(self.selected.is_none());
        self.headers.push(TabHeader {
            text: header.into(),
            size: Size::ZERO,
            rect: Rect::default(),
        });
        self.contents.push(&self.core, content);
        if self.selected.is_none() {
            self.selected = Some(index);
        }
        index
    }

    /// Removes a tab and hands back its content. Selection moves to the
    /// nearest remaining tab.
    pub fn remove_tab(&mut self, index: usize) -> Option<Box<dyn UiElement>> {
        if index >= self.headers.len() {
            return None;
        }
        let id = self.contents.get(index)?.core().id();
        let content = self.contents.remove(&self.core, id)?;
        self.headers.remove(index);
        self.hovered = None;
        self.selected = match self.selected {
            _ if self.headers.is_empty() => None,
            Some(selected) if selected > index => Some(selected - 1),
            Some(selected) if selected == index => Some(index.min(self.headers.len() - 1)),
            other => other,
        };
        self.sync_visibility();
        Some(content)
    }

    pub fn tab_count(&self) -> usize {
        self.headers.len()
    }

    pub fn header(&self, index: usize) -> Option<&str> {
        self.headers.get(index).map(|header| header.text.as_str())
    }

    pub fn set_header(&mut self, index: usize, text: impl Into<String>) {
        if let Some(header) = self.headers.get_mut(index) {
            header.text = text.into();
            self.core.invalidate_measure();
        }
    }

    pub fn content(&self, index: usize) -> Option<&dyn UiElement> {
        self.contents.get(index)
    }

    pub fn placement(&self) -> TabStripPlacement {
        self.placement
    }

    pub fn set_placement(&mut self, placement: TabStripPlacement) {
        if self.placement != placement {
            self.placement = placement;
            self.core.invalidate_measure();
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn hovered_header(&self) -> Option<usize> {
        self.hovered
    }

    /// Header rectangle from the last arrange pass.
    pub fn header_rect(&self, index: usize) -> Option<Rect> {
        self.headers.get(index).map(|header| header.rect)
    }

    pub fn on_selection_changed(&mut self, callback: impl FnMut(usize) + 'static) {
        self.on_selection_changed = Some(Box::new(callback));
    }

    /// Returns whether the selection changed.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.headers.len() || self.selected == Some(index) {
            return false;
        }
        self.selected = Some(index);
        self.sync_visibility();
        debug!(index, "tab selected");
        if let Some(callback) = self.on_selection_changed.as_mut() {
            callback(index);
        }
        true
    }

    fn sync_visibility(&mut self) {
        let selected = self.selected;
        for (index, content) in self.contents.as_mut_slice().iter_mut().enumerate() {
            content.core_mut().set_visible(selected == Some(index));
        }
    }

    fn header_at(&self, point: Point) -> Option<usize> {
        if !self.strip.contains(point) {
            return None;
        }
        self.headers.iter().position(|header| header.rect.contains(point))
    }

    /// Sizes every header from its text. Returns the strip's
    /// `(length along the strip, thickness)`.
    fn measure_headers(&mut self) -> (f32, f32) {
        let padding_x = self.metrics.header_padding_x;
        let padding_y = self.metrics.header_padding_y;
        let line_height = self.header_text.line_height();
        for index in 0..self.headers.len() {
            let text = self.headers[index].text.clone();
            let width = (self.header_text.measure_str(&text) + padding_x * 2.0)
                .max(self.metrics.min_header_extent);
            self.headers[index].size = Size::new(width, line_height + padding_y * 2.0);
        }

        let count = self.headers.len();
        let gaps = self.metrics.header_spacing * count.saturating_sub(1) as f32;
        if self.placement.is_horizontal() {
            let along = self.headers.iter().map(|header| header.size.width).sum::<f32>() + gaps;
            let thickness = self
                .headers
                .iter()
                .fold(0.0_f32, |max, header| max.max(header.size.height));
            (along, thickness)
        } else {
            let column = self
                .headers
                .iter()
                .fold(0.0_f32, |max, header| max.max(header.size.width));
            for header in &mut self.headers {
                header.size.width = column;
            }
            let along = self.headers.iter().map(|header| header.size.height).sum::<f32>() + gaps;
            (along, column)
        }
    }

    fn strip_thickness(&self) -> f32 {
        if self.placement.is_horizontal() {
            self.headers
                .iter()
                .fold(0.0_f32, |max, header| max.max(header.size.height))
        } else {
            self.headers
                .iter()
                .fold(0.0_f32, |max, header| max.max(header.size.width))
        }
    }

    /// Splits `bounds` into the header strip and the content rect.
    fn split(&self, bounds: Rect) -> (Rect, Rect) {
        let thickness = self.strip_thickness();
        match self.placement {
            TabStripPlacement::Top => {
                let strip = Rect::new(bounds.x, bounds.y, bounds.width, thickness);
                let content = Rect::new(
                    bounds.x,
                    bounds.y + thickness,
                    bounds.width,
                    (bounds.height - thickness).max(0.0),
                );
                (strip, content)
            }
            TabStripPlacement::Bottom => {
                let content_height = (bounds.height - thickness).max(0.0);
                let strip = Rect::new(bounds.x, bounds.y + content_height, bounds.width, thickness);
                let content = Rect::new(bounds.x, bounds.y, bounds.width, content_height);
                (strip, content)
            }
            TabStripPlacement::Left => {
                let strip = Rect::new(bounds.x, bounds.y, thickness, bounds.height);
                let content = Rect::new(
                    bounds.x + thickness,
                    bounds.y,
                    (bounds.width - thickness).max(0.0),
                    bounds.height,
                );
                (strip, content)
            }
            TabStripPlacement::Right => {
                let content_width = (bounds.width - thickness).max(0.0);
                let strip = Rect::new(bounds.x + content_width, bounds.y, thickness, bounds.height);
                let content = Rect::new(bounds.x, bounds.y, content_width, bounds.height);
                (strip, content)
            }
        }
    }

    fn layout_headers(&mut self, strip: Rect) {
        let horizontal = self.placement.is_horizontal();
        let spacing = self.metrics.header_spacing;
        let mut cursor = 0.0_f32;
        for header in &mut self.headers {
            header.rect = if horizontal {
                Rect::new(strip.x + cursor, strip.y, header.size.width, strip.height)
            } else {
                Rect::new(strip.x, strip.y + cursor, strip.width, header.size.height)
            };
            cursor += spacing
                + if horizontal {
                    header.size.width
                } else {
                    header.size.height
                };
        }
    }

    fn header_paint(&mut self, selected: bool) -> Rc<TextPaint> {
        let base = self.header_text.style_key();
        let color = if selected {
            self.palette.accent
        } else {
            self.palette.text
        };
        let key = RunStyleKey::new(color, base.size(), base.weight, base.style, base.family);
        let context = Rc::clone(self.header_text.context());
        self.paints.get_or_acquire(&key, &context)
    }

    /// The selection indicator: a bar along the header edge facing the content.
    fn indicator(&self, rect: Rect) -> Rect {
        let thickness = self.metrics.indicator_thickness;
        match self.placement {
            TabStripPlacement::Top => {
                Rect::new(rect.x, rect.bottom() - thickness, rect.width, thickness)
            }
            TabStripPlacement::Bottom => Rect::new(rect.x, rect.y, rect.width, thickness),
            TabStripPlacement::Left => {
                Rect::new(rect.right() - thickness, rect.y, thickness, rect.height)
            }
            TabStripPlacement::Right => Rect::new(rect.x, rect.y, thickness, rect.height),
        }
    }

    fn release_paints(&mut self) {
        let context = Rc::clone(self.header_text.context());
        self.paints.release_all(&context);
    }
}

impl UiElement for TabControl {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, dont_stretch: bool) -> Size {
        let (along, thickness) = self.measure_headers();
        let horizontal = self.placement.is_horizontal();
        let remaining = if horizontal {
            Size::new(available.width, (available.height - thickness).max(0.0))
        } else {
            Size::new((available.width - thickness).max(0.0), available.height)
        };
        let mut content = Size::ZERO;
        for child in self.contents.as_mut_slice() {
            content = content.max(child.measure_with(remaining, dont_stretch));
        }
        let size = if horizontal {
            Size::new(along.max(content.width), thickness + content.height)
        } else {
            Size::new(thickness + content.width, along.max(content.height))
        };
        size.min(available)
    }

    fn arrange_internal(&mut self, bounds: Rect) -> Point {
        let position = self.core.arrange_self(bounds);
        let (strip, content) = self.split(self.core.bounds());
        self.strip = strip;
        self.layout_headers(strip);
        for child in self.contents.as_mut_slice() {
            if child.core().is_visible() {
                child.arrange(content);
            }
        }
        position
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        let normal = self.header_paint(false);
        let selected_paint = self.header_paint(true);
        let padding_x = self.metrics.header_padding_x;

        canvas.save();
        canvas.clip_rect(self.core.bounds());
        for index in 0..self.headers.len() {
            let rect = self.headers[index].rect;
            let selected = self.selected == Some(index);
            if selected {
                canvas.draw_rect(rect, self.palette.selected);
                canvas.draw_rect(self.indicator(rect), self.palette.accent);
            } else if self.hovered == Some(index) {
                canvas.draw_rect(rect, self.palette.hover);
            }
            let paint = if selected { &selected_paint } else { &normal };
            let baseline =
                rect.y + (rect.height - paint.metrics.line_height()) / 2.0 - paint.metrics.ascent;
            canvas.draw_text(
                &self.headers[index].text,
                Point::new(rect.x + padding_x, baseline),
                paint,
            );
        }
        canvas.restore();

        for child in self.contents.as_mut_slice() {
            child.render(canvas);
        }
    }

    fn children(&self) -> Option<&[Box<dyn UiElement>]> {
        Some(self.contents.as_slice())
    }

    fn children_mut(&mut self) -> Option<&mut [Box<dyn UiElement>]> {
        Some(self.contents.as_mut_slice())
    }

    /// Headers are hit as the control itself; leaving the strip clears hover.
    fn hit_test(&mut self, point: Point) -> Option<ElementId> {
        if !self.core.is_visible() {
            self.hovered = None;
            return None;
        }
        self.hovered = self.header_at(point);
        if self.hovered.is_some() {
            return Some(self.core.id());
        }
        for child in self.contents.as_mut_slice().iter_mut().rev() {
            if let Some(id) = child.hit_test(point) {
                return Some(id);
            }
        }
        let hittable = self.core.background().is_some() || self.strip.contains(point);
        (hittable && self.core.bounds().contains(point)).then(|| self.core.id())
    }

    fn is_focusable(&self) -> bool {
        !self.headers.is_empty()
    }

    fn on_pointer_pressed(&mut self, event: &PointerEvent, control: &mut UiControl<'_>) -> bool {
        if event.button != MouseButton::Left {
            return false;
        }
        let Some(index) = self.header_at(event.position) else {
            return false;
        };
        self.select(index);
        control.request_redraw();
        true
    }

    fn on_key_pressed(
        &mut self,
        key: Key,
        _modifiers: KeyModifiers,
        control: &mut UiControl<'_>,
    ) -> bool {
        let count = self.headers.len();
        if count == 0 {
            return false;
        }
        let current = self.selected.unwrap_or(0);
        let horizontal = self.placement.is_horizontal();
        let target = match key {
            Key::Right if horizontal => (current + 1) % count,
            Key::Down if !horizontal => (current + 1) % count,
            Key::Left if horizontal => (current + count - 1) % count,
            Key::Up if !horizontal => (current + count - 1) % count,
            Key::Home => 0,
            Key::End => count - 1,
            _ => return false,
        };
        if self.select(target) {
            control.request_redraw();
        }
        true
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::TabList
    }

    fn computed_accessibility_value(&self) -> Option<String> {
        self.selected
            .and_then(|index| self.header(index))
            .map(str::to_string)
    }

    fn computed_accessibility_traits(&self) -> AccessibilityTraits {
        let mut traits = AccessibilityTraits::empty();
        if self.is_focusable() {
            traits |= AccessibilityTraits::FOCUSABLE;
        }
        if !self.core.is_visible() {
            traits |= AccessibilityTraits::HIDDEN;
        }
        traits
    }

    fn dispose(&mut self) {
        self.release_paints();
        self.header_text.release();
        for child in self.contents.as_mut_slice() {
            child.dispose();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for TabControl {
    fn drop(&mut self) {
        self.release_paints();
    }
}
