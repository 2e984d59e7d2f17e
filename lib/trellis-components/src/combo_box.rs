use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, warn};
use trellis::config::DropdownMetrics;
use trellis::geometry::{Margin, Point, Rect, Size};
use trellis::render::Canvas;
use trellis::text::{RunPaintCache, RunStyleKey, TextContext, TextPaint};
use trellis::ui::{
    AccessibilityRole, AccessibilityTraits, Binding, Key, KeyModifiers, MouseButton,
    PointerEvent, PropertyBindings,
};
use trellis::view::overlay::placement::{self, DropdownPlacement};
use trellis::view::overlay::{OverlayControl, OverlayElement, OverlayId};
use trellis::view::{ElementCore, TextElementCore, UiControl, UiElement};

use crate::theme::Palette;

const CHEVRON_DOWN: &str = "\u{25be}";
const CHEVRON_UP: &str = "\u{25b4}";

type SelectionCallback = Box<dyn FnMut(Option<usize>)>;

/// Selection state shared between a combo box and its open dropdown.
#[derive(Default)]
struct ComboState {
    selected: Cell<Option<usize>>,
    open: Cell<bool>,
    on_selection_changed: RefCell<Option<SelectionCallback>>,
    binding: RefCell<Option<Binding<Option<usize>>>>,
}

impl ComboState {
    /// Returns whether the selection changed.
    fn select(&self, index: Option<usize>) -> bool {
        if self.selected.get() == index {
            return false;
        }
        self.selected.set(index);
        if let Some(binding) = self.binding.borrow().as_ref() {
            if binding.get() != index {
                binding.set(index);
            }
        }
        // the callback may call back into the combo box
        let callback = self.on_selection_changed.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback(index);
            let mut slot = self.on_selection_changed.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
        debug!(?index, "combo box selection changed");
        true
    }
}

/// A closed field showing the selected item, with a dropdown list of items
/// opened above the tree.
pub struct ComboBox {
    core: ElementCore,
    text: TextElementCore,
    placeholder: TextElementCore,
    metrics: DropdownMetrics,
    palette: Palette,
    items: Vec<String>,
    state: Rc<ComboState>,
    overlay: Option<OverlayId>,
    is_focused: bool,
    bindings: PropertyBindings<ComboBox>,
}

impl ComboBox {
    pub fn new(context: Rc<TextContext>, metrics: DropdownMetrics) -> Self {
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
            items: Vec::new(),
            state: Rc::new(ComboState::default()),
            overlay: None,
            is_focused: false,
            bindings: PropertyBindings::new(),
        }
    }

    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_items(items.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.items.push(item.into());
        self.core.invalidate_measure();
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder.set_text(placeholder);
        self
    }

    pub fn with_selected_index(self, index: Option<usize>) -> Self {
        self.set_selected_index(index);
        self
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Replaces the items. A selection past the new end is cleared.
    pub fn set_items(&mut self, items: Vec<String>) {
        self.items = items;
        self.core.invalidate_measure();
        if self.state.selected.get().is_some_and(|index| index >= self.items.len()) {
            self.state.select(None);
        }
    }

    pub fn placeholder(&self) -> &str {
        self.placeholder.text()
    }

    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.placeholder.set_text(placeholder);
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.state.selected.get()
    }

    pub fn selected_item(&self) -> Option<&str> {
        self.selected_index()
            .and_then(|index| self.items.get(index))
            .map(String::as_str)
    }

    /// Out-of-range indices clear the selection. Fires `on_selection_changed`
    /// when the selection actually changes.
    pub fn set_selected_index(&self, index: Option<usize>) {
        let index = index.filter(|index| *index < self.items.len());
        self.state.select(index);
    }

    pub fn on_selection_changed(&mut self, callback: impl FnMut(Option<usize>) + 'static) {
        *self.state.on_selection_changed.borrow_mut() = Some(Box::new(callback));
    }

    /// Two-way: refreshes pull from `source`, user selections push into it.
    pub fn bind_selected_index(&mut self, source: Binding<Option<usize>>) {
        *self.state.binding.borrow_mut() = Some(source.clone());
        self.bindings.bind("selected_index", move |combo: &mut ComboBox| {
            combo.set_selected_index(source.get())
        });
    }

    pub fn is_open(&self) -> bool {
        self.state.open.get()
    }

    pub fn overlay_id(&self) -> Option<OverlayId> {
        self.overlay.filter(|_| self.is_open())
    }

    /// Registers the dropdown under this box. Returns `false` when already
    /// open, when there are no items, or when no overlay host is available.
    pub fn open(&mut self, control: &mut UiControl<'_>) -> bool {
        if self.is_open() || self.items.is_empty() {
            return false;
        }
        let Some(host) = control.overlays() else {
            warn!(items = self.items.len(), "no overlay host; dropdown not opened");
            return false;
        };
        let dropdown = DropdownOverlay::new(
            self.text.context().clone(),
            self.metrics.clone(),
            self.palette,
            self.items.clone(),
            self.core.bounds(),
            self.text.style_key(),
            Rc::clone(&self.state),
        );
        self.state.open.set(true);
        self.overlay = Some(host.register_overlay(Box::new(dropdown)));
        control.request_redraw();
        true
    }

    pub fn close(&mut self, control: &mut UiControl<'_>) {
        if let (Some(id), true) = (self.overlay.take(), self.is_open()) {
            if let Some(host) = control.overlays() {
                host.unregister_overlay(id);
            }
        }
        self.state.open.set(false);
        control.request_redraw();
    }

    fn widest_text(&mut self) -> f32 {
        let mut width = 0.0_f32;
        for index in 0..self.items.len() {
            let item = self.items[index].clone();
            width = width.max(self.text.measure_str(&item));
        }
        let placeholder = self.placeholder.text().to_string();
        width.max(self.placeholder.measure_str(&placeholder))
    }
}

impl UiElement for ComboBox {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
        let width = self.widest_text()
            + self.metrics.horizontal_padding * 2.0
            + self.metrics.arrow_column;
        Size::new(width, self.metrics.item_height).min(available)
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        let bounds = self.core.bounds();
        let border = if self.is_focused || self.is_open() {
            self.palette.accent
        } else {
            self.palette.border
        };
        canvas.draw_rect(bounds, border);
        canvas.draw_rect(bounds.deflate(Margin::uniform(1.0)), self.palette.surface);

        let text_rect = Rect::new(
            bounds.x + self.metrics.horizontal_padding,
            bounds.y,
            (bounds.width - self.metrics.horizontal_padding * 2.0 - self.metrics.arrow_column)
                .max(0.0),
            bounds.height,
        );
        let (shown, paint) = match self.selected_item().map(str::to_string) {
            Some(item) => (item, self.text.paint()),
            None => (self.placeholder.text().to_string(), self.placeholder.paint()),
        };
        let baseline =
            bounds.y + (bounds.height - paint.metrics.line_height()) / 2.0 - paint.metrics.ascent;
        if !shown.is_empty() {
            canvas.save();
            canvas.clip_rect(text_rect);
            canvas.draw_text(&shown, Point::new(text_rect.x, baseline), &paint);
            canvas.restore();
        }

        let chevron = if self.is_open() { CHEVRON_UP } else { CHEVRON_DOWN };
        let arrow_paint = self.placeholder.paint();
        let chevron_width = self.placeholder.measure_str(chevron);
        let arrow_x = bounds.right() - self.metrics.arrow_column
            + (self.metrics.arrow_column - chevron_width) / 2.0;
        canvas.draw_text(chevron, Point::new(arrow_x, baseline), &arrow_paint);
    }

    fn is_focusable(&self) -> bool {
        true
    }

    fn on_pointer_pressed(&mut self, event: &PointerEvent, control: &mut UiControl<'_>) -> bool {
        if event.button != MouseButton::Left {
            return false;
        }
        control.set_focus(Some(self.core.id()));
        if self.is_open() {
            self.close(control);
        } else {
            self.open(control);
        }
        true
    }

    fn on_key_pressed(
        &mut self,
        key: Key,
        _modifiers: KeyModifiers,
        control: &mut UiControl<'_>,
    ) -> bool {
        match key {
            Key::Enter | Key::Space | Key::Down => self.open(control),
            Key::Escape if self.is_open() => {
                self.close(control);
                true
            }
            _ => false,
        }
    }

    fn on_focus_changed(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::ComboBox
    }

    fn computed_accessibility_label(&self) -> Option<String> {
        self.core.accessibility_label().map(str::to_string).or_else(|| {
            let placeholder = self.placeholder.text();
            (!placeholder.is_empty()).then(|| placeholder.to_string())
        })
    }

    fn computed_accessibility_value(&self) -> Option<String> {
        self.selected_item().map(str::to_string)
    }

    fn computed_accessibility_traits(&self) -> AccessibilityTraits {
        let mut traits = AccessibilityTraits::FOCUSABLE | AccessibilityTraits::HAS_POPUP;
        if self.is_focused {
            traits |= AccessibilityTraits::FOCUSED;
        }
        if self.is_open() {
            traits |= AccessibilityTraits::EXPANDED;
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

/// The open item list of a [`ComboBox`].
pub struct DropdownOverlay {
    context: Rc<TextContext>,
    metrics: DropdownMetrics,
    palette: Palette,
    items: Vec<String>,
    anchor: Rect,
    style: RunStyleKey,
    state: Rc<ComboState>,
    placement: DropdownPlacement,
    highlighted: Option<usize>,
    hovered: Option<usize>,
    scroll_start: usize,
    paints: RunPaintCache,
}

impl DropdownOverlay {
    fn new(
        context: Rc<TextContext>,
        metrics: DropdownMetrics,
        palette: Palette,
        items: Vec<String>,
        anchor: Rect,
        style: RunStyleKey,
        state: Rc<ComboState>,
    ) -> Self {
        let highlighted = state
            .selected
            .get()
            .filter(|index| *index < items.len())
            .or_else(|| (!items.is_empty()).then_some(0));
        Self {
            context,
            metrics,
            palette,
            items,
            anchor,
            style,
            state,
            placement: DropdownPlacement {
                rect: Rect::new(anchor.x, anchor.bottom(), anchor.width, 0.0),
                opens_upward: false,
            },
            highlighted,
            hovered: None,
            scroll_start: 0,
            paints: RunPaintCache::default(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.placement.rect
    }

    pub fn opens_upward(&self) -> bool {
        self.placement.opens_upward
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn scroll_start(&self) -> usize {
        self.scroll_start
    }

    /// Whole rows that fit in the list.
    pub fn visible_rows(&self) -> usize {
        if self.metrics.item_height <= 0.0 {
            return self.items.len();
        }
        ((self.placement.rect.height / self.metrics.item_height).floor() as usize).max(1)
    }

    pub fn row_at(&self, point: Point) -> Option<usize> {
        let rect = self.placement.rect;
        if !rect.contains(point) || self.metrics.item_height <= 0.0 {
            return None;
        }
        let row = ((point.y - rect.y) / self.metrics.item_height) as usize;
        let index = self.scroll_start + row;
        (index < self.items.len()).then_some(index)
    }

    fn highlight(&mut self, index: usize) {
        let Some(last) = self.items.len().checked_sub(1) else {
            return;
        };
        self.highlighted = Some(index.min(last));
        self.scroll_start = placement::clamp_scroll_start(
            self.scroll_start,
            self.highlighted,
            self.visible_rows(),
            self.items.len(),
        );
    }

    fn text_paint(&mut self, color_selected: bool) -> Rc<TextPaint> {
        let color = if color_selected {
            self.palette.accent
        } else {
            self.palette.text
        };
        let key = RunStyleKey::new(
            color,
            self.style.size(),
            self.style.weight,
            self.style.style,
            self.style.family.clone(),
        );
        self.paints.get_or_acquire(&key, &self.context)
    }

    fn release_paints(&mut self) {
        let context = Rc::clone(&self.context);
        self.paints.release_all(&context);
    }
}

impl OverlayElement for DropdownOverlay {
    fn bounds(&self) -> Rect {
        self.placement.rect
    }

    fn layout(&mut self, window: Rect) {
        self.placement = placement::place_dropdown(
            self.anchor,
            self.items.len(),
            self.metrics.item_height,
            self.metrics.max_height,
            window,
            self.metrics.window_margin,
        );
        self.scroll_start = placement::clamp_scroll_start(
            self.scroll_start,
            self.highlighted,
            self.visible_rows(),
            self.items.len(),
        );
    }

    fn render(&mut self, canvas: &mut dyn Canvas) {
        let rect = self.placement.rect;
        canvas.draw_rect(rect, self.palette.border);
        canvas.draw_rect(rect.deflate(Margin::uniform(1.0)), self.palette.surface);

        let normal = self.text_paint(false);
        let selected_paint = self.text_paint(true);
        let selected = self.state.selected.get();
        let item_height = self.metrics.item_height;
        let padding = self.metrics.horizontal_padding;

        canvas.save();
        canvas.clip_rect(rect);
        let mut y = rect.y;
        for index in self.scroll_start..self.items.len() {
            if y >= rect.bottom() {
                break;
            }
            let row = Rect::new(rect.x, y, rect.width, item_height);
            y = row.bottom();
            if self.hovered == Some(index) || self.highlighted == Some(index) {
                canvas.draw_rect(row, self.palette.hover);
            } else if selected == Some(index) {
                canvas.draw_rect(row, self.palette.selected);
            }
            let paint = if selected == Some(index) {
                &selected_paint
            } else {
                &normal
            };
            let baseline =
                row.y + (row.height - paint.metrics.line_height()) / 2.0 - paint.metrics.ascent;
            canvas.draw_text(&self.items[index], Point::new(row.x + padding, baseline), paint);
        }
        canvas.restore();
    }

    fn pointer_moved(&mut self, point: Point, _control: &mut OverlayControl) -> bool {
        let row = self.row_at(point);
        let changed = self.hovered != row;
        self.hovered = row;
        changed
    }

    fn pointer_exited(&mut self, _control: &mut OverlayControl) {
        self.hovered = None;
    }

    fn pointer_pressed(&mut self, event: &PointerEvent, control: &mut OverlayControl) -> bool {
        if event.button != MouseButton::Left {
            return true;
        }
        if let Some(index) = self.row_at(event.position) {
            self.state.select(Some(index));
            control.dismiss();
        }
        true
    }

    fn key_pressed(&mut self, key: Key, control: &mut OverlayControl) -> bool {
        let current = self.highlighted.unwrap_or(0);
        let page = self.visible_rows();
        match key {
            Key::Up => self.highlight(current.saturating_sub(1)),
            Key::Down => {
                let next = if self.highlighted.is_some() { current + 1 } else { 0 };
                self.highlight(next);
            }
            Key::Home => self.highlight(0),
            Key::End => self.highlight(usize::MAX),
            Key::PageUp => self.highlight(current.saturating_sub(page)),
            Key::PageDown => self.highlight(current.saturating_add(page)),
            Key::Enter | Key::Space => {
                if let Some(index) = self.highlighted {
                    self.state.select(Some(index));
                }
                control.dismiss();
            }
            Key::Escape => control.dismiss(),
            Key::Tab => {
                control.dismiss();
                return false;
            }
            _ => return false,
        }
        true
    }

    fn on_unregistered(&mut self) {
        self.state.open.set(false);
        self.release_paints();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for DropdownOverlay {
    fn drop(&mut self) {
        self.release_paints();
    }
}
