use std::any::Any;
use std::rc::Rc;

use tracing::debug;

use super::menu::MenuItem;
use super::placement::{self, PopupAnchor};
use super::{OverlayControl, OverlayElement, OverlayId};
use crate::config::MenuMetrics;
use crate::geometry::{Point, Rect, Size};
use crate::render::Canvas;
use crate::style::{FontStyle, FontWeight};
use crate::text::{RunPaintCache, RunStyleKey, TextContext, TextPaint};
use crate::ui::{Key, PointerEvent};

const CHECKMARK: &str = "\u{2713}";
const SUBMENU_ARROW: &str = "\u{203a}";

/// One level of a popup menu. Submenus are further `MenuOverlay`s registered
/// as children of this one.
pub struct MenuOverlay {
    context: Rc<TextContext>,
    metrics: MenuMetrics,
    items: Vec<MenuItem>,
    anchor: PopupAnchor,
    size: Option<Size>,
    bounds: Rect,
    hovered: Option<usize>,
    open_submenu: Option<usize>,
    id: Option<OverlayId>,
    is_submenu: bool,
    paints: RunPaintCache,
    on_dismiss: Option<Box<dyn FnMut()>>,
}

impl MenuOverlay {
    pub fn new(
        context: Rc<TextContext>,
        metrics: MenuMetrics,
        items: Vec<MenuItem>,
        anchor: PopupAnchor,
    ) -> Self {
        Self {
            context,
            metrics,
            items,
            anchor,
            size: None,
            bounds: Rect::from_origin_size(anchor.origin, Size::ZERO),
            hovered: None,
            open_submenu: None,
            id: None,
            is_submenu: false,
            paints: RunPaintCache::default(),
            on_dismiss: None,
        }
    }

    /// Runs once when this overlay is unregistered for any reason.
    pub fn with_on_dismiss(mut self, on_dismiss: impl FnMut() + 'static) -> Self {
        self.on_dismiss = Some(Box::new(on_dismiss));
        self
    }

    /// Starts with the first enabled item hovered, as keyboard opening does.
    pub fn with_initial_selection(mut self) -> Self {
        self.hovered = self.step(None, true);
        self
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn open_submenu_index(&self) -> Option<usize> {
        self.open_submenu
    }

    pub fn is_submenu(&self) -> bool {
        self.is_submenu
    }

    pub fn overlay_id(&self) -> Option<OverlayId> {
        self.id
    }

    /// Intrinsic size, computed on first use.
    pub fn ensure_measured(&mut self) -> Size {
        if let Some(size) = self.size {
            return size;
        }
        let paint = self.text_paint(true);
        let context = self.context.clone();
        let measurer = context.measurer();
        let metrics = &self.metrics;

        let mut text_width = 0.0_f32;
        let mut shortcut_width = 0.0_f32;
        let mut height = 0.0;
        for item in &self.items {
            height += self.row_height(item);
            if item.is_separator() {
                continue;
            }
            text_width = text_width.max(measurer.measure_width(item.text(), &paint.font));
            if let Some(shortcut) = item.shortcut() {
                shortcut_width = shortcut_width.max(measurer.measure_width(shortcut, &paint.font));
            }
        }
        let shortcut_column = if shortcut_width > 0.0 {
            metrics.shortcut_gap + shortcut_width
        } else {
            0.0
        };
        let width = (metrics.horizontal_padding * 2.0
            + metrics.checkmark_column
            + metrics.icon_column
            + text_width
            + shortcut_column
            + metrics.submenu_arrow_column)
            .max(metrics.min_width);

        let size = Size::new(width, height);
        self.size = Some(size);
        size
    }

    fn row_height(&self, item: &MenuItem) -> f32 {
        if item.is_separator() {
            self.metrics.separator_height
        } else {
            self.metrics.item_height
        }
    }

    pub fn row_rect(&self, index: usize) -> Option<Rect> {
        let mut y = self.bounds.y;
        for (current, item) in self.items.iter().enumerate() {
            let height = self.row_height(item);
            if current == index {
                return Some(Rect::new(self.bounds.x, y, self.bounds.width, height));
            }
            y += height;
        }
        None
    }

    pub fn row_at(&self, point: Point) -> Option<usize> {
        if !self.bounds.contains(point) {
            return None;
        }
        let mut bottom = self.bounds.y;
        for (index, item) in self.items.iter().enumerate() {
            bottom += self.row_height(item);
            if point.y < bottom {
                return Some(index);
            }
        }
        None
    }

    fn is_selectable(&self, index: usize) -> bool {
        self.items
            .get(index)
            .is_some_and(|item| item.is_enabled() && !item.is_separator())
    }

    /// Next selectable index after `from`, wrapping. `None` starts from the
    /// respective end.
    fn step(&self, from: Option<usize>, forward: bool) -> Option<usize> {
        let count = self.items.len();
        if count == 0 {
            return None;
        }
        let mut index = match (from, forward) {
            (Some(current), _) => current,
            (None, true) => count - 1,
            (None, false) => 0,
        };
        for _ in 0..count {
            index = if forward {
                (index + 1) % count
            } else {
                (index + count - 1) % count
            };
            if self.is_selectable(index) {
                return Some(index);
            }
        }
        None
    }

    fn text_paint(&mut self, enabled: bool) -> Rc<TextPaint> {
        let color = if enabled {
            self.metrics.text_color
        } else {
            self.metrics.disabled_text_color
        };
        let key = RunStyleKey::new(
            color,
            self.metrics.font_size,
            FontWeight::NORMAL,
            FontStyle::Normal,
            self.context.defaults().font_family.clone(),
        );
        self.paints.get_or_acquire(&key, &self.context)
    }

    fn set_hovered(&mut self, index: Option<usize>, control: &mut OverlayControl) {
        self.hovered = index;
        if self.open_submenu.is_some() && self.open_submenu != index {
            self.open_submenu = None;
            control.close_child();
        }
    }

    fn open_submenu(&mut self, index: usize, control: &mut OverlayControl, select_first: bool) {
        let Some(row) = self.row_rect(index) else {
            return;
        };
        let anchor = PopupAnchor::beside(row, self.bounds.x, self.metrics.submenu_overlap);
        let mut child = MenuOverlay::new(
            self.context.clone(),
            self.metrics.clone(),
            self.items[index].items().to_vec(),
            anchor,
        );
        child.is_submenu = true;
        if select_first {
            child = child.with_initial_selection();
        }
        self.open_submenu = Some(index);
        control.open_child(Box::new(child));
        debug!(index, "submenu opened");
    }

    /// Opens a submenu or runs the command and closes every level.
    fn activate(&mut self, index: usize, control: &mut OverlayControl, from_keyboard: bool) {
        if !self.is_selectable(index) {
            return;
        }
        if self.items[index].has_submenu() {
            if self.open_submenu != Some(index) || from_keyboard {
                self.open_submenu(index, control, from_keyboard);
            }
            return;
        }
        self.items[index].invoke();
        control.dismiss_chain();
    }

    fn release_paints(&mut self) {
        let context = self.context.clone();
        self.paints.release_all(&context);
    }
}

impl OverlayElement for MenuOverlay {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn layout(&mut self, window: Rect) {
        let size = self.ensure_measured();
        let origin =
            placement::clamp_to_window(self.anchor, size, window, self.metrics.window_margin);
        self.bounds = Rect::from_origin_size(origin, size);
    }

    fn render(&mut self, canvas: &mut dyn Canvas) {
        let normal = self.text_paint(true);
        let disabled = self.text_paint(false);
        let context = self.context.clone();
        let measurer = context.measurer();
        let metrics = &self.metrics;

        canvas.draw_round_rect(self.bounds, metrics.corner_radius, metrics.background);
        let mut y = self.bounds.y;
        for (index, item) in self.items.iter().enumerate() {
            let row = Rect::new(self.bounds.x, y, self.bounds.width, self.row_height(item));
            y = row.bottom();

            if item.is_separator() {
                let middle = row.y + row.height / 2.0;
                canvas.draw_line(
                    Point::new(row.x + metrics.horizontal_padding, middle),
                    Point::new(row.right() - metrics.horizontal_padding, middle),
                    1.0,
                    metrics.separator_color,
                );
                continue;
            }

            if self.hovered == Some(index) && item.is_enabled() {
                canvas.draw_rect(row, metrics.hover_background);
            }
            let paint = if item.is_enabled() { &normal } else { &disabled };
            let baseline =
                row.y + (row.height - paint.metrics.line_height()) / 2.0 - paint.metrics.ascent;

            let mut x = row.x + metrics.horizontal_padding;
            if item.is_checked() {
                canvas.draw_text(CHECKMARK, Point::new(x, baseline), paint);
            }
            x += metrics.checkmark_column;
            if let Some(icon) = item.icon() {
                canvas.draw_text(icon, Point::new(x, baseline), paint);
            }
            x += metrics.icon_column;
            canvas.draw_text(item.text(), Point::new(x, baseline), paint);

            let arrow_x = row.right() - metrics.horizontal_padding - metrics.submenu_arrow_column;
            if let Some(shortcut) = item.shortcut() {
                let width = measurer.measure_width(shortcut, &paint.font);
                canvas.draw_text(shortcut, Point::new(arrow_x - width, baseline), paint);
            }
            if item.has_submenu() {
                canvas.draw_text(SUBMENU_ARROW, Point::new(arrow_x, baseline), paint);
            }
        }
    }

    fn pointer_moved(&mut self, point: Point, control: &mut OverlayControl) -> bool {
        let Some(index) = self.row_at(point) else {
            return false;
        };
        if self.hovered == Some(index) {
            return true;
        }
        if !self.is_selectable(index) {
            // separators and disabled rows never keep a sibling's submenu open
            self.set_hovered(None, control);
            return true;
        }
        if self.items[index].has_submenu() {
            // the new child replaces the open one
            self.hovered = Some(index);
            self.open_submenu(index, control, false);
        } else {
            self.set_hovered(Some(index), control);
        }
        true
    }

    fn pointer_exited(&mut self, _control: &mut OverlayControl) {
        if self.open_submenu.is_none() {
            self.hovered = None;
        }
    }

    fn pointer_pressed(&mut self, event: &PointerEvent, control: &mut OverlayControl) -> bool {
        if let Some(index) = self.row_at(event.position) {
            self.activate(index, control, false);
        }
        true
    }

    fn key_pressed(&mut self, key: Key, control: &mut OverlayControl) -> bool {
        match key {
            Key::Down | Key::Up => {
                let next = self.step(self.hovered, key == Key::Down);
                self.set_hovered(next, control);
            }
            Key::Home => {
                let first = self.step(None, true);
                self.set_hovered(first, control);
            }
            Key::End => {
                let last = self.step(None, false);
                self.set_hovered(last, control);
            }
            Key::Right => {
                let Some(index) = self.hovered.filter(|index| self.items[*index].has_submenu())
                else {
                    return false;
                };
                self.open_submenu(index, control, true);
            }
            Key::Left => {
                if !self.is_submenu {
                    return false;
                }
                control.dismiss();
            }
            Key::Enter | Key::Space => {
                if let Some(index) = self.hovered {
                    self.activate(index, control, true);
                }
            }
            Key::Escape => control.dismiss_chain(),
            _ => return false,
        }
        true
    }

    fn on_registered(&mut self, id: OverlayId) {
        self.id = Some(id);
    }

    fn on_child_closed(&mut self) {
        self.open_submenu = None;
    }

    fn on_unregistered(&mut self) {
        self.release_paints();
        if let Some(mut on_dismiss) = self.on_dismiss.take() {
            on_dismiss();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for MenuOverlay {
    fn drop(&mut self) {
        self.release_paints();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::TextDefaults;
    use crate::render::{DrawCommand, RecordingCanvas};
    use crate::view::overlay::OverlayHost;

    fn context() -> Rc<TextContext> {
        TextContext::estimated(TextDefaults::default())
    }

    fn host() -> OverlayHost {
        OverlayHost::new(Rect::new(0.0, 0.0, 800.0, 600.0))
    }

    fn menu(items: Vec<MenuItem>, at: Point) -> MenuOverlay {
        MenuOverlay::new(context(), MenuMetrics::default(), items, PopupAnchor::at(at))
    }

    fn nested_items(hits: &Rc<Cell<u32>>) -> Vec<MenuItem> {
        let hits = hits.clone();
        vec![
            MenuItem::new("Open"),
            MenuItem::new("Recent").with_items(vec![
                MenuItem::new("Projects").with_items(vec![
                    MenuItem::new("trellis").with_command(move || hits.set(hits.get() + 1)),
                ]),
            ]),
            MenuItem::separator(),
            MenuItem::new("Quit"),
        ]
    }

    fn menu_at<'a>(host: &'a OverlayHost, id: OverlayId) -> &'a MenuOverlay {
        host.downcast_ref::<MenuOverlay>(id).unwrap()
    }

    #[test]
    fn measures_once_from_rows_and_columns() {
        let metrics = MenuMetrics::default();
        let mut overlay = menu(
            vec![MenuItem::new("A"), MenuItem::separator(), MenuItem::new("B")],
            Point::ZERO,
        );
        let size = overlay.ensure_measured();
        assert_eq!(size.width, metrics.min_width);
        assert_eq!(size.height, metrics.item_height * 2.0 + metrics.separator_height);
    }

    #[test]
    fn long_items_widen_the_menu() {
        let metrics = MenuMetrics::default();
        let mut overlay = menu(
            vec![MenuItem::new("A rather long menu entry label").with_shortcut("Ctrl+Shift+L")],
            Point::ZERO,
        );
        assert!(overlay.ensure_measured().width > metrics.min_width);
    }

    #[test]
    fn stays_inside_the_window_near_the_right_edge() {
        let mut host = host();
        let items = (0..3).map(|i| MenuItem::new(format!("Item {i}"))).collect();
        let id = host.register_overlay(Box::new(menu(items, Point::new(750.0, 20.0))));
        let bounds = menu_at(&host, id).bounds();
        assert!(bounds.right() <= 796.0);
        assert!(bounds.x >= 4.0);
    }

    #[test]
    fn rows_are_found_by_accumulated_heights() {
        let hits = Rc::new(Cell::new(0));
        let mut overlay = menu(nested_items(&hits), Point::ZERO);
        overlay.layout(Rect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(overlay.row_at(Point::new(10.0, 5.0)), Some(0));
        assert_eq!(overlay.row_at(Point::new(10.0, 65.0)), Some(2));
        assert_eq!(overlay.row_at(Point::new(10.0, 74.0)), Some(3));
        assert_eq!(overlay.row_at(Point::new(10.0, 500.0)), None);
    }

    #[test]
    fn keyboard_skips_disabled_items_and_wraps() {
        let mut host = host();
        let items = vec![
            MenuItem::new("One"),
            MenuItem::new("Two").with_enabled(false),
            MenuItem::separator(),
            MenuItem::new("Three"),
        ];
        let id = host.register_overlay(Box::new(menu(items, Point::ZERO)));

        host.dispatch_key(Key::Down);
        assert_eq!(menu_at(&host, id).hovered(), Some(0));
        host.dispatch_key(Key::Down);
        assert_eq!(menu_at(&host, id).hovered(), Some(3));
        host.dispatch_key(Key::Down);
        assert_eq!(menu_at(&host, id).hovered(), Some(0));
        host.dispatch_key(Key::Up);
        assert_eq!(menu_at(&host, id).hovered(), Some(3));
    }

    #[test]
    fn hovering_an_item_opens_its_submenu_beside_the_row() {
        let hits = Rc::new(Cell::new(0));
        let mut host = host();
        let root = host.register_overlay(Box::new(menu(nested_items(&hits), Point::new(10.0, 10.0))));
        host.dispatch_pointer_moved(Point::new(30.0, 50.0));

        let child = host.child_of(root).unwrap();
        assert_eq!(menu_at(&host, root).open_submenu_index(), Some(1));
        let row = menu_at(&host, root).row_rect(1).unwrap();
        let child_bounds = menu_at(&host, child).bounds();
        assert_eq!(child_bounds.x, row.right() - 4.0);
        assert_eq!(child_bounds.y, row.y);
        assert!(menu_at(&host, child).is_submenu());

        host.dispatch_pointer_moved(Point::new(30.0, 20.0));
        assert!(!host.contains(child));
        assert_eq!(menu_at(&host, root).open_submenu_index(), None);
    }

    #[test]
    fn moving_onto_inert_rows_closes_the_open_submenu() {
        let hits = Rc::new(Cell::new(0));
        let mut host = host();
        let root = host.register_overlay(Box::new(menu(nested_items(&hits), Point::new(10.0, 10.0))));
        host.dispatch_pointer_moved(Point::new(30.0, 50.0));
        let child = host.child_of(root).unwrap();

        host.dispatch_pointer_moved(Point::new(30.0, 78.0));
        assert!(!host.contains(child));
        assert_eq!(menu_at(&host, root).open_submenu_index(), None);
        assert_eq!(menu_at(&host, root).hovered(), None);

        let items = vec![
            MenuItem::new("More").with_items(vec![MenuItem::new("Inner")]),
            MenuItem::new("Unavailable").with_enabled(false),
        ];
        let other = host.register_overlay(Box::new(menu(items, Point::new(300.0, 10.0))));
        host.dispatch_pointer_moved(Point::new(320.0, 20.0));
        let inner = host.child_of(other).unwrap();
        host.dispatch_pointer_moved(Point::new(320.0, 50.0));
        assert!(!host.contains(inner));
        assert_eq!(menu_at(&host, other).hovered(), None);
    }

    #[test]
    fn executing_a_leaf_dismisses_every_level_once() {
        let hits = Rc::new(Cell::new(0));
        let dismissed = Rc::new(Cell::new(0));
        let mut host = host();
        let counter = dismissed.clone();
        let root = host.register_overlay(Box::new(
            menu(nested_items(&hits), Point::new(10.0, 10.0))
                .with_on_dismiss(move || counter.set(counter.get() + 1)),
        ));
        let unregistered = Rc::new(Cell::new(0));
        let seen = unregistered.clone();
        host.set_unregister_observer(move |_| seen.set(seen.get() + 1));

        host.dispatch_key(Key::Down);
        host.dispatch_key(Key::Down);
        host.dispatch_key(Key::Right);
        let level_two = host.child_of(root).unwrap();
        assert_eq!(menu_at(&host, level_two).hovered(), Some(0));
        host.dispatch_key(Key::Enter);
        let level_three = host.child_of(level_two).unwrap();
        assert_eq!(menu_at(&host, level_three).hovered(), Some(0));

        host.dispatch_key(Key::Enter);
        assert_eq!(hits.get(), 1);
        assert!(host.is_empty());
        assert_eq!(unregistered.get(), 3);
        assert_eq!(dismissed.get(), 1);
    }

    #[test]
    fn left_closes_only_the_submenu() {
        let hits = Rc::new(Cell::new(0));
        let mut host = host();
        let root = host.register_overlay(Box::new(
            menu(nested_items(&hits), Point::ZERO).with_initial_selection(),
        ));
        host.dispatch_key(Key::Down);
        host.dispatch_key(Key::Right);
        assert!(host.child_of(root).is_some());

        host.dispatch_key(Key::Left);
        assert_eq!(host.len(), 1);
        assert_eq!(menu_at(&host, root).open_submenu_index(), None);
        assert_eq!(menu_at(&host, root).hovered(), Some(1));

        assert!(!host.dispatch_key(Key::Left));
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn escape_dismisses_the_whole_chain() {
        let hits = Rc::new(Cell::new(0));
        let mut host = host();
        host.register_overlay(Box::new(menu(nested_items(&hits), Point::ZERO)));
        host.dispatch_pointer_moved(Point::new(30.0, 40.0));
        assert_eq!(host.len(), 2);
        host.dispatch_key(Key::Escape);
        assert!(host.is_empty());
    }

    #[test]
    fn clicking_a_submenu_item_does_not_run_anything() {
        let hits = Rc::new(Cell::new(0));
        let mut host = host();
        let root = host.register_overlay(Box::new(menu(nested_items(&hits), Point::ZERO)));
        host.dispatch_pointer_pressed(&PointerEvent::left(30.0, 40.0));
        assert_eq!(hits.get(), 0);
        assert!(host.child_of(root).is_some());
    }

    #[test]
    fn paints_are_released_on_unregister() {
        let context = context();
        let mut host = host();
        let overlay = MenuOverlay::new(
            context.clone(),
            MenuMetrics::default(),
            vec![MenuItem::new("A"), MenuItem::new("B").with_enabled(false)],
            PopupAnchor::at(Point::ZERO),
        );
        let id = host.register_overlay(Box::new(overlay));
        let mut canvas = RecordingCanvas::new();
        host.render(&mut canvas);
        assert_eq!(context.paints().live_entries(), 2);
        assert!(canvas
            .commands()
            .iter()
            .any(|command| matches!(command, DrawCommand::Text { text, .. } if text == "B")));

        host.unregister_overlay(id);
        assert_eq!(context.paints().live_entries(), 0);
    }
}
