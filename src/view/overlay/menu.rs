use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use super::menu_overlay::MenuOverlay;
use super::placement::PopupAnchor;
use super::{OverlayHost, OverlayId};
use crate::config::MenuMetrics;
use crate::geometry::{Point, Size};
use crate::render::Canvas;
use crate::ui::{AccessibilityRole, AccessibilityTraits, Key, KeyModifiers, MouseButton, PointerEvent};
use crate::view::base_component::{ElementCore, TextElementCore, UiElement};
use crate::view::viewport::UiControl;
use crate::text::TextContext;

/// A menu entry. Entries with `items` open a submenu instead of running
/// their command.
#[derive(Clone)]
pub struct MenuItem {
    text: String,
    icon: Option<String>,
    shortcut: Option<String>,
    command: Option<Rc<dyn Fn()>>,
    enabled: bool,
    checkable: bool,
    checked: bool,
    separator: bool,
    items: Vec<MenuItem>,
}

impl MenuItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            icon: None,
            shortcut: None,
            command: None,
            enabled: true,
            checkable: false,
            checked: false,
            separator: false,
            items: Vec::new(),
        }
    }

    pub fn separator() -> Self {
        Self {
            separator: true,
            ..Self::new("")
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }

    pub fn with_command(mut self, command: impl Fn() + 'static) -> Self {
        self.command = Some(Rc::new(command));
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Makes the item checkable.
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checkable = true;
        self.checked = checked;
        self
    }

    pub fn with_items(mut self, items: Vec<MenuItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_item(mut self, item: MenuItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn shortcut(&self) -> Option<&str> {
        self.shortcut.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_checkable(&self) -> bool {
        self.checkable
    }

    pub fn is_checked(&self) -> bool {
        self.checkable && self.checked
    }

    pub fn is_separator(&self) -> bool {
        self.separator
    }

    pub fn has_submenu(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Runs the command. Returns `false` for disabled or command-less items.
    pub fn invoke(&self) -> bool {
        match (&self.command, self.enabled) {
            (Some(command), true) => {
                command();
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.separator {
            return f.write_str("MenuItem::Separator");
        }
        f.debug_struct("MenuItem")
            .field("text", &self.text)
            .field("shortcut", &self.shortcut)
            .field("enabled", &self.enabled)
            .field("checked", &self.is_checked())
            .field("has_command", &self.command.is_some())
            .field("items", &self.items)
            .finish()
    }
}

/// Items opened at the pointer by a secondary press on the element that
/// carries them.
#[derive(Clone)]
pub struct ContextMenu {
    context: Rc<TextContext>,
    metrics: MenuMetrics,
    items: Vec<MenuItem>,
    on_dismiss: Option<Rc<dyn Fn()>>,
}

impl ContextMenu {
    pub fn new(context: Rc<TextContext>, metrics: MenuMetrics, items: Vec<MenuItem>) -> Self {
        Self {
            context,
            metrics,
            items,
            on_dismiss: None,
        }
    }

    pub fn with_on_dismiss(mut self, on_dismiss: impl Fn() + 'static) -> Self {
        self.on_dismiss = Some(Rc::new(on_dismiss));
        self
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Opens at `point`. Without an overlay host this does nothing.
    pub fn open_at(&self, point: Point, control: &mut UiControl<'_>) -> Option<OverlayId> {
        let Some(host) = control.overlays() else {
            warn!("no overlay host; context menu not opened");
            return None;
        };
        Some(self.open_in(host, point))
    }

    pub fn open_in(&self, host: &mut OverlayHost, point: Point) -> OverlayId {
        let mut overlay = MenuOverlay::new(
            self.context.clone(),
            self.metrics.clone(),
            self.items.clone(),
            PopupAnchor::at(point),
        );
        if let Some(on_dismiss) = self.on_dismiss.clone() {
            overlay = overlay.with_on_dismiss(move || on_dismiss());
        }
        let id = host.register_overlay(Box::new(overlay));
        debug!(?id, x = point.x, y = point.y, "context menu opened");
        id
    }
}

impl fmt::Debug for ContextMenu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextMenu")
            .field("items", &self.items)
            .finish()
    }
}

/// A header in the element tree that drops a [`MenuOverlay`] below itself.
pub struct Menu {
    core: ElementCore,
    header: TextElementCore,
    metrics: MenuMetrics,
    items: Vec<MenuItem>,
    open: Rc<Cell<bool>>,
    overlay: Option<OverlayId>,
}

impl Menu {
    pub fn new(context: Rc<TextContext>, metrics: MenuMetrics, header: impl Into<String>) -> Self {
        let core = ElementCore::new();
        let mut text = TextElementCore::new(context, &core);
        text.set_text(header);
        text.set_font_size(metrics.font_size);
        Self {
            core,
            header: text,
            metrics,
            items: Vec::new(),
            open: Rc::new(Cell::new(false)),
            overlay: None,
        }
    }

    pub fn with_item(mut self, item: MenuItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_items(mut self, items: Vec<MenuItem>) -> Self {
        self.items = items;
        self
    }

    pub fn header(&self) -> &str {
        self.header.text()
    }

    pub fn set_header(&mut self, header: impl Into<String>) {
        self.header.set_text(header);
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Takes effect the next time the menu opens.
    pub fn set_items(&mut self, items: Vec<MenuItem>) {
        self.items = items;
    }

    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    pub fn overlay_id(&self) -> Option<OverlayId> {
        self.overlay.filter(|_| self.open.get())
    }

    /// Returns `false` when already open or when no overlay host is available.
    pub fn open(&mut self, control: &mut UiControl<'_>, select_first: bool) -> bool {
        if self.is_open() {
            return false;
        }
        let Some(host) = control.overlays() else {
            warn!(header = self.header.text(), "no overlay host; menu not opened");
            return false;
        };
        let open = self.open.clone();
        let mut overlay = MenuOverlay::new(
            self.header.context().clone(),
            self.metrics.clone(),
            self.items.clone(),
            PopupAnchor::below(self.core.bounds()),
        )
        .with_on_dismiss(move || open.set(false));
        if select_first {
            overlay = overlay.with_initial_selection();
        }
        self.overlay = Some(host.register_overlay(Box::new(overlay)));
        self.open.set(true);
        true
    }

    pub fn close(&mut self, control: &mut UiControl<'_>) {
        if let Some(id) = self.overlay.take() {
            if let Some(host) = control.overlays() {
                host.unregister_overlay(id);
            }
        }
        self.open.set(false);
    }
}

impl UiElement for Menu {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
        let text = self.header.text().to_owned();
        let width = self.header.measure_str(&text) + self.metrics.horizontal_padding * 2.0;
        let height = self.header.line_height().max(self.metrics.item_height);
        Size::new(width, height).min(available)
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        let bounds = self.core.bounds();
        if self.is_open() {
            canvas.draw_rect(bounds, self.metrics.hover_background);
        }
        let paint = self.header.paint();
        let baseline =
            bounds.y + (bounds.height - paint.metrics.line_height()) / 2.0 - paint.metrics.ascent;
        canvas.draw_text(
            self.header.text(),
            Point::new(bounds.x + self.metrics.horizontal_padding, baseline),
            &paint,
        );
    }

    fn is_focusable(&self) -> bool {
        true
    }

    fn on_pointer_pressed(&mut self, event: &PointerEvent, control: &mut UiControl<'_>) -> bool {
        if event.button != MouseButton::Left {
            return false;
        }
        if self.is_open() {
            self.close(control);
        } else {
            self.open(control, false);
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
            Key::Enter | Key::Space | Key::Down => {
                self.open(control, true);
                true
            }
            _ => false,
        }
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::Menu
    }

    fn computed_accessibility_label(&self) -> Option<String> {
        self.core
            .accessibility_label()
            .map(str::to_string)
            .or_else(|| Some(self.header.text().to_string()))
    }

    fn computed_accessibility_traits(&self) -> AccessibilityTraits {
        let mut traits = AccessibilityTraits::FOCUSABLE | AccessibilityTraits::HAS_POPUP;
        if self.is_open() {
            traits |= AccessibilityTraits::EXPANDED;
        }
        if !self.core.is_visible() {
            traits |= AccessibilityTraits::HIDDEN;
        }
        traits
    }

    fn dispose(&mut self) {
        self.header.release();
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
    use std::cell::Cell;

    use super::*;
    use crate::config::TextDefaults;
    use crate::geometry::Rect;
    use crate::view::overlay::OverlayElement;

    const WINDOW: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    fn context() -> Rc<TextContext> {
        TextContext::estimated(TextDefaults::default())
    }

    fn menu() -> Menu {
        Menu::new(context(), MenuMetrics::default(), "File").with_items(vec![
            MenuItem::new("New"),
            MenuItem::new("Open"),
        ])
    }

    #[test]
    fn disabled_items_do_not_run() {
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let item = MenuItem::new("Save")
            .with_command(move || counter.set(counter.get() + 1))
            .with_enabled(false);
        assert!(!item.invoke());
        assert_eq!(hits.get(), 0);
        assert!(MenuItem::new("Save").with_item(MenuItem::new("As")).has_submenu());
    }

    #[test]
    fn click_toggles_the_dropdown() {
        let mut host = OverlayHost::new(WINDOW);
        let mut menu = menu();
        menu.measure(Size::new(800.0, 600.0));
        menu.arrange(Rect::new(20.0, 0.0, 80.0, 32.0));

        let mut control = UiControl::new(Some(&mut host), WINDOW);
        assert!(menu.on_pointer_pressed(&PointerEvent::left(30.0, 10.0), &mut control));
        assert!(menu.is_open());
        let id = menu.overlay_id().unwrap();
        assert_eq!(host.downcast_ref::<MenuOverlay>(id).unwrap().bounds().y, 32.0);

        let mut control = UiControl::new(Some(&mut host), WINDOW);
        menu.on_pointer_pressed(&PointerEvent::left(30.0, 10.0), &mut control);
        assert!(!menu.is_open());
        assert!(host.is_empty());
    }

    #[test]
    fn dismissing_the_overlay_clears_the_open_flag() {
        let mut host = OverlayHost::new(WINDOW);
        let mut menu = menu();
        let mut control = UiControl::new(Some(&mut host), WINDOW);
        assert!(menu.on_key_pressed(Key::Down, KeyModifiers::default(), &mut control));
        let id = menu.overlay_id().unwrap();
        assert_eq!(host.downcast_ref::<MenuOverlay>(id).unwrap().hovered(), Some(0));

        host.dispatch_key(Key::Escape);
        assert!(!menu.is_open());
        assert_eq!(menu.overlay_id(), None);
    }

    #[test]
    fn opening_without_a_host_is_a_no_op() {
        let mut menu = menu();
        let mut control = UiControl::new(None, WINDOW);
        assert!(!menu.open(&mut control, false));
        assert!(!menu.is_open());

        let context_menu = ContextMenu::new(context(), MenuMetrics::default(), vec![MenuItem::new("Copy")]);
        assert_eq!(context_menu.open_at(Point::new(5.0, 5.0), &mut control), None);
    }

    #[test]
    fn context_menu_opens_at_the_pointer() {
        let mut host = OverlayHost::new(WINDOW);
        let closed = Rc::new(Cell::new(false));
        let flag = closed.clone();
        let context_menu = ContextMenu::new(context(), MenuMetrics::default(), vec![MenuItem::new("Copy")])
            .with_on_dismiss(move || flag.set(true));
        let mut control = UiControl::new(Some(&mut host), WINDOW);
        let id = context_menu.open_at(Point::new(100.0, 120.0), &mut control).unwrap();
        assert_eq!(
            host.downcast_ref::<MenuOverlay>(id).unwrap().bounds().origin(),
            Point::new(100.0, 120.0)
        );
        host.dismiss_all();
        assert!(closed.get());
    }

    #[test]
    fn accessibility_reflects_the_open_state() {
        let mut host = OverlayHost::new(WINDOW);
        let mut menu = menu();
        assert!(!menu.computed_accessibility_traits().contains(AccessibilityTraits::EXPANDED));
        let mut control = UiControl::new(Some(&mut host), WINDOW);
        menu.open(&mut control, false);
        assert!(menu.computed_accessibility_traits().contains(AccessibilityTraits::EXPANDED));
        assert_eq!(menu.computed_accessibility_label().as_deref(), Some("File"));
    }
}
