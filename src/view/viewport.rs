use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use super::base_component::{self, ElementId, UiElement};
use super::overlay::OverlayHost;
use crate::error::{Result, UiError};
use crate::geometry::{Point, Rect, Size};
use crate::render::Canvas;
use crate::ui::{Key, KeyModifiers, MouseButton, PointerEvent, state_generation};

/// Handler context passed to element input hooks.
pub struct UiControl<'a> {
    overlays: Option<&'a mut OverlayHost>,
    window: Rect,
    focus_request: Option<Option<ElementId>>,
    redraw_requested: bool,
}

impl<'a> UiControl<'a> {
    pub fn new(overlays: Option<&'a mut OverlayHost>, window: Rect) -> Self {
        Self {
            overlays,
            window,
            focus_request: None,
            redraw_requested: false,
        }
    }

    /// `None` until an overlay host has been provided.
    pub fn overlays(&mut self) -> Option<&mut OverlayHost> {
        self.overlays.as_deref_mut()
    }

    pub fn window(&self) -> Rect {
        self.window
    }

    pub fn set_focus(&mut self, id: Option<ElementId>) {
        self.focus_request = Some(id);
    }

    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    pub fn redraw_requested(&self) -> bool {
        self.redraw_requested
    }

    fn take_focus_request(&mut self) -> Option<Option<ElementId>> {
        self.focus_request.take()
    }
}

/// Owns the root elements and the overlay host of one window, and routes
/// input between them.
pub struct Viewport {
    roots: Vec<Box<dyn UiElement>>,
    overlays: Option<OverlayHost>,
    window: Rect,
    focused: Option<ElementId>,
    dispatched_focus: Option<ElementId>,
    pointer: Option<Point>,
    redraw_requested: bool,
    seen_generation: Option<u64>,
    frame_stats: FrameStats,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        let window = Rect::new(0.0, 0.0, width, height);
        Self {
            overlays: Some(OverlayHost::new(window)),
            ..Self::without_overlays(width, height)
        }
    }

    /// Menus and dropdowns opened in this viewport do nothing.
    pub fn without_overlays(width: f32, height: f32) -> Self {
        Self {
            roots: Vec::new(),
            overlays: None,
            window: Rect::new(0.0, 0.0, width.max(0.0), height.max(0.0)),
            focused: None,
            dispatched_focus: None,
            pointer: None,
            redraw_requested: true,
            seen_generation: None,
            frame_stats: FrameStats::new_from_env(),
        }
    }

    pub fn window(&self) -> Rect {
        self.window
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        let window = Rect::new(0.0, 0.0, width.max(0.0), height.max(0.0));
        if window == self.window {
            return;
        }
        self.window = window;
        if let Some(overlays) = self.overlays.as_mut() {
            overlays.set_window_bounds(window);
        }
        self.request_redraw();
    }

    pub fn push_root(&mut self, root: Box<dyn UiElement>) -> ElementId {
        let id = root.core().id();
        self.roots.push(root);
        self.request_redraw();
        id
    }

    pub fn remove_root(&mut self, id: ElementId) -> Option<Box<dyn UiElement>> {
        let index = self.roots.iter().position(|root| root.core().id() == id)?;
        let mut root = self.roots.remove(index);
        root.dispose();
        if self
            .focused
            .is_some_and(|focused| base_component::find_element(root.as_ref(), focused).is_some())
        {
            self.focused = None;
            self.dispatched_focus = None;
        }
        self.request_redraw();
        Some(root)
    }

    pub fn roots(&self) -> &[Box<dyn UiElement>] {
        &self.roots
    }

    pub fn find(&self, id: ElementId) -> Option<&dyn UiElement> {
        self.roots
            .iter()
            .find_map(|root| base_component::find_element(root.as_ref(), id))
    }

    pub fn find_mut(&mut self, id: ElementId) -> Option<&mut dyn UiElement> {
        for root in self.roots.iter_mut() {
            if let Some(found) = base_component::find_element_mut(root.as_mut(), id) {
                return Some(found);
            }
        }
        None
    }

    pub fn overlays(&self) -> Option<&OverlayHost> {
        self.overlays.as_ref()
    }

    pub fn overlays_mut(&mut self) -> Option<&mut OverlayHost> {
        self.overlays.as_mut()
    }

    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    /// True after input asked for a frame, or once any [`Binding`] on this
    /// thread changed since this viewport last rendered.
    ///
    /// [`Binding`]: crate::ui::Binding
    pub fn redraw_requested(&self) -> bool {
        self.redraw_requested || self.seen_generation != Some(state_generation())
    }

    pub fn take_redraw_request(&mut self) -> bool {
        let requested = self.redraw_requested();
        self.redraw_requested = false;
        self.seen_generation = Some(state_generation());
        requested
    }

    pub fn pointer_position(&self) -> Option<Point> {
        self.pointer
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.focused
    }

    pub fn set_focus(&mut self, id: Option<ElementId>) {
        self.focused = id;
        self.sync_focus_dispatch();
    }

    /// Focuses `id` on behalf of the application.
    pub fn focus_element(&mut self, id: ElementId) -> Result<()> {
        if self.find(id).is_none() {
            return Err(UiError::ElementNotFound(id.get()));
        }
        self.set_focus(Some(id));
        self.request_redraw();
        Ok(())
    }

    /// Runs every root's property bindings. Returns the number applied.
    pub fn refresh_bindings(&mut self) -> usize {
        self.roots
            .iter_mut()
            .map(|root| root.refresh_bindings())
            .sum()
    }

    /// Measures and arranges every root against the window.
    pub fn layout(&mut self) {
        let window = self.window;
        for root in self.roots.iter_mut() {
            root.measure(Size::new(window.width, window.height));
            root.arrange(window);
        }
    }

    /// Bindings, layout, then the element tree followed by overlays.
    pub fn render_frame(&mut self, canvas: &mut dyn Canvas) {
        let started_at = Instant::now();
        let generation = state_generation();
        let applied = self.refresh_bindings();
        trace!(applied, generation, "bindings refreshed");
        self.layout();
        for root in self.roots.iter_mut() {
            root.render(canvas);
        }
        if let Some(overlays) = self.overlays.as_mut() {
            overlays.render(canvas);
        }
        self.redraw_requested = false;
        self.seen_generation = Some(generation);
        self.frame_stats.record_frame(started_at.elapsed());
    }

    pub fn dispatch_pointer_pressed(&mut self, event: &PointerEvent) -> bool {
        self.pointer = Some(event.position);
        if let Some(overlays) = self.overlays.as_mut() {
            if overlays.dispatch_pointer_pressed(event) {
                self.request_redraw();
                return true;
            }
        }

        let mut roots = std::mem::take(&mut self.roots);
        let mut handled = false;
        let mut hit = false;
        let mut focus_target = None;
        let focus_request;
        let redraw;
        {
            let mut control = UiControl::new(self.overlays.as_mut(), self.window);
            for root in roots.iter_mut().rev() {
                let Some(target) = root.hit_test(event.position) else {
                    continue;
                };
                hit = true;
                if event.button == MouseButton::Left {
                    focus_target = focusable_ancestor(root.as_ref(), target).flatten();
                }
                handled =
                    base_component::dispatch_pointer_pressed(root.as_mut(), target, event, &mut control);
                break;
            }
            focus_request = control.take_focus_request();
            redraw = control.redraw_requested();
        }
        self.roots = roots;

        if event.button == MouseButton::Left && (hit || self.focused.is_some()) {
            self.focused = focus_target;
        }
        if let Some(request) = focus_request {
            self.focused = request;
        }
        self.sync_focus_dispatch();
        if handled || redraw {
            self.request_redraw();
        }
        handled
    }

    pub fn dispatch_pointer_moved(&mut self, position: Point) -> bool {
        self.pointer = Some(position);
        if let Some(overlays) = self.overlays.as_mut() {
            let over_overlay = overlays.hit_test(position).is_some();
            let handled = overlays.dispatch_pointer_moved(position);
            if handled {
                self.request_redraw();
            }
            if over_overlay {
                return handled;
            }
        }

        let mut roots = std::mem::take(&mut self.roots);
        let mut handled = false;
        let redraw;
        {
            let mut control = UiControl::new(self.overlays.as_mut(), self.window);
            for root in roots.iter_mut().rev() {
                if let Some(target) = root.hit_test(position) {
                    handled = base_component::dispatch_pointer_moved(
                        root.as_mut(),
                        target,
                        position,
                        &mut control,
                    );
                    break;
                }
            }
            redraw = control.redraw_requested();
        }
        self.roots = roots;
        if handled || redraw {
            self.request_redraw();
        }
        handled
    }

    /// The topmost overlay sees keys first, then the focused element and its
    /// ancestors. An unhandled Tab moves focus.
    pub fn dispatch_key(&mut self, key: Key, modifiers: KeyModifiers) -> bool {
        if let Some(overlays) = self.overlays.as_mut() {
            if !overlays.is_empty() && overlays.dispatch_key(key) {
                self.request_redraw();
                return true;
            }
        }

        let mut handled = false;
        if let Some(target) = self.focused {
            let mut roots = std::mem::take(&mut self.roots);
            let focus_request;
            let redraw;
            {
                let mut control = UiControl::new(self.overlays.as_mut(), self.window);
                for root in roots.iter_mut() {
                    if base_component::dispatch_key_pressed(
                        root.as_mut(),
                        target,
                        key,
                        modifiers,
                        &mut control,
                    ) {
                        handled = true;
                        break;
                    }
                }
                focus_request = control.take_focus_request();
                redraw = control.redraw_requested();
            }
            self.roots = roots;
            if let Some(request) = focus_request {
                self.focused = request;
                self.sync_focus_dispatch();
            }
            if handled || redraw {
                self.request_redraw();
            }
        }

        if !handled && key == Key::Tab {
            self.move_focus(!modifiers.shift);
            return true;
        }
        handled
    }

    pub fn dispatch_text_input(&mut self, text: &str) -> bool {
        let Some(target) = self.focused else {
            return false;
        };
        let mut roots = std::mem::take(&mut self.roots);
        let mut handled = false;
        {
            let mut control = UiControl::new(self.overlays.as_mut(), self.window);
            for root in roots.iter_mut() {
                if base_component::dispatch_text_input(root.as_mut(), target, text, &mut control) {
                    handled = true;
                    break;
                }
            }
        }
        self.roots = roots;
        if handled {
            self.request_redraw();
        }
        handled
    }

    /// Moves focus to the next (or previous) focusable element, wrapping.
    pub fn move_focus(&mut self, forward: bool) {
        let order: Vec<ElementId> = self
            .roots
            .iter()
            .flat_map(|root| base_component::focus_order(root.as_ref()))
            .collect();
        if order.is_empty() {
            return;
        }
        let current = self
            .focused
            .and_then(|focused| order.iter().position(|id| *id == focused));
        let next = match (current, forward) {
            (Some(index), true) => (index + 1) % order.len(),
            (Some(index), false) => (index + order.len() - 1) % order.len(),
            (None, true) => 0,
            (None, false) => order.len() - 1,
        };
        self.focused = Some(order[next]);
        self.sync_focus_dispatch();
        self.request_redraw();
    }

    fn sync_focus_dispatch(&mut self) {
        let desired = self.focused;
        let dispatched = self.dispatched_focus;
        if desired == dispatched {
            return;
        }
        if let Some(previous) = dispatched {
            if let Some(element) = self.find_mut(previous) {
                element.on_focus_changed(false);
            }
        }
        if let Some(next) = desired {
            if let Some(element) = self.find_mut(next) {
                element.on_focus_changed(true);
            }
        }
        debug!(?dispatched, ?desired, "focus moved");
        self.dispatched_focus = desired;
    }
}

/// `Some(found)` when `target` is in this subtree, where `found` is the
/// nearest focusable element on the path to it.
fn focusable_ancestor(node: &dyn UiElement, target: ElementId) -> Option<Option<ElementId>> {
    let own = node.is_focusable().then(|| node.core().id());
    if node.core().id() == target {
        return Some(own);
    }
    for child in node.children()? {
        if let Some(found) = focusable_ancestor(child.as_ref(), target) {
            return Some(found.or(own));
        }
    }
    None
}

struct FrameStats {
    enabled: bool,
    last_report_at: Instant,
    frames: u32,
    total_frame_time: Duration,
}

impl FrameStats {
    fn new_from_env() -> Self {
        Self {
            enabled: std::env::var("TRELLIS_TRACE_FPS").is_ok(),
            last_report_at: Instant::now(),
            frames: 0,
            total_frame_time: Duration::ZERO,
        }
    }

    fn record_frame(&mut self, frame_time: Duration) {
        if !self.enabled {
            return;
        }

        self.frames += 1;
        self.total_frame_time += frame_time;

        let elapsed = self.last_report_at.elapsed();
        if elapsed < Duration::from_secs(1) {
            return;
        }

        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        let fps = self.frames as f64 / secs;
        let avg_ms = (self.total_frame_time.as_secs_f64() * 1000.0) / self.frames as f64;
        info!(fps, avg_ms, frames = self.frames, "frame stats");

        self.last_report_at = Instant::now();
        self.frames = 0;
        self.total_frame_time = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::config::{MenuMetrics, TextDefaults};
    use crate::render::{DrawCommand, RecordingCanvas};
    use crate::style::Color;
    use crate::text::TextContext;
    use crate::ui::Binding;
    use crate::view::base_component::{
        ElementBuilder, ElementCore, LayoutBuilder, StackPanel, TextBlock,
    };
    use crate::view::overlay::{ContextMenu, MenuItem, OverlayElement};

    struct Field {
        core: ElementCore,
        focus_log: Rc<RefCell<Vec<bool>>>,
        keys: Rc<Cell<u32>>,
        typed: Rc<RefCell<String>>,
    }

    impl Field {
        fn new(log: &Rc<RefCell<Vec<bool>>>) -> Self {
            Self {
                core: ElementCore::new(),
                focus_log: log.clone(),
                keys: Rc::new(Cell::new(0)),
                typed: Rc::new(RefCell::new(String::new())),
            }
        }
    }

    impl UiElement for Field {
        fn core(&self) -> &ElementCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ElementCore {
            &mut self.core
        }

        fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
            Size::new(100.0, 20.0).min(available)
        }

        fn is_focusable(&self) -> bool {
            true
        }

        fn on_key_pressed(
            &mut self,
            key: Key,
            _modifiers: KeyModifiers,
            _control: &mut UiControl<'_>,
        ) -> bool {
            if key == Key::Enter {
                self.keys.set(self.keys.get() + 1);
                return true;
            }
            false
        }

        fn on_text_input(&mut self, text: &str, _control: &mut UiControl<'_>) -> bool {
            self.typed.borrow_mut().push_str(text);
            true
        }

        fn on_focus_changed(&mut self, focused: bool) {
            self.focus_log.borrow_mut().push(focused);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn context() -> Rc<TextContext> {
        TextContext::estimated(TextDefaults::default())
    }

    #[test]
    fn clicking_focuses_and_tab_cycles() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = Field::new(&log);
        let second = Field::new(&log);
        let (first_id, second_id) = (first.core().id(), second.core().id());
        let keys = first.keys.clone();

        let mut viewport = Viewport::new(400.0, 300.0);
        viewport.push_root(StackPanel::vertical().with_child(first).with_child(second).boxed());
        viewport.layout();

        viewport.dispatch_pointer_pressed(&PointerEvent::left(10.0, 10.0));
        assert_eq!(viewport.focused(), Some(first_id));
        assert!(viewport.dispatch_key(Key::Enter, KeyModifiers::default()));
        assert_eq!(keys.get(), 1);

        viewport.dispatch_key(Key::Tab, KeyModifiers::default());
        assert_eq!(viewport.focused(), Some(second_id));
        viewport.dispatch_key(Key::Tab, KeyModifiers::default());
        assert_eq!(viewport.focused(), Some(first_id));
        let shift = KeyModifiers {
            shift: true,
            ..KeyModifiers::default()
        };
        viewport.dispatch_key(Key::Tab, shift);
        assert_eq!(viewport.focused(), Some(second_id));
        assert_eq!(*log.borrow(), [true, false, true, false, true, false, true]);
    }

    #[test]
    fn focusing_an_unknown_element_is_an_error() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let field = Field::new(&log);
        let id = field.core().id();
        let stray = Field::new(&log).core().id();
        let mut viewport = Viewport::new(400.0, 300.0);
        viewport.push_root(field.boxed());

        assert!(viewport.focus_element(id).is_ok());
        assert_eq!(viewport.focused(), Some(id));
        let err = viewport.focus_element(stray).expect_err("not in the tree");
        assert!(matches!(err, UiError::ElementNotFound(_)));
        assert_eq!(viewport.focused(), Some(id));
    }

    #[test]
    fn pressing_empty_space_clears_focus() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let field = Field::new(&log);
        let typed = field.typed.clone();
        let mut viewport = Viewport::new(400.0, 300.0);
        viewport.push_root(
            StackPanel::vertical()
                .with_child(field)
                .with_alignment(
                    crate::style::HorizontalAlignment::Left,
                    crate::style::VerticalAlignment::Top,
                )
                .boxed(),
        );
        viewport.layout();

        viewport.dispatch_pointer_pressed(&PointerEvent::left(10.0, 10.0));
        assert!(viewport.dispatch_text_input("hi"));
        assert_eq!(*typed.borrow(), "hi");

        viewport.dispatch_pointer_pressed(&PointerEvent::left(300.0, 250.0));
        assert_eq!(viewport.focused(), None);
        assert!(!viewport.dispatch_text_input("x"));
    }

    #[test]
    fn secondary_press_opens_the_context_menu_above_the_tree() {
        let ctx = context();
        let menu = ContextMenu::new(ctx.clone(), MenuMetrics::default(), vec![MenuItem::new("Copy")]);
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.push_root(
            TextBlock::new(ctx.clone(), "select me")
                .with_context_menu(menu)
                .boxed(),
        );
        viewport.layout();

        assert!(viewport.dispatch_pointer_pressed(&PointerEvent::right(20.0, 5.0)));
        assert_eq!(viewport.overlays().map(OverlayHost::len), Some(1));

        let mut canvas = RecordingCanvas::new();
        viewport.render_frame(&mut canvas);
        let texts = canvas.texts();
        assert_eq!(texts.first(), Some(&"select me"));
        assert_eq!(texts.last(), Some(&"Copy"));

        assert!(viewport.dispatch_pointer_pressed(&PointerEvent::left(700.0, 500.0)));
        assert_eq!(viewport.overlays().map(OverlayHost::len), Some(0));
    }

    #[test]
    fn keys_reach_open_overlays_first() {
        let ctx = context();
        let menu = ContextMenu::new(ctx.clone(), MenuMetrics::default(), vec![MenuItem::new("Copy")]);
        let mut viewport = Viewport::new(800.0, 600.0);
        viewport.push_root(TextBlock::new(ctx, "text").with_context_menu(menu).boxed());
        viewport.layout();
        viewport.dispatch_pointer_pressed(&PointerEvent::right(5.0, 5.0));

        assert!(viewport.dispatch_key(Key::Escape, KeyModifiers::default()));
        assert_eq!(viewport.overlays().map(OverlayHost::len), Some(0));
        assert!(!viewport.dispatch_key(Key::Escape, KeyModifiers::default()));
    }

    #[test]
    fn frames_refresh_bindings_after_state_changes() {
        let title = Binding::new(String::from("before"));
        let mut block = TextBlock::new(context(), "");
        block.bind_text(title.clone());
        let mut viewport = Viewport::without_overlays(300.0, 100.0);
        viewport.push_root(block.with_background(Color::WHITE).boxed());

        let mut canvas = RecordingCanvas::new();
        title.set(String::from("after"));
        viewport.render_frame(&mut canvas);
        assert!(canvas.texts().contains(&"after"));
        assert!(matches!(canvas.commands()[0], DrawCommand::Rect { .. }));
        assert!(!viewport.redraw_requested());
    }

    fn bound_viewport(source: &Binding<String>) -> Viewport {
        let mut block = TextBlock::new(context(), "");
        block.bind_text(source.clone());
        let mut viewport = Viewport::without_overlays(300.0, 100.0);
        viewport.push_root(block.boxed());
        viewport
    }

    #[test]
    fn first_frame_applies_unchanged_bindings() {
        let greeting = Binding::new(String::from("hello"));
        let mut viewport = bound_viewport(&greeting);

        let mut canvas = RecordingCanvas::new();
        viewport.render_frame(&mut canvas);
        assert_eq!(canvas.texts(), ["hello"]);
    }

    #[test]
    fn one_change_reaches_every_viewport_on_the_thread() {
        let shared = Binding::new(String::from("initial"));
        let mut first = bound_viewport(&shared);
        let mut second = bound_viewport(&shared);
        first.render_frame(&mut RecordingCanvas::new());
        second.render_frame(&mut RecordingCanvas::new());

        shared.set(String::from("changed"));
        let mut first_canvas = RecordingCanvas::new();
        let mut second_canvas = RecordingCanvas::new();
        first.render_frame(&mut first_canvas);
        second.render_frame(&mut second_canvas);
        assert_eq!(first_canvas.texts(), ["changed"]);
        assert_eq!(second_canvas.texts(), ["changed"]);
    }

    #[test]
    fn binding_writes_request_a_redraw() {
        let shared = Binding::new(String::from("a"));
        let mut first = bound_viewport(&shared);
        let mut second = bound_viewport(&shared);
        first.render_frame(&mut RecordingCanvas::new());
        second.render_frame(&mut RecordingCanvas::new());
        assert!(!first.redraw_requested());
        assert!(!second.redraw_requested());

        shared.set(String::from("b"));
        assert!(first.redraw_requested());
        assert!(first.take_redraw_request());
        assert!(!first.redraw_requested());
        assert!(second.redraw_requested());
    }

    #[test]
    fn resizing_relayouts_overlays() {
        let ctx = context();
        let mut viewport = Viewport::new(800.0, 600.0);
        let menu = ContextMenu::new(ctx, MenuMetrics::default(), vec![MenuItem::new("Copy")]);
        let overlays = viewport.overlays_mut().unwrap();
        let id = menu.open_in(overlays, Point::new(500.0, 100.0));

        viewport.set_size(400.0, 300.0);
        let overlays = viewport.overlays().unwrap();
        let bounds = overlays.get(id).unwrap().bounds();
        assert!(bounds.right() <= 396.0);
    }
}
