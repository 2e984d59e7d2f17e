use std::any::Any;

use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::geometry::{Point, Rect};
use crate::render::Canvas;
use crate::ui::{Key, PointerEvent};

slotmap::new_key_type! {
    pub struct OverlayId;
}

/// A floating surface drawn above the element tree.
pub trait OverlayElement: Any {
    fn bounds(&self) -> Rect;

    /// Called on registration and whenever the window bounds change.
    fn layout(&mut self, _window: Rect) {}

    fn render(&mut self, canvas: &mut dyn Canvas);

    fn hit_test(&self, point: Point) -> bool {
        self.bounds().contains(point)
    }

    fn pointer_moved(&mut self, _point: Point, _control: &mut OverlayControl) -> bool {
        false
    }

    fn pointer_exited(&mut self, _control: &mut OverlayControl) {}

    /// Presses inside the overlay are consumed unless this returns `false`.
    fn pointer_pressed(&mut self, _event: &PointerEvent, _control: &mut OverlayControl) -> bool {
        true
    }

    fn key_pressed(&mut self, _key: Key, _control: &mut OverlayControl) -> bool {
        false
    }

    fn dismiss_on_outside_press(&self) -> bool {
        true
    }

    fn on_registered(&mut self, _id: OverlayId) {}

    /// The child registered on behalf of this overlay closed itself or was
    /// closed explicitly.
    fn on_child_closed(&mut self) {}

    fn on_unregistered(&mut self) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub enum OverlayRequest {
    OpenChild(Box<dyn OverlayElement>),
    CloseChild,
    Dismiss,
    DismissChain,
}

impl std::fmt::Debug for OverlayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayRequest::OpenChild(_) => f.write_str("OpenChild"),
            OverlayRequest::CloseChild => f.write_str("CloseChild"),
            OverlayRequest::Dismiss => f.write_str("Dismiss"),
            OverlayRequest::DismissChain => f.write_str("DismissChain"),
        }
    }
}

/// Handler context passed to overlays. Requests are applied by the host in
/// order once the handler returns.
#[derive(Debug)]
pub struct OverlayControl {
    id: OverlayId,
    parent: Option<OverlayId>,
    has_child: bool,
    window: Rect,
    requests: Vec<OverlayRequest>,
}

impl OverlayControl {
    fn new(id: OverlayId, parent: Option<OverlayId>, has_child: bool, window: Rect) -> Self {
        Self {
            id,
            parent,
            has_child,
            window,
            requests: Vec::new(),
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn parent(&self) -> Option<OverlayId> {
        self.parent
    }

    pub fn has_child(&self) -> bool {
        self.has_child
    }

    pub fn window(&self) -> Rect {
        self.window
    }

    /// Replaces any existing child silently.
    pub fn open_child(&mut self, overlay: Box<dyn OverlayElement>) {
        self.has_child = true;
        self.requests.push(OverlayRequest::OpenChild(overlay));
    }

    pub fn close_child(&mut self) {
        if self.has_child {
            self.has_child = false;
            self.requests.push(OverlayRequest::CloseChild);
        }
    }

    pub fn dismiss(&mut self) {
        self.requests.push(OverlayRequest::Dismiss);
    }

    /// Dismisses the whole chain this overlay belongs to.
    pub fn dismiss_chain(&mut self) {
        self.requests.push(OverlayRequest::DismissChain);
    }

    pub fn requests(&self) -> &[OverlayRequest] {
        &self.requests
    }
}

struct OverlaySlot {
    element: Box<dyn OverlayElement>,
    parent: Option<OverlayId>,
    child: Option<OverlayId>,
}

/// Owns every live overlay. Overlays form chains: a root plus at most one
/// child per overlay. Later registrations paint and hit-test above earlier
/// ones.
pub struct OverlayHost {
    slots: SlotMap<OverlayId, OverlaySlot>,
    order: Vec<OverlayId>,
    window: Rect,
    hovered: Option<OverlayId>,
    unregister_observer: Option<Box<dyn FnMut(OverlayId)>>,
}

impl OverlayHost {
    pub fn new(window: Rect) -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
            window,
            hovered: None,
            unregister_observer: None,
        }
    }

    pub fn window(&self) -> Rect {
        self.window
    }

    pub fn set_window_bounds(&mut self, window: Rect) {
        if self.window == window {
            return;
        }
        self.window = window;
        for slot in self.slots.values_mut() {
            slot.element.layout(window);
        }
    }

    /// Called with each id after it has been unregistered.
    pub fn set_unregister_observer(&mut self, observer: impl FnMut(OverlayId) + 'static) {
        self.unregister_observer = Some(Box::new(observer));
    }

    pub fn register_overlay(&mut self, element: Box<dyn OverlayElement>) -> OverlayId {
        self.insert(element, None)
    }

    /// Registers `element` as the child of `parent`, closing the previous
    /// child first. Returns `None` when `parent` is not registered.
    pub fn register_child_overlay(
        &mut self,
        parent: OverlayId,
        element: Box<dyn OverlayElement>,
    ) -> Option<OverlayId> {
        let existing = self.slots.get(parent)?.child;
        if let Some(existing) = existing {
            self.unregister_inner(existing, false);
        }
        let id = self.insert(element, Some(parent));
        if let Some(slot) = self.slots.get_mut(parent) {
            slot.child = Some(id);
        }
        Some(id)
    }

    /// Unregisters `id` after its child chain. Returns `false` for unknown ids.
    pub fn unregister_overlay(&mut self, id: OverlayId) -> bool {
        self.unregister_inner(id, true)
    }

    pub fn close_child(&mut self, id: OverlayId) -> bool {
        match self.slots.get(id).and_then(|slot| slot.child) {
            Some(child) => self.unregister_inner(child, true),
            None => false,
        }
    }

    pub fn root_of(&self, id: OverlayId) -> Option<OverlayId> {
        let mut current = id;
        loop {
            match self.slots.get(current)?.parent {
                Some(parent) => current = parent,
                None => return Some(current),
            }
        }
    }

    /// Unregisters the chain `id` belongs to, from the root down.
    pub fn dismiss_chain(&mut self, id: OverlayId) -> bool {
        match self.root_of(id) {
            Some(root) => self.unregister_inner(root, false),
            None => false,
        }
    }

    pub fn dismiss_all(&mut self) {
        let roots: Vec<OverlayId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.slots.get(*id).is_some_and(|slot| slot.parent.is_none()))
            .collect();
        for root in roots {
            self.unregister_inner(root, false);
        }
    }

    pub fn contains(&self, id: OverlayId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Paint order, bottom first.
    pub fn ids(&self) -> &[OverlayId] {
        &self.order
    }

    pub fn parent_of(&self, id: OverlayId) -> Option<OverlayId> {
        self.slots.get(id)?.parent
    }

    pub fn child_of(&self, id: OverlayId) -> Option<OverlayId> {
        self.slots.get(id)?.child
    }

    pub fn get(&self, id: OverlayId) -> Option<&dyn OverlayElement> {
        self.slots.get(id).map(|slot| slot.element.as_ref())
    }

    pub fn downcast_ref<T: OverlayElement>(&self, id: OverlayId) -> Option<&T> {
        self.slots.get(id)?.element.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: OverlayElement>(&mut self, id: OverlayId) -> Option<&mut T> {
        self.slots
            .get_mut(id)?
            .element
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn render(&mut self, canvas: &mut dyn Canvas) {
        for id in &self.order {
            if let Some(slot) = self.slots.get_mut(*id) {
                slot.element.render(canvas);
            }
        }
    }

    /// Topmost overlay under `point`; deeper submenus win over their parents.
    pub fn hit_test(&self, point: Point) -> Option<OverlayId> {
        self.order.iter().rev().copied().find(|id| {
            self.slots
                .get(*id)
                .is_some_and(|slot| slot.element.hit_test(point))
        })
    }

    /// Returns `true` when the press was consumed. A press outside every
    /// overlay dismisses the chains that opt into it and is consumed if any
    /// chain closed.
    pub fn dispatch_pointer_pressed(&mut self, event: &PointerEvent) -> bool {
        if let Some(id) = self.hit_test(event.position) {
            return self
                .with_control(id, |element, control| element.pointer_pressed(event, control))
                .unwrap_or(true);
        }

        let roots: Vec<OverlayId> = self
            .order
            .iter()
            .copied()
            .filter(|id| {
                self.slots.get(*id).is_some_and(|slot| {
                    slot.parent.is_none() && slot.element.dismiss_on_outside_press()
                })
            })
            .collect();
        if roots.is_empty() {
            return false;
        }
        debug!(count = roots.len(), "outside press dismisses overlays");
        for root in roots {
            self.unregister_inner(root, false);
        }
        true
    }

    pub fn dispatch_pointer_moved(&mut self, point: Point) -> bool {
        let target = self.hit_test(point);
        if self.hovered != target {
            if let Some(previous) = self.hovered.take() {
                self.with_control(previous, |element, control| element.pointer_exited(control));
            }
            self.hovered = target;
        }
        match target {
            Some(id) => self
                .with_control(id, |element, control| element.pointer_moved(point, control))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Keys go to the topmost overlay only.
    pub fn dispatch_key(&mut self, key: Key) -> bool {
        match self.order.last().copied() {
            Some(id) => self
                .with_control(id, |element, control| element.key_pressed(key, control))
                .unwrap_or(false),
            None => false,
        }
    }

    fn with_control<R>(
        &mut self,
        id: OverlayId,
        handler: impl FnOnce(&mut dyn OverlayElement, &mut OverlayControl) -> R,
    ) -> Option<R> {
        let window = self.window;
        let slot = self.slots.get_mut(id)?;
        let mut control = OverlayControl::new(id, slot.parent, slot.child.is_some(), window);
        let result = handler(slot.element.as_mut(), &mut control);
        self.apply_requests(id, control.requests);
        Some(result)
    }

    fn apply_requests(&mut self, id: OverlayId, requests: Vec<OverlayRequest>) {
        for request in requests {
            if !self.slots.contains_key(id) {
                break;
            }
            trace!(?request, "overlay request");
            match request {
                OverlayRequest::OpenChild(overlay) => {
                    self.register_child_overlay(id, overlay);
                }
                OverlayRequest::CloseChild => {
                    self.close_child(id);
                }
                OverlayRequest::Dismiss => {
                    self.unregister_overlay(id);
                }
                OverlayRequest::DismissChain => {
                    self.dismiss_chain(id);
                }
            }
        }
    }

    fn insert(&mut self, element: Box<dyn OverlayElement>, parent: Option<OverlayId>) -> OverlayId {
        let id = self.slots.insert(OverlaySlot {
            element,
            parent,
            child: None,
        });
        self.order.push(id);
        let window = self.window;
        if let Some(slot) = self.slots.get_mut(id) {
            slot.element.on_registered(id);
            slot.element.layout(window);
        }
        debug!(?id, ?parent, "overlay registered");
        id
    }

    /// `notify_parent` is false when the parent is going away too or is
    /// replacing this child.
    fn unregister_inner(&mut self, id: OverlayId, notify_parent: bool) -> bool {
        let Some(child) = self.slots.get(id).map(|slot| slot.child) else {
            return false;
        };
        if let Some(child) = child {
            self.unregister_inner(child, false);
        }
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        self.order.retain(|other| *other != id);
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        let OverlaySlot {
            mut element,
            parent,
            ..
        } = slot;
        element.on_unregistered();
        if let Some(parent) = parent.and_then(|parent| self.slots.get_mut(parent)) {
            if parent.child == Some(id) {
                parent.child = None;
            }
            if notify_parent {
                parent.element.on_child_closed();
            }
        }
        debug!(?id, "overlay unregistered");
        if let Some(observer) = self.unregister_observer.as_mut() {
            observer(id);
        }
        true
    }
}

impl std::fmt::Debug for OverlayHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayHost")
            .field("order", &self.order)
            .field("window", &self.window)
            .field("hovered", &self.hovered)
            .finish()
    }
}
