use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::{Margin, Point, Rect, Size};
use crate::style::{Color, HorizontalAlignment, VerticalAlignment};
use crate::view::overlay::ContextMenu;

/// Process-unique element identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct InvalidationNode {
    dirty: Cell<bool>,
    parent: RefCell<Weak<InvalidationNode>>,
}

/// The dirty flag of one element plus a non-owning link to its parent's flag.
///
/// Cloning yields another handle to the same flag, which is how text runs and
/// other owned parts invalidate the element they belong to.
#[derive(Debug, Clone)]
pub struct InvalidationHandle(Rc<InvalidationNode>);

impl InvalidationHandle {
    pub fn new() -> Self {
        Self(Rc::new(InvalidationNode {
            dirty: Cell::new(true),
            parent: RefCell::new(Weak::new()),
        }))
    }

    /// Marks this element and every ancestor dirty.
    pub fn invalidate(&self) {
        let mut node = Some(Rc::clone(&self.0));
        while let Some(current) = node {
            current.dirty.set(true);
            node = current.parent.borrow().upgrade();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub(crate) fn clear(&self) {
        self.0.dirty.set(false);
    }

    pub(crate) fn attach_to(&self, parent: &InvalidationHandle) {
        *self.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
    }

    pub(crate) fn detach(&self) {
        *self.0.parent.borrow_mut() = Weak::new();
    }

    pub fn has_parent(&self) -> bool {
        self.0.parent.borrow().upgrade().is_some()
    }
}

impl Default for InvalidationHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
struct MeasureCacheEntry {
    available: Size,
    dont_stretch: bool,
    result: Size,
}

/// State shared by every element: geometry, layout inputs, the measure cache
/// and the invalidation link.
pub struct ElementCore {
    id: ElementId,
    parent_id: Option<ElementId>,
    position: Point,
    measured_size: Size,
    element_size: Size,
    desired_width: Option<f32>,
    desired_height: Option<f32>,
    margin: Margin,
    horizontal_alignment: HorizontalAlignment,
    vertical_alignment: VerticalAlignment,
    background: Option<Color>,
    corner_radius: f32,
    visible: bool,
    invalidation: InvalidationHandle,
    measure_cache: Option<MeasureCacheEntry>,
    measure_passes: u64,
    accessibility_label: Option<String>,
    accessibility_hint: Option<String>,
    context_menu: Option<ContextMenu>,
}

impl ElementCore {
    pub fn new() -> Self {
        Self {
            id: ElementId::next(),
            parent_id: None,
            position: Point::ZERO,
            measured_size: Size::ZERO,
            element_size: Size::ZERO,
            desired_width: None,
            desired_height: None,
            margin: Margin::ZERO,
            horizontal_alignment: HorizontalAlignment::default(),
            vertical_alignment: VerticalAlignment::default(),
            background: None,
            corner_radius: 0.0,
            visible: true,
            invalidation: InvalidationHandle::new(),
            measure_cache: None,
            measure_passes: 0,
            accessibility_label: None,
            accessibility_hint: None,
            context_menu: None,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn parent_id(&self) -> Option<ElementId> {
        self.parent_id
    }

    pub(crate) fn set_parent(&mut self, parent: Option<(ElementId, &InvalidationHandle)>) {
        match parent {
            Some((id, handle)) => {
                self.parent_id = Some(id);
                self.invalidation.attach_to(handle);
            }
            None => {
                self.parent_id = None;
                self.invalidation.detach();
            }
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Content size from the most recent measure pass, margins excluded.
    pub fn measured_size(&self) -> Size {
        self.measured_size
    }

    /// Final size. Set by measure and then narrowed or stretched by arrange.
    pub fn element_size(&self) -> Size {
        self.element_size
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.element_size)
    }

    pub fn invalidation(&self) -> &InvalidationHandle {
        &self.invalidation
    }

    pub fn invalidate_measure(&self) {
        self.invalidation.invalidate();
    }

    pub fn is_measure_dirty(&self) -> bool {
        self.invalidation.is_dirty()
    }

    /// How many times `measure_internal` actually ran for this element.
    pub fn measure_pass_count(&self) -> u64 {
        self.measure_passes
    }

    pub fn desired_size(&self) -> (Option<f32>, Option<f32>) {
        (self.desired_width, self.desired_height)
    }

    pub fn set_desired_size(&mut self, size: Option<Size>) {
        let (width, height) = match size {
            Some(size) => (Some(size.width), Some(size.height)),
            None => (None, None),
        };
        self.set_desired_width(width);
        self.set_desired_height(height);
    }

    pub fn set_desired_width(&mut self, width: Option<f32>) {
        let width = width.map(crate::geometry::non_negative);
        if self.desired_width != width {
            self.desired_width = width;
            self.invalidate_measure();
        }
    }

    pub fn set_desired_height(&mut self, height: Option<f32>) {
        let height = height.map(crate::geometry::non_negative);
        if self.desired_height != height {
            self.desired_height = height;
            self.invalidate_measure();
        }
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn set_margin(&mut self, margin: Margin) {
        if self.margin != margin {
            self.margin = margin;
            self.invalidate_measure();
        }
    }

    pub fn horizontal_alignment(&self) -> HorizontalAlignment {
        self.horizontal_alignment
    }

    pub fn set_horizontal_alignment(&mut self, alignment: HorizontalAlignment) {
        if self.horizontal_alignment != alignment {
            self.horizontal_alignment = alignment;
            self.invalidate_measure();
        }
    }

    pub fn vertical_alignment(&self) -> VerticalAlignment {
        self.vertical_alignment
    }

    pub fn set_vertical_alignment(&mut self, alignment: VerticalAlignment) {
        if self.vertical_alignment != alignment {
            self.vertical_alignment = alignment;
            self.invalidate_measure();
        }
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn set_background(&mut self, color: Option<Color>) {
        self.background = color;
    }

    pub fn corner_radius(&self) -> f32 {
        self.corner_radius
    }

    pub fn set_corner_radius(&mut self, radius: f32) {
        self.corner_radius = crate::geometry::non_negative(radius);
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.invalidate_measure();
        }
    }

    pub fn accessibility_label(&self) -> Option<&str> {
        self.accessibility_label.as_deref()
    }

    pub fn set_accessibility_label(&mut self, label: Option<String>) {
        self.accessibility_label = label;
    }

    pub fn accessibility_hint(&self) -> Option<&str> {
        self.accessibility_hint.as_deref()
    }

    pub fn set_accessibility_hint(&mut self, hint: Option<String>) {
        self.accessibility_hint = hint;
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.context_menu.as_ref()
    }

    pub fn set_context_menu(&mut self, menu: Option<ContextMenu>) {
        self.context_menu = menu;
    }

    pub(crate) fn cached_measure(&self, available: Size, dont_stretch: bool) -> Option<Size> {
        if self.invalidation.is_dirty() {
            return None;
        }
        let entry = self.measure_cache?;
        (entry.available == available && entry.dont_stretch == dont_stretch).then_some(entry.result)
    }

    pub(crate) fn store_measure(
        &mut self,
        available: Size,
        dont_stretch: bool,
        measured_size: Size,
        result: Size,
    ) {
        self.measured_size = measured_size;
        self.element_size = measured_size;
        self.measure_cache = Some(MeasureCacheEntry {
            available,
            dont_stretch,
            result,
        });
        self.invalidation.clear();
    }

    pub(crate) fn count_measure_pass(&mut self) {
        self.measure_passes += 1;
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    /// Positions this element inside `bounds` from its alignments and margin.
    ///
    /// Stretch axes take the full bounds minus margins; other axes keep the
    /// measured size. The resulting size never exceeds the slot.
    pub fn arrange_self(&mut self, bounds: Rect) -> Point {
        let margin = self.margin;
        let slot = bounds.size().shrink(margin);

        let width = match self.horizontal_alignment {
            HorizontalAlignment::Stretch if self.desired_width.is_none() => slot.width,
            _ => self.measured_size.width.min(slot.width),
        };
        let height = match self.vertical_alignment {
            VerticalAlignment::Stretch if self.desired_height.is_none() => slot.height,
            _ => self.measured_size.height.min(slot.height),
        };

        let x = match self.horizontal_alignment {
            HorizontalAlignment::Left | HorizontalAlignment::Stretch => bounds.x + margin.left,
            HorizontalAlignment::Right => bounds.right() - width - margin.right,
            HorizontalAlignment::Center => {
                bounds.x + (bounds.width - width) / 2.0 + (margin.left - margin.right) / 2.0
            }
        };
        let y = match self.vertical_alignment {
            VerticalAlignment::Top | VerticalAlignment::Stretch => bounds.y + margin.top,
            VerticalAlignment::Bottom => bounds.bottom() - height - margin.bottom,
            VerticalAlignment::Center => {
                bounds.y + (bounds.height - height) / 2.0 + (margin.top - margin.bottom) / 2.0
            }
        };

        self.position = Point::new(x, y);
        self.element_size = Size::new(width, height).clamp_non_negative();
        self.position
    }
}

impl Default for ElementCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ElementCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementCore")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("element_size", &self.element_size)
            .field("visible", &self.visible)
            .field("dirty", &self.invalidation.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_reaches_every_ancestor() {
        let root = InvalidationHandle::new();
        let middle = InvalidationHandle::new();
        let leaf = InvalidationHandle::new();
        middle.attach_to(&root);
        leaf.attach_to(&middle);
        root.clear();
        middle.clear();
        leaf.clear();

        leaf.invalidate();
        assert!(leaf.is_dirty());
        assert!(middle.is_dirty());
        assert!(root.is_dirty());
    }

    #[test]
    fn detached_handles_stop_propagating() {
        let root = InvalidationHandle::new();
        let leaf = InvalidationHandle::new();
        leaf.attach_to(&root);
        leaf.detach();
        root.clear();
        leaf.invalidate();
        assert!(!root.is_dirty());
    }

    #[test]
    fn dropped_parent_does_not_keep_links_alive() {
        let leaf = InvalidationHandle::new();
        {
            let root = InvalidationHandle::new();
            leaf.attach_to(&root);
            assert!(leaf.has_parent());
        }
        assert!(!leaf.has_parent());
        leaf.invalidate();
    }

    fn core_with_size(width: f32, height: f32) -> ElementCore {
        let mut core = ElementCore::new();
        core.measured_size = Size::new(width, height);
        core
    }

    #[test]
    fn center_alignment_skews_by_half_the_margin_difference() {
        let mut core = core_with_size(20.0, 10.0);
        core.set_horizontal_alignment(HorizontalAlignment::Center);
        core.set_vertical_alignment(VerticalAlignment::Top);
        core.set_margin(Margin::new(10.0, 0.0, 0.0, 0.0));
        let position = core.arrange_self(Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(position, Point::new(45.0, 0.0));
    }

    #[test]
    fn right_and_bottom_subtract_the_opposing_margin() {
        let mut core = core_with_size(20.0, 10.0);
        core.set_horizontal_alignment(HorizontalAlignment::Right);
        core.set_vertical_alignment(VerticalAlignment::Bottom);
        core.set_margin(Margin::uniform(5.0));
        let position = core.arrange_self(Rect::new(10.0, 10.0, 100.0, 50.0));
        assert_eq!(position, Point::new(85.0, 45.0));
    }

    #[test]
    fn stretch_fills_the_slot_minus_margin() {
        let mut core = core_with_size(20.0, 10.0);
        core.set_margin(Margin::uniform(4.0));
        core.arrange_self(Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(core.bounds(), Rect::new(4.0, 4.0, 92.0, 42.0));
    }

    #[test]
    fn cache_is_bypassed_while_dirty() {
        let mut core = ElementCore::new();
        core.store_measure(Size::new(10.0, 10.0), false, Size::ZERO, Size::ZERO);
        assert_eq!(core.cached_measure(Size::new(10.0, 10.0), false), Some(Size::ZERO));
        assert_eq!(core.cached_measure(Size::new(11.0, 10.0), false), None);
        core.invalidate_measure();
        assert_eq!(core.cached_measure(Size::new(10.0, 10.0), false), None);
    }
}
