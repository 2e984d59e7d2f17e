use std::any::Any;

use crate::geometry::{Margin, Point, Rect, Size};
use crate::render::Canvas;
use crate::ui::AccessibilityRole;

use super::{ElementCore, ElementId, UiElement};

/// An ordered, owning child list. Order is render, hit-test and tab order.
///
/// Every structural change relinks the child's invalidation handle to the
/// owner and invalidates the owner.
#[derive(Default)]
pub struct LayoutChildren {
    items: Vec<Box<dyn UiElement>>,
}

impl LayoutChildren {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, owner: &ElementCore, child: Box<dyn UiElement>) {
        let index = self.items.len();
        self.insert(owner, index, child);
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert(&mut self, owner: &ElementCore, index: usize, mut child: Box<dyn UiElement>) {
        child
            .core_mut()
            .set_parent(Some((owner.id(), owner.invalidation())));
        let index = index.min(self.items.len());
        self.items.insert(index, child);
        owner.invalidate_measure();
    }

    pub fn remove(&mut self, owner: &ElementCore, id: ElementId) -> Option<Box<dyn UiElement>> {
        let index = self.items.iter().position(|child| child.core().id() == id)?;
        let mut child = self.items.remove(index);
        child.core_mut().set_parent(None);
        owner.invalidate_measure();
        Some(child)
    }

    /// Removes and disposes every child.
    pub fn clear(&mut self, owner: &ElementCore) {
        if self.items.is_empty() {
            return;
        }
        for mut child in self.items.drain(..) {
            child.core_mut().set_parent(None);
            child.dispose();
        }
        owner.invalidate_measure();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn UiElement> {
        self.items.get(index).map(|child| child.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn UiElement> {
        self.items.iter().map(|child| child.as_ref())
    }

    pub fn as_slice(&self) -> &[Box<dyn UiElement>] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [Box<dyn UiElement>] {
        &mut self.items
    }
}

/// Elements that own a [`LayoutChildren`] list.
pub trait UiLayoutElement: UiElement {
    fn parts_mut(&mut self) -> (&mut ElementCore, &mut LayoutChildren);

    fn add_child(&mut self, child: Box<dyn UiElement>) {
        let (core, children) = self.parts_mut();
        children.push(core, child);
    }

    fn insert_child(&mut self, index: usize, child: Box<dyn UiElement>) {
        let (core, children) = self.parts_mut();
        children.insert(core, index, child);
    }

    fn remove_child(&mut self, id: ElementId) -> Option<Box<dyn UiElement>> {
        let (core, children) = self.parts_mut();
        children.remove(core, id)
    }

    fn clear_children(&mut self) {
        let (core, children) = self.parts_mut();
        children.clear(core);
    }
}

/// Fluent child insertion for containers.
pub trait LayoutBuilder: UiLayoutElement + Sized {
    fn with_child(mut self, child: impl UiElement) -> Self {
        self.add_child(Box::new(child));
        self
    }
}

impl<T: UiLayoutElement + Sized> LayoutBuilder for T {}

/// Containers are hit only through their children unless they paint a
/// background or carry a context menu.
fn hit_test_container(
    core: &ElementCore,
    children: &mut LayoutChildren,
    point: Point,
) -> Option<ElementId> {
    if !core.is_visible() {
        return None;
    }
    for child in children.as_mut_slice().iter_mut().rev() {
        if let Some(id) = child.hit_test(point) {
            return Some(id);
        }
    }
    let hittable = core.background().is_some() || core.context_menu().is_some();
    (hittable && core.bounds().contains(point)).then(|| core.id())
}

fn render_children(children: &mut LayoutChildren, canvas: &mut dyn Canvas) {
    for child in children.as_mut_slice() {
        child.render(canvas);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

/// Stacks children along one axis.
pub struct StackPanel {
    core: ElementCore,
    children: LayoutChildren,
    orientation: Orientation,
    spacing: f32,
    padding: Margin,
}

impl StackPanel {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            core: ElementCore::new(),
            children: LayoutChildren::new(),
            orientation,
            spacing: 0.0,
            padding: Margin::ZERO,
        }
    }

    pub fn vertical() -> Self {
        Self::new(Orientation::Vertical)
    }

    pub fn horizontal() -> Self {
        Self::new(Orientation::Horizontal)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        if self.orientation != orientation {
            self.orientation = orientation;
            self.core.invalidate_measure();
        }
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn set_spacing(&mut self, spacing: f32) {
        let spacing = crate::geometry::non_negative(spacing);
        if self.spacing != spacing {
            self.spacing = spacing;
            self.core.invalidate_measure();
        }
    }

    pub fn set_padding(&mut self, padding: Margin) {
        if self.padding != padding {
            self.padding = padding;
            self.core.invalidate_measure();
        }
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.set_spacing(spacing);
        self
    }

    pub fn with_padding(mut self, padding: Margin) -> Self {
        self.set_padding(padding);
        self
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

impl UiElement for StackPanel {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
        let content = available.shrink(self.padding);
        let mut along = 0.0_f32;
        let mut across = 0.0_f32;
        let mut visible = 0usize;

        for child in self.children.as_mut_slice() {
            if !child.core().is_visible() {
                continue;
            }
            let gap = if visible > 0 { self.spacing } else { 0.0 };
            match self.orientation {
                Orientation::Vertical => {
                    let remaining = (content.height - along - gap).max(0.0);
                    let size = child.measure_with(Size::new(content.width, remaining), true);
                    along += gap + size.height;
                    across = across.max(size.width);
                }
                Orientation::Horizontal => {
                    let remaining = (content.width - along - gap).max(0.0);
                    let size = child.measure_with(Size::new(remaining, content.height), true);
                    along += gap + size.width;
                    across = across.max(size.height);
                }
            }
            visible += 1;
        }

        let size = match self.orientation {
            Orientation::Vertical => Size::new(across, along),
            Orientation::Horizontal => Size::new(along, across),
        };
        size.grow(self.padding).min(available)
    }

    fn arrange_internal(&mut self, bounds: Rect) -> Point {
        let position = self.core.arrange_self(bounds);
        let content = self.core.bounds().deflate(self.padding);
        let mut cursor = 0.0_f32;
        let mut first = true;

        for child in self.children.as_mut_slice() {
            if !child.core().is_visible() {
                continue;
            }
            if !first {
                cursor += self.spacing;
            }
            first = false;
            let measured = child.measure_with(
                match self.orientation {
                    Orientation::Vertical => {
                        Size::new(content.width, (content.height - cursor).max(0.0))
                    }
                    Orientation::Horizontal => {
                        Size::new((content.width - cursor).max(0.0), content.height)
                    }
                },
                true,
            );
            let slot = match self.orientation {
                Orientation::Vertical => {
                    Rect::new(content.x, content.y + cursor, content.width, measured.height)
                }
                Orientation::Horizontal => {
                    Rect::new(content.x + cursor, content.y, measured.width, content.height)
                }
            };
            child.arrange(slot);
            cursor += match self.orientation {
                Orientation::Vertical => measured.height,
                Orientation::Horizontal => measured.width,
            };
        }
        position
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        render_children(&mut self.children, canvas);
    }

    fn children(&self) -> Option<&[Box<dyn UiElement>]> {
        Some(self.children.as_slice())
    }

    fn children_mut(&mut self) -> Option<&mut [Box<dyn UiElement>]> {
        Some(self.children.as_mut_slice())
    }

    fn hit_test(&mut self, point: Point) -> Option<ElementId> {
        hit_test_container(&self.core, &mut self.children, point)
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::Container
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl UiLayoutElement for StackPanel {
    fn parts_mut(&mut self) -> (&mut ElementCore, &mut LayoutChildren) {
        (&mut self.core, &mut self.children)
    }
}

/// Overlapping children, each arranged in the full content rect.
pub struct Panel {
    core: ElementCore,
    children: LayoutChildren,
    padding: Margin,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            core: ElementCore::new(),
            children: LayoutChildren::new(),
            padding: Margin::ZERO,
        }
    }

    pub fn set_padding(&mut self, padding: Margin) {
        if self.padding != padding {
            self.padding = padding;
            self.core.invalidate_measure();
        }
    }

    pub fn with_padding(mut self, padding: Margin) -> Self {
        self.set_padding(padding);
        self
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}

impl UiElement for Panel {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, dont_stretch: bool) -> Size {
        let content = available.shrink(self.padding);
        let mut size = Size::ZERO;
        for child in self.children.as_mut_slice() {
            size = size.max(child.measure_with(content, dont_stretch));
        }
        size.grow(self.padding).min(available)
    }

    fn arrange_internal(&mut self, bounds: Rect) -> Point {
        let position = self.core.arrange_self(bounds);
        let content = self.core.bounds().deflate(self.padding);
        for child in self.children.as_mut_slice() {
            child.arrange(content);
        }
        position
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        render_children(&mut self.children, canvas);
    }

    fn children(&self) -> Option<&[Box<dyn UiElement>]> {
        Some(self.children.as_slice())
    }

    fn children_mut(&mut self) -> Option<&mut [Box<dyn UiElement>]> {
        Some(self.children.as_mut_slice())
    }

    fn hit_test(&mut self, point: Point) -> Option<ElementId> {
        hit_test_container(&self.core, &mut self.children, point)
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::Container
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl UiLayoutElement for Panel {
    fn parts_mut(&mut self) -> (&mut ElementCore, &mut LayoutChildren) {
        (&mut self.core, &mut self.children)
    }
}
