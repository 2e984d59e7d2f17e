use crate::geometry::Point;
use crate::ui::{Key, KeyModifiers, MouseButton, PointerEvent};
use crate::view::viewport::UiControl;

mod core;
mod element;
mod layout;
mod rich_text;
mod text;

pub use core::*;
pub use element::*;
pub use layout::*;
pub use rich_text::*;
pub use text::*;

pub fn hit_test(root: &mut dyn UiElement, point: Point) -> Option<ElementId> {
    root.hit_test(point)
}

pub fn find_element(root: &dyn UiElement, id: ElementId) -> Option<&dyn UiElement> {
    if root.core().id() == id {
        return Some(root);
    }
    root.children()?
        .iter()
        .find_map(|child| find_element(child.as_ref(), id))
}

pub fn find_element_mut(root: &mut dyn UiElement, id: ElementId) -> Option<&mut dyn UiElement> {
    if root.core().id() == id {
        return Some(root);
    }
    for child in root.children_mut()?.iter_mut() {
        if let Some(found) = find_element_mut(child.as_mut(), id) {
            return Some(found);
        }
    }
    None
}

/// Visible focusable elements in tree order.
pub fn focus_order(root: &dyn UiElement) -> Vec<ElementId> {
    fn walk(node: &dyn UiElement, out: &mut Vec<ElementId>) {
        if !node.core().is_visible() {
            return;
        }
        if node.is_focusable() {
            out.push(node.core().id());
        }
        if let Some(children) = node.children() {
            for child in children {
                walk(child.as_ref(), out);
            }
        }
    }

    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

/// Delivers a press to `target_id`, then to each ancestor until one handles
/// it. An unhandled secondary press opens the nearest attached context menu.
pub fn dispatch_pointer_pressed(
    root: &mut dyn UiElement,
    target_id: ElementId,
    event: &PointerEvent,
    control: &mut UiControl<'_>,
) -> bool {
    bubble(root, target_id, &mut |node| {
        if node.on_pointer_pressed(event, control) {
            return true;
        }
        if event.button != MouseButton::Right {
            return false;
        }
        match node.core().context_menu() {
            Some(menu) => {
                menu.open_at(event.position, control);
                true
            }
            None => false,
        }
    })
    .1
}

pub fn dispatch_pointer_moved(
    root: &mut dyn UiElement,
    target_id: ElementId,
    position: Point,
    control: &mut UiControl<'_>,
) -> bool {
    bubble(root, target_id, &mut |node| node.on_pointer_moved(position, control)).1
}

pub fn dispatch_key_pressed(
    root: &mut dyn UiElement,
    target_id: ElementId,
    key: Key,
    modifiers: KeyModifiers,
    control: &mut UiControl<'_>,
) -> bool {
    bubble(root, target_id, &mut |node| {
        node.on_key_pressed(key, modifiers, control)
    })
    .1
}

pub fn dispatch_text_input(
    root: &mut dyn UiElement,
    target_id: ElementId,
    text: &str,
    control: &mut UiControl<'_>,
) -> bool {
    bubble(root, target_id, &mut |node| node.on_text_input(text, control)).1
}

/// Returns `(found, handled)`.
fn bubble(
    node: &mut dyn UiElement,
    target_id: ElementId,
    handler: &mut dyn FnMut(&mut dyn UiElement) -> bool,
) -> (bool, bool) {
    let mut found = node.core().id() == target_id;

    if !found {
        if let Some(children) = node.children_mut() {
            for child in children.iter_mut().rev() {
                let (child_found, handled) = bubble(child.as_mut(), target_id, handler);
                if child_found {
                    if handled {
                        return (true, true);
                    }
                    found = true;
                    break;
                }
            }
        }
    }

    if !found {
        return (false, false);
    }
    (true, handler(node))
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::geometry::{Margin, Rect, Size};
    use crate::style::{Color, HorizontalAlignment, VerticalAlignment};

    struct Fixed {
        core: ElementCore,
        size: Size,
        presses: Rc<Cell<u32>>,
        consume: bool,
        focusable: bool,
    }

    impl Fixed {
        fn new(width: f32, height: f32) -> Self {
            Self {
                core: ElementCore::new(),
                size: Size::new(width, height),
                presses: Rc::new(Cell::new(0)),
                consume: false,
                focusable: false,
            }
        }

        fn set_size(&mut self, width: f32, height: f32) {
            self.size = Size::new(width, height);
            self.core.invalidate_measure();
        }
    }

    impl UiElement for Fixed {
        fn core(&self) -> &ElementCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ElementCore {
            &mut self.core
        }

        fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
            self.size.min(available)
        }

        fn is_focusable(&self) -> bool {
            self.focusable
        }

        fn on_pointer_pressed(&mut self, _event: &PointerEvent, _control: &mut UiControl<'_>) -> bool {
            self.presses.set(self.presses.get() + 1);
            self.consume
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn top_left<T: UiElement>(element: T) -> T {
        element.with_alignment(HorizontalAlignment::Left, VerticalAlignment::Top)
    }

    #[test]
    fn vertical_stack_sums_heights_with_spacing() {
        let mut stack = top_left(StackPanel::vertical().with_spacing(5.0))
            .with_child(top_left(Fixed::new(30.0, 10.0)))
            .with_child(top_left(Fixed::new(50.0, 20.0)));
        let size = stack.measure(Size::new(200.0, 200.0));
        assert_eq!(size, Size::new(50.0, 35.0));

        stack.arrange(Rect::new(0.0, 0.0, 200.0, 200.0));
        let Some(children) = stack.children() else {
            panic!("stack has children");
        };
        assert_eq!(children[1].core().bounds(), Rect::new(0.0, 15.0, 50.0, 20.0));
    }

    #[test]
    fn horizontal_stack_respects_padding_and_margin() {
        let mut stack = top_left(StackPanel::horizontal().with_padding(Margin::uniform(2.0)))
            .with_child(top_left(Fixed::new(10.0, 10.0)).with_margin(Margin::uniform(1.0)))
            .with_child(top_left(Fixed::new(10.0, 30.0)));
        let size = stack.measure(Size::new(200.0, 200.0));
        assert_eq!(size, Size::new(26.0, 34.0));
        stack.arrange(Rect::new(0.0, 0.0, 200.0, 200.0));
        let Some(children) = stack.children() else {
            panic!("stack has children");
        };
        assert_eq!(children[0].core().position(), Point::new(3.0, 3.0));
        assert_eq!(children[1].core().position(), Point::new(14.0, 2.0));
    }

    #[test]
    fn measure_never_exceeds_available() {
        let mut stack = StackPanel::vertical()
            .with_child(Fixed::new(500.0, 500.0))
            .with_child(Fixed::new(10.0, 900.0));
        for available in [Size::new(0.0, 0.0), Size::new(40.0, 1000.0), Size::new(-5.0, 7.0)] {
            let size = stack.measure(available);
            let available = available.clamp_non_negative();
            assert!(size.width <= available.width);
            assert!(size.height <= available.height);
        }
    }

    #[test]
    fn desired_size_overrides_measure_internal() {
        let mut element = Fixed::new(10.0, 10.0).with_desired_size(100.0, 40.0);
        assert_eq!(element.measure(Size::new(80.0, 80.0)), Size::new(80.0, 40.0));
        assert_eq!(element.core().measure_pass_count(), 0);
    }

    #[test]
    fn invisible_elements_measure_to_zero() {
        let mut element = Fixed::new(10.0, 10.0).with_margin(Margin::uniform(3.0));
        element.core_mut().set_visible(false);
        assert_eq!(element.measure(Size::new(80.0, 80.0)), Size::ZERO);
    }

    #[test]
    fn deep_change_forces_root_remeasure() {
        let leaf = Fixed::new(10.0, 10.0);
        let leaf_id = leaf.core().id();
        let mut root = top_left(StackPanel::vertical()).with_child(
            StackPanel::vertical().with_child(StackPanel::vertical().with_child(leaf)),
        );
        let available = Size::new(100.0, 100.0);
        let first = root.measure(available);
        assert_eq!(root.measure(available), first);
        assert_eq!(root.core().measure_pass_count(), 1);

        let Some(leaf) = find_element_mut(&mut root, leaf_id)
            .and_then(|node| node.as_any_mut().downcast_mut::<Fixed>())
        else {
            panic!("leaf not found");
        };
        leaf.set_size(10.0, 60.0);
        let second = root.measure(available);
        assert_eq!(root.core().measure_pass_count(), 2);
        assert_ne!(first, second);
    }

    #[test]
    fn removed_children_no_longer_invalidate_the_parent() {
        let child = Fixed::new(10.0, 10.0);
        let child_id = child.core().id();
        let mut panel = Panel::new().with_child(child);
        assert_eq!(panel.children().map(<[_]>::len), Some(1));
        let Some(mut removed) = panel.remove_child(child_id) else {
            panic!("child should be removable");
        };
        assert_eq!(removed.core().parent_id(), None);
        panel.measure(Size::new(50.0, 50.0));
        removed.core().invalidate_measure();
        assert!(!panel.core().is_measure_dirty());
        removed.dispose();
    }

    #[test]
    fn hit_test_prefers_the_topmost_child() {
        let mut panel = Panel::new()
            .with_child(Fixed::new(50.0, 50.0))
            .with_child(top_left(Fixed::new(20.0, 20.0)));
        let top_id = panel.children().map(|c| c[1].core().id());
        panel.measure(Size::new(100.0, 100.0));
        panel.arrange(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(hit_test(&mut panel, Point::new(5.0, 5.0)), top_id);
        let under = panel.children().map(|c| c[0].core().id());
        assert_eq!(hit_test(&mut panel, Point::new(60.0, 60.0)), under);
    }

    #[test]
    fn transparent_containers_are_not_hit() {
        let mut panel = Panel::new();
        panel.measure(Size::new(100.0, 100.0));
        panel.arrange(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(hit_test(&mut panel, Point::new(5.0, 5.0)), None);
        panel.core_mut().set_background(Some(Color::WHITE));
        assert_eq!(hit_test(&mut panel, Point::new(5.0, 5.0)), Some(panel.core().id()));
    }

    #[test]
    fn presses_bubble_until_handled() {
        let mut inner = Fixed::new(10.0, 10.0);
        let inner_presses = Rc::clone(&inner.presses);
        inner.consume = false;
        let inner_id = inner.core().id();
        let mut outer = Fixed::new(10.0, 10.0);
        outer.consume = true;
        let outer_presses = Rc::clone(&outer.presses);
        let mut root = StackPanel::vertical()
            .with_child(StackPanel::vertical().with_child(inner))
            .with_child(outer);

        let mut control = UiControl::new(None, Rect::new(0.0, 0.0, 100.0, 100.0));
        let handled = dispatch_pointer_pressed(
            &mut root,
            inner_id,
            &PointerEvent::left(1.0, 1.0),
            &mut control,
        );
        assert!(!handled);
        assert_eq!(inner_presses.get(), 1);
        assert_eq!(outer_presses.get(), 0);
    }

    #[test]
    fn focus_order_follows_tree_order() {
        let mut a = Fixed::new(1.0, 1.0);
        a.focusable = true;
        let mut hidden = Fixed::new(1.0, 1.0);
        hidden.focusable = true;
        hidden.core_mut().set_visible(false);
        let mut b = Fixed::new(1.0, 1.0);
        b.focusable = true;
        let ids = vec![a.core().id(), b.core().id()];
        let root = StackPanel::vertical()
            .with_child(StackPanel::vertical().with_child(a).with_child(hidden))
            .with_child(b);
        assert_eq!(focus_order(&root), ids);
    }
}
