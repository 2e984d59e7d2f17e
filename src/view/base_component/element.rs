use std::any::Any;

use crate::geometry::{Margin, Point, Rect, Size};
use crate::render::Canvas;
use crate::style::{Color, HorizontalAlignment, VerticalAlignment};
use crate::ui::{AccessibilityRole, AccessibilityTraits, Key, KeyModifiers, PointerEvent};
use crate::view::overlay::ContextMenu;
use crate::view::viewport::UiControl;

use super::{ElementCore, ElementId};

/// The measure/arrange/render/hit-test protocol every element implements.
///
/// Implementors provide [`UiElement::measure_internal`] and whichever hooks
/// they need; the provided [`UiElement::measure`], [`UiElement::arrange`] and
/// [`UiElement::render`] wrap them with caching, margins, alignment,
/// visibility and background drawing, and should not be overridden.
pub trait UiElement: Any {
    fn core(&self) -> &ElementCore;
    fn core_mut(&mut self) -> &mut ElementCore;

    /// Content size for `available` (margins already removed). Must not exceed
    /// `available`; larger results are clamped.
    fn measure_internal(&mut self, available: Size, dont_stretch: bool) -> Size;

    fn arrange_internal(&mut self, bounds: Rect) -> Point {
        self.core_mut().arrange_self(bounds)
    }

    fn render_internal(&mut self, _canvas: &mut dyn Canvas) {}

    fn children(&self) -> Option<&[Box<dyn UiElement>]> {
        None
    }

    fn children_mut(&mut self) -> Option<&mut [Box<dyn UiElement>]> {
        None
    }

    /// Most specific element under `point`. Controls with sub-regions update
    /// their hover state here and must clear it when nothing is hit.
    fn hit_test(&mut self, point: Point) -> Option<ElementId> {
        if !self.core().is_visible() {
            return None;
        }
        if let Some(children) = self.children_mut() {
            for child in children.iter_mut().rev() {
                if let Some(id) = child.hit_test(point) {
                    return Some(id);
                }
            }
        }
        self.core().bounds().contains(point).then(|| self.core().id())
    }

    fn is_focusable(&self) -> bool {
        false
    }

    fn on_pointer_pressed(&mut self, _event: &PointerEvent, _control: &mut UiControl<'_>) -> bool {
        false
    }

    fn on_pointer_moved(&mut self, _position: Point, _control: &mut UiControl<'_>) -> bool {
        false
    }

    fn on_key_pressed(
        &mut self,
        _key: Key,
        _modifiers: KeyModifiers,
        _control: &mut UiControl<'_>,
    ) -> bool {
        false
    }

    fn on_text_input(&mut self, _text: &str, _control: &mut UiControl<'_>) -> bool {
        false
    }

    fn on_focus_changed(&mut self, _focused: bool) {}

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::None
    }

    fn computed_accessibility_label(&self) -> Option<String> {
        self.core().accessibility_label().map(str::to_string)
    }

    fn computed_accessibility_value(&self) -> Option<String> {
        None
    }

    fn computed_accessibility_traits(&self) -> AccessibilityTraits {
        let mut traits = AccessibilityTraits::empty();
        if !self.core().is_visible() {
            traits |= AccessibilityTraits::HIDDEN;
        }
        if self.is_focusable() {
            traits |= AccessibilityTraits::FOCUSABLE;
        }
        traits
    }

    /// Runs registered property bindings, then recurses. Returns the number of
    /// binding actions evaluated.
    fn refresh_bindings(&mut self) -> usize {
        let mut applied = 0;
        if let Some(children) = self.children_mut() {
            for child in children.iter_mut() {
                applied += child.refresh_bindings();
            }
        }
        applied
    }

    fn dispose(&mut self) {
        if let Some(children) = self.children_mut() {
            for child in children.iter_mut() {
                child.dispose();
            }
        }
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn measure(&mut self, available: Size) -> Size {
        self.measure_with(available, false)
    }

    /// Cached while not dirty and called with the same inputs. The result
    /// includes margins and never exceeds `available`.
    fn measure_with(&mut self, available: Size, dont_stretch: bool) -> Size {
        let available = available.clamp_non_negative();
        if let Some(size) = self.core().cached_measure(available, dont_stretch) {
            return size;
        }

        let core = self.core();
        let visible = core.is_visible();
        let margin = core.margin();
        let inner = available.shrink(margin);
        let content = if !visible {
            Size::ZERO
        } else {
            match core.desired_size() {
                (Some(width), Some(height)) => Size::new(width, height).min(inner),
                (desired_width, desired_height) => {
                    let constrained = Size::new(
                        desired_width.map_or(inner.width, |w| w.min(inner.width)),
                        desired_height.map_or(inner.height, |h| h.min(inner.height)),
                    );
                    let horizontal = core.horizontal_alignment();
                    let vertical = core.vertical_alignment();
                    let mut size = self.measure_internal(constrained, dont_stretch);
                    self.core_mut().count_measure_pass();
                    if let Some(width) = desired_width {
                        size.width = width;
                    } else if !dont_stretch
                        && horizontal == HorizontalAlignment::Stretch
                        && inner.width.is_finite()
                    {
                        size.width = inner.width;
                    }
                    if let Some(height) = desired_height {
                        size.height = height;
                    } else if !dont_stretch
                        && vertical == VerticalAlignment::Stretch
                        && inner.height.is_finite()
                    {
                        size.height = inner.height;
                    }
                    size.clamp_non_negative().min(inner)
                }
            }
        };

        let result = if visible {
            content.grow(margin).min(available)
        } else {
            Size::ZERO
        };
        tracing::trace!(
            id = %self.core().id(),
            width = result.width,
            height = result.height,
            "measured"
        );
        self.core_mut()
            .store_measure(available, dont_stretch, content, result);
        result
    }

    fn arrange(&mut self, bounds: Rect) -> Point {
        let position = self.arrange_internal(bounds);
        tracing::trace!(id = %self.core().id(), x = position.x, y = position.y, "arranged");
        position
    }

    fn render(&mut self, canvas: &mut dyn Canvas) {
        if !self.core().is_visible() {
            return;
        }
        let core = self.core();
        if let Some(color) = core.background().filter(|color| !color.is_transparent()) {
            if core.corner_radius() > 0.0 {
                canvas.draw_round_rect(core.bounds(), core.corner_radius(), color);
            } else {
                canvas.draw_rect(core.bounds(), color);
            }
        }
        self.render_internal(canvas);
    }
}

/// Fluent setters shared by every element.
pub trait ElementBuilder: UiElement + Sized {
    fn with_margin(mut self, margin: Margin) -> Self {
        self.core_mut().set_margin(margin);
        self
    }

    fn with_background(mut self, color: Color) -> Self {
        self.core_mut().set_background(Some(color));
        self
    }

    fn with_corner_radius(mut self, radius: f32) -> Self {
        self.core_mut().set_corner_radius(radius);
        self
    }

    fn with_desired_size(mut self, width: f32, height: f32) -> Self {
        self.core_mut().set_desired_size(Some(Size::new(width, height)));
        self
    }

    fn with_desired_width(mut self, width: f32) -> Self {
        self.core_mut().set_desired_width(Some(width));
        self
    }

    fn with_desired_height(mut self, height: f32) -> Self {
        self.core_mut().set_desired_height(Some(height));
        self
    }

    fn with_alignment(mut self, horizontal: HorizontalAlignment, vertical: VerticalAlignment) -> Self {
        let core = self.core_mut();
        core.set_horizontal_alignment(horizontal);
        core.set_vertical_alignment(vertical);
        self
    }

    fn with_visible(mut self, visible: bool) -> Self {
        self.core_mut().set_visible(visible);
        self
    }

    fn with_accessibility_label(mut self, label: impl Into<String>) -> Self {
        self.core_mut().set_accessibility_label(Some(label.into()));
        self
    }

    fn with_context_menu(mut self, menu: ContextMenu) -> Self {
        self.core_mut().set_context_menu(Some(menu));
        self
    }

    fn boxed(self) -> Box<dyn UiElement> {
        Box::new(self)
    }
}

impl<T: UiElement + Sized> ElementBuilder for T {}
