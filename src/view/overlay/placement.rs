//! Window-aware placement for floating surfaces.

use crate::geometry::{Point, Rect, Size};

/// Where a popup wants to open, and the edges it flips to when the preferred
/// position would overflow the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupAnchor {
    /// Preferred top-left corner.
    pub origin: Point,
    /// Right edge used when opening leftward, bottom edge when opening upward.
    pub flip: Point,
}

impl PopupAnchor {
    /// Opens at `point`, flipping up/left around the same point.
    pub fn at(point: Point) -> Self {
        Self {
            origin: point,
            flip: point,
        }
    }

    /// Opens under `rect`, flipping above it and right-aligning with it.
    pub fn below(rect: Rect) -> Self {
        Self {
            origin: Point::new(rect.x, rect.bottom()),
            flip: Point::new(rect.right(), rect.y),
        }
    }

    /// Opens to the right of a menu row, overlapping it by `overlap`. Flips to
    /// the left side of the parent menu whose left edge is `parent_left`.
    pub fn beside(row: Rect, parent_left: f32, overlap: f32) -> Self {
        Self {
            origin: Point::new(row.right() - overlap, row.y),
            flip: Point::new(parent_left + overlap, row.bottom()),
        }
    }
}

fn place_axis(start: f32, extent: f32, flip_end: f32, low: f32, high: f32) -> f32 {
    let mut position = start;
    if position + extent > high {
        let flipped = flip_end - extent;
        if flipped >= low {
            position = flipped;
        }
    }
    position.min(high - extent).max(low)
}

/// Top-left corner for a popup of `size` so that it stays `margin` pixels
/// inside `window`. Flips first; clamps when flipping does not help. A popup
/// larger than the window is pinned to the top-left margin.
pub fn clamp_to_window(anchor: PopupAnchor, size: Size, window: Rect, margin: f32) -> Point {
    let x = place_axis(
        anchor.origin.x,
        size.width,
        anchor.flip.x,
        window.x + margin,
        window.right() - margin,
    );
    let y = place_axis(
        anchor.origin.y,
        size.height,
        anchor.flip.y,
        window.y + margin,
        window.bottom() - margin,
    );
    Point::new(x, y)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropdownPlacement {
    pub rect: Rect,
    pub opens_upward: bool,
}

/// Places a list under (or above) `anchor`. Height is
/// `min(item_count * item_height, max_height)`; the list opens upward only
/// when the space below is too small and the space above is larger.
pub fn place_dropdown(
    anchor: Rect,
    item_count: usize,
    item_height: f32,
    max_height: f32,
    window: Rect,
    margin: f32,
) -> DropdownPlacement {
    let height = (item_count as f32 * item_height).min(max_height).max(0.0);
    let space_below = window.bottom() - margin - anchor.bottom();
    let space_above = anchor.y - (window.y + margin);
    let opens_upward = space_below < height && space_above > space_below;

    let y = if opens_upward {
        anchor.y - height
    } else {
        anchor.bottom()
    };
    let x = anchor
        .x
        .min(window.right() - margin - anchor.width)
        .max(window.x + margin);
    DropdownPlacement {
        rect: Rect::new(x, y, anchor.width, height),
        opens_upward,
    }
}

/// First visible row so that `highlighted` stays inside a window of
/// `visible` rows.
pub fn clamp_scroll_start(
    start: usize,
    highlighted: Option<usize>,
    visible: usize,
    count: usize,
) -> usize {
    if visible == 0 || count <= visible {
        return 0;
    }
    let max_start = count - visible;
    let mut start = start.min(max_start);
    if let Some(highlighted) = highlighted.filter(|index| *index < count) {
        if highlighted < start {
            start = highlighted;
        } else if highlighted >= start + visible {
            start = highlighted + 1 - visible;
        }
    }
    start.min(max_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    #[test]
    fn menu_near_the_right_edge_stays_inside() {
        let origin = clamp_to_window(
            PopupAnchor::at(Point::new(750.0, 100.0)),
            Size::new(200.0, 100.0),
            WINDOW,
            4.0,
        );
        assert!(origin.x + 200.0 <= 796.0);
        assert_eq!(origin, Point::new(550.0, 100.0));
    }

    #[test]
    fn clamps_when_flipping_would_leave_the_window() {
        let origin = clamp_to_window(
            PopupAnchor::at(Point::new(150.0, 590.0)),
            Size::new(200.0, 700.0),
            WINDOW,
            4.0,
        );
        assert_eq!(origin, Point::new(150.0, 4.0));
    }

    #[test]
    fn submenus_flip_to_the_left_of_the_parent() {
        let row = Rect::new(600.0, 40.0, 180.0, 32.0);
        let origin = clamp_to_window(
            PopupAnchor::beside(row, 600.0, 4.0),
            Size::new(160.0, 64.0),
            WINDOW,
            4.0,
        );
        assert_eq!(origin, Point::new(444.0, 40.0));
    }

    #[test]
    fn dropdown_opens_downward_by_default() {
        let anchor = Rect::new(10.0, 50.0, 120.0, 30.0);
        let placement = place_dropdown(anchor, 20, 32.0, 300.0, WINDOW, 4.0);
        assert!(!placement.opens_upward);
        assert_eq!(placement.rect, Rect::new(10.0, 80.0, 120.0, 300.0));
    }

    #[test]
    fn dropdown_flips_when_below_is_short_and_above_is_larger() {
        let anchor = Rect::new(10.0, 500.0, 120.0, 30.0);
        let placement = place_dropdown(anchor, 5, 32.0, 300.0, WINDOW, 4.0);
        assert!(placement.opens_upward);
        assert_eq!(placement.rect.bottom(), 500.0);
        assert_eq!(placement.rect.height, 160.0);
    }

    #[test]
    fn dropdown_stays_down_when_above_is_not_larger() {
        let window = Rect::new(0.0, 0.0, 800.0, 100.0);
        let anchor = Rect::new(10.0, 30.0, 120.0, 30.0);
        let placement = place_dropdown(anchor, 5, 32.0, 300.0, window, 4.0);
        assert!(!placement.opens_upward);
    }

    #[test]
    fn scroll_start_follows_the_highlight() {
        assert_eq!(clamp_scroll_start(0, Some(12), 5, 20), 8);
        assert_eq!(clamp_scroll_start(8, Some(3), 5, 20), 3);
        assert_eq!(clamp_scroll_start(8, Some(9), 5, 20), 8);
        assert_eq!(clamp_scroll_start(30, None, 5, 20), 15);
        assert_eq!(clamp_scroll_start(4, Some(2), 10, 6), 0);
    }
}
