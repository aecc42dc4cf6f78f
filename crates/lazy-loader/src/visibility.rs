//! Visibility geometry
//!
//! A child is visible when its box overlaps the area its parent currently
//! shows. For the window that area is the viewport. For any other parent it
//! is the parent's box with the parts outside the window cut away. The
//! area is then grown (or shrunk) by the child's preload ratio so content
//! can start loading before it actually scrolls in.

use lazy_dom::Rect;

/// Area a child must overlap to count as visible.
///
/// `parent` is the parent's box, or the viewport when `parent_is_window`.
/// A `preload_ratio` of 1 uses the area as is; 1.5 adds a quarter of its
/// size on every side.
pub fn observed_area(parent: Rect, window: Rect, parent_is_window: bool, preload_ratio: f64) -> Rect {
    let shown = if parent_is_window {
        parent
    } else {
        let o = parent.overhang(&window);
        Rect {
            left: parent.left - o.left,
            top: parent.top - o.top,
            width: parent.width + o.left + o.right,
            height: parent.height + o.top + o.bottom,
        }
    };
    shown.scale_about_center(preload_ratio - 1.0)
}

/// Overlap test between an element and an observed area
pub fn is_visible(el: &Rect, area: &Rect) -> bool {
    el.overlaps(area)
}
