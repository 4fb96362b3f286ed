//! Pure hit-testing (spec.md SS4.D "Hit test function"). Takes primitive
//! arguments and returns an enum, the same shape as the teacher's
//! `window.rs::translate_pos`/`translate_shape` free functions -- no I/O, no
//! canvas-store dependency, fully unit-testable.

use crate::canvas::CanvasKind;

use super::decorations::{self, TitlebarGadget};

/// What a pointer position within a canvas resolves to (spec.md SS4.D "Hit
/// test function").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Close,
    Drag,
    Iconify,
    Maximize,
    Lower,
    ResizeSe,
    ResizeN,
    ResizeS,
    ResizeE,
    ResizeW,
    ResizeNw,
    ResizeNe,
    ResizeSw,
    Client,
}

/// Corner/edge resize zone width for client windows (spec.md SS4.D "Client
/// windows additionally support 20-pixel corner and edge resize zones").
const CLIENT_RESIZE_ZONE: i32 = 20;

/// Hit-tests a local pointer position `(x, y)` against a canvas of size
/// `(w, h)` (spec.md SS4.D "Hit test function"). `is_client_window` gates
/// the extra corner/edge resize zones client windows get beyond the
/// bottom-right resize gadget every canvas has.
pub fn hit_test(kind: CanvasKind, fullscreen: bool, is_client_window: bool, x: i32, y: i32, w: u32, h: u32) -> HitTarget {
    if kind == CanvasKind::Desktop {
        return HitTarget::Client;
    }
    if fullscreen {
        return HitTarget::Client;
    }

    let (_, _, top_border, _) = decorations::borders_for(is_client_window);
    if y < top_border as i32 {
        return match decorations::titlebar_gadget_at(x, w) {
            TitlebarGadget::Close => HitTarget::Close,
            TitlebarGadget::Drag => HitTarget::Drag,
            TitlebarGadget::Iconify => HitTarget::Iconify,
            TitlebarGadget::Maximize => HitTarget::Maximize,
            TitlebarGadget::Lower => HitTarget::Lower,
        };
    }

    let resize_rect = decorations::resize_gadget_rect(w, h);
    if x >= resize_rect.x && y >= resize_rect.y {
        return HitTarget::ResizeSe;
    }

    if is_client_window {
        let (wi, hi) = (w as i32, h as i32);
        let near_left = x < CLIENT_RESIZE_ZONE;
        let near_right = x >= wi - CLIENT_RESIZE_ZONE;
        let near_top = y < CLIENT_RESIZE_ZONE;
        let near_bottom = y >= hi - CLIENT_RESIZE_ZONE;

        if near_top && near_left {
            return HitTarget::ResizeNw;
        }
        if near_top && near_right {
            return HitTarget::ResizeNe;
        }
        if near_bottom && near_left {
            return HitTarget::ResizeSw;
        }
        if near_bottom && near_right {
            return HitTarget::ResizeSe;
        }
        if near_top {
            return HitTarget::ResizeN;
        }
        if near_bottom {
            return HitTarget::ResizeS;
        }
        if near_left {
            return HitTarget::ResizeW;
        }
        if near_right {
            return HitTarget::ResizeE;
        }
    }

    HitTarget::Client
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_is_always_client() {
        assert_eq!(hit_test(CanvasKind::Desktop, false, false, 5, 5, 100, 100), HitTarget::Client);
    }

    #[test]
    fn fullscreen_is_always_client() {
        assert_eq!(hit_test(CanvasKind::Window, true, true, 0, 0, 100, 100), HitTarget::Client);
    }

    #[test]
    fn titlebar_gadgets_route_correctly() {
        assert_eq!(hit_test(CanvasKind::Window, false, false, 0, 0, 400, 300), HitTarget::Close);
        assert_eq!(hit_test(CanvasKind::Window, false, false, 200, 5, 400, 300), HitTarget::Drag);
    }

    #[test]
    fn bottom_right_corner_is_resize_se() {
        assert_eq!(hit_test(CanvasKind::Window, false, false, 399, 299, 400, 300), HitTarget::ResizeSe);
    }

    #[test]
    fn client_window_edges_resize() {
        assert_eq!(hit_test(CanvasKind::Window, false, true, 5, 150, 400, 300), HitTarget::ResizeW);
        assert_eq!(hit_test(CanvasKind::Window, false, true, 5, 5, 400, 300), HitTarget::Close);
    }

    #[test]
    fn workbench_window_has_no_edge_zones_only_se_gadget() {
        // Workbench (non-client) windows don't get the extra edge zones,
        // so a point near the left edge below the titlebar is Client.
        assert_eq!(hit_test(CanvasKind::Window, false, false, 1, 150, 400, 300), HitTarget::Client);
    }
}
