//! Focus management and cycling (spec.md SS4.D "Focus", "Focus cycling").

use crate::canvas::{CanvasId, CanvasKind, CanvasStore};

/// Tracks the currently active canvas, if any (spec.md SS3 invariant "at
/// most one canvas is active among {Window, Dialog}").
#[derive(Debug, Default)]
pub struct FocusState {
    active: Option<CanvasId>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<CanvasId> {
        self.active
    }

    /// Activates `target`: deactivates the previous active canvas (so it
    /// repaints inactive-gray), marks `target` active, and damages both
    /// (spec.md SS4.D "set_active"). Raising, X input-focus assignment, and
    /// app-menu substitution are driven by the caller (the dispatcher),
    /// which has the X connection and menu state this module doesn't.
    pub fn set_active(&mut self, store: &mut CanvasStore, target: CanvasId) -> bool {
        let Some(canvas) = store.get(target) else { return false };
        if !matches!(canvas.kind, CanvasKind::Window | CanvasKind::Dialog) {
            return false;
        }

        if let Some(prev) = self.active.take() {
            if prev != target {
                if let Some(prev_canvas) = store.get_mut(prev) {
                    prev_canvas.wm.active = false;
                    prev_canvas.compositor.needs_repaint = true;
                }
            }
        }

        if let Some(canvas) = store.get_mut(target) {
            canvas.wm.active = true;
            canvas.compositor.needs_repaint = true;
        }
        self.active = Some(target);
        true
    }

    /// Blanks the active pointer without requiring a replacement target
    /// (spec.md SS4.D "`deactivate_all` blanks the active pointer").
    pub fn deactivate_all(&mut self, store: &mut CanvasStore) {
        if let Some(prev) = self.active.take() {
            if let Some(canvas) = store.get_mut(prev) {
                canvas.wm.active = false;
                canvas.compositor.needs_repaint = true;
            }
        }
    }

    /// Clears the active slot without touching canvas state, used when the
    /// active canvas has already been destroyed.
    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Builds the focus-cycling candidate list: `Window`/`Dialog` canvases that
/// are either user-iconified (tracked by `iconified` callback) or both
/// mapped and not app-hidden (spec.md SS4.D "Focus cycling"). Returns ids in
/// store iteration order; the caller rotates from the current active.
pub fn cycle_candidates(store: &CanvasStore, is_iconified: impl Fn(CanvasId) -> bool) -> Vec<CanvasId> {
    store
        .iter()
        .filter(|(id, c)| {
            matches!(c.kind, CanvasKind::Window | CanvasKind::Dialog)
                && (is_iconified(*id) || (c.compositor.mapped && !c.compositor.hidden_by_app))
        })
        .map(|(id, _)| id)
        .collect()
}

/// Advances (`forward = true`) or retreats the current active id within
/// `candidates`, wrapping circularly. Returns `None` if `candidates` is
/// empty.
pub fn cycle_next(candidates: &[CanvasId], current: Option<CanvasId>, forward: bool) -> Option<CanvasId> {
    if candidates.is_empty() {
        return None;
    }
    let pos = current.and_then(|c| candidates.iter().position(|&id| id == c));
    let next_pos = match pos {
        None => 0,
        Some(p) => {
            if forward {
                (p + 1) % candidates.len()
            } else {
                (p + candidates.len() - 1) % candidates.len()
            }
        },
    };
    Some(candidates[next_pos])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Rect;

    fn rect() -> Rect {
        Rect::new(0, 0, 100, 100)
    }

    #[test]
    fn set_active_deactivates_previous() {
        let mut store = CanvasStore::new();
        let a = store.create(CanvasKind::Window, 1, None, rect()).unwrap();
        let b = store.create(CanvasKind::Window, 2, None, rect()).unwrap();
        let mut focus = FocusState::new();

        focus.set_active(&mut store, a);
        assert!(store.get(a).unwrap().wm.active);

        focus.set_active(&mut store, b);
        assert!(!store.get(a).unwrap().wm.active);
        assert!(store.get(b).unwrap().wm.active);
        assert_eq!(focus.active(), Some(b));
    }

    #[test]
    fn rejects_desktop_and_menu_kinds() {
        let mut store = CanvasStore::new();
        let desktop = store.create(CanvasKind::Desktop, 1, None, rect()).unwrap();
        let mut focus = FocusState::new();
        assert!(!focus.set_active(&mut store, desktop));
        assert_eq!(focus.active(), None);
    }

    #[test]
    fn cycle_wraps_circularly() {
        let candidates = vec![1usize, 2, 3];
        assert_eq!(cycle_next(&candidates, Some(3), true), Some(1));
        assert_eq!(cycle_next(&candidates, Some(1), false), Some(3));
        assert_eq!(cycle_next(&candidates, None, true), Some(1));
    }

    #[test]
    fn cycle_empty_is_none() {
        assert_eq!(cycle_next(&[], None, true), None);
    }
}
