use x11rb::protocol::damage::Damage;
use x11rb::protocol::render::Picture;
use x11rb::protocol::xproto::{Pixmap, Window};

use crate::canvas::Rect;

/// A short-lived override-redirect window tracked outside the canvas store:
/// foreign tooltips and popup menus (spec.md SS3 "Compositor override
/// list"). Modeled as a `Vec` entry rather than the C original's singly
/// linked list -- index-based, not pointer-based, per spec.md SS9.
#[derive(Debug, Clone)]
pub struct OverrideWindow {
    pub window: Window,
    pub pixmap: Option<Pixmap>,
    pub picture: Option<Picture>,
    pub damage: Option<Damage>,
    pub geometry: Rect,
}

impl OverrideWindow {
    pub fn new(window: Window, geometry: Rect) -> Self {
        Self { window, pixmap: None, picture: None, damage: None, geometry }
    }
}

/// Tracks every currently-mapped override-redirect window, topmost last so a
/// full render pass can simply iterate in order (spec.md SS4.C "iterate the
/// override list (topmost)").
#[derive(Debug, Default)]
pub struct OverrideList {
    windows: Vec<OverrideWindow>,
}

impl OverrideList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, win: OverrideWindow) {
        self.windows.push(win);
    }

    pub fn remove(&mut self, window: Window) -> Option<OverrideWindow> {
        let idx = self.windows.iter().position(|w| w.window == window)?;
        Some(self.windows.remove(idx))
    }

    pub fn get_mut(&mut self, window: Window) -> Option<&mut OverrideWindow> {
        self.windows.iter_mut().find(|w| w.window == window)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverrideWindow> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_remove_roundtrip() {
        let mut list = OverrideList::new();
        list.push(OverrideWindow::new(7, Rect::new(0, 0, 10, 10)));
        assert_eq!(list.len(), 1);
        let removed = list.remove(7).unwrap();
        assert_eq!(removed.window, 7);
        assert!(list.is_empty());
    }

    #[test]
    fn remove_missing_is_none() {
        let mut list = OverrideList::new();
        assert!(list.remove(1).is_none());
    }
}
