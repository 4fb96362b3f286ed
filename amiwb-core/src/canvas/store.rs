use std::collections::HashMap;

use tracing::{debug, warn};
use x11rb::protocol::xproto::Window;

use super::{Canvas, CanvasId, CanvasKind, Rect};
use crate::error::{CanvasError, Result};

/// Cap on simultaneously managed windows, enforced so focus-cycling lists
/// (spec.md SS4.B, SS4.D "Focus cycling") stay bounded.
pub const MAX_WINDOWS: usize = 256;

/// Append-mostly registry of every live [`Canvas`], plus reverse lookups
/// from frame/client window to store index (spec.md SS4.B).
///
/// Slots are index-stable: `destroy` leaves a `None` hole rather than
/// shifting later entries, so a `CanvasId` handed out once (e.g. as a
/// transient-parent reference) stays valid until that specific canvas is
/// destroyed. This mirrors `libwmctl::WinMgr`'s cache-once `HashMap<u32,
/// String>` idiom, generalized to two live-updated maps plus a slot array.
#[derive(Debug, Default)]
pub struct CanvasStore {
    slots: Vec<Option<Canvas>>,
    by_frame: HashMap<Window, CanvasId>,
    by_client: HashMap<Window, CanvasId>,
    desktop: Option<CanvasId>,
    live_count: usize,
}

impl CanvasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new canvas and registers it in the reverse-lookup maps.
    /// Returns [`CanvasError::TooManyWindows`] once [`MAX_WINDOWS`] live
    /// canvases are registered (spec.md SS4.B "fixed-size limit of 256").
    pub fn create(
        &mut self, kind: CanvasKind, frame: Window, client_window: Option<Window>, geometry: Rect,
    ) -> Result<CanvasId> {
        if self.live_count >= MAX_WINDOWS {
            return Err(CanvasError::TooManyWindows(MAX_WINDOWS).into());
        }

        let canvas = Canvas::new(kind, frame, client_window, geometry);
        let id = match self.slots.iter().position(|s| s.is_none()) {
            Some(idx) => {
                self.slots[idx] = Some(canvas);
                idx
            },
            None => {
                self.slots.push(Some(canvas));
                self.slots.len() - 1
            },
        };

        self.by_frame.insert(frame, id);
        if let Some(client) = client_window {
            self.by_client.insert(client, id);
        }
        if kind == CanvasKind::Desktop {
            self.desktop = Some(id);
        }
        self.live_count += 1;
        debug!("canvas create: id: {}, kind: {}, frame: {}, geometry: {:?}", id, kind, frame, geometry);
        Ok(id)
    }

    pub fn get(&self, id: CanvasId) -> Option<&Canvas> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: CanvasId) -> Option<&mut Canvas> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    pub fn find_by_frame(&self, frame: Window) -> Option<CanvasId> {
        self.by_frame.get(&frame).copied()
    }

    pub fn find_by_client(&self, client: Window) -> Option<CanvasId> {
        self.by_client.get(&client).copied()
    }

    pub fn desktop(&self) -> CanvasId {
        self.desktop.expect("desktop canvas created at startup before any other subsystem runs")
    }

    /// Removes a canvas's bookkeeping entry. Idempotent: destroying an
    /// already-empty slot is a no-op (spec.md SS4.B "destroy(Canvas)
    /// (idempotent, safe to call twice)"). Does **not** free any X
    /// resources -- callers (compositor, intuition) must tear those down
    /// first, in the order spec.md SS5 describes, before calling this.
    pub fn destroy(&mut self, id: CanvasId) {
        let Some(slot) = self.slots.get_mut(id) else { return };
        let Some(canvas) = slot.take() else {
            return;
        };
        self.by_frame.remove(&canvas.frame);
        if let Some(client) = canvas.client_window {
            self.by_client.remove(&client);
        }
        if self.desktop == Some(id) {
            warn!("canvas destroy: desktop canvas destroyed, session is ending");
            self.desktop = None;
        }
        self.live_count = self.live_count.saturating_sub(1);
        debug!("canvas destroy: id: {}", id);
    }

    /// Iterates live canvases in insertion order (oldest slot first).
    pub fn iter(&self) -> impl Iterator<Item = (CanvasId, &Canvas)> {
        self.slots.iter().enumerate().filter_map(|(id, c)| c.as_ref().map(|c| (id, c)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (CanvasId, &mut Canvas)> {
        self.slots.iter_mut().enumerate().filter_map(|(id, c)| c.as_mut().map(|c| (id, c)))
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rect {
        Rect::new(0, 0, 100, 100)
    }

    #[test]
    fn create_and_find_roundtrip() {
        let mut store = CanvasStore::new();
        let id = store.create(CanvasKind::Window, 42, Some(43), rect()).unwrap();
        assert_eq!(store.find_by_frame(42), Some(id));
        assert_eq!(store.find_by_client(43), Some(id));
        assert!(store.get(id).is_some());
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut store = CanvasStore::new();
        let id = store.create(CanvasKind::Window, 1, None, rect()).unwrap();
        store.destroy(id);
        store.destroy(id);
        assert!(store.get(id).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn destroyed_slot_is_reused() {
        let mut store = CanvasStore::new();
        let a = store.create(CanvasKind::Window, 1, None, rect()).unwrap();
        store.destroy(a);
        let b = store.create(CanvasKind::Window, 2, None, rect()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn enforces_window_cap() {
        let mut store = CanvasStore::new();
        for i in 0..MAX_WINDOWS as u32 {
            store.create(CanvasKind::Window, i + 1, None, rect()).unwrap();
        }
        let err = store.create(CanvasKind::Window, 9999, None, rect());
        assert!(err.is_err());
    }

    #[test]
    fn desktop_lookup() {
        let mut store = CanvasStore::new();
        let id = store.create(CanvasKind::Desktop, 1, None, rect()).unwrap();
        assert_eq!(store.desktop(), id);
    }
}
