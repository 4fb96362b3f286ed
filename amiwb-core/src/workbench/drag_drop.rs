//! Cross-canvas icon drag-and-drop (spec.md SS4.E "Drag-and-drop").
//!
//! The floating drag window itself (an input-transparent top-level that
//! follows the pointer) is drawn by the renderer; this module owns the
//! state machine and the filesystem side-effects of a drop. XDND
//! negotiation with foreign clients is an external collaborator per
//! spec.md SS1 -- this module only needs the drag image to "remain painted
//! until the release completes", which is a rendering concern, not a state
//! one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::canvas::CanvasId;

/// Pixel distance the pointer must move past the press point before a drag
/// begins (spec.md SS4.E "Press-and-move past a 10-pixel threshold").
pub const DRAG_THRESHOLD: i32 = 10;

/// An in-flight icon drag (spec.md SS4.E "a floating-drag state").
#[derive(Debug, Clone)]
pub struct IconDrag {
    pub source_canvas: CanvasId,
    /// Indices into the source canvas's icon list, in case more than one
    /// icon is selected when the drag begins.
    pub icon_indices: Vec<usize>,
    pub press_x: i32,
    pub press_y: i32,
    /// `true` once the pointer has moved past [`DRAG_THRESHOLD`] and the
    /// floating drag window should be shown.
    pub started: bool,
    /// Canvas currently under the pointer, re-targeted on every motion
    /// event by the caller's hit-test (spec.md SS4.E "Motion events
    /// continuously re-target the drop canvas").
    pub target_canvas: Option<CanvasId>,
}

impl IconDrag {
    pub fn new(source_canvas: CanvasId, icon_indices: Vec<usize>, press_x: i32, press_y: i32) -> Self {
        Self { source_canvas, icon_indices, press_x, press_y, started: false, target_canvas: None }
    }

    /// Updates `started` from the current pointer position; returns
    /// whether the drag has (just now or already) crossed the threshold.
    pub fn update_started(&mut self, x: i32, y: i32) -> bool {
        if !self.started {
            let dx = (x - self.press_x).abs();
            let dy = (y - self.press_y).abs();
            self.started = dx > DRAG_THRESHOLD || dy > DRAG_THRESHOLD;
        }
        self.started
    }
}

/// Outcome of resolving a drop, driving what the caller does next (refresh
/// which canvases, whether to defer to XDND).
#[derive(Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// Dropped within the same canvas: reposition only.
    Reposition,
    /// Moved to a different workbench canvas's directory.
    MovedTo(PathBuf),
    /// Dropped onto a drawer icon: moved into that directory.
    MovedIntoDrawer(PathBuf),
    /// Dropped onto a foreign window; XDND negotiation is the caller's job.
    ForeignWindow,
}

/// Moves `entry` (and its `.info` sidecar, if present) into `dest_dir`
/// (spec.md SS4.E "move the filesystem entry to that canvas's directory
/// (plus its sidecar .info if present)"). Best-effort: failures are logged,
/// the source icon list is left untouched by the caller on failure.
pub fn move_entry(entry: &Path, dest_dir: &Path) -> bool {
    let Some(name) = entry.file_name() else { return false };
    let dest = dest_dir.join(name);
    if let Err(err) = fs::rename(entry, &dest) {
        warn!("drag_drop: move {} -> {} failed: {}", entry.display(), dest.display(), err);
        return false;
    }

    let sidecar = sidecar_info_path(entry);
    if sidecar.exists() {
        let dest_sidecar = sidecar_info_path(&dest);
        if let Err(err) = fs::rename(&sidecar, &dest_sidecar) {
            warn!("drag_drop: move sidecar {} -> {} failed: {}", sidecar.display(), dest_sidecar.display(), err);
        }
    }
    true
}

/// The `<name>.info` sidecar path for a given entry (spec.md SS4.A "prefer
/// a sibling `<name>.info` file").
pub fn sidecar_info_path(entry: &Path) -> PathBuf {
    let mut name = entry.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".info");
    entry.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_not_started_within_threshold() {
        let mut drag = IconDrag::new(0, vec![0], 100, 100);
        assert!(!drag.update_started(105, 103));
        assert!(!drag.started);
    }

    #[test]
    fn drag_starts_past_threshold() {
        let mut drag = IconDrag::new(0, vec![0], 100, 100);
        assert!(drag.update_started(115, 100));
        assert!(drag.started);
    }

    #[test]
    fn sidecar_path_appends_info() {
        let path = PathBuf::from("/home/u/Drawer");
        assert_eq!(sidecar_info_path(&path), PathBuf::from("/home/u/Drawer.info"));
    }

    #[test]
    fn move_entry_relocates_file_and_sidecar() {
        let dir = std::env::temp_dir().join(format!("amiwb-test-{}", std::process::id()));
        let dest = dir.join("dest");
        fs::create_dir_all(&dest).unwrap();
        let src_file = dir.join("file.txt");
        fs::write(&src_file, b"hi").unwrap();
        let src_info = dir.join("file.txt.info");
        fs::write(&src_info, b"icon").unwrap();

        assert!(move_entry(&src_file, &dest));
        assert!(dest.join("file.txt").exists());
        assert!(dest.join("file.txt.info").exists());
        assert!(!src_file.exists());

        fs::remove_dir_all(&dir).ok();
    }
}
