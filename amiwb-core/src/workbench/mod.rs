//! The workbench icon engine (spec.md SS4.E): directory-backed icon
//! collections per canvas, layout, selection, drag-and-drop, and spatial
//! geometry persistence.

pub mod drag_drop;
pub mod layout;
pub mod selection;
pub mod spatial;

pub use drag_drop::{DropOutcome, IconDrag};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::warn;

use crate::canvas::CanvasId;
use crate::icon::{default_icon, load_icon_or_default, FileIcon, IconKind};

/// Per-canvas icon collection, owned by the `Window` canvas it populates
/// (spec.md SS4.E "Per-canvas icon population").
#[derive(Debug, Default)]
pub struct IconSet {
    pub icons: Vec<FileIcon>,
}

impl IconSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `dir` and (re)populates `self.icons` for `display_window`
    /// (spec.md SS4.E "Opening a directory scans its entries"). Hidden
    /// entries (dotfiles) are included only if `show_hidden`. Best-effort:
    /// a read error on one entry skips just that entry.
    pub fn scan(&mut self, dir: &Path, display_window: CanvasId, show_hidden: bool) {
        self.icons.clear();
        let Ok(read_dir) = fs::read_dir(dir) else {
            warn!("workbench: failed to read directory {}", dir.display());
            return;
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if name.ends_with(".info") {
                continue; // sidecar files aren't icons in their own right
            }
            if !show_hidden && name.starts_with('.') {
                continue;
            }

            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let kind = if is_dir { IconKind::Drawer } else { IconKind::File };
            let decoded = load_icon_for(&path, kind);
            self.icons.push(FileIcon::new(name, path, kind, decoded, display_window));
        }

        // Positions are assigned by the caller via `layout::apply` once the
        // canvas's visible size is known (spec.md SS4.E "Layout").
    }

    /// Appends a single iconified-window icon to the desktop's set (spec.md
    /// SS4.D "Iconify": "creates a drawer-style icon on the desktop").
    pub fn add_iconified(&mut self, label: String, iconified_canvas: CanvasId, display_window: CanvasId, pos: (i32, i32)) {
        let mut icon = FileIcon::new(label, PathBuf::new(), IconKind::Iconified, default_icon(IconKind::Drawer), display_window);
        icon.iconified_canvas = Some(iconified_canvas);
        icon.x = pos.0;
        icon.y = pos.1;
        self.icons.push(icon);
    }

    /// Removes the icon that restores `canvas_id`, if any is present
    /// (spec.md SS4.D "Restore ... destroys the icon").
    pub fn remove_iconified(&mut self, canvas_id: CanvasId) {
        self.icons.retain(|i| i.iconified_canvas != Some(canvas_id));
    }

    /// Handles a click at `(x, y)` at time `now`: finds the topmost icon
    /// under the point and returns whether it was a double-click plus the
    /// icon's index (spec.md SS4.E "Double click").
    pub fn click_at(&mut self, x: i32, y: i32, now: Instant) -> Option<(usize, bool)> {
        let idx = self.icons.iter().position(|i| hit(i, x, y))?;
        let double = self.icons[idx].is_double_click(now, x, y);
        self.icons[idx].last_click_time = Some(now);
        Some((idx, double))
    }

    pub fn index_at(&self, x: i32, y: i32) -> Option<usize> {
        self.icons.iter().position(|i| hit(i, x, y))
    }
}

fn hit(icon: &FileIcon, x: i32, y: i32) -> bool {
    x >= icon.x && x < icon.x + icon.width as i32 && y >= icon.y && y < icon.y + icon.height as i32
}

/// Chooses an icon source for `path` per spec.md SS4.E "Per-canvas icon
/// population": a sibling `<name>.info` file, else a type-specific default.
fn load_icon_for(path: &Path, kind: IconKind) -> crate::icon::DecodedIcon {
    let sidecar = drag_drop::sidecar_info_path(path);
    let bytes = fs::read(&sidecar).ok();
    load_icon_or_default(bytes.as_deref(), path, kind)
}

/// What a double click on an icon should do, resolved by the dispatcher
/// (spec.md SS4.E "Double click ... Actions by type"). Kept separate from
/// the act of doing it: opening a directory needs the canvas store and
/// compositor, which this module doesn't touch directly.
#[derive(Debug, Clone)]
pub enum ActivateAction {
    OpenDrawer(PathBuf),
    SpawnHandler(PathBuf),
    RestoreWindow(CanvasId),
    OpenMount(PathBuf),
}

pub fn activate(icon: &FileIcon) -> ActivateAction {
    match icon.kind {
        IconKind::Drawer => ActivateAction::OpenDrawer(icon.path.clone()),
        IconKind::File => ActivateAction::SpawnHandler(icon.path.clone()),
        IconKind::Iconified => ActivateAction::RestoreWindow(icon.iconified_canvas.expect("iconified icon always carries a back-reference")),
        IconKind::Device => ActivateAction::OpenMount(icon.path.clone()),
    }
}

/// Deletes `path` (file or directory, recursively) after the caller has
/// already confirmed with the user (spec.md SS4.E "Delete prompts a
/// confirmation dialog before unlink/rmdir recursively"). Returns `false`
/// (and logs) on failure, e.g. permission denied.
pub fn delete_entry(path: &Path) -> bool {
    let result = if path.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    match result {
        Ok(()) => {
            let sidecar = drag_drop::sidecar_info_path(path);
            let _ = fs::remove_file(sidecar);
            true
        },
        Err(err) => {
            warn!("workbench: delete {} failed: {}", path.display(), err);
            false
        },
    }
}

/// Renames `path` to `new_name` within the same directory, moving its
/// `.info` sidecar along with it (spec.md SS4.E "Rename ... renames both
/// the target and its .info sidecar").
pub fn rename_entry(path: &Path, new_name: &str) -> Option<PathBuf> {
    let dest = path.with_file_name(new_name);
    if dest.exists() {
        warn!("workbench: rename target {} already exists", dest.display());
        return None;
    }
    if let Err(err) = fs::rename(path, &dest) {
        warn!("workbench: rename {} -> {} failed: {}", path.display(), dest.display(), err);
        return None;
    }
    let sidecar = drag_drop::sidecar_info_path(path);
    if sidecar.exists() {
        let dest_sidecar = drag_drop::sidecar_info_path(&dest);
        let _ = fs::rename(sidecar, dest_sidecar);
    }
    Some(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_removes_file_and_sidecar() {
        let dir = std::env::temp_dir().join(format!("amiwb-wbtest-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("note.txt");
        let info = dir.join("note.txt.info");
        fs::write(&file, b"hi").unwrap();
        fs::write(&info, b"icon").unwrap();

        assert!(delete_entry(&file));
        assert!(!file.exists());
        assert!(!info.exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rename_refuses_existing_target() {
        let dir = std::env::temp_dir().join(format!("amiwb-wbtest2-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let a = dir.join("a.txt");
        let b = dir.join("b.txt");
        fs::write(&a, b"1").unwrap();
        fs::write(&b, b"2").unwrap();

        assert!(rename_entry(&a, "b.txt").is_none());
        assert!(a.exists());

        fs::remove_dir_all(&dir).ok();
    }
}
