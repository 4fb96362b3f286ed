//! Icon layout: grid ("Icons" mode) and alphabetical list ("Names" mode)
//! (spec.md SS4.E "Layout").

use crate::canvas::ViewMode;
use crate::icon::FileIcon;

/// Spacing between icons in the grid layout (spec.md SS4.E, from
/// `original_source/src/amiwb/config.h`'s `ICON_SPACING`).
pub const ICON_SPACING: i32 = 70;
/// Row height / badge pitch in Names-mode list layout.
pub const NAME_ROW_HEIGHT: i32 = 20;

/// Re-flows `icons` into a tidy grid, `ICON_SPACING` apart, as many rows as
/// fit `visible_h` before wrapping to the next column (spec.md SS4.E "an
/// `Icon Cleanup` action re-flows into a tidy grid").
pub fn cleanup_grid(icons: &mut [FileIcon], visible_h: u32) {
    let rows = (visible_h as i32 / ICON_SPACING).max(1);
    for (i, icon) in icons.iter_mut().enumerate() {
        let i = i as i32;
        let col = i / rows;
        let row = i % rows;
        icon.x = col * ICON_SPACING;
        icon.y = row * ICON_SPACING;
    }
}

/// Places a newly-created icon at the next free grid cell, scanning
/// row-major for the first cell not already occupied by another icon on
/// this canvas (spec.md SS4.E "Position persistence is by simple row/column
/// flow on first open").
pub fn next_free_cell(existing: &[FileIcon], visible_h: u32) -> (i32, i32) {
    let rows = (visible_h as i32 / ICON_SPACING).max(1);
    let occupied: Vec<(i32, i32)> = existing.iter().map(|i| (i.x / ICON_SPACING, i.y / ICON_SPACING)).collect();
    let mut col = 0;
    loop {
        for row in 0..rows {
            if !occupied.contains(&(col, row)) {
                return (col * ICON_SPACING, row * ICON_SPACING);
            }
        }
        col += 1;
    }
}

/// Re-orders `icons` alphabetically (case-insensitive) and assigns each a
/// one-per-row position for Names-mode display (spec.md SS4.E "Names
/// mode").
pub fn layout_names(icons: &mut [FileIcon]) {
    let mut order: Vec<usize> = (0..icons.len()).collect();
    order.sort_by_key(|&i| icons[i].label.to_lowercase());
    let positions: Vec<(i32, i32)> = (0..icons.len()).map(|i| (0, i as i32 * NAME_ROW_HEIGHT)).collect();
    for (slot, &i) in order.iter().enumerate() {
        icons[i].x = positions[slot].0;
        icons[i].y = positions[slot].1;
    }
}

/// Applies whichever layout `mode` selects.
pub fn apply(icons: &mut [FileIcon], mode: ViewMode, visible_h: u32) {
    match mode {
        ViewMode::Icons => cleanup_grid(icons, visible_h),
        ViewMode::Names => layout_names(icons),
    }
}

/// Bounding content rectangle of all icons, used to recompute
/// `content_w`/`content_h` after any layout change (spec.md SS4.E "compute
/// content_width/height as the bounding rectangle of all icons").
pub fn content_bounds(icons: &[FileIcon]) -> (u32, u32) {
    let mut max_x = 0i32;
    let mut max_y = 0i32;
    for icon in icons {
        max_x = max_x.max(icon.x + icon.width as i32);
        max_y = max_y.max(icon.y + icon.height as i32);
    }
    (max_x.max(0) as u32, max_y.max(0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::{default_icon, IconKind};
    use std::path::PathBuf;

    fn icon(label: &str) -> FileIcon {
        FileIcon::new(label.into(), PathBuf::from("/x"), IconKind::File, default_icon(IconKind::File), 0)
    }

    #[test]
    fn cleanup_grid_flows_columns() {
        let mut icons = vec![icon("a"), icon("b"), icon("c")];
        cleanup_grid(&mut icons, 140); // 2 rows fit (140/70)
        assert_eq!((icons[0].x, icons[0].y), (0, 0));
        assert_eq!((icons[1].x, icons[1].y), (0, ICON_SPACING));
        assert_eq!((icons[2].x, icons[2].y), (ICON_SPACING, 0));
    }

    #[test]
    fn names_mode_sorts_case_insensitively() {
        let mut icons = vec![icon("banana"), icon("Apple")];
        layout_names(&mut icons);
        assert_eq!(icons[1].y, 0); // "Apple" sorts first -> row 0
        assert_eq!(icons[0].y, NAME_ROW_HEIGHT); // "banana" -> row 1
    }

    #[test]
    fn content_bounds_covers_all_icons() {
        let mut icons = vec![icon("a"), icon("b")];
        icons[0].x = 0;
        icons[0].y = 0;
        icons[1].x = 70;
        icons[1].y = 140;
        icons[1].width = 32;
        icons[1].height = 32;
        let (w, h) = content_bounds(&icons);
        assert_eq!((w, h), (102, 172));
    }
}
