//! Icon selection (spec.md SS4.E "Selection").

use crate::icon::FileIcon;

/// Left click on an icon at index `clicked`: select it, deselect every
/// other icon on the same canvas (spec.md SS4.E "Left click on an icon
/// selects it and deselects others on the same canvas").
pub fn select_only(icons: &mut [FileIcon], clicked: usize) {
    for (i, icon) in icons.iter_mut().enumerate() {
        icon.selected = i == clicked;
    }
}

/// Shift-click: toggles `clicked`'s selection, leaving the rest untouched
/// (spec.md SS4.E "Shift-click toggles").
pub fn toggle(icons: &mut [FileIcon], clicked: usize) {
    if let Some(icon) = icons.get_mut(clicked) {
        icon.selected = !icon.selected;
    }
}

/// Empty click on the canvas background: deselects everything on it
/// (spec.md SS4.E "empty click on the canvas deselects all within that
/// canvas").
pub fn deselect_all(icons: &mut [FileIcon]) {
    for icon in icons.iter_mut() {
        icon.selected = false;
    }
}

/// Indices of every currently-selected icon, in display order.
pub fn selected_indices(icons: &[FileIcon]) -> Vec<usize> {
    icons.iter().enumerate().filter(|(_, i)| i.selected).map(|(idx, _)| idx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::{default_icon, IconKind};
    use std::path::PathBuf;

    fn icons() -> Vec<FileIcon> {
        (0..3).map(|i| FileIcon::new(format!("f{i}"), PathBuf::from("/x"), IconKind::File, default_icon(IconKind::File), 0)).collect()
    }

    #[test]
    fn select_only_clears_others() {
        let mut icons = icons();
        icons[0].selected = true;
        select_only(&mut icons, 1);
        assert!(!icons[0].selected);
        assert!(icons[1].selected);
        assert!(!icons[2].selected);
    }

    #[test]
    fn toggle_flips_single_icon() {
        let mut icons = icons();
        toggle(&mut icons, 0);
        assert!(icons[0].selected);
        toggle(&mut icons, 0);
        assert!(!icons[0].selected);
    }

    #[test]
    fn deselect_all_clears_every_icon() {
        let mut icons = icons();
        icons[0].selected = true;
        icons[2].selected = true;
        deselect_all(&mut icons);
        assert!(selected_indices(&icons).is_empty());
    }
}
