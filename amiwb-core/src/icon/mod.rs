//! Icon decoding and the `FileIcon` instance model (spec.md SS3, SS4.A).

pub mod codec;

pub use codec::{DecodedIcon, IconError, RgbaImage, CLASSIC_PALETTE};

use std::path::PathBuf;
use std::time::Instant;

use tracing::warn;

use crate::canvas::CanvasId;

/// What a [`FileIcon`] represents (spec.md SS3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    File,
    Drawer,
    Iconified,
    Device,
}

/// An icon instance bound to exactly one canvas (spec.md SS3 "FileIcon").
#[derive(Debug, Clone)]
pub struct FileIcon {
    pub label: String,
    pub path: PathBuf,
    pub kind: IconKind,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub normal: DecodedIcon,
    pub selected: bool,
    /// The owning canvas's frame window, mirrored here for quick hit-testing
    /// without a store lookup (spec.md SS3 "display_window").
    pub display_window: CanvasId,
    pub last_click_time: Option<Instant>,
    /// Present only for `IconKind::Iconified`: the hidden canvas this icon
    /// restores (spec.md SS3 "back-reference to the hidden Canvas").
    pub iconified_canvas: Option<CanvasId>,
    /// Cached label pixel width, recomputed on rename (spec.md SS3
    /// invariant "Label width is cached after rename").
    pub label_width: u32,
}

impl FileIcon {
    pub fn new(label: String, path: PathBuf, kind: IconKind, decoded: DecodedIcon, display_window: CanvasId) -> Self {
        let (width, height) = (decoded.normal.width as u32, decoded.normal.height as u32);
        Self {
            label,
            path,
            kind,
            x: 0,
            y: 0,
            width,
            height,
            normal: decoded,
            selected: false,
            display_window,
            last_click_time: None,
            iconified_canvas: None,
            label_width: 0,
        }
    }

    /// The picture that should currently be drawn: selected or normal
    /// (spec.md SS3 "Selected icons render with `selected_picture`").
    pub fn current(&self) -> &RgbaImage {
        if self.selected {
            &self.normal.selected
        } else {
            &self.normal.normal
        }
    }

    /// Truncates the label to 10 characters with a ".." suffix for grid
    /// display (spec.md SS4.E "Icons mode").
    pub fn display_label(&self) -> String {
        if self.label.chars().count() > 10 {
            let truncated: String = self.label.chars().take(10).collect();
            format!("{}..", truncated)
        } else {
            self.label.clone()
        }
    }

    /// Determines whether a click at `(click_x, click_y)` at `now` should be
    /// treated as a double-click against this icon's last click (spec.md
    /// SS4.E "Double click", SS5 "Double-click has a 1000 ms timeout").
    pub fn is_double_click(&self, now: Instant, click_x: i32, click_y: i32) -> bool {
        let Some(last) = self.last_click_time else { return false };
        let dx = (click_x - self.x).abs();
        let dy = (click_y - self.y).abs();
        now.duration_since(last).as_millis() < 1000 && dx <= 10 && dy <= 10
    }
}

/// Returns a built-in default icon (a plain gray box) used whenever a
/// `.info` parse fails or no sidecar file exists (spec.md SS4.A "Failure").
pub fn default_icon(kind: IconKind) -> DecodedIcon {
    const SIZE: u16 = 32;
    let fill = match kind {
        IconKind::Drawer => CLASSIC_PALETTE[6],
        IconKind::Device => CLASSIC_PALETTE[3],
        _ => CLASSIC_PALETTE[0],
    };
    let normal = RgbaImage { width: SIZE, height: SIZE, pixels: vec![fill; SIZE as usize * SIZE as usize] };
    let selected = normal.darkened();
    DecodedIcon { normal, selected }
}

/// Parses `bytes` as a `.info` file, never failing the caller: on any parse
/// error, logs a warning and substitutes the default icon for `kind`
/// (spec.md SS4.A "Never abort").
pub fn load_icon_or_default(bytes: Option<&[u8]>, path: &std::path::Path, kind: IconKind) -> DecodedIcon {
    match bytes {
        Some(bytes) => match codec::parse_info_file(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("icon decode failed for {}: {}", path.display(), err);
                default_icon(kind)
            },
        },
        None => default_icon(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn icon() -> FileIcon {
        FileIcon::new(
            "Home".into(),
            "/home/u".into(),
            IconKind::Drawer,
            default_icon(IconKind::Drawer),
            0,
        )
    }

    #[test]
    fn display_label_truncates_long_names() {
        let mut icon = icon();
        icon.label = "a_very_long_name".into();
        assert_eq!(icon.display_label(), "a_very_lon..");
    }

    #[test]
    fn double_click_requires_proximity_and_timeout() {
        let mut icon = icon();
        icon.last_click_time = Some(Instant::now() - Duration::from_millis(400));
        assert!(icon.is_double_click(Instant::now(), icon.x + 3, icon.y - 2));

        icon.last_click_time = Some(Instant::now() - Duration::from_millis(1800));
        assert!(!icon.is_double_click(Instant::now(), icon.x, icon.y));

        icon.last_click_time = Some(Instant::now());
        assert!(!icon.is_double_click(Instant::now(), icon.x + 50, icon.y));
    }
}
