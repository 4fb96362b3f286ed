//! Spatial window geometry persistence (spec.md SS4.E "Spatial geometry",
//! SS6). Grounded on `original_source/src/amiwb/workbench/wb_spatial.c`'s
//! exact 16-byte four-field little-endian layout, read/written via the
//! `xattr` crate -- the one dependency this module needs beyond the
//! teacher's stack, since `libwmctl` has no filesystem-xattr use.

use std::path::Path;

use tracing::{debug, warn};

use crate::canvas::Rect;

const XATTR_NAME: &str = "user.window.geometry";

/// Cascade defaults for a directory with no stored geometry (spec.md SS4.E
/// "cascade from (100, 80) by (+30, +30) per open window, wrapping after 8
/// opens").
pub const CASCADE_START_X: i32 = 100;
pub const CASCADE_START_Y: i32 = 80;
pub const CASCADE_OFFSET: i32 = 30;
pub const CASCADE_MAX: u32 = 8;
pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 300;

/// Reads the `user.window.geometry` xattr on `path`, if present (spec.md
/// SS4.E "On open, if the xattr is present, use it").
pub fn read_geometry(path: &Path) -> Option<Rect> {
    let bytes = match xattr::get(path, XATTR_NAME) {
        Ok(Some(b)) => b,
        Ok(None) => return None,
        Err(err) => {
            warn!("spatial: xattr read failed for {}: {}", path.display(), err);
            return None;
        },
    };
    decode(&bytes)
}

/// Writes `geometry` to `path`'s xattr (spec.md SS4.E "Save on drag-end,
/// resize-end, and window close"). Failure (e.g. unsupported filesystem) is
/// logged and otherwise ignored -- spatial persistence is a convenience,
/// not a correctness requirement.
pub fn write_geometry(path: &Path, geometry: Rect) {
    let bytes = encode(geometry);
    if let Err(err) = xattr::set(path, XATTR_NAME, &bytes) {
        warn!("spatial: xattr write failed for {}: {}", path.display(), err);
    } else {
        debug!("spatial: saved geometry for {}: {:?}", path.display(), geometry);
    }
}

fn encode(geometry: Rect) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&geometry.x.to_le_bytes());
    out[4..8].copy_from_slice(&geometry.y.to_le_bytes());
    out[8..12].copy_from_slice(&(geometry.w as i32).to_le_bytes());
    out[12..16].copy_from_slice(&(geometry.h as i32).to_le_bytes());
    out
}

fn decode(bytes: &[u8]) -> Option<Rect> {
    if bytes.len() != 16 {
        return None;
    }
    let x = i32::from_le_bytes(bytes[0..4].try_into().ok()?);
    let y = i32::from_le_bytes(bytes[4..8].try_into().ok()?);
    let w = i32::from_le_bytes(bytes[8..12].try_into().ok()?);
    let h = i32::from_le_bytes(bytes[12..16].try_into().ok()?);
    Some(Rect::new(x, y, w.max(0) as u32, h.max(0) as u32))
}

/// Cascade position for the `n`th window opened without a stored geometry,
/// wrapping every [`CASCADE_MAX`] opens (spec.md SS4.E).
pub fn cascade_position(n: u32) -> (i32, i32) {
    let step = (n % CASCADE_MAX) as i32;
    (CASCADE_START_X + step * CASCADE_OFFSET, CASCADE_START_Y + step * CASCADE_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let rect = Rect::new(-5, 80, 640, 480);
        let bytes = encode(rect);
        assert_eq!(decode(&bytes), Some(rect));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(decode(&[0u8; 8]), None);
    }

    #[test]
    fn cascade_wraps_after_eight() {
        assert_eq!(cascade_position(0), (100, 80));
        assert_eq!(cascade_position(1), (130, 110));
        assert_eq!(cascade_position(8), (100, 80));
        assert_eq!(cascade_position(9), (130, 110));
    }
}
