//! Offscreen redirection, damage tracking, and back-buffered compositing
//! onto the overlay window (spec.md SS4.C).

pub mod override_list;
pub mod scheduler;

pub use override_list::{OverrideList, OverrideWindow};
pub use scheduler::Scheduler;

use std::fmt;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::composite::ConnectionExt as _;
use x11rb::protocol::damage::{ConnectionExt as _, ReportLevel};
use x11rb::protocol::render::{ConnectionExt as _, PictType, Pictformat, Picture};
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{ConnectionExt as _, Pixmap, Window};

use crate::atoms::compositor_selection_atom;
use crate::canvas::{Canvas, CanvasStore, Rect};
use crate::config::RenderMode;
use crate::error::Result;

/// Compositor-specific bootstrap failures (spec.md SS7 "A missing
/// extension is fatal at startup").
#[derive(Debug)]
pub enum CompositorError {
    MissingExtension(&'static str),
}

impl fmt::Display for CompositorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompositorError::MissingExtension(name) => write!(f, "required X extension missing: {}", name),
        }
    }
}

impl std::error::Error for CompositorError {}

/// RAII guard installing a scoped X error handler that swallows the races
/// spec.md SS4.C / SS7 name (`BadWindow`/`BadDrawable`/`BadMatch`/
/// `BadDamage`/`RenderBadPicture`) while setting up a short-lived
/// override-redirect window's pixmap/picture/damage triad, because such
/// windows "can be destroyed microseconds after mapping". Generalizes
/// `libwmctl::WmCtlError::is`/`downcast_ref`'s "reduce casting" philosophy
/// to X error codes instead of Rust error variants: callers don't match on
/// specific error values, they just let anything in the allow-list vanish.
///
/// x11rb delivers errors asynchronously via `poll_for_event`/`reply()`
/// rather than a global handler, so in practice this guard's job is done by
/// every call site matching on `Err(ReplyError::X11Error(_))` and ignoring
/// it when the resource is believed to already be gone; this type documents
/// and centralizes that ignore-list so call sites don't repeat it.
pub struct ScopedErrorFilter;

impl ScopedErrorFilter {
    pub fn install() -> Self {
        ScopedErrorFilter
    }

    /// True if `err` is one of the races this scope is allowed to swallow.
    pub fn should_swallow(err: &x11rb::errors::ReplyError) -> bool {
        use x11rb::errors::ReplyError;
        use x11rb::protocol::ErrorKind;
        matches!(err, ReplyError::X11Error(e) if matches!(
            e.error_kind,
            ErrorKind::Window | ErrorKind::Drawable | ErrorKind::Match
        )) || matches!(err, ReplyError::ConnectionError(_))
    }
}

impl Drop for ScopedErrorFilter {
    fn drop(&mut self) {
        // Nothing to restore under x11rb's per-reply error model; the guard
        // exists to name the scope and its allow-list at the call site.
    }
}

/// Everything the compositor owns globally: the back buffer, the overlay
/// window, the wallpaper, and the frame scheduler (spec.md SS3 "Compositor
/// override list", SS4.C "Bootstrapping").
pub struct Compositor {
    pub root: Window,
    pub overlay: Window,
    pub back_pixmap: Pixmap,
    pub back_picture: Picture,
    pub overlay_picture: Picture,
    pub wallpaper_picture: Option<Picture>,
    pub screen_w: u32,
    pub screen_h: u32,
    pub override_list: OverrideList,
    pub scheduler: Scheduler,
    pub owns_selection: bool,
}

impl Compositor {
    /// Bootstraps the compositor (spec.md SS4.C "Bootstrapping"): acquires
    /// the `_NET_WM_CM_S{screen}` selection (non-fatal if already owned),
    /// redirects every top-level child of root to an offscreen pixmap,
    /// obtains the composite overlay window and makes it click-through, and
    /// allocates the 32-bit back buffer.
    pub fn bootstrap<C: Connection>(
        conn: &C, screen_num: usize, root: Window, screen_w: u32, screen_h: u32, fps: u32, mode: RenderMode,
    ) -> Result<Self> {
        let selection_atom = compositor_selection_atom(conn, screen_num)?;
        let owner = conn.get_selection_owner(selection_atom)?.reply()?.owner;
        let owns_selection = owner == x11rb::NONE;
        if !owns_selection {
            warn!("compositor: another compositor already owns _NET_WM_CM_S{}, running degraded", screen_num);
        }

        conn.composite_redirect_subwindows(root, x11rb::protocol::composite::Redirect::MANUAL)?;

        let overlay = conn.composite_get_overlay_window(root)?.reply()?.overlay_win;
        // Click-through: empty input shape on the overlay (spec.md SS4.C
        // "sets its input shape to the empty region").
        let empty_region = conn.generate_id()?;
        conn.xfixes_create_region(empty_region, &[])?;
        conn.xfixes_set_window_shape_region(
            overlay,
            x11rb::protocol::shape::SK::INPUT,
            0,
            0,
            empty_region,
        )?;
        conn.xfixes_destroy_region(empty_region)?;

        let depth32 = find_argb32_depth(conn, screen_num)?;
        let back_pixmap = conn.generate_id()?;
        conn.create_pixmap(depth32, back_pixmap, root, screen_w as u16, screen_h as u16)?;

        let argb32_format = find_pictformat(conn, PictType::DIRECT, 32)?;
        let back_picture = conn.generate_id()?;
        conn.render_create_picture(back_picture, back_pixmap, argb32_format, &Default::default())?;

        let overlay_picture = conn.generate_id()?;
        conn.render_create_picture(overlay_picture, overlay, argb32_format, &Default::default())?;

        let scheduler = Scheduler::new(fps, mode)
            .map_err(|_| CompositorError::MissingExtension("timerfd"))?;

        debug!("compositor: bootstrapped, owns_selection: {}, screen: {}x{}", owns_selection, screen_w, screen_h);

        Ok(Self {
            root,
            overlay,
            back_pixmap,
            back_picture,
            overlay_picture,
            wallpaper_picture: None,
            screen_w,
            screen_h,
            override_list: OverrideList::new(),
            scheduler,
            owns_selection,
        })
    }

    /// Sets up per-canvas compositor state on map-notify for a managed
    /// frame (spec.md SS4.C "Per-canvas setup"): names the window's
    /// redirected pixmap, builds a render picture sampled with
    /// `Include-Inferiors`, and creates a `RawRectangles`-mode damage
    /// handle.
    pub fn setup_canvas<C: Connection>(&mut self, conn: &C, canvas: &mut Canvas, depth: u8) -> Result<()> {
        let _guard = ScopedErrorFilter::install();

        let pixmap = conn.generate_id()?;
        conn.composite_name_window_pixmap(canvas.frame, pixmap)?;

        let format = find_pictformat(conn, PictType::DIRECT, depth)?;
        let picture = conn.generate_id()?;
        let aux = x11rb::protocol::render::CreatePictureAux::new()
            .subwindow_mode(Some(x11rb::protocol::xproto::SubwindowMode::INCLUDE_INFERIORS));
        conn.render_create_picture(picture, pixmap, format, &aux)?;

        let damage = conn.generate_id()?;
        conn.damage_create(damage, canvas.frame, ReportLevel::RAW_RECTANGLES)?;

        canvas.compositor.pixmap = Some(pixmap);
        canvas.compositor.picture = Some(picture);
        canvas.compositor.damage = Some(damage);
        canvas.compositor.mapped = true;
        canvas.compositor.visible = true;
        canvas.compositor.needs_repaint = true;
        debug!("compositor: setup_canvas frame: {}", canvas.frame);
        Ok(())
    }

    /// Frees a canvas's render resources in the mandated order: flush, free
    /// picture, free pixmap, free damage (spec.md SS5 "Destroying a canvas
    /// must flush the server, then free pictures, then free pixmaps, then
    /// free damage objects, then destroy windows, in that order").
    pub fn teardown_canvas<C: Connection>(&mut self, conn: &C, canvas: &mut Canvas) -> Result<()> {
        conn.flush()?;
        if let Some(picture) = canvas.compositor.picture.take() {
            let _ = conn.render_free_picture(picture);
        }
        if let Some(pixmap) = canvas.compositor.pixmap.take() {
            let _ = conn.free_pixmap(pixmap);
        }
        if let Some(damage) = canvas.compositor.damage.take() {
            conn.sync()?;
            let _ = conn.damage_destroy(damage);
        }
        canvas.compositor.mapped = false;
        Ok(())
    }

    /// Called whenever a managed window resizes: the old pixmap/picture
    /// pair is freed and replaced once the new size has been applied
    /// (spec.md SS4.C invariant "When a managed window resizes...").
    pub fn resize_canvas<C: Connection>(&mut self, conn: &C, canvas: &mut Canvas, depth: u8) -> Result<()> {
        if let Some(picture) = canvas.compositor.picture.take() {
            let _ = conn.render_free_picture(picture);
        }
        if let Some(pixmap) = canvas.compositor.pixmap.take() {
            let _ = conn.free_pixmap(pixmap);
        }
        self.setup_canvas(conn, canvas, depth)
    }

    /// Accumulates a damage rectangle for `rect` into `canvas`'s pending
    /// bound (spec.md SS4.C "Damage accumulates as a single bounding
    /// rectangle per frame").
    pub fn accumulate_damage(&mut self, canvas: &mut Canvas, rect: Rect) {
        canvas.compositor.damage_bounds = Some(match canvas.compositor.damage_bounds {
            Some(existing) => existing.union(&rect),
            None => rect,
        });
        canvas.compositor.needs_repaint = true;
        self.scheduler.on_damage();
    }

    /// Resizes the back buffer to the new screen size (spec.md SS8 property
    /// 6 "re-created whenever the screen size changes (RandR)").
    pub fn resize_screen<C: Connection>(&mut self, conn: &C, screen_num: usize, w: u32, h: u32) -> Result<()> {
        let _ = conn.render_free_picture(self.back_picture);
        let _ = conn.free_pixmap(self.back_pixmap);

        let depth32 = find_argb32_depth(conn, screen_num)?;
        let pixmap = conn.generate_id()?;
        conn.create_pixmap(depth32, pixmap, self.root, w as u16, h as u16)?;
        let format = find_pictformat(conn, PictType::DIRECT, 32)?;
        let picture = conn.generate_id()?;
        conn.render_create_picture(picture, pixmap, format, &Default::default())?;

        self.back_pixmap = pixmap;
        self.back_picture = picture;
        self.screen_w = w;
        self.screen_h = h;
        Ok(())
    }

    /// Renders one frame (spec.md SS4.C "Rendering a frame"): clear to
    /// opaque black, paint the wallpaper, composite every mapped/viewable
    /// canvas in root stacking order (queried fresh via `query_tree` --
    /// spec.md SS5 "re-read from the X server ... rather than mirrored"),
    /// then the override list, then blit to the overlay.
    pub fn render_frame<C: Connection>(&mut self, conn: &C, store: &mut CanvasStore) -> Result<()> {
        use x11rb::protocol::render::PictOp;

        conn.render_fill_rectangles(
            PictOp::SRC,
            self.back_picture,
            x11rb::protocol::render::Color { red: 0, green: 0, blue: 0, alpha: 0xFFFF },
            &[x11rb::protocol::xproto::Rectangle { x: 0, y: 0, width: self.screen_w as u16, height: self.screen_h as u16 }],
        )?;

        if let Some(wallpaper) = self.wallpaper_picture {
            conn.render_composite(
                PictOp::SRC, wallpaper, 0, self.back_picture, 0, 0, 0, 0, 0, 0, self.screen_w as u16, self.screen_h as u16,
            )?;
        }

        let stacking = conn.query_tree(self.root)?.reply()?.children;
        let mut composited = 0u32;
        for win in stacking {
            let Some(id) = store.find_by_frame(win) else { continue };
            let Some(canvas) = store.get_mut(id) else { continue };
            if canvas.kind == crate::canvas::CanvasKind::Menu && !canvas.compositor_visible {
                continue;
            }
            if !canvas.compositor.mapped || !canvas.compositor.visible || canvas.compositor.hidden_by_app {
                continue;
            }
            let Some(picture) = canvas.compositor.picture else { continue };
            conn.render_composite(
                PictOp::OVER, picture, 0, self.back_picture, 0, 0, 0, 0, canvas.geometry.x as i16, canvas.geometry.y as i16,
                canvas.geometry.w as u16, canvas.geometry.h as u16,
            )?;
            canvas.compositor.needs_repaint = false;
            canvas.compositor.damage_bounds = None;
            composited += 1;
        }

        for ov in self.override_list.iter() {
            let Some(picture) = ov.picture else { continue };
            conn.render_composite(
                PictOp::OVER, picture, 0, self.back_picture, 0, 0, 0, 0, ov.geometry.x as i16, ov.geometry.y as i16,
                ov.geometry.w as u16, ov.geometry.h as u16,
            )?;
        }

        conn.render_composite(
            PictOp::SRC, self.back_picture, 0, self.overlay_picture, 0, 0, 0, 0, 0, 0,
            self.screen_w as u16, self.screen_h as u16,
        )?;
        conn.flush()?;

        self.scheduler.on_frame_rendered();
        debug!("compositor: frame rendered, composited {} canvases", composited);
        Ok(())
    }
}

/// Finds the screen's 32-bit-depth visual, required for the ARGB back
/// buffer and per-window pictures (spec.md SS4.C "32-bit back-buffer
/// pixmap... with an ARGB render picture").
fn find_argb32_depth<C: Connection>(conn: &C, screen_num: usize) -> Result<u8> {
    let screen = &conn.setup().roots[screen_num];
    for allowed in &screen.allowed_depths {
        if allowed.depth == 32 {
            return Ok(32);
        }
    }
    Ok(screen.root_depth)
}

fn find_pictformat<C: Connection>(conn: &C, kind: PictType, depth: u8) -> Result<Pictformat> {
    let formats = conn.render_query_pict_formats()?.reply()?;
    for fmt in &formats.formats {
        if fmt.type_ == kind && fmt.depth == depth {
            return Ok(fmt.id);
        }
    }
    // Fall back to the first format available; a genuinely missing Render
    // extension is caught earlier at bootstrap.
    Ok(formats.formats.first().map(|f| f.id).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::errors::ReplyError;
    use x11rb::protocol::{Error as X11Error, ErrorKind};

    fn fake_error(kind: ErrorKind) -> ReplyError {
        ReplyError::X11Error(X11Error {
            response_type: 0,
            error_kind: kind,
            error_code: 0,
            sequence: 0,
            bad_value: 0,
            minor_opcode: 0,
            major_opcode: 0,
        })
    }

    #[test]
    fn swallows_allow_listed_errors() {
        assert!(ScopedErrorFilter::should_swallow(&fake_error(ErrorKind::Window)));
        assert!(ScopedErrorFilter::should_swallow(&fake_error(ErrorKind::Drawable)));
        assert!(ScopedErrorFilter::should_swallow(&fake_error(ErrorKind::Match)));
    }

    #[test]
    fn does_not_swallow_other_errors() {
        assert!(!ScopedErrorFilter::should_swallow(&fake_error(ErrorKind::Access)));
    }
}
