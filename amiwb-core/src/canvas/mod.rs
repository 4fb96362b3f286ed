//! The canvas store -- the universal drawable unit (spec.md SS3, SS4.B).
//!
//! A `Canvas` is the one type every other subsystem shares: intuition mutates
//! its WM state, the compositor mutates its render state, workbench mutates
//! its view state, the menu system owns the handful that are `Menu` kind.
//! Nothing here touches the X server directly -- this module is plain state,
//! kept that way so it can be unit tested without a display connection.

mod kind;
mod store;

pub use kind::CanvasKind;
pub use store::{CanvasStore, MAX_WINDOWS};

use std::fmt;
use std::path::PathBuf;
use x11rb::protocol::damage::Damage;
use x11rb::protocol::render::Picture;
use x11rb::protocol::xproto::{Pixmap, Window};

/// Index into [`CanvasStore`]. Per spec.md SS9 "model these as index-based
/// references ... never as owned pointers", every cross-canvas reference
/// (transient parent, iconified back-reference) is one of these rather than
/// a `&Canvas` or `Rc<Canvas>`.
pub type CanvasId = usize;

/// Simple (x, y, w, h) rectangle in root-relative pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Smallest rectangle containing both `self` and `other`. Used to
    /// accumulate per-frame damage bounds (spec.md SS4.C "damage accumulates
    /// as a single bounding rectangle per frame").
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.w as i32).max(other.x + other.w as i32);
        let y1 = (self.y + self.h as i32).max(other.y + other.h as i32);
        Rect { x: x0, y: y0, w: (x1 - x0).max(0) as u32, h: (y1 - y0).max(0) as u32 }
    }

    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.x + self.w as i32 && py >= self.y && py < self.y + self.h as i32
    }
}

/// View mode for a workbench window's icon layout (spec.md SS4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Icons,
    Names,
}

/// Frame gadgets that can be pressed ("armed") on a canvas's titlebar/border,
/// plus the four scrollbar arrow buttons (spec.md SS3 "per-gadget armed
/// flags").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GadgetArmed {
    pub close: bool,
    pub iconify: bool,
    pub maximize: bool,
    pub lower: bool,
    pub resize: bool,
    pub scroll_up: bool,
    pub scroll_down: bool,
    pub scroll_left: bool,
    pub scroll_right: bool,
}

impl GadgetArmed {
    pub fn clear(&mut self) {
        *self = GadgetArmed::default();
    }
}

/// ICCCM `WM_NORMAL_HINTS`-derived size constraints (spec.md SS3, SS4.D
/// step 6).
#[derive(Debug, Clone, Copy)]
pub struct SizeHints {
    pub min_w: u32,
    pub min_h: u32,
    pub max_w: u32,
    pub max_h: u32,
    pub resize_x_allowed: bool,
    pub resize_y_allowed: bool,
}

impl Default for SizeHints {
    fn default() -> Self {
        // No hints published: unconstrained but resizable, matching the
        // ICCCM fallback of base==1x1, max==infinite.
        Self { min_w: 1, min_h: 1, max_w: u32::MAX, max_h: u32::MAX, resize_x_allowed: true, resize_y_allowed: true }
    }
}

/// Render resources a canvas owns once mapped. Everything here must be torn
/// down by [`CanvasStore::destroy`] in the order spec.md SS5 describes:
/// flush, free pictures, free pixmaps, free damage, destroy windows.
#[derive(Debug, Clone, Default)]
pub struct CompositorState {
    /// The window's redirected offscreen pixmap (`XCompositeNameWindowPixmap`).
    pub pixmap: Option<Pixmap>,
    /// A render Picture sampled from `pixmap`.
    pub picture: Option<Picture>,
    /// `RawRectangles`-mode damage handle for this window.
    pub damage: Option<Damage>,
    /// Set whenever new damage has arrived and not yet been composited.
    pub needs_repaint: bool,
    pub visible: bool,
    pub mapped: bool,
    pub hidden_by_app: bool,
    /// Bounding rectangle of all damage accumulated since the last repaint.
    pub damage_bounds: Option<Rect>,
}

/// Window-manager state every non-Desktop canvas carries (spec.md SS3 "WM
/// state").
#[derive(Debug, Clone)]
pub struct WmState {
    pub active: bool,
    pub gadgets: GadgetArmed,
    pub fullscreen: bool,
    pub maximized: bool,
    /// Geometry to restore to when un-maximizing / leaving fullscreen.
    pub restore_geometry: Option<Rect>,
    pub hints: SizeHints,
    pub transient_parent: Option<CanvasId>,
}

impl Default for WmState {
    fn default() -> Self {
        Self {
            active: false,
            gadgets: GadgetArmed::default(),
            fullscreen: false,
            maximized: false,
            restore_geometry: None,
            hints: SizeHints::default(),
            transient_parent: None,
        }
    }
}

/// View state for a `Window`-kind canvas backed by a directory (spec.md SS3
/// "View state (Window kind only)").
#[derive(Debug, Clone)]
pub struct ViewState {
    pub path: PathBuf,
    pub title_base: String,
    pub title_change: Option<String>,
    pub scroll_x: i32,
    pub scroll_y: i32,
    pub content_w: u32,
    pub content_h: u32,
    pub max_scroll_x: i32,
    pub max_scroll_y: i32,
    pub view_mode: ViewMode,
    pub show_hidden: bool,
}

impl ViewState {
    pub fn new(path: PathBuf, title_base: String) -> Self {
        Self {
            path,
            title_base,
            title_change: None,
            scroll_x: 0,
            scroll_y: 0,
            content_w: 0,
            content_h: 0,
            max_scroll_x: 0,
            max_scroll_y: 0,
            view_mode: ViewMode::Icons,
            show_hidden: false,
        }
    }

    /// Displayed title: the private `_AMIWB_TITLE_CHANGE` override if set,
    /// else the base title (spec.md SS4.D step 8).
    pub fn title(&self) -> &str {
        self.title_change.as_deref().unwrap_or(&self.title_base)
    }

    /// Recomputes `max_scroll_{x,y}` from content/visible size and clamps
    /// the current scroll position into range (spec.md SS3 invariant
    /// "`scroll_x in [0, max_scroll_x]` ... clamped whenever geometry or
    /// content changes").
    pub fn clamp_scroll(&mut self, visible_w: u32, visible_h: u32) {
        self.max_scroll_x = (self.content_w as i32 - visible_w as i32).max(0);
        self.max_scroll_y = (self.content_h as i32 - visible_h as i32).max(0);
        self.scroll_x = self.scroll_x.clamp(0, self.max_scroll_x);
        self.scroll_y = self.scroll_y.clamp(0, self.max_scroll_y);
    }
}

/// The universal drawable unit: desktop, framed window, menu popup, or
/// dialog (spec.md SS3).
#[derive(Debug, Clone)]
pub struct Canvas {
    pub kind: CanvasKind,
    pub frame: Window,
    pub client_window: Option<Window>,

    pub geometry: Rect,
    /// Back-buffer size, which may exceed `geometry.{w,h}` for resize
    /// amortization (spec.md SS3, SS4.D "Resize state machine").
    pub buffer_w: u32,
    pub buffer_h: u32,

    pub compositor: CompositorState,
    pub wm: WmState,
    /// `Some` only for `CanvasKind::Window`.
    pub view: Option<ViewState>,
    /// `Some` only for `CanvasKind::Window` holding a restored/iconified
    /// back-reference is tracked on the *icon*, not here; this field instead
    /// tracks whether the menubar should be hidden while this canvas is
    /// visible (used by `CanvasKind::Menu` under fullscreen, spec.md SS4.C).
    pub compositor_visible: bool,
}

impl Canvas {
    pub(crate) fn new(kind: CanvasKind, frame: Window, client_window: Option<Window>, geometry: Rect) -> Self {
        Self {
            kind,
            frame,
            client_window,
            buffer_w: geometry.w,
            buffer_h: geometry.h,
            geometry,
            compositor: CompositorState::default(),
            wm: WmState::default(),
            view: None,
            compositor_visible: true,
        }
    }

    /// Left/right/top/bottom border widths per spec.md SS3 invariant: narrow
    /// client decoration when a client is reparented, workbench decoration
    /// (wider right border for the vertical scrollbar) otherwise.
    pub fn borders(&self) -> (u32, u32, u32, u32) {
        crate::intuition::decorations::borders_for(self.client_window.is_some())
    }

    /// Content-area rectangle the client (or workbench view) occupies
    /// inside the frame (spec.md SS3 invariant 4).
    pub fn content_rect(&self) -> Rect {
        if self.wm.fullscreen {
            return Rect::new(0, 0, self.geometry.w, self.geometry.h);
        }
        let (l, r, t, b) = self.borders();
        Rect::new(
            l as i32,
            t as i32,
            self.geometry.w.saturating_sub(l + r),
            self.geometry.h.saturating_sub(t + b),
        )
    }
}

/// Errors surfaced at the canvas-store boundary (resource-exhaustion row of
/// spec.md SS7's error taxonomy -- everything else in this module is
/// infallible per SS7 "propagation is local").
#[derive(Debug)]
pub enum CanvasError {
    TooManyWindows(usize),
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CanvasError::TooManyWindows(max) => write!(f, "too many managed windows (cap: {})", max),
        }
    }
}

impl std::error::Error for CanvasError {}
