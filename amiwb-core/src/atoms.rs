//! Cached X11 atoms used throughout the engine.
//!
//! Generalizes `libwmctl`'s `AtomCollection` (a single `_NET_ACTIVE_WINDOW` /
//! `_NET_WM_NAME` / `UTF8_STRING` trio interned once at connect time) to the
//! full set intuition, the compositor, and the menu system need. Interned
//! once via `atom_manager!` and then held for the life of the process --
//! there is no reason to re-intern an atom twice in a single-threaded,
//! single-connection program.

use x11rb::atom_manager;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::ConnectionExt as _;

atom_manager! {
    pub Atoms: AtomsCookie {
        // ICCCM
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_CLASS,
        WM_NAME,
        WM_NORMAL_HINTS,
        WM_TRANSIENT_FOR,
        WM_STATE,

        // EWMH, advertised on root per spec.md SS6
        _NET_SUPPORTED,
        _NET_WM_NAME,
        _NET_WM_STATE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_PID,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NORMAL,
        _NET_WM_WINDOW_TYPE_DIALOG,
        _NET_WM_WINDOW_TYPE_UTILITY,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_FRAME_EXTENTS,
        _NET_SUPPORTING_WM_CHECK,
        _NET_CLIENT_LIST,

        // AmiWB private properties (SS6)
        _AMIWB_TITLE_CHANGE,

        // XDND, consumed only at the drawing boundary (SS4.E)
        XdndAware,
        XdndEnter,
        XdndPosition,
        XdndStatus,
        XdndLeave,
        XdndDrop,
        XdndFinished,
        XdndActionCopy,
        XdndActionMove,

        UTF8_STRING,
        STRING,
        CARDINAL,
        ATOM,
    }
}

/// Interns the `_NET_WM_CM_S{screen}` compositor-selection atom.
///
/// Can't live in the static `atom_manager!` set above because its name is
/// parameterized by the screen number (SS4.C "Acquires the `_NET_WM_CM_S{screen}`
/// selection").
pub fn compositor_selection_atom(
    conn: &impl x11rb::connection::Connection, screen: usize,
) -> Result<x11rb::protocol::xproto::Atom, x11rb::errors::ReplyError> {
    let name = format!("_NET_WM_CM_S{}", screen);
    Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
}
