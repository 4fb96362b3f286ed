//! AmiWB engine library.
//!
//! AmiWB reproduces the Amiga Workbench look and interaction model on top of
//! a standard X11 server. This crate hosts every subsystem described by the
//! design: the canvas store, the icon codec, the compositor, the window
//! manager ("intuition"), the workbench icon engine, the menu system, the
//! event dispatcher, and the dialog layer. The binary crate is a thin
//! wrapper that wires these together and drives the event loop.
//!
//! Everything here is single-threaded by design (see [`events`]): there is
//! no locking because only the main loop ever touches the canvas store or
//! the compositor state.

mod atoms;
pub mod canvas;
pub mod compositor;
pub mod config;
pub mod dialogs;
pub mod diskdrives;
mod error;
pub mod events;
pub mod icon;
pub mod intuition;
pub mod logging;
pub mod menu;
pub mod process;
pub mod workbench;

pub use atoms::Atoms;
pub use error::{Error, Result};

/// Re-exports commonly needed together, mirroring the flat `prelude` pattern
/// used for one-shot callers that don't want to spell out module paths.
pub mod prelude {
    pub use crate::canvas::{Canvas, CanvasKind, CanvasStore};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
}
