//! Modal-like dialogs (spec.md SS4.H): rename, execute, confirm, icon-info.
//!
//! Each dialog is a `Dialog`-kind [`Canvas`](crate::canvas::Canvas) reusing
//! intuition's focus/drag/render machinery (spec.md SS4.H "reusing SS4.D's
//! focus, drag, and drawing machinery"). Content layout and the concrete
//! widgets (buttons, input fields) are an external toolkit per spec.md SS1
//! "Out of scope ... dedicated toolkit widgets"; this module owns only the
//! state machine and the typed callback invoked on dismissal, the idiomatic
//! stand-in for out-parameters and boolean returns (spec.md SS9).

use crate::canvas::CanvasId;

/// How a dialog was dismissed (spec.md SS4.H "On OK/Cancel the dialog
/// invokes a typed callback").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResult {
    Ok,
    Cancel,
}

/// What kind of dialog is open, carrying the data its content needs to
/// render (spec.md SS4.H, and SS4.E's rename/delete confirmation callers).
#[derive(Debug, Clone)]
pub enum DialogKind {
    /// Prompts for a shell command line to spawn (spec.md SS4.F "open the
    /// Execute dialog").
    Execute { input: String },
    /// A single-line text prompt seeded with the entry's current name
    /// (spec.md SS4.E "Rename shows a dialog, validates the new name").
    Rename { target: std::path::PathBuf, input: String },
    /// A yes/no confirmation with a message (spec.md SS4.E "Delete prompts
    /// a confirmation dialog").
    Confirm { message: String },
    /// Read-only icon metadata display (spec.md SS1 "icon-info dialog
    /// layout").
    IconInfo { path: std::path::PathBuf, size_bytes: u64 },
    /// The child's stderr tail after a failed copy/delete/archive operation
    /// (spec.md SS7 "Show the error dialog with the child's stderr tail").
    Error { message: String },
}

/// A callback invoked once, with the dismissal result and whatever text the
/// user entered (spec.md SS4.H "invokes a typed callback"; SS9's
/// idiomatic-Rust stand-in for out-parameters).
pub type DialogCallback<E> = Box<dyn FnOnce(&mut E, DialogResult, &str)>;

/// A single open dialog: its canvas, its kind, and the callback to run on
/// dismissal. `Engine` is left generic over the caller's event-loop state
/// type so this module stays free of a dependency on the dispatcher.
pub struct Dialog<E> {
    pub canvas: CanvasId,
    pub kind: DialogKind,
    pub parent: Option<CanvasId>,
    callback: Option<DialogCallback<E>>,
}

impl<E> Dialog<E> {
    pub fn new(canvas: CanvasId, kind: DialogKind, parent: Option<CanvasId>, callback: DialogCallback<E>) -> Self {
        Self { canvas, kind, parent, callback: Some(callback) }
    }

    /// Returns the dialog's current editable text, if it has one.
    pub fn input(&self) -> Option<&str> {
        match &self.kind {
            DialogKind::Execute { input } => Some(input),
            DialogKind::Rename { input, .. } => Some(input),
            _ => None,
        }
    }

    /// Replaces the dialog's editable text, for dialogs that have one.
    pub fn set_input(&mut self, text: String) {
        match &mut self.kind {
            DialogKind::Execute { input } => *input = text,
            DialogKind::Rename { input, .. } => *input = text,
            _ => {},
        }
    }

    /// Dismisses the dialog, running its callback exactly once (spec.md
    /// SS4.H "invokes a typed callback and destroys itself"). A second call
    /// is a no-op: the callback has already been taken.
    pub fn dismiss(&mut self, engine: &mut E, result: DialogResult) {
        let text = self.input().unwrap_or_default().to_string();
        if let Some(cb) = self.callback.take() {
            cb(engine, result, &text);
        }
    }
}

/// Whether a canvas in the active-window list should be treated as
/// non-interactive while `dialog_open` is true (spec.md SS4.H "Modality is
/// advisory -- by drawing focus and disabling interaction with parents in
/// the active window list -- not enforced by a grab").
pub fn blocks_interaction(dialog_open: bool, candidate: CanvasId, dialog_parent: Option<CanvasId>) -> bool {
    dialog_open && dialog_parent == Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeEngine;

    #[test]
    fn dismiss_runs_callback_with_entered_text() {
        let log: Rc<RefCell<Vec<(DialogResult, String)>>> = Rc::new(RefCell::new(Vec::new()));
        let log2 = log.clone();
        let cb: DialogCallback<FakeEngine> = Box::new(move |_engine, result, text| {
            log2.borrow_mut().push((result, text.to_string()));
        });
        let mut dialog = Dialog::new(0, DialogKind::Rename { target: "/a".into(), input: "new_name".into() }, Some(1), cb);

        let mut engine = FakeEngine;
        dialog.dismiss(&mut engine, DialogResult::Ok);

        assert_eq!(log.borrow()[0], (DialogResult::Ok, "new_name".to_string()));
    }

    #[test]
    fn dismiss_is_idempotent() {
        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        let cb: DialogCallback<FakeEngine> = Box::new(move |_, _, _| *calls2.borrow_mut() += 1);
        let mut dialog = Dialog::new(0, DialogKind::Confirm { message: "sure?".into() }, None, cb);

        let mut engine = FakeEngine;
        dialog.dismiss(&mut engine, DialogResult::Cancel);
        dialog.dismiss(&mut engine, DialogResult::Cancel);

        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn modal_blocks_only_its_own_parent() {
        assert!(blocks_interaction(true, 5, Some(5)));
        assert!(!blocks_interaction(true, 6, Some(5)));
        assert!(!blocks_interaction(false, 5, Some(5)));
    }
}
