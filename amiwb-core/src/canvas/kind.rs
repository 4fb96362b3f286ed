use std::fmt;

/// Tags a [`Canvas`](super::Canvas) with the role it plays. Per the design
/// notes (spec.md SS9 "Polymorphism over canvas kind"), behavior is routed by
/// `match`/`switch` on this tag rather than virtual dispatch; per-kind
/// payload (view state, menu pointer, dialog callback) lives behind
/// `Option` fields gated by the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasKind {
    Desktop,
    Window,
    Menu,
    Dialog,
}

// Terse lowercase Display, same shape as libwmctl::model::kind::Kind.
impl fmt::Display for CanvasKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}
