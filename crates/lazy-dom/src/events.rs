//! Events
//!
//! Listener handles, listener options and transport completion signals.

/// Scroll event name
pub const SCROLL: &str = "scroll";

/// Resize event name
pub const RESIZE: &str = "resize";

/// Opaque listener handle. The owner of the listener picks the value and
/// routes it back to itself when the event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Listener options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
}

impl ListenerOptions {
    /// Passive, bubbling listener (never calls preventDefault)
    pub const PASSIVE: ListenerOptions = ListenerOptions { capture: false, passive: true };
}

/// Outcome reported by the transport for one resource handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// `onload`
    Load,
    /// `onerror`
    Error,
}

/// Completion signal for the resource assigned to `el`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSignal {
    pub el: crate::ElementId,
    pub src: String,
    pub kind: SignalKind,
}

impl TransportSignal {
    pub fn load(el: crate::ElementId, src: &str) -> Self {
        Self { el, src: src.to_string(), kind: SignalKind::Load }
    }

    pub fn error(el: crate::ElementId, src: &str) -> Self {
        Self { el, src: src.to_string(), kind: SignalKind::Error }
    }

    pub fn is_load(&self) -> bool {
        self.kind == SignalKind::Load
    }
}
