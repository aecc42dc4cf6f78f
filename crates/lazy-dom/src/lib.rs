//! lazyview DOM - capability interface
//!
//! The engine never touches a real DOM. Everything it needs from the host
//! goes through the [`Dom`] trait: listeners, classes, attributes, inline
//! styles, geometry and the resource transport. [`Document`] is a headless
//! implementation used by tests and the demo driver.

mod document;
mod events;
mod geometry;

pub use document::{Document, Network};
pub use events::{ListenerId, ListenerOptions, SignalKind, TransportSignal, RESIZE, SCROLL};
pub use geometry::{Insets, Rect};

/// Element handle (index into the host's element table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

impl ElementId {
    /// The window. Always visible, its offset is the viewport.
    pub const WINDOW: ElementId = ElementId(0);

    pub fn is_window(self) -> bool {
        self == Self::WINDOW
    }
}

/// Host capabilities consumed by the engine.
///
/// Geometry is in page coordinates: [`Dom::viewport`] is the visible part of
/// the page (scroll offset and inner size) and [`Dom::offset`] is an
/// element's border box after ancestor scrolling.
pub trait Dom {
    /// Register `listener` for `event` on `el`
    fn on(&mut self, el: ElementId, event: &str, listener: ListenerId, options: ListenerOptions);

    /// Remove a listener registered with [`Dom::on`]
    fn off(&mut self, el: ElementId, event: &str, listener: ListenerId);

    /// Listeners currently registered for `event` on `el`, in registration order
    fn listeners(&self, el: ElementId, event: &str) -> Vec<ListenerId>;

    /// Add class names. Empty names are ignored.
    fn add_class(&mut self, el: ElementId, names: &[&str]);

    /// Remove class names. Empty names are ignored.
    fn remove_class(&mut self, el: ElementId, names: &[&str]);

    fn has_class(&self, el: ElementId, name: &str) -> bool;

    /// Set an attribute. Setting `src` on a loadable element starts a fetch.
    fn attr(&mut self, el: ElementId, name: &str, value: &str);

    fn get_attr(&self, el: ElementId, name: &str) -> Option<&str>;

    /// Remove an attribute. Removing `src` aborts an in-flight fetch.
    fn remove_attr(&mut self, el: ElementId, name: &str);

    /// Set an inline style property. An empty value removes it.
    fn css(&mut self, el: ElementId, prop: &str, value: &str);

    fn get_css(&self, el: ElementId, prop: &str) -> Option<&str>;

    fn parent(&self, el: ElementId) -> Option<ElementId>;

    fn offset(&self, el: ElementId) -> Rect;

    fn viewport(&self) -> Rect;

    /// Create a detached image used as a loading surrogate
    fn create_image(&mut self) -> ElementId;

    /// Drain completion signals produced by the transport since the last call
    fn take_signals(&mut self) -> Vec<TransportSignal>;
}
