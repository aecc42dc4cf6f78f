//! lazyview loader
//!
//! Viewport-driven lazy loading organised as a tree of observer nodes.
//!
//! Every node watches one element. A node can only become visible once its
//! parent was seen visible, so nested scroll containers load their content
//! only after the container itself scrolled into view. Nodes subscribe to
//! events on their parent's element; each subscribed event gets one
//! debounced or throttled dispatcher shared by all subscribers.
//!
//! # Example
//! ```rust,ignore
//! use lazy_dom::{Document, ElementId, Rect, SCROLL};
//! use lazy_loader::{LazyTree, Options};
//!
//! let mut doc = Document::new(800.0, 600.0);
//! let img = doc.create_element("img", None, Rect::new(0.0, 1200.0, 100.0, 100.0));
//! let mut tree = LazyTree::new(doc);
//! tree.create(Options::root())?;
//! let id = tree.create(Options::new().with_el(img).with_src("a.png"))?;
//! tree.check(id, None);
//! ```

mod binding;
mod config;
mod error;
pub mod filters;
mod handler;
mod node;
mod ordered_map;
mod request;
mod throttle;
mod tree;
pub mod visibility;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use binding::{Binder, BindingValue};
pub use config::{
    ClassTarget, Config, Defaults, ErrorHook, Filter, FilterContext, InfoHook, Mode, Options,
    ThrottleMethod, UpdateOptions, ViewHook, CLASS_ERR, CLASS_LOADED, CLASS_LOADING,
    DEFAULT_THROTTLE_TIME,
};
pub use error::LazyError;
pub use handler::{DefaultLoadHandler, LoadHandler, Outcome, BACKGROUND_IMAGE};
pub use node::LazyNode;
pub use ordered_map::OrderedMap;
pub use request::{
    ErrorInfo, LoadInfo, LoadRequest, RequestSpec, Retry, RetryDecision, RetryFn, RetryInfo, Step,
};
pub use throttle::Throttle;
pub use tree::LazyTree;

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Loader identifier, unique per process and increasing in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub(crate) u64);

impl LoaderId {
    pub(crate) fn next() -> Self {
        LoaderId(NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Load status of a node. Ordered: a node may start loading only while
/// its state is below [`LoadState::Loading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LoadState {
    #[default]
    NotLoaded = 0,
    Loading = 1,
    /// Attempt sequence over, successfully or not
    Loaded = 2,
}
