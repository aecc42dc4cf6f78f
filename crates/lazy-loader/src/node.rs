//! Observer node
//!
//! Per-node state stored in the tree's arena. All mutation goes through
//! [`crate::LazyTree`]; this type only exposes read access.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use lazy_dom::{Dom, ElementId, ListenerId};

use crate::config::{Config, ThrottleMethod};
use crate::ordered_map::OrderedMap;
use crate::request::LoadRequest;
use crate::throttle::Throttle;
use crate::{LoadState, LoaderId};

/// One listener on the node's element, shared by every child subscribed
/// to its event
#[derive(Debug)]
pub(crate) struct Dispatcher {
    pub(crate) listener: ListenerId,
    pub(crate) throttle: Throttle,
}

impl Dispatcher {
    pub(crate) fn new(listener: ListenerId, method: ThrottleMethod, wait: Duration) -> Self {
        Self {
            listener,
            throttle: Throttle::new(method, wait),
        }
    }
}

pub struct LazyNode<D: Dom> {
    pub(crate) id: LoaderId,
    pub(crate) el: ElementId,
    pub(crate) events: Vec<String>,
    pub(crate) parent: Option<LoaderId>,
    pub(crate) children: OrderedMap<LoaderId, ()>,
    pub(crate) queues: HashMap<String, OrderedMap<LoaderId, ()>>,
    pub(crate) dispatchers: HashMap<String, Dispatcher>,
    pub(crate) state: LoadState,
    pub(crate) last_in_view: bool,
    pub(crate) src: String,
    pub(crate) config: Rc<Config<D>>,
    pub(crate) req: Option<LoadRequest>,
    pub(crate) destroyed: bool,
}

impl<D: Dom> LazyNode<D> {
    pub(crate) fn new(config: Config<D>, parent: Option<LoaderId>) -> Self {
        let mut events: Vec<String> = Vec::with_capacity(config.events.len());
        for event in &config.events {
            if !events.contains(event) {
                events.push(event.clone());
            }
        }
        Self {
            id: LoaderId::next(),
            el: config.el,
            events,
            parent,
            children: OrderedMap::new(),
            queues: HashMap::new(),
            dispatchers: HashMap::new(),
            state: LoadState::NotLoaded,
            last_in_view: false,
            src: config.src.clone(),
            config: Rc::new(config),
            req: None,
            destroyed: false,
        }
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn el(&self) -> ElementId {
        self.el
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn parent(&self) -> Option<LoaderId> {
        self.parent
    }

    /// Registered children in registration order
    pub fn children(&self) -> Vec<LoaderId> {
        self.children.keys()
    }

    pub fn has_child(&self, id: LoaderId) -> bool {
        self.children.has(&id)
    }

    /// Children subscribed to `event` through this node
    pub fn subscribers(&self, event: &str) -> Vec<LoaderId> {
        self.queues.get(event).map(|q| q.keys()).unwrap_or_default()
    }

    /// Listener bound on this node's element for `event`
    pub fn listener(&self, event: &str) -> Option<ListenerId> {
        self.dispatchers.get(event).map(|d| d.listener)
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Visibility computed by the last `in_view` evaluation
    pub fn last_in_view(&self) -> bool {
        self.last_in_view
    }

    /// Current source, before filters
    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn config(&self) -> &Rc<Config<D>> {
        &self.config
    }

    pub fn request(&self) -> Option<&LoadRequest> {
        self.req.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_root(&self) -> bool {
        self.config.is_root
    }
}

impl<D: Dom> std::fmt::Debug for LazyNode<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyNode")
            .field("id", &self.id)
            .field("el", &self.el)
            .field("events", &self.events)
            .field("parent", &self.parent)
            .field("children", &self.children.keys())
            .field("state", &self.state)
            .field("last_in_view", &self.last_in_view)
            .field("src", &self.src)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
