//! Loader tree
//!
//! Arena of observer nodes addressed by [`LoaderId`]. The tree is one host
//! scope: it owns the host [`Dom`], at most one root node, the listener
//! routing table and the routing from load elements to the node whose
//! request is in flight.
//!
//! The host drives it with three inputs:
//! - [`LazyTree::handle_event`] / [`LazyTree::emit`] when a DOM event fires,
//! - [`LazyTree::advance`] as time passes (due debounce/throttle edges),
//! - [`LazyTree::pump`] to deliver transport completions.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use lazy_dom::{Dom, ElementId, ListenerId, ListenerOptions, TransportSignal};

use crate::config::{Config, Defaults, Options, UpdateOptions};
use crate::error::LazyError;
use crate::handler::Outcome;
use crate::node::{Dispatcher, LazyNode};
use crate::ordered_map::OrderedMap;
use crate::request::{LoadInfo, LoadRequest, RequestSpec, RetryDecision, Step};
use crate::visibility;
use crate::{LoadState, LoaderId};

pub struct LazyTree<D: Dom> {
    dom: D,
    nodes: HashMap<LoaderId, LazyNode<D>>,
    root: Option<LoaderId>,
    /// Listener -> (owning node, event)
    listeners: HashMap<ListenerId, (LoaderId, String)>,
    /// Load element -> node whose request is assigned to it
    requests: HashMap<ElementId, LoaderId>,
    next_listener: u64,
}

impl<D: Dom> LazyTree<D> {
    pub fn new(dom: D) -> Self {
        Self {
            dom,
            nodes: HashMap::new(),
            root: None,
            listeners: HashMap::new(),
            requests: HashMap::new(),
            next_listener: 1,
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    /// The scope root, if one is registered
    pub fn root(&self) -> Option<LoaderId> {
        self.root
    }

    pub fn node(&self, id: LoaderId) -> Option<&LazyNode<D>> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: LoaderId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes still held by the arena, destroyed ones with live children included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn state(&self, id: LoaderId) -> Option<LoadState> {
        self.nodes.get(&id).map(|n| n.state)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a node and register it with its parent.
    ///
    /// A root node seeds the hard-coded defaults and becomes the scope
    /// root. Any other node inherits the effective configuration of its
    /// explicit parent, or of the root when no parent is given.
    pub fn create(&mut self, options: Options<D>) -> Result<LoaderId, LazyError> {
        let (config, parent) = if options.is_root {
            if let Some(root) = self.root {
                return Err(LazyError::RootExists(root));
            }
            let seed = Config::seed(&Defaults::default());
            (Config::resolve(options, &seed), None)
        } else {
            let parent = match options.parent {
                Some(parent) if self.nodes.contains_key(&parent) => parent,
                Some(parent) => return Err(LazyError::UnknownParent(parent)),
                None => self.root.ok_or(LazyError::NoRoot)?,
            };
            let base = self.nodes[&parent].config.clone();
            (Config::resolve(options, &base), Some(parent))
        };

        let node = LazyNode::new(config, parent);
        let id = node.id;
        let is_root = node.config.is_root;
        tracing::debug!("create loader {} on {:?} (parent {:?})", id, node.el, parent);
        self.nodes.insert(id, node);

        if let Some(parent) = parent {
            self.add_child(parent, id)?;
        }
        if is_root {
            self.root = Some(id);
        }
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------

    /// Re-evaluate a node and, if it became eligible, load it and visit
    /// its children.
    ///
    /// With an event only the children subscribed to that event are
    /// visited. Nodes already loading or loaded are left alone and do not
    /// propagate.
    pub fn check(&mut self, id: LoaderId, event: Option<&str>) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if !self.check_one(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else { continue };
            let targets = match event {
                Some(event) => node.subscribers(event),
                None => node.children.keys(),
            };
            // Reversed so the first child is visited first
            stack.extend(targets.into_iter().rev());
        }
    }

    fn check_one(&mut self, id: LoaderId) -> bool {
        match self.nodes.get(&id) {
            Some(node) if !node.destroyed && node.state < LoadState::Loading => {}
            Some(_) => return false,
            None => {
                tracing::trace!("check on missing loader {}", id);
                return false;
            }
        }
        if !self.in_view(id) {
            return false;
        }
        let handler = self.nodes[&id].config.load_handler.clone();
        handler.load(self, id);
        true
    }

    /// Whether the node overlaps the area its parent shows.
    ///
    /// Only a parent that is the window, or that was itself seen visible
    /// on its last evaluation, can show anything. Fires `on_enter` /
    /// `on_leave` on transitions and caches the result.
    pub fn in_view(&mut self, id: LoaderId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };

        let result = match node.parent {
            Some(parent_id) => match self.nodes.get(&parent_id) {
                Some(parent) if parent.el.is_window() || parent.last_in_view => {
                    let window = self.dom.viewport();
                    let parent_is_window = parent.el.is_window();
                    let parent_rect = if parent_is_window {
                        window
                    } else {
                        self.dom.offset(parent.el)
                    };
                    let area = visibility::observed_area(
                        parent_rect,
                        window,
                        parent_is_window,
                        node.config.preload_ratio,
                    );
                    visibility::is_visible(&self.dom.offset(node.el), &area)
                }
                _ => false,
            },
            None => node.el.is_window(),
        };

        let Some(node) = self.nodes.get_mut(&id) else {
            return result;
        };
        let changed = node.last_in_view != result;
        node.last_in_view = result;

        if changed {
            let config = node.config.clone();
            let hook = if result { &config.on_enter } else { &config.on_leave };
            if let Some(hook) = hook {
                hook(id);
            }
        }
        result
    }

    // ------------------------------------------------------------------
    // Children and listeners
    // ------------------------------------------------------------------

    /// Register `child` under `parent` and subscribe it to the parent's
    /// element for each of the child's events. The first subscriber of an
    /// event binds the parent's listener for it.
    pub fn add_child(&mut self, parent: LoaderId, child: LoaderId) -> Result<(), LazyError> {
        let events = self
            .nodes
            .get(&child)
            .map(|c| c.events.clone())
            .ok_or(LazyError::UnknownNode(child))?;
        let p = self
            .nodes
            .get_mut(&parent)
            .ok_or(LazyError::UnknownNode(parent))?;

        p.children.set(child, ());
        for event in events {
            if !p.queues.contains_key(&event) {
                let listener = ListenerId(self.next_listener);
                self.next_listener += 1;

                p.queues.insert(event.clone(), OrderedMap::new());
                p.dispatchers.insert(
                    event.clone(),
                    Dispatcher::new(listener, p.config.throttle_method, p.config.throttle_time),
                );
                self.dom.on(p.el, &event, listener, ListenerOptions::PASSIVE);
                self.listeners.insert(listener, (parent, event.clone()));
                tracing::debug!("bind {} on {:?} for loader {}", event, p.el, parent);
            }
            if let Some(queue) = p.queues.get_mut(&event) {
                queue.set(child, ());
            }
        }
        Ok(())
    }

    /// Unregister `child` from `parent`. An event whose last subscriber
    /// leaves has its listener removed.
    pub fn rm_child(&mut self, parent: LoaderId, child: LoaderId) -> Result<(), LazyError> {
        let p = self
            .nodes
            .get_mut(&parent)
            .ok_or(LazyError::UnknownNode(parent))?;

        p.children.rm(&child);
        let mut emptied = Vec::new();
        for (event, queue) in p.queues.iter_mut() {
            queue.rm(&child);
            if queue.is_empty() {
                emptied.push(event.clone());
            }
        }
        for event in emptied {
            p.queues.remove(&event);
            if let Some(dispatcher) = p.dispatchers.remove(&event) {
                self.dom.off(p.el, &event, dispatcher.listener);
                self.listeners.remove(&dispatcher.listener);
                tracing::debug!("unbind {} on {:?} for loader {}", event, p.el, parent);
            }
        }

        if p.destroyed && p.children.is_empty() {
            self.reclaim(parent);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Update and teardown
    // ------------------------------------------------------------------

    /// Change the source of a node. A different source cancels the current
    /// request, resets the node and checks it again. Once-nodes ignore
    /// updates.
    pub fn update(&mut self, id: LoaderId, options: UpdateOptions) {
        let Some(node) = self.nodes.get_mut(&id) else {
            tracing::trace!("update on missing loader {}", id);
            return;
        };
        if node.config.once {
            tracing::trace!("loader {} is once, update ignored", id);
            return;
        }
        if node.src == options.src {
            return;
        }
        node.src = options.src;
        node.state = LoadState::NotLoaded;
        self.cancel_request(id);
        self.check(id, None);
    }

    /// Destroy a node. Repeated calls are no-ops.
    ///
    /// Shallow: cancel the outstanding request and detach from the parent
    /// (or clear the scope root). Deep: destroy every descendant first,
    /// bottom-up, then the node itself.
    pub fn destroy(&mut self, id: LoaderId, deep: bool) {
        match self.nodes.get(&id) {
            Some(node) if !node.destroyed => {}
            _ => return,
        }
        if deep {
            for descendant in self.post_order(id) {
                self.destroy_one(descendant);
            }
        } else {
            self.destroy_one(id);
        }
    }

    fn destroy_one(&mut self, id: LoaderId) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        if node.destroyed {
            return;
        }
        node.destroyed = true;
        let parent = node.parent;
        tracing::debug!("destroy loader {}", id);

        self.cancel_request(id);
        match parent {
            Some(parent) => {
                // Parent may already be reclaimed
                let _ = self.rm_child(parent, id);
            }
            None if self.root == Some(id) => self.root = None,
            None => {}
        }
        if self.nodes.get(&id).is_some_and(|n| n.children.is_empty()) {
            self.reclaim(id);
        }
    }

    /// Descendants of `id` in post-order, `id` last
    fn post_order(&self, id: LoaderId) -> Vec<LoaderId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.push((current, true));
            if let Some(node) = self.nodes.get(&current) {
                for child in node.children.keys().into_iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Drop a destroyed node nobody depends on any more
    fn reclaim(&mut self, id: LoaderId) {
        let Some(node) = self.nodes.remove(&id) else { return };
        for (event, dispatcher) in node.dispatchers {
            self.dom.off(node.el, &event, dispatcher.listener);
            self.listeners.remove(&dispatcher.listener);
        }
        if let Some(req) = node.req {
            if self.requests.get(&req.load_el()) == Some(&id) {
                self.requests.remove(&req.load_el());
            }
        }
        tracing::trace!("reclaimed loader {}", id);
    }

    // ------------------------------------------------------------------
    // Events and time
    // ------------------------------------------------------------------

    /// An event fired for one of the tree's listeners
    pub fn handle_event(&mut self, listener: ListenerId, now: Instant) {
        let Some((owner, event)) = self.listeners.get(&listener).cloned() else {
            tracing::trace!("event for unknown listener {:?}", listener);
            return;
        };
        let fire = self
            .nodes
            .get_mut(&owner)
            .and_then(|n| n.dispatchers.get_mut(&event))
            .is_some_and(|d| d.throttle.call(now));
        if fire {
            self.dispatch(owner, &event);
        }
    }

    /// Fire `event` on `el`: every listener the host has for it is handled
    pub fn emit(&mut self, el: ElementId, event: &str, now: Instant) {
        for listener in self.dom.listeners(el, event) {
            self.handle_event(listener, now);
        }
    }

    /// Run every dispatcher whose trailing edge is due, parents first
    pub fn advance(&mut self, now: Instant) {
        let mut due = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            for (event, dispatcher) in node.dispatchers.iter_mut() {
                if dispatcher.throttle.poll(now) {
                    due.push((*id, event.clone()));
                }
            }
        }
        due.sort();
        for (owner, event) in due {
            self.dispatch(owner, &event);
        }
    }

    /// Earliest pending trailing edge
    pub fn next_deadline(&self) -> Option<Instant> {
        self.nodes
            .values()
            .flat_map(|n| n.dispatchers.values())
            .filter_map(|d| d.throttle.deadline())
            .min()
    }

    fn dispatch(&mut self, owner: LoaderId, event: &str) {
        let Some(subscribers) = self.nodes.get(&owner).map(|n| n.subscribers(event)) else {
            return;
        };
        for child in subscribers {
            let subscribed = self
                .nodes
                .get(&owner)
                .and_then(|n| n.queues.get(event))
                .is_some_and(|q| q.has(&child));
            if subscribed {
                self.check(child, Some(event));
            }
        }
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    pub fn set_state(&mut self, id: LoaderId, state: LoadState) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = state;
        }
    }

    /// Close the attempt sequence: the node is loaded and once-nodes are
    /// destroyed
    pub fn complete(&mut self, id: LoaderId) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        node.state = LoadState::Loaded;
        let once = node.config.once;
        tracing::debug!("loader {} loaded", id);
        if once {
            self.destroy(id, false);
        }
    }

    /// Start a request for `id`, replacing any request it had
    pub fn start_request(&mut self, id: LoaderId, spec: RequestSpec) -> Option<LoadInfo> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        self.cancel_request(id);

        let request = LoadRequest::new(spec);
        let info = request.issue(&mut self.dom);
        self.requests.insert(request.load_el(), id);

        let node = self.nodes.get_mut(&id)?;
        node.req = Some(request);
        let config = node.config.clone();
        if let Some(on_req) = &config.on_req {
            on_req(&info);
        }
        Some(info)
    }

    /// Cancel the node's outstanding request; its late signals are dropped
    pub fn cancel_request(&mut self, id: LoaderId) {
        let Some(mut req) = self.nodes.get_mut(&id).and_then(|n| n.req.take()) else {
            return;
        };
        req.cancel();
        if self.requests.get(&req.load_el()) == Some(&id) {
            self.requests.remove(&req.load_el());
        }
    }

    /// Deliver transport completions. Returns how many signals were drained.
    pub fn pump(&mut self) -> usize {
        let signals = self.dom.take_signals();
        let count = signals.len();
        for signal in signals {
            self.settle(signal);
        }
        count
    }

    fn settle(&mut self, signal: TransportSignal) {
        let Some(&owner) = self.requests.get(&signal.el) else {
            tracing::trace!("dropping signal for {:?} ({})", signal.el, signal.src);
            return;
        };
        let Some(node) = self.nodes.get_mut(&owner) else {
            self.requests.remove(&signal.el);
            return;
        };
        let Some(req) = node.req.as_mut() else { return };
        // The element may still report a source it was loading before
        if signal.src != req.src() {
            tracing::trace!("dropping stale signal for {:?} ({})", signal.el, signal.src);
            return;
        }
        let step = req.settle(signal.kind);
        let handler = node.config.load_handler.clone();

        match step {
            Step::Ignored => {}
            Step::Loaded(info) => {
                self.requests.remove(&signal.el);
                handler.settled(self, owner, Outcome::Loaded(info));
            }
            Step::Retry(err) => {
                tracing::debug!("loader {} failed {}, retrying", owner, err.info.src);
                handler.settled(self, owner, Outcome::Failed(err));
                self.reissue(owner, None);
            }
            Step::Consult(err) => {
                handler.settled(self, owner, Outcome::Failed(err));
                self.consult(owner);
            }
            Step::Exhausted(err) => {
                tracing::debug!("loader {} gave up on {}", owner, err.info.src);
                self.requests.remove(&signal.el);
                handler.settled(self, owner, Outcome::Failed(err));
            }
        }
    }

    fn live_request(&mut self, id: LoaderId) -> Option<&mut LoadRequest> {
        self.nodes
            .get_mut(&id)?
            .req
            .as_mut()
            .filter(|r| !r.is_canceled())
    }

    fn reissue(&mut self, id: LoaderId, src: Option<String>) {
        let Some(node) = self.nodes.get_mut(&id) else { return };
        let Some(req) = node.req.as_mut().filter(|r| !r.is_canceled()) else {
            return;
        };
        let info = req.reissue(&mut self.dom, src);
        let config = node.config.clone();
        if let Some(on_req) = &config.on_req {
            on_req(&info);
        }
    }

    fn consult(&mut self, id: LoaderId) {
        let decision = {
            let Some(req) = self.live_request(id) else { return };
            let Some(policy) = req.custom_policy() else { return };
            policy(&req.retry_info())
        };
        self.resume(id, decision);
    }

    /// Apply a retry decision for the node's request. Used directly by
    /// hosts whose custom policy answered [`RetryDecision::Defer`].
    pub fn resume(&mut self, id: LoaderId, decision: RetryDecision) {
        match decision {
            RetryDecision::Next(src) => self.reissue(id, src),
            RetryDecision::GiveUp => {
                let Some(req) = self.live_request(id) else { return };
                let err = req.give_up();
                let load_el = req.load_el();
                self.requests.remove(&load_el);
                let Some(handler) = self.nodes.get(&id).map(|n| n.config.load_handler.clone()) else {
                    return;
                };
                handler.settled(self, id, Outcome::Failed(err));
            }
            RetryDecision::Defer => {}
        }
    }
}

impl<D: Dom + std::fmt::Debug> std::fmt::Debug for LazyTree<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTree")
            .field("dom", &self.dom)
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .field("requests", &self.requests.len())
            .finish()
    }
}
