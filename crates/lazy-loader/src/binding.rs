//! Binding adapter
//!
//! Thin layer a UI framework calls from its lifecycle hooks. Element
//! bindings are queued and only turned into loaders on the next
//! [`Binder::flush`] (the next tick), so a container declared later in the
//! same tick is already registered when its children resolve it by name.

use std::collections::HashMap;

use lazy_dom::{Dom, ElementId};

use crate::config::{Options, UpdateOptions};
use crate::error::LazyError;
use crate::tree::LazyTree;
use crate::LoaderId;

/// Value bound to an element: a bare source or full options
pub enum BindingValue<D: Dom> {
    Src(String),
    Options(Options<D>),
}

impl<D: Dom> BindingValue<D> {
    fn into_options(self) -> Options<D> {
        match self {
            BindingValue::Src(src) => Options::new().with_src(src),
            BindingValue::Options(options) => options,
        }
    }

    fn src(&self) -> &str {
        match self {
            BindingValue::Src(src) => src,
            BindingValue::Options(options) => options.src.as_deref().unwrap_or_default(),
        }
    }
}

impl<D: Dom> From<&str> for BindingValue<D> {
    fn from(src: &str) -> Self {
        BindingValue::Src(src.to_string())
    }
}

impl<D: Dom> From<String> for BindingValue<D> {
    fn from(src: String) -> Self {
        BindingValue::Src(src)
    }
}

impl<D: Dom> From<Options<D>> for BindingValue<D> {
    fn from(options: Options<D>) -> Self {
        BindingValue::Options(options)
    }
}

enum Pending<D: Dom> {
    Bind {
        el: ElementId,
        value: BindingValue<D>,
        ref_name: Option<String>,
    },
    Destroy(LoaderId),
}

pub struct Binder<D: Dom> {
    pending: Vec<Pending<D>>,
    bound: HashMap<ElementId, LoaderId>,
    refs: HashMap<String, LoaderId>,
}

impl<D: Dom> Default for Binder<D> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            bound: HashMap::new(),
            refs: HashMap::new(),
        }
    }
}

impl<D: Dom> Binder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a named container watching `el`. The container is checked
    /// right away. Containers default to `once = false` so they outlive
    /// their first check.
    pub fn mount_ref(
        &mut self,
        tree: &mut LazyTree<D>,
        name: &str,
        el: ElementId,
        mut options: Options<D>,
    ) -> Result<LoaderId, LazyError> {
        options.once.get_or_insert(false);
        let id = tree.create(options.with_el(el))?;
        tree.check(id, None);
        if let Some(old) = self.refs.insert(name.to_string(), id) {
            tracing::warn!("ref \"{}\" mounted twice, replacing {}", name, old);
        }
        Ok(id)
    }

    pub fn unmount_ref(&mut self, tree: &mut LazyTree<D>, name: &str) {
        if let Some(id) = self.refs.remove(name) {
            tree.destroy(id, false);
        }
    }

    /// Queue a binding for the next flush. `ref_name` names the container
    /// the loader hangs under; without one it hangs under the root.
    pub fn bind(&mut self, el: ElementId, value: impl Into<BindingValue<D>>, ref_name: Option<&str>) {
        self.pending.push(Pending::Bind {
            el,
            value: value.into(),
            ref_name: ref_name.map(str::to_string),
        });
    }

    /// Forward a changed source to the element's loader
    pub fn update(&mut self, tree: &mut LazyTree<D>, el: ElementId, value: impl Into<BindingValue<D>>) {
        let value = value.into();
        if let Some(&id) = self.bound.get(&el) {
            tree.update(id, UpdateOptions::src(value.src()));
            return;
        }
        // Not flushed yet
        for pending in self.pending.iter_mut() {
            if let Pending::Bind { el: pending_el, value: pending_value, .. } = pending {
                if *pending_el == el {
                    *pending_value = value;
                    return;
                }
            }
        }
        tracing::trace!("update for unbound element {:?}", el);
    }

    /// The element went away. Its loader is destroyed on the next flush;
    /// a binding that was never flushed is dropped.
    pub fn unbind(&mut self, el: ElementId) {
        let before = self.pending.len();
        self.pending
            .retain(|p| !matches!(p, Pending::Bind { el: pending_el, .. } if *pending_el == el));
        if self.pending.len() != before {
            return;
        }
        if let Some(id) = self.bound.remove(&el) {
            self.pending.push(Pending::Destroy(id));
        }
    }

    /// Run the queued work. Returns the loaders created.
    pub fn flush(&mut self, tree: &mut LazyTree<D>) -> Vec<LoaderId> {
        let mut created = Vec::new();
        for pending in std::mem::take(&mut self.pending) {
            match pending {
                Pending::Bind { el, value, ref_name } => {
                    let mut options = value.into_options().with_el(el);
                    if options.parent.is_none() {
                        options.parent = ref_name.and_then(|name| self.resolve_ref(tree, &name));
                    }
                    match tree.create(options) {
                        Ok(id) => {
                            self.bound.insert(el, id);
                            tree.check(id, None);
                            created.push(id);
                        }
                        Err(e) => tracing::warn!("cannot bind {:?}: {}", el, e),
                    }
                }
                Pending::Destroy(id) => tree.destroy(id, false),
            }
        }
        created
    }

    /// Container mounted under `name`. A container that already left the
    /// tree counts as missing, and the binding falls back to the root.
    fn resolve_ref(&mut self, tree: &LazyTree<D>, name: &str) -> Option<LoaderId> {
        let id = self.refs.get(name).copied();
        match id {
            Some(id) if tree.node(id).is_some_and(|n| !n.is_destroyed()) => Some(id),
            Some(id) => {
                tracing::warn!("ref \"{}\" not found (loader {} is gone)", name, id);
                self.refs.remove(name);
                None
            }
            None => {
                tracing::warn!("ref \"{}\" not found", name);
                None
            }
        }
    }

    /// Loader bound to `el`, once flushed
    pub fn loader(&self, el: ElementId) -> Option<LoaderId> {
        self.bound.get(&el).copied()
    }

    pub fn ref_loader(&self, name: &str) -> Option<LoaderId> {
        self.refs.get(name).copied()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoadState;
    use lazy_dom::{Document, Rect};

    fn setup() -> (LazyTree<Document>, Binder<Document>, ElementId) {
        let mut doc = Document::new(800.0, 600.0);
        let img = doc.create_element("img", None, Rect::new(0.0, 0.0, 100.0, 100.0));
        let mut tree = LazyTree::new(doc);
        tree.create(Options::root()).unwrap();
        (tree, Binder::new(), img)
    }

    #[test]
    fn test_bind_is_deferred_until_flush() {
        let (mut tree, mut binder, img) = setup();
        binder.bind(img, "a.png", None);
        assert!(binder.loader(img).is_none());
        assert_eq!(tree.dom().get_attr(img, "src"), None);

        let created = binder.flush(&mut tree);
        assert_eq!(created.len(), 1);
        let id = binder.loader(img).unwrap();
        assert_eq!(tree.state(id), Some(LoadState::Loading));
        assert_eq!(tree.dom().get_attr(img, "src"), Some("a.png"));
    }

    #[test]
    fn test_unbind_before_flush_drops_binding() {
        let (mut tree, mut binder, img) = setup();
        binder.bind(img, "a.png", None);
        binder.unbind(img);
        assert!(binder.flush(&mut tree).is_empty());
        assert!(binder.loader(img).is_none());
    }

    #[test]
    fn test_update_pending_binding() {
        let (mut tree, mut binder, img) = setup();
        binder.bind(img, "a.png", None);
        binder.update(&mut tree, img, "b.png");
        binder.flush(&mut tree);
        assert_eq!(tree.dom().get_attr(img, "src"), Some("b.png"));
    }

    #[test]
    fn test_unknown_ref_falls_back_to_root() {
        let (mut tree, mut binder, img) = setup();
        binder.bind(img, "a.png", Some("gallery"));
        binder.flush(&mut tree);
        let id = binder.loader(img).unwrap();
        assert_eq!(tree.node(id).unwrap().parent(), tree.root());
    }

    #[test]
    fn test_gone_ref_falls_back_to_root() {
        let (mut tree, mut binder, img) = setup();
        let list = tree
            .dom_mut()
            .create_element("div", None, Rect::new(0.0, 0.0, 400.0, 300.0));
        // In view with no source: completes on mount and destroys itself
        let container = binder
            .mount_ref(&mut tree, "gallery", list, Options::new().with_once(true))
            .unwrap();
        assert!(!tree.contains(container));

        binder.bind(img, "a.png", Some("gallery"));
        assert_eq!(binder.flush(&mut tree).len(), 1);
        let id = binder.loader(img).unwrap();
        assert_eq!(tree.node(id).unwrap().parent(), tree.root());
        assert_eq!(tree.dom().get_attr(img, "src"), Some("a.png"));
        assert_eq!(binder.ref_loader("gallery"), None);
    }
}
