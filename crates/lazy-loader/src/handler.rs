//! Load handlers
//!
//! A [`LoadHandler`] decides what "loading" a visible node means. The tree
//! calls [`LoadHandler::load`] when a node becomes eligible and
//! [`LoadHandler::settled`] for every completion of the node's request.

use lazy_dom::{Dom, ElementId};

use crate::config::{ClassTarget, Config, Mode};
use crate::request::{ErrorInfo, LoadInfo, RequestSpec};
use crate::tree::LazyTree;
use crate::{LoadState, LoaderId};

/// Inline style property written in background mode
pub const BACKGROUND_IMAGE: &str = "background-image";

/// Completion of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Loaded(LoadInfo),
    /// Terminal when `is_end` is set, otherwise a retry follows
    Failed(ErrorInfo),
}

pub trait LoadHandler<D: Dom> {
    /// The node is in view and not loaded yet
    fn load(&self, tree: &mut LazyTree<D>, id: LoaderId);

    /// An attempt of the node's request completed. Handlers that never
    /// start requests can ignore this.
    fn settled(&self, _tree: &mut LazyTree<D>, _id: LoaderId, _outcome: Outcome) {}
}

/// Loads the node's source into its element (or its background) and
/// reflects the status with classes
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoadHandler;

impl<D: Dom> LoadHandler<D> for DefaultLoadHandler {
    fn load(&self, tree: &mut LazyTree<D>, id: LoaderId) {
        let Some(node) = tree.node(id) else { return };
        let config = node.config().clone();
        let el = node.el();
        let src = node.src().trim().to_string();

        tree.cancel_request(id);
        if config.mode == Mode::Background {
            tree.dom_mut().css(el, BACKGROUND_IMAGE, "");
        }
        if src.is_empty() {
            tree.complete(id);
            return;
        }

        let load_el = match config.mode {
            Mode::Source => el,
            Mode::Background => tree.dom_mut().create_image(),
        };
        tree.set_state(id, LoadState::Loading);
        tree.start_request(
            id,
            RequestSpec {
                el,
                load_el,
                src,
                retry: config.retry.clone(),
                filters: config.filters.clone(),
            },
        );
        switch_class(tree.dom_mut(), &config, el, &config.class_loading);
    }

    fn settled(&self, tree: &mut LazyTree<D>, id: LoaderId, outcome: Outcome) {
        let Some(node) = tree.node(id) else { return };
        let config = node.config().clone();
        let el = node.el();

        match outcome {
            Outcome::Loaded(info) => {
                if config.mode == Mode::Background {
                    tree.dom_mut().css(el, BACKGROUND_IMAGE, &format!("url({})", info.src));
                }
                switch_class(tree.dom_mut(), &config, el, &config.class_loaded);
                tree.complete(id);
                if let Some(on_load) = &config.on_load {
                    on_load(&info);
                }
            }
            Outcome::Failed(err) => {
                if config.mode == Mode::Background {
                    tree.dom_mut().css(el, BACKGROUND_IMAGE, "");
                }
                if err.is_end {
                    switch_class(tree.dom_mut(), &config, el, &config.class_err);
                    tree.complete(id);
                }
                if let Some(on_err) = &config.on_err {
                    on_err(&err);
                }
            }
        }
    }
}

/// Element carrying the status classes
fn class_el<D: Dom>(dom: &D, config: &Config<D>, el: ElementId) -> ElementId {
    match config.class_target {
        ClassTarget::Element => el,
        ClassTarget::Parent => dom.parent(el).unwrap_or(el),
    }
}

/// Clear every status class, then add `class`
fn switch_class<D: Dom>(dom: &mut D, config: &Config<D>, el: ElementId, class: &str) {
    let target = class_el(dom, config, el);
    dom.remove_class(target, &config.status_classes());
    dom.add_class(target, &[class]);
}
