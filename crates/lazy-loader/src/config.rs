//! Loader configuration
//!
//! [`Options`] is what callers pass in: every field optional. [`Config`] is
//! the effective configuration of one node, resolved once at construction
//! from the caller's options and the parent's effective config, and never
//! re-derived afterwards.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use lazy_dom::{Dom, ElementId, SCROLL};
use serde::{Deserialize, Serialize};

use crate::handler::{DefaultLoadHandler, LoadHandler};
use crate::request::{ErrorInfo, LoadInfo, Retry};
use crate::LoaderId;

pub const CLASS_LOADING: &str = "lazy-loading";
pub const CLASS_LOADED: &str = "lazy-loaded";
pub const CLASS_ERR: &str = "lazy-err";

pub const DEFAULT_THROTTLE_TIME: Duration = Duration::from_millis(250);

/// Context handed to every source filter
#[derive(Debug, Clone, Copy)]
pub struct FilterContext {
    pub el: ElementId,
}

/// Source transform. Filters run in order, each receiving the previous result.
pub type Filter = Rc<dyn Fn(String, &FilterContext) -> String>;
/// Called with the request info when a load is issued or completes
pub type InfoHook = Rc<dyn Fn(&LoadInfo)>;
/// Called on every load error, terminal or not
pub type ErrorHook = Rc<dyn Fn(&ErrorInfo)>;
/// Called when a node enters or leaves its parent's view
pub type ViewHook = Rc<dyn Fn(LoaderId)>;

/// Element whose classes reflect the load status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassTarget {
    #[default]
    #[serde(rename = "self")]
    Element,
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleMethod {
    #[default]
    Debounce,
    Throttle,
}

/// How the source is applied to the element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Set the element's own `src`
    #[default]
    #[serde(rename = "default")]
    Source,
    /// Load through a detached image, then set `background-image`
    #[serde(rename = "bg")]
    Background,
}

/// Serializable subset of the root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Defaults {
    pub events: Vec<String>,
    pub class_loading: String,
    pub class_loaded: String,
    pub class_err: String,
    pub class_target: ClassTarget,
    /// 0 = no retry, -1 = retry forever, n = n retries
    pub retry: i32,
    pub once: bool,
    pub preload_ratio: f64,
    pub throttle_method: ThrottleMethod,
    /// Milliseconds
    pub throttle_time: u64,
    pub mode: Mode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            events: vec![SCROLL.to_string()],
            class_loading: CLASS_LOADING.to_string(),
            class_loaded: CLASS_LOADED.to_string(),
            class_err: CLASS_ERR.to_string(),
            class_target: ClassTarget::Element,
            retry: 0,
            once: true,
            preload_ratio: 1.0,
            throttle_method: ThrottleMethod::Debounce,
            throttle_time: DEFAULT_THROTTLE_TIME.as_millis() as u64,
            mode: Mode::Source,
        }
    }
}

/// Caller-supplied options. Unset fields are inherited.
pub struct Options<D: Dom> {
    pub el: Option<ElementId>,
    pub events: Option<Vec<String>>,
    pub class_loading: Option<String>,
    pub class_loaded: Option<String>,
    pub class_err: Option<String>,
    pub class_target: Option<ClassTarget>,
    pub retry: Option<Retry>,
    pub once: Option<bool>,
    pub preload_ratio: Option<f64>,
    pub throttle_method: Option<ThrottleMethod>,
    pub throttle_time: Option<Duration>,
    pub load_handler: Option<Rc<dyn LoadHandler<D>>>,
    pub mode: Option<Mode>,
    pub src: Option<String>,
    pub filters: Option<Vec<Filter>>,
    pub on_load: Option<InfoHook>,
    pub on_err: Option<ErrorHook>,
    pub on_req: Option<InfoHook>,
    pub on_enter: Option<ViewHook>,
    pub on_leave: Option<ViewHook>,
    pub parent: Option<LoaderId>,
    pub is_root: bool,
}

impl<D: Dom> Default for Options<D> {
    fn default() -> Self {
        Self {
            el: None,
            events: None,
            class_loading: None,
            class_loaded: None,
            class_err: None,
            class_target: None,
            retry: None,
            once: None,
            preload_ratio: None,
            throttle_method: None,
            throttle_time: None,
            load_handler: None,
            mode: None,
            src: None,
            filters: None,
            on_load: None,
            on_err: None,
            on_req: None,
            on_enter: None,
            on_leave: None,
            parent: None,
            is_root: false,
        }
    }
}

impl<D: Dom> Options<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for the scope root, watching the window
    pub fn root() -> Self {
        Self {
            is_root: true,
            ..Self::default()
        }
    }

    /// Root options carrying serialized defaults
    pub fn root_from(defaults: &Defaults) -> Self {
        Self {
            events: Some(defaults.events.clone()),
            class_loading: Some(defaults.class_loading.clone()),
            class_loaded: Some(defaults.class_loaded.clone()),
            class_err: Some(defaults.class_err.clone()),
            class_target: Some(defaults.class_target),
            retry: Some(Retry::Count(defaults.retry)),
            once: Some(defaults.once),
            preload_ratio: Some(defaults.preload_ratio),
            throttle_method: Some(defaults.throttle_method),
            throttle_time: Some(Duration::from_millis(defaults.throttle_time)),
            mode: Some(defaults.mode),
            ..Self::root()
        }
    }

    pub fn with_el(mut self, el: ElementId) -> Self {
        self.el = Some(el);
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_parent(mut self, parent: LoaderId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_events(mut self, events: &[&str]) -> Self {
        self.events = Some(events.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn with_retry(mut self, retry: Retry) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_once(mut self, once: bool) -> Self {
        self.once = Some(once);
        self
    }

    pub fn with_preload_ratio(mut self, ratio: f64) -> Self {
        self.preload_ratio = Some(ratio);
        self
    }

    pub fn with_throttle(mut self, method: ThrottleMethod, time: Duration) -> Self {
        self.throttle_method = Some(method);
        self.throttle_time = Some(time);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_class_target(mut self, target: ClassTarget) -> Self {
        self.class_target = Some(target);
        self
    }

    /// Append a filter to the pipeline
    pub fn with_filter(mut self, filter: impl Fn(String, &FilterContext) -> String + 'static) -> Self {
        self.filters.get_or_insert_with(Vec::new).push(Rc::new(filter));
        self
    }

    pub fn with_load_handler(mut self, handler: impl LoadHandler<D> + 'static) -> Self {
        self.load_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_on_load(mut self, hook: impl Fn(&LoadInfo) + 'static) -> Self {
        self.on_load = Some(Rc::new(hook));
        self
    }

    pub fn with_on_err(mut self, hook: impl Fn(&ErrorInfo) + 'static) -> Self {
        self.on_err = Some(Rc::new(hook));
        self
    }

    pub fn with_on_req(mut self, hook: impl Fn(&LoadInfo) + 'static) -> Self {
        self.on_req = Some(Rc::new(hook));
        self
    }

    pub fn with_on_enter(mut self, hook: impl Fn(LoaderId) + 'static) -> Self {
        self.on_enter = Some(Rc::new(hook));
        self
    }

    pub fn with_on_leave(mut self, hook: impl Fn(LoaderId) + 'static) -> Self {
        self.on_leave = Some(Rc::new(hook));
        self
    }
}

/// Effective configuration of one node
pub struct Config<D: Dom> {
    pub el: ElementId,
    pub events: Vec<String>,
    pub class_loading: String,
    pub class_loaded: String,
    pub class_err: String,
    pub class_target: ClassTarget,
    pub retry: Retry,
    pub once: bool,
    pub preload_ratio: f64,
    pub throttle_method: ThrottleMethod,
    pub throttle_time: Duration,
    pub load_handler: Rc<dyn LoadHandler<D>>,
    pub mode: Mode,
    /// Source at construction; the node tracks later updates itself
    pub src: String,
    pub filters: Vec<Filter>,
    pub on_load: Option<InfoHook>,
    pub on_err: Option<ErrorHook>,
    pub on_req: Option<InfoHook>,
    pub on_enter: Option<ViewHook>,
    pub on_leave: Option<ViewHook>,
    pub is_root: bool,
}

impl<D: Dom> Config<D> {
    /// Hard-coded root configuration the whole tree inherits from
    pub fn seed(defaults: &Defaults) -> Self {
        Self {
            el: ElementId::WINDOW,
            events: defaults.events.clone(),
            class_loading: defaults.class_loading.clone(),
            class_loaded: defaults.class_loaded.clone(),
            class_err: defaults.class_err.clone(),
            class_target: defaults.class_target,
            retry: Retry::Count(defaults.retry),
            once: defaults.once,
            preload_ratio: defaults.preload_ratio,
            throttle_method: defaults.throttle_method,
            throttle_time: Duration::from_millis(defaults.throttle_time),
            load_handler: Rc::new(DefaultLoadHandler),
            mode: defaults.mode,
            src: String::new(),
            filters: Vec::new(),
            on_load: None,
            on_err: None,
            on_req: None,
            on_enter: None,
            on_leave: None,
            is_root: false,
        }
    }

    /// Overlay caller options on an inherited configuration.
    ///
    /// The source and the root flag belong to the node and are never
    /// inherited. A missing element falls back to the base's element.
    pub fn resolve(options: Options<D>, base: &Config<D>) -> Self {
        Self {
            el: options.el.unwrap_or(base.el),
            events: options.events.unwrap_or_else(|| base.events.clone()),
            class_loading: options.class_loading.unwrap_or_else(|| base.class_loading.clone()),
            class_loaded: options.class_loaded.unwrap_or_else(|| base.class_loaded.clone()),
            class_err: options.class_err.unwrap_or_else(|| base.class_err.clone()),
            class_target: options.class_target.unwrap_or(base.class_target),
            retry: options.retry.unwrap_or_else(|| base.retry.clone()),
            once: options.once.unwrap_or(base.once),
            preload_ratio: options.preload_ratio.unwrap_or(base.preload_ratio),
            throttle_method: options.throttle_method.unwrap_or(base.throttle_method),
            throttle_time: options.throttle_time.unwrap_or(base.throttle_time),
            load_handler: options.load_handler.unwrap_or_else(|| base.load_handler.clone()),
            mode: options.mode.unwrap_or(base.mode),
            src: options.src.unwrap_or_default(),
            filters: options.filters.unwrap_or_else(|| base.filters.clone()),
            on_load: options.on_load.or_else(|| base.on_load.clone()),
            on_err: options.on_err.or_else(|| base.on_err.clone()),
            on_req: options.on_req.or_else(|| base.on_req.clone()),
            on_enter: options.on_enter.or_else(|| base.on_enter.clone()),
            on_leave: options.on_leave.or_else(|| base.on_leave.clone()),
            is_root: options.is_root,
        }
    }

    /// The three status classes, in the order they are cleared
    pub fn status_classes(&self) -> [&str; 3] {
        [
            self.class_loading.as_str(),
            self.class_err.as_str(),
            self.class_loaded.as_str(),
        ]
    }
}

impl<D: Dom> fmt::Debug for Config<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("el", &self.el)
            .field("events", &self.events)
            .field("class_target", &self.class_target)
            .field("retry", &self.retry)
            .field("once", &self.once)
            .field("preload_ratio", &self.preload_ratio)
            .field("throttle_method", &self.throttle_method)
            .field("throttle_time", &self.throttle_time)
            .field("mode", &self.mode)
            .field("src", &self.src)
            .field("filters", &self.filters.len())
            .field("is_root", &self.is_root)
            .finish_non_exhaustive()
    }
}

/// Options accepted by [`crate::LazyTree::update`]. Only the source can change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateOptions {
    pub src: String,
}

impl UpdateOptions {
    pub fn src(src: impl Into<String>) -> Self {
        Self { src: src.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_dom::Document;

    #[test]
    fn test_defaults_match_hard_coded_root() {
        let d = Defaults::default();
        assert_eq!(d.events, vec!["scroll".to_string()]);
        assert_eq!(d.retry, 0);
        assert!(d.once);
        assert_eq!(d.preload_ratio, 1.0);
        assert_eq!(d.throttle_method, ThrottleMethod::Debounce);
        assert_eq!(d.throttle_time, 250);
    }

    #[test]
    fn test_resolve_overlays_and_inherits() {
        let base: Config<Document> = Config::seed(&Defaults::default());
        let options = Options::new()
            .with_el(ElementId(4))
            .with_src("a.png")
            .with_once(false)
            .with_filter(|s, _| s);

        let config = Config::resolve(options, &base);
        assert_eq!(config.el, ElementId(4));
        assert_eq!(config.src, "a.png");
        assert!(!config.once);
        assert_eq!(config.filters.len(), 1);
        // Inherited
        assert_eq!(config.class_loaded, CLASS_LOADED);
        assert_eq!(config.events, vec![SCROLL.to_string()]);
        assert_eq!(config.throttle_time, DEFAULT_THROTTLE_TIME);
    }

    #[test]
    fn test_src_is_not_inherited() {
        let base: Config<Document> = Config::seed(&Defaults::default());
        let parent = Config::resolve(Options::new().with_src("parent.png"), &base);
        let child = Config::resolve(Options::new(), &parent);
        assert_eq!(child.src, "");
    }

    #[test]
    fn test_defaults_deserialize_camel_case() {
        let json = r#"{ "classLoaded": "done", "retry": 3, "throttleMethod": "throttle",
                        "classTarget": "parent", "mode": "bg", "throttleTime": 100 }"#;
        let d: Defaults = serde_json::from_str(json).unwrap();
        assert_eq!(d.class_loaded, "done");
        assert_eq!(d.retry, 3);
        assert_eq!(d.throttle_method, ThrottleMethod::Throttle);
        assert_eq!(d.class_target, ClassTarget::Parent);
        assert_eq!(d.mode, Mode::Background);
        assert_eq!(d.throttle_time, 100);
        // Unset keys fall back
        assert_eq!(d.class_err, CLASS_ERR);
        assert!(d.once);
    }
}
