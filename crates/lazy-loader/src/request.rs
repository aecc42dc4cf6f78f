//! Load requests
//!
//! One [`LoadRequest`] is one attempt sequence for one node: the source is
//! filtered once, assigned to the load element, and re-assigned on failure
//! according to the retry policy. The request never calls back into the
//! tree; [`LoadRequest::settle`] turns a transport signal into a [`Step`]
//! the tree carries out. A canceled request settles every signal to
//! [`Step::Ignored`].

use std::fmt;
use std::rc::Rc;

use lazy_dom::{Dom, ElementId, SignalKind};

use crate::config::{Filter, FilterContext};

/// Custom retry policy, consulted after each failed attempt
pub type RetryFn = Rc<dyn Fn(&RetryInfo<'_>) -> RetryDecision>;

/// Retry policy
#[derive(Clone)]
pub enum Retry {
    /// 0 = no retry, -1 = retry forever, n = at most n retries
    Count(i32),
    Custom(RetryFn),
}

impl Retry {
    pub const NONE: Retry = Retry::Count(0);
    pub const FOREVER: Retry = Retry::Count(-1);

    pub fn custom(policy: impl Fn(&RetryInfo<'_>) -> RetryDecision + 'static) -> Self {
        Retry::Custom(Rc::new(policy))
    }
}

impl Default for Retry {
    fn default() -> Self {
        Retry::NONE
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retry::Count(n) => f.debug_tuple("Count").field(n).finish(),
            Retry::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// What a custom retry policy wants next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Load again, optionally from a replacement source
    Next(Option<String>),
    /// End the attempt sequence with a terminal error
    GiveUp,
    /// Decide later through [`crate::LazyTree::resume`]
    Defer,
}

/// Request info shared by every notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadInfo {
    pub el: ElementId,
    /// Source currently assigned, after filters
    pub src: String,
    /// Source as configured, before filters
    pub original_src: String,
}

/// Error notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub info: LoadInfo,
    /// The attempt sequence is over
    pub is_end: bool,
}

/// Input to a custom retry policy
pub struct RetryInfo<'a> {
    pub el: ElementId,
    pub src: &'a str,
    pub original_src: &'a str,
    /// Reloads issued so far
    pub attempts: u32,
    filters: &'a [Filter],
}

impl RetryInfo<'_> {
    /// Run the node's filter pipeline on a replacement source
    pub fn apply_filters(&self, src: &str) -> String {
        apply_filters(self.filters, self.el, src)
    }
}

/// Everything needed to start a request
pub struct RequestSpec {
    pub el: ElementId,
    /// Element whose `src` is assigned; differs from `el` for background images
    pub load_el: ElementId,
    pub src: String,
    pub retry: Retry,
    pub filters: Vec<Filter>,
}

/// Result of feeding one transport signal to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Canceled request, nothing to do
    Ignored,
    Loaded(LoadInfo),
    /// Notify the non-terminal error, then reload the same source
    Retry(ErrorInfo),
    /// Notify the non-terminal error, then ask the custom policy
    Consult(ErrorInfo),
    /// Terminal error
    Exhausted(ErrorInfo),
}

pub struct LoadRequest {
    el: ElementId,
    load_el: ElementId,
    original_src: String,
    src: String,
    retry: Retry,
    attempts: u32,
    canceled: bool,
    filters: Vec<Filter>,
}

fn apply_filters(filters: &[Filter], el: ElementId, src: &str) -> String {
    let cx = FilterContext { el };
    filters
        .iter()
        .fold(src.to_string(), |last, filter| filter(last, &cx))
}

impl LoadRequest {
    /// Build a request; the filter pipeline runs here, once.
    pub fn new(spec: RequestSpec) -> Self {
        let src = apply_filters(&spec.filters, spec.el, &spec.src);
        Self {
            el: spec.el,
            load_el: spec.load_el,
            original_src: spec.src,
            src,
            retry: spec.retry,
            attempts: 0,
            canceled: false,
            filters: spec.filters,
        }
    }

    /// Assign the source to the load element
    pub fn issue<D: Dom + ?Sized>(&self, dom: &mut D) -> LoadInfo {
        dom.remove_attr(self.load_el, "src");
        dom.attr(self.load_el, "src", &self.src);
        self.info()
    }

    /// Issue again, optionally from a new source
    pub fn reissue<D: Dom + ?Sized>(&mut self, dom: &mut D, src: Option<String>) -> LoadInfo {
        if let Some(src) = src.filter(|s| !s.is_empty()) {
            self.src = src;
        }
        self.attempts += 1;
        self.issue(dom)
    }

    pub fn settle(&mut self, kind: SignalKind) -> Step {
        if self.canceled {
            return Step::Ignored;
        }
        if kind == SignalKind::Load {
            return Step::Loaded(self.info());
        }
        let budget = match self.retry {
            Retry::Custom(_) => return Step::Consult(self.error(false)),
            Retry::Count(n) => n,
        };
        if budget == -1 || budget > 0 {
            if budget > 0 {
                self.retry = Retry::Count(budget - 1);
            }
            Step::Retry(self.error(false))
        } else {
            Step::Exhausted(self.error(true))
        }
    }

    /// Terminal error for a custom policy that gave up
    pub fn give_up(&self) -> ErrorInfo {
        self.error(true)
    }

    pub fn custom_policy(&self) -> Option<RetryFn> {
        match &self.retry {
            Retry::Custom(policy) => Some(policy.clone()),
            Retry::Count(_) => None,
        }
    }

    pub fn retry_info(&self) -> RetryInfo<'_> {
        RetryInfo {
            el: self.el,
            src: &self.src,
            original_src: &self.original_src,
            attempts: self.attempts,
            filters: &self.filters,
        }
    }

    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub fn info(&self) -> LoadInfo {
        LoadInfo {
            el: self.el,
            src: self.src.clone(),
            original_src: self.original_src.clone(),
        }
    }

    fn error(&self, is_end: bool) -> ErrorInfo {
        ErrorInfo { info: self.info(), is_end }
    }

    pub fn el(&self) -> ElementId {
        self.el
    }

    pub fn load_el(&self) -> ElementId {
        self.load_el
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn original_src(&self) -> &str {
        &self.original_src
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("el", &self.el)
            .field("load_el", &self.load_el)
            .field("src", &self.src)
            .field("original_src", &self.original_src)
            .field("retry", &self.retry)
            .field("attempts", &self.attempts)
            .field("canceled", &self.canceled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_dom::{Document, Rect};

    fn spec(el: ElementId, src: &str, retry: Retry) -> RequestSpec {
        RequestSpec {
            el,
            load_el: el,
            src: src.to_string(),
            retry,
            filters: Vec::new(),
        }
    }

    #[test]
    fn test_filters_run_in_order() {
        let upper: Filter = Rc::new(|s: String, _: &FilterContext| s.to_uppercase());
        let suffix: Filter = Rc::new(|s: String, cx: &FilterContext| format!("{}?el={}", s, cx.el.0));
        let req = LoadRequest::new(RequestSpec {
            filters: vec![upper, suffix],
            ..spec(ElementId(7), "a.png", Retry::NONE)
        });
        assert_eq!(req.src(), "A.PNG?el=7");
        assert_eq!(req.original_src(), "a.png");
    }

    #[test]
    fn test_issue_assigns_src() {
        let mut doc = Document::new(800.0, 600.0);
        let img = doc.create_element("img", None, Rect::default());
        let req = LoadRequest::new(spec(img, "a.png", Retry::NONE));

        let info = req.issue(&mut doc);
        assert_eq!(info.src, "a.png");
        assert_eq!(doc.get_attr(img, "src"), Some("a.png"));
        assert_eq!(doc.take_signals().len(), 1);
    }

    #[test]
    fn test_count_budget() {
        let mut req = LoadRequest::new(spec(ElementId(1), "a.png", Retry::Count(2)));
        assert!(matches!(req.settle(SignalKind::Error), Step::Retry(ref e) if !e.is_end));
        assert!(matches!(req.settle(SignalKind::Error), Step::Retry(_)));
        assert!(matches!(req.settle(SignalKind::Error), Step::Exhausted(ref e) if e.is_end));
    }

    #[test]
    fn test_infinite_retry() {
        let mut req = LoadRequest::new(spec(ElementId(1), "a.png", Retry::FOREVER));
        for _ in 0..50 {
            assert!(matches!(req.settle(SignalKind::Error), Step::Retry(_)));
        }
        assert!(matches!(req.settle(SignalKind::Load), Step::Loaded(_)));
    }

    #[test]
    fn test_no_retry_is_terminal() {
        let mut req = LoadRequest::new(spec(ElementId(1), "a.png", Retry::NONE));
        match req.settle(SignalKind::Error) {
            Step::Exhausted(err) => {
                assert!(err.is_end);
                assert_eq!(err.info.src, "a.png");
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_canceled_ignores_late_signals() {
        let mut req = LoadRequest::new(spec(ElementId(1), "a.png", Retry::FOREVER));
        req.cancel();
        assert_eq!(req.settle(SignalKind::Load), Step::Ignored);
        assert_eq!(req.settle(SignalKind::Error), Step::Ignored);
    }

    #[test]
    fn test_custom_policy_consulted() {
        let policy = Retry::custom(|info| {
            if info.attempts < 1 {
                RetryDecision::Next(Some(info.apply_filters("fallback.png")))
            } else {
                RetryDecision::GiveUp
            }
        });
        let mut doc = Document::new(800.0, 600.0);
        let img = doc.create_element("img", None, Rect::default());
        let mut req = LoadRequest::new(spec(img, "a.png", policy));

        assert!(matches!(req.settle(SignalKind::Error), Step::Consult(_)));
        let decision = (req.custom_policy().unwrap())(&req.retry_info());
        assert_eq!(decision, RetryDecision::Next(Some("fallback.png".into())));

        let info = req.reissue(&mut doc, Some("fallback.png".into()));
        assert_eq!(info.src, "fallback.png");
        assert_eq!(info.original_src, "a.png");
        assert_eq!(req.attempts(), 1);

        let decision = (req.custom_policy().unwrap())(&req.retry_info());
        assert_eq!(decision, RetryDecision::GiveUp);
        assert!(req.give_up().is_end);
    }
}
