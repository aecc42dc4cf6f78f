//! Document - headless DOM host
//!
//! Flat element table with page-coordinate layout boxes, scroll
//! containers, class lists, attributes, inline styles, a listener
//! registry and a scripted network.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{Dom, ElementId, ListenerId, ListenerOptions, Rect, TransportSignal};

/// Tags that fetch their `src`
const LOADABLE_TAGS: &[&str] = &["img", "iframe", "video", "audio"];

#[derive(Debug)]
struct ElementData {
    tag: String,
    parent: Option<ElementId>,
    /// Border box in page coordinates before any ancestor scrolling
    layout: Rect,
    scroll_left: f64,
    scroll_top: f64,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    styles: Vec<(String, String)>,
}

impl ElementData {
    fn new(tag: &str, parent: Option<ElementId>, layout: Rect) -> Self {
        Self {
            tag: tag.to_string(),
            parent,
            layout,
            scroll_left: 0.0,
            scroll_top: 0.0,
            classes: Vec::new(),
            attrs: Vec::new(),
            styles: Vec::new(),
        }
    }
}

/// Scripted network. Every source loads successfully unless told otherwise.
#[derive(Debug, Default)]
pub struct Network {
    /// Remaining forced failures per source
    failures: HashMap<String, u32>,
    /// Sources that never load
    broken: HashSet<String>,
    /// Sources whose completion waits for [`Document::release`]
    held: HashSet<String>,
    /// Every source requested, in order
    requested: Vec<String>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` fetches of `src`
    pub fn fail(&mut self, src: &str, times: u32) -> &mut Self {
        self.failures.insert(src.to_string(), times);
        self
    }

    /// Fail every fetch of `src`
    pub fn break_source(&mut self, src: &str) -> &mut Self {
        self.broken.insert(src.to_string());
        self
    }

    /// Keep fetches of `src` in flight until released
    pub fn hold(&mut self, src: &str) -> &mut Self {
        self.held.insert(src.to_string());
        self
    }

    /// Sources fetched so far
    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Number of fetches of `src`
    pub fn request_count(&self, src: &str) -> usize {
        self.requested.iter().filter(|s| *s == src).count()
    }

    fn outcome(&mut self, el: ElementId, src: &str) -> TransportSignal {
        if self.broken.contains(src) {
            return TransportSignal::error(el, src);
        }
        match self.failures.get_mut(src) {
            Some(left) if *left > 0 => {
                *left -= 1;
                TransportSignal::error(el, src)
            }
            _ => TransportSignal::load(el, src),
        }
    }
}

/// Headless document
#[derive(Debug)]
pub struct Document {
    elements: Vec<ElementData>,
    viewport: Rect,
    listeners: HashMap<(ElementId, String), Vec<(ListenerId, ListenerOptions)>>,
    network: Network,
    in_flight: Vec<(ElementId, String)>,
    signals: VecDeque<TransportSignal>,
}

impl Document {
    /// Create a document with a `width` x `height` viewport scrolled to the origin
    pub fn new(width: f64, height: f64) -> Self {
        let viewport = Rect::new(0.0, 0.0, width, height);
        Self {
            elements: vec![ElementData::new("#window", None, viewport)],
            viewport,
            listeners: HashMap::new(),
            network: Network::new(),
            in_flight: Vec::new(),
            signals: VecDeque::new(),
        }
    }

    /// Append an element. `layout` is in page coordinates.
    pub fn create_element(&mut self, tag: &str, parent: Option<ElementId>, layout: Rect) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        let parent = parent.filter(|p| self.get(*p).is_some());
        self.elements.push(ElementData::new(tag, parent, layout));
        id
    }

    pub fn tag(&self, el: ElementId) -> Option<&str> {
        self.get(el).map(|e| e.tag.as_str())
    }

    pub fn set_layout(&mut self, el: ElementId, layout: Rect) {
        if el.is_window() {
            return;
        }
        if let Some(e) = self.get_mut(el) {
            e.layout = layout;
        }
    }

    /// Scroll an element. Scrolling the window moves the viewport.
    pub fn scroll_to(&mut self, el: ElementId, left: f64, top: f64) {
        if el.is_window() {
            self.viewport.left = left;
            self.viewport.top = top;
            return;
        }
        if let Some(e) = self.get_mut(el) {
            e.scroll_left = left;
            e.scroll_top = top;
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    pub fn classes(&self, el: ElementId) -> &[String] {
        self.get(el).map(|e| e.classes.as_slice()).unwrap_or(&[])
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Complete every held fetch of `src`
    pub fn release(&mut self, src: &str) {
        self.network.held.remove(src);
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.in_flight.drain(..).partition(|(_, s)| s == src);
        self.in_flight = waiting;
        for (el, src) in ready {
            let signal = self.network.outcome(el, &src);
            self.signals.push_back(signal);
        }
    }

    /// Number of fetches waiting on [`Document::release`]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn get(&self, el: ElementId) -> Option<&ElementData> {
        self.elements.get(el.0 as usize)
    }

    fn get_mut(&mut self, el: ElementId) -> Option<&mut ElementData> {
        self.elements.get_mut(el.0 as usize)
    }

    fn start_fetch(&mut self, el: ElementId, src: &str) {
        tracing::debug!("fetch {} for {:?}", src, el);
        self.network.requested.push(src.to_string());
        if self.network.held.contains(src) {
            self.in_flight.push((el, src.to_string()));
        } else {
            let signal = self.network.outcome(el, src);
            self.signals.push_back(signal);
        }
    }

    fn abort_fetch(&mut self, el: ElementId) {
        self.in_flight.retain(|(e, _)| *e != el);
        self.signals.retain(|s| s.el != el);
    }
}

impl Dom for Document {
    fn on(&mut self, el: ElementId, event: &str, listener: ListenerId, options: ListenerOptions) {
        let entry = self.listeners.entry((el, event.to_string())).or_default();
        if !entry.iter().any(|(l, _)| *l == listener) {
            entry.push((listener, options));
        }
    }

    fn off(&mut self, el: ElementId, event: &str, listener: ListenerId) {
        let key = (el, event.to_string());
        if let Some(entry) = self.listeners.get_mut(&key) {
            entry.retain(|(l, _)| *l != listener);
            if entry.is_empty() {
                self.listeners.remove(&key);
            }
        }
    }

    fn listeners(&self, el: ElementId, event: &str) -> Vec<ListenerId> {
        self.listeners
            .get(&(el, event.to_string()))
            .map(|v| v.iter().map(|(l, _)| *l).collect())
            .unwrap_or_default()
    }

    fn add_class(&mut self, el: ElementId, names: &[&str]) {
        if let Some(e) = self.get_mut(el) {
            for name in names.iter().filter(|n| !n.is_empty()) {
                if !e.classes.iter().any(|c| c == name) {
                    e.classes.push(name.to_string());
                }
            }
        }
    }

    fn remove_class(&mut self, el: ElementId, names: &[&str]) {
        if let Some(e) = self.get_mut(el) {
            e.classes.retain(|c| !names.contains(&c.as_str()));
        }
    }

    fn has_class(&self, el: ElementId, name: &str) -> bool {
        self.get(el).is_some_and(|e| e.classes.iter().any(|c| c == name))
    }

    fn attr(&mut self, el: ElementId, name: &str, value: &str) {
        let Some(e) = self.get_mut(el) else { return };
        match e.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => e.attrs.push((name.to_string(), value.to_string())),
        }
        let loadable = LOADABLE_TAGS.contains(&e.tag.as_str());
        if loadable && name == "src" {
            self.start_fetch(el, value);
        }
    }

    fn get_attr(&self, el: ElementId, name: &str) -> Option<&str> {
        self.get(el)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn remove_attr(&mut self, el: ElementId, name: &str) {
        if let Some(e) = self.get_mut(el) {
            e.attrs.retain(|(k, _)| k != name);
        }
        if name == "src" {
            self.abort_fetch(el);
        }
    }

    fn css(&mut self, el: ElementId, prop: &str, value: &str) {
        let Some(e) = self.get_mut(el) else { return };
        e.styles.retain(|(k, _)| k != prop);
        if !value.is_empty() {
            e.styles.push((prop.to_string(), value.to_string()));
        }
    }

    fn get_css(&self, el: ElementId, prop: &str) -> Option<&str> {
        self.get(el)?
            .styles
            .iter()
            .find(|(k, _)| k == prop)
            .map(|(_, v)| v.as_str())
    }

    fn parent(&self, el: ElementId) -> Option<ElementId> {
        self.get(el)?.parent
    }

    fn offset(&self, el: ElementId) -> Rect {
        if el.is_window() {
            return self.viewport;
        }
        let Some(e) = self.get(el) else {
            return Rect::default();
        };
        let mut rect = e.layout;
        let mut ancestor = e.parent;
        while let Some(id) = ancestor {
            let Some(a) = self.get(id) else { break };
            if !id.is_window() {
                rect = rect.translate(-a.scroll_left, -a.scroll_top);
            }
            ancestor = a.parent;
        }
        rect
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn create_image(&mut self) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        self.elements.push(ElementData::new("img", None, Rect::default()));
        id
    }

    fn take_signals(&mut self) -> Vec<TransportSignal> {
        self.signals.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_follows_container_scroll() {
        let mut doc = Document::new(800.0, 600.0);
        let list = doc.create_element("div", None, Rect::new(0.0, 100.0, 300.0, 200.0));
        let item = doc.create_element("img", Some(list), Rect::new(0.0, 500.0, 100.0, 100.0));

        assert_eq!(doc.offset(item).top, 500.0);
        doc.scroll_to(list, 0.0, 350.0);
        assert_eq!(doc.offset(item).top, 150.0);

        // Window scrolling moves the viewport, not the page
        doc.scroll_to(ElementId::WINDOW, 0.0, 1000.0);
        assert_eq!(doc.offset(item).top, 150.0);
        assert_eq!(doc.viewport().top, 1000.0);
    }

    #[test]
    fn test_src_on_img_fetches() {
        let mut doc = Document::new(800.0, 600.0);
        let img = doc.create_element("img", None, Rect::default());
        let div = doc.create_element("div", None, Rect::default());

        doc.attr(div, "src", "a.png");
        assert!(doc.take_signals().is_empty());

        doc.attr(img, "src", "a.png");
        let signals = doc.take_signals();
        assert_eq!(signals, vec![TransportSignal::load(img, "a.png")]);
    }

    #[test]
    fn test_scripted_failures() {
        let mut doc = Document::new(800.0, 600.0);
        let img = doc.create_element("img", None, Rect::default());
        doc.network_mut().fail("a.png", 1);

        doc.attr(img, "src", "a.png");
        doc.attr(img, "src", "a.png");
        let signals = doc.take_signals();
        assert!(!signals[0].is_load());
        assert!(signals[1].is_load());
        assert_eq!(doc.network().request_count("a.png"), 2);
    }

    #[test]
    fn test_remove_src_aborts() {
        let mut doc = Document::new(800.0, 600.0);
        let img = doc.create_element("img", None, Rect::default());
        doc.network_mut().hold("slow.png");

        doc.attr(img, "src", "slow.png");
        assert_eq!(doc.in_flight(), 1);
        doc.remove_attr(img, "src");
        assert_eq!(doc.in_flight(), 0);
        doc.release("slow.png");
        assert!(doc.take_signals().is_empty());
    }
}
