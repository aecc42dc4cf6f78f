//! lazyview demo - scroll simulation driver
//!
//! Builds a headless page from a JSON description, binds loaders to its
//! elements and replays a scroll script on virtual time.

mod page;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use lazy_dom::{Document, Dom, ElementId, Rect, RESIZE, SCROLL};
use lazy_loader::{filters, Binder, LazyTree, Options, Retry, BACKGROUND_IMAGE};
use tracing_subscriber::EnvFilter;
use url::Url;

use page::{Action, ElementSpec, Page};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path: PathBuf = std::env::args()
        .nth(1)
        .context("usage: lazy-demo <page.json>")?
        .into();
    let page = Page::load(&path)?;
    tracing::info!("Loaded page {} ({} elements)", path.display(), page.elements.len());

    let mut demo = Demo::new(&page)?;
    demo.mount(&page)?;
    demo.run(&page);
    demo.report(&page);
    Ok(())
}

struct Demo {
    tree: LazyTree<Document>,
    binder: Binder<Document>,
    names: HashMap<String, ElementId>,
    clock: Instant,
}

impl Demo {
    fn new(page: &Page) -> Result<Self> {
        let mut doc = Document::new(page.viewport.width, page.viewport.height);
        let mut names = HashMap::new();
        names.insert("window".to_string(), ElementId::WINDOW);

        for spec in &page.elements {
            let parent = match &spec.parent {
                Some(name) => match names.get(name) {
                    Some(&el) => Some(el),
                    None => bail!("element {:?}: parent {:?} must be declared first", spec.name, name),
                },
                None => None,
            };
            let [left, top, width, height] = spec.rect;
            let el = doc.create_element(&spec.tag, parent, Rect::new(left, top, width, height));
            if names.insert(spec.name.clone(), el).is_some() {
                bail!("duplicate element name {:?}", spec.name);
            }
        }

        for (src, times) in &page.failures {
            doc.network_mut().fail(src, *times);
        }
        for src in &page.broken {
            doc.network_mut().break_source(src);
        }

        let mut tree = LazyTree::new(doc);
        tree.create(root_options(page)?)?;

        Ok(Self {
            tree,
            binder: Binder::new(),
            names,
            clock: Instant::now(),
        })
    }

    /// Mount containers right away, queue every other binding for the
    /// first flush
    fn mount(&mut self, page: &Page) -> Result<()> {
        for spec in &page.elements {
            let el = self.names[&spec.name];
            let mut options = element_options(spec);
            if spec.container {
                if let Some(name) = &spec.ref_name {
                    options.parent = self.binder.ref_loader(name);
                }
                self.binder.mount_ref(&mut self.tree, &spec.name, el, options)?;
            } else if spec.src.is_some() {
                self.binder.bind(el, options, spec.ref_name.as_deref());
            }
        }
        let created = self.binder.flush(&mut self.tree);
        tracing::info!("Bound {} loaders", created.len());
        self.drain();
        Ok(())
    }

    fn run(&mut self, page: &Page) {
        let mut steps: Vec<_> = page.script.iter().collect();
        steps.sort_by_key(|s| s.at);

        for step in steps {
            let now = self.clock + Duration::from_millis(step.at);
            self.advance_to(now);
            match &step.action {
                Action::Scroll { target, left, top } => {
                    let Some(el) = self.lookup(target) else { continue };
                    tracing::info!("[{:>5}ms] scroll {} to ({}, {})", step.at, target, left, top);
                    self.tree.dom_mut().scroll_to(el, *left, *top);
                    self.tree.emit(el, SCROLL, now);
                }
                Action::Resize { width, height } => {
                    tracing::info!("[{:>5}ms] resize to {}x{}", step.at, width, height);
                    self.tree.dom_mut().resize(*width, *height);
                    self.tree.emit(ElementId::WINDOW, RESIZE, now);
                }
                Action::Update { target, src } => {
                    let Some(el) = self.lookup(target) else { continue };
                    tracing::info!("[{:>5}ms] update {} to {}", step.at, target, src);
                    self.binder.update(&mut self.tree, el, src.as_str());
                }
                Action::Unbind { target } => {
                    let Some(el) = self.lookup(target) else { continue };
                    tracing::info!("[{:>5}ms] unbind {}", step.at, target);
                    self.binder.unbind(el);
                    self.binder.flush(&mut self.tree);
                }
            }
            self.drain();
        }

        // Let pending trailing edges fire
        while let Some(deadline) = self.tree.next_deadline() {
            self.tree.advance(deadline);
            self.drain();
        }
    }

    fn advance_to(&mut self, now: Instant) {
        while let Some(deadline) = self.tree.next_deadline().filter(|d| *d <= now) {
            self.tree.advance(deadline);
            self.drain();
        }
    }

    fn drain(&mut self) {
        while self.tree.pump() > 0 {}
    }

    fn lookup(&self, name: &str) -> Option<ElementId> {
        let el = self.names.get(name).copied();
        if el.is_none() {
            tracing::warn!("unknown element {:?}", name);
        }
        el
    }

    fn report(&self, page: &Page) {
        let dom = self.tree.dom();
        println!("{:<16} {:<28} {}", "ELEMENT", "CLASSES", "SOURCE");
        for spec in page.elements.iter().filter(|s| s.src.is_some()) {
            let el = self.names[&spec.name];
            let source = dom
                .get_css(el, BACKGROUND_IMAGE)
                .or_else(|| dom.get_attr(el, "src"))
                .unwrap_or("-");
            println!("{:<16} {:<28} {}", spec.name, dom.classes(el).join(" "), source);
        }
        println!(
            "{} requests, {} loaders still attached",
            dom.network().requested().len(),
            self.tree.len().saturating_sub(1)
        );
    }
}

fn root_options(page: &Page) -> Result<Options<Document>> {
    let mut options = Options::root_from(&page.defaults)
        .with_on_req(|info| tracing::debug!("request {} for {:?}", info.src, info.el))
        .with_on_load(|info| tracing::info!("loaded {} ({:?})", info.src, info.el))
        .with_on_err(|err| {
            if err.is_end {
                tracing::warn!("failed {} ({:?})", err.info.src, err.info.el);
            } else {
                tracing::info!("retrying {} ({:?})", err.info.src, err.info.el);
            }
        });
    if let Some(base) = &page.base_url {
        let base = Url::parse(base).with_context(|| format!("invalid base_url {:?}", base))?;
        options.filters = Some(vec![filters::resolve_against(base)]);
    }
    Ok(options)
}

fn element_options(spec: &ElementSpec) -> Options<Document> {
    let mut options = Options::new();
    if let Some(src) = &spec.src {
        options = options.with_src(src.as_str());
    }
    if let Some(mode) = spec.mode {
        options = options.with_mode(mode);
    }
    if let Some(retry) = spec.retry {
        options = options.with_retry(Retry::Count(retry));
    }
    if let Some(ratio) = spec.preload_ratio {
        options = options.with_preload_ratio(ratio);
    }
    options
}
