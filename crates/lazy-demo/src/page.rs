//! Page description
//!
//! JSON document the demo builds its headless page from.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use lazy_loader::{Defaults, Mode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub defaults: Defaults,
    /// Relative sources are resolved against this
    #[serde(default)]
    pub base_url: Option<String>,
    pub elements: Vec<ElementSpec>,
    /// Forced failures per source
    #[serde(default)]
    pub failures: HashMap<String, u32>,
    /// Sources that never load
    #[serde(default)]
    pub broken: Vec<String>,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280.0, height: 720.0 }
    }
}

#[derive(Debug, Deserialize)]
pub struct ElementSpec {
    pub name: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Name of the enclosing element
    #[serde(default)]
    pub parent: Option<String>,
    /// left, top, width, height in page coordinates
    pub rect: [f64; 4],
    #[serde(default)]
    pub src: Option<String>,
    /// Mount as a named scroll container
    #[serde(default)]
    pub container: bool,
    /// Container the loader hangs under
    #[serde(default, rename = "ref")]
    pub ref_name: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub retry: Option<i32>,
    #[serde(default)]
    pub preload_ratio: Option<f64>,
}

fn default_tag() -> String {
    "img".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ScriptStep {
    /// Milliseconds since the start of the run
    pub at: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    /// Scroll an element, `window` for the page
    Scroll {
        #[serde(default = "window")]
        target: String,
        #[serde(default)]
        left: f64,
        top: f64,
    },
    Resize { width: f64, height: f64 },
    /// Replace the source bound to an element
    Update { target: String, src: String },
    /// Remove an element's loader
    Unbind { target: String },
}

fn window() -> String {
    "window".to_string()
}

impl Page {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let page: Page = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        let json = r#"{
            "viewport": { "width": 800, "height": 600 },
            "defaults": { "retry": 1 },
            "elements": [
                { "name": "list", "tag": "div", "rect": [0, 0, 400, 300], "container": true },
                { "name": "a", "parent": "list", "rect": [0, 400, 100, 100], "src": "a.png", "ref": "list" }
            ],
            "failures": { "a.png": 1 },
            "script": [
                { "at": 0, "action": "scroll", "target": "list", "top": 200 },
                { "at": 500, "action": "resize", "width": 1024, "height": 768 }
            ]
        }"#;
        let page: Page = serde_json::from_str(json).unwrap();
        assert_eq!(page.defaults.retry, 1);
        assert_eq!(page.elements[1].tag, "img");
        assert_eq!(page.elements[1].ref_name.as_deref(), Some("list"));
        assert!(page.elements[0].container);
        assert!(matches!(
            page.script[0].action,
            Action::Scroll { ref target, top, .. } if target == "list" && top == 200.0
        ));
        assert!(page.base_url.is_none());
    }

    #[test]
    fn test_bundled_page_parses() {
        let page: Page = serde_json::from_str(include_str!("../pages/gallery.json")).unwrap();
        assert_eq!(page.defaults.throttle_time, 150);
        assert_eq!(page.elements[1].mode, Some(Mode::Background));
        assert_eq!(page.broken.len(), 1);
        assert!(matches!(page.script[0].action, Action::Scroll { ref target, .. } if target == "window"));
    }
}
