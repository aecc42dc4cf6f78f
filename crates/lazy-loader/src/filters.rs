//! Source filters
//!
//! Ready-made [`Filter`]s for the common source rewrites.

use std::rc::Rc;

use url::Url;

use crate::config::{Filter, FilterContext};

/// Resolve relative sources against `base`. Sources that fail to parse are
/// passed through unchanged.
pub fn resolve_against(base: Url) -> Filter {
    Rc::new(move |src: String, _: &FilterContext| match base.join(&src) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::warn!("cannot resolve {:?} against {}: {}", src, base, e);
            src
        }
    })
}

/// Append `key=value` to the query string
pub fn append_query(key: &str, value: &str) -> Filter {
    let key = key.to_string();
    let value = value.to_string();
    Rc::new(move |src: String, _: &FilterContext| match Url::parse(&src) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(&key, &value);
            url.to_string()
        }
        // Relative source
        Err(_) => {
            let sep = if src.contains('?') { '&' } else { '?' };
            format!("{}{}{}={}", src, sep, key, value)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_dom::ElementId;

    const CX: FilterContext = FilterContext { el: ElementId(1) };

    #[test]
    fn test_resolve_relative() {
        let base = Url::parse("https://cdn.example.com/assets/").unwrap();
        let filter = resolve_against(base);
        assert_eq!(filter("img/a.png".into(), &CX), "https://cdn.example.com/assets/img/a.png");
        assert_eq!(filter("/b.png".into(), &CX), "https://cdn.example.com/b.png");
        assert_eq!(
            filter("https://other.example.com/c.png".into(), &CX),
            "https://other.example.com/c.png"
        );
    }

    #[test]
    fn test_append_query() {
        let filter = append_query("w", "320");
        assert_eq!(
            filter("https://cdn.example.com/a.png".into(), &CX),
            "https://cdn.example.com/a.png?w=320"
        );
        assert_eq!(filter("a.png?v=2".into(), &CX), "a.png?v=2&w=320");
        assert_eq!(filter("a.png".into(), &CX), "a.png?w=320");
    }
}
