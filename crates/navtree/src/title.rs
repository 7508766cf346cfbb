//! Templated item titles.
//!
//! Titles may reference template variables, e.g. `"Orders of {{ user.name }}"`.
//! Block tags (`{% ... %}`) are not evaluated; they are stripped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::context::PageContext;

static VARIABLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([\w.]+)(?:\s*\|[^}]*)?\s*\}\}").unwrap());

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{%.*?%\}").unwrap());

/// Render a title against the page context.
///
/// Filters (`{{ name|upper }}`) are ignored. Missing and null variables render
/// as an empty string.
#[must_use]
pub fn render_title(title: &str, ctx: &PageContext) -> String {
    if !title.contains("{{") {
        return title.to_owned();
    }

    let stripped = BLOCK_TAG.replace_all(title, "");
    VARIABLE_TAG
        .replace_all(&stripped, |caps: &Captures<'_>| match ctx.lookup(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
        .into_owned()
}

/// Per-request memo of rendered titles, keyed by raw title.
///
/// The page context is fixed for the lifetime of a resolver, so the raw title
/// alone identifies the rendering.
#[derive(Default)]
pub(crate) struct TitleCache {
    rendered: RefCell<HashMap<String, String>>,
}

impl TitleCache {
    pub(crate) fn render(&self, title: &str, ctx: &PageContext) -> String {
        if !title.contains("{{") {
            return title.to_owned();
        }
        if let Some(hit) = self.rendered.borrow().get(title) {
            return hit.clone();
        }
        let rendered = render_title(title, ctx);
        self.rendered
            .borrow_mut()
            .insert(title.to_owned(), rendered.clone());
        rendered
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.rendered.borrow().len()
    }
}
