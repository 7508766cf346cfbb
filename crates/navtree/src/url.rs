//! URL reversal for pattern items.
//!
//! Items with `urlaspattern` set store `"route_name arg1 arg2"` instead of a
//! path. The route name is handed to a [`UrlReverser`] together with the
//! arguments resolved against the page context.

use std::collections::HashMap;

use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters escaped when turning a request path into a URI.
///
/// Reserved characters and `%` are kept so already-encoded paths compare equal.
const IRI: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Characters escaped inside a route argument.
const PATH_ARG: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@')
    .remove(b'/');

/// Percent-encode the non-URI characters of a path.
///
/// `/каталог/` becomes `/%D0%BA%D0%B0%D1%82%D0%B0%D0%BB%D0%BE%D0%B3/`.
#[must_use]
pub fn iri_to_uri(iri: &str) -> String {
    utf8_percent_encode(iri, IRI).to_string()
}

/// Turns a route name and arguments into a path.
pub trait UrlReverser: Send + Sync {
    /// Build the path for `name`.
    ///
    /// Returns `None` when the route is unknown or the arguments don't fit.
    fn reverse(&self, name: &str, args: &[String], current_app: &str) -> Option<String>;
}

/// Reverser that knows no routes; every pattern item resolves to the unresolved marker.
pub struct NoRoutes;

impl UrlReverser for NoRoutes {
    fn reverse(&self, _name: &str, _args: &[String], _current_app: &str) -> Option<String> {
        None
    }
}

/// Route templates keyed by name.
///
/// Templates contain `<placeholder>` segments filled positionally:
///
/// ```
/// use navtree::{RouteTable, UrlReverser};
///
/// let routes = RouteTable::new().route("product_detail", "/products/<id>/");
/// assert_eq!(
///     routes.reverse("product_detail", &["42".to_owned()], ""),
///     Some("/products/42/".to_owned())
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Vec<Segment>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder,
}

fn parse_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_owned()));
        }
        segments.push(Segment::Placeholder);
        rest = &rest[start + len + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_owned()));
    }
    segments
}

impl RouteTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, builder style.
    #[must_use]
    pub fn route(mut self, name: impl Into<String>, template: &str) -> Self {
        self.insert(name, template);
        self
    }

    /// Add or replace a route.
    pub fn insert(&mut self, name: impl Into<String>, template: &str) {
        self.routes.insert(name.into(), parse_template(template));
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl UrlReverser for RouteTable {
    fn reverse(&self, name: &str, args: &[String], _current_app: &str) -> Option<String> {
        let segments = self.routes.get(name)?;
        let placeholders = segments
            .iter()
            .filter(|s| **s == Segment::Placeholder)
            .count();
        if placeholders != args.len() {
            return None;
        }

        let mut args = args.iter();
        let mut path = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Placeholder => {
                    let arg = args.next()?;
                    path.extend(utf8_percent_encode(arg, PATH_ARG));
                }
            }
        }
        Some(path)
    }
}
