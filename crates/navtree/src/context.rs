//! Per-request page context.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// The user a page is rendered for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum User {
    /// Not logged in.
    #[default]
    Anonymous,
    /// Logged in, with every permission granted through the user or its groups.
    Authenticated {
        /// Login name.
        username: String,
        /// Qualified permission names (`app_label.codename`).
        permissions: BTreeSet<String>,
    },
}

impl User {
    /// Create an authenticated user.
    pub fn authenticated<I, S>(username: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Authenticated {
            username: username.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// All permissions of the user. Anonymous users have none.
    #[must_use]
    pub fn permissions(&self) -> BTreeSet<String> {
        match self {
            Self::Anonymous => BTreeSet::new(),
            Self::Authenticated { permissions, .. } => permissions.clone(),
        }
    }
}

/// The request being served.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    /// Request path, e.g. `/products/42/`.
    pub path: String,
    /// Requesting user.
    pub user: User,
    /// Name of the application serving the request.
    pub current_app: String,
}

impl Request {
    /// Create an anonymous request for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the requesting user.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// Set the serving application.
    #[must_use]
    pub fn with_current_app(mut self, app: impl Into<String>) -> Self {
        self.current_app = app.into();
        self
    }
}

/// Everything a resolution needs to know about the page being rendered.
///
/// `vars` is the template context: it feeds pattern URL arguments and
/// `{{ var }}` references in titles.
#[derive(Clone, Debug, Default)]
pub struct PageContext {
    /// Bound request, if any.
    pub request: Option<Request>,
    /// Active language code, e.g. `en`.
    pub language: String,
    /// Template variables.
    pub vars: Map<String, Value>,
    /// The page is being rendered while handling another error.
    pub handling_error: bool,
}

impl PageContext {
    /// Create a context bound to `request`.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request: Some(request),
            ..Self::default()
        }
    }

    /// Set the active language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Add a template variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Mark the context as rendered from an error-handling path.
    #[must_use]
    pub fn handling_error(mut self, handling: bool) -> Self {
        self.handling_error = handling;
        self
    }

    /// Requesting user; anonymous when no request is bound.
    #[must_use]
    pub fn user(&self) -> &User {
        static ANONYMOUS: User = User::Anonymous;
        self.request.as_ref().map_or(&ANONYMOUS, |r| &r.user)
    }

    /// Serving application; empty when no request is bound.
    #[must_use]
    pub fn current_app(&self) -> &str {
        self.request.as_ref().map_or("", |r| r.current_app.as_str())
    }

    /// Request path; `None` when no request is bound.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.path.as_str())
    }

    /// Look up a dotted variable reference such as `product.id`.
    ///
    /// Objects are indexed by key and arrays by position.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut parts = name.split('.');
        let mut value = self.vars.get(parts.next()?)?;
        for part in parts {
            value = match value {
                Value::Object(map) => map.get(part)?,
                Value::Array(list) => list.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Resolve a template token to text.
    ///
    /// Quoted tokens are string literals. Other tokens are variable references;
    /// strings, numbers and booleans render as text. A token that does not
    /// resolve, or that resolves to a list, object or null, is returned as
    /// written.
    #[must_use]
    pub fn resolve_token(&self, token: &str) -> String {
        let token = token.trim();
        if let Some(literal) = strip_quotes(token) {
            return literal.to_owned();
        }
        match self.lookup(token) {
            Some(Value::String(s)) => s.clone(),
            Some(value @ (Value::Number(_) | Value::Bool(_))) => value.to_string(),
            _ => token.to_owned(),
        }
    }
}

/// Inner text of a `"..."` or `'...'` literal.
fn strip_quotes(token: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|quote| {
        token
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}
