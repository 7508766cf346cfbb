//! Error types for tree resolution.

use navtree_storage::StorageError;

/// Error returned by the resolution engine.
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// The page context carries no request.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// No current item matches the request path (strict mode only).
    #[error("Unable to resolve current item to get `{attr}` for `{path}`")]
    Resolution {
        /// Attribute that was requested.
        attr: String,
        /// Request path that matched no item.
        path: String,
    },
    /// A dynamic item declared an invalid permission.
    #[error(transparent)]
    PermissionSpec(#[from] PermissionSpecError),
    /// Backing store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// An items hook rejected its input.
    #[error("Items hook error: {0}")]
    Hook(String),
}

/// Invalid permission declared on a dynamic item.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PermissionSpecError {
    /// Name is not of the `app_label.codename` form.
    #[error("Wrong permission string format: supplied `{0}`; expected `<app_label>.<codename>`")]
    Format(String),
    /// No permission with this name exists.
    #[error("Permission `{0}` does not exist")]
    Unknown(String),
    /// No permission with this id exists.
    #[error("Permission with id {0} does not exist")]
    UnknownId(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree_storage::StorageErrorKind;

    #[test]
    fn test_resolution_error_message() {
        let err = NavError::Resolution {
            attr: "title_resolved".to_owned(),
            path: "/missing/".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Unable to resolve current item to get `title_resolved` for `/missing/`"
        );
    }

    #[test]
    fn test_permission_spec_error_is_transparent() {
        let err = NavError::from(PermissionSpecError::Unknown("shop.view".to_owned()));
        assert_eq!(err.to_string(), "Permission `shop.view` does not exist");
    }

    #[test]
    fn test_storage_error_converts() {
        let err: NavError = StorageError::new(StorageErrorKind::Unavailable).into();
        assert!(matches!(err, NavError::Storage(_)));
        assert!(err.to_string().starts_with("Storage error: Unavailable"));
    }
}
