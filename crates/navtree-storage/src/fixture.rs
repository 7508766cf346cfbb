//! JSON fixture format for importing and exporting trees.
//!
//! A fixture is a single JSON document:
//!
//! ```json
//! {
//!   "permissions": [{"id": 1, "app_label": "shop", "codename": "view_orders"}],
//!   "trees": [{"id": 1, "alias": "main", "title": "Main menu"}],
//!   "items": [{"id": 1, "tree": "main", "title": "Home", "url": "/"}]
//! }
//! ```
//!
//! Every section is optional and every item field except `tree` has a default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::{ItemRecord, Permission, StorageError, StorageErrorKind, TreeRecord};

/// Trees, items and permissions in import/export form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Permissions referenced by the items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
    /// Tree rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trees: Vec<TreeRecord>,
    /// Item rows, in any order.
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

impl Fixture {
    /// Parse a fixture from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] with [`StorageErrorKind::InvalidData`] if the
    /// text is not a valid fixture.
    pub fn from_json(text: &str) -> Result<Self, StorageError> {
        serde_json::from_str(text).map_err(|e| {
            StorageError::new(StorageErrorKind::InvalidData)
                .with_message("malformed fixture")
                .with_source(e)
        })
    }

    /// Read a fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, StorageError> {
        let text = fs::read_to_string(path).map_err(StorageError::io)?;
        Self::from_json(&text)
            .map_err(|e| e.with_message(format!("malformed fixture {}", path.display())))
    }

    /// Serialize the fixture, pretty-printed when `indent` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if serialization fails.
    pub fn to_json(&self, indent: bool) -> Result<String, StorageError> {
        let result = if indent {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        result.map_err(|e| StorageError::new(StorageErrorKind::Other).with_source(e))
    }

    /// Write the fixture to a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if serialization or the write fails.
    pub fn write(&self, path: &Path, indent: bool) -> Result<(), StorageError> {
        let text = self.to_json(indent)?;
        fs::write(path, text).map_err(StorageError::io)
    }
}
