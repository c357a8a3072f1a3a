//! Common types used throughout tablegate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a stored table.
///
/// A table name is also the name of the remote folder holding the table.
/// Drive folder names are free-form, so any non-empty printable string is
/// accepted, including `/` and leading dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Create a new TableName from a string.
    ///
    /// # Preconditions
    /// - `name` must be non-empty
    /// - `name` must not contain control characters
    ///
    /// # Errors
    /// - Returns `InvalidInput` if any precondition is violated
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Table name cannot be empty".to_string(),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(crate::Error::InvalidInput(
                "Table name cannot contain control characters".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TableName {
    type Error = crate::Error;

    fn try_from(value: &str) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.0
    }
}
