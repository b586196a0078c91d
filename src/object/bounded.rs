//! Fixed-capacity text fields.
//!
//! The engine's object model stores every text resource in a fixed-size
//! field. Values longer than [`MAX_STR_LEN`] bytes are truncated on copy,
//! never rejected, and the cut always lands on a UTF-8 character boundary.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::{Lwm2mError, Result};

/// Capacity of a text field in the engine's object model, in bytes.
pub const MAX_STR_LEN: usize = 200;

/// Text value truncated to [`MAX_STR_LEN`] bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BoundedString(String);

impl BoundedString {
    /// Empty field
    pub fn new() -> Self {
        Self(String::new())
    }

    /// Copy `value` into a new field, truncating it to [`MAX_STR_LEN`].
    pub fn try_copy(value: &str) -> Result<Self> {
        Self::try_copy_with_limit(value, MAX_STR_LEN)
    }

    /// Copy `value`, truncating it to `limit` bytes.
    pub fn try_copy_with_limit(value: &str, limit: usize) -> Result<Self> {
        let cut = &value[..floor_char_boundary(value, limit)];
        let mut buf = String::new();
        buf.try_reserve_exact(cut.len())
            .map_err(|e| Lwm2mError::NoMemory(format!("text field of {} bytes: {e}", cut.len())))?;
        buf.push_str(cut);
        Ok(Self(buf))
    }

    /// Copy an optional value; `None` yields an empty field.
    pub fn try_copy_opt(value: Option<&str>) -> Result<Self> {
        value.map_or_else(|| Ok(Self::new()), Self::try_copy)
    }

    /// Get the field as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the field is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Largest index `<= limit` that is a char boundary of `s`.
pub(crate) fn floor_char_boundary(s: &str, limit: usize) -> usize {
    if limit >= s.len() {
        return s.len();
    }
    let mut idx = limit;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

impl From<String> for BoundedString {
    fn from(mut value: String) -> Self {
        let cut = floor_char_boundary(&value, MAX_STR_LEN);
        value.truncate(cut);
        Self(value)
    }
}

impl From<BoundedString> for String {
    fn from(value: BoundedString) -> Self {
        value.0
    }
}

impl Deref for BoundedString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoundedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
