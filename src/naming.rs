//! Run identifiers and namespaces.
//!
//! Every resource a demo creates is named or tagged with the run identifier
//! so it can be found again in the platform portal. The platform rejects
//! names longer than [`MAX_NAME_LENGTH`] characters.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Longest name accepted by the platform for requirements and tags.
pub const MAX_NAME_LENGTH: usize = 50;

/// Separator placed between the prefix and the random suffix.
pub const NAME_SEPARATOR: char = '_';

/// Number of uuid characters that always survive truncation.
const MIN_SUFFIX_LENGTH: usize = 16;

/// Returns `prefix`, the separator, and a random uuid, truncated to
/// [`MAX_NAME_LENGTH`] characters.
///
/// Prefixes too long to leave [`MIN_SUFFIX_LENGTH`] uuid characters are
/// shortened first so two calls never collapse to the same name.
#[must_use]
pub fn generate_unique_name(prefix: &str) -> String {
    let max_prefix = MAX_NAME_LENGTH - MIN_SUFFIX_LENGTH - 1;
    let kept_prefix: String = prefix.chars().take(max_prefix).collect();
    let suffix = Uuid::new_v4().hyphenated().to_string();

    kept_prefix
        .chars()
        .chain(std::iter::once(NAME_SEPARATOR))
        .chain(suffix.chars())
        .take(MAX_NAME_LENGTH)
        .collect()
}

/// Errors raised while building naming values.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NamespaceError {
    /// Raised when the namespace is empty or whitespace.
    #[error("namespace must not be empty")]
    Empty,
}

/// Logical grouping for every resource created by a demo run.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Namespace(String);

impl Namespace {
    /// Creates a namespace, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Empty`] when nothing remains after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, NamespaceError> {
        let trimmed = value.into().trim().to_owned();
        if trimmed.is_empty() {
            return Err(NamespaceError::Empty);
        }
        Ok(Self(trimmed))
    }

    /// Derives the default namespace for a demo (`image-montage` becomes
    /// `image_montage_demo`).
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Empty`] when the demo name is blank.
    pub fn for_demo(demo_name: &str) -> Result<Self, NamespaceError> {
        if demo_name.trim().is_empty() {
            return Err(NamespaceError::Empty);
        }
        Self::new(format!("{}_demo", demo_name.trim().replace('-', "_")))
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier generated once per demo run.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RunId(String);

impl RunId {
    /// Generates a fresh identifier scoped to `namespace`.
    #[must_use]
    pub fn generate(namespace: &Namespace) -> Self {
        Self(generate_unique_name(namespace.as_str()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
