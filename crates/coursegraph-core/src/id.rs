//! Identifier newtypes for course content.
//!
//! All IDs are distinct newtype wrappers, providing type safety so that an
//! `ElementId` cannot be accidentally used where a `CourseId` is expected.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an element, unique within a course.
///
/// Doubles as the graph node id and as the target of `goto` references.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub String);

/// Identifier of a course within an account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub String);

/// Account that owns a set of courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

/// Fully-qualified course key: the unit of persistence and of save
/// serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseKey {
    pub account: AccountId,
    pub course: CourseId,
}

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        ElementId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this id starts with `prefix` (revision and test matching).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl CourseId {
    pub fn new(id: impl Into<String>) -> Self {
        CourseId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CourseKey {
    pub fn new(account: AccountId, course: impl Into<String>) -> Self {
        CourseKey {
            account,
            course: CourseId(course.into()),
        }
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        ElementId(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        ElementId(s)
    }
}

impl Borrow<str> for ElementId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.course)
    }
}
