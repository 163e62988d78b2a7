//! Course-level metadata and storage-form discrimination.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ElementId;
use crate::legacy::deserialize_flag;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Entry point and access settings of a course.
///
/// Stored as a JSON blob next to the element rows, or inline in the YAML
/// course index. Flags accept legacy `"yes"` / `"no"` spellings on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseMeta {
    /// Element the course starts from; `None` means the first element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementId>,
    #[serde(deserialize_with = "deserialize_flag", skip_serializing_if = "is_false")]
    pub restricted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub decline_text: String,
    #[serde(deserialize_with = "deserialize_flag", skip_serializing_if = "is_false")]
    pub ban_enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ban_text: String,
}

impl CourseMeta {
    pub fn with_entry(element: impl Into<ElementId>) -> Self {
        CourseMeta {
            element: Some(element.into()),
            ..Default::default()
        }
    }
}

/// Which storage form is authoritative for a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseSource {
    /// Element rows in the relational store.
    Database,
    /// A YAML document referenced from the course index.
    YamlFile,
}

impl fmt::Display for CourseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseSource::Database => f.write_str("database"),
            CourseSource::YamlFile => f.write_str("yaml_file"),
        }
    }
}
