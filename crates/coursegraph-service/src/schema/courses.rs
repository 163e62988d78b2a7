//! Request and response types for course editing and migration.

use coursegraph_core::codec::block::Block;
use coursegraph_core::course::{CourseMeta, CourseSource};
use coursegraph_core::id::CourseId;
use coursegraph_check::{FlowFinding, Problem};
use coursegraph_storage::ContentHash;
use serde::{Deserialize, Serialize};

use super::diagnostics::Diagnostic;

/// A course as the editor sees it: blocks plus the YAML rendering and
/// read-mode diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct EditorCourse {
    pub course: CourseId,
    pub source: CourseSource,
    /// Pass back in [`SaveCourseRequest::revision`] to detect concurrent edits.
    pub revision: ContentHash,
    pub settings: CourseMeta,
    pub yaml_content: String,
    pub blocks: Vec<Block>,
    pub problems: Vec<Problem>,
    pub findings: Vec<FlowFinding>,
}

/// Editor save.
///
/// Blocks stay raw JSON so one malformed block is reported against its
/// position rather than failing the whole request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SaveCourseRequest {
    pub blocks: Vec<serde_json::Value>,
    pub settings: CourseMeta,
    /// Storage form the editor loaded the course from. `None` accepts the
    /// current form.
    pub source: Option<CourseSource>,
    /// Revision the editor loaded. `None` saves unconditionally.
    pub revision: Option<ContentHash>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveCourseResponse {
    pub course: CourseId,
    pub source: CourseSource,
    pub revision: ContentHash,
    pub element_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

/// Result of moving a course between storage forms.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResponse {
    pub course: CourseId,
    pub source: CourseSource,
    pub revision: ContentHash,
    pub element_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

/// One row of a course listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseListing {
    pub course: CourseId,
    pub source: CourseSource,
    /// YAML document path; absent for database courses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub settings: CourseMeta,
}
