//! Storage-layer row and summary types.

use serde::{Deserialize, Serialize};

use coursegraph_core::codec::Decoded;
use coursegraph_core::course::CourseMeta;
use coursegraph_core::id::CourseKey;

use crate::convert::decode_rows;
use crate::hash::ContentHash;

/// One persisted element: a row of the `course_elements` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRow {
    pub element_id: String,
    /// Denormalized type tag, kept for filtering. The payload is authoritative.
    pub element_type: String,
    /// Zero-based order within the course.
    pub position: i64,
    /// Row envelope: `{"element_data": {...canonical payload...}}`.
    pub json: String,
}

/// Complete replacement set for one course.
///
/// Saving a course always writes a whole `RowWriteSet`; there is no partial
/// update path, so a stored course is always some writer's full set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWriteSet {
    pub key: CourseKey,
    pub rows: Vec<ElementRow>,
    /// Hash of `rows`; becomes the course revision once saved.
    pub hash: ContentHash,
}

/// A course as read back from a [`crate::CourseStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCourse {
    pub key: CourseKey,
    pub meta: CourseMeta,
    pub rows: Vec<ElementRow>,
    pub revision: ContentHash,
}

impl StoredCourse {
    /// Decodes the rows into canonical elements, skipping broken ones.
    pub fn decode(&self) -> Decoded {
        decode_rows(self.rows.clone())
    }
}

/// Summary of a stored course (for listing).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    pub key: CourseKey,
    pub meta: CourseMeta,
    pub element_count: usize,
    pub revision: ContentHash,
}
