//! The [`CourseStore`] trait defining the storage contract for courses.
//!
//! A course is persisted as a whole: every save replaces the complete row set
//! and the course metadata in one atomic step. There is no per-element write
//! path, so readers never observe a mix of two writers' rows.
//!
//! All backends (InMemoryStore, SqliteStore) implement this trait and are
//! swappable without changing service logic.

use coursegraph_core::course::CourseMeta;
use coursegraph_core::id::{AccountId, CourseKey};

use crate::error::StorageError;
use crate::hash::ContentHash;
use crate::types::{CourseSummary, RowWriteSet, StoredCourse};

/// The storage contract for relational course content.
///
/// The trait is synchronous. Writers to the same course are serialized by
/// the backend; the revision check in [`CourseStore::save_course`] turns a
/// lost race into [`StorageError::Conflict`] instead of a silent overwrite.
pub trait CourseStore {
    /// Creates an empty course. Fails if the course already exists.
    ///
    /// Returns the revision of the empty course.
    fn create_course(
        &mut self,
        key: &CourseKey,
        meta: &CourseMeta,
    ) -> Result<ContentHash, StorageError>;

    /// Loads a course's metadata, rows, and current revision.
    fn load_course(&self, key: &CourseKey) -> Result<StoredCourse, StorageError>;

    /// Replaces a course's rows and metadata in one transaction.
    ///
    /// With `expected` set, the save only succeeds if the stored revision
    /// still equals it, and a missing course is an error. Without it the save
    /// is unconditional and creates the course if needed.
    ///
    /// Returns the new revision.
    fn save_course(
        &mut self,
        write: &RowWriteSet,
        meta: &CourseMeta,
        expected: Option<&ContentHash>,
    ) -> Result<ContentHash, StorageError>;

    /// Replaces only the course metadata. The revision is unchanged.
    fn update_meta(&mut self, key: &CourseKey, meta: &CourseMeta) -> Result<(), StorageError>;

    /// Deletes a course and all its rows.
    fn delete_course(&mut self, key: &CourseKey) -> Result<(), StorageError>;

    /// Lists an account's courses ordered by course id.
    fn list_courses(&self, account: AccountId) -> Result<Vec<CourseSummary>, StorageError>;

    fn course_exists(&self, key: &CourseKey) -> Result<bool, StorageError>;
}

/// Checks `expected` against the stored revision, shared by both backends.
pub(crate) fn check_revision(
    key: &CourseKey,
    stored: &ContentHash,
    expected: Option<&ContentHash>,
) -> Result<(), StorageError> {
    match expected {
        Some(expected) if expected != stored => {
            tracing::warn!(course = %key, %expected, actual = %stored, "save lost revision race");
            Err(StorageError::Conflict {
                course: key.to_string(),
                expected: expected.clone(),
                actual: stored.clone(),
            })
        }
        _ => Ok(()),
    }
}
