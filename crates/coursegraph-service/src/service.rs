//! CourseService: the single coordinator between callers and the
//! codec/checker/storage crates.
//!
//! Every course has one authoritative storage form, decided by the course
//! index: an entry with a file path is a YAML course, an entry with `db` (or
//! no entry at all, for courses only the store knows) is a database course.
//! Reads and saves always go to that form. Moving a course between forms
//! only happens through the explicit migrations.

use coursegraph_check::{check_flow, validate_course, CheckMode, ValidationReport};
use coursegraph_core::codec::block::{decode_block_values, encode_blocks};
use coursegraph_core::codec::yaml::to_yaml_string;
use coursegraph_core::codec::Decoded;
use coursegraph_core::course::{CourseMeta, CourseSource};
use coursegraph_core::id::{AccountId, CourseId, CourseKey};
use coursegraph_storage::files::{validate_path, CourseFiles, CoursePath, IndexEntry};
use coursegraph_storage::{encode_rows, CourseStore};

use crate::error::ServiceError;
use crate::schema::courses::{
    CourseListing, EditorCourse, MigrationResponse, SaveCourseRequest, SaveCourseResponse,
};
use crate::schema::diagnostics::{partition, Diagnostic};

/// Where a course currently lives.
#[derive(Debug, Clone, PartialEq)]
enum Location {
    Database,
    File { path: String, meta: CourseMeta },
}

impl Location {
    fn source(&self) -> CourseSource {
        match self {
            Location::Database => CourseSource::Database,
            Location::File { .. } => CourseSource::YamlFile,
        }
    }
}

/// Coordinates loading, validating, and saving courses across both
/// storage forms.
pub struct CourseService<S, F> {
    store: S,
    files: F,
}

impl<S: CourseStore, F: CourseFiles> CourseService<S, F> {
    pub fn new(store: S, files: F) -> Self {
        CourseService { store, files }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn into_parts(self) -> (S, F) {
        (self.store, self.files)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Finds the authoritative form. A course indexed as a file that also
    /// has database rows, or indexed as `db` in one index and as a file in
    /// another, is in mixed state and refused.
    fn locate(&self, key: &CourseKey) -> Result<Option<Location>, ServiceError> {
        let index = self.files.resolve_index()?;
        if let Some(entry) = index.get(&key.course) {
            return match &entry.path {
                CoursePath::File(path) => {
                    if self.store.course_exists(key)? {
                        return Err(Self::mixed_state(key, path));
                    }
                    Ok(Some(Location::File {
                        path: path.clone(),
                        meta: entry.meta.clone(),
                    }))
                }
                CoursePath::Database => {
                    let primary = self.files.load_index()?;
                    if let Some(CoursePath::File(path)) =
                        primary.get(&key.course).map(|e| &e.path)
                    {
                        return Err(Self::mixed_state(key, path));
                    }
                    Ok(Some(Location::Database))
                }
            };
        }
        if self.store.course_exists(key)? {
            return Ok(Some(Location::Database));
        }
        Ok(None)
    }

    fn mixed_state(key: &CourseKey, path: &str) -> ServiceError {
        tracing::warn!(course = %key, path, "course is both indexed as a file and stored in the database");
        ServiceError::MixedState {
            course: key.clone(),
            path: path.to_string(),
        }
    }

    fn require(&self, key: &CourseKey) -> Result<Location, ServiceError> {
        self.locate(key)?
            .ok_or_else(|| ServiceError::CourseNotFound(key.clone()))
    }

    /// Validates and flow-checks, failing if anything blocks under `mode`.
    fn check(
        decoded: &Decoded,
        meta: &CourseMeta,
        mode: CheckMode,
    ) -> Result<Vec<Diagnostic>, ServiceError> {
        let entry = meta.element.as_ref();
        let report: ValidationReport = validate_course(decoded, entry);
        let flow = check_flow(&decoded.elements, entry);

        let (errors, warnings) = partition(
            report.problems.iter().map(|p| (p, p.blocks(mode))),
            &flow.findings,
        );
        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), ?mode, "course rejected by validation");
            return Err(ServiceError::ValidationFailed { errors, warnings });
        }
        Ok(warnings)
    }

    /// Stores settings in the primary index entry of a YAML course.
    fn write_index_meta(
        &mut self,
        course: &CourseId,
        path: &str,
        meta: &CourseMeta,
    ) -> Result<(), ServiceError> {
        let mut index = self.files.load_index()?;
        let entry = IndexEntry {
            path: CoursePath::File(path.to_string()),
            meta: meta.clone(),
        };
        if index.get(course) != Some(&entry) {
            index.courses.insert(course.clone(), entry);
            self.files.save_index(&index)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Editor operations
    // -----------------------------------------------------------------------

    /// Loads a course from its authoritative form for the editor.
    ///
    /// Broken elements are skipped and reported, never fatal.
    pub fn get_course(&self, key: &CourseKey) -> Result<EditorCourse, ServiceError> {
        let location = self.require(key)?;
        let (decoded, settings, revision) = match &location {
            Location::File { path, meta } => {
                let document = self.files.read_document(path)?;
                (document.decoded, meta.clone(), document.revision)
            }
            Location::Database => {
                let stored = self.store.load_course(key)?;
                (stored.decode(), stored.meta.clone(), stored.revision)
            }
        };

        let entry = settings.element.as_ref();
        let report = validate_course(&decoded, entry);
        let flow = check_flow(&decoded.elements, entry);
        tracing::debug!(
            course = %key,
            source = %location.source(),
            elements = decoded.elements.len(),
            skipped = decoded.skipped.len(),
            "loaded course"
        );

        Ok(EditorCourse {
            course: key.course.clone(),
            source: location.source(),
            revision,
            yaml_content: to_yaml_string(&decoded.elements)?,
            blocks: encode_blocks(&decoded.elements),
            settings,
            problems: report.problems,
            findings: flow.findings,
        })
    }

    /// Saves editor blocks to the course's authoritative form.
    ///
    /// A course that exists nowhere yet is created in the database.
    pub fn put_course(
        &mut self,
        key: &CourseKey,
        request: SaveCourseRequest,
    ) -> Result<SaveCourseResponse, ServiceError> {
        let location = self.locate(key)?.unwrap_or(Location::Database);
        if let Some(requested) = request.source {
            if requested != location.source() {
                return Err(ServiceError::SourceMismatch {
                    course: key.clone(),
                    stored: location.source(),
                    requested,
                });
            }
        }

        let decoded = decode_block_values(request.blocks);
        let warnings = Self::check(&decoded, &request.settings, CheckMode::EditorSave)?;
        let elements = decoded.elements;

        let revision = match &location {
            Location::Database => {
                let write = encode_rows(key, &elements)?;
                self.store
                    .save_course(&write, &request.settings, request.revision.as_ref())?
            }
            Location::File { path, .. } => {
                let revision =
                    self.files
                        .write_document(path, &elements, request.revision.as_ref())?;
                self.write_index_meta(&key.course, path, &request.settings)?;
                revision
            }
        };

        tracing::info!(
            course = %key,
            source = %location.source(),
            elements = elements.len(),
            warnings = warnings.len(),
            "saved course"
        );
        Ok(SaveCourseResponse {
            course: key.course.clone(),
            source: location.source(),
            revision,
            element_count: elements.len(),
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Migrations
    // -----------------------------------------------------------------------

    /// Moves a YAML course into the database.
    ///
    /// Uses the import policy: any problem, including a skipped element or
    /// an unmatched prefix, aborts the migration before anything is written.
    pub fn migrate_to_database(&mut self, key: &CourseKey) -> Result<MigrationResponse, ServiceError> {
        let (path, meta) = match self.require(key)? {
            Location::File { path, meta } => (path, meta),
            Location::Database => {
                return Err(ServiceError::SourceMismatch {
                    course: key.clone(),
                    stored: CourseSource::Database,
                    requested: CourseSource::YamlFile,
                })
            }
        };

        let document = self.files.read_document(&path)?;
        let warnings = Self::check(&document.decoded, &meta, CheckMode::ImportSave)?;
        let elements = document.decoded.elements;

        let write = encode_rows(key, &elements)?;
        let revision = self.store.save_course(&write, &meta, None)?;

        let mut index = self.files.load_index()?;
        index.set_path(key.course.clone(), CoursePath::Database);
        self.files.save_index(&index)?;

        tracing::info!(course = %key, from = %path, elements = elements.len(), "migrated course to database");
        Ok(MigrationResponse {
            course: key.course.clone(),
            source: CourseSource::Database,
            revision,
            element_count: elements.len(),
            warnings,
        })
    }

    /// Moves a database course into a YAML document at `path`.
    ///
    /// The document and index are written before the rows are deleted, so an
    /// interruption leaves the course readable from at least one form.
    /// Fails if any row cannot be decoded, since exporting would drop it.
    pub fn export_to_yaml(
        &mut self,
        key: &CourseKey,
        path: &str,
    ) -> Result<MigrationResponse, ServiceError> {
        validate_path(path)?;
        if let Location::File { .. } = self.require(key)? {
            return Err(ServiceError::SourceMismatch {
                course: key.clone(),
                stored: CourseSource::YamlFile,
                requested: CourseSource::Database,
            });
        }

        let stored = self.store.load_course(key)?;
        let decoded = stored.decode();
        let warnings = Self::check(&decoded, &stored.meta, CheckMode::Read)?;
        if let Some(skipped) = decoded.skipped.first() {
            return Err(skipped.to_error().into());
        }

        let revision = self.files.write_document(path, &decoded.elements, None)?;
        self.write_index_meta(&key.course, path, &stored.meta)?;
        self.store.delete_course(key)?;

        tracing::info!(course = %key, to = path, elements = decoded.elements.len(), "exported course to yaml");
        Ok(MigrationResponse {
            course: key.course.clone(),
            source: CourseSource::YamlFile,
            revision,
            element_count: decoded.elements.len(),
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    /// Lists indexed courses in index order, followed by database courses
    /// when the index lists them (`ext_courses: {path: db}`).
    pub fn list_courses(&self, account: AccountId) -> Result<Vec<CourseListing>, ServiceError> {
        let index = self.files.resolve_index()?;
        let mut listings: Vec<CourseListing> = index
            .courses
            .iter()
            .map(|(course, entry)| CourseListing {
                course: course.clone(),
                source: match entry.path {
                    CoursePath::Database => CourseSource::Database,
                    CoursePath::File(_) => CourseSource::YamlFile,
                },
                path: match &entry.path {
                    CoursePath::Database => None,
                    CoursePath::File(path) => Some(path.clone()),
                },
                settings: entry.meta.clone(),
            })
            .collect();

        if index.lists_database() {
            for summary in self.store.list_courses(account)? {
                if index.get(&summary.key.course).is_none() {
                    listings.push(CourseListing {
                        course: summary.key.course,
                        source: CourseSource::Database,
                        path: None,
                        settings: summary.meta,
                    });
                }
            }
        }
        Ok(listings)
    }
}
