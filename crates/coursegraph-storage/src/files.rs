//! YAML file repository: the course index and per-course YAML documents.
//!
//! # Layout
//!
//! All paths are relative to a scripts root. `courses.yml` maps course ids to
//! an entry holding the document path plus course metadata:
//!
//! ```yaml
//! python_101:
//!   path: python_101.yml
//!   element: intro
//!   restricted: yes
//! ext_courses:
//!   path: more_courses.yml
//! ```
//!
//! A path of `db` marks a course whose authoritative form is the relational
//! store. The reserved `ext_courses` entry pulls in another index file whose
//! entries override same-named ones, or with `path: db` declares that the
//! database's courses are listed too.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml_ng::{Mapping, Value};

use coursegraph_core::codec::yaml::{parse_yaml, to_yaml_string};
use coursegraph_core::codec::Decoded;
use coursegraph_core::course::CourseMeta;
use coursegraph_core::element::Element;
use coursegraph_core::id::CourseId;

use crate::error::StorageError;
use crate::hash::ContentHash;

/// Name of the course index file under the scripts root.
pub const INDEX_FILE: &str = "courses.yml";

/// Reserved index key naming an extension index.
pub const EXT_COURSES: &str = "ext_courses";

/// Path sentinel for courses stored in the database.
pub const DATABASE_PATH: &str = "db";

// ---------------------------------------------------------------------------
// Paths and ids
// ---------------------------------------------------------------------------

/// Checks that `path` is a non-empty relative path that stays under the
/// scripts root.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    let invalid = |reason| StorageError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => return Err(invalid("path leaves the scripts folder")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"))
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Parses a course id: one or more ASCII letters, digits, `_` or `-`.
pub fn validate_course_id(id: &str) -> Result<CourseId, StorageError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(CourseId::new(id))
    } else {
        Err(StorageError::InvalidCourseId(id.to_string()))
    }
}

/// Where a course's authoritative content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoursePath {
    Database,
    /// A YAML document, relative to the scripts root.
    File(String),
}

impl CoursePath {
    pub fn parse(path: &str) -> Result<Self, StorageError> {
        if path == DATABASE_PATH {
            return Ok(CoursePath::Database);
        }
        validate_path(path)?;
        Ok(CoursePath::File(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            CoursePath::Database => DATABASE_PATH,
            CoursePath::File(path) => path,
        }
    }
}

impl fmt::Display for CoursePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CoursePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CoursePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        CoursePath::parse(&path).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Course index
// ---------------------------------------------------------------------------

/// One course in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: CoursePath,
    #[serde(flatten)]
    pub meta: CourseMeta,
}

#[derive(Debug, Deserialize)]
struct ExtEntry {
    path: CoursePath,
}

/// Parsed contents of one index file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseIndex {
    pub courses: IndexMap<CourseId, IndexEntry>,
    /// Target of the `ext_courses` entry, if any.
    pub ext_courses: Option<CoursePath>,
}

impl CourseIndex {
    pub fn parse(text: &str) -> Result<Self, StorageError> {
        let doc: Value = serde_yaml_ng::from_str(text)?;
        let entries: IndexMap<String, Value> = match doc {
            Value::Null => return Ok(CourseIndex::default()),
            other => serde_yaml_ng::from_value(other)?,
        };

        let mut index = CourseIndex::default();
        for (id, value) in entries {
            if id == EXT_COURSES {
                let ext: ExtEntry = serde_yaml_ng::from_value(value)?;
                index.ext_courses = Some(ext.path);
                continue;
            }
            let id = validate_course_id(&id)?;
            let entry: IndexEntry = serde_yaml_ng::from_value(value)?;
            index.courses.insert(id, entry);
        }
        Ok(index)
    }

    pub fn to_yaml_string(&self) -> Result<String, StorageError> {
        let mut doc = Mapping::with_capacity(self.courses.len() + 1);
        for (id, entry) in &self.courses {
            doc.insert(
                Value::String(id.as_str().to_string()),
                serde_yaml_ng::to_value(entry)?,
            );
        }
        if let Some(ext) = &self.ext_courses {
            let mut ext_entry = Mapping::new();
            ext_entry.insert(
                Value::String("path".into()),
                Value::String(ext.as_str().to_string()),
            );
            doc.insert(Value::String(EXT_COURSES.into()), Value::Mapping(ext_entry));
        }
        Ok(serde_yaml_ng::to_string(&doc)?)
    }

    pub fn get(&self, id: &CourseId) -> Option<&IndexEntry> {
        self.courses.get(id)
    }

    /// Points a course at a new storage path, adding it if missing.
    pub fn set_path(&mut self, id: CourseId, path: CoursePath) {
        match self.courses.get_mut(&id) {
            Some(entry) => entry.path = path,
            None => {
                self.courses.insert(
                    id,
                    IndexEntry {
                        path,
                        meta: CourseMeta::default(),
                    },
                );
            }
        }
    }

    /// Adds `other`'s entries, overriding same-named ones.
    pub fn merge(&mut self, other: CourseIndex) {
        for (id, entry) in other.courses {
            self.courses.insert(id, entry);
        }
    }

    /// True if the `ext_courses` entry asks for database courses to be listed.
    pub fn lists_database(&self) -> bool {
        self.ext_courses == Some(CoursePath::Database)
    }
}

// ---------------------------------------------------------------------------
// File access
// ---------------------------------------------------------------------------

/// A YAML course document with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDocument {
    pub decoded: Decoded,
    pub revision: ContentHash,
}

/// Access to the scripts root.
///
/// Implementors supply raw text reads and atomic writes; index and document
/// handling is shared.
pub trait CourseFiles {
    /// Reads a file, or `None` if it does not exist.
    fn read_text(&self, path: &str) -> Result<Option<String>, StorageError>;

    /// Replaces a file's contents atomically.
    fn write_text(&mut self, path: &str, text: &str) -> Result<(), StorageError>;

    /// Loads the primary index without following `ext_courses`.
    /// A missing index is empty.
    fn load_index(&self) -> Result<CourseIndex, StorageError> {
        match self.read_text(INDEX_FILE)? {
            Some(text) => CourseIndex::parse(&text),
            None => Ok(CourseIndex::default()),
        }
    }

    /// Loads the primary index and merges an `ext_courses` file into it.
    ///
    /// A database extension is left for the caller to merge from the store.
    fn resolve_index(&self) -> Result<CourseIndex, StorageError> {
        let mut index = self.load_index()?;
        if let Some(CoursePath::File(path)) = &index.ext_courses {
            let text = self
                .read_text(path)?
                .ok_or_else(|| StorageError::io(path.as_str(), not_found()))?;
            let mut ext = CourseIndex::parse(&text)?;
            ext.ext_courses = None;
            index.merge(ext);
        }
        Ok(index)
    }

    fn save_index(&mut self, index: &CourseIndex) -> Result<(), StorageError> {
        let text = index.to_yaml_string()?;
        self.write_text(INDEX_FILE, &text)
    }

    /// Reads and decodes a course document, skipping broken elements.
    fn read_document(&self, path: &str) -> Result<CourseDocument, StorageError> {
        validate_path(path)?;
        let text = self
            .read_text(path)?
            .ok_or_else(|| StorageError::io(path, not_found()))?;
        let decoded = parse_yaml(&text)?;
        for skipped in &decoded.skipped {
            tracing::warn!(path, position = skipped.position, message = %skipped.message, "skipped element");
        }
        Ok(CourseDocument {
            decoded,
            revision: ContentHash::of_bytes(text.as_bytes()),
        })
    }

    /// Writes a course document.
    ///
    /// With `expected` set, the write fails with a conflict if the file on
    /// disk is no longer at that revision. Returns the new revision.
    fn write_document(
        &mut self,
        path: &str,
        elements: &[Element],
        expected: Option<&ContentHash>,
    ) -> Result<ContentHash, StorageError> {
        validate_path(path)?;
        if let Some(expected) = expected {
            let current = self
                .read_text(path)?
                .map(|text| ContentHash::of_bytes(text.as_bytes()))
                .unwrap_or_else(|| ContentHash::of_bytes(b""));
            if &current != expected {
                tracing::warn!(path, %expected, actual = %current, "document changed since read");
                return Err(StorageError::Conflict {
                    course: path.to_string(),
                    expected: expected.clone(),
                    actual: current,
                });
            }
        }
        let text = to_yaml_string(elements)?;
        self.write_text(path, &text)?;
        tracing::info!(path, elements = elements.len(), "wrote course document");
        Ok(ContentHash::of_bytes(text.as_bytes()))
    }
}

fn not_found() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, "file not found")
}

/// Looks up a YAML-backed course through the resolved index and reads it.
pub fn load_course<F: CourseFiles + ?Sized>(
    files: &F,
    id: &CourseId,
) -> Result<(IndexEntry, CourseDocument), StorageError> {
    let index = files.resolve_index()?;
    let entry = index
        .get(id)
        .cloned()
        .ok_or_else(|| StorageError::NotInIndex(id.clone()))?;
    match &entry.path {
        CoursePath::Database => Err(StorageError::StoredInDatabase(id.clone())),
        CoursePath::File(path) => {
            let document = files.read_document(path)?;
            Ok((entry, document))
        }
    }
}

/// Writes a YAML-backed course to the document its index entry names.
pub fn save_course<F: CourseFiles + ?Sized>(
    files: &mut F,
    id: &CourseId,
    elements: &[Element],
    expected: Option<&ContentHash>,
) -> Result<ContentHash, StorageError> {
    let index = files.resolve_index()?;
    let entry = index
        .get(id)
        .ok_or_else(|| StorageError::NotInIndex(id.clone()))?;
    match &entry.path {
        CoursePath::Database => Err(StorageError::StoredInDatabase(id.clone())),
        CoursePath::File(path) => files.write_document(path, elements, expected),
    }
}

/// Scripts folder on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsCourseFiles {
    root: PathBuf,
}

impl FsCourseFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsCourseFiles { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

impl CourseFiles for FsCourseFiles {
    fn read_text(&self, path: &str) -> Result<Option<String>, StorageError> {
        let full = self.resolve(path)?;
        match std::fs::read_to_string(&full) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// Writes to a temporary file in the target directory, then renames it
    /// over the target so readers never see a partial document.
    fn write_text(&mut self, path: &str, text: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let dir = full.parent().unwrap_or(self.root.as_path()).to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(path, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StorageError::io(path, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| StorageError::io(path, e))?;
        tmp.persist(&full)
            .map_err(|e| StorageError::io(path, e.error))?;
        Ok(())
    }
}

/// In-memory scripts folder for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCourseFiles {
    files: BTreeMap<String, String>,
}

impl MemoryCourseFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, text: &str) -> Self {
        self.files.insert(path.to_string(), text.to_string());
        self
    }
}

impl CourseFiles for MemoryCourseFiles {
    fn read_text(&self, path: &str) -> Result<Option<String>, StorageError> {
        validate_path(path)?;
        Ok(self.files.get(path).cloned())
    }

    fn write_text(&mut self, path: &str, text: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        self.files.insert(path.to_string(), text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegraph_core::element::{ElementKind, End, Message};
    use coursegraph_core::id::ElementId;

    const INDEX: &str = "\
python_101:
  path: python_101.yml
  element: intro
  restricted: yes
  decline_text: Sign up first
sql:
  path: db
ext_courses:
  path: more.yml
";

    fn elements() -> Vec<Element> {
        vec![
            Element::new(
                "intro",
                ElementKind::Message(Message {
                    text: "Hi".into(),
                    ..Default::default()
                }),
            ),
            Element::new("fin", ElementKind::End(End::default())),
        ]
    }

    #[test]
    fn test_path_validation() {
        assert!(validate_path("course.yml").is_ok());
        assert!(validate_path("team/course.yml").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("../secrets.yml").is_err());
        assert!(validate_path("a/../../b.yml").is_err());
    }

    #[test]
    fn test_course_id_validation() {
        assert!(validate_course_id("python_101-b").is_ok());
        assert!(validate_course_id("").is_err());
        assert!(validate_course_id("has space").is_err());
        assert!(validate_course_id("../x").is_err());
    }

    #[test]
    fn test_index_parse_and_render() {
        let index = CourseIndex::parse(INDEX).unwrap();
        assert_eq!(index.courses.len(), 2);
        let py = index.get(&CourseId::new("python_101")).unwrap();
        assert_eq!(py.path, CoursePath::File("python_101.yml".into()));
        assert_eq!(py.meta.element, Some(ElementId::new("intro")));
        assert!(py.meta.restricted);
        assert_eq!(
            index.get(&CourseId::new("sql")).unwrap().path,
            CoursePath::Database
        );
        assert_eq!(index.ext_courses, Some(CoursePath::File("more.yml".into())));

        let again = CourseIndex::parse(&index.to_yaml_string().unwrap()).unwrap();
        assert_eq!(again, index);
    }

    #[test]
    fn test_index_rejects_escaping_paths() {
        assert!(CourseIndex::parse("c:\n  path: ../x.yml\n").is_err());
        assert!(CourseIndex::parse("bad id:\n  path: x.yml\n").is_err());
    }

    #[test]
    fn test_ext_courses_override() {
        let files = MemoryCourseFiles::new()
            .with_file(INDEX_FILE, INDEX)
            .with_file("more.yml", "sql:\n  path: sql.yml\nextra:\n  path: extra.yml\n");
        let index = files.resolve_index().unwrap();
        assert_eq!(
            index.get(&CourseId::new("sql")).unwrap().path,
            CoursePath::File("sql.yml".into())
        );
        assert!(index.get(&CourseId::new("extra")).is_some());
        assert_eq!(files.load_index().unwrap().courses.len(), 2);
    }

    #[test]
    fn test_repository_round_trip_and_conflict() {
        let mut files = MemoryCourseFiles::new()
            .with_file(INDEX_FILE, "python_101:\n  path: python_101.yml\n");
        let id = CourseId::new("python_101");

        let first = save_course(&mut files, &id, &elements(), None).unwrap();
        let (entry, document) = load_course(&files, &id).unwrap();
        assert_eq!(entry.path.as_str(), "python_101.yml");
        assert_eq!(document.decoded.elements, elements());
        assert_eq!(document.revision, first);

        let stale = ContentHash::of_bytes(b"older");
        let err = save_course(&mut files, &id, &elements(), Some(&stale)).unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert!(save_course(&mut files, &id, &elements(), Some(&first)).is_ok());
    }

    #[test]
    fn test_database_courses_are_not_files() {
        let files = MemoryCourseFiles::new().with_file(INDEX_FILE, "sql:\n  path: db\n");
        assert!(matches!(
            load_course(&files, &CourseId::new("sql")),
            Err(StorageError::StoredInDatabase(_))
        ));
        assert!(matches!(
            load_course(&files, &CourseId::new("nope")),
            Err(StorageError::NotInIndex(_))
        ));
    }

    #[test]
    fn test_fs_files_write_atomically_into_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FsCourseFiles::new(dir.path());
        assert_eq!(files.read_text("team/c.yml").unwrap(), None);

        let revision = files.write_document("team/c.yml", &elements(), None).unwrap();
        let document = files.read_document("team/c.yml").unwrap();
        assert_eq!(document.revision, revision);
        assert_eq!(document.decoded.elements, elements());

        let leftovers = std::fs::read_dir(dir.path().join("team")).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
