//! In-memory implementation of [`CourseStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and anywhere
//! persistence isn't needed. It has the same semantics as the SQLite backend:
//! a save builds the complete new course first and then swaps it in, so a
//! failed save leaves the previous state untouched.

use std::collections::{BTreeMap, HashMap};

use coursegraph_core::course::CourseMeta;
use coursegraph_core::id::{AccountId, CourseId, CourseKey};

use crate::error::StorageError;
use crate::hash::ContentHash;
use crate::traits::{check_revision, CourseStore};
use crate::types::{CourseSummary, ElementRow, RowWriteSet, StoredCourse};

#[derive(Debug, Clone)]
struct StoredEntry {
    meta: CourseMeta,
    rows: Vec<ElementRow>,
    revision: ContentHash,
}

/// HashMap-backed course store, keyed by account then course id.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: HashMap<AccountId, BTreeMap<CourseId, StoredEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &CourseKey) -> Option<&StoredEntry> {
        self.accounts.get(&key.account)?.get(&key.course)
    }
}

impl CourseStore for InMemoryStore {
    fn create_course(
        &mut self,
        key: &CourseKey,
        meta: &CourseMeta,
    ) -> Result<ContentHash, StorageError> {
        if self.entry(key).is_some() {
            return Err(StorageError::CourseExists(key.clone()));
        }
        let revision = ContentHash::of_rows(&[]);
        self.accounts.entry(key.account).or_default().insert(
            key.course.clone(),
            StoredEntry {
                meta: meta.clone(),
                rows: Vec::new(),
                revision: revision.clone(),
            },
        );
        Ok(revision)
    }

    fn load_course(&self, key: &CourseKey) -> Result<StoredCourse, StorageError> {
        let entry = self
            .entry(key)
            .ok_or_else(|| StorageError::CourseNotFound(key.clone()))?;
        Ok(StoredCourse {
            key: key.clone(),
            meta: entry.meta.clone(),
            rows: entry.rows.clone(),
            revision: entry.revision.clone(),
        })
    }

    fn save_course(
        &mut self,
        write: &RowWriteSet,
        meta: &CourseMeta,
        expected: Option<&ContentHash>,
    ) -> Result<ContentHash, StorageError> {
        let key = &write.key;
        match self.entry(key) {
            Some(current) => check_revision(key, &current.revision, expected)?,
            None if expected.is_some() => return Err(StorageError::CourseNotFound(key.clone())),
            None => {}
        }

        let replacement = StoredEntry {
            meta: meta.clone(),
            rows: write.rows.clone(),
            revision: write.hash.clone(),
        };
        self.accounts
            .entry(key.account)
            .or_default()
            .insert(key.course.clone(), replacement);

        tracing::debug!(course = %key, rows = write.rows.len(), "saved course in memory");
        Ok(write.hash.clone())
    }

    fn update_meta(&mut self, key: &CourseKey, meta: &CourseMeta) -> Result<(), StorageError> {
        let entry = self
            .accounts
            .get_mut(&key.account)
            .and_then(|courses| courses.get_mut(&key.course))
            .ok_or_else(|| StorageError::CourseNotFound(key.clone()))?;
        entry.meta = meta.clone();
        Ok(())
    }

    fn delete_course(&mut self, key: &CourseKey) -> Result<(), StorageError> {
        self.accounts
            .get_mut(&key.account)
            .and_then(|courses| courses.remove(&key.course))
            .map(|_| ())
            .ok_or_else(|| StorageError::CourseNotFound(key.clone()))
    }

    fn list_courses(&self, account: AccountId) -> Result<Vec<CourseSummary>, StorageError> {
        let Some(courses) = self.accounts.get(&account) else {
            return Ok(Vec::new());
        };
        Ok(courses
            .iter()
            .map(|(course, entry)| CourseSummary {
                key: CourseKey {
                    account,
                    course: course.clone(),
                },
                meta: entry.meta.clone(),
                element_count: entry.rows.len(),
                revision: entry.revision.clone(),
            })
            .collect())
    }

    fn course_exists(&self, key: &CourseKey) -> Result<bool, StorageError> {
        Ok(self.entry(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::encode_rows;
    use coursegraph_core::element::{Element, ElementKind, End, Section};

    fn key(course: &str) -> CourseKey {
        CourseKey::new(AccountId(1), course)
    }

    fn elements(title: &str) -> Vec<Element> {
        vec![
            Element::new(
                "s",
                ElementKind::Section(Section {
                    title: title.into(),
                }),
            ),
            Element::new("fin", ElementKind::End(End::default())),
        ]
    }

    #[test]
    fn test_create_load_and_list() {
        let mut store = InMemoryStore::new();
        let revision = store
            .create_course(&key("intro"), &CourseMeta::with_entry("s"))
            .unwrap();
        assert!(store.create_course(&key("intro"), &CourseMeta::default()).is_err());

        let stored = store.load_course(&key("intro")).unwrap();
        assert_eq!(stored.revision, revision);
        assert!(stored.rows.is_empty());
        assert!(stored.decode().elements.is_empty());

        let list = store.list_courses(AccountId(1)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].meta.element.as_ref().map(|e| e.as_str()), Some("s"));
        assert!(store.list_courses(AccountId(2)).unwrap().is_empty());
    }

    #[test]
    fn test_stale_revision_conflicts() {
        let mut store = InMemoryStore::new();
        let base = store.create_course(&key("c"), &CourseMeta::default()).unwrap();

        let first = encode_rows(&key("c"), &elements("one")).unwrap();
        let second = encode_rows(&key("c"), &elements("two")).unwrap();
        store
            .save_course(&first, &CourseMeta::default(), Some(&base))
            .unwrap();

        let err = store
            .save_course(&second, &CourseMeta::default(), Some(&base))
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert_eq!(
            store.load_course(&key("c")).unwrap().decode().elements,
            elements("one")
        );
    }

    #[test]
    fn test_unconditional_save_creates_course() {
        let mut store = InMemoryStore::new();
        let write = encode_rows(&key("new"), &elements("x")).unwrap();
        let revision = store.save_course(&write, &CourseMeta::default(), None).unwrap();
        assert_eq!(revision, write.hash);
        assert!(store.course_exists(&key("new")).unwrap());

        let missing = encode_rows(&key("gone"), &elements("x")).unwrap();
        assert!(matches!(
            store.save_course(&missing, &CourseMeta::default(), Some(&revision)),
            Err(StorageError::CourseNotFound(_))
        ));
    }

    #[test]
    fn test_update_meta_and_delete() {
        let mut store = InMemoryStore::new();
        let write = encode_rows(&key("c"), &elements("x")).unwrap();
        store.save_course(&write, &CourseMeta::default(), None).unwrap();

        store
            .update_meta(&key("c"), &CourseMeta::with_entry("fin"))
            .unwrap();
        let stored = store.load_course(&key("c")).unwrap();
        assert_eq!(stored.revision, write.hash);
        assert_eq!(stored.meta, CourseMeta::with_entry("fin"));

        store.delete_course(&key("c")).unwrap();
        assert!(!store.course_exists(&key("c")).unwrap());
        assert!(store.delete_course(&key("c")).is_err());
    }
}
