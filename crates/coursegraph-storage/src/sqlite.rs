//! SQLite implementation of [`CourseStore`].
//!
//! [`SqliteStore`] persists courses in a SQLite database with WAL mode and
//! automatic schema migrations. A save runs as one `BEGIN IMMEDIATE`
//! transaction: it takes the write lock before reading the stored revision,
//! so two connections saving the same course are strictly ordered and the
//! later one sees the earlier one's revision.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use coursegraph_core::course::CourseMeta;
use coursegraph_core::id::{AccountId, CourseId, CourseKey};

use crate::error::StorageError;
use crate::hash::ContentHash;
use crate::traits::{check_revision, CourseStore};
use crate::types::{CourseSummary, ElementRow, RowWriteSet, StoredCourse};

/// SQLite-backed implementation of [`CourseStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    fn parse_hash(key: &CourseKey, hex: &str) -> Result<ContentHash, StorageError> {
        ContentHash::from_hex(hex).ok_or_else(|| StorageError::IntegrityError {
            reason: format!("course {key} has a malformed content hash '{hex}'"),
        })
    }

    fn parse_meta(json: &str) -> Result<CourseMeta, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads `(metadata_json, content_hash)` for a course, if it exists.
    fn course_row(
        conn: &Connection,
        key: &CourseKey,
    ) -> Result<Option<(String, String)>, StorageError> {
        let row = conn
            .prepare_cached(
                "SELECT metadata_json, content_hash FROM courses
                 WHERE account_id = ?1 AND course_id = ?2",
            )?
            .query_row(params![key.account.0, key.course.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;
        Ok(row)
    }
}

impl CourseStore for SqliteStore {
    fn create_course(
        &mut self,
        key: &CourseKey,
        meta: &CourseMeta,
    ) -> Result<ContentHash, StorageError> {
        let revision = ContentHash::of_rows(&[]);
        let meta_json = serde_json::to_string(meta)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if Self::course_row(&tx, key)?.is_some() {
            return Err(StorageError::CourseExists(key.clone()));
        }
        tx.execute(
            "INSERT INTO courses (account_id, course_id, metadata_json, content_hash)
             VALUES (?1, ?2, ?3, ?4)",
            params![key.account.0, key.course.as_str(), meta_json, revision.to_hex()],
        )?;
        tx.commit()?;

        tracing::info!(course = %key, "created course");
        Ok(revision)
    }

    fn load_course(&self, key: &CourseKey) -> Result<StoredCourse, StorageError> {
        let (meta_json, hash_hex) = Self::course_row(&self.conn, key)?
            .ok_or_else(|| StorageError::CourseNotFound(key.clone()))?;

        let rows = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT element_id, element_type, position, json FROM course_elements
                 WHERE account_id = ?1 AND course_id = ?2 ORDER BY position",
            )?;
            let rows = stmt.query_map(params![key.account.0, key.course.as_str()], |row| {
                Ok(ElementRow {
                    element_id: row.get(0)?,
                    element_type: row.get(1)?,
                    position: row.get(2)?,
                    json: row.get(3)?,
                })
            })?;
            let mut result = Vec::new();
            for row in rows {
                result.push(row?);
            }
            result
        };

        Ok(StoredCourse {
            key: key.clone(),
            meta: Self::parse_meta(&meta_json)?,
            rows,
            revision: Self::parse_hash(key, &hash_hex)?,
        })
    }

    fn save_course(
        &mut self,
        write: &RowWriteSet,
        meta: &CourseMeta,
        expected: Option<&ContentHash>,
    ) -> Result<ContentHash, StorageError> {
        let key = &write.key;
        let meta_json = serde_json::to_string(meta)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        match Self::course_row(&tx, key)? {
            Some((_, stored_hex)) => {
                let stored = Self::parse_hash(key, &stored_hex)?;
                check_revision(key, &stored, expected)?;
                tx.execute(
                    "UPDATE courses SET metadata_json = ?3, content_hash = ?4
                     WHERE account_id = ?1 AND course_id = ?2",
                    params![key.account.0, key.course.as_str(), meta_json, write.hash.to_hex()],
                )?;
            }
            None if expected.is_some() => return Err(StorageError::CourseNotFound(key.clone())),
            None => {
                tx.execute(
                    "INSERT INTO courses (account_id, course_id, metadata_json, content_hash)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![key.account.0, key.course.as_str(), meta_json, write.hash.to_hex()],
                )?;
            }
        }

        tx.execute(
            "DELETE FROM course_elements WHERE account_id = ?1 AND course_id = ?2",
            params![key.account.0, key.course.as_str()],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO course_elements
                 (account_id, course_id, element_id, position, element_type, json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in &write.rows {
                stmt.execute(params![
                    key.account.0,
                    key.course.as_str(),
                    row.element_id,
                    row.position,
                    row.element_type,
                    row.json,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(course = %key, rows = write.rows.len(), revision = %write.hash, "saved course");
        Ok(write.hash.clone())
    }

    fn update_meta(&mut self, key: &CourseKey, meta: &CourseMeta) -> Result<(), StorageError> {
        let meta_json = serde_json::to_string(meta)?;
        let updated = self.conn.execute(
            "UPDATE courses SET metadata_json = ?3 WHERE account_id = ?1 AND course_id = ?2",
            params![key.account.0, key.course.as_str(), meta_json],
        )?;
        if updated == 0 {
            return Err(StorageError::CourseNotFound(key.clone()));
        }
        Ok(())
    }

    fn delete_course(&mut self, key: &CourseKey) -> Result<(), StorageError> {
        let deleted = self.conn.execute(
            "DELETE FROM courses WHERE account_id = ?1 AND course_id = ?2",
            params![key.account.0, key.course.as_str()],
        )?;
        if deleted == 0 {
            return Err(StorageError::CourseNotFound(key.clone()));
        }
        tracing::info!(course = %key, "deleted course");
        Ok(())
    }

    fn list_courses(&self, account: AccountId) -> Result<Vec<CourseSummary>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT c.course_id, c.metadata_json, c.content_hash, COUNT(e.course_element_id)
             FROM courses c
             LEFT JOIN course_elements e
               ON e.account_id = c.account_id AND e.course_id = c.course_id
             WHERE c.account_id = ?1
             GROUP BY c.course_id
             ORDER BY c.course_id",
        )?;
        let rows = stmt.query_map(params![account.0], |row| {
            let course_id: String = row.get(0)?;
            let meta_json: String = row.get(1)?;
            let hash_hex: String = row.get(2)?;
            let count: i64 = row.get(3)?;
            Ok((course_id, meta_json, hash_hex, count))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (course_id, meta_json, hash_hex, count) = row?;
            let key = CourseKey {
                account,
                course: CourseId(course_id),
            };
            result.push(CourseSummary {
                meta: Self::parse_meta(&meta_json)?,
                revision: Self::parse_hash(&key, &hash_hex)?,
                element_count: count as usize,
                key,
            });
        }
        Ok(result)
    }

    fn course_exists(&self, key: &CourseKey) -> Result<bool, StorageError> {
        Ok(Self::course_row(&self.conn, key)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::encode_rows;
    use coursegraph_core::element::{Element, ElementKind, End, Message};

    fn key(course: &str) -> CourseKey {
        CourseKey::new(AccountId(3), course)
    }

    fn course(text: &str) -> Vec<Element> {
        vec![
            Element::new(
                "m1",
                ElementKind::Message(Message {
                    text: text.into(),
                    ..Default::default()
                }),
            ),
            Element::new("fin", ElementKind::End(End::default())),
        ]
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let write = encode_rows(&key("py"), &course("hello")).unwrap();
        let meta = CourseMeta::with_entry("m1");
        let revision = store.save_course(&write, &meta, None).unwrap();

        let stored = store.load_course(&key("py")).unwrap();
        assert_eq!(stored.revision, revision);
        assert_eq!(stored.meta, meta);
        assert_eq!(stored.rows, write.rows);
        assert_eq!(stored.decode().elements, course("hello"));
    }

    #[test]
    fn test_save_replaces_whole_row_set() {
        let mut store = SqliteStore::in_memory().unwrap();
        let first = encode_rows(&key("py"), &course("one")).unwrap();
        let rev = store.save_course(&first, &CourseMeta::default(), None).unwrap();

        let shorter = vec![Element::new("only", ElementKind::End(End::default()))];
        let second = encode_rows(&key("py"), &shorter).unwrap();
        store
            .save_course(&second, &CourseMeta::default(), Some(&rev))
            .unwrap();

        assert_eq!(store.load_course(&key("py")).unwrap().decode().elements, shorter);
        let list = store.list_courses(AccountId(3)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].element_count, 1);
    }

    #[test]
    fn test_create_course_twice_fails() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.create_course(&key("c"), &CourseMeta::default()).unwrap();
        assert!(matches!(
            store.create_course(&key("c"), &CourseMeta::default()),
            Err(StorageError::CourseExists(_))
        ));
        assert!(store.load_course(&key("c")).unwrap().rows.is_empty());
    }

    #[test]
    fn test_concurrent_connections_conflict_on_stale_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.db");
        let mut a = SqliteStore::new(&path).unwrap();
        let mut b = SqliteStore::new(&path).unwrap();

        let base = a.create_course(&key("c"), &CourseMeta::default()).unwrap();
        let seen_by_b = b.load_course(&key("c")).unwrap().revision;
        assert_eq!(seen_by_b, base);

        let from_a = encode_rows(&key("c"), &course("from a")).unwrap();
        a.save_course(&from_a, &CourseMeta::default(), Some(&base))
            .unwrap();

        let from_b = encode_rows(&key("c"), &course("from b")).unwrap();
        let err = b
            .save_course(&from_b, &CourseMeta::default(), Some(&seen_by_b))
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        assert_eq!(
            b.load_course(&key("c")).unwrap().decode().elements,
            course("from a")
        );
    }

    #[test]
    fn test_delete_cascades_rows() {
        let mut store = SqliteStore::in_memory().unwrap();
        let write = encode_rows(&key("c"), &course("x")).unwrap();
        store.save_course(&write, &CourseMeta::default(), None).unwrap();
        store.delete_course(&key("c")).unwrap();

        let orphans: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM course_elements", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(!store.course_exists(&key("c")).unwrap());
    }
}
