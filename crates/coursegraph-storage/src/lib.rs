//! Persistence for course content.
//!
//! A course lives in exactly one authoritative storage form at a time:
//! element rows in a relational store, or a YAML document in a scripts
//! folder. This crate provides both forms and the codec between canonical
//! elements and rows.
//!
//! # Architecture
//!
//! - [`CourseStore`] is the relational contract. Saves replace the whole
//!   row set in one transaction and are guarded by a [`ContentHash`]
//!   revision, so a stale writer gets [`StorageError::Conflict`].
//! - [`files::CourseFiles`] is the YAML contract: the `courses.yml` index
//!   plus one document per course, written atomically.
//!
//! # Modules
//!
//! - [`convert`]: elements to rows and back
//! - [`hash`]: blake3 content hashes used as revisions
//! - [`memory`]: in-memory store for tests
//! - [`sqlite`]: SQLite store with migrations
//! - [`files`]: YAML index and document repository

pub mod convert;
pub mod error;
pub mod files;
pub mod hash;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use convert::{decode_rows, encode_rows};
pub use error::StorageError;
pub use files::{CourseFiles, CourseIndex, CoursePath, FsCourseFiles, MemoryCourseFiles};
pub use hash::ContentHash;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::CourseStore;
pub use types::{CourseSummary, ElementRow, RowWriteSet, StoredCourse};
