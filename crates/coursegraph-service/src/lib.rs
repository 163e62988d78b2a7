//! Editor-facing course service.
//!
//! Loads courses from whichever storage form is authoritative, validates
//! editor saves before they reach storage, and runs the explicit migrations
//! between YAML files and the database. This crate contains the service,
//! its request/response schema types, and error handling.

pub mod error;
pub mod schema;
pub mod service;

pub use error::{ErrorDetail, ServiceError};
pub use schema::courses::{
    CourseListing, EditorCourse, MigrationResponse, SaveCourseRequest, SaveCourseResponse,
};
pub use schema::diagnostics::Diagnostic;
pub use service::CourseService;
