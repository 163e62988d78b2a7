pub mod codec;
pub mod course;
pub mod element;
pub mod error;
pub mod id;
pub mod interval;
pub mod legacy;

// Re-export commonly used types
pub use codec::{Decoded, PayloadError, SkippedElement};
pub use course::{CourseMeta, CourseSource};
pub use element::{Element, ElementKind, ElementType, ParseMode, Reference, ReferenceKind};
pub use error::{ContentError, ErrorKind};
pub use id::{AccountId, CourseId, CourseKey, ElementId};
