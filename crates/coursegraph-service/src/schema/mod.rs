//! Schema types for the editor service's requests and responses.
//!
//! Types use serde derives so callers can move them across any transport
//! as JSON.

pub mod courses;
pub mod diagnostics;
