//! Normalization of historical, loosely-typed field encodings.
//!
//! Course data written by older tooling stores booleans as `"yes"` / `"no"`
//! strings (YAML 1.1 habits that YAML 1.2 parsers read back as strings),
//! sometimes as `0` / `1`, and sometimes as real booleans. The canonical
//! element structs only accept real booleans; every surface decoder routes
//! raw input through this module first.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Parses a textual flag, case-insensitively.
///
/// Returns `None` for text that is not a recognized flag spelling.
pub fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" | "on" => Some(true),
        "no" | "n" | "false" | "0" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Interprets an arbitrary JSON value as a flag.
pub fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => parse_flag(s),
        Value::Null => Some(false),
        _ => None,
    }
}

/// A boolean that accepts every historical spelling on input and always
/// writes a plain boolean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LegacyBool(pub bool);

impl LegacyBool {
    pub fn get(self) -> bool {
        self.0
    }
}

impl From<bool> for LegacyBool {
    fn from(b: bool) -> Self {
        LegacyBool(b)
    }
}

impl From<LegacyBool> for bool {
    fn from(b: LegacyBool) -> Self {
        b.0
    }
}

impl Serialize for LegacyBool {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.0)
    }
}

struct LegacyBoolVisitor;

impl<'de> Visitor<'de> for LegacyBoolVisitor {
    type Value = LegacyBool;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, 0/1, or a yes/no/true/false string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<LegacyBool, E> {
        Ok(LegacyBool(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<LegacyBool, E> {
        Ok(LegacyBool(v != 0))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<LegacyBool, E> {
        Ok(LegacyBool(v != 0))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<LegacyBool, E> {
        parse_flag(v)
            .map(LegacyBool)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_unit<E: de::Error>(self) -> Result<LegacyBool, E> {
        Ok(LegacyBool(false))
    }

    fn visit_none<E: de::Error>(self) -> Result<LegacyBool, E> {
        Ok(LegacyBool(false))
    }
}

impl<'de> Deserialize<'de> for LegacyBool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LegacyBoolVisitor)
    }
}

/// `deserialize_with` helper for plain `bool` fields that must tolerate
/// legacy spellings (course index and metadata blobs).
pub fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    LegacyBool::deserialize(deserializer).map(bool::from)
}

/// Element-level fields holding flags.
const ELEMENT_FLAGS: &[&str] = &["link_preview", "auto_start", "voice_response"];

/// Rewrites the known flag fields of a raw element payload to canonical
/// booleans, in place.
///
/// Unrecognized spellings are left untouched so that the strict decode that
/// follows reports them instead of guessing.
pub fn normalize_payload(payload: &mut Value) {
    let Some(fields) = payload.as_object_mut() else {
        return;
    };

    for key in ELEMENT_FLAGS {
        normalize_field(fields, key);
    }
    normalize_parse_mode(fields);

    if let Some(Value::Array(answers)) = fields.get_mut("answers") {
        for answer in answers.iter_mut() {
            if let Some(answer) = answer.as_object_mut() {
                normalize_field(answer, "correct");
            }
        }
    }

    if let Some(Value::Array(options)) = fields.get_mut("options") {
        for option in options.iter_mut() {
            if let Some(option) = option.as_object_mut() {
                normalize_goto(option);
            }
        }
    }
}

/// An empty `goto` means "no target", the same as an absent one.
fn normalize_goto(option: &mut serde_json::Map<String, Value>) {
    let empty = match option.get("goto") {
        Some(Value::Null) => true,
        Some(Value::String(target)) => target.is_empty(),
        _ => false,
    };
    if empty {
        option.remove("goto");
    }
}

/// Older documents spell parse modes in any case and use `TEXT` for plain
/// text, which the canonical form represents as an absent field.
fn normalize_parse_mode(fields: &mut serde_json::Map<String, Value>) {
    let canonical = match fields.get("parse_mode") {
        None => return,
        Some(Value::String(mode)) => mode.trim().to_ascii_uppercase(),
        Some(Value::Null) => String::new(),
        Some(_) => return,
    };
    if canonical.is_empty() || canonical == "TEXT" {
        fields.remove("parse_mode");
    } else {
        fields.insert("parse_mode".to_string(), Value::String(canonical));
    }
}

fn normalize_field(fields: &mut serde_json::Map<String, Value>, key: &str) {
    if let Some(value) = fields.get_mut(key) {
        if value.is_null() {
            fields.remove(key);
        } else if let Some(flag) = flag_from_value(value) {
            *value = Value::Bool(flag);
        }
    }
}
