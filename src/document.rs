//! Defines the Firestore document model as encoded by the REST API
//! and by Firestore event payloads.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Matches a fully-qualified document resource name.
static RESOURCE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^projects/([^/]+)/databases/([^/]+)/documents/(.+)$")
        .expect("resource name regex is valid")
});

/// A latitude/longitude pair.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

/// The contents of an array value. Empty arrays are encoded without
/// the `values` key.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

/// The contents of a map value. Empty maps are encoded without the
/// `fields` key.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

/// A single field value. Each value is carried by an object holding
/// exactly one key that names its type.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// 64-bit integers travel as strings.
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

impl Value {
    /// The string held by this value, if it is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) => Some(s),
            _ => None,
        }
    }
}

/// A Firestore document.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The fully-qualified resource name, in the form
    /// `projects/{project}/databases/{database}/documents/{path}`.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Builds a document from string fields only.
    pub fn with_string_fields<'a, I>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Document {
            name: String::from(name),
            fields: fields
                .into_iter()
                .map(|(k, v)| (String::from(k), Value::StringValue(String::from(v))))
                .collect(),
            ..Default::default()
        }
    }

    /// Get a non-empty string field. Fields of any other type, and
    /// empty strings, count as absent.
    pub fn string_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The document path relative to the database root, e.g.
    /// `friendships/abc`. Names that aren't fully qualified are
    /// returned as they are.
    pub fn path(&self) -> &str {
        RESOURCE_NAME_RE
            .captures(&self.name)
            .and_then(|c| c.get(3))
            .map(|m| m.as_str())
            .unwrap_or(&self.name)
    }

    /// The last segment of the document path.
    pub fn id(&self) -> &str {
        self.path().rsplit('/').next().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Value};
    use serde_json::json;

    #[test]
    fn decodes_typed_fields() {
        let document: Document = serde_json::from_value(json!({
            "name": "projects/demo/databases/(default)/documents/users/u1",
            "fields": {
                "fcmToken": {"stringValue": "tok-123"},
                "age": {"integerValue": "31"},
                "nickname": {"nullValue": null},
                "tags": {"arrayValue": {}},
                "profile": {"mapValue": {"fields": {"verified": {"booleanValue": true}}}}
            },
            "createTime": "2024-05-01T10:00:00.000000Z",
            "updateTime": "2024-05-01T10:00:00.000000Z"
        }))
        .unwrap();

        assert_eq!(document.string_field("fcmToken"), Some("tok-123"));
        assert_eq!(
            document.fields.get("age"),
            Some(&Value::IntegerValue(String::from("31")))
        );
        assert_eq!(document.fields.get("nickname"), Some(&Value::NullValue(())));
        assert_eq!(document.path(), "users/u1");
        assert_eq!(document.id(), "u1");
    }

    #[test]
    fn non_string_and_empty_fields_count_as_absent() {
        let document: Document = serde_json::from_value(json!({
            "fields": {
                "fcmToken": {"stringValue": ""},
                "targetId": {"integerValue": "7"}
            }
        }))
        .unwrap();

        assert_eq!(document.string_field("fcmToken"), None);
        assert_eq!(document.string_field("targetId"), None);
        assert_eq!(document.string_field("missing"), None);
    }

    #[test]
    fn relative_names_are_kept_as_paths() {
        let document = Document::with_string_fields("friendships/f1", [("targetId", "u1")]);
        assert_eq!(document.path(), "friendships/f1");
        assert_eq!(document.id(), "f1");
        assert_eq!(document.string_field("targetId"), Some("u1"));
    }
}
