use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::database::entity::{ColumnType, EntityDef};

/// Fields owned by the server; clients never set these directly
pub const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "is_active",
    "created_by",
    "updated_by",
    "created_at",
    "updated_at",
];

/// Field path -> message. Ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, String>;

/// How strictly an input object is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// New record: mandatory fields and the scope column must be present
    Create,
    /// Batch update item: `id` plus the mandatory fields
    Replace,
    /// Single-record update: any subset of mutable columns
    Patch,
}

/// Errors that can occur while reading a record from API input
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid record fields")]
    Invalid(FieldErrors),
}

/// A validated record: column values already checked against the entity's column types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub id: Option<Uuid>,
    fields: Map<String, Value>,
}

impl Record {
    /// Validate one API input object. Problems are reported per field so that
    /// a batch can collect every offending field before failing.
    pub fn parse(def: &EntityDef, input: &Value, mode: RecordMode) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let Value::Object(map) = input else {
            errors.insert(String::new(), "Expected a JSON object".to_string());
            return Err(errors);
        };

        let mut record = Record::default();

        for (key, value) in map {
            if key == "id" && mode == RecordMode::Replace {
                match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                    Some(id) => record.id = Some(id),
                    None => {
                        errors.insert("id".to_string(), format!("Invalid UUID format: {}", value));
                    }
                }
                continue;
            }
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                errors.insert(key.clone(), "System field cannot be set via API".to_string());
                continue;
            }
            let Some(column) = def.column(key) else {
                errors.insert(key.clone(), format!("Unknown field for {}", def.label));
                continue;
            };
            match coerce(column.ty, value) {
                Ok(v) => {
                    record.fields.insert(key.clone(), v);
                }
                Err(msg) => {
                    errors.insert(key.clone(), msg);
                }
            }
        }

        if mode == RecordMode::Replace && record.id.is_none() && !errors.contains_key("id") {
            errors.insert("id".to_string(), "This field is required".to_string());
        }

        if mode != RecordMode::Patch {
            let mandatory = def.required.iter().copied().chain(def.scope);
            for field in mandatory {
                if errors.contains_key(field) {
                    continue;
                }
                if !record.has_value(field) {
                    errors.insert(field.to_string(), "This field is required".to_string());
                }
            }
        } else if record.fields.is_empty() && errors.is_empty() {
            errors.insert(String::new(), "No updatable fields provided".to_string());
        }

        // Patching may clear optional columns but never blank out a mandatory one
        if mode == RecordMode::Patch {
            for field in def.required.iter().copied().chain(def.scope) {
                if record.fields.contains_key(field) && !record.has_value(field) {
                    errors.insert(field.to_string(), "This field cannot be empty".to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(record)
        } else {
            Err(errors)
        }
    }

    /// Parse a JSON array of input objects, prefixing field errors with `<prefix>[i].`
    pub fn parse_many(
        def: &EntityDef,
        items: &[Value],
        mode: RecordMode,
        prefix: &str,
        errors: &mut FieldErrors,
    ) -> Vec<Record> {
        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match Record::parse(def, item, mode) {
                Ok(record) => records.push(record),
                Err(field_errors) => {
                    for (field, msg) in field_errors {
                        let path = if field.is_empty() {
                            format!("{}[{}]", prefix, index)
                        } else {
                            format!("{}[{}].{}", prefix, index, field)
                        };
                        errors.insert(path, msg);
                    }
                }
            }
        }
        records
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    fn has_value(&self, key: &str) -> bool {
        match self.fields.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }
}

/// Check a JSON value against a column type, normalizing where needed
fn coerce(ty: ColumnType, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match ty {
        ColumnType::Text => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| "Expected a string".to_string()),
        ColumnType::Integer => match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "Expected an integer".to_string()),
            _ => Err("Expected an integer".to_string()),
        },
        ColumnType::Numeric => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(Value::String(s.trim().to_string())),
            _ => Err("Expected a number".to_string()),
        },
        ColumnType::Boolean => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "Expected a boolean".to_string()),
        ColumnType::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(|u| Value::String(u.to_string()))
            .ok_or_else(|| format!("Invalid UUID format: {}", value)),
        ColumnType::Date => {
            let s = value.as_str().ok_or_else(|| "Expected a date string".to_string())?;
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Ok(Value::String(date.to_string()));
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::String(dt.date_naive().to_string()))
                .map_err(|_| format!("Invalid date format: {}", s))
        }
        ColumnType::Json => Ok(value.clone()),
        ColumnType::TextArray => match value {
            Value::Array(items) if items.iter().all(Value::is_string) => Ok(value.clone()),
            _ => Err("Expected an array of strings".to_string()),
        },
    }
}

/// Parse a route/path id
pub fn parse_id(raw: &str) -> Result<Uuid, RecordError> {
    Uuid::parse_str(raw).map_err(|_| {
        let mut errors = FieldErrors::new();
        errors.insert("id".to_string(), format!("Invalid UUID format: {}", raw));
        RecordError::Invalid(errors)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entity::lookup;
    use serde_json::json;

    #[test]
    fn create_requires_mandatory_and_scope_fields() {
        let def = lookup("certificates").unwrap();
        let errors = Record::parse(def, &json!({ "issuer": "AWS" }), RecordMode::Create).unwrap_err();
        assert_eq!(errors.get("title").map(String::as_str), Some("This field is required"));
        assert!(errors.contains_key("user_id"));
    }

    #[test]
    fn blank_strings_do_not_satisfy_required() {
        let def = lookup("skills").unwrap();
        let errors = Record::parse(def, &json!({ "title": "   " }), RecordMode::Create).unwrap_err();
        assert!(errors.contains_key("title"));
    }

    #[test]
    fn rejects_system_and_unknown_fields() {
        let def = lookup("companies").unwrap();
        let errors = Record::parse(
            def,
            &json!({ "name": "Acme", "created_at": "2024-01-01", "ceo": "Wile" }),
            RecordMode::Create,
        )
        .unwrap_err();
        assert!(errors.contains_key("created_at"));
        assert!(errors.contains_key("ceo"));
        assert!(!errors.contains_key("name"));
    }

    #[test]
    fn replace_needs_a_valid_id() {
        let def = lookup("skills").unwrap();
        let errors = Record::parse(def, &json!({ "id": "nope", "title": "Rust" }), RecordMode::Replace).unwrap_err();
        assert!(errors.get("id").unwrap().contains("Invalid UUID"));

        let errors = Record::parse(def, &json!({ "title": "Rust" }), RecordMode::Replace).unwrap_err();
        assert_eq!(errors.get("id").map(String::as_str), Some("This field is required"));

        let id = Uuid::new_v4();
        let record = Record::parse(def, &json!({ "id": id.to_string(), "title": "Rust" }), RecordMode::Replace).unwrap();
        assert_eq!(record.id, Some(id));
        assert!(record.get("id").is_none());
    }

    #[test]
    fn coerces_column_types() {
        let def = lookup("companies").unwrap();
        let record = Record::parse(def, &json!({ "name": "Acme", "size": "25" }), RecordMode::Create).unwrap();
        assert_eq!(record.get("size"), Some(&json!(25)));

        let errors = Record::parse(def, &json!({ "name": "Acme", "size": 2.5 }), RecordMode::Create).unwrap_err();
        assert_eq!(errors.get("size").map(String::as_str), Some("Expected an integer"));

        let def = lookup("education").unwrap();
        let record = Record::parse(
            def,
            &json!({
                "user_id": Uuid::nil().to_string(),
                "institution": "MIT",
                "start_date": "2019-09-01T00:00:00Z",
            }),
            RecordMode::Create,
        )
        .unwrap();
        assert_eq!(record.get("start_date"), Some(&json!("2019-09-01")));
    }

    #[test]
    fn patch_accepts_subsets_but_not_blank_mandatory_fields() {
        let def = lookup("jobs").unwrap();
        assert!(Record::parse(def, &json!({ "status": "closed" }), RecordMode::Patch).is_ok());
        let errors = Record::parse(def, &json!({ "title": "" }), RecordMode::Patch).unwrap_err();
        assert!(errors.contains_key("title"));
        assert!(Record::parse(def, &json!({}), RecordMode::Patch).is_err());
    }

    #[test]
    fn parse_many_prefixes_paths() {
        let def = lookup("certificates").unwrap();
        let user = Uuid::new_v4().to_string();
        let items = vec![
            json!({ "user_id": user, "title": "CKA" }),
            json!({ "user_id": user, "issuer": "CNCF" }),
        ];
        let mut errors = FieldErrors::new();
        let records = Record::parse_many(def, &items, RecordMode::Create, "new_certificates", &mut errors);
        assert_eq!(records.len(), 1);
        assert!(errors.contains_key("new_certificates[1].title"));
    }
}
