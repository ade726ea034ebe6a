//! Declared record shapes and their validation.
//!
//! A `Schema` is a named list of fields. `validate` walks a JSON value and
//! collects every violation with its path, so the message can be fed back to
//! a reasoning service that produced the value.

use crate::error::AuditError;
use crate::evidence::{EvidenceCategory, Flag};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number { min: f64, max: f64 },
    Integer { min: i64, max: i64 },
    Bool,
    OneOf(Vec<String>),
    Array(Box<FieldKind>),
    /// Object with arbitrary keys whose values share one kind
    Map(Box<FieldKind>),
    Object(Schema),
    Any,
}

impl FieldKind {
    fn describe(&self) -> String {
        match self {
            FieldKind::String => "string".to_string(),
            FieldKind::Number { min, max } => format!("number in [{}, {}]", min, max),
            FieldKind::Integer { min, max } => format!("integer in [{}, {}]", min, max),
            FieldKind::Bool => "boolean".to_string(),
            FieldKind::OneOf(options) => format!("one of [{}]", options.join(", ")),
            FieldKind::Array(inner) => format!("array of {}", inner.describe()),
            FieldKind::Map(inner) => format!("object of {}", inner.describe()),
            FieldKind::Object(schema) => format!("object '{}'", schema.name),
            FieldKind::Any => "any value".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
    pub allow_unknown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolations {
    pub schema: String,
    pub violations: Vec<Violation>,
}

impl fmt::Display for SchemaViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema '{}': ", self.schema)?;
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.path, v.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for SchemaViolations {}

impl From<SchemaViolations> for AuditError {
    fn from(v: SchemaViolations) -> Self {
        AuditError::SchemaInvalid(v.to_string())
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn short(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 40 {
        format!("{}...", text.chars().take(37).collect::<String>())
    } else {
        text
    }
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            allow_unknown: true,
        }
    }

    pub fn required(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            kind,
            required: false,
        });
        self
    }

    /// Reject keys that are not declared
    pub fn strict(mut self) -> Self {
        self.allow_unknown = false;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolations> {
        let mut violations = Vec::new();
        self.check_object(value, "$", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolations {
                schema: self.name.clone(),
                violations,
            })
        }
    }

    fn check_object(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        let Some(object) = value.as_object() else {
            out.push(Violation {
                path: path.to_string(),
                message: format!("expected object '{}', got {}", self.name, kind_name(value)),
            });
            return;
        };

        for field in &self.fields {
            let field_path = format!("{}.{}", path, field.name);
            match object.get(&field.name) {
                None | Some(Value::Null) if field.required => out.push(Violation {
                    path: field_path,
                    message: format!("missing required {}", field.kind.describe()),
                }),
                None | Some(Value::Null) => {}
                Some(v) => check_kind(&field.kind, v, &field_path, out),
            }
        }

        if !self.allow_unknown {
            for key in object.keys() {
                if !self.fields.iter().any(|f| &f.name == key) {
                    out.push(Violation {
                        path: format!("{}.{}", path, key),
                        message: "unknown field".to_string(),
                    });
                }
            }
        }
    }

    /// Response a judge's reasoning service must return
    pub fn opinion_response() -> Self {
        let claim = Schema::new("claim")
            .required("evidence_id", FieldKind::String)
            .required("capability", FieldKind::String)
            .required("present", FieldKind::Bool);
        let flags = Flag::names().into_iter().map(String::from).collect();

        Schema::new("opinion_response")
            .required(
                "score",
                FieldKind::Number {
                    min: crate::opinion::SCORE_MIN,
                    max: crate::opinion::SCORE_MAX,
                },
            )
            .required("argument", FieldKind::String)
            .optional("flags", FieldKind::Array(Box::new(FieldKind::OneOf(flags))))
            .optional("citations", FieldKind::Array(Box::new(FieldKind::String)))
            .optional("claims", FieldKind::Array(Box::new(FieldKind::Object(claim))))
    }

    /// Payload shape for a committed (non-gap) evidence record
    pub fn evidence_payload(category: EvidenceCategory) -> Self {
        let capabilities = FieldKind::Map(Box::new(FieldKind::Bool));
        let count = FieldKind::Integer { min: 0, max: i64::MAX };
        match category {
            EvidenceCategory::Structural => Schema::new("structural_payload")
                .required("capabilities", capabilities)
                .required("files_scanned", count)
                .optional("findings", FieldKind::Array(Box::new(FieldKind::String))),
            EvidenceCategory::Historical => Schema::new("historical_payload")
                .required("capabilities", capabilities)
                .required("commit_count", count)
                .optional("commits", FieldKind::Array(Box::new(FieldKind::Any))),
            EvidenceCategory::Textual => Schema::new("textual_payload")
                .required("capabilities", capabilities)
                .required("terms", FieldKind::Map(Box::new(FieldKind::Any)))
                .optional("chunks", count),
            EvidenceCategory::General => Schema::new("general_payload"),
        }
    }
}

fn check_kind(kind: &FieldKind, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let mismatch = |out: &mut Vec<Violation>| {
        out.push(Violation {
            path: path.to_string(),
            message: format!("expected {}, got {}", kind.describe(), short(value)),
        })
    };

    match kind {
        FieldKind::Any => {}
        FieldKind::String => {
            if !value.is_string() {
                mismatch(out);
            }
        }
        FieldKind::Bool => {
            if !value.is_boolean() {
                mismatch(out);
            }
        }
        FieldKind::Number { min, max } => match value.as_f64() {
            Some(n) if n.is_finite() && n >= *min && n <= *max => {}
            _ => mismatch(out),
        },
        FieldKind::Integer { min, max } => match value.as_i64() {
            Some(n) if n >= *min && n <= *max => {}
            _ => mismatch(out),
        },
        FieldKind::OneOf(options) => match value.as_str() {
            Some(s) if options.iter().any(|o| o == s) => {}
            _ => mismatch(out),
        },
        FieldKind::Array(inner) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_kind(inner, item, &format!("{}[{}]", path, i), out);
                }
            }
            None => mismatch(out),
        },
        FieldKind::Map(inner) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    check_kind(inner, item, &format!("{}.{}", path, key), out);
                }
            }
            None => mismatch(out),
        },
        FieldKind::Object(schema) => schema.check_object(value, path, out),
    }
}
