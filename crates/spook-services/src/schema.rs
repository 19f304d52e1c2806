//! Service input schemas
//!
//! A schema is a list of named fields. Validation rejects unknown keys,
//! missing required keys and values of the wrong kind, and normalizes the
//! input (a single string given for a `StringList` becomes a one-element
//! list).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use spook_core::{Error, Result};

/// Accepted value kind for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    /// Absolute http(s) URL
    Url,
    Boolean,
    Integer,
    StringList,
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            FieldKind::String => "str",
            FieldKind::Url => "url",
            FieldKind::Boolean => "bool",
            FieldKind::Integer => "int",
            FieldKind::StringList => "list of str",
        }
    }

    fn json_type(self) -> Value {
        match self {
            FieldKind::String => serde_json::json!({"type": "string"}),
            FieldKind::Url => serde_json::json!({"type": "string", "format": "uri"}),
            FieldKind::Boolean => serde_json::json!({"type": "boolean"}),
            FieldKind::Integer => serde_json::json!({"type": "integer"}),
            FieldKind::StringList => {
                serde_json::json!({"type": "array", "items": {"type": "string"}})
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// Declared input of a service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSchema {
    fields: Vec<Field>,
}

impl ServiceSchema {
    /// Schema accepting no fields
    pub fn empty() -> Self {
        Self::default()
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

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Validate and normalize call data; `null` counts as an empty object
    pub fn validate(&self, data: &Value) -> Result<Map<String, Value>> {
        let input = match data {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(Error::invalid_argument(format!(
                    "expected a dictionary, got {}",
                    other
                )))
            }
        };

        if let Some(extra) = input
            .keys()
            .find(|key| !self.fields.iter().any(|f| f.name == **key))
        {
            return Err(Error::invalid_argument(format!(
                "extra keys not allowed @ data['{}']",
                extra
            )));
        }

        let mut output = Map::new();
        for field in &self.fields {
            match input.get(&field.name) {
                Some(value) => {
                    output.insert(field.name.clone(), coerce(field, value)?);
                }
                None if field.required => {
                    return Err(Error::invalid_argument(format!(
                        "required key not provided @ data['{}']",
                        field.name
                    )));
                }
                None => {}
            }
        }
        Ok(output)
    }

    /// JSON Schema rendering, for listing services
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.kind.json_type()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn coerce(field: &Field, value: &Value) -> Result<Value> {
    let mismatch = || {
        Error::invalid_argument(format!(
            "expected {} for dictionary value @ data['{}']",
            field.kind.describe(),
            field.name
        ))
    };

    match field.kind {
        FieldKind::String => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        FieldKind::Url => {
            let raw = value.as_str().ok_or_else(mismatch)?;
            let url = Url::parse(raw).map_err(|_| mismatch())?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(mismatch());
            }
            Ok(Value::String(url.to_string()))
        }
        FieldKind::Boolean => value.as_bool().map(Value::Bool).ok_or_else(mismatch),
        FieldKind::Integer => value.as_i64().map(Value::from).ok_or_else(mismatch),
        FieldKind::StringList => match value {
            Value::String(s) => Ok(Value::Array(vec![Value::String(s.clone())])),
            Value::Array(items) if items.iter().all(Value::is_string) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
    }
}
