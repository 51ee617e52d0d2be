/// Structural Input Schemas
///
/// Each tool declares the shape of its arguments with an `InputSchema`: a
/// list of named fields, each with a type and optional constraints. The
/// schema is checked before any adapter code runs, and rendered as JSON
/// Schema for discovery responses.
///
/// Values are never coerced across types: `"2"` is not a number.

use serde_json::{Map, Value, json};

use crate::core::error::{FieldViolation, ValidationError};

/// JSON type a field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub allowed: Option<Vec<String>>,
}

impl FieldSpec {
    fn new(name: &str, field_type: FieldType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            description: description.to_string(),
            required: true,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            allowed: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::String, description)
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Number, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Integer, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Boolean, description)
    }

    pub fn object(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Object, description)
    }

    pub fn array(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Array, description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.min_length = Some(1);
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn check(&self, value: &Value, violations: &mut Vec<FieldViolation>) {
        if !self.field_type.matches(value) {
            violations.push(FieldViolation::new(
                &self.name,
                format!(
                    "expected {}, got {}",
                    self.field_type.as_str(),
                    json_type_name(value)
                ),
            ));
            return;
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum.filter(|min| n < *min) {
                violations.push(FieldViolation::new(
                    &self.name,
                    format!("must be >= {min}, got {n}"),
                ));
            }
            if let Some(max) = self.maximum.filter(|max| n > *max) {
                violations.push(FieldViolation::new(
                    &self.name,
                    format!("must be <= {max}, got {n}"),
                ));
            }
        }

        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = self.min_length.filter(|min| len < *min) {
                violations.push(FieldViolation::new(
                    &self.name,
                    format!("must be at least {min} characters"),
                ));
            }
            if let Some(max) = self.max_length.filter(|max| len > *max) {
                violations.push(FieldViolation::new(
                    &self.name,
                    format!("must be at most {max} characters"),
                ));
            }
            if let Some(allowed) = &self.allowed {
                if !allowed.iter().any(|a| a == s) {
                    violations.push(FieldViolation::new(
                        &self.name,
                        format!("must be one of [{}]", allowed.join(", ")),
                    ));
                }
            }
        }
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), json!(self.field_type.as_str()));
        if !self.description.is_empty() {
            prop.insert("description".into(), json!(self.description));
        }
        if let Some(min) = self.minimum {
            prop.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".into(), json!(max));
        }
        if let Some(min) = self.min_length {
            prop.insert("minLength".into(), json!(min));
        }
        if let Some(max) = self.max_length {
            prop.insert("maxLength".into(), json!(max));
        }
        if let Some(allowed) = &self.allowed {
            prop.insert("enum".into(), json!(allowed));
        }
        Value::Object(prop)
    }
}

/// Ordered set of fields making up a tool's argument object.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Check `arguments` against every field, collecting all violations.
    ///
    /// A missing `arguments` value (JSON null) is treated as an empty object.
    /// Extra keys the schema does not mention are ignored.
    pub fn validate(&self, arguments: &Value) -> Result<(), ValidationError> {
        let empty = Map::new();
        let object = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ValidationError::single(
                    "",
                    format!("arguments must be an object, got {}", json_type_name(other)),
                ));
            }
        };

        let mut violations = Vec::new();
        for spec in &self.fields {
            match object.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    violations.push(FieldViolation::new(&spec.name, "is required"));
                }
                None | Some(Value::Null) => {}
                Some(value) => spec.check(value, &mut violations),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// JSON Schema rendering used in `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
