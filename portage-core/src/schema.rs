//! The schema capability.
//!
//! Portage treats schemas as opaque validators/marshallers. [`ValueType`]
//! and [`ObjectSchema`] are the built-in implementations; anything else can
//! plug in through [`Schema`].

use crate::error::ValidationError;
use serde_json::{Map, Number, Value, json};
use std::sync::Arc;

/// Validates and marshals values.
pub trait Schema: Send + Sync + 'static {
    /// Check `value` without changing it.
    fn validate(&self, value: &Value) -> Result<(), ValidationError>;

    /// Turn wire data into a validated value, coercing where sensible.
    fn load(&self, wire: Value) -> Result<Value, ValidationError> {
        self.validate(&wire)?;
        Ok(wire)
    }

    /// Turn a value into wire data.
    fn dump(&self, value: Value) -> Result<Value, ValidationError> {
        Ok(value)
    }

    /// A JSON-schema-like description for documentation.
    fn describe(&self) -> Value;
}

/// Shared schema handle.
pub type SharedSchema = Arc<dyn Schema>;

/// The shape of a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Anything.
    Any,
    /// JSON `null`.
    Null,
    /// Text.
    String,
    /// Whole number.
    Integer,
    /// Any number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// Homogeneous list.
    Array(Box<ValueType>),
    /// Structured object.
    Object(ObjectSchema),
    /// The inner type, or `null`.
    Optional(Box<ValueType>),
}

impl ValueType {
    /// List of `item`.
    pub fn array(item: ValueType) -> Self {
        ValueType::Array(Box::new(item))
    }

    /// `inner` or `null`.
    pub fn optional(inner: ValueType) -> Self {
        ValueType::Optional(Box::new(inner))
    }

    fn name(&self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::Null => "null",
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Array(_) => "array",
            ValueType::Object(_) => "object",
            ValueType::Optional(inner) => inner.name(),
        }
    }

    fn mismatch(&self) -> ValidationError {
        ValidationError::new("", format!("expected {}", self.name()))
    }

    fn coerce(&self, wire: Value) -> Result<Value, ValidationError> {
        let Value::String(text) = wire else {
            return Ok(wire);
        };
        let coerced = match self {
            ValueType::Integer => text.trim().parse::<i64>().ok().map(Value::from),
            ValueType::Number => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            ValueType::Boolean => match text.trim() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            ValueType::Null if text.is_empty() => Some(Value::Null),
            ValueType::Array(_) => Some(Value::Array(
                text.split(',').map(|s| Value::String(s.to_string())).collect(),
            )),
            _ => return Ok(Value::String(text)),
        };
        coerced.ok_or_else(|| self.mismatch())
    }
}

impl Schema for ValueType {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let ok = match (self, value) {
            (ValueType::Any, _)
            | (ValueType::Null, Value::Null)
            | (ValueType::String, Value::String(_))
            | (ValueType::Boolean, Value::Bool(_))
            | (ValueType::Number, Value::Number(_)) => true,
            (ValueType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ValueType::Optional(_), Value::Null) => true,
            (ValueType::Optional(inner), other) => return inner.validate(other),
            (ValueType::Object(schema), other) => return schema.validate(other),
            (ValueType::Array(item), Value::Array(items)) => {
                let mut errors = ValidationError::default();
                for (i, v) in items.iter().enumerate() {
                    if let Err(e) = item.validate(v) {
                        errors.extend_nested(&i.to_string(), e);
                    }
                }
                return errors.into_result();
            }
            _ => false,
        };
        if ok { Ok(()) } else { Err(self.mismatch()) }
    }

    fn load(&self, wire: Value) -> Result<Value, ValidationError> {
        match self {
            ValueType::Optional(_) if wire.is_null() => Ok(Value::Null),
            ValueType::Optional(inner) => inner.load(wire),
            ValueType::Object(schema) => schema.load(wire),
            ValueType::Array(item) => {
                let Value::Array(items) = self.coerce(wire)? else {
                    return Err(self.mismatch());
                };
                let mut errors = ValidationError::default();
                let mut out = Vec::with_capacity(items.len());
                for (i, v) in items.into_iter().enumerate() {
                    match item.load(v) {
                        Ok(v) => out.push(v),
                        Err(e) => errors.extend_nested(&i.to_string(), e),
                    }
                }
                errors.into_result().map(|()| Value::Array(out))
            }
            _ => {
                let value = self.coerce(wire)?;
                self.validate(&value)?;
                Ok(value)
            }
        }
    }

    fn describe(&self) -> Value {
        match self {
            ValueType::Any => json!({}),
            ValueType::Array(item) => json!({ "type": "array", "items": item.describe() }),
            ValueType::Object(schema) => schema.describe(),
            ValueType::Optional(inner) => {
                let mut doc = inner.describe();
                if let Value::Object(map) = &mut doc {
                    map.insert("nullable".into(), Value::Bool(true));
                }
                doc
            }
            other => json!({ "type": other.name() }),
        }
    }
}

/// One named field of an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: ValueType,
    /// Whether the field must be present (ignored when a default exists).
    pub required: bool,
    /// Value used when the field is absent.
    pub default: Option<Value>,
}

/// A JSON object with named, typed fields. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    fields: Vec<Field>,
}

impl ObjectSchema {
    /// An object with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.fields.push(Field {
            name: name.into(),
            ty,
            required: true,
            default: None,
        });
        self
    }

    /// Add a fully specified field.
    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// The declared fields.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn as_object(value: &Value) -> Result<&Map<String, Value>, ValidationError> {
        value
            .as_object()
            .ok_or_else(|| ValidationError::new("", "expected object"))
    }

    fn unknown_fields(&self, map: &Map<String, Value>, errors: &mut ValidationError) {
        for key in map.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                errors.push(key.clone(), "unknown field");
            }
        }
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let map = Self::as_object(value)?;
        let mut errors = ValidationError::default();
        for field in &self.fields {
            match map.get(&field.name) {
                Some(v) => {
                    if let Err(e) = field.ty.validate(v) {
                        errors.extend_nested(&field.name, e);
                    }
                }
                None if field.required && field.default.is_none() => {
                    errors.push(field.name.clone(), "missing required field");
                }
                None => {}
            }
        }
        self.unknown_fields(map, &mut errors);
        errors.into_result()
    }

    fn load(&self, wire: Value) -> Result<Value, ValidationError> {
        let Value::Object(mut map) = wire else {
            return Err(ValidationError::new("", "expected object"));
        };
        let mut errors = ValidationError::default();
        let mut out = Map::new();
        for field in &self.fields {
            match map.remove(&field.name) {
                Some(v) => match field.ty.load(v) {
                    Ok(v) => {
                        out.insert(field.name.clone(), v);
                    }
                    Err(e) => errors.extend_nested(&field.name, e),
                },
                None => match &field.default {
                    Some(default) => {
                        out.insert(field.name.clone(), default.clone());
                    }
                    None if field.required => {
                        errors.push(field.name.clone(), "missing required field");
                    }
                    None => {}
                },
            }
        }
        self.unknown_fields(&map, &mut errors);
        errors.into_result().map(|()| Value::Object(out))
    }

    fn describe(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let mut doc = f.ty.describe();
                if let (Some(default), Value::Object(map)) = (&f.default, &mut doc) {
                    map.insert("default".into(), default.clone());
                }
                (f.name.clone(), doc)
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required && f.default.is_none())
            .map(|f| f.name.as_str())
            .collect();
        json!({ "type": "object", "properties": properties, "required": required })
    }
}
