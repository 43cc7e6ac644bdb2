//! # Registered Transforms
//!
//! A transformation designator applies a named, registered function to its
//! upstream value. Functions are registered rather than passed as ad hoc
//! closures at the call site so that behavior files can refer to them by
//! name and so each one carries declared input and output types that the
//! composition can be checked against.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use skillflow_core::{ConstructionDefect, ValueType};

type TransformFn = dyn Fn(&Value) -> Result<Value, String> + Send + Sync;

/// How a transform's output type is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutput {
    /// Always this type.
    Fixed(ValueType),
    /// The element type of the (list) input.
    ItemOfInput,
    /// The same type as the input.
    SameAsInput,
}

/// A named pure function with declared input and output types.
#[derive(Clone)]
pub struct Transform {
    name: String,
    input: ValueType,
    output: TransformOutput,
    func: Arc<TransformFn>,
}

impl Transform {
    /// A transform with a fixed output type.
    pub fn new<F>(name: impl Into<String>, input: ValueType, output: ValueType, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::with_output(name, input, TransformOutput::Fixed(output), func)
    }

    /// A transform whose output type depends on the input type.
    pub fn with_output<F>(
        name: impl Into<String>,
        input: ValueType,
        output: TransformOutput,
        func: F,
    ) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input,
            output,
            func: Arc::new(func),
        }
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared input type.
    pub fn input_type(&self) -> &ValueType {
        &self.input
    }

    /// Output type when applied to a value of type `input`.
    pub fn output_type_for(&self, input: &ValueType) -> ValueType {
        match &self.output {
            TransformOutput::Fixed(ty) => ty.clone(),
            TransformOutput::ItemOfInput => input.item_type().unwrap_or(ValueType::Any),
            TransformOutput::SameAsInput => input.clone(),
        }
    }

    /// Run the function.
    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        if !self.input.accepts(value) {
            return Err(format!("input {value} is not a {}", self.input));
        }
        (self.func)(value)
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("input", &self.input.to_string())
            .field("output", &self.output)
            .finish()
    }
}

// ── Registry ─────────────────────────────────────────────────────────

/// Transforms by name.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, Transform>,
}

impl TransformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the built-in transforms:
    ///
    /// | Name | Input | Output |
    /// |---|---|---|
    /// | `len` | list | integer |
    /// | `is_empty` | list | bool |
    /// | `not` | bool | bool |
    /// | `to_string` | any | string |
    /// | `first`, `last` | list | element type |
    /// | `lowercase`, `uppercase` | string | string |
    /// | `reversed` | list | same list type |
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for transform in builtins() {
            registry
                .transforms
                .insert(transform.name().to_string(), transform);
        }
        registry
    }

    /// Add a transform. Names are unique.
    pub fn register(&mut self, transform: Transform) -> Result<(), ConstructionDefect> {
        if self.transforms.contains_key(transform.name()) {
            return Err(ConstructionDefect::DuplicateTransform {
                name: transform.name().to_string(),
            });
        }
        self.transforms
            .insert(transform.name().to_string(), transform);
        Ok(())
    }

    /// Look up a transform by name.
    pub fn get(&self, name: &str) -> Result<&Transform, ConstructionDefect> {
        self.transforms
            .get(name)
            .ok_or_else(|| ConstructionDefect::UnknownTransform {
                name: name.to_string(),
            })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }
}

fn as_list(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected a list, got {value}"))
}

fn as_text(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {value}"))
}

fn builtins() -> Vec<Transform> {
    let any_list = ValueType::list(ValueType::Any);
    vec![
        Transform::new("len", any_list.clone(), ValueType::Integer, |v| {
            Ok(Value::from(as_list(v)?.len()))
        }),
        Transform::new("is_empty", any_list.clone(), ValueType::Bool, |v| {
            Ok(Value::Bool(as_list(v)?.is_empty()))
        }),
        Transform::new("not", ValueType::Bool, ValueType::Bool, |v| {
            v.as_bool()
                .map(|b| Value::Bool(!b))
                .ok_or_else(|| format!("expected a bool, got {v}"))
        }),
        Transform::new("to_string", ValueType::Any, ValueType::String, |v| {
            Ok(match v {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            })
        }),
        Transform::with_output(
            "first",
            any_list.clone(),
            TransformOutput::ItemOfInput,
            |v| {
                as_list(v)?
                    .first()
                    .cloned()
                    .ok_or_else(|| "list is empty".to_string())
            },
        ),
        Transform::with_output(
            "last",
            any_list.clone(),
            TransformOutput::ItemOfInput,
            |v| {
                as_list(v)?
                    .last()
                    .cloned()
                    .ok_or_else(|| "list is empty".to_string())
            },
        ),
        Transform::new("lowercase", ValueType::String, ValueType::String, |v| {
            Ok(Value::String(as_text(v)?.to_lowercase()))
        }),
        Transform::new("uppercase", ValueType::String, ValueType::String, |v| {
            Ok(Value::String(as_text(v)?.to_uppercase()))
        }),
        Transform::with_output("reversed", any_list, TransformOutput::SameAsInput, |v| {
            Ok(Value::Array(as_list(v)?.iter().rev().cloned().collect()))
        }),
    ]
}
