//! # Structural Value Types
//!
//! Designators resolve to `serde_json::Value`s, but every designator also
//! declares a [`ValueType`] describing the shape of what it produces. The
//! declared type serves two purposes:
//!
//! - **Construction-time checks.** Projecting a field out of an integer,
//!   iterating over a string, or feeding a list into a transform that
//!   expects a boolean are rejected when the composition is built.
//! - **Run-time guarantees.** Values that enter the system from outside
//!   (variable writes, collaborator candidates, transform results) are
//!   checked with [`ValueType::accepts`] so a designator never yields a
//!   value of an incompatible type.
//!
//! ## Open vs closed objects
//!
//! [`ValueType::Record`] lists its fields; projecting an undeclared field is
//! a construction defect. [`ValueType::Map`] is an open string-keyed object;
//! projecting any key is allowed and a missing key is a run-time
//! `FieldNotFound`. Types inferred from constant objects are maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declared shape of a designator's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueType {
    /// Anything; checks against it always pass and are deferred to run time.
    Any,
    /// JSON `null` only.
    Null,
    /// `true` or `false`.
    Bool,
    /// A whole number.
    Integer,
    /// Any number, integer or floating point.
    Number,
    /// A UTF-8 string.
    String,
    /// A homogeneous list.
    List {
        /// Type of every element.
        item: Box<ValueType>,
    },
    /// An open string-keyed object with homogeneous values.
    Map {
        /// Type of every value.
        value: Box<ValueType>,
    },
    /// A closed object with declared fields. Extra fields are tolerated at
    /// run time but cannot be projected.
    Record {
        /// Declared fields and their types.
        fields: BTreeMap<String, ValueType>,
    },
    /// Either `null` or the inner type.
    Optional {
        /// The non-null type.
        inner: Box<ValueType>,
    },
}

/// How a projection picks a part out of a resolved value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// A named field of an object.
    Field(String),
    /// A zero-based position in a list.
    Index(usize),
}

impl Selector {
    /// Shorthand for [`Selector::Field`].
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Apply the selector to a value. `None` when the field or index does
    /// not exist or the value has the wrong shape.
    pub fn apply<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        match self {
            Self::Field(name) => value.as_object()?.get(name),
            Self::Index(idx) => value.as_array()?.get(*idx),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

impl ValueType {
    /// `list<item>`.
    pub fn list(item: ValueType) -> Self {
        Self::List {
            item: Box::new(item),
        }
    }

    /// `map<value>`.
    pub fn map(value: ValueType) -> Self {
        Self::Map {
            value: Box::new(value),
        }
    }

    /// `optional<inner>`.
    pub fn optional(inner: ValueType) -> Self {
        Self::Optional {
            inner: Box::new(inner),
        }
    }

    /// A record from `(field, type)` pairs.
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, ValueType)>,
        K: Into<String>,
    {
        Self::Record {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Infer the narrowest type describing `value`.
    ///
    /// Objects infer to [`ValueType::Map`]; list and map element types are
    /// unified across all elements (see [`ValueType::unify`]). Empty
    /// collections infer `any` elements.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(items) => Self::list(Self::unify_all(items.iter())),
            Value::Object(map) => Self::map(Self::unify_all(map.values())),
        }
    }

    fn unify_all<'v>(mut values: impl Iterator<Item = &'v Value>) -> Self {
        let Some(first) = values.next() else {
            return Self::Any;
        };
        values.fold(Self::infer(first), |acc, v| acc.unify(&Self::infer(v)))
    }

    /// The least general type covering both `self` and `other`.
    pub fn unify(&self, other: &ValueType) -> ValueType {
        use ValueType as T;
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (T::Any, _) | (_, T::Any) => T::Any,
            (T::Integer, T::Number) | (T::Number, T::Integer) => T::Number,
            (T::Null, T::Optional { inner }) | (T::Optional { inner }, T::Null) => {
                T::optional((**inner).clone())
            }
            (T::Null, t) | (t, T::Null) => T::optional(t.clone()),
            (T::Optional { inner: a }, T::Optional { inner: b }) => T::optional(a.unify(b)),
            (T::Optional { inner }, t) | (t, T::Optional { inner }) => {
                T::optional(inner.unify(t))
            }
            (T::List { item: a }, T::List { item: b }) => T::list(a.unify(b)),
            (T::Map { value: a }, T::Map { value: b }) => T::map(a.unify(b)),
            _ => T::Any,
        }
    }

    /// Run-time check: does `value` have this shape?
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::List { item } => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| item.accepts(v))),
            Self::Map { value: inner } => value
                .as_object()
                .is_some_and(|map| map.values().all(|v| inner.accepts(v))),
            Self::Record { fields } => value.as_object().is_some_and(|map| {
                fields
                    .iter()
                    .all(|(name, ty)| map.get(name).is_some_and(|v| ty.accepts(v)))
            }),
            Self::Optional { inner } => value.is_null() || inner.accepts(value),
        }
    }

    /// Construction-time check: may a value of type `self` be used where
    /// `target` is expected?
    ///
    /// `any` on either side is assignable; the run-time check then decides.
    pub fn is_assignable_to(&self, target: &ValueType) -> bool {
        use ValueType as T;
        match (self, target) {
            (_, T::Any) | (T::Any, _) => true,
            (a, b) if a == b => true,
            (T::Integer, T::Number) => true,
            (T::Null, T::Optional { .. }) => true,
            (T::Optional { inner: a }, T::Optional { inner: b }) => a.is_assignable_to(b),
            (t, T::Optional { inner }) => t.is_assignable_to(inner),
            (T::List { item: a }, T::List { item: b }) => a.is_assignable_to(b),
            (T::Map { value: a }, T::Map { value: b }) => a.is_assignable_to(b),
            (T::Record { fields }, T::Map { value }) => {
                fields.values().all(|f| f.is_assignable_to(value))
            }
            (T::Record { fields: have }, T::Record { fields: want }) => {
                want.iter().all(|(name, ty)| {
                    have.get(name).is_some_and(|h| h.is_assignable_to(ty))
                })
            }
            _ => false,
        }
    }

    /// The static type of `selector` applied to a value of this type.
    ///
    /// `None` means the projection can never succeed (e.g. a field of an
    /// integer, an undeclared field of a record, an index into a map) and
    /// must be rejected at construction.
    pub fn project(&self, selector: &Selector) -> Option<ValueType> {
        match (self, selector) {
            (Self::Any, _) => Some(Self::Any),
            (Self::Map { value }, Selector::Field(_)) => Some((**value).clone()),
            (Self::Record { fields }, Selector::Field(name)) => fields.get(name).cloned(),
            (Self::List { item }, Selector::Index(_)) => Some((**item).clone()),
            (Self::Optional { inner }, sel) => inner.project(sel),
            _ => None,
        }
    }

    /// The element type when this type is iterable as a sequence.
    pub fn item_type(&self) -> Option<ValueType> {
        match self {
            Self::Any => Some(Self::Any),
            Self::List { item } => Some((**item).clone()),
            _ => None,
        }
    }

    /// Whether values of this type may be compared numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Any | Self::Integer | Self::Number)
            || matches!(self, Self::Optional { inner } if inner.is_numeric())
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Null => f.write_str("null"),
            Self::Bool => f.write_str("bool"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::List { item } => write!(f, "list<{item}>"),
            Self::Map { value } => write!(f, "map<{value}>"),
            Self::Optional { inner } => write!(f, "optional<{inner}>"),
            Self::Record { fields } => {
                f.write_str("record{")?;
                for (idx, (name, ty)) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                f.write_str("}")
            }
        }
    }
}
