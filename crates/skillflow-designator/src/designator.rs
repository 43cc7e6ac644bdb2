//! # Designator Handle and Resolution
//!
//! A [`Designator`] is a shared, cheaply clonable handle to a deferred value.
//! It is created once while a behavior is being assembled, handed to every
//! state that needs the value, and resolved as late as possible, when the
//! state executes.
//!
//! ## Variants
//!
//! The set of resolution strategies is closed (see [`Variant`]):
//!
//! | Variant | Resolves to | Fails with |
//! |---|---|---|
//! | Constant | the value fixed at construction | never |
//! | Variable | the last value written through its write handle | `Unset` |
//! | Projection | a field or index of the upstream value | `UpstreamFailure`, `FieldNotFound` |
//! | Transformation | a registered function of the upstream value | `UpstreamFailure`, `TransformError` |
//! | Query | one candidate chosen by an explicit policy | `NoMatch`, `Ambiguous`, `Collaborator`, `UpstreamFailure` |
//! | Iteration | the element a sequence cursor last advanced to | `Unset` |
//!
//! ## Composition forms a DAG
//!
//! A composite designator can only wrap designators that already exist, and
//! nodes are immutable once built, so a designator can never depend on its
//! own output.
//!
//! ## No caching across calls
//!
//! Every call to [`Designator::resolve`] starts a fresh resolution pass. Within
//! one pass each distinct node is resolved at most once, even when it is
//! reachable along several paths (e.g. two query parameters projected from
//! the same upstream).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use skillflow_core::{ConstructionDefect, Selector, ValueType};

use crate::cursor::CursorState;
use crate::failure::ResolutionFailure;
use crate::query::QueryPlan;
use crate::transform::Transform;
use crate::variable::Slot;

// ── Identity ─────────────────────────────────────────────────────────

/// Unique identity of a designator node, used to deduplicate resolution
/// within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DesignatorId(Uuid);

impl DesignatorId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DesignatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether holders of a designator may change the value it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Only resolvable.
    ReadOnly,
    /// Backed by a slot that a write handle can set.
    ReadWrite,
}

/// The closed set of resolution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Fixed value.
    Constant,
    /// Externally settable slot.
    Variable,
    /// Field or index of another designator's value.
    Projection,
    /// Registered function of another designator's value.
    Transformation,
    /// Candidate selected from an external collaborator.
    Query,
    /// Current element of a sequence cursor.
    Iteration,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::Projection => "projection",
            Self::Transformation => "transformation",
            Self::Query => "query",
            Self::Iteration => "iteration",
        };
        f.write_str(s)
    }
}

// ── Nodes ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub(crate) enum Kind {
    Constant(Value),
    Variable(Arc<Slot>),
    Projection {
        upstream: Designator,
        selector: Selector,
    },
    Transformation {
        upstream: Designator,
        transform: Transform,
    },
    Query(Arc<QueryPlan>),
    Iteration(Arc<Mutex<CursorState>>),
}

#[derive(Clone)]
struct Node {
    id: DesignatorId,
    name: String,
    ty: ValueType,
    kind: Kind,
}

/// A shared handle to a deferred source of a typed value.
///
/// Cloning the handle does not copy the designator: all clones resolve the
/// same node.
#[derive(Clone)]
pub struct Designator {
    node: Arc<Node>,
}

/// Memo of every node resolved during one top-level `resolve()` call.
#[derive(Default)]
pub(crate) struct ResolutionPass {
    memo: HashMap<DesignatorId, Result<Value, ResolutionFailure>>,
}

impl Designator {
    pub(crate) fn from_parts(name: impl Into<String>, ty: ValueType, kind: Kind) -> Self {
        Self {
            node: Arc::new(Node {
                id: DesignatorId::new(),
                name: name.into(),
                ty,
                kind,
            }),
        }
    }

    // ── Constructors ─────────────────────────────────────────────────

    /// A designator that always resolves to `value`. Its type is inferred
    /// from the value (objects infer to open maps).
    pub fn constant(value: Value) -> Self {
        let ty = ValueType::infer(&value);
        Self::from_parts("constant", ty, Kind::Constant(value))
    }

    /// A constant with an explicitly declared type.
    ///
    /// Fails if `value` does not have that type.
    pub fn constant_typed(value: Value, ty: ValueType) -> Result<Self, ConstructionDefect> {
        if !ty.accepts(&value) {
            return Err(ConstructionDefect::TypeMismatch {
                designator: "constant".to_string(),
                expected: ty.to_string(),
                found: value.to_string(),
            });
        }
        Ok(Self::from_parts("constant", ty, Kind::Constant(value)))
    }

    /// Project `selector` out of this designator's value.
    ///
    /// Rejected at construction when the selector can never apply to this
    /// designator's declared type, e.g. a field of a string or an
    /// undeclared field of a record.
    pub fn project(&self, selector: Selector) -> Result<Self, ConstructionDefect> {
        let name = format!("{}{}", self.name(), selector);
        let ty = self.value_type().project(&selector).ok_or_else(|| {
            ConstructionDefect::IncompatibleComposition {
                designator: name.clone(),
                detail: format!(
                    "cannot select {selector} from {} of type {}",
                    self.name(),
                    self.value_type()
                ),
            }
        })?;
        Ok(Self::from_parts(
            name,
            ty,
            Kind::Projection {
                upstream: self.clone(),
                selector,
            },
        ))
    }

    /// Shorthand for projecting a named field.
    pub fn field(&self, name: impl Into<String>) -> Result<Self, ConstructionDefect> {
        self.project(Selector::Field(name.into()))
    }

    /// Shorthand for projecting a list position.
    pub fn index(&self, idx: usize) -> Result<Self, ConstructionDefect> {
        self.project(Selector::Index(idx))
    }

    /// Apply a registered transform to this designator's value.
    ///
    /// Rejected at construction when this designator's type is not
    /// assignable to the transform's input type.
    pub fn transform(&self, transform: &Transform) -> Result<Self, ConstructionDefect> {
        let name = format!("{}({})", transform.name(), self.name());
        if !self.value_type().is_assignable_to(transform.input_type()) {
            return Err(ConstructionDefect::IncompatibleComposition {
                designator: name,
                detail: format!(
                    "transform {} expects {} but {} is {}",
                    transform.name(),
                    transform.input_type(),
                    self.name(),
                    self.value_type()
                ),
            });
        }
        let ty = transform.output_type_for(self.value_type());
        Ok(Self::from_parts(
            name,
            ty,
            Kind::Transformation {
                upstream: self.clone(),
                transform: transform.clone(),
            },
        ))
    }

    /// Give this designator a human-readable name for diagnostics.
    ///
    /// Other handles to the same node keep the previous name; call this
    /// right after construction.
    pub fn named(self, name: impl Into<String>) -> Self {
        let mut node = match Arc::try_unwrap(self.node) {
            Ok(node) => node,
            Err(shared) => (*shared).clone(),
        };
        node.name = name.into();
        Self {
            node: Arc::new(node),
        }
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Node identity.
    pub fn id(&self) -> DesignatorId {
        self.node.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Declared result type.
    pub fn value_type(&self) -> &ValueType {
        &self.node.ty
    }

    /// Resolution strategy.
    pub fn variant(&self) -> Variant {
        match &self.node.kind {
            Kind::Constant(_) => Variant::Constant,
            Kind::Variable(_) => Variant::Variable,
            Kind::Projection { .. } => Variant::Projection,
            Kind::Transformation { .. } => Variant::Transformation,
            Kind::Query(_) => Variant::Query,
            Kind::Iteration(_) => Variant::Iteration,
        }
    }

    /// Whether the value can be changed through a write handle.
    pub fn mutability(&self) -> Mutability {
        match self.node.kind {
            Kind::Variable(_) => Mutability::ReadWrite,
            _ => Mutability::ReadOnly,
        }
    }

    /// The designators this one wraps directly.
    pub fn upstreams(&self) -> Vec<Designator> {
        match &self.node.kind {
            Kind::Projection { upstream, .. } | Kind::Transformation { upstream, .. } => {
                vec![upstream.clone()]
            }
            Kind::Query(plan) => plan.upstreams(),
            Kind::Constant(_) | Kind::Variable(_) | Kind::Iteration(_) => Vec::new(),
        }
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Designator) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Assert at construction time that this designator's declared type is
    /// usable where `expected` is required.
    pub fn expect_type(&self, expected: &ValueType) -> Result<(), ConstructionDefect> {
        if self.value_type().is_assignable_to(expected) {
            Ok(())
        } else {
            Err(ConstructionDefect::TypeMismatch {
                designator: self.name().to_string(),
                expected: expected.to_string(),
                found: self.value_type().to_string(),
            })
        }
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Resolve the current value.
    ///
    /// Never returns a value the declared type rejects.
    pub fn resolve(&self) -> Result<Value, ResolutionFailure> {
        let mut pass = ResolutionPass::default();
        self.resolve_in(&mut pass)
    }

    /// Resolve and deserialize into a Rust type.
    pub fn resolve_as<T: DeserializeOwned>(&self) -> Result<T, ResolutionFailure> {
        let value = self.resolve()?;
        serde_json::from_value(value.clone()).map_err(|e| ResolutionFailure::TypeMismatch {
            designator: self.name().to_string(),
            expected: format!("{} ({e})", std::any::type_name::<T>()),
            found: value.to_string(),
        })
    }

    pub(crate) fn resolve_in(&self, pass: &mut ResolutionPass) -> Result<Value, ResolutionFailure> {
        if let Some(hit) = pass.memo.get(&self.node.id) {
            return hit.clone();
        }
        tracing::trace!(designator = %self.name(), variant = %self.variant(), "resolving");
        let result = self.resolve_uncached(pass);
        pass.memo.insert(self.node.id, result.clone());
        result
    }

    fn resolve_uncached(&self, pass: &mut ResolutionPass) -> Result<Value, ResolutionFailure> {
        match &self.node.kind {
            Kind::Constant(value) => Ok(value.clone()),
            Kind::Variable(slot) => slot.get().ok_or_else(|| ResolutionFailure::Unset {
                designator: self.name().to_string(),
            }),
            Kind::Projection { upstream, selector } => {
                let value = self.resolve_upstream(upstream, pass)?;
                let part = selector.apply(&value).cloned().ok_or_else(|| {
                    ResolutionFailure::FieldNotFound {
                        designator: self.name().to_string(),
                        selector: selector.to_string(),
                    }
                })?;
                self.checked(part)
            }
            Kind::Transformation {
                upstream,
                transform,
            } => {
                let value = self.resolve_upstream(upstream, pass)?;
                let output =
                    transform
                        .apply(&value)
                        .map_err(|reason| ResolutionFailure::TransformError {
                            designator: self.name().to_string(),
                            transform: transform.name().to_string(),
                            reason,
                        })?;
                self.checked(output)
            }
            Kind::Query(plan) => plan.run(self.name(), self.value_type(), pass),
            Kind::Iteration(state) => {
                state
                    .lock()
                    .current()
                    .ok_or_else(|| ResolutionFailure::Unset {
                        designator: self.name().to_string(),
                    })
            }
        }
    }

    pub(crate) fn resolve_upstream(
        &self,
        upstream: &Designator,
        pass: &mut ResolutionPass,
    ) -> Result<Value, ResolutionFailure> {
        upstream
            .resolve_in(pass)
            .map_err(|e| ResolutionFailure::upstream(self.name(), upstream.name(), e))
    }

    fn checked(&self, value: Value) -> Result<Value, ResolutionFailure> {
        if self.value_type().accepts(&value) {
            Ok(value)
        } else {
            Err(ResolutionFailure::TypeMismatch {
                designator: self.name().to_string(),
                expected: self.value_type().to_string(),
                found: value.to_string(),
            })
        }
    }
}

impl std::fmt::Debug for Designator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Designator")
            .field("name", &self.node.name)
            .field("variant", &self.variant())
            .field("type", &self.node.ty.to_string())
            .finish()
    }
}

impl From<Value> for Designator {
    fn from(value: Value) -> Self {
        Self::constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;
    use crate::transform::TransformRegistry;
    use serde_json::json;

    #[test]
    fn constant_never_fails() {
        let d = Designator::constant(json!("Initial value"));
        assert_eq!(d.resolve().unwrap(), json!("Initial value"));
        assert_eq!(d.resolve().unwrap(), json!("Initial value"));
        assert_eq!(d.variant(), Variant::Constant);
        assert_eq!(d.mutability(), Mutability::ReadOnly);
    }

    #[test]
    fn constant_typed_rejects_wrong_value() {
        let err = Designator::constant_typed(json!("x"), ValueType::Integer).unwrap_err();
        assert!(matches!(err, ConstructionDefect::TypeMismatch { .. }));
        assert!(Designator::constant_typed(json!(3), ValueType::Number).is_ok());
    }

    #[test]
    fn projection_selects_field() {
        let d = Designator::constant(json!({"a": 1, "b": 2}));
        let b = d.field("b").unwrap();
        assert_eq!(b.resolve().unwrap(), json!(2));
        assert_eq!(b.value_type(), &ValueType::Integer);
    }

    #[test]
    fn projection_of_missing_field_fails_at_resolution() {
        let d = Designator::constant(json!({"a": 1, "b": 2}));
        let c = d.field("c").unwrap();
        let err = c.resolve().unwrap_err();
        assert_eq!(err.kind(), FailureKind::FieldNotFound);
    }

    #[test]
    fn projection_from_scalar_fails_at_construction() {
        let d = Designator::constant(json!(42));
        let err = d.field("a").unwrap_err();
        assert!(matches!(err, ConstructionDefect::IncompatibleComposition { .. }));
    }

    #[test]
    fn projection_of_undeclared_record_field_fails_at_construction() {
        let ty = ValueType::record([("id", ValueType::String)]);
        let d = Designator::constant_typed(json!({"id": "table"}), ty).unwrap();
        assert!(d.field("id").is_ok());
        assert!(d.field("pose").is_err());
    }

    #[test]
    fn projection_by_index() {
        let d = Designator::constant(json!(["x", "y"]));
        assert_eq!(d.index(1).unwrap().resolve().unwrap(), json!("y"));
        assert_eq!(
            d.index(2).unwrap().resolve().unwrap_err().kind(),
            FailureKind::FieldNotFound
        );
    }

    #[test]
    fn transformation_applies_function() {
        let registry = TransformRegistry::with_builtins();
        let d = Designator::constant(json!(["a", "b", "c"]));
        let len = d.transform(registry.get("len").unwrap()).unwrap();
        assert_eq!(len.resolve().unwrap(), json!(3));
        assert_eq!(len.value_type(), &ValueType::Integer);
    }

    #[test]
    fn transformation_rejects_incompatible_input_at_construction() {
        let registry = TransformRegistry::with_builtins();
        let d = Designator::constant(json!("hello"));
        let err = d.transform(registry.get("not").unwrap()).unwrap_err();
        assert!(matches!(err, ConstructionDefect::IncompatibleComposition { .. }));
    }

    #[test]
    fn transformation_error_is_reported() {
        let registry = TransformRegistry::with_builtins();
        let d = Designator::constant(json!([]));
        let first = d.transform(registry.get("first").unwrap()).unwrap();
        assert_eq!(
            first.resolve().unwrap_err().kind(),
            FailureKind::TransformError
        );
    }

    #[test]
    fn upstream_failure_wraps_cause() {
        let d = Designator::constant(json!({"a": {"b": 1}}));
        let missing = d.field("z").unwrap();
        let deeper = missing.field("b").unwrap();
        let err = deeper.resolve().unwrap_err();
        assert_eq!(err.kind(), FailureKind::UpstreamFailure);
        assert_eq!(err.root_cause().kind(), FailureKind::FieldNotFound);
    }

    #[test]
    fn named_changes_only_name() {
        let d = Designator::constant(json!(1)).named("one");
        assert_eq!(d.name(), "one");
        assert_eq!(d.resolve().unwrap(), json!(1));
    }

    #[test]
    fn derived_names_describe_composition() {
        let d = Designator::constant(json!({"pose": [1, 2]})).named("entity");
        let p = d.field("pose").unwrap().index(0).unwrap();
        assert_eq!(p.name(), "entity.pose[0]");
    }

    #[test]
    fn expect_type_checks_assignability() {
        let d = Designator::constant(json!(true));
        assert!(d.expect_type(&ValueType::Bool).is_ok());
        assert!(d.expect_type(&ValueType::String).is_err());
    }

    #[test]
    fn resolve_as_deserializes() {
        let d = Designator::constant(json!(["a", "b"]));
        let v: Vec<String> = d.resolve_as().unwrap();
        assert_eq!(v, vec!["a".to_string(), "b".to_string()]);
        let err = d.resolve_as::<u32>().unwrap_err();
        assert_eq!(err.kind(), FailureKind::TypeMismatch);
    }

    #[test]
    fn upstreams_lists_wrapped_designators() {
        let d = Designator::constant(json!({"a": 1}));
        let a = d.field("a").unwrap();
        let ups = a.upstreams();
        assert_eq!(ups.len(), 1);
        assert!(ups[0].ptr_eq(&d));
        assert!(d.upstreams().is_empty());
    }
}
