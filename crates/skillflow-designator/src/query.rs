//! # External Query Designators
//!
//! A query designator asks an external collaborator (a world model, a
//! perception service, a database) for candidates, filters them with a
//! list of criteria, and picks exactly one with an explicit
//! [`SelectionPolicy`].
//!
//! ## Selection is never implicit
//!
//! When several candidates survive filtering there is no "natural" choice.
//! A query cannot be built without a policy, and every policy documents how
//! ties are broken: `MinBy`/`MaxBy` keep the earliest candidate in
//! collaborator order among equals, `Unique` refuses to choose.
//!
//! ## Parameters
//!
//! Query parameters may themselves be designators (e.g. the id of a
//! previously selected furniture item). They are resolved inside the same
//! resolution pass as the query, so a parameter reachable along two paths is
//! resolved once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use skillflow_core::{ConstructionDefect, Selector, ValueType};

use crate::designator::{Designator, Kind, ResolutionPass};
use crate::failure::ResolutionFailure;

// ── Collaborator Seam ────────────────────────────────────────────────

/// An error reported by a query collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    /// Human-readable description.
    pub message: String,
}

impl CollaboratorError {
    /// Wrap a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Something a query designator can ask for candidates.
pub trait QueryCollaborator: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Return every candidate matching `params`, in the collaborator's own
    /// order. An empty list is not an error.
    fn query(&self, params: &Map<String, Value>) -> Result<Vec<Value>, CollaboratorError>;
}

// ── Criteria and Policies ────────────────────────────────────────────

/// A filter applied to every candidate.
///
/// Fields are top-level keys of the candidate object. A candidate lacking
/// the field fails every criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Criterion {
    /// `candidate[field] == value`.
    Equals {
        /// Candidate field.
        field: String,
        /// Required value.
        value: Value,
    },
    /// `candidate[field] != value`. Candidates without the field are
    /// dropped.
    NotEquals {
        /// Candidate field.
        field: String,
        /// Excluded value.
        value: Value,
    },
    /// `candidate[field] < bound`, numerically.
    LessThan {
        /// Candidate field.
        field: String,
        /// Exclusive upper bound.
        bound: f64,
    },
    /// `candidate[field] > bound`, numerically.
    GreaterThan {
        /// Candidate field.
        field: String,
        /// Exclusive lower bound.
        bound: f64,
    },
    /// The field is present and not null.
    Present {
        /// Candidate field.
        field: String,
    },
}

impl Criterion {
    fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::LessThan { field, .. }
            | Self::GreaterThan { field, .. }
            | Self::Present { field } => field,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Self::LessThan { .. } | Self::GreaterThan { .. })
    }

    /// Whether `candidate` passes.
    pub fn matches(&self, candidate: &Value) -> bool {
        let Some(actual) = candidate.get(self.field()) else {
            return false;
        };
        match self {
            Self::Equals { value, .. } => actual == value,
            Self::NotEquals { value, .. } => actual != value,
            Self::LessThan { bound, .. } => actual.as_f64().is_some_and(|n| n < *bound),
            Self::GreaterThan { bound, .. } => actual.as_f64().is_some_and(|n| n > *bound),
            Self::Present { .. } => !actual.is_null(),
        }
    }
}

/// How one candidate is chosen from those that survive filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// The first candidate in collaborator order.
    First,
    /// The last candidate in collaborator order.
    Last,
    /// The candidate with the smallest numeric `field`; the earliest wins
    /// ties. Candidates without a numeric `field` are skipped.
    MinBy {
        /// Numeric candidate field.
        field: String,
    },
    /// The candidate with the largest numeric `field`; the earliest wins
    /// ties. Candidates without a numeric `field` are skipped.
    MaxBy {
        /// Numeric candidate field.
        field: String,
    },
    /// Exactly one candidate must remain, otherwise `Ambiguous`.
    Unique,
    /// All remaining candidates, as a list.
    All,
}

impl SelectionPolicy {
    fn sort_field(&self) -> Option<&str> {
        match self {
            Self::MinBy { field } | Self::MaxBy { field } => Some(field),
            _ => None,
        }
    }
}

// ── Plan ─────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Param {
    Fixed(Value),
    From(Designator),
}

/// A fully built query, owned by its designator.
pub(crate) struct QueryPlan {
    collaborator: Arc<dyn QueryCollaborator>,
    candidate_type: ValueType,
    params: Vec<(String, Param)>,
    filters: Vec<Criterion>,
    policy: SelectionPolicy,
}

impl QueryPlan {
    pub(crate) fn upstreams(&self) -> Vec<Designator> {
        self.params
            .iter()
            .filter_map(|(_, p)| match p {
                Param::From(d) => Some(d.clone()),
                Param::Fixed(_) => None,
            })
            .collect()
    }

    pub(crate) fn run(
        &self,
        name: &str,
        declared: &ValueType,
        pass: &mut ResolutionPass,
    ) -> Result<Value, ResolutionFailure> {
        let mut params = Map::new();
        for (key, param) in &self.params {
            let value = match param {
                Param::Fixed(v) => v.clone(),
                Param::From(upstream) => upstream
                    .resolve_in(pass)
                    .map_err(|e| ResolutionFailure::upstream(name, upstream.name(), e))?,
            };
            params.insert(key.clone(), value);
        }

        let collaborator = self.collaborator.name();
        let candidates =
            self.collaborator
                .query(&params)
                .map_err(|e| ResolutionFailure::Collaborator {
                    designator: name.to_string(),
                    collaborator: collaborator.to_string(),
                    message: e.message,
                })?;

        if let Some(bad) = candidates.iter().find(|c| !self.candidate_type.accepts(c)) {
            return Err(ResolutionFailure::TypeMismatch {
                designator: name.to_string(),
                expected: self.candidate_type.to_string(),
                found: bad.to_string(),
            });
        }

        let mut remaining = candidates;
        for criterion in &self.filters {
            let before = remaining.len();
            remaining.retain(|c| criterion.matches(c));
            tracing::debug!(
                designator = %name,
                criterion = ?criterion,
                before,
                after = remaining.len(),
                "query filter applied"
            );
        }

        let no_match = || ResolutionFailure::NoMatch {
            designator: name.to_string(),
            collaborator: collaborator.to_string(),
        };
        if remaining.is_empty() {
            return Err(no_match());
        }

        let chosen = match &self.policy {
            SelectionPolicy::First => remaining.into_iter().next(),
            SelectionPolicy::Last => remaining.into_iter().last(),
            SelectionPolicy::MinBy { field } => extreme_by(remaining, field, |a, b| a < b),
            SelectionPolicy::MaxBy { field } => extreme_by(remaining, field, |a, b| a > b),
            SelectionPolicy::Unique => {
                if remaining.len() > 1 {
                    return Err(ResolutionFailure::Ambiguous {
                        designator: name.to_string(),
                        count: remaining.len(),
                    });
                }
                remaining.into_iter().next()
            }
            SelectionPolicy::All => Some(Value::Array(remaining)),
        };
        let chosen = chosen.ok_or_else(no_match)?;

        if !declared.accepts(&chosen) {
            return Err(ResolutionFailure::TypeMismatch {
                designator: name.to_string(),
                expected: declared.to_string(),
                found: chosen.to_string(),
            });
        }
        Ok(chosen)
    }
}

/// The candidate whose numeric `field` beats every other under `better`.
/// Only a strictly better value replaces the current pick.
fn extreme_by(
    candidates: Vec<Value>,
    field: &str,
    better: impl Fn(f64, f64) -> bool,
) -> Option<Value> {
    let mut best: Option<(f64, Value)> = None;
    for candidate in candidates {
        let Some(key) = candidate.get(field).and_then(Value::as_f64) else {
            continue;
        };
        match &best {
            Some((current, _)) if !better(key, *current) => {}
            _ => best = Some((key, candidate)),
        }
    }
    best.map(|(_, v)| v)
}

// ── Builder ──────────────────────────────────────────────────────────

/// Assembles a query designator.
///
/// ```ignore
/// let drink = Designator::query(world.clone(), ValueType::Any)
///     .filter(Criterion::Equals { field: "type".into(), value: json!("drink") })
///     .select(SelectionPolicy::MinBy { field: "distance".into() })
///     .named("nearest_drink")
///     .build()?;
/// ```
pub struct QueryBuilder {
    collaborator: Arc<dyn QueryCollaborator>,
    candidate_type: ValueType,
    params: Vec<(String, Param)>,
    filters: Vec<Criterion>,
    policy: Option<SelectionPolicy>,
    name: Option<String>,
}

impl QueryBuilder {
    /// Start a query against `collaborator`, whose candidates must have
    /// `candidate_type`.
    pub fn new(collaborator: Arc<dyn QueryCollaborator>, candidate_type: ValueType) -> Self {
        Self {
            collaborator,
            candidate_type,
            params: Vec::new(),
            filters: Vec::new(),
            policy: None,
            name: None,
        }
    }

    /// Pass a fixed parameter to the collaborator.
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.push((key.into(), Param::Fixed(value)));
        self
    }

    /// Pass a parameter resolved from another designator at query time.
    pub fn param_from(mut self, key: impl Into<String>, source: &Designator) -> Self {
        self.params.push((key.into(), Param::From(source.clone())));
        self
    }

    /// Add a filter. Filters apply in the order they were added.
    pub fn filter(mut self, criterion: Criterion) -> Self {
        self.filters.push(criterion);
        self
    }

    /// Set the selection policy. Required.
    pub fn select(mut self, policy: SelectionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Name the resulting designator.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check the query and produce its designator.
    ///
    /// Fails when no policy was set, or when a criterion or policy names a
    /// field the candidate type cannot have (or a non-numeric field for a
    /// numeric comparison).
    pub fn build(self) -> Result<Designator, ConstructionDefect> {
        let name = self
            .name
            .unwrap_or_else(|| format!("query:{}", self.collaborator.name()));
        let Some(policy) = self.policy else {
            return Err(ConstructionDefect::MissingSelectionPolicy { designator: name });
        };

        let check_field = |field: &str, numeric: bool| -> Result<(), ConstructionDefect> {
            let selector = Selector::field(field);
            let Some(ty) = self.candidate_type.project(&selector) else {
                return Err(ConstructionDefect::IncompatibleComposition {
                    designator: name.clone(),
                    detail: format!(
                        "candidates of type {} have no field {field}",
                        self.candidate_type
                    ),
                });
            };
            if numeric && !ty.is_numeric() {
                return Err(ConstructionDefect::IncompatibleComposition {
                    designator: name.clone(),
                    detail: format!("field {field} is {ty}, not a number"),
                });
            }
            Ok(())
        };
        for criterion in &self.filters {
            check_field(criterion.field(), criterion.is_numeric())?;
        }
        if let Some(field) = policy.sort_field() {
            check_field(field, true)?;
        }

        let ty = match policy {
            SelectionPolicy::All => ValueType::list(self.candidate_type.clone()),
            _ => self.candidate_type.clone(),
        };
        let plan = QueryPlan {
            collaborator: self.collaborator,
            candidate_type: self.candidate_type,
            params: self.params,
            filters: self.filters,
            policy,
        };
        Ok(Designator::from_parts(name, ty, Kind::Query(Arc::new(plan))))
    }
}

impl Designator {
    /// Start building a query designator. See [`QueryBuilder`].
    pub fn query(collaborator: Arc<dyn QueryCollaborator>, candidate_type: ValueType) -> QueryBuilder {
        QueryBuilder::new(collaborator, candidate_type)
    }
}
