//! # Resolution Failures
//!
//! A failed `resolve()` is an ordinary value, not an unwinding error. The
//! state that asked for the value is expected to map it onto one of its own
//! declared outcomes (typically `failed`).
//!
//! Every variant names the designator that failed. Failures of an upstream
//! designator are wrapped in [`ResolutionFailure::UpstreamFailure`] so the
//! full chain can be reported, while [`ResolutionFailure::root_cause`]
//! recovers the original failure.

use thiserror::Error;

/// Why a designator could not produce a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionFailure {
    /// A variable was resolved before anything was written to it.
    #[error("designator {designator} is unset")]
    Unset {
        /// The unset designator.
        designator: String,
    },

    /// A wrapped designator failed to resolve.
    #[error("designator {designator}: upstream {upstream} failed: {source}")]
    UpstreamFailure {
        /// The designator whose resolution was attempted.
        designator: String,
        /// The upstream designator that failed.
        upstream: String,
        /// The upstream failure.
        source: Box<ResolutionFailure>,
    },

    /// A projection selected a field or index the value does not have.
    #[error("designator {designator}: {selector} not found in resolved value")]
    FieldNotFound {
        /// The projection designator.
        designator: String,
        /// The selector, rendered (`.name` or `[idx]`).
        selector: String,
    },

    /// A transformation function rejected its input.
    #[error("designator {designator}: transform {transform} failed: {reason}")]
    TransformError {
        /// The transformation designator.
        designator: String,
        /// Name of the transform.
        transform: String,
        /// What the transform reported.
        reason: String,
    },

    /// An external query yielded no candidate after filtering.
    #[error("designator {designator}: query to {collaborator} matched nothing")]
    NoMatch {
        /// The query designator.
        designator: String,
        /// Name of the collaborator that was queried.
        collaborator: String,
    },

    /// A value did not have the declared type.
    #[error("designator {designator} declares {expected} but produced {found}")]
    TypeMismatch {
        /// The designator whose contract was violated.
        designator: String,
        /// The declared type, rendered.
        expected: String,
        /// The offending value, rendered.
        found: String,
    },

    /// The `unique` selection policy saw more than one candidate.
    #[error("designator {designator}: expected a unique candidate, found {count}")]
    Ambiguous {
        /// The query designator.
        designator: String,
        /// How many candidates remained after filtering.
        count: usize,
    },

    /// The external collaborator itself reported an error.
    #[error("designator {designator}: collaborator {collaborator} failed: {message}")]
    Collaborator {
        /// The query designator.
        designator: String,
        /// Name of the collaborator.
        collaborator: String,
        /// The collaborator's error message.
        message: String,
    },
}

/// The kind of a [`ResolutionFailure`], without its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// See [`ResolutionFailure::Unset`].
    Unset,
    /// See [`ResolutionFailure::UpstreamFailure`].
    UpstreamFailure,
    /// See [`ResolutionFailure::FieldNotFound`].
    FieldNotFound,
    /// See [`ResolutionFailure::TransformError`].
    TransformError,
    /// See [`ResolutionFailure::NoMatch`].
    NoMatch,
    /// See [`ResolutionFailure::TypeMismatch`].
    TypeMismatch,
    /// See [`ResolutionFailure::Ambiguous`].
    Ambiguous,
    /// See [`ResolutionFailure::Collaborator`].
    Collaborator,
}

impl ResolutionFailure {
    /// The kind of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unset { .. } => FailureKind::Unset,
            Self::UpstreamFailure { .. } => FailureKind::UpstreamFailure,
            Self::FieldNotFound { .. } => FailureKind::FieldNotFound,
            Self::TransformError { .. } => FailureKind::TransformError,
            Self::NoMatch { .. } => FailureKind::NoMatch,
            Self::TypeMismatch { .. } => FailureKind::TypeMismatch,
            Self::Ambiguous { .. } => FailureKind::Ambiguous,
            Self::Collaborator { .. } => FailureKind::Collaborator,
        }
    }

    /// The designator this failure is reported for.
    pub fn designator(&self) -> &str {
        match self {
            Self::Unset { designator }
            | Self::UpstreamFailure { designator, .. }
            | Self::FieldNotFound { designator, .. }
            | Self::TransformError { designator, .. }
            | Self::NoMatch { designator, .. }
            | Self::TypeMismatch { designator, .. }
            | Self::Ambiguous { designator, .. }
            | Self::Collaborator { designator, .. } => designator,
        }
    }

    /// Follow `UpstreamFailure` links down to the failure that started it.
    pub fn root_cause(&self) -> &ResolutionFailure {
        let mut current = self;
        while let Self::UpstreamFailure { source, .. } = current {
            current = &**source;
        }
        current
    }

    pub(crate) fn upstream(designator: &str, upstream: &str, source: ResolutionFailure) -> Self {
        Self::UpstreamFailure {
            designator: designator.to_string(),
            upstream: upstream.to_string(),
            source: Box::new(source),
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unset => "unset",
            Self::UpstreamFailure => "upstream_failure",
            Self::FieldNotFound => "field_not_found",
            Self::TransformError => "transform_error",
            Self::NoMatch => "no_match",
            Self::TypeMismatch => "type_mismatch",
            Self::Ambiguous => "ambiguous",
            Self::Collaborator => "collaborator",
        };
        f.write_str(s)
    }
}

/// A write through a [`crate::WriteHandle`] was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    /// The value does not match the variable's declared type.
    #[error("variable {designator} declares {expected} but was written {found}")]
    TypeMismatch {
        /// The variable.
        designator: String,
        /// The declared type, rendered.
        expected: String,
        /// The rejected value, rendered.
        found: String,
    },

    /// A typed value could not be converted for storage.
    #[error("variable {designator}: value could not be serialized: {message}")]
    Serialization {
        /// The variable.
        designator: String,
        /// The serializer's message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> ResolutionFailure {
        ResolutionFailure::upstream(
            "outer",
            "middle",
            ResolutionFailure::upstream(
                "middle",
                "inner",
                ResolutionFailure::Unset {
                    designator: "inner".into(),
                },
            ),
        )
    }

    #[test]
    fn root_cause_follows_chain() {
        let failure = nested();
        assert_eq!(failure.kind(), FailureKind::UpstreamFailure);
        assert_eq!(failure.root_cause().kind(), FailureKind::Unset);
        assert_eq!(failure.root_cause().designator(), "inner");
    }

    #[test]
    fn display_includes_chain() {
        let msg = nested().to_string();
        assert!(msg.contains("outer"));
        assert!(msg.contains("inner is unset"));
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(FailureKind::FieldNotFound.to_string(), "field_not_found");
        assert_eq!(FailureKind::NoMatch.to_string(), "no_match");
    }
}
