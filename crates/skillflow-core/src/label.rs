//! # Label Newtypes
//!
//! Names of states, labels of outcomes, and keys of the execution context.
//! Each is a distinct type: a [`StateName`] cannot be used where an
//! [`Outcome`] is expected, even though both are strings underneath.
//!
//! ## Validation
//!
//! All three share one lexical rule: 1 to [`MAX_LABEL_LEN`] characters drawn
//! from ASCII letters, digits, `_` and `-`. Labels are compared
//! case-sensitively, so `SAY_HI` and `say_hi` are different states.
//!
//! Labels written as string literals in library code can be created with
//! `from_static`, which skips validation. Machine builders re-validate
//! every label they are handed, so an invalid static label is still
//! reported as a construction defect before anything runs.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::error::LabelError;

/// Maximum length of any label, in bytes.
pub const MAX_LABEL_LEN: usize = 128;

/// Check `raw` against the shared lexical rule.
fn validate(kind: &'static str, raw: &str) -> Result<(), LabelError> {
    if raw.is_empty() {
        return Err(LabelError::Empty { kind });
    }
    if raw.len() > MAX_LABEL_LEN {
        return Err(LabelError::TooLong {
            kind,
            len: raw.len(),
        });
    }
    if let Some(ch) = raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(LabelError::InvalidCharacter {
            kind,
            label: raw.to_string(),
            ch,
        });
    }
    Ok(())
}

/// Generates a validated string newtype with the conversions every label
/// needs: `Display`, `AsRef<str>`, `Borrow<str>` (so maps keyed by the label
/// can be queried with a plain `&str`), comparison with `&str`, and a
/// `Deserialize` that routes through `new()`.
macro_rules! define_label {
    ($(#[$meta:meta])* $ty:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $ty(String);

        impl $ty {
            /// Create a validated label.
            pub fn new(raw: impl Into<String>) -> Result<Self, LabelError> {
                let raw = raw.into();
                validate($kind, &raw)?;
                Ok(Self(raw))
            }

            /// Create a label from a string literal without validating it.
            ///
            /// Builders re-check these with [`Self::check`].
            pub fn from_static(raw: &'static str) -> Self {
                Self(raw.to_string())
            }

            /// Re-run validation on an existing label.
            pub fn check(&self) -> Result<(), LabelError> {
                validate($kind, &self.0)
            }

            /// The label as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $ty {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $ty {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $ty {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::str::FromStr for $ty {
            type Err = LabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = LabelError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = LabelError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_label!(
    /// The name of a state inside one machine, e.g. `SERVE_DRINK_1`.
    ///
    /// Unique within its machine; nested machines have their own namespace.
    StateName,
    "state name"
);

define_label!(
    /// One label from a state's or machine's closed outcome set,
    /// e.g. `succeeded`, `failed`, `stop_iteration`.
    Outcome,
    "outcome"
);

define_label!(
    /// A key of the execution context (userdata), e.g. `selection`.
    KeyName,
    "key"
);

impl Outcome {
    /// The dedicated label an executor reports when a run is preempted.
    pub fn preempted() -> Self {
        Self::from_static(crate::outcome::PREEMPTED)
    }
}
