//! Error types for building and running validators.
//!
//! Two classes of failure exist:
//!
//! - [`BuildError`]: structural problems in the declared schema. Always fatal,
//!   no partial validator is ever produced.
//! - [`ValidateError`]: the outcome of a validation run that stopped early
//!   (a fatal violation, an unknown runtime type, cancellation).
//!
//! Individual constraint failures are described by [`ValidationError`], which
//! carries a stable code, a human-readable message and ordered parameters.

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use crate::report::{UnknownType, Violation};

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// A structured constraint failure.
///
/// Uses `Cow<'static, str>` so static codes and messages never allocate.
///
/// ```rust,ignore
/// let error = ValidationError::new("PatternMismatch", "value does not match pattern")
///     .with_param("pattern", "he.*lo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Error code for programmatic handling (e.g. `"PatternMismatch"`).
    pub code: Cow<'static, str>,

    /// Human-readable message in English.
    pub message: Cow<'static, str>,

    /// Ordered key-value parameters, typically 0-2 entries.
    pub params: SmallVec<[(Cow<'static, str>, Cow<'static, str>); 2]>,

    /// Optional hint for fixing the offending value.
    pub help: Option<Cow<'static, str>>,
}

impl ValidationError {
    /// Creates a new error with a code and message.
    pub fn new(code: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            params: SmallVec::new(),
            help: None,
        }
    }

    /// Adds a parameter to the error.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_param(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Adds help text.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_help(mut self, help: impl Into<Cow<'static, str>>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Looks up a parameter value by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_ref())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;

        if !self.params.is_empty() {
            write!(f, " (params: [")?;
            for (i, (k, v)) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k}={v}")?;
            }
            write!(f, "])")?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {help}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// BUILD ERROR
// ============================================================================

/// Structural errors raised while compiling a validator.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// `build` was called without any declared root type.
    #[error("no root types were declared")]
    NoRootTypes,

    /// Discovery finished but no property carries a constraint.
    #[error("no constraints found across {types} discovered type(s)")]
    NoConstraintsFound {
        /// Number of types in the discovered set.
        types: usize,
    },

    /// A constraint cannot be applied to the property it was attached to.
    #[error(
        "constraint `{constraint}` requires `{required}` but {type_name}.{property} is declared as `{declared}`"
    )]
    UnsupportedTypeForConstraint {
        /// Declaring type of the property.
        type_name: &'static str,
        /// Property name.
        property: String,
        /// Declared property type.
        declared: &'static str,
        /// Value type the constraint requires.
        required: &'static str,
        /// Constraint id.
        constraint: String,
    },

    /// A constraint factory rejected the declarative metadata it was given.
    #[error("invalid constraint on {type_name}.{property}: {reason}")]
    InvalidConstraint {
        /// Declaring type of the property.
        type_name: &'static str,
        /// Property name.
        property: String,
        /// Why the factory failed.
        reason: String,
    },

    /// The build cancellation token fired before discovery finished.
    #[error("build cancelled")]
    Cancelled,
}

impl BuildError {
    /// Stable identifier of the error kind.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::NoRootTypes => "NoTypes",
            Self::NoConstraintsFound { .. } => "NoConstraintsFound",
            Self::UnsupportedTypeForConstraint { .. } => "UnsupportedTypeForConstraint",
            Self::InvalidConstraint { .. } => "InvalidConstraint",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Error returned by a constraint factory that cannot turn property metadata
/// into a constraint (e.g. a pattern that does not compile).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FactoryError(pub String);

impl FactoryError {
    /// Creates a factory error from any message.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<regex::Error> for FactoryError {
    fn from(error: regex::Error) -> Self {
        Self(error.to_string())
    }
}

// ============================================================================
// VALIDATE ERROR
// ============================================================================

/// Reasons a validation run stopped before visiting the whole graph.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// The error callback treated a violation as fatal.
    #[error("{0}")]
    Violation(Box<Violation>),

    /// A runtime value's type is not in the compiled table and the
    /// unknown-type callback treated it as fatal.
    #[error("{0}")]
    UnknownType(Box<UnknownType>),

    /// The cancellation token fired.
    #[error("validation cancelled")]
    Cancelled,

    /// The synchronous entry point was asked to run with a degree other than 1.
    #[error("synchronous validation requires a concurrency degree of 1, got {requested}")]
    ConcurrencyMismatch {
        /// Degree configured on the context.
        requested: usize,
    },
}

impl ValidateError {
    /// Stable identifier of the error kind.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Violation(_) => "ConstraintViolation",
            Self::UnknownType(_) => "UnknownType",
            Self::Cancelled => "Cancelled",
            Self::ConcurrencyMismatch { .. } => "ConcurrencyMismatch",
        }
    }

    /// Whether the run stopped because of cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors raised when reconfiguring a [`ValidationContext`](crate::ValidationContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// Traversal already started with this context.
    #[error("validation context is locked once traversal has started")]
    ConfigurationLocked,
}

impl ContextError {
    /// Stable identifier of the error kind.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::ConfigurationLocked => "ConfigurationLocked",
        }
    }
}
