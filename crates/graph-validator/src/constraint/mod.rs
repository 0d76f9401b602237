//! Constraint descriptors.
//!
//! A constraint is a unit of validation logic bound to a property. It has a
//! stable id, an opaque context (e.g. the compiled pattern), the value type it
//! requires, and a single `validate` entry point.
//!
//! Variants:
//!
//! - [`PatternConstraint`]: regex match over `String` values
//! - [`DelegateConstraint`]: arbitrary closure
//! - [`Expand`]: applies an inner constraint to each element of a collection
//! - [`Convert`]: maps the value through a registered [`TypeMapper`] first
//!
//! Adapters wrap an inner descriptor instead of re-implementing it.
//! Implementations must be immutable after construction. The traversal engine
//! may call them from several workers at once.

mod adapter;
mod delegate;
mod pattern;

pub use adapter::{Convert, Expand, TypeMapper, TypeMappers};
pub use delegate::DelegateConstraint;
pub use pattern::{Pattern, PatternConstraint};

use std::any::Any;
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};

use crate::context::RunState;
use crate::error::ValidationError;
use crate::reflect::{TypeRef, Value};

/// Shared handle on a constraint.
pub type ConstraintRef = Arc<dyn Constraint>;

/// One failed check, optionally located at a collection element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Element position for expanded constraints.
    pub index: Option<usize>,
    /// What went wrong.
    pub error: ValidationError,
}

impl Failure {
    /// A failure not tied to an element.
    #[must_use]
    pub fn new(error: ValidationError) -> Self {
        Self { index: None, error }
    }

    /// A failure at element `index`.
    #[must_use]
    pub fn at(index: usize, error: ValidationError) -> Self {
        Self {
            index: Some(index),
            error,
        }
    }
}

/// Failures produced by a single [`Constraint::check`]. Usually zero or one.
pub type Failures = SmallVec<[Failure; 1]>;

/// A validation rule bound to a property.
pub trait Constraint: Send + Sync {
    /// Stable identifier, e.g. `"Pattern"`.
    fn id(&self) -> &str;

    /// Value type the constraint accepts.
    ///
    /// The dynamic [`Node`](crate::Node) type accepts any property.
    fn value_type(&self) -> TypeRef;

    /// Opaque context, e.g. the compiled pattern.
    fn context(&self) -> Option<&(dyn Any + Send + Sync)> {
        None
    }

    /// Validates one value. `Null` is passed through, never skipped.
    fn validate(&self, value: &Value, state: &RunState) -> Result<(), ValidationError>;

    /// Validates a value and collects every failure.
    ///
    /// Adapters override this to report one failure per element.
    fn check(&self, value: &Value, state: &RunState) -> Failures {
        match self.validate(value, state) {
            Ok(()) => Failures::new(),
            Err(error) => smallvec![Failure::new(error)],
        }
    }
}
