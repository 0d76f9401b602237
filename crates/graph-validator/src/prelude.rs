//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use nebula_graph_validator::prelude::*;
//! ```

pub use crate::builder::ValidatorBuilder;
pub use crate::compile::FactoryContext;
pub use crate::constraint::{
    Constraint, ConstraintRef, DelegateConstraint, Pattern, PatternConstraint,
};
pub use crate::context::{RunState, ValidationContext};
pub use crate::error::{BuildError, FactoryError, ValidateError, ValidationError};
pub use crate::options::{BuildMode, BuildOptions, TraversalOptions};
pub use crate::reflect::{Node, PropertyInfo, Reflect, TypeRef, Value, node};
pub use crate::report::{ValidationReport, Violation};
pub use crate::validator::CompiledValidator;
