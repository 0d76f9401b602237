//! # nebula-graph-validator
//!
//! Compiled validation for object graphs: configuration trees, DTOs and any
//! other loosely typed structure whose types describe themselves through
//! [`Reflect`].
//!
//! A [`ValidatorBuilder`] declares root types, which properties to descend
//! into and which constraints to attach. `build` discovers every reachable
//! type once, fits each constraint to its property (through a collection or
//! conversion adapter where needed) and freezes the result into a
//! [`CompiledValidator`]. Validation then walks a live graph breadth-first,
//! visiting every shared instance once, so cycles terminate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nebula_graph_validator::prelude::*;
//!
//! struct Route {
//!     path: String,
//!     next: Option<Arc<Route>>,
//! }
//!
//! impl Reflect for Route {
//!     fn properties() -> Vec<PropertyInfo> {
//!         vec![
//!             PropertyInfo::readable::<Self, String>("path", |r| Value::item(r.path.clone()))
//!                 .with_annotation(Pattern::new("^/")),
//!             PropertyInfo::readable::<Self, Route>("next", |r| Value::shared_opt(r.next.clone())),
//!         ]
//!     }
//! }
//!
//! let validator = ValidatorBuilder::new()
//!     .root::<Route>()
//!     .descend_into::<Route>()
//!     .pattern_annotations()
//!     .build()?;
//!
//! let report = validator.validate(&node(route))?;
//! for violation in report.violations() {
//!     eprintln!("{violation}");
//! }
//! ```
//!
//! ## Running with a context
//!
//! [`ValidationContext`] replaces the default callbacks (the first violation
//! or unknown type is fatal), carries per-run [`RunState`] for constraints and
//! an optional cancellation token. [`CompiledValidator::validate_parallel`]
//! spreads the walk over `max_concurrency` worker threads.

// ValidationError is returned by value from every constraint check.
#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]

mod builder;
mod cache;
mod compile;
pub mod constraint;
mod context;
mod discover;
mod error;
pub mod options;
mod pool;
pub mod prelude;
mod reflect;
mod report;
mod traverse;
mod validator;

pub use builder::ValidatorBuilder;
pub use cache::ArtifactCache;
pub use compile::{
    ConstraintFactory, FactoryContext, PropertyDescriptor, PropertyFilter, TypeDescriptor,
};
pub use constraint::{Constraint, ConstraintRef, Failure, Failures};
pub use context::{ErrorCallback, ItemCallback, RunState, UnknownTypeCallback, ValidationContext};
pub use error::{BuildError, ContextError, FactoryError, ValidateError, ValidationError};
pub use options::{BuildMode, BuildOptions, TraversalOptions};
pub use reflect::{Accessor, Node, PropertyInfo, Reflect, TypeRef, Value, identity, node, runtime_type};
pub use report::{Origin, UnknownType, ValidationReport, Violation};
pub use validator::CompiledValidator;
