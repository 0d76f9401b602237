//! Violation records and the collected validation report.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::constraint::ConstraintRef;
use crate::error::ValidationError;
use crate::reflect::{Node, Value};

/// Where a queued instance was found: the owning type and property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Name of the type that owns the property.
    pub type_name: &'static str,
    /// Property the instance was read from.
    pub property: Arc<str>,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.property)
    }
}

/// A single failed constraint.
#[derive(Clone)]
pub struct Violation {
    /// The property value the constraint received.
    pub value: Value,
    /// The instance that owns the property.
    pub instance: Node,
    /// Name of the instance's type.
    pub type_name: &'static str,
    /// Name of the property.
    pub property: Arc<str>,
    /// The constraint that failed. Exposes its id and context.
    pub constraint: ConstraintRef,
    /// Element position when the constraint was expanded over a collection.
    pub index: Option<usize>,
    /// What went wrong.
    pub error: ValidationError,
}

impl Violation {
    /// Stable id of the failed constraint.
    #[must_use]
    pub fn constraint_id(&self) -> &str {
        self.constraint.id()
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.error.message
    }

    /// Dotted location, e.g. `app::Server.tags[2]`.
    #[must_use]
    pub fn path(&self) -> String {
        match self.index {
            Some(index) => format!("{}.{}[{index}]", self.type_name, self.property),
            None => format!("{}.{}", self.type_name, self.property),
        }
    }
}

impl fmt::Debug for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Violation")
            .field("path", &self.path())
            .field("constraint", &self.constraint_id())
            .field("value", &self.value)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.path(), self.error)
    }
}

/// A runtime instance whose type is not in the compiled table.
#[derive(Debug, Clone)]
pub struct UnknownType {
    /// The offending instance.
    pub instance: Node,
    /// Its runtime type.
    pub type_id: TypeId,
    /// Where it was found, `None` for the root.
    pub origin: Option<Origin>,
}

impl fmt::Display for UnknownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown type {:?}", self.type_id)?;
        match &self.origin {
            Some(origin) => write!(f, " reached through {origin}"),
            None => write!(f, " at the root"),
        }
    }
}

/// Result of the convenience [`validate`](crate::CompiledValidator::validate) path.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    violations: Vec<Violation>,
    visited: Vec<Node>,
}

impl ValidationReport {
    pub(crate) fn new(violations: Vec<Violation>, visited: Vec<Node>) -> Self {
        Self {
            violations,
            visited,
        }
    }

    /// Every violation, in reporting order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Every visited instance, in visiting order.
    #[must_use]
    pub fn visited(&self) -> &[Node] {
        &self.visited
    }

    /// Total number of violations.
    #[must_use]
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Whether no violation was reported.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Consumes the report, keeping the violations.
    #[must_use]
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}
