//! The compiled, immutable validator.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::compile::TypeDescriptor;
use crate::context::ValidationContext;
use crate::discover::Table;
use crate::error::ValidateError;
use crate::reflect::{Node, TypeRef};
use crate::report::ValidationReport;
use crate::traverse;

/// A frozen type table that validates object graphs.
///
/// Cloning is cheap and every clone shares the same table, so one validator
/// can serve any number of concurrent runs.
#[derive(Clone)]
pub struct CompiledValidator {
    table: Arc<Table>,
}

impl CompiledValidator {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Validates `root` and collects every violation and visited instance.
    ///
    /// Unknown runtime types stay fatal.
    pub fn validate(&self, root: &Node) -> Result<ValidationReport, ValidateError> {
        let violations = Arc::new(Mutex::new(Vec::new()));
        let visited = Arc::new(Mutex::new(Vec::new()));
        let ctx = ValidationContext::collecting(Arc::clone(&violations), Arc::clone(&visited));

        self.validate_with(root, &ctx)?;

        let violations = std::mem::take(&mut *violations.lock());
        let visited = std::mem::take(&mut *visited.lock());
        Ok(ValidationReport::new(violations, visited))
    }

    /// Validates `root` on the calling thread, reporting through `ctx`.
    ///
    /// Fails with [`ValidateError::ConcurrencyMismatch`] when the context asks
    /// for more than one worker. The context is locked for the rest of its life.
    pub fn validate_with(&self, root: &Node, ctx: &ValidationContext) -> Result<(), ValidateError> {
        let requested = ctx.max_concurrency().get();
        if requested != 1 {
            return Err(ValidateError::ConcurrencyMismatch { requested });
        }
        ctx.lock();
        traverse::run_sequential(&self.table, root, ctx)
    }

    /// Validates `root` with up to `ctx.max_concurrency()` worker threads.
    ///
    /// Callbacks may be invoked from any worker, in any order.
    pub fn validate_parallel(
        &self,
        root: &Node,
        ctx: &ValidationContext,
    ) -> Result<(), ValidateError> {
        ctx.lock();
        traverse::run_parallel(&self.table, root, ctx, ctx.max_concurrency())
    }

    /// Descriptor of a known type.
    #[must_use]
    pub fn descriptor(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.table.get(&type_id)
    }

    /// Descriptor of `T`, if known.
    #[must_use]
    pub fn descriptor_of<T: 'static>(&self) -> Option<&TypeDescriptor> {
        self.descriptor(TypeId::of::<T>())
    }

    /// Every type in the compiled table, in no particular order.
    pub fn known_types(&self) -> impl Iterator<Item = TypeRef> + '_ {
        self.table.values().map(TypeDescriptor::type_ref)
    }

    /// Whether `type_id` is in the compiled table.
    #[must_use]
    pub fn contains_type(&self, type_id: TypeId) -> bool {
        self.table.contains_key(&type_id)
    }

    /// Number of known types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty. Never true for a built validator.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Total constraints across the table.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.table.values().map(TypeDescriptor::constraint_count).sum()
    }
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.table.values().map(TypeDescriptor::name).collect();
        types.sort_unstable();
        f.debug_struct("CompiledValidator")
            .field("types", &types)
            .field("constraints", &self.constraint_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ValidatorBuilder;
    use crate::constraint::Pattern;
    use crate::reflect::{PropertyInfo, Reflect, Value, node};
    use std::num::NonZeroUsize;

    struct Tag {
        label: String,
    }

    impl Reflect for Tag {
        fn properties() -> Vec<PropertyInfo> {
            vec![
                PropertyInfo::readable::<Self, String>("label", |t| Value::item(t.label.clone()))
                    .with_annotation(Pattern::new("^[a-z]+$")),
            ]
        }
    }

    fn validator() -> CompiledValidator {
        ValidatorBuilder::new()
            .root::<Tag>()
            .pattern_annotations()
            .build()
            .unwrap()
    }

    fn tag(label: &str) -> Node {
        node(Tag {
            label: label.to_owned(),
        })
    }

    #[test]
    fn table_accessors() {
        let v = validator();
        assert_eq!(v.len(), 1);
        assert!(!v.is_empty());
        assert_eq!(v.constraint_count(), 1);
        assert!(v.contains_type(TypeId::of::<Tag>()));
        assert!(v.descriptor_of::<Tag>().is_some());
        assert!(v.descriptor_of::<String>().is_none());
        assert_eq!(v.known_types().collect::<Vec<_>>(), vec![TypeRef::of::<Tag>()]);
    }

    #[test]
    fn validate_collects_report() {
        let report = validator().validate(&tag("UPPER")).unwrap();
        assert_eq!(report.violation_count(), 1);
        assert_eq!(report.visited().len(), 1);
        assert_eq!(report.violations()[0].constraint_id(), "Pattern");

        assert!(validator().validate(&tag("lower")).unwrap().is_valid());
    }

    #[test]
    fn default_context_is_fatal() {
        let err = validator()
            .validate_with(&tag("UPPER"), &ValidationContext::new())
            .unwrap_err();
        assert_eq!(err.id(), "ConstraintViolation");
    }

    #[test]
    fn synchronous_run_rejects_parallel_degree() {
        let mut ctx = ValidationContext::new();
        ctx.set_max_concurrency(NonZeroUsize::new(2).unwrap()).unwrap();

        let err = validator().validate_with(&tag("lower"), &ctx).unwrap_err();
        assert!(matches!(err, ValidateError::ConcurrencyMismatch { requested: 2 }));
        assert!(!ctx.is_locked());

        validator().validate_parallel(&tag("lower"), &ctx).unwrap();
        assert!(ctx.is_locked());
    }

    #[test]
    fn clones_share_the_table() {
        let a = validator();
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.table, &b.table));
    }
}
