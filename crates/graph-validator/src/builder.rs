//! Fluent builder that declares a schema and compiles it.
//!
//! ```rust,ignore
//! let validator = ValidatorBuilder::new()
//!     .root::<Server>()
//!     .descend_into::<Server>()
//!     .pattern_annotations()
//!     .type_mapper::<u16, String>(|port| port.to_string())
//!     .build()?;
//!
//! let report = validator.validate(&node(server))?;
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::ArtifactCache;
use crate::compile::{ConstraintFactory, FactoryContext, PropertyFilter, Schema, TypeDescriptor};
use crate::constraint::{ConstraintRef, Pattern, PatternConstraint, TypeMapper, TypeMappers};
use crate::discover::discover;
use crate::error::{BuildError, FactoryError};
use crate::options::BuildOptions;
use crate::reflect::{PropertyInfo, Reflect, TypeRef};
use crate::validator::CompiledValidator;

/// Declares root types, descent filters, constraint factories and type
/// mappers, then compiles them into a [`CompiledValidator`].
#[derive(Default)]
pub struct ValidatorBuilder {
    roots: Vec<TypeRef>,
    filters: Vec<PropertyFilter>,
    factories: Vec<ConstraintFactory>,
    mappers: TypeMappers,
    options: BuildOptions,
}

impl ValidatorBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `T` as a root type.
    #[must_use = "builder methods must be chained or built"]
    pub fn root<T: Reflect>(self) -> Self {
        self.root_type(TypeRef::of::<T>())
    }

    /// Declares a root type.
    #[must_use = "builder methods must be chained or built"]
    pub fn root_type(mut self, ty: TypeRef) -> Self {
        self.roots.push(ty);
        self
    }

    /// Declares several root types.
    #[must_use = "builder methods must be chained or built"]
    pub fn roots(mut self, types: impl IntoIterator<Item = TypeRef>) -> Self {
        self.roots.extend(types);
        self
    }

    /// Descends into every property matching `filter`. Filters are OR-combined.
    #[must_use = "builder methods must be chained or built"]
    pub fn descend_when<F>(mut self, filter: F) -> Self
    where
        F: Fn(&PropertyInfo) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Descends into properties declared as `T` or as a collection of `T`.
    #[must_use = "builder methods must be chained or built"]
    pub fn descend_into<T: Reflect>(self) -> Self {
        let target = TypeRef::of::<T>();
        self.descend_when(move |property| {
            let declared = property.declared_type();
            declared == target || declared.is_enumerable_of(target)
        })
    }

    /// Registers a factory consulted for every readable property.
    #[must_use = "builder methods must be chained or built"]
    pub fn constraint_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&FactoryContext<'_>) -> Result<Option<ConstraintRef>, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Registers a factory for constraints over `V`.
    ///
    /// The factory is only consulted for properties a `V` constraint fits:
    /// properties declared as `V`, collections of `V`, and properties with a
    /// registered mapper into `V`.
    #[must_use = "builder methods must be chained or built"]
    pub fn typed_constraint_factory<V, F>(self, factory: F) -> Self
    where
        V: Reflect,
        F: Fn(&FactoryContext<'_>) -> Result<Option<ConstraintRef>, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        let required = TypeRef::of::<V>();
        self.constraint_factory(move |ctx| {
            if ctx.accepts(required) {
                factory(ctx)
            } else {
                Ok(None)
            }
        })
    }

    /// Registers a factory for properties carrying an annotation of type `A`.
    ///
    /// The factory receives the first such annotation.
    #[must_use = "builder methods must be chained or built"]
    pub fn annotation_factory<A, F>(self, factory: F) -> Self
    where
        A: Any + Send + Sync,
        F: Fn(&FactoryContext<'_>, &A) -> Result<Option<ConstraintRef>, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        self.constraint_factory(move |ctx| match ctx.property().annotation::<A>() {
            Some(annotation) => factory(ctx, annotation),
            None => Ok(None),
        })
    }

    /// Turns every [`Pattern`] annotation into a [`PatternConstraint`].
    ///
    /// Identical pattern sources share one compiled expression.
    #[must_use = "builder methods must be chained or built"]
    pub fn pattern_annotations(self) -> Self {
        self.annotation_factory::<Pattern, _>(PatternConstraint::from_annotation)
    }

    /// Registers a conversion from `F` to `T`, used when a `T` constraint is
    /// attached to an `F` property.
    #[must_use = "builder methods must be chained or built"]
    pub fn type_mapper<F, T>(mut self, map: impl Fn(&F) -> T + Send + Sync + 'static) -> Self
    where
        F: Reflect,
        T: Reflect,
    {
        self.mappers.insert(TypeMapper::new::<F, T>(map));
        self
    }

    /// Sets the options used by [`build`](Self::build).
    #[must_use = "builder methods must be chained or built"]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Compiles the schema with the configured options.
    pub fn build(self) -> Result<CompiledValidator, BuildError> {
        let options = self.options;
        self.build_with(&options, None)
    }

    /// Compiles the schema.
    ///
    /// # Errors
    ///
    /// - [`BuildError::NoRootTypes`] when no root was declared
    /// - [`BuildError::NoConstraintsFound`] when no discovered property carries a constraint
    /// - [`BuildError::UnsupportedTypeForConstraint`] when a constraint cannot be fitted
    /// - [`BuildError::InvalidConstraint`] when a factory rejects its input
    /// - [`BuildError::Cancelled`] when `cancellation` fires
    #[tracing::instrument(skip_all, fields(mode = %options.mode, roots = self.roots.len()))]
    pub fn build_with(
        self,
        options: &BuildOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<CompiledValidator, BuildError> {
        if self.roots.is_empty() {
            return Err(BuildError::NoRootTypes);
        }

        let cache = ArtifactCache::new();
        let schema = Schema {
            filters: &self.filters,
            factories: &self.factories,
            mappers: &self.mappers,
            cache: &cache,
        };
        let table = discover(schema, &self.roots, options.mode, cancellation)?;

        let constraints: usize = table.values().map(TypeDescriptor::constraint_count).sum();
        if constraints == 0 {
            return Err(BuildError::NoConstraintsFound { types: table.len() });
        }

        tracing::info!(
            types = table.len(),
            constraints,
            artifacts = cache.len(),
            "validator built"
        );
        Ok(CompiledValidator::new(table))
    }
}

impl fmt::Debug for ValidatorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorBuilder")
            .field("roots", &self.roots)
            .field("filters", &self.filters.len())
            .field("factories", &self.factories.len())
            .field("mappers", &self.mappers.len())
            .field("options", &self.options)
            .finish()
    }
}
