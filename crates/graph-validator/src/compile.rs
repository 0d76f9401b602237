//! Per-type and per-property compilation.
//!
//! Turns the reflected shape of a type into a [`TypeDescriptor`]: the ordered
//! list of properties that carry at least one constraint or that the traversal
//! must descend into. Constraints whose value type differs from the declared
//! property type are fitted with an [`Expand`] or [`Convert`] adapter, or the
//! build fails.

use std::fmt;
use std::sync::Arc;

use crate::cache::ArtifactCache;
use crate::constraint::{ConstraintRef, Convert, Expand, TypeMappers};
use crate::error::{BuildError, FactoryError};
use crate::reflect::{Accessor, Node, PropertyInfo, TypeRef, Value};

/// Produces zero or one constraint for a property.
pub type ConstraintFactory =
    Arc<dyn Fn(&FactoryContext<'_>) -> Result<Option<ConstraintRef>, FactoryError> + Send + Sync>;

/// Decides whether the traversal descends into a property's value.
pub type PropertyFilter = Arc<dyn Fn(&PropertyInfo) -> bool + Send + Sync>;

/// What a constraint factory sees while a property is compiled.
#[derive(Debug, Clone, Copy)]
pub struct FactoryContext<'a> {
    owner: TypeRef,
    property: &'a PropertyInfo,
    cache: &'a ArtifactCache,
    mappers: &'a TypeMappers,
}

impl<'a> FactoryContext<'a> {
    pub(crate) fn new(
        owner: TypeRef,
        property: &'a PropertyInfo,
        cache: &'a ArtifactCache,
        mappers: &'a TypeMappers,
    ) -> Self {
        Self {
            owner,
            property,
            cache,
            mappers,
        }
    }

    /// Type declaring the property.
    #[must_use]
    pub fn owner(&self) -> TypeRef {
        self.owner
    }

    /// The property being compiled.
    #[must_use]
    pub fn property(&self) -> &'a PropertyInfo {
        self.property
    }

    /// Declared type of the property.
    #[must_use]
    pub fn declared_type(&self) -> TypeRef {
        self.property.declared_type()
    }

    /// Artifact cache of the current build.
    #[must_use]
    pub fn cache(&self) -> &'a ArtifactCache {
        self.cache
    }

    /// Whether a constraint requiring `required` can be fitted onto this
    /// property, directly or through an adapter.
    #[must_use]
    pub fn accepts(&self, required: TypeRef) -> bool {
        let declared = self.declared_type();
        required == declared
            || required.is_dynamic()
            || declared.is_enumerable_of(required)
            || self.mappers.for_item(declared, required).is_some()
            || declared
                .element()
                .is_some_and(|element| self.mappers.for_item(element, required).is_some())
    }
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// A compiled property: how to read it, what to check, whether to descend.
#[derive(Clone)]
pub struct PropertyDescriptor {
    owner: TypeRef,
    name: Arc<str>,
    declared: TypeRef,
    accessor: Accessor,
    constraints: Vec<ConstraintRef>,
    descend: bool,
}

impl PropertyDescriptor {
    /// Reads the property off an instance of the owning type.
    #[must_use]
    pub fn read(&self, instance: &Node) -> Value {
        let value = (self.accessor)(&**instance);
        debug_assert!(
            self.declared.element().is_none() || !matches!(value, Value::Item(_)),
            "{}.{} is declared as a collection but its accessor returned a single item",
            self.owner.name(),
            self.name,
        );
        value
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> &Arc<str> {
        &self.name
    }

    /// Type declaring the property.
    #[must_use]
    pub fn owner(&self) -> TypeRef {
        self.owner
    }

    /// Declared property type.
    #[must_use]
    pub fn declared_type(&self) -> TypeRef {
        self.declared
    }

    /// Attached constraints, in factory registration order.
    #[must_use]
    pub fn constraints(&self) -> &[ConstraintRef] {
        &self.constraints
    }

    /// Whether non-null values are enqueued for traversal.
    #[must_use]
    pub fn descends(&self) -> bool {
        self.descend
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.constraints.iter().map(|c| c.id()).collect();
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("constraints", &ids)
            .field("descend", &self.descend)
            .finish()
    }
}

/// A compiled type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    ty: TypeRef,
    properties: Vec<PropertyDescriptor>,
}

impl TypeDescriptor {
    /// The described type.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        self.ty
    }

    /// Name of the described type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    /// Retained properties, in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Looks up a retained property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Total constraints across all properties.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.properties.iter().map(|p| p.constraints.len()).sum()
    }

    /// Types the traversal can reach from this one.
    pub(crate) fn descend_targets(&self) -> impl Iterator<Item = TypeRef> + '_ {
        self.properties
            .iter()
            .filter(|p| p.descend)
            .map(|p| p.declared.item_type())
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Everything the builder registered, borrowed for one build.
#[derive(Clone, Copy)]
pub(crate) struct Schema<'a> {
    pub(crate) filters: &'a [PropertyFilter],
    pub(crate) factories: &'a [ConstraintFactory],
    pub(crate) mappers: &'a TypeMappers,
    pub(crate) cache: &'a ArtifactCache,
}

impl Schema<'_> {
    /// Compiles the descriptor of `ty`.
    pub(crate) fn compile_type(&self, ty: TypeRef) -> Result<TypeDescriptor, BuildError> {
        let mut properties = Vec::new();
        for info in ty.properties() {
            if let Some(descriptor) = self.compile_property(ty, &info)? {
                properties.push(descriptor);
            }
        }

        let descriptor = TypeDescriptor { ty, properties };
        tracing::debug!(
            type_name = ty.name(),
            properties = descriptor.properties.len(),
            constraints = descriptor.constraint_count(),
            "compiled type descriptor"
        );
        Ok(descriptor)
    }

    fn compile_property(
        &self,
        owner: TypeRef,
        info: &PropertyInfo,
    ) -> Result<Option<PropertyDescriptor>, BuildError> {
        let Some(accessor) = info.accessor() else {
            return Ok(None);
        };

        let ctx = FactoryContext::new(owner, info, self.cache, self.mappers);
        let mut constraints = Vec::new();
        for factory in self.factories {
            let produced = factory(&ctx).map_err(|e| BuildError::InvalidConstraint {
                type_name: owner.name(),
                property: info.name().to_owned(),
                reason: e.0,
            })?;
            if let Some(constraint) = produced {
                constraints.push(self.fit(owner, info, constraint)?);
            }
        }

        let descend = self.filters.iter().any(|filter| filter(info));
        if constraints.is_empty() && !descend {
            return Ok(None);
        }

        Ok(Some(PropertyDescriptor {
            owner,
            name: Arc::from(info.name()),
            declared: info.declared_type(),
            accessor: Arc::clone(accessor),
            constraints,
            descend,
        }))
    }

    /// Adapts `constraint` to the declared type of `info`.
    pub(crate) fn fit(
        &self,
        owner: TypeRef,
        info: &PropertyInfo,
        constraint: ConstraintRef,
    ) -> Result<ConstraintRef, BuildError> {
        let required = constraint.value_type();
        let declared = info.declared_type();

        if required == declared || required.is_dynamic() {
            return Ok(constraint);
        }
        if declared.is_enumerable_of(required) {
            return Ok(Arc::new(Expand::new(constraint, declared)));
        }
        if let Some(mapper) = self.mappers.for_item(declared, required) {
            return Ok(Arc::new(Convert::new(constraint, mapper.clone())));
        }
        if let Some(mapper) = declared
            .element()
            .and_then(|element| self.mappers.for_item(element, required))
        {
            let converted: ConstraintRef = Arc::new(Convert::new(constraint, mapper.clone()));
            return Ok(Arc::new(Expand::new(converted, declared)));
        }

        Err(BuildError::UnsupportedTypeForConstraint {
            type_name: owner.name(),
            property: info.name().to_owned(),
            declared: declared.name(),
            required: required.name(),
            constraint: constraint.id().to_owned(),
        })
    }
}
