//! Adapters that fit a constraint onto a property of another declared type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::RunState;
use crate::error::ValidationError;
use crate::reflect::{Reflect, TypeRef, Value};

use super::{Constraint, ConstraintRef, Failure, Failures};

// ============================================================================
// TYPE MAPPERS
// ============================================================================

type MapFn = Arc<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;

/// A registered conversion from one declared type into another.
#[derive(Clone)]
pub struct TypeMapper {
    from: TypeRef,
    to: TypeRef,
    map: MapFn,
}

impl TypeMapper {
    /// Wraps a conversion `F -> T`.
    pub fn new<F, T>(map: impl Fn(&F) -> T + Send + Sync + 'static) -> Self
    where
        F: Reflect,
        T: Reflect,
    {
        Self {
            from: TypeRef::of::<F>(),
            to: TypeRef::of::<T>(),
            map: Arc::new(move |value: &dyn Any| {
                value.downcast_ref::<F>().map(|source| Value::item(map(source)))
            }),
        }
    }

    /// Source type.
    #[must_use]
    pub fn from_type(&self) -> TypeRef {
        self.from
    }

    /// Target type.
    #[must_use]
    pub fn to_type(&self) -> TypeRef {
        self.to
    }

    /// Converts a single item. `None` when the value is not of the source type.
    #[must_use]
    pub fn apply(&self, value: &Value) -> Option<Value> {
        value.as_node().and_then(|node| (self.map)(&**node))
    }
}

impl fmt::Debug for TypeMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeMapper({} -> {})", self.from.name(), self.to.name())
    }
}

/// Registry of type mappers, at most one per (source, target) pair.
#[derive(Debug, Clone, Default)]
pub struct TypeMappers {
    by_pair: HashMap<(TypeId, TypeId), TypeMapper>,
}

impl TypeMappers {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapper, replacing any earlier one for the same pair.
    pub fn insert(&mut self, mapper: TypeMapper) {
        self.by_pair
            .insert((mapper.from.id(), mapper.to.id()), mapper);
    }

    /// Mapper from `from` into `to`.
    #[must_use]
    pub fn find(&self, from: TypeRef, to: TypeRef) -> Option<&TypeMapper> {
        self.by_pair.get(&(from.id(), to.id()))
    }

    /// Mapper able to convert a single `from` item into `to`.
    ///
    /// Enumerable sources never match. Collection properties arrive as
    /// [`Value::List`] and mappers do not rebuild the collection.
    pub(crate) fn for_item(&self, from: TypeRef, to: TypeRef) -> Option<&TypeMapper> {
        if from.element().is_some() {
            return None;
        }
        self.find(from, to)
    }

    /// Number of registered mappers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_pair.len()
    }

    /// Whether no mapper is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_pair.is_empty()
    }
}

// ============================================================================
// COLLECTION EXPANSION
// ============================================================================

/// Applies an element constraint to every element of a collection property.
///
/// Each element is validated as a standalone value and each failing element
/// yields its own [`Failure`] carrying the element index. A `Null` collection
/// is handed to the inner constraint unchanged.
pub struct Expand {
    inner: ConstraintRef,
    declared: TypeRef,
}

impl Expand {
    /// Wraps `inner` for a property declared as `declared`.
    #[must_use]
    pub fn new(inner: ConstraintRef, declared: TypeRef) -> Self {
        Self { inner, declared }
    }
}

impl Constraint for Expand {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn value_type(&self) -> TypeRef {
        self.declared
    }

    fn context(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.inner.context()
    }

    fn validate(&self, value: &Value, state: &RunState) -> Result<(), ValidationError> {
        match self.check(value, state).into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(()),
        }
    }

    fn check(&self, value: &Value, state: &RunState) -> Failures {
        let Some(elements) = value.as_list() else {
            return self.inner.check(value, state);
        };
        elements
            .iter()
            .enumerate()
            .flat_map(|(index, element)| {
                self.inner
                    .check(element, state)
                    .into_iter()
                    .map(move |failure| Failure::at(index, failure.error))
            })
            .collect()
    }
}

impl fmt::Debug for Expand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expand")
            .field("inner", &self.inner.id())
            .field("declared", &self.declared)
            .finish()
    }
}

// ============================================================================
// VALUE CONVERSION
// ============================================================================

/// Converts the property value through a [`TypeMapper`] before invoking the
/// inner constraint.
///
/// `Null` is passed through unmapped. A value the mapper does not recognise is
/// handed over raw so that the inner constraint reports it.
pub struct Convert {
    inner: ConstraintRef,
    mapper: TypeMapper,
}

impl Convert {
    /// Wraps `inner` behind `mapper`.
    #[must_use]
    pub fn new(inner: ConstraintRef, mapper: TypeMapper) -> Self {
        Self { inner, mapper }
    }

    fn convert(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return None;
        }
        self.mapper.apply(value)
    }
}

impl Constraint for Convert {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn value_type(&self) -> TypeRef {
        self.mapper.from_type()
    }

    fn context(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.inner.context()
    }

    fn validate(&self, value: &Value, state: &RunState) -> Result<(), ValidationError> {
        match self.convert(value) {
            Some(mapped) => self.inner.validate(&mapped, state),
            None => self.inner.validate(value, state),
        }
    }

    fn check(&self, value: &Value, state: &RunState) -> Failures {
        match self.convert(value) {
            Some(mapped) => self.inner.check(&mapped, state),
            None => self.inner.check(value, state),
        }
    }
}

impl fmt::Debug for Convert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Convert")
            .field("inner", &self.inner.id())
            .field("mapper", &self.mapper)
            .finish()
    }
}
