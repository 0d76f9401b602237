//! Type and property metadata consumed by the validator compiler.
//!
//! Rust has no runtime reflection, so every type that participates in a
//! validated graph registers its shape through [`Reflect`]: the list of
//! properties, each with a declared type, an optional read accessor and any
//! number of typed annotations.
//!
//! ```rust,ignore
//! struct Server {
//!     name: String,
//!     upstream: Option<Arc<Server>>,
//! }
//!
//! impl Reflect for Server {
//!     fn properties() -> Vec<PropertyInfo> {
//!         vec![
//!             PropertyInfo::readable::<Self, String>("name", |s| Value::item(s.name.clone()))
//!                 .with_annotation(Pattern::new("^[a-z-]+$")),
//!             PropertyInfo::readable::<Self, Server>("upstream", |s| {
//!                 Value::shared_opt(s.upstream.clone())
//!             }),
//!         ]
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A shared object instance inside a validated graph.
///
/// Identity is the address of the shared allocation, so the same `Arc` reached
/// through two different paths is recognised as one instance.
pub type Node = Arc<dyn Any + Send + Sync>;

/// Wraps a value into a [`Node`].
pub fn node<T: Any + Send + Sync>(value: T) -> Node {
    Arc::new(value)
}

/// Runtime type of the value behind a node.
#[must_use]
pub fn runtime_type(node: &Node) -> TypeId {
    (**node).type_id()
}

/// Identity key of a node, stable for as long as the allocation is alive.
#[must_use]
pub fn identity(node: &Node) -> usize {
    Arc::as_ptr(node).cast::<()>() as usize
}

// ============================================================================
// REFLECT
// ============================================================================

/// Metadata capability of a type that can appear in a validated graph.
///
/// Scalars keep the default (no properties). Records list their properties.
/// Collections report their element type so that constraints and descent can
/// reach into them.
pub trait Reflect: Any + Send + Sync + Sized {
    /// Properties of the type, in declaration order.
    fn properties() -> Vec<PropertyInfo> {
        Vec::new()
    }

    /// Element type when the type is an enumerable.
    fn element_type() -> Option<TypeRef> {
        None
    }
}

macro_rules! opaque_reflect {
    ($($ty:ty),* $(,)?) => {
        $(impl Reflect for $ty {})*
    };
}

opaque_reflect!(
    String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32,
    f64, Node,
);

impl<T: Reflect> Reflect for Vec<T> {
    fn element_type() -> Option<TypeRef> {
        Some(TypeRef::of::<T>())
    }
}

// ============================================================================
// TYPE REF
// ============================================================================

/// Handle on a reflected type: identity, name, and lazy access to its shape.
///
/// Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
    properties: fn() -> Vec<PropertyInfo>,
    element: fn() -> Option<TypeRef>,
}

impl TypeRef {
    /// Handle for `T`.
    #[must_use]
    pub fn of<T: Reflect>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            properties: T::properties,
            element: T::element_type,
        }
    }

    /// Type identity.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Properties declared by the type.
    #[must_use]
    pub fn properties(&self) -> Vec<PropertyInfo> {
        (self.properties)()
    }

    /// Element type when this is an enumerable.
    #[must_use]
    pub fn element(&self) -> Option<TypeRef> {
        (self.element)()
    }

    /// Innermost element type of nested enumerables, or the type itself.
    ///
    /// This is the type of the instances that descent actually enqueues.
    #[must_use]
    pub fn item_type(&self) -> TypeRef {
        let mut current = *self;
        while let Some(element) = current.element() {
            current = element;
        }
        current
    }

    /// Whether this is an enumerable whose element type is `other`.
    #[must_use]
    pub fn is_enumerable_of(&self, other: TypeRef) -> bool {
        self.element() == Some(other)
    }

    /// Whether this is the dynamic [`Node`] slot.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.id == TypeId::of::<Node>()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.name)
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// A property value as seen by constraints and the traversal engine.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// A single value or object instance.
    Item(Node),
    /// The elements of an enumerable.
    List(Vec<Value>),
}

impl Value {
    /// Wraps an owned value. Every call allocates a fresh instance.
    pub fn item<T: Any + Send + Sync>(value: T) -> Self {
        Self::Item(Arc::new(value))
    }

    /// Wraps a shared instance, preserving its identity.
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Item(value)
    }

    /// Wraps an optional shared instance.
    pub fn shared_opt<T: Any + Send + Sync>(value: Option<Arc<T>>) -> Self {
        value.map_or(Self::Null, Self::shared)
    }

    /// Wraps an optional owned value.
    pub fn optional<T: Any + Send + Sync>(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::item)
    }

    /// Builds a list of owned items.
    pub fn items<T, I>(values: I) -> Self
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = T>,
    {
        Self::List(values.into_iter().map(Self::item).collect())
    }

    /// Builds a list from already-wrapped values.
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Self::List(values.into_iter().collect())
    }

    /// Whether the value is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The instance behind an [`Value::Item`].
    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Item(node) => Some(node),
            _ => None,
        }
    }

    /// Borrows the item as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_node().and_then(|node| node.downcast_ref::<T>())
    }

    /// Borrows the item as a string slice when it is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    /// Elements of a [`Value::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Item(node)
    }
}

impl From<Option<Node>> for Value {
    fn from(node: Option<Node>) -> Self {
        node.map_or(Self::Null, Self::Item)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Item(node) => write!(f, "Item({})", describe(&**node)),
            Self::List(values) => f.debug_tuple("List").field(values).finish(),
        }
    }
}

/// Short rendering of well-known scalars, `<opaque>` for everything else.
pub(crate) fn describe(value: &(dyn Any + Send + Sync)) -> String {
    macro_rules! try_scalars {
        ($($ty:ty),*) => {
            $(
                if let Some(v) = value.downcast_ref::<$ty>() {
                    return format!("{v:?}");
                }
            )*
        };
    }
    try_scalars!(String, bool, char, i32, i64, u16, u32, u64, usize, f64);
    "<opaque>".to_owned()
}

// ============================================================================
// PROPERTY INFO
// ============================================================================

/// Reads a property off an instance of its owning type.
pub type Accessor = Arc<dyn Fn(&dyn Any) -> Value + Send + Sync>;

/// Declarative description of one property.
#[derive(Clone)]
pub struct PropertyInfo {
    name: Cow<'static, str>,
    declared: TypeRef,
    accessor: Option<Accessor>,
    annotations: Vec<Arc<dyn Any + Send + Sync>>,
}

impl PropertyInfo {
    /// A property of `O` declared as `T`, read through `read`.
    ///
    /// The accessor yields [`Value::Null`] when handed an instance that is not
    /// an `O`. When `T` is a collection, `read` must return [`Value::List`]
    /// (see [`Value::items`] and [`Value::list`]) or [`Value::Null`], never a
    /// single item wrapping the whole collection.
    pub fn readable<O, T>(
        name: impl Into<Cow<'static, str>>,
        read: impl Fn(&O) -> Value + Send + Sync + 'static,
    ) -> Self
    where
        O: Reflect,
        T: Reflect,
    {
        let accessor: Accessor = Arc::new(move |instance: &dyn Any| {
            instance.downcast_ref::<O>().map_or(Value::Null, &read)
        });
        Self {
            name: name.into(),
            declared: TypeRef::of::<T>(),
            accessor: Some(accessor),
            annotations: Vec::new(),
        }
    }

    /// A property declared as `T` without a read accessor. Compilation skips it.
    pub fn write_only<T: Reflect>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            declared: TypeRef::of::<T>(),
            accessor: None,
            annotations: Vec::new(),
        }
    }

    /// Attaches a typed annotation.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_annotation<A: Any + Send + Sync>(mut self, annotation: A) -> Self {
        self.annotations.push(Arc::new(annotation));
        self
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn declared_type(&self) -> TypeRef {
        self.declared
    }

    /// Whether the property has a read accessor.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.accessor.is_some()
    }

    pub(crate) fn accessor(&self) -> Option<&Accessor> {
        self.accessor.as_ref()
    }

    /// First annotation of type `A`.
    #[must_use]
    pub fn annotation<A: Any>(&self) -> Option<&A> {
        self.annotations().find_map(|a| a.downcast_ref::<A>())
    }

    /// Every annotation of type `A`, in attachment order.
    pub fn annotations_of<A: Any>(&self) -> impl Iterator<Item = &A> {
        self.annotations().filter_map(|a| a.downcast_ref::<A>())
    }

    fn annotations(&self) -> impl Iterator<Item = &(dyn Any + Send + Sync)> {
        self.annotations.iter().map(|a| &**a)
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("readable", &self.is_readable())
            .field("annotations", &self.annotations.len())
            .finish()
    }
}
