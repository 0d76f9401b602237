//! Closure-backed constraints.

use std::borrow::Cow;
use std::fmt;

use crate::context::RunState;
use crate::error::ValidationError;
use crate::reflect::{Node, Reflect, TypeRef, Value};

use super::Constraint;

type CheckFn = Box<dyn Fn(&Value, &RunState) -> Result<(), ValidationError> + Send + Sync>;

/// A constraint whose logic is a user-supplied closure.
///
/// ```rust,ignore
/// let positive = DelegateConstraint::typed::<i64>("Positive", |value, _| match value {
///     Some(n) if *n > 0 => Ok(()),
///     _ => Err(ValidationError::new("Positive", "must be greater than zero")),
/// });
/// ```
pub struct DelegateConstraint {
    id: Cow<'static, str>,
    value_type: TypeRef,
    check: CheckFn,
}

impl DelegateConstraint {
    /// A constraint over values of type `T` that inspects the raw [`Value`].
    pub fn new<T: Reflect>(
        id: impl Into<Cow<'static, str>>,
        check: impl Fn(&Value, &RunState) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            value_type: TypeRef::of::<T>(),
            check: Box::new(check),
        }
    }

    /// A constraint over values of type `T` that receives the downcast value.
    ///
    /// `Null` arrives as `None`. A value of any other type is reported as
    /// `TypeMismatch` without calling `check`.
    pub fn typed<T: Reflect>(
        id: impl Into<Cow<'static, str>>,
        check: impl Fn(Option<&T>, &RunState) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        let id = id.into();
        let expected = TypeRef::of::<T>().name();
        Self::new::<T>(id, move |value, state| match value {
            Value::Null => check(None, state),
            Value::Item(node) => match node.downcast_ref::<T>() {
                Some(typed) => check(Some(typed), state),
                None => Err(type_mismatch(expected)),
            },
            Value::List(_) => Err(type_mismatch(expected)),
        })
    }

    /// A constraint that accepts properties of any declared type.
    pub fn any(
        id: impl Into<Cow<'static, str>>,
        check: impl Fn(&Value, &RunState) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        Self::new::<Node>(id, check)
    }
}

fn type_mismatch(expected: &'static str) -> ValidationError {
    ValidationError::new("TypeMismatch", format!("expected a value of type `{expected}`"))
        .with_param("expected", expected)
}

impl Constraint for DelegateConstraint {
    fn id(&self) -> &str {
        &self.id
    }

    fn value_type(&self) -> TypeRef {
        self.value_type
    }

    fn validate(&self, value: &Value, state: &RunState) -> Result<(), ValidationError> {
        (self.check)(value, state)
    }
}

impl fmt::Debug for DelegateConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateConstraint")
            .field("id", &self.id)
            .field("value_type", &self.value_type)
            .finish()
    }
}
