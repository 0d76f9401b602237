//! Regular-expression constraint.

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

use regex::Regex;

use crate::cache::ArtifactCache;
use crate::compile::FactoryContext;
use crate::context::RunState;
use crate::error::{FactoryError, ValidationError};
use crate::reflect::{TypeRef, Value};

use super::{Constraint, ConstraintRef};

/// Property annotation declaring a pattern the value must match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern(Cow<'static, str>);

impl Pattern {
    /// Creates the annotation.
    pub fn new(pattern: impl Into<Cow<'static, str>>) -> Self {
        Self(pattern.into())
    }

    /// The pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Requires a `String` value matching a regular expression.
///
/// Matching is an unanchored, case-sensitive search: `he.*lo` accepts
/// `"hello"` and `"helllo"` but rejects `"Hello"`. `Null` never matches.
#[derive(Debug, Clone)]
pub struct PatternConstraint {
    regex: Arc<Regex>,
}

impl PatternConstraint {
    /// Constraint id.
    pub const ID: &'static str = "Pattern";

    /// Wraps an already compiled pattern.
    #[must_use]
    pub fn new(regex: Arc<Regex>) -> Self {
        Self { regex }
    }

    /// Compiles `pattern` through the build's shared cache, so identical
    /// sources share one compiled instance.
    pub fn compile(pattern: &str, cache: &ArtifactCache) -> Result<Self, regex::Error> {
        let regex = cache.try_get_or_create(pattern.to_owned(), |source| Regex::new(source))?;
        Ok(Self::new(regex))
    }

    /// The compiled pattern.
    #[must_use]
    pub fn regex(&self) -> &Arc<Regex> {
        &self.regex
    }

    /// Annotation factory turning [`Pattern`] annotations into constraints.
    pub(crate) fn from_annotation(
        ctx: &FactoryContext<'_>,
        pattern: &Pattern,
    ) -> Result<Option<ConstraintRef>, FactoryError> {
        let constraint = Self::compile(pattern.as_str(), ctx.cache())?;
        Ok(Some(Arc::new(constraint)))
    }

    fn mismatch(&self, rendered: impl Into<Cow<'static, str>>) -> ValidationError {
        ValidationError::new("PatternMismatch", "value does not match the required pattern")
            .with_param("pattern", self.regex.as_str().to_owned())
            .with_param("value", rendered)
    }

    fn non_string(&self) -> ValidationError {
        ValidationError::new(
            "PatternAppliedToNonString",
            "pattern constraints only apply to string values",
        )
        .with_param("pattern", self.regex.as_str().to_owned())
    }
}

impl Constraint for PatternConstraint {
    fn id(&self) -> &str {
        Self::ID
    }

    fn value_type(&self) -> TypeRef {
        TypeRef::of::<String>()
    }

    fn context(&self) -> Option<&(dyn Any + Send + Sync)> {
        Some(&self.regex)
    }

    fn validate(&self, value: &Value, _state: &RunState) -> Result<(), ValidationError> {
        match value {
            Value::Null => Err(self.mismatch("null")),
            Value::Item(_) => match value.as_str() {
                Some(text) if self.regex.is_match(text) => Ok(()),
                Some(text) => Err(self.mismatch(text.to_owned())),
                None => Err(self.non_string()),
            },
            Value::List(_) => Err(self.non_string()),
        }
    }
}
