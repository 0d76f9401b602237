//! Per-run configuration and callback sink.
//!
//! A [`ValidationContext`] carries everything a single validation run needs
//! besides the compiled table:
//!
//! - a typed [`RunState`] handed to every constraint,
//! - the error, item-visited and unknown-type callbacks,
//! - the degree of parallelism,
//! - an optional cancellation token.
//!
//! The context locks itself as soon as a traversal starts. From then on every
//! setter fails with [`ContextError::ConfigurationLocked`], so observers cannot
//! be swapped out mid-run.
//!
//! ```rust,ignore
//! let mut ctx = ValidationContext::new();
//! ctx.on_error(|violation| {
//!     tracing::warn!(%violation, "config violation");
//!     Ok(())
//! })?;
//! validator.validate_with(&root, &ctx)?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{ContextError, ValidateError};
use crate::options::TraversalOptions;
use crate::reflect::Node;
use crate::report::{UnknownType, Violation};

// ============================================================================
// RUN STATE
// ============================================================================

/// Named, typed values shared with every constraint during one run.
#[derive(Default)]
pub struct RunState {
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl RunState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, replacing any previous value under the same key.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Gets a value by key, `None` when absent or of another type.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.data.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.data.keys()).finish()
    }
}

// ============================================================================
// CALLBACKS
// ============================================================================

/// Receives each violation. Returning `Err` stops the run.
pub type ErrorCallback = Arc<dyn Fn(Violation) -> Result<(), ValidateError> + Send + Sync>;

/// Observes each instance as it is visited.
pub type ItemCallback = Arc<dyn Fn(&Node) + Send + Sync>;

/// Receives instances whose type is not in the compiled table. Returning `Err`
/// stops the run.
pub type UnknownTypeCallback = Arc<dyn Fn(UnknownType) -> Result<(), ValidateError> + Send + Sync>;

fn fail_on_violation(violation: Violation) -> Result<(), ValidateError> {
    Err(ValidateError::Violation(Box::new(violation)))
}

fn fail_on_unknown_type(unknown: UnknownType) -> Result<(), ValidateError> {
    Err(ValidateError::UnknownType(Box::new(unknown)))
}

// ============================================================================
// VALIDATION CONTEXT
// ============================================================================

/// Per-run state and callback slots.
pub struct ValidationContext {
    state: RunState,
    on_error: ErrorCallback,
    on_item: Option<ItemCallback>,
    on_unknown_type: UnknownTypeCallback,
    max_concurrency: NonZeroUsize,
    cancellation: Option<CancellationToken>,
    locked: AtomicBool,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            state: RunState::new(),
            on_error: Arc::new(fail_on_violation),
            on_item: None,
            on_unknown_type: Arc::new(fail_on_unknown_type),
            max_concurrency: NonZeroUsize::MIN,
            cancellation: None,
            locked: AtomicBool::new(false),
        }
    }
}

impl ValidationContext {
    /// A context with fatal defaults: the first violation or unknown type
    /// stops the run. Runs sequentially, without cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that records every violation and visited instance into the
    /// given sinks. Unknown types stay fatal.
    pub(crate) fn collecting(
        violations: Arc<Mutex<Vec<Violation>>>,
        visited: Arc<Mutex<Vec<Node>>>,
    ) -> Self {
        Self {
            on_error: Arc::new(move |violation: Violation| -> Result<(), ValidateError> {
                violations.lock().push(violation);
                Ok(())
            }),
            on_item: Some(Arc::new(move |node: &Node| visited.lock().push(Arc::clone(node)))),
            ..Self::default()
        }
    }

    fn ensure_unlocked(&self) -> Result<(), ContextError> {
        if self.is_locked() {
            Err(ContextError::ConfigurationLocked)
        } else {
            Ok(())
        }
    }

    /// Mutable access to the run state.
    pub fn state_mut(&mut self) -> Result<&mut RunState, ContextError> {
        self.ensure_unlocked()?;
        Ok(&mut self.state)
    }

    /// Replaces the error callback.
    pub fn on_error<F>(&mut self, callback: F) -> Result<&mut Self, ContextError>
    where
        F: Fn(Violation) -> Result<(), ValidateError> + Send + Sync + 'static,
    {
        self.ensure_unlocked()?;
        self.on_error = Arc::new(callback);
        Ok(self)
    }

    /// Sets the item-visited callback.
    pub fn on_item_visited<F>(&mut self, callback: F) -> Result<&mut Self, ContextError>
    where
        F: Fn(&Node) + Send + Sync + 'static,
    {
        self.ensure_unlocked()?;
        self.on_item = Some(Arc::new(callback));
        Ok(self)
    }

    /// Replaces the unknown-type callback.
    pub fn on_unknown_type<F>(&mut self, callback: F) -> Result<&mut Self, ContextError>
    where
        F: Fn(UnknownType) -> Result<(), ValidateError> + Send + Sync + 'static,
    {
        self.ensure_unlocked()?;
        self.on_unknown_type = Arc::new(callback);
        Ok(self)
    }

    /// Sets the maximum number of traversal workers.
    pub fn set_max_concurrency(&mut self, degree: NonZeroUsize) -> Result<&mut Self, ContextError> {
        self.ensure_unlocked()?;
        self.max_concurrency = degree;
        Ok(self)
    }

    /// Sets the cancellation token checked before each queued item.
    pub fn set_cancellation(&mut self, token: CancellationToken) -> Result<&mut Self, ContextError> {
        self.ensure_unlocked()?;
        self.cancellation = Some(token);
        Ok(self)
    }

    /// Applies traversal options loaded from configuration.
    pub fn apply_options(&mut self, options: &TraversalOptions) -> Result<&mut Self, ContextError> {
        self.set_max_concurrency(options.max_concurrency)
    }

    /// The run state.
    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Configured degree of parallelism.
    #[must_use]
    pub fn max_concurrency(&self) -> NonZeroUsize {
        self.max_concurrency
    }

    /// The cancellation token, if any.
    #[must_use]
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Whether a traversal has started with this context.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub(crate) fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn report(&self, violation: Violation) -> Result<(), ValidateError> {
        (self.on_error)(violation)
    }

    pub(crate) fn item_visited(&self, node: &Node) {
        if let Some(callback) = &self.on_item {
            callback(node);
        }
    }

    pub(crate) fn unknown_type(&self, unknown: UnknownType) -> Result<(), ValidateError> {
        (self.on_unknown_type)(unknown)
    }
}

impl fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("state", &self.state)
            .field("max_concurrency", &self.max_concurrency)
            .field("cancellable", &self.cancellation.is_some())
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_insert_get() {
        let mut state = RunState::new();
        state.insert("limit", 42usize);

        assert_eq!(state.get::<usize>("limit"), Some(&42));
        assert_eq!(state.get::<String>("limit"), None);
        assert_eq!(state.get::<usize>("missing"), None);
        assert!(state.contains("limit"));
        assert_eq!(state.len(), 1);
        assert!(!state.is_empty());
    }

    #[test]
    fn defaults_are_sequential_and_uncancellable() {
        let ctx = ValidationContext::new();
        assert_eq!(ctx.max_concurrency().get(), 1);
        assert!(ctx.cancellation().is_none());
        assert!(!ctx.is_cancelled());
        assert!(!ctx.is_locked());
    }

    #[test]
    fn setters_chain_before_lock() {
        let mut ctx = ValidationContext::new();
        ctx.on_error(|_| Ok(()))
            .unwrap()
            .on_item_visited(|_| {})
            .unwrap()
            .set_max_concurrency(NonZeroUsize::new(4).unwrap())
            .unwrap();
        assert_eq!(ctx.max_concurrency().get(), 4);
    }

    #[test]
    fn setters_fail_once_locked() {
        let mut ctx = ValidationContext::new();
        ctx.lock();

        assert_eq!(
            ctx.on_error(|_| Ok(())).err(),
            Some(ContextError::ConfigurationLocked)
        );
        assert!(ctx.on_item_visited(|_| {}).is_err());
        assert!(ctx.on_unknown_type(|_| Ok(())).is_err());
        assert!(ctx.set_cancellation(CancellationToken::new()).is_err());
        assert!(ctx.state_mut().is_err());
        assert!(ctx.set_max_concurrency(NonZeroUsize::MIN).is_err());
    }

    #[test]
    fn cancellation_is_observed() {
        let token = CancellationToken::new();
        let mut ctx = ValidationContext::new();
        ctx.set_cancellation(token.clone()).unwrap();
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn default_unknown_type_is_fatal() {
        let ctx = ValidationContext::new();
        let err = ctx
            .unknown_type(UnknownType {
                instance: crate::reflect::node(0u8),
                type_id: std::any::TypeId::of::<u8>(),
                origin: None,
            })
            .unwrap_err();
        assert_eq!(err.id(), "UnknownType");
    }
}
