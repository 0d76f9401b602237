//! Graph traversal against a compiled table.
//!
//! Items are processed breadth-first from the root. Before each item the
//! cancellation token is checked. An item whose identity was already seen is
//! skipped, so cycles and shared instances are visited once. A runtime type
//! missing from the table goes to the unknown-type callback and its properties
//! are not read.
//!
//! Visited instances are retained until the run ends. Their addresses cannot
//! be reused by values an accessor allocates later in the same run.

use std::collections::hash_map::{self, HashMap};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

use crate::compile::{PropertyDescriptor, TypeDescriptor};
use crate::context::ValidationContext;
use crate::discover::Table;
use crate::error::ValidateError;
use crate::pool::WorkQueue;
use crate::reflect::{Node, Value, identity, runtime_type};
use crate::report::{Origin, UnknownType, Violation};

/// A queued instance and where it was found.
struct Pending {
    node: Node,
    origin: Option<Origin>,
}

impl Pending {
    fn root(node: &Node) -> Self {
        Self {
            node: Arc::clone(node),
            origin: None,
        }
    }
}

fn cancelled() -> ValidateError {
    tracing::warn!("validation cancelled");
    ValidateError::Cancelled
}

/// Single-threaded FIFO traversal.
pub(crate) fn run_sequential(
    table: &Table,
    root: &Node,
    ctx: &ValidationContext,
) -> Result<(), ValidateError> {
    let mut visited: HashMap<usize, Node> = HashMap::new();
    let mut queue = VecDeque::from([Pending::root(root)]);

    while let Some(item) = queue.pop_front() {
        if ctx.is_cancelled() {
            return Err(cancelled());
        }
        match visited.entry(identity(&item.node)) {
            hash_map::Entry::Occupied(_) => continue,
            hash_map::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&item.node));
            }
        }
        visit(table, ctx, item, |pending| queue.push_back(pending))?;
    }
    Ok(())
}

/// Traversal over `workers` scoped threads sharing one queue.
///
/// The first error closes the queue. Items already running finish, nothing
/// else is dequeued. A panic in a worker closes the queue the same way and is
/// re-raised once every worker has joined.
pub(crate) fn run_parallel(
    table: &Table,
    root: &Node,
    ctx: &ValidationContext,
    workers: NonZeroUsize,
) -> Result<(), ValidateError> {
    let visited: DashMap<usize, Node> = DashMap::new();
    let failure: Mutex<Option<ValidateError>> = Mutex::new(None);
    let queue = WorkQueue::new();
    queue.push(Pending::root(root));

    let claim = |node: &Node| match visited.entry(identity(node)) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(Arc::clone(node));
            true
        }
    };

    let work = || {
        while let Some((item, _done)) = queue.next() {
            let outcome = if ctx.is_cancelled() {
                Err(cancelled())
            } else if claim(&item.node) {
                visit(table, ctx, item, |pending| {
                    queue.push(pending);
                })
            } else {
                Ok(())
            };
            if let Err(error) = outcome {
                failure.lock().get_or_insert(error);
                queue.close();
            }
        }
    };

    thread::scope(|s| {
        for _ in 0..workers.get() {
            s.spawn(&work);
        }
        queue.wait_idle();
        queue.close();
    });

    match failure.into_inner() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Processes one claimed item: callbacks, constraints, then descent.
fn visit(
    table: &Table,
    ctx: &ValidationContext,
    item: Pending,
    mut enqueue: impl FnMut(Pending),
) -> Result<(), ValidateError> {
    ctx.item_visited(&item.node);

    let type_id = runtime_type(&item.node);
    let Some(descriptor) = table.get(&type_id) else {
        tracing::warn!(
            ?type_id,
            origin = ?item.origin,
            "instance of an unknown type"
        );
        return ctx.unknown_type(UnknownType {
            instance: item.node,
            type_id,
            origin: item.origin,
        });
    };
    tracing::trace!(type_name = descriptor.name(), "visiting instance");

    for property in descriptor.properties() {
        let value = property.read(&item.node);
        check_property(ctx, descriptor, property, &item.node, &value)?;
        if property.descends() {
            let origin = Origin {
                type_name: descriptor.name(),
                property: Arc::clone(property.shared_name()),
            };
            enqueue_value(&value, &origin, &mut enqueue);
        }
    }
    Ok(())
}

fn check_property(
    ctx: &ValidationContext,
    descriptor: &TypeDescriptor,
    property: &PropertyDescriptor,
    instance: &Node,
    value: &Value,
) -> Result<(), ValidateError> {
    for constraint in property.constraints() {
        for failure in constraint.check(value, ctx.state()) {
            let offending = failure
                .index
                .and_then(|index| value.as_list()?.get(index).cloned())
                .unwrap_or_else(|| value.clone());
            ctx.report(Violation {
                value: offending,
                instance: Arc::clone(instance),
                type_name: descriptor.name(),
                property: Arc::clone(property.shared_name()),
                constraint: Arc::clone(constraint),
                index: failure.index,
                error: failure.error,
            })?;
        }
    }
    Ok(())
}

/// Enqueues every non-null instance held by `value`, flattening lists.
fn enqueue_value(value: &Value, origin: &Origin, enqueue: &mut impl FnMut(Pending)) {
    match value {
        Value::Null => {}
        Value::Item(node) => enqueue(Pending {
            node: Arc::clone(node),
            origin: Some(origin.clone()),
        }),
        Value::List(values) => {
            for element in values {
                enqueue_value(element, origin, enqueue);
            }
        }
    }
}
