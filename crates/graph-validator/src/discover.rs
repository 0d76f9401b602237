//! Type graph discovery.
//!
//! Starting from the declared roots, discovery walks the property-type edges
//! that descend and compiles a [`TypeDescriptor`] for every type it reaches.
//! Each type is claimed before it is enqueued, so it is compiled at most once
//! and the walk terminates on recursive schemas.

use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::thread;

use dashmap::DashSet;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::compile::{Schema, TypeDescriptor};
use crate::error::BuildError;
use crate::options::BuildMode;
use crate::pool::WorkQueue;
use crate::reflect::TypeRef;

/// The compiled table keyed by type identity.
pub(crate) type Table = HashMap<TypeId, TypeDescriptor>;

/// Discovers and compiles every type reachable from `roots`.
pub(crate) fn discover(
    schema: Schema<'_>,
    roots: &[TypeRef],
    mode: BuildMode,
    cancellation: Option<&CancellationToken>,
) -> Result<Table, BuildError> {
    match mode {
        BuildMode::Sequential => {
            let mut table = Table::new();
            walk(schema, roots, cancellation, |id, descriptor| {
                table.insert(id, descriptor);
            })?;
            Ok(table)
        }
        BuildMode::Locked => {
            let table = Mutex::new(Table::new());
            walk(schema, roots, cancellation, |id, descriptor| {
                table.lock().insert(id, descriptor);
            })?;
            Ok(table.into_inner())
        }
        BuildMode::Parallel { workers } => parallel(schema, roots, workers, cancellation),
    }
}

fn check_cancelled(cancellation: Option<&CancellationToken>) -> Result<(), BuildError> {
    if cancellation.is_some_and(CancellationToken::is_cancelled) {
        tracing::warn!("validator build cancelled");
        return Err(BuildError::Cancelled);
    }
    Ok(())
}

/// Single-threaded breadth-first walk. `store` receives each compiled type.
fn walk(
    schema: Schema<'_>,
    roots: &[TypeRef],
    cancellation: Option<&CancellationToken>,
    mut store: impl FnMut(TypeId, TypeDescriptor),
) -> Result<(), BuildError> {
    let mut claimed = HashSet::new();
    let mut frontier: VecDeque<TypeRef> = roots
        .iter()
        .copied()
        .filter(|root| claimed.insert(root.id()))
        .collect();

    while let Some(ty) = frontier.pop_front() {
        check_cancelled(cancellation)?;
        let descriptor = schema.compile_type(ty)?;
        for target in descriptor.descend_targets() {
            if claimed.insert(target.id()) {
                frontier.push_back(target);
            }
        }
        store(ty.id(), descriptor);
    }
    Ok(())
}

/// Worker-pool walk. The first error closes the queue and wins.
fn parallel(
    schema: Schema<'_>,
    roots: &[TypeRef],
    workers: NonZeroUsize,
    cancellation: Option<&CancellationToken>,
) -> Result<Table, BuildError> {
    let claimed = DashSet::new();
    let table = Mutex::new(Table::new());
    let failure: Mutex<Option<BuildError>> = Mutex::new(None);
    let queue = WorkQueue::new();

    for root in roots {
        if claimed.insert(root.id()) {
            queue.push(*root);
        }
    }

    let work = || {
        while let Some((ty, _done)) = queue.next() {
            let compiled =
                check_cancelled(cancellation).and_then(|()| schema.compile_type(ty));
            match compiled {
                Ok(descriptor) => {
                    for target in descriptor.descend_targets() {
                        if claimed.insert(target.id()) {
                            queue.push(target);
                        }
                    }
                    table.lock().insert(ty.id(), descriptor);
                }
                Err(error) => {
                    failure.lock().get_or_insert(error);
                    queue.close();
                }
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
        None => Ok(table.into_inner()),
    }
}
