//! Completion-tracked work queue shared by parallel discovery and traversal.
//!
//! Every pushed item counts as outstanding until the [`Completion`] handed out
//! with it by [`WorkQueue::next`] is dropped. Workers block in `next` while the
//! queue is empty but work is still outstanding, since an in-flight item may
//! push more. Once nothing is outstanding, or the queue is closed, `next`
//! returns `None` and every worker drains out.
//!
//! A worker that panics mid-item closes the queue while unwinding, so the
//! coordinator and the other workers are released and the panic reaches the
//! scope that spawned them.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

pub(crate) struct WorkQueue<T> {
    inner: Mutex<QueueInner<T>>,
    changed: Condvar,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    outstanding: usize,
    closed: bool,
}

impl<T> WorkQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                outstanding: 0,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Enqueues an item. Returns `false` once the queue is closed.
    pub(crate) fn push(&self, item: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.items.push_back(item);
        inner.outstanding += 1;
        // `wait_idle` shares the condvar, so a single wakeup could miss every worker.
        self.changed.notify_all();
        true
    }

    /// Blocks until an item is available or the queue is done.
    ///
    /// The item stays outstanding until the returned [`Completion`] drops.
    pub(crate) fn next(&self) -> Option<(T, Completion<'_, T>)> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(item) = inner.items.pop_front() {
                return Some((item, Completion { queue: self }));
            }
            if inner.outstanding == 0 {
                return None;
            }
            self.changed.wait(&mut inner);
        }
    }

    fn complete(&self) {
        let mut inner = self.inner.lock();
        inner.outstanding = inner.outstanding.saturating_sub(1);
        if inner.outstanding == 0 {
            self.changed.notify_all();
        }
    }

    /// Drops pending items and releases every waiter.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.items.clear();
        self.changed.notify_all();
    }

    /// Blocks until no work is outstanding or the queue is closed.
    pub(crate) fn wait_idle(&self) {
        let mut inner = self.inner.lock();
        while inner.outstanding > 0 && !inner.closed {
            self.changed.wait(&mut inner);
        }
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        self.inner.lock().outstanding
    }
}

/// Marks one dequeued item as finished when dropped.
pub(crate) struct Completion<'q, T> {
    queue: &'q WorkQueue<T>,
}

impl<T> Drop for Completion<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.queue.close();
        }
        self.queue.complete();
    }
}
