//! Kernel registry.
//!
//! Each algorithm moves through `Uninitialized -> Loading -> Ready` exactly
//! once. The first lookup starts the loader; lookups that arrive while the
//! module is loading queue behind it and all resolve to the same [`Scheme`]
//! when it becomes ready. Ready lookups never suspend.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use sigil_core::Kernel;
use sigil_soft::ArenaConfig;

use crate::descriptor::{self, AlgorithmDescriptor, ALGORITHMS};
use crate::loader::{KernelLoader, SoftLoader};
use crate::scheme::Scheme;

static GLOBAL: Lazy<Registry> = Lazy::new(|| Registry::new(ALGORITHMS, SoftLoader::default()));

/// Observable lifecycle of one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Never requested.
    Uninitialized,
    /// Module instantiation in flight.
    Loading,
    /// Instance available.
    Ready,
}

enum Slot {
    Uninitialized,
    /// One waker slot per outstanding pending handle.
    Loading { waiters: Vec<Option<Waker>> },
    Ready(Arc<Scheme>),
}

struct Entry {
    descriptor: &'static AlgorithmDescriptor,
    slot: Mutex<Slot>,
    loads: AtomicUsize,
}

impl Entry {
    fn new(descriptor: &'static AlgorithmDescriptor) -> Self {
        Self {
            descriptor,
            slot: Mutex::new(Slot::Uninitialized),
            loads: AtomicUsize::new(0),
        }
    }

    fn complete(&self, kernel: Box<dyn Kernel>) {
        let scheme = Arc::new(Scheme::new(self.descriptor.id, kernel));
        let previous = std::mem::replace(&mut *self.slot.lock(), Slot::Ready(scheme));

        let waiters = match previous {
            Slot::Loading { waiters } => waiters,
            Slot::Uninitialized | Slot::Ready(_) => {
                tracing::warn!(algid = self.descriptor.id, "unexpected ready notification");
                Vec::new()
            }
        };
        tracing::info!(
            algid = self.descriptor.id,
            waiters = waiters.len(),
            "kernel ready"
        );
        for waker in waiters.into_iter().flatten() {
            waker.wake();
        }
    }
}

/// Lazily loaded, memoized kernel instances keyed by algorithm identifier.
pub struct Registry {
    table: &'static [AlgorithmDescriptor],
    entries: Vec<Arc<Entry>>,
    loader: Box<dyn KernelLoader>,
}

impl Registry {
    /// Registry over `table` that instantiates modules through `loader`.
    pub fn new(table: &'static [AlgorithmDescriptor], loader: impl KernelLoader + 'static) -> Self {
        Self {
            table,
            entries: table.iter().map(|d| Arc::new(Entry::new(d))).collect(),
            loader: Box::new(loader),
        }
    }

    /// Registry over the built-in algorithms with a custom memory layout.
    pub fn with_config(config: ArenaConfig) -> Self {
        Self::new(ALGORITHMS, SoftLoader::with_config(config))
    }

    /// Process-wide registry over the built-in algorithms.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Algorithm identifiers in table order.
    pub fn algorithms(&self) -> Vec<&'static str> {
        self.table.iter().map(|d| d.id).collect()
    }

    /// Current lifecycle state of `id`, or `None` for an unknown identifier.
    pub fn state(&self, id: &str) -> Option<State> {
        let entry = self.entry(id)?;
        let state = match &*entry.slot.lock() {
            Slot::Uninitialized => State::Uninitialized,
            Slot::Loading { .. } => State::Loading,
            Slot::Ready(_) => State::Ready,
        };
        Some(state)
    }

    /// Number of instantiation cycles started for `id`.
    pub fn load_count(&self, id: &str) -> usize {
        self.entry(id)
            .map_or(0, |entry| entry.loads.load(Ordering::Acquire))
    }

    /// Look up `id`.
    ///
    /// Returns `None` for an unknown identifier without suspending. The first
    /// lookup of a known identifier starts loading its module.
    pub fn get(&self, id: &str) -> Option<Lookup> {
        let entry = self.entry(id)?;
        {
            let mut slot = entry.slot.lock();
            match &mut *slot {
                Slot::Ready(scheme) => return Some(Lookup::Ready(Arc::clone(scheme))),
                Slot::Loading { waiters } => {
                    waiters.push(None);
                    let ticket = waiters.len() - 1;
                    return Some(Lookup::Pending(PendingScheme::new(entry, ticket)));
                }
                Slot::Uninitialized => {}
            }
            *slot = Slot::Loading {
                waiters: vec![None],
            };
        }

        // The lock is released before the loader runs; it may call back inline.
        entry.loads.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(algid = entry.descriptor.id, "loading kernel");
        let pending = PendingScheme::new(entry, 0);
        let target = Arc::clone(entry);
        self.loader
            .load(entry.descriptor, Box::new(move |kernel: Box<dyn Kernel>| target.complete(kernel)));
        Some(Lookup::Pending(pending))
    }

    /// Resolve `id` to its instance, waiting for the module if necessary.
    pub async fn instance(&self, id: &str) -> Option<Arc<Scheme>> {
        Some(self.get(id)?.resolve().await)
    }

    fn entry(&self, id: &str) -> Option<&Arc<Entry>> {
        let descriptor = descriptor::find(self.table, id)?;
        self.entries
            .iter()
            .find(|entry| std::ptr::eq(entry.descriptor, descriptor))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("algorithms", &self.algorithms())
            .finish_non_exhaustive()
    }
}

/// Outcome of a registry lookup for a known algorithm.
#[derive(Debug)]
pub enum Lookup {
    /// The instance was already loaded.
    Ready(Arc<Scheme>),
    /// The module is still loading.
    Pending(PendingScheme),
}

impl Lookup {
    /// The instance, if it was ready at lookup time.
    pub fn ready(self) -> Option<Arc<Scheme>> {
        match self {
            Lookup::Ready(scheme) => Some(scheme),
            Lookup::Pending(_) => None,
        }
    }

    /// Wait for the instance.
    pub async fn resolve(self) -> Arc<Scheme> {
        match self {
            Lookup::Ready(scheme) => scheme,
            Lookup::Pending(pending) => pending.await,
        }
    }
}

/// Handle queued behind an in-flight module load.
///
/// Completes with the shared instance once loading finishes. There is no
/// cancellation; dropping the handle only gives up this caller's place.
pub struct PendingScheme {
    entry: Arc<Entry>,
    ticket: usize,
}

impl PendingScheme {
    fn new(entry: &Arc<Entry>, ticket: usize) -> Self {
        Self {
            entry: Arc::clone(entry),
            ticket,
        }
    }

    /// Algorithm this handle waits for.
    pub fn algid(&self) -> &'static str {
        self.entry.descriptor.id
    }
}

impl Future for PendingScheme {
    type Output = Arc<Scheme>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.entry.slot.lock();
        match &mut *slot {
            Slot::Ready(scheme) => Poll::Ready(Arc::clone(scheme)),
            Slot::Loading { waiters } => {
                if let Some(waiter) = waiters.get_mut(self.ticket) {
                    match waiter {
                        Some(waker) if waker.will_wake(cx.waker()) => {}
                        _ => *waiter = Some(cx.waker().clone()),
                    }
                }
                Poll::Pending
            }
            // Pending handles are only issued once the slot is Loading.
            Slot::Uninitialized => Poll::Pending,
        }
    }
}

impl Drop for PendingScheme {
    fn drop(&mut self) {
        if let Slot::Loading { waiters } = &mut *self.entry.slot.lock() {
            if let Some(waiter) = waiters.get_mut(self.ticket) {
                *waiter = None;
            }
        }
    }
}

impl std::fmt::Debug for PendingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingScheme")
            .field("algid", &self.algid())
            .field("ticket", &self.ticket)
            .finish()
    }
}
