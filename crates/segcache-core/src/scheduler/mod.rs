//! Per-resource request scheduler.
//!
//! A `RequestScheduler` turns byte-range requests into fetch operations, runs
//! them on the Tokio runtime with optional bounded parallelism, and relays
//! their lifecycle to one listener. Operations live in an arena keyed by
//! [`OperationId`]; they report back over a channel to a single dispatcher
//! task that owns the listener, so nothing holds a pointer back to the
//! scheduler.
//!
//! Muting: an event is delivered only while its operation is registered.
//! `cancel_loading_request` unregisters an operation outright, so nothing is
//! delivered for it afterwards. `cancel` moves operations to a draining set
//! that only lets the terminal callback through.

mod dispatch;
mod listener;
mod operation;
mod state;


pub use listener::SchedulerListener;
pub use operation::OperationId;
pub use state::OperationState;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::fetcher::{FetchRequest, SegmentFetcher};
use operation::{Envelope, FetchOperation};

/// Terminal states kept for `state_of` after an operation is gone.
const FINISHED_HISTORY: usize = 64;

struct Slot<R> {
    request: R,
    range: Range<u64>,
    cancel: CancellationToken,
}

/// Operation bookkeeping shared between the scheduler and its dispatcher.
struct Registry<R> {
    next_id: u64,
    /// Active operations in append order.
    active: BTreeMap<OperationId, Slot<R>>,
    /// Cancelled by `cancel()`, waiting for their terminal callback.
    draining: HashMap<OperationId, R>,
    states: HashMap<OperationId, OperationState>,
    /// Finished operations, oldest first; bounds the terminal entries in `states`.
    finished: VecDeque<OperationId>,
}

impl<R> Registry<R> {
    fn new() -> Self {
        Registry {
            next_id: 1,
            active: BTreeMap::new(),
            draining: HashMap::new(),
            states: HashMap::new(),
            finished: VecDeque::new(),
        }
    }

    fn record_terminal(&mut self, id: OperationId, state: OperationState) {
        debug_assert!(state.is_terminal());
        self.states.insert(id, state);
        self.finished.push_back(id);
        while self.finished.len() > FINISHED_HISTORY {
            if let Some(old) = self.finished.pop_front() {
                self.states.remove(&old);
            }
        }
    }
}

type Shared<R> = Arc<Mutex<Registry<R>>>;

fn lock<R>(shared: &Mutex<Registry<R>>) -> MutexGuard<'_, Registry<R>> {
    // Callbacks never run under this lock, so a poisoned guard still holds consistent maps.
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Scheduler for one (resource, source URL) session.
///
/// `R` is the caller's request token; `cancel_loading_request` finds
/// operations by comparing tokens with `==`.
pub struct RequestScheduler<R> {
    resource_id: String,
    url: String,
    fetcher: Arc<dyn SegmentFetcher>,
    permits: Option<Arc<Semaphore>>,
    runtime: Handle,
    shared: Shared<R>,
    events: mpsc::UnboundedSender<Envelope>,
}

impl<R> RequestScheduler<R>
where
    R: PartialEq + Clone + Send + Sync + 'static,
{
    /// Create a scheduler and spawn its dispatcher, which takes ownership of
    /// `listener`. Must be called from within a Tokio runtime; operations are
    /// spawned on that runtime.
    ///
    /// `max_concurrent`: `None` runs every operation as soon as it is
    /// appended, `Some(n)` runs at most `n` (at least 1) at a time.
    pub fn new<L>(
        resource_id: impl Into<String>,
        url: impl Into<String>,
        fetcher: Arc<dyn SegmentFetcher>,
        max_concurrent: Option<usize>,
        listener: L,
    ) -> Self
    where
        L: SchedulerListener<R>,
    {
        let runtime = Handle::current();
        let shared: Shared<R> = Arc::new(Mutex::new(Registry::new()));
        let (events, rx) = mpsc::unbounded_channel();
        runtime.spawn(dispatch::run_dispatcher(Arc::clone(&shared), rx, listener));
        RequestScheduler {
            resource_id: resource_id.into(),
            url: url.into(),
            fetcher,
            permits: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            runtime,
            shared,
            events,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Register a fetch of `range` for `request` and queue it. Returns immediately.
    pub fn append(&self, range: Range<u64>, request: R) -> OperationId {
        let cancel = CancellationToken::new();
        let id = {
            let mut reg = lock(&self.shared);
            let id = OperationId(reg.next_id);
            reg.next_id += 1;
            reg.states.insert(id, OperationState::Created);
            reg.active.insert(
                id,
                Slot {
                    request,
                    range: range.clone(),
                    cancel: cancel.clone(),
                },
            );
            id
        };

        let op = FetchOperation {
            id,
            request: FetchRequest {
                resource_id: self.resource_id.clone(),
                url: self.url.clone(),
                range: range.clone(),
            },
            cancel,
            permits: self.permits.clone(),
            fetcher: Arc::clone(&self.fetcher),
            events: self.events.clone(),
        };
        // Queued before the task can possibly report Begin.
        lock(&self.shared).states.insert(id, OperationState::Queued);
        self.runtime.spawn(op.run());
        tracing::debug!(op = %id, resource_id = %self.resource_id, ?range, "fetch operation queued");
        id
    }

    /// Cancel and unregister every active operation whose token equals
    /// `request`. Nothing more is delivered for them, not even a terminal
    /// callback. Returns how many operations matched; zero is a no-op.
    pub fn cancel_loading_request(&self, request: &R) -> usize {
        let mut reg = lock(&self.shared);
        let ids: Vec<OperationId> = reg
            .active
            .iter()
            .filter(|(_, slot)| slot.request == *request)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(slot) = reg.active.remove(id) {
                slot.cancel.cancel();
                reg.record_terminal(*id, OperationState::Cancelled);
                tracing::debug!(op = %id, range = ?slot.range, "fetch operation cancelled by request");
            }
        }
        ids.len()
    }

    /// Cancel every active operation, running or still queued. The active set
    /// is empty when this returns; each cancelled operation still reports one
    /// terminal callback (with `FetchError::Cancelled` unless it had already
    /// finished on its own).
    pub fn cancel(&self) {
        let mut reg = lock(&self.shared);
        let drained = std::mem::take(&mut reg.active);
        let count = drained.len();
        for (id, slot) in drained {
            slot.cancel.cancel();
            reg.draining.insert(id, slot.request);
        }
        if count > 0 {
            tracing::debug!(resource_id = %self.resource_id, count, "cancelled all fetch operations");
        }
    }

    /// Number of operations that have not finished and were not cancelled.
    pub fn active_len(&self) -> usize {
        lock(&self.shared).active.len()
    }

    /// Tokens of the active operations, in append order.
    pub fn active_requests(&self) -> Vec<R> {
        lock(&self.shared)
            .active
            .values()
            .map(|slot| slot.request.clone())
            .collect()
    }

    /// Last known state of an operation of this scheduler. Terminal states
    /// are kept only for the most recently finished operations.
    pub fn state_of(&self, id: OperationId) -> Option<OperationState> {
        lock(&self.shared).states.get(&id).copied()
    }
}

impl<R> Drop for RequestScheduler<R> {
    /// Cancels everything silently: no callbacks are delivered after drop.
    fn drop(&mut self) {
        let mut reg = lock(&self.shared);
        for slot in reg.active.values() {
            slot.cancel.cancel();
        }
        reg.active.clear();
        reg.draining.clear();
    }
}
