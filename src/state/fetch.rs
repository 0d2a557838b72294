use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// The outcome of the most recent request made through one screen slot.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    /// Nothing has been requested yet.
    Idle,
    Loading,
    Success(T),
    Error(String),
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        FetchState::Idle
    }
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            FetchState::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Identifies one request issued through a [`FetchSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// A single observable [`FetchState`] with last-issued-wins ordering.
///
/// [`begin`](FetchSlot::begin) moves the slot to `Loading` before it
/// returns and hands out a ticket. [`resolve`](FetchSlot::resolve) only
/// applies a result whose ticket is the most recently issued one; results
/// of superseded requests are dropped however late they arrive.
pub struct FetchSlot<T> {
    name: &'static str,
    state: watch::Sender<FetchState<T>>,
    issued: AtomicU64,
}

impl<T> std::fmt::Debug for FetchSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchSlot")
            .field("name", &self.name)
            .field("issued", &self.issued.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T> FetchSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(FetchState::Idle);
        FetchSlot {
            name,
            state,
            issued: AtomicU64::new(0),
        }
    }

    /// Issues a new request: the slot reads `Loading` from here on.
    pub fn begin(&self) -> Ticket {
        self.transition(FetchState::Loading)
    }

    /// Issues a new request and immediately fails it, e.g. on input that
    /// never reaches the network.
    pub fn fail(&self, message: impl Into<String>) {
        self.transition(FetchState::Error(message.into()));
    }

    /// Back to `Idle`, discarding whatever is in flight.
    pub fn reset(&self) {
        self.transition(FetchState::Idle);
    }

    // The counter is only advanced inside the watch lock, so a ticket
    // comparison in `resolve` never interleaves with a new `begin`.
    fn transition(&self, next: FetchState<T>) -> Ticket {
        let mut ticket = Ticket(0);
        self.state.send_modify(|state| {
            ticket = Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1);
            *state = next;
        });
        ticket
    }

    /// Applies the result of the request identified by `ticket`. Returns
    /// `false` when a newer request has been issued since.
    pub fn resolve(&self, ticket: Ticket, result: Result<T, String>) -> bool {
        self.state.send_if_modified(|state| {
            let latest = self.issued.load(Ordering::SeqCst);
            if ticket.0 != latest {
                debug!(
                    slot = self.name,
                    ticket = ticket.0,
                    latest,
                    "dropping superseded fetch result"
                );
                return false;
            }
            *state = match result {
                Ok(value) => FetchState::Success(value),
                Err(message) => {
                    warn!(slot = self.name, %message, "fetch failed");
                    FetchState::Error(message)
                }
            };
            true
        })
    }

    /// Begins a request and runs `fetch` on `scope`, resolving the slot
    /// with its outcome.
    pub fn load<F, E>(self: &Arc<Self>, scope: &TaskScope, fetch: F) -> Ticket
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        let ticket = self.begin();
        let slot = Arc::clone(self);
        scope.spawn(async move {
            let result = fetch.await.map_err(|e| e.to_string());
            slot.resolve(ticket, result);
        });
        ticket
    }

    pub fn current(&self) -> FetchState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.state.subscribe()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The tasks owned by one screen.
///
/// Dropping the scope aborts every task still running; an aborted fetch
/// never reaches its slot.
pub struct TaskScope {
    handle: Handle,
    tasks: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for TaskScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScope")
            .field("running", &self.lock().len())
            .finish()
    }
}

impl TaskScope {
    pub fn new(handle: Handle) -> Self {
        TaskScope {
            handle,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        lock(&self.tasks)
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(task, &self.handle);
    }

    /// Waits for every task spawned so far.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.lock());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!(error = %e, "screen task panicked");
                }
            }
        }
    }

    /// Aborts every running task.
    pub fn cancel(&self) {
        self.lock().abort_all();
    }
}
