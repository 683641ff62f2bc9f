//! Live query subscriptions.
//!
//! Each subscription owns a background task that runs the fetch loop:
//!
//! ```text
//! Idle -> Fetching -> Delivering <-> WaitingForChange -> Fetching ...
//!   \________________________________________________-> Cancelled
//! ```
//!
//! The task leaves `Idle` on the first non-zero demand, registers a change
//! listener for its entity and fetches. Change notifications only mark the
//! subscription dirty and wake the task, so any number of notifications that
//! arrive before the next fetch cost a single fetch. A fetch runs only while
//! demand is outstanding and the result is dirty; each emission spends one
//! unit of demand whatever the snapshot's length.

use crate::error::{Error, Result};
use crate::feed::{ChangeEvent, RegistrationToken};
use crate::live::demand::Demand;
use crate::live::engine::materialize;
use crate::store::RecordStore;
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tidepool_core::{FetchRequest, Model, Record};
use tokio::sync::{mpsc, Notify};
use tokio_stream::Stream;
use tracing::{debug, trace, warn};

/// Where a subscription is in its fetch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubscriptionState {
    /// Created, no demand yet; the store has not been touched.
    Idle = 0,
    /// A fetch is running against the store.
    Fetching = 1,
    /// A snapshot is being handed to the consumer.
    Delivering = 2,
    /// Registered for changes, waiting for a change or for demand.
    WaitingForChange = 3,
    /// Terminal.
    Cancelled = 4,
}

impl SubscriptionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SubscriptionState::Idle,
            1 => SubscriptionState::Fetching,
            2 => SubscriptionState::Delivering,
            3 => SubscriptionState::WaitingForChange,
            _ => SubscriptionState::Cancelled,
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionState::Idle => "idle",
            SubscriptionState::Fetching => "fetching",
            SubscriptionState::Delivering => "delivering",
            SubscriptionState::WaitingForChange => "waiting",
            SubscriptionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// State shared by the handle, the task and (weakly) the change listener.
struct Shared {
    entity: String,
    demand: Demand,
    dirty: AtomicBool,
    cancelled: AtomicBool,
    wake: Notify,
    state: AtomicU8,
    registration: Mutex<Option<RegistrationToken>>,
}

impl Shared {
    fn new(entity: String) -> Self {
        Self {
            entity,
            demand: Demand::new(),
            // the first fetch needs no change notification
            dirty: AtomicBool::new(true),
            cancelled: AtomicBool::new(false),
            wake: Notify::new(),
            state: AtomicU8::new(SubscriptionState::Idle as u8),
            registration: Mutex::new(None),
        }
    }

    fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SubscriptionState) {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        if previous != state as u8 {
            trace!(
                target: "tidepool::live",
                entity = %self.entity,
                from = %SubscriptionState::from_u8(previous),
                to = %state,
                "subscription state"
            );
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        if self.is_cancelled() {
            return;
        }
        self.dirty.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    fn ready_to_fetch(&self) -> bool {
        self.demand.has_demand() && self.dirty.load(Ordering::Acquire)
    }

    /// Register for change notifications unless already cancelled.
    ///
    /// The listener holds only a `Weak`, so the store never keeps the
    /// subscription alive.
    fn register(self: &Arc<Self>, store: &dyn RecordStore) -> bool {
        let mut slot = self.registration.lock();
        if self.is_cancelled() {
            return false;
        }
        let weak: Weak<Shared> = Arc::downgrade(self);
        let token = store.register_change_listener(
            &self.entity,
            Arc::new(move |_event: &ChangeEvent| {
                if let Some(shared) = weak.upgrade() {
                    shared.mark_dirty();
                }
            }),
        );
        *slot = Some(token);
        true
    }

    /// Remove the change listener, if any. Idempotent.
    fn release(&self, store: &dyn RecordStore) {
        if let Some(token) = self.registration.lock().take() {
            store.deregister(token);
        }
    }

    fn cancel(&self, store: &dyn RecordStore) {
        self.cancelled.store(true, Ordering::Release);
        self.release(store);
        self.set_state(SubscriptionState::Cancelled);
        self.wake.notify_one();
    }
}

/// Consumer handle of a live query.
///
/// Emits a fresh snapshot of the query result for every unit of demand,
/// whenever the result may have changed. Receive with [`recv`](Self::recv)
/// or through the [`Stream`] impl. A fetch failure is delivered once as
/// `Err` and ends the subscription.
///
/// Dropping the handle cancels the subscription.
pub struct Subscription<M> {
    shared: Arc<Shared>,
    store: Arc<dyn RecordStore>,
    rx: mpsc::UnboundedReceiver<Result<Vec<M>>>,
    terminated: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Subscription<M> {
    /// Start the fetch loop on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn spawn(store: Arc<dyn RecordStore>, request: FetchRequest) -> Self {
        let shared = Arc::new(Shared::new(request.entity.clone()));
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(run::<M>(
            Arc::clone(&store),
            request,
            Arc::clone(&shared),
            tx,
        ));

        Self {
            shared,
            store,
            rx,
            terminated: false,
            _model: PhantomData,
        }
    }
}

impl<M> Subscription<M> {
    /// Ask for `n` more emissions. Zero is a no-op.
    pub fn request(&self, n: u64) {
        if n == 0 || self.terminated {
            return;
        }
        let total = self.shared.demand.request(n);
        trace!(target: "tidepool::live", entity = %self.shared.entity, demand = total, "demand requested");
        self.shared.wake.notify_one();
    }

    /// Ask for every future emission.
    pub fn request_unlimited(&self) {
        if self.terminated {
            return;
        }
        self.shared.demand.request_unlimited();
        self.shared.wake.notify_one();
    }

    /// Stop the subscription.
    ///
    /// Nothing is received after this returns, and the store-side listener
    /// is already removed.
    pub fn cancel(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.shared.cancel(self.store.as_ref());
        self.rx.close();
        debug!(target: "tidepool::live", entity = %self.shared.entity, "subscription cancelled");
    }

    /// Next snapshot, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<Result<Vec<M>>> {
        if self.terminated {
            return None;
        }
        let item = self.rx.recv().await;
        self.after_receive(&item);
        item
    }

    fn after_receive(&mut self, item: &Option<Result<Vec<M>>>) {
        match item {
            Some(Ok(_)) => {}
            Some(Err(_)) | None => self.terminated = true,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        if self.terminated {
            SubscriptionState::Cancelled
        } else {
            self.shared.state()
        }
    }

    /// Demand not yet spent by an emission.
    pub fn pending_demand(&self) -> u64 {
        self.shared.demand.pending()
    }

    /// Entity the subscription is bound to.
    pub fn entity(&self) -> &str {
        &self.shared.entity
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<M> Unpin for Subscription<M> {}

impl<M> Stream for Subscription<M> {
    type Item = Result<Vec<M>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(item) => {
                this.after_receive(&item);
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("entity", &self.shared.entity)
            .field("state", &self.state())
            .field("pending_demand", &self.pending_demand())
            .finish()
    }
}

async fn run<M: Model>(
    store: Arc<dyn RecordStore>,
    request: FetchRequest,
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Result<Vec<M>>>,
) {
    // Idle until the first demand
    while !shared.is_cancelled() && !shared.demand.has_demand() {
        shared.wake.notified().await;
    }

    if shared.register(store.as_ref()) {
        fetch_loop(&store, &request, &shared, &tx).await;
    }

    shared.release(store.as_ref());
    shared.set_state(SubscriptionState::Cancelled);
}

async fn fetch_loop<M: Model>(
    store: &Arc<dyn RecordStore>,
    request: &FetchRequest,
    shared: &Shared,
    tx: &mpsc::UnboundedSender<Result<Vec<M>>>,
) {
    loop {
        if shared.is_cancelled() {
            return;
        }
        if !shared.ready_to_fetch() {
            shared.set_state(SubscriptionState::WaitingForChange);
            shared.wake.notified().await;
            continue;
        }

        // Changes that land during the fetch set the flag again.
        shared.dirty.store(false, Ordering::Release);
        shared.set_state(SubscriptionState::Fetching);
        let result = fetch_blocking(store, request).await;
        if shared.is_cancelled() {
            return;
        }

        match result {
            Ok(records) => {
                let snapshot = materialize::<M>(records);
                shared.set_state(SubscriptionState::Delivering);
                if !shared.demand.try_consume() {
                    shared.dirty.store(true, Ordering::Release);
                    continue;
                }
                debug!(
                    target: "tidepool::live",
                    entity = %request.entity,
                    len = snapshot.len(),
                    "delivering snapshot"
                );
                if tx.send(Ok(snapshot)).is_err() {
                    // consumer went away
                    return;
                }
            }
            Err(e) => {
                warn!(
                    target: "tidepool::live",
                    entity = %request.entity,
                    error = %e,
                    "fetch failed, ending subscription"
                );
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

/// Run a fetch on the blocking pool; store reads do disk I/O under the
/// store's context lock.
async fn fetch_blocking(
    store: &Arc<dyn RecordStore>,
    request: &FetchRequest,
) -> Result<Vec<Record>> {
    let store = Arc::clone(store);
    let request = request.clone();
    tokio::task::spawn_blocking(move || store.fetch(&request))
        .await
        .unwrap_or_else(|e| Err(Error::Fetch(format!("fetch task failed: {e}"))))
}
