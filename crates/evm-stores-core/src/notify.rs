use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::chain::ChainRegistry;
use crate::domain::ConnectionSnapshot;
use crate::view::DerivedView;

pub type Observer = Arc<dyn Fn(&DerivedView) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    // revision + 1 of the last delivered snapshot, 0 before the first one
    seen: AtomicU64,
    observer: Observer,
}

pub(crate) struct Notifier {
    chains: Arc<ChainRegistry>,
    watch: watch::Sender<ConnectionSnapshot>,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl Notifier {
    pub(crate) fn new(chains: Arc<ChainRegistry>, initial: ConnectionSnapshot) -> Self {
        let (watch, _) = watch::channel(initial);
        Self {
            chains,
            watch,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn chains(&self) -> &Arc<ChainRegistry> {
        &self.chains
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.watch.subscribe()
    }

    /// Registers `observer` and immediately hands it `current`.
    pub(crate) fn subscribe(
        &self,
        store: &str,
        observer: Observer,
        current: ConnectionSnapshot,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Arc::new(Subscriber {
            id,
            seen: AtomicU64::new(0),
            observer,
        });
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&subscriber));
        let view = DerivedView::new(current, Arc::clone(&self.chains));
        deliver(store, &subscriber, &view);
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Must be called after the mutation is applied and the state lock is
    /// released. Older revisions than what an observer already saw are
    /// dropped.
    pub(crate) fn publish(&self, store: &str, snapshot: ConnectionSnapshot) {
        let revision = snapshot.revision;
        self.watch.send_if_modified(|current| {
            if snapshot.revision > current.revision {
                *current = snapshot.clone();
                true
            } else {
                false
            }
        });

        let subscribers: Vec<Arc<Subscriber>> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if subscribers.is_empty() {
            return;
        }
        let view = DerivedView::new(snapshot, Arc::clone(&self.chains));
        for subscriber in &subscribers {
            deliver(store, subscriber, &view);
        }
        tracing::trace!(store, revision, observers = subscribers.len(), "published");
    }
}

fn deliver(store: &str, subscriber: &Subscriber, view: &DerivedView) {
    let mark = view.snapshot().revision.saturating_add(1);
    if subscriber.seen.fetch_max(mark, Ordering::AcqRel) >= mark {
        return;
    }
    if catch_unwind(AssertUnwindSafe(|| (subscriber.observer)(view))).is_err() {
        tracing::error!(
            store,
            subscription = subscriber.id.0,
            revision = view.snapshot().revision,
            "observer panicked; notification skipped"
        );
    }
}
