//! Optimistic mutation coordinator.
//!
//! A mutation is applied to the local collection and published before the
//! remote call is made; the remote result then confirms it (optionally
//! replacing the entity with the server's canonical copy) or rolls the
//! entity back to the snapshot taken just before the mutation.
//!
//! Ordering rules:
//! - mutations on the same entity run one at a time, in call order; the
//!   second is not applied until the first is confirmed or rolled back;
//! - every write to an entity bumps its version, and a rollback only lands
//!   if the version is still the one the mutation produced;
//! - [`OptimisticStore::reset`] and [`OptimisticStore::invalidate`] start a
//!   new epoch; results of calls started in an older epoch are still awaited
//!   and never confirm anything. A failure is still rolled back when nothing
//!   has written the entity since, so a rejected change is never kept.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, OwnedMutexGuard};
use tracing::{debug, info};

use taskboard_api::Task;
use taskboard_api_client::ApiError;

/// Anything the coordinator can track: identifiable and comparable.
pub trait Entity: Clone + PartialEq + Send + Sync + 'static {
    type Id: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

impl Entity for Task {
    type Id = taskboard_api::TaskId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// What a failed remote call means for the user.
pub trait MutationFailure: std::fmt::Display {
    /// Set when the failure ended the session and the UI should navigate.
    fn redirect(&self) -> Option<&'static str> {
        None
    }
}

impl MutationFailure for ApiError {
    fn redirect(&self) -> Option<&'static str> {
        ApiError::redirect(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("no entity with id {0}")]
    UnknownEntity(String),

    /// The remote call failed; the entity was rolled back unless a newer
    /// write had already replaced it.
    #[error("remote update failed: {message}")]
    RemoteMutationFailed { message: String },

    #[error("session expired, sign in again")]
    SessionExpired { redirect_to: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<T> {
    /// The server accepted the change; holds the entity as now published.
    Confirmed(T),
    /// The view moved on while the call was in flight; nothing was applied.
    Discarded,
}

struct Inner<T: Entity> {
    items: Vec<T>,
    /// Stamp of the last write per entity, drawn from `clock`.
    versions: HashMap<T::Id, u64>,
    clock: u64,
    epoch: u64,
}

impl<T: Entity> Inner<T> {
    fn position(&self, id: &T::Id) -> Option<usize> {
        self.items.iter().position(|item| &item.id() == id)
    }

    fn bump(&mut self, id: &T::Id) -> u64 {
        self.clock += 1;
        self.versions.insert(id.clone(), self.clock);
        self.clock
    }

    fn version(&self, id: &T::Id) -> u64 {
        self.versions.get(id).copied().unwrap_or(0)
    }
}

type Queues<Id> = Mutex<HashMap<Id, Arc<tokio::sync::Mutex<()>>>>;

pub struct OptimisticStore<T: Entity> {
    inner: Mutex<Inner<T>>,
    published: watch::Sender<Vec<T>>,
    queues: Queues<T::Id>,
}

/// Holds an entity's queue for one mutation; the queue entry is dropped
/// once nobody else holds or waits on it.
struct Turn<'a, Id: Eq + Hash> {
    queues: &'a Queues<Id>,
    id: Id,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<Id: Eq + Hash> Drop for Turn<'_, Id> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        if queues
            .get(&self.id)
            .is_some_and(|queue| Arc::strong_count(queue) == 1)
        {
            queues.remove(&self.id);
        }
    }
}

impl<T: Entity> OptimisticStore<T> {
    pub fn new(items: Vec<T>) -> Self {
        let (published, _) = watch::channel(items.clone());
        Self {
            inner: Mutex::new(Inner {
                items,
                versions: HashMap::new(),
                clock: 0,
                epoch: 0,
            }),
            published,
            queues: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner<T>) {
        self.published.send_replace(inner.items.clone());
    }

    /// Receiver that sees every published state.
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.published.subscribe()
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn get(&self, id: &T::Id) -> Option<T> {
        let inner = self.lock();
        inner.position(id).map(|i| inner.items[i].clone())
    }

    /// Replace the whole collection (fresh load) and start a new epoch.
    pub fn reset(&self, items: Vec<T>) {
        let mut inner = self.lock();
        inner.items = items;
        inner.versions.clear();
        inner.epoch += 1;
        self.publish(&inner);
    }

    /// Start a new epoch without touching the items, e.g. when the view
    /// showing them is closed.
    pub fn invalidate(&self) {
        self.lock().epoch += 1;
    }

    /// Insert or replace an entity with an authoritative copy. Returns
    /// false, without publishing, when the stored copy is already equal.
    pub fn upsert(&self, entity: T) -> bool {
        let mut inner = self.lock();
        let id = entity.id();
        match inner.position(&id) {
            Some(i) if inner.items[i] == entity => return false,
            Some(i) => inner.items[i] = entity,
            None => inner.items.push(entity),
        }
        inner.bump(&id);
        self.publish(&inner);
        true
    }

    /// Record a server-confirmed copy of an entity. Idempotent: confirming
    /// the same copy again changes nothing.
    pub fn confirm(&self, canonical: T) -> bool {
        self.upsert(canonical)
    }

    pub fn remove(&self, id: &T::Id) -> Option<T> {
        let mut inner = self.lock();
        let i = inner.position(id)?;
        let removed = inner.items.remove(i);
        inner.bump(id);
        self.publish(&inner);
        Some(removed)
    }

    async fn take_turn(&self, id: &T::Id) -> Turn<'_, T::Id> {
        // Declared first so a cancelled wait releases `queue` before pruning.
        let mut turn = Turn {
            queues: &self.queues,
            id: id.clone(),
            guard: None,
        };
        let queue = {
            let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            queues.entry(id.clone()).or_default().clone()
        };
        turn.guard = Some(queue.lock_owned().await);
        turn
    }

    #[cfg(test)]
    fn queued_entities(&self) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Apply `mutation` to entity `id` now, then run `remote`.
    ///
    /// `remote` resolves to `Ok(Some(entity))` when the server returned the
    /// canonical copy, `Ok(None)` when it only acknowledged the change. On
    /// error the entity is restored to its pre-mutation snapshot; nothing is
    /// retried.
    pub async fn apply_optimistic<M, F, Fut, E>(
        &self,
        id: &T::Id,
        mutation: M,
        remote: F,
    ) -> Result<MutationOutcome<T>, MutationError>
    where
        M: FnOnce(&mut T),
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: MutationFailure,
    {
        let _turn = self.take_turn(id).await;

        let (snapshot, version, epoch) = {
            let mut inner = self.lock();
            let Some(i) = inner.position(id) else {
                return Err(MutationError::UnknownEntity(format!("{id:?}")));
            };
            let snapshot = inner.items[i].clone();
            mutation(&mut inner.items[i]);
            let version = inner.bump(id);
            self.publish(&inner);
            (snapshot, version, inner.epoch)
        };

        let result = remote().await;

        let mut inner = self.lock();
        let current_epoch = inner.epoch == epoch;
        if !current_epoch {
            debug!(?id, "view changed during remote call, result will not confirm");
        }

        match result {
            Ok(_) if !current_epoch => Ok(MutationOutcome::Discarded),
            Ok(canonical) => {
                let current = inner.position(id);
                if let (Some(i), Some(canonical)) = (current, canonical) {
                    if inner.items[i] != canonical && canonical.id() == *id {
                        inner.items[i] = canonical;
                        inner.bump(id);
                        self.publish(&inner);
                    }
                }
                match inner.position(id) {
                    Some(i) => Ok(MutationOutcome::Confirmed(inner.items[i].clone())),
                    None => Ok(MutationOutcome::Discarded),
                }
            }
            Err(e) => {
                if inner.version(id) == version {
                    if let Some(i) = inner.position(id) {
                        inner.items[i] = snapshot;
                        inner.bump(id);
                        self.publish(&inner);
                        info!(?id, "remote update failed, rolled back: {e}");
                    }
                } else {
                    debug!(?id, "newer write landed, skipping rollback");
                }
                Err(failure(&e))
            }
        }
    }
}

fn failure<E: MutationFailure>(e: &E) -> MutationError {
    match e.redirect() {
        Some(redirect_to) => MutationError::SessionExpired { redirect_to },
        None => MutationError::RemoteMutationFailed {
            message: e.to_string(),
        },
    }
}
