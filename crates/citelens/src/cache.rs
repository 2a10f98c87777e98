//! Keyed cache that never runs the same computation twice at once.
//!
//! Each slot is either `Ready` with a value or `InFlight` with a shared
//! future. A caller that finds an in-flight slot awaits the same future
//! instead of starting another one. Failures are handed to every waiter and
//! leave the slot empty.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::document::DocumentId;
use crate::error::Error;

/// `page` is `None` for entries that cover the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub document: DocumentId,
    pub page: Option<usize>,
}

impl CacheKey {
    pub fn document(document: DocumentId) -> Self {
        Self {
            document,
            page: None,
        }
    }

    pub fn page(document: DocumentId, page: usize) -> Self {
        Self {
            document,
            page: Some(page),
        }
    }
}

type Pending<V> = Shared<BoxFuture<'static, Result<V, Error>>>;

enum Slot<V> {
    Ready(V),
    InFlight { ticket: u64, future: Pending<V> },
}

pub struct InFlightCache<V> {
    slots: Mutex<HashMap<CacheKey, Slot<V>>>,
    tickets: AtomicU64,
}

impl<V> Default for InFlightCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            tickets: AtomicU64::new(0),
        }
    }
}

impl<V> InFlightCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value for `key`, computing it with `compute` unless it is cached or
    /// already being computed.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Result<V, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        let (ticket, future) = {
            let mut slots = self.slots();
            match slots.get(&key) {
                Some(Slot::Ready(value)) => return Ok(value.clone()),
                Some(Slot::InFlight { ticket, future }) => (*ticket, future.clone()),
                None => {
                    let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                    let future = compute().boxed().shared();
                    log::debug!("cache miss for {:?}, computing (ticket {ticket})", key);
                    slots.insert(
                        key.clone(),
                        Slot::InFlight {
                            ticket,
                            future: future.clone(),
                        },
                    );
                    (ticket, future)
                }
            }
        };

        let result = future.await;

        // Only the computation that still owns the slot may settle it; an
        // evicted or replaced slot is left alone.
        let mut slots = self.slots();
        if let Some(Slot::InFlight { ticket: current, .. }) = slots.get(&key) {
            if *current == ticket {
                match &result {
                    Ok(value) => {
                        slots.insert(key, Slot::Ready(value.clone()));
                    }
                    Err(_) => {
                        slots.remove(&key);
                    }
                }
            }
        }

        result
    }

    /// Drop every entry belonging to `document`, finished or not.
    pub fn evict(&self, document: &DocumentId) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| &key.document != document);
        let evicted = before - slots.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} cache entries for document {document}");
        }
        evicted
    }

    pub fn is_ready(&self, key: &CacheKey) -> bool {
        matches!(self.slots().get(key), Some(Slot::Ready(_)))
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
