use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::api::{Backend, Failure, FailureKind};

use super::{CacheEntry, QueryKey, QueryPrefix};

type SharedFetch = Shared<BoxFuture<'static, CacheEntry>>;

struct Slot {
    entry: CacheEntry,
    /// Tag of the request allowed to write `entry`.
    generation: u64,
    in_flight: Option<SharedFetch>,
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<QueryKey, Slot>,
    next_generation: u64,
}

enum Lookup {
    Fresh(CacheEntry),
    Joined(SharedFetch),
    Miss,
}

/// Keyed cache of server resources with request de-duplication.
///
/// Clones share the same state. The lock is only held between awaits.
#[derive(Clone)]
pub struct QueryCache {
    backend: Arc<dyn Backend>,
    state: Arc<Mutex<CacheState>>,
    stale_after: Duration,
}

impl QueryCache {
    pub fn new(backend: Arc<dyn Backend>, stale_after: Duration) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(CacheState::default())),
            stale_after,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        lock_state(&self.state)
    }

    /// Read `key`, going to the network only when needed.
    ///
    /// Never fails: network problems come back as an `Error` entry. Requests
    /// are spawned, so this must run inside a Tokio runtime.
    pub async fn fetch(&self, key: &QueryKey) -> CacheEntry {
        let request = {
            let mut state = self.lock();
            let lookup = match state.slots.get(key) {
                Some(slot) => match &slot.in_flight {
                    Some(request) => Lookup::Joined(request.clone()),
                    None if slot.entry.is_fresh(self.stale_after) => {
                        Lookup::Fresh(slot.entry.clone())
                    }
                    None => Lookup::Miss,
                },
                None => Lookup::Miss,
            };

            match lookup {
                Lookup::Fresh(entry) => {
                    debug!(key = %key, "Cache hit");
                    return entry;
                }
                Lookup::Joined(request) => {
                    debug!(key = %key, "Joining in-flight request");
                    request
                }
                Lookup::Miss => self.start_request(&mut state, key),
            }
        };

        request.await
    }

    /// Invalidate every filter variant of `key`'s page, then fetch `key` again.
    pub async fn refetch(&self, key: &QueryKey) -> CacheEntry {
        self.invalidate(&QueryPrefix {
            resource: key.resource.clone(),
            page: Some(key.page),
        });
        self.fetch(key).await
    }

    fn start_request(&self, state: &mut CacheState, key: &QueryKey) -> SharedFetch {
        state.next_generation += 1;
        let generation = state.next_generation;
        debug!(key = %key, generation, "Cache miss, issuing request");

        let backend = Arc::clone(&self.backend);
        let shared_state = Arc::clone(&self.state);
        let owned_key = key.clone();

        // The read runs as its own task, so it completes and clears the slot
        // even when every caller has gone away. The caller holds the state
        // lock, so the task cannot apply its response before the slot exists.
        let task_state = Arc::clone(&shared_state);
        let task_key = owned_key.clone();
        let task = tokio::spawn(async move {
            let entry = match backend.read(&task_key).await {
                Ok(payload) => CacheEntry::success(payload),
                Err(e) => {
                    warn!(key = %task_key, error = %e, "Fetch failed");
                    CacheEntry::failure(e.to_failure())
                }
            };
            apply_response(&task_state, &task_key, generation, &entry);
            entry
        });

        let request = async move {
            match task.await {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(key = %owned_key, error = %e, "Fetch task died");
                    let entry = CacheEntry::failure(Failure {
                        kind: FailureKind::InvalidResponse,
                        message: e.to_string(),
                    });
                    apply_response(&shared_state, &owned_key, generation, &entry);
                    entry
                }
            }
        }
        .boxed()
        .shared();

        state.slots.insert(
            key.clone(),
            Slot {
                entry: CacheEntry::pending(),
                generation,
                in_flight: Some(request.clone()),
            },
        );
        request
    }

    /// Mark every entry matching `prefix` stale and detach in-flight requests
    /// so their responses cannot land. Returns the number of entries touched.
    pub fn invalidate(&self, prefix: &QueryPrefix) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut touched = 0;

        for (key, slot) in state.slots.iter_mut() {
            if !prefix.matches(key) {
                continue;
            }
            slot.entry.stale = true;
            if slot.in_flight.take().is_some() {
                state.next_generation += 1;
                slot.generation = state.next_generation;
            }
            touched += 1;
        }

        debug!(resource = prefix.resource.name(), page = ?prefix.page, touched, "Invalidated");
        touched
    }

    pub fn invalidate_all(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        for slot in state.slots.values_mut() {
            slot.entry.stale = true;
            if slot.in_flight.take().is_some() {
                state.next_generation += 1;
                slot.generation = state.next_generation;
            }
        }
    }

    /// Current entry for `key`, without fetching.
    pub fn peek(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.lock().slots.get(key).map(|slot| slot.entry.clone())
    }

    /// True while a request for `key` is running, whether or not anyone awaits it.
    pub fn is_loading(&self, key: &QueryKey) -> bool {
        self.lock()
            .slots
            .get(key)
            .is_some_and(|slot| slot.in_flight.is_some())
    }

    /// Drop everything, e.g. on logout. In-flight responses are discarded.
    pub fn clear(&self) {
        self.lock().slots.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_state(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store a completed response unless a newer request owns the slot.
fn apply_response(state: &Mutex<CacheState>, key: &QueryKey, generation: u64, entry: &CacheEntry) {
    let mut state = lock_state(state);
    match state.slots.get_mut(key) {
        Some(slot) if slot.generation == generation => {
            slot.entry = entry.clone();
            slot.in_flight = None;
        }
        _ => {
            debug!(key = %key, generation, "Discarding superseded response");
        }
    }
}
