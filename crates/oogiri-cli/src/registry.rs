use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use oogiri_engine::SessionContext;
use tracing::debug;

pub type SharedSession = Arc<Mutex<SessionContext>>;

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Entry {
    session: SharedSession,
    last_seen: Instant,
    touch: u64,
}

#[derive(Debug, Default)]
struct Entries {
    by_id: HashMap<String, Entry>,
    clock: u64,
}

/// Live session contexts keyed by browser session id.
///
/// Idle entries and, past `capacity`, the least recently used ones are dropped
/// whenever a new entry is inserted. A dropped session comes back through the
/// login cookie and the history store.
#[derive(Debug)]
pub struct SessionRegistry {
    entries: Mutex<Entries>,
    idle_ttl: Duration,
    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL, DEFAULT_CAPACITY)
    }
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            idle_ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_insert(
        &self,
        session_id: &str,
        create: impl FnOnce() -> SessionContext,
    ) -> SharedSession {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        entries.clock += 1;
        let touch = entries.clock;
        if let Some(entry) = entries.by_id.get_mut(session_id) {
            entry.last_seen = now;
            entry.touch = touch;
            return Arc::clone(&entry.session);
        }

        self.prune(&mut entries, now);
        let session = Arc::new(Mutex::new(create()));
        entries.by_id.insert(
            session_id.to_string(),
            Entry {
                session: Arc::clone(&session),
                last_seen: now,
                touch,
            },
        );
        session
    }

    fn prune(&self, entries: &mut Entries, now: Instant) {
        let before = entries.by_id.len();
        entries
            .by_id
            .retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_ttl);
        while entries.by_id.len() >= self.capacity {
            let oldest = entries
                .by_id
                .iter()
                .min_by_key(|(_, entry)| entry.touch)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    entries.by_id.remove(&id);
                }
                None => break,
            }
        }
        let dropped = before - entries.by_id.len();
        if dropped > 0 {
            debug!(dropped, live = entries.by_id.len(), "sessions evicted");
        }
    }

    #[cfg(test)]
    pub fn live_sessions(&self) -> usize {
        lock(&self.entries).by_id.len()
    }
}

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
