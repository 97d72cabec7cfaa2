//! In-memory session store keyed by a cookie id

use crate::session::SessionState;
use axum::http::{header, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";

struct Entry {
    state: SessionState,
    last_seen: Instant,
}

/// Transient session states, lost on restart.
///
/// Only sessions that left the initial state are stored. A session that
/// returns to it is removed.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere never leaves an entry half written, so a poisoned
    // map is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Entry>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            warn!("Session store lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Entry>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            warn!("Session store lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Stored state for `id`, if any
    pub fn get(&self, id: &Uuid) -> Option<SessionState> {
        self.read().get(id).map(|entry| entry.state.clone())
    }

    pub fn put(&self, id: Uuid, state: SessionState) {
        self.write().insert(
            id,
            Entry {
                state,
                last_seen: Instant::now(),
            },
        );
    }

    /// Store `next` only if the entry still holds `expected`.
    ///
    /// Returns false when another request changed or removed the session
    /// since `expected` was read; the caller's transition is then stale.
    pub fn commit(&self, id: Uuid, expected: Option<&SessionState>, next: SessionState) -> bool {
        let mut sessions = self.write();
        if sessions.get(&id).map(|entry| &entry.state) != expected {
            return false;
        }

        if next == SessionState::default() {
            sessions.remove(&id);
        } else {
            sessions.insert(
                id,
                Entry {
                    state: next,
                    last_seen: Instant::now(),
                },
            );
        }
        true
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionState> {
        self.write().remove(id).map(|entry| entry.state)
    }

    /// Drop sessions not seen for `idle`, returning how many were dropped
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < idle);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically evicts idle sessions
pub struct SessionSweeper {
    sessions: SessionStore,
    idle: Duration,
}

impl SessionSweeper {
    pub fn new(sessions: SessionStore, idle: Duration) -> Self {
        Self { sessions, idle }
    }

    /// Start the periodic sweep task
    pub async fn start(self) {
        let period = (self.idle / 4).max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = self.sessions.evict_idle(self.idle);
            if evicted > 0 {
                debug!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
            }
        }
    }
}

/// Session id from the request cookie, if present and well formed
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

/// `Set-Cookie` value for a new session id
pub fn session_cookie(id: &Uuid) -> HeaderValue {
    let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    // uuid text is always a valid header value
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("sid=; Path=/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Stage;

    fn named(name: &str) -> SessionState {
        SessionState {
            username: Some(name.to_string()),
            stage: Stage::AwaitingInput,
        }
    }

    #[test]
    fn test_session_id_from_cookie() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; sid={id}")).unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));
    }

    #[test]
    fn test_malformed_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sid=not-a-uuid"));
        assert_eq!(session_id(&headers), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn test_store_round_trip() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.get(&id), None);

        store.put(id, named("Ayesha"));
        assert_eq!(store.get(&id), Some(named("Ayesha")));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(&id), Some(named("Ayesha")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_commit_checks_expected_state() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();

        assert!(store.commit(id, None, named("Ayesha")));
        // a second writer that also started from an empty session is stale
        assert!(!store.commit(id, None, named("Bilal")));
        assert_eq!(store.get(&id), Some(named("Ayesha")));

        store.remove(&id);
        assert!(!store.commit(id, Some(&named("Ayesha")), named("Ayesha")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_commit_of_initial_state_removes_entry() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        store.put(id, named("Ayesha"));

        assert!(store.commit(id, Some(&named("Ayesha")), SessionState::new()));
        assert!(store.is_empty());

        // nothing is stored for a session that never left the initial state
        assert!(store.commit(id, None, SessionState::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_idle() {
        let store = SessionStore::new();
        store.put(Uuid::new_v4(), named("Ayesha"));
        store.put(Uuid::new_v4(), named("Bilal"));

        assert_eq!(store.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.evict_idle(Duration::ZERO), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let store = SessionStore::new();
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("writer panicked");
        })
        .join();
        assert!(store.inner.is_poisoned());

        let id = Uuid::new_v4();
        store.put(id, named("Ayesha"));
        assert_eq!(store.get(&id), Some(named("Ayesha")));
        assert_eq!(store.len(), 1);
    }
}
