//! Server-side session store.
//!
//! Sessions move `Created → Valid → (Expired | Invalidated)`. Expiry is lazy:
//! an expired entry is purged by the first lookup that notices it. Lookups take
//! the read lock; inserts and removals take the write lock.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use tracing::debug;

use super::AuthError;
use crate::models::auth::Session;

/// Generate an opaque session id (256 bits, URL-safe).
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Concurrency-safe map of live sessions.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    duration: chrono::Duration,
}

impl SessionStore {
    /// A zero duration would violate `expires_at > created_at`.
    pub fn new(duration: Duration) -> Result<Self, AuthError> {
        let duration = chrono::Duration::from_std(duration)
            .map_err(|e| AuthError::InvalidConfig(format!("session_duration: {e}")))?;
        if duration <= chrono::Duration::zero() {
            return Err(AuthError::InvalidConfig(
                "session_duration must be positive".into(),
            ));
        }
        if Utc::now().checked_add_signed(duration).is_none() {
            return Err(AuthError::InvalidConfig(
                "session_duration is out of range".into(),
            ));
        }
        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            duration,
        })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.duration
    }

    /// Mint and store a new session for `user_id`.
    pub fn create(&self, user_id: &str) -> Result<Session, AuthError> {
        let created_at = Utc::now();
        let expires_at = created_at
            .checked_add_signed(self.duration)
            .ok_or_else(|| AuthError::Internal("session expiry out of range".into()))?;
        let session = Session {
            id: generate_session_id(),
            user_id: user_id.to_string(),
            created_at,
            expires_at,
        };
        self.insert(session.clone());
        Ok(session)
    }

    /// Store a session as-is, replacing any entry with the same id.
    pub fn insert(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id.clone(), session);
    }

    /// Look up a live session. An expired entry is removed and reported as
    /// [`AuthError::SessionExpired`]; later lookups see [`AuthError::SessionNotFound`].
    pub fn get(&self, id: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(id) {
                None => return Err(AuthError::SessionNotFound),
                Some(session) if !session.is_expired_at(now) => return Ok(session.clone()),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the write lock; the entry may have been replaced.
        match sessions.get(id) {
            None => Err(AuthError::SessionNotFound),
            Some(session) if !session.is_expired_at(now) => Ok(session.clone()),
            Some(_) => {
                sessions.remove(id);
                debug!("expired session purged");
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Remove a session. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(3600)).unwrap()
    }

    fn expired(id: &str) -> Session {
        let now = Utc::now();
        Session {
            id: id.into(),
            user_id: "u1".into(),
            created_at: now - chrono::Duration::hours(2),
            expires_at: now - chrono::Duration::hours(1),
        }
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert!(matches!(
            SessionStore::new(Duration::ZERO),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_duration_is_rejected() {
        // Ten million years: representable as a delta, but not as an expiry.
        let duration = Duration::from_secs(315_360_000_000_000);
        assert!(chrono::Duration::from_std(duration).is_ok());
        assert!(matches!(
            SessionStore::new(duration),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn create_then_get() {
        let store = store();
        let session = store.create("alice").unwrap();
        assert_eq!(session.user_id, "alice");
        assert!(session.expires_at > session.created_at);
        assert_eq!(session.expires_at - session.created_at, chrono::Duration::hours(1));
        assert_eq!(store.get(&session.id).unwrap(), session);
    }

    #[test]
    fn session_ids_are_long_and_unique() {
        let store = store();
        let a = store.create("u").unwrap();
        let b = store.create("u").unwrap();
        assert_ne!(a.id, b.id);
        // 32 random bytes → 43 base64url chars.
        assert_eq!(a.id.len(), 43);
    }

    #[test]
    fn missing_session_is_not_found() {
        assert!(matches!(store().get("nope"), Err(AuthError::SessionNotFound)));
    }

    #[test]
    fn expired_session_is_purged_on_access() {
        let store = store();
        store.insert(expired("old"));
        assert!(matches!(store.get("old"), Err(AuthError::SessionExpired)));
        assert!(!store.contains("old"));
        assert!(matches!(store.get("old"), Err(AuthError::SessionNotFound)));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = store();
        let session = store.create("u").unwrap();
        assert!(store.remove(&session.id).is_some());
        assert!(store.remove(&session.id).is_none());
        assert!(store.remove("never-existed").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn purge_expired_keeps_live_sessions() {
        let store = store();
        let live = store.create("u").unwrap();
        store.insert(expired("a"));
        store.insert(expired("b"));
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&live.id));
    }

    #[test]
    fn concurrent_create_remove_and_get() {
        let store = Arc::new(store());
        let writers: Vec<_> = (0..2)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..500 {
                        let s = store.create(&format!("user-{w}-{i}")).unwrap();
                        store.remove(&s.id);
                    }
                })
            })
            .collect();
        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let _ = store.get("absent");
                    let _ = store.len();
                }
            })
        };
        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert!(store.is_empty());
    }
}
