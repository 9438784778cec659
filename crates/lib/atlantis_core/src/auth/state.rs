//! Anti-forgery `state` values for the OAuth2 authorization-code flow.
//!
//! A state is minted when the user is sent to an identity provider and must
//! come back, unused and unexpired, on the callback for the same provider.

use std::time::{Duration, Instant};

use base64::Engine;
use dashmap::DashMap;
use rand::RngCore;
use tracing::debug;

/// TTL for pending login states (10 minutes).
pub const STATE_TTL: Duration = Duration::from_secs(600);

/// Upper bound on pending login states held at once.
pub const MAX_PENDING_STATES: usize = 10_000;

/// Generate a cryptographic state parameter (192 bits, URL-safe).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Login started but not yet completed.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub provider_id: String,
    pub created_at: Instant,
}

/// In-memory store of pending logins keyed by state.
///
/// Holds at most `capacity` entries; issuing into a full store drops expired
/// entries first, then the oldest pending ones.
#[derive(Debug)]
pub struct LoginStateStore {
    states: DashMap<String, PendingLogin>,
    capacity: usize,
}

impl Default for LoginStateStore {
    fn default() -> Self {
        Self::with_capacity(MAX_PENDING_STATES)
    }
}

impl LoginStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Mint and remember a state for `provider_id`.
    pub fn issue(&self, provider_id: &str) -> String {
        if self.states.len() >= self.capacity {
            self.make_room();
        }
        let state = generate_state();
        self.insert(
            state.clone(),
            PendingLogin {
                provider_id: provider_id.to_string(),
                created_at: Instant::now(),
            },
        );
        state
    }

    pub fn insert(&self, state: String, pending: PendingLogin) {
        self.states.insert(state, pending);
    }

    /// Take (remove and return) a pending login.
    /// Returns `None` if not found or expired.
    pub fn take(&self, state: &str) -> Option<PendingLogin> {
        let (_, pending) = self.states.remove(state)?;
        if pending.created_at.elapsed() > STATE_TTL {
            return None;
        }
        Some(pending)
    }

    fn make_room(&self) {
        if self.cleanup() > 0 && self.states.len() < self.capacity {
            return;
        }
        let excess = (self.states.len() + 1).saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }
        let mut by_age: Vec<(Instant, String)> = self
            .states
            .iter()
            .map(|e| (e.value().created_at, e.key().clone()))
            .collect();
        by_age.sort_unstable();
        for (_, key) in by_age.into_iter().take(excess) {
            self.states.remove(&key);
        }
        debug!(evicted = excess, "login state store full");
    }

    /// Evict expired entries.
    pub fn cleanup(&self) -> usize {
        let before = self.states.len();
        self.states.retain(|_, v| v.created_at.elapsed() <= STATE_TTL);
        before.saturating_sub(self.states.len())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
