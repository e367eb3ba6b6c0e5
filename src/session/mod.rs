//! Session Pool + cookie-jar pseudo-identities (spec component D).
//!
//! `Session`'s usage/error-score retirement mirrors the teacher's
//! `circuit_breaker.rs` `DomainHealth` state machine (consecutive-failure
//! counting, closed/open-equivalent transitions), rekeyed from "per domain"
//! to "per session". `SessionPool`'s reservoir + background maintenance
//! loop is grounded on `browser_pool/mod.rs`'s `available` deque and
//! `scaler_loop`/`target_pool_size` pattern, generalized from browser
//! instances to session identities (no browser handle is pooled here —
//! that collaborator is out of scope, see `external`).

pub mod cookie;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionPoolError;

use cookie::CookieJar;

/// Status codes that mark a response as blocked by default (spec.md §7).
pub const DEFAULT_BLOCKED_STATUS_CODES: &[u16] = &[401, 403, 429];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Fresh,
    Active,
    Retired,
    Expired,
}

pub struct Session {
    pub id: String,
    pub cookie_jar: Mutex<CookieJar>,
    pub user_data: Mutex<serde_json::Value>,
    usage_count: AtomicU32,
    error_score: AtomicU32,
    max_usage_count: u32,
    max_error_score: u32,
    created_at: Instant,
    max_age: Duration,
    retired: AtomicBool,
}

impl Session {
    fn new(max_usage_count: u32, max_error_score: u32, max_age: Duration) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), max_usage_count, max_error_score, max_age)
    }

    fn with_id(id: String, max_usage_count: u32, max_error_score: u32, max_age: Duration) -> Self {
        Self {
            id,
            cookie_jar: Mutex::new(CookieJar::new()),
            user_data: Mutex::new(serde_json::Value::Null),
            usage_count: AtomicU32::new(0),
            error_score: AtomicU32::new(0),
            max_usage_count,
            max_error_score,
            created_at: Instant::now(),
            max_age,
            retired: AtomicBool::new(false),
        }
    }

    /// Records a successful use: increments usage, decays the error score
    /// by one (never below zero) so that a session which recovers from
    /// transient trouble is not punished forever.
    pub fn mark_good(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .error_score
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| Some(s.saturating_sub(1)));
    }

    /// Records a failed use attributable to this session (e.g. a blocked or
    /// rate-limited response). Retires the session once `max_error_score`
    /// is reached.
    pub fn mark_bad(&self) {
        self.usage_count.fetch_add(1, Ordering::Relaxed);
        let score = self.error_score.fetch_add(1, Ordering::Relaxed) + 1;
        if score >= self.max_error_score {
            self.retire();
        }
    }

    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Retires the session and returns `true` if `code` is in
    /// `blocked_codes` (spec.md §4.2 `retireOnBlockedStatusCodes`); a no-op
    /// returning `false` otherwise.
    pub fn retire_on_blocked_status_codes(&self, code: u16, blocked_codes: &[u16]) -> bool {
        if blocked_codes.contains(&code) {
            self.retire();
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> SessionState {
        if self.retired.load(Ordering::SeqCst) {
            return SessionState::Retired;
        }
        if self.created_at.elapsed() >= self.max_age {
            return SessionState::Expired;
        }
        if self.usage_count.load(Ordering::Relaxed) >= self.max_usage_count {
            return SessionState::Expired;
        }
        if self.usage_count.load(Ordering::Relaxed) == 0 {
            SessionState::Fresh
        } else {
            SessionState::Active
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.state(), SessionState::Fresh | SessionState::Active)
    }

    pub fn error_score(&self) -> u32 {
        self.error_score.load(Ordering::Relaxed)
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count.load(Ordering::Relaxed)
    }
}

/// Serializable snapshot of one session's durable state, handed to an
/// external key-value collaborator by [`SessionPool::persist_state`]
/// (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub cookie_jar: CookieJar,
    pub user_data: serde_json::Value,
    pub usage_count: u32,
    pub error_score: u32,
}

pub struct SessionPool {
    sessions: DashMap<String, Arc<Session>>,
    max_pool_size: usize,
    session_max_age: Duration,
    session_max_usage_count: u32,
    session_max_error_score: u32,
}

impl SessionPool {
    pub fn new(
        max_pool_size: usize,
        session_max_age: Duration,
        session_max_usage_count: u32,
        session_max_error_score: u32,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            max_pool_size,
            session_max_age,
            session_max_usage_count,
            session_max_error_score,
        }
    }

    fn new_session(&self) -> Arc<Session> {
        Arc::new(Session::new(
            self.session_max_usage_count,
            self.session_max_error_score,
            self.session_max_age,
        ))
    }

    /// Returns a usable session, preferring an existing one at random
    /// (matching Crawlee's pick-any-usable-session policy rather than
    /// round robin) and creating a fresh one otherwise (spec.md §4.2:
    /// `getSession` always returns a session — `evict_stale` has already
    /// purged every retired/expired entry, so "none usable" only happens
    /// when the pool is empty, and there is nothing left to degrade-evict
    /// at that point).
    pub fn get_session(&self) -> Arc<Session> {
        self.evict_stale();

        if let Some(session) = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_usable())
            .choose(&mut rand::rng())
            .map(|entry| entry.value().clone())
        {
            return session;
        }

        let session = self.new_session();
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn retire_session(&self, id: &str) -> Result<(), SessionPoolError> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| SessionPoolError::NotFound(id.to_string()))?;
        session.retire();
        Ok(())
    }

    /// Removes retired/expired sessions from the pool. Called from
    /// `get_session` and from the periodic maintenance loop
    /// (`autoscaled_pool`'s caller is expected to drive this on an
    /// interval, the same cadence the browser pool's `scaler_loop` used for
    /// idle eviction).
    pub fn evict_stale(&self) {
        self.sessions
            .retain(|_, session| !matches!(session.state(), SessionState::Retired | SessionState::Expired));
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn usable_count(&self) -> usize {
        self.sessions.iter().filter(|e| e.value().is_usable()).count()
    }

    /// Snapshots every currently-usable session's cookies and counters.
    /// Retired/expired sessions are excluded — they are not worth
    /// restoring. Call `evict_stale` first if a caller wants a fresh read.
    pub fn persist_state(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().is_usable())
            .map(|entry| {
                let session = entry.value();
                SessionSnapshot {
                    id: session.id.clone(),
                    cookie_jar: session.cookie_jar.lock().clone(),
                    user_data: session.user_data.lock().clone(),
                    usage_count: session.usage_count(),
                    error_score: session.error_score(),
                }
            })
            .collect()
    }

    /// Rebuilds sessions from a prior [`Self::persist_state`] snapshot,
    /// preserving each session's id, cookies, and counters. Restored
    /// sessions count against `max_pool_size` the same as fresh ones.
    pub fn restore(&self, snapshots: Vec<SessionSnapshot>) {
        for snapshot in snapshots {
            if self.sessions.len() >= self.max_pool_size {
                break;
            }
            let session = Arc::new(Session::with_id(
                snapshot.id.clone(),
                self.session_max_usage_count,
                self.session_max_error_score,
                self.session_max_age,
            ));
            *session.cookie_jar.lock() = snapshot.cookie_jar;
            *session.user_data.lock() = snapshot.user_data;
            session.usage_count.store(snapshot.usage_count, Ordering::Relaxed);
            session.error_score.store(snapshot.error_score, Ordering::Relaxed);
            self.sessions.insert(snapshot.id, session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> SessionPool {
        SessionPool::new(10, Duration::from_secs(3600), 50, 3)
    }

    #[test]
    fn get_session_creates_fresh_session_when_pool_empty() {
        let pool = pool();
        let session = pool.get_session();
        assert_eq!(session.state(), SessionState::Fresh);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn session_retires_after_max_error_score_bad_marks() {
        let pool = pool();
        let session = pool.get_session();
        for _ in 0..3 {
            session.mark_bad();
        }
        assert!(!session.is_usable());
        assert_eq!(session.state(), SessionState::Retired);
    }

    #[test]
    fn get_session_replaces_a_retired_session_instead_of_erroring() {
        let pool = SessionPool::new(1, Duration::from_secs(3600), 50, 1);
        let first = pool.get_session();
        first.mark_bad();
        assert!(!first.is_usable());

        let second = pool.get_session();
        assert!(second.is_usable());
        assert_ne!(second.id, first.id);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn evict_stale_removes_retired_sessions() {
        let pool = pool();
        let session = pool.get_session();
        session.retire();
        pool.evict_stale();
        assert!(pool.is_empty());
    }

    #[test]
    fn retire_on_blocked_status_codes_matches_default_set() {
        let pool = pool();
        let session = pool.get_session();
        assert!(!session.retire_on_blocked_status_codes(200, DEFAULT_BLOCKED_STATUS_CODES));
        assert!(session.is_usable());
        assert!(session.retire_on_blocked_status_codes(429, DEFAULT_BLOCKED_STATUS_CODES));
        assert!(!session.is_usable());
    }

    #[test]
    fn persist_state_then_restore_preserves_cookies_and_counters() {
        let pool = pool();
        let session = pool.get_session();
        session.cookie_jar.lock().set(cookie::Cookie {
            name: "sid".into(),
            value: "abc123".into(),
            domain: "example.com".into(),
            path: "/".into(),
        });
        session.mark_good();
        session.mark_bad();
        let snapshot = pool.persist_state();
        assert_eq!(snapshot.len(), 1);

        let restored = pool();
        restored.restore(snapshot);
        assert_eq!(restored.len(), 1);
        let restored_session = restored.sessions.iter().next().unwrap().value().clone();
        assert_eq!(restored_session.id, session.id);
        assert_eq!(restored_session.usage_count(), session.usage_count());
        assert_eq!(restored_session.error_score(), session.error_score());
        assert_eq!(
            restored_session.cookie_jar.lock().cookies_for("example.com", "/").len(),
            1
        );
    }
}
