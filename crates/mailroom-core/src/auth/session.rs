use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{
    Clock, Identity, SessionStore, SystemClock, ACCESS_TOKEN_KEY, SESSION_KEYS,
    TOKEN_EXPIRY_KEY, USER_EMAIL_KEY, USER_NAME_KEY,
};
use crate::api::ApiError;

/// Callback the hosting view supplies to return the user to the login entry.
pub type InvalidationHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// Result of reading the token/expiry pair
enum Lookup {
    Missing,
    Expired,
    Valid(String),
}

/// Owns the client-held bearer token and its expiry.
///
/// Clone is cheap; clones share the same store, clock and hook. Storage
/// failures never escape the read paths: they are logged and the session is
/// reported as absent.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    on_invalid: InvalidationHook,
    // Serializes read-then-clear sequences so concurrent rejections converge.
    // Holds true while a session has ended without the host being told.
    unannounced: Mutex<bool>,
}

impl SessionGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        on_invalid: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), on_invalid)
    }

    pub fn with_clock(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        on_invalid: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                on_invalid: Arc::new(on_invalid),
                unannounced: Mutex::new(false),
            }),
        }
    }

    /// Get the bearer token if a non-expired one is stored.
    ///
    /// An expired (or unreadable) expiry clears the whole session as a side
    /// effect. Never touches the network and never fails.
    ///
    /// Reading is not a navigation event; the redirect for a session cleared
    /// here is owed to the next 401, sweep or mount check.
    pub fn access_token(&self) -> Option<String> {
        let mut unannounced = self.lock();
        self.current_token(&mut *unannounced)
    }

    /// Persist a freshly issued token, valid for `ttl_secs` from now.
    pub fn establish(&self, token: &str, ttl_secs: u64, identity: Option<&Identity>) -> Result<()> {
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expiry = self.inner.clock.now_millis().saturating_add(ttl_ms);

        let mut unannounced = self.lock();
        let store = &self.inner.store;

        // Identity from a previous session must not outlive it
        self.clear_entries();
        *unannounced = false;

        store
            .set(ACCESS_TOKEN_KEY, token)
            .context("Failed to store access token")?;
        if let Err(e) = store.set(TOKEN_EXPIRY_KEY, &expiry.to_string()) {
            if let Err(rollback) = store.remove(ACCESS_TOKEN_KEY) {
                warn!(error = %rollback, "Failed to roll back access token");
            }
            return Err(e.context("Failed to store token expiry"));
        }

        if let Some(identity) = identity {
            for (key, value) in [
                (USER_NAME_KEY, identity.name.as_deref()),
                (USER_EMAIL_KEY, identity.email.as_deref()),
            ] {
                if let Some(value) = value {
                    if let Err(e) = store.set(key, value) {
                        warn!(key, error = %e, "Failed to cache identity field");
                    }
                }
            }
        }

        info!(expires_at = expiry, "Session established");
        Ok(())
    }

    /// Remove every session entry. Safe to call with no session.
    pub fn teardown(&self) {
        let mut unannounced = self.lock();
        self.clear_entries();
        *unannounced = false;
        debug!("Session torn down");
    }

    /// Mount-time check for a protected view or request.
    ///
    /// With no valid token the host is sent back to the login entry before
    /// anything protected happens.
    pub fn require_token(&self) -> Result<String, ApiError> {
        let token = {
            let mut unannounced = self.lock();
            let token = self.current_token(&mut *unannounced);
            if token.is_none() {
                *unannounced = false;
            }
            token
        };
        match token {
            Some(token) => Ok(token),
            None => {
                self.notify_invalid("no valid token");
                Err(ApiError::SessionInvalid)
            }
        }
    }

    /// React to the server rejecting the token.
    ///
    /// The host is notified once per ended session: a burst of concurrent
    /// 401s yields a single redirect, and a session that expired while the
    /// request was in flight still yields one.
    pub fn reject(&self) -> bool {
        let notify = {
            let mut unannounced = self.lock();
            let live = self.read(ACCESS_TOKEN_KEY).is_some();
            if live {
                self.clear_entries();
            }
            let notify = live || *unannounced;
            *unannounced = false;
            notify
        };
        if notify {
            self.notify_invalid("server rejected token");
        }
        notify
    }

    /// One pass of the background expiry check.
    ///
    /// Returns true when it ended a session, including one a token read
    /// already cleared without redirecting.
    pub fn sweep_expired(&self) -> bool {
        let ended = {
            let mut unannounced = self.lock();
            let expired = match self.read(TOKEN_EXPIRY_KEY) {
                Some(raw) => self.is_past(&raw),
                None => false,
            };
            if expired {
                self.clear_entries();
            }
            let ended = expired || *unannounced;
            *unannounced = false;
            ended
        };
        if ended {
            self.notify_invalid("token expired");
        }
        ended
    }

    pub fn state(&self) -> SessionState {
        if self.access_token().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Cached display identity, if any. Never use for authorization.
    pub fn identity(&self) -> Option<Identity> {
        let name = self.read(USER_NAME_KEY);
        let email = self.read(USER_EMAIL_KEY);
        if name.is_none() && email.is_none() {
            None
        } else {
            Some(Identity { name, email })
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.read(TOKEN_EXPIRY_KEY)?;
        let millis = raw.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        let raw = self.read(TOKEN_EXPIRY_KEY)?;
        let millis = raw.trim().parse::<i64>().ok()?;
        Some(Duration::milliseconds(millis - self.inner.clock.now_millis()))
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.time_until_expiry().map(|d| d.num_minutes().max(0))
    }

    fn current_token(&self, unannounced: &mut bool) -> Option<String> {
        match self.lookup() {
            Lookup::Valid(token) => Some(token),
            Lookup::Expired => {
                debug!("Stored token has expired, clearing session");
                self.clear_entries();
                *unannounced = true;
                None
            }
            Lookup::Missing => None,
        }
    }

    fn lookup(&self) -> Lookup {
        let token = self.read(ACCESS_TOKEN_KEY);
        let expiry = self.read(TOKEN_EXPIRY_KEY);
        match (token, expiry) {
            (Some(token), Some(expiry)) => {
                if self.is_past(&expiry) {
                    Lookup::Expired
                } else {
                    Lookup::Valid(token)
                }
            }
            _ => Lookup::Missing,
        }
    }

    /// At or past the expiry instant. Garbage counts as expired.
    fn is_past(&self, raw_expiry: &str) -> bool {
        match raw_expiry.trim().parse::<i64>() {
            Ok(expiry) => self.inner.clock.now_millis() >= expiry,
            Err(_) => {
                warn!(value = raw_expiry, "Unparseable token expiry");
                true
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.inner.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                debug!(key, error = %e, "Session storage unavailable");
                None
            }
        }
    }

    fn clear_entries(&self) {
        for key in SESSION_KEYS {
            if let Err(e) = self.inner.store.remove(key) {
                warn!(key, error = %e, "Failed to remove session entry");
            }
        }
    }

    fn notify_invalid(&self, reason: &str) {
        warn!(reason, "Session invalid, returning to login");
        (self.inner.on_invalid)();
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner.unannounced.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{ManualClock, RedirectCounter, UnavailableStore};
    use crate::auth::{FileStore, MemoryStore};

    fn guard_at(secs: i64) -> (SessionGuard, Arc<MemoryStore>, Arc<ManualClock>, RedirectCounter) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::at(secs * 1000);
        let redirects = RedirectCounter::default();
        let guard = SessionGuard::with_clock(store.clone(), clock.clone(), redirects.hook());
        (guard, store, clock, redirects)
    }

    // -------------------------------------------------------------------------
    // access_token
    // -------------------------------------------------------------------------

    #[test]
    fn test_access_token_missing_entries() {
        let (guard, store, _, redirects) = guard_at(0);
        assert_eq!(guard.access_token(), None);

        // Token without expiry is not a session, and is left alone
        store.set(ACCESS_TOKEN_KEY, "abc").unwrap();
        assert_eq!(guard.access_token(), None);
        assert!(store.contains(ACCESS_TOKEN_KEY));
        assert_eq!(redirects.count(), 0);
    }

    #[test]
    fn test_access_token_valid_does_not_mutate() {
        let (guard, store, _, _) = guard_at(0);
        store.set(ACCESS_TOKEN_KEY, "abc").unwrap();
        store.set(TOKEN_EXPIRY_KEY, "5000").unwrap();

        assert_eq!(guard.access_token().as_deref(), Some("abc"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(TOKEN_EXPIRY_KEY).unwrap().as_deref(), Some("5000"));
    }

    #[test]
    fn test_access_token_expired_clears_store() {
        let (guard, store, clock, redirects) = guard_at(0);
        guard.establish("abc", 10, Some(&Identity::new("A", "a@x.com"))).unwrap();

        // Exactly at expiry counts as expired
        clock.set_secs(10);
        assert_eq!(guard.access_token(), None);
        assert!(store.is_empty());
        // Reading is not a navigation event
        assert_eq!(redirects.count(), 0);
    }

    #[test]
    fn test_access_token_unparseable_expiry_is_expired() {
        let (guard, store, _, _) = guard_at(0);
        store.set(ACCESS_TOKEN_KEY, "abc").unwrap();
        store.set(TOKEN_EXPIRY_KEY, "soon").unwrap();

        assert_eq!(guard.access_token(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_access_token_without_storage_facility() {
        let redirects = RedirectCounter::default();
        let guard = SessionGuard::new(Arc::new(UnavailableStore), redirects.hook());
        assert_eq!(guard.access_token(), None);
        assert_eq!(guard.state(), SessionState::Unauthenticated);
        assert_eq!(guard.identity(), None);
        guard.teardown();
    }

    // -------------------------------------------------------------------------
    // establish / teardown
    // -------------------------------------------------------------------------

    #[test]
    fn test_establish_round_trip() {
        let (guard, store, _, _) = guard_at(100);
        guard.establish("abc", 60, None).unwrap();

        assert_eq!(guard.access_token().as_deref(), Some("abc"));
        assert_eq!(
            store.get(TOKEN_EXPIRY_KEY).unwrap().as_deref(),
            Some("160000")
        );
        assert_eq!(guard.state(), SessionState::Authenticated);
        assert_eq!(guard.identity(), None);
    }

    #[test]
    fn test_establish_stores_identity() {
        let (guard, _, _, _) = guard_at(0);
        guard
            .establish("abc", 60, Some(&Identity::new("A", "a@x.com")))
            .unwrap();
        assert_eq!(guard.identity(), Some(Identity::new("A", "a@x.com")));
    }

    #[test]
    fn test_establish_replaces_previous_identity() {
        let (guard, store, _, _) = guard_at(0);
        guard
            .establish("old", 60, Some(&Identity::new("A", "a@x.com")))
            .unwrap();
        guard.establish("new", 60, None).unwrap();

        assert_eq!(guard.access_token().as_deref(), Some("new"));
        assert!(!store.contains(USER_NAME_KEY));
        assert!(!store.contains(USER_EMAIL_KEY));
    }

    #[test]
    fn test_establish_is_all_or_nothing() {
        struct NoExpiryStore(MemoryStore);

        impl SessionStore for NoExpiryStore {
            fn get(&self, key: &str) -> Result<Option<String>> {
                self.0.get(key)
            }
            fn set(&self, key: &str, value: &str) -> Result<()> {
                if key == TOKEN_EXPIRY_KEY {
                    anyhow::bail!("quota exceeded");
                }
                self.0.set(key, value)
            }
            fn remove(&self, key: &str) -> Result<()> {
                self.0.remove(key)
            }
        }

        let store = Arc::new(NoExpiryStore(MemoryStore::new()));
        let guard = SessionGuard::new(store.clone(), || {});
        assert!(guard.establish("abc", 60, None).is_err());
        assert!(store.0.is_empty());
    }

    #[test]
    fn test_establish_then_teardown() {
        let (guard, store, _, redirects) = guard_at(0);
        guard
            .establish("abc", 60, Some(&Identity::new("A", "a@x.com")))
            .unwrap();
        guard.teardown();

        assert_eq!(guard.access_token(), None);
        assert_eq!(guard.identity(), None);
        assert!(store.is_empty());
        assert_eq!(redirects.count(), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (guard, store, _, _) = guard_at(0);
        guard.teardown();
        guard.teardown();
        assert!(store.is_empty());
    }

    #[test]
    fn test_login_hour_scenario() {
        let (guard, store, clock, _) = guard_at(0);
        guard.establish("abc", 3600, None).unwrap();

        clock.set_secs(3599);
        assert_eq!(guard.access_token().as_deref(), Some("abc"));

        clock.set_secs(3601);
        assert_eq!(guard.access_token(), None);
        assert!(store.is_empty());
    }

    // -------------------------------------------------------------------------
    // require_token / reject / sweep
    // -------------------------------------------------------------------------

    #[test]
    fn test_require_token_redirects_when_absent() {
        let (guard, _, _, redirects) = guard_at(0);
        assert!(matches!(guard.require_token(), Err(ApiError::SessionInvalid)));
        assert_eq!(redirects.count(), 1);

        guard.establish("abc", 60, None).unwrap();
        assert_eq!(guard.require_token().unwrap(), "abc");
        assert_eq!(redirects.count(), 1);
    }

    #[test]
    fn test_reject_converges_to_one_redirect() {
        let (guard, store, _, redirects) = guard_at(0);
        guard.establish("abc", 60, None).unwrap();

        assert!(guard.reject());
        assert!(!guard.reject());
        assert!(!guard.reject());
        assert!(store.is_empty());
        assert_eq!(redirects.count(), 1);
    }

    #[test]
    fn test_sweep_only_acts_after_expiry() {
        let (guard, store, clock, redirects) = guard_at(0);
        guard.establish("abc", 30, None).unwrap();

        clock.set_secs(29);
        assert!(!guard.sweep_expired());
        assert_eq!(store.len(), 2);

        clock.set_secs(30);
        assert!(guard.sweep_expired());
        assert!(store.is_empty());
        assert_eq!(redirects.count(), 1);

        // Nothing left to sweep
        assert!(!guard.sweep_expired());
        assert_eq!(redirects.count(), 1);
    }

    #[test]
    fn test_reject_after_silent_expiry_redirects_once() {
        let (guard, store, clock, redirects) = guard_at(0);
        guard.establish("abc", 10, None).unwrap();

        clock.set_secs(11);
        assert_eq!(guard.access_token(), None);
        assert!(store.is_empty());
        assert_eq!(redirects.count(), 0);

        assert!(guard.reject());
        assert!(!guard.reject());
        assert_eq!(redirects.count(), 1);
    }

    #[test]
    fn test_sweep_announces_session_cleared_by_read() {
        let (guard, _, clock, redirects) = guard_at(0);
        guard.establish("abc", 10, None).unwrap();

        clock.set_secs(11);
        assert_eq!(guard.state(), SessionState::Unauthenticated);
        assert!(guard.sweep_expired());
        assert_eq!(redirects.count(), 1);

        assert!(!guard.sweep_expired());
        assert!(!guard.reject());
        assert_eq!(redirects.count(), 1);
    }

    #[test]
    fn test_require_token_on_expired_session_redirects_once() {
        let (guard, _, clock, redirects) = guard_at(0);
        guard.establish("abc", 10, None).unwrap();

        clock.set_secs(10);
        assert!(matches!(guard.require_token(), Err(ApiError::SessionInvalid)));
        assert_eq!(redirects.count(), 1);
        assert!(!guard.reject());
        assert_eq!(redirects.count(), 1);
    }

    #[test]
    fn test_teardown_settles_owed_redirect() {
        let (guard, _, clock, redirects) = guard_at(0);
        guard.establish("abc", 10, None).unwrap();

        clock.set_secs(11);
        assert_eq!(guard.access_token(), None);
        guard.teardown();
        assert!(!guard.reject());
        assert_eq!(redirects.count(), 0);
    }

    #[test]
    fn test_corrupt_session_file_does_not_block_login() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));
        std::fs::write(store.path(), r#"{"accessToken": "abc", trunc"#).unwrap();
        let guard = SessionGuard::new(store.clone(), || {});

        assert_eq!(guard.access_token(), None);
        guard.teardown();
        assert!(!store.path().exists());

        guard.establish("new-token", 3600, None).unwrap();
        assert_eq!(guard.access_token().as_deref(), Some("new-token"));
    }

    #[test]
    fn test_minutes_until_expiry() {
        let (guard, _, clock, _) = guard_at(0);
        assert_eq!(guard.minutes_until_expiry(), None);

        guard.establish("abc", 3600, None).unwrap();
        assert_eq!(guard.minutes_until_expiry(), Some(60));
        assert_eq!(
            guard.expires_at(),
            DateTime::from_timestamp_millis(3_600_000)
        );

        clock.set_secs(7200);
        assert_eq!(guard.minutes_until_expiry(), Some(0));
    }
}
