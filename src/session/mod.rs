//! Signed-in session state and the auth provider boundary.
//!
//! [`SessionStore`] holds the current user and access token. [`SessionManager`]
//! ties the store to an [`AuthProvider`] and the idle [`Watchdog`]: user
//! transitions arm or disarm the watchdog, and idle expiry clears local state
//! before a best-effort remote sign-out.

pub mod watchdog;

pub use watchdog::{ActivityEvent, ManualTimer, Timer, TimerHandle, Watchdog, WatchState};
#[cfg(not(target_arch = "wasm32"))]
pub use watchdog::TokioTimer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::{Config, SupabaseConfig};
use crate::http::{extract_detail, HttpRequest, Method, Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("auth provider is not configured")]
    NotConfigured,
    #[error("session token rejected")]
    Unauthorized,
    #[error("auth provider error {status}: {detail}")]
    Provider { status: u16, detail: String },
    #[error("auth network error: {0}")]
    Network(String),
    #[error("auth response decode failed: {0}")]
    Decode(String),
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        AuthError::Network(e.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl User {
    /// Display name: metadata `nickname`, then `name`, then the email's local part.
    pub fn display_name(&self) -> Option<String> {
        ["nickname", "name"]
            .iter()
            .find_map(|key| self.user_metadata.get(*key).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user: User,
    pub access_token: String,
}

#[inline]
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

type UserListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Current session plus listeners for signed-in/out transitions.
#[derive(Default)]
pub struct SessionStore {
    session: Mutex<Option<Session>>,
    listeners: Mutex<Vec<UserListener>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("user", &self.user().map(|u| u.id))
            .finish()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.session).as_ref().map(|s| s.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.session).as_ref().map(|s| s.access_token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// `listener(true)` fires when a user appears or changes, `listener(false)` when it goes away.
    /// A token refresh for the same user is not a transition.
    pub fn on_user_change(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        lock(&self.listeners).push(Arc::new(listener));
    }

    /// Replaces the session and returns the previous one.
    pub fn set(&self, next: Option<Session>) -> Option<Session> {
        let (prev, transition) = {
            let mut guard = lock(&self.session);
            let prev_id = guard.as_ref().map(|s| s.user.id.clone());
            let next_id = next.as_ref().map(|s| s.user.id.clone());
            let prev = std::mem::replace(&mut *guard, next);
            let transition = (prev_id != next_id).then_some(next_id.is_some());
            (prev, transition)
        };
        if let Some(signed_in) = transition {
            let listeners: Vec<UserListener> = lock(&self.listeners).clone();
            for listener in listeners {
                listener(signed_in);
            }
        }
        prev
    }

    pub fn clear(&self) -> Option<Session> {
        self.set(None)
    }
}

/// External identity provider.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait AuthProvider: Send + Sync {
    /// Resolves the user behind an access token.
    async fn fetch_user(&self, access_token: &str) -> Result<User, AuthError>;

    /// Revokes the token remotely.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

/// Provider used when no auth endpoint is configured: nobody can sign in,
/// signing out always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubAuthProvider;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AuthProvider for StubAuthProvider {
    async fn fetch_user(&self, _access_token: &str) -> Result<User, AuthError> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Supabase GoTrue endpoints (`/auth/v1/user`, `/auth/v1/logout`).
pub struct GoTrueAuthProvider {
    url: String,
    anon_key: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for GoTrueAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueAuthProvider")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl GoTrueAuthProvider {
    pub fn new(cfg: &SupabaseConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: cfg.url.trim_end_matches('/').to_string(),
            anon_key: cfg.anon_key.clone(),
            transport,
        }
    }

    fn request(&self, method: Method, path: &str, token: &str) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{}", self.url, path),
            headers: vec![
                ("apikey".to_string(), self.anon_key.clone()),
                ("Authorization".to_string(), format!("Bearer {token}")),
            ],
            body: None,
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl AuthProvider for GoTrueAuthProvider {
    async fn fetch_user(&self, access_token: &str) -> Result<User, AuthError> {
        let resp = self
            .transport
            .send(self.request(Method::Get, "/auth/v1/user", access_token))
            .await?;
        match resp.status {
            200..=299 => serde_json::from_slice(&resp.body)
                .map_err(|e| AuthError::Decode(e.to_string())),
            401 | 403 => Err(AuthError::Unauthorized),
            status => Err(AuthError::Provider {
                status,
                detail: extract_detail(status, &resp.status_text, &resp.body),
            }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let resp = self
            .transport
            .send(self.request(Method::Post, "/auth/v1/logout", access_token))
            .await?;
        if resp.is_success() {
            Ok(())
        } else {
            Err(AuthError::Provider {
                status: resp.status,
                detail: extract_detail(resp.status, &resp.status_text, &resp.body),
            })
        }
    }
}

/// Picks the provider for a configuration: GoTrue when configured, otherwise the stub.
pub fn provider_for(
    supabase: Option<&SupabaseConfig>,
    transport: Arc<dyn Transport>,
) -> Arc<dyn AuthProvider> {
    match supabase {
        Some(cfg) => Arc::new(GoTrueAuthProvider::new(cfg, transport)),
        None => Arc::new(StubAuthProvider),
    }
}

pub struct SessionManager {
    store: Arc<SessionStore>,
    provider: Arc<dyn AuthProvider>,
    watchdog: Arc<Watchdog>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store)
            .field("watchdog", &self.watchdog)
            .finish()
    }
}

impl SessionManager {
    pub fn new(provider: Arc<dyn AuthProvider>, timer: Arc<dyn Timer>, idle_window: Duration) -> Self {
        let store = Arc::new(SessionStore::new());

        let weak_store = Arc::downgrade(&store);
        let expiring_provider = Arc::clone(&provider);
        let watchdog = Arc::new(Watchdog::new(
            timer,
            idle_window,
            Arc::new(move || {
                let Some(store) = weak_store.upgrade() else {
                    return;
                };
                // Local lockout first; the remote call is fire-and-forget.
                let Some(session) = store.clear() else {
                    return;
                };
                let session_user = session.user.id.clone();
                let provider = Arc::clone(&expiring_provider);
                let spawned = crate::platform::spawn(async move {
                    if let Err(e) = provider.sign_out(&session.access_token).await {
                        log::warn!("[session] remote sign-out after idle expiry failed: {e}");
                    }
                });
                if !spawned {
                    log::warn!("[session] remote sign-out skipped for user {}", session_user);
                }
            }),
        ));

        let dog = Arc::clone(&watchdog);
        store.on_user_change(move |signed_in| dog.user_changed(signed_in));

        Self {
            store,
            provider,
            watchdog,
        }
    }

    /// Provider from the Supabase settings (stub when absent), idle window from
    /// `idle_timeout_secs`.
    pub fn from_config(cfg: &Config, transport: Arc<dyn Transport>, timer: Arc<dyn Timer>) -> Self {
        let provider = provider_for(cfg.supabase.as_ref(), transport);
        Self::new(provider, timer, Duration::from_secs(cfg.idle_timeout_secs))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// Restores a session from a previously stored token, if it is still valid.
    pub async fn bootstrap(&self, stored_token: Option<&str>) -> Option<User> {
        let token = stored_token.filter(|t| !t.is_empty())?;
        match self.provider.fetch_user(token).await {
            Ok(user) => {
                self.sign_in(Session {
                    user: user.clone(),
                    access_token: token.to_string(),
                });
                Some(user)
            }
            Err(AuthError::NotConfigured) => None,
            Err(e) => {
                log::info!("[session] stored session not restored: {e}");
                None
            }
        }
    }

    /// Provider callback after a successful sign-in.
    pub fn sign_in(&self, session: Session) {
        log::debug!("[session] signed in as {}", session.user.id);
        self.store.set(Some(session));
    }

    /// Explicit sign-out. Local state is cleared even if the remote call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.store.clear() else {
            return Ok(());
        };
        self.provider
            .sign_out(&session.access_token)
            .await
            .inspect_err(|e| log::warn!("[session] remote sign-out failed: {e}"))
    }

    pub fn activity(&self, event: ActivityEvent) {
        self.watchdog.activity(event);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.watchdog.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        sign_outs: AtomicUsize,
        fail_sign_out: bool,
    }

    #[async_trait]
    impl AuthProvider for CountingProvider {
        async fn fetch_user(&self, access_token: &str) -> Result<User, AuthError> {
            if access_token == "good" {
                Ok(user("u-1"))
            } else {
                Err(AuthError::Unauthorized)
            }
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
            self.sign_outs.fetch_add(1, Ordering::SeqCst);
            if self.fail_sign_out {
                Err(AuthError::Network("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: Some(format!("{id}@example.com")),
            user_metadata: serde_json::Value::Null,
        }
    }

    fn session(id: &str, token: &str) -> Session {
        Session {
            user: user(id),
            access_token: token.to_string(),
        }
    }

    #[test]
    fn store_reports_transitions_only() {
        let store = SessionStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        store.on_user_change(move |signed_in| s.lock().unwrap().push(signed_in));

        store.set(Some(session("a", "t1")));
        store.set(Some(session("a", "t2")));
        store.set(Some(session("b", "t3")));
        store.clear();
        store.clear();
        assert_eq!(*seen.lock().unwrap(), vec![true, true, false]);
    }

    #[test]
    fn display_name_prefers_metadata() {
        let mut u = user("x");
        assert_eq!(u.display_name().as_deref(), Some("x"));
        u.user_metadata = serde_json::json!({"nickname": "cert-hunter"});
        assert_eq!(u.display_name().as_deref(), Some("cert-hunter"));
    }

    #[tokio::test]
    async fn failed_remote_sign_out_still_clears_locally() {
        let provider = Arc::new(CountingProvider {
            fail_sign_out: true,
            ..Default::default()
        });
        let timer = Arc::new(ManualTimer::new());
        let mgr = SessionManager::new(provider.clone(), timer.clone(), Duration::from_secs(60));
        mgr.sign_in(session("u-1", "tok"));
        assert!(mgr.watchdog().is_armed());

        let res = mgr.sign_out().await;
        assert!(res.is_err());
        assert!(!mgr.store().is_signed_in());
        assert!(!mgr.watchdog().is_armed());
        assert_eq!(timer.pending(), 0);
        assert_eq!(provider.sign_outs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bootstrap_restores_valid_token() {
        let provider = Arc::new(CountingProvider::default());
        let mgr = SessionManager::new(
            provider,
            Arc::new(ManualTimer::new()),
            Duration::from_secs(60),
        );
        assert!(mgr.bootstrap(Some("stale")).await.is_none());
        assert!(mgr.bootstrap(None).await.is_none());
        let user = mgr.bootstrap(Some("good")).await.unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(mgr.store().token().as_deref(), Some("good"));
        assert!(mgr.watchdog().is_armed());
    }

    #[tokio::test]
    async fn idle_expiry_clears_then_signs_out_remotely() {
        let provider = Arc::new(CountingProvider::default());
        let timer = Arc::new(ManualTimer::new());
        let mgr = SessionManager::new(provider.clone(), timer.clone(), Duration::from_secs(60));
        mgr.sign_in(session("u-1", "tok"));

        timer.advance(Duration::from_secs(30));
        mgr.activity(ActivityEvent::KeyDown);
        timer.advance(Duration::from_secs(59));
        assert!(mgr.store().is_signed_in());

        timer.advance(Duration::from_secs(1));
        assert!(!mgr.store().is_signed_in());
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.sign_outs.load(Ordering::SeqCst), 1);
        assert!(!mgr.watchdog().is_armed());
    }

    #[test]
    fn idle_expiry_without_runtime_still_clears() {
        let provider = Arc::new(CountingProvider::default());
        let timer = Arc::new(ManualTimer::new());
        let mgr = SessionManager::new(provider.clone(), timer.clone(), Duration::from_secs(60));
        mgr.sign_in(session("u-1", "tok"));

        timer.advance(Duration::from_secs(60));
        assert!(!mgr.store().is_signed_in());
        assert!(!mgr.watchdog().is_armed());
        assert_eq!(timer.pending(), 0);
        // No runtime to carry the remote call; it is skipped, not panicked on.
        assert_eq!(provider.sign_outs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn from_config_uses_idle_timeout() {
        let cfg = Config {
            idle_timeout_secs: 90,
            ..Config::default()
        };
        let timer = Arc::new(ManualTimer::new());
        let transport: Arc<dyn Transport> = Arc::new(crate::http::ReqwestTransport::new());
        let mgr = SessionManager::from_config(&cfg, transport, timer.clone());
        assert_eq!(mgr.watchdog().window(), Duration::from_secs(90));

        mgr.sign_in(session("u-1", "tok"));
        timer.advance(Duration::from_secs(89));
        assert!(mgr.store().is_signed_in());
        timer.advance(Duration::from_secs(1));
        assert!(!mgr.store().is_signed_in());
    }

    #[tokio::test]
    async fn stub_provider_never_signs_in() {
        let stub = StubAuthProvider;
        assert_eq!(stub.fetch_user("anything").await, Err(AuthError::NotConfigured));
        assert!(stub.sign_out("anything").await.is_ok());
    }
}
