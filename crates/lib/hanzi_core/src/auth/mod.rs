//! Session lifecycle.
//!
//! [`SessionManager`] is the single owner of authentication state. It exposes
//! that state two ways:
//!
//! - [`SessionManager::watch`]: a `watch` receiver that always holds the
//!   current [`AuthState`].
//! - [`SessionManager::subscribe`]: a callback invoked for every
//!   [`AuthChange`]. The returned [`AuthSubscription`] stops delivery when
//!   dropped.
//!
//! Both channels belong to the manager instance, so two managers never share
//! listeners.

pub mod cache;

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{AuthProvider, SignUp, SignUpOutcome};
use crate::error::{Error, Result};
use crate::models::{Session, User};

pub use cache::{FileSessionCache, MemorySessionCache, SessionCache};

/// Buffered auth changes per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 32;

/// Current authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The cached session has not been checked yet.
    Loading,
    SignedOut,
    SignedIn(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The state was first resolved, either by `restore` or on subscribe.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// A change delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub user: Option<User>,
}

/// Handle for a listener registered with [`SessionManager::subscribe`].
///
/// The listener stops when the handle is dropped.
#[must_use = "dropping the subscription stops the callback"]
#[derive(Debug)]
pub struct AuthSubscription {
    task: JoinHandle<()>,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owns the signed-in session and tells listeners when it changes.
pub struct SessionManager {
    provider: Arc<dyn AuthProvider>,
    cache: Arc<dyn SessionCache>,
    state: watch::Sender<AuthState>,
    events: broadcast::Sender<AuthChange>,
    /// Serializes token refreshes and sign-out. Refresh tokens are single use.
    refreshing: Mutex<()>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn AuthProvider>, cache: Arc<dyn SessionCache>) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            provider,
            cache,
            state,
            events,
            refreshing: Mutex::new(()),
        }
    }

    /// A manager whose session lives only as long as the process.
    pub fn in_memory(provider: Arc<dyn AuthProvider>) -> Self {
        Self::new(provider, Arc::new(MemorySessionCache::new()))
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// The current session, refreshed first if its access token has expired.
    ///
    /// Fails with [`Error::Unauthenticated`] when nobody is signed in.
    pub async fn require_session(&self) -> Result<Session> {
        let session = self.current_session().ok_or(Error::Unauthenticated)?;
        if !session.is_expired() {
            return Ok(session);
        }
        debug!(user_id = %session.user.id, "access token expired, refreshing");
        self.refresh().await
    }

    /// Calls `callback` for every subsequent auth change.
    ///
    /// If the state is already resolved the callback first receives an
    /// [`AuthEvent::InitialSession`] for it. Must be called inside a tokio
    /// runtime.
    pub fn subscribe<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(&AuthChange) + Send + 'static,
    {
        let mut rx = self.events.subscribe();
        let initial = match &*self.state.borrow() {
            AuthState::Loading => None,
            resolved => Some(AuthChange {
                event: AuthEvent::InitialSession,
                user: resolved.user().cloned(),
            }),
        };

        let task = tokio::spawn(async move {
            if let Some(change) = initial {
                callback(&change);
            }
            loop {
                match rx.recv().await {
                    Ok(change) => callback(&change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth subscriber fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        AuthSubscription { task }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Resolves the cached session, if any, against the identity provider.
    ///
    /// A rejected or unreadable cache resolves to signed-out and is cleared.
    /// A transport failure also resolves to signed-out but keeps the cache, so
    /// a later restore can try again, and the error is returned.
    pub async fn restore(&self) -> Result<Option<Session>> {
        let cached = match self.cache.load().await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "discarding unreadable session cache");
                self.cache.clear().await?;
                None
            }
        };

        let resolved = match cached {
            None => Ok(None),
            Some(session) => self.validate(session).await,
        };

        match resolved {
            Ok(Some(session)) => {
                self.cache.save(&session).await?;
                info!(user_id = %session.user.id, "session restored");
                self.transition(AuthState::SignedIn(session.clone()), AuthEvent::InitialSession);
                Ok(Some(session))
            }
            Ok(None) => {
                self.cache.clear().await?;
                debug!("no session to restore");
                self.transition(AuthState::SignedOut, AuthEvent::InitialSession);
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "could not validate cached session");
                self.transition(AuthState::SignedOut, AuthEvent::InitialSession);
                Err(e)
            }
        }
    }

    /// Password sign-in.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::Validation("email and password are required".into()));
        }
        let session = self.provider.sign_in(email, password).await?;
        self.cache.save(&session).await?;
        info!(user_id = %session.user.id, "signed in");
        self.transition(AuthState::SignedIn(session.clone()), AuthEvent::SignedIn);
        Ok(session)
    }

    /// Creates an account. When the provider returns a session right away
    /// the user is signed in.
    pub async fn sign_up(&self, request: SignUp) -> Result<SignUpOutcome> {
        let request = SignUp {
            email: request.email.trim().to_string(),
            ..request
        };
        if request.email.is_empty() || request.password.is_empty() {
            return Err(Error::Validation("email and password are required".into()));
        }
        let outcome = self.provider.sign_up(&request).await?;
        match &outcome.session {
            Some(session) => {
                self.cache.save(session).await?;
                info!(user_id = %session.user.id, "signed up");
                self.transition(AuthState::SignedIn(session.clone()), AuthEvent::SignedIn);
            }
            None => info!(user_id = %outcome.user.id, "signed up, awaiting confirmation"),
        }
        Ok(outcome)
    }

    /// Signs out. Local state is cleared even if the provider call fails; the
    /// provider error is still returned.
    pub async fn sign_out(&self) -> Result<()> {
        // Waits out an in-flight refresh so it cannot sign the user back in.
        let _guard = self.refreshing.lock().await;
        let Some(session) = self.current_session() else {
            return Ok(());
        };
        let remote = self.provider.sign_out(&session).await;
        if let Err(e) = &remote {
            warn!(error = %e, "remote sign-out failed, clearing local session anyway");
        }
        self.cache.clear().await?;
        info!(user_id = %session.user.id, "signed out");
        self.transition(AuthState::SignedOut, AuthEvent::SignedOut);
        remote
    }

    /// Exchanges the refresh token for a new session.
    ///
    /// A rejected refresh token signs the user out locally.
    pub async fn refresh(&self) -> Result<Session> {
        let _guard = self.refreshing.lock().await;
        // Read after locking: a concurrent refresh may have replaced the token.
        let current = self.current_session().ok_or(Error::Unauthenticated)?;

        match self.provider.refresh(&current.refresh_token).await {
            Ok(session) => {
                self.cache.save(&session).await?;
                debug!(user_id = %session.user.id, "token refreshed");
                self.transition(AuthState::SignedIn(session.clone()), AuthEvent::TokenRefreshed);
                Ok(session)
            }
            Err(e @ (Error::Auth(_) | Error::Unauthenticated)) => {
                warn!(error = %e, "refresh rejected, signing out");
                self.cache.clear().await?;
                self.transition(AuthState::SignedOut, AuthEvent::SignedOut);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Sends a password-recovery email.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::Validation("email is required".into()));
        }
        self.provider.recover(email).await?;
        info!("password recovery requested");
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// `Ok(None)` when the provider rejects both the access and the refresh token.
    async fn validate(&self, cached: Session) -> Result<Option<Session>> {
        if !cached.is_expired() {
            match self.provider.get_user(&cached.access_token).await {
                Ok(user) => return Ok(Some(Session { user, ..cached })),
                Err(Error::Auth(_) | Error::Unauthenticated) => {
                    debug!("cached access token rejected, trying refresh");
                }
                Err(e) => return Err(e),
            }
        }
        match self.provider.refresh(&cached.refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(Error::Auth(_) | Error::Unauthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn transition(&self, state: AuthState, event: AuthEvent) {
        let user = state.user().cloned();
        self.state.send_replace(state);
        // No receivers is fine.
        let _ = self.events.send(AuthChange { event, user });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::mpsc;

    use super::*;
    use crate::backend::memory::MemoryBackend;

    async fn manager_with_account() -> (SessionManager, MemoryBackend) {
        let backend = MemoryBackend::new();
        backend.add_account("a@b.c", "password1").await;
        (SessionManager::in_memory(Arc::new(backend.clone())), backend)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<AuthChange>) -> AuthChange {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no auth change delivered")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn starts_loading() {
        let (manager, _) = manager_with_account().await;
        assert!(manager.state().is_loading());
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn require_session_without_sign_in_is_unauthenticated() {
        let (manager, _) = manager_with_account().await;
        assert!(matches!(
            manager.require_session().await,
            Err(Error::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_an_auth_error() {
        let (manager, _) = manager_with_account().await;
        let err = manager.sign_in("a@b.c", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn blank_credentials_never_reach_the_provider() {
        let (manager, _) = manager_with_account().await;
        assert!(matches!(
            manager.sign_in("  ", "x").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn subscribers_see_sign_in_and_sign_out() {
        let (manager, _) = manager_with_account().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = manager.subscribe(move |change| {
            let _ = tx.send(change.clone());
        });

        manager.sign_in("a@b.c", "password1").await.unwrap();
        let change = next(&mut rx).await;
        assert_eq!(change.event, AuthEvent::SignedIn);
        assert_eq!(change.user.unwrap().email, "a@b.c");

        manager.sign_out().await.unwrap();
        let change = next(&mut rx).await;
        assert_eq!(change.event, AuthEvent::SignedOut);
        assert!(change.user.is_none());
        assert_eq!(manager.state(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn dropped_subscription_stops_callbacks() {
        let (manager, _) = manager_with_account().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = manager.subscribe(move |change| {
            let _ = tx.send(change.clone());
        });
        sub.unsubscribe();

        manager.sign_in("a@b.c", "password1").await.unwrap();
        // The sender was owned by the aborted task, so the channel closes
        // without delivering anything.
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("channel should close");
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn late_subscriber_gets_initial_session() {
        let (manager, _) = manager_with_account().await;
        manager.sign_in("a@b.c", "password1").await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = manager.subscribe(move |change| {
            let _ = tx.send(change.clone());
        });
        let change = next(&mut rx).await;
        assert_eq!(change.event, AuthEvent::InitialSession);
        assert!(change.user.is_some());
    }

    #[tokio::test]
    async fn watch_observes_transitions() {
        let (manager, _) = manager_with_account().await;
        let mut rx = manager.watch();
        manager.sign_in("a@b.c", "password1").await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().session().is_some());
    }

    #[tokio::test]
    async fn restore_without_cache_is_signed_out() {
        let (manager, _) = manager_with_account().await;
        assert_eq!(manager.restore().await.unwrap(), None);
        assert_eq!(manager.state(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn restore_with_valid_cache_is_signed_in() {
        let backend = MemoryBackend::new();
        backend.add_account("a@b.c", "password1").await;
        let session = backend.sign_in("a@b.c", "password1").await.unwrap();
        let cache = Arc::new(MemorySessionCache::with_session(session.clone()));
        let manager = SessionManager::new(Arc::new(backend), cache);

        let restored = manager.restore().await.unwrap().unwrap();
        assert_eq!(restored.user, session.user);
        assert_eq!(manager.current_user(), Some(session.user));
    }

    #[tokio::test]
    async fn restore_refreshes_an_expired_cache() {
        let backend = MemoryBackend::new();
        backend.add_account("a@b.c", "password1").await;
        let mut session = backend.sign_in("a@b.c", "password1").await.unwrap();
        session.expires_at = Utc::now() - chrono::Duration::minutes(1);
        let cache = Arc::new(MemorySessionCache::with_session(session.clone()));
        let manager = SessionManager::new(Arc::new(backend), cache.clone());

        let restored = manager.restore().await.unwrap().unwrap();
        assert_ne!(restored.access_token, session.access_token);
        assert_eq!(cache.load().await.unwrap(), Some(restored));
    }

    #[tokio::test]
    async fn restore_with_revoked_cache_clears_it() {
        let backend = MemoryBackend::new();
        backend.add_account("a@b.c", "password1").await;
        let session = backend.sign_in("a@b.c", "password1").await.unwrap();
        backend.sign_out(&session).await.unwrap();
        let cache = Arc::new(MemorySessionCache::with_session(session));
        let manager = SessionManager::new(Arc::new(backend), cache.clone());

        assert_eq!(manager.restore().await.unwrap(), None);
        assert_eq!(manager.state(), AuthState::SignedOut);
        assert!(cache.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_on_demand() {
        let (manager, backend) = manager_with_account().await;
        let mut session = backend.sign_in("a@b.c", "password1").await.unwrap();
        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        manager.transition(AuthState::SignedIn(session.clone()), AuthEvent::SignedIn);

        let fresh = manager.require_session().await.unwrap();
        assert!(!fresh.is_expired());
        assert_ne!(fresh.refresh_token, session.refresh_token);
    }

    #[tokio::test]
    async fn reset_password_reaches_the_provider() {
        let (manager, backend) = manager_with_account().await;
        manager.reset_password(" a@b.c ").await.unwrap();
        assert_eq!(backend.recovery_requests().await, vec!["a@b.c".to_string()]);
        assert!(matches!(
            manager.reset_password("").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn sign_up_signs_in_when_a_session_is_issued() {
        let backend = MemoryBackend::new();
        let manager = SessionManager::in_memory(Arc::new(backend));
        let outcome = manager
            .sign_up(SignUp {
                email: "new@b.c".into(),
                password: "password1".into(),
                username: Some("new".into()),
            })
            .await
            .unwrap();
        assert!(outcome.session.is_some());
        assert_eq!(manager.current_user().unwrap().email, "new@b.c");
    }

    /// Memory provider whose refreshes take a while.
    struct SlowRefresh(MemoryBackend);

    #[async_trait::async_trait]
    impl AuthProvider for SlowRefresh {
        async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
            self.0.sign_in(email, password).await
        }

        async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome> {
            self.0.sign_up(request).await
        }

        async fn sign_out(&self, session: &Session) -> Result<()> {
            self.0.sign_out(session).await
        }

        async fn get_user(&self, access_token: &str) -> Result<User> {
            self.0.get_user(access_token).await
        }

        async fn refresh(&self, refresh_token: &str) -> Result<Session> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.0.refresh(refresh_token).await
        }

        async fn recover(&self, email: &str) -> Result<()> {
            self.0.recover(email).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_during_refresh_ends_signed_out() {
        let backend = MemoryBackend::new();
        backend.add_account("a@b.c", "password1").await;
        let manager = Arc::new(SessionManager::in_memory(Arc::new(SlowRefresh(backend))));
        manager.sign_in("a@b.c", "password1").await.unwrap();

        let refreshing = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.sign_out().await.unwrap();

        assert!(refreshing.await.unwrap().is_ok());
        assert_eq!(manager.state(), AuthState::SignedOut);
        assert!(manager.current_session().is_none());
    }
}
