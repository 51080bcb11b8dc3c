//! Session lifecycle manager.
//!
//! Handles login, registration, token refresh, logout and session restore.
//! Owns the in-memory [`Session`] and keeps it in step with the [`TokenVault`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::auth::session::{PersistenceScope, Session, SessionEvent};
use crate::auth::tokens::{
    AuthResponse, FederatedLoginRequest, LoginRequest, Registration, RefreshRequest,
    RefreshResponse, TokenPair,
};
use crate::auth::vault::TokenVault;
use crate::config::EndpointsConfig;
use crate::error::{Error, Result, detail_from_body};
use crate::models::User;
use crate::net::{HttpClient, headers, join_url};

const EVENT_CAPACITY: usize = 16;

type InitFuture = Shared<BoxFuture<'static, Result<()>>>;
type SessionHook = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Manages the token pair and the authenticated user.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<Inner>,
}

struct Inner {
    http: HttpClient,
    base_url: String,
    endpoints: EndpointsConfig,
    vault: TokenVault,
    session: RwLock<Session>,
    init_in_flight: Mutex<Option<InitFuture>>,
    events: broadcast::Sender<SessionEvent>,
    hooks: RwLock<Vec<SessionHook>>,
    /// Bumped whenever the token pair is replaced or dropped.
    generation: AtomicU64,
}

impl AuthManager {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        endpoints: EndpointsConfig,
        vault: TokenVault,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into(),
                endpoints,
                vault,
                session: RwLock::new(Session::default()),
                init_in_flight: Mutex::new(None),
                events,
                hooks: RwLock::new(Vec::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // State access
    // -----------------------------------------------------------------------

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.inner.session.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.read().is_authenticated
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.session.read().access_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.session.read().user.clone()
    }

    /// Replace the cached user record, e.g. after a profile update.
    pub fn set_user(&self, user: User) {
        self.inner.session.write().user = Some(user);
    }

    pub fn clear_error(&self) {
        self.inner.session.write().error = None;
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Route the UI should navigate to when sign-in is required.
    pub fn sign_in_route(&self) -> &str {
        &self.inner.endpoints.sign_in_route
    }

    /// Run `hook` synchronously on every session event, before broadcast
    /// subscribers see it.
    pub fn on_session_change(&self, hook: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.inner.hooks.write().push(Arc::new(hook));
    }

    fn publish(&self, event: SessionEvent) {
        let hooks = self.inner.hooks.read().clone();
        for hook in &hooks {
            hook(&event);
        }
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Announce that the user has to sign in again.
    pub(crate) fn require_sign_in(&self) {
        let route = self.inner.endpoints.sign_in_route.clone();
        warn!(%route, "Sign-in required");
        self.publish(SessionEvent::SignInRequired { route });
    }

    // -----------------------------------------------------------------------
    // Login flows
    // -----------------------------------------------------------------------

    /// Log in with email and password.
    ///
    /// `remember` selects the persistence scope of the new pair.
    #[instrument(skip(self, secret))]
    pub async fn login(&self, identifier: &str, secret: &str, remember: bool) -> Result<User> {
        let body = LoginRequest {
            email: identifier,
            password: secret,
            remember_me: remember,
        };
        let attempt = async {
            let response: AuthResponse = self.post_auth(&self.inner.endpoints.login, &body).await?;
            self.establish(response, PersistenceScope::from_remember(remember))
                .await
        };
        self.settle_attempt(attempt, "Login failed").await
    }

    /// Create an account. The new pair is stored in the durable scope.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        let attempt = async {
            let response: AuthResponse = self
                .post_auth(&self.inner.endpoints.register, registration)
                .await?;
            self.establish(response, PersistenceScope::Durable).await
        };
        self.settle_attempt(attempt, "Registration failed").await
    }

    /// Exchange a federated identity token for a session. Durable scope.
    #[instrument(skip(self, token))]
    pub async fn federated_login(&self, token: &str) -> Result<User> {
        let body = FederatedLoginRequest {
            access_token: token,
            provider: "google",
        };
        let attempt = async {
            let response: AuthResponse = self
                .post_auth(&self.inner.endpoints.federated, &body)
                .await?;
            self.establish(response, PersistenceScope::Durable).await
        };
        self.settle_attempt(attempt, "Google login failed").await
    }

    /// Mark the session loading, run the attempt, then record its outcome.
    async fn settle_attempt<F>(&self, attempt: F, fallback: &str) -> Result<User>
    where
        F: Future<Output = Result<User>>,
    {
        {
            let mut session = self.inner.session.write();
            session.is_loading = true;
            session.error = None;
        }

        match attempt.await {
            Ok(user) => Ok(user),
            Err(err) => {
                let message = match &err {
                    Error::Auth(detail) => detail.clone(),
                    _ => fallback.to_string(),
                };
                warn!(error = %err, "{fallback}");
                *self.inner.session.write() = Session {
                    error: Some(message),
                    ..Session::default()
                };
                Err(err)
            }
        }
    }

    /// Persist a fresh pair and populate the session from a login response.
    async fn establish(&self, response: AuthResponse, scope: PersistenceScope) -> Result<User> {
        let user = match response.user {
            Some(user) => user,
            None => self.fetch_profile(&response.access).await?,
        };

        let pair = TokenPair::new(response.access, response.refresh);
        self.inner.vault.store(scope, &pair)?;

        {
            let mut session = self.inner.session.write();
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            *session = Session {
                access_token: Some(pair.access),
                refresh_token: Some(pair.refresh),
                user: Some(user.clone()),
                is_authenticated: true,
                is_loading: false,
                error: None,
                scope: Some(scope),
            };
        }

        info!(username = %user.username, %scope, "Logged in");
        self.publish(SessionEvent::LoggedIn {
            username: user.username.clone(),
        });
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Refresh / logout
    // -----------------------------------------------------------------------

    /// Exchange the refresh token for a new access token.
    ///
    /// Only the access token is replaced, in the scope it was found in. Any
    /// failure logs the session out and yields [`Error::SessionExpired`].
    /// A result that arrives after the pair was replaced or logged out is
    /// discarded.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Result<String> {
        let (stored, started) = {
            let session = self.inner.session.read();
            (
                session.refresh_token.clone(),
                self.inner.generation.load(Ordering::Acquire),
            )
        };
        let Some(refresh) = stored else {
            self.logout();
            return Err(Error::SessionExpired("No refresh token available".into()));
        };

        let url = join_url(&self.inner.base_url, &self.inner.endpoints.refresh);
        let outcome = async {
            let response = self
                .inner
                .http
                .inner()
                .post(&url)
                .headers(headers::request_headers(None, self.inner.http.csrf_token(&url).as_deref()))
                .json(&RefreshRequest { refresh: &refresh })
                .send()
                .await?;
            read_json::<RefreshResponse, _>(response, |status, detail| {
                Error::SessionExpired(detail.unwrap_or_else(|| format!("Refresh rejected ({status})")))
            })
            .await
        }
        .await;

        let access = match outcome {
            Ok(body) => body.access,
            Err(_) if self.is_superseded(started) => {
                return Err(superseded());
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed");
                self.logout();
                return Err(match err {
                    Error::SessionExpired(_) => err,
                    other => Error::SessionExpired(format!("Token refresh failed: {other}")),
                });
            }
        };

        // Checked and written under one session lock.
        let mut session = self.inner.session.write();
        if self.is_superseded(started) {
            drop(session);
            return Err(superseded());
        }

        let scope = match self.inner.vault.locate_access() {
            Ok(Some(scope)) => Some(scope),
            Ok(None) => session.scope,
            Err(e) => {
                warn!(error = %e, "Failed to locate stored access token");
                session.scope
            }
        };
        if let Some(scope) = scope {
            if let Err(e) = self.inner.vault.update_access(scope, &access) {
                warn!(error = %e, %scope, "Failed to persist refreshed token");
            }
        }

        session.access_token = Some(access.clone());
        drop(session);
        info!("Access token refreshed");
        Ok(access)
    }

    fn is_superseded(&self, started: u64) -> bool {
        self.inner.generation.load(Ordering::Acquire) != started
    }

    /// Clear both scopes and reset the session. Idempotent.
    pub fn logout(&self) {
        let was_authenticated = {
            let mut session = self.inner.session.write();
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            let was = session.is_authenticated;
            *session = Session::default();
            was
        };
        if let Err(e) = self.inner.vault.clear() {
            warn!(error = %e, "Token storage not fully cleared");
        }
        if was_authenticated {
            info!("Logged out");
        } else {
            debug!("Logout on unauthenticated session");
        }
        self.publish(SessionEvent::LoggedOut);
    }

    // -----------------------------------------------------------------------
    // Restore
    // -----------------------------------------------------------------------

    /// Restore a persisted session.
    ///
    /// With a stored pair the session is marked authenticated right away, then
    /// validated by fetching the profile; a failed validation logs out.
    /// Concurrent callers share one validation.
    pub async fn initialize_auth(&self) -> Result<()> {
        let validation = {
            let mut slot = self.inner.init_in_flight.lock();
            match slot.as_ref() {
                Some(running) => running.clone(),
                None => {
                    let this = self.clone();
                    let fut = async move {
                        let outcome = this.restore().await;
                        this.inner.init_in_flight.lock().take();
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        validation.await
    }

    async fn restore(&self) -> Result<()> {
        let Some((scope, pair)) = self.inner.vault.load()? else {
            debug!("No stored session");
            *self.inner.session.write() = Session::default();
            return Ok(());
        };

        let started = {
            let mut session = self.inner.session.write();
            let started = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
            *session = Session {
                access_token: Some(pair.access.clone()),
                refresh_token: Some(pair.refresh),
                user: None,
                is_authenticated: true,
                is_loading: true,
                error: None,
                scope: Some(scope),
            };
            started
        };

        let outcome = self.fetch_profile(&pair.access).await;
        if self.is_superseded(started) {
            debug!("Session changed during restore, validation result dropped");
            return Ok(());
        }
        match outcome {
            Ok(user) => {
                info!(username = %user.username, %scope, "Session restored");
                let username = user.username.clone();
                {
                    let mut session = self.inner.session.write();
                    session.user = Some(user);
                    session.is_loading = false;
                }
                self.publish(SessionEvent::LoggedIn { username });
            }
            Err(err) => {
                warn!(error = %err, "Stored session failed validation");
                self.logout();
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    async fn post_auth<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = join_url(&self.inner.base_url, path);
        let response = self
            .inner
            .http
            .inner()
            .post(&url)
            .headers(headers::request_headers(None, self.inner.http.csrf_token(&url).as_deref()))
            .json(body)
            .send()
            .await?;

        read_json(response, |status, detail| match status {
            400 | 401 | 403 | 409 => {
                Error::Auth(detail.unwrap_or_else(|| "Invalid credentials".to_string()))
            }
            _ => Error::from_status(status, detail.unwrap_or_default()),
        })
        .await
    }

    async fn fetch_profile(&self, access: &str) -> Result<User> {
        let url = join_url(&self.inner.base_url, &self.inner.endpoints.profile);
        let response = self
            .inner
            .http
            .inner()
            .get(&url)
            .headers(headers::request_headers(Some(access), None))
            .send()
            .await?;
        read_json(response, |status, detail| {
            Error::from_status(status, detail.unwrap_or_default())
        })
        .await
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("base_url", &self.inner.base_url)
            .field("vault", &self.inner.vault)
            .field("session", &*self.inner.session.read())
            .finish()
    }
}

fn superseded() -> Error {
    debug!("Token refresh result discarded, session changed meanwhile");
    Error::SessionExpired("Session changed during token refresh".into())
}

/// Decode a success body, or classify a failure with `on_error(status, detail)`.
async fn read_json<T, F>(response: reqwest::Response, on_error: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnOnce(u16, Option<String>) -> Error,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(on_error(status.as_u16(), detail_from_body(&body)))
}
