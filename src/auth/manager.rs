use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::exchange;
use super::request::ApiRequest;
use super::store::{FileStore, SessionStore};
use super::types::{BootstrapSource, Tokens};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::http_client::{ReqwestTransport, Transport};

/// Authenticated session
/// Loads or creates tokens at construction, keeps storage in sync with every
/// token change, and recovers from auth failures on guarded calls.
///
/// All token mutations hold the write lock for their whole duration, so at
/// most one create/refresh/logout is in flight per instance.
pub struct AuthSession {
    config: SessionConfig,

    /// HTTP capability
    transport: Arc<dyn Transport>,

    /// Durable copy of `tokens`
    store: Arc<dyn SessionStore>,

    /// Current tokens
    tokens: RwLock<Tokens>,

    /// Whether bootstrap loaded or created the session
    source: BootstrapSource,
}

impl AuthSession {
    /// Bootstrap a session over HTTP with a file at `config.session_file`
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::from_config(&config)?);
        let store = Arc::new(FileStore::new(config.session_file.clone()));
        Self::with_parts(config, transport, store).await
    }

    /// Bootstrap a session over caller-provided transport and storage
    pub async fn with_parts(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        config.validate()?;

        let mut session = Self {
            config,
            transport,
            store,
            tokens: RwLock::new(Tokens::default()),
            source: BootstrapSource::Loaded,
        };
        session.bootstrap().await?;
        Ok(session)
    }

    async fn bootstrap(&mut self) -> Result<()> {
        match self.load().await {
            Ok(Some(tokens)) => {
                tracing::info!("Session loaded from {}", self.store.location());
                *self.tokens.get_mut() = tokens;
                self.source = BootstrapSource::Loaded;
                return Ok(());
            }
            Ok(None) => {
                tracing::info!(
                    "No existing session found at {}. Creating a new session.",
                    self.store.location()
                );
            }
            Err(e) => {
                tracing::warn!("Failed to load session: {}", e);
                tracing::info!("Creating a new session.");
            }
        }

        {
            let mut tokens = self.tokens.write().await;
            self.create_locked(&mut tokens).await?;
        }
        self.source = BootstrapSource::Created;
        Ok(())
    }

    /// Run a store operation on the blocking pool
    async fn with_store<T, F>(&self, op: F) -> std::io::Result<T>
    where
        F: FnOnce(&dyn SessionStore) -> std::io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    /// Read and decode persisted tokens
    async fn load(&self) -> Result<Option<Tokens>> {
        let bytes = self
            .with_store(|store| store.read())
            .await
            .map_err(|source| SessionError::Persistence {
                location: self.store.location(),
                source,
            })?;

        match bytes {
            Some(bytes) => Tokens::decode(&bytes)
                .map(Some)
                .map_err(SessionError::MalformedState),
            None => Ok(None),
        }
    }

    async fn persist(&self, tokens: &Tokens) -> Result<()> {
        let location = self.store.location();
        let bytes = tokens.encode().map_err(|e| SessionError::Persistence {
            location: location.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        self.with_store(move |store| store.write(&bytes))
            .await
            .map_err(|source| {
                tracing::error!("Failed to save session to {}: {}", location, source);
                SessionError::Persistence { location: location.clone(), source }
            })?;

        tracing::info!("Session saved to {}", location);
        Ok(())
    }

    /// Write-through: storage first, then memory
    async fn commit(&self, current: &mut Tokens, next: Tokens) -> Result<()> {
        self.persist(&next).await?;
        *current = next;
        Ok(())
    }

    async fn create_locked(&self, current: &mut Tokens) -> Result<()> {
        let next = exchange::create_session(self.transport.as_ref(), &self.config).await?;
        self.commit(current, next).await?;
        tracing::info!("New session created.");
        Ok(())
    }

    async fn refresh_locked(&self, current: &mut Tokens) -> Result<()> {
        let next = exchange::refresh_session(self.transport.as_ref(), &self.config, current).await?;
        self.commit(current, next).await?;
        tracing::info!("Access token refreshed successfully.");
        Ok(())
    }

    /// Refresh, falling back to Create when Refresh is unavailable or fails
    async fn recover_locked(&self, current: &mut Tokens) -> Result<()> {
        match self.refresh_locked(current).await {
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Failed to refresh token: {}", e);
                tracing::info!("Creating a new session.");
                self.create_locked(current).await
            }
            other => other,
        }
    }

    /// Exchange identity + app password for new tokens
    pub async fn create_session(&self) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        self.create_locked(&mut tokens).await
    }

    /// Exchange the refresh token for new tokens (no fallback)
    pub async fn refresh_session(&self) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        self.refresh_locked(&mut tokens).await
    }

    /// Refresh, or create a new session if refreshing is not possible
    pub async fn recover(&self) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        self.recover_locked(&mut tokens).await
    }

    /// Recover unless another task already replaced the rejected token
    async fn recover_after(&self, rejected: Option<&str>) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        if tokens.access_token.as_deref() != rejected {
            tracing::debug!("Access token already replaced, retrying with the new one");
            return Ok(());
        }
        self.recover_locked(&mut tokens).await
    }

    /// Clear tokens and delete the persisted session.
    /// Memory is cleared even when the delete fails.
    pub async fn logout(&self) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        *tokens = Tokens::default();

        match self.with_store(|store| store.delete()).await {
            Ok(true) => tracing::info!("Session deleted from {}", self.store.location()),
            Ok(false) => tracing::debug!("No session stored at {}", self.store.location()),
            Err(source) => {
                tracing::error!("Error deleting session at {}: {}", self.store.location(), source);
                return Err(SessionError::Persistence {
                    location: self.store.location(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Make an authenticated call, recovering from auth failures within the retry budget
    pub async fn call(&self, request: ApiRequest) -> Result<Value> {
        let url = self.config.endpoint_url(&request.endpoint);
        let mut budget = self.config.retry_budget;
        let mut recoveries = 0u32;

        loop {
            let access_token = self.tokens.read().await.access_token.clone();
            let http = request.to_http(url.clone(), self.config.request_timeout, access_token.as_deref());

            tracing::debug!(
                method = %request.method,
                endpoint = %request.endpoint,
                attempt = recoveries + 1,
                "Executing authenticated call"
            );

            let response = self.transport.send(http).await.map_err(|e| {
                tracing::error!("Error during API call: {}", e);
                e
            })?;
            let status = response.status;

            if self.config.is_auth_failure(status) {
                if budget > 0 {
                    tracing::warn!(
                        status = status,
                        "Token potentially expired or invalid. Attempting to refresh."
                    );
                    self.recover_after(access_token.as_deref()).await?;
                    budget -= 1;
                    recoveries += 1;
                    continue;
                }

                if recoveries > 0 {
                    let body = SessionError::truncate_body(&response.text());
                    tracing::error!(
                        status = status,
                        attempts = recoveries,
                        "Authentication still rejected after recovery"
                    );
                    return Err(SessionError::AuthFailureExhausted {
                        status,
                        attempts: recoveries,
                        body,
                    });
                }
            }

            if !response.is_success() {
                let body = SessionError::truncate_body(&response.text());
                tracing::error!(
                    status = status,
                    url = %url,
                    response_body = %body,
                    "API call failed with error response"
                );
                return Err(SessionError::Api { status, body });
            }

            return response
                .json()
                .map_err(|e| SessionError::InvalidResponse(format!("{}: {}", request.endpoint, e)));
        }
    }

    /// Guarded call deserialized into `T`
    pub async fn call_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let endpoint = request.endpoint.clone();
        let value = self.call(request).await?;
        serde_json::from_value(value)
            .map_err(|e| SessionError::InvalidResponse(format!("{}: {}", endpoint, e)))
    }

    /// `Authorization` header value for the current access token
    pub async fn auth_header(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .access_token
            .as_ref()
            .map(|t| format!("Bearer {}", t))
    }

    /// Snapshot of the current tokens
    pub async fn tokens(&self) -> Tokens {
        self.tokens.read().await.clone()
    }

    /// Account DID
    pub async fn did(&self) -> Option<String> {
        self.tokens.read().await.subject_id.clone()
    }

    pub fn bootstrap_source(&self) -> BootstrapSource {
        self.source
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("identity", &self.config.identity)
            .field("store", &self.store.location())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
