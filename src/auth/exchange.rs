// Token exchange logic (createSession / refreshSession)

use reqwest::Method;
use secrecy::ExposeSecret;

use super::types::{CreateSessionRequest, RefreshSessionRequest, SessionResponse, Tokens};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::http_client::{HttpRequest, Transport};

pub const CREATE_SESSION: &str = "com.atproto.server.createSession";
pub const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";

/// Exchange identity + app password for a new token set
pub async fn create_session(transport: &dyn Transport, config: &SessionConfig) -> Result<Tokens> {
    tracing::info!("Creating session for {}...", config.identity);

    let body = serde_json::to_value(CreateSessionRequest {
        identifier: &config.identity,
        password: config.app_password.expose_secret(),
    })
    .map_err(|e| SessionError::InvalidRequest(e.to_string()))?;

    exchange(transport, config, CREATE_SESSION, body).await
}

/// Exchange the stored refresh token for a new token set.
/// Fails with `MissingCredential` before any network call if there is no refresh token.
pub async fn refresh_session(
    transport: &dyn Transport,
    config: &SessionConfig,
    tokens: &Tokens,
) -> Result<Tokens> {
    let Some(refresh_token) = tokens.refresh_token.as_deref() else {
        tracing::error!("No refresh token available.");
        return Err(SessionError::MissingCredential);
    };

    tracing::info!("Refreshing access token...");

    let body = serde_json::to_value(RefreshSessionRequest { refresh_token })
        .map_err(|e| SessionError::InvalidRequest(e.to_string()))?;

    exchange(transport, config, REFRESH_SESSION, body).await
}

/// POST a session endpoint; every failure is connection-category
async fn exchange(
    transport: &dyn Transport,
    config: &SessionConfig,
    operation: &'static str,
    body: serde_json::Value,
) -> Result<Tokens> {
    let request = HttpRequest::new(
        Method::POST,
        config.endpoint_url(operation),
        config.request_timeout,
    )
    .with_json(body);

    let response = transport.send(request).await.map_err(|e| {
        tracing::error!("{} request failed: {}", operation, e);
        SessionError::Connection {
            operation,
            status: None,
            message: e.to_string(),
        }
    })?;

    if !response.is_success() {
        let error_text = response.text();
        tracing::error!(
            status = response.status,
            body = %SessionError::truncate_body(&error_text),
            "{} failed",
            operation
        );
        return Err(SessionError::connection_status(
            operation,
            response.status,
            &error_text,
        ));
    }

    let data: SessionResponse = serde_json::from_slice(&response.body).map_err(|e| {
        tracing::error!("Failed to parse {} response: {}", operation, e);
        SessionError::Connection {
            operation,
            status: Some(response.status),
            message: format!("Failed to parse response: {}", e),
        }
    })?;

    if data.access_jwt.is_empty() {
        return Err(SessionError::Connection {
            operation,
            status: Some(response.status),
            message: "Response does not contain accessJwt".to_string(),
        });
    }

    Ok(Tokens::from(data))
}
