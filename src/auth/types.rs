// Authentication types

use serde::{Deserialize, Serialize};

/// Session tokens held in memory and mirrored to storage.
///
/// This is also the persisted layout: `accessToken`, `refreshToken` and
/// `subjectId`, each optional. The older `accessJwt` / `refreshJwt` / `did`
/// names are accepted on read, and the current name wins when a blob carries
/// both. Unknown fields are ignored.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredTokens")]
pub struct Tokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub subject_id: Option<String>,
}

/// Persisted record as read, with current and legacy names kept apart
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    subject_id: Option<String>,
    #[serde(default)]
    access_jwt: Option<String>,
    #[serde(default)]
    refresh_jwt: Option<String>,
    #[serde(default)]
    did: Option<String>,
}

impl From<StoredTokens> for Tokens {
    fn from(stored: StoredTokens) -> Self {
        Self {
            access_token: stored.access_token.or(stored.access_jwt),
            refresh_token: stored.refresh_token.or(stored.refresh_jwt),
            subject_id: stored.subject_id.or(stored.did),
        }
    }
}

impl Tokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.subject_id.is_none()
    }

    /// Decode persisted state
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode for persistence
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

impl From<SessionResponse> for Tokens {
    fn from(response: SessionResponse) -> Self {
        Self {
            access_token: Some(response.access_jwt),
            refresh_token: response.refresh_jwt,
            subject_id: Some(response.did),
        }
    }
}

impl std::fmt::Debug for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Tokens")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("subject_id", &self.subject_id)
            .finish()
    }
}

/// How the current tokens were obtained at bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapSource {
    /// Decoded from the session file
    Loaded,
    /// Issued by a fresh createSession call
    Created,
}

/// createSession request
#[derive(Serialize)]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// refreshSession request
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSessionRequest<'a> {
    pub refresh_token: &'a str,
}

/// createSession / refreshSession response
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_jwt: String,
    pub refresh_jwt: Option<String>,
    pub did: String,
}
