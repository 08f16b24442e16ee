use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use secrecy::{ExposeSecret, SecretString};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SessionError;

/// Default XRPC base for the public Bluesky PDS
pub const DEFAULT_BASE_URL: &str = "https://bsky.social/xrpc";

/// Statuses treated as "token expired or invalid" by default.
/// The server has been seen answering 400 for a stale token, so 400 is included.
pub const DEFAULT_AUTH_FAILURE_STATUSES: [u16; 2] = [401, 400];

/// Bluesky Session - command line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Account handle used as the login identifier
    #[arg(short = 'u', long, env = "BSKY_HANDLE")]
    pub handle: Option<String>,

    /// Application password (prompted when omitted)
    #[arg(short = 'p', long, env = "BSKY_APP_PASSWORD", hide_env_values = true)]
    pub app_password: Option<String>,

    /// File where session tokens are stored
    #[arg(short = 's', long, env = "BSKY_SESSION_FILE")]
    pub session_file: Option<String>,

    /// XRPC base URL
    #[arg(long, env = "BSKY_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "BSKY_REQUEST_TIMEOUT", default_value = "10")]
    pub request_timeout: u64,

    /// Recovery attempts per call after an auth failure
    #[arg(long, env = "BSKY_RETRY_BUDGET", default_value = "1")]
    pub retry_budget: u32,

    /// Only treat 401 as an auth failure (do not recover on 400)
    #[arg(long)]
    pub strict_auth_status: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Load or create a session and print the account DID
    Login,

    /// Make an authenticated XRPC call and print the JSON result
    Call {
        /// Endpoint name, e.g. app.bsky.actor.getProfile
        endpoint: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(long)]
        json: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Extra header as name:value (repeatable)
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Exchange the refresh token for a new token pair
    Refresh,

    /// Clear the session and delete the session file
    Logout,
}

impl CliArgs {
    /// Load arguments with priority: CLI > ENV (.env included) > defaults
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    /// Build the session configuration, prompting for missing credentials
    pub fn session_config(&self) -> Result<SessionConfig> {
        let session_file = self
            .session_file
            .as_deref()
            .map(expand_tilde)
            .context("BSKY_SESSION_FILE is required (use -s or set BSKY_SESSION_FILE env var)")?;

        let handle = match self.handle.clone() {
            Some(handle) => handle,
            None => prompt_handle()?,
        };

        let app_password = match self.app_password.clone() {
            Some(password) => SecretString::from(password),
            None => prompt_app_password()?,
        };

        let mut config = SessionConfig::new(handle, app_password, session_file)
            .with_base_url(self.base_url.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout))
            .with_retry_budget(self.retry_budget);

        if self.strict_auth_status {
            config = config.with_auth_failure_statuses(vec![401]);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for one authenticated session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// XRPC base URL, without a trailing slash
    pub base_url: String,

    /// Handle or email sent as `identifier`
    pub identity: String,

    /// Application password; held in memory only
    pub app_password: SecretString,

    /// Where the session tokens are persisted
    pub session_file: PathBuf,

    pub request_timeout: Duration,
    pub connect_timeout: Duration,

    /// Recovery attempts per guarded call
    pub retry_budget: u32,

    /// Response statuses that trigger token recovery
    pub auth_failure_statuses: Vec<u16>,

    pub user_agent: String,
}

impl SessionConfig {
    pub fn new(
        identity: impl Into<String>,
        app_password: impl Into<SecretString>,
        session_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            identity: identity.into(),
            app_password: app_password.into(),
            session_file: session_file.into(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            retry_budget: 1,
            auth_failure_statuses: DEFAULT_AUTH_FAILURE_STATUSES.to_vec(),
            user_agent: format!("bsky-session/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn with_auth_failure_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.auth_failure_statuses = statuses;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check if a response status should trigger token recovery
    pub fn is_auth_failure(&self, status: u16) -> bool {
        self.auth_failure_statuses.contains(&status)
    }

    /// Full URL for an XRPC endpoint
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), SessionError> {
        if self.base_url.is_empty() {
            return Err(SessionError::Config("base URL must not be empty".to_string()));
        }
        if self.identity.trim().is_empty() {
            return Err(SessionError::Config("identity must not be empty".to_string()));
        }
        if self.app_password.expose_secret().is_empty() {
            return Err(SessionError::Config("app password must not be empty".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(SessionError::Config("request timeout must be greater than zero".to_string()));
        }
        if self.session_file.as_os_str().is_empty() {
            return Err(SessionError::Config("session file must not be empty".to_string()));
        }
        if let Some(status) = self
            .auth_failure_statuses
            .iter()
            .find(|s| !(100..=599).contains(*s))
        {
            return Err(SessionError::Config(format!(
                "invalid auth failure status: {}",
                status
            )));
        }
        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a `key=value` query parameter
fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

/// Parse a `name:value` header
fn parse_header(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name:value, got '{}'", s))
}

fn prompt_handle() -> Result<String> {
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("BSKY_HANDLE is required (use -u or set BSKY_HANDLE env var)");
    }
    Input::new()
        .with_prompt("Bluesky handle")
        .interact_text()
        .context("Failed to read handle")
}

fn prompt_app_password() -> Result<SecretString> {
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("BSKY_APP_PASSWORD is required (use -p or set BSKY_APP_PASSWORD env var)");
    }
    let password: String = Password::new()
        .with_prompt("App password")
        .interact()
        .context("Failed to read app password")?;
    Ok(SecretString::from(password))
}
