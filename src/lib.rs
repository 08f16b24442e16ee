// Bluesky Session - library root

pub mod auth;
pub mod config;
pub mod error;
pub mod http_client;

pub use auth::{ApiRequest, AuthSession, BootstrapSource, FileStore, MemoryStore, SessionStore, Tokens};
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use http_client::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
