// Authentication module
// Manages token lifecycle, session persistence and guarded calls

mod exchange;
mod manager;
mod request;
mod store;
mod types;

#[cfg(test)]
mod testing;

pub use exchange::{CREATE_SESSION, REFRESH_SESSION};
pub use manager::AuthSession;
pub use request::ApiRequest;
pub use store::{FileStore, MemoryStore, SessionStore};
pub use types::{BootstrapSource, Tokens};
