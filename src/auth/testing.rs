// Test doubles for the transport and store seams

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::store::{MemoryStore, SessionStore};
use crate::error::{Result, SessionError};
use crate::http_client::{HttpRequest, HttpResponse, Transport};

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// Transport that records requests and answers from a queue or a handler
pub(crate) struct ScriptedTransport {
    queue: Mutex<VecDeque<Result<HttpResponse>>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_handler(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    pub(crate) fn respond(self, status: u16, body: &str) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub(crate) fn fail(self, kind: &'static str) -> Self {
        self.queue.lock().unwrap().push_back(Err(SessionError::Transport {
            kind,
            message: format!("simulated {}", kind),
        }));
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Last path segment of every request, in send order
    pub(crate) fn endpoints(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.url.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(handler) = &self.handler {
            return handler(&request);
        }
        self.queue.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(SessionError::Transport {
                kind: "unknown",
                message: format!("no scripted response for {}", request.url),
            })
        })
    }
}

/// MemoryStore whose writes and deletes can be switched to fail
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn with_blob(bytes: &[u8]) -> Self {
        Self {
            inner: MemoryStore::with_blob(bytes),
            ..Self::default()
        }
    }
}

impl SessionStore for FlakyStore {
    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        self.inner.read()
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only store"));
        }
        self.inner.write(bytes)
    }

    fn delete(&self) -> io::Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "file locked"));
        }
        self.inner.delete()
    }

    fn location(&self) -> String {
        "flaky-memory".to_string()
    }
}

/// Body of a successful createSession/refreshSession response
pub(crate) fn session_body(access: &str, refresh: Option<&str>, did: &str) -> String {
    serde_json::json!({
        "accessJwt": access,
        "refreshJwt": refresh,
        "did": did,
        "handle": "alice.test",
    })
    .to_string()
}
