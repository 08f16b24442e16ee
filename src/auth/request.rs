// Guarded call request description

use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, SessionError};
use crate::http_client::HttpRequest;

/// One logical XRPC call. Reused unchanged for every attempt of a guarded call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint: String,
    pub method: Method,
    pub params: Vec<(String, String)>,
    pub json: Option<Value>,
    pub body: Option<Vec<u8>>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            params: Vec::new(),
            json: None,
            body: None,
            headers: Vec::new(),
        }
    }

    /// XRPC query
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// XRPC procedure
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// Parse a method name such as "get" or "POST"
    pub fn with_method_name(mut self, method: &str) -> Result<Self> {
        self.method = Method::from_bytes(method.trim().to_uppercase().as_bytes())
            .map_err(|_| SessionError::InvalidRequest(format!("Invalid HTTP method: {}", method)))?;
        Ok(self)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Raw body with its content type, e.g. for `com.atproto.repo.uploadBlob`
    pub fn with_body(mut self, body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        self.body = Some(body.into());
        self.with_header("Content-Type", content_type)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the HTTP request for one attempt
    pub(crate) fn to_http(
        &self,
        url: String,
        timeout: Duration,
        access_token: Option<&str>,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(self.method.clone(), url, timeout);
        for (name, value) in &self.headers {
            request.set_header(name, value.clone());
        }
        if let Some(token) = access_token {
            request.set_header("Authorization", format!("Bearer {}", token));
        }
        request.query = self.params.clone();
        request.json = self.json.clone();
        request.body = self.body.clone();
        request
    }
}
