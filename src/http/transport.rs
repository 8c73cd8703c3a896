//! Network boundary for the request pipeline.
//!
//! The pipeline only ever talks to a [`Transport`]; [`ReqwestTransport`] is the
//! production implementation (native sockets, or `fetch` on wasm32).

use async_trait::async_trait;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request aborted")]
    Aborted,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Transport: Send + Sync {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError>;
}

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        #[cfg(not(target_arch = "wasm32"))]
        let builder = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true);

        #[cfg(target_arch = "wasm32")]
        let builder = reqwest::Client::builder();

        builder.build().unwrap_or_else(|e| {
            log::warn!("[http] client builder failed ({e}), using defaults");
            reqwest::Client::new()
        })
    })
}

/// `reqwest`-backed transport sharing one process-wide client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: http_client().clone(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Transport for ReqwestTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut rb = self.client.request(method, &req.url);
        for (name, value) in &req.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if let Some(body) = req.body {
            rb = rb.body(body);
        }

        let res = rb
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = res.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = res
            .bytes()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            body: body.to_vec(),
        })
    }
}
