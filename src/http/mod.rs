//! Resilient request pipeline: the single choke point for backend calls.
//!
//! Each attempt races the transport against a timeout (or a caller-supplied
//! cancellation token, which replaces the timeout). Failures are classified into
//! [`ApiError`]; transient ones (network, own timeout, 5xx) are resubmitted with
//! linear backoff until the retry budget runs out. 4xx is never retried.
//!
//! The pipeline does not attach credentials and does not react to 401 beyond
//! logging it; both are the caller's concern. Requests are resent verbatim, so a
//! non-idempotent call may reach the server more than once.

pub mod error;
pub mod transport;

pub use error::{extract_detail, ApiError};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};

use async_trait::async_trait;
use futures::future::{select, Either};
use serde::de::DeserializeOwned;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Suspension point used for backoff and for the per-attempt timeout.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the platform timer (tokio natively, `setTimeout` on wasm32).
#[derive(Clone, Copy, Debug, Default)]
pub struct PlatformSleeper;

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Sleeper for PlatformSleeper {
    async fn sleep(&self, duration: Duration) {
        crate::platform::sleep(duration).await;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.retry_base_delay_ms),
            timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }
}

/// Linear backoff: the n-th retry waits `base * n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base.saturating_mul(retry)
    }

    /// Full wait schedule for `retries` retries.
    pub fn schedule(&self, retries: u32) -> Vec<Duration> {
        (1..=retries).map(|n| self.delay_for(n)).collect()
    }
}

/// Per-call request descriptor.
#[derive(Clone, Debug)]
pub struct RequestOptions {
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: Vec::new(),
            body: None,
            timeout: None,
            max_retries: None,
            cancel: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    pub fn patch() -> Self {
        Self::new(Method::Patch)
    }

    pub fn delete() -> Self {
        Self::new(Method::Delete)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds `Authorization: Bearer <token>`.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    /// Adds `Authorization` only when a token is present.
    pub fn bearer_opt(self, token: Option<&str>) -> Self {
        match token {
            Some(t) if !t.is_empty() => self.bearer(t),
            _ => self,
        }
    }

    /// JSON body plus `Content-Type: application/json`.
    pub fn json(self, body: &serde_json::Value) -> Self {
        let mut opts = self.header("Content-Type", "application/json");
        opts.body = Some(body.to_string());
        opts
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Caller-owned cancellation. When set, the pipeline's own timeout is not applied.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport: Arc::new(ReqwestTransport::new()),
            sleeper: Arc::new(PlatformSleeper),
            policy: RetryPolicy::default(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.api_base_url.clone()).with_policy(RetryPolicy::from_config(cfg))
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(path, RequestOptions::get()).await
    }

    /// Issues `BASE_URL + path`, retrying transient failures, and decodes the body as `T`.
    ///
    /// An empty success body decodes as JSON `null` (so `()` and `Option<_>` work for 204s).
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        let resp = self.execute(path, opts).await?;
        decode_body(&resp.body)
    }

    /// Runs the retry loop and returns the raw successful response.
    pub async fn execute(&self, path: &str, opts: RequestOptions) -> Result<HttpResponse, ApiError> {
        let max_retries = opts.max_retries.unwrap_or(self.policy.max_retries);
        let timeout = opts.timeout.unwrap_or(self.policy.timeout);
        let backoff = Backoff::new(self.policy.base_delay);
        let req = HttpRequest {
            method: opts.method,
            url: self.url_for(path),
            headers: opts.headers,
            body: opts.body,
        };
        let cancel = opts.cancel;

        let mut attempt: u32 = 0;
        loop {
            let err = match self.attempt(&req, timeout, cancel.as_ref()).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            let remaining = max_retries.saturating_sub(attempt);
            if !err.is_retryable() || remaining == 0 {
                log_failure(req.method, path, &err);
                return Err(err);
            }

            attempt += 1;
            let delay = backoff.delay_for(attempt);
            log::warn!(
                "[http] {} {} failed: {}; retry {}/{} in {}ms",
                req.method,
                path,
                err,
                attempt,
                max_retries,
                delay.as_millis()
            );
            if !self.pause(delay, cancel.as_ref()).await {
                log::debug!("[http] {} {} cancelled during backoff", req.method, path);
                return Err(ApiError::Aborted);
            }
        }
    }

    async fn attempt(
        &self,
        req: &HttpRequest,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<HttpResponse, ApiError> {
        let send = self.transport.send(req.clone());

        // A dropped `send` future discards any late response.
        let resp = match cancel {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(ApiError::Aborted);
                }
                let cancelled = pin!(token.cancelled());
                match select(send, cancelled).await {
                    Either::Left((res, _)) => res.map_err(ApiError::from)?,
                    Either::Right(_) => return Err(ApiError::Aborted),
                }
            }
            None => {
                let expired = self.sleeper.sleep(timeout);
                match select(send, expired).await {
                    Either::Left((res, _)) => res.map_err(ApiError::from)?,
                    Either::Right(_) => {
                        return Err(ApiError::Timeout {
                            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        })
                    }
                }
            }
        };

        if resp.is_success() {
            Ok(resp)
        } else {
            Err(ApiError::Http {
                status: resp.status,
                detail: extract_detail(resp.status, &resp.status_text, &resp.body),
            })
        }
    }

    /// Backoff wait. Returns false if the caller's token fired first.
    async fn pause(&self, delay: Duration, cancel: Option<&CancellationToken>) -> bool {
        match cancel {
            Some(token) => {
                let cancelled = pin!(token.cancelled());
                matches!(
                    select(self.sleeper.sleep(delay), cancelled).await,
                    Either::Left(_)
                )
            }
            None => {
                self.sleeper.sleep(delay).await;
                true
            }
        }
    }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn log_failure(method: Method, path: &str, err: &ApiError) {
    if err.is_unauthorized() {
        log::info!("[http] {method} {path}: 401 unauthenticated");
    } else {
        log::error!("[http] {method} {path} failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Scripted = Result<HttpResponse, TransportError>;

    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(req);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Connect("script exhausted".into())))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn status(code: u16, text: &str, body: &str) -> Scripted {
        Ok(HttpResponse {
            status: code,
            status_text: text.to_string(),
            body: body.as_bytes().to_vec(),
        })
    }

    fn client(transport: Arc<ScriptedTransport>, sleeper: Arc<RecordingSleeper>) -> ApiClient {
        ApiClient::new("https://api.test/api/v1/")
            .with_transport(transport)
            .with_sleeper(sleeper)
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Health {
        status: String,
    }

    #[test]
    fn backoff_is_linear() {
        let b = Backoff::new(Duration::from_millis(1000));
        assert_eq!(
            b.schedule(3),
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(3000)
            ]
        );
    }

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            status(503, "Service Unavailable", ""),
            status(503, "Service Unavailable", ""),
            status(200, "OK", r#"{"status":"ok"}"#),
        ]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let api = client(transport.clone(), sleeper.clone());

        let health: Health = api.get("/health").await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(transport.calls(), 3);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        let seen = transport.seen.lock().unwrap();
        assert!(seen.iter().all(|r| r.url == "https://api.test/api/v1/health"));
    }

    #[tokio::test]
    async fn client_errors_are_final() {
        let transport = ScriptedTransport::new(vec![status(
            404,
            "Not Found",
            r#"{"detail":"Certification not found"}"#,
        )]);
        let sleeper = Arc::new(RecordingSleeper::default());
        let api = client(transport.clone(), sleeper.clone());

        let err = api.get::<Health>("/certs/999").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.detail(), "Certification not found");
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_propagates() {
        let transport =
            ScriptedTransport::new(vec![status(401, "Unauthorized", r#"{"detail":"Not authenticated"}"#)]);
        let api = client(transport.clone(), Arc::new(RecordingSleeper::default()));
        let err = api
            .request::<Health>("/me/favorites", RequestOptions::get().bearer("expired"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        let seen = transport.seen.lock().unwrap();
        assert!(seen[0]
            .headers
            .contains(&("Authorization".to_string(), "Bearer expired".to_string())));
    }

    #[tokio::test]
    async fn network_errors_exhaust_budget() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".into())),
            Err(TransportError::Connect("refused".into())),
            Err(TransportError::Connect("still refused".into())),
        ]);
        let api = client(transport.clone(), Arc::new(RecordingSleeper::default()));
        let err = api.get::<Health>("/health").await.unwrap_err();
        assert_eq!(err, ApiError::Network("still refused".into()));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn per_call_retry_override() {
        let transport = ScriptedTransport::new(vec![status(500, "Internal Server Error", "")]);
        let api = client(transport.clone(), Arc::new(RecordingSleeper::default()));
        let err = api
            .request::<Health>("/health", RequestOptions::get().max_retries(0))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn empty_body_decodes_as_unit() {
        let transport = ScriptedTransport::new(vec![status(204, "No Content", "")]);
        let api = client(transport, Arc::new(RecordingSleeper::default()));
        api.request::<()>("/me/favorites/3", RequestOptions::delete())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wrong_shape_is_decode_error() {
        let transport = ScriptedTransport::new(vec![status(200, "OK", r#"[1,2,3]"#)]);
        let api = client(transport.clone(), Arc::new(RecordingSleeper::default()));
        let err = api.get::<Health>("/health").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_without_sending() {
        let transport = ScriptedTransport::new(vec![status(200, "OK", "{}")]);
        let api = client(transport.clone(), Arc::new(RecordingSleeper::default()));
        let token = CancellationToken::new();
        token.cancel();
        let err = api
            .request::<serde_json::Value>("/health", RequestOptions::get().cancel_token(token))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Aborted);
        assert!(!err.is_retryable());
    }
}
