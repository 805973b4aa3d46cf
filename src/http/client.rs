//! HTTP client adapter
//!
//! Uniform request path for the application:
//!
//! - injects `Authorization: Bearer <token>` from the persisted record
//! - a 401 anywhere clears the persisted record, tears down the session and
//!   navigates to the landing page; the caller sees `SessionEnded`
//! - other non-2xx statuses become `HttpError::Status`
//! - idempotent requests get one retry on timeouts, network errors and
//!   502/503/504 when enabled

use crate::http::error::HttpError;
use crate::http::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::http::{LogNavigator, Navigator, SessionTeardown};
use crate::storage::{keys, StorageSync};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

/// Adapter behavior settings
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Default per-request timeout
    pub timeout: Duration,
    /// Retry idempotent requests once on transient failures
    pub retry_idempotent: bool,
    /// Where to navigate after a 401 teardown
    pub landing_path: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_idempotent: true,
            landing_path: "/".to_string(),
        }
    }
}

/// Per-request overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Override the configured retry policy
    pub retry: Option<bool>,
    /// Credential exchange: no token injection and no 401 teardown
    pub anonymous: bool,
}

impl RequestOptions {
    /// Options for credential-exchange requests (login, registration)
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// HTTP client adapter shared by the application
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    storage: Arc<StorageSync>,
    config: HttpClientConfig,
    teardown: RwLock<Option<Weak<dyn SessionTeardown>>>,
    navigator: Arc<dyn Navigator>,
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        storage: Arc<StorageSync>,
        config: HttpClientConfig,
    ) -> Self {
        Self {
            transport,
            storage,
            config,
            teardown: RwLock::new(None),
            navigator: Arc::new(LogNavigator),
        }
    }

    /// Replace the navigator used after a 401 teardown
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Register the session owner to tear down on 401. Held weakly so the
    /// session store may itself depend on this client.
    pub fn set_session_teardown(&self, teardown: Weak<dyn SessionTeardown>) {
        *self.teardown.write().unwrap_or_else(|e| e.into_inner()) = Some(teardown);
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.get_with(path, RequestOptions::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        self.request(Method::Get, path, None, options).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_with(path, body, RequestOptions::default()).await
    }

    pub async fn post_with<B, T>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        self.request(Method::Post, path, Some(body), options).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.put_with(path, body, RequestOptions::default()).await
    }

    pub async fn put_with<B, T>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        self.request(Method::Put, path, Some(body), options).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.patch_with(path, body, RequestOptions::default()).await
    }

    pub async fn patch_with<B, T>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        self.request(Method::Patch, path, Some(body), options).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.delete_with(path, RequestOptions::default()).await
    }

    pub async fn delete_with<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        self.request(Method::Delete, path, None, options).await
    }

    /// Send a request and decode a 2xx body as `T`. An empty body decodes
    /// as JSON `null`, so `()` and `Option<_>` work for 204 responses.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<T, HttpError> {
        let response = self.execute(method, path, body, &options).await?;

        let text = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };
        serde_json::from_str(text).map_err(|e| HttpError::Decode(e.to_string()))
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, HttpError> {
        let may_retry =
            options.retry.unwrap_or(self.config.retry_idempotent) && method.is_idempotent();
        let max_attempts = if may_retry { 2 } else { 1 };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self.prepare(method, path, body.clone(), options);

            let error = match self.transport.send(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) if response.status == 401 && !options.anonymous => {
                    self.end_session(method, path);
                    return Err(HttpError::SessionEnded);
                }
                Ok(response) => {
                    let retryable = is_retryable_status(response.status);
                    let error = HttpError::Status {
                        status: response.status,
                        body: response.body,
                    };
                    if !retryable {
                        return Err(error);
                    }
                    error
                }
                Err(e) => HttpError::from(e),
            };

            if attempt >= max_attempts {
                tracing::debug!(method = %method, path = %path, error = %error, "Request failed");
                return Err(error);
            }
            tracing::warn!(
                method = %method,
                path = %path,
                error = %error,
                "Request failed, retrying once"
            );
        }
    }

    fn prepare(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: &RequestOptions,
    ) -> HttpRequest {
        let mut headers = Vec::with_capacity(options.headers.len() + 2);
        headers.push(("Content-Type".to_string(), "application/json".to_string()));

        if !options.anonymous {
            let token: Option<String> = self.storage.read(keys::TOKEN, None);
            if let Some(token) = token.filter(|t| !t.is_empty()) {
                headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
        }
        headers.extend(options.headers.iter().cloned());

        HttpRequest {
            method,
            path: path.to_string(),
            headers,
            body,
            timeout: options.timeout.unwrap_or(self.config.timeout),
        }
    }

    /// Global 401 handling: clear the persisted record, tear down the
    /// in-memory session, navigate to the landing page
    fn end_session(&self, method: Method, path: &str) {
        tracing::warn!(
            method = %method,
            path = %path,
            "Server rejected session token, ending session"
        );

        self.storage.remove(keys::TOKEN);
        self.storage.remove(keys::USER);

        let teardown = self
            .teardown
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(teardown) = teardown {
            teardown.expire();
        }

        self.navigator.navigate(&self.config.landing_path);
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, HttpError> {
    serde_json::to_value(body).map_err(|e| HttpError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::error::TransportError;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport that replays canned results and records requests
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Network("no scripted reply".into())))
        }
    }

    #[derive(Default)]
    struct CountingTeardown {
        calls: AtomicUsize,
    }

    impl SessionTeardown for CountingTeardown {
        fn expire(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        visits: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, destination: &str) {
            self.visits.lock().unwrap().push(destination.to_string());
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Stats {
        total_users: u32,
    }

    fn client(transport: Arc<ScriptedTransport>, storage: Arc<StorageSync>) -> ApiClient {
        ApiClient::new(transport, storage, HttpClientConfig::default())
    }

    #[tokio::test]
    async fn test_token_injected_and_body_decoded() {
        let storage = Arc::new(StorageSync::in_memory());
        storage.write(keys::TOKEN, "mock-jwt-token-abc");
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
            200,
            r#"{"total_users": 42}"#,
        ))]);
        let api = client(Arc::clone(&transport), storage);

        let stats: Stats = api.get("/dashboard/stats").await.unwrap();
        assert_eq!(stats, Stats { total_users: 42 });

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("Authorization"), Some("Bearer mock-jwt-token-abc"));
        assert_eq!(sent[0].timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_no_token_no_header() {
        let storage = Arc::new(StorageSync::in_memory());
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(204, ""))]);
        let api = client(Arc::clone(&transport), storage);

        let _: () = api.delete("/notifications/1").await.unwrap();
        assert_eq!(transport.requests()[0].header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_unauthorized_tears_down_session() {
        let backend = MemoryStorage::new();
        let storage = Arc::new(StorageSync::new(Arc::new(backend.clone())));
        storage.write(keys::TOKEN, "expired-token");
        storage.write(keys::USER, &serde_json::json!({"id": "1"}));

        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(401, "expired"))]);
        let navigator = Arc::new(RecordingNavigator::default());
        let api = client(Arc::clone(&transport), storage)
            .with_navigator(Arc::clone(&navigator) as Arc<dyn Navigator>);

        let teardown = Arc::new(CountingTeardown::default());
        let weak: Weak<CountingTeardown> = Arc::downgrade(&teardown);
        api.set_session_teardown(weak);

        let err = api
            .get::<serde_json::Value>("/reports/42")
            .await
            .unwrap_err();
        assert_eq!(err, HttpError::SessionEnded);

        assert!(backend.is_empty());
        assert_eq!(teardown.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*navigator.visits.lock().unwrap(), vec!["/".to_string()]);
        // No retry after a 401
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_request_skips_token_and_teardown() {
        let backend = MemoryStorage::new();
        let storage = Arc::new(StorageSync::new(Arc::new(backend.clone())));
        storage.write(keys::TOKEN, "live-token");

        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(401, "bad creds"))]);
        let api = client(Arc::clone(&transport), storage);

        let err = api
            .request::<serde_json::Value>(
                Method::Post,
                "/auth/login",
                Some(serde_json::json!({"email": "a@x.com"})),
                RequestOptions::anonymous(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(matches!(err, HttpError::Status { .. }));
        assert_eq!(transport.requests()[0].header("Authorization"), None);
        assert!(!backend.is_empty());
    }

    #[tokio::test]
    async fn test_other_statuses_surface_without_mutation() {
        let backend = MemoryStorage::new();
        let storage = Arc::new(StorageSync::new(Arc::new(backend.clone())));
        storage.write(keys::TOKEN, "live-token");

        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
            403,
            r#"{"error":"forbidden"}"#,
        ))]);
        let api = client(transport, storage);

        let err = api
            .post::<_, serde_json::Value>("/admin/users", &serde_json::json!({"name": "x"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HttpError::Status {
                status: 403,
                body: r#"{"error":"forbidden"}"#.to_string()
            }
        );
        assert!(!backend.is_empty());
    }

    #[tokio::test]
    async fn test_idempotent_request_retried_once() {
        let storage = Arc::new(StorageSync::in_memory());
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            Ok(HttpResponse::new(200, "[1,2,3]")),
        ]);
        let api = client(Arc::clone(&transport), storage);

        let values: Vec<u32> = api.get("/series").await.unwrap();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_second_failure() {
        let storage = Arc::new(StorageSync::in_memory());
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(503, "still busy")),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        let api = client(Arc::clone(&transport), storage);

        let err = api.get::<serde_json::Value>("/series").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_non_idempotent_request_not_retried() {
        let storage = Arc::new(StorageSync::in_memory());
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Network("reset".into())),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        let api = client(Arc::clone(&transport), storage);

        let err = api
            .post::<_, serde_json::Value>("/orders", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, HttpError::Network("reset".into()));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_disabled_by_config() {
        let storage = Arc::new(StorageSync::in_memory());
        let transport = ScriptedTransport::new(vec![Err(TransportError::Timeout)]);
        let config = HttpClientConfig {
            retry_idempotent: false,
            ..Default::default()
        };
        let api = ApiClient::new(Arc::clone(&transport) as Arc<dyn Transport>, storage, config);

        assert_eq!(
            api.get::<serde_json::Value>("/series").await.unwrap_err(),
            HttpError::Timeout
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_request_options_applied() {
        let storage = Arc::new(StorageSync::in_memory());
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "\"ok\""))]);
        let api = client(Arc::clone(&transport), storage);

        let reply: String = api
            .request(
                Method::Patch,
                "/profile",
                Some(serde_json::json!({"bio": "hi"})),
                RequestOptions::default()
                    .header("X-Request-Id", "abc")
                    .timeout(Duration::from_secs(5)),
            )
            .await
            .unwrap();

        assert_eq!(reply, "ok");
        let sent = &transport.requests()[0];
        assert_eq!(sent.header("x-request-id"), Some("abc"));
        assert_eq!(sent.timeout, Duration::from_secs(5));
        assert_eq!(sent.body, Some(serde_json::json!({"bio": "hi"})));
    }

    #[tokio::test]
    async fn test_per_call_options_on_convenience_methods() {
        let storage = Arc::new(StorageSync::in_memory());
        storage.write(keys::TOKEN, "mock-jwt-token-abc");
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(201, r#"{"total_users": 1}"#)),
            Ok(HttpResponse::new(204, "")),
        ]);
        let api = client(Arc::clone(&transport), storage);

        // Retry switched off for this call only
        let err = api
            .get_with::<Stats>("/dashboard/stats", RequestOptions::default().retry(false))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Status { status: 503, .. }));

        let created: Stats = api
            .post_with(
                "/users",
                &serde_json::json!({"name": "Jane"}),
                RequestOptions::default().timeout(Duration::from_secs(2)),
            )
            .await
            .unwrap();
        assert_eq!(created, Stats { total_users: 1 });

        let _: () = api
            .delete_with("/users/7", RequestOptions::anonymous())
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].method, Method::Post);
        assert_eq!(sent[1].timeout, Duration::from_secs(2));
        assert_eq!(sent[1].body, Some(serde_json::json!({"name": "Jane"})));
        assert_eq!(sent[2].method, Method::Delete);
        assert_eq!(sent[2].header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_decode_error_reported() {
        let storage = Arc::new(StorageSync::in_memory());
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "<html>"))]);
        let api = client(transport, storage);

        let err = api.get::<Stats>("/dashboard/stats").await.unwrap_err();
        assert!(matches!(err, HttpError::Decode(_)));
    }
}
