//! Loki push client
//!
//! Entries go through a bounded channel to a worker task that batches them
//! and POSTs JSON to the push endpoint. Retryable failures (transport
//! errors, 429, 5xx) back off exponentially; other responses drop the batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::LokiConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::error::LokiError;
use super::push::{LokiEntry, PushRequest};

const TENANT_HEADER: &str = "X-Scope-OrgID";

/// Delivery counters of the push worker
#[derive(Debug, Default)]
pub struct LokiStats {
    sent_entries: AtomicU64,
    dropped_entries: AtomicU64,
    batches_sent: AtomicU64,
    retries: AtomicU64,
}

impl LokiStats {
    pub fn sent_entries(&self) -> u64 {
        self.sent_entries.load(Ordering::Relaxed)
    }

    pub fn dropped_entries(&self) -> u64 {
        self.dropped_entries.load(Ordering::Relaxed)
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

/// Handle to a running push worker
pub struct LokiClient {
    push_url: Url,
    tx: Option<mpsc::Sender<LokiEntry>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<LokiStats>,
}

impl LokiClient {
    /// Validate the configuration, optionally probe `/ready`, start the worker
    ///
    /// # Errors
    /// `InvalidUrl`, `Client`, or `NotReady` when the endpoint is unusable.
    #[instrument(name = "loki_client_connect", skip(config), fields(url = %config.url))]
    pub async fn connect(config: LokiConfig) -> Result<Self, LokiError> {
        let push_url = parse_push_url(&config.url)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        let auth = Auth::from_config(&config);

        if config.probe_ready {
            probe_ready(&http, &push_url, &auth).await?;
        }

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(LokiStats::default());

        let worker = PushWorker {
            http,
            push_url: push_url.clone(),
            auth,
            batch_size: config.batch_size.max(1),
            batch_wait: config.batch_wait(),
            max_retries: config.max_retries,
            min_backoff: config.min_backoff(),
            max_backoff: config.max_backoff(),
            stats: Arc::clone(&stats),
        };
        let worker = tokio::spawn(worker.run(rx));

        info!(url = %push_url, "Loki client started");

        Ok(Self {
            push_url,
            tx: Some(tx),
            worker: Some(worker),
            stats,
        })
    }

    pub fn push_url(&self) -> &Url {
        &self.push_url
    }

    pub fn stats(&self) -> Arc<LokiStats> {
        Arc::clone(&self.stats)
    }

    /// Queue one entry, waiting while the ingestion channel is full
    ///
    /// # Errors
    /// `Closed` after [`stop`](Self::stop) or when the worker is gone.
    pub async fn send(&self, entry: LokiEntry) -> Result<(), LokiError> {
        let tx = self.tx.as_ref().ok_or(LokiError::Closed)?;
        tx.send(entry).await.map_err(|_| LokiError::Closed)
    }

    /// Flush pending entries and wait for the worker to exit
    ///
    /// Calling it again is a no-op.
    #[instrument(name = "loki_client_stop", skip(self))]
    pub async fn stop(&mut self) -> Result<(), LokiError> {
        // Closing the channel lets the worker flush its tail batch
        drop(self.tx.take());

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker
            .await
            .map_err(|e| LokiError::Worker(e.to_string()))?;

        info!(
            sent = self.stats.sent_entries(),
            dropped = self.stats.dropped_entries(),
            "Loki client stopped"
        );
        Ok(())
    }
}

const PUSH_API_PATH: &str = "/loki/api/v1/push";

fn parse_push_url(raw: &str) -> Result<Url, LokiError> {
    let url = Url::parse(raw).map_err(|e| LokiError::invalid_url(raw, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LokiError::invalid_url(raw, "scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(LokiError::invalid_url(raw, "missing host"));
    }
    Ok(url)
}

/// `/ready` next to the push API, keeping any path prefix of a proxied Loki
fn ready_url(push_url: &Url) -> Url {
    let path = push_url.path().trim_end_matches('/');
    let prefix = path.strip_suffix(PUSH_API_PATH).unwrap_or("");

    let mut url = push_url.clone();
    url.set_path(&format!("{prefix}/ready"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

async fn probe_ready(http: &reqwest::Client, push_url: &Url, auth: &Auth) -> Result<(), LokiError> {
    let ready_url = ready_url(push_url);

    let not_ready = |message: String| LokiError::NotReady {
        url: ready_url.to_string(),
        message,
    };

    let response = auth
        .apply(http.get(ready_url.clone()))
        .send()
        .await
        .map_err(|e| not_ready(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(not_ready(format!("status {status}")));
    }

    debug!(url = %ready_url, "Loki is ready");
    Ok(())
}

/// Request decoration shared by probe and push
#[derive(Debug, Clone, Default)]
struct Auth {
    tenant_id: Option<String>,
    basic: Option<(String, Option<String>)>,
    bearer: Option<String>,
}

impl Auth {
    fn from_config(config: &LokiConfig) -> Self {
        Self {
            tenant_id: config.tenant_id.clone().filter(|t| !t.is_empty()),
            basic: config
                .username
                .clone()
                .filter(|u| !u.is_empty())
                .map(|user| (user, config.password.clone())),
            bearer: config.bearer_token.clone().filter(|t| !t.is_empty()),
        }
    }

    fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(tenant) = &self.tenant_id {
            request = request.header(TENANT_HEADER, tenant);
        }
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        } else if let Some((user, password)) = &self.basic {
            request = request.basic_auth(user, password.as_ref());
        }
        request
    }
}

enum PushFailure {
    Retryable(String),
    Rejected(String),
}

struct PushWorker {
    http: reqwest::Client,
    push_url: Url,
    auth: Auth,
    batch_size: usize,
    batch_wait: Duration,
    max_retries: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    stats: Arc<LokiStats>,
}

impl PushWorker {
    /// Batch until `batch_size` or `batch_wait`, whichever first
    #[instrument(name = "loki_push_worker", skip_all, fields(url = %self.push_url))]
    async fn run(self, mut rx: mpsc::Receiver<LokiEntry>) {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut deadline = Instant::now();

        loop {
            let received = if batch.is_empty() {
                rx.recv().await
            } else {
                match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        self.flush(&mut batch).await;
                        continue;
                    }
                }
            };

            let Some(entry) = received else {
                self.flush(&mut batch).await;
                break;
            };

            if batch.is_empty() {
                deadline = Instant::now() + self.batch_wait;
            }
            batch.push(entry);
            if batch.len() >= self.batch_size {
                self.flush(&mut batch).await;
            }
        }

        debug!("Loki push worker stopped");
    }

    async fn flush(&self, batch: &mut Vec<LokiEntry>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len() as u64;

        let body = match serde_json::to_vec(&PushRequest::from_entries(batch)) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, entries = count, "Failed to encode push request, batch dropped");
                self.stats.dropped_entries.fetch_add(count, Ordering::Relaxed);
                batch.clear();
                return;
            }
        };
        batch.clear();

        let mut backoff = self.min_backoff;
        let mut attempt = 0u32;

        loop {
            match self.push_once(&body).await {
                Ok(()) => {
                    self.stats.sent_entries.fetch_add(count, Ordering::Relaxed);
                    self.stats.batches_sent.fetch_add(1, Ordering::Relaxed);
                    debug!(entries = count, attempt, "Batch pushed");
                    return;
                }
                Err(PushFailure::Retryable(message)) if attempt < self.max_retries => {
                    attempt += 1;
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        error = %message,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Push failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(PushFailure::Retryable(message)) => {
                    error!(error = %message, entries = count, "Push failed after retries, batch dropped");
                    self.stats.dropped_entries.fetch_add(count, Ordering::Relaxed);
                    return;
                }
                Err(PushFailure::Rejected(message)) => {
                    error!(error = %message, entries = count, "Push rejected, batch dropped");
                    self.stats.dropped_entries.fetch_add(count, Ordering::Relaxed);
                    return;
                }
            }
        }
    }

    async fn push_once(&self, body: &[u8]) -> Result<(), PushFailure> {
        let request = self
            .http
            .post(self.push_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());

        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| PushFailure::Retryable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        let message = format!("status {status}: {}", detail.trim());
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(PushFailure::Retryable(message))
        } else {
            Err(PushFailure::Rejected(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use std::collections::BTreeMap;

    const PUSH_PATH: &str = "/loki/api/v1/push";

    fn config_for(server: &Server) -> LokiConfig {
        let mut config = LokiConfig::new(format!("{}{PUSH_PATH}", server.url()));
        config.probe_ready = false;
        config.batch_wait_ms = 10_000;
        config.min_backoff_ms = 1;
        config.max_backoff_ms = 5;
        config
    }

    fn entry(line: &str) -> LokiEntry {
        let labels = Arc::new(BTreeMap::from([("app".to_string(), "logging-agent".to_string())]));
        LokiEntry::new(labels, Utc::now(), line)
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_urls() {
        for url in ["not a url", "ftp://loki:3100/push"] {
            let result = LokiClient::connect(LokiConfig::new(url)).await;
            assert!(matches!(result, Err(LokiError::InvalidUrl { .. })), "{url}");
        }
    }

    #[tokio::test]
    async fn test_connect_fails_when_not_ready() {
        let mut server = Server::new_async().await;
        let ready = server
            .mock("GET", "/ready")
            .with_status(503)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.probe_ready = true;

        let result = LokiClient::connect(config).await;
        assert!(matches!(result, Err(LokiError::NotReady { .. })));
        ready.assert_async().await;
    }

    #[test]
    fn test_ready_url_keeps_path_prefix() {
        let cases = [
            ("http://loki:3100/loki/api/v1/push", "http://loki:3100/ready"),
            ("http://gw/tenant-x/loki/api/v1/push", "http://gw/tenant-x/ready"),
            ("https://gw/a/b/loki/api/v1/push/?x=1", "https://gw/a/b/ready"),
            ("http://loki:3100/custom/push", "http://loki:3100/ready"),
        ];
        for (push, ready) in cases {
            let push = Url::parse(push).unwrap();
            assert_eq!(ready_url(&push).as_str(), ready, "{push}");
        }
    }

    #[tokio::test]
    async fn test_ready_check_behind_path_prefix() {
        let mut server = Server::new_async().await;
        let ready = server
            .mock("GET", "/tenant-x/ready")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let mut config = LokiConfig::new(format!("{}/tenant-x{PUSH_PATH}", server.url()));
        config.probe_ready = true;

        let mut client = LokiClient::connect(config).await.unwrap();
        client.stop().await.unwrap();
        ready.assert_async().await;
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        let mut config = LokiConfig::new("http://127.0.0.1:9/loki/api/v1/push");
        config.timeout_ms = 500;
        let result = LokiClient::connect(config).await;
        assert!(matches!(result, Err(LokiError::NotReady { .. })));
    }

    #[tokio::test]
    async fn test_stop_flushes_tail_batch_with_headers() {
        let mut server = Server::new_async().await;
        let ready = server
            .mock("GET", "/ready")
            .match_header("X-Scope-OrgID", "tenant-a")
            .with_status(200)
            .create_async()
            .await;
        let push = server
            .mock("POST", PUSH_PATH)
            .match_header("X-Scope-OrgID", "tenant-a")
            .match_header("content-type", "application/json")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Regex(r#""line-1".*"line-2""#.to_string()))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.probe_ready = true;
        config.tenant_id = Some("tenant-a".to_string());
        config.bearer_token = Some("secret".to_string());

        let mut client = LokiClient::connect(config).await.unwrap();
        client.send(entry("line-1")).await.unwrap();
        client.send(entry("line-2")).await.unwrap();
        client.stop().await.unwrap();

        ready.assert_async().await;
        push.assert_async().await;
        assert_eq!(client.stats().sent_entries(), 2);
        assert!(matches!(client.send(entry("late")).await, Err(LokiError::Closed)));
        // Second stop is a no-op
        client.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_batch_is_pushed_immediately() {
        let mut server = Server::new_async().await;
        let push = server
            .mock("POST", PUSH_PATH)
            .with_status(204)
            .expect(2)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.batch_size = 2;

        let mut client = LokiClient::connect(config).await.unwrap();
        for i in 0..4 {
            client.send(entry(&format!("line-{i}"))).await.unwrap();
        }
        client.stop().await.unwrap();

        push.assert_async().await;
        assert_eq!(client.stats().batches_sent(), 2);
    }

    #[tokio::test]
    async fn test_partial_batch_is_pushed_after_wait() {
        let mut server = Server::new_async().await;
        let push = server
            .mock("POST", PUSH_PATH)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.batch_wait_ms = 50;

        let mut client = LokiClient::connect(config).await.unwrap();
        client.send(entry("lonely")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(push.matched_async().await);

        client.stop().await.unwrap();
        push.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_dropped() {
        let mut server = Server::new_async().await;
        let push = server
            .mock("POST", PUSH_PATH)
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.max_retries = 2;

        let mut client = LokiClient::connect(config).await.unwrap();
        client.send(entry("doomed")).await.unwrap();
        client.stop().await.unwrap();

        push.assert_async().await;
        let stats = client.stats();
        assert_eq!(stats.retries(), 2);
        assert_eq!(stats.dropped_entries(), 1);
        assert_eq!(stats.sent_entries(), 0);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let push = server
            .mock("POST", PUSH_PATH)
            .with_status(400)
            .with_body("entry out of order")
            .expect(1)
            .create_async()
            .await;

        let mut client = LokiClient::connect(config_for(&server)).await.unwrap();
        client.send(entry("rejected")).await.unwrap();
        client.stop().await.unwrap();

        push.assert_async().await;
        assert_eq!(client.stats().retries(), 0);
        assert_eq!(client.stats().dropped_entries(), 1);
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let mut server = Server::new_async().await;
        // "agent:pw" base64-encoded
        let push = server
            .mock("POST", PUSH_PATH)
            .match_header("authorization", "Basic YWdlbnQ6cHc=")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.username = Some("agent".to_string());
        config.password = Some("pw".to_string());

        let mut client = LokiClient::connect(config).await.unwrap();
        client.send(entry("x")).await.unwrap();
        client.stop().await.unwrap();

        push.assert_async().await;
    }
}
