use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::transport::{ApiRequest, ApiResponse, Body, Method, Transport};
use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Result, ShiftError};

/// Characters the destination store refuses in filenames.
const FORBIDDEN_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace forbidden characters with `_`, preserving the order of the rest.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if FORBIDDEN_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Outcome of a raw remote call. Exhaustion is its own variant so a caller
/// can never mistake a missing response for success.
#[derive(Debug)]
pub enum CallOutcome {
    /// The remote answered, with whatever status it chose.
    Response(ApiResponse),
    /// Retries ran out without any response arriving.
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub rate_limit_fallback: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            rate_limit_fallback: Duration::from_secs(config.rate_limit_fallback_secs),
        }
    }
}

/// URL construction for the four remote operations.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
    destination_drive_id: String,
    record_site_id: String,
    record_list_id: String,
    pub record_field: String,
    pub link_type: String,
    pub link_scope: String,
}

impl Endpoints {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            destination_drive_id: config.destination_drive_id.clone(),
            record_site_id: config.record_site_id.clone(),
            record_list_id: config.record_list_id.clone(),
            record_field: config.record_field.clone(),
            link_type: config.link_type.clone(),
            link_scope: config.link_scope.clone(),
        }
    }

    fn source_content(&self, item_id: &str) -> String {
        format!("{}/source/items/{}/content", self.base_url, item_id)
    }

    fn destination_content(&self, filename: &str) -> String {
        format!(
            "{}/drives/{}/root:/{}:/content",
            self.base_url, self.destination_drive_id, filename
        )
    }

    fn create_link(&self, item_id: &str) -> String {
        format!(
            "{}/drives/{}/items/{}/create-link",
            self.base_url, self.destination_drive_id, item_id
        )
    }

    fn record(&self, record_id: &str) -> String {
        format!(
            "{}/sites/{}/lists/{}/items/{}",
            self.base_url, self.record_site_id, self.record_list_id, record_id
        )
    }
}

/// Descriptor the destination store returns for a stored blob.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "webUrl", default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    link: LinkBody,
}

#[derive(Debug, Deserialize)]
struct LinkBody {
    #[serde(rename = "webUrl")]
    web_url: String,
}

/// Remote client wrapping every call in bounded retry with rate-limit
/// backoff. Transport failures consume retry slots; rate-limit responses
/// wait out the server-advised delay on their own counter.
pub struct RetryingApiClient<T> {
    transport: T,
    policy: RetryPolicy,
    endpoints: Endpoints,
}

impl<T: Transport> RetryingApiClient<T> {
    pub fn new(transport: T, policy: RetryPolicy, endpoints: Endpoints) -> Self {
        Self {
            transport,
            policy,
            endpoints,
        }
    }

    pub async fn call(&self, method: Method, url: &str, body: Body) -> CallOutcome {
        let mut transport_failures = 0u32;
        let mut rate_limit_hits = 0u32;

        loop {
            let request = ApiRequest {
                method,
                url: url.to_string(),
                body: body.clone(),
            };

            match self.transport.execute(request).await {
                Ok(response) if response.is_rate_limited() => {
                    rate_limit_hits += 1;
                    if rate_limit_hits >= self.policy.max_retries {
                        return CallOutcome::Exhausted {
                            attempts: rate_limit_hits,
                            last_error: "rate limited by remote".to_string(),
                        };
                    }
                    let wait = response
                        .retry_after
                        .map(Duration::from_secs)
                        .unwrap_or(self.policy.rate_limit_fallback);
                    warn!(
                        method = method.as_str(),
                        wait_secs = wait.as_secs(),
                        "Rate limited, backing off"
                    );
                    sleep(wait).await;
                }
                Ok(response) => {
                    debug!(
                        method = method.as_str(),
                        status = response.status,
                        "Remote call completed"
                    );
                    return CallOutcome::Response(response);
                }
                Err(e) => {
                    transport_failures += 1;
                    let last_error = e.to_string();
                    warn!(
                        method = method.as_str(),
                        attempt = transport_failures,
                        max_retries = self.policy.max_retries,
                        error = %e,
                        "Request failed"
                    );
                    if transport_failures >= self.policy.max_retries {
                        return CallOutcome::Exhausted {
                            attempts: transport_failures,
                            last_error,
                        };
                    }
                    sleep(self.policy.retry_delay).await;
                }
            }
        }
    }

    /// Download the raw bytes of a source-store item.
    pub async fn fetch_blob(&self, item_id: &str) -> Result<Bytes> {
        let url = self.endpoints.source_content(item_id);
        match self.call(Method::Get, &url, Body::Empty).await {
            CallOutcome::Response(resp) if resp.status == 200 => Ok(resp.body),
            CallOutcome::Response(resp) => Err(ShiftError::Download {
                item_id: item_id.to_string(),
                reason: format!("remote returned status {}", resp.status),
            }),
            CallOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(ShiftError::Download {
                item_id: item_id.to_string(),
                reason: format!("no response after {} attempts ({})", attempts, last_error),
            }),
        }
    }

    /// Store a blob at the destination under a sanitized filename.
    pub async fn store_blob(&self, filename: &str, content: Bytes) -> Result<StoredItem> {
        let filename = sanitize_filename(filename);
        let url = self.endpoints.destination_content(&filename);
        match self.call(Method::Put, &url, Body::Raw(content)).await {
            CallOutcome::Response(resp) if resp.status == 200 || resp.status == 201 => {
                resp.json::<StoredItem>().map_err(|e| ShiftError::Store {
                    filename: filename.clone(),
                    reason: format!("unparseable descriptor: {}", e),
                })
            }
            CallOutcome::Response(resp) => Err(ShiftError::Store {
                filename,
                reason: format!("remote returned status {}", resp.status),
            }),
            CallOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(ShiftError::Store {
                filename,
                reason: format!("no response after {} attempts ({})", attempts, last_error),
            }),
        }
    }

    /// Create an organization-scoped read-only link for a stored item.
    pub async fn publish_link(&self, item_id: &str) -> Result<String> {
        let url = self.endpoints.create_link(item_id);
        let payload = json!({
            "type": self.endpoints.link_type,
            "scope": self.endpoints.link_scope,
        });
        match self.call(Method::Post, &url, Body::Json(payload)).await {
            CallOutcome::Response(resp) if resp.status == 201 => resp
                .json::<LinkResponse>()
                .map(|r| r.link.web_url)
                .map_err(|e| ShiftError::PublishLink {
                    item_id: item_id.to_string(),
                    reason: format!("unparseable link response: {}", e),
                }),
            CallOutcome::Response(resp) => Err(ShiftError::PublishLink {
                item_id: item_id.to_string(),
                reason: format!("remote returned status {}", resp.status),
            }),
            CallOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(ShiftError::PublishLink {
                item_id: item_id.to_string(),
                reason: format!("no response after {} attempts ({})", attempts, last_error),
            }),
        }
    }

    /// Fetch the current field values of a record, for pre-update snapshots.
    pub async fn fetch_record(&self, record_id: &str) -> Result<serde_json::Value> {
        let url = self.endpoints.record(record_id);
        match self.call(Method::Get, &url, Body::Empty).await {
            CallOutcome::Response(resp) if resp.status == 200 => {
                resp.json().map_err(|e| ShiftError::RecordFetch {
                    record_id: record_id.to_string(),
                    reason: e.to_string(),
                })
            }
            CallOutcome::Response(resp) => Err(ShiftError::RecordFetch {
                record_id: record_id.to_string(),
                reason: format!("remote returned status {}", resp.status),
            }),
            CallOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(ShiftError::RecordFetch {
                record_id: record_id.to_string(),
                reason: format!("no response after {} attempts ({})", attempts, last_error),
            }),
        }
    }

    /// Patch the published link onto the originating record. In dry-run mode
    /// this never touches the transport and always reports success.
    pub async fn update_record(&self, record_id: &str, link_url: &str, dry_run: bool) -> Result<()> {
        if dry_run {
            info!(record_id, link_url, "[dry-run] would update record");
            return Ok(());
        }

        let url = self.endpoints.record(record_id);
        let payload = json!({
            "fields": { self.endpoints.record_field.as_str(): link_url }
        });
        match self.call(Method::Patch, &url, Body::Json(payload)).await {
            CallOutcome::Response(resp) if resp.status == 200 => Ok(()),
            CallOutcome::Response(resp) => Err(ShiftError::RecordUpdate {
                record_id: record_id.to_string(),
                reason: format!("remote returned status {}", resp.status),
            }),
            CallOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(ShiftError::RecordUpdate {
                record_id: record_id.to_string(),
                reason: format!("no response after {} attempts ({})", attempts, last_error),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::api::transport::TransportError;

    struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<ApiResponse, TransportError>>>,
        calls: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<std::result::Result<ApiResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            request: ApiRequest,
        ) -> std::result::Result<ApiResponse, TransportError> {
            self.calls.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Network("script exhausted".into())))
        }
    }

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            retry_after: None,
            body: Bytes::from(body.to_string()),
        }
    }

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::ZERO,
            rate_limit_fallback: Duration::ZERO,
        }
    }

    fn test_endpoints() -> Endpoints {
        let mut config = ApiConfig::default();
        config.base_url = "https://api.example.test/v1".to_string();
        config.destination_drive_id = "drive-1".to_string();
        config.record_site_id = "site-1".to_string();
        config.record_list_id = "list-1".to_string();
        Endpoints::from_config(&config)
    }

    fn client(
        script: Vec<std::result::Result<ApiResponse, TransportError>>,
    ) -> RetryingApiClient<ScriptedTransport> {
        RetryingApiClient::new(ScriptedTransport::new(script), test_policy(), test_endpoints())
    }

    #[test]
    fn sanitize_replaces_forbidden_characters() {
        assert_eq!(sanitize_filename("a/b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_filename(r#"<>:"/\|?*"#), "_________");
        assert_eq!(sanitize_filename("plain-name.bin"), "plain-name.bin");
    }

    #[tokio::test]
    async fn fetch_blob_returns_bytes_on_200() {
        let client = client(vec![Ok(response(200, "payload"))]);
        let bytes = client.fetch_blob("item-1").await.unwrap();
        assert_eq!(bytes, Bytes::from("payload"));
        assert_eq!(client.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn fetch_blob_fails_on_non_200() {
        let client = client(vec![Ok(response(404, ""))]);
        let err = client.fetch_blob("item-1").await.unwrap_err();
        assert!(matches!(err, ShiftError::Download { .. }));
        assert!(err.to_string().contains("Failed to download file"));
    }

    #[tokio::test]
    async fn transport_failures_consume_exactly_max_retries() {
        let client = client(vec![
            Err(TransportError::Network("refused".into())),
            Err(TransportError::Timeout),
            Err(TransportError::Network("refused".into())),
        ]);
        let err = client.fetch_blob("item-1").await.unwrap_err();
        assert_eq!(client.transport.call_count(), 3);
        assert!(err.to_string().contains("no response after 3 attempts"));
    }

    #[tokio::test]
    async fn rate_limit_retries_do_not_consume_transport_slots() {
        // Two 429s, then two transport failures, then success: the rate-limit
        // counter and the failure counter run independently.
        let client = client(vec![
            Ok(response(429, "")),
            Ok(response(429, "")),
            Err(TransportError::Network("refused".into())),
            Err(TransportError::Network("refused".into())),
            Ok(response(200, "payload")),
        ]);
        let bytes = client.fetch_blob("item-1").await.unwrap();
        assert_eq!(bytes, Bytes::from("payload"));
        assert_eq!(client.transport.call_count(), 5);
    }

    #[tokio::test]
    async fn store_blob_parses_descriptor() {
        let client = client(vec![Ok(response(
            201,
            r#"{"id": "dest-9", "name": "file.bin", "webUrl": "https://dest/file.bin"}"#,
        ))]);
        let stored = client
            .store_blob("a/b.bin", Bytes::from_static(b"blob"))
            .await
            .unwrap();
        assert_eq!(stored.id, "dest-9");

        // The PUT URL must carry the sanitized name.
        let calls = client.transport.calls.lock().unwrap();
        assert!(calls[0].url.contains("a_b.bin"));
        assert!(!calls[0].url.contains("a/b.bin"));
    }

    #[tokio::test]
    async fn publish_link_extracts_web_url() {
        let client = client(vec![Ok(response(
            201,
            r#"{"link": {"webUrl": "https://share.example.test/x"}}"#,
        ))]);
        let url = client.publish_link("dest-9").await.unwrap();
        assert_eq!(url, "https://share.example.test/x");
    }

    #[tokio::test]
    async fn publish_link_requires_201() {
        let client = client(vec![Ok(response(200, "{}"))]);
        assert!(client.publish_link("dest-9").await.is_err());
    }

    #[tokio::test]
    async fn dry_run_update_never_touches_transport() {
        let client = client(vec![]);
        client
            .update_record("rec-1", "https://share.example.test/x", true)
            .await
            .unwrap();
        assert_eq!(client.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn update_record_patches_configured_field() {
        let client = client(vec![Ok(response(200, "{}"))]);
        client
            .update_record("rec-1", "https://share.example.test/x", false)
            .await
            .unwrap();

        let calls = client.transport.calls.lock().unwrap();
        assert_eq!(calls[0].method, Method::Patch);
        match &calls[0].body {
            Body::Json(value) => {
                assert_eq!(
                    value["fields"]["Reference_Link"],
                    "https://share.example.test/x"
                );
            }
            other => panic!("expected JSON body, got {:?}", other),
        }
    }
}
