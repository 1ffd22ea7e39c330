//! HTTP client for the query endpoint

use super::arrow_stream::ArrowRows;
use super::json::JsonDocument;
use super::{QueryExecutor, ResultSet};
use crate::auth::Credential;
use async_trait::async_trait;
use futures::StreamExt;
use logfire_pg_common::{GatewayError, Result, UpstreamConfig};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Pooled client for `GET <base>/v1/query`
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    config: Arc<UpstreamConfig>,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .tcp_keepalive(std::time::Duration::from_secs(30));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl QueryExecutor for UpstreamClient {
    async fn execute(&self, sql: &str, credential: &Credential) -> Result<ResultSet> {
        let start = Instant::now();
        let url = self.config.query_url();

        let response = self
            .client
            .get(&url)
            .query(&[("sql", sql)])
            .bearer_auth(credential.token())
            .header(ACCEPT, self.config.transport.accept_header())
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url = %url, "Upstream request failed");
                GatewayError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| {
                warn!(status = status.as_u16(), error = %e, "Failed to read upstream error body");
                GatewayError::UpstreamUnavailable(format!(
                    "upstream returned {} and the body could not be read: {}",
                    status.as_u16(),
                    e
                ))
            })?;
            warn!(status = status.as_u16(), body = %body, "Upstream rejected query");
            return Err(GatewayError::UpstreamQuery {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        debug!(
            status = status.as_u16(),
            content_type = %content_type,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        );

        if content_type.contains("json") {
            let body = response
                .bytes()
                .await
                .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
            JsonDocument::from_slice(&body)?.into_result_set()
        } else {
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| GatewayError::UpstreamUnavailable(e.to_string())))
                .boxed();
            ArrowRows::open(body).await
        }
    }
}
