pub mod poller;

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

use crate::loadviz::snapshot::MetricsFeed;

/// Source of one refresh worth of metrics documents. The poller is
/// generic over this so its skip/discard behavior can be exercised
/// without a live endpoint.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch_feed(
        &self,
    ) -> impl Future<Output = Result<MetricsFeed, Box<dyn std::error::Error + Send + Sync>>> + Send;

    fn endpoint(&self) -> &str;
}

/// Client for a Kubernetes API endpoint, typically `kubectl proxy`.
pub struct MetricsClient {
    pub endpoint: String,
    http: Client,
}

impl MetricsClient {
    pub fn new(endpoint: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");

        Self { endpoint, http }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
        let resp = self
            .http
            .get(format!("{}{}", self.endpoint, path))
            .header("Accept", "application/json")
            .send()
            .await?;

        if resp.status().as_u16() >= 400 {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("GET {} returned {}: {}", path, status, body).into());
        }
        Ok(resp.json().await?)
    }
}

impl FeedSource for MetricsClient {
    /// Fetches everything one snapshot needs, in the order the original
    /// feed file carried the documents.
    async fn fetch_feed(&self) -> Result<MetricsFeed, Box<dyn std::error::Error + Send + Sync>> {
        Ok(MetricsFeed {
            nodes: self.get_json("/api/v1/nodes").await?,
            node_metrics: self.get_json("/apis/metrics.k8s.io/v1beta1/nodes").await?,
            pods: self.get_json("/api/v1/pods").await?,
            pod_metrics: self.get_json("/apis/metrics.k8s.io/v1beta1/pods").await?,
            namespaces: self.get_json("/api/v1/namespaces").await?,
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
