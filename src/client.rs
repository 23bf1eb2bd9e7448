//! HTTP client for a remote governance service.
//!
//! Used by out-of-process Rust workers and by the CLI's `--remote` mode.
//! Workers that never hold a session report outcomes statelessly through
//! [`GovernanceClient::report_result`].

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ControlSignal, CrawlStatus, GlobalStats, GroupSummary, LogEntry, ResultReport};
use crate::server::{RegisterGroupRequest, ShouldCrawlRequest};

/// Errors talking to the governance service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    group_path: String,
}

#[derive(Debug, Deserialize)]
struct ShouldCrawlResponse {
    should_crawl: bool,
}

#[derive(Debug, Deserialize)]
struct SignalResponse {
    signal: ControlSignal,
}

#[derive(Debug, Serialize)]
struct LogQuery {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
}

/// Client for the governance HTTP service.
#[derive(Debug, Clone)]
pub struct GovernanceClient {
    base_url: String,
    http: Client,
}

impl GovernanceClient {
    /// Create a client for the service at `base_url` (e.g. `http://127.0.0.1:8002`).
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("crawlgov/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<bool> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(response.status().is_success())
    }

    /// Register a group; returns the normalized group path.
    pub async fn register_group(&self, request: &RegisterGroupRequest) -> Result<String> {
        let response: RegisterResponse = self.post("/rpc/register_group", request).await?;
        Ok(response.group_path)
    }

    pub async fn should_crawl(&self, url: &str, max_retries: Option<u32>) -> Result<bool> {
        let request = ShouldCrawlRequest {
            url: url.to_string(),
            max_retries,
        };
        let response: ShouldCrawlResponse = self.post("/rpc/should_crawl", &request).await?;
        Ok(response.should_crawl)
    }

    pub async fn report_result(&self, report: &ResultReport) -> Result<()> {
        let _: serde_json::Value = self.post("/rpc/report_result", report).await?;
        Ok(())
    }

    pub async fn dashboard(&self, spider: Option<&str>) -> Result<Vec<GroupSummary>> {
        let mut request = self.http.get(self.url("/api/dashboard"));
        if let Some(spider) = spider {
            request = request.query(&[("spider", spider)]);
        }
        decode(request.send().await?).await
    }

    pub async fn recent_logs(
        &self,
        limit: usize,
        status: Option<CrawlStatus>,
    ) -> Result<Vec<LogEntry>> {
        let query = LogQuery {
            limit,
            status: status.map(|s| s.as_str()),
        };
        let response = self.http.get(self.url("/api/logs")).query(&query).send().await?;
        decode(response).await
    }

    pub async fn global_stats(&self) -> Result<GlobalStats> {
        decode(self.http.get(self.url("/api/stats")).send().await?).await
    }

    pub async fn signal(&self) -> Result<ControlSignal> {
        let response: SignalResponse =
            decode(self.http.get(self.url("/api/control")).send().await?).await?;
        Ok(response.signal)
    }

    pub async fn pause(&self) -> Result<ControlSignal> {
        self.control("pause").await
    }

    pub async fn resume(&self) -> Result<ControlSignal> {
        self.control("resume").await
    }

    pub async fn trigger_immediate(&self) -> Result<ControlSignal> {
        self.control("immediate").await
    }

    async fn control(&self, action: &str) -> Result<ControlSignal> {
        let response = self
            .http
            .post(self.url(&format!("/api/control/{}", action)))
            .send()
            .await?;
        let body: SignalResponse = decode(response).await?;
        Ok(body.signal)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }
}

/// Turn a response into `T`, or into `ClientError::Status` with the server's
/// error message.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(text);
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}
