//! Snapshot sources: where each poll gets its JSON body from.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PollError;

/// Produces the raw `/live_price` body for one poll.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short description for log lines.
    fn describe(&self) -> String;

    /// Fetch and decode one body. Schema checks happen in the caller.
    async fn fetch(&self) -> Result<serde_json::Value, PollError>;
}

/// `GET <endpoint>` over HTTP.
///
/// No retries. With no timeout configured a hanging request simply never
/// completes; the poller's overlap policy decides what later ticks do.
pub struct HttpSource {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSource {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, PollError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { http: builder.build()?, endpoint: endpoint.into() })
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    fn describe(&self) -> String {
        self.endpoint.clone()
    }

    async fn fetch(&self) -> Result<serde_json::Value, PollError> {
        let resp = self.http.get(&self.endpoint).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
