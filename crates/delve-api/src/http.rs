use async_trait::async_trait;
use delve_core::{Command, DelveError, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::client::{ApiClient, ApiResponse};
use crate::wire;

/// Header identifying the commander on every request.
pub const COMMANDER_HEADER: &str = "x-commander-email";

/// JSON-over-HTTP client for the exploration API.
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    commander_email: String,
}

/// What came back from one HTTP exchange, before per-call decoding.
enum Reply {
    Body(Value),
    NotFound,
    Failed { status: u16, message: String },
}

impl HttpApiClient {
    pub fn new(
        base_url: impl Into<String>,
        commander_email: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DelveError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            commander_email: commander_email.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Reply> {
        let resp = request
            .header(COMMANDER_HEADER, &self.commander_email)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DelveError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Reply::NotFound);
        }

        let text = resp
            .text()
            .await
            .map_err(|e| DelveError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Ok(Reply::Failed {
                status: status.as_u16(),
                message: wire::error_message(&text),
            });
        }

        let body = serde_json::from_str::<Value>(&text)
            .map_err(|e| DelveError::Decode(format!("HTTP {status}: {e}")))?;
        Ok(Reply::Body(body))
    }

    fn finish(reply: Reply, decode: impl FnOnce(Value) -> Result<ApiResponse>) -> Result<ApiResponse> {
        match reply {
            Reply::Body(body) => decode(body),
            Reply::NotFound => Ok(ApiResponse::NotFound),
            Reply::Failed { status, message } => Ok(ApiResponse::Error { status, message }),
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn start(&self) -> Result<ApiResponse> {
        debug!(url = %self.url("start"), "GET start");
        let reply = self.call(self.client.get(self.url("start"))).await?;
        Self::finish(reply, |body| {
            let (room_id, drone_ids) = wire::decode_start(&body)?;
            Ok(ApiResponse::Start { room_id, drone_ids })
        })
    }

    async fn send_commands(&self, drone_id: &str, commands: &[Command]) -> Result<ApiResponse> {
        let url = self.url(&format!("drone/{drone_id}/commands"));
        debug!(url = %url, count = commands.len(), "POST commands");
        let reply = self
            .call(self.client.post(url).json(&wire::encode_commands(commands)))
            .await?;
        Self::finish(reply, |body| {
            Ok(ApiResponse::Commands {
                drone_id: drone_id.to_string(),
                outcomes: wire::decode_commands(&body)?,
            })
        })
    }

    async fn send_report(&self, message: &str) -> Result<ApiResponse> {
        debug!(url = %self.url("report"), len = message.len(), "POST report");
        let reply = self
            .call(self.client.post(self.url("report")).json(&wire::encode_report(message)))
            .await?;
        Self::finish(reply, |body| {
            Ok(ApiResponse::Report {
                ack: wire::decode_report(&body)?,
            })
        })
    }
}
