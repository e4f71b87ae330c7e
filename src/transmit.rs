use crate::config::Config;
use crate::report::StatusReport;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub cause: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered() -> Self {
        Self {
            success: true,
            cause: None,
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            success: false,
            cause: Some(cause.into()),
        }
    }
}

impl From<Result<(), DeliveryError>> for DeliveryOutcome {
    fn from(value: Result<(), DeliveryError>) -> Self {
        match value {
            Ok(()) => DeliveryOutcome::delivered(),
            Err(err) => DeliveryOutcome::failed(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("endpoint unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("endpoint responded with HTTP {0}")]
    Status(StatusCode),
}

pub struct Transmitter {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl Transmitter {
    pub fn new(cfg: &Config) -> Self {
        let client = Client::builder()
            .user_agent(format!("arcade-agent/{}", cfg.agent_version))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, cfg.endpoint.clone(), cfg.request_timeout())
    }

    pub fn with_client(client: Client, endpoint: String, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }

    pub async fn send(&self, report: &StatusReport) -> DeliveryOutcome {
        self.deliver(report).await.into()
    }

    pub async fn deliver(&self, report: &StatusReport) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(report)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::Status(status));
        }
        debug!(endpoint = %self.endpoint, status = status.as_u16(), "status report delivered");
        Ok(())
    }

    fn classify(&self, err: reqwest::Error) -> DeliveryError {
        if err.is_timeout() {
            DeliveryError::Timeout(self.timeout)
        } else if err.is_connect() {
            DeliveryError::Unreachable(err)
        } else {
            DeliveryError::Transport(err)
        }
    }
}
