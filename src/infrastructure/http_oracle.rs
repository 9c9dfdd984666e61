use crate::domain::order::{OracleResult, OrderNumber};
use crate::domain::ports::AccrualOracle;
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Fallback pause when the oracle throttles without a usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Accrual oracle reached over HTTP at `{base}/api/orders/{number}`.
#[derive(Clone, Debug)]
pub struct HttpAccrualOracle {
    client: Client,
    base_url: String,
}

impl HttpAccrualOracle {
    /// Builds a client whose requests are cut off after `request_timeout`.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn order_url(&self, order: OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, order)
    }

    async fn decode(response: Response, order: OrderNumber) -> Result<OracleResult> {
        let body = response.bytes().await?;
        let result: OracleResult = serde_json::from_slice(&body).map_err(|e| {
            ReconcileError::ValidationError(format!(
                "malformed oracle payload for order {order}: {e}"
            ))
        })?;
        result.validate_for(order)
    }
}

fn retry_after(response: &Response) -> Duration {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[async_trait]
impl AccrualOracle for HttpAccrualOracle {
    async fn request_status(&self, order: OrderNumber) -> Result<OracleResult> {
        let url = self.order_url(order);
        tracing::debug!(%url, "requesting accrual status");

        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Self::decode(response, order).await,
            StatusCode::NO_CONTENT => Err(ReconcileError::OrderNotRegistered(order)),
            StatusCode::TOO_MANY_REQUESTS => Err(ReconcileError::RateLimited {
                retry_after: retry_after(&response),
            }),
            status => Err(ReconcileError::OracleStatus(status.as_u16())),
        }
    }
}
