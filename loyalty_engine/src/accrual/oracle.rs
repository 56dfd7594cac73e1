use std::{future::Future, time::Duration};

use log::*;
use loyalty_common::{OrderNumber, Points};
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::db_types::{AccrualDecision, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Could not create the accrual service client: {0}")]
    Initialization(String),
    #[error("The accrual service is rate limiting requests")]
    RateLimited { retry_after: Option<Duration> },
    #[error("The accrual service does not know about this order yet")]
    NotRegistered,
    #[error("The accrual service failed with status {0}")]
    ServerError(u16),
    #[error("Could not reach the accrual service: {0}")]
    Network(String),
    #[error("Unexpected response status {0} from the accrual service")]
    UnexpectedStatus(u16),
    #[error("Malformed response from the accrual service: {0}")]
    Malformed(String),
}

impl OracleError {
    /// The delay the oracle asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OracleError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, OracleError::RateLimited { .. })
    }
}

/// The external service that decides whether an order earns points, and how many.
///
/// Implementations classify every failure into an [`OracleError`]; none of them are fatal to the caller.
pub trait AccrualOracle: Send + Sync + 'static {
    fn query_order(&self, number: &OrderNumber) -> impl Future<Output = Result<AccrualDecision, OracleError>> + Send;
}

//--------------------------------------  OracleOrderReport  ---------------------------------------------------------
/// The JSON body of a `200` reply: `{"order": "...", "status": "...", "accrual": 500}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleOrderReport {
    pub order: String,
    pub status: OracleOrderStatus,
    #[serde(default)]
    pub accrual: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OracleOrderStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl OracleOrderReport {
    /// Turns the report into a ledger decision for `number`. A report about a different order, a `PROCESSED` report
    /// without an accrual and a negative accrual are all malformed.
    pub fn into_decision(self, number: &OrderNumber) -> Result<AccrualDecision, OracleError> {
        if self.order != number.as_str() {
            return Err(OracleError::Malformed(format!("asked about order {number}, got a report for {}", self.order)));
        }
        let decision = match self.status {
            OracleOrderStatus::Registered => AccrualDecision::pending(number.clone(), OrderStatusType::New),
            OracleOrderStatus::Processing => AccrualDecision::pending(number.clone(), OrderStatusType::Processing),
            OracleOrderStatus::Invalid => AccrualDecision::pending(number.clone(), OrderStatusType::Invalid),
            OracleOrderStatus::Processed => {
                let raw = self.accrual.ok_or_else(|| {
                    OracleError::Malformed(format!("order {number} is PROCESSED but carries no accrual"))
                })?;
                let accrual = Points::try_from(raw).map_err(|e| OracleError::Malformed(e.to_string()))?;
                if accrual.is_negative() {
                    return Err(OracleError::Malformed(format!("negative accrual {accrual} for order {number}")));
                }
                AccrualDecision::processed(number.clone(), accrual)
            },
        };
        Ok(decision)
    }
}

/// Reads a `Retry-After` header given in whole seconds. HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

//--------------------------------------  HttpAccrualOracle  ---------------------------------------------------------
/// Queries `GET {base_url}/api/orders/{number}`.
#[derive(Clone)]
pub struct HttpAccrualOracle {
    base_url: String,
    client: Client,
}

impl HttpAccrualOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| OracleError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("🔮️ Accrual service client configured for {base_url}");
        Ok(Self { base_url, client })
    }

    pub fn order_url(&self, number: &OrderNumber) -> String {
        format!("{}/api/orders/{number}", self.base_url)
    }
}

impl AccrualOracle for HttpAccrualOracle {
    async fn query_order(&self, number: &OrderNumber) -> Result<AccrualDecision, OracleError> {
        let url = self.order_url(number);
        trace!("🔮️ GET {url}");
        let response = self.client.get(&url).send().await.map_err(|e| OracleError::Network(e.to_string()))?;
        let status = response.status();
        match status {
            StatusCode::OK => {
                let report = response
                    .json::<OracleOrderReport>()
                    .await
                    .map_err(|e| OracleError::Malformed(e.to_string()))?;
                trace!("🔮️ Order {number}: {report:?}");
                report.into_decision(number)
            },
            StatusCode::NO_CONTENT => Err(OracleError::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parse_retry_after(response.headers());
                debug!("🔮️ Rate limited while asking about {number}. Retry-After: {retry_after:?}");
                Err(OracleError::RateLimited { retry_after })
            },
            s if s.is_server_error() => Err(OracleError::ServerError(s.as_u16())),
            s => Err(OracleError::UnexpectedStatus(s.as_u16())),
        }
    }
}
