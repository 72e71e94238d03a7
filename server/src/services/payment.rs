//! Outbound payment-provider client.
//!
//! The provider hosts the invoice page the customer pays on. Calls are best-effort: a failure
//! here never undoes a committed seat claim, it only leaves the booking without a pay link.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::PaymentConfig;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider is not configured")]
    NotConfigured,

    #[error("request to payment provider failed: {0}")]
    Request(String),

    #[error("payment provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not decode payment provider response: {0}")]
    Decode(String),

    #[error("no invoice found for external id {0}")]
    InvoiceNotFound(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Settled,
    Expired,
    Unknown(String),
}

impl From<&str> for InvoiceStatus {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => InvoiceStatus::Pending,
            "PAID" => InvoiceStatus::Paid,
            "SETTLED" => InvoiceStatus::Settled,
            "EXPIRED" => InvoiceStatus::Expired,
            other => InvoiceStatus::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceItem {
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    /// Booking id; comes back as `external_id` on callbacks.
    pub external_id: Uuid,
    pub amount: Decimal,
    pub payer_email: String,
    pub description: String,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone)]
pub struct Invoice {
    pub id: String,
    pub invoice_url: String,
    pub external_id: String,
    pub status: InvoiceStatus,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentError>;

    /// Most recent invoice issued for a booking.
    async fn find_invoice_by_external_id(&self, external_id: Uuid)
        -> Result<Invoice, PaymentError>;
}

#[derive(Serialize)]
struct CreateInvoiceBody<'a> {
    external_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    payer_email: &'a str,
    description: &'a str,
    currency: &'a str,
    invoice_duration: u64,
    success_redirect_url: &'a str,
    failure_redirect_url: &'a str,
    items: &'a [InvoiceItem],
}

#[derive(Deserialize)]
struct InvoiceBody {
    id: String,
    #[serde(default)]
    invoice_url: String,
    external_id: String,
    status: String,
}

impl From<InvoiceBody> for Invoice {
    fn from(body: InvoiceBody) -> Self {
        Self {
            status: InvoiceStatus::from(body.status.as_str()),
            id: body.id,
            invoice_url: body.invoice_url,
            external_id: body.external_id,
        }
    }
}

/// Xendit-style invoice API client (`/v2/invoices`, HTTP basic auth with the secret key).
#[derive(Clone)]
pub struct InvoiceClient {
    client: Client,
    base_url: String,
    api_key: String,
    currency: String,
    invoice_ttl: Duration,
    success_url: String,
    failure_url: String,
}

impl InvoiceClient {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let api_key = config.api_key.clone().ok_or(PaymentError::NotConfigured)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            currency: config.currency.clone(),
            invoice_ttl: config.invoice_ttl,
            success_url: config.success_redirect_url(),
            failure_url: config.failure_redirect_url(),
        })
    }

    fn invoices_url(&self) -> String {
        format!("{}/v2/invoices", self.base_url)
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| PaymentError::Decode(e.to_string())),
            StatusCode::UNAUTHORIZED => Err(PaymentError::Api {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message: "provider rejected the API key".to_string(),
            }),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(PaymentError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl PaymentProvider for InvoiceClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, PaymentError> {
        let body = CreateInvoiceBody {
            external_id: request.external_id.to_string(),
            amount: request.amount,
            payer_email: &request.payer_email,
            description: &request.description,
            currency: &self.currency,
            invoice_duration: self.invoice_ttl.as_secs(),
            success_redirect_url: &self.success_url,
            failure_redirect_url: &self.failure_url,
            items: &request.items,
        };

        let response = self
            .client
            .post(self.invoices_url())
            .basic_auth(&self.api_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let invoice: Invoice = Self::read::<InvoiceBody>(response).await?.into();
        debug!(external_id = %request.external_id, invoice_id = %invoice.id, "Invoice created");
        Ok(invoice)
    }

    async fn find_invoice_by_external_id(
        &self,
        external_id: Uuid,
    ) -> Result<Invoice, PaymentError> {
        let response = self
            .client
            .get(self.invoices_url())
            .basic_auth(&self.api_key, Some(""))
            .query(&[("external_id", external_id.to_string())])
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        Self::read::<Vec<InvoiceBody>>(response)
            .await?
            .into_iter()
            .next()
            .map(Invoice::from)
            .ok_or(PaymentError::InvoiceNotFound(external_id))
    }
}
