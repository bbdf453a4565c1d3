//! HTTP client for a remote facilitator service.
//!
//! A facilitator verifies payment payloads and settles transactions
//! on-chain; this crate only consumes its `/verify`, `/settle`, and
//! `/supported` endpoints over HTTP. Facilitator implementation is
//! explicitly out of scope here.

use async_trait::async_trait;
use reqwest::Client;

use crate::errors::FacilitatorError;
use crate::types::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

/// Default production facilitator base URL.
pub const DEFAULT_FACILITATOR_BASE_URL: &str = "https://facilitator.x402.org";

/// The remote operations a Payment Server depends on.
///
/// A trait (rather than a concrete `HttpFacilitatorClient` everywhere) so
/// [`crate::requirements::build_requirements`] and
/// [`crate::process::PaymentServer::process`] can be exercised against a
/// mock in tests.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// `POST /verify`.
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, FacilitatorError>;

    /// `POST /settle`.
    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, FacilitatorError>;

    /// `GET /supported?chainId=&tokenAddress=`, filtered to the asset being
    /// cross-checked. The filter is advisory: callers still scan the
    /// returned `kinds` for a matching `(network, asset, paymentType)`
    /// entry rather than trusting the facilitator filtered correctly.
    async fn supported(&self, chain_id: u64, token_address: &str) -> Result<SupportedResponse, FacilitatorError>;
}

/// `Facilitator` implementation backed by a real HTTP facilitator service.
#[derive(Clone)]
pub struct HttpFacilitatorClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpFacilitatorClient {
    /// Builds a client against `base_url`, with no API key.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            client: Client::new(),
        }
    }

    /// Builds a client against the default production facilitator.
    pub fn production() -> Self {
        Self::new(DEFAULT_FACILITATOR_BASE_URL)
    }

    /// Attaches an `Authorization: Bearer <api_key>` header to every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl Facilitator for HttpFacilitatorClient {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, FacilitatorError> {
        let url = format!("{}/verify", self.base_url);
        let builder = self.apply_auth(self.client.post(&url).json(request));
        let response = builder
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| FacilitatorError::Decode(e.to_string()))
    }

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, FacilitatorError> {
        let url = format!("{}/settle", self.base_url);
        let builder = self.apply_auth(self.client.post(&url).json(request));
        let response = builder
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| FacilitatorError::Decode(e.to_string()))
    }

    /// A network-layer failure here returns an empty `kinds` list rather
    /// than an error, so that a down or slow facilitator never blocks
    /// requirements construction (see the permissive cross-check behavior in
    /// `crate::requirements`).
    async fn supported(&self, chain_id: u64, token_address: &str) -> Result<SupportedResponse, FacilitatorError> {
        let url = format!("{}/supported", self.base_url);
        let builder = self.apply_auth(
            self.client
                .get(&url)
                .query(&[("chainId", chain_id.to_string()), ("tokenAddress", token_address.to_string())]),
        );

        let response = match builder.send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(%err, "facilitator /supported request failed, treating as empty");
                return Ok(SupportedResponse { kinds: vec![] });
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "facilitator /supported returned non-2xx, treating as empty");
            return Ok(SupportedResponse { kinds: vec![] });
        }

        match response.json().await {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                tracing::warn!(%err, "facilitator /supported returned undecodable body, treating as empty");
                Ok(SupportedResponse { kinds: vec![] })
            }
        }
    }
}
