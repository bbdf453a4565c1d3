//! Axum server wiring `ResourceResolver` + `run_gate` into a protected route.
//!
//! Run with:
//! ```bash
//! cargo run --example axum_gate
//! ```
//!
//! Environment variables:
//! - PAY_TO: address to receive payments
//! - FACILITATOR_URL: URL of the facilitator service
//! - RPC_URL: JSON-RPC endpoint for the chain the protected asset lives on
//! - PORT: server port (default: 3000)

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ethers::abi::{ParamType, Token};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Bytes, H256};
use serde_json::json;
use std::sync::Arc;

use x402_core::detector::TokenDetector;
use x402_core::errors::RpcError;
use x402_core::facilitator::HttpFacilitatorClient;
use x402_core::middleware::{GateOutcome, ResolvedRequest, ResourceResolver};
use x402_core::network::Network;
use x402_core::requirements::CreateRequirementsConfig;
use x402_core::rpc::RpcClient;

/// Adapts an `ethers` JSON-RPC provider to the crate's `RpcClient` contract.
struct EthersRpc {
    provider: Provider<Http>,
}

#[async_trait]
impl RpcClient for EthersRpc {
    async fn get_chain_id(&self) -> Result<u64, RpcError> {
        self.provider
            .get_chainid()
            .await
            .map(|id| id.as_u64())
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.provider
            .get_code(address, None)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256, RpcError> {
        self.provider
            .get_storage_at(address, slot, None)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn read_contract(
        &self,
        address: Address,
        signature: &str,
        args: &[Token],
        return_types: &[ParamType],
    ) -> Result<Vec<Token>, RpcError> {
        use ethers::abi::short_signature;

        let selector = short_signature(
            signature.split('(').next().unwrap_or(signature),
            &args.iter().map(|_| ParamType::Bytes).collect::<Vec<_>>(),
        );
        let mut data = selector.to_vec();
        data.extend(ethers::abi::encode(args));

        let tx = ethers::types::TransactionRequest::new().to(address).data(data);
        let result = self
            .provider
            .call(&tx.into(), None)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        ethers::abi::decode(return_types, &result).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

#[derive(Clone)]
struct WeatherResolver {
    pay_to: String,
}

#[async_trait]
impl ResourceResolver for WeatherResolver {
    type Request = HeaderMap;

    async fn resolve(&self, headers: &HeaderMap) -> ResolvedRequest {
        let payment_header = headers
            .get("X-PAYMENT")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        ResolvedRequest {
            requirements_config: CreateRequirementsConfig {
                asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
                max_amount_required: "10000".to_string(),
                pay_to: self.pay_to.clone(),
                resource: "/weather".to_string(),
                description: Some("Weather API access".to_string()),
                ..Default::default()
            },
            payment_header,
        }
    }

    async fn on_payment_success(&self, _request: &HeaderMap, payer: &str, tx_hash: &str) {
        tracing::info!(%payer, %tx_hash, "payment settled");
    }

    async fn on_402(&self, _request: &HeaderMap, response: &x402_core::types::Response402) {
        tracing::debug!(?response.error, ?response.error_stage, "rejecting request");
    }
}

#[derive(Clone)]
struct AppState {
    resolver: Arc<WeatherResolver>,
    detector: Arc<TokenDetector<EthersRpc>>,
    facilitator: Arc<HttpFacilitatorClient>,
    /// Network assumed when a resolved request doesn't pin one down itself;
    /// configured once at server construction (`DEFAULT_NETWORK` env var)
    /// rather than derived from the RPC client's chain id every request.
    default_network: Option<Network>,
}

async fn weather_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match x402_core::middleware::run_gate(
        state.resolver.as_ref(),
        &headers,
        state.detector.as_ref(),
        state.facilitator.as_ref(),
        state.default_network.as_ref(),
    )
    .await
    {
        GateOutcome::Admit { payer, tx_hash } => (
            StatusCode::OK,
            Json(json!({
                "location": "San Francisco",
                "temperature": 68,
                "conditions": "Sunny",
                "paid": true,
                "payer": payer,
                "tx_hash": tx_hash,
            })),
        )
            .into_response(),
        GateOutcome::Reject { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::PAYMENT_REQUIRED);
            (status, Json(body)).into_response()
        }
        GateOutcome::ConfigError { error } => {
            if error.is_validation_error() {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Invalid payment configuration",
                        "message": error.to_string(),
                    })),
                )
                    .into_response()
            } else {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error.to_string() }))).into_response()
            }
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "protocol": "x402", "version": 1 }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let pay_to = std::env::var("PAY_TO").unwrap_or_else(|_| "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string());
    let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| "https://mainnet.base.org".to_string());
    let facilitator_url =
        std::env::var("FACILITATOR_URL").unwrap_or_else(|_| "https://facilitator.x402.org".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse::<u16>()?;
    let default_network = std::env::var("DEFAULT_NETWORK")
        .ok()
        .and_then(|s| Network::try_from(s).ok());

    let provider = Provider::<Http>::try_from(rpc_url)?;
    let rpc = Arc::new(EthersRpc { provider });
    let detector = Arc::new(TokenDetector::new(rpc).await?);
    let facilitator = Arc::new(HttpFacilitatorClient::new(facilitator_url));
    let resolver = Arc::new(WeatherResolver { pay_to });

    let state = AppState { resolver, detector, facilitator, default_network };

    let app = Router::new()
        .route("/weather", get(weather_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
