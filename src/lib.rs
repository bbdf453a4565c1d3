//! # x402-core
//!
//! Server-side core of the x402 HTTP payment-gating protocol: a resource
//! server requires clients to attach a cryptographically signed
//! token-transfer authorization to any request targeting a protected
//! resource. Absent or invalid, it answers `402 Payment Required` with a
//! machine-readable description of acceptable payment terms; valid, it
//! submits the authorization to a remote facilitator for settlement and
//! admits the request on confirmation.
//!
//! This crate covers three tightly coupled subsystems:
//!
//! 1. **Token-capability detection** ([`detector`]) — a cached, proxy-aware
//!    introspector deciding which EIP-712 authorization flavor
//!    (`eip3009` / `permit` / `permit2`) an ERC-20 token supports.
//! 2. **Payment-requirements construction** ([`requirements`]) — the 402
//!    response generator, backed by detection and cross-checked against a
//!    facilitator's declared support matrix.
//! 3. **The `process()` pipeline** ([`process`]) — `parse → verify → settle`,
//!    turning an incoming `X-PAYMENT` header into a settled transaction or a
//!    categorized 402/500 rejection.
//!
//! Deliberately out of scope: the facilitator's own verification/settlement
//! logic, the blockchain RPC client's implementation (only its [`rpc::RpcClient`]
//! interface is specified), HTTP framework glue, and client-side signing.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use x402_core::detector::TokenDetector;
//! use x402_core::facilitator::HttpFacilitatorClient;
//! use x402_core::requirements::{build_requirements, CreateRequirementsConfig};
//!
//! # struct MyRpcClient;
//! # #[async_trait::async_trait]
//! # impl x402_core::rpc::RpcClient for MyRpcClient {
//! #     async fn get_chain_id(&self) -> Result<u64, x402_core::errors::RpcError> { Ok(56) }
//! #     async fn get_code(&self, _: ethers::types::Address) -> Result<ethers::types::Bytes, x402_core::errors::RpcError> { Ok(Default::default()) }
//! #     async fn get_storage_at(&self, _: ethers::types::Address, _: ethers::types::H256) -> Result<ethers::types::H256, x402_core::errors::RpcError> { Ok(Default::default()) }
//! #     async fn read_contract(&self, _: ethers::types::Address, _: &str, _: &[ethers::abi::Token], _: &[ethers::abi::ParamType]) -> Result<Vec<ethers::abi::Token>, x402_core::errors::RpcError> { Ok(vec![]) }
//! # }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let rpc = Arc::new(MyRpcClient);
//! let detector = TokenDetector::new(rpc).await?;
//! let facilitator = HttpFacilitatorClient::production();
//!
//! let config = CreateRequirementsConfig {
//!     asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
//!     max_amount_required: "1000000".to_string(),
//!     pay_to: "0xYOUR_ADDRESS".to_string(),
//!     resource: "/api/weather".to_string(),
//!     ..Default::default()
//! };
//!
//! let requirements = build_requirements(&config, &detector, &facilitator, None).await?;
//! # let _ = requirements;
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported networks
//!
//! `base`, `base-sepolia`, `avalanche`, `avalanche-fuji`, `iotex`, `sei`,
//! `sei-testnet`, `polygon`, `polygon-amoy`, `peaq`, `bsc`, `bsc-testnet`,
//! `solana`, `solana-devnet`, plus `chain-<id>` for anything else.
//!
//! ## Payment scheme
//!
//! Only the `exact` scheme is supported: the payer authorizes exactly
//! `maxAmountRequired`, via EIP-3009 `transferWithAuthorization`, EIP-2612
//! `permit`, or Permit2, depending on what the token contract supports.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod detector;
pub mod errors;
pub mod facilitator;
pub mod middleware;
pub mod network;
pub mod presets;
pub mod process;
pub mod requirements;
pub mod rpc;
pub mod types;
pub mod utils;

pub use errors::{Result, X402Error};
pub use network::Network;
pub use types::{
    AuthorizationPayload, ErrorStage, PaymentPayload, PaymentRequirements, PaymentType, Response402,
    TokenCapabilities, X402_VERSION,
};
