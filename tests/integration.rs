//! End-to-end tests for the x402 payment-gating pipeline.
//!
//! These exercise `build_requirements` and `PaymentServer::process` together
//! against fake RPC and facilitator backends, covering the scenarios a real
//! deployment hits: cold-token auto-detect, preset short-circuit, and every
//! branch of the parse/verify/settle state machine.

use async_trait::async_trait;
use ethers::abi::{ParamType, Token};
use ethers::types::{Address, Bytes, H256};
use std::collections::HashMap;
use std::sync::Arc;

use x402_core::codec::encode_payment_header;
use x402_core::detector::TokenDetector;
use x402_core::errors::{FacilitatorError, RpcError};
use x402_core::facilitator::Facilitator;
use x402_core::process::PaymentServer;
use x402_core::requirements::{build_requirements, CreateRequirementsConfig};
use x402_core::types::{
    AuthorizationPayload, ErrorStage, PaymentPayload, PaymentType, SettleRequest, SettleResponse,
    SupportedAsset, SupportedAssetEip712, SupportedKind, SupportedKindExtra, SupportedResponse, VerifyRequest,
    VerifyResponse,
};

struct FakeRpc {
    chain_id: u64,
    code: HashMap<Address, Vec<u8>>,
    names: HashMap<Address, String>,
}

impl FakeRpc {
    fn new(chain_id: u64) -> Self {
        Self { chain_id, code: HashMap::new(), names: HashMap::new() }
    }
}

#[async_trait]
impl x402_core::rpc::RpcClient for FakeRpc {
    async fn get_chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.chain_id)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        Ok(Bytes::from(self.code.get(&address).cloned().unwrap_or_default()))
    }

    async fn get_storage_at(&self, _address: Address, _slot: H256) -> Result<H256, RpcError> {
        Ok(H256::zero())
    }

    async fn read_contract(
        &self,
        address: Address,
        signature: &str,
        _args: &[Token],
        _return_types: &[ParamType],
    ) -> Result<Vec<Token>, RpcError> {
        match signature {
            "name()" => self
                .names
                .get(&address)
                .cloned()
                .map(|n| vec![Token::String(n)])
                .ok_or_else(|| RpcError::Decode("no name".to_string())),
            "eip712Domain()" => Err(RpcError::Decode("not implemented by fixture".to_string())),
            "version()" => Ok(vec![Token::String("2".to_string())]),
            "implementation()" => Ok(vec![Token::Address(Address::zero())]),
            "supportsInterface(bytes4)" => Ok(vec![Token::Bool(false)]),
            _ => Err(RpcError::Decode("unknown function".to_string())),
        }
    }
}

struct StubFacilitator {
    kinds: Vec<SupportedKind>,
    verify_result: Result<VerifyResponse, FacilitatorError>,
    settle_result: Result<SettleResponse, FacilitatorError>,
}

impl StubFacilitator {
    fn happy_path() -> Self {
        Self {
            kinds: vec![],
            verify_result: Ok(VerifyResponse {
                success: true,
                payer: Some("0xPAYER0000000000000000000000000000000001".to_string()),
                error: None,
                error_message: None,
            }),
            settle_result: Ok(SettleResponse {
                success: true,
                transaction: Some("0xTX0000000000000000000000000000000000001".to_string()),
                network: Some("bsc".to_string()),
                receipt: None,
                error: None,
                error_message: None,
            }),
        }
    }
}

#[async_trait]
impl Facilitator for StubFacilitator {
    async fn verify(&self, _req: &VerifyRequest) -> Result<VerifyResponse, FacilitatorError> {
        self.verify_result.clone()
    }
    async fn settle(&self, _req: &SettleRequest) -> Result<SettleResponse, FacilitatorError> {
        self.settle_result.clone()
    }
    async fn supported(&self, _chain_id: u64, _token_address: &str) -> Result<SupportedResponse, FacilitatorError> {
        Ok(SupportedResponse { kinds: self.kinds.clone() })
    }
}

fn encoded_header() -> String {
    let payload = PaymentPayload {
        x402_version: 1,
        scheme: "exact".to_string(),
        network: "bsc".to_string(),
        payload: AuthorizationPayload::Eip3009 {
            from: "0xfrom".to_string(),
            to: "0xto".to_string(),
            value: "1000000".to_string(),
            valid_after: "0".to_string(),
            valid_before: "9999999999".to_string(),
            nonce: "0x01".to_string(),
            signature: "0xsig".to_string(),
        },
    };
    encode_payment_header(&payload).unwrap()
}

#[tokio::test]
async fn test_cold_usdc_like_token_auto_detect() {
    let usdc: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap();
    let mut rpc = FakeRpc::new(8453);
    rpc.code.insert(usdc, hex::decode("e3ee160e").unwrap());
    rpc.names.insert(usdc, "USD Coin".to_string());
    let detector = TokenDetector::new(Arc::new(rpc)).await.unwrap();
    let facilitator = StubFacilitator::happy_path();

    let config = CreateRequirementsConfig {
        asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
        max_amount_required: "1000000".to_string(),
        pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string(),
        resource: "/api/weather".to_string(),
        network: Some("base".to_string()),
        ..Default::default()
    };

    let requirements = build_requirements(&config, &detector, &facilitator, None).await.unwrap();
    assert_eq!(requirements.payment_type, PaymentType::Eip3009);
    assert_eq!(requirements.network, "base");
    let extra = requirements.extra.unwrap();
    assert_eq!(extra["name"], "USD Coin");
}

#[tokio::test]
async fn test_preset_gated_token_skips_rpc_selector_probe() {
    let rpc = FakeRpc::new(56);
    let detector = TokenDetector::new(Arc::new(rpc)).await.unwrap();
    let facilitator = StubFacilitator::happy_path();

    let config = CreateRequirementsConfig {
        asset: "0x8b95c6f1c7e4b10e3de7e33f6e9e5d8d3d3dd3e1".to_string(),
        max_amount_required: "1000".to_string(),
        pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string(),
        resource: "/api/weather".to_string(),
        network: Some("bsc".to_string()),
        ..Default::default()
    };

    let requirements = build_requirements(&config, &detector, &facilitator, None).await.unwrap();
    assert_eq!(requirements.payment_type, PaymentType::Permit);
}

#[tokio::test]
async fn test_missing_header_yields_402_parse() {
    let facilitator = StubFacilitator::happy_path();
    let requirements = build_requirements(
        &CreateRequirementsConfig {
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            max_amount_required: "1000".to_string(),
            pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string(),
            resource: "/x".to_string(),
            payment_type: Some(PaymentType::Eip3009),
            auto_detect: Some(false),
            ..Default::default()
        },
        &TokenDetector::new(Arc::new(FakeRpc::new(56))).await.unwrap(),
        &facilitator,
        None,
    )
    .await
    .unwrap();

    let server = PaymentServer::new(&facilitator);
    let failure = server.process(None, &requirements).await.unwrap_err();
    assert_eq!(failure.status, 402);
    assert_eq!(failure.response.error_stage, Some(ErrorStage::Parse));
    assert_eq!(failure.response.error.as_deref(), Some("missing_payment_header"));
    assert_eq!(failure.response.accepts.len(), 1);
}

#[tokio::test]
async fn test_verify_fails_yields_402_verify() {
    let facilitator = StubFacilitator {
        verify_result: Ok(VerifyResponse {
            success: false,
            payer: None,
            error: Some("invalid_signature".to_string()),
            error_message: None,
        }),
        ..StubFacilitator::happy_path()
    };
    let detector = TokenDetector::new(Arc::new(FakeRpc::new(56))).await.unwrap();
    let requirements = build_requirements(
        &CreateRequirementsConfig {
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            max_amount_required: "1000".to_string(),
            pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string(),
            resource: "/x".to_string(),
            payment_type: Some(PaymentType::Eip3009),
            auto_detect: Some(false),
            ..Default::default()
        },
        &detector,
        &facilitator,
        None,
    )
    .await
    .unwrap();

    let server = PaymentServer::new(&facilitator);
    let failure = server.process(Some(&encoded_header()), &requirements).await.unwrap_err();
    assert_eq!(failure.status, 402);
    assert_eq!(failure.response.error_stage, Some(ErrorStage::Verify));
    assert_eq!(failure.response.error.as_deref(), Some("invalid_signature"));
}

#[tokio::test]
async fn test_settle_fails_after_verify_succeeds_yields_500() {
    let facilitator = StubFacilitator {
        settle_result: Ok(SettleResponse {
            success: false,
            transaction: None,
            network: None,
            receipt: None,
            error: Some("insufficient_gas".to_string()),
            error_message: None,
        }),
        ..StubFacilitator::happy_path()
    };
    let detector = TokenDetector::new(Arc::new(FakeRpc::new(56))).await.unwrap();
    let requirements = build_requirements(
        &CreateRequirementsConfig {
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            max_amount_required: "1000".to_string(),
            pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string(),
            resource: "/x".to_string(),
            payment_type: Some(PaymentType::Eip3009),
            auto_detect: Some(false),
            ..Default::default()
        },
        &detector,
        &facilitator,
        None,
    )
    .await
    .unwrap();

    let server = PaymentServer::new(&facilitator);
    let failure = server.process(Some(&encoded_header()), &requirements).await.unwrap_err();
    assert_eq!(failure.status, 500);
    assert_eq!(failure.response.error_stage, Some(ErrorStage::Settle));
    assert_eq!(failure.response.error.as_deref(), Some("insufficient_gas"));
}

#[tokio::test]
async fn test_happy_path_yields_200_with_payer_and_tx_hash() {
    let facilitator = StubFacilitator::happy_path();
    let detector = TokenDetector::new(Arc::new(FakeRpc::new(56))).await.unwrap();
    let requirements = build_requirements(
        &CreateRequirementsConfig {
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            max_amount_required: "1000".to_string(),
            pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string(),
            resource: "/x".to_string(),
            payment_type: Some(PaymentType::Eip3009),
            auto_detect: Some(false),
            ..Default::default()
        },
        &detector,
        &facilitator,
        None,
    )
    .await
    .unwrap();

    let server = PaymentServer::new(&facilitator);
    let success = server.process(Some(&encoded_header()), &requirements).await.unwrap();
    assert_eq!(success.payer, "0xPAYER0000000000000000000000000000000001");
    assert_eq!(success.tx_hash, "0xTX0000000000000000000000000000000000001");
}

#[tokio::test]
async fn test_cache_hit_after_first_detect() {
    let usdc: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap();
    let mut rpc = FakeRpc::new(8453);
    rpc.code.insert(usdc, hex::decode("e3ee160e").unwrap());
    rpc.names.insert(usdc, "USD Coin".to_string());
    let detector = TokenDetector::new(Arc::new(rpc)).await.unwrap();

    detector.detect(usdc).await.unwrap();
    let stats = detector.get_cache_stats().await;
    assert_eq!(stats.entries, 1);

    let second = detector.detect(usdc).await.unwrap();
    assert_eq!(second.name.as_deref(), Some("USD Coin"));
}

#[tokio::test]
async fn test_get_recommended_method_priority() {
    let token: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap();
    let mut rpc = FakeRpc::new(8453);
    rpc.code.insert(token, hex::decode("e3ee160ed505accf").unwrap());
    rpc.names.insert(token, "Multi Method Token".to_string());
    let detector = TokenDetector::new(Arc::new(rpc)).await.unwrap();

    let method = detector.get_recommended_method(token).await.unwrap();
    assert_eq!(method, Some(PaymentType::Eip3009));
}

#[tokio::test]
async fn test_facilitator_unsupported_combination_is_fatal() {
    let facilitator = StubFacilitator {
        kinds: vec![SupportedKind {
            x402_version: 1,
            scheme: "exact".to_string(),
            network: "base".to_string(),
            extra: SupportedKindExtra {
                assets: vec![SupportedAsset {
                    address: "0xdeadbeef".to_string(),
                    eip712: SupportedAssetEip712 {
                        name: "Other".to_string(),
                        version: "1".to_string(),
                        primary_type: "Permit".to_string(),
                    },
                }],
            },
        }],
        ..StubFacilitator::happy_path()
    };
    let detector = TokenDetector::new(Arc::new(FakeRpc::new(56))).await.unwrap();

    let err = build_requirements(
        &CreateRequirementsConfig {
            asset: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
            max_amount_required: "1000".to_string(),
            pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string(),
            resource: "/x".to_string(),
            payment_type: Some(PaymentType::Eip3009),
            auto_detect: Some(false),
            network: Some("bsc".to_string()),
            ..Default::default()
        },
        &detector,
        &facilitator,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        x402_core::errors::RequirementsError::UnsupportedByFacilitator { .. }
    ));
}
