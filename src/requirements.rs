//! Requirements Builder: turns a [`CreateRequirementsConfig`] into a
//! validated [`PaymentRequirements`], auto-detecting the payment type and
//! cross-checking the facilitator's declared support matrix.

use ethers::types::Address;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::detector::TokenDetector;
use crate::errors::RequirementsError;
use crate::facilitator::Facilitator;
use crate::network::Network;
use crate::rpc::RpcClient;
use crate::types::{PaymentRequirements, PaymentType};

/// Matches `^0x[0-9a-fA-F]{40}$`, the wire format for a 20-byte hex address.
fn is_valid_asset_address(asset: &str) -> bool {
    asset.len() == 42
        && asset.starts_with("0x")
        && asset[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Input to [`build_requirements`].
#[derive(Debug, Clone, Default)]
pub struct CreateRequirementsConfig {
    /// 20-byte hex ERC-20 token address.
    pub asset: String,
    /// Non-negative decimal integer, base units of `asset`.
    pub max_amount_required: String,
    /// Network override; defaults to the detector's bound network when absent.
    pub network: Option<String>,
    /// Scheme override; defaults to `"exact"`.
    pub scheme: Option<String>,
    /// Explicit payment type; `None` or `"auto"` triggers auto-detection
    /// unless `autoDetect == Some(false)`.
    pub payment_type: Option<PaymentType>,
    /// Whether to run the Token Detector. Defaults to `true`.
    pub auto_detect: Option<bool>,
    /// Merchant's receiving address.
    pub pay_to: String,
    /// Resource URL this payment unlocks.
    pub resource: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Resource MIME type; defaults to `"application/json"`.
    pub mime_type: Option<String>,
    /// Authorization validity window, in seconds; defaults to 300.
    pub max_timeout_seconds: Option<u64>,
    /// Caller-supplied extra data, merged with detector-derived `name`/`version`.
    pub extra: Option<serde_json::Value>,
    /// Opaque response schema passed through unchanged.
    pub output_schema: Option<serde_json::Value>,
}

/// Builds a validated [`PaymentRequirements`] from `config`.
///
/// `detector` supplies auto-detection and EIP-712 domain data; `facilitator`
/// supplies the support-matrix cross-check. Both dependencies are injected
/// so the builder stays mockable for tests.
///
/// `network` is resolved in three tiers: `config.network` (a per-call
/// override), then `server_network` (the default configured when the
/// Payment Server was constructed), then `detector.network()` (derived from
/// the bound RPC client's chain id).
pub async fn build_requirements<R: RpcClient, F: Facilitator>(
    config: &CreateRequirementsConfig,
    detector: &TokenDetector<R>,
    facilitator: &F,
    server_network: Option<&Network>,
) -> Result<PaymentRequirements, RequirementsError> {
    if !is_valid_asset_address(&config.asset) {
        return Err(RequirementsError::InvalidAsset(config.asset.clone()));
    }
    if config.max_amount_required.is_empty()
        || !config.max_amount_required.chars().all(|c| c.is_ascii_digit())
    {
        return Err(RequirementsError::InvalidAmount(config.max_amount_required.clone()));
    }

    let network = match &config.network {
        Some(explicit) => Network::try_from(explicit.clone()).unwrap_or_else(|_| Network::Unknown(0)),
        None => server_network.cloned().unwrap_or_else(|| detector.network().clone()),
    };

    let asset_address = Address::from_str(&config.asset)
        .map_err(|_| RequirementsError::InvalidAsset(config.asset.clone()))?;

    let (payment_type, detected_name, detected_version) = if config.auto_detect != Some(false) {
        let caps = detector.detect(asset_address).await?;
        let payment_type = match config.payment_type {
            Some(pt) => pt,
            None => caps.recommended_method().ok_or(RequirementsError::NoRecommendedMethod)?,
        };
        (payment_type, caps.name, Some(caps.version))
    } else {
        let payment_type = config.payment_type.ok_or(RequirementsError::PaymentTypeRequired)?;
        (payment_type, None, None)
    };

    cross_check_facilitator_support(facilitator, detector.chain_id(), &network, &config.asset, payment_type).await?;

    let mut extra = config.extra.clone().unwrap_or_else(|| json!({}));
    if let Some(obj) = extra.as_object_mut() {
        if let Some(name) = detected_name {
            obj.entry("name").or_insert(json!(name));
        }
        if let Some(version) = detected_version {
            obj.entry("version").or_insert(json!(version));
        }
    }
    let extra = if extra.as_object().map(|o| o.is_empty()).unwrap_or(true) {
        None
    } else {
        Some(extra)
    };

    let requirements = PaymentRequirements {
        scheme: config.scheme.clone().unwrap_or_else(|| "exact".to_string()),
        network: network.as_wire_str(),
        max_amount_required: config.max_amount_required.clone(),
        pay_to: config.pay_to.clone(),
        asset: config.asset.clone(),
        payment_type,
        max_timeout_seconds: config.max_timeout_seconds.unwrap_or(300),
        resource: config.resource.clone(),
        description: config.description.clone(),
        mime_type: Some(config.mime_type.clone().unwrap_or_else(|| "application/json".to_string())),
        output_schema: config.output_schema.clone(),
        extra,
    };

    if !is_valid_asset_address(&requirements.asset) || !requirements.max_amount_is_valid() {
        return Err(RequirementsError::InvalidAsset(requirements.asset.clone()));
    }

    Ok(requirements)
}

/// Confirms `(network, asset, paymentType)` appears in the facilitator's
/// declared support matrix.
///
/// An empty or network-error response from `facilitator.supported()` is
/// treated as permissive (the check is skipped); a successful, populated
/// response with no matching entry is a fatal configuration error.
async fn cross_check_facilitator_support<F: Facilitator>(
    facilitator: &F,
    chain_id: u64,
    network: &Network,
    asset: &str,
    payment_type: PaymentType,
) -> Result<(), RequirementsError> {
    let supported = match facilitator.supported(chain_id, asset).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%err, "facilitator.supported() failed; skipping support cross-check");
            return Ok(());
        }
    };

    if supported.kinds.is_empty() {
        tracing::debug!("facilitator declared no supported kinds; skipping support cross-check");
        return Ok(());
    }

    let asset_lower = asset.to_lowercase();
    let wanted_primary_type = payment_type.primary_type();

    let mut all_combinations = Vec::new();
    for kind in &supported.kinds {
        if kind.network != network.as_wire_str() {
            continue;
        }
        for supported_asset in &kind.extra.assets {
            all_combinations.push(format!(
                "{}/{}/{}",
                kind.network, supported_asset.address, supported_asset.eip712.primary_type
            ));
            if supported_asset.address.to_lowercase() == asset_lower
                && supported_asset.eip712.primary_type == wanted_primary_type
            {
                return Ok(());
            }
        }
    }

    Err(RequirementsError::UnsupportedByFacilitator {
        payment_type: payment_type.to_string(),
        asset: asset.to_string(),
        network: network.as_wire_str(),
        supported: all_combinations,
    })
}

/// Not used outside this module; kept to document the `Arc<dyn Facilitator>`
/// shape consumers typically wire into [`build_requirements`].
pub type DynFacilitator = Arc<dyn Facilitator>;
