//! The `process()` pipeline: `parse → verify → settle`, turning an
//! `X-PAYMENT` header into either a settled payment or a precisely
//! categorized 402/500 rejection.

use crate::codec::decode_payment_header;
use crate::errors::StageError;
use crate::facilitator::Facilitator;
use crate::types::{
    ErrorStage, PaymentPayload, PaymentRequirements, Response402, SettleRequest, VerifyRequest, X402_VERSION,
};

/// Outcome of a successful `process()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSuccess {
    /// Address recovered from the authorization signature during verify.
    pub payer: String,
    /// Settlement transaction hash.
    pub tx_hash: String,
}

/// Outcome of a failed `process()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    /// HTTP status to return: 402 for parse/verify, 500 for settle.
    pub status: u16,
    /// The 402/500 body to return.
    pub response: Response402,
}

/// The result of running the pipeline to completion.
pub type ProcessResult = Result<ProcessSuccess, ProcessFailure>;

/// Owns nothing itself; holds a reference to the facilitator and drives the
/// three stages in order. Constructed per call rather than as a long-lived
/// type, since the only state a Payment Server needs to share across calls
/// (the detector's cache) lives in [`crate::detector::TokenDetector`].
pub struct PaymentServer<'a, F: Facilitator> {
    facilitator: &'a F,
}

impl<'a, F: Facilitator> PaymentServer<'a, F> {
    /// Builds a pipeline driver over `facilitator`.
    pub fn new(facilitator: &'a F) -> Self {
        Self { facilitator }
    }

    /// Runs `parse → verify → settle` against `header` (the raw, possibly
    /// absent `X-PAYMENT` header value) and `requirements` (the server's
    /// expected terms, not anything copied from the client).
    pub async fn process(&self, header: Option<&str>, requirements: &PaymentRequirements) -> ProcessResult {
        let payload = self.parse(header, requirements)?;
        let payer = self.verify(&payload, requirements).await?;
        let tx_hash = self.settle(&payload, requirements).await?;
        Ok(ProcessSuccess { payer, tx_hash })
    }

    fn parse(&self, header: Option<&str>, requirements: &PaymentRequirements) -> Result<PaymentPayload, ProcessFailure> {
        let header = header.filter(|h| !h.is_empty()).ok_or_else(|| {
            self.reject(402, ErrorStage::Parse, StageError::MissingHeader.to_string(), requirements)
        })?;

        decode_payment_header(header)
            .map_err(|err| self.reject(402, ErrorStage::Parse, err.to_string(), requirements))
    }

    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<String, ProcessFailure> {
        let request = VerifyRequest {
            x402_version: X402_VERSION,
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        };

        let response = self
            .facilitator
            .verify(&request)
            .await
            .map_err(|err| self.reject(402, ErrorStage::Verify, err.to_string(), requirements))?;

        if !response.success {
            let reason = response
                .error_message
                .or(response.error)
                .unwrap_or_else(|| "verification failed".to_string());
            return Err(self.reject(402, ErrorStage::Verify, reason, requirements));
        }

        response.payer.ok_or_else(|| {
            self.reject(
                402,
                ErrorStage::Verify,
                "Payer address not found in verification result".to_string(),
                requirements,
            )
        })
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<String, ProcessFailure> {
        let request = SettleRequest {
            x402_version: X402_VERSION,
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
            wait_until: "confirmed".to_string(),
        };

        let response = self
            .facilitator
            .settle(&request)
            .await
            .map_err(|err| self.reject(500, ErrorStage::Settle, err.to_string(), requirements))?;

        if !response.success {
            let reason = response
                .error_message
                .or(response.error)
                .unwrap_or_else(|| "settlement failed".to_string());
            return Err(self.reject(500, ErrorStage::Settle, reason, requirements));
        }

        response.transaction.ok_or_else(|| {
            self.reject(
                500,
                ErrorStage::Settle,
                "Settlement succeeded without a transaction hash".to_string(),
                requirements,
            )
        })
    }

    fn reject(
        &self,
        status: u16,
        stage: ErrorStage,
        error: String,
        requirements: &PaymentRequirements,
    ) -> ProcessFailure {
        ProcessFailure {
            status,
            response: Response402 {
                x402_version: X402_VERSION,
                accepts: vec![requirements.clone()],
                error: Some(error),
                error_stage: Some(stage),
            },
        }
    }
}
