//! Attestation payload assembly, validation, and signing.
//!
//! The payload is the one place bit-level compatibility matters: its field set
//! and ordering must match the external typed-data signing domain exactly.
//! Validation runs before any wallet interaction so a doomed request never
//! consumes a signature prompt.

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::{Result, WorkflowError};
use crate::types::Document;

/// Verifier-supplied attestation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationInput {
    /// Gold Standard project identifier.
    pub gs_project_id: String,
    /// Gold Standard serial number.
    pub gs_serial: String,
    /// Credit amount being attested.
    pub amount: u64,
}

/// The exact struct signed by the verifier's wallet.
///
/// Serde serializes fields in declaration order; do not rearrange these.
/// The signing domain hashes the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationPayload {
    pub gs_project_id: String,
    pub gs_serial: String,
    pub ipfs_cid: String,
    pub amount: u64,
    pub recipient: String,
    pub nonce: u64,
    pub verifier_address: String,
}

/// Assemble the canonical payload for a document.
///
/// The recipient is always the document's uploader; an uploader-less document
/// cannot be attested because there is no valid mint recipient.
pub fn build_attestation_payload(
    input: &AttestationInput,
    document: &Document,
    nonce: u64,
    verifier_address: &str,
) -> Result<AttestationPayload> {
    let recipient = document
        .uploaded_by
        .clone()
        .ok_or_else(|| WorkflowError::MissingUploader {
            id: document.id.clone(),
        })?;

    Ok(AttestationPayload {
        gs_project_id: input.gs_project_id.clone(),
        gs_serial: input.gs_serial.clone(),
        ipfs_cid: document.cid.clone(),
        amount: input.amount,
        recipient,
        nonce,
        verifier_address: verifier_address.to_string(),
    })
}

/// Check payload completeness, naming every absent required field.
pub fn validate_payload(payload: &AttestationPayload) -> Result<()> {
    let mut missing = Vec::new();
    if payload.gs_project_id.trim().is_empty() {
        missing.push("gsProjectId");
    }
    if payload.gs_serial.trim().is_empty() {
        missing.push("gsSerial");
    }
    if payload.ipfs_cid.trim().is_empty() {
        missing.push("ipfsCid");
    }
    if payload.amount == 0 {
        missing.push("amount");
    }
    if payload.recipient.trim().is_empty() {
        missing.push("recipient");
    }
    if payload.verifier_address.trim().is_empty() {
        missing.push("verifierAddress");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::IncompletePayload { missing })
    }
}

/// External wallet signing collaborator.
///
/// Signs the payload under a fixed typed-data domain bound to
/// `contract_address` and returns an opaque signature string. Rejections and
/// signer errors surface as [`WorkflowError::SigningFailed`].
#[async_trait]
pub trait WalletSigner: Send + Sync {
    async fn sign(&self, payload: &AttestationPayload, contract_address: &str) -> Result<String>;
}
