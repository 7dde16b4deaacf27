//! # Types
//!
//! Shared data structures used across all modules of the workflow core.
//!
//! ## Design decisions
//!
//! ### Status as a Finite-State Machine
//!
//! [`DocumentStatus`] enforces a strict lifecycle:
//!
//! ```text
//! Pending ──► Attested ──► Minted
//!     └──► Rejected
//! Attested ──► Pending   (recovery, only when attestation data is incomplete)
//! ```
//!
//! `Minted` and `Rejected` are terminal. Backward transitions other than the
//! recovery edge are rejected by the workflow engine.
//!
//! ### Attestation fields are individually optional
//!
//! A document can legitimately reach `Attested` with an incomplete
//! [`Attestation`] (local-fallback attestation, or records written before the
//! completeness invariant was enforced). Incompleteness is therefore
//! representable and detectable via [`Attestation::missing_fields`], never an
//! implicit deserialization failure.
//!
//! All persisted/wire types serialize with camelCase field names to stay
//! compatible with the ledger's JSON shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Uploaded, awaiting verifier attestation.
    Pending,
    /// Attested by a verifier; eligible for minting.
    Attested,
    /// Credits minted on the ledger.
    Minted,
    /// Rejected by a verifier.
    Rejected,
}

impl DocumentStatus {
    /// Short identifier string, matching the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Attested => "ATTESTED",
            Self::Minted => "MINTED",
            Self::Rejected => "REJECTED",
        }
    }

    /// `Minted` and `Rejected` are terminal; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Minted | Self::Rejected)
    }

    /// Legal transition matrix. `Attested -> Pending` is the recovery edge
    /// and carries an extra guard in the engine (attestation must be
    /// incomplete).
    pub fn can_transition_to(self, to: DocumentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Attested)
                | (Self::Pending, Self::Rejected)
                | (Self::Attested, Self::Minted)
                | (Self::Attested, Self::Pending)
        )
    }
}

/// Account type of the uploading user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploaderType {
    Individual,
    Business,
}

/// A file handed to the upload flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    /// MIME type as reported by the caller.
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Project metadata supplied at upload time. Only `project_name` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub project_name: String,
    pub project_type: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub estimated_credits: Option<u64>,
}

/// Verifier-signed statement binding a document to a credit amount, project
/// identifiers, and a recipient.
///
/// The five required fields are `signature`, `gs_project_id`, `gs_serial`,
/// `amount`, `nonce`. `blockchain_attested` records whether the on-chain
/// attest call succeeded; it is informational only and never gates minting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub signature: Option<String>,
    pub gs_project_id: Option<String>,
    pub gs_serial: Option<String>,
    pub amount: Option<u64>,
    pub nonce: Option<u64>,
    pub verifier_address: Option<String>,
    pub attested_at: DateTime<Utc>,
    pub blockchain_attested: bool,
    pub blockchain_transaction_hash: Option<String>,
}

impl Attestation {
    /// The field set that must be present for a document to be mintable.
    pub const REQUIRED_FIELDS: [&'static str; 5] =
        ["signature", "gsProjectId", "gsSerial", "amount", "nonce"];

    /// Names of required fields that are absent, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.signature.as_deref().is_none_or_empty() {
            missing.push("signature");
        }
        if self.gs_project_id.as_deref().is_none_or_empty() {
            missing.push("gsProjectId");
        }
        if self.gs_serial.as_deref().is_none_or_empty() {
            missing.push("gsSerial");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if self.nonce.is_none() {
            missing.push("nonce");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// `None` and `Some("")` are both "absent" for attestation string fields.
trait OptStrExt {
    fn is_none_or_empty(&self) -> bool;
}

impl OptStrExt for Option<&str> {
    fn is_none_or_empty(&self) -> bool {
        self.map(|s| s.trim().is_empty()).unwrap_or(true)
    }
}

/// Minting metadata recorded when a document transitions to `Minted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintingInfo {
    pub transaction_hash: String,
    pub minted_at: DateTime<Utc>,
    pub minted_by: Option<String>,
    pub amount: u64,
    pub recipient: String,
    pub token_id: Option<u64>,
}

/// The central entity: one uploaded supporting document and its workflow state.
///
/// A document may exist locally without a ledger counterpart
/// (`blockchain_registered == false`, id prefixed `local_`) if registration
/// failed at upload time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Ledger-assigned decimal id, or `local_<hex>` for unregistered items.
    pub id: String,
    /// Content-store identifier of the uploaded file.
    pub cid: String,
    pub filename: String,
    pub file_size: u64,
    pub file_type: String,
    /// Wallet address of the uploader. Required for attestation and
    /// allocation; a document without it cannot be attested.
    pub uploaded_by: Option<String>,
    pub uploader_name: Option<String>,
    pub uploader_email: Option<String>,
    pub uploader_type: Option<UploaderType>,
    pub project_name: String,
    pub project_type: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub estimated_credits: Option<u64>,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attestation: Option<Attestation>,
    pub minting: Option<MintingInfo>,
    pub blockchain_registered: bool,
    pub blockchain_document_id: Option<u64>,
}

impl Document {
    /// Missing required attestation fields; all of them when the attestation
    /// object is absent entirely.
    pub fn attestation_missing_fields(&self) -> Vec<&'static str> {
        match &self.attestation {
            Some(a) => a.missing_fields(),
            None => Attestation::REQUIRED_FIELDS.to_vec(),
        }
    }

    pub fn has_complete_attestation(&self) -> bool {
        self.attestation
            .as_ref()
            .map(Attestation::is_complete)
            .unwrap_or(false)
    }
}

/// Auxiliary fields presentation code may set alongside a transition-checked
/// status change. Absent fields are left untouched; a patched attestation is
/// still discarded when the transition target is `Pending`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub attestation: Option<Attestation>,
    pub minting: Option<MintingInfo>,
}

/// Status of a credit allocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Pending,
    Completed,
    Failed,
    Retrying,
}

/// One attempted credit transfer to the uploader following a mint.
///
/// A document has at most one logical allocation; retries mutate the same
/// record (bumping `attempt_count`) rather than appending new ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    pub id: String,
    pub document_id: String,
    pub recipient: String,
    pub amount: u64,
    pub status: AllocationStatus,
    pub transaction_hash: Option<String>,
    pub token_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
}

/// Derived per-recipient balance. Recomputed on demand from the allocation
/// record set, never incrementally maintained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBalance {
    pub recipient: String,
    /// Sum of completed allocation amounts.
    pub balance: u64,
    pub total_allocated: u64,
    pub allocation_count: usize,
    pub pending_count: usize,
    pub failed_count: usize,
    /// All allocation records for the recipient, most recent first.
    pub history: Vec<AllocationRecord>,
}

/// Aggregate counters over the document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub total: usize,
    pub pending: usize,
    pub attested: usize,
    pub minted: usize,
    pub rejected: usize,
    pub total_estimated_credits: u64,
    pub total_minted_credits: u64,
}
