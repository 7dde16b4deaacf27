//! Application-wide error types.
//!
//! Every failure carries machine-readable context (missing-field lists, the
//! role that attempted an action, the status that blocked a transition) so the
//! presentation layer can render role-specific guidance without string
//! matching. [`WorkflowError::kind`] maps each variant onto the recovery
//! taxonomy; [`WorkflowError::guidance`] is the role-aware message lookup.

use thiserror::Error;

use crate::auth::{Permission, Role};
use crate::types::DocumentStatus;

/// Recovery taxonomy. Determines how a failure is handled upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; the user corrects it and retries. Never retried
    /// automatically.
    Validation,
    /// Missing or malformed environment configuration. Operator-correctable,
    /// never retried.
    Configuration,
    /// Not authenticated or wrong role. Never retried automatically.
    Authorization,
    /// Unknown document or allocation id. Fatal to the operation.
    NotFound,
    /// Illegal state transition. Fatal to the operation; a different
    /// operation may apply.
    Conflict,
    /// Collaborator unreachable or rejected the call. Retriable.
    ExternalService,
    /// Attested-without-complete-attestation and friends. Requires the
    /// explicit manual recovery path, not automatic retry.
    DataIntegrity,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    // ── Validation ───────────────────────────────────────
    #[error("no file provided")]
    InvalidFile,

    #[error("file name is empty")]
    InvalidFileName,

    #[error("unsupported file type: {mime}")]
    UnsupportedFileType { mime: String },

    #[error("file is {size} bytes; maximum allowed is {max}")]
    FileTooLarge { size: u64, max: u64 },

    #[error("required field missing: {field}")]
    MissingField { field: &'static str },

    #[error("field {field} exceeds {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("estimatedCredits {value} is outside [0, {max}]")]
    CreditsOutOfRange { value: u64, max: u64 },

    // ── Configuration ────────────────────────────────────
    #[error("configuration error: {0}")]
    Config(String),

    // ── Authorization ────────────────────────────────────
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("permission denied: {permission:?} is not granted to role {role:?}")]
    PermissionDenied {
        permission: Permission,
        role: Option<Role>,
    },

    #[error("verifier wallet address unavailable")]
    MissingSignerAddress,

    // ── NotFound ─────────────────────────────────────────
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("allocation not found: {id}")]
    AllocationNotFound { id: String },

    // ── Conflict ─────────────────────────────────────────
    #[error("document {id} is already attested")]
    AlreadyAttested { id: String },

    #[error("document {id} is already minted")]
    AlreadyMinted { id: String },

    #[error("document {id} was rejected")]
    AlreadyRejected { id: String },

    #[error("document {id} is not attested (status {status:?})")]
    NotAttested { id: String, status: DocumentStatus },

    #[error("illegal status transition {from:?} -> {to:?} for document {id}")]
    IllegalTransition {
        id: String,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("document {id} has a complete attestation; reset is not permitted")]
    AttestationIntact { id: String },

    #[error("allocation {id} is already completed")]
    AllocationAlreadyCompleted { id: String },

    // ── DataIntegrity ────────────────────────────────────
    #[error("document {id} is attested but carries no attestation data")]
    AttestationDataMissing { id: String },

    #[error("document {id} attestation is missing required fields: {missing:?}")]
    AttestationDataIncomplete {
        id: String,
        missing: Vec<&'static str>,
    },

    #[error("document {id} has no uploader; there is no valid mint recipient")]
    MissingUploader { id: String },

    #[error("attestation payload is missing required fields: {missing:?}")]
    IncompletePayload { missing: Vec<&'static str> },

    #[error("document {id} is minted but carries no minting data")]
    MintingDataMissing { id: String },

    // ── ExternalService ──────────────────────────────────
    #[error("content upload failed: {0}")]
    UploadFailed(String),

    /// Transient content-store failure on reads.
    #[error("content store error: {0}")]
    ContentStore(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("mint failed: {0}")]
    MintFailed(String),

    /// Transient ledger failure (transport, rate limit, soft RPC error).
    #[error("ledger call failed: {0}")]
    Ledger(String),

    /// The ledger rejected the call outright (malformed request, duplicate
    /// nonce). Not retryable.
    #[error("ledger rejected the call: {0}")]
    LedgerRejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        use WorkflowError::*;
        match self {
            InvalidFile | InvalidFileName | UnsupportedFileType { .. } | FileTooLarge { .. }
            | MissingField { .. } | FieldTooLong { .. } | CreditsOutOfRange { .. } => {
                ErrorKind::Validation
            }

            Config(_) => ErrorKind::Configuration,

            NotAuthenticated | PermissionDenied { .. } | MissingSignerAddress => {
                ErrorKind::Authorization
            }

            NotFound { .. } | AllocationNotFound { .. } => ErrorKind::NotFound,

            AlreadyAttested { .. } | AlreadyMinted { .. } | AlreadyRejected { .. }
            | NotAttested { .. } | IllegalTransition { .. } | AttestationIntact { .. }
            | AllocationAlreadyCompleted { .. } => ErrorKind::Conflict,

            AttestationDataMissing { .. } | AttestationDataIncomplete { .. }
            | MissingUploader { .. } | IncompletePayload { .. } | MintingDataMissing { .. } => {
                ErrorKind::DataIntegrity
            }

            UploadFailed(_) | ContentStore(_) | SigningFailed(_) | MintFailed(_) | Ledger(_)
            | LedgerRejected(_) | Http(_) | Json(_) => ErrorKind::ExternalService,
        }
    }

    /// Whether a generic retry executor may re-attempt the failed call.
    /// Only transient external failures qualify; validation, authorization,
    /// conflicts and hard rejections never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Ledger(_) | WorkflowError::ContentStore(_) | WorkflowError::Http(_)
        )
    }

    /// Role-aware, human-readable guidance. Presentation-layer lookup keyed
    /// by the error variant; the engine never formats user-facing text.
    pub fn guidance(&self, role: Option<Role>) -> String {
        use WorkflowError::*;
        match (self, role) {
            (MintFailed(_), Some(Role::Verifier) | Some(Role::Admin)) => {
                "Minting failed on the ledger. The document is still attested: check that the \
                 attestation data is complete, then retry the mint."
                    .to_string()
            }
            (MintFailed(_), _) => {
                "Minting could not be completed. The document remains attested and the \
                 operation can be retried by a verifier."
                    .to_string()
            }
            (PermissionDenied { .. }, Some(Role::Individual) | Some(Role::Business)) => {
                "This action requires verifier rights. Your account can upload documents but \
                 cannot attest or mint."
                    .to_string()
            }
            (PermissionDenied { permission, .. }, _) => {
                format!("Your role does not grant {permission:?}.")
            }
            (NotAuthenticated, _) => "Sign in and connect a wallet to continue.".to_string(),
            (MissingSignerAddress, _) => {
                "No wallet address is associated with your verifier session. Connect a wallet \
                 before attesting."
                    .to_string()
            }
            (AttestationDataIncomplete { missing, .. }, _) => format!(
                "The attestation is missing: {}. Reset the document to pending and attest it \
                 again.",
                missing.join(", ")
            ),
            (AttestationDataMissing { .. }, _) => {
                "The document is marked attested but has no attestation data. Reset it to \
                 pending and attest it again."
                    .to_string()
            }
            (UploadFailed(_), _) => {
                "The file could not be stored. Nothing was saved; try the upload again."
                    .to_string()
            }
            (SigningFailed(_), _) => {
                "The signature request was rejected or failed. No state was changed.".to_string()
            }
            _ => match self.kind() {
                ErrorKind::Validation => format!("{self}. Correct the input and try again."),
                ErrorKind::Conflict => {
                    format!("{self}. Choose an operation valid for the document's status.")
                }
                ErrorKind::ExternalService => {
                    format!("{self}. The service may be temporarily unavailable; retry shortly.")
                }
                _ => self.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
