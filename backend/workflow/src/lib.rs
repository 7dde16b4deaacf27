//! # Carbon-Credit Document Workflow Core
//!
//! Orchestrates the lifecycle of supporting documents for tokenized carbon
//! credits: users upload documents, verifiers attest them with a wallet
//! signature, and attested documents are minted into credits that are
//! allocated back to the uploader.
//!
//! | Phase        | Entry point(s)                                        |
//! |--------------|-------------------------------------------------------|
//! | Upload       | [`engine::WorkflowEngine::upload_document`]           |
//! | Attestation  | [`engine::WorkflowEngine::attest_document`]           |
//! | Minting      | [`engine::WorkflowEngine::mint_credits`]              |
//! | Allocation   | [`allocation::AllocationService`]                     |
//! | Recovery     | [`engine::WorkflowEngine::reset_to_pending`], [`engine::WorkflowEngine::integrity_scan`] |
//! | Queries      | `documents_for_verifier`, `user_documents`, `document_stats`, `user_balance` |
//!
//! ## Architecture
//!
//! The [`engine`] owns the status state machine and the [`store`]; everything
//! external (ledger, content store, wallet signing, identity) is consumed
//! through narrow async traits ([`ledger::LedgerClient`],
//! [`content::ContentStoreClient`], [`signer::WalletSigner`],
//! [`auth::AuthProvider`]) so the core stays testable against mocks. The
//! engine favors availability over strict on-chain consistency everywhere
//! except minting; see the module docs in [`engine`].

pub mod allocation;
pub mod auth;
pub mod config;
pub mod content;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod retry;
pub mod signer;
pub mod store;
pub mod types;
pub mod validate;

#[cfg(test)]
mod test_workflow;

pub use allocation::AllocationService;
pub use auth::{AuthProvider, Permission, Role, User};
pub use config::Config;
pub use content::{ContentStoreClient, HttpContentStoreClient, StoredContent};
pub use engine::{scan_attestation_integrity, AttestOutcome, IntegrityFinding, WorkflowEngine};
pub use errors::{ErrorKind, Result, WorkflowError};
pub use ledger::{JsonRpcLedgerClient, LedgerClient};
pub use retry::{retry_with_policy, RetryPolicy};
pub use signer::{
    build_attestation_payload, validate_payload, AttestationInput, AttestationPayload,
    WalletSigner,
};
pub use store::{AllocationStore, DocumentStore, JsonFilePersistence, NullPersistence, Persistence};
pub use types::{
    Attestation, AllocationRecord, AllocationStatus, Document, DocumentPatch, DocumentStats,
    DocumentStatus, FileUpload, MintingInfo, ProjectMetadata, UploaderType, UserBalance,
};
