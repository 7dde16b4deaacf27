//! # Document Workflow Engine
//!
//! Owns the status state machine over the document store and orchestrates the
//! external collaborators:
//!
//! | Phase        | Operation(s)                                      |
//! |--------------|---------------------------------------------------|
//! | Upload       | [`WorkflowEngine::upload_document`]               |
//! | Attestation  | [`WorkflowEngine::attest_document`]               |
//! | Minting      | [`WorkflowEngine::mint_credits`]                  |
//! | Rejection    | [`WorkflowEngine::reject_document`]               |
//! | Recovery     | [`WorkflowEngine::reset_to_pending`], [`WorkflowEngine::integrity_scan`] |
//! | Queries      | `documents_for_verifier`, `user_documents`, `document_stats` |
//!
//! ## Availability over strict consistency
//!
//! Ledger registration (during upload) and the on-chain attest call are
//! non-critical: when they fail the document still progresses locally, marked
//! unconfirmed (`blockchain_registered = false` / `blockchain_attested =
//! false`). Minting is the critical step: a ledger failure there is a hard
//! error and the document stays `Attested`, making the operation safely
//! retriable. Allocation failures after a successful mint never propagate as
//! mint failures.
//!
//! ## Serialization of mutations
//!
//! The engine holds no per-document lock. All operations run on one logical
//! thread; callers are expected not to run two mutating operations on the
//! same document concurrently.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::allocation::AllocationService;
use crate::auth::{AuthProvider, Permission};
use crate::content::ContentStoreClient;
use crate::errors::{Result, WorkflowError};
use crate::ledger::{DocumentRegistration, LedgerClient, MintRequest};
use crate::signer::{build_attestation_payload, validate_payload, AttestationInput, WalletSigner};
use crate::store::DocumentStore;
use crate::types::{
    AllocationRecord, Attestation, Document, DocumentPatch, DocumentStats, DocumentStatus,
    FileUpload, MintingInfo, ProjectMetadata,
};
use crate::validate::{validate_file, validate_metadata};

/// Result of an attestation: either confirmed on the ledger, or recorded
/// locally only because the ledger was unavailable. The local-only case is a
/// degraded success, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum AttestOutcome {
    OnChain { document: Document, tx_hash: String },
    LocalOnly { document: Document },
}

impl AttestOutcome {
    pub fn document(&self) -> &Document {
        match self {
            Self::OnChain { document, .. } | Self::LocalOnly { document } => document,
        }
    }
}

/// One attested-but-incomplete document found by the integrity scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityFinding {
    pub document_id: String,
    pub missing: Vec<&'static str>,
}

/// Enumerate `Attested` documents whose attestation data is missing or
/// incomplete. Pure over the given documents; fixing a finding goes through
/// [`WorkflowEngine::reset_to_pending`], never raw store mutation.
pub fn scan_attestation_integrity<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
) -> Vec<IntegrityFinding> {
    documents
        .into_iter()
        .filter(|d| d.status == DocumentStatus::Attested && !d.has_complete_attestation())
        .map(|d| IntegrityFinding {
            document_id: d.id.clone(),
            missing: d.attestation_missing_fields(),
        })
        .collect()
}

pub struct WorkflowEngine {
    store: DocumentStore,
    allocations: AllocationService,
    auth: Arc<dyn AuthProvider>,
    ledger: Arc<dyn LedgerClient>,
    content: Arc<dyn ContentStoreClient>,
    signer: Arc<dyn WalletSigner>,
    contract_address: String,
}

impl WorkflowEngine {
    pub fn new(
        store: DocumentStore,
        allocations: AllocationService,
        auth: Arc<dyn AuthProvider>,
        ledger: Arc<dyn LedgerClient>,
        content: Arc<dyn ContentStoreClient>,
        signer: Arc<dyn WalletSigner>,
        contract_address: impl Into<String>,
    ) -> Self {
        WorkflowEngine {
            store,
            allocations,
            auth,
            ledger,
            content,
            signer,
            contract_address: contract_address.into(),
        }
    }

    // ─────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────

    /// Validate, store the file content, register on the ledger, and create
    /// the `Pending` document record.
    ///
    /// Content-store failure fails the whole operation (nothing is
    /// persisted). Ledger registration failure does not: the document is
    /// created local-only with a `local_` id.
    pub async fn upload_document(
        &mut self,
        file: FileUpload,
        metadata: ProjectMetadata,
    ) -> Result<Document> {
        let user = self
            .auth
            .current_user()
            .ok_or(WorkflowError::NotAuthenticated)?;
        if !self.auth.has_permission(Permission::UploadDocument) {
            return Err(WorkflowError::PermissionDenied {
                permission: Permission::UploadDocument,
                role: Some(user.role),
            });
        }

        validate_file(&file)?;
        validate_metadata(&metadata)?;

        let stored = self.content.upload(&file).await?;

        let uploader_address = user.wallet_address.clone();
        let registration = DocumentRegistration {
            cid: stored.cid.clone(),
            filename: file.filename.clone(),
            project_name: metadata.project_name.clone(),
            uploader: uploader_address.clone().unwrap_or_default(),
        };

        let (id, blockchain_registered, blockchain_document_id) =
            match self.ledger.register_document(&registration).await {
                Ok(receipt) => {
                    info!(
                        "document registered on ledger: id={} tx={}",
                        receipt.id, receipt.tx_hash
                    );
                    (receipt.id.to_string(), true, Some(receipt.id))
                }
                Err(e) => {
                    warn!("ledger registration failed, keeping document local-only: {e}");
                    (local_document_id(), false, None)
                }
            };

        let now = Utc::now();
        let file_size = file.size();
        let document = Document {
            id,
            cid: stored.cid,
            filename: file.filename,
            file_size,
            file_type: file.content_type,
            uploaded_by: uploader_address,
            uploader_name: user.name,
            uploader_email: user.email,
            uploader_type: user.role.uploader_type(),
            project_name: metadata.project_name,
            project_type: metadata.project_type,
            description: metadata.description,
            location: metadata.location,
            estimated_credits: metadata.estimated_credits,
            status: DocumentStatus::Pending,
            created_at: now,
            updated_at: now,
            attestation: None,
            minting: None,
            blockchain_registered,
            blockchain_document_id,
        };
        self.store.insert(document.clone());
        Ok(document)
    }

    // ─────────────────────────────────────────────────────
    // Attestation
    // ─────────────────────────────────────────────────────

    /// Attest a `Pending` document. The single operation authorized to move a
    /// document out of `Pending` toward minting.
    ///
    /// Payload completeness is validated before the signature request. The
    /// on-chain attest call is non-critical: on failure the document still
    /// transitions to `Attested` with `blockchain_attested = false` and the
    /// caller receives [`AttestOutcome::LocalOnly`].
    pub async fn attest_document(
        &mut self,
        document_id: &str,
        input: AttestationInput,
    ) -> Result<AttestOutcome> {
        let user = self
            .auth
            .current_user()
            .ok_or(WorkflowError::NotAuthenticated)?;
        if !self.auth.is_verifier() {
            return Err(WorkflowError::PermissionDenied {
                permission: Permission::AttestDocument,
                role: Some(user.role),
            });
        }
        let verifier_address = user
            .wallet_address
            .ok_or(WorkflowError::MissingSignerAddress)?;

        let document = self
            .store
            .get(document_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound {
                id: document_id.to_string(),
            })?;

        // Distinct conflict errors so the UI can offer the right recovery
        // action for each state.
        match document.status {
            DocumentStatus::Pending => {}
            DocumentStatus::Attested => {
                return Err(WorkflowError::AlreadyAttested {
                    id: document_id.to_string(),
                })
            }
            DocumentStatus::Minted => {
                return Err(WorkflowError::AlreadyMinted {
                    id: document_id.to_string(),
                })
            }
            DocumentStatus::Rejected => {
                return Err(WorkflowError::AlreadyRejected {
                    id: document_id.to_string(),
                })
            }
        }

        let recipient =
            document
                .uploaded_by
                .clone()
                .ok_or_else(|| WorkflowError::MissingUploader {
                    id: document_id.to_string(),
                })?;

        let nonce = self.ledger.get_nonce(&recipient).await?;
        let payload = build_attestation_payload(&input, &document, nonce, &verifier_address)?;
        validate_payload(&payload)?;

        let signature = self.signer.sign(&payload, &self.contract_address).await?;

        // Non-critical: record the attestation locally even when the ledger
        // call fails or the document never made it onto the ledger.
        let chain_tx = match document.blockchain_document_id {
            Some(ledger_id) => match self.ledger.attest_document(ledger_id).await {
                Ok(receipt) => Some(receipt.tx_hash),
                Err(e) => {
                    warn!("on-chain attest failed for {document_id}, recording locally: {e}");
                    None
                }
            },
            None => {
                warn!("document {document_id} has no ledger id, recording local attestation");
                None
            }
        };

        let attestation = Attestation {
            signature: Some(signature),
            gs_project_id: Some(input.gs_project_id),
            gs_serial: Some(input.gs_serial),
            amount: Some(input.amount),
            nonce: Some(nonce),
            verifier_address: Some(verifier_address),
            attested_at: Utc::now(),
            blockchain_attested: chain_tx.is_some(),
            blockchain_transaction_hash: chain_tx.clone(),
        };

        let updated = self.store.update(document_id, |d| {
            d.status = DocumentStatus::Attested;
            d.attestation = Some(attestation.clone());
        })?;

        Ok(match chain_tx {
            Some(tx_hash) => AttestOutcome::OnChain {
                document: updated,
                tx_hash,
            },
            None => AttestOutcome::LocalOnly { document: updated },
        })
    }

    // ─────────────────────────────────────────────────────
    // Minting
    // ─────────────────────────────────────────────────────

    /// Mint credits for an `Attested` document.
    ///
    /// Re-checks attestation completeness explicitly: `status == Attested`
    /// does not imply the attestation is usable (local-fallback attestations
    /// and historical records can be incomplete). Ledger failure is a hard
    /// [`WorkflowError::MintFailed`] and leaves the document `Attested`;
    /// retrying is simply calling this again. On success the allocation is
    /// recorded best-effort.
    pub async fn mint_credits(&mut self, document_id: &str) -> Result<Document> {
        if !self.auth.has_permission(Permission::MintCredits) {
            return Err(WorkflowError::PermissionDenied {
                permission: Permission::MintCredits,
                role: self.auth.current_user().map(|u| u.role),
            });
        }
        let document = self
            .store
            .get(document_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound {
                id: document_id.to_string(),
            })?;

        if document.status != DocumentStatus::Attested {
            return Err(WorkflowError::NotAttested {
                id: document_id.to_string(),
                status: document.status,
            });
        }

        let attestation =
            document
                .attestation
                .as_ref()
                .ok_or_else(|| WorkflowError::AttestationDataMissing {
                    id: document_id.to_string(),
                })?;

        let (Some(signature), Some(gs_project_id), Some(gs_serial), Some(amount), Some(nonce)) = (
            attestation.signature.clone(),
            attestation.gs_project_id.clone(),
            attestation.gs_serial.clone(),
            attestation.amount,
            attestation.nonce,
        ) else {
            return Err(WorkflowError::AttestationDataIncomplete {
                id: document_id.to_string(),
                missing: attestation.missing_fields(),
            });
        };

        let recipient =
            document
                .uploaded_by
                .clone()
                .ok_or_else(|| WorkflowError::MissingUploader {
                    id: document_id.to_string(),
                })?;

        let request = MintRequest {
            gs_project_id,
            gs_serial,
            ipfs_cid: document.cid.clone(),
            amount,
            recipient: recipient.clone(),
            nonce,
            signature,
        };

        let receipt = self
            .ledger
            .mint_credits(&request)
            .await
            .map_err(|e| WorkflowError::MintFailed(e.to_string()))?;

        let minting = MintingInfo {
            transaction_hash: receipt.tx_hash,
            minted_at: Utc::now(),
            minted_by: self.auth.current_user().and_then(|u| u.wallet_address),
            amount,
            recipient,
            token_id: Some(receipt.token_id),
        };

        let updated = self.store.update(document_id, |d| {
            d.status = DocumentStatus::Minted;
            d.minting = Some(minting.clone());
        })?;
        info!(
            "minted {} credits for document {document_id} (token {:?})",
            amount, minting.token_id
        );

        // Minting is committed; allocation bookkeeping must not unwind it.
        if let Err(e) = self.allocations.allocate(&updated, &minting) {
            warn!("allocation bookkeeping failed after mint of {document_id} (retryable): {e}");
        }

        Ok(updated)
    }

    // ─────────────────────────────────────────────────────
    // Rejection and recovery
    // ─────────────────────────────────────────────────────

    /// Reject a `Pending` document. Terminal.
    pub fn reject_document(&mut self, document_id: &str) -> Result<Document> {
        if !self.auth.is_verifier() {
            return Err(WorkflowError::PermissionDenied {
                permission: Permission::RejectDocument,
                role: self.auth.current_user().map(|u| u.role),
            });
        }
        let document = self
            .store
            .get(document_id)
            .ok_or_else(|| WorkflowError::NotFound {
                id: document_id.to_string(),
            })?;
        if document.status != DocumentStatus::Pending {
            return Err(WorkflowError::IllegalTransition {
                id: document_id.to_string(),
                from: document.status,
                to: DocumentStatus::Rejected,
            });
        }
        self.store
            .update(document_id, |d| d.status = DocumentStatus::Rejected)
    }

    /// Sanctioned recovery from the attested-with-incomplete-attestation
    /// corruption state: discard the partial attestation and revert the
    /// document to `Pending`. Refused when the attestation is complete,
    /// because the operation is destructive.
    pub fn reset_to_pending(&mut self, document_id: &str) -> Result<Document> {
        let document = self
            .store
            .get(document_id)
            .ok_or_else(|| WorkflowError::NotFound {
                id: document_id.to_string(),
            })?;
        if document.status != DocumentStatus::Attested {
            return Err(WorkflowError::IllegalTransition {
                id: document_id.to_string(),
                from: document.status,
                to: DocumentStatus::Pending,
            });
        }
        if document.has_complete_attestation() {
            return Err(WorkflowError::AttestationIntact {
                id: document_id.to_string(),
            });
        }
        info!("resetting corrupted document {document_id} to pending");
        self.store.update(document_id, |d| {
            d.status = DocumentStatus::Pending;
            d.attestation = None;
        })
    }

    /// Report all attested documents whose attestation data is incomplete.
    pub fn integrity_scan(&self) -> Vec<IntegrityFinding> {
        scan_attestation_integrity(self.store.iter())
    }

    /// Retry a failed allocation, re-reading the owning document's minting
    /// data for the attempt.
    pub fn retry_allocation(&mut self, allocation_id: &str) -> Result<AllocationRecord> {
        let record = self
            .allocations
            .record(allocation_id)
            .cloned()
            .ok_or_else(|| WorkflowError::AllocationNotFound {
                id: allocation_id.to_string(),
            })?;
        let document = self
            .store
            .get(&record.document_id)
            .ok_or_else(|| WorkflowError::NotFound {
                id: record.document_id.clone(),
            })?;
        let minting =
            document
                .minting
                .clone()
                .ok_or_else(|| WorkflowError::MintingDataMissing {
                    id: record.document_id.clone(),
                })?;
        self.allocations.retry(allocation_id, &minting)
    }

    // ─────────────────────────────────────────────────────
    // Exposed query/patch surface
    // ─────────────────────────────────────────────────────

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.store.get(document_id)
    }

    /// The verifier queue: all documents, optionally filtered by status,
    /// most recently created first.
    pub fn documents_for_verifier(
        &self,
        filter: Option<DocumentStatus>,
    ) -> Result<Vec<Document>> {
        if !self.auth.is_verifier() {
            return Err(WorkflowError::PermissionDenied {
                permission: Permission::AttestDocument,
                role: self.auth.current_user().map(|u| u.role),
            });
        }
        let mut documents = self.store.all();
        if let Some(status) = filter {
            documents.retain(|d| d.status == status);
        }
        Ok(documents)
    }

    /// Documents uploaded by the current user. Empty when the session has no
    /// wallet address to match on.
    pub fn user_documents(&self) -> Result<Vec<Document>> {
        let user = self
            .auth
            .current_user()
            .ok_or(WorkflowError::NotAuthenticated)?;
        let Some(address) = user.wallet_address else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .all()
            .into_iter()
            .filter(|d| d.uploaded_by.as_deref() == Some(address.as_str()))
            .collect())
    }

    /// Transition-checked status setter for presentation code, optionally
    /// applying auxiliary field changes in the same update. The
    /// `Attested -> Pending` edge keeps the same incomplete-attestation guard
    /// as [`WorkflowEngine::reset_to_pending`]; reverting to `Pending` always
    /// clears the attestation, patched or not.
    pub fn update_document_status(
        &mut self,
        document_id: &str,
        status: DocumentStatus,
        patch: Option<DocumentPatch>,
    ) -> Result<Document> {
        let document = self
            .store
            .get(document_id)
            .ok_or_else(|| WorkflowError::NotFound {
                id: document_id.to_string(),
            })?;
        if !document.status.can_transition_to(status) {
            return Err(WorkflowError::IllegalTransition {
                id: document_id.to_string(),
                from: document.status,
                to: status,
            });
        }
        if document.status == DocumentStatus::Attested
            && status == DocumentStatus::Pending
            && document.has_complete_attestation()
        {
            return Err(WorkflowError::AttestationIntact {
                id: document_id.to_string(),
            });
        }
        self.store.update(document_id, |d| {
            d.status = status;
            if let Some(patch) = patch {
                if let Some(attestation) = patch.attestation {
                    d.attestation = Some(attestation);
                }
                if let Some(minting) = patch.minting {
                    d.minting = Some(minting);
                }
            }
            if status == DocumentStatus::Pending {
                d.attestation = None;
            }
        })
    }

    /// Patch minting metadata on an attested or minted document (late
    /// transaction confirmations).
    pub fn update_document_minting(
        &mut self,
        document_id: &str,
        minting: MintingInfo,
    ) -> Result<Document> {
        let document = self
            .store
            .get(document_id)
            .ok_or_else(|| WorkflowError::NotFound {
                id: document_id.to_string(),
            })?;
        if !matches!(
            document.status,
            DocumentStatus::Attested | DocumentStatus::Minted
        ) {
            return Err(WorkflowError::IllegalTransition {
                id: document_id.to_string(),
                from: document.status,
                to: DocumentStatus::Minted,
            });
        }
        self.store
            .update(document_id, |d| d.minting = Some(minting))
    }

    pub fn document_stats(&self) -> DocumentStats {
        let mut stats = DocumentStats::default();
        for document in self.store.iter() {
            stats.total += 1;
            match document.status {
                DocumentStatus::Pending => stats.pending += 1,
                DocumentStatus::Attested => stats.attested += 1,
                DocumentStatus::Minted => stats.minted += 1,
                DocumentStatus::Rejected => stats.rejected += 1,
            }
            stats.total_estimated_credits += document.estimated_credits.unwrap_or(0);
            if let Some(minting) = &document.minting {
                stats.total_minted_credits += minting.amount;
            }
        }
        stats
    }

    pub fn allocations(&self) -> &AllocationService {
        &self.allocations
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }
}

fn local_document_id() -> String {
    format!("local_{}", hex::encode(rand::random::<[u8; 8]>()))
}
