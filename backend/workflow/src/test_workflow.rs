//! End-to-end workflow scenarios against mocked collaborators.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::allocation::AllocationService;
use crate::auth::{AuthProvider, Permission, Role, User};
use crate::content::{ContentStoreClient, StoredContent};
use crate::engine::{AttestOutcome, WorkflowEngine};
use crate::errors::{Result, WorkflowError};
use crate::invariants;
use crate::ledger::{
    AttestReceipt, DocumentRegistration, LedgerClient, MintReceipt, MintRequest, RegisterReceipt,
};
use crate::signer::{AttestationInput, AttestationPayload, WalletSigner};
use crate::store::{AllocationStore, DocumentStore, NullPersistence};
use crate::types::{
    AllocationStatus, Attestation, Document, DocumentPatch, DocumentStatus, FileUpload,
    MintingInfo, ProjectMetadata,
};
use crate::validate::MAX_FILE_SIZE;

// ─────────────────────────────────────────────────────────
// Mock collaborators
// ─────────────────────────────────────────────────────────

struct MockAuth {
    user: Mutex<Option<User>>,
}

impl MockAuth {
    fn new() -> Self {
        MockAuth {
            user: Mutex::new(None),
        }
    }

    fn sign_in(&self, user: User) {
        *self.user.lock().unwrap() = Some(user);
    }
}

impl AuthProvider for MockAuth {
    fn current_user(&self) -> Option<User> {
        self.user.lock().unwrap().clone()
    }
}

struct MockLedger {
    fail_register: AtomicBool,
    fail_attest: AtomicBool,
    fail_mint: AtomicBool,
    nonce: AtomicU64,
    next_id: AtomicU64,
    mint_calls: AtomicU64,
}

impl MockLedger {
    fn new() -> Self {
        MockLedger {
            fail_register: AtomicBool::new(false),
            fail_attest: AtomicBool::new(false),
            fail_mint: AtomicBool::new(false),
            nonce: AtomicU64::new(7),
            next_id: AtomicU64::new(1),
            mint_calls: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn register_document(
        &self,
        _registration: &DocumentRegistration,
    ) -> Result<RegisterReceipt> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(WorkflowError::Ledger("ledger unavailable".into()));
        }
        Ok(RegisterReceipt {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tx_hash: "0xreg".into(),
        })
    }

    async fn get_nonce(&self, _address: &str) -> Result<u64> {
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn attest_document(&self, _ledger_id: u64) -> Result<AttestReceipt> {
        if self.fail_attest.load(Ordering::SeqCst) {
            return Err(WorkflowError::Ledger("ledger unavailable".into()));
        }
        Ok(AttestReceipt {
            tx_hash: "0xattest".into(),
        })
    }

    async fn mint_credits(&self, _request: &MintRequest) -> Result<MintReceipt> {
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mint.load(Ordering::SeqCst) {
            return Err(WorkflowError::Ledger("ledger unavailable".into()));
        }
        Ok(MintReceipt {
            tx_hash: "0xmint".into(),
            token_id: 99,
        })
    }

    async fn get_all_documents(&self) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }

    async fn get_user_documents(&self, _address: &str) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }
}

struct MockContentStore {
    fail: AtomicBool,
}

#[async_trait]
impl ContentStoreClient for MockContentStore {
    async fn upload(&self, file: &FileUpload) -> Result<StoredContent> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WorkflowError::UploadFailed("transport failure".into()));
        }
        Ok(StoredContent {
            cid: "bafymockcid".into(),
            url: "https://gateway/ipfs/bafymockcid".into(),
            size: file.size(),
            content_type: file.content_type.clone(),
        })
    }

    async fn fetch(&self, _cid: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

struct MockSigner {
    fail: AtomicBool,
}

#[async_trait]
impl WalletSigner for MockSigner {
    async fn sign(&self, payload: &AttestationPayload, _contract_address: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WorkflowError::SigningFailed("user rejected".into()));
        }
        Ok(format!("signed:{}:{}", payload.recipient, payload.nonce))
    }
}

// ─────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────

struct Harness {
    auth: Arc<MockAuth>,
    ledger: Arc<MockLedger>,
    content: Arc<MockContentStore>,
    signer: Arc<MockSigner>,
    engine: WorkflowEngine,
}

fn harness() -> Harness {
    let auth = Arc::new(MockAuth::new());
    let ledger = Arc::new(MockLedger::new());
    let content = Arc::new(MockContentStore {
        fail: AtomicBool::new(false),
    });
    let signer = Arc::new(MockSigner {
        fail: AtomicBool::new(false),
    });
    let engine = WorkflowEngine::new(
        DocumentStore::open(Box::new(NullPersistence)),
        AllocationService::new(AllocationStore::open(Box::new(NullPersistence))),
        auth.clone(),
        ledger.clone(),
        content.clone(),
        signer.clone(),
        "0xcontract",
    );
    Harness {
        auth,
        ledger,
        content,
        signer,
        engine,
    }
}

fn individual() -> User {
    User {
        id: "u1".into(),
        wallet_address: Some("0xuploader".into()),
        name: Some("Ada".into()),
        email: Some("ada@example.com".into()),
        role: Role::Individual,
    }
}

fn verifier() -> User {
    User {
        id: "v1".into(),
        wallet_address: Some("0xverifier".into()),
        name: None,
        email: None,
        role: Role::Verifier,
    }
}

fn pdf_upload(size: usize) -> FileUpload {
    FileUpload {
        filename: "evidence.pdf".into(),
        content_type: "application/pdf".into(),
        data: vec![0u8; size],
    }
}

fn metadata() -> ProjectMetadata {
    ProjectMetadata {
        project_name: "Reforestation X".into(),
        estimated_credits: Some(500),
        ..Default::default()
    }
}

fn attest_input() -> AttestationInput {
    AttestationInput {
        gs_project_id: "GS1".into(),
        gs_serial: "GS1-001".into(),
        amount: 500,
    }
}

async fn upload_pending(h: &mut Harness) -> Document {
    h.auth.sign_in(individual());
    h.engine
        .upload_document(pdf_upload(5 * 1024 * 1024), metadata())
        .await
        .expect("upload")
}

async fn attested_document(h: &mut Harness) -> Document {
    let doc = upload_pending(h).await;
    h.auth.sign_in(verifier());
    let outcome = h
        .engine
        .attest_document(&doc.id, attest_input())
        .await
        .expect("attest");
    outcome.document().clone()
}

/// Force the attested-but-incomplete corruption state by stripping a field
/// from a healthy attestation through the status surface.
async fn corrupted_attested_document(h: &mut Harness) -> Document {
    let doc = upload_pending(h).await;
    h.auth.sign_in(verifier());
    // Pending -> Attested through the patch surface, without attestation
    // data: the historical corruption shape.
    h.engine
        .update_document_status(&doc.id, DocumentStatus::Attested, None)
        .expect("force attested")
}

// ─────────────────────────────────────────────────────────
// Upload
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_upload_creates_pending_document() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;

    assert_eq!(doc.status, DocumentStatus::Pending);
    assert_eq!(doc.cid, "bafymockcid");
    assert_eq!(doc.file_size, 5 * 1024 * 1024);
    assert!(doc.blockchain_registered);
    assert_eq!(doc.blockchain_document_id, Some(1));
    assert!(doc.attestation.is_none());
    assert_eq!(doc.uploaded_by.as_deref(), Some("0xuploader"));
    assert_eq!(doc.estimated_credits, Some(500));
    invariants::assert_pre_attestation_state(&doc);
}

#[tokio::test]
async fn upload_survives_ledger_registration_failure() {
    let mut h = harness();
    h.ledger.fail_register.store(true, Ordering::SeqCst);
    let doc = upload_pending(&mut h).await;

    assert_eq!(doc.status, DocumentStatus::Pending);
    assert!(!doc.blockchain_registered);
    assert!(doc.blockchain_document_id.is_none());
    assert!(doc.id.starts_with("local_"), "got id {}", doc.id);
}

#[tokio::test]
async fn upload_fails_hard_when_content_store_is_down() {
    let mut h = harness();
    h.auth.sign_in(individual());
    h.content.fail.store(true, Ordering::SeqCst);
    let err = h
        .engine
        .upload_document(pdf_upload(1024), metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UploadFailed(_)));
    // No partial document was persisted.
    assert!(h.engine.user_documents().unwrap().is_empty());
}

#[tokio::test]
async fn upload_requires_authentication() {
    let mut h = harness();
    let err = h
        .engine
        .upload_document(pdf_upload(1024), metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotAuthenticated));
}

#[tokio::test]
async fn verifier_cannot_upload() {
    let mut h = harness();
    h.auth.sign_in(verifier());
    let err = h
        .engine
        .upload_document(pdf_upload(1024), metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));
}

#[tokio::test]
async fn upload_rejects_oversized_file() {
    let mut h = harness();
    h.auth.sign_in(individual());
    let err = h
        .engine
        .upload_document(pdf_upload(MAX_FILE_SIZE as usize + 1), metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::FileTooLarge { .. }));
}

#[tokio::test]
async fn upload_rejects_missing_project_name() {
    let mut h = harness();
    h.auth.sign_in(individual());
    let mut meta = metadata();
    meta.project_name = String::new();
    let err = h
        .engine
        .upload_document(pdf_upload(1024), meta)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::MissingField {
            field: "projectName"
        }
    ));
}

// ─────────────────────────────────────────────────────────
// Attestation
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_b_attest_pending_document() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());

    let outcome = h
        .engine
        .attest_document(&doc.id, attest_input())
        .await
        .unwrap();

    let attested = match outcome {
        AttestOutcome::OnChain { document, tx_hash } => {
            assert_eq!(tx_hash, "0xattest");
            document
        }
        AttestOutcome::LocalOnly { .. } => panic!("expected on-chain attestation"),
    };
    assert_eq!(attested.status, DocumentStatus::Attested);
    let attestation = attested.attestation.as_ref().unwrap();
    assert_eq!(attestation.amount, Some(500));
    assert_eq!(attestation.nonce, Some(7));
    assert_eq!(attestation.verifier_address.as_deref(), Some("0xverifier"));
    assert!(attestation.blockchain_attested);
    assert!(attestation.is_complete());
    // Signature covered the uploader and the ledger-issued nonce.
    assert_eq!(
        attestation.signature.as_deref(),
        Some("signed:0xuploader:7")
    );
}

#[tokio::test]
async fn attest_falls_back_to_local_when_ledger_fails() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());
    h.ledger.fail_attest.store(true, Ordering::SeqCst);

    let outcome = h
        .engine
        .attest_document(&doc.id, attest_input())
        .await
        .unwrap();

    let attested = match outcome {
        AttestOutcome::LocalOnly { document } => document,
        AttestOutcome::OnChain { .. } => panic!("ledger was down; expected local-only"),
    };
    assert_eq!(attested.status, DocumentStatus::Attested);
    let attestation = attested.attestation.as_ref().unwrap();
    assert!(!attestation.blockchain_attested);
    assert!(attestation.blockchain_transaction_hash.is_none());
    // Local fallback still records a complete, mintable attestation.
    assert!(attestation.is_complete());
}

#[tokio::test]
async fn attest_requires_verifier_role() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;
    // Still signed in as the individual uploader.
    let err = h
        .engine
        .attest_document(&doc.id, attest_input())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::PermissionDenied {
            role: Some(Role::Individual),
            ..
        }
    ));
}

#[tokio::test]
async fn attest_requires_signer_address() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;
    let mut v = verifier();
    v.wallet_address = None;
    h.auth.sign_in(v);
    let err = h
        .engine
        .attest_document(&doc.id, attest_input())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MissingSignerAddress));
}

#[tokio::test]
async fn attest_unknown_document_is_not_found() {
    let mut h = harness();
    h.auth.sign_in(verifier());
    let err = h
        .engine
        .attest_document("nope", attest_input())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));
}

#[tokio::test]
async fn attest_conflicts_are_distinct_and_do_not_mutate() {
    let mut h = harness();

    let attested = attested_document(&mut h).await;
    let err = h
        .engine
        .attest_document(&attested.id, attest_input())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyAttested { .. }));
    // The original attestation is untouched.
    assert_eq!(
        h.engine.document(&attested.id).unwrap().attestation,
        attested.attestation
    );

    let minted = h.engine.mint_credits(&attested.id).await.unwrap();
    let err = h
        .engine
        .attest_document(&minted.id, attest_input())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyMinted { .. }));
    assert_eq!(
        h.engine.document(&minted.id).unwrap().status,
        DocumentStatus::Minted
    );

    let pending = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());
    let rejected = h.engine.reject_document(&pending.id).unwrap();
    let err = h
        .engine
        .attest_document(&rejected.id, attest_input())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AlreadyRejected { .. }));
    assert_eq!(
        h.engine.document(&rejected.id).unwrap().status,
        DocumentStatus::Rejected
    );
}

#[tokio::test]
async fn reject_denial_names_the_reject_permission() {
    let mut h = harness();
    let pending = upload_pending(&mut h).await;
    // Still signed in as the individual uploader.
    let err = h.engine.reject_document(&pending.id).unwrap_err();
    match err {
        WorkflowError::PermissionDenied { permission, role } => {
            assert_eq!(permission, Permission::RejectDocument);
            assert_eq!(role, Some(Role::Individual));
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
    assert_eq!(
        h.engine.document(&pending.id).unwrap().status,
        DocumentStatus::Pending
    );
}

#[tokio::test]
async fn signing_failure_leaves_document_pending() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());
    h.signer.fail.store(true, Ordering::SeqCst);

    let err = h
        .engine
        .attest_document(&doc.id, attest_input())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::SigningFailed(_)));
    assert_eq!(
        h.engine.document(&doc.id).unwrap().status,
        DocumentStatus::Pending
    );
}

// ─────────────────────────────────────────────────────────
// Minting
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_d_mint_records_minting_and_allocation() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;

    let minted = h.engine.mint_credits(&attested.id).await.unwrap();

    assert_eq!(minted.status, DocumentStatus::Minted);
    invariants::assert_minted_has_complete_attestation(&minted);
    let minting = minted.minting.as_ref().unwrap();
    assert_eq!(minting.transaction_hash, "0xmint");
    assert_eq!(minting.amount, 500);
    assert_eq!(minting.recipient, "0xuploader");
    assert_eq!(minting.token_id, Some(99));

    let allocations = h.engine.allocations().allocations_for_document(&minted.id);
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].recipient, "0xuploader");
    assert_eq!(allocations[0].amount, 500);
    assert_eq!(allocations[0].status, AllocationStatus::Completed);
}

#[tokio::test]
async fn scenario_c_mint_with_incomplete_attestation_names_missing_fields() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;

    // Strip the nonce the way historical records were corrupted. There is
    // deliberately no public surface for this; go through the raw store.
    h.engine
        .store_mut()
        .update(&attested.id, |d| {
            if let Some(a) = d.attestation.as_mut() {
                a.nonce = None;
            }
        })
        .unwrap();

    let err = h.engine.mint_credits(&attested.id).await.unwrap_err();
    match err {
        WorkflowError::AttestationDataIncomplete { missing, .. } => {
            assert_eq!(missing, vec!["nonce"]);
        }
        other => panic!("expected AttestationDataIncomplete, got {other:?}"),
    }
    assert_eq!(
        h.engine.document(&attested.id).unwrap().status,
        DocumentStatus::Attested
    );
}

#[tokio::test]
async fn mint_requires_attested_status() {
    let mut h = harness();
    let pending = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());
    let err = h.engine.mint_credits(&pending.id).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::NotAttested {
            status: DocumentStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn mint_without_attestation_data_is_data_integrity_error() {
    let mut h = harness();
    let corrupted = corrupted_attested_document(&mut h).await;
    let err = h.engine.mint_credits(&corrupted.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::AttestationDataMissing { .. }));
}

#[tokio::test]
async fn scenario_e_mint_failure_keeps_document_attested() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;
    h.ledger.fail_mint.store(true, Ordering::SeqCst);

    let err = h.engine.mint_credits(&attested.id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::MintFailed(_)));
    assert_eq!(
        h.engine.document(&attested.id).unwrap().status,
        DocumentStatus::Attested
    );
    assert!(h
        .engine
        .allocations()
        .allocations_for_document(&attested.id)
        .is_empty());

    // Retry is simply calling mint again once the ledger recovers.
    h.ledger.fail_mint.store(false, Ordering::SeqCst);
    let minted = h.engine.mint_credits(&attested.id).await.unwrap();
    assert_eq!(minted.status, DocumentStatus::Minted);
    assert_eq!(h.ledger.mint_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn local_only_attestation_never_blocks_minting() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());
    h.ledger.fail_attest.store(true, Ordering::SeqCst);
    let outcome = h
        .engine
        .attest_document(&doc.id, attest_input())
        .await
        .unwrap();
    assert!(matches!(outcome, AttestOutcome::LocalOnly { .. }));

    // blockchain_attested == false is informational only.
    let minted = h.engine.mint_credits(&doc.id).await.unwrap();
    assert_eq!(minted.status, DocumentStatus::Minted);
}

// ─────────────────────────────────────────────────────────
// Recovery
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_to_pending_recovers_corrupted_document() {
    let mut h = harness();
    let corrupted = corrupted_attested_document(&mut h).await;

    let reset = h.engine.reset_to_pending(&corrupted.id).unwrap();
    assert_eq!(reset.status, DocumentStatus::Pending);
    assert!(reset.attestation.is_none());
    invariants::assert_pre_attestation_state(&reset);

    // A subsequent attestation succeeds with valid input.
    let outcome = h
        .engine
        .attest_document(&reset.id, attest_input())
        .await
        .unwrap();
    assert_eq!(outcome.document().status, DocumentStatus::Attested);
    assert!(outcome.document().has_complete_attestation());
}

#[tokio::test]
async fn reset_refuses_healthy_attestation() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;
    let err = h.engine.reset_to_pending(&attested.id).unwrap_err();
    assert!(matches!(err, WorkflowError::AttestationIntact { .. }));
}

#[tokio::test]
async fn reset_refuses_non_attested_documents() {
    let mut h = harness();
    let pending = upload_pending(&mut h).await;
    let err = h.engine.reset_to_pending(&pending.id).unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
}

#[tokio::test]
async fn integrity_scan_reports_exactly_the_corrupted_set() {
    let mut h = harness();
    let healthy = attested_document(&mut h).await;
    let corrupted = corrupted_attested_document(&mut h).await;
    let _pending = upload_pending(&mut h).await;

    let findings = h.engine.integrity_scan();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].document_id, corrupted.id);
    assert_eq!(
        findings[0].missing,
        vec!["signature", "gsProjectId", "gsSerial", "amount", "nonce"]
    );
    assert!(findings.iter().all(|f| f.document_id != healthy.id));
}

#[tokio::test]
async fn retry_allocation_surface() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;
    let minted = h.engine.mint_credits(&attested.id).await.unwrap();
    let record = h.engine.allocations().allocations_for_document(&minted.id)[0].clone();

    // Already completed by the mint; a retry has nothing to do.
    let err = h.engine.retry_allocation(&record.id).unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::AllocationAlreadyCompleted { .. }
    ));

    let err = h.engine.retry_allocation("alloc_missing").unwrap_err();
    assert!(matches!(err, WorkflowError::AllocationNotFound { .. }));
}

// ─────────────────────────────────────────────────────────
// Query surface
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn verifier_queue_filters_by_status() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;
    let _pending = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());

    let all = h.engine.documents_for_verifier(None).unwrap();
    assert_eq!(all.len(), 2);

    let pending_only = h
        .engine
        .documents_for_verifier(Some(DocumentStatus::Pending))
        .unwrap();
    assert_eq!(pending_only.len(), 1);
    assert!(pending_only.iter().all(|d| d.id != attested.id));
}

#[tokio::test]
async fn verifier_queue_requires_verifier_role() {
    let mut h = harness();
    h.auth.sign_in(individual());
    assert!(matches!(
        h.engine.documents_for_verifier(None),
        Err(WorkflowError::PermissionDenied { .. })
    ));
}

#[tokio::test]
async fn user_documents_match_uploader_address() {
    let mut h = harness();
    let doc = upload_pending(&mut h).await;
    let docs = h.engine.user_documents().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, doc.id);

    let mut other = individual();
    other.wallet_address = Some("0xother".into());
    h.auth.sign_in(other);
    assert!(h.engine.user_documents().unwrap().is_empty());
}

#[tokio::test]
async fn document_stats_count_by_status() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;
    let _minted = h.engine.mint_credits(&attested.id).await.unwrap();
    let pending = upload_pending(&mut h).await;
    let _pending2 = upload_pending(&mut h).await;
    h.auth.sign_in(verifier());
    h.engine.reject_document(&pending.id).unwrap();

    let stats = h.engine.document_stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.minted, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.attested, 0);
    assert_eq!(stats.total_minted_credits, 500);
    assert_eq!(stats.total_estimated_credits, 1500);
}

#[tokio::test]
async fn update_document_status_rejects_illegal_transitions() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;
    let minted = h.engine.mint_credits(&attested.id).await.unwrap();

    // Terminal states cannot be left.
    for to in [
        DocumentStatus::Pending,
        DocumentStatus::Attested,
        DocumentStatus::Rejected,
    ] {
        let err = h
            .engine
            .update_document_status(&minted.id, to, None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
    }
    // Pending cannot jump straight to Minted.
    let pending = upload_pending(&mut h).await;
    let err = h
        .engine
        .update_document_status(&pending.id, DocumentStatus::Minted, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
}

#[tokio::test]
async fn update_document_status_applies_patch_with_transition() {
    let mut h = harness();
    let attested = attested_document(&mut h).await;
    let minting = MintingInfo {
        transaction_hash: "0xlate".into(),
        minted_at: Utc::now(),
        minted_by: Some("0xverifier".into()),
        amount: 500,
        recipient: "0xuploader".into(),
        token_id: Some(7),
    };

    let updated = h
        .engine
        .update_document_status(
            &attested.id,
            DocumentStatus::Minted,
            Some(DocumentPatch {
                minting: Some(minting.clone()),
                ..Default::default()
            }),
        )
        .unwrap();

    assert_eq!(updated.status, DocumentStatus::Minted);
    assert_eq!(updated.minting, Some(minting));
    // The attestation set during the normal flow is untouched by the patch.
    assert_eq!(updated.attestation, attested.attestation);
}

#[tokio::test]
async fn reverting_to_pending_discards_patched_attestation() {
    let mut h = harness();
    let corrupted = corrupted_attested_document(&mut h).await;
    let patch = DocumentPatch {
        attestation: Some(Attestation {
            signature: Some("0xsig".into()),
            gs_project_id: Some("GS1".into()),
            gs_serial: Some("GS1-001".into()),
            amount: Some(500),
            nonce: Some(7),
            verifier_address: Some("0xverifier".into()),
            attested_at: Utc::now(),
            blockchain_attested: false,
            blockchain_transaction_hash: None,
        }),
        ..Default::default()
    };

    let reset = h
        .engine
        .update_document_status(&corrupted.id, DocumentStatus::Pending, Some(patch))
        .unwrap();
    assert_eq!(reset.status, DocumentStatus::Pending);
    assert!(reset.attestation.is_none());
    invariants::assert_pre_attestation_state(&reset);
}
