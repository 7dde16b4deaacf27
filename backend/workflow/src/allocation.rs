//! Credit allocation: post-mint bookkeeping that credits minted tokens to
//! the original uploader.
//!
//! Allocation is best-effort and never unwinds a mint. A record that cannot
//! be completed is left `Failed` and stays enumerable for retry; each retry
//! call is one attempt, not an internal loop. Balances are recomputed from
//! the record set on every read, so they are always consistent with it.

use chrono::Utc;
use tracing::{info, warn};

use crate::errors::{Result, WorkflowError};
use crate::store::AllocationStore;
use crate::types::{
    AllocationRecord, AllocationStatus, Document, MintingInfo, UserBalance,
};

pub struct AllocationService {
    store: AllocationStore,
}

impl AllocationService {
    pub fn new(store: AllocationStore) -> Self {
        AllocationService { store }
    }

    /// Record the credit transfer for a freshly minted document.
    ///
    /// The record is created `Pending` first so that a completion failure
    /// leaves a visible, retryable trace rather than dropping the transfer
    /// silently.
    pub fn allocate(&mut self, document: &Document, minting: &MintingInfo) -> Result<AllocationRecord> {
        let recipient = document
            .uploaded_by
            .clone()
            .ok_or_else(|| WorkflowError::MissingUploader {
                id: document.id.clone(),
            })?;

        let record = AllocationRecord {
            id: allocation_id(),
            document_id: document.id.clone(),
            recipient,
            amount: minting.amount,
            status: AllocationStatus::Pending,
            transaction_hash: None,
            token_id: None,
            created_at: Utc::now(),
            last_attempt_at: None,
            attempt_count: 0,
        };
        let id = record.id.clone();
        self.store.insert(record);

        self.attempt_completion(&id, minting)
    }

    /// Re-attempt a failed allocation. One attempt per call; bumps
    /// `attempt_count` regardless of outcome.
    pub fn retry(&mut self, allocation_id: &str, minting: &MintingInfo) -> Result<AllocationRecord> {
        let record = self
            .store
            .get(allocation_id)
            .ok_or_else(|| WorkflowError::AllocationNotFound {
                id: allocation_id.to_string(),
            })?;
        if record.status == AllocationStatus::Completed {
            return Err(WorkflowError::AllocationAlreadyCompleted {
                id: allocation_id.to_string(),
            });
        }

        self.store.update(allocation_id, |r| {
            r.status = AllocationStatus::Retrying;
        })?;
        self.attempt_completion(allocation_id, minting)
    }

    /// Mark the record completed from the mint result, or failed when the
    /// mint result carries no usable transaction reference.
    fn attempt_completion(&mut self, id: &str, minting: &MintingInfo) -> Result<AllocationRecord> {
        let now = Utc::now();
        if minting.transaction_hash.trim().is_empty() {
            let record = self.store.update(id, |r| {
                r.status = AllocationStatus::Failed;
                r.last_attempt_at = Some(now);
                r.attempt_count += 1;
            })?;
            warn!(
                "allocation {id} for document {} failed: mint result has no transaction hash",
                record.document_id
            );
            return Ok(record);
        }

        let record = self.store.update(id, |r| {
            r.status = AllocationStatus::Completed;
            r.transaction_hash = Some(minting.transaction_hash.clone());
            r.token_id = minting.token_id;
            r.last_attempt_at = Some(now);
            r.attempt_count += 1;
        })?;
        info!(
            "allocated {} credits to {} for document {}",
            record.amount, record.recipient, record.document_id
        );
        Ok(record)
    }

    /// Derived balance for a recipient. Recomputed on demand: the total is
    /// the sum of completed allocation amounts, never a maintained counter.
    pub fn user_balance(&self, recipient: &str) -> UserBalance {
        let history = self.store.for_recipient(recipient);
        let total_allocated: u64 = history
            .iter()
            .filter(|r| r.status == AllocationStatus::Completed)
            .map(|r| r.amount)
            .sum();
        let pending_count = history
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    AllocationStatus::Pending | AllocationStatus::Retrying
                )
            })
            .count();
        let failed_count = history
            .iter()
            .filter(|r| r.status == AllocationStatus::Failed)
            .count();

        UserBalance {
            recipient: recipient.to_string(),
            balance: total_allocated,
            total_allocated,
            allocation_count: history.len(),
            pending_count,
            failed_count,
            history,
        }
    }

    pub fn record(&self, id: &str) -> Option<&AllocationRecord> {
        self.store.get(id)
    }

    pub fn allocations_for(&self, recipient: &str) -> Vec<AllocationRecord> {
        self.store.for_recipient(recipient)
    }

    pub fn allocations_for_document(&self, document_id: &str) -> Vec<AllocationRecord> {
        self.store.for_document(document_id)
    }

    /// Failed records awaiting a retry.
    pub fn failed_allocations(&self) -> Vec<AllocationRecord> {
        self.store.failed()
    }
}

fn allocation_id() -> String {
    format!("alloc_{}", hex::encode(rand::random::<[u8; 8]>()))
}
