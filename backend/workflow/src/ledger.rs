//! Ledger client: the narrow contract the workflow core requires from the
//! distributed ledger, plus a JSON-RPC implementation.
//!
//! ## Resilience
//!
//! Transient transport failures and soft RPC errors are retried with bounded
//! exponential back-off through [`retry_with_policy`]. Hard RPC errors
//! (malformed request, unknown method, duplicate nonce) are surfaced
//! immediately as [`WorkflowError::LedgerRejected`] and never retried.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::errors::{Result, WorkflowError};
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::types::Document;

// ─────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────

/// Metadata submitted when registering a document on the ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRegistration {
    pub cid: String,
    pub filename: String,
    pub project_name: String,
    pub uploader: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReceipt {
    /// Ledger-assigned document id.
    pub id: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestReceipt {
    pub tx_hash: String,
}

/// The full mint submission. Field names and types must match the contract's
/// expectations exactly; the signature covers this data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub gs_project_id: String,
    pub gs_serial: String,
    pub ipfs_cid: String,
    pub amount: u64,
    pub recipient: String,
    pub nonce: u64,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintReceipt {
    pub tx_hash: String,
    pub token_id: u64,
}

#[derive(Debug, Deserialize)]
struct NonceResult {
    nonce: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

// ─────────────────────────────────────────────────────────
// Client trait
// ─────────────────────────────────────────────────────────

/// Register/attest/mint/query operations on the credit registry contract.
///
/// Every call may fail with a transient [`WorkflowError::Ledger`] or a hard
/// [`WorkflowError::LedgerRejected`]; how failures are absorbed (local
/// fallback for registration and attestation, hard failure for minting) is
/// the engine's concern, not the client's.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn register_document(&self, registration: &DocumentRegistration)
        -> Result<RegisterReceipt>;

    /// Per-recipient monotonic counter preventing signature replay. The
    /// counter is enforced by the contract; this only reads it.
    async fn get_nonce(&self, address: &str) -> Result<u64>;

    async fn attest_document(&self, ledger_id: u64) -> Result<AttestReceipt>;

    async fn mint_credits(&self, request: &MintRequest) -> Result<MintReceipt>;

    async fn get_all_documents(&self) -> Result<Vec<Document>>;

    async fn get_user_documents(&self, address: &str) -> Result<Vec<Document>>;
}

// ─────────────────────────────────────────────────────────
// JSON-RPC implementation
// ─────────────────────────────────────────────────────────

pub struct JsonRpcLedgerClient {
    client: Client,
    rpc_url: String,
    contract_address: String,
    policy: RetryPolicy,
}

impl JsonRpcLedgerClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(JsonRpcLedgerClient {
            client,
            rpc_url: config.ledger_rpc_url.clone(),
            contract_address: config.contract_address.clone(),
            policy: config.retry_policy(),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T> {
        retry_with_policy(&self.policy, || self.call_once(method, params.clone())).await
    }

    async fn call_once<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(WorkflowError::Ledger("rate-limited by RPC".into()));
        }

        let body: RpcResponse<T> = response.json().await?;

        if let Some(err) = body.error {
            // Code -32600 / -32601 are hard failures; everything else is
            // treated as transient.
            if err.code == -32600 || err.code == -32601 {
                return Err(WorkflowError::LedgerRejected(format!(
                    "RPC hard error {}: {}",
                    err.code, err.message
                )));
            }
            return Err(WorkflowError::Ledger(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        body.result
            .ok_or_else(|| WorkflowError::Ledger(format!("empty result from {method}")))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn register_document(
        &self,
        registration: &DocumentRegistration,
    ) -> Result<RegisterReceipt> {
        debug!("registering document {} on ledger", registration.cid);
        self.call(
            "registerDocument",
            json!({
                "contract": self.contract_address,
                "document": registration,
            }),
        )
        .await
    }

    async fn get_nonce(&self, address: &str) -> Result<u64> {
        let result: NonceResult = self
            .call(
                "getNonce",
                json!({
                    "contract": self.contract_address,
                    "address": address,
                }),
            )
            .await?;
        Ok(result.nonce)
    }

    async fn attest_document(&self, ledger_id: u64) -> Result<AttestReceipt> {
        self.call(
            "attestDocument",
            json!({
                "contract": self.contract_address,
                "documentId": ledger_id,
            }),
        )
        .await
    }

    async fn mint_credits(&self, request: &MintRequest) -> Result<MintReceipt> {
        debug!(
            "submitting mint for recipient {} (nonce {})",
            request.recipient, request.nonce
        );
        self.call(
            "mintCredits",
            json!({
                "contract": self.contract_address,
                "request": request,
            }),
        )
        .await
    }

    async fn get_all_documents(&self) -> Result<Vec<Document>> {
        self.call(
            "getAllDocuments",
            json!({ "contract": self.contract_address }),
        )
        .await
    }

    async fn get_user_documents(&self, address: &str) -> Result<Vec<Document>> {
        self.call(
            "getUserDocuments",
            json!({
                "contract": self.contract_address,
                "address": address,
            }),
        )
        .await
    }
}
