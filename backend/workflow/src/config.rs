//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{Result, WorkflowError};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Ledger JSON-RPC endpoint.
    pub ledger_rpc_url: String,
    /// Address of the credit registry contract (also the signing domain).
    pub contract_address: String,
    /// Content-store HTTP endpoint (upload and gateway).
    pub content_store_url: String,
    /// Optional bearer token for content-store uploads.
    pub content_store_token: Option<String>,
    /// Path to the document store snapshot file.
    pub document_store_path: String,
    /// Path to the allocation store snapshot file.
    pub allocation_store_path: String,
    /// Total attempts for retryable ledger calls (including the first).
    pub max_retry_attempts: u32,
    /// Initial back-off between retry attempts, in seconds.
    pub initial_backoff_secs: u64,
    /// Back-off cap, in seconds.
    pub max_backoff_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            ledger_rpc_url: env_var("LEDGER_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            contract_address: env_var("CONTRACT_ADDRESS").map_err(|_| {
                WorkflowError::Config("CONTRACT_ADDRESS environment variable is required".into())
            })?,
            content_store_url: env_var("CONTENT_STORE_URL")
                .unwrap_or_else(|_| "https://api.web3.storage".to_string()),
            content_store_token: env_var("CONTENT_STORE_TOKEN").ok(),
            document_store_path: env_var("DOCUMENT_STORE_PATH")
                .unwrap_or_else(|_| "./documents.json".to_string()),
            allocation_store_path: env_var("ALLOCATION_STORE_PATH")
                .unwrap_or_else(|_| "./allocations.json".to_string()),
            max_retry_attempts: env_var("MAX_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| WorkflowError::Config("Invalid MAX_RETRY_ATTEMPTS".into()))?,
            initial_backoff_secs: env_var("INITIAL_BACKOFF_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .map_err(|_| WorkflowError::Config("Invalid INITIAL_BACKOFF_SECS".into()))?,
            max_backoff_secs: env_var("MAX_BACKOFF_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| WorkflowError::Config("Invalid MAX_BACKOFF_SECS".into()))?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| WorkflowError::Config(format!("Missing env var: {key}")))
}
