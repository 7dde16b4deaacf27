//! Content-store client: upload/fetch of immutable blobs by CID.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;
use crate::errors::{Result, WorkflowError};
use crate::types::FileUpload;

/// Result of storing a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// Content identifier assigned by the store.
    pub cid: String,
    /// Gateway URL the content can be fetched from.
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// Upload/fetch against a content-addressed storage service.
#[async_trait]
pub trait ContentStoreClient: Send + Sync {
    /// Stores the file and returns its content reference. Transport failures
    /// surface as [`WorkflowError::UploadFailed`].
    async fn upload(&self, file: &FileUpload) -> Result<StoredContent>;

    async fn fetch(&self, cid: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    cid: String,
}

/// HTTP implementation against a Web3.Storage-style endpoint.
pub struct HttpContentStoreClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpContentStoreClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(HttpContentStoreClient {
            client,
            base_url: config.content_store_url.trim_end_matches('/').to_string(),
            token: config.content_store_token.clone(),
        })
    }

    fn gateway_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{cid}", self.base_url)
    }
}

#[async_trait]
impl ContentStoreClient for HttpContentStoreClient {
    async fn upload(&self, file: &FileUpload) -> Result<StoredContent> {
        let mut request = self
            .client
            .post(format!("{}/upload", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, &file.content_type)
            .header("x-name", &file.filename)
            .body(file.data.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkflowError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WorkflowError::UploadFailed(format!(
                "content store returned {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| WorkflowError::UploadFailed(e.to_string()))?;

        Ok(StoredContent {
            url: self.gateway_url(&body.cid),
            cid: body.cid,
            size: file.size(),
            content_type: file.content_type.clone(),
        })
    }

    async fn fetch(&self, cid: &str) -> Result<Vec<u8>> {
        let response = self.client.get(self.gateway_url(cid)).send().await?;
        if !response.status().is_success() {
            return Err(WorkflowError::ContentStore(format!(
                "fetch for {cid} returned {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
