//! HTTP client for the admin server's queue and manifest endpoints.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use kiosksync_inventory::Inventory;
use kiosksync_protocol::messages::{
    FinishSyncRequest, FinishSyncResponse, RequestSyncRequest, SyncTurnResponse,
};
use kiosksync_transfer::RetryPolicy;

use crate::ClientError;

/// JSON round-trip timeout for queue and manifest calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Admin-server seam for the sync driver.
///
/// The production implementation is [`HttpCoordinator`]; driver tests
/// substitute scripted mocks.
pub trait TurnSource: Send + Sync {
    /// Asks for a turn on the sync slot.
    fn request_sync(&self) -> impl Future<Output = Result<SyncTurnResponse, ClientError>> + Send;

    /// Polls this kiosk's queue standing.
    fn sync_status(&self) -> impl Future<Output = Result<SyncTurnResponse, ClientError>> + Send;

    /// Releases the slot; returns the advanced generation.
    fn finish_sync(&self) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Fetches the admin's authoritative path to hash manifest.
    fn manifest(&self) -> impl Future<Output = Result<Inventory, ClientError>> + Send;
}

pub struct HttpCoordinator {
    client: reqwest::Client,
    base_url: String,
    kiosk_id: String,
    retry: RetryPolicy,
}

impl HttpCoordinator {
    pub fn new(base_url: &str, kiosk_id: &str, retry: RetryPolicy) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            kiosk_id: kiosk_id.to_string(),
            retry,
        })
    }

    /// POSTs `body`, retrying transient failures per the policy.
    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_post(&url, body).await {
                Ok(value) => return Ok(value),
                Err(e) if self.retry.is_last(attempt) => return Err(e),
                Err(e) => {
                    warn!(endpoint, attempt, error = %e, "request failed, retrying");
                    self.retry.wait().await;
                }
            }
        }
    }

    async fn try_post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.client.post(url).json(body).send().await?;
        Self::decode(resp).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = async {
                let resp = self.client.get(&url).query(query).send().await?;
                Self::decode(resp).await
            }
            .await;
            match result {
                Ok(value) => return Ok(value),
                Err(e) if self.retry.is_last(attempt) => return Err(e),
                Err(e) => {
                    warn!(endpoint, attempt, error = %e, "request failed, retrying");
                    self.retry.wait().await;
                }
            }
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

impl TurnSource for HttpCoordinator {
    async fn request_sync(&self) -> Result<SyncTurnResponse, ClientError> {
        let req = RequestSyncRequest {
            kiosk_id: self.kiosk_id.clone(),
        };
        self.post_json("request_sync", &req).await
    }

    async fn sync_status(&self) -> Result<SyncTurnResponse, ClientError> {
        self.get_json("sync_status", &[("kiosk_id", &self.kiosk_id)])
            .await
    }

    async fn finish_sync(&self) -> Result<u64, ClientError> {
        let req = FinishSyncRequest {
            kiosk_id: self.kiosk_id.clone(),
        };
        let resp: FinishSyncResponse = self.post_json("finish_sync", &req).await?;
        Ok(resp.generation)
    }

    async fn manifest(&self) -> Result<Inventory, ClientError> {
        self.get_json("sync_info", &[]).await
    }
}
