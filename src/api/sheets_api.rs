use crate::error::{DeliveryError, GoogleApiError};
use crate::types::record::FormRecord;
use crate::types::sheets::{AppendValuesResponse, DeliveryTarget, ValueRange};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

/// One `spreadsheets.values.append` call; no retries at this layer.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn append_row(
        &self,
        access_token: &str,
        target: &DeliveryTarget,
        record: &FormRecord,
    ) -> Result<AppendValuesResponse, DeliveryError>;
}

pub struct GoogleSheetsApi {
    client: reqwest::Client,
    base: Url,
}

impl GoogleSheetsApi {
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS`
    fn append_url(&self, target: &DeliveryTarget) -> Result<Url, DeliveryError> {
        if target.spreadsheet_id.is_empty() {
            return Err(DeliveryError::InvalidTarget(
                "spreadsheet id is not configured".to_string(),
            ));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DeliveryError::InvalidTarget(format!("cannot-be-a-base URL: {}", self.base)))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                target.spreadsheet_id.as_str(),
                "values",
                &format!("{}:append", target.range()),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsApi {
    async fn append_row(
        &self,
        access_token: &str,
        target: &DeliveryTarget,
        record: &FormRecord,
    ) -> Result<AppendValuesResponse, DeliveryError> {
        let url = self.append_url(target)?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&ValueRange::single(record))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.bytes().await?;
            let error = serde_json::from_slice::<GoogleApiError>(&body).ok();
            warn!(
                %status,
                google_status = error.as_ref().map(|e| e.error.status.as_str()).unwrap_or("-"),
                "Sheets append rejected"
            );
            return Err(DeliveryError::Api { status, error });
        }

        let body = resp.bytes().await?;
        debug!(bytes = body.len(), "Sheets append accepted");
        Ok(serde_json::from_slice(&body)?)
    }
}
