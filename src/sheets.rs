use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::credentials::ServiceAccountAuthority;
use crate::errors::AppError;
use crate::models::{LeadRecord, SheetRow, SHEET_HEADERS};

/// Append target: first cell of the `Leads` sheet.
pub const LEADS_RANGE: &str = "Leads!A1";
/// Header row of the `Leads` sheet.
pub const HEADER_RANGE: &str = "Leads!A1:J1";
/// Lets the Sheets API interpret dates and numbers instead of storing raw text.
pub const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

const APPEND_FAILURE: &str = "Failed to append row to Google Sheet.";

/// Durable destination for captured leads.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Records one lead. Exactly one row is written on success.
    async fn append_lead(&self, record: &LeadRecord) -> Result<(), AppError>;
}

/// Google Sheets v4 client appending leads to a fixed range.
pub struct GoogleSheetsSink {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    authority: Arc<ServiceAccountAuthority>,
}

impl GoogleSheetsSink {
    /// Creates a new `GoogleSheetsSink`.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the spreadsheet id and API base URL.
    /// * `authority` - Signs token requests for the spreadsheet scope.
    pub fn new(config: &Config, authority: Arc<ServiceAccountAuthority>) -> Result<Self, AppError> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(AppError::Configuration(
                "GOOGLE_SHEETS_SPREADSHEET_ID environment variable not set.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create Sheets client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.sheets_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            authority,
        })
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}{suffix}` with each path
    /// segment percent-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, AppError> {
        let target = format!("{}{}", range, suffix);
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Configuration(format!("Invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration("Sheets base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                target.as_str(),
            ]);
        Ok(url)
    }

    /// Appends one row to [`LEADS_RANGE`].
    pub async fn append_row(&self, row: &SheetRow) -> Result<(), AppError> {
        let mut url = self.values_url(LEADS_RANGE, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);

        let token = self.authority.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Sheets request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Persistence(format!(
                "Sheets append returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }

    /// Checks that the `Leads` header row matches [`SHEET_HEADERS`].
    ///
    /// Comparison is case-insensitive and ignores surrounding whitespace.
    pub async fn verify_header(&self) -> Result<(), AppError> {
        let url = self.values_url(HEADER_RANGE, "")?;
        let token = self.authority.access_token().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Sheets header request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Persistence(format!(
                "Sheets header read returned {}: {}",
                status, error_text
            )));
        }

        let range: ValueRange = response.json().await.map_err(|e| {
            AppError::Persistence(format!("Failed to parse Sheets header response: {}", e))
        })?;
        let actual = range.values.into_iter().next().unwrap_or_default();

        if !header_matches(&actual) {
            return Err(AppError::Configuration(format!(
                "Leads header mismatch: expected {:?}, found {:?}",
                SHEET_HEADERS, actual
            )));
        }

        tracing::info!("✓ Leads sheet header verified");
        Ok(())
    }
}

#[async_trait]
impl LeadSink for GoogleSheetsSink {
    async fn append_lead(&self, record: &LeadRecord) -> Result<(), AppError> {
        let row = SheetRow::from_lead(record, Utc::now());
        let lead_ref = record.fingerprint();

        tracing::info!("Appending lead {} to spreadsheet", lead_ref);

        match self.append_row(&row).await {
            Ok(()) => {
                tracing::info!("✓ Lead {} appended", lead_ref);
                Ok(())
            }
            Err(AppError::Configuration(msg)) => Err(AppError::Configuration(msg)),
            Err(e) => {
                tracing::error!("Google Sheets API Error for lead {}: {}", lead_ref, e);
                Err(AppError::Persistence(APPEND_FAILURE.to_string()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

fn header_matches(actual: &[String]) -> bool {
    actual.len() >= SHEET_HEADERS.len()
        && SHEET_HEADERS
            .iter()
            .zip(actual)
            .all(|(expected, found)| found.trim().eq_ignore_ascii_case(expected))
}
