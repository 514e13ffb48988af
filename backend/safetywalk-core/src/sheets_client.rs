// src/sheets_client.rs

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::credentials::ServiceAccountKey;
use crate::week_locator::SheetGrid;

pub const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com";
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Could not sign service account assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Token exchange rejected: Status={status}, Message='{message}'")]
    AuthRejected { status: StatusCode, message: String },

    #[error("Sheets API error: Status={status}, Message='{message}'")]
    ApiError { status: StatusCode, message: String },
}

/// Anything that can hand over the cell values of one tab.
#[async_trait]
pub trait SheetSource {
    async fn fetch_grid(&self, spreadsheet_id: &str, tab: &str) -> Result<SheetGrid, SheetsError>;
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorPayload {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GoogleErrorBody {
    Api { message: String },
    OAuth(String),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Reads values with a service-account bearer token. One token per fetch.
pub struct SheetsClient {
    http_client: Client,
    key: ServiceAccountKey,
    base_url: String,
}

impl SheetsClient {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            http_client: Client::new(),
            key,
            base_url: SHEETS_API_BASE_URL.to_string(),
        }
    }

    /// Points the client at another Sheets API host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn signed_assertion(&self) -> Result<String, SheetsError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_READONLY_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(encode(&header, &claims, &signing_key)?)
    }

    /// Exchanges a signed assertion for an access token at the key's token URI.
    pub async fn access_token(&self) -> Result<String, SheetsError> {
        let assertion = self.signed_assertion()?;
        debug!("Requesting access token for {}", self.key.client_email);

        let response = self
            .http_client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response.text().await.unwrap_or_default());
            error!("Token exchange failed: Status={}, Body='{}'", status, message);
            return Err(SheetsError::AuthRejected { status, message });
        }

        let token = response.json::<TokenResponse>().await?;
        debug!("Access token granted (expires in {:?}s)", token.expires_in);
        Ok(token.access_token)
    }

    fn values_url(&self, spreadsheet_id: &str, tab: &str) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", tab]);
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        Ok(url)
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn fetch_grid(&self, spreadsheet_id: &str, tab: &str) -> Result<SheetGrid, SheetsError> {
        let access_token = self.access_token().await?;
        let url = self.values_url(spreadsheet_id, tab)?;
        info!("Reading tab '{}' of spreadsheet {}", tab, spreadsheet_id);

        let response = self
            .http_client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response.text().await.unwrap_or_default());
            error!("Sheets API Error Response: Status={}, Body='{}'", status, message);
            return Err(SheetsError::ApiError { status, message });
        }

        let body = response.bytes().await?;
        let range = serde_json::from_slice::<ValueRange>(&body)?;
        let grid: SheetGrid = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        info!("Fetched {} rows from '{}'", grid.len(), tab);
        Ok(grid)
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// Prefers Google's structured error message over the raw body.
fn error_message(body: String) -> String {
    match serde_json::from_str::<GoogleErrorPayload>(&body) {
        Ok(GoogleErrorPayload {
            error: GoogleErrorBody::Api { message },
        }) => message,
        Ok(GoogleErrorPayload {
            error: GoogleErrorBody::OAuth(code),
        }) => code,
        Err(_) => body,
    }
}
