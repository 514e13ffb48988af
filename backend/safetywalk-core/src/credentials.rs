// src/credentials.rs

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("credentials are empty")]
    Empty,
    #[error("credentials are neither JSON ({json}) nor Base64-encoded JSON ({encoded})")]
    Undecodable {
        json: serde_json::Error,
        encoded: String,
    },
}

/// The fields of a Google service-account key file this tool uses.
#[derive(Deserialize, Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

// Keeps the private key out of logs.
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Decodes the key from raw JSON, falling back to Base64-wrapped JSON.
    pub fn decode(raw: &str) -> Result<Self, CredentialsError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialsError::Empty);
        }

        let json_err = match serde_json::from_str::<ServiceAccountKey>(trimmed) {
            Ok(key) => return Ok(key),
            Err(e) => e,
        };

        info!("Credentials are not plain JSON, trying Base64...");
        let decoded = BASE64_STANDARD
            .decode(trimmed)
            .map_err(|e| e.to_string())
            .and_then(|bytes| String::from_utf8(bytes).map_err(|e| e.to_string()))
            .and_then(|text| serde_json::from_str::<ServiceAccountKey>(&text).map_err(|e| e.to_string()));

        decoded.map_err(|encoded| CredentialsError::Undecodable {
            json: json_err,
            encoded,
        })
    }
}
