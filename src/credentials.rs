//! Service-account credentials for the Google Sheets API.
//!
//! The service-account JSON is parsed once, its private key is turned into a
//! signing key, and short-lived bearer tokens are obtained through the OAuth
//! JWT-bearer grant. Tokens are cached per process and shared by all requests.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Write access to spreadsheet values.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Google issues one-hour tokens; refresh well before expiry.
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(50 * 60);

/// The fields of a service-account JSON descriptor this service needs.
/// Everything else in the descriptor is ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Parses the service-account descriptor.
///
/// Fails with [`AppError::Configuration`] when the value is absent, blank, not
/// JSON, or lacks `client_email` / `private_key`. Never touches the network.
pub fn load_service_account(raw: Option<&str>) -> Result<ServiceAccountKey, AppError> {
    let raw = raw.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
        AppError::Configuration(
            "GOOGLE_SERVICE_ACCOUNT_JSON environment variable not set.".to_string(),
        )
    })?;

    let key: ServiceAccountKey = serde_json::from_str(raw).map_err(|e| {
        AppError::Configuration(format!("GOOGLE_SERVICE_ACCOUNT_JSON is not valid: {}", e))
    })?;

    if key.client_email.trim().is_empty() {
        return Err(AppError::Configuration(
            "Service account client_email is empty".to_string(),
        ));
    }
    if key.private_key.trim().is_empty() {
        return Err(AppError::Configuration(
            "Service account private_key is empty".to_string(),
        ));
    }

    Ok(key)
}

/// Claims of the signed assertion exchanged for an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Signing authority for one service account and one scope.
///
/// Immutable after construction apart from the token cache, which is safe for
/// concurrent use.
pub struct ServiceAccountAuthority {
    client_email: String,
    key_id: Option<String>,
    scope: String,
    token_uri: String,
    signing_key: EncodingKey,
    http: reqwest::Client,
    tokens: Cache<String, String>,
}

impl ServiceAccountAuthority {
    /// Creates an authority scoped to `scope`.
    ///
    /// # Arguments
    ///
    /// * `key` - The parsed service-account descriptor.
    /// * `scope` - The single OAuth scope tokens are requested for.
    pub fn new(key: &ServiceAccountKey, scope: &str) -> Result<Self, AppError> {
        // Keys pasted into env files sometimes keep their newlines escaped.
        let pem = key.private_key.replace("\\n", "\n");
        let signing_key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            AppError::Configuration(format!("Service account private_key is not a valid RSA key: {}", e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create token client: {}", e))
            })?;

        let tokens = Cache::builder()
            .time_to_live(TOKEN_CACHE_TTL)
            .max_capacity(16)
            .build();

        Ok(Self {
            client_email: key.client_email.clone(),
            key_id: key.private_key_id.clone(),
            scope: scope.to_string(),
            token_uri: key
                .token_uri
                .clone()
                .filter(|uri| !uri.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            signing_key,
            http,
            tokens,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Builds the RS256 assertion for the JWT-bearer grant.
    pub fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, AppError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        encode(&header, &claims, &self.signing_key)
            .map_err(|e| AppError::Configuration(format!("Failed to sign assertion: {}", e)))
    }

    /// Returns a bearer token, exchanging a fresh assertion when the cached
    /// one has expired. Concurrent callers share a single exchange.
    ///
    /// Failures are reported as [`AppError::Persistence`]: the token is only
    /// ever needed to write a row.
    pub async fn access_token(&self) -> Result<String, AppError> {
        let cache_key = format!("{}|{}", self.client_email, self.scope);
        self.tokens
            .try_get_with(cache_key, self.exchange_token())
            .await
            .map_err(|e| (*e).clone())
    }

    async fn exchange_token(&self) -> Result<String, AppError> {
        let assertion = self.signed_assertion(Utc::now())?;
        tracing::debug!("Requesting access token for {}", self.client_email);

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Persistence(format!(
                "Token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::Persistence(format!("Failed to parse token response: {}", e))
        })?;

        tracing::info!("✓ Access token obtained for {}", self.client_email);
        Ok(token.access_token)
    }
}
