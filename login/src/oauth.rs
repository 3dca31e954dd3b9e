//! OAuth 2.0 authorization-code flow for installed applications.
//!
//! The user opens the authorization URL, approves access, and pastes the
//! code shown by the consent page back into the terminal.

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::storage::StorageError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Full read/write access to the user's files; needed to edit sharing.
pub const SCOPE_DRIVE: &str = "https://www.googleapis.com/auth/drive";

/// Out-of-band redirect: the consent page displays the code instead of
/// redirecting to a local server.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

pub const CLIENT_ID_ENV_VAR: &str = "DOCSHARE_OAUTH_CLIENT_ID";
pub const CLIENT_SECRET_ENV_VAR: &str = "DOCSHARE_OAUTH_CLIENT_SECRET";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The token endpoint rejected the request with an OAuth error body.
    #[error("{error}: {description}")]
    OAuth { error: String, description: String },

    #[error("server error: HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("authorization prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("no authorization code entered")]
    EmptyCode,

    /// Credentials ran out while work was in progress; prompting is only
    /// done up front.
    #[error("re-authorization required ({0}); run docshare again to sign in")]
    ReauthorizationRequired(String),
}

impl AuthError {
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, Self::OAuth { error, .. } if error == "invalid_grant")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
}

impl OAuthConfig {
    /// Google endpoints with the Drive scope and out-of-band redirect.
    pub fn google_drive(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scopes: vec![SCOPE_DRIVE.to_string()],
            redirect_uri: OOB_REDIRECT_URI.to_string(),
        }
    }

    /// Requires `DOCSHARE_OAUTH_CLIENT_ID`; `DOCSHARE_OAUTH_CLIENT_SECRET`
    /// is optional.
    pub fn from_env() -> Result<Self, AuthError> {
        let client_id = std::env::var(CLIENT_ID_ENV_VAR)
            .ok()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AuthError::Config(format!(
                    "{CLIENT_ID_ENV_VAR} environment variable not set. \
                     Create OAuth credentials at https://console.cloud.google.com/apis/credentials"
                ))
            })?;
        let client_secret = std::env::var(CLIENT_SECRET_ENV_VAR)
            .ok()
            .filter(|secret| !secret.is_empty());
        Ok(Self::google_drive(client_id, client_secret))
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Consent page URL requesting offline access.
    pub fn authorization_url(&self) -> Result<Url, AuthError> {
        let scope = self.config.scopes.join(" ");
        Url::parse_with_params(
            &self.config.auth_url,
            [
                ("access_type", "offline"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", "unused"),
            ],
        )
        .map_err(|err| AuthError::Config(format!("auth_url {:?}: {err}", self.config.auth_url)))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.push_client_credentials(&mut form);
        self.token_request(&form).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let mut form = vec![("grant_type", "refresh_token"), ("refresh_token", refresh_token)];
        self.push_client_credentials(&mut form);
        self.token_request(&form).await
    }

    fn push_client_credentials<'a>(&'a self, form: &mut Vec<(&'static str, &'a str)>) {
        form.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|err| AuthError::Parse(err.to_string()));
        }

        if let Ok(oauth_err) = serde_json::from_str::<OAuthErrorBody>(&body) {
            return Err(AuthError::OAuth {
                error: oauth_err.error,
                description: oauth_err.error_description.unwrap_or_default(),
            });
        }

        Err(AuthError::Server {
            status: status.as_u16(),
            body,
        })
    }
}
