use std::io;
use std::io::BufRead;
use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::oauth::AuthError;
use crate::oauth::OAuthClient;
use crate::storage::StoredToken;
use crate::storage::TokenStorage;

/// Obtains an authorization code from the user for a consent URL.
///
/// Called on a blocking thread.
pub trait AuthorizationPrompt: Send + Sync {
    fn request_code(&self, authorization_url: &Url) -> io::Result<String>;
}

/// Prints the consent URL to stderr and reads the code from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl AuthorizationPrompt for StdinPrompt {
    #[allow(clippy::print_stderr)]
    fn request_code(&self, authorization_url: &Url) -> io::Result<String> {
        eprint!("Authorize docshare at the following URL:\n\n{authorization_url}\n\nCode: ");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

/// Hands out access tokens, refreshing or re-authorizing as needed.
///
/// Concurrent callers share one cached token; the lock is held across a
/// refresh so only one refresh happens at a time. Only
/// [`access_token`](Self::access_token) may prompt the user.
pub struct TokenSource {
    client: OAuthClient,
    storage: TokenStorage,
    prompt: Arc<dyn AuthorizationPrompt>,
    cached: Mutex<Option<StoredToken>>,
}

impl TokenSource {
    pub fn new(
        client: OAuthClient,
        storage: TokenStorage,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Self {
        Self {
            client,
            storage,
            prompt,
            cached: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> &TokenStorage {
        &self.storage
    }

    /// Returns a valid token, running the consent flow if refreshing is not
    /// possible. Call this before work starts, outside any deadline.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        self.token(Interaction::Allowed).await
    }

    /// Returns a valid token, refreshing if needed, but never prompts.
    pub async fn current_token(&self) -> Result<String, AuthError> {
        self.token(Interaction::Forbidden).await
    }

    async fn token(&self, interaction: Interaction) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = match self.storage.load() {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(error = %err, path = %self.storage.path().display(), "ignoring unreadable credentials");
                    None
                }
            };
        }

        if let Some(token) = cached.as_ref()
            && !token.is_expired(Utc::now())
        {
            return Ok(token.access_token.clone());
        }

        let fresh = self.renew(cached.as_ref(), interaction).await?;
        if let Err(err) = self.storage.save(&fresh) {
            warn!(error = %err, "failed to persist credentials");
        }
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn renew(
        &self,
        current: Option<&StoredToken>,
        interaction: Interaction,
    ) -> Result<StoredToken, AuthError> {
        let reason = match current.and_then(|token| token.refresh_token.as_deref()) {
            Some(refresh_token) => match self.client.refresh(refresh_token).await {
                Ok(response) => {
                    debug!("access token refreshed");
                    return Ok(StoredToken::from_response(response, Utc::now())
                        .retain_refresh_token(refresh_token));
                }
                Err(err) => format!("token refresh failed: {err}"),
            },
            None => "no refresh token available".to_string(),
        };

        match interaction {
            Interaction::Allowed => {
                warn!(%reason, "re-authorizing");
                self.authorize().await
            }
            Interaction::Forbidden => Err(AuthError::ReauthorizationRequired(reason)),
        }
    }

    /// Runs the interactive consent flow and exchanges the code.
    pub async fn authorize(&self) -> Result<StoredToken, AuthError> {
        let url = self.client.authorization_url()?;
        let prompt = Arc::clone(&self.prompt);
        let code = tokio::task::spawn_blocking(move || prompt.request_code(&url))
            .await
            .map_err(|err| AuthError::Prompt(io::Error::other(err)))?
            .map_err(AuthError::Prompt)?;

        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::EmptyCode);
        }

        let response = self.client.exchange_code(code).await?;
        info!("authorization complete");
        Ok(StoredToken::from_response(response, Utc::now()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interaction {
    Allowed,
    Forbidden,
}
