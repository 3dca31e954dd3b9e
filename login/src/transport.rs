use std::sync::Arc;

use async_trait::async_trait;
use docshare_core::Transport;
use docshare_core::TransportError;
use reqwest::Request;
use reqwest::Response;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderValue;

use crate::token_source::TokenSource;

/// Sends requests with `Authorization: Bearer <token>` from a [`TokenSource`].
///
/// Tokens are refreshed as needed but the user is never prompted here; an
/// unrefreshable token fails the request with a credentials error.
#[derive(Clone)]
pub struct AuthorizedTransport {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
}

impl AuthorizedTransport {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenSource>) -> Self {
        Self { http, tokens }
    }
}

#[async_trait]
impl Transport for AuthorizedTransport {
    async fn execute(&self, mut request: Request) -> Result<Response, TransportError> {
        let token = self
            .tokens
            .current_token()
            .await
            .map_err(|err| TransportError::Credentials(err.to_string()))?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            TransportError::Credentials("access token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(self.http.execute(request).await?)
    }
}
