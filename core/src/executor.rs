//! Retry loop around a single prepared request.

use std::sync::Arc;

use docshare_async_utils::CancelErr;
use docshare_async_utils::CancelScope;
use docshare_async_utils::OrCancelExt;
use reqwest::Request;
use reqwest::Response;
use tracing::debug;
use tracing::warn;

use crate::backoff::Backoff;
use crate::classify::ApiError;
use crate::error::Result;
use crate::error::SyncError;
use crate::transport::Transport;

/// Issues a request until it succeeds, fails terminally, or the scope ends.
///
/// There is no attempt limit; the caller's deadline bounds the loop.
#[derive(Clone)]
pub struct RetryingExecutor {
    transport: Arc<dyn Transport>,
    backoff: Backoff,
}

impl RetryingExecutor {
    pub fn new(transport: Arc<dyn Transport>, backoff: Backoff) -> Self {
        Self { transport, backoff }
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns the first 2xx response.
    ///
    /// Transport failures come back immediately. Non-2xx responses are
    /// drained and classified; transient ones are retried after
    /// `backoff.delay(retries)`.
    pub async fn execute(&self, request: Request, scope: &CancelScope) -> Result<Response> {
        self.execute_counted(request, scope)
            .await
            .map(|(response, _)| response)
    }

    /// Like [`execute`](Self::execute), also returning how many times the
    /// request was sent.
    pub async fn execute_counted(
        &self,
        request: Request,
        scope: &CancelScope,
    ) -> Result<(Response, u32)> {
        let method = request.method().clone();
        let url = request.url().clone();
        let mut retries: u32 = 0;

        loop {
            let attempts = retries.saturating_add(1);
            let cancelled = |reason: CancelErr| SyncError::Cancelled { reason, attempts };

            let attempt = request.try_clone().ok_or_else(|| {
                SyncError::InvalidRequest(format!("{method} {url}: body cannot be replayed"))
            })?;
            let response = self
                .transport
                .execute(attempt)
                .or_cancel(scope)
                .await
                .map_err(cancelled)??;

            if response.status().is_success() {
                return Ok((response, attempts));
            }

            let error = ApiError::read(response).or_cancel(scope).await.map_err(cancelled)?;
            if !error.is_retriable() {
                debug!(%method, %url, status = %error.status(), %error, "terminal failure");
                return Err(error.into());
            }

            let delay = self.backoff.delay(retries);
            warn!(
                %method,
                %url,
                status = %error.status(),
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                %error,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay)
                .or_cancel(scope)
                .await
                .map_err(cancelled)?;
            retries = attempts;
        }
    }
}
