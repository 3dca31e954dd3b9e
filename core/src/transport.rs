//! The seam between the sync engine and whatever actually sends requests.

use async_trait::async_trait;
use reqwest::Request;
use reqwest::Response;

use crate::error::TransportError;

/// Sends one prepared request and returns whatever response came back,
/// successful or not. Implementations attach credentials; they do not
/// retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

/// Plain client with no credentials attached.
#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        Ok(reqwest::Client::execute(self, request).await?)
    }
}
