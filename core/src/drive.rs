//! Requests against `/files/{id}/permissions`.

use std::sync::Arc;

use docshare_async_utils::CancelScope;
use docshare_async_utils::OrCancelExt;
use reqwest::Method;
use reqwest::Request;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderValue;
use url::Url;

use crate::config::ConfigError;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::error::SyncError;
use crate::error::TransportError;
use crate::executor::RetryingExecutor;
use crate::permission::DocumentId;
use crate::permission::PageToken;
use crate::permission::Permission;
use crate::permission::PermissionId;
use crate::permission::PermissionPage;
use crate::transport::Transport;

/// Projection requested from the listing endpoint.
const LIST_FIELDS: &str = "nextPageToken,permissions(id,emailAddress)";

pub struct DriveClient {
    executor: RetryingExecutor,
    base: Url,
    page_size: u32,
    supports_team_drives: bool,
}

impl DriveClient {
    pub fn new(executor: RetryingExecutor, base: Url, page_size: u32) -> Self {
        Self {
            executor,
            base,
            page_size,
            supports_team_drives: true,
        }
    }

    pub fn from_config(
        transport: Arc<dyn Transport>,
        config: &SyncConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let executor = RetryingExecutor::new(transport, config.backoff.policy());
        let mut client = Self::new(executor, config.api_url()?, config.page_size);
        client.supports_team_drives = config.supports_team_drives;
        Ok(client)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// `POST /files/{doc}/permissions`.
    pub async fn create_permission(
        &self,
        doc: &DocumentId,
        permission: &Permission,
        notify: bool,
        scope: &CancelScope,
    ) -> Result<()> {
        let mut url = self.permissions_url(doc, None)?;
        url.query_pairs_mut()
            .append_pair("sendNotificationEmail", if notify { "true" } else { "false" });
        self.append_team_drives(&mut url);

        let body = serde_json::to_vec(permission)
            .map_err(|err| SyncError::InvalidRequest(format!("encode permission: {err}")))?;
        let mut request = Request::new(Method::POST, url);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(body.into());

        self.executor.execute(request, scope).await?;
        Ok(())
    }

    /// One page of `GET /files/{doc}/permissions`, starting at `token`.
    pub async fn list_permissions(
        &self,
        doc: &DocumentId,
        token: &PageToken,
        scope: &CancelScope,
    ) -> Result<PermissionPage> {
        let mut url = self.permissions_url(doc, None)?;
        self.append_team_drives(&mut url);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("pageSize", &self.page_size.to_string())
                .append_pair("fields", LIST_FIELDS);
            if let Some(token) = token.as_str() {
                query.append_pair("pageToken", token);
            }
        }

        let (response, attempts) = self
            .executor
            .execute_counted(Request::new(Method::GET, url), scope)
            .await?;
        let body = response
            .bytes()
            .or_cancel(scope)
            .await
            .map_err(|reason| SyncError::Cancelled { reason, attempts })?
            .map_err(TransportError::from)?;
        serde_json::from_slice(&body).map_err(|err| {
            SyncError::MalformedResponse(format!("permissions listing for {doc}: {err}"))
        })
    }

    /// `DELETE /files/{doc}/permissions/{id}`.
    pub async fn delete_permission(
        &self,
        doc: &DocumentId,
        id: &PermissionId,
        scope: &CancelScope,
    ) -> Result<()> {
        let mut url = self.permissions_url(doc, Some(id))?;
        self.append_team_drives(&mut url);
        self.executor
            .execute(Request::new(Method::DELETE, url), scope)
            .await?;
        Ok(())
    }

    fn permissions_url(&self, doc: &DocumentId, id: Option<&PermissionId>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                SyncError::InvalidRequest(format!("base URL {} cannot carry a path", self.base))
            })?;
            segments
                .pop_if_empty()
                .extend(["files", doc.as_str(), "permissions"]);
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }

    fn append_team_drives(&self, url: &mut Url) {
        if self.supports_team_drives {
            url.query_pairs_mut().append_pair("supportsTeamDrives", "true");
        }
    }
}
