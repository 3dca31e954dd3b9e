//! Locating a user's permission on a document by email address.

use docshare_async_utils::CancelScope;
use tracing::debug;

use crate::drive::DriveClient;
use crate::error::Result;
use crate::error::SyncError;
use crate::permission::DocumentId;
use crate::permission::PageToken;
use crate::permission::PermissionId;
use crate::permission::ResolvedPermission;

/// Walk the document's permission pages and return the first record whose
/// email equals `email`.
///
/// `Ok(None)` means the address holds no permission. Each page goes
/// through the retrying executor, so a transient failure on page `n`
/// retries page `n` only.
pub async fn find_permission(
    client: &DriveClient,
    doc: &DocumentId,
    email: &str,
    scope: &CancelScope,
) -> Result<Option<ResolvedPermission>> {
    let mut token = PageToken::first();
    let mut pages: u32 = 0;

    loop {
        let page = client.list_permissions(doc, &token, scope).await?;
        pages += 1;

        if let Some(found) = page.permissions.iter().find(|p| p.email_address == email) {
            let id = PermissionId::new(found.id.as_str()).ok_or_else(|| {
                SyncError::MissingPermissionId {
                    email: email.to_string(),
                }
            })?;
            debug!(document = %doc, email, permission = %id, pages, "permission found");
            return Ok(Some(ResolvedPermission {
                id,
                email_address: found.email_address.clone(),
            }));
        }

        match page.next_token() {
            Some(next) if !page.permissions.is_empty() => token = next,
            _ => {
                debug!(document = %doc, email, pages, "no permission for address");
                return Ok(None);
            }
        }
    }
}
