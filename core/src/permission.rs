//! Wire types for the permissions collection.

use serde::Deserialize;
use serde::Serialize;

/// Opaque identifier of a remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Server-assigned permission ID. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionId(String);

impl PermissionId {
    /// `None` for an empty ID.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        (!id.is_empty()).then_some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Continuation token for a permissions listing. The default value is the
/// "no token" sentinel that requests the first page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageToken(Option<String>);

impl PageToken {
    pub fn first() -> Self {
        Self(None)
    }

    /// Empty tokens are treated as the sentinel.
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self((!token.is_empty()).then_some(token))
    }

    pub fn is_first(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranteeType {
    User,
}

/// A permission record as sent in a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub grantee_type: GranteeType,
    pub email_address: String,
}

impl Permission {
    /// Read access for one user, not yet assigned an ID.
    pub fn reader(email_address: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            role: Role::Reader,
            grantee_type: GranteeType::User,
            email_address: email_address.into(),
        }
    }
}

/// The `id` and `emailAddress` projection returned by a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PermissionSummary {
    pub id: String,
    pub email_address: String,
}

/// One page of `GET /files/{id}/permissions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PermissionPage {
    pub next_page_token: Option<String>,
    pub permissions: Vec<PermissionSummary>,
}

impl PermissionPage {
    pub fn next_token(&self) -> Option<PageToken> {
        self.next_page_token
            .as_deref()
            .map(PageToken::new)
            .filter(|token| !token.is_first())
    }
}

/// A permission located by email, guaranteed to carry an ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPermission {
    pub id: PermissionId,
    pub email_address: String,
}
