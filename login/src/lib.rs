//! Google OAuth credentials for docshare.
//!
//! [`TokenSource`] caches credentials on disk, refreshes them before they
//! expire, and falls back to the interactive consent flow when refreshing
//! is impossible. [`AuthorizedTransport`] plugs it into the Drive client.

mod oauth;
mod storage;
mod token_source;
mod transport;

pub use oauth::AuthError;
pub use oauth::CLIENT_ID_ENV_VAR;
pub use oauth::CLIENT_SECRET_ENV_VAR;
pub use oauth::OAuthClient;
pub use oauth::OAuthConfig;
pub use oauth::OOB_REDIRECT_URI;
pub use oauth::SCOPE_DRIVE;
pub use oauth::TokenResponse;
pub use storage::EXPIRY_BUFFER_SECS;
pub use storage::StorageError;
pub use storage::StoredToken;
pub use storage::TokenStorage;
pub use token_source::AuthorizationPrompt;
pub use token_source::StdinPrompt;
pub use token_source::TokenSource;
pub use transport::AuthorizedTransport;
