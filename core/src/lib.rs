//! Root of the `docshare-core` library.
//!
//! Grants or revokes one user's read access across many documents through
//! the permissions collection API, retrying transient failures under a
//! fixed concurrency ceiling.

// Library code reports through `tracing`, never directly to the terminal.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod backoff;
pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod drive;
pub mod error;
pub mod executor;
pub mod permission;
pub mod resolver;
pub mod transport;

pub use backoff::Backoff;
pub use backoff::backoff;
pub use classify::ApiError;
pub use config::ConfigError;
pub use config::SyncConfig;
pub use dispatcher::BatchReport;
pub use dispatcher::Completion;
pub use dispatcher::DispatchOptions;
pub use dispatcher::Dispatcher;
pub use dispatcher::Operation;
pub use dispatcher::TaskOutcome;
pub use drive::DriveClient;
pub use error::SyncError;
pub use error::TransportError;
pub use executor::RetryingExecutor;
pub use permission::DocumentId;
pub use permission::PageToken;
pub use permission::Permission;
pub use permission::PermissionId;
pub use resolver::find_permission;
pub use transport::Transport;
