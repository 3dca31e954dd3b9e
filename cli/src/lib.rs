//! Command-line front end for the docshare permission sync engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::ArgGroup;
use clap::Parser;
use docshare_async_utils::CancelScope;
use docshare_core::DispatchOptions;
use docshare_core::Dispatcher;
use docshare_core::DocumentId;
use docshare_core::DriveClient;
use docshare_core::Operation;
use docshare_core::SyncConfig;
use docshare_login::AuthorizedTransport;
use docshare_login::OAuthClient;
use docshare_login::OAuthConfig;
use docshare_login::StdinPrompt;
use docshare_login::TokenSource;
use docshare_login::TokenStorage;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

const CONFIG_FILE: &str = ".config/docshare/config.toml";

/// Grant or revoke reader access to Google Drive documents in bulk.
#[derive(Debug, Parser)]
#[command(name = "docshare", version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(true)
        .args(["add", "remove"])
))]
pub struct Cli {
    /// Send notification email to new readers.
    #[arg(short = 'n', long = "notify")]
    pub notify: bool,

    /// Grant reader access to EMAIL.
    #[arg(short = 'a', long = "add", value_name = "EMAIL")]
    pub add: Option<String>,

    /// Revoke EMAIL's access.
    #[arg(short = 'r', long = "remove", value_name = "EMAIL")]
    pub remove: Option<String>,

    /// Configuration file (default: ~/.config/docshare/config.toml).
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of documents processed at once.
    #[arg(long = "concurrency", value_name = "N")]
    pub concurrency: Option<usize>,

    /// Per-document deadline in seconds.
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    #[arg(value_name = "DOC_ID", required = true)]
    pub documents: Vec<String>,
}

impl Cli {
    /// Reads the configuration file, then applies command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<SyncConfig> {
        let config = match &self.config {
            Some(path) => SyncConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => match default_config_path() {
                Some(path) if path.exists() => SyncConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                _ => SyncConfig::default(),
            },
        };
        self.apply_overrides(config)
    }

    pub fn apply_overrides(&self, mut config: SyncConfig) -> anyhow::Result<SyncConfig> {
        if self.notify {
            config.notify = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.task_timeout_secs = timeout;
        }
        config.validate().context("invalid command-line override")?;
        Ok(config)
    }

    /// Grants run before revokes.
    pub fn batches(&self) -> Vec<(Operation, &str)> {
        let grant = self.add.as_deref().map(|email| (Operation::Grant, email));
        let revoke = self.remove.as_deref().map(|email| (Operation::Revoke, email));
        grant.into_iter().chain(revoke).collect()
    }

    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|id| DocumentId::from(id.as_str())).collect()
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;

    let oauth = OAuthConfig::from_env()?;
    let tokens = Arc::new(TokenSource::new(
        OAuthClient::new(oauth),
        TokenStorage::new(),
        Arc::new(StdinPrompt),
    ));
    tokens
        .access_token()
        .await
        .context("failed to obtain Google credentials")?;

    let transport = AuthorizedTransport::new(reqwest::Client::new(), tokens);
    let client = DriveClient::from_config(Arc::new(transport), &config)?;
    let dispatcher = Dispatcher::new(Arc::new(client), DispatchOptions::from(&config));

    let shutdown = CancellationToken::new();
    let interrupt = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling outstanding work");
                shutdown.cancel();
            }
        }
    });
    let scope = CancelScope::with_token(shutdown.clone());

    let mut failures = 0;
    for (operation, email) in cli.batches() {
        if shutdown.is_cancelled() {
            break;
        }
        let report = dispatcher
            .run(operation, email, cli.document_ids(), &scope)
            .await;
        failures += report.failures();
    }
    interrupt.abort();

    if shutdown.is_cancelled() {
        anyhow::bail!("interrupted");
    }
    info!(failures, "done");
    Ok(())
}
