//! Fan-out of one grant or revoke task per document under a fixed ceiling.

use std::sync::Arc;
use std::time::Duration;

use docshare_async_utils::CancelScope;
use docshare_async_utils::OrCancelExt;
use tokio::sync::Semaphore;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::SyncConfig;
use crate::drive::DriveClient;
use crate::error::Result;
use crate::error::SyncError;
use crate::permission::DocumentId;
use crate::permission::Permission;
use crate::resolver::find_permission;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Grant,
    Revoke,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grant => f.write_str("grant"),
            Self::Revoke => f.write_str("revoke"),
        }
    }
}

/// How a successful task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Granted,
    Revoked,
    /// Revoke target held no permission on the document.
    AlreadyAbsent,
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub document_id: DocumentId,
    pub result: Result<Completion>,
}

/// Per-document results of one batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    pub fn failures(&self) -> usize {
        self.failed().count()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.len() - self.failures()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Maximum number of tasks doing work at once.
    pub concurrency: usize,

    /// Deadline for one task, measured from when it acquires its slot.
    pub task_timeout: Duration,

    /// Ask the server to email grantees.
    pub notify: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for DispatchOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            task_timeout: config.task_timeout(),
            notify: config.notify,
        }
    }
}

pub struct Dispatcher {
    client: Arc<DriveClient>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(client: Arc<DriveClient>, options: DispatchOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Apply `operation` for `email` to every document and wait for all of
    /// them.
    ///
    /// Failures are logged per document and never stop sibling tasks.
    pub async fn run<I>(
        &self,
        operation: Operation,
        email: &str,
        documents: I,
        scope: &CancelScope,
    ) -> BatchReport
    where
        I: IntoIterator<Item = DocumentId>,
    {
        let slots = Arc::new(Semaphore::new(
            self.options.concurrency.clamp(1, Semaphore::MAX_PERMITS),
        ));
        let email: Arc<str> = Arc::from(email);

        let handles: Vec<_> = documents
            .into_iter()
            .map(|document_id| {
                let task = Task {
                    client: Arc::clone(&self.client),
                    slots: Arc::clone(&slots),
                    scope: scope.clone(),
                    email: Arc::clone(&email),
                    operation,
                    notify: self.options.notify,
                    timeout: self.options.task_timeout,
                    document_id: document_id.clone(),
                };
                (document_id, tokio::spawn(task.run()))
            })
            .collect();

        let mut report = BatchReport::default();
        for (document_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    warn!(document = %document_id, error = %err, "task did not complete");
                    Err(SyncError::TaskAborted(err.to_string()))
                }
            };
            report.outcomes.push(TaskOutcome {
                document_id,
                result,
            });
        }

        info!(
            %operation,
            email = %email,
            documents = report.outcomes.len(),
            failures = report.failures(),
            "batch finished"
        );
        report
    }
}

struct Task {
    client: Arc<DriveClient>,
    slots: Arc<Semaphore>,
    scope: CancelScope,
    email: Arc<str>,
    operation: Operation,
    notify: bool,
    timeout: Duration,
    document_id: DocumentId,
}

impl Task {
    async fn run(self) -> Result<Completion> {
        let result = self.run_inner().await;
        match &result {
            Ok(completion) => {
                debug!(document = %self.document_id, email = %self.email, ?completion, "done");
            }
            Err(err) => {
                warn!(
                    document = %self.document_id,
                    email = %self.email,
                    operation = %self.operation,
                    error = %err,
                    "permission update failed"
                );
            }
        }
        result
    }

    async fn run_inner(&self) -> Result<Completion> {
        // Released on every exit path, including unwinding.
        let _permit = Arc::clone(&self.slots)
            .acquire_owned()
            .or_cancel(&self.scope)
            .await
            .map_err(|reason| SyncError::Cancelled {
                reason,
                attempts: 0,
            })?
            .map_err(|err| SyncError::TaskAborted(err.to_string()))?;

        let scope = self.scope.child_with_timeout(self.timeout);
        let doc = &self.document_id;
        match self.operation {
            Operation::Grant => {
                let permission = Permission::reader(&*self.email);
                self.client
                    .create_permission(doc, &permission, self.notify, &scope)
                    .await?;
                Ok(Completion::Granted)
            }
            Operation::Revoke => {
                let Some(found) = find_permission(&self.client, doc, &self.email, &scope).await?
                else {
                    return Ok(Completion::AlreadyAbsent);
                };
                self.client.delete_permission(doc, &found.id, &scope).await?;
                Ok(Completion::Revoked)
            }
        }
    }
}
