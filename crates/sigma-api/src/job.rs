//! Job handle and job tracking.
//!
//! Long-running drive operations are represented by jobs whose progress
//! climbs to 100. [`track_job`] waits for that and then observes the resource
//! the job belongs to once, so the caller ends up with the settled record.

use crate::client::SigmaClient;
use crate::models::JobRecord;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sigma_core::ids::JobUuid;
use sigma_core::types::JobState;
use sigma_core::{wait_for, Observe, WaitOptions};
use std::fmt;
use tracing::info;

/// Handle to a job.
pub struct Job {
    client: SigmaClient,
    obj: JobRecord,
}

impl Job {
    pub(crate) fn from_record(client: SigmaClient, obj: JobRecord) -> Self {
        Self { client, obj }
    }

    /// Handle for a job known only by identifier; nothing is fetched until refresh.
    #[must_use]
    pub fn pending(client: SigmaClient, uuid: JobUuid) -> Self {
        Self::from_record(client, JobRecord::pending(uuid))
    }

    /// Job identifier.
    #[must_use]
    pub fn uuid(&self) -> &JobUuid {
        &self.obj.uuid
    }

    /// Job URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.obj.uri
    }

    /// Operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.obj.operation
    }

    /// Execution state as of the last refresh.
    #[must_use]
    pub fn state(&self) -> &JobState {
        &self.obj.state
    }

    /// Progress percentage as of the last refresh.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.obj.data.progress
    }

    /// Sub-job identifiers.
    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.obj.children
    }

    /// Resources the job touches.
    #[must_use]
    pub fn resources(&self) -> &[String] {
        &self.obj.resources
    }

    /// Creation time.
    #[must_use]
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.obj.created
    }

    /// Last modification time.
    #[must_use]
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.obj.last_modified
    }

    /// Current snapshot.
    #[must_use]
    pub fn record(&self) -> &JobRecord {
        &self.obj
    }

    /// Replace the snapshot with a freshly fetched record.
    pub async fn refresh(&mut self) -> Result<()> {
        self.obj = self.client.get_job(&self.obj.uuid).await?;
        Ok(())
    }

    /// Refresh until progress reaches 100, within the client's operation timeout.
    pub async fn wait_complete(&mut self) -> Result<()> {
        let options = self.client.wait_options();
        self.wait_complete_with(options).await
    }

    /// Refresh until progress reaches 100.
    pub async fn wait_complete_with(&mut self, options: WaitOptions) -> Result<()> {
        wait_for(self, JobRecord::is_complete, options).await?;
        info!(uuid = %self.obj.uuid, operation = %self.obj.operation, "job completed");
        Ok(())
    }
}

#[async_trait]
impl Observe for Job {
    type State = JobRecord;

    async fn observe(&mut self) -> Result<JobRecord> {
        self.refresh().await?;
        Ok(self.obj.clone())
    }
}

/// Wait for `job` to complete, then observe its owning resource once.
///
/// # Errors
///
/// Returns the first refresh failure of either the job or the owner, or
/// [`sigma_core::Error::OperationTimeout`] when the job does not finish in time.
pub async fn track_job<O>(job: &mut Job, owner: &mut O, options: WaitOptions) -> Result<O::State>
where
    O: Observe + ?Sized,
{
    job.wait_complete_with(options).await?;
    owner.observe().await
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("obj", &self.obj).finish_non_exhaustive()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{UUID: {:?}\nOperation: {}\nState: {}\nProgress: {}\nResources: {:?}}}",
            self.obj.uuid.as_str(),
            self.obj.operation,
            self.obj.state,
            self.obj.data.progress,
            self.obj.resources
        )
    }
}
