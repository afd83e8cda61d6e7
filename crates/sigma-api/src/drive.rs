//! Drive handle.

use crate::client::SigmaClient;
use crate::job::{track_job, Job};
use crate::models::{AvoidList, CloneParams, DriveRecord};
use crate::Result;
use async_trait::async_trait;
use sigma_core::ids::{DriveUuid, JobUuid};
use sigma_core::types::{DriveStatus, Media};
use sigma_core::Observe;
use std::fmt;
use tracing::{debug, info};

/// Handle to a drive.
pub struct Drive {
    client: SigmaClient,
    obj: DriveRecord,
}

impl Drive {
    pub(crate) fn from_record(client: SigmaClient, obj: DriveRecord) -> Self {
        Self { client, obj }
    }

    /// Drive identifier.
    #[must_use]
    pub fn uuid(&self) -> &DriveUuid {
        &self.obj.uuid
    }

    /// Drive URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.obj.uri
    }

    /// Drive name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.obj.name
    }

    /// Status as of the last refresh.
    #[must_use]
    pub fn status(&self) -> &DriveStatus {
        &self.obj.status
    }

    /// Media type.
    #[must_use]
    pub fn media(&self) -> Option<Media> {
        self.obj.media
    }

    /// Storage type.
    #[must_use]
    pub fn storage_type(&self) -> &str {
        &self.obj.storage_type
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.obj.size
    }

    /// Metadata value.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.obj.meta.get(key).map(String::as_str)
    }

    /// Unfetched handles for the jobs operating on this drive.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.obj
            .jobs
            .iter()
            .map(|job| Job::pending(self.client.clone(), JobUuid::new(job.uuid.clone())))
            .collect()
    }

    /// Current snapshot.
    #[must_use]
    pub fn record(&self) -> &DriveRecord {
        &self.obj
    }

    /// Replace the snapshot with a freshly fetched record.
    pub async fn refresh(&mut self) -> Result<()> {
        self.obj = self.client.get_drive(&self.obj.uuid).await?;
        Ok(())
    }

    /// Fetch an independent handle to the same drive.
    pub async fn refetch(&self) -> Result<Self> {
        self.client.drive(&self.obj.uuid).await
    }

    /// Request a clone; returns the new drive as reported by the service.
    pub async fn clone(&self, params: &CloneParams, avoid: &AvoidList) -> Result<Self> {
        let record = self.client.clone_drive(&self.obj.uuid, params, avoid).await?;
        info!(source = %self.obj.uuid, clone = %record.uuid, "drive clone accepted");
        Ok(Self::from_record(self.client.clone(), record))
    }

    /// Clone and wait for the clone job, within the client's operation timeout.
    pub async fn clone_wait(&self, params: &CloneParams, avoid: &AvoidList) -> Result<Self> {
        self.clone(params, avoid).await?.wait_jobs().await
    }

    /// Wait for the first job on this drive, then refresh the drive.
    ///
    /// A drive without jobs is returned unchanged.
    pub async fn wait_jobs(mut self) -> Result<Self> {
        let Some(link) = self.obj.jobs.first() else {
            debug!(uuid = %self.obj.uuid, "drive has no jobs to wait for");
            return Ok(self);
        };

        let mut job = Job::pending(self.client.clone(), JobUuid::new(link.uuid.clone()));
        let options = self.client.wait_options();
        track_job(&mut job, &mut self, options).await?;
        Ok(self)
    }

    /// Delete the drive.
    pub async fn remove(self) -> Result<()> {
        self.client.remove_drive(&self.obj.uuid).await
    }
}

#[async_trait]
impl Observe for Drive {
    type State = DriveStatus;

    async fn observe(&mut self) -> Result<DriveStatus> {
        self.refresh().await?;
        Ok(self.obj.status.clone())
    }
}

impl fmt::Debug for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drive").field("obj", &self.obj).finish_non_exhaustive()
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Name: {:?}\nURI: {:?}\nStatus: {}\nUUID: {:?}\nSize: {}}}",
            self.obj.name,
            self.obj.uri,
            self.obj.status,
            self.obj.uuid.as_str(),
            self.obj.size
        )
    }
}
