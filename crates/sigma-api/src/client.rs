//! Asynchronous CloudSigma client implementation.

use crate::drive::Drive;
use crate::job::Job;
use crate::models::{
    Action, ActionResult, AttachedDrive, AvoidList, CloneParams, DriveRecord, DriveSummary,
    JobRecord, ListEnvelope, NicSpec, ServerComponents, ServerRecord, ServerSummary,
    ServerTemplate,
};
use crate::server::Server;
use crate::Result;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use sigma_core::client::ClientConfig;
use sigma_core::config::{resolve_endpoint_with, Configuration, Credentials};
use sigma_core::ids::{DriveUuid, JobUuid, ServerUuid};
use sigma_core::query::QueryParams;
use sigma_core::types::Recurse;
use sigma_core::{Error, HttpTransport, Request, Response, Transport, WaitOptions};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builder for [`SigmaClient`].
#[derive(Clone)]
pub struct SigmaClientBuilder {
    endpoint: String,
    allow_http: bool,
    credentials: Option<Credentials>,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl SigmaClientBuilder {
    /// Create a builder for a region short name (`zrh`, `lvs`) or https URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            allow_http: false,
            credentials: None,
            config: ClientConfig::new(),
            transport: None,
        }
    }

    /// Create a builder from a user-facing configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not pass its checks.
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        config.check()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            allow_http: config.allow_http,
            credentials: Some(config.credentials.clone()),
            config: config.client_config(),
            transport: None,
        })
    }

    /// Configure HTTP basic authentication credentials.
    #[must_use]
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::basic(user, password));
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the deadline for `*_wait` operations (zero waits unboundedly).
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_operation_timeout(timeout);
        self
    }

    /// Set the extra delay between polls of a waited operation.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_poll_interval(interval);
        self
    }

    /// Permit a plain `http` endpoint.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Send requests through `transport` instead of HTTPS.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid endpoint or unusable credentials.
    pub fn build(self) -> Result<SigmaClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let schemes: &[&str] = if self.allow_http {
                    &["https", "http"]
                } else {
                    &["https"]
                };
                let base_url = resolve_endpoint_with(&self.endpoint, schemes)?;
                let mut http = HttpTransport::new(base_url, &self.config)?;
                if let Some(credentials) = &self.credentials {
                    credentials.verify()?;
                    http = http.with_basic_auth(credentials.user.clone(), credentials.password());
                }
                Arc::new(http) as Arc<dyn Transport>
            }
        };

        Ok(SigmaClient {
            transport,
            config: self.config,
        })
    }
}

impl fmt::Debug for SigmaClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigmaClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("allow_http", &self.allow_http)
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

/// Asynchronous CloudSigma client.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct SigmaClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl SigmaClient {
    /// Construct an authenticated client for a region or https URL.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid endpoint or empty credentials.
    pub fn new(
        endpoint: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        SigmaClientBuilder::new(endpoint)
            .with_basic_auth(user, password)
            .build()
    }

    /// Construct a client around an existing transport.
    #[must_use]
    pub fn from_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// HTTP client configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Deadline and cadence used by `*_wait` operations.
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        self.config.wait_options()
    }

    /// List servers (brief records).
    pub async fn servers(&self) -> Result<Vec<ServerSummary>> {
        self.list("servers/").await
    }

    /// List servers with full records.
    pub async fn servers_detail(&self) -> Result<Vec<ServerRecord>> {
        self.list("servers/detail/").await
    }

    /// Fetch a server record.
    pub async fn get_server(&self, uuid: &ServerUuid) -> Result<ServerRecord> {
        let id = uuid.require()?;
        self.get_json(&format!("servers/{id}/")).await
    }

    /// Fetch a server as a handle.
    pub async fn server(&self, uuid: &ServerUuid) -> Result<Server> {
        let record = self.get_server(uuid).await?;
        Ok(Server::from_record(self.clone(), record))
    }

    /// Request a server start. Status is not checked locally.
    pub async fn start_server(&self, uuid: &ServerUuid, avoid: &AvoidList) -> Result<ActionResult> {
        let id = uuid.require()?;
        self.issue("servers", id, Action::Start, avoid, None)
            .await?
            .json()
    }

    /// Request a server stop. Status is not checked locally.
    pub async fn stop_server(&self, uuid: &ServerUuid) -> Result<ActionResult> {
        let id = uuid.require()?;
        self.issue("servers", id, Action::Stop, &AvoidList::new(), None)
            .await?
            .json()
    }

    /// Delete a server, optionally together with its drives.
    pub async fn remove_server(&self, uuid: &ServerUuid, recurse: Recurse) -> Result<()> {
        let id = uuid.require()?;
        let mut query = QueryParams::new();
        query.push_opt("recurse", recurse.as_query());
        let request = Request::delete(format!("servers/{id}/")).with_query(query);
        self.execute(request, StatusCode::NO_CONTENT).await?;
        info!(uuid = id, ?recurse, "server removed");
        Ok(())
    }

    /// Create a server from components.
    pub async fn create_server(&self, components: &ServerComponents) -> Result<Server> {
        let request = Request::post("servers/").with_json(components)?;
        let response = self.execute(request, StatusCode::CREATED).await?;
        let envelope: ListEnvelope<ServerRecord> = response.json()?;
        let record = envelope.objects.into_iter().next().ok_or_else(|| {
            Error::UnexpectedResponse("no servers in response from endpoint".into())
        })?;
        info!(uuid = %record.uuid, name = %record.name, "server created");
        Ok(Server::from_record(self.clone(), record))
    }

    /// Clone a template drive, wait for the copy, and create a server booting from it.
    ///
    /// The steps are not atomic: a failure after the clone leaves the cloned
    /// drive in place.
    pub async fn create_server_from_template(&self, template: &ServerTemplate) -> Result<Server> {
        let record = self
            .clone_drive(
                &template.template_drive,
                &CloneParams::named(template.drive_name.clone()),
                &AvoidList::new(),
            )
            .await?;
        let drive = Drive::from_record(self.clone(), record).wait_jobs().await?;

        let mut components = ServerComponents::new();
        components.set_name(&template.name);
        components.set_cpu(template.cpu);
        components.set_mem(template.mem);
        components.set_vnc_password(&template.vnc_password);
        components.set_description(&template.description);
        components.set_ssh_public_key(&template.ssh_public_key);
        components.attach_drive(AttachedDrive::boot_disk(drive.uuid()));
        components.attach_nic(NicSpec::dhcp().with_model("virtio"));
        if let Some(vlan) = &template.vlan {
            components.attach_nic(NicSpec::vlan(vlan.clone()).with_model("virtio"));
        }

        self.create_server(&components).await
    }

    /// List drives (brief records).
    pub async fn drives(&self) -> Result<Vec<DriveSummary>> {
        self.list("drives/").await
    }

    /// List drives with full records.
    pub async fn drives_detail(&self) -> Result<Vec<DriveRecord>> {
        self.list("drives/detail/").await
    }

    /// Fetch a drive record.
    pub async fn get_drive(&self, uuid: &DriveUuid) -> Result<DriveRecord> {
        let id = uuid.require()?;
        self.get_json(&format!("drives/{id}/")).await
    }

    /// Fetch a drive as a handle.
    pub async fn drive(&self, uuid: &DriveUuid) -> Result<Drive> {
        let record = self.get_drive(uuid).await?;
        Ok(Drive::from_record(self.clone(), record))
    }

    /// Request a drive clone and return the new drive record.
    pub async fn clone_drive(
        &self,
        uuid: &DriveUuid,
        params: &CloneParams,
        avoid: &AvoidList,
    ) -> Result<DriveRecord> {
        let id = uuid.require()?;
        let body = if params.is_empty() {
            None
        } else {
            Some(serde_json::to_vec(params)?)
        };
        let envelope: ListEnvelope<DriveRecord> = self
            .issue("drives", id, Action::Clone, avoid, body)
            .await?
            .json()?;
        envelope.objects.into_iter().next().ok_or_else(|| {
            Error::UnexpectedResponse("no drives in response from endpoint".into())
        })
    }

    /// Delete a drive.
    pub async fn remove_drive(&self, uuid: &DriveUuid) -> Result<()> {
        let id = uuid.require()?;
        self.execute(Request::delete(format!("drives/{id}/")), StatusCode::NO_CONTENT)
            .await?;
        info!(uuid = id, "drive removed");
        Ok(())
    }

    /// List jobs.
    pub async fn jobs(&self) -> Result<Vec<JobRecord>> {
        self.list("jobs/").await
    }

    /// Fetch a job record.
    pub async fn get_job(&self, uuid: &JobUuid) -> Result<JobRecord> {
        let id = uuid.require()?;
        self.get_json(&format!("jobs/{id}/")).await
    }

    /// Fetch a job as a handle.
    pub async fn job(&self, uuid: &JobUuid) -> Result<Job> {
        let record = self.get_job(uuid).await?;
        Ok(Job::from_record(self.clone(), record))
    }

    async fn issue(
        &self,
        collection: &str,
        id: &str,
        action: Action,
        avoid: &AvoidList,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        let mut query = QueryParams::new();
        query.push("do", action.as_str());
        avoid.encode_into(&mut query);

        let mut request = Request::post(format!("{collection}/{id}/action/")).with_query(query);
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.execute(request, action.accepted_status()).await?;
        if self.config.enable_logging {
            info!(collection, uuid = id, action = action.as_str(), "action accepted");
        }
        Ok(response)
    }

    async fn list<T>(&self, path: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let envelope: ListEnvelope<T> = self.get_json(path).await?;
        Ok(envelope.objects)
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.execute(Request::get(path), StatusCode::OK)
            .await?
            .json()
    }

    async fn execute(&self, request: Request, expected: StatusCode) -> Result<Response> {
        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.transport.send(request).await.map_err(|err| {
            if self.config.enable_logging && err.should_log() {
                warn!(%method, %path, code = err.error_code(), error = %err, "request failed");
            }
            err
        })?;
        if self.config.enable_logging {
            debug!(%method, %path, status = response.status.as_u16(), "response received");
        }

        response.expect_status(expected).map_err(|err| {
            if self.config.enable_logging {
                warn!(%method, %path, error = %err, "request rejected");
            }
            err
        })
    }
}

impl fmt::Debug for SigmaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigmaClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
