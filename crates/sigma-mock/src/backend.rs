//! Simulated CloudSigma backend.
//!
//! [`SimulatedBackend`] implements [`Transport`] in process. It answers the
//! same paths the client sends to the real API, accepts start/stop/clone
//! actions immediately and completes them after a configurable delay, which
//! is enough to exercise the client's wait and polling paths without a
//! network.
//!
//! State lives in three injected [`ResourceStore`]s, one per collection.
//! Handlers hold a collection lock for a single inspection or mutation;
//! delayed transitions take it again when they fire.
//!
//! ```ignore
//! let backend = SimulatedBackend::new();
//! backend.add_server(ServerRecord::new("u1", "web"));
//!
//! let client = backend.client();
//! let mut server = client.server(&"u1".into()).await?;
//! server.start_wait(&AvoidList::new()).await?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sigma_api::models::{
    Action, ActionResult, CloneParams, DriveRecord, IpV4Conf, JobRecord, ListEnvelope, NicKind,
    NicRecord, NicSpec, Resource, RuntimeNic, ServerComponents, ServerRecord,
};
use sigma_api::SigmaClient;
use sigma_core::client::ClientConfig;
use sigma_core::ids::{DriveUuid, JobUuid, ServerUuid};
use sigma_core::transport::{CORRELATION_HEADER, JSON_CONTENT_TYPE};
use sigma_core::types::{DriveStatus, JobState, Media, Recurse, ServerStatus, JOB_PROGRESS_COMPLETE};
use sigma_core::{Error, Request, Response, ServiceErrorPayload, Transport};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::journal::{Journal, JournalEntry};
use crate::scheduler::Scheduler;
use crate::store::{MemoryStore, ResourceStore};

/// Delay before an accepted action settles.
pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_millis(300);

/// Delay added to every request before it reaches a handler.
pub const DEFAULT_REQUEST_LATENCY: Duration = Duration::from_millis(50);

const START_DENIED: &str =
    "Cannot start guest in state \"started\". Guest should be in state \"stopped\"";
const STOP_DENIED: &str = "Cannot stop guest in state \"stopped\". Guest should be in state \"['started', 'running_legacy']\"";

/// Behaviour knobs of a [`SimulatedBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    /// Delay between accepting an action and its completion.
    pub transition_delay: Duration,
    /// Delay added to every request.
    pub request_latency: Duration,
    /// Emit a `drive_clone` job for every clone instead of completing it at once.
    pub clone_jobs: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            transition_delay: DEFAULT_TRANSITION_DELAY,
            request_latency: DEFAULT_REQUEST_LATENCY,
            clone_jobs: false,
        }
    }
}

impl BackendOptions {
    /// Set the transition delay.
    #[must_use]
    pub const fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = delay;
        self
    }

    /// Set the per-request latency.
    #[must_use]
    pub const fn with_request_latency(mut self, latency: Duration) -> Self {
        self.request_latency = latency;
        self
    }

    /// Enable or disable synthetic clone jobs.
    #[must_use]
    pub const fn with_clone_jobs(mut self, enabled: bool) -> Self {
        self.clone_jobs = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Servers,
    Drives,
    Jobs,
}

impl Collection {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "servers" => Some(Self::Servers),
            "drives" => Some(Self::Drives),
            "jobs" => Some(Self::Jobs),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Servers => "servers",
            Self::Drives => "drives",
            Self::Jobs => "jobs",
        }
    }

    /// Scheduler key of a resource; ids are only unique within a collection.
    fn key(self, uuid: &str) -> String {
        format!("{}/{uuid}", self.as_str())
    }
}

struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    fn json<T>(status: StatusCode, value: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, "backend", &e.to_string()),
        }
    }

    fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    fn error(status: StatusCode, error_type: &str, message: &str) -> Self {
        let payload = [ServiceErrorPayload::new(error_type, message)];
        Self {
            status,
            body: serde_json::to_string(&payload).unwrap_or_default(),
        }
    }

    fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, "notexist", "notfound")
    }

    fn bad_request(message: &str) -> Self {
        Self::error(StatusCode::BAD_REQUEST, "validation", message)
    }

    fn method_not_allowed(method: &Method) -> Self {
        Self::error(
            StatusCode::METHOD_NOT_ALLOWED,
            "notallowed",
            &format!("method {method} not allowed"),
        )
    }

    fn permission(message: &str) -> Self {
        Self::error(StatusCode::FORBIDDEN, "permission", message)
    }
}

fn parse_body<T>(body: Option<&Bytes>) -> Result<Option<T>, Reply>
where
    T: DeserializeOwned,
{
    match body {
        Some(bytes) if !bytes.is_empty() => serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| Reply::bad_request(&format!("invalid request body: {e}"))),
        _ => Ok(None),
    }
}

/// Live NIC state reported once a server runs.
fn runtime_for(nic: &NicRecord) -> Option<RuntimeNic> {
    match nic.kind() {
        NicKind::Dynamic => Some(RuntimeNic::public(None)),
        NicKind::Static => Some(RuntimeNic::public(
            nic.ip_v4_conf
                .as_ref()
                .and_then(|c| c.ip.as_ref())
                .map(|ip| ip.uuid.as_str()),
        )),
        NicKind::Vlan => Some(RuntimeNic::private()),
        NicKind::Unknown => None,
    }
}

fn parse_recurse(value: Option<&str>) -> Result<Recurse, Reply> {
    match value {
        None => Ok(Recurse::Nothing),
        Some(v) => [Recurse::AllDrives, Recurse::Disks, Recurse::Cdroms]
            .into_iter()
            .find(|r| r.as_query() == Some(v))
            .ok_or_else(|| Reply::bad_request(&format!("unknown recurse value: {v}"))),
    }
}

struct Inner {
    servers: Arc<dyn ResourceStore<ServerRecord>>,
    drives: Arc<dyn ResourceStore<DriveRecord>>,
    jobs: Arc<dyn ResourceStore<JobRecord>>,
    scheduler: Scheduler,
    journal: Journal,
    options: BackendOptions,
    mac_counter: AtomicU32,
}

/// In-process CloudSigma service.
///
/// Cloning yields another handle to the same state. Construction spawns the
/// transition and journal tasks, so it must happen inside a tokio runtime.
#[derive(Clone)]
pub struct SimulatedBackend {
    inner: Arc<Inner>,
}

impl SimulatedBackend {
    /// Backend with default options and in-memory stores.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(BackendOptions::default())
    }

    /// Backend with the given options and in-memory stores.
    #[must_use]
    pub fn with_options(options: BackendOptions) -> Self {
        Self::with_stores(
            options,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Backend over caller-provided stores.
    #[must_use]
    pub fn with_stores(
        options: BackendOptions,
        servers: Arc<dyn ResourceStore<ServerRecord>>,
        drives: Arc<dyn ResourceStore<DriveRecord>>,
        jobs: Arc<dyn ResourceStore<JobRecord>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                servers,
                drives,
                jobs,
                scheduler: Scheduler::spawn(),
                journal: Journal::spawn(),
                options,
                mac_counter: AtomicU32::new(1),
            }),
        }
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> &BackendOptions {
        &self.inner.options
    }

    /// Request journal of this backend.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.inner.journal
    }

    /// Client talking to this backend with default settings.
    #[must_use]
    pub fn client(&self) -> SigmaClient {
        self.client_with(ClientConfig::new())
    }

    /// Client talking to this backend with the given settings.
    #[must_use]
    pub fn client_with(&self, config: ClientConfig) -> SigmaClient {
        SigmaClient::from_transport(Arc::new(self.clone()), config)
    }

    /// Insert or replace a server.
    pub fn add_server(&self, record: ServerRecord) {
        let key = record.uuid.as_str().to_owned();
        self.inner.servers.put(&key, record);
    }

    /// Insert or replace a drive.
    pub fn add_drive(&self, record: DriveRecord) {
        let key = record.uuid.as_str().to_owned();
        self.inner.drives.put(&key, record);
    }

    /// Insert or replace a job.
    pub fn add_job(&self, record: JobRecord) {
        let key = record.uuid.as_str().to_owned();
        self.inner.jobs.put(&key, record);
    }

    /// Stored server, bypassing the request path.
    #[must_use]
    pub fn server(&self, uuid: &str) -> Option<ServerRecord> {
        self.inner.servers.get(uuid)
    }

    /// Stored drive, bypassing the request path.
    #[must_use]
    pub fn drive(&self, uuid: &str) -> Option<DriveRecord> {
        self.inner.drives.get(uuid)
    }

    /// Stored job, bypassing the request path.
    #[must_use]
    pub fn job(&self, uuid: &str) -> Option<JobRecord> {
        self.inner.jobs.get(uuid)
    }

    /// Change a server's status out of band; false when absent.
    pub fn set_server_status(&self, uuid: &str, status: ServerStatus) -> bool {
        self.inner
            .servers
            .modify(uuid, &mut |server| server.status = status.clone())
    }

    /// Change a drive's status out of band; false when absent.
    pub fn set_drive_status(&self, uuid: &str, status: DriveStatus) -> bool {
        self.inner
            .drives
            .modify(uuid, &mut |drive| drive.status = status.clone())
    }

    /// Set a job's progress; reaching 100 also marks it `success`.
    pub fn set_job_progress(&self, uuid: &str, progress: u8) -> bool {
        self.inner.jobs.modify(uuid, &mut |job| {
            job.data.progress = progress.min(JOB_PROGRESS_COMPLETE);
            if job.is_complete() {
                job.state = JobState::Success;
            }
            job.last_modified = Some(Utc::now());
        })
    }

    /// Delete a server and cancel its pending transitions.
    pub fn remove_server(&self, uuid: &str) -> Option<ServerRecord> {
        self.inner.scheduler.cancel(&Collection::Servers.key(uuid));
        self.inner.servers.delete(uuid)
    }

    /// Delete a drive and cancel its pending transitions.
    pub fn remove_drive(&self, uuid: &str) -> Option<DriveRecord> {
        self.inner.scheduler.cancel(&Collection::Drives.key(uuid));
        self.inner.drives.delete(uuid)
    }

    /// Delete a job and cancel its pending completion.
    pub fn remove_job(&self, uuid: &str) -> Option<JobRecord> {
        self.inner.scheduler.cancel(&Collection::Jobs.key(uuid));
        self.inner.jobs.delete(uuid)
    }

    /// Drop all resources, pending transitions and journal entries.
    pub fn reset(&self) {
        self.inner.scheduler.cancel_all();
        self.inner.servers.clear();
        self.inner.drives.clear();
        self.inner.jobs.clear();
        self.inner.journal.clear();
    }

    /// Number of transitions not yet applied.
    pub async fn pending_transitions(&self) -> usize {
        self.inner.scheduler.pending().await
    }

    fn route(&self, request: &Request) -> (String, Reply) {
        let segments: Vec<&str> = request
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some((first, rest)) = segments.split_first() else {
            return ("unknown".to_string(), Reply::not_found());
        };
        let Some(collection) = Collection::parse(first) else {
            return ("unknown".to_string(), Reply::not_found());
        };

        let (operation, reply) = match rest {
            [] => self.route_collection(collection, request),
            ["detail"] => self.route_detail(collection, request),
            [uuid, "action"] => self.route_action(collection, uuid, request),
            [uuid] => self.route_resource(collection, uuid, request),
            _ => ("unknown", Reply::not_found()),
        };
        (format!("{}.{operation}", collection.as_str()), reply)
    }

    fn route_collection(&self, collection: Collection, request: &Request) -> (&'static str, Reply) {
        if request.method == Method::GET {
            ("list", self.list(collection, false))
        } else if request.method == Method::POST && collection == Collection::Servers {
            ("create", self.create_server(request.body.as_ref()))
        } else {
            ("list", Reply::method_not_allowed(&request.method))
        }
    }

    fn route_detail(&self, collection: Collection, request: &Request) -> (&'static str, Reply) {
        if request.method == Method::GET {
            ("detail", self.list(collection, true))
        } else {
            ("detail", Reply::method_not_allowed(&request.method))
        }
    }

    fn route_resource(
        &self,
        collection: Collection,
        uuid: &str,
        request: &Request,
    ) -> (&'static str, Reply) {
        if request.method == Method::GET {
            return ("get", self.get(collection, uuid));
        }
        if request.method == Method::DELETE {
            let reply = match collection {
                Collection::Servers => self.delete_server(uuid, request.query.get("recurse")),
                Collection::Drives => self.delete_drive(uuid),
                Collection::Jobs => Reply::method_not_allowed(&request.method),
            };
            return ("delete", reply);
        }
        ("get", Reply::method_not_allowed(&request.method))
    }

    fn route_action(
        &self,
        collection: Collection,
        uuid: &str,
        request: &Request,
    ) -> (&'static str, Reply) {
        if request.method != Method::POST || collection == Collection::Jobs {
            return ("action", Reply::method_not_allowed(&request.method));
        }
        let Some(verb) = request.query.get("do") else {
            return ("action", Reply::bad_request("missing action"));
        };

        match (collection, Action::parse(verb)) {
            (Collection::Servers, Some(Action::Start)) => ("start", self.server_action(uuid, Action::Start)),
            (Collection::Servers, Some(Action::Stop)) => ("stop", self.server_action(uuid, Action::Stop)),
            (Collection::Drives, Some(Action::Clone)) => {
                ("clone", self.clone_drive(uuid, request.body.as_ref()))
            }
            _ => (
                "action",
                Reply::bad_request(&format!("unsupported action: {verb}")),
            ),
        }
    }

    fn list(&self, collection: Collection, detail: bool) -> Reply {
        match collection {
            Collection::Servers if detail => {
                Reply::json(StatusCode::OK, &ListEnvelope::new(self.inner.servers.list()))
            }
            Collection::Servers => {
                let brief: Vec<_> = self
                    .inner
                    .servers
                    .list()
                    .iter()
                    .map(ServerRecord::summary)
                    .collect();
                Reply::json(StatusCode::OK, &ListEnvelope::new(brief))
            }
            Collection::Drives if detail => {
                Reply::json(StatusCode::OK, &ListEnvelope::new(self.inner.drives.list()))
            }
            Collection::Drives => {
                let brief: Vec<_> = self
                    .inner
                    .drives
                    .list()
                    .iter()
                    .map(DriveRecord::summary)
                    .collect();
                Reply::json(StatusCode::OK, &ListEnvelope::new(brief))
            }
            Collection::Jobs => Reply::json(StatusCode::OK, &ListEnvelope::new(self.inner.jobs.list())),
        }
    }

    fn get(&self, collection: Collection, uuid: &str) -> Reply {
        let found = match collection {
            Collection::Servers => self.inner.servers.get(uuid).map(|r| Reply::json(StatusCode::OK, &r)),
            Collection::Drives => self.inner.drives.get(uuid).map(|r| Reply::json(StatusCode::OK, &r)),
            Collection::Jobs => self.inner.jobs.get(uuid).map(|r| Reply::json(StatusCode::OK, &r)),
        };
        found.unwrap_or_else(Reply::not_found)
    }

    fn server_action(&self, uuid: &str, action: Action) -> Reply {
        let (allowed, transient, denied): (fn(&ServerStatus) -> bool, _, _) = match action {
            Action::Start => (ServerStatus::is_stopped, ServerStatus::Starting, START_DENIED),
            _ => (ServerStatus::is_running, ServerStatus::Stopping, STOP_DENIED),
        };

        let mut accepted = false;
        let found = self.inner.servers.modify(uuid, &mut |server| {
            accepted = allowed(&server.status);
            if accepted {
                server.status = transient.clone();
            }
        });
        if !found {
            return Reply::not_found();
        }
        if !accepted {
            return Reply::permission(denied);
        }

        let Some(settled) = transient.settled() else {
            return Reply::error(StatusCode::INTERNAL_SERVER_ERROR, "backend", "no settled state");
        };
        let servers = Arc::clone(&self.inner.servers);
        let target = uuid.to_string();
        self.inner
            .scheduler
            .schedule(Collection::Servers.key(uuid), self.inner.options.transition_delay, move || {
                servers.modify(&target, &mut |server| {
                    server.status = settled.clone();
                    let running = server.status.is_running();
                    for nic in &mut server.nics {
                        nic.runtime = if running { runtime_for(nic) } else { None };
                    }
                });
            });

        info!(uuid, action = action.as_str(), "server action accepted");
        Reply::json(action.accepted_status(), &ActionResult::success(action, uuid))
    }

    fn clone_drive(&self, uuid: &str, body: Option<&Bytes>) -> Reply {
        let params: CloneParams = match parse_body(body) {
            Ok(params) => params.unwrap_or_default(),
            Err(reply) => return reply,
        };
        let Some(source) = self.inner.drives.get(uuid) else {
            return Reply::not_found();
        };

        let id = DriveUuid::new_v4();
        let mut clone = DriveRecord {
            uri: Resource::drive(&id).uri,
            uuid: id,
            status: DriveStatus::Unmounted,
            jobs: Vec::new(),
            ..source
        };
        if let Some(name) = params.name {
            clone.name = name;
        }
        if let Some(media) = params.media {
            clone.media = Some(media);
        }
        if !params.affinities.is_empty() {
            clone.affinities = params.affinities;
        }

        if self.inner.options.clone_jobs {
            let job = self.clone_job(&clone, uuid);
            clone.status = DriveStatus::CloningDst;
            clone.jobs = vec![Resource::job(&job.uuid)];
            let key = job.uuid.as_str().to_owned();
            self.inner.jobs.put(&key, job);
        }
        self.inner.drives.put(clone.uuid.as_str(), clone.clone());

        info!(source = uuid, clone = %clone.uuid, "drive clone accepted");
        Reply::json(
            Action::Clone.accepted_status(),
            &ListEnvelope::new(vec![clone]),
        )
    }

    /// Job record for a clone, completed after the transition delay.
    fn clone_job(&self, clone: &DriveRecord, source: &str) -> JobRecord {
        let now = Utc::now();
        let job = JobRecord {
            operation: "drive_clone".to_string(),
            resources: vec![clone.uri.clone(), Resource::new("drives", source).uri],
            created: Some(now),
            last_modified: Some(now),
            ..JobRecord::pending(JobUuid::new_v4())
        };

        let jobs = Arc::clone(&self.inner.jobs);
        let drives = Arc::clone(&self.inner.drives);
        let job_id = job.uuid.as_str().to_string();
        let drive_id = clone.uuid.as_str().to_string();
        self.inner
            .scheduler
            .schedule(Collection::Jobs.key(&job_id), self.inner.options.transition_delay, move || {
                drives.modify(&drive_id, &mut |drive| drive.status = DriveStatus::Unmounted);
                jobs.modify(&job_id, &mut |job| {
                    job.state = JobState::Success;
                    job.data.progress = JOB_PROGRESS_COMPLETE;
                    job.last_modified = Some(Utc::now());
                });
            });
        job
    }

    fn delete_server(&self, uuid: &str, recurse: Option<&str>) -> Reply {
        let recurse = match parse_recurse(recurse) {
            Ok(recurse) => recurse,
            Err(reply) => return reply,
        };
        let Some(server) = self.inner.servers.delete(uuid) else {
            return Reply::not_found();
        };
        self.inner.scheduler.cancel(&Collection::Servers.key(uuid));

        let wanted = |media: Option<Media>| match recurse {
            Recurse::Nothing => false,
            Recurse::AllDrives => true,
            Recurse::Disks => media == Some(Media::Disk),
            Recurse::Cdroms => media == Some(Media::Cdrom),
        };
        for attached in &server.drives {
            let id = attached.drive.uuid.as_str();
            if self.inner.drives.get(id).is_some_and(|d| wanted(d.media)) {
                self.inner.drives.delete(id);
                self.inner.scheduler.cancel(&Collection::Drives.key(id));
                debug!(server = uuid, drive = id, "attached drive removed");
            }
        }
        Reply::empty(StatusCode::NO_CONTENT)
    }

    fn delete_drive(&self, uuid: &str) -> Reply {
        if self.inner.drives.delete(uuid).is_none() {
            return Reply::not_found();
        }
        self.inner.scheduler.cancel(&Collection::Drives.key(uuid));
        Reply::empty(StatusCode::NO_CONTENT)
    }

    fn create_server(&self, body: Option<&Bytes>) -> Reply {
        let components: ServerComponents = match parse_body(body) {
            Ok(Some(components)) => components,
            Ok(None) => return Reply::bad_request("missing request body"),
            Err(reply) => return reply,
        };
        if let Some(missing) = components
            .drives
            .iter()
            .find(|d| self.inner.drives.get(&d.drive.uuid).is_none())
        {
            return Reply::bad_request(&format!("drive {} does not exist", missing.drive.uuid));
        }

        let mut record = ServerRecord::new(ServerUuid::new_v4(), components.name.unwrap_or_default());
        record.cpu = components.cpu.unwrap_or_default();
        record.mem = components.mem.unwrap_or_default();
        record.vnc_password = components.vnc_password.unwrap_or_default();
        record.meta = components.meta;
        record.drives = components.drives;
        record.nics = components
            .nics
            .into_iter()
            .map(|nic| self.nic_record(nic))
            .collect();
        self.inner.servers.put(record.uuid.as_str(), record.clone());

        info!(uuid = %record.uuid, name = %record.name, "server created");
        Reply::json(StatusCode::CREATED, &ListEnvelope::new(vec![record]))
    }

    fn nic_record(&self, nic: NicSpec) -> NicRecord {
        let n = self.inner.mac_counter.fetch_add(1, Ordering::Relaxed).to_be_bytes();
        NicRecord {
            ip_v4_conf: nic.ip_v4_conf.map(|conf| IpV4Conf {
                conf: conf.conf,
                ip: conf.ip.map(|ip| Resource::new("ips", ip.as_str())),
            }),
            model: nic.model.unwrap_or_default(),
            mac: format!("22:40:{:02x}:{:02x}:{:02x}:{:02x}", n[0], n[1], n[2], n[3]),
            vlan: nic.vlan.map(|vlan| Resource::new("vlans", vlan.as_str())),
            runtime: None,
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBackend")
            .field("options", &self.inner.options)
            .field("servers", &self.inner.servers.len())
            .field("drives", &self.inner.drives.len())
            .field("jobs", &self.inner.jobs.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for SimulatedBackend {
    async fn send(&self, request: Request) -> sigma_core::Result<Response> {
        let latency = self.inner.options.request_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let id = request
            .correlation_id()
            .map_or_else(|| self.inner.journal.next_id(), str::to_string);
        let (section, reply) = self.route(&request);
        debug!(
            %id,
            %section,
            method = %request.method,
            path = %request.path,
            status = reply.status.as_u16(),
            "simulated request"
        );

        self.inner.journal.record(JournalEntry {
            id: id.clone(),
            section,
            method: request.method.to_string(),
            path: request.path.clone(),
            query: request
                .query
                .as_pairs()
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            request_body: request
                .body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            status: reply.status.as_u16(),
            response_body: reply.body.clone(),
            recorded_at: Utc::now(),
        });

        let header = HeaderValue::from_str(&id)
            .map_err(|e| Error::Transport(format!("invalid correlation id {id:?}: {e}")))?;
        let has_body = !reply.body.is_empty();
        let mut response = Response::new(reply.status, reply.body);
        response.headers.insert(CORRELATION_HEADER, header);
        if has_body {
            response
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
        Ok(response)
    }
}
