//! CloudSigma models shared by the client and the simulated backend.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sigma_core::ids::{DriveUuid, IpUuid, JobUuid, ServerUuid, VlanUuid};
use sigma_core::query::QueryParams;
use sigma_core::types::{DriveStatus, JobState, Media, ServerStatus, JOB_PROGRESS_COMPLETE};
use std::collections::BTreeMap;

/// API path prefix used when building resource URIs.
pub const API_PREFIX: &str = "/api/2.0/";

/// Link to another resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Server-assigned path of the resource.
    #[serde(rename = "resource_uri", default)]
    pub uri: String,
    /// Resource identifier.
    #[serde(default)]
    pub uuid: String,
}

impl Resource {
    /// Build a link for `uuid` inside `collection` (`servers`, `drives`, ...).
    #[must_use]
    pub fn new(collection: &str, uuid: impl Into<String>) -> Self {
        let uuid = uuid.into();
        Self {
            uri: format!("{API_PREFIX}{collection}/{uuid}/"),
            uuid,
        }
    }

    /// Link to a drive.
    #[must_use]
    pub fn drive(uuid: &DriveUuid) -> Self {
        Self::new("drives", uuid.as_str())
    }

    /// Link to a job.
    #[must_use]
    pub fn job(uuid: &JobUuid) -> Self {
        Self::new("jobs", uuid.as_str())
    }
}

/// Paging information of a list response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Page size.
    #[serde(default)]
    pub limit: u32,
    /// Page offset.
    #[serde(default)]
    pub offset: u32,
    /// Total number of objects.
    #[serde(default)]
    pub total_count: u32,
}

/// `{"meta": ..., "objects": [...]}` list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    /// Paging information.
    #[serde(default)]
    pub meta: Meta,
    /// Listed objects.
    #[serde(default = "Vec::new")]
    pub objects: Vec<T>,
}

impl<T> ListEnvelope<T> {
    /// Wrap a full (unpaged) list.
    #[must_use]
    pub fn new(objects: Vec<T>) -> Self {
        let total_count = u32::try_from(objects.len()).unwrap_or(u32::MAX);
        Self {
            meta: Meta {
                limit: 0,
                offset: 0,
                total_count,
            },
            objects,
        }
    }
}

/// Body of an accepted start/stop action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Action that was accepted.
    pub action: String,
    /// Always `success` for accepted actions.
    pub result: String,
    /// Target resource.
    pub uuid: String,
}

impl ActionResult {
    /// Successful result for `action` on `uuid`.
    #[must_use]
    pub fn success(action: Action, uuid: impl Into<String>) -> Self {
        Self {
            action: action.as_str().to_string(),
            result: "success".to_string(),
            uuid: uuid.into(),
        }
    }
}

/// State-changing verb sent to `{resource}/{uuid}/action/?do=...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Power on a server.
    Start,
    /// Power off a server.
    Stop,
    /// Copy a drive.
    Clone,
}

impl Action {
    /// Value of the `do` query parameter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Clone => "clone",
        }
    }

    /// Parse a `do` query parameter.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "clone" => Some(Self::Clone),
            _ => None,
        }
    }

    /// Status code the service answers with when it accepts the action.
    #[must_use]
    pub const fn accepted_status(&self) -> StatusCode {
        StatusCode::ACCEPTED
    }
}

/// Resources a start or clone should be placed away from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvoidList(Vec<String>);

impl AvoidList {
    /// Empty avoid list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a resource to avoid.
    #[must_use]
    pub fn with(mut self, uuid: impl Into<String>) -> Self {
        self.0.push(uuid.into());
        self
    }

    /// Listed identifiers.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// True when nothing is avoided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append as `avoid=u1,u2` to the query.
    pub fn encode_into(&self, query: &mut QueryParams) {
        query.push_list("avoid", &self.0);
    }
}

impl<S: Into<String>> FromIterator<S> for AvoidList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Overrides applied to a drive clone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneParams {
    /// Name of the new drive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Media of the new drive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    /// Storage affinities of the new drive.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affinities: Vec<String>,
}

impl CloneParams {
    /// Clone parameters setting only the name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the media type.
    #[must_use]
    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Add a storage affinity.
    #[must_use]
    pub fn with_affinity(mut self, affinity: impl Into<String>) -> Self {
        self.affinities.push(affinity.into());
        self
    }

    /// True when no override is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.as_deref().map_or(true, str::is_empty)
            && self.media.is_none()
            && self.affinities.is_empty()
    }
}

/// Drive attachment of a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedDrive {
    /// Boot order (1 boots first).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_order: Option<u32>,
    /// Device channel, e.g. `0:0`.
    #[serde(default)]
    pub dev_channel: String,
    /// Device model, e.g. `virtio`.
    #[serde(default)]
    pub device: String,
    /// Attached drive.
    pub drive: Resource,
}

impl AttachedDrive {
    /// Virtio boot disk on channel `0:0`.
    #[must_use]
    pub fn boot_disk(drive: &DriveUuid) -> Self {
        Self {
            boot_order: Some(1),
            dev_channel: "0:0".to_string(),
            device: "virtio".to_string(),
            drive: Resource::drive(drive),
        }
    }
}

/// IPv4 configuration of a NIC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpV4Conf {
    /// `dhcp`, `static` or `manual`.
    pub conf: String,
    /// Static address, when `conf` is `static`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Resource>,
}

/// Network interface card of a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicRecord {
    /// IPv4 configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_v4_conf: Option<IpV4Conf>,
    /// Virtual NIC model.
    #[serde(default)]
    pub model: String,
    /// MAC address.
    #[serde(default)]
    pub mac: String,
    /// Attached VLAN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<Resource>,
    /// Live network state; present only while the server runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeNic>,
}

/// Runtime view of a NIC on a running server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeNic {
    /// `public` or `private`.
    #[serde(default)]
    pub interface_type: String,
    /// Address the NIC holds right now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_v4: Option<Resource>,
}

impl RuntimeNic {
    /// Runtime state of a NIC on the public network.
    #[must_use]
    pub fn public(address: Option<&str>) -> Self {
        Self {
            interface_type: "public".to_string(),
            ip_v4: address.map(|ip| Resource::new("ips", ip)),
        }
    }

    /// Runtime state of a NIC on a private VLAN.
    #[must_use]
    pub fn private() -> Self {
        Self {
            interface_type: "private".to_string(),
            ip_v4: None,
        }
    }

    /// Network type; empty when the service did not report one.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.interface_type
    }

    /// Runtime IPv4 address, if any.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.ip_v4
            .as_ref()
            .map(|ip| ip.uuid.as_str())
            .filter(|ip| !ip.is_empty())
    }
}

impl std::fmt::Display for RuntimeNic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{type: {:?}, address: {:?}}}",
            self.kind(),
            self.address().unwrap_or_default()
        )
    }
}

/// How a NIC obtains its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NicKind {
    /// DHCP-configured public network.
    Dynamic,
    /// Static public address.
    Static,
    /// Private VLAN.
    Vlan,
    /// Anything else.
    Unknown,
}

impl NicKind {
    fn classify(conf: Option<&str>, vlan: Option<&Resource>) -> Self {
        match conf {
            Some("dhcp") => Self::Dynamic,
            Some("static") => Self::Static,
            _ if vlan.is_some_and(|v| !v.uuid.is_empty()) => Self::Vlan,
            _ => Self::Unknown,
        }
    }
}

impl NicRecord {
    /// Classify the NIC.
    #[must_use]
    pub fn kind(&self) -> NicKind {
        NicKind::classify(
            self.ip_v4_conf.as_ref().map(|c| c.conf.as_str()),
            self.vlan.as_ref(),
        )
    }

    /// Runtime IPv4 address of a running server's NIC.
    #[must_use]
    pub fn runtime_address(&self) -> Option<&str> {
        self.runtime.as_ref().and_then(RuntimeNic::address)
    }
}

/// Brief server record from `GET servers/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    /// Server identifier.
    pub uuid: ServerUuid,
    /// Server URI.
    #[serde(rename = "resource_uri", default)]
    pub uri: String,
    /// Server name.
    #[serde(default)]
    pub name: String,
    /// Current status.
    pub status: ServerStatus,
}

/// Full server record from `GET servers/{uuid}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Server identifier.
    pub uuid: ServerUuid,
    /// Server URI.
    #[serde(rename = "resource_uri", default)]
    pub uri: String,
    /// Server name.
    #[serde(default)]
    pub name: String,
    /// Current status.
    pub status: ServerStatus,
    /// CPU frequency in MHz.
    #[serde(default)]
    pub cpu: u64,
    /// Memory in bytes.
    #[serde(default)]
    pub mem: u64,
    /// VNC password.
    #[serde(default)]
    pub vnc_password: String,
    /// Metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Attached drives.
    #[serde(default)]
    pub drives: Vec<AttachedDrive>,
    /// Network interfaces.
    #[serde(default)]
    pub nics: Vec<NicRecord>,
    /// Server context enabled.
    #[serde(default)]
    pub context: bool,
}

impl ServerRecord {
    /// Minimal record in the `stopped` state.
    #[must_use]
    pub fn new(uuid: impl Into<ServerUuid>, name: impl Into<String>) -> Self {
        let uuid = uuid.into();
        Self {
            uri: Resource::new("servers", uuid.as_str()).uri,
            uuid,
            name: name.into(),
            status: ServerStatus::Stopped,
            cpu: 0,
            mem: 0,
            vnc_password: String::new(),
            meta: BTreeMap::new(),
            drives: Vec::new(),
            nics: Vec::new(),
            context: false,
        }
    }

    /// Replace the status.
    #[must_use]
    pub fn with_status(mut self, status: ServerStatus) -> Self {
        self.status = status;
        self
    }

    /// Brief view of the record.
    #[must_use]
    pub fn summary(&self) -> ServerSummary {
        ServerSummary {
            uuid: self.uuid.clone(),
            uri: self.uri.clone(),
            name: self.name.clone(),
            status: self.status.clone(),
        }
    }
}

/// Brief drive record from `GET drives/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveSummary {
    /// Drive identifier.
    pub uuid: DriveUuid,
    /// Drive URI.
    #[serde(rename = "resource_uri", default)]
    pub uri: String,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Resource>,
    /// Current status.
    pub status: DriveStatus,
}

/// Full drive record from `GET drives/{uuid}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveRecord {
    /// Drive identifier.
    pub uuid: DriveUuid,
    /// Drive URI.
    #[serde(rename = "resource_uri", default)]
    pub uri: String,
    /// Drive name.
    #[serde(default)]
    pub name: String,
    /// Current status.
    pub status: DriveStatus,
    /// Media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    /// Storage type, e.g. `dssd`.
    #[serde(default)]
    pub storage_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Resource>,
    /// Storage affinities.
    #[serde(default)]
    pub affinities: Vec<String>,
    /// Metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Jobs operating on this drive.
    #[serde(default)]
    pub jobs: Vec<Resource>,
}

impl DriveRecord {
    /// Minimal `unmounted` disk record.
    #[must_use]
    pub fn new(uuid: impl Into<DriveUuid>, name: impl Into<String>) -> Self {
        let uuid = uuid.into();
        Self {
            uri: Resource::drive(&uuid).uri,
            uuid,
            name: name.into(),
            status: DriveStatus::Unmounted,
            media: Some(Media::Disk),
            storage_type: String::new(),
            size: 0,
            owner: None,
            affinities: Vec::new(),
            meta: BTreeMap::new(),
            jobs: Vec::new(),
        }
    }

    /// Set the size in bytes.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Brief view of the record.
    #[must_use]
    pub fn summary(&self) -> DriveSummary {
        DriveSummary {
            uuid: self.uuid.clone(),
            uri: self.uri.clone(),
            owner: self.owner.clone(),
            status: self.status.clone(),
        }
    }
}

/// Job payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobData {
    /// Completion percentage, 0 to 100.
    #[serde(default)]
    pub progress: u8,
}

/// Job record from `GET jobs/{uuid}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub uuid: JobUuid,
    /// Job URI.
    #[serde(rename = "resource_uri", default)]
    pub uri: String,
    /// Operation the job performs, e.g. `drive_clone`.
    #[serde(default)]
    pub operation: String,
    /// Execution state.
    pub state: JobState,
    /// Progress payload.
    #[serde(default)]
    pub data: JobData,
    /// Sub-job identifiers.
    #[serde(default)]
    pub children: Vec<String>,
    /// Resources the job touches.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Placeholder for a job known only by reference; not yet fetched.
    #[must_use]
    pub fn pending(uuid: JobUuid) -> Self {
        Self {
            uri: Resource::job(&uuid).uri,
            uuid,
            operation: String::new(),
            state: JobState::Started,
            data: JobData::default(),
            children: Vec::new(),
            resources: Vec::new(),
            created: None,
            last_modified: None,
        }
    }

    /// True once progress reached 100.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.data.progress >= JOB_PROGRESS_COMPLETE
    }
}

/// IPv4 settings requested for a new NIC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpV4Spec {
    /// `dhcp`, `static` or `manual`.
    pub conf: String,
    /// Static address identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpUuid>,
}

/// NIC requested for a new server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicSpec {
    /// Virtual NIC model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Public network configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_v4_conf: Option<IpV4Spec>,
    /// Private VLAN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<VlanUuid>,
}

impl NicSpec {
    fn with_conf(conf: &str, ip: Option<IpUuid>) -> Self {
        Self {
            model: None,
            ip_v4_conf: Some(IpV4Spec {
                conf: conf.to_string(),
                ip,
            }),
            vlan: None,
        }
    }

    /// Public NIC configured by DHCP.
    #[must_use]
    pub fn dhcp() -> Self {
        Self::with_conf("dhcp", None)
    }

    /// Public NIC with a static address.
    #[must_use]
    pub fn static_ip(ip: IpUuid) -> Self {
        Self::with_conf("static", Some(ip))
    }

    /// Public NIC configured inside the guest.
    #[must_use]
    pub fn manual() -> Self {
        Self::with_conf("manual", None)
    }

    /// NIC on a private VLAN.
    #[must_use]
    pub fn vlan(vlan: VlanUuid) -> Self {
        Self {
            model: None,
            ip_v4_conf: None,
            vlan: Some(vlan),
        }
    }

    /// Set the NIC model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Parameters of a new server, posted to `servers/`.
///
/// Setters trim their input; an empty or zero value unsets the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerComponents {
    /// Server name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CPU frequency in MHz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u64>,
    /// Memory in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<u64>,
    /// VNC password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnc_password: Option<String>,
    /// Metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    /// Drives to attach.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drives: Vec<AttachedDrive>,
    /// NICs to create.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nics: Vec<NicSpec>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl ServerComponents {
    /// Empty component set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or unset the name.
    pub fn set_name(&mut self, name: &str) {
        self.name = non_empty(name);
    }

    /// Set or unset the CPU frequency in MHz.
    pub fn set_cpu(&mut self, mhz: u64) {
        self.cpu = (mhz != 0).then_some(mhz);
    }

    /// Set or unset the memory size in bytes.
    pub fn set_mem(&mut self, bytes: u64) {
        self.mem = (bytes != 0).then_some(bytes);
    }

    /// Set or unset the VNC password.
    pub fn set_vnc_password(&mut self, password: &str) {
        self.vnc_password = non_empty(password);
    }

    /// Set or unset the `description` metadata.
    pub fn set_description(&mut self, description: &str) {
        self.set_meta("description", description);
    }

    /// Set or unset the `ssh_public_key` metadata.
    pub fn set_ssh_public_key(&mut self, key: &str) {
        self.set_meta("ssh_public_key", key);
    }

    /// Set or unset a metadata entry.
    pub fn set_meta(&mut self, key: &str, value: &str) {
        match non_empty(value) {
            Some(value) => {
                self.meta.insert(key.to_string(), value);
            }
            None => {
                self.meta.remove(key);
            }
        }
    }

    /// Attach a drive.
    pub fn attach_drive(&mut self, drive: AttachedDrive) {
        self.drives.push(drive);
    }

    /// Attach a NIC.
    pub fn attach_nic(&mut self, nic: NicSpec) {
        self.nics.push(nic);
    }
}

/// Inputs of [`SigmaClient::create_server_from_template`](crate::SigmaClient::create_server_from_template).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTemplate {
    /// Name of the new server.
    pub name: String,
    /// CPU frequency in MHz.
    pub cpu: u64,
    /// Memory in bytes.
    pub mem: u64,
    /// Drive to clone as the boot disk.
    pub template_drive: DriveUuid,
    /// Name of the cloned drive.
    pub drive_name: String,
    /// Optional private VLAN for a second NIC.
    pub vlan: Option<VlanUuid>,
    /// VNC password.
    pub vnc_password: String,
    /// SSH public key stored in metadata.
    pub ssh_public_key: String,
    /// Description stored in metadata.
    pub description: String,
}

/// Server context as seen from inside the guest.
///
/// The guest reads this document from its context device; only the JSON shape
/// is modelled here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerContext {
    /// Server identifier.
    #[serde(default)]
    pub uuid: String,
    /// Server name.
    #[serde(default)]
    pub name: String,
    /// CPU frequency in MHz.
    #[serde(default)]
    pub cpu: u64,
    /// CPU model, when pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    /// Memory in bytes.
    #[serde(default)]
    pub mem: u64,
    /// VNC password.
    #[serde(default)]
    pub vnc_password: String,
    /// Metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Attached drives.
    #[serde(default)]
    pub drives: Vec<ContextDrive>,
    /// Network interfaces with their resolved settings.
    #[serde(default)]
    pub nics: Vec<ContextNic>,
}

impl ServerContext {
    /// Parse a context document.
    ///
    /// # Errors
    ///
    /// Returns a parse error when `json` is not a context document.
    pub fn from_json(json: &str) -> sigma_core::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Metadata value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}

/// Drive entry of a [`ServerContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDrive {
    /// Boot order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_order: Option<u32>,
    /// Controller channel.
    #[serde(default)]
    pub dev_channel: String,
    /// Device type.
    #[serde(default)]
    pub device: String,
}

/// NIC entry of a [`ServerContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNic {
    /// IPv4 settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_v4_conf: Option<ContextIpV4Conf>,
    /// MAC address.
    #[serde(default)]
    pub mac: String,
    /// Virtual NIC model.
    #[serde(default)]
    pub model: String,
    /// Attached VLAN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<Resource>,
}

impl ContextNic {
    /// Classify the NIC the same way as [`NicRecord::kind`].
    #[must_use]
    pub fn kind(&self) -> NicKind {
        NicKind::classify(
            self.ip_v4_conf.as_ref().map(|c| c.conf.as_str()),
            self.vlan.as_ref(),
        )
    }

    /// Resolved address settings, if the NIC has any.
    #[must_use]
    pub fn ip(&self) -> Option<&ContextIp> {
        self.ip_v4_conf.as_ref().map(|c| &c.ip)
    }
}

/// IPv4 settings of a [`ContextNic`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextIpV4Conf {
    /// `dhcp`, `static` or `manual`.
    #[serde(default)]
    pub conf: String,
    /// Resolved address.
    #[serde(default)]
    pub ip: ContextIp,
}

/// Address details resolved for a guest NIC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextIp {
    /// The address itself.
    #[serde(default)]
    pub uuid: String,
    /// Default gateway.
    #[serde(default)]
    pub gateway: String,
    /// Netmask length or dotted mask.
    #[serde(default, deserialize_with = "netmask_text")]
    pub netmask: String,
    /// DNS servers.
    #[serde(default)]
    pub nameservers: Vec<String>,
    /// Address metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// The service sends the netmask as a prefix length number or as text.
fn netmask_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(mask) => mask,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
