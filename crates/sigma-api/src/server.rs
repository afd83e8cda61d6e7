//! Server handle.
//!
//! A [`Server`] owns a snapshot of one server record. Actions are sent
//! regardless of the snapshot's status; the service decides whether they are
//! valid. `*_wait` variants block until the refreshed status settles.

use crate::client::SigmaClient;
use crate::models::{ActionResult, AttachedDrive, AvoidList, NicRecord, ServerRecord};
use crate::Result;
use async_trait::async_trait;
use sigma_core::ids::ServerUuid;
use sigma_core::types::{Recurse, ServerStatus};
use sigma_core::{wait_for, Observe, WaitOptions};
use std::fmt;
use tracing::info;

/// Handle to a server instance.
pub struct Server {
    client: SigmaClient,
    obj: ServerRecord,
}

impl Server {
    pub(crate) fn from_record(client: SigmaClient, obj: ServerRecord) -> Self {
        Self { client, obj }
    }

    /// Server identifier.
    #[must_use]
    pub fn uuid(&self) -> &ServerUuid {
        &self.obj.uuid
    }

    /// Server URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.obj.uri
    }

    /// Server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.obj.name
    }

    /// Status as of the last refresh.
    #[must_use]
    pub fn status(&self) -> &ServerStatus {
        &self.obj.status
    }

    /// CPU frequency in MHz.
    #[must_use]
    pub fn cpu(&self) -> u64 {
        self.obj.cpu
    }

    /// Memory in bytes.
    #[must_use]
    pub fn mem(&self) -> u64 {
        self.obj.mem
    }

    /// VNC password.
    #[must_use]
    pub fn vnc_password(&self) -> &str {
        &self.obj.vnc_password
    }

    /// Server context flag.
    #[must_use]
    pub fn context(&self) -> bool {
        self.obj.context
    }

    /// Metadata value.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.obj.meta.get(key).map(String::as_str)
    }

    /// Attached drives.
    #[must_use]
    pub fn drives(&self) -> &[AttachedDrive] {
        &self.obj.drives
    }

    /// Network interfaces.
    #[must_use]
    pub fn nics(&self) -> &[NicRecord] {
        &self.obj.nics
    }

    /// Current snapshot.
    #[must_use]
    pub fn record(&self) -> &ServerRecord {
        &self.obj
    }

    /// Replace the snapshot with a freshly fetched record.
    pub async fn refresh(&mut self) -> Result<()> {
        self.obj = self.client.get_server(&self.obj.uuid).await?;
        Ok(())
    }

    /// Fetch an independent handle to the same server.
    pub async fn refetch(&self) -> Result<Self> {
        self.client.server(&self.obj.uuid).await
    }

    /// Request a start, placing the server away from `avoid`.
    pub async fn start(&self, avoid: &AvoidList) -> Result<ActionResult> {
        self.client.start_server(&self.obj.uuid, avoid).await
    }

    /// Request a stop.
    pub async fn stop(&self) -> Result<ActionResult> {
        self.client.stop_server(&self.obj.uuid).await
    }

    /// Start and wait for `running` within the client's operation timeout.
    pub async fn start_wait(&mut self, avoid: &AvoidList) -> Result<()> {
        self.start(avoid).await?;
        let options = self.client.wait_options();
        self.wait_status(ServerStatus::Running, options).await
    }

    /// Stop and wait for `stopped` within the client's operation timeout.
    pub async fn stop_wait(&mut self) -> Result<()> {
        self.stop().await?;
        let options = self.client.wait_options();
        self.wait_status(ServerStatus::Stopped, options).await
    }

    /// Refresh until the status equals `target`.
    pub async fn wait_status(&mut self, target: ServerStatus, options: WaitOptions) -> Result<()> {
        wait_for(self, |status: &ServerStatus| *status == target, options).await?;
        info!(uuid = %self.obj.uuid, status = %self.obj.status, "server settled");
        Ok(())
    }

    /// Delete the server.
    pub async fn remove(self, recurse: Recurse) -> Result<()> {
        self.client.remove_server(&self.obj.uuid, recurse).await
    }
}

#[async_trait]
impl Observe for Server {
    type State = ServerStatus;

    async fn observe(&mut self) -> Result<ServerStatus> {
        self.refresh().await?;
        Ok(self.obj.status.clone())
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("obj", &self.obj).finish_non_exhaustive()
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Name: {:?}\nURI: {:?}\nStatus: {}\nUUID: {:?}}}",
            self.obj.name, self.obj.uri, self.obj.status, self.obj.uuid.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use sigma_core::client::ClientConfig;
    use sigma_core::{Error, Request, Response, Transport};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    mockall::mock! {
        Api {}

        #[async_trait]
        impl Transport for Api {
            async fn send(&self, request: Request) -> sigma_core::Result<Response>;
        }
    }

    fn server_body(status: &str) -> String {
        format!(
            r#"{{"uuid":"u1","resource_uri":"/api/2.0/servers/u1/","name":"web","status":"{status}"}}"#
        )
    }

    fn handle(api: MockApi, timeout: Duration) -> Server {
        let config = ClientConfig::new().with_operation_timeout(timeout);
        let client = SigmaClient::from_transport(Arc::new(api), config);
        let record: ServerRecord = serde_json::from_str(&server_body("stopped")).unwrap();
        Server::from_record(client, record)
    }

    #[tokio::test]
    async fn start_wait_polls_until_running() {
        let mut api = MockApi::new();
        api.expect_send()
            .withf(|r: &Request| r.path == "servers/u1/action/" && r.query.get("do") == Some("start"))
            .times(1)
            .returning(|_| {
                Ok(Response::new(
                    StatusCode::ACCEPTED,
                    r#"{"action":"start","result":"success","uuid":"u1"}"#,
                ))
            });
        let polls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&polls);
        api.expect_send()
            .withf(|r: &Request| r.path == "servers/u1/")
            .returning(move |_| {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                let status = if n < 3 { "starting" } else { "running" };
                Ok(Response::new(StatusCode::OK, server_body(status)))
            });

        let mut server = handle(api, Duration::from_secs(5));
        server.start_wait(&AvoidList::new()).await.unwrap();
        assert_eq!(server.status(), &ServerStatus::Running);
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn stop_is_sent_despite_stale_snapshot() {
        let mut api = MockApi::new();
        api.expect_send().times(1).returning(|_| {
            Ok(Response::new(
                StatusCode::FORBIDDEN,
                r#"[{"error_point":null,"error_type":"permission","error_message":"Cannot stop guest"}]"#,
            ))
        });

        // Snapshot says stopped; the request still goes out.
        let server = handle(api, Duration::from_secs(5));
        let err = server.stop().await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.service_error_type(), Some("permission"));
    }

    #[tokio::test]
    async fn refresh_failure_aborts_wait() {
        let mut api = MockApi::new();
        api.expect_send()
            .times(1)
            .returning(|_| Err(Error::Transport("connection refused".into())));

        let mut server = handle(api, Duration::from_secs(5));
        let err = server
            .wait_status(ServerStatus::Running, WaitOptions::new(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn wait_times_out_when_status_never_settles() {
        let mut api = MockApi::new();
        api.expect_send().returning(|_| {
            Ok(Response::new(StatusCode::OK, server_body("starting")))
        });

        let mut server = handle(api, Duration::from_secs(5));
        let options =
            WaitOptions::new(Duration::from_millis(50)).with_poll_interval(Duration::from_millis(5));
        let err = server
            .wait_status(ServerStatus::Running, options)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(server.status(), &ServerStatus::Starting);
    }

    #[test]
    fn display_lists_identity() {
        let server = handle(MockApi::new(), Duration::ZERO);
        let text = server.to_string();
        assert!(text.contains("\"web\""));
        assert!(text.contains("Status: stopped"));
        assert_eq!(server.meta("missing"), None);
    }
}
