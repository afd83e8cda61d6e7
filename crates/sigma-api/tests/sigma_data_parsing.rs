//! Integration tests for parsing CloudSigma response data.
//!
//! These tests validate that the sigma-api models can correctly deserialize
//! recorded API responses, including fields the models do not know about.

use sigma_api::models::{
    DriveRecord, JobRecord, ListEnvelope, NicKind, ServerContext, ServerRecord,
};
use sigma_core::types::{DriveStatus, JobState, Media, ServerStatus};
use std::fs;
use std::path::PathBuf;

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_fixture(name: &str) -> String {
    let fixture_path = fixtures_dir().join(name);
    fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

#[test]
fn test_deserialize_server_detail() {
    let json_data = load_fixture("server_detail.json");
    let server: ServerRecord = serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize server: {}\nJSON: {}", e, json_data));

    assert_eq!(server.uuid.as_str(), "472835d5-2bbb-4d87-9d08-7364bc373691");
    assert_eq!(server.name, "trusty-server-cloudimg-amd64");
    assert_eq!(server.status, ServerStatus::Starting);
    assert_eq!(server.cpu, 2000);
    assert_eq!(server.mem, 2_147_483_648);
    assert_eq!(server.vnc_password, "Pim3UkEc");
    assert!(server.context);
    assert_eq!(
        server.meta.get("description").map(String::as_str),
        Some("trusty-server-cloudimg-amd64")
    );
}

#[test]
fn test_server_drives_and_nics() {
    let server: ServerRecord =
        serde_json::from_str(&load_fixture("server_detail.json")).unwrap();

    assert_eq!(server.drives.len(), 1);
    let drive = &server.drives[0];
    assert_eq!(drive.boot_order, Some(1));
    assert_eq!(drive.dev_channel, "0:0");
    assert_eq!(drive.device, "virtio");
    assert_eq!(drive.drive.uuid, "ddce5beb-6cfe-4a80-81bd-3ae5f71e0c00");

    assert_eq!(server.nics.len(), 2);
    let public = &server.nics[0];
    assert_eq!(public.kind(), NicKind::Static);
    assert_eq!(public.mac, "22:40:85:4f:d3:ce");
    let ip = public.ip_v4_conf.as_ref().and_then(|c| c.ip.as_ref()).unwrap();
    assert_eq!(ip.uuid, "31.171.246.37");

    let private = &server.nics[1];
    assert_eq!(private.kind(), NicKind::Vlan);
    assert_eq!(
        private.vlan.as_ref().map(|v| v.uuid.as_str()),
        Some("5bc05e7e-6555-4f40-add8-3b8e91447702")
    );
}

#[test]
fn test_deserialize_drives_detail() {
    let json_data = load_fixture("drives_detail.json");
    let envelope: ListEnvelope<DriveRecord> = serde_json::from_str(&json_data).unwrap();

    assert_eq!(envelope.meta.total_count, 2);
    assert_eq!(envelope.objects.len(), 2);

    let disk = &envelope.objects[0];
    assert_eq!(disk.name, "test_drive_2");
    assert_eq!(disk.status, DriveStatus::Unmounted);
    assert_eq!(disk.media, Some(Media::Disk));
    assert_eq!(disk.storage_type, "dssd");
    assert_eq!(disk.size, 1_073_741_824);
    assert!(disk.jobs.is_empty());
    assert_eq!(
        disk.owner.as_ref().map(|o| o.uuid.as_str()),
        Some("80cb30fb-0ea3-43db-b27b-a125752cc0bf")
    );

    let cloning = &envelope.objects[1];
    assert_eq!(cloning.status, DriveStatus::CloningDst);
    assert!(cloning.status.is_transient());
    assert_eq!(cloning.media, Some(Media::Cdrom));
    assert_eq!(cloning.affinities, vec!["ssd".to_string()]);
    assert_eq!(cloning.jobs.len(), 1);
    assert_eq!(cloning.jobs[0].uuid, "fbc8a6c6-3e8a-4b39-91c1-5b4a5fd0b4e0");
}

#[test]
fn test_deserialize_job() {
    let job: JobRecord = serde_json::from_str(&load_fixture("job.json")).unwrap();

    assert_eq!(job.operation, "drive_clone");
    assert_eq!(job.state, JobState::Success);
    assert!(job.is_complete());
    assert_eq!(job.children.len(), 1);
    assert_eq!(
        job.resources,
        vec!["/api/2.0/drives/e15dd971-3ef8-497c-9f92-90d5ca1722bd/".to_string()]
    );

    let created = job.created.unwrap();
    let modified = job.last_modified.unwrap();
    assert!(modified > created);
    assert_eq!(created.to_rfc3339(), "2014-03-05T12:13:46+00:00");
}

#[test]
fn test_server_record_serialization_roundtrip_keeps_status_text() {
    let mut server: ServerRecord =
        serde_json::from_str(&load_fixture("server_detail.json")).unwrap();
    server.status = ServerStatus::from("running_legacy");

    let value = serde_json::to_value(&server).unwrap();
    assert_eq!(value["status"], "running_legacy");
    assert_eq!(value["resource_uri"], server.uri);
}

#[test]
fn test_running_server_nics_report_runtime() {
    let server: ServerRecord =
        serde_json::from_str(&load_fixture("server_running.json")).unwrap();
    assert_eq!(server.status, ServerStatus::Running);

    let public = server.nics[0].runtime.as_ref().unwrap();
    assert_eq!(public.kind(), "public");
    assert_eq!(public.address(), Some("31.171.246.37"));
    assert_eq!(server.nics[0].runtime_address(), Some("31.171.246.37"));

    let private = server.nics[1].runtime.as_ref().unwrap();
    assert_eq!(private.kind(), "private");
    assert_eq!(private.address(), None);
}

#[test]
fn test_stopped_server_nics_have_no_runtime() {
    let server: ServerRecord =
        serde_json::from_str(&load_fixture("server_detail.json")).unwrap();
    assert!(server.nics.iter().all(|nic| nic.runtime.is_none()));
}

#[test]
fn test_deserialize_server_context() {
    let context = ServerContext::from_json(&load_fixture("server_context.json"))
        .unwrap_or_else(|e| panic!("Failed to parse context: {}", e));

    assert_eq!(context.uuid, "472835d5-2bbb-4d87-9d08-7364bc373691");
    assert_eq!(context.name, "trusty-server-cloudimg-amd64");
    assert_eq!(context.cpu, 2000);
    assert_eq!(context.mem, 2_147_483_648);
    assert_eq!(context.vnc_password, "Pim3UkEc");
    assert!(context.cpu_model.is_none());
    assert_eq!(context.get("description"), Some("trusty-server-cloudimg-amd64"));
    assert_eq!(context.get("missing"), None);
    assert_eq!(context.drives[0].boot_order, Some(1));
    assert_eq!(context.drives[0].device, "virtio");
}

#[test]
fn test_server_context_nics() {
    let context = ServerContext::from_json(&load_fixture("server_context.json")).unwrap();
    assert_eq!(context.nics.len(), 2);

    let public = &context.nics[0];
    assert_eq!(public.kind(), NicKind::Static);
    assert_eq!(public.mac, "22:40:85:4f:d3:ce");
    let ip = public.ip().unwrap();
    assert_eq!(ip.uuid, "31.171.246.37");
    assert_eq!(ip.gateway, "31.171.246.1");
    assert_eq!(ip.netmask, "22");
    assert_eq!(ip.nameservers, vec!["178.22.66.167", "178.22.71.56", "8.8.8.8"]);

    let private = &context.nics[1];
    assert_eq!(private.kind(), NicKind::Vlan);
    assert!(private.ip().is_none());
    assert_eq!(
        private.vlan.as_ref().map(|v| v.uuid.as_str()),
        Some("5bc05e7e-6555-4f40-add8-3b8e91447702")
    );
}
