//! Unit tests for the fleet reconciler.

use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::api::PowerAction;
use crate::test_support::{ApiCall, ScriptedApi, server};

fn fleet(api: ScriptedApi) -> Fleet<ScriptedApi> {
    Fleet::new(api).with_poll_interval(Duration::from_millis(1))
}

fn spec(name: &str) -> ServerSpec {
    ServerSpec::builder()
        .name(name)
        .commercial_type("DEV1-S")
        .image_id("img-1")
        .build()
        .expect("spec should be valid")
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|&name| name.to_owned()).collect()
}

#[tokio::test]
async fn ensure_created_skips_existing_names() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Running, &[]));

    let reports = fleet(api.clone())
        .ensure_created(&[spec("a"), spec("b")])
        .await
        .expect("ensure_created should succeed");

    let creates = api.count_calls(|call| matches!(call, ApiCall::CreateServer { .. }));
    assert_eq!(creates, 1);
    assert!(api.calls().contains(&ApiCall::CreateServer {
        name: String::from("b")
    }));
    assert!(matches!(
        reports.as_slice(),
        [
            CreateReport {
                outcome: CreateOutcome::AlreadyExists,
                ..
            },
            CreateReport {
                outcome: CreateOutcome::Created,
                ..
            },
        ]
    ));
}

#[tokio::test]
async fn ensure_created_issues_nothing_when_all_present() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Stopped, &[]));
    api.add_server(server("srv-b", "b", ServerState::Running, &[]));

    let reports = fleet(api.clone())
        .ensure_created(&[spec("a"), spec("b")])
        .await
        .expect("ensure_created should succeed");

    assert_eq!(
        api.count_calls(|call| matches!(call, ApiCall::CreateServer { .. })),
        0
    );
    assert!(
        reports
            .iter()
            .all(|report| matches!(report.outcome, CreateOutcome::AlreadyExists))
    );
}

#[tokio::test]
async fn ensure_created_isolates_per_item_failures() {
    let api = ScriptedApi::new();
    api.fail_create_for("b");

    let reports = fleet(api.clone())
        .ensure_created(&[spec("a"), spec("b"), spec("c")])
        .await
        .expect("ensure_created should succeed");

    let report_names: Vec<&str> = reports.iter().map(|report| report.name.as_str()).collect();
    assert_eq!(report_names, ["a", "b", "c"], "reports keep input order");
    assert!(matches!(reports[0].outcome, CreateOutcome::Created));
    assert!(matches!(reports[1].outcome, CreateOutcome::Failed(_)));
    assert!(matches!(reports[2].outcome, CreateOutcome::Created));
    assert_eq!(
        api.count_calls(|call| matches!(call, ApiCall::CreateServer { .. })),
        3
    );
}

#[rstest]
#[case(ServerState::Running)]
#[case(ServerState::Starting)]
#[case(ServerState::Other(String::from("locked")))]
#[tokio::test]
async fn ensure_deleted_refuses_non_stopped_servers(#[case] state: ServerState) {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", state.clone(), &["vol-1"]));

    let reports = fleet(api.clone())
        .ensure_deleted(&names(&["a"]))
        .await
        .expect("ensure_deleted should succeed");

    assert_eq!(
        api.count_calls(|call| matches!(
            call,
            ApiCall::DeleteServer { .. } | ApiCall::DeleteVolume { .. }
        )),
        0
    );
    assert!(
        matches!(&reports[0].outcome, DeleteOutcome::WrongState(found) if *found == state)
    );
}

#[tokio::test]
async fn ensure_deleted_treats_missing_as_already_deleted() {
    let api = ScriptedApi::new();

    let reports = fleet(api.clone())
        .ensure_deleted(&names(&["ghost"]))
        .await
        .expect("ensure_deleted should succeed");

    assert!(matches!(reports[0].outcome, DeleteOutcome::Missing));
    assert_eq!(
        api.count_calls(|call| matches!(call, ApiCall::DeleteServer { .. })),
        0
    );
}

#[tokio::test]
async fn ensure_deleted_removes_server_then_volumes() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Stopped, &["vol-1", "vol-2"]));

    let reports = fleet(api.clone())
        .ensure_deleted(&names(&["a"]))
        .await
        .expect("ensure_deleted should succeed");

    assert!(matches!(
        reports[0].outcome,
        DeleteOutcome::Deleted { volumes_deleted: 2 }
    ));

    let calls = api.calls();
    let server_delete = calls
        .iter()
        .position(|call| matches!(call, ApiCall::DeleteServer { .. }))
        .expect("server delete should be issued");
    let first_volume_delete = calls
        .iter()
        .position(|call| matches!(call, ApiCall::DeleteVolume { .. }))
        .expect("volume deletes should be issued");
    assert!(
        server_delete < first_volume_delete,
        "volumes must only be deleted after the server"
    );
    assert_eq!(
        api.count_calls(|call| matches!(call, ApiCall::DeleteVolume { .. })),
        2
    );
}

#[tokio::test]
async fn ensure_deleted_leaves_volumes_when_server_delete_fails() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Stopped, &["vol-1"]));
    api.fail_delete_server_for("srv-a");

    let reports = fleet(api.clone())
        .ensure_deleted(&names(&["a"]))
        .await
        .expect("ensure_deleted should succeed");

    assert!(matches!(reports[0].outcome, DeleteOutcome::Failed(_)));
    assert_eq!(
        api.count_calls(|call| matches!(call, ApiCall::DeleteVolume { .. })),
        0
    );
}

#[tokio::test]
async fn ensure_deleted_reports_partial_volume_cleanup() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Stopped, &["vol-1", "vol-2"]));
    api.fail_delete_volume_for("vol-2");

    let reports = fleet(api.clone())
        .ensure_deleted(&names(&["a"]))
        .await
        .expect("ensure_deleted should succeed");

    assert!(matches!(
        reports[0].outcome,
        DeleteOutcome::VolumeCleanupFailed {
            volumes_deleted: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn describe_reads_without_mutating() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Running, &[]));

    let reports = fleet(api.clone())
        .describe(&names(&["a", "ghost"]))
        .await
        .expect("describe should succeed");

    assert_eq!(api.calls(), vec![ApiCall::ListServers]);
    assert!(reports[0].present());
    assert_eq!(
        reports[0].info.as_ref().map(|info| info.state.clone()),
        Some(ServerState::Running)
    );
    assert!(!reports[1].present());
    assert!(reports[1].info.is_none());
}

#[tokio::test]
async fn ensure_started_posts_poweron_for_stopped_server() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Stopped, &[]));
    api.set_actions("srv-a", &["poweron", "backup"]);

    let reports = fleet(api.clone())
        .ensure_started(&names(&["a"]))
        .await
        .expect("ensure_started should succeed");

    assert!(matches!(reports[0].outcome, ActionOutcome::Done));
    assert_eq!(
        api.count_calls(|call| matches!(
            call,
            ApiCall::PerformAction {
                action: PowerAction::PowerOn,
                ..
            }
        )),
        1
    );
}

#[tokio::test]
async fn ensure_started_reports_missing_server() {
    let api = ScriptedApi::new();

    let reports = fleet(api.clone())
        .ensure_started(&names(&["a"]))
        .await
        .expect("ensure_started should succeed");

    assert!(matches!(reports[0].outcome, ActionOutcome::Missing));
    assert_eq!(
        api.count_calls(|call| matches!(
            call,
            ApiCall::ServerActions { .. } | ApiCall::PerformAction { .. }
        )),
        0
    );
}

#[tokio::test]
async fn ensure_started_skips_running_server_without_fetching_actions() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Running, &[]));

    let reports = fleet(api.clone())
        .ensure_started(&names(&["a"]))
        .await
        .expect("ensure_started should succeed");

    assert!(matches!(
        reports[0].outcome,
        ActionOutcome::WrongState(ServerState::Running)
    ));
    assert_eq!(
        api.count_calls(|call| matches!(call, ApiCall::ServerActions { .. })),
        0
    );
}

#[tokio::test]
async fn ensure_started_reports_unavailable_action() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Stopped, &[]));
    api.set_actions("srv-a", &["backup"]);

    let reports = fleet(api.clone())
        .ensure_started(&names(&["a"]))
        .await
        .expect("ensure_started should succeed");

    assert!(matches!(
        &reports[0].outcome,
        ActionOutcome::ActionUnavailable { available } if available == &vec![String::from("backup")]
    ));
    assert_eq!(
        api.count_calls(|call| matches!(call, ApiCall::PerformAction { .. })),
        0
    );
}

#[tokio::test]
async fn ensure_terminated_requires_running_state() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Running, &[]));
    api.add_server(server("srv-b", "b", ServerState::Stopped, &[]));
    api.set_actions("srv-a", &["terminate"]);

    let reports = fleet(api.clone())
        .ensure_terminated(&names(&["a", "b"]))
        .await
        .expect("ensure_terminated should succeed");

    assert!(matches!(reports[0].outcome, ActionOutcome::Done));
    assert!(matches!(
        reports[1].outcome,
        ActionOutcome::WrongState(ServerState::Stopped)
    ));
    assert_eq!(
        api.count_calls(|call| matches!(
            call,
            ApiCall::PerformAction {
                action: PowerAction::Terminate,
                ..
            }
        )),
        1
    );
}

#[tokio::test]
async fn inventory_rejects_duplicate_hostnames() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-1", "web", ServerState::Running, &[]));
    api.add_server(server("srv-2", "web", ServerState::Stopped, &[]));

    let error = fleet(api)
        .inventory()
        .await
        .expect_err("duplicate hostnames should fail");

    assert!(matches!(
        error,
        FleetError::DuplicateName { ref name } if name == "web"
    ));
}

#[tokio::test]
async fn inventory_fetch_failure_aborts_operation() {
    let api = ScriptedApi::new();
    api.fail_next_list();

    let error = fleet(api)
        .ensure_created(&[spec("a")])
        .await
        .expect_err("listing failure should abort");

    assert!(matches!(error, FleetError::Inventory(_)));
}

#[tokio::test]
async fn poll_until_ticks_until_all_targets_satisfy() {
    let api = ScriptedApi::new();
    api.push_snapshot(vec![server("srv-a", "a", ServerState::Stopped, &[])]);
    api.push_snapshot(vec![server("srv-a", "a", ServerState::Starting, &[])]);
    api.push_snapshot(vec![server("srv-a", "a", ServerState::Running, &[])]);

    let mut ticks = 0;
    fleet(api)
        .poll_until(
            &names(&["a"]),
            |info| info.is_some_and(|record| record.state == ServerState::Running),
            |statuses| {
                ticks += 1;
                assert_eq!(statuses.len(), 1);
                assert_eq!(statuses[0].name, "a");
            },
            None,
        )
        .await
        .expect("poll should complete");

    assert_eq!(ticks, 3);
}

#[tokio::test]
async fn poll_until_reports_absent_targets_to_on_tick() {
    let api = ScriptedApi::new();
    api.push_snapshot(Vec::new());
    api.push_snapshot(vec![server("srv-a", "a", ServerState::Running, &[])]);

    let mut presence = Vec::new();
    fleet(api)
        .poll_until(
            &names(&["a"]),
            |info| info.is_some(),
            |statuses| presence.push(statuses[0].present()),
            None,
        )
        .await
        .expect("poll should complete");

    assert_eq!(presence, [false, true]);
}

#[tokio::test]
async fn poll_until_times_out_against_deadline() {
    let api = ScriptedApi::new();
    api.add_server(server("srv-a", "a", ServerState::Stopped, &[]));

    let error = fleet(api)
        .poll_until(
            &names(&["a"]),
            |info| info.is_some_and(|record| record.state == ServerState::Running),
            |_| {},
            Some(Duration::from_millis(5)),
        )
        .await
        .expect_err("poll should hit the deadline");

    assert!(matches!(error, FleetError::DeadlineExceeded { .. }));
}

#[tokio::test]
async fn images_lists_available_images() {
    let api = ScriptedApi::new();
    api.set_images(vec![ImageSummary {
        id: String::from("img-1"),
        name: String::from("Ubuntu 24.04"),
        arch: String::from("x86_64"),
    }]);

    let images = fleet(api)
        .images()
        .await
        .expect("images should list");

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id, "img-1");
}
