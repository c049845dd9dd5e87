// tests/session_fake_launcher.rs

use std::error::Error;
use std::time::Duration;

use scantest::engine::{SessionCore, SessionHandle, StartAck, spawn_session};
use scantest::event::RunEvent;
use scantest::exec::{IDLE_SWEEP_FLAG, RELEASE_COMPONENT_FLAG};
use scantest::types::{ProcessId, ProcessRole, RunStatus, TestSelector};
use scantest_test_utils::builders::ConfigFileBuilder;
use scantest_test_utils::fake_launcher::FakeLauncher;
use scantest_test_utils::{eventually, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

const GRACE: Duration = Duration::from_millis(100);

fn start_session(launcher: &FakeLauncher) -> SessionHandle {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .script_dir("/opt/scanner")
        .grace_period("100ms")
        .max_cleanup_kill_attempts(2)
        .build();
    let (handle, _task) = spawn_session(SessionCore::from_config(&cfg), launcher.clone());
    handle
}

async fn start(session: &SessionHandle, selector: &str) -> Result<ProcessId, Box<dyn Error>> {
    match session.start_test(selector).await? {
        StartAck::Started { process, .. } => Ok(process),
        other => Err(format!("expected a started run, got {other:?}").into()),
    }
}

#[tokio::test]
async fn sweep_test_ok_update_is_polled_and_nothing_is_shut_down() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);

    let ack = session.start_test("2").await?;
    let id = match ack {
        StartAck::Started { selector, process } => {
            assert_eq!(selector, TestSelector::SweepTest);
            process
        }
        other => panic!("expected Started, got {other:?}"),
    };

    let launches = launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].role, ProcessRole::Test);
    assert_eq!(launches[0].spec.program, "python");
    assert!(launches[0].spec.args[0].ends_with("sweep_test.py"));

    launcher
        .stdout(id, r#"{"type":"update","status":"ok","msg":"done"}"#)
        .await;
    let events = session.poll_updates().await?;
    assert_eq!(events, vec![RunEvent::update(RunStatus::Ok, "done")]);
    assert_eq!(
        serde_json::to_string(&events)?,
        r#"[{"type":"update","status":"ok","msg":"done"}]"#
    );

    tokio::time::sleep(GRACE * 3).await;
    assert!(launcher.terminations().is_empty());
    assert!(launcher.launches_of(ProcessRole::Cleanup).is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_selector_yields_one_failed_event_and_no_process() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);

    assert_eq!(session.start_test("17").await?, StartAck::Rejected);

    let events = session.poll_updates().await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, RunStatus::Failed);
    assert!(session.poll_updates().await?.is_empty());

    tokio::time::sleep(GRACE * 2).await;
    assert!(launcher.launches().is_empty());
    assert!(launcher.terminations().is_empty());
    Ok(())
}

#[tokio::test]
async fn release_motor_runs_cleanup_without_idle_sweep() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);

    start(&session, "release_motor").await?;

    let spec = &launcher.launches()[0].spec;
    assert!(spec.args[0].ends_with("cleanup.py"));
    assert!(spec.has_arg(RELEASE_COMPONENT_FLAG));
    assert!(!spec.has_arg(IDLE_SWEEP_FLAG));
    Ok(())
}

#[tokio::test]
async fn stderr_fails_the_run_then_terminates_and_cleans_up() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);
    let id = start(&session, "2").await?;

    launcher.stderr(id, "motor stalled").await;

    let events = session.poll_updates().await?;
    assert_eq!(events, vec![RunEvent::failed("motor stalled")]);
    assert!(launcher.terminations().is_empty(), "must wait out the grace period");

    eventually(GRACE * 10, || {
        launcher.terminations_of(id) == 1 && !launcher.launches_of(ProcessRole::Cleanup).is_empty()
    })
    .await;

    let cleanups = launcher.launches_of(ProcessRole::Cleanup);
    assert_eq!(cleanups.len(), 1);
    assert!(cleanups[0].spec.args[0].ends_with("cleanup.py"));
    assert!(cleanups[0].spec.has_arg(RELEASE_COMPONENT_FLAG));
    assert!(cleanups[0].spec.has_arg(IDLE_SWEEP_FLAG));
    Ok(())
}

#[tokio::test]
async fn failed_status_triggers_one_shutdown_per_failure_episode() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);
    let id = start(&session, "0").await?;

    launcher
        .stdout(id, r#"{"type":"update","status":"failed","msg":"limit switch stuck"}"#)
        .await;
    launcher.stderr(id, "Traceback ...").await;

    let events = session.poll_updates().await?;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].msg, "limit switch stuck");
    assert_eq!(events[1], RunEvent::failed("Traceback ..."));

    eventually(GRACE * 10, || !launcher.launches_of(ProcessRole::Cleanup).is_empty()).await;
    tokio::time::sleep(GRACE * 2).await;

    assert_eq!(launcher.terminations_of(id), 1);
    assert_eq!(launcher.launches_of(ProcessRole::Cleanup).len(), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_stdout_is_ignored() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);
    let id = start(&session, "1").await?;

    launcher.stdout(id, "Homing base motor...").await;
    launcher.stdout(id, r#"{"type":"update","status":"running","#).await;
    launcher
        .stdout(id, r#"{"type":"update","status":"running","msg":"homed"}"#)
        .await;

    let events = session.poll_updates().await?;
    assert_eq!(events, vec![RunEvent::update(RunStatus::Running, "homed")]);

    tokio::time::sleep(GRACE * 3).await;
    assert!(launcher.terminations().is_empty());
    assert!(launcher.launches_of(ProcessRole::Cleanup).is_empty());
    Ok(())
}

#[tokio::test]
async fn polls_see_each_event_exactly_once_in_order() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);
    let id = start(&session, "2").await?;

    let mut seen = Vec::new();
    for step in 0..6 {
        launcher
            .stdout(id, format!(r#"{{"status":"running","msg":"step {step}"}}"#))
            .await;
        if step % 2 == 1 {
            seen.extend(session.poll_updates().await?);
        }
    }
    seen.extend(session.poll_updates().await?);

    let msgs: Vec<_> = seen.iter().map(|e| e.msg.as_str()).collect();
    assert_eq!(
        msgs,
        vec!["step 0", "step 1", "step 2", "step 3", "step 4", "step 5"]
    );
    Ok(())
}

#[tokio::test]
async fn second_start_is_refused_while_a_run_is_live() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);
    let id = start(&session, "2").await?;

    launcher.stdout(id, r#"{"status":"running","msg":"sweeping"}"#).await;
    assert_eq!(session.start_test("1").await?, StartAck::Busy);
    assert_eq!(launcher.launches().len(), 1);

    // The refused request must not have wiped the queue.
    assert_eq!(session.poll_updates().await?.len(), 1);

    launcher.stdout(id, r#"{"status":"ok","msg":"done"}"#).await;
    launcher.exit(id, Some(0)).await;

    let next = start(&session, "1").await?;
    assert_ne!(next, id);
    assert!(
        session.poll_updates().await?.is_empty(),
        "new run starts from an empty queue"
    );
    Ok(())
}

#[tokio::test]
async fn session_is_free_again_after_cleanup_finishes() -> TestResult {
    let launcher = FakeLauncher::exiting_on_terminate();
    let session = start_session(&launcher);
    let id = start(&session, "2").await?;

    launcher.stderr(id, "servo timeout").await;
    eventually(GRACE * 10, || !launcher.launches_of(ProcessRole::Cleanup).is_empty()).await;
    assert!(!launcher.is_alive(id));

    let cleanup = launcher.launches_of(ProcessRole::Cleanup)[0].id;
    assert_eq!(session.start_test("2").await?, StartAck::Busy);

    launcher
        .stdout(cleanup, r#"{"type":"update","status":"ok","msg":"parked"}"#)
        .await;
    launcher.exit(cleanup, Some(0)).await;

    start(&session, "2").await?;
    let events = session.poll_updates().await?;
    assert!(events.is_empty(), "stale failure and cleanup output are not delivered");
    Ok(())
}

#[tokio::test]
async fn shutdown_terminates_live_processes() -> TestResult {
    let launcher = FakeLauncher::new();
    let cfg = ConfigFileBuilder::new().build();
    let (session, task) = spawn_session(SessionCore::from_config(&cfg), launcher.clone());

    let id = start(&session, "0").await?;
    session.shutdown().await?;
    task.await?;

    assert_eq!(launcher.terminations(), vec![id]);
    assert!(session.poll_updates().await.is_err());
    Ok(())
}

#[tokio::test]
async fn silent_cleanup_is_terminated_at_its_deadline_and_frees_the_rig() -> TestResult {
    init_tracing();
    let launcher = FakeLauncher::exiting_on_terminate();
    let cfg = ConfigFileBuilder::new()
        .grace_period("20ms")
        .cleanup_timeout("150ms")
        .build();
    let (session, _task) = spawn_session(SessionCore::from_config(&cfg), launcher.clone());

    let id = start(&session, "2").await?;
    launcher.stderr(id, "motor stalled").await;
    eventually(Duration::from_secs(2), || {
        !launcher.launches_of(ProcessRole::Cleanup).is_empty()
    })
    .await;
    let cleanup = launcher.launches_of(ProcessRole::Cleanup)[0].id;

    // The cleanup never writes anything and never exits on its own.
    assert_eq!(session.start_test("2").await?, StartAck::Busy);

    eventually(Duration::from_secs(2), || launcher.terminations_of(cleanup) == 1).await;
    assert!(matches!(
        session.start_test("2").await?,
        StartAck::Started { .. }
    ));
    assert!(session.status().await?.cleanup_alarms.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_lingering_after_ok_is_replaced_by_the_next_run() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);
    let old = start(&session, "2").await?;

    launcher.stdout(old, r#"{"status":"ok","msg":"done"}"#).await;
    tokio::time::sleep(GRACE * 2).await;
    assert!(launcher.terminations().is_empty(), "reporting ok alone kills nothing");

    let new = start(&session, "1").await?;
    assert_eq!(launcher.terminations(), vec![old]);

    // Late output from the replaced process does not leak into the new run.
    launcher.stderr(old, "late noise").await;
    launcher.stdout(new, r#"{"status":"running","msg":"homing"}"#).await;
    assert_eq!(
        session.poll_updates().await?,
        vec![RunEvent::update(RunStatus::Running, "homing")]
    );
    assert!(launcher.launches_of(ProcessRole::Cleanup).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_quitting_without_a_result_still_ends_the_run() -> TestResult {
    let launcher = FakeLauncher::new();
    let session = start_session(&launcher);
    let id = start(&session, "1").await?;

    launcher.exit(id, Some(2)).await;

    let events = session.poll_updates().await?;
    assert_eq!(events.len(), 1);
    assert!(events[0].is_failure());
    eventually(GRACE * 10, || !launcher.launches_of(ProcessRole::Cleanup).is_empty()).await;
    assert_eq!(launcher.terminations_of(id), 0);
    Ok(())
}
