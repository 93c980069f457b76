//! Restart behaviour: state written by a previous process is picked up and
//! replayed without repeating completed side effects.

mod common;

use chrono::{DateTime, TimeDelta, Utc};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use common::{durable_config, wait_terminal, MockController};
use resource_breaker::circuit::{AddFailureOutcome, CircuitState, FailureRecord};
use resource_breaker::controller::{ControlOperation, ControlStatus};
use resource_breaker::lifecycle::{build_service, StartupError};
use resource_breaker::storage::{JsonStore, StorageError};
use resource_breaker::workflow::{
    BreakerConfig, InstanceRecord, JournalEntry, RaceWinner, RuntimeClock, StepOutcome,
    WorkflowState, FORCE_CLOSE_SIGNAL,
};

const APP: &str = "/subscriptions/s1/sites/app";

fn instantiated_at() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn entry(seq: usize, step: &str, outcome: StepOutcome) -> JournalEntry {
    JournalEntry {
        seq,
        step: step.to_string(),
        outcome,
    }
}

fn stopped_ok() -> StepOutcome {
    StepOutcome::Activity {
        result: serde_json::to_value(Ok::<ControlStatus, String>(ControlStatus::ok())).unwrap(),
    }
}

/// Write an instance that already stopped its resource, as a crashed process would leave it.
fn seed_instance(dir: &Path, backoff: Duration, mut extra: Vec<JournalEntry>, inbox: Vec<String>) {
    let store: JsonStore<InstanceRecord> = JsonStore::open(dir.join("workflows.json")).unwrap();
    let config = BreakerConfig::new(APP, backoff).unwrap();
    let mut record = InstanceRecord::new(config, 1, instantiated_at());
    record.state = WorkflowState::WaitingForRecovery;
    record.journal = vec![
        entry(0, "instantiated", StepOutcome::Clock { at: instantiated_at() }),
        entry(1, "stop", stopped_ok()),
    ];
    record.journal.append(&mut extra);
    record.inbox = inbox;
    store.put(APP, record).unwrap();
}

fn clock_after(secs: i64) -> RuntimeClock {
    RuntimeClock::starting_at(instantiated_at() + TimeDelta::seconds(secs))
}

#[tokio::test(start_paused = true)]
async fn resumed_instance_skips_stop_and_waits_remaining_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    seed_instance(dir.path(), Duration::from_secs(10), Vec::new(), Vec::new());

    let controller = MockController::new();
    let t0 = Instant::now();
    let service = build_service(&durable_config(dir.path()), controller.clone(), clock_after(4)).unwrap();

    let status = wait_terminal(&service.workflows, APP).await;
    assert_eq!(status.state, WorkflowState::Completed);
    assert_eq!(controller.count(ControlOperation::Stop), 0);

    let start = controller.first(ControlOperation::Start).unwrap();
    let waited = start.at - t0;
    assert!(waited >= Duration::from_secs(6));
    assert!(waited < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn expired_cooldown_starts_immediately_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    seed_instance(dir.path(), Duration::from_secs(10), Vec::new(), Vec::new());

    let controller = MockController::new();
    let t0 = Instant::now();
    let service = build_service(&durable_config(dir.path()), controller.clone(), clock_after(60)).unwrap();

    wait_terminal(&service.workflows, APP).await;
    let start = controller.first(ControlOperation::Start).unwrap();
    assert!(start.at - t0 < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn signal_won_race_is_not_awaited_again() {
    let dir = tempfile::tempdir().unwrap();
    seed_instance(
        dir.path(),
        Duration::from_secs(300),
        vec![entry(2, "cooldown", StepOutcome::Race { winner: RaceWinner::Signal })],
        Vec::new(),
    );

    let controller = MockController::new();
    let t0 = Instant::now();
    let service = build_service(&durable_config(dir.path()), controller.clone(), clock_after(5)).unwrap();

    let status = wait_terminal(&service.workflows, APP).await;
    assert_eq!(status.state, WorkflowState::Completed);
    assert_eq!(controller.count(ControlOperation::Stop), 0);
    let start = controller.first(ControlOperation::Start).unwrap();
    assert!(start.at - t0 < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn signal_delivered_before_crash_is_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    seed_instance(
        dir.path(),
        Duration::from_secs(300),
        Vec::new(),
        vec![FORCE_CLOSE_SIGNAL.to_string()],
    );

    let controller = MockController::new();
    let t0 = Instant::now();
    let service = build_service(&durable_config(dir.path()), controller.clone(), clock_after(5)).unwrap();

    let status = wait_terminal(&service.workflows, APP).await;
    assert_eq!(status.state, WorkflowState::Completed);
    assert!(status.pending_signals.is_empty());
    let start = controller.first(ControlOperation::Start).unwrap();
    assert!(start.at - t0 < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn journal_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    seed_instance(dir.path(), Duration::from_secs(10), Vec::new(), Vec::new());

    let controller = MockController::new();
    let service = build_service(&durable_config(dir.path()), controller.clone(), clock_after(0)).unwrap();
    wait_terminal(&service.workflows, APP).await;

    let store: JsonStore<InstanceRecord> = JsonStore::open(dir.path().join("workflows.json")).unwrap();
    let record = store.get(APP).unwrap();
    assert_eq!(record.state, WorkflowState::Completed);
    let steps: Vec<&str> = record.journal.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(steps, vec!["instantiated", "stop", "cooldown", "start", "close-circuit"]);
    assert_eq!(
        record.journal[2].outcome,
        StepOutcome::Race { winner: RaceWinner::Timer }
    );
}

#[tokio::test(start_paused = true)]
async fn terminal_instances_are_not_resumed() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store: JsonStore<InstanceRecord> =
            JsonStore::open(dir.path().join("workflows.json")).unwrap();
        let config = BreakerConfig::new(APP, Duration::from_secs(10)).unwrap();
        let mut record = InstanceRecord::new(config, 1, instantiated_at());
        record.state = WorkflowState::Failed;
        store.put(APP, record).unwrap();
    }

    let controller = MockController::new();
    let service = build_service(&durable_config(dir.path()), controller.clone(), clock_after(0)).unwrap();
    assert_eq!(service.workflows.active_count(), 0);
    assert_eq!(service.workflows.resume_pending().unwrap(), 0);
    assert!(controller.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn mismatched_journal_fails_the_instance() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store: JsonStore<InstanceRecord> =
            JsonStore::open(dir.path().join("workflows.json")).unwrap();
        let config = BreakerConfig::new(APP, Duration::from_secs(10)).unwrap();
        let mut record = InstanceRecord::new(config, 1, instantiated_at());
        record.state = WorkflowState::Stopping;
        record.journal = vec![entry(0, "start", stopped_ok())];
        store.put(APP, record).unwrap();
    }

    let controller = MockController::new();
    let service = build_service(&durable_config(dir.path()), controller.clone(), clock_after(0)).unwrap();
    let status = wait_terminal(&service.workflows, APP).await;
    assert_eq!(status.state, WorkflowState::Failed);
    assert!(status.last_error.unwrap().contains("Non-deterministic replay"));
    assert!(controller.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn circuit_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = durable_config(dir.path());
    let at = |secs: i64| instantiated_at() + TimeDelta::seconds(secs);

    {
        let service = build_service(&config, MockController::new(), RuntimeClock::new()).unwrap();
        service
            .circuits
            .add_failure(APP, FailureRecord::new("r1", "web-1", at(0)))
            .await
            .unwrap();
        service
            .circuits
            .add_failure(APP, FailureRecord::new("r2", "web-1", at(1)))
            .await
            .unwrap();
    }

    let controller = MockController::new();
    let service = build_service(&config, controller.clone(), RuntimeClock::new()).unwrap();
    let snapshot = service.circuits.snapshot(APP).await.unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.window_len, 2);

    let outcome = service
        .circuits
        .add_failure(APP, FailureRecord::new("r3", "web-1", at(2)))
        .await
        .unwrap();
    assert!(matches!(outcome, AddFailureOutcome::Tripped { window_len: 3, .. }));
}

#[tokio::test]
async fn unknown_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("circuits.json"),
        r#"{ "version": 99, "records": {} }"#,
    )
    .unwrap();

    let result = build_service(&durable_config(dir.path()), MockController::new(), RuntimeClock::new());
    assert!(matches!(
        result,
        Err(StartupError::Storage(StorageError::UnsupportedVersion { found: 99, .. }))
    ));
}
