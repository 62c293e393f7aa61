use std::sync::Arc;

use tempfile::tempdir;

use crate::config::AppConfig;
use crate::error::{Result, RunSyncError};
use crate::models::{
    CanonicalStatus, LaboratoryRun, NewLaboratoryRun, ObservedStatus, Platform,
    ReconcileOutcome, ReconciliationMessage,
};
use crate::providers::{ProviderRegistry, ProviderStatusAdapter};
use crate::status::observe;
use crate::store::RunStore;

use super::RunSync;

struct Always(Platform, &'static str);

impl ProviderStatusAdapter for Always {
    fn platform(&self) -> Platform {
        self.0
    }

    fn fetch_status(&self, _run: &LaboratoryRun) -> Result<ObservedStatus> {
        Ok(observe(self.0, self.1))
    }
}

struct Down(Platform);

impl ProviderStatusAdapter for Down {
    fn platform(&self) -> Platform {
        self.0
    }

    fn fetch_status(&self, _run: &LaboratoryRun) -> Result<ObservedStatus> {
        Err(RunSyncError::provider(self.0.as_str(), Some(502), "bad gateway"))
    }
}

fn app_with(root: &std::path::Path, providers: ProviderRegistry, max_attempts: u32) -> RunSync {
    let mut config = AppConfig::default();
    config.worker.poll_interval_seconds = 0;
    config.worker.retry.max_attempts = max_attempts;
    let app = RunSync::with_providers(root, &config, providers).expect("app");
    app.initialize().expect("init");
    app
}

fn new_run(platform: Platform, external: Option<&str>) -> NewLaboratoryRun {
    NewLaboratoryRun {
        run_id: None,
        laboratory_id: "lab-1".to_string(),
        organization_id: "org-1".to_string(),
        platform,
        external_run_id: external.map(ToString::to_string),
        workspace_id: None,
        status: None,
        workflow_name: "nf-core/sarek".to_string(),
        owner: "owner@lab.example".to_string(),
        settings: serde_json::json!({}),
        created_by: "owner@lab.example".to_string(),
    }
}

#[test]
fn register_run_fills_defaults_per_platform() {
    let temp = tempdir().expect("tempdir");
    let app = app_with(temp.path(), ProviderRegistry::new(), 3);

    let omics = app
        .register_run(new_run(Platform::AwsHealthOmics, Some("1234")))
        .expect("register");
    assert_eq!(omics.status, "PENDING");
    assert_eq!(omics.canonical_status, CanonicalStatus::Pending);
    assert_eq!(omics.version, 1);
    assert!(!omics.run_id.is_empty());

    let seqera = app
        .register_run(new_run(Platform::SeqeraCloud, Some("wf-1")))
        .expect("register");
    assert_eq!(seqera.status, "SUBMITTED");
    assert_eq!(app.get_run(&seqera.run_id).expect("get"), seqera);
    assert_eq!(app.list_runs("lab-1", 10).expect("list").len(), 2);
}

#[test]
fn register_run_requires_tenant_ids() {
    let temp = tempdir().expect("tempdir");
    let app = app_with(temp.path(), ProviderRegistry::new(), 3);
    let mut invalid = new_run(Platform::AwsHealthOmics, Some("1234"));
    invalid.laboratory_id = " ".to_string();
    let err = app.register_run(invalid).expect_err("invalid");
    assert!(matches!(err, RunSyncError::Validation(_)));
}

#[test]
fn get_run_reports_missing_runs() {
    let temp = tempdir().expect("tempdir");
    let app = app_with(temp.path(), ProviderRegistry::new(), 3);
    let err = app.get_run("nope").expect_err("missing");
    assert!(matches!(err, RunSyncError::RunNotFound(_)));
}

#[test]
fn tracked_run_is_reconciled_until_terminal() {
    let temp = tempdir().expect("tempdir");
    let providers =
        ProviderRegistry::new().with(Arc::new(Always(Platform::AwsHealthOmics, "COMPLETED")));
    let app = app_with(temp.path(), providers, 3);
    let run = app
        .register_run(new_run(Platform::AwsHealthOmics, Some("1234")))
        .expect("register");

    let receipt = app.start_reconciliation(&run.run_id).expect("track");
    assert!(receipt.is_published());
    let again = app.start_reconciliation(&run.run_id).expect("track again");
    assert!(!again.is_published());

    let report = app.drain_channel(10, 1).expect("drain");
    assert_eq!(report.finished, 1);
    let stored = app.get_run(&run.run_id).expect("get");
    assert_eq!(stored.status, "COMPLETED");
    assert_eq!(stored.canonical_status, CanonicalStatus::Succeeded);

    let overview = app.channel_overview().expect("overview");
    assert_eq!(overview.counts.done, 1);
    assert_eq!(overview.counts.new_total, 0);

    let operations: Vec<String> = app
        .list_request_logs(10)
        .expect("logs")
        .into_iter()
        .map(|entry| entry.operation)
        .collect();
    assert!(operations.contains(&"run.register".to_string()));
    assert!(operations.contains(&"reconcile.message".to_string()));
    assert!(operations.contains(&"queue.drain".to_string()));
}

#[test]
fn dead_letter_can_be_redriven_with_fresh_budget() {
    let temp = tempdir().expect("tempdir");
    let providers = ProviderRegistry::new().with(Arc::new(Down(Platform::AwsHealthOmics)));
    let app = app_with(temp.path(), providers, 1);
    let run = app
        .register_run(new_run(Platform::AwsHealthOmics, Some("1234")))
        .expect("register");
    let mut message = ReconciliationMessage::for_run(&run).expect("message");
    message.attempt = 1;
    app.worker().publish(&run.run_id, &message, 0).expect("publish");

    let report = app.drain_channel(10, 1).expect("drain");
    assert_eq!(report.dead_lettered, 1);
    let dead = app.list_dead_letters(10).expect("dead letters");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].ordering_group, run.run_id);

    let redrive = app.redrive_dead_letter(dead[0].id).expect("redrive");
    assert_eq!(redrive.run_id, run.run_id);
    assert!(!redrive.deduplicated);
    assert!(app.list_dead_letters(10).expect("dead letters").is_empty());

    let pending = app
        .state
        .get_channel_message(redrive.message_id)
        .expect("get")
        .expect("present");
    let fresh: ReconciliationMessage = serde_json::from_value(pending.body).expect("body");
    assert_eq!(fresh.attempt, 0);
    assert_eq!(fresh.sequence, message.sequence + 1);

    let overview = app.channel_overview().expect("overview");
    assert_eq!(overview.counts.redriven, 1);
    assert_eq!(overview.dead_letter_rate.len(), 1);

    let err = app.redrive_dead_letter(dead[0].id).expect_err("already redriven");
    assert!(matches!(err, RunSyncError::Validation(_)));
}

#[test]
fn redrive_refreshes_snapshot_from_store() {
    let temp = tempdir().expect("tempdir");
    let providers = ProviderRegistry::new().with(Arc::new(Down(Platform::AwsHealthOmics)));
    let app = app_with(temp.path(), providers, 1);
    let run = app
        .register_run(new_run(Platform::AwsHealthOmics, Some("1234")))
        .expect("register");
    let mut message = ReconciliationMessage::for_run(&run).expect("message");
    message.attempt = 5;
    app.worker().publish(&run.run_id, &message, 0).expect("publish");
    app.drain_channel(10, 1).expect("drain");

    let mut changed = run.clone();
    changed.status = "RUNNING".to_string();
    app.state.update_run(&changed).expect("update");

    let dead = app.list_dead_letters(10).expect("dead letters");
    let redrive = app.redrive_dead_letter(dead[0].id).expect("redrive");
    let row = app
        .state
        .get_channel_message(redrive.message_id)
        .expect("get")
        .expect("present");
    assert_eq!(row.body["Record"]["Status"], "RUNNING");
}

#[test]
fn redelivered_message_at_the_cap_is_parked_once() {
    let temp = tempdir().expect("tempdir");
    let providers = ProviderRegistry::new().with(Arc::new(Down(Platform::AwsHealthOmics)));
    let app = app_with(temp.path(), providers, 1);
    let run = app
        .register_run(new_run(Platform::AwsHealthOmics, Some("1234")))
        .expect("register");
    let mut message = ReconciliationMessage::for_run(&run).expect("message");
    message.attempt = 1;

    let first = app.worker().process(&message).expect("first delivery");
    let second = app.worker().process(&message).expect("second delivery");
    assert!(matches!(
        first,
        ReconcileOutcome::DeadLettered { attempt: 2, .. }
    ));
    assert_eq!(first, second);
    let dead = app.list_dead_letters(10).expect("dead letters");
    assert_eq!(dead.len(), 1);

    app.redrive_dead_letter(dead[0].id).expect("redrive");
    app.worker().process(&message).expect("stale delivery after redrive");
    assert!(app.list_dead_letters(10).expect("dead letters").is_empty());
    assert_eq!(app.channel_overview().expect("overview").counts.redriven, 1);
}

#[test]
fn redriven_chain_that_fails_again_is_parked_again() {
    let temp = tempdir().expect("tempdir");
    let providers = ProviderRegistry::new().with(Arc::new(Down(Platform::AwsHealthOmics)));
    let app = app_with(temp.path(), providers, 1);
    let run = app
        .register_run(new_run(Platform::AwsHealthOmics, Some("1234")))
        .expect("register");
    let mut message = ReconciliationMessage::for_run(&run).expect("message");
    message.attempt = 1;
    app.worker().process(&message).expect("park");
    let parked = app.list_dead_letters(10).expect("dead letters");

    let redrive = app.redrive_dead_letter(parked[0].id).expect("redrive");
    let row = app
        .state
        .get_channel_message(redrive.message_id)
        .expect("get")
        .expect("present");
    let mut fresh: ReconciliationMessage = serde_json::from_value(row.body).expect("body");
    fresh.attempt = 1;
    app.worker().process(&fresh).expect("fail again");

    let dead = app.list_dead_letters(10).expect("dead letters");
    assert_eq!(dead.len(), 1);
    assert_ne!(dead[0].id, parked[0].id);
}
