use tempfile::tempdir;

use crate::channel::RequeueChannel;
use crate::error::RunSyncError;
use crate::models::{ChannelMessageStatus, PublishReceipt, PublishRequest, ReconciliationMessage};
use crate::store::RunStore;
use crate::test_support::sample_run;

use super::*;

fn open_store() -> (tempfile::TempDir, SqliteStateStore) {
    let temp = tempdir().expect("tempdir");
    let store = SqliteStateStore::open(temp.path().join("state.db")).expect("open failed");
    (temp, store)
}

fn request(group: &str, key: &str, sequence: u64) -> PublishRequest {
    let run = sample_run(group, "AWS HealthOmics", "RUNNING", Some("1234"));
    let mut message = ReconciliationMessage::for_run(&run).expect("message");
    message.sequence = sequence;
    PublishRequest {
        topic: "runs".to_string(),
        ordering_group: group.to_string(),
        dedup_key: key.to_string(),
        message,
        delay_seconds: 0,
        dedup_window_seconds: 300,
    }
}

#[test]
fn put_and_get_run_round_trip() {
    let (_temp, store) = open_store();
    let run = sample_run("r1", "Seqera Cloud", "SUBMITTED", Some("4Bi5xBK6E2Nbhj"));
    store.put_run(&run).expect("put");

    let loaded = store.get_run("r1").expect("get").expect("present");
    assert_eq!(loaded, run);
    assert!(store.get_run("missing").expect("get").is_none());
}

#[test]
fn put_run_rejects_duplicate_ids() {
    let (_temp, store) = open_store();
    let run = sample_run("r1", "Seqera Cloud", "SUBMITTED", None);
    store.put_run(&run).expect("put");
    let err = store.put_run(&run).expect_err("duplicate");
    assert!(matches!(err, RunSyncError::Validation(_)));
}

#[test]
fn update_run_advances_version_and_rejects_stale_writers() {
    let (_temp, store) = open_store();
    let run = sample_run("r1", "AWS HealthOmics", "PENDING", Some("1234"));
    store.put_run(&run).expect("put");

    let mut first = run.clone();
    first.status = "RUNNING".to_string();
    let stored = store.update_run(&first).expect("first update");
    assert_eq!(stored.version, run.version + 1);

    let mut stale = run.clone();
    stale.status = "FAILED".to_string();
    let err = store.update_run(&stale).expect_err("stale write");
    assert!(matches!(err, RunSyncError::StoreConflict { expected, .. } if expected == run.version));

    let current = store.get_run("r1").expect("get").expect("present");
    assert_eq!(current.status, "RUNNING");
    assert_eq!(current.version, stored.version);
}

#[test]
fn update_run_reports_missing_runs() {
    let (_temp, store) = open_store();
    let run = sample_run("ghost", "AWS HealthOmics", "PENDING", Some("1234"));
    let err = store.update_run(&run).expect_err("missing");
    assert!(matches!(err, RunSyncError::RunNotFound(id) if id == "ghost"));
}

#[test]
fn list_runs_filters_by_laboratory() {
    let (_temp, store) = open_store();
    let mut a = sample_run("a", "AWS HealthOmics", "RUNNING", Some("1"));
    a.laboratory_id = "lab-1".to_string();
    let mut b = sample_run("b", "Seqera Cloud", "RUNNING", Some("2"));
    b.laboratory_id = "lab-2".to_string();
    store.put_run(&a).expect("put a");
    store.put_run(&b).expect("put b");

    let runs = store.list_runs("lab-1", 10).expect("list");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, "a");
    assert!(store.list_runs("lab-1", 0).expect("list").is_empty());
}

#[test]
fn publish_within_dedup_window_is_absorbed() {
    let (_temp, store) = open_store();
    let first = store.publish(&request("r1", "r1:1:0", 1)).expect("publish");
    let second = store.publish(&request("r1", "r1:1:0", 1)).expect("publish");

    let PublishReceipt::Published { message_id } = first else {
        panic!("first publish must be accepted");
    };
    assert_eq!(
        second,
        PublishReceipt::Deduplicated {
            existing_message_id: message_id
        }
    );
    assert_eq!(store.channel_counts("runs").expect("counts").new_total, 1);
}

#[test]
fn publish_outside_dedup_window_is_accepted_again() {
    let (_temp, store) = open_store();
    let first = store.publish(&request("r1", "r1:1:0", 1)).expect("publish");
    store
        .age_channel_message_for_test(first.message_id(), "2000-01-01T00:00:00.000000Z")
        .expect("age");
    let second = store.publish(&request("r1", "r1:1:0", 1)).expect("publish");
    assert!(second.is_published());
}

#[test]
fn receive_hands_out_one_message_per_group_in_publish_order() {
    let (_temp, store) = open_store();
    let a1 = store.publish(&request("a", "a:1:0", 1)).expect("a1").message_id();
    let a2 = store.publish(&request("a", "a:2:0", 2)).expect("a2").message_id();
    let b1 = store.publish(&request("b", "b:1:0", 1)).expect("b1").message_id();

    let batch = store.receive("runs", 10, 60).expect("receive");
    let ids: Vec<i64> = batch.iter().map(|delivery| delivery.message_id).collect();
    assert_eq!(ids, vec![a1, b1]);
    assert_eq!(batch[0].receive_count, 1);

    assert!(store.receive("runs", 10, 60).expect("receive").is_empty());

    store.acknowledge(a1).expect("ack");
    let batch = store.receive("runs", 10, 60).expect("receive");
    let ids: Vec<i64> = batch.iter().map(|delivery| delivery.message_id).collect();
    assert_eq!(ids, vec![a2]);
}

#[test]
fn delayed_message_blocks_its_group_until_visible() {
    let (_temp, store) = open_store();
    let mut delayed = request("a", "a:1:0", 1);
    delayed.delay_seconds = 600;
    let first = store.publish(&delayed).expect("publish").message_id();
    let _ = store.publish(&request("a", "a:2:0", 2)).expect("publish");

    assert!(store.receive("runs", 10, 60).expect("receive").is_empty());
    let counts = store.channel_counts("runs").expect("counts");
    assert_eq!(counts.new_total, 2);
    assert_eq!(counts.new_due, 1);

    store.force_channel_visible_now(first).expect("force");
    let batch = store.receive("runs", 10, 60).expect("receive");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].message_id, first);
}

#[test]
fn released_message_is_redelivered_with_higher_receive_count() {
    let (_temp, store) = open_store();
    let id = store.publish(&request("a", "a:1:0", 1)).expect("publish").message_id();
    let batch = store.receive("runs", 1, 60).expect("receive");
    assert_eq!(batch[0].message_id, id);

    store.release(id, 0, Some("successor publish failed")).expect("release");
    let batch = store.receive("runs", 1, 60).expect("receive");
    assert_eq!(batch[0].message_id, id);
    assert_eq!(batch[0].receive_count, 2);

    let row = store.get_channel_message(id).expect("get").expect("present");
    assert_eq!(row.last_error.as_deref(), Some("successor publish failed"));
}

#[test]
fn acknowledge_requires_a_live_lease() {
    let (_temp, store) = open_store();
    let id = store.publish(&request("a", "a:1:0", 1)).expect("publish").message_id();
    let err = store.acknowledge(id).expect_err("not leased");
    assert!(matches!(err, RunSyncError::Channel(_)));
}

#[test]
fn expired_leases_are_recovered() {
    let (_temp, store) = open_store();
    let id = store.publish(&request("a", "a:1:0", 1)).expect("publish").message_id();
    let _ = store.receive("runs", 1, 60).expect("receive");
    assert_eq!(store.recover_expired_leases("runs").expect("recover"), 0);

    store.expire_channel_lease_for_test(id).expect("expire");
    assert_eq!(store.recover_expired_leases("runs").expect("recover"), 1);
    let batch = store.receive("runs", 1, 60).expect("receive");
    assert_eq!(batch[0].message_id, id);
}

#[test]
fn dead_letters_do_not_block_their_group_and_can_be_marked_redriven() {
    let (_temp, store) = open_store();
    let parked = request("a", "a:1:0", 1).message;
    let dead_id = store
        .dead_letter("runs", "a", &parked, "PROVIDER_CALL_FAILED")
        .expect("dead letter");
    let live = store.publish(&request("a", "a:2:0", 2)).expect("publish").message_id();

    let batch = store.receive("runs", 10, 60).expect("receive");
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].message_id, live);

    let dead = store
        .list_channel_messages("runs", ChannelMessageStatus::DeadLetter, 10)
        .expect("list");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].id, dead_id);
    assert_eq!(dead[0].last_error.as_deref(), Some("PROVIDER_CALL_FAILED"));

    assert!(store.mark_dead_letter_redriven(dead_id).expect("mark"));
    assert!(!store.mark_dead_letter_redriven(dead_id).expect("mark twice"));
}

#[test]
fn dead_letter_is_recorded_once_per_sequence_and_attempt() {
    let (_temp, store) = open_store();
    let mut parked = request("a", "a:3:2", 3).message;
    parked.attempt = 2;

    let first = store
        .dead_letter("runs", "a", &parked, "PROVIDER_CALL_FAILED")
        .expect("dead letter");
    let again = store
        .dead_letter("runs", "a", &parked, "PROVIDER_CALL_FAILED")
        .expect("repeat");
    assert_eq!(again, first);

    assert!(store.mark_dead_letter_redriven(first).expect("mark"));
    let after_redrive = store
        .dead_letter("runs", "a", &parked, "PROVIDER_CALL_FAILED")
        .expect("repeat after redrive");
    assert_eq!(after_redrive, first);
    assert!(
        store
            .list_channel_messages("runs", ChannelMessageStatus::DeadLetter, 10)
            .expect("list")
            .is_empty()
    );

    parked.sequence = 4;
    let next_sequence = store
        .dead_letter("runs", "a", &parked, "PROVIDER_CALL_FAILED")
        .expect("next sequence");
    assert_ne!(next_sequence, first);
}

#[test]
fn dead_letter_rates_count_redriven_rows() {
    let (_temp, store) = open_store();
    let message = request("a", "a:1:0", 1).message;
    let _ = store.publish(&request("a", "a:1:0", 1)).expect("publish");
    let dead = store
        .dead_letter("runs", "a", &message, "X")
        .expect("dead letter");
    store.mark_dead_letter_redriven(dead).expect("mark");

    let rates = store.dead_letter_rates_by_topic().expect("rates");
    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0].total, 2);
    assert_eq!(rates[0].dead_letter, 1);
    assert!((rates[0].dead_letter_rate - 0.5).abs() < f64::EPSILON);
}

#[cfg(unix)]
#[test]
fn open_hardens_state_db_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("state.db");
    let store = SqliteStateStore::open(&db_path).expect("open failed");
    let _ = store.publish(&request("a", "a:1:0", 1)).expect("publish");

    let mode = std::fs::metadata(&db_path)
        .expect("metadata")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o600);
}
