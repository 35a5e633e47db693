//! End-to-end availability and rotation scenarios.

use litevault_core::{RecoveryOutcome, SqlValue};
use litevault_testkit::prelude::*;
use std::fs;

fn note_count(fixture: &TestVault) -> i64 {
    let rows = fixture.execute_read("SELECT COUNT(*) FROM notes").unwrap();
    match rows.rows[0][0] {
        SqlValue::Integer(count) => count,
        ref other => panic!("unexpected count value: {other:?}"),
    }
}

#[test]
fn create_then_insert_shifts_generations() {
    let fixture = TestVault::available();

    fixture.execute_write(NOTES_TABLE_SQL).unwrap();
    let after_create = fixture.db_fingerprint();

    fixture
        .execute_write("INSERT INTO notes(body) VALUES ('first')")
        .unwrap();
    let after_insert = fixture.db_fingerprint();

    assert_ne!(after_create, after_insert);
    assert_eq!(fixture.local_fingerprint(1), after_insert);
    assert_eq!(fixture.local_fingerprint(2), after_create);
    assert_eq!(fixture.remote_fingerprint(1), Some(after_insert.clone()));
    assert_eq!(fixture.remote_fingerprint(2), Some(after_create));
    assert_eq!(
        fixture.current_sync_state().unwrap().fingerprint,
        Some(after_insert)
    );
}

#[test]
fn unchanged_write_does_not_rotate() {
    let fixture = scenarios::populated_vault(1);
    let generations = fixture.local_generations().list().unwrap();
    let remote_names = fixture.remote.names();
    let state = fixture.current_sync_state().unwrap();

    for _ in 0..2 {
        let outcome = fixture
            .execute_write("DELETE FROM notes WHERE id < 0")
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.rows_affected, 0);
    }

    assert_eq!(fixture.local_generations().list().unwrap(), generations);
    assert_eq!(fixture.remote.names(), remote_names);
    assert_eq!(fixture.current_sync_state().unwrap(), state);
    assert_eq!(fixture.stats().unchanged_writes, 2);
}

#[test]
fn failed_write_leaves_everything_untouched() {
    let fixture = scenarios::populated_vault(1);
    let before = fixture.db_fingerprint();
    let state = fixture.current_sync_state().unwrap();

    assert!(fixture.execute_write("INSERT INTO missing VALUES (1)").is_err());

    assert_eq!(fixture.db_fingerprint(), before);
    assert_eq!(fixture.current_sync_state().unwrap(), state);
    assert_eq!(fixture.local_fingerprint(1), before);
}

#[test]
fn wiped_environment_yields_empty_valid_database() {
    let fixture = TestVault::new();

    let report = fixture.ensure_available().unwrap();

    assert_eq!(report.outcome, RecoveryOutcome::CreatedEmpty);
    assert!(fixture.is_healthy());
    assert_eq!(fixture.user_count().unwrap(), 0);
}

#[test]
fn restore_with_no_generations_leaves_database_untouched() {
    let fixture = TestVault::available();
    let before = fs::read(fixture.db_path()).unwrap();

    assert!(!fixture.restore_now().unwrap());
    assert!(!fixture
        .local_generations()
        .restore_latest(fixture.db_path())
        .unwrap());

    assert_eq!(fs::read(fixture.db_path()).unwrap(), before);
}

#[test]
fn corrupt_database_is_repaired_from_local_generation() {
    let mut fixture = scenarios::populated_vault(3);
    let latest = fixture.db_fingerprint();

    fixture.corrupt_database();
    fixture.reopen();
    let report = fixture.ensure_available().unwrap();

    assert_eq!(report.outcome, RecoveryOutcome::RestoredLocal);
    assert_eq!(fixture.db_fingerprint(), latest);
    assert_eq!(note_count(&fixture), 3);
}

#[test]
fn lost_host_is_recovered_from_remote() {
    let mut fixture = scenarios::populated_vault(2);
    let latest = fixture.db_fingerprint();

    fixture.delete_database();
    fixture.delete_local_generations();
    fixture.reopen();
    let report = fixture.ensure_available().unwrap();

    assert_eq!(report.outcome, RecoveryOutcome::FetchedRemote);
    assert_eq!(fixture.db_fingerprint(), latest);
    assert_eq!(note_count(&fixture), 2);
}

#[test]
fn corrupt_local_generations_fall_through_to_remote() {
    let fixture = scenarios::populated_vault(2);
    let latest = fixture.db_fingerprint();

    fixture.corrupt_database();
    for slot in 1..=fixture.config().generations {
        if fixture.local_slot(slot).exists() {
            fs::write(fixture.local_slot(slot), b"garbage").unwrap();
        }
    }
    let report = fixture.ensure_available().unwrap();

    assert_eq!(report.outcome, RecoveryOutcome::FetchedRemote);
    assert_eq!(fixture.db_fingerprint(), latest);
}

#[test]
fn remote_outage_is_not_fatal() {
    let (fixture, flaky) = TestVault::with_faults();
    fixture.ensure_available().unwrap();
    flaky.go_offline();

    fixture.execute_write(NOTES_TABLE_SQL).unwrap();
    let outcome = fixture
        .execute_write("INSERT INTO notes(body) VALUES ('offline')")
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(fixture.local_fingerprint(1), outcome.fingerprint);
    assert!(fixture.remote.is_empty());
    assert_eq!(fixture.stats().remote_rotation_failures, 2);
    assert!(flaky.failures() > 0);

    flaky.heal();
    let backup = fixture.backup_now().unwrap();
    assert!(backup.remote_synced);
    assert_eq!(fixture.remote_fingerprint(1), Some(outcome.fingerprint));
}

#[test]
fn remote_outage_during_recovery_creates_empty_database() {
    let (fixture, flaky) = TestVault::with_faults();
    flaky.arm(FaultKind::Unauthorized, FaultScope::Reads);

    let report = fixture.ensure_available().unwrap();

    assert_eq!(report.outcome, RecoveryOutcome::CreatedEmpty);
    assert!(fixture.is_healthy());
}

#[test]
fn generations_never_exceed_configured_count() {
    let fixture = TestVault::with_config(|config| config.generations(2));
    fixture.ensure_available().unwrap();
    fixture.execute_write(NOTES_TABLE_SQL).unwrap();

    for i in 0..5 {
        fixture
            .execute_write(&format!("INSERT INTO notes(body) VALUES ('{i}')"))
            .unwrap();
    }

    assert_eq!(fixture.local_generations().list().unwrap().len(), 2);
    assert!(!fixture.local_slot(3).exists());
    let mut names = fixture.remote.names();
    names.sort();
    assert_eq!(names, vec!["db_1.sqlite", "db_2.sqlite"]);
}

#[test]
fn restore_now_rolls_back_to_newest_generation() {
    let fixture = scenarios::populated_vault(1);
    let saved = fixture.local_fingerprint(1);

    fixture.corrupt_database();
    assert!(!fixture.is_healthy());

    assert!(fixture.restore_now().unwrap());
    assert!(fixture.is_healthy());
    assert_eq!(fixture.db_fingerprint(), saved);
    assert_eq!(
        fixture.current_sync_state().unwrap().fingerprint,
        Some(saved)
    );
}

#[test]
fn users_survive_remote_recovery() {
    let mut fixture = TestVault::available();
    assert!(fixture.ensure_user("alice", "correct horse").unwrap());
    assert!(!fixture.ensure_user("alice", "other").unwrap());

    fixture.delete_database();
    fixture.delete_local_generations();
    fixture.reopen();
    fixture.ensure_available().unwrap();

    assert!(fixture.verify_credentials("alice", "correct horse").unwrap());
    assert!(!fixture.verify_credentials("alice", "other").unwrap());
}
