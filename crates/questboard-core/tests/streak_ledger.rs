//! Streak ledger persistence tests against real SQLite files.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use questboard_core::ledger::{DayBoundary, DAILY_RITUAL, TASK_COMPLETION};
use questboard_core::{CommitError, Database, DatabaseError};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("questboard.db");

    {
        let mut db = Database::open_at(&path).unwrap();
        db.record_completion("u1", DAILY_RITUAL, day(2024, 1, 30)).unwrap();
        db.record_completion("u1", DAILY_RITUAL, day(2024, 1, 31)).unwrap();
    }

    let mut db = Database::open_at(&path).unwrap();
    let ledger = db.ledger("u1", DAILY_RITUAL).unwrap().unwrap();
    assert_eq!(ledger.state.current_streak, 2);
    assert_eq!(ledger.state.last_completion_date, Some(day(2024, 1, 31)));

    // Month boundary is just another consecutive day.
    let update = db.record_completion("u1", DAILY_RITUAL, day(2024, 2, 1)).unwrap();
    assert_eq!(update.state.current_streak, 3);
    assert_eq!(update.state.longest_streak, 3);
}

#[test]
fn ledgers_are_independent_per_key_and_user() {
    let mut db = Database::open_memory().unwrap();
    db.record_completion("u1", DAILY_RITUAL, day(2024, 6, 1)).unwrap();
    db.record_completion("u1", TASK_COMPLETION, day(2024, 6, 1)).unwrap();
    db.record_completion("u1", TASK_COMPLETION, day(2024, 6, 2)).unwrap();
    db.record_completion("u2", DAILY_RITUAL, day(2024, 6, 2)).unwrap();

    let mine = db.ledgers_for_user("u1").unwrap();
    assert_eq!(mine.len(), 2);
    let tasks = db.ledger("u1", TASK_COMPLETION).unwrap().unwrap();
    assert_eq!(tasks.state.current_streak, 2);
    let ritual = db.ledger("u1", DAILY_RITUAL).unwrap().unwrap();
    assert_eq!(ritual.state.current_streak, 1);
    assert!(db.ledger("u3", DAILY_RITUAL).unwrap().is_none());
}

#[test]
fn replayed_key_returns_original_result_on_a_later_day() {
    let mut db = Database::open_memory().unwrap();
    let first = db
        .record_completion_once("hold-1", "u1", DAILY_RITUAL, day(2024, 6, 1))
        .unwrap();
    let replay = db
        .record_completion_once("hold-1", "u1", DAILY_RITUAL, day(2024, 6, 2))
        .unwrap();
    assert_eq!(replay, first);

    let ledger = db.ledger("u1", DAILY_RITUAL).unwrap().unwrap();
    assert_eq!(ledger.state.total_completions, 1);
    assert_eq!(db.receipt_count("u1", DAILY_RITUAL).unwrap(), 1);
}

#[test]
fn key_reused_for_another_ledger_is_rejected() {
    let mut db = Database::open_memory().unwrap();
    db.record_completion_once("hold-1", "u1", DAILY_RITUAL, day(2024, 6, 1))
        .unwrap();
    let err = db
        .record_completion_once("hold-1", "u1", TASK_COMPLETION, day(2024, 6, 1))
        .unwrap_err();
    assert!(matches!(err, DatabaseError::CorruptRow { .. }));

    let commit_err: CommitError = err.into();
    assert!(!commit_err.is_retryable());
    assert!(db.ledger("u1", TASK_COMPLETION).unwrap().is_none());
}

#[test]
fn day_boundary_decides_which_day_a_completion_lands_on() {
    // 23:30 UTC on March 1st is already March 2nd at UTC+9.
    let instant = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
    let utc = DayBoundary::utc();
    let tokyo = DayBoundary::from_offset_minutes(9 * 60).unwrap();
    assert_eq!(utc.day_of(instant), day(2024, 3, 1));
    assert_eq!(tokyo.day_of(instant), day(2024, 3, 2));

    let mut db = Database::open_memory().unwrap();
    db.record_completion("u1", DAILY_RITUAL, day(2024, 3, 1)).unwrap();
    let update = db
        .record_completion("u1", DAILY_RITUAL, tokyo.day_of(instant))
        .unwrap();
    assert!(update.applied);
    assert_eq!(update.state.current_streak, 2);
}

proptest! {
    #[test]
    fn stored_ledger_matches_pure_rule(gaps in proptest::collection::vec(0i64..4, 1..40)) {
        let mut db = Database::open_memory().unwrap();
        let mut today = day(2024, 1, 1);
        let mut expected = questboard_core::LedgerState::default();
        for gap in gaps {
            today += chrono::Duration::days(gap);
            expected = expected.apply_completion(today).state;
            let stored = db.record_completion("u1", DAILY_RITUAL, today).unwrap();
            prop_assert_eq!(stored.state, expected);
            prop_assert!(stored.state.longest_streak >= stored.state.current_streak);
        }
        let ledger = db.ledger("u1", DAILY_RITUAL).unwrap().unwrap();
        prop_assert_eq!(ledger.state, expected);
    }
}
