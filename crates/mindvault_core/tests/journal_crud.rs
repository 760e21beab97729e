use mindvault_core::db::open_db_in_memory;
use mindvault_core::{
    EntryStatus, JournalListQuery, JournalRecord, JournalRepository, MoodTag,
    SqliteJournalRepository, StoreError, ValidationError,
};
use uuid::Uuid;

fn entry(date: &str, content: &str, moods: Vec<MoodTag>) -> JournalRecord {
    JournalRecord::new("user-1", date, content, moods, "Monday", 1_700_000_000_000)
}

fn entry_count(conn: &rusqlite::Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM journal_entries;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn insert_then_get_round_trips_all_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    let mut record = entry(
        "2025-03-14",
        "wrote in the park",
        vec![MoodTag::Calm, MoodTag::Grateful],
    );
    record
        .metadata
        .insert("weather".to_string(), "sunny".to_string());
    record.draft_content = Some("unsent edit".to_string());

    let id = repo.insert(&record).unwrap();
    let stored = repo.get_by_id(id).unwrap().expect("entry should exist");

    assert_eq!(stored.id, record.id);
    assert_eq!(stored.user_id, "user-1");
    assert_eq!(stored.entry_date, "2025-03-14");
    assert_eq!(stored.content, "wrote in the park");
    assert_eq!(stored.moods, vec![MoodTag::Calm, MoodTag::Grateful]);
    assert_eq!(stored.metadata.get("weather").map(String::as_str), Some("sunny"));
    assert_eq!(stored.draft_content.as_deref(), Some("unsent edit"));
    assert_eq!(stored.status, EntryStatus::Finalized);
    assert_eq!(stored.created_at, stored.updated_at);
}

#[test]
fn insert_with_empty_mood_set_is_rejected_without_a_row() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteJournalRepository::new(&mut conn);
        let record = entry("2025-03-14", "moodless", vec![]);
        let err = repo.insert(&record).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::Journal(_))
        ));
    }
    assert_eq!(entry_count(&conn), 0);
}

#[test]
fn insert_with_empty_content_is_rejected_without_a_row() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteJournalRepository::new(&mut conn);
        let record = entry("2025-03-14", "   ", vec![MoodTag::Calm]);
        assert!(repo.insert(&record).is_err());
    }
    assert_eq!(entry_count(&conn), 0);
}

#[test]
fn update_replaces_fields_and_bumps_updated_at() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    let id = repo
        .insert(&entry("2025-03-14", "first draft", vec![MoodTag::Tired]))
        .unwrap();
    let mut stored = repo.get_by_id(id).unwrap().unwrap();
    stored.content = "second thoughts".to_string();
    stored.moods = vec![MoodTag::Hopeful];
    stored.status = EntryStatus::Archived;
    repo.update(&stored).unwrap();

    let after = repo.get_by_id(id).unwrap().unwrap();
    assert_eq!(after.content, "second thoughts");
    assert_eq!(after.moods, vec![MoodTag::Hopeful]);
    assert_eq!(after.status, EntryStatus::Archived);
    assert!(after.updated_at >= after.created_at);
}

#[test]
fn update_of_missing_entry_is_not_found_and_creates_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteJournalRepository::new(&mut conn);
        let ghost = entry("2025-03-14", "never stored", vec![MoodTag::Sad]);
        let err = repo.update(&ghost).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
    assert_eq!(entry_count(&conn), 0);
}

#[test]
fn delete_removes_row_and_missing_delete_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    let id = repo
        .insert(&entry("2025-03-14", "to be removed", vec![MoodTag::Angry]))
        .unwrap();
    repo.delete(id).unwrap();
    assert!(repo.get_by_id(id).unwrap().is_none());

    let err = repo.delete(Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn get_all_orders_by_date_descending() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    repo.insert(&entry("2025-01-05", "older", vec![MoodTag::Calm]))
        .unwrap();
    repo.insert(&entry("2025-02-10", "newer", vec![MoodTag::Calm]))
        .unwrap();
    repo.insert(&entry("2025-01-20", "middle", vec![MoodTag::Calm]))
        .unwrap();

    let all = repo.get_all().unwrap();
    let dates: Vec<&str> = all.iter().map(|e| e.entry_date.as_str()).collect();
    assert_eq!(dates, vec!["2025-02-10", "2025-01-20", "2025-01-05"]);
}

#[test]
fn date_range_and_month_queries_filter_correctly() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    repo.insert(&entry("2025-01-31", "january", vec![MoodTag::Calm]))
        .unwrap();
    repo.insert(&entry("2025-02-01", "february starts", vec![MoodTag::Calm]))
        .unwrap();
    repo.insert(&entry("2025-02-28", "february ends", vec![MoodTag::Calm]))
        .unwrap();
    repo.insert(&entry("2025-03-01", "march", vec![MoodTag::Calm]))
        .unwrap();

    let range = repo.get_by_date_range("2025-02-01", "2025-02-28").unwrap();
    assert_eq!(range.len(), 2);

    let feb = repo.get_by_month(2025, 2).unwrap();
    assert_eq!(feb.len(), 2);
    assert!(feb.iter().all(|e| e.entry_date.starts_with("2025-02")));
}

#[test]
fn mood_query_matches_whole_tags_only() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    repo.insert(&entry("2025-03-14", "quiet day", vec![MoodTag::Content]))
        .unwrap();
    repo.insert(&entry(
        "2025-03-15",
        "rough day",
        vec![MoodTag::Sad, MoodTag::Resilient],
    ))
    .unwrap();

    let resilient = repo.get_by_mood(MoodTag::Resilient).unwrap();
    assert_eq!(resilient.len(), 1);
    assert_eq!(resilient[0].entry_date, "2025-03-15");

    let content_only = repo.get_by_mood(MoodTag::Content).unwrap();
    assert_eq!(content_only.len(), 1);
    assert_eq!(content_only[0].entry_date, "2025-03-14");
}

#[test]
fn search_matches_content_draft_and_metadata() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    let mut with_meta = entry("2025-03-14", "plain body", vec![MoodTag::Calm]);
    with_meta
        .metadata
        .insert("insight".to_string(), "a pattern of persistence".to_string());
    repo.insert(&with_meta).unwrap();

    let mut with_draft = entry("2025-03-15", "another body", vec![MoodTag::Calm]);
    with_draft.draft_content = Some("persistence again, unsaved".to_string());
    repo.insert(&with_draft).unwrap();

    repo.insert(&entry("2025-03-16", "persistence in the body", vec![MoodTag::Calm]))
        .unwrap();
    repo.insert(&entry("2025-03-17", "unrelated", vec![MoodTag::Calm]))
        .unwrap();

    let hits = repo.search_by_text("persistence").unwrap();
    assert_eq!(hits.len(), 3);

    // LIKE wildcards in the needle must not widen the match.
    let literal = repo.search_by_text("100%").unwrap();
    assert!(literal.is_empty());
}

#[test]
fn list_combines_filters_with_pagination() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    for day in 1..=5 {
        repo.insert(&entry(
            &format!("2025-03-{day:02}"),
            "reflective note",
            vec![MoodTag::Reflective],
        ))
        .unwrap();
    }
    repo.insert(&entry("2025-03-06", "calm note", vec![MoodTag::Calm]))
        .unwrap();

    let query = JournalListQuery {
        mood: Some(MoodTag::Reflective),
        from_date: Some("2025-03-02".to_string()),
        to_date: Some("2025-03-05".to_string()),
        limit: Some(2),
        offset: 1,
        ..Default::default()
    };
    let page = repo.list(&query).unwrap();
    assert_eq!(page.len(), 2);
    // Date DESC within the range 02..=05, skipping the first row (05).
    assert_eq!(page[0].entry_date, "2025-03-04");
    assert_eq!(page[1].entry_date, "2025-03-03");

    let by_status = repo
        .list(&JournalListQuery {
            status: Some(EntryStatus::Draft),
            ..Default::default()
        })
        .unwrap();
    assert!(by_status.is_empty());
}

#[test]
fn batch_operations_run_as_single_transactions() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteJournalRepository::new(&mut conn);

    let records = vec![
        entry("2025-03-14", "batch one", vec![MoodTag::Calm]),
        entry("2025-03-15", "batch two", vec![MoodTag::Calm]),
        entry("2025-03-16", "batch three", vec![MoodTag::Calm]),
    ];
    let ids = repo.insert_many(&records).unwrap();
    assert_eq!(ids.len(), 3);

    // One missing id rolls the whole batch delete back.
    let err = repo
        .delete_many(&[ids[0], Uuid::new_v4(), ids[2]])
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert_eq!(repo.get_all().unwrap().len(), 3);

    repo.delete_many(&ids).unwrap();
    assert!(repo.get_all().unwrap().is_empty());
}

#[test]
fn batch_insert_rejects_whole_batch_on_one_invalid_record() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteJournalRepository::new(&mut conn);
        let records = vec![
            entry("2025-03-14", "fine", vec![MoodTag::Calm]),
            entry("2025-03-15", "", vec![MoodTag::Calm]),
        ];
        assert!(repo.insert_many(&records).is_err());
    }
    assert_eq!(entry_count(&conn), 0);
}
