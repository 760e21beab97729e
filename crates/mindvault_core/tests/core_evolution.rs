use mindvault_core::db::open_db_in_memory;
use mindvault_core::{
    CoreId, CoreRepository, SqliteCoreRepository, StoreError, Trend, ALL_CORES,
};

#[test]
fn seeded_cores_start_neutral_and_complete() {
    let conn = open_db_in_memory().unwrap();
    let cores = SqliteCoreRepository::new(&conn);

    let all = cores.list_all().unwrap();
    assert_eq!(all.len(), ALL_CORES.len());

    for core in &all {
        assert_eq!(core.current_level, 0.0);
        assert_eq!(core.previous_level, 0.0);
        assert_eq!(core.trend, Trend::Stable);
        assert_eq!(core.entries_at_current_depth, 0);
        assert_eq!(core.last_transition_date, None);
        assert!(core.insight.is_empty());
        assert!(!core.name.is_empty());
        assert!(!core.description.is_empty());
        assert!(!core.related_cores.contains(&core.id));
        assert!(!core.related_cores.is_empty());
    }
}

#[test]
fn get_returns_one_core_with_seed_metadata() {
    let conn = open_db_in_memory().unwrap();
    let cores = SqliteCoreRepository::new(&conn);

    let resilience = cores.get(CoreId::Resilience).unwrap();
    assert_eq!(resilience.id, CoreId::Resilience);
    assert_eq!(resilience.name, "Resilience");
    assert!(resilience.color.starts_with('#'));
    assert!(resilience.icon_path.ends_with(".svg"));
}

#[test]
fn get_of_unseeded_core_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("DELETE FROM aggregate_cores WHERE id = 'curiosity';", [])
        .unwrap();

    let cores = SqliteCoreRepository::new(&conn);
    let err = cores.get(CoreId::Curiosity).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn update_insight_stores_text_and_evidence() {
    let conn = open_db_in_memory().unwrap();
    let cores = SqliteCoreRepository::new(&conn);

    cores
        .update_insight(
            CoreId::Empathy,
            "listens more in conflict",
            Some("three entries mention pausing before replying"),
            None,
        )
        .unwrap();

    let empathy = cores.get(CoreId::Empathy).unwrap();
    assert_eq!(empathy.insight, "listens more in conflict");
    assert_eq!(
        empathy.transition_signals.as_deref(),
        Some("three entries mention pausing before replying")
    );
    assert_eq!(empathy.supporting_evidence, None);
    assert!(empathy.updated_at >= empathy.created_at);
}

#[test]
fn update_insight_of_missing_core_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("DELETE FROM aggregate_cores WHERE id = 'discipline';", [])
        .unwrap();

    let cores = SqliteCoreRepository::new(&conn);
    let err = cores
        .update_insight(CoreId::Discipline, "never lands", None, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn insight_text_is_searchable_as_literal_substring() {
    let conn = open_db_in_memory().unwrap();
    let cores = SqliteCoreRepository::new(&conn);

    cores
        .update_insight(
            CoreId::Empathy,
            "a pattern of persistence in conflict",
            None,
            None,
        )
        .unwrap();
    cores
        .update_insight(CoreId::Curiosity, "asks sharper questions", None, None)
        .unwrap();

    let hits = cores.search_insights("persistence").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, CoreId::Empathy);

    // LIKE wildcards in the needle must not widen the match.
    assert!(cores.search_insights("100%").unwrap().is_empty());
}

#[test]
fn transition_history_is_empty_on_fresh_store() {
    let conn = open_db_in_memory().unwrap();
    let cores = SqliteCoreRepository::new(&conn);

    for core in ALL_CORES {
        assert!(cores.transition_history(core).unwrap().is_empty());
    }
    assert!(cores.transition_history_all().unwrap().is_empty());
}
