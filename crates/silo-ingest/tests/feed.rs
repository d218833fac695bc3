//! End-to-end feed discovery over an in-memory object store: list a seeded
//! prefix, reduce to the ingestible set, download and normalize the winner.

use chrono::{NaiveDate, TimeZone, Utc};
use object_store::{memory::InMemory, path::Path, ObjectStore, PutPayload};
use std::collections::HashSet;

use silo_ingest::config::SourceEnv;
use silo_ingest::feed::{lister, normalize, selector};
use silo_ingest::table::ColumnType;

async fn seeded_store() -> InMemory {
    let store = InMemory::new();
    let objects: &[(&str, &'static [u8])] = &[
        (
            "prd/feed_20250122090000.csv",
            b"Osid|RS Rating\n111|10\n",
        ),
        (
            "prd/feed_20250122180000.csv",
            b"Osid|RS Rating\n222|20\n",
        ),
        (
            "prd/feed_20250123090000.csv",
            b"Osid|RS Rating\n123|98\n456|97\n",
        ),
        ("prd/notes.txt", b"not a feed"),
    ];
    for (key, body) in objects {
        store
            .put(&Path::from(*key), PutPayload::from(body.to_vec()))
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn discover_select_normalize() {
    let store = seeded_store().await;

    // discovery parses every key, malformed ones included
    let candidates = lister::list_candidates(&store, "prd").await.unwrap();
    assert_eq!(candidates.len(), 4);
    assert_eq!(
        candidates.iter().filter(|c| c.file_date.is_none()).count(),
        1
    );

    // cutoff drops the 22nd entirely, the 23rd survives as the sole entry
    // of a closed day
    let active: HashSet<String> = ["feed".to_string()].into();
    let selected = selector::select(
        candidates,
        &active,
        NaiveDate::from_ymd_opt(2025, 1, 23).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 24).unwrap(),
    );
    assert_eq!(selected.len(), 1);
    let winner = &selected[0];
    assert_eq!(winner.key, "prd/feed_20250123090000.csv");

    // download + normalize stamps provenance on every row
    let rep_date = Utc.with_ymd_and_hms(2025, 1, 24, 6, 0, 0).unwrap();
    let table = normalize::fetch_table(
        &store,
        winner,
        SourceEnv::Prd,
        normalize::Encodings::default(),
        rep_date,
    )
    .await
    .unwrap();

    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Osid",
            "RS_Rating",
            "source_env",
            "file_name",
            "file_date",
            "rep_date"
        ]
    );
    assert_eq!(table.columns[0].ty, ColumnType::BigInt);
    assert_eq!(table.len(), 2);
    for row in &table.rows {
        assert_eq!(row[2].as_deref(), Some("PRD"));
        assert_eq!(row[3].as_deref(), Some("feed"));
        assert_eq!(row[4].as_deref(), Some("20250123090000"));
        assert_eq!(row[5].as_deref(), Some(rep_date.to_rfc3339().as_str()));
    }
}

#[tokio::test]
async fn rerun_lists_identically() {
    let store = seeded_store().await;
    let first = lister::list_candidates(&store, "prd").await.unwrap();
    let second = lister::list_candidates(&store, "prd").await.unwrap();
    assert_eq!(first, second);
}
