use frbr::config::ClusterConfig;
use frbr::index::memory::MemoryIndex;
use frbr::lock::memory::MemoryLockService;
use frbr::pipeline::{ClusterOutcome, ClusterPipeline};
use frbr::store::memory::MemoryStore;
use frbr::types::{FrbrStatus, Record, RecordState};

fn emma_record(source: &str, source_id: &str) -> Record {
    let mut record = Record::new(source, source_id);
    record.title = Some("Emma".to_string());
    record.identifiers = vec!["9780000000001|isbn".to_string()];
    record.publisher = vec!["Macmillan|||".to_string()];
    record.spatial = Some("London".to_string());
    record.dates = vec!["1900|publication_date".to_string()];
    record.authors = vec!["Austen, Jane|||author".to_string()];
    record.languages = vec!["eng".to_string()];
    record.has_part = vec![format!(
        "1|https://example.org/{source}/{source_id}.epub|{source}|application/epub+zip|{{\"reader\": true}}"
    )];
    record
}

#[tokio::test]
async fn three_sources_cluster_into_one_work_with_one_edition() {
    telemetry::init_tracing();

    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let index = MemoryIndex::new();

    let seed = store.insert_record(emma_record("gutenberg", "1")).await;
    let second = store.insert_record(emma_record("hathitrust", "2")).await;
    let third = store.insert_record(emma_record("nypl", "3")).await;

    let pipeline = ClusterPipeline::new(
        store.clone(),
        locks.clone(),
        index.clone(),
        ClusterConfig::default(),
    )
    .unwrap();

    let outcome = pipeline.cluster_record(seed.id.unwrap()).await.unwrap();
    let ClusterOutcome::Clustered { work, records } = outcome else {
        panic!("expected a clustered outcome");
    };

    assert_eq!(records.len(), 3);
    assert_eq!(work.title, "Emma");
    assert_eq!(work.sort_title, "emma");
    assert_eq!(work.authors.len(), 1);
    assert_eq!(work.authors[0].name, "Austen, Jane");
    assert_eq!(work.languages.len(), 1);
    assert_eq!(work.languages[0].language.as_deref(), Some("English"));

    // All three records describe the same 1900 Macmillan printing.
    assert_eq!(work.editions.len(), 1);
    let edition = &work.editions[0];
    assert_eq!(
        edition.publication_date.map(|date| date.to_string()),
        Some("1900-01-01".to_string())
    );
    assert_eq!(edition.publication_place.as_deref(), Some("London"));
    assert_eq!(edition.items.len(), 3);
    assert_eq!(edition.dcdw_uuids.len(), 3);

    // The shared isbn collapses to a single canonical row everywhere.
    assert_eq!(work.identifiers.len(), 1);
    assert_eq!(edition.identifiers.len(), 1);
    assert_eq!(store.identifier_rows().await, 1);
    assert_eq!(store.link_rows().await, 3);

    for id in [seed.id.unwrap(), second.id.unwrap(), third.id.unwrap()] {
        let record = store.get_record(id).await.unwrap();
        assert!(record.cluster_status);
        assert_eq!(record.frbr_status, FrbrStatus::Complete);
        assert_eq!(record.state, RecordState::Clustered);
    }

    let document = index.get_document(work.uuid).await.unwrap();
    assert_eq!(document.title, "Emma");
    assert!(document.suggest.contains(&"Emma".to_string()));
    assert_eq!(document.editions.len(), 1);
    assert_eq!(document.editions[0].item_count, 3);
}

#[tokio::test]
async fn different_printings_split_into_separate_editions() {
    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let index = MemoryIndex::new();

    let seed = store.insert_record(emma_record("gutenberg", "1")).await;
    store.insert_record(emma_record("gutenberg", "2")).await;
    let mut reprint = emma_record("penguin", "3");
    reprint.publisher = vec!["Penguin|||".to_string()];
    reprint.spatial = Some("New York".to_string());
    reprint.dates = vec!["1950|publication_date".to_string()];
    store.insert_record(reprint.clone()).await;
    let mut reprint_dup = reprint.clone();
    reprint_dup.uuid = uuid::Uuid::new_v4();
    reprint_dup.source_id = "4".to_string();
    store.insert_record(reprint_dup).await;

    let pipeline = ClusterPipeline::new(
        store.clone(),
        locks.clone(),
        index.clone(),
        ClusterConfig::default(),
    )
    .unwrap();

    let outcome = pipeline.cluster_record(seed.id.unwrap()).await.unwrap();
    let ClusterOutcome::Clustered { work, .. } = outcome else {
        panic!("expected a clustered outcome");
    };

    assert_eq!(work.editions.len(), 2);
    assert_eq!(
        work.editions[0]
            .publication_date
            .map(|date| date.to_string()),
        Some("1900-01-01".to_string())
    );
    assert_eq!(
        work.editions[1]
            .publication_date
            .map(|date| date.to_string()),
        Some("1950-01-01".to_string())
    );
    assert_eq!(work.editions[0].dcdw_uuids.len(), 2);
    assert_eq!(work.editions[1].dcdw_uuids.len(), 2);
}
