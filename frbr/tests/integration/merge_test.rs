use chrono::{Duration, Utc};
use frbr::config::ClusterConfig;
use frbr::index::memory::MemoryIndex;
use frbr::index::{SearchIndex, WorkDocument};
use frbr::lock::memory::MemoryLockService;
use frbr::pipeline::{ClusterOutcome, ClusterPipeline};
use frbr::store::memory::MemoryStore;
use frbr::types::{Identifier, Record, Work};
use uuid::Uuid;

fn emma_record(source_id: &str) -> Record {
    let mut record = Record::new("test", source_id);
    record.title = Some("Emma".to_string());
    record.identifiers = vec!["9780000000001|isbn".to_string()];
    record.publisher = vec!["Macmillan|||".to_string()];
    record.dates = vec!["1900|publication_date".to_string()];
    record
}

fn existing_work(title: &str, age_hours: i64) -> Work {
    Work {
        id: None,
        uuid: Uuid::new_v4(),
        date_created: Utc::now() - Duration::hours(age_hours),
        title: title.to_string(),
        sort_title: title.to_lowercase(),
        alt_titles: Vec::new(),
        medium: None,
        series_data: Vec::new(),
        authors: Vec::new(),
        contributors: Vec::new(),
        subjects: Vec::new(),
        identifiers: vec![Identifier::new("isbn", "9780000000001")],
        languages: Vec::new(),
        measurements: Vec::new(),
        editions: Vec::new(),
    }
}

fn pipeline(
    store: &MemoryStore,
    locks: &MemoryLockService,
    index: &MemoryIndex,
) -> ClusterPipeline<MemoryStore, MemoryLockService, MemoryIndex> {
    ClusterPipeline::new(
        store.clone(),
        locks.clone(),
        index.clone(),
        ClusterConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn merge_adopts_the_oldest_work_and_deletes_the_rest() {
    telemetry::init_tracing();

    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let index = MemoryIndex::new();

    let oldest = store.insert_work(existing_work("Emma", 48)).await;
    let newer = store.insert_work(existing_work("Emma: a Novel", 24)).await;
    index
        .index_work(&WorkDocument::from_work(&oldest))
        .await
        .unwrap();
    index
        .index_work(&WorkDocument::from_work(&newer))
        .await
        .unwrap();

    let seed = store.insert_record(emma_record("1")).await;
    let outcome = pipeline(&store, &locks, &index)
        .cluster_record(seed.id.unwrap())
        .await
        .unwrap();

    let ClusterOutcome::Clustered { work, .. } = outcome else {
        panic!("expected a clustered outcome");
    };

    assert_eq!(work.id, oldest.id);
    assert_eq!(work.uuid, oldest.uuid);
    assert_eq!(work.date_created, oldest.date_created);
    assert_eq!(work.title, "Emma");

    let works = store.works().await;
    assert_eq!(works.len(), 1);
    assert_eq!(works[0].uuid, oldest.uuid);

    assert!(index.get_document(newer.uuid).await.is_none());
    let surviving = index.get_document(oldest.uuid).await.unwrap();
    assert_eq!(surviving.title, "Emma");
}

#[tokio::test]
async fn merge_sweeps_every_newer_work_sharing_an_identifier() {
    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let index = MemoryIndex::new();

    let oldest = store.insert_work(existing_work("Emma", 72)).await;
    let middle = store.insert_work(existing_work("Emma: a Novel", 48)).await;
    let newest = store.insert_work(existing_work("Emma (1900)", 24)).await;
    for work in [&oldest, &middle, &newest] {
        index.index_work(&WorkDocument::from_work(work)).await.unwrap();
    }

    let seed = store.insert_record(emma_record("1")).await;
    let outcome = pipeline(&store, &locks, &index)
        .cluster_record(seed.id.unwrap())
        .await
        .unwrap();

    let ClusterOutcome::Clustered { work, .. } = outcome else {
        panic!("expected a clustered outcome");
    };

    assert_eq!(work.id, oldest.id);
    assert_eq!(work.uuid, oldest.uuid);

    let works = store.works().await;
    assert_eq!(works.len(), 1);
    assert_eq!(works[0].uuid, oldest.uuid);

    assert!(index.get_document(middle.uuid).await.is_none());
    assert!(index.get_document(newest.uuid).await.is_none());
    assert!(index.get_document(oldest.uuid).await.is_some());
}

#[tokio::test]
async fn reclustering_is_idempotent() {
    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let index = MemoryIndex::new();

    let seed = store.insert_record(emma_record("1")).await;
    store.insert_record(emma_record("2")).await;

    let runner = pipeline(&store, &locks, &index);
    let ClusterOutcome::Clustered { work: first, .. } =
        runner.cluster_record(seed.id.unwrap()).await.unwrap()
    else {
        panic!("expected a clustered outcome");
    };
    let identifier_rows = store.identifier_rows().await;

    let ClusterOutcome::Clustered { work: second, .. } =
        runner.cluster_record(seed.id.unwrap()).await.unwrap()
    else {
        panic!("expected a clustered outcome");
    };

    assert_eq!(second.uuid, first.uuid);
    assert_eq!(store.works().await.len(), 1);
    assert_eq!(store.identifier_rows().await, identifier_rows);
    assert_eq!(index.document_count().await, 1);
}
