use frbr::blocking::CandidateFinder;
use frbr::config::ClusterConfig;
use frbr::error::ErrorKind;
use frbr::lock::memory::MemoryLockService;
use frbr::store::memory::MemoryStore;
use frbr::types::Record;

fn record(source_id: &str, title: &str, identifiers: &[&str]) -> Record {
    let mut record = Record::new("test", source_id);
    record.title = Some(title.to_string());
    record.identifiers = identifiers.iter().map(|id| id.to_string()).collect();
    record
}

#[tokio::test]
async fn blocking_walks_up_to_the_configured_hop_distance() {
    telemetry::init_tracing();

    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let config = ClusterConfig::default();

    let seed = store
        .insert_record(record("1", "Emma", &["1|isbn"]))
        .await;
    let hop1 = store
        .insert_record(record("2", "Emma", &["1|isbn", "2|oclc"]))
        .await;
    let hop2 = store
        .insert_record(record("3", "Emma", &["2|oclc", "3|lccn"]))
        .await;
    let hop3 = store
        .insert_record(record("4", "Emma", &["3|lccn", "4|owi"]))
        .await;
    let hop4 = store
        .insert_record(record("5", "Emma", &["4|owi", "5|issn"]))
        .await;
    let hop5 = store
        .insert_record(record("6", "Emma", &["5|issn"]))
        .await;

    let candidates = CandidateFinder::new(&store, &locks, &config)
        .find_candidates(&seed)
        .await
        .unwrap();

    assert!(candidates.contains(&seed.id.unwrap()));
    assert!(candidates.contains(&hop1.id.unwrap()));
    assert!(candidates.contains(&hop2.id.unwrap()));
    assert!(candidates.contains(&hop3.id.unwrap()));
    assert!(candidates.contains(&hop4.id.unwrap()));
    assert!(!candidates.contains(&hop5.id.unwrap()));
}

#[tokio::test]
async fn direct_matches_are_unconditional_but_transitive_hops_need_titles() {
    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let config = ClusterConfig::default();

    let seed = store
        .insert_record(record("1", "Pride and Prejudice", &["1|isbn"]))
        .await;
    let direct = store
        .insert_record(record("2", "Pride and Prejudice: A Novel", &["1|isbn", "2|oclc"]))
        .await;
    let transitive_match = store
        .insert_record(record("3", "Pride and Prejudice", &["2|oclc", "3|lccn"]))
        .await;
    let transitive_unrelated = store
        .insert_record(record("4", "Moby Dick", &["2|oclc", "4|owi"]))
        .await;
    let beyond_unrelated = store
        .insert_record(record("5", "Pride and Prejudice", &["4|owi"]))
        .await;

    let candidates = CandidateFinder::new(&store, &locks, &config)
        .find_candidates(&seed)
        .await
        .unwrap();

    assert!(candidates.contains(&seed.id.unwrap()));
    assert!(candidates.contains(&direct.id.unwrap()));
    assert!(candidates.contains(&transitive_match.id.unwrap()));
    // Rejected on title overlap, and its identifiers are never re-queued.
    assert!(!candidates.contains(&transitive_unrelated.id.unwrap()));
    assert!(!candidates.contains(&beyond_unrelated.id.unwrap()));
}

#[tokio::test]
async fn unreliable_authorities_never_drive_matching() {
    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let config = ClusterConfig::default();

    let seed = store
        .insert_record(record("1", "Emma", &["1|doab"]))
        .await;
    store
        .insert_record(record("2", "Emma", &["1|doab"]))
        .await;

    let candidates = CandidateFinder::new(&store, &locks, &config)
        .find_candidates(&seed)
        .await
        .unwrap();

    assert_eq!(candidates, vec![seed.id.unwrap()]);
}

#[tokio::test]
async fn oversized_pools_fail_rather_than_truncate() {
    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let config = ClusterConfig {
        max_candidate_records: 2,
        ..ClusterConfig::default()
    };

    let seed = store
        .insert_record(record("1", "Emma", &["1|isbn"]))
        .await;
    for n in 2..=5 {
        store
            .insert_record(record(&n.to_string(), "Emma", &["1|isbn"]))
            .await;
    }

    let err = CandidateFinder::new(&store, &locks, &config)
        .find_candidates(&seed)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CandidatePoolTooLarge);
}

#[tokio::test]
async fn blocking_is_symmetric_over_the_neighborhood() {
    let store = MemoryStore::new();
    let locks = MemoryLockService::new();
    let config = ClusterConfig::default();

    let a = store
        .insert_record(record("1", "Emma", &["1|isbn", "2|oclc"]))
        .await;
    let b = store
        .insert_record(record("2", "Emma", &["2|oclc", "3|lccn"]))
        .await;

    let finder = CandidateFinder::new(&store, &locks, &config);
    let mut from_a = finder.find_candidates(&a).await.unwrap();
    let mut from_b = finder.find_candidates(&b).await.unwrap();
    from_a.sort_unstable();
    from_b.sort_unstable();

    assert_eq!(from_a, from_b);
}
