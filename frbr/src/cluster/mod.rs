//! Edition clustering over a candidate pool.
//!
//! Records are embedded into a feature space (place, publisher, edition
//! statement, publication year), partitioned with k-means, and each cluster
//! is split by publication year label into edition groups. The cluster count
//! is chosen by a silhouette-guided binary search, bounded by an adaptive cap
//! that shrinks relative to pool size.

pub mod features;
pub mod kmeans;

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ClusterConfig;
use crate::conversions::date;
use crate::error::{ErrorKind, FrbrResult};
use crate::types::Record;

/// Fixed seed keeps clustering runs reproducible for a given pool.
const CLUSTER_SEED: u64 = 0x5eed_f8b5;

/// One edition group produced by clustering: the records of a single k-means
/// cluster sharing a publication year label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditionCluster {
    /// Year label such as `"1900"`, `"1900-1905"`, or `"190x"`; [`None`] when
    /// no publication year is known.
    pub year_label: Option<String>,
    pub record_uuids: Vec<Uuid>,
}

/// Groups a candidate pool into edition clusters.
pub struct EditionClusterer<'a> {
    config: &'a ClusterConfig,
}

impl<'a> EditionClusterer<'a> {
    pub fn new(config: &'a ClusterConfig) -> Self {
        Self { config }
    }

    /// Clusters the pool and returns edition groups ordered by year label.
    pub fn cluster(&self, records: &[Record]) -> FrbrResult<Vec<EditionCluster>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        if records.len() == 1 {
            return Ok(group_by_year(records, &[0]));
        }

        let matrix = features::feature_matrix(records);
        let mut rng = StdRng::seed_from_u64(CLUSTER_SEED);

        let max_k = self.max_clusters(records.len());
        let labels = if max_k < 2 {
            vec![0; records.len()]
        } else {
            let k = select_k(&matrix, max_k, &mut rng);
            match kmeans::fit(&matrix, k, &mut rng) {
                Ok(labels) => labels,
                Err(err) if err.kind() == ErrorKind::DegenerateClustering => {
                    // A pool of identical vectors is one edition.
                    warn!(%err, "clustering degenerated, folding pool into one cluster");
                    vec![0; records.len()]
                }
                Err(err) => return Err(err),
            }
        };

        debug!(
            pool = records.len(),
            clusters = labels.iter().max().map(|m| m + 1).unwrap_or(0),
            "clustered candidate pool"
        );

        Ok(group_by_year(records, &labels))
    }

    /// Adaptive cluster cap: large pools get proportionally fewer clusters,
    /// stepping down through ninths of the pool size.
    fn max_clusters(&self, pool_size: usize) -> usize {
        let adaptive = if pool_size > 5000 {
            pool_size / 9
        } else if pool_size > 1000 {
            pool_size * 2 / 9
        } else if pool_size > 500 {
            pool_size * 3 / 9
        } else if pool_size > 250 {
            pool_size * 4 / 9
        } else {
            pool_size
        };

        adaptive.min(self.config.max_clusters)
    }
}

/// Silhouette-guided binary search for the cluster count.
///
/// Scores both interval endpoints and moves the worse-scoring endpoint to
/// the midpoint until the interval closes. Counts that degenerate score as
/// unusable; when nothing clusters, the search settles on one cluster.
fn select_k(matrix: &[Vec<f64>], max_k: usize, rng: &mut StdRng) -> usize {
    let score_at = |k: usize, rng: &mut StdRng| -> f64 {
        match kmeans::fit(matrix, k, rng) {
            Ok(labels) => kmeans::silhouette(matrix, &labels, rng),
            Err(_) => -1.0,
        }
    };

    let mut low = 2usize;
    let mut high = max_k;
    let mut low_score = score_at(low, rng);
    let mut high_score = score_at(high, rng);

    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if low_score >= high_score {
            high = mid;
            high_score = score_at(high, rng);
        } else {
            low = mid;
            low_score = score_at(low, rng);
        }
    }

    let (k, best) = if low_score >= high_score {
        (low, low_score)
    } else {
        (high, high_score)
    };

    if best < 0.0 { 1 } else { k }
}

/// Splits each k-means cluster by publication year label and orders the
/// resulting edition groups by year, unknown years last.
fn group_by_year(records: &[Record], labels: &[usize]) -> Vec<EditionCluster> {
    let mut groups: BTreeMap<(usize, Option<String>), Vec<Uuid>> = BTreeMap::new();

    for (record, label) in records.iter().zip(labels) {
        let year_label = date::publication_year_span(&record.dates).map(|span| span.label());
        groups
            .entry((*label, year_label))
            .or_default()
            .push(record.uuid);
    }

    let mut clusters: Vec<EditionCluster> = groups
        .into_iter()
        .map(|((_, year_label), record_uuids)| EditionCluster {
            year_label,
            record_uuids,
        })
        .collect();

    clusters.sort_by(|a, b| match (&a.year_label, &b.year_label) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;

    fn record(source_id: &str, publisher: &str, year: &str) -> Record {
        let mut record = Record::new("test", source_id);
        record.title = Some("Emma".to_string());
        record.publisher = vec![format!("{publisher}|||")];
        record.dates = vec![format!("{year}|publication_date")];
        record
    }

    #[test]
    fn single_record_forms_one_edition() {
        let config = ClusterConfig::default();
        let records = vec![record("1", "Macmillan", "1900")];

        let clusters = EditionClusterer::new(&config).cluster(&records).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].year_label.as_deref(), Some("1900"));
        assert_eq!(clusters[0].record_uuids, vec![records[0].uuid]);
    }

    #[test]
    fn identical_records_fold_into_one_edition() {
        let config = ClusterConfig::default();
        let records = vec![
            record("1", "Macmillan", "1900"),
            record("2", "Macmillan", "1900"),
            record("3", "Macmillan", "1900"),
        ];

        let clusters = EditionClusterer::new(&config).cluster(&records).unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].record_uuids.len(), 3);
    }

    #[test]
    fn distinct_publication_years_split_editions() {
        let config = ClusterConfig::default();
        let records = vec![
            record("1", "Macmillan", "1900"),
            record("2", "Macmillan", "1900"),
            record("3", "Penguin", "1950"),
            record("4", "Penguin", "1950"),
        ];

        let clusters = EditionClusterer::new(&config).cluster(&records).unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].year_label.as_deref(), Some("1900"));
        assert_eq!(clusters[1].year_label.as_deref(), Some("1950"));
        assert_eq!(clusters[0].record_uuids.len(), 2);
        assert_eq!(clusters[1].record_uuids.len(), 2);
    }

    #[test]
    fn unknown_years_sort_last() {
        let config = ClusterConfig::default();
        let mut undated = record("1", "Macmillan", "1900");
        undated.dates.clear();
        let records = vec![undated, record("2", "Macmillan", "1900")];

        let clusters = EditionClusterer::new(&config).cluster(&records).unwrap();

        assert_eq!(clusters.last().unwrap().year_label, None);
    }

    #[test]
    fn k_search_narrows_to_the_stronger_endpoint() {
        let matrix = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 5.0],
            vec![5.0, 5.1],
        ];
        let mut rng = StdRng::seed_from_u64(CLUSTER_SEED);

        assert_eq!(select_k(&matrix, 6, &mut rng), 2);
    }

    #[test]
    fn adaptive_cap_shrinks_with_pool_size() {
        let config = ClusterConfig::default();
        let clusterer = EditionClusterer::new(&config);

        assert_eq!(clusterer.max_clusters(100), 100);
        assert_eq!(clusterer.max_clusters(300), 133);
        assert_eq!(clusterer.max_clusters(600), 200);
        assert_eq!(clusterer.max_clusters(2000), 444);
        assert_eq!(clusterer.max_clusters(6000), 666);
        assert_eq!(clusterer.max_clusters(9000), 1000);
    }
}
