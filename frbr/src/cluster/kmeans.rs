//! Lloyd's k-means with multiple restarts and silhouette scoring.

use rand::rngs::StdRng;
use rand::seq::index::sample;

use crate::bail;
use crate::error::{ErrorKind, FrbrResult};

const MAX_ITERATIONS: usize = 100;
const RESTARTS: usize = 3;

/// Number of points above which the silhouette score is computed on a sample.
pub const SILHOUETTE_SAMPLE_CAP: usize = 1000;

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    squared_distance(a, b).sqrt()
}

fn distinct_vectors(vectors: &[Vec<f64>]) -> usize {
    let mut seen: Vec<&Vec<f64>> = Vec::new();
    for vector in vectors {
        if !seen.contains(&vector) {
            seen.push(vector);
        }
    }
    seen.len()
}

/// Partitions the vectors into `k` clusters and returns per-vector labels.
///
/// Runs Lloyd's algorithm from several random initializations and keeps the
/// assignment with the lowest inertia. Fails with
/// [`ErrorKind::DegenerateClustering`] when `k` exceeds the number of
/// distinct vectors, since no non-empty partition exists.
pub fn fit(vectors: &[Vec<f64>], k: usize, rng: &mut StdRng) -> FrbrResult<Vec<usize>> {
    if k == 0 || vectors.is_empty() {
        bail!(
            ErrorKind::DegenerateClustering,
            "Clustering requires at least one cluster and one vector"
        );
    }
    if k == 1 {
        return Ok(vec![0; vectors.len()]);
    }
    if k > distinct_vectors(vectors) {
        bail!(
            ErrorKind::DegenerateClustering,
            "Requested more clusters than distinct vectors",
            format!("k = {k}")
        );
    }

    let mut best: Option<(Vec<usize>, f64)> = None;

    for _ in 0..RESTARTS {
        let (labels, inertia) = lloyd(vectors, k, rng);

        if best
            .as_ref()
            .map(|(_, best_inertia)| inertia < *best_inertia)
            .unwrap_or(true)
        {
            best = Some((labels, inertia));
        }
    }

    Ok(best.map(|(labels, _)| labels).unwrap_or_default())
}

fn lloyd(vectors: &[Vec<f64>], k: usize, rng: &mut StdRng) -> (Vec<usize>, f64) {
    let dims = vectors[0].len();

    let mut centroids: Vec<Vec<f64>> = sample(rng, vectors.len(), k)
        .into_iter()
        .map(|index| vectors[index].clone())
        .collect();
    let mut labels = vec![0usize; vectors.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (index, vector) in vectors.iter().enumerate() {
            let nearest = centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    squared_distance(vector, a)
                        .partial_cmp(&squared_distance(vector, b))
                        .expect("finite distances")
                })
                .map(|(cluster, _)| cluster)
                .unwrap_or(0);

            if labels[index] != nearest {
                labels[index] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (vector, label) in vectors.iter().zip(&labels) {
            counts[*label] += 1;
            for (dim, value) in vector.iter().enumerate() {
                sums[*label][dim] += value;
            }
        }

        for cluster in 0..k {
            if counts[cluster] == 0 {
                // Re-seed an empty cluster from the point farthest from its
                // centroid.
                let farthest = vectors
                    .iter()
                    .enumerate()
                    .max_by(|(i, a), (j, b)| {
                        squared_distance(a, &centroids[labels[*i]])
                            .partial_cmp(&squared_distance(b, &centroids[labels[*j]]))
                            .expect("finite distances")
                    })
                    .map(|(index, _)| index)
                    .unwrap_or(0);

                centroids[cluster] = vectors[farthest].clone();
                changed = true;
            } else {
                for dim in 0..dims {
                    centroids[cluster][dim] = sums[cluster][dim] / counts[cluster] as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let inertia = vectors
        .iter()
        .zip(&labels)
        .map(|(vector, label)| squared_distance(vector, &centroids[*label]))
        .sum();

    (labels, inertia)
}

/// Mean silhouette coefficient of a labeled partition, in `[-1, 1]`.
///
/// Pools above [`SILHOUETTE_SAMPLE_CAP`] are scored on a random sample, with
/// distances computed within the sample. Points in singleton clusters score
/// zero; a partition with fewer than two represented clusters scores zero.
pub fn silhouette(vectors: &[Vec<f64>], labels: &[usize], rng: &mut StdRng) -> f64 {
    let indices: Vec<usize> = if vectors.len() > SILHOUETTE_SAMPLE_CAP {
        sample(rng, vectors.len(), SILHOUETTE_SAMPLE_CAP).into_vec()
    } else {
        (0..vectors.len()).collect()
    };

    let sampled_labels: Vec<usize> = indices.iter().map(|index| labels[*index]).collect();
    let mut clusters: Vec<usize> = sampled_labels.clone();
    clusters.sort_unstable();
    clusters.dedup();
    if clusters.len() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for (position, &index) in indices.iter().enumerate() {
        let own_label = sampled_labels[position];

        let mut intra_sum = 0.0;
        let mut intra_count = 0usize;
        let mut inter: Vec<(usize, f64, usize)> =
            clusters.iter().map(|label| (*label, 0.0, 0)).collect();

        for (other_position, &other_index) in indices.iter().enumerate() {
            if position == other_position {
                continue;
            }
            let d = distance(&vectors[index], &vectors[other_index]);
            let other_label = sampled_labels[other_position];

            if other_label == own_label {
                intra_sum += d;
                intra_count += 1;
            } else {
                let slot = inter
                    .iter_mut()
                    .find(|(label, _, _)| *label == other_label)
                    .expect("label present in cluster list");
                slot.1 += d;
                slot.2 += 1;
            }
        }

        if intra_count == 0 {
            continue;
        }

        let a = intra_sum / intra_count as f64;
        let b = inter
            .iter()
            .filter(|(_, _, count)| *count > 0)
            .map(|(_, sum, count)| sum / *count as f64)
            .fold(f64::INFINITY, f64::min);

        total += (b - a) / a.max(b);
    }

    total / indices.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 5.0],
            vec![5.0, 5.1],
        ]
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let vectors = two_blobs();
        let mut rng = StdRng::seed_from_u64(7);

        let labels = fit(&vectors, 2, &mut rng).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn single_cluster_labels_everything_zero() {
        let vectors = two_blobs();
        let mut rng = StdRng::seed_from_u64(7);

        let labels = fit(&vectors, 1, &mut rng).unwrap();

        assert!(labels.iter().all(|label| *label == 0));
    }

    #[test]
    fn rejects_more_clusters_than_distinct_vectors() {
        let vectors = vec![vec![1.0], vec![1.0], vec![2.0]];
        let mut rng = StdRng::seed_from_u64(7);

        let err = fit(&vectors, 3, &mut rng).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DegenerateClustering);
    }

    #[test]
    fn silhouette_prefers_the_natural_split() {
        let vectors = two_blobs();
        let mut rng = StdRng::seed_from_u64(7);

        let natural = silhouette(&vectors, &[0, 0, 0, 1, 1, 1], &mut rng);
        let crossed = silhouette(&vectors, &[0, 1, 0, 1, 0, 1], &mut rng);

        assert!(natural > 0.8);
        assert!(natural > crossed);
    }

    #[test]
    fn degenerate_partition_scores_zero() {
        let vectors = two_blobs();
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(silhouette(&vectors, &[0; 6], &mut rng), 0.0);
    }
}
