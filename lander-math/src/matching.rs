//! Descriptor correspondence via cross-checked nearest-neighbour matching.
//!
//! A pair `(i, j)` is kept only if train descriptor `j` is the nearest
//! neighbour of query descriptor `i` *and* query `i` is the nearest neighbour
//! of train `j`, which makes the resulting match set one-to-one.

use rayon::prelude::*;

/// A single descriptor correspondence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorMatch {
    /// Index into the query (older frame) descriptor set
    pub query_idx: usize,
    /// Index into the train (newer frame) descriptor set
    pub train_idx: usize,
    /// Euclidean distance between the two descriptors
    pub distance: f32,
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index and squared distance of the nearest candidate, if any.
fn nearest<D: AsRef<[f32]>>(needle: &[f32], haystack: &[D]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (j, candidate) in haystack.iter().enumerate() {
        let dist = squared_distance(needle, candidate.as_ref());
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((j, dist));
        }
    }
    best
}

/// Brute-force one-to-one matching between two descriptor sets.
///
/// Time complexity: O(n × m); the forward and backward passes run in parallel.
///
/// Matches are returned in query order. Empty input on either side yields no
/// matches.
pub fn cross_check_match<D>(query: &[D], train: &[D]) -> Vec<DescriptorMatch>
where
    D: AsRef<[f32]> + Sync,
{
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }

    let forward: Vec<Option<(usize, f32)>> = query
        .par_iter()
        .map(|q| nearest(q.as_ref(), train))
        .collect();
    let backward: Vec<Option<usize>> = train
        .par_iter()
        .map(|t| nearest(t.as_ref(), query).map(|(i, _)| i))
        .collect();

    forward
        .into_iter()
        .enumerate()
        .filter_map(|(i, best)| {
            let (j, dist) = best?;
            (backward[j] == Some(i)).then(|| DescriptorMatch {
                query_idx: i,
                train_idx: j,
                distance: dist.sqrt(),
            })
        })
        .collect()
}

/// Sort matches by ascending distance and keep at most `max_matches`.
pub fn keep_best_matches(mut matches: Vec<DescriptorMatch>, max_matches: usize) -> Vec<DescriptorMatch> {
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    matches.truncate(max_matches);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let descriptors: Vec<Vec<f32>> = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let matches = cross_check_match(&descriptors, &descriptors);
        let pairs: Vec<_> = matches.iter().map(|m| (m.query_idx, m.train_idx)).collect();
        assert_eq!(pairs, vec![(0, 0), (1, 1), (2, 2)]);
        assert!(matches.iter().all(|m| m.distance == 0.0));
    }

    #[test]
    fn test_cross_check_enforces_one_to_one() {
        // Both queries are closest to train[0]; only the closer one survives
        let query: Vec<Vec<f32>> = vec![vec![0.0, 0.0], vec![0.3, 0.0]];
        let train: Vec<Vec<f32>> = vec![vec![0.1, 0.0], vec![5.0, 5.0]];
        let matches = cross_check_match(&query, &train);
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].query_idx, matches[0].train_idx), (0, 0));
    }

    #[test]
    fn test_asymmetric_sizes() {
        let query: Vec<Vec<f32>> = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
        let train: Vec<Vec<f32>> = vec![vec![0.1, 0.0], vec![5.0, 5.0], vec![9.9, 10.0]];
        let pairs: Vec<_> = cross_check_match(&query, &train)
            .iter()
            .map(|m| (m.query_idx, m.train_idx))
            .collect();
        assert_eq!(pairs, vec![(0, 0), (1, 2)]);
    }

    #[test]
    fn test_empty_inputs() {
        let empty: Vec<Vec<f32>> = Vec::new();
        let some = vec![vec![1.0f32]];
        assert!(cross_check_match(&empty, &some).is_empty());
        assert!(cross_check_match(&some, &empty).is_empty());
    }

    #[test]
    fn test_keep_best_sorts_and_truncates() {
        let matches = vec![
            DescriptorMatch { query_idx: 0, train_idx: 0, distance: 0.5 },
            DescriptorMatch { query_idx: 1, train_idx: 1, distance: 0.1 },
            DescriptorMatch { query_idx: 2, train_idx: 2, distance: 0.3 },
        ];
        let best = keep_best_matches(matches, 2);
        let distances: Vec<_> = best.iter().map(|m| m.distance).collect();
        assert_eq!(distances, vec![0.1, 0.3]);
    }
}
