//! Vector similarity, nearest-neighbour ranking and single-link clustering
//!
//! None of these functions fail: mismatched lengths and zero-norm vectors
//! yield a neutral result (cosine 0, infinite distance), which callers treat
//! as "unrelated".

use serde::{Deserialize, Serialize};

/// Pairwise comparison of two vectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    /// Normalized dot product in [-1, 1]
    pub cosine: f32,

    /// L2 norm of the difference
    pub euclidean_distance: f32,
}

impl Similarity {
    /// Result reported for incomparable vectors
    pub const UNRELATED: Similarity = Similarity {
        cosine: 0.0,
        euclidean_distance: f32::INFINITY,
    };
}

/// Compare two vectors
pub fn similarity(a: &[f32], b: &[f32]) -> Similarity {
    if a.len() != b.len() || a.is_empty() {
        return Similarity::UNRELATED;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Similarity::UNRELATED;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let sum_of_squares: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();

    Similarity {
        cosine: dot_product / (norm_a * norm_b),
        euclidean_distance: sum_of_squares.sqrt(),
    }
}

/// Cosine similarity, 0 for incomparable vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    similarity(a, b).cosine
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// A candidate ranked by similarity to a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch<T> {
    /// The item that was found
    pub item: T,

    /// Cosine similarity to the query
    pub score: f32,

    /// Euclidean distance to the query
    pub distance: f32,
}

/// Rank candidates by cosine similarity to `query`
///
/// Keeps candidates with `score >= threshold`, sorted descending and
/// truncated to `top_k`. Equal scores keep their input order.
pub fn find_most_similar<T, V>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (T, V)>,
    top_k: usize,
    threshold: f32,
) -> Vec<ScoredMatch<T>>
where
    V: AsRef<[f32]>,
{
    let mut ranked: Vec<ScoredMatch<T>> = candidates
        .into_iter()
        .filter_map(|(item, vector)| {
            let sim = similarity(query, vector.as_ref());
            (sim.cosine >= threshold).then_some(ScoredMatch {
                item,
                score: sim.cosine,
                distance: sim.euclidean_distance,
            })
        })
        .collect();

    // sort_by is stable: ties stay in insertion order
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_k);
    ranked
}

/// A group of mutually close items
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster<T> {
    /// Members, seed first
    pub members: Vec<T>,

    /// Element-wise mean of the member vectors
    pub centroid: Vec<f32>,
}

/// Single-link clustering against the cluster seed
///
/// Items are visited in order. Each unvisited item seeds a new cluster and
/// absorbs every later unvisited item whose cosine similarity to the seed is
/// strictly greater than `threshold`. Clusters are never merged, so two seeds
/// close to a shared neighbour can end up in different clusters; this is an
/// accepted approximation of full single-link clustering.
pub fn cluster<T, V>(items: &[(T, V)], threshold: f32) -> Vec<Cluster<T>>
where
    T: Clone,
    V: AsRef<[f32]>,
{
    let mut visited = vec![false; items.len()];
    let mut clusters = Vec::new();

    for seed_idx in 0..items.len() {
        if visited[seed_idx] {
            continue;
        }
        visited[seed_idx] = true;

        let seed = items[seed_idx].1.as_ref();
        let mut member_indices = vec![seed_idx];

        for candidate_idx in (seed_idx + 1)..items.len() {
            if visited[candidate_idx] {
                continue;
            }
            if cosine_similarity(seed, items[candidate_idx].1.as_ref()) > threshold {
                visited[candidate_idx] = true;
                member_indices.push(candidate_idx);
            }
        }

        let vectors: Vec<&[f32]> = member_indices.iter().map(|&i| items[i].1.as_ref()).collect();
        clusters.push(Cluster {
            members: member_indices.iter().map(|&i| items[i].0.clone()).collect(),
            centroid: centroid(&vectors),
        });
    }

    clusters
}

/// Element-wise mean of vectors sharing the first vector's length
///
/// Vectors of a different length are ignored; an empty input yields an
/// empty centroid.
pub fn centroid(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;

    for v in vectors.iter().filter(|v| v.len() == dim) {
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
        count += 1;
    }

    for acc in &mut sum {
        *acc /= count as f32;
    }
    sum
}
