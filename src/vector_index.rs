use rayon::prelude::*;

use crate::error::{Error, Result};

/// Corpus size up to which an exact flat scan is used.
pub const FLAT_MAX: usize = 1_000;

/// Corpus size up to which full-precision vectors are kept in the
/// inverted-file lists; larger corpora are scalar-quantized to bound
/// memory.
pub const IVF_MAX: usize = 50_000;

/// Number of inverted lists probed per query. Bounds query latency at
/// the cost of exactness.
const NPROBE: usize = 8;

const KMEANS_ITERATIONS: usize = 10;

/// An immutable nearest-neighbor index over document embeddings.
///
/// The id array and the entry set are built together and always have the
/// same length; a partially built index is never observable because the
/// owner publishes the whole structure with a single swap.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    doc_ids: Vec<u64>,
    kind: IndexKind,
}

#[derive(Debug)]
enum IndexKind {
    Flat {
        vectors: Vec<Vec<f32>>,
    },
    InvertedFile {
        centroids: Vec<Vec<f32>>,
        lists: Vec<Vec<usize>>,
        vectors: Vec<Vec<f32>>,
    },
    InvertedFileQuantized {
        centroids: Vec<Vec<f32>>,
        lists: Vec<Vec<usize>>,
        codes: Vec<QuantizedVector>,
    },
}

/// Per-vector scalar quantization: each component is stored as a u8
/// against the vector's own min/scale.
#[derive(Debug)]
struct QuantizedVector {
    min: f32,
    scale: f32,
    codes: Vec<u8>,
}

impl QuantizedVector {
    fn quantize(vector: &[f32]) -> Self {
        let min = vector.iter().copied().fold(f32::INFINITY, f32::min);
        let max = vector.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let scale = if max > min { (max - min) / 255.0 } else { 1.0 };
        let codes = vector
            .iter()
            .map(|&v| (((v - min) / scale).round().clamp(0.0, 255.0)) as u8)
            .collect();
        Self { min, scale, codes }
    }

    fn distance_to(&self, query: &[f32]) -> f32 {
        self.codes
            .iter()
            .zip(query)
            .map(|(&code, &q)| {
                let v = self.min + self.scale * code as f32;
                let d = v - q;
                d * d
            })
            .sum::<f32>()
            .sqrt()
    }
}

impl VectorIndex {
    /// Build an index over parallel id/vector arrays. Topology is chosen
    /// by corpus cardinality.
    pub fn build(doc_ids: Vec<u64>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if doc_ids.len() != vectors.len() {
            return Err(Error::Config(format!(
                "id/vector length mismatch: {} vs {}",
                doc_ids.len(),
                vectors.len()
            )));
        }
        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(Error::Config(format!(
                "inconsistent embedding dimension: expected {dimension}, got {}",
                bad.len()
            )));
        }

        let n = vectors.len();
        let kind = if n <= FLAT_MAX {
            IndexKind::Flat { vectors }
        } else {
            let centroids = train_centroids(&vectors, cluster_count(n));
            let lists = assign_lists(&vectors, &centroids);
            if n <= IVF_MAX {
                IndexKind::InvertedFile {
                    centroids,
                    lists,
                    vectors,
                }
            } else {
                let codes = vectors
                    .par_iter()
                    .map(|v| QuantizedVector::quantize(v))
                    .collect();
                IndexKind::InvertedFileQuantized {
                    centroids,
                    lists,
                    codes,
                }
            }
        };

        Ok(Self {
            dimension,
            doc_ids,
            kind,
        })
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Return the `top_n` nearest document ids with their L2 distances,
    /// closest first.
    pub fn query(&self, query: &[f32], top_n: usize) -> Vec<(u64, f32)> {
        if self.is_empty() || top_n == 0 || query.len() != self.dimension {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = match &self.kind {
            IndexKind::Flat { vectors } => vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (i, l2_distance(query, v)))
                .collect(),
            IndexKind::InvertedFile {
                centroids,
                lists,
                vectors,
            } => probe_lists(query, centroids, lists)
                .map(|i| (i, l2_distance(query, &vectors[i])))
                .collect(),
            IndexKind::InvertedFileQuantized {
                centroids,
                lists,
                codes,
            } => probe_lists(query, centroids, lists)
                .map(|i| (i, codes[i].distance_to(query)))
                .collect(),
        };

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(top_n)
            .map(|(i, d)| (self.doc_ids[i], d))
            .collect()
    }
}

fn cluster_count(n: usize) -> usize {
    (((n as f64).sqrt() * 4.0) as usize).clamp(8, 4096).min(n)
}

/// Indices of entries in the `NPROBE` lists whose centroids are closest
/// to the query.
fn probe_lists<'a>(
    query: &[f32],
    centroids: &[Vec<f32>],
    lists: &'a [Vec<usize>],
) -> impl Iterator<Item = usize> + 'a {
    let mut ranked: Vec<(usize, f32)> = centroids
        .iter()
        .enumerate()
        .map(|(c, centroid)| (c, l2_distance(query, centroid)))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    ranked
        .into_iter()
        .take(NPROBE)
        .flat_map(|(c, _)| lists[c].iter().copied().collect::<Vec<_>>())
}

/// Train coarse centroids with a few Lloyd iterations. Initialization
/// strides over the batch so every region of the corpus seeds a cluster.
fn train_centroids(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
    let n = vectors.len();
    let stride = (n / k).max(1);
    let mut centroids: Vec<Vec<f32>> =
        (0..k).map(|i| vectors[(i * stride) % n].clone()).collect();

    for _ in 0..KMEANS_ITERATIONS {
        let assignments: Vec<usize> = vectors
            .par_iter()
            .map(|v| nearest_centroid(v, &centroids))
            .collect();

        let dimension = vectors[0].len();
        let mut sums = vec![vec![0.0f32; dimension]; k];
        let mut counts = vec![0usize; k];
        for (v, &c) in vectors.iter().zip(&assignments) {
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(v) {
                *s += x;
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                for s in sums[c].iter_mut() {
                    *s /= counts[c] as f32;
                }
                centroids[c] = std::mem::take(&mut sums[c]);
            }
        }
    }

    centroids
}

fn assign_lists(vectors: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<Vec<usize>> {
    let assignments: Vec<usize> = vectors
        .par_iter()
        .map(|v| nearest_centroid(v, centroids))
        .collect();
    let mut lists = vec![Vec::new(); centroids.len()];
    for (i, &c) in assignments.iter().enumerate() {
        lists[c].push(i);
    }
    lists
}

fn nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = l2_distance(vector, centroid);
        if d < best_distance {
            best = c;
            best_distance = d;
        }
    }
    best
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
