use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::vector_index::VectorIndex;

/// Batch size for document embedding during a build.
pub const EMBED_BATCH: usize = 32;

/// Capacity of the query-embedding cache.
const CACHE_CAP: usize = 256;

/// Owns the vector index, its id array, and the query-embedding cache.
///
/// A rebuild is all-or-nothing: the previous index stays queryable while
/// the replacement is constructed, and a single write-lock swap publishes
/// the finished pair. A failed build leaves the last good index intact.
pub struct IndexService {
    embedder: Box<dyn Embedder>,
    index: RwLock<Option<VectorIndex>>,
    cache: Mutex<EmbeddingCache>,
}

impl IndexService {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: RwLock::new(None),
            cache: Mutex::new(EmbeddingCache::new(CACHE_CAP)),
        }
    }

    /// True when a non-empty index is ready to serve queries.
    pub fn is_ready(&self) -> bool {
        self.index
            .read()
            .map(|guard| guard.as_ref().is_some_and(|i| !i.is_empty()))
            .unwrap_or(false)
    }

    /// Embed the corpus in fixed-size batches and swap in a fresh index.
    /// Returns the number of indexed documents.
    pub fn build(&self, corpus: &[(u64, String)]) -> Result<usize> {
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(corpus.len());
        for batch in corpus.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
            vectors.extend(self.embedder.embed(&texts)?);
        }

        let ids: Vec<u64> = corpus.iter().map(|(id, _)| *id).collect();
        let built = VectorIndex::build(ids, vectors)?;
        let count = built.len();

        let mut guard = self
            .index
            .write()
            .map_err(|_| Error::Embedding("index lock poisoned".to_string()))?;
        *guard = Some(built);

        tracing::info!(documents = count, "vector index rebuilt");
        Ok(count)
    }

    /// Drop the current index. The next build republishes; callers wire
    /// this to document create/update/delete events.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.index.write() {
            *guard = None;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Nearest-neighbor query: embed (through the cache) and search.
    /// Returns `(doc_id, l2_distance)` pairs, closest first.
    pub fn search(&self, text: &str, top_n: usize) -> Result<Vec<(u64, f32)>> {
        let vector = self.embed_query(text)?;
        let guard = self
            .index
            .read()
            .map_err(|_| Error::Embedding("index lock poisoned".to_string()))?;
        Ok(guard
            .as_ref()
            .map(|index| index.query(&vector, top_n))
            .unwrap_or_default())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(vector) = cache.get(text) {
                return Ok(vector);
            }
        }

        let mut vectors = self.embedder.embed(&[text.to_string()])?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("model returned no vector".to_string()))?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(text.to_string(), vector.clone());
        }
        Ok(vector)
    }
}

/// Bounded query-embedding cache with oldest-half eviction. Insertion
/// order approximates recency well enough for this workload.
struct EmbeddingCache {
    capacity: usize,
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl EmbeddingCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, vector: Vec<f32>) {
        if self.entries.contains_key(&key) {
            return;
        }
        if self.entries.len() >= self.capacity {
            for _ in 0..self.capacity / 2 {
                if let Some(old) = self.order.pop_front() {
                    self.entries.remove(&old);
                }
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, vector);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
