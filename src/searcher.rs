use std::sync::{Arc, Mutex, RwLock};

use rayon::prelude::*;
use serde::Serialize;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::index_service::IndexService;
use crate::matcher::{ParsedQuery, score_document};
use crate::store::{DocumentRecord, DocumentStore};
use crate::suggest::WordTable;
use crate::terms::{FILENAME_TERM_CAP, extract_terms};

/// Queries shorter than this return an empty result set without touching
/// the index.
pub const MIN_QUERY_LEN: usize = 2;

/// Chars of normalized content concatenated after the filename when
/// building the vector-index text for a document.
pub const INDEX_CONTENT_PREFIX: usize = 3_000;

/// Documents examined per lexical search. The wider Arabic bound
/// compensates for noisier matching; both keep per-query latency flat as
/// the corpus grows.
const SCAN_LIMIT: usize = 500;
const SCAN_LIMIT_ARABIC: usize = 800;

const RESULT_LIMIT: usize = 20;
const RESULT_LIMIT_ARABIC: usize = 30;

/// One ranked hit, shaped for the external API surface. `score` is
/// populated by `search` and absent on suggestions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub download_url: String,
    pub direct_media_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl ScoredResult {
    fn from_record(record: &DocumentRecord, url: String, score: Option<i64>) -> Self {
        Self {
            id: record.id,
            name: record.original_name(),
            download_url: format!("/api/documents/{}/download/", record.id),
            direct_media_url: url.clone(),
            url,
            entity: record.entity.clone(),
            department: record.department.clone(),
            score,
        }
    }
}

/// The search orchestrator: drives normalization, term extraction,
/// lexical scoring and vector lookups over an injected document store.
///
/// The vector index builds lazily on the first query that observes it
/// empty; `build_lock` serializes that path so concurrent cold queries
/// trigger exactly one build. Callers wired to storage events should use
/// `build_index`/`invalidate_index` explicitly instead.
pub struct SearchEngine {
    store: Arc<dyn DocumentStore>,
    index: IndexService,
    words: RwLock<WordTable>,
    build_lock: Mutex<()>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn DocumentStore>, embedder: Box<dyn Embedder>) -> Self {
        Self {
            store,
            index: IndexService::new(embedder),
            words: RwLock::new(WordTable::new()),
            build_lock: Mutex::new(()),
        }
    }

    /// Rebuild the vector index and the suggestion word table from the
    /// current document collection.
    pub fn build_index(&self) -> Result<usize> {
        let _guard = self.build_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.rebuild()
    }

    /// Drop the vector index; the next query (or explicit build)
    /// repopulates it. Wire this to document create/update/delete events.
    pub fn invalidate_index(&self) {
        self.index.invalidate();
    }

    /// Rank documents against a free-text query using the tiered lexical
    /// matcher. Never fails on malformed input: short or empty-normalized
    /// queries yield an empty list.
    pub fn search(&self, query: &str) -> Result<Vec<ScoredResult>> {
        let parsed = ParsedQuery::parse(query);
        if parsed.raw.chars().count() < MIN_QUERY_LEN || parsed.normalized.is_empty() {
            return Ok(Vec::new());
        }

        // Lexical matching works without the vector index; a failed lazy
        // build is logged and does not sink the query.
        if let Err(e) = self.ensure_built() {
            tracing::warn!(error = %e, "lazy index build failed, continuing lexical-only");
        }

        let documents = self.store.documents()?;
        let scan_limit = if parsed.is_arabic {
            SCAN_LIMIT_ARABIC
        } else {
            SCAN_LIMIT
        };
        let candidates: Vec<DocumentRecord> = documents
            .into_iter()
            .filter(|doc| match &parsed.extension {
                Some(ext) => doc.extension().as_deref() == Some(ext.as_str()),
                None => true,
            })
            .take(scan_limit)
            .collect();

        let min_score = parsed.min_score();
        let mut hits: Vec<(i64, ScoredResult)> = candidates
            .par_iter()
            .filter_map(|doc| {
                let url = doc.file_url.clone()?;
                let name = doc.original_name();
                let filename_terms = extract_terms(&name, FILENAME_TERM_CAP);
                let score = score_document(
                    &parsed,
                    &name,
                    &filename_terms,
                    doc.extracted_text.as_deref(),
                );
                if score < min_score {
                    return None;
                }
                Some((score, ScoredResult::from_record(doc, url, Some(score))))
            })
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.id.cmp(&b.1.id)));

        let result_limit = if parsed.is_arabic {
            RESULT_LIMIT_ARABIC
        } else {
            RESULT_LIMIT
        };
        let mut seen = std::collections::HashSet::new();
        Ok(hits
            .into_iter()
            .map(|(_, result)| result)
            .filter(|r| seen.insert(r.id))
            .take(result_limit)
            .collect())
    }

    /// Semantic document suggestions via the vector index. Fail-soft:
    /// embedding or index errors log a warning and yield an empty list.
    pub fn suggest(&self, query: &str, top_n: usize) -> Result<Vec<ScoredResult>> {
        let parsed = ParsedQuery::parse(query);
        if parsed.raw.chars().count() < MIN_QUERY_LEN || parsed.normalized.is_empty() {
            return Ok(Vec::new());
        }

        if let Err(e) = self.ensure_built() {
            tracing::warn!(error = %e, "index build failed, no suggestions");
            return Ok(Vec::new());
        }

        let hits = match self.index.search(&parsed.normalized, top_n) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "vector query failed, no suggestions");
                return Ok(Vec::new());
            }
        };

        let ids: Vec<u64> = hits.iter().map(|(id, _)| *id).collect();
        let records = self.store.get_many(&ids)?;

        let mut results = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            // deleted or unresolved records are silently skipped
            let Some(record) = records.iter().find(|r| r.id == id) else {
                continue;
            };
            let Some(url) = record.file_url.clone() else {
                continue;
            };
            let similarity = (100.0 / (1.0 + f64::from(distance))).round() as i64;
            tracing::debug!(id, distance, similarity, "suggestion candidate");
            results.push(ScoredResult::from_record(record, url, None));
        }
        Ok(results)
    }

    /// Autocomplete-style word suggestions from the term-frequency table.
    pub fn word_suggestions(&self, query: &str, limit: usize) -> Vec<String> {
        if let Err(e) = self.ensure_built() {
            tracing::warn!(error = %e, "index build failed, word table may be empty");
        }
        self.words
            .read()
            .map(|table| table.suggestions(query, limit))
            .unwrap_or_default()
    }

    /// Build-on-demand path: only one caller rebuilds, the rest wait on
    /// the lock and observe the published index.
    fn ensure_built(&self) -> Result<()> {
        if self.index.is_ready() {
            return Ok(());
        }
        let _guard = self.build_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.index.is_ready() {
            return Ok(());
        }
        self.rebuild()?;
        Ok(())
    }

    fn rebuild(&self) -> Result<usize> {
        let documents = self.store.documents()?;

        let mut corpus: Vec<(u64, String)> = Vec::with_capacity(documents.len());
        let mut words = WordTable::new();
        for doc in &documents {
            let name = doc.original_name();
            let content = doc.extracted_text.as_deref().unwrap_or("");
            if name.is_empty() && content.is_empty() {
                continue;
            }

            words.add_text(&name);
            words.add_text(content);

            let normalized_name = crate::normalize::normalize(&name);
            let normalized_content: String = crate::normalize::normalize(content)
                .chars()
                .take(INDEX_CONTENT_PREFIX)
                .collect();
            let text = if normalized_content.is_empty() {
                normalized_name
            } else {
                format!("{normalized_name} {normalized_content}")
            };
            if text.trim().is_empty() {
                continue;
            }
            corpus.push((doc.id, text));
        }

        let count = self.index.build(&corpus)?;
        if let Ok(mut table) = self.words.write() {
            *table = words;
        }
        tracing::info!(
            indexed = count,
            scanned = documents.len(),
            "search index rebuilt"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{InMemoryStore, record};

    /// Deterministic stub: hashes character trigrams of the normalized
    /// text into a fixed-size vector, so texts sharing spelling overlap
    /// land near each other.
    struct TrigramEmbedder;

    impl Embedder for TrigramEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| trigram_vector(t)).collect())
        }

        fn dimension(&self) -> usize {
            64
        }
    }

    fn trigram_vector(text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut v = vec![0.0f32; 64];
        let chars: Vec<char> = text.chars().collect();
        for window in chars.windows(3) {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            window.hash(&mut hasher);
            v[(hasher.finish() % 64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Embedding("model unavailable".to_string()))
        }

        fn dimension(&self) -> usize {
            64
        }
    }

    fn engine(records: Vec<DocumentRecord>) -> SearchEngine {
        SearchEngine::new(
            Arc::new(InMemoryStore::new(records)),
            Box::new(TrigramEmbedder),
        )
    }

    #[test]
    fn short_query_returns_empty() {
        let e = engine(vec![record(1, "invoice.pdf", Some("text"))]);
        assert!(e.search("").unwrap().is_empty());
        assert!(e.search("a").unwrap().is_empty());
        assert!(e.suggest("a", 5).unwrap().is_empty());
    }

    #[test]
    fn punctuation_only_query_returns_empty() {
        let e = engine(vec![record(1, "invoice.pdf", Some("text"))]);
        assert!(e.search("!!").unwrap().is_empty());
    }

    #[test]
    fn exact_filename_outranks_near_filename() {
        let e = engine(vec![
            record(1, "invoice_2025.pdf", None),
            record(2, "invoice_2024.pdf", None),
        ]);
        let results = e.search("invoice_2024").unwrap();
        assert!(results.len() >= 2);
        assert_eq!(results[0].id, 2);
        assert!(results[0].score.unwrap() > results[1].score.unwrap());
    }

    #[test]
    fn no_duplicate_ids_in_results() {
        let e = engine(vec![
            record(1, "report_a.pdf", Some("report report")),
            record(2, "report_b.pdf", Some("report")),
        ]);
        let results = e.search("report").unwrap();
        let mut ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
    }

    #[test]
    fn extension_filter_excludes_other_extensions() {
        let e = engine(vec![
            record(1, "report.pdf", None),
            record(2, "report.docx", None),
        ]);
        let results = e.search("report.pdf").unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.id == 1));
    }

    #[test]
    fn deleted_file_records_are_excluded() {
        let mut gone = record(1, "invoice.pdf", Some("invoice"));
        gone.file_url = None;
        let e = engine(vec![gone, record(2, "invoice_copy.pdf", None)]);
        let results = e.search("invoice").unwrap();
        assert!(results.iter().all(|r| r.id == 2));
    }

    #[test]
    fn arabic_variant_query_finds_document() {
        let e = engine(vec![record(1, "1716891234_مؤسسة.pdf", None)]);
        let results = e.search("مؤسسه").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert!(results[0].score.unwrap() > 0);
    }

    #[test]
    fn result_shape_is_complete() {
        let mut doc = record(7, "1716891234_quote.pdf", Some("an offer"));
        doc.entity = Some("Finance".to_string());
        let e = engine(vec![doc]);
        let results = e.search("quote").unwrap();
        let r = &results[0];
        assert_eq!(r.name, "quote");
        assert_eq!(r.download_url, "/api/documents/7/download/");
        assert_eq!(r.url, r.direct_media_url);
        assert_eq!(r.entity.as_deref(), Some("Finance"));
        assert!(r.score.is_some());
    }

    #[test]
    fn suggest_returns_semantic_neighbors_without_scores() {
        let e = engine(vec![
            record(1, "a.pdf", Some("فاتورة شراء رقم 10")),
            record(2, "b.pdf", Some("عقد إيجار")),
        ]);
        let results = e.suggest("فاتوره شراء", 2).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].id, 1);
        assert!(results[0].score.is_none());
    }

    #[test]
    fn suggest_swallows_embedding_failure() {
        let e = SearchEngine::new(
            Arc::new(InMemoryStore::new(vec![record(1, "a.pdf", Some("text"))])),
            Box::new(FailingEmbedder),
        );
        let results = e.suggest("anything", 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_survives_embedding_failure() {
        let e = SearchEngine::new(
            Arc::new(InMemoryStore::new(vec![record(1, "invoice.pdf", None)])),
            Box::new(FailingEmbedder),
        );
        let results = e.search("invoice").unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn empty_corpus_yields_empty_everything() {
        let e = engine(vec![]);
        assert!(e.search("invoice").unwrap().is_empty());
        assert!(e.suggest("invoice", 5).unwrap().is_empty());
        assert!(e.word_suggestions("invoice", 5).is_empty());
    }

    #[test]
    fn explicit_build_then_invalidate() {
        let e = engine(vec![record(1, "contract.pdf", Some("lease contract"))]);
        assert_eq!(e.build_index().unwrap(), 1);
        e.invalidate_index();
        // queries lazily rebuild after invalidation
        assert!(!e.suggest("contract", 3).unwrap().is_empty());
    }

    #[test]
    fn word_suggestions_come_from_corpus() {
        let e = engine(vec![record(1, "annual_report.pdf", Some("annual budget report"))]);
        let words = e.word_suggestions("repor", 5);
        assert!(words.iter().any(|w| w == "report"));
    }
}
