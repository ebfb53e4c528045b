//! arshif - a hybrid search engine for mixed Arabic/English document
//! archives.
//!
//! arshif ranks correspondence documents against free-text queries where
//! filenames and OCR-extracted content use inconsistent spelling,
//! diacritics, and transliteration. Lexical matching runs a tiered
//! Arabic-aware fuzzy scorer; semantic suggestions run a multilingual
//! sentence-embedding nearest-neighbor index.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use arshif::{InMemoryStore, LocalEmbedder, SearchEngine};
//!
//! let store = InMemoryStore::load(std::path::Path::new("corpus.json")).unwrap();
//! let engine = SearchEngine::new(Arc::new(store), Box::new(LocalEmbedder::default()));
//!
//! engine.build_index().unwrap();
//! for r in engine.search("فاتوره 2024").unwrap() {
//!     println!("{} (score: {:?})", r.name, r.score);
//! }
//! ```

pub mod embedding;
pub mod error;
pub mod index_service;
pub mod matcher;
pub mod normalize;
pub mod searcher;
pub mod store;
pub mod suggest;
pub mod terms;
pub mod vector_index;

pub use embedding::{Embedder, LocalEmbedder};
pub use error::{Error, Result};
pub use index_service::IndexService;
pub use searcher::{ScoredResult, SearchEngine};
pub use store::{DocumentRecord, DocumentStore, InMemoryStore};
pub use vector_index::VectorIndex;
