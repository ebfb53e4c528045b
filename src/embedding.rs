use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "multilingual-e5-small";
pub const MODEL_ENV_VAR: &str = "ARSHIF_MODEL";

/// A sentence-embedding backend.
///
/// The engine only depends on this seam; the concrete model is an
/// external collaborator. Implementations must return one vector per
/// input text, all of `dimension()` length.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
}

/// Local embedding backend running a multilingual sentence-transformer
/// via fastembed. The model is loaded lazily on first use so that purely
/// lexical operations never pay the model download/startup cost.
pub struct LocalEmbedder {
    model: Mutex<Option<TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        let name = std::env::var(MODEL_ENV_VAR).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(&name)
    }
}

impl LocalEmbedder {
    /// Create an embedder for a named model without loading it yet.
    pub fn new(model_name: &str) -> Self {
        Self {
            model: Mutex::new(None),
            model_name: model_name.to_string(),
            dimension: model_dimension(model_name),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn resolve_model(&self) -> Result<EmbeddingModel> {
        match self.model_name.as_str() {
            "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
            "multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
            "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            other => Err(Error::Config(format!(
                "unknown embedding model '{other}'; supported: \
                 multilingual-e5-small, multilingual-e5-base, \
                 multilingual-e5-large, all-minilm-l6-v2"
            ))),
        }
    }
}

fn model_dimension(model_name: &str) -> usize {
    match model_name {
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| Error::Embedding("embedding model lock poisoned".to_string()))?;

        let model = match &mut *guard {
            Some(model) => model,
            None => {
                let resolved = self.resolve_model()?;
                tracing::info!(model = %self.model_name, "loading embedding model");
                let loaded = TextEmbedding::try_new(InitOptions::new(resolved))
                    .map_err(|e| Error::Embedding(format!("failed to load model: {e}")))?;
                guard.insert(loaded)
            }
        };
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::Embedding(format!("embedding failed: {e}")))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_dimension() {
        let embedder = LocalEmbedder::new(DEFAULT_MODEL);
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        let embedder = LocalEmbedder::new("no-such-model");
        let err = embedder.embed(&["hi".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn large_model_dimension() {
        assert_eq!(LocalEmbedder::new("multilingual-e5-large").dimension(), 1024);
    }
}
