use std::path::Path;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One archived file, owned by the external storage subsystem and
/// read-only to the engine.
///
/// `stored_filename` may carry an all-numeric upload prefix separated
/// from the original name by the first underscore
/// (`1716891234_عرض أسعار.pdf`). A `None` file URL marks a record whose
/// backing file was deleted; such records never surface in results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: u64,
    pub stored_filename: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

impl DocumentRecord {
    /// Recover the human-facing original name: drop an all-numeric
    /// upload prefix, strip the extension, percent-decode.
    pub fn original_name(&self) -> String {
        let name = match self.stored_filename.split_once('_') {
            Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => rest,
            _ => &self.stored_filename,
        };
        let stem = match name.rsplit_once('.') {
            Some((stem, ext))
                if !stem.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                stem
            }
            _ => name,
        };
        percent_decode_str(stem)
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| stem.to_string())
    }

    /// Lowercased stored extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.stored_filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 4)
    }
}

/// Read access to the document collection. Implemented by the storage
/// collaborator; the engine never writes through it.
pub trait DocumentStore: Send + Sync {
    /// All records, in storage order. Callers bound their own scans.
    fn documents(&self) -> Result<Vec<DocumentRecord>>;

    /// Resolve a single record by id.
    fn get(&self, id: u64) -> Result<Option<DocumentRecord>>;

    /// Resolve a batch of ids in one pass; missing ids are skipped.
    fn get_many(&self, ids: &[u64]) -> Result<Vec<DocumentRecord>> {
        ids.iter()
            .filter_map(|&id| self.get(id).transpose())
            .collect()
    }
}

/// In-memory store backing the CLI and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Vec<DocumentRecord>,
}

impl InMemoryStore {
    pub fn new(records: Vec<DocumentRecord>) -> Self {
        Self { records }
    }

    /// Load a corpus from a JSON array of document records.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let records: Vec<DocumentRecord> = serde_json::from_str(&data)?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DocumentStore for InMemoryStore {
    fn documents(&self) -> Result<Vec<DocumentRecord>> {
        Ok(self.records.clone())
    }

    fn get(&self, id: u64) -> Result<Option<DocumentRecord>> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }
}

#[cfg(test)]
pub(crate) fn record(id: u64, stored_filename: &str, text: Option<&str>) -> DocumentRecord {
    DocumentRecord {
        id,
        stored_filename: stored_filename.to_string(),
        extracted_text: text.map(str::to_string),
        entity: None,
        department: None,
        file_url: Some(format!("/media/documents/{stored_filename}")),
        uploaded_at: None,
        modified_at: None,
    }
}
