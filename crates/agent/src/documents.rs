//! Documents the advisor can draw on.
//!
//! The store never decides visibility; every read goes through the
//! retrieval perimeter first.

use advisorguard_config::DocumentsConfig;
use advisorguard_core::Document;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read document file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse document file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate document id: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    documents: Vec<Document>,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    documents: Arc<Vec<Document>>,
}

impl DocumentStore {
    pub fn new(documents: Vec<Document>) -> Result<Self, DocumentError> {
        let mut seen = std::collections::HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(DocumentError::DuplicateId(doc.id.clone()));
            }
        }
        Ok(Self {
            documents: Arc::new(documents),
        })
    }

    /// Four documents spanning every classification.
    pub fn sample() -> Self {
        Self {
            documents: Arc::new(vec![
                Document::new(
                    "inv_001",
                    "investment",
                    "Tech Growth Fund performance analysis shows a 15% YoY return...",
                    "confidential",
                ),
                Document::new(
                    "tax_001",
                    "tax",
                    "Tax optimization strategies for high-income investors...",
                    "restricted",
                ),
                Document::new(
                    "ret_001",
                    "retirement",
                    "401(k) contribution strategies and employer matching...",
                    "public",
                ),
                Document::new(
                    "inv_002",
                    "investment",
                    "ESG Fund analysis and sustainable investment opportunities...",
                    "public",
                ),
            ]),
        }
    }

    /// Parse `[[documents]]` entries from TOML.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let file: DocumentFile = toml::from_str(content)?;
        Self::new(file.documents)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// The configured file, or the sample set.
    pub fn from_config(config: &DocumentsConfig) -> Result<Self, DocumentError> {
        match &config.path {
            Some(path) => Self::load(path),
            None => Ok(Self::sample()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn all(&self) -> &[Document] {
        &self.documents
    }

    pub fn shared(&self) -> Arc<Vec<Document>> {
        self.documents.clone()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sample_covers_each_classification() {
        let store = DocumentStore::sample();
        assert_eq!(store.len(), 4);
        for classification in ["public", "restricted", "confidential"] {
            assert!(store.all().iter().any(|d| d.classification == classification));
        }
        assert_eq!(store.get("tax_001").unwrap().doc_type, "tax");
    }

    #[test]
    fn loads_documents_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[documents]]
id = "bond_101"
type = "education"
content = "Bonds pay a fixed coupon."
classification = "public"
"#
        )
        .unwrap();

        let config = DocumentsConfig {
            path: Some(file.path().to_path_buf()),
        };
        let store = DocumentStore::from_config(&config).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.all()[0].doc_type, "education");
    }

    #[test]
    fn unset_path_uses_sample() {
        let store = DocumentStore::from_config(&DocumentsConfig::default()).unwrap();
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doc = Document::new("a", "t", "c", "public");
        let err = DocumentStore::new(vec![doc.clone(), doc]).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateId(id) if id == "a"));
    }
}
