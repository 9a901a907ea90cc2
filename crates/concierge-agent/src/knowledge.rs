//! FAQ knowledge base loading.
//!
//! The source is a JSON array of `{"question": ..., "answer": ...}` objects.
//! It is flattened once into a block of `Q: <question> | A: <answer>` lines
//! that is injected verbatim into every prompt.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading the knowledge base
#[derive(Error, Debug)]
pub enum KnowledgeBaseError {
    /// The source file does not exist
    #[error("Knowledge base not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The source is not a list of question/answer records
    #[error("Malformed knowledge base: {0}")]
    Format(String),

    /// Any other I/O failure while reading the source
    #[error("Failed to read knowledge base {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single FAQ record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    fn to_line(&self) -> String {
        format!("Q: {} | A: {}", self.question, self.answer)
    }
}

/// The loaded, read-only knowledge base
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<FaqEntry>,
    text: String,
}

impl KnowledgeBase {
    /// Load and flatten a JSON FAQ file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeBaseError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KnowledgeBaseError::NotFound(path.to_path_buf())
            } else {
                KnowledgeBaseError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let kb = Self::parse(&raw)?;
        if kb.is_empty() {
            tracing::warn!(path = %path.display(), "knowledge base has no entries");
        } else {
            tracing::info!(path = %path.display(), entries = kb.len(), "loaded knowledge base");
        }
        Ok(kb)
    }

    /// Parse the JSON text of a FAQ source.
    pub fn parse(raw: &str) -> Result<Self, KnowledgeBaseError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| KnowledgeBaseError::Format(format!("invalid JSON: {}", e)))?;

        let records = value.as_array().ok_or_else(|| {
            KnowledgeBaseError::Format("expected a JSON array of records".to_string())
        })?;

        let mut entries = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if !record.is_object() {
                return Err(KnowledgeBaseError::Format(format!(
                    "record {} is not an object",
                    index
                )));
            }
            // Both fields must be JSON strings.
            let entry = FaqEntry::deserialize(record)
                .map_err(|e| KnowledgeBaseError::Format(format!("record {}: {}", index, e)))?;
            entries.push(entry);
        }

        Ok(Self::from_entries(entries))
    }

    /// Build a knowledge base from entries already in memory.
    pub fn from_entries(entries: Vec<FaqEntry>) -> Self {
        let text = entries
            .iter()
            .map(FaqEntry::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        Self { entries, text }
    }

    /// The flattened text injected into prompts
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flattens_in_source_order() {
        let kb = KnowledgeBase::parse(
            r#"[
                {"question": "How do I reset my password?", "answer": "Use the Forgot Password link."},
                {"question": "What are your hours?", "answer": "9am to 5pm, Monday to Friday."}
            ]"#,
        )
        .unwrap();

        assert_eq!(kb.len(), 2);
        assert_eq!(
            kb.text(),
            "Q: How do I reset my password? | A: Use the Forgot Password link.\n\
             Q: What are your hours? | A: 9am to 5pm, Monday to Friday."
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let kb = KnowledgeBase::parse(r#"[{"question": "q", "answer": "a", "tags": ["x"]}]"#)
            .unwrap();
        assert_eq!(kb.text(), "Q: q | A: a");
    }

    #[test]
    fn test_empty_array_is_accepted() {
        let kb = KnowledgeBase::parse("[]").unwrap();
        assert!(kb.is_empty());
        assert_eq!(kb.text(), "");
    }

    #[test]
    fn test_missing_field_names_record() {
        let err = KnowledgeBase::parse(r#"[{"question": "q", "answer": "a"}, {"question": "q2"}]"#)
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, KnowledgeBaseError::Format(_)));
        assert!(msg.contains("record 1"), "{msg}");
        assert!(msg.contains("answer"), "{msg}");
    }

    #[test]
    fn test_non_string_fields_are_rejected() {
        for raw in [
            r#"[{"question": "Open on Sundays?", "answer": false}]"#,
            r#"[{"question": 42, "answer": "a"}]"#,
            r#"[{"question": "q", "answer": ["a", "b"]}]"#,
            r#"[{"question": null, "answer": "a"}]"#,
        ] {
            let err = KnowledgeBase::parse(raw).unwrap_err();
            assert!(matches!(err, KnowledgeBaseError::Format(_)), "{raw}");
            assert!(err.to_string().contains("record 0"), "{raw}: {err}");
        }
    }

    #[test]
    fn test_non_array_is_rejected() {
        let err = KnowledgeBase::parse(r#"{"question": "q", "answer": "a"}"#).unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::Format(_)));

        let err = KnowledgeBase::parse(r#"["just a string"]"#).unwrap_err();
        assert!(err.to_string().contains("record 0"));
    }

    #[test]
    fn test_invalid_json_is_format_error() {
        let err = KnowledgeBase::parse("[{").unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::Format(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = KnowledgeBase::load(dir.path().join("faq.json")).unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"question": "Do you ship abroad?", "answer": "Yes, to 40 countries."}}]"#
        )
        .unwrap();

        let kb = KnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.text(), "Q: Do you ship abroad? | A: Yes, to 40 countries.");
        assert_eq!(kb.entries()[0], FaqEntry::new("Do you ship abroad?", "Yes, to 40 countries."));
    }
}
