// ============================================================
// Layer 3 - Abstract Domain Type
// ============================================================
// One PubMed citation that carried a non-empty abstract.
// This is exactly what a line of the staging JSONL holds:
//
//   {"pmid": "31452104", "abstract": "Background: ..."}
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

/// An abstract extracted from a `MedlineCitation` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstract {
    /// PubMed identifier, empty when the citation had none
    #[serde(default)]
    pub pmid: String,

    /// The text of the first `AbstractText` element
    #[serde(rename = "abstract")]
    pub text: String,
}

impl Abstract {
    /// Create a new Abstract from a pmid and its text.
    pub fn new(pmid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            text: text.into(),
        }
    }

    /// True when the abstract would be skipped by extraction
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialises_with_abstract_key() {
        let a = Abstract::new("42", "Cells divide.");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#"{"pmid":"42","abstract":"Cells divide."}"#);
    }

    #[test]
    fn test_pmid_is_optional_when_reading() {
        // Older staging files only carried the abstract
        let a: Abstract = serde_json::from_str(r#"{"abstract":"text"}"#).unwrap();
        assert_eq!(a.pmid, "");
        assert_eq!(a.text, "text");
    }

    #[test]
    fn test_blank_detection() {
        assert!(Abstract::new("1", "  \n ").is_blank());
        assert!(!Abstract::new("1", " x ").is_blank());
    }
}
