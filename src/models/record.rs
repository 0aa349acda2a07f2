//! Record model for one harvested procedure.
//!
//! The metadata and section blocks are fixed-schema structs rather than
//! maps: every known key is present on every record, and keys the page
//! did not yield serialize as empty strings. Downstream consumers never
//! have to probe for missing keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Locator for one detail page awaiting harvest.
///
/// Created during link discovery, consumed exactly once by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemReference(String);

impl ItemReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat metadata block from the detail popup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureMeta {
    /// Official procedure code.
    pub procedure_code: String,
    /// Number of the decision that promulgated the procedure.
    pub decision_number: String,
    /// Administrative level the procedure is carried out at.
    pub implementation_level: String,
    pub procedure_type: String,
    pub sector: String,
    /// Who may file (citizens, organizations, ...).
    pub applicants: String,
    pub implementing_agency: String,
    pub authorized_agency: String,
    /// What a successful filing produces.
    pub result: String,
}

/// Long-form sections from the detail page body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureSections {
    /// Step-by-step filing sequence.
    pub process_steps: String,
    /// How the dossier may be submitted (in person, online, postal).
    pub submission_methods: String,
    pub dossier_components: String,
    pub documents_to_submit: String,
    pub documents_to_present: String,
    pub notes: String,
    pub implementing_agency: String,
    pub requirements: String,
}

/// One legal-basis citation row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Citation {
    pub doc_number: String,
    pub doc_title: String,
    pub doc_date: String,
    pub issuing_agency: String,
}

/// The structured result of harvesting one detail page.
///
/// `source_url` is always non-empty; every other field defaults to its
/// empty value when the page did not yield it. A partial page still
/// produces a full record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub source_url: String,
    pub metadata: ProcedureMeta,
    pub sections: ProcedureSections,
    pub citations: Vec<Citation>,
}

impl Record {
    /// Create a record for `source_url` with every other field at its
    /// empty default.
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_full_metadata_key_set() {
        let record = Record::new("Cấp hộ chiếu", "https://example.gov.vn/detail/1");
        let json = serde_json::to_value(&record).unwrap();

        let meta = json.get("metadata").unwrap().as_object().unwrap();
        for key in [
            "procedure_code",
            "decision_number",
            "implementation_level",
            "procedure_type",
            "sector",
            "applicants",
            "implementing_agency",
            "authorized_agency",
            "result",
        ] {
            assert_eq!(meta.get(key).unwrap().as_str().unwrap(), "", "key {key}");
        }
    }

    #[test]
    fn record_serializes_full_section_key_set() {
        let record = Record::new("t", "https://example.gov.vn/detail/2");
        let json = serde_json::to_value(&record).unwrap();

        let sections = json.get("sections").unwrap().as_object().unwrap();
        assert_eq!(sections.len(), 8);
        assert!(sections.contains_key("process_steps"));
        assert!(sections.contains_key("requirements"));
    }

    #[test]
    fn partial_record_deserializes_with_defaults() {
        let json = r#"{
            "title": "x",
            "source_url": "https://example.gov.vn/detail/3",
            "metadata": { "procedure_code": "1.001" },
            "sections": {},
            "citations": []
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.metadata.procedure_code, "1.001");
        assert_eq!(record.metadata.result, "");
        assert_eq!(record.sections.notes, "");
        assert!(record.citations.is_empty());
    }
}
