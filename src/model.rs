//! Core data types flowing through the classification pipeline.
//!
//! Each stage produces a new immutable value: the raw description becomes a
//! [`QuerySignal`], the signal becomes an ordered set of [`CandidateEntry`]
//! values, and selection produces the terminal [`ClassificationResult`].

use serde::{Deserialize, Deserializer, Serialize};

/// Accepts a JSON string or number and normalizes it to a string.
///
/// Both the source catalogs and the arbitration service are loose about
/// whether codes arrive as numbers or text.
pub(crate) fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Structured signal extracted from a free-text asset description.
///
/// Produced once per request by query understanding. The keyword order is
/// load-bearing: keywords are joined in order to form the embedding query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySignal {
    pub category: String,
    pub item_type: String,
    #[serde(default)]
    pub characteristics: Vec<String>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
}

impl QuerySignal {
    /// Builds the degraded signal used when extraction output cannot be
    /// parsed: raw lower-cased whitespace tokens of the description.
    #[must_use]
    pub fn fallback(description: &str) -> Self {
        Self {
            category: "unknown".to_string(),
            item_type: "unknown".to_string(),
            characteristics: Vec::new(),
            search_keywords: description
                .to_lowercase()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// A supply-class code carrying both its canonical form and the display
/// form with the supply-group prefix stripped.
///
/// Source catalogs store the class sometimes as a number and sometimes as
/// text, so the canonical form is kept as a string and the display form is
/// computed once at construction instead of re-inspecting types later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplyClass {
    code: String,
    display: String,
}

impl SupplyClass {
    /// Creates a supply class, deriving the display form from the group.
    ///
    /// The display form strips the group's string form as a prefix when
    /// present: group 10 / class 1005 yields "05", group 70 / class 7010
    /// yields "10". A class that does not start with the group code is
    /// displayed unchanged.
    #[must_use]
    pub fn new(supply_group: u16, code: impl Into<String>) -> Self {
        let code = code.into();
        let group = supply_group.to_string();
        let display = code
            .strip_prefix(group.as_str())
            .map_or_else(|| code.clone(), str::to_string);
        Self { code, display }
    }

    /// Canonical code as stored in the catalog.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Display form without the supply-group prefix.
    #[must_use]
    pub fn display(&self) -> &str {
        &self.display
    }
}

/// A catalog entry retrieved as a plausible match for a query.
///
/// Entries are ordered by ascending distance (descending similarity) as
/// returned by the nearest-neighbor search. Downstream fallback logic
/// relies on position 0 being the best available match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateEntry {
    pub item_code: u32,
    pub name: String,
    pub definition: String,
    pub supply_group: u16,
    pub supply_class: SupplyClass,
    pub similarity: f32,
    pub distance: f32,
}

/// Successful classification payload.
///
/// `name` is never translated: item names stay in the catalog's source
/// language for cross-reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub item_code: u32,
    pub name: String,
    pub definition: String,
    pub definition_translated: String,
    pub supply_group: u16,
    pub supply_class: String,
    pub supply_class_display: String,
    pub confidence: f32,
    pub reasoning: String,
    pub reasoning_translated: String,
}

/// Terminal value returned to the caller for every request.
///
/// Absence of `error` implies success; the original query text is stamped
/// onto the result for traceability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub success: bool,
    pub query: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationResult {
    /// Wraps a successful classification, stamping the query text.
    #[must_use]
    pub fn ok(query: impl Into<String>, classification: Classification) -> Self {
        Self {
            success: true,
            query: query.into(),
            classification: Some(classification),
            error: None,
        }
    }

    /// Builds the uniform failure shape.
    #[must_use]
    pub fn failure(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            query: query.into(),
            classification: None,
            error: Some(error.into()),
        }
    }
}
