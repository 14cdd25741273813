//! Stage 3: candidate selection and enrichment.
//!
//! A single candidate is taken as-is; multiple candidates go through the
//! arbitration service, whose answer is validated against the actual
//! candidate set rather than trusted. Invalid selections and unreachable
//! arbitration both fall back to the highest-similarity candidate, with
//! distinct reasoning markers so failure analysis can tell them apart.
//! Both paths finish with best-effort translation of the definition and
//! reasoning (never the item name).

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::TranslationConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{CandidateEntry, Classification, de_string_or_number};
use crate::services::{ChatClient, StructuredReply, complete_structured};

/// Reasoning attached when exactly one candidate was retrieved.
pub const REASONING_ONLY_CANDIDATE: &str = "only candidate retrieved";

/// Reasoning prefix when arbitration picked a code outside the candidate set.
pub const REASONING_INVALID_SELECTION: &str =
    "fallback to highest-similarity candidate: arbitration selected unknown item code";

/// Reasoning when the arbitration service failed outright.
pub const REASONING_SERVICE_FALLBACK: &str =
    "fallback to highest-similarity candidate: arbitration service error";

/// Longest definition excerpt included in the arbitration listing.
const DEFINITION_EXCERPT_LEN: usize = 300;

const ARBITRATION_SYSTEM_PROMPT: &str =
    "You are a supply catalog classification expert. Always respond with valid JSON only.";

const TRANSLATION_SYSTEM_PROMPT: &str =
    "You are a professional technical translator. Always respond with valid JSON only.";

/// How the winning candidate gets chosen, decided by cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Exactly one candidate: no comparison to make.
    Trivial,
    /// Several candidates: ask the arbitration service to pick.
    Arbitrated,
}

impl SelectionStrategy {
    #[must_use]
    pub fn for_candidates(count: usize) -> Self {
        if count == 1 {
            Self::Trivial
        } else {
            Self::Arbitrated
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArbitrationReply {
    #[serde(deserialize_with = "de_string_or_number")]
    selected_item_code: String,
    confidence: f32,
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct TranslationReply {
    #[serde(default)]
    definition_translated: String,
    #[serde(default)]
    reasoning_translated: String,
}

pub struct Selection {
    chat: Arc<dyn ChatClient>,
    translation: TranslationConfig,
}

impl Selection {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatClient>, translation: TranslationConfig) -> Self {
        Self { chat, translation }
    }

    /// Selects the best match from a non-empty candidate set and enriches
    /// it into the final classification.
    pub async fn select(
        &self,
        description: &str,
        candidates: &[CandidateEntry],
    ) -> PipelineResult<Classification> {
        let Some(first) = candidates.first() else {
            return Err(PipelineError::NoCandidates);
        };

        let (selected, confidence, reasoning) =
            match SelectionStrategy::for_candidates(candidates.len()) {
                SelectionStrategy::Trivial => {
                    info!(item_code = first.item_code, "Single candidate, skipping arbitration");
                    let confidence = (first.similarity * 1.1).min(0.99);
                    (first, confidence, REASONING_ONLY_CANDIDATE.to_string())
                }
                SelectionStrategy::Arbitrated => self.arbitrate(description, candidates).await,
            };

        info!(
            item_code = selected.item_code,
            name = %selected.name,
            confidence,
            "Selected candidate"
        );

        let (definition_translated, reasoning_translated) =
            self.translate(&selected.definition, &reasoning).await;

        Ok(Classification {
            item_code: selected.item_code,
            name: selected.name.clone(),
            definition: selected.definition.clone(),
            definition_translated,
            supply_group: selected.supply_group,
            supply_class: selected.supply_class.code().to_string(),
            supply_class_display: selected.supply_class.display().to_string(),
            confidence,
            reasoning,
            reasoning_translated,
        })
    }

    /// Asks the arbitration service to pick among the candidates and
    /// validates its answer against the actual set.
    async fn arbitrate<'a>(
        &self,
        description: &str,
        candidates: &'a [CandidateEntry],
    ) -> (&'a CandidateEntry, f32, String) {
        let first = &candidates[0];
        let prompt = build_arbitration_prompt(description, candidates);

        match complete_structured::<ArbitrationReply>(
            self.chat.as_ref(),
            ARBITRATION_SYSTEM_PROMPT,
            &prompt,
        )
        .await
        {
            StructuredReply::Parsed(reply) => {
                let wanted = reply.selected_item_code.trim();
                let found = candidates
                    .iter()
                    .find(|c| c.item_code.to_string() == wanted);

                match found {
                    Some(candidate) => (
                        candidate,
                        reply.confidence.clamp(0.0, 1.0),
                        reply.reasoning,
                    ),
                    None => {
                        warn!(
                            selected = wanted,
                            "Arbitration picked a code outside the candidate set"
                        );
                        (
                            first,
                            first.similarity,
                            format!("{REASONING_INVALID_SELECTION} {wanted}"),
                        )
                    }
                }
            }
            StructuredReply::Malformed { raw } => {
                warn!(raw_len = raw.len(), "Arbitration reply was not valid JSON");
                (first, first.similarity, REASONING_SERVICE_FALLBACK.to_string())
            }
            StructuredReply::Unavailable(e) => {
                warn!("Arbitration service unavailable: {e}");
                (first, first.similarity, REASONING_SERVICE_FALLBACK.to_string())
            }
        }
    }

    /// Translates definition and reasoning into the target language.
    ///
    /// Item names are deliberately excluded: they stay in the catalog's
    /// source language for cross-reference. Translation is cosmetic
    /// enrichment; any failure degrades to empty strings.
    async fn translate(&self, definition: &str, reasoning: &str) -> (String, String) {
        if !self.translation.enabled {
            return (String::new(), String::new());
        }

        let prompt = build_translation_prompt(
            &self.translation.target_language,
            definition,
            reasoning,
        );

        match complete_structured::<TranslationReply>(
            self.chat.as_ref(),
            TRANSLATION_SYSTEM_PROMPT,
            &prompt,
        )
        .await
        {
            StructuredReply::Parsed(reply) => {
                (reply.definition_translated, reply.reasoning_translated)
            }
            StructuredReply::Malformed { raw } => {
                warn!(raw_len = raw.len(), "Translation reply was not valid JSON, skipping");
                (String::new(), String::new())
            }
            StructuredReply::Unavailable(e) => {
                warn!("Translation service unavailable, skipping: {e}");
                (String::new(), String::new())
            }
        }
    }
}

fn build_arbitration_prompt(description: &str, candidates: &[CandidateEntry]) -> String {
    let mut listing = String::new();
    for (i, c) in candidates.iter().enumerate() {
        let mut definition = c.definition.clone();
        if definition.len() > DEFINITION_EXCERPT_LEN {
            let mut cut = DEFINITION_EXCERPT_LEN;
            while !definition.is_char_boundary(cut) {
                cut -= 1;
            }
            definition.truncate(cut);
            definition.push_str("...");
        }

        listing.push_str(&format!(
            "{}. ITEM CODE: {}\n   NAME: {}\n   SUPPLY GROUP: {}, SUPPLY CLASS: {}\n   SIMILARITY: {:.4}\n   DEFINITION: {}\n\n",
            i + 1,
            c.item_code,
            c.name,
            c.supply_group,
            c.supply_class.code(),
            c.similarity,
            definition,
        ));
    }

    format!(
        r#"You are a supply catalog classification expert.

User has this item: "{description}"

Retrieved candidates from the catalog:
{listing}
Analyze which item code is the best match for the user's item. Consider:
1. Name similarity to user's description
2. Definition relevance
3. Specific details mentioned by user

Respond ONLY with valid JSON in this exact format:
{{
  "selected_item_code": "00000",
  "confidence": 0.95,
  "reasoning": "brief explanation of why this is the best match"
}}

Choose the item code from the candidates above. Confidence should be 0.0-1.0."#
    )
}

fn build_translation_prompt(target_language: &str, definition: &str, reasoning: &str) -> String {
    format!(
        r#"You are a professional translator specializing in military and technical terminology.

Translate the following classification information from English to {target_language}.
Maintain technical accuracy and use appropriate military/technical terminology.

DEFINITION: {definition}
REASONING: {reasoning}

Respond ONLY with valid JSON in this exact format:
{{
  "definition_translated": "{target_language} translation of definition",
  "reasoning_translated": "{target_language} translation of reasoning"
}}

IMPORTANT:
- Keep catalog acronyms in English
- Translate technical terms accurately
- Maintain the same meaning and tone
- DO NOT translate item names - they stay in English"#
    )
}
