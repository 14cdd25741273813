//! Stage 1: query understanding.
//!
//! Turns a free-text asset description into a [`QuerySignal`] via the chat
//! service. A reply that cannot be parsed degrades silently to raw-token
//! keywords; only an unreachable service fails the stage.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::PipelineResult;
use crate::model::QuerySignal;
use crate::services::{ChatClient, StructuredReply, complete_structured};

const SYSTEM_PROMPT: &str =
    "You are a supply catalog classification expert. Always respond with valid JSON only.";

pub struct QueryUnderstanding {
    chat: Arc<dyn ChatClient>,
}

impl QueryUnderstanding {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    /// Extracts category, item type, characteristics, and ranked search
    /// keywords from the description.
    ///
    /// Never returns an empty signal: malformed extraction output falls
    /// back to the lower-cased whitespace split of the description, and
    /// that fallback is logged but not surfaced to the caller.
    pub async fn understand(&self, description: &str) -> PipelineResult<QuerySignal> {
        let prompt = build_prompt(description);

        let signal = match complete_structured::<QuerySignal>(
            self.chat.as_ref(),
            SYSTEM_PROMPT,
            &prompt,
        )
        .await
        {
            StructuredReply::Parsed(signal) => {
                if signal.search_keywords.is_empty() {
                    warn!("Extraction returned no keywords, using raw tokens");
                    QuerySignal {
                        search_keywords: QuerySignal::fallback(description).search_keywords,
                        ..signal
                    }
                } else {
                    signal
                }
            }
            StructuredReply::Malformed { raw } => {
                warn!(
                    raw_len = raw.len(),
                    "Extraction reply was not valid JSON, using raw tokens"
                );
                QuerySignal::fallback(description)
            }
            StructuredReply::Unavailable(e) => return Err(e.into()),
        };

        info!(
            category = %signal.category,
            item_type = %signal.item_type,
            keywords = ?signal.search_keywords,
            "Query understood"
        );

        Ok(signal)
    }
}

fn build_prompt(description: &str) -> String {
    format!(
        r#"You are a supply catalog classification expert.

User has this item: "{description}"

IMPORTANT - Query Normalization:
- Focus on the PRIMARY function/type of the item, not word order
- "computer desktop" = "desktop computer" (computing equipment)
- "computer desk" = furniture for holding a computer
- "phone mobile" = "mobile phone" (communications equipment)
- Identify the CORE item first, then modifiers

Extract key information to help search the catalog:
1. Item category (vehicle, aircraft part, electronic component, clothing, weapon, office equipment, furniture, etc.)
2. Specific item type (what IS it primarily?)
3. Key characteristics and features
4. 5-7 search keywords that best describe this item's PRIMARY FUNCTION

Respond ONLY with valid JSON in this exact format:
{{
  "category": "item category",
  "item_type": "specific type",
  "characteristics": ["characteristic1", "characteristic2"],
  "search_keywords": ["keyword1", "keyword2", "keyword3", "keyword4", "keyword5"]
}}"#
    )
}
