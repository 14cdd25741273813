//! End-to-end pipeline tests over real index artifacts and deterministic
//! stub services.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codara::services::{ChatClient, Embedder, ServiceError};
use codara::vector::{CatalogEntry, VectorStorageWriter, write_catalog};
use codara::{Codifier, Settings, VectorDimension, VectorIndex};
use tempfile::TempDir;

const DIM: usize = 2;

/// Chat stub that routes each prompt to a canned reply by stage and
/// records every prompt for inspection.
struct StubChat {
    understanding_reply: String,
    arbitration_reply: String,
    translation_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl StubChat {
    fn new() -> Self {
        Self {
            understanding_reply: r#"{
                "category": "aircraft parts",
                "item_type": "gas turbine module",
                "characteristics": ["jet engine component"],
                "search_keywords": ["turbine", "accessory", "module", "aircraft", "engine"]
            }"#
            .to_string(),
            arbitration_reply:
                r#"{"selected_item_code":"2840","confidence":0.95,"reasoning":"best name match"}"#
                    .to_string(),
            translation_reply:
                r#"{"definition_translated":"شفرة توربين","reasoning_translated":"أفضل تطابق للاسم"}"#
                    .to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for StubChat {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(user.to_string());
        let reply = if user.contains("Retrieved candidates") {
            &self.arbitration_reply
        } else if user.contains("Translate the following") {
            &self.translation_reply
        } else {
            &self.understanding_reply
        };
        Ok(reply.clone())
    }
}

/// Chat stub that never answers within any reasonable deadline.
struct StalledChat;

#[async_trait]
impl ChatClient for StalledChat {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ServiceError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("sleep outlives every test deadline")
    }
}

/// Embedder stub that puts every query at the origin, so candidate
/// distance equals the squared norm of its stored vector.
struct OriginEmbedder;

#[async_trait]
impl Embedder for OriginEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Ok(vec![0.0; DIM])
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(DIM).unwrap()
    }
}

/// Builds index artifacts in a fresh directory.
///
/// Vector norms are chosen so that similarity = 1/(1+d) lands on the
/// intended value: 0.3144855² ≈ 0.0989 → 0.91, 0.5311791² ≈ 0.2821 → 0.78.
fn build_index(rows: &[(CatalogEntry, Vec<f32>)]) -> (TempDir, Arc<VectorIndex>) {
    let dir = TempDir::new().unwrap();
    let dimension = VectorDimension::new(DIM).unwrap();

    let mut writer = VectorStorageWriter::create(dir.path(), dimension).unwrap();
    for (_, vector) in rows {
        writer.append(vector).unwrap();
    }
    writer.finish().unwrap();

    let entries: Vec<CatalogEntry> = rows.iter().map(|(e, _)| e.clone()).collect();
    write_catalog(dir.path(), &entries).unwrap();

    let index = Arc::new(VectorIndex::open(dir.path()).unwrap());
    (dir, index)
}

fn boeing_rows() -> Vec<(CatalogEntry, Vec<f32>)> {
    vec![
        (
            CatalogEntry {
                item_code: 2840,
                name: "TURBINE,AIRCRAFT GAS ENGINE".to_string(),
                definition: "A rotary engine component extracting energy from combustion gas flow."
                    .to_string(),
                supply_group: 28,
                supply_class: "2840".to_string(),
            },
            vec![0.314_485_5, 0.0],
        ),
        (
            CatalogEntry {
                item_code: 3010,
                name: "BLADE,FAN,AIRCRAFT".to_string(),
                definition: "An airfoil-shaped blade for aircraft cooling and propulsion fans."
                    .to_string(),
                supply_group: 30,
                supply_class: "3010".to_string(),
            },
            vec![0.531_179_1, 0.0],
        ),
    ]
}

fn test_settings(index_dir: &std::path::Path) -> Settings {
    let mut settings = Settings::default();
    settings.index.dir = index_dir.to_path_buf();
    settings.embedding.dimension = DIM;
    settings.retrieval.top_k = 5;
    settings.retrieval.similarity_threshold = 0.6;
    settings.service.request_timeout_secs = 30;
    settings
}

fn codifier(settings: Settings, index: Arc<VectorIndex>, chat: Arc<StubChat>) -> Codifier {
    Codifier::new(Arc::new(settings), index, chat, Arc::new(OriginEmbedder))
        .expect("dimension matches artifacts")
}

#[tokio::test]
async fn classifies_boeing_turbine_module_end_to_end() {
    let (dir, index) = build_index(&boeing_rows());
    let chat = Arc::new(StubChat::new());
    let codifier = codifier(test_settings(dir.path()), index, chat.clone());

    let result = codifier
        .codify("Boeing 737 gas turbine accessory module")
        .await;

    assert!(result.success);
    assert_eq!(result.query, "Boeing 737 gas turbine accessory module");
    assert!(result.error.is_none());

    let c = result.classification.expect("successful classification");
    assert_eq!(c.item_code, 2840);
    assert_eq!(c.name, "TURBINE,AIRCRAFT GAS ENGINE");
    assert_eq!(c.confidence, 0.95);
    assert_eq!(c.reasoning, "best name match");
    assert_eq!(c.supply_group, 28);
    assert_eq!(c.supply_class, "2840");
    assert_eq!(c.supply_class_display, "40");
    assert_eq!(c.definition_translated, "شفرة توربين");
    assert_eq!(c.reasoning_translated, "أفضل تطابق للاسم");

    // All three stages went through the chat service exactly once
    assert_eq!(chat.prompts().len(), 3);
}

#[tokio::test]
async fn item_name_is_never_sent_for_translation() {
    let (dir, index) = build_index(&boeing_rows());
    let chat = Arc::new(StubChat::new());
    let codifier = codifier(test_settings(dir.path()), index, chat.clone());

    let result = codifier
        .codify("Boeing 737 gas turbine accessory module")
        .await;

    let c = result.classification.expect("successful classification");
    // The name comes back byte-identical to the catalog entry
    assert_eq!(c.name, "TURBINE,AIRCRAFT GAS ENGINE");

    let prompts = chat.prompts();
    let translation = prompts
        .iter()
        .find(|p| p.contains("Translate the following"))
        .expect("translation prompt was sent");
    assert!(!translation.contains("TURBINE,AIRCRAFT GAS ENGINE"));
    // Definition and reasoning are what gets translated
    assert!(translation.contains("rotary engine component"));
    assert!(translation.contains("best name match"));
}

#[tokio::test]
async fn empty_index_reports_no_matching_items() {
    let (dir, index) = build_index(&[]);
    let chat = Arc::new(StubChat::new());
    let codifier = codifier(test_settings(dir.path()), index, chat);

    let result = codifier.codify("anything at all").await;

    assert!(!result.success);
    assert!(result.classification.is_none());
    assert_eq!(result.error.as_deref(), Some("no matching items found"));
}

#[tokio::test]
async fn repeated_queries_yield_identical_results() {
    let (dir, index) = build_index(&boeing_rows());
    let chat = Arc::new(StubChat::new());
    let codifier = codifier(test_settings(dir.path()), index, chat);

    let first = codifier
        .codify("Boeing 737 gas turbine accessory module")
        .await;
    let second = codifier
        .codify("Boeing 737 gas turbine accessory module")
        .await;

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn malformed_extraction_degrades_to_raw_tokens() {
    let (dir, index) = build_index(&boeing_rows());
    let mut chat = StubChat::new();
    chat.understanding_reply = "I think this is probably a turbine of some kind".to_string();
    let chat = Arc::new(chat);
    let codifier = codifier(test_settings(dir.path()), index, chat);

    // The pipeline still completes; retrieval runs on the raw tokens
    let result = codifier.codify("Turbine Blade").await;
    assert!(result.success);
    assert_eq!(result.classification.unwrap().item_code, 2840);
}

#[tokio::test]
async fn query_is_stamped_untrimmed() {
    let (dir, index) = build_index(&boeing_rows());
    let chat = Arc::new(StubChat::new());
    let codifier = codifier(test_settings(dir.path()), index, chat);

    let result = codifier
        .codify("  Boeing 737 gas turbine accessory module\n")
        .await;

    assert!(result.success);
    // The caller's text comes back verbatim, surrounding whitespace included
    assert_eq!(result.query, "  Boeing 737 gas turbine accessory module\n");
}

#[tokio::test]
async fn empty_description_fails_without_service_calls() {
    let (dir, index) = build_index(&boeing_rows());
    let chat = Arc::new(StubChat::new());
    let codifier = codifier(test_settings(dir.path()), index, chat.clone());

    let result = codifier.codify("   ").await;

    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(chat.prompts().is_empty());
}

#[tokio::test]
async fn stalled_service_hits_the_request_deadline() {
    let (dir, index) = build_index(&boeing_rows());
    let mut settings = test_settings(dir.path());
    settings.service.request_timeout_secs = 1;

    let codifier = Codifier::new(
        Arc::new(settings),
        index,
        Arc::new(StalledChat),
        Arc::new(OriginEmbedder),
    )
    .expect("dimension matches artifacts");

    tokio::time::pause();
    let result = codifier.codify("turbine blade").await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out after 1s"));
}

#[tokio::test]
async fn serialized_result_is_flat() {
    let (dir, index) = build_index(&boeing_rows());
    let chat = Arc::new(StubChat::new());
    let codifier = codifier(test_settings(dir.path()), index, chat);

    let result = codifier
        .codify("Boeing 737 gas turbine accessory module")
        .await;
    let value: serde_json::Value = serde_json::to_value(&result).unwrap();

    // Classification fields sit at the top level, not nested
    assert_eq!(value["success"], true);
    assert_eq!(value["item_code"], 2840);
    assert_eq!(value["supply_class_display"], "40");
    assert!(value.get("classification").is_none());
    assert!(value.get("error").is_none());
}
