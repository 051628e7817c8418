//! Fact extraction provider adapters
//!
//! Extraction turns a raw conversation turn into structured fact candidates:
//! content, an optional multi-value attribute, an optional relationship
//! between named entities, and a category hint. The same provider also
//! answers the two auxiliary LLM questions the engine asks: "which category
//! does this belong to" and "which search strategy fits this query".
//!
//! The mock implementation is rule-based and deterministic. It recognizes
//! the sentence shapes the rest of the engine is tested against: simple
//! relationship statements ("Jack loves Tokyo") and comma lists ("I love
//! Italian, Japanese, and Thai food").

use crate::providers::{ProviderError, ProviderResult};
use crate::search::{Strategy, StrategyChoice};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which extraction backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionProviderType {
    /// OpenAI-compatible chat completions API (requires the `openai` feature)
    OpenAi,
    /// Deterministic rule-based extraction for tests and offline use
    Mock,
}

/// Configuration for fact extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub provider: ExtractionProviderType,

    /// Model name passed to the API (ignored by the mock)
    pub model: String,

    /// API key; read from the environment when None
    pub api_key: Option<String>,

    /// Override the API base URL
    pub api_base_url: Option<String>,

    /// Per-call deadline in seconds
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::mock()
    }
}

impl ExtractionConfig {
    pub fn mock() -> Self {
        Self {
            provider: ExtractionProviderType::Mock,
            model: "mock".to_string(),
            api_key: None,
            api_base_url: None,
            timeout_secs: 30,
        }
    }

    pub fn openai(api_key: Option<String>) -> Self {
        Self {
            provider: ExtractionProviderType::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key,
            api_base_url: None,
            timeout_secs: 30,
        }
    }
}

/// Build the provider named by the config
pub fn create_extraction_provider(
    config: &ExtractionConfig,
) -> ProviderResult<Arc<dyn ExtractionProvider>> {
    match config.provider {
        ExtractionProviderType::Mock => Ok(Arc::new(MockExtractionProvider::new())),
        #[cfg(feature = "openai")]
        ExtractionProviderType::OpenAi => Ok(Arc::new(openai::OpenAiExtractionProvider::new(
            &config.model,
            config.api_key.clone(),
            config.api_base_url.clone(),
            config.timeout_secs,
        )?)),
        #[cfg(not(feature = "openai"))]
        ExtractionProviderType::OpenAi => Err(ProviderError::Unavailable(
            "openai feature not enabled".to_string(),
        )),
    }
}

/// Suggested category for a candidate, as raw strings
///
/// Strings rather than [`mnemos_core::CategoryPath`] because the provider
/// may hallucinate a domain outside the closed set; the pipeline coerces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryHint {
    pub domain: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub detail: String,
}

impl CategoryHint {
    pub fn new(domain: &str, topic: &str, entity_type: &str, detail: &str) -> Self {
        Self {
            domain: domain.to_string(),
            topic: topic.to_string(),
            entity_type: entity_type.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// A relationship between two named entities found in a candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRelationship {
    pub source_name: String,
    pub source_type: String,
    /// Relationship label; parsed against the closed link-type set later
    pub link_type: String,
    pub target_name: String,
    pub target_type: String,
    #[serde(default)]
    pub bidirectional: bool,
}

/// One extracted fact candidate, before categorization and dedup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFact {
    /// The statement to remember
    pub content: String,

    /// Coarse label from the extractor: statement, preference, relationship
    #[serde(default)]
    pub fact_type: String,

    /// Extractor confidence in [0, 1]
    pub confidence: f64,

    /// Attribute name when the statement carries a value list
    #[serde(default)]
    pub attribute: Option<String>,

    /// Values under the attribute
    #[serde(default)]
    pub values: Vec<String>,

    /// Category suggested by the extractor, if any
    #[serde(default)]
    pub category: Option<CategoryHint>,

    /// Relationship found in the statement, if any
    #[serde(default)]
    pub relationship: Option<CandidateRelationship>,
}

impl CandidateFact {
    pub fn new(content: &str, fact_type: &str, confidence: f64) -> Self {
        Self {
            content: content.to_string(),
            fact_type: fact_type.to_string(),
            confidence,
            attribute: None,
            values: Vec::new(),
            category: None,
            relationship: None,
        }
    }
}

/// Turns conversation text into structured candidates and answers the
/// engine's categorization and strategy-selection questions
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Extract fact candidates from one conversation turn
    async fn extract_facts(&self, text: &str) -> ProviderResult<Vec<CandidateFact>>;

    /// Suggest a category for a single statement
    async fn select_category(&self, content: &str) -> ProviderResult<CategoryHint>;

    /// Suggest a search strategy for a query
    async fn select_strategy(&self, query: &str) -> ProviderResult<StrategyChoice>;
}

/// Keyword-table categorization, shared by the mock provider and the
/// pipeline's local fallback when the provider is down
pub fn rule_based_category(content: &str) -> CategoryHint {
    let lower = content.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| contains_word(&lower, w));

    if has(&["food", "eat", "cuisine", "restaurant", "dish", "cooking"]) {
        CategoryHint::new("preferences", "food", "cuisine", "")
    } else if has(&["music", "band", "song", "album", "concert"]) {
        CategoryHint::new("preferences", "music", "", "")
    } else if has(&["friend", "friends"]) {
        CategoryHint::new("relationships", "friends", "person", "")
    } else if has(&[
        "mother", "father", "mom", "dad", "brother", "sister", "wife", "husband", "partner",
    ]) {
        CategoryHint::new("relationships", "family", "person", "")
    } else if has(&["work", "job", "project", "meeting", "boss", "career", "office"]) {
        CategoryHint::new("work", "projects", "", "")
    } else if has(&["sick", "doctor", "allergy", "allergic", "sleep", "health", "pain"]) {
        CategoryHint::new("health", "", "", "")
    } else if has(&["gym", "run", "running", "soccer", "tennis", "hiking", "yoga", "swim"]) {
        CategoryHint::new("activities", "sports", "", "")
    } else if has(&["live", "lives", "moved", "city", "town", "neighborhood"]) {
        CategoryHint::new("places", "", "place", "")
    } else if has(&[
        "python",
        "rust",
        "programming",
        "code",
        "language",
        "fastapi",
        "typescript",
        "database",
    ]) {
        CategoryHint::new("knowledge", "programming", "", "")
    } else if has(&["want", "plan", "goal", "hope", "dream", "someday"]) {
        CategoryHint::new("goals", "", "", "")
    } else if has(&["loves", "fears", "knows", "hates", "attended"]) {
        CategoryHint::new("relationships", "", "", "")
    } else {
        CategoryHint::new("personal", "", "", "")
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|t| t == word)
}

/// Deterministic rule-based extraction for tests and offline use
#[derive(Debug, Default)]
pub struct MockExtractionProvider;

impl MockExtractionProvider {
    pub fn new() -> Self {
        Self
    }

    fn extract_sentence(&self, sentence: &str) -> Option<CandidateFact> {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            return None;
        }

        if let Some(candidate) = self.extract_value_list(sentence) {
            return Some(candidate);
        }
        if let Some(candidate) = self.extract_relationship(sentence) {
            return Some(candidate);
        }
        Some(CandidateFact::new(sentence, "statement", 0.8))
    }

    /// "I love Italian, Japanese, and Thai food" becomes one candidate with
    /// attribute "likes" and three values
    fn extract_value_list(&self, sentence: &str) -> Option<CandidateFact> {
        let lower = sentence.to_lowercase();
        if !lower.contains(',') {
            return None;
        }

        let attribute = if ["love", "loves", "like", "likes", "enjoy", "enjoys"]
            .iter()
            .any(|v| contains_word(&lower, v))
        {
            "likes"
        } else if ["prefer", "prefers"].iter().any(|v| contains_word(&lower, v)) {
            "prefers"
        } else if ["dislike", "dislikes", "hate", "hates"]
            .iter()
            .any(|v| contains_word(&lower, v))
        {
            "dislikes"
        } else {
            return None;
        };

        // Everything after the verb is the list
        let verb_end = ["loves", "love", "likes", "like", "enjoys", "enjoy", "prefers", "prefer",
            "dislikes", "dislike", "hates", "hate"]
        .iter()
        .find_map(|v| lower.find(v).map(|i| i + v.len()))?;
        let list_part = sentence.get(verb_end..)?;

        let values: Vec<String> = list_part
            .split(',')
            .flat_map(|part| part.split(" and "))
            .map(|v| v.trim().trim_end_matches('.').trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.len() < 2 {
            return None;
        }

        let mut candidate = CandidateFact::new(sentence, "preference", 0.85);
        candidate.attribute = Some(attribute.to_string());
        candidate.values = values;
        Some(candidate)
    }

    /// "Jack loves Tokyo" becomes a relationship candidate between the two
    /// capitalized names around the verb
    fn extract_relationship(&self, sentence: &str) -> Option<CandidateFact> {
        let tokens: Vec<&str> = sentence
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();

        for (i, token) in tokens.iter().enumerate() {
            let lower = token.to_lowercase();
            let (link_type, target_offset) = match lower.as_str() {
                "loves" | "fears" | "knows" | "likes" | "dislikes" | "hates" | "attended"
                | "uses" | "prefers" => (lower.clone(), i + 1),
                "lives" | "works"
                    if tokens
                        .get(i + 1)
                        .map(|t| {
                            let next = t.to_lowercase();
                            next == "in" || next == "at"
                        })
                        .unwrap_or(false) =>
                {
                    let preposition = tokens[i + 1].to_lowercase();
                    (format!("{lower} {preposition}"), i + 2)
                }
                _ => continue,
            };

            let source = tokens[..i].iter().rev().find(|t| is_proper_name(t))?;
            let target: Vec<&str> = tokens[target_offset..]
                .iter()
                .take_while(|t| is_proper_name(t))
                .copied()
                .collect();
            if target.is_empty() {
                return None;
            }

            let mut candidate = CandidateFact::new(sentence.trim(), "relationship", 0.9);
            candidate.relationship = Some(CandidateRelationship {
                source_name: source.to_string(),
                source_type: "person".to_string(),
                link_type,
                target_name: target.join(" "),
                target_type: "concept".to_string(),
                bidirectional: false,
            });
            return Some(candidate);
        }
        None
    }
}

fn is_proper_name(token: &str) -> bool {
    token != "I"
        && token
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
}

#[async_trait]
impl ExtractionProvider for MockExtractionProvider {
    async fn extract_facts(&self, text: &str) -> ProviderResult<Vec<CandidateFact>> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty text".to_string()));
        }

        Ok(text
            .split(['.', '!', '?', ';'])
            .filter_map(|s| self.extract_sentence(s))
            .collect())
    }

    async fn select_category(&self, content: &str) -> ProviderResult<CategoryHint> {
        Ok(rule_based_category(content))
    }

    async fn select_strategy(&self, query: &str) -> ProviderResult<StrategyChoice> {
        let lower = query.to_lowercase();
        let choice = if ["yesterday", "today", "last week", "last month", "last year"]
            .iter()
            .any(|t| lower.contains(t))
        {
            StrategyChoice::single(Strategy::Temporal)
        } else if lower.contains("related") || lower.contains("connected") {
            StrategyChoice::single(Strategy::Graph)
        } else {
            StrategyChoice::hybrid_default()
        };
        Ok(choice)
    }
}

#[cfg(feature = "openai")]
pub use openai::OpenAiExtractionProvider;

#[cfg(feature = "openai")]
mod openai {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    const EXTRACT_PROMPT: &str = "Extract memorable facts about the user from the text. \
Respond with a JSON array; each element has: content (string), fact_type \
(statement|preference|relationship), confidence (0..1), attribute (string or null), \
values (array of strings), category (object with domain, topic, entity_type, detail, \
or null), relationship (object with source_name, source_type, link_type, target_name, \
target_type, bidirectional, or null). Respond with JSON only.";

    const CATEGORY_PROMPT: &str = "Classify the statement into a category path. Respond \
with a JSON object: domain (one of personal, preferences, relationships, work, health, \
activities, places, knowledge, goals), topic, entity_type, detail. JSON only.";

    const STRATEGY_PROMPT: &str = "Pick the best memory search strategy for the query. \
Respond with a JSON object: strategy (semantic|keyword|categorical|temporal|graph|hybrid) \
and optional weights (object mapping strategy names to numbers). JSON only.";

    /// Extraction backed by an OpenAI-compatible chat completions API
    pub struct OpenAiExtractionProvider {
        client: reqwest::Client,
        model: String,
        api_key: String,
        base_url: String,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }

    #[derive(Deserialize)]
    struct ChatChoice {
        message: ChatMessage,
    }

    #[derive(Deserialize)]
    struct ChatMessage {
        content: String,
    }

    impl OpenAiExtractionProvider {
        pub fn new(
            model: &str,
            api_key: Option<String>,
            api_base_url: Option<String>,
            timeout_secs: u64,
        ) -> ProviderResult<Self> {
            let api_key = api_key
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    ProviderError::Unavailable("OPENAI_API_KEY not set".to_string())
                })?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            Ok(Self {
                client,
                model: model.to_string(),
                api_key,
                base_url: api_base_url
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            })
        }

        async fn complete(&self, system: &str, user: &str) -> ProviderResult<String> {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": user},
                    ],
                    "temperature": 0.0,
                }))
                .send()
                .await
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            if response.status().as_u16() == 429 {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(ProviderError::RateLimited { retry_after_secs });
            }
            if !response.status().is_success() {
                return Err(ProviderError::Unavailable(format!(
                    "chat API returned {}",
                    response.status()
                )));
            }

            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            body.choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| ProviderError::Malformed("no completion choices".to_string()))
        }
    }

    /// Strip a markdown code fence if the model wrapped its JSON in one
    fn strip_fence(text: &str) -> &str {
        let text = text.trim();
        text.strip_prefix("```json")
            .or_else(|| text.strip_prefix("```"))
            .and_then(|t| t.strip_suffix("```"))
            .map(str::trim)
            .unwrap_or(text)
    }

    #[async_trait]
    impl ExtractionProvider for OpenAiExtractionProvider {
        async fn extract_facts(&self, text: &str) -> ProviderResult<Vec<CandidateFact>> {
            let raw = self.complete(EXTRACT_PROMPT, text).await?;
            serde_json::from_str(strip_fence(&raw))
                .map_err(|e| ProviderError::Malformed(e.to_string()))
        }

        async fn select_category(&self, content: &str) -> ProviderResult<CategoryHint> {
            let raw = self.complete(CATEGORY_PROMPT, content).await?;
            serde_json::from_str(strip_fence(&raw))
                .map_err(|e| ProviderError::Malformed(e.to_string()))
        }

        async fn select_strategy(&self, query: &str) -> ProviderResult<StrategyChoice> {
            let raw = self.complete(STRATEGY_PROMPT, query).await?;
            let value: serde_json::Value = serde_json::from_str(strip_fence(&raw))
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;

            let strategy = value
                .get("strategy")
                .and_then(|s| s.as_str())
                .and_then(Strategy::parse)
                .ok_or_else(|| {
                    ProviderError::Malformed("unknown strategy in response".to_string())
                })?;

            let weights = value.get("weights").and_then(|w| w.as_object()).map(|map| {
                map.iter()
                    .filter_map(|(name, weight)| {
                        Some((Strategy::parse(name)?, weight.as_f64()?))
                    })
                    .collect()
            });

            Ok(StrategyChoice { strategy, weights })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_relationship_statement() {
        let provider = MockExtractionProvider::new();
        let candidates = provider.extract_facts("Jack loves Tokyo.").await.unwrap();

        assert_eq!(candidates.len(), 1);
        let rel = candidates[0].relationship.as_ref().unwrap();
        assert_eq!(rel.source_name, "Jack");
        assert_eq!(rel.link_type, "loves");
        assert_eq!(rel.target_name, "Tokyo");
    }

    #[tokio::test]
    async fn test_extract_two_word_relationship_verb() {
        let provider = MockExtractionProvider::new();
        let candidates = provider
            .extract_facts("Maria works at Stripe")
            .await
            .unwrap();

        let rel = candidates[0].relationship.as_ref().unwrap();
        assert_eq!(rel.link_type, "works at");
        assert_eq!(rel.target_name, "Stripe");
    }

    #[tokio::test]
    async fn test_extract_value_list_stays_one_candidate() {
        let provider = MockExtractionProvider::new();
        let candidates = provider
            .extract_facts("I love Italian, Japanese, and Thai food.")
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].attribute.as_deref(), Some("likes"));
        assert_eq!(
            candidates[0].values,
            vec!["Italian", "Japanese", "Thai food"]
        );
    }

    #[tokio::test]
    async fn test_extract_plain_statement() {
        let provider = MockExtractionProvider::new();
        let candidates = provider
            .extract_facts("my favorite color is green")
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].relationship.is_none());
        assert!(candidates[0].attribute.is_none());
    }

    #[tokio::test]
    async fn test_multiple_sentences() {
        let provider = MockExtractionProvider::new();
        let candidates = provider
            .extract_facts("Jack loves Tokyo. I started running again.")
            .await
            .unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_text_is_invalid() {
        let provider = MockExtractionProvider::new();
        assert!(matches!(
            provider.extract_facts("   ").await,
            Err(ProviderError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rule_based_category_table() {
        assert_eq!(rule_based_category("I love Thai food").domain, "preferences");
        assert_eq!(rule_based_category("my sister lives nearby").domain, "relationships");
        assert_eq!(rule_based_category("learning Rust and Python").domain, "knowledge");
        assert_eq!(rule_based_category("something else entirely").domain, "personal");
    }
}
