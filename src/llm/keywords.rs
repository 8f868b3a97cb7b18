

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::IntoStaticStr;
use tracing::{debug, warn};

use super::providers::{GenerateOptions, LlmProvider};
use crate::MAX_KEYWORDS;


const FALLBACK_KEYWORDS: usize = 3;

const KEYWORD_TEMPERATURE: f64 = 0.1;

const KEYWORD_MAX_TOKENS: u32 = 64;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeywordSource {
    Llm,
    Fallback,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordExtraction {
    /// Salience order as returned by the model.
    pub keywords: Vec<String>,
    pub source: KeywordSource,
}


fn build_prompt(query: &str) -> String {
    format!(
        "Extract the key concept keywords from the question below.\n\
         Question: {}\n\n\
         List only the key keywords, separated by commas, most important first. \
         Leave out particles, question words and filler.\n\
         Example: 사랑이란 무엇인가? -> 사랑, 감정, 의미\n\n\
         Keywords:",
        query
    )
}

/// Splits the model's comma list. Order is kept; tokens of one character are dropped.
pub fn parse_keyword_response(response: &str) -> Vec<String> {
    response
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|k| k.chars().count() > 1)
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Whitespace tokens longer than one character, first three, in query order.
pub fn fallback_keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .take(FALLBACK_KEYWORDS)
        .map(str::to_string)
        .collect()
}


pub struct KeywordExtractor {
    provider: Arc<dyn LlmProvider>,
}

impl KeywordExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Never fails: a failed call degrades to [`fallback_keywords`].
    pub async fn extract(&self, query: &str) -> KeywordExtraction {
        let prompt = build_prompt(query);
        let options = GenerateOptions::new(KEYWORD_TEMPERATURE, KEYWORD_MAX_TOKENS);

        match self.provider.generate(&prompt, &options).await {
            Ok(response) => {
                let keywords = parse_keyword_response(&response);
                debug!("Extracted keywords: {:?}", keywords);
                KeywordExtraction {
                    keywords,
                    source: KeywordSource::Llm,
                }
            }
            Err(e) => {
                warn!("Keyword extraction failed, using fallback: {}", e);
                KeywordExtraction {
                    keywords: fallback_keywords(query),
                    source: KeywordSource::Fallback,
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::providers::LlmProviderError;
    use async_trait::async_trait;

    /// Returns a fixed reply, or fails when `reply` is `None`.
    pub(crate) struct ScriptedProvider {
        pub reply: Option<String>,
    }

    impl ScriptedProvider {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self { reply: None }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String, LlmProviderError> {
            self.reply
                .clone()
                .ok_or_else(|| LlmProviderError::Provider("connection refused".to_string()))
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_parse_keeps_model_order() {
        let parsed = parse_keyword_response(" 사랑, 감정 ,의미, a, 관계, 마음, 행복 ");
        assert_eq!(parsed, vec!["사랑", "감정", "의미", "관계", "마음"]);
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(parse_keyword_response("").is_empty());
        assert!(parse_keyword_response(" , ,").is_empty());
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let query = "사랑 이란 무엇 인가 정말";
        let first = fallback_keywords(query);
        assert_eq!(first, vec!["사랑", "이란", "무엇"]);
        assert_eq!(first, fallback_keywords(query));
    }

    #[test]
    fn test_fallback_drops_single_chars() {
        assert_eq!(fallback_keywords("a 나 love is"), vec!["love", "is"]);
        assert!(fallback_keywords("   ").is_empty());
    }

    #[test]
    fn test_prompt_contains_query() {
        assert!(build_prompt("사랑이란?").contains("Question: 사랑이란?"));
    }

    #[tokio::test]
    async fn test_extract_uses_llm_reply() {
        let extractor = KeywordExtractor::new(Arc::new(ScriptedProvider::replying("사랑, 감정")));
        let out = extractor.extract("사랑이란 무엇인가?").await;
        assert_eq!(out.source, KeywordSource::Llm);
        assert_eq!(out.keywords, vec!["사랑", "감정"]);
    }

    #[tokio::test]
    async fn test_extract_falls_back_on_failure() {
        let extractor = KeywordExtractor::new(Arc::new(ScriptedProvider::failing()));
        let out = extractor.extract("사랑 그리고 감정").await;
        assert_eq!(out.source, KeywordSource::Fallback);
        assert_eq!(out.keywords, vec!["사랑", "그리고", "감정"]);
    }
}
