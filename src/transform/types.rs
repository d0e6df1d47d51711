use serde::{Deserialize, Serialize};

use crate::{
    extractor::ScrapedContent, generator::TokenUsage, personas::Persona, transform::ErrorCode,
};

pub const DIRECT_TEXT_TITLE: &str = "Direct Text Input";
pub const DIRECT_TEXT_URL: &str = "Direct Text Input";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalContent {
    pub title: String,
    pub content: String,
    pub url: String,
    pub word_count: usize,
}

impl From<&ScrapedContent> for OriginalContent {
    fn from(scraped: &ScrapedContent) -> Self {
        Self {
            title: scraped.title.clone(),
            content: scraped.content.clone(),
            url: scraped.url.clone(),
            word_count: scraped.metadata.word_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSummary {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&Persona> for PersonaSummary {
    fn from(persona: &Persona) -> Self {
        Self {
            id: persona.id.clone(),
            name: persona.name.clone(),
            description: persona.description.clone(),
        }
    }
}

/// Outcome of one transformation attempt; the unit stored in the transform cache.
///
/// Build through [`TransformationResult::succeeded`] or
/// [`TransformationResult::failed`]: a failure always has an error and empty
/// text, a success never has an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationResult {
    pub success: bool,
    pub original_content: OriginalContent,
    pub transformed_content: String,
    pub persona: PersonaSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransformationResult {
    pub fn succeeded(
        original_content: OriginalContent,
        persona: PersonaSummary,
        transformed_content: String,
        usage: Option<TokenUsage>,
    ) -> Self {
        Self {
            success: true,
            original_content,
            transformed_content,
            persona,
            usage,
            error: None,
        }
    }

    pub fn failed(
        original_content: OriginalContent,
        persona: PersonaSummary,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            original_content,
            transformed_content: String::new(),
            persona,
            usage: None,
            error: Some(error.into()),
        }
    }
}

/// Envelope returned to the route layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationServiceResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<TransformationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Raw message kept for diagnostics when the code alone says little.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl TransformationServiceResult {
    pub fn ok(data: TransformationResult, cached: bool) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
            details: None,
            cached: cached.then_some(true),
        }
    }

    pub fn err(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_code: Some(code),
            details: None,
            cached: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_data(mut self, data: TransformationResult) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_cached(&self) -> bool {
        self.cached == Some(true)
    }
}
