// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements the `ChatProvider` trait against Google's Gemini API
// (https://ai.google.dev/gemini-api/docs).
//
// **API shape notes:**
// - Authentication: API key is passed as a query parameter (`?key=API_KEY`).
// - Request format: `contents[]` with nested `parts`; `systemInstruction` is
//   a separate top-level field (not a message with role "system"), and the
//   assistant role is called "model".
// - Response format: reply text at `candidates[0].content.parts[].text`;
//   web-search citations at
//   `candidates[].groundingMetadata.groundingChunks[].web`.
//
// Every response-side field is optional/defaulted: a response with no
// grounding metadata (or no metadata at some nesting level) must deserialize
// to "no chunks", never fail.

use crate::core::chat::models::{GroundingChunk, WebSource};
use crate::core::chat::{ChatConfig, ChatMessage, ChatProvider, ProviderReply};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// A single part of a content block. Gemini uses a "parts" array to support
/// multimodal content; this bot only ever sends and reads text parts, so
/// anything else deserializes to an empty `Part`.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// A message in the conversation, in Gemini's `{role, parts}` format.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

/// Google Search grounding tool. An empty object enables it; the API then
/// attaches `groundingMetadata` to candidates that used search results.
#[derive(Debug, Serialize, Default)]
struct GoogleSearchTool {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<GoogleSearchTool>,
}

/// The request body for the generateContent endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

/// Grounding metadata returned when the Google Search tool was used.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GeminiGroundingMetadata {
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GeminiGroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

/// Error envelope the API returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

/// Client for Google's Gemini API.
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    /// Creates a new client with an API key from
    /// https://aistudio.google.com/apikey.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn text_part(text: String) -> Part {
        Part { text: Some(text) }
    }

    /// Converts a core `ChatMessage` to Gemini's `Content` format.
    /// Gemini calls the assistant role "model".
    fn convert_message(msg: &ChatMessage) -> Content {
        let role = match msg.role.as_str() {
            "assistant" => "model".to_string(),
            other => other.to_string(),
        };

        Content {
            role,
            parts: vec![Self::text_part(msg.content.clone())],
        }
    }

    /// Concatenates the text parts of a candidate, skipping non-text parts.
    fn candidate_text(candidate: &Candidate) -> String {
        candidate
            .content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    /// Collects grounding chunks across all candidates, preserving response
    /// order, into the core's optional-typed representation.
    fn collect_grounding(candidates: &[Candidate]) -> Vec<GroundingChunk> {
        candidates
            .iter()
            .filter_map(|candidate| candidate.grounding_metadata.as_ref())
            .flat_map(|metadata| metadata.grounding_chunks.iter())
            .map(|chunk| GroundingChunk {
                web: chunk.web.as_ref().map(|web| WebSource {
                    title: web.title.clone(),
                    uri: web.uri.clone(),
                }),
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> Result<ProviderReply, Box<dyn Error + Send + Sync>> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            config.model, self.api_key
        );

        // The system instruction travels as a separate top-level field.
        let system_instruction: Option<Content> = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| Content {
                role: "user".to_string(),
                parts: vec![Self::text_part(m.content.clone())],
            });

        let contents: Vec<Content> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(Self::convert_message)
            .collect();

        let tools = config.web_search.then(|| {
            vec![GeminiTool {
                google_search: Some(GoogleSearchTool::default()),
            }]
        });

        let request = GenerateContentRequest {
            contents,
            system_instruction,
            tools,
        };

        tracing::debug!(
            "Gemini request to model {}: {} messages",
            config.model,
            request.contents.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            // Prefer the structured error message when the body parses.
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(format!(
                    "Gemini API error ({}): {}",
                    status, error_response.error.message
                )
                .into());
            }

            return Err(format!("Gemini API error: {} - {}", status, error_text).into());
        }

        let response_json: GenerateContentResponse = response.json().await?;
        let candidates = response_json.candidates.unwrap_or_default();

        let text = candidates.first().map(Self::candidate_text).ok_or(
            "No content in Gemini response - the model may have been blocked by safety filters",
        )?;

        let grounding_chunks = Self::collect_grounding(&candidates);

        tracing::debug!(
            "Gemini response received: {} chars, {} grounding chunks",
            text.len(),
            grounding_chunks.len()
        );

        Ok(ProviderReply {
            text,
            grounding_chunks,
        })
    }
}
