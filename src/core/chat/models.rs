use serde::{Deserialize, Serialize};

/// A single conversation turn. Roles are "user", "assistant", or "system"
/// (the system role is only used as an envelope for the system instruction;
/// providers translate it to their own representation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    /// Enable the provider's web-search grounding tool.
    pub web_search: bool,
}

/// Web source attached to a grounding chunk. Every field is optional - the
/// provider may omit any of them and absence is never an error.
#[derive(Debug, Clone, Default)]
pub struct WebSource {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// One grounding chunk from the provider's citation metadata.
#[derive(Debug, Clone, Default)]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

/// Raw provider output: the reply text plus whatever grounding chunks the
/// response carried, in response order.
#[derive(Debug, Clone, Default)]
pub struct ProviderReply {
    pub text: String,
    pub grounding_chunks: Vec<GroundingChunk>,
}

/// A citation that survived extraction: both title and URI are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCitation {
    pub title: String,
    pub uri: String,
}

/// What the chat service hands back to the caller.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub sources: Vec<SourceCitation>,
}
