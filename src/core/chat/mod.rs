pub mod chat_service;
pub mod models;
pub mod sources;

pub use chat_service::{ChatError, ChatProvider, ChatService, SessionScope};
pub use models::{ChatConfig, ChatMessage, ChatReply, ProviderReply, SourceCitation};
pub use sources::extract_sources;
