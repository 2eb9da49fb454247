use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use super::models::{ChatConfig, ChatMessage, ChatReply, ProviderReply};
use super::sources::extract_sources;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Sends the full conversation (system instruction first, if any) to the
    /// language model and returns the reply text plus grounding chunks.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> Result<ProviderReply, Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// The provider call failed; the message carries the provider's own
    /// description and is what ends up in the channel as `Error: ...`.
    #[error("{0}")]
    Provider(Box<dyn Error + Send + Sync>),
}

/// How conversation histories are keyed.
///
/// `Shared` is the classic single-persona setup: every mention in every
/// channel talks to the same history. `PerChannel` keeps each channel's
/// conversation separate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    Shared,
    PerChannel,
}

impl SessionScope {
    fn key(self, channel_id: u64) -> u64 {
        match self {
            SessionScope::Shared => 0,
            SessionScope::PerChannel => channel_id,
        }
    }
}

/// Conversation front-end: owns the histories and the provider.
///
/// Histories live for the process lifetime and are never persisted.
pub struct ChatService<P: ChatProvider> {
    provider: P,
    system_instruction: Option<String>,
    config: ChatConfig,
    scope: SessionScope,
    sessions: DashMap<u64, Arc<Mutex<Vec<ChatMessage>>>>,
}

impl<P: ChatProvider> ChatService<P> {
    pub fn new(
        provider: P,
        system_instruction: Option<String>,
        config: ChatConfig,
        scope: SessionScope,
    ) -> Self {
        Self {
            provider,
            system_instruction,
            config,
            scope,
            sessions: DashMap::new(),
        }
    }

    /// Appends `text` as the next user turn of the session owning
    /// `channel_id` and returns the model's reply with extracted citations.
    ///
    /// The session lock is held across the provider call, so concurrent
    /// messages on the same session serialize and each request sees a
    /// consistent history. The turn pair is recorded only after the provider
    /// succeeded; a failed call leaves the history untouched.
    pub async fn send(&self, channel_id: u64, text: &str) -> Result<ChatReply, ChatError> {
        let session = self.session(self.scope.key(channel_id));
        let mut history = session.lock().await;

        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(instruction) = &self.system_instruction {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: instruction.clone(),
            });
        }
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: text.to_string(),
        });

        let reply = self
            .provider
            .generate(&messages, &self.config)
            .await
            .map_err(ChatError::Provider)?;

        history.push(ChatMessage {
            role: "user".to_string(),
            content: text.to_string(),
        });
        history.push(ChatMessage {
            role: "assistant".to_string(),
            content: reply.text.clone(),
        });

        tracing::debug!(
            channel_id,
            history_len = history.len(),
            "Chat turn recorded"
        );

        let sources = extract_sources(&reply.grounding_chunks);
        Ok(ChatReply {
            text: reply.text,
            sources,
        })
    }

    fn session(&self, key: u64) -> Arc<Mutex<Vec<ChatMessage>>> {
        self.sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat::models::{GroundingChunk, WebSource};
    use std::sync::Mutex as StdMutex;

    /// Test double: records every request it sees and answers with a canned
    /// reply, or fails when the newest user turn says "boom".
    #[derive(Clone)]
    struct StubProvider {
        seen: Arc<StdMutex<Vec<Vec<ChatMessage>>>>,
        canned: ProviderReply,
    }

    impl StubProvider {
        fn new(canned: ProviderReply) -> Self {
            Self {
                seen: Arc::new(StdMutex::new(Vec::new())),
                canned,
            }
        }
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn generate(
            &self,
            messages: &[ChatMessage],
            _config: &ChatConfig,
        ) -> Result<ProviderReply, Box<dyn Error + Send + Sync>> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if messages.last().map(|m| m.content.as_str()) == Some("boom") {
                return Err("provider exploded".into());
            }
            Ok(self.canned.clone())
        }
    }

    fn config() -> ChatConfig {
        ChatConfig {
            model: "test-model".to_string(),
            web_search: true,
        }
    }

    fn text_reply(text: &str) -> ProviderReply {
        ProviderReply {
            text: text.to_string(),
            grounding_chunks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_system_instruction_leads_the_request() {
        let stub = StubProvider::new(text_reply("4"));
        let service = ChatService::new(
            stub.clone(),
            Some("Be brief.".to_string()),
            config(),
            SessionScope::Shared,
        );

        service.send(1, "what is 2+2?").await.unwrap();

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0][0].role, "system");
        assert_eq!(seen[0][0].content, "Be brief.");
        assert_eq!(seen[0][1].role, "user");
        assert_eq!(seen[0][1].content, "what is 2+2?");
    }

    #[tokio::test]
    async fn test_successful_turns_accumulate_in_history() {
        let stub = StubProvider::new(text_reply("4"));
        let service = ChatService::new(stub.clone(), None, config(), SessionScope::Shared);

        service.send(1, "first").await.unwrap();
        service.send(1, "second").await.unwrap();

        let seen = stub.seen.lock().unwrap();
        // Second request replays the first exchange before the new turn.
        let roles: Vec<&str> = seen[1].iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(seen[1][0].content, "first");
        assert_eq!(seen[1][1].content, "4");
        assert_eq!(seen[1][2].content, "second");
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_history_untouched() {
        let stub = StubProvider::new(text_reply("4"));
        let service = ChatService::new(stub.clone(), None, config(), SessionScope::Shared);

        let err = service.send(1, "boom").await.unwrap_err();
        assert_eq!(err.to_string(), "provider exploded");

        service.send(1, "hello").await.unwrap();

        let seen = stub.seen.lock().unwrap();
        // The failed turn never made it into the session.
        assert_eq!(seen[1].len(), 1);
        assert_eq!(seen[1][0].content, "hello");
    }

    #[tokio::test]
    async fn test_shared_scope_spans_channels() {
        let stub = StubProvider::new(text_reply("4"));
        let service = ChatService::new(stub.clone(), None, config(), SessionScope::Shared);

        service.send(10, "from channel ten").await.unwrap();
        service.send(20, "from channel twenty").await.unwrap();

        let seen = stub.seen.lock().unwrap();
        assert!(seen[1]
            .iter()
            .any(|m| m.content == "from channel ten"));
    }

    #[tokio::test]
    async fn test_per_channel_scope_isolates_channels() {
        let stub = StubProvider::new(text_reply("4"));
        let service = ChatService::new(stub.clone(), None, config(), SessionScope::PerChannel);

        service.send(10, "from channel ten").await.unwrap();
        service.send(20, "from channel twenty").await.unwrap();

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[1].len(), 1);
        assert_eq!(seen[1][0].content, "from channel twenty");
    }

    #[tokio::test]
    async fn test_reply_carries_extracted_sources() {
        let stub = StubProvider::new(ProviderReply {
            text: "4".to_string(),
            grounding_chunks: vec![
                GroundingChunk {
                    web: Some(WebSource {
                        title: Some("Math".to_string()),
                        uri: Some("http://example.com".to_string()),
                    }),
                },
                GroundingChunk { web: None },
            ],
        });
        let service = ChatService::new(stub, None, config(), SessionScope::Shared);

        let reply = service.send(1, "what is 2+2?").await.unwrap();

        assert_eq!(reply.text, "4");
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(reply.sources[0].title, "Math");
        assert_eq!(reply.sources[0].uri, "http://example.com");
    }
}
