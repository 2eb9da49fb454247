// The message event handler - the whole bot is one linear flow per message.
//
// **Notice the pattern:**
// 1. Filter (bot authors, messages that don't mention us)
// 2. Call core services
// 3. Translate results into channel messages
//
// This layer is THIN - no business logic, just orchestration. A language-model
// failure ends handling for the message; a voice failure is reported and the
// text reply still goes out.

use std::sync::Arc;

use serenity::all::{Context, EventHandler, Message, Ready};
use serenity::async_trait;
use songbird::Call;
use tokio::sync::Mutex;

use crate::core::chat::ChatService;
use crate::core::speech::{SpeechError, SpeechService};
use crate::discord::voice::VoiceManager;
use crate::infra::ai::GeminiClient;
use crate::infra::tts::VoicevoxClient;

/// Discord rejects messages longer than this.
const MESSAGE_CHUNK: usize = 2000;

/// Shared services, injected once at startup.
pub struct Data {
    pub chat: Arc<ChatService<GeminiClient>>,
    pub speech: Arc<SpeechService<VoicevoxClient>>,
    pub voice: Arc<VoiceManager>,
}

pub struct Handler {
    pub data: Data,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!("Connected as {}", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore bot messages (including our own) and anything not aimed at us.
        if msg.author.bot {
            return;
        }
        let bot_id = ctx.cache.current_user().id;
        if !msg.mentions.iter().any(|u| u.id == bot_id) {
            return;
        }

        let _ = msg.channel_id.broadcast_typing(&ctx.http).await;

        // Step 1: forward to the conversation session. A provider failure is
        // the one error that ends handling for this message.
        let reply = match self.data.chat.send(msg.channel_id.get(), &msg.content).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Chat provider error: {}", e);
                let _ = msg.channel_id.say(&ctx.http, format!("Error: {e}")).await;
                return;
            }
        };

        // Steps 2-3: if the author is sitting in a voice channel of this
        // guild, speak the reply there. Join, synthesis, and playback errors
        // are reported to the channel without aborting the text reply.
        if let Some((guild_id, voice_channel)) = author_voice_channel(&ctx, &msg) {
            match self.data.voice.connect(guild_id, voice_channel).await {
                Ok(call) => {
                    let _ = msg
                        .channel_id
                        .say(&ctx.http, "Synthesizing voice...")
                        .await;
                    if let Err(e) = self.speak(&call, msg.id.get(), &reply.text).await {
                        tracing::warn!("Voice reply failed: {}", e);
                        let _ = msg.channel_id.say(&ctx.http, format!("Error: {e}")).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Voice connect failed: {}", e);
                    let _ = msg.channel_id.say(&ctx.http, format!("Error: {e}")).await;
                }
            }
        }

        // Step 4: the text reply always goes out, chunked to Discord's limit.
        for chunk in chunk_message(&reply.text, MESSAGE_CHUNK) {
            if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                tracing::error!("Failed to send reply: {}", e);
            }
        }

        // Step 5: cited sources, one message per line.
        if !reply.sources.is_empty() {
            let _ = msg.channel_id.say(&ctx.http, "Sources:").await;
            for source in &reply.sources {
                let _ = msg
                    .channel_id
                    .say(&ctx.http, format!("{}: {}", source.title, source.uri))
                    .await;
            }
        }
    }
}

impl Handler {
    /// Renders the reply to its per-message artifact and starts playback.
    async fn speak(
        &self,
        call: &Arc<Mutex<Call>>,
        message_id: u64,
        text: &str,
    ) -> Result<(), SpeechError> {
        let wav_path = self.data.speech.render(message_id, text).await?;
        self.data.voice.play_file(call, &wav_path).await;
        Ok(())
    }
}

/// Looks up the voice channel the author currently sits in, via the guild's
/// cached voice states. Requires the GUILD_VOICE_STATES intent.
fn author_voice_channel(ctx: &Context, msg: &Message) -> Option<(u64, u64)> {
    let guild_id = msg.guild_id?;
    let channel_id = ctx
        .cache
        .guild(guild_id)
        .and_then(|guild| {
            guild
                .voice_states
                .get(&msg.author.id)
                .and_then(|state| state.channel_id)
        })?;
    Some((guild_id.get(), channel_id.get()))
}

/// Splits a reply into Discord-sized pieces, counting characters rather than
/// bytes. An empty reply yields no chunks.
fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    text.chars()
        .collect::<Vec<char>>()
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_message_empty() {
        assert!(chunk_message("", 2000).is_empty());
    }

    #[test]
    fn test_chunk_message_short_is_one_chunk() {
        assert_eq!(chunk_message("hello", 2000), vec!["hello"]);
    }

    #[test]
    fn test_chunk_message_splits_at_limit() {
        assert_eq!(chunk_message("abcde", 2), vec!["ab", "cd", "e"]);
    }

    #[test]
    fn test_chunk_message_counts_characters_not_bytes() {
        // Three 3-byte characters still fit a 3-character chunk.
        assert_eq!(chunk_message("あいう", 3), vec!["あいう"]);
        assert_eq!(chunk_message("あいう", 2), vec!["あい", "う"]);
    }
}
