// This is the entry point of the voice chat bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (Gemini, VOICEVOX)
// - `discord/` = Discord-specific adapters (event handler, voice)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Connect to the Discord gateway

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a pile of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::sync::Arc;

use anyhow::Context as _;
use serenity::all::{Client, GatewayIntents};
use songbird::{SerenityInit, Songbird};

use crate::core::chat::{ChatConfig, ChatService, SessionScope};
use crate::core::speech::SpeechService;
use crate::discord::{Data, Handler, VoiceManager};
use crate::infra::ai::GeminiClient;
use crate::infra::tts::{VoicevoxClient, DEFAULT_ENGINE_URL};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_SPOOL_DIR: &str = "data/tts";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let token = std::env::var("DISCORD_BOT_TOKEN").context(
        "Missing DISCORD_BOT_TOKEN environment variable! Create a .env file with your bot token.",
    )?;
    let api_key =
        std::env::var("GEMINI_API_KEY").context("Missing GEMINI_API_KEY environment variable!")?;
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let system_instruction = std::env::var("CUSTOM_INSTRUCTIONS").ok();
    let style_id: u32 = std::env::var("VOICEVOX_STYLE_ID")
        .context("Missing VOICEVOX_STYLE_ID environment variable!")?
        .parse()
        .context("VOICEVOX_STYLE_ID must be a number")?;
    let engine_url =
        std::env::var("VOICEVOX_URL").unwrap_or_else(|_| DEFAULT_ENGINE_URL.to_string());
    let session_scope = match std::env::var("CHAT_SESSION_SCOPE").as_deref() {
        Ok("channel") => SessionScope::PerChannel,
        _ => SessionScope::Shared,
    };
    let spool_dir =
        std::env::var("TTS_SPOOL_DIR").unwrap_or_else(|_| DEFAULT_SPOOL_DIR.to_string());

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    // Speech engine: probe it now so a dead engine fails startup, not the
    // first voice-triggered message.
    let synthesizer = VoicevoxClient::new(engine_url, style_id);
    let engine_version = synthesizer
        .version()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("VOICEVOX engine is not reachable - is it running?")?;
    tracing::info!(
        "VOICEVOX engine ready (version {}, style {})",
        engine_version,
        style_id
    );
    let speech_service = Arc::new(SpeechService::new(synthesizer, spool_dir));

    // Language model: one persistent conversation, configured once.
    let chat_config = ChatConfig {
        model,
        web_search: true,
    };
    let chat_service = Arc::new(ChatService::new(
        GeminiClient::new(api_key),
        system_instruction,
        chat_config,
        session_scope,
    ));

    // Voice: a standalone songbird instance shared between the serenity
    // client (gateway events) and our connection manager.
    let songbird = Songbird::serenity();
    let voice_manager = Arc::new(VoiceManager::new(Arc::clone(&songbird)));

    let data = Data {
        chat: chat_service,
        speech: speech_service,
        voice: voice_manager,
    };

    // ========================================================================
    // DISCORD GATEWAY SETUP
    // ========================================================================

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | GatewayIntents::GUILD_VOICE_STATES; // Required to find the author's voice channel

    let mut client = Client::builder(token, intents)
        .event_handler(Handler { data })
        .register_songbird_with(songbird)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
