// Voice-connection management on top of songbird.
//
// One connection per guild, created lazily on the first voice-triggered
// message and reused thereafter; nothing ever tears it down. The
// lookup-then-join is guarded by a per-guild lock so two concurrent mentions
// cannot race a second connection into existence for the same guild.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serenity::all::{ChannelId, GuildId};
use songbird::error::JoinError;
use songbird::input::{File, Input};
use songbird::{Call, Songbird};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("failed to join voice channel: {0}")]
    Join(#[from] JoinError),
}

pub struct VoiceManager {
    songbird: Arc<Songbird>,
    join_locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl VoiceManager {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self {
            songbird,
            join_locks: DashMap::new(),
        }
    }

    /// Returns the guild's existing call, or joins `channel_id` and returns
    /// the new one.
    pub async fn connect(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Arc<Mutex<Call>>, VoiceError> {
        let lock = self.join_lock(guild_id);
        let _guard = lock.lock().await;

        let guild = GuildId::new(guild_id);
        if let Some(call) = self.songbird.get(guild) {
            return Ok(call);
        }

        let call = self.songbird.join(guild, ChannelId::new(channel_id)).await?;
        tracing::info!(guild_id, channel_id, "Joined voice channel");
        Ok(call)
    }

    /// Starts playback of a WAV artifact on the call. The track plays out on
    /// songbird's driver; this returns as soon as playback has started.
    pub async fn play_file(&self, call: &Arc<Mutex<Call>>, path: &Path) {
        let input: Input = File::new(path.to_path_buf()).into();
        let mut call = call.lock().await;
        let _track = call.play_input(input);
        tracing::debug!(path = %path.display(), "Started voice playback");
    }

    fn join_lock(&self, guild_id: u64) -> Arc<Mutex<()>> {
        self.join_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
