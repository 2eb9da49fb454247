use std::error::Error;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Renders `text` to a complete WAV waveform.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("{0}")]
    Synthesis(Box<dyn Error + Send + Sync>),
    #[error("failed to write audio file: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns reply text into an on-disk audio artifact for playback.
///
/// Each triggering message gets its own file under the spool directory, keyed
/// by message id, so concurrent handler invocations never clobber each
/// other's audio. A re-delivered event overwrites only its own artifact.
pub struct SpeechService<S: SpeechSynthesizer> {
    synthesizer: S,
    spool_dir: PathBuf,
}

impl<S: SpeechSynthesizer> SpeechService<S> {
    pub fn new(synthesizer: S, spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            synthesizer,
            spool_dir: spool_dir.into(),
        }
    }

    /// Synthesizes `text` and writes `reply-<message_id>.wav`, returning the
    /// path to hand to playback.
    pub async fn render(&self, message_id: u64, text: &str) -> Result<PathBuf, SpeechError> {
        let wav = self
            .synthesizer
            .synthesize(text)
            .await
            .map_err(SpeechError::Synthesis)?;

        tokio::fs::create_dir_all(&self.spool_dir).await?;
        let path = self.spool_dir.join(format!("reply-{message_id}.wav"));
        tokio::fs::write(&path, &wav).await?;

        tracing::debug!(message_id, bytes = wav.len(), "Wrote speech artifact");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSynthesizer {
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for StubSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
            if self.fail {
                return Err("engine offline".into());
            }
            Ok(format!("RIFF:{text}").into_bytes())
        }
    }

    #[tokio::test]
    async fn test_render_writes_artifact_keyed_by_message_id() {
        let dir = tempfile::tempdir().unwrap();
        let service = SpeechService::new(
            StubSynthesizer { fail: false },
            dir.path().join("spool"),
        );

        let path = service.render(42, "hello").await.unwrap();

        assert!(path.ends_with("reply-42.wav"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF:hello");
    }

    #[tokio::test]
    async fn test_concurrent_messages_get_distinct_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let service = SpeechService::new(StubSynthesizer { fail: false }, dir.path());

        let first = service.render(1, "one").await.unwrap();
        let second = service.render(2, "two").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"RIFF:one");
        assert_eq!(std::fs::read(&second).unwrap(), b"RIFF:two");
    }

    #[tokio::test]
    async fn test_synthesis_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("spool");
        let service = SpeechService::new(StubSynthesizer { fail: true }, spool.clone());

        let err = service.render(7, "hello").await.unwrap_err();

        assert!(matches!(err, SpeechError::Synthesis(_)));
        assert_eq!(err.to_string(), "engine offline");
        assert!(!spool.exists());
    }
}
