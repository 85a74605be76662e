//! Speech-to-text collaborator.

use async_trait::async_trait;

/// Largest audio body accepted (25 MB).
pub const MAX_AUDIO_SIZE: usize = 25 * 1024 * 1024;

/// Transcription failures.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// No speech engine is configured.
    #[error("transcription is not available")]
    Unavailable,

    /// Empty or oversized audio.
    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    /// The engine ran but produced no text.
    #[error("could not transcribe audio")]
    NoSpeech,
}

/// Converts audio bytes to text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one audio clip.
    async fn transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError>;
}

/// Check size limits before handing audio to a transcriber.
pub fn validate_audio(audio: &[u8]) -> Result<(), TranscriptionError> {
    if audio.is_empty() {
        return Err(TranscriptionError::InvalidAudio("empty body".into()));
    }
    if audio.len() > MAX_AUDIO_SIZE {
        return Err(TranscriptionError::InvalidAudio(format!(
            "{} bytes exceeds the {MAX_AUDIO_SIZE} byte limit",
            audio.len()
        )));
    }
    Ok(())
}

/// Transcriber used when no speech engine is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableTranscriber;

#[async_trait]
impl Transcriber for UnavailableTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::Unavailable)
    }
}
