//! Speech capture and playback.
//!
//! Recognition is a continuous session: `start` hands the recognizer a
//! channel and every transcript it produces is pushed there until `stop`.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{mpsc, Mutex};

use crate::error::{Result, ServiceError};

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin capturing in `lang_code`; transcripts are sent on `transcripts`.
    async fn start(&self, lang_code: &str, transcripts: mpsc::Sender<String>) -> Result<()>;

    /// End the capture session.
    async fn stop(&self) -> Result<()>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` and return once playback has finished.
    async fn speak(&self, text: &str, lang_code: &str) -> Result<()>;
}

type ActiveSession = Arc<Mutex<Option<mpsc::Sender<String>>>>;

/// Recognizer whose transcripts are supplied by the front end, e.g. typed
/// dictation or an external speech engine writing into a `TranscriptFeed`.
#[derive(Debug, Clone, Default)]
pub struct ChannelRecognizer {
    active: ActiveSession,
}

impl ChannelRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle used to push transcripts into the active session.
    pub fn feed(&self) -> TranscriptFeed {
        TranscriptFeed {
            active: Arc::clone(&self.active),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for ChannelRecognizer {
    async fn start(&self, lang_code: &str, transcripts: mpsc::Sender<String>) -> Result<()> {
        debug!("Recognition started ({})", lang_code);
        *self.active.lock().await = Some(transcripts);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        debug!("Recognition stopped");
        self.active.lock().await.take();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptFeed {
    active: ActiveSession,
}

impl TranscriptFeed {
    /// Deliver a transcript. Fails when no capture session is running.
    pub async fn push(&self, transcript: impl Into<String>) -> Result<()> {
        let guard = self.active.lock().await;
        let Some(sender) = guard.as_ref() else {
            return Err(ServiceError::Speech("not listening".to_string()));
        };
        sender
            .send(transcript.into())
            .await
            .map_err(|_| ServiceError::Speech("capture session closed".to_string()))
    }

    pub async fn is_listening(&self) -> bool {
        self.active.lock().await.is_some()
    }
}

/// Synthesizer that writes the text to the log instead of an audio device.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSynthesizer;

#[async_trait]
impl SpeechSynthesizer for LogSynthesizer {
    async fn speak(&self, text: &str, lang_code: &str) -> Result<()> {
        info!("[{}] {}", lang_code, text);
        Ok(())
    }
}
