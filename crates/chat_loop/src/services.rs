use std::sync::Arc;

use chat_services::{
    ChannelRecognizer, ChatGenerator, IdentityTranslator, LogSynthesizer, SpeechRecognizer,
    SpeechSynthesizer, Translator,
};
use session_manager::{ArchiveService, SettingsStore};

/// Everything the loop needs to run effects.
#[derive(Clone)]
pub struct SessionServices {
    pub generator: Arc<dyn ChatGenerator>,
    pub translator: Arc<dyn Translator>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub archive: ArchiveService,
    pub settings: SettingsStore,
}

impl SessionServices {
    /// Services with a text-only speech setup: transcripts come from a
    /// `ChannelRecognizer`, speech goes to the log and translation is a no-op.
    pub fn new(
        generator: Arc<dyn ChatGenerator>,
        archive: ArchiveService,
        settings: SettingsStore,
    ) -> Self {
        Self {
            generator,
            translator: Arc::new(IdentityTranslator),
            recognizer: Arc::new(ChannelRecognizer::new()),
            synthesizer: Arc::new(LogSynthesizer),
            archive,
            settings,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }
}
