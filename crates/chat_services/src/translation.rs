use async_trait::async_trait;
use chat_core::{translation_code, Config, TranslatedText, TranslationResult};
use log::info;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

use crate::error::{Result, ServiceError};
use crate::http::{build_client, check_status, with_retry};

/// Responses are always generated in English.
const SOURCE_LANG: &str = "en";

/// Translation service: text in, translations keyed by two-letter code out.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, lang_code: &str) -> Result<TranslationResult>;
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    source: &'a str,
    value: &'a str,
    target: Vec<&'a str>,
}

/// Translator backed by an HTTP endpoint accepting `{source, value, target}`.
pub struct HttpTranslator {
    client: ClientWithMiddleware,
    url: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: with_retry(reqwest::Client::new()),
            url: url.into(),
            api_key: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let url = config
            .translate_url
            .clone()
            .ok_or_else(|| ServiceError::Config("no translation URL configured".to_string()))?;
        let mut translator = Self::new(url).with_client(build_client(config)?);
        translator.api_key = config.translate_api_key.clone();
        Ok(translator)
    }

    pub fn with_client(mut self, client: ClientWithMiddleware) -> Self {
        self.client = client;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, lang_code: &str) -> Result<TranslationResult> {
        let body = TranslateBody {
            source: SOURCE_LANG,
            value: text,
            target: vec![translation_code(lang_code)],
        };
        info!("Translating {} chars to {}", text.len(), lang_code);

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = check_status(request.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Fallback used when no translation endpoint is configured: returns the
/// text unchanged under the requested code.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str, lang_code: &str) -> Result<TranslationResult> {
        let mut result = TranslationResult::new();
        result.insert(
            translation_code(lang_code).to_string(),
            TranslatedText {
                value: text.to_string(),
            },
        );
        Ok(result)
    }
}
