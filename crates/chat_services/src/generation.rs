use async_trait::async_trait;
use chat_core::{
    token_budget, ChatCompletion, ChatMessage, ChatRequest, ChatResult, Config, ImageGeneration,
    ResponseType, COMPACT_TOKEN_EXPONENT, DEFAULT_API_BASE, DEFAULT_CHAT_MODEL,
    DEFAULT_IMAGE_MODEL,
};
use log::{debug, info};
use reqwest_middleware::ClientWithMiddleware;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, ServiceError};
use crate::http::{build_client, check_status, with_retry};

const IMAGE_SIZE: &str = "1024x1024";
const COMPACT_IMAGE_SIZE: &str = "512x512";

/// Generation service: answers a question as text or as an image.
#[async_trait]
pub trait ChatGenerator: Send + Sync {
    /// Branches on `request.response_type`.
    async fn generate(&self, request: &ChatRequest) -> Result<ChatResult>;
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    messages: Vec<ChatMessage>,
    temperature: f32,
    model: &'a str,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ImageBody<'a> {
    prompt: &'a str,
    model: &'a str,
    num_images: u32,
    size: &'a str,
    response_format: &'a str,
}

/// OpenAI-compatible generator (`/chat/completions`, `/images/generations`).
pub struct OpenAIGenerator {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    model: String,
    image_model: String,
    compact: bool,
}

impl OpenAIGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: with_retry(reqwest::Client::new()),
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            compact: false,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ServiceError::Config("no API key configured".to_string()))?;

        Ok(Self::new(api_key)
            .with_client(build_client(config)?)
            .with_base_url(config.api_base())
            .with_model(config.chat_model())
            .with_image_model(config.image_model())
            .with_compact(config.compact))
    }

    pub fn with_client(mut self, client: ClientWithMiddleware) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// Constrained viewport: smaller images and a lower token ceiling.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    fn max_tokens(&self, exponent: u8) -> u32 {
        if self.compact {
            token_budget(exponent.min(COMPACT_TOKEN_EXPONENT))
        } else {
            token_budget(exponent)
        }
    }

    fn image_size(&self) -> &'static str {
        if self.compact {
            COMPACT_IMAGE_SIZE
        } else {
            IMAGE_SIZE
        }
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let body = CompletionBody {
            messages: request.messages(),
            temperature: request.temperature,
            model: &self.model,
            max_tokens: self.max_tokens(request.max_tokens),
        };
        info!(
            "Requesting completion from {} ({} messages, max_tokens {})",
            self.model,
            body.messages.len(),
            body.max_tokens
        );
        self.post_json("chat/completions", &body).await
    }

    async fn create_image(&self, request: &ChatRequest) -> Result<ImageGeneration> {
        let body = ImageBody {
            prompt: &request.prompt,
            model: &self.image_model,
            num_images: 1,
            size: self.image_size(),
            response_format: "url",
        };
        info!("Requesting {} image from {}", body.size, self.image_model);
        self.post_json("images/generations", &body).await
    }
}

#[async_trait]
impl ChatGenerator for OpenAIGenerator {
    async fn generate(&self, request: &ChatRequest) -> Result<ChatResult> {
        match request.response_type {
            ResponseType::Text => self.complete(request).await.map(ChatResult::Completion),
            ResponseType::Image => self.create_image(request).await.map(ChatResult::Image),
        }
    }
}
