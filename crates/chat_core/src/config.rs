use serde::{Deserialize, Serialize};

use crate::paths::config_json_path;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub https_proxy: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub image_model: Option<String>,
    /// Endpoint of the translation service.
    #[serde(default)]
    pub translate_url: Option<String>,
    #[serde(default)]
    pub translate_api_key: Option<String>,
    /// Base URL of the per-user remote archive store.
    #[serde(default)]
    pub archive_url: Option<String>,
    #[serde(default)]
    pub archive_token: Option<String>,
    /// Constrained viewport: smaller images and token ceiling.
    #[serde(default)]
    pub compact: bool,
}

const CONFIG_FILE_PATH: &str = "config.toml";

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_proxy: String::new(),
            https_proxy: String::new(),
            api_key: None,
            api_base: None,
            model: None,
            image_model: None,
            translate_url: None,
            translate_api_key: None,
            archive_url: None,
            archive_token: None,
            compact: false,
        }
    }
}

impl Config {
    /// Load `~/.voxchat/config.json`, falling back to `./config.toml`,
    /// then apply environment overrides.
    pub fn new() -> Self {
        let mut config = Config::default();

        let mut loaded = false;
        let json_path = config_json_path();
        if json_path.exists() {
            match std::fs::read_to_string(&json_path) {
                Ok(content) => match serde_json::from_str::<Config>(&content) {
                    Ok(file_config) => {
                        config = file_config;
                        loaded = true;
                    }
                    Err(e) => log::warn!("Ignoring malformed {}: {}", json_path.display(), e),
                },
                Err(e) => log::warn!("Failed to read {}: {}", json_path.display(), e),
            }
        }

        if !loaded && std::path::Path::new(CONFIG_FILE_PATH).exists() {
            if let Ok(content) = std::fs::read_to_string(CONFIG_FILE_PATH) {
                match toml::from_str::<Config>(&content) {
                    Ok(file_config) => config = file_config,
                    Err(e) => log::warn!("Ignoring malformed {}: {}", CONFIG_FILE_PATH, e),
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(http_proxy) = var("HTTP_PROXY") {
            self.http_proxy = http_proxy;
        }
        if let Some(https_proxy) = var("HTTPS_PROXY") {
            self.https_proxy = https_proxy;
        }
        if let Some(api_key) = var("OPENAI_API_KEY").or_else(|| var("API_KEY")) {
            self.api_key = Some(api_key);
        }
        if let Some(api_base) = var("API_BASE") {
            self.api_base = Some(api_base);
        }
        if let Some(model) = var("MODEL") {
            self.model = Some(model);
        }
        if let Some(model) = var("IMAGE_MODEL") {
            self.image_model = Some(model);
        }
        if let Some(url) = var("TRANSLATE_URL") {
            self.translate_url = Some(url);
        }
        if let Some(key) = var("TRANSLATE_API_KEY") {
            self.translate_api_key = Some(key);
        }
        if let Some(url) = var("ARCHIVE_URL") {
            self.archive_url = Some(url);
        }
        if let Some(token) = var("ARCHIVE_TOKEN") {
            self.archive_token = Some(token);
        }
        if let Some(compact) = var("VOXCHAT_COMPACT") {
            self.compact = parse_bool_env(&compact);
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn chat_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL)
    }

    pub fn image_model(&self) -> &str {
        self.image_model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL)
    }
}
