//! Durable user preferences, precision presets and the language table.

use serde::{Deserialize, Serialize};

use crate::turn::ResponseType;

/// Language tag that needs no translation before speaking.
pub const DEFAULT_LANG: &str = "en-US";

pub const MIN_TOKEN_EXPONENT: u8 = 7;
pub const MAX_TOKEN_EXPONENT: u8 = 11;
/// Token exponent ceiling on constrained viewports.
pub const COMPACT_TOKEN_EXPONENT: u8 = 10;

/// A sampling temperature preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionPreset {
    pub value: f32,
    pub label: &'static str,
    pub caption: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

pub const PRECISION_PRESETS: [PrecisionPreset; 3] = [
    PrecisionPreset {
        value: 0.2,
        label: "Precise",
        caption: "Focused, repeatable answers",
        color: "success",
        icon: "GpsFixed",
    },
    PrecisionPreset {
        value: 0.7,
        label: "Balanced",
        caption: "A mix of accuracy and variety",
        color: "primary",
        icon: "Balance",
    },
    PrecisionPreset {
        value: 1.2,
        label: "Creative",
        caption: "Looser, more imaginative answers",
        color: "secondary",
        icon: "AutoAwesome",
    },
];

/// Languages offered for recognition, synthesis and translation.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("English", "en-US"),
    ("Español", "es-ES"),
    ("Français", "fr-FR"),
    ("Deutsch", "de-DE"),
    ("Italiano", "it-IT"),
    ("Português", "pt-BR"),
    ("日本語", "ja-JP"),
    ("中文", "zh-CN"),
];

pub fn language_label(lang_code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(_, code)| code.eq_ignore_ascii_case(lang_code))
        .map(|(label, _)| *label)
}

/// Two-letter prefix used to key translations (`es-ES` -> `es`).
pub fn translation_code(lang_code: &str) -> &str {
    let end = lang_code
        .char_indices()
        .nth(2)
        .map(|(idx, _)| idx)
        .unwrap_or(lang_code.len());
    &lang_code[..end]
}

/// Power-of-two token budget for an exponent, clamped to the supported range.
pub fn token_budget(exponent: u8) -> u32 {
    1u32 << exponent.clamp(MIN_TOKEN_EXPONENT, MAX_TOKEN_EXPONENT)
}

/// The preferences that survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSnapshot {
    #[serde(rename = "responseType")]
    pub response_type: ResponseType,
    #[serde(rename = "temperatureIndex")]
    pub temperature_index: usize,
    pub max_tokens: u8,
    pub lang_code: String,
    pub silent: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            response_type: ResponseType::Text,
            temperature_index: 1,
            max_tokens: 10,
            lang_code: DEFAULT_LANG.to_string(),
            silent: false,
        }
    }
}

impl SettingsSnapshot {
    pub fn preset(&self) -> &'static PrecisionPreset {
        &PRECISION_PRESETS[self.temperature_index.min(PRECISION_PRESETS.len() - 1)]
    }

    pub fn temperature(&self) -> f32 {
        self.preset().value
    }

    /// Replace out-of-range values read back from storage with defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.temperature_index >= PRECISION_PRESETS.len() {
            self.temperature_index = defaults.temperature_index;
        }
        if !(MIN_TOKEN_EXPONENT..=MAX_TOKEN_EXPONENT).contains(&self.max_tokens) {
            self.max_tokens = defaults.max_tokens;
        }
        if self.lang_code.trim().is_empty() {
            self.lang_code = defaults.lang_code;
        }
        self
    }
}
