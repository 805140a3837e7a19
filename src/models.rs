//! Data models and structures
//!
//! Defines the cultural-discovery payloads returned to callers and the
//! process configuration used to reach the language-model provider.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CulturalItemType {
    Museum,
    Event,
    Exhibition,
    Festival,
    CulturalPlace,
}

impl CulturalItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CulturalItemType::Museum => "museum",
            CulturalItemType::Event => "event",
            CulturalItemType::Exhibition => "exhibition",
            CulturalItemType::Festival => "festival",
            CulturalItemType::CulturalPlace => "cultural_place",
        }
    }
}

impl FromStr for CulturalItemType {
    type Err = String;

    /// Accepts `"Cultural Place"`, `"cultural-place"` and `"cultural_place"` alike.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "museum" => Ok(CulturalItemType::Museum),
            "event" => Ok(CulturalItemType::Event),
            "exhibition" => Ok(CulturalItemType::Exhibition),
            "festival" => Ok(CulturalItemType::Festival),
            "cultural_place" => Ok(CulturalItemType::CulturalPlace),
            _ => Err(format!("unknown cultural item type '{}'", s)),
        }
    }
}

impl<'de> Deserialize<'de> for CulturalItemType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One museum, event, exhibition, festival, or place suggested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CulturalItem {
    #[serde(rename = "type")]
    pub item_type: CulturalItemType,
    #[serde(deserialize_with = "non_blank_text")]
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub city: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub country: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub date: Option<String>,
}

impl CulturalItem {
    pub fn new(item_type: CulturalItemType, name: impl Into<String>) -> Self {
        Self {
            item_type,
            name: name.into(),
            city: None,
            country: None,
            description: None,
            date: None,
        }
    }

    pub fn with_location(mut self, city: impl Into<String>, country: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.country = Some(country.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

fn non_blank_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    let name = String::deserialize(deserializer)?;
    if name.trim().is_empty() {
        return Err(serde::de::Error::custom("name must not be blank"));
    }
    Ok(name)
}

// Models sometimes emit years as numbers; keep them as text instead of dropping the item.
fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Normalized payload returned by the prompt gateway.
///
/// `items` is always a list, even when the model produced nothing usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayResponse {
    pub text: String,
    pub items: Vec<CulturalItem>,
}

impl GatewayResponse {
    /// Response used when the model reply holds no recoverable structure.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    OpenAi,
    Gemini,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "openai",
            AiProvider::Gemini => "gemini",
        }
    }

    /// Vendor name used in log lines and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "OpenAI",
            AiProvider::Gemini => "Gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "gpt-4.1",
            AiProvider::Gemini => "gemini-2.5-flash",
        }
    }

    fn api_key_var(&self) -> &'static str {
        match self {
            AiProvider::OpenAi => "OPENAI_API_KEY",
            AiProvider::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(AiProvider::OpenAi),
            "gemini" => Ok(AiProvider::Gemini),
            other => Err(crate::Error::Config(format!(
                "Unknown AI_PROVIDER '{}'. Expected 'openai' or 'gemini'",
                other
            ))),
        }
    }
}

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 700;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

// Configuration
#[derive(Clone)]
pub struct Config {
    pub provider: AiProvider,
    pub api_key: String,
    pub chat_model: String,
    pub max_output_tokens: u32,
    pub upstream_timeout: Duration,
    pub bind_address: SocketAddr,
    /// Empty means any origin may call the gateway.
    pub allowed_origins: Vec<String>,
    /// Overrides the provider's API host, e.g. for a compatible proxy.
    pub base_url: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("chat_model", &self.chat_model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("bind_address", &self.bind_address)
            .field("allowed_origins", &self.allowed_origins)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match var("AI_PROVIDER") {
            Some(value) => value.parse()?,
            None => AiProvider::OpenAi,
        };

        let api_key = var(provider.api_key_var()).ok_or_else(|| {
            crate::Error::Config(format!(
                "{} not set (required for provider '{}')",
                provider.api_key_var(),
                provider
            ))
        })?;

        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let max_output_tokens = parse_positive(
            "MAX_OUTPUT_TOKENS",
            var("MAX_OUTPUT_TOKENS"),
            DEFAULT_MAX_OUTPUT_TOKENS,
        )?;

        let timeout_secs = parse_positive(
            "UPSTREAM_TIMEOUT_SECS",
            var("UPSTREAM_TIMEOUT_SECS"),
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;

        let bind_address = var("BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
            .parse()
            .map_err(|e| crate::Error::Config(format!("Invalid BIND_ADDRESS: {}", e)))?;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let base_url = var("AI_BASE_URL").map(|url| url.trim_end_matches('/').to_string());

        Ok(Self {
            provider,
            api_key,
            chat_model,
            max_output_tokens,
            upstream_timeout: Duration::from_secs(timeout_secs),
            bind_address,
            allowed_origins,
            base_url,
        })
    }
}

fn parse_positive<T>(key: &str, raw: Option<String>, default: T) -> crate::Result<T>
where
    T: FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(default);
    };

    let value: T = raw
        .trim()
        .parse()
        .map_err(|e| crate::Error::Config(format!("Invalid {} '{}': {}", key, raw, e)))?;

    if value <= T::default() {
        return Err(crate::Error::Config(format!(
            "{} must be greater than zero",
            key
        )));
    }

    Ok(value)
}
