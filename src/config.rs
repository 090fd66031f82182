//! Configuration for providers and harness behavior
//!
//! The auth file is YAML, keyed first by LLM type (`davinci`,
//! `turbo`, `gemini`, ...) and then by named profile:
//!
//! ```yaml
//! gemini:
//!   default:
//!     api_key: "..."
//!     api_type: gemini
//!     model: gemini-2.0-flash
//!     use_key_manager: true
//!     api_base: http://localhost:8000
//!     generationConfig: { maxOutputTokens: 1024 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::failover::{ProxyPauses, RetryPolicy, WaitStrategy};
use crate::request::GenerationParams;

pub const OPENAI_API_BASE: &str
  = "https://api.openai.com/v1";
pub const GEMINI_API_BASE: &str
  = "https://generativelanguage.googleapis.com";

const DEFAULT_COMPLETION_MODEL: &str = "text-davinci-003";
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Transport family a profile resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind
{   /// Text completion endpoint (prompt in, choices[].text out)
    Completion
  , /// Chat completion endpoint (messages in, message content out)
    Chat
  , /// Content-generation endpoint (contents/parts)
    Generative
  , /// Key-manager proxy pooling generative credentials
    Proxied
}

/// Endpoint layout for OpenAI-style transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiFlavor
{   OpenAi
  , Azure
}

/// One profile entry of the auth file, as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthProfile
{   #[serde(default)]
    pub api_key: Option<String>
  , #[serde(default)]
    pub api_type: Option<String>
  , #[serde(default)]
    pub api_base: Option<String>
  , #[serde(default)]
    pub api_version: Option<String>
  , #[serde(default)]
    pub model: Option<String>
  , #[serde(default)]
    pub use_key_manager: bool
  , #[serde(default)]
    pub timeout_secs: Option<u64>
  , #[serde(default, rename = "generationConfig")]
    pub generation_config: Option<Value>
  , #[serde(default)]
    pub tools: Option<Value>
  , #[serde(default, rename = "safetySettings")]
    pub safety_settings: Option<Value>
  , /// Any other key is a generation default
    #[serde(flatten)]
    pub extra: Map<String, Value>
}

/// Whole auth file: llm type -> profile name -> profile.
pub type AuthFile
  = BTreeMap<String, BTreeMap<String, AuthProfile>>;

/// Resolved, immutable connection parameters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig
{   pub kind: ProviderKind
  , pub flavor: ApiFlavor
  , pub api_key: String
  , /// API base URL (if custom)
    pub base_url: Option<String>
  , pub api_version: Option<String>
  , pub model_name: String
  , pub default_params: GenerationParams
  , /// Request timeout
    pub timeout: Duration
}

impl ProviderConfig
{   /// Read `path` and resolve `llm_type` / `setting`.
    pub fn load(
      path: impl AsRef<Path>
    , llm_type: &str
    , setting: &str
    ) -> Result<Self, crate::error::Error>
    {   let path = path.as_ref();
        debug!("Loading auth file {}", path.display());
        let text = std::fs::read_to_string(path)
          .map_err(|e| {
            error!("Cannot read {}: {}", path.display(), e);
            crate::error::Error::Io(
              format!("{}: {}", path.display(), e)
            )
          })?;
        Self::from_yaml(&text, llm_type, setting)
    }

    /// Resolve a profile from YAML text.
    pub fn from_yaml(
      text: &str
    , llm_type: &str
    , setting: &str
    ) -> Result<Self, crate::error::Error>
    {   let auth: AuthFile = serde_yaml::from_str(text)
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(
              format!("auth file: {}", e)
            )
          })?;

        let profile = auth.get(llm_type)
          .and_then(|profiles| profiles.get(setting))
          .ok_or_else(|| {
            crate::error::Error::InvalidConfiguration(
              format!("no profile {}/{}", llm_type, setting)
            )
          })?;

        Self::from_profile(llm_type, setting, profile)
    }

    /// Resolve an already parsed profile.
    pub fn from_profile(
      llm_type: &str
    , setting: &str
    , profile: &AuthProfile
    ) -> Result<Self, crate::error::Error>
    {   let api_type = profile.api_type
          .as_deref()
          .unwrap_or("openai")
          .to_ascii_lowercase();

        let kind = if profile.use_key_manager
        {   ProviderKind::Proxied
        } else if api_type == "gemini"
        {   ProviderKind::Generative
        } else if llm_type.contains("davinci")
        {   ProviderKind::Completion
        } else
        {   ProviderKind::Chat
        };

        let flavor = if api_type == "azure"
        {   ApiFlavor::Azure
        } else
        {   ApiFlavor::OpenAi
        };

        let api_key = match (&profile.api_key, kind)
        {   (Some(key), _) if !key.is_empty() => key.clone()
          , (_, ProviderKind::Proxied) => String::new()
          , _ => {
              error!("No API key for {}/{}", llm_type, setting);
              return Err(crate::error::Error::MissingApiKey(
                format!("{}/{}", llm_type, setting)
              ));
            }
        };

        if kind == ProviderKind::Proxied
          && profile.api_base.is_none()
        {   return Err(crate::error::Error::InvalidConfiguration(
              "use_key_manager requires api_base".to_string()
            ));
        }

        if flavor == ApiFlavor::Azure
          && (profile.api_base.is_none()
            || profile.api_version.is_none())
        {   return Err(crate::error::Error::InvalidConfiguration(
              "azure requires api_base and api_version".to_string()
            ));
        }

        let model_name = profile.model.clone()
          .unwrap_or_else(|| {
            match kind
            {   ProviderKind::Completion => DEFAULT_COMPLETION_MODEL
              , ProviderKind::Chat => DEFAULT_CHAT_MODEL
              , ProviderKind::Generative
              | ProviderKind::Proxied => DEFAULT_GEMINI_MODEL
            }.to_string()
          });

        let mut default_params
          = GenerationParams::from(profile.extra.clone());
        if let Some(v) = &profile.generation_config
        {   default_params.insert("generationConfig", v.clone());
        }
        if let Some(v) = &profile.tools
        {   default_params.insert("tools", v.clone());
        }
        if let Some(v) = &profile.safety_settings
        {   default_params.insert("safetySettings", v.clone());
        }

        debug!(
          "Resolved {}/{} to {:?} ({})",
          llm_type, setting, kind, model_name
        );

        Ok(ProviderConfig
        {   kind
          , flavor
          , api_key
          , base_url: profile.api_base.clone()
          , api_version: profile.api_version.clone()
          , model_name
          , default_params
          , timeout: Duration::from_secs(
              profile.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
            )
        })
    }

    /// Base URL, falling back to the public endpoint of the kind.
    pub fn base_url_or_default(&self) -> &str
    {   match (&self.base_url, self.kind)
        {   (Some(base), _) => base.trim_end_matches('/')
          , (None, ProviderKind::Generative)
          | (None, ProviderKind::Proxied) => GEMINI_API_BASE
          , (None, _) => OPENAI_API_BASE
        }
    }
}

/// Harness behavior knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig
{   /// Prompts per dispatched chunk
    pub batch_size: usize
  , /// Attempts per direct call; `None` retries forever
    pub max_attempts: Option<usize>
  , /// Elapsed-time bound per direct call, in seconds
    pub max_elapsed_secs: Option<u64>
  , /// Pause after a key-manager 429, in seconds
    pub rate_limit_pause_secs: u64
  , /// Pause after a key-manager transport error, in seconds
    pub transport_error_pause_secs: u64
}

impl Default for HarnessConfig
{   fn default() -> Self
    {   HarnessConfig
        {   batch_size: 20
          , max_attempts: Some(10)
          , max_elapsed_secs: None
          , rate_limit_pause_secs: 60
          , transport_error_pause_secs: 5
        }
    }
}

impl HarnessConfig
{   pub fn retry_policy(&self) -> RetryPolicy
    {   RetryPolicy
        {   max_attempts: self.max_attempts
          , max_elapsed: self.max_elapsed_secs
              .map(Duration::from_secs)
          , wait: WaitStrategy::ErrorHint
        }
    }

    pub fn proxy_pauses(&self) -> ProxyPauses
    {   ProxyPauses
        {   rate_limited: Duration::from_secs(
              self.rate_limit_pause_secs
            )
          , transport_error: Duration::from_secs(
              self.transport_error_pause_secs
            )
        }
    }
}
