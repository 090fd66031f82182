//! LLM provider transports
//!
//! Every transport offers the same three steps: shape a payload,
//! send it, pull text out of the raw reply. `Transport` is the
//! closed set the router picks from once, at construction.

pub mod gemini;
pub mod key_manager;
pub mod openai;

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::config::{ApiFlavor, ProviderConfig, ProviderKind};
use crate::request::{GenerationParams, PromptInput};

// Re-export for convenience
pub use gemini::GeminiTransport;
pub use key_manager::KeyManagerClient;
pub use openai::OpenAiTransport;

#[derive(Debug, Clone)]
pub enum Transport
{   OpenAi(OpenAiTransport)
  , Gemini(GeminiTransport)
  , KeyManager(KeyManagerClient)
}

impl Transport
{   /// Build the transport `config.kind` calls for
    pub fn new(
      config: Arc<ProviderConfig>
    ) -> Result<Self, crate::error::Error>
    {   let http_client = reqwest::Client::builder()
          .timeout(config.timeout)
          .build()
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(
              format!("http client: {}", e)
            )
          })?;

        debug!("Selecting transport for {:?}", config.kind);
        Ok(match config.kind
        {   ProviderKind::Completion
          | ProviderKind::Chat => Transport::OpenAi(
              OpenAiTransport::new(config, http_client)
            )
          , ProviderKind::Generative => Transport::Gemini(
              GeminiTransport::new(config, http_client)
            )
          , ProviderKind::Proxied => Transport::KeyManager(
              KeyManagerClient::new(config, http_client)
            )
        })
    }

    pub fn config(&self) -> &ProviderConfig
    {   match self
        {   Transport::OpenAi(t) => t.config()
          , Transport::Gemini(t) => t.config()
          , Transport::KeyManager(t) => t.config()
        }
    }

    pub fn kind(&self) -> ProviderKind
    {   self.config().kind
    }

    /// Whether one call may carry a whole chunk of prompts
    pub fn supports_batch(&self) -> bool
    {   self.kind() == ProviderKind::Completion
    }

    /// Whether failures go through the retry policy
    pub fn is_direct(&self) -> bool
    {   !matches!(self, Transport::KeyManager(_))
    }

    /// Payload for `input`; `params` is profile defaults already
    /// overlaid with caller params.
    pub fn format(
      &self
    , input: &PromptInput
    , params: &GenerationParams
    ) -> Result<Value, crate::error::Error>
    {   let config = self.config();
        let params = if matches!(config.kind
            , ProviderKind::Completion | ProviderKind::Chat)
          && config.flavor == ApiFlavor::OpenAi
        {   GenerationParams::new()
              .with("model", config.model_name.as_str())
              .merged(params)
        } else
        {   params.clone()
        };
        crate::request::format(input, config.kind, &params)
    }

    pub async fn send(
      &self
    , payload: &Value
    ) -> Result<Value, crate::error::Error>
    {   match self
        {   Transport::OpenAi(t) => t.send(payload).await
          , Transport::Gemini(t) => t.send(payload).await
          , Transport::KeyManager(t) => t.send(payload).await
        }
    }

    pub fn extract_text(
      &self
    , raw: &Value
    ) -> Result<Vec<String>, crate::error::Error>
    {   match self
        {   Transport::OpenAi(t) => t.extract_text(raw)
          , Transport::Gemini(t) => t.extract_text(raw)
          , Transport::KeyManager(t) => t.extract_text(raw)
        }
    }
}
