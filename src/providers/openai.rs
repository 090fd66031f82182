use std::sync::Arc;

use log::{debug, error, trace};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{ApiFlavor, ProviderConfig, ProviderKind};

// ===== Response Types =====

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse
{   pub choices: Vec<CompletionChoice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice
{   pub text: String
  , #[serde(default)]
    pub index: Option<usize>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse
{   pub choices: Vec<ChatChoice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice
{   pub message: ChatMessage
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage
{   #[serde(default)]
    pub role: Option<String>
  , #[serde(default)]
    pub content: Option<String>
}

// ===== Transport =====

/// Completion and chat endpoints, OpenAI or Azure layout
#[derive(Debug, Clone)]
pub struct OpenAiTransport
{   config: Arc<ProviderConfig>
  , http_client: reqwest::Client
}

impl OpenAiTransport
{   pub fn new(
      config: Arc<ProviderConfig>
    , http_client: reqwest::Client
    ) -> Self
    {   debug!("Creating OpenAiTransport for {}", config.model_name);
        OpenAiTransport
        {   config
          , http_client
        }
    }

    pub fn kind(&self) -> ProviderKind
    {   self.config.kind
    }

    pub fn config(&self) -> &ProviderConfig
    {   &self.config
    }

    /// Full URL of the endpoint for this profile
    pub fn endpoint(&self) -> String
    {   let path = match self.config.kind
        {   ProviderKind::Completion => "completions"
          , _ => "chat/completions"
        };
        let base = self.config.base_url_or_default();
        match self.config.flavor
        {   ApiFlavor::OpenAi => format!("{}/{}", base, path)
          , ApiFlavor::Azure => format!(
              "{}/openai/deployments/{}/{}?api-version={}",
              base,
              self.config.model_name,
              path,
              self.config.api_version.as_deref().unwrap_or_default()
            )
        }
    }

    pub async fn send(
      &self
    , payload: &Value
    ) -> Result<Value, crate::error::Error>
    {   let request = self.http_client
          .post(self.endpoint())
          .header("Content-Type", "application/json")
          .json(payload);

        let request = match self.config.flavor
        {   ApiFlavor::OpenAi => request.header(
              "Authorization",
              format!("Bearer {}", self.config.api_key)
            )
          , ApiFlavor::Azure => request.header(
              "api-key",
              self.config.api_key.as_str()
            )
        };

        let response = request.send().await.map_err(|e| {
          error!("HTTP error: {}", e);
          crate::error::Error::HttpError(e.to_string())
        })?;

        let status = response.status();
        trace!("OpenAI response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("OpenAI API error {}: {}", status, error_text);
            if status.as_u16() == 429
            {   return Err(crate::error::Error::RateLimitExceeded(
                  error_text
                ));
            }
            return Err(crate::error::Error::ApiError
            {   status: status.as_u16()
              , body: error_text
            });
        }

        response.json().await.map_err(|e| {
          error!("Parse error: {}", e);
          crate::error::Error::ParseError(e.to_string())
        })
    }

    /// Texts in prompt order
    pub fn extract_text(
      &self
    , raw: &Value
    ) -> Result<Vec<String>, crate::error::Error>
    {   match self.config.kind
        {   ProviderKind::Completion => {
              let parsed: CompletionResponse
                = serde_json::from_value(raw.clone())?;
              let mut choices: Vec<(usize, String)>
                = parsed.choices
                  .into_iter()
                  .enumerate()
                  .map(|(pos, c)| (c.index.unwrap_or(pos), c.text))
                  .collect();
              choices.sort_by_key(|(index, _)| *index);
              Ok(choices.into_iter().map(|(_, text)| text).collect())
            }
          , _ => {
              let parsed: ChatResponse
                = serde_json::from_value(raw.clone())?;
              let choice = parsed.choices.into_iter().next()
                .ok_or_else(|| {
                  error!("No choices in response");
                  crate::error::Error::NoChoicesInResponse
                })?;
              trace!("Chat finish reason: {:?}", choice.finish_reason);
              let content = choice.message.content
                .ok_or(crate::error::Error::NoChoicesInResponse)?;
              Ok(vec![content])
            }
        }
    }
}
