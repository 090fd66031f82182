use std::sync::Arc;

use log::{debug, error, trace};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ProviderConfig;

// ===== Response Types =====

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse
{   #[serde(default)]
    pub candidates: Vec<Candidate>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate
{   /// Absent when the candidate was blocked
    #[serde(default)]
    pub content: Option<CandidateContent>
  , #[serde(default, rename = "finishReason")]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent
{   #[serde(default)]
    pub parts: Vec<Part>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Part
{   #[serde(default)]
    pub text: Option<String>
}

/// Text of the first candidate, all text parts concatenated.
///
/// Shared with the key manager, which relays this body shape.
pub fn candidate_text(
  raw: &Value
) -> Result<String, crate::error::Error>
{   let parsed: GenerateContentResponse
      = serde_json::from_value(raw.clone())?;
    let candidate = parsed.candidates.into_iter().next()
      .ok_or_else(|| {
        error!("No candidates in response");
        crate::error::Error::NoChoicesInResponse
      })?;
    trace!("Candidate finish reason: {:?}", candidate.finish_reason);

    let content = candidate.content.ok_or_else(|| {
      error!(
        "Candidate has no content (finish reason {:?})",
        candidate.finish_reason
      );
      crate::error::Error::NoChoicesInResponse
    })?;

    let texts: Vec<String> = content.parts
      .into_iter()
      .filter_map(|p| p.text)
      .collect();
    if texts.is_empty()
    {   return Err(crate::error::Error::NoChoicesInResponse);
    }
    Ok(texts.concat())
}

// ===== Transport =====

/// Direct content-generation endpoint
#[derive(Debug, Clone)]
pub struct GeminiTransport
{   config: Arc<ProviderConfig>
  , http_client: reqwest::Client
}

impl GeminiTransport
{   pub fn new(
      config: Arc<ProviderConfig>
    , http_client: reqwest::Client
    ) -> Self
    {   debug!("Creating GeminiTransport for {}", config.model_name);
        GeminiTransport
        {   config
          , http_client
        }
    }

    pub fn config(&self) -> &ProviderConfig
    {   &self.config
    }

    pub fn endpoint(&self) -> String
    {   format!(
          "{}/v1beta/models/{}:generateContent",
          self.config.base_url_or_default(),
          self.config.model_name
        )
    }

    pub async fn send(
      &self
    , payload: &Value
    ) -> Result<Value, crate::error::Error>
    {   let response = self.http_client
          .post(self.endpoint())
          .query(&[("key", self.config.api_key.as_str())])
          .header("Content-Type", "application/json")
          .json(payload)
          .send()
          .await
          .map_err(|e| {
            error!("Gemini HTTP error: {}", e);
            crate::error::Error::HttpError(e.to_string())
          })?;

        let status = response.status();
        trace!("Gemini response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Gemini error {}: {}", status, error_text);
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

    pub fn extract_text(
      &self
    , raw: &Value
    ) -> Result<Vec<String>, crate::error::Error>
    {   Ok(vec![candidate_text(raw)?])
    }
}
