//! Client for the key-manager proxy
//!
//! The proxy pools several generative-API credentials behind one
//! `POST {base}/generate` endpoint and rotates them on its side.
//! A 429 from it means every pooled key is exhausted.

use std::sync::Arc;

use log::{debug, error, trace};
use serde_json::Value;

use crate::config::ProviderConfig;

#[derive(Debug, Clone)]
pub struct KeyManagerClient
{   config: Arc<ProviderConfig>
  , http_client: reqwest::Client
}

impl KeyManagerClient
{   pub fn new(
      config: Arc<ProviderConfig>
    , http_client: reqwest::Client
    ) -> Self
    {   debug!(
          "Creating KeyManagerClient at {}",
          config.base_url_or_default()
        );
        KeyManagerClient
        {   config
          , http_client
        }
    }

    pub fn config(&self) -> &ProviderConfig
    {   &self.config
    }

    pub fn endpoint(&self) -> String
    {   format!("{}/generate", self.config.base_url_or_default())
    }

    /// One POST, no retry.
    ///
    /// 429 maps to `RateLimitExceeded`, any other non-200 to
    /// `ApiError`, and connection failures to `HttpError`.
    pub async fn send(
      &self
    , payload: &Value
    ) -> Result<Value, crate::error::Error>
    {   let response = self.http_client
          .post(self.endpoint())
          .json(payload)
          .send()
          .await
          .map_err(|e| {
            error!("Key manager unreachable: {}", e);
            crate::error::Error::HttpError(e.to_string())
          })?;

        let status = response.status();
        trace!("Key manager status: {}", status);

        if status.as_u16() == 429
        {   let body = response.text().await.unwrap_or_default();
            return Err(crate::error::Error::RateLimitExceeded(body));
        }

        if status.as_u16() != 200
        {   let body = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Key manager error {}: {}", status, body);
            return Err(crate::error::Error::ApiError
            {   status: status.as_u16()
              , body
            });
        }

        response.json().await.map_err(|e| {
          error!("Key manager body unreadable: {}", e);
          crate::error::Error::ParseError(e.to_string())
        })
    }

    pub fn extract_text(
      &self
    , raw: &Value
    ) -> Result<Vec<String>, crate::error::Error>
    {   Ok(vec![super::gemini::candidate_text(raw)?])
    }
}
