use thiserror::Error as ThisError;

/// Custom error type for harness operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error
{   /// API key is missing for a provider profile
    #[error("Missing API key for: {0}")]
    MissingApiKey(String)
  , /// Invalid or incomplete configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String)
  , /// Request could not be shaped for the selected provider
    #[error("Format error: {0}")]
    Format(String)
  , /// HTTP transport error (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    HttpError(String)
  , /// Provider answered with a non-success status
    #[error("API error (status {status}): {body}")]
    ApiError
    {   status: u16
      , body: String
    }
  , /// Provider signalled rate exhaustion
    #[error("API rate limit exceeded: {0}")]
    RateLimitExceeded(String)
  , /// Failed to parse API response
    #[error("Parse error: {0}")]
    ParseError(String)
  , /// No usable text in API response
    #[error("API response contained no choices")]
    NoChoicesInResponse
  , /// Local file access failed
    #[error("I/O error: {0}")]
    Io(String)
  , /// Generic error
    #[error("Error: {0}")]
    Other(String)
}

impl Error
{   /// Whether a retry of the same call may succeed.
    ///
    /// Everything the provider or the network can produce is
    /// transient; local configuration and request-shape errors
    /// are not.
    pub fn is_transient(&self) -> bool
    {   match self
        {   Error::HttpError(_)
          | Error::ApiError { .. }
          | Error::RateLimitExceeded(_)
          | Error::ParseError(_)
          | Error::NoChoicesInResponse => true
          , Error::MissingApiKey(_)
          | Error::InvalidConfiguration(_)
          | Error::Format(_)
          | Error::Io(_)
          | Error::Other(_) => false
        }
    }
}

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   if e.is_decode()
        {   Error::ParseError(e.to_string())
        } else
        {   Error::HttpError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::ParseError(e.to_string())
    }
}

impl From<std::io::Error> for Error
{   fn from(e: std::io::Error) -> Self
    {   Error::Io(e.to_string())
    }
}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn provider_errors_are_transient()
    {   assert!(Error::HttpError("reset".into()).is_transient());
        assert!(Error::ApiError
        {   status: 503
          , body: "overloaded".into()
        }.is_transient());
        assert!(Error::NoChoicesInResponse.is_transient());
    }

    #[test]
    fn local_errors_are_not_transient()
    {   assert!(!Error::Format("batch".into()).is_transient());
        assert!(
          !Error::MissingApiKey("turbo/default".into())
            .is_transient()
        );
    }

    #[test]
    fn api_error_display_carries_status()
    {   let e = Error::ApiError
        {   status: 401
          , body: "bad key".into()
        };
        assert_eq!(e.to_string(), "API error (status 401): bad key");
    }
}
