//! Request and response types, and the wire formatter
//!
//! `format` is pure: it only shapes JSON, it never talks to the
//! network. Transports in `crate::providers` post what it returns.

use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ProviderKind;

/// System instruction sent with every chat request
pub const CHAT_SYSTEM_INSTRUCTION: &str
  = "Follow the given examples and answer the question.";

/// Keys understood only by the content-generation API
const GENERATIVE_ONLY_KEYS: [&str; 3]
  = ["generationConfig", "tools", "safetySettings"];

/// Flat sampling options and their content-generation names
const GENERATION_CONFIG_KEYS: [(&str, &str); 7] =
  [ ("temperature", "temperature")
  , ("max_tokens", "maxOutputTokens")
  , ("max_output_tokens", "maxOutputTokens")
  , ("top_p", "topP")
  , ("top_k", "topK")
  , ("stop", "stopSequences")
  , ("candidate_count", "candidateCount")
  ];

/// Opaque generation options (temperature, max tokens, stop, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationParams(Map<String, Value>);

impl GenerationParams
{   pub fn new() -> Self
    {   GenerationParams(Map::new())
    }

    /// Builder-style insert
    pub fn with(
      mut self
    , key: impl Into<String>
    , value: impl Into<Value>
    ) -> Self
    {   self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(
      &mut self
    , key: impl Into<String>
    , value: Value
    ) -> Option<Value>
    {   self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value>
    {   self.0.get(key)
    }

    pub fn is_empty(&self) -> bool
    {   self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value>
    {   &self.0
    }

    /// Copy of `self` with every key of `overrides` applied on top.
    pub fn merged(&self, overrides: &GenerationParams) -> Self
    {   let mut out = self.0.clone();
        for (k, v) in overrides.0.iter()
        {   out.insert(k.clone(), v.clone());
        }
        GenerationParams(out)
    }
}

impl From<Map<String, Value>> for GenerationParams
{   fn from(map: Map<String, Value>) -> Self
    {   GenerationParams(map)
    }
}

/// A single prompt or an ordered batch of prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptInput
{   Single(String)
  , Batch(Vec<String>)
}

impl PromptInput
{   pub fn len(&self) -> usize
    {   match self
        {   PromptInput::Single(_) => 1
          , PromptInput::Batch(items) => items.len()
        }
    }

    pub fn is_empty(&self) -> bool
    {   self.len() == 0
    }
}

/// Unified query request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest
{   pub input: PromptInput
  , pub params: GenerationParams
}

impl QueryRequest
{   pub fn single(
      prompt: impl Into<String>
    , params: GenerationParams
    ) -> Self
    {   QueryRequest
        {   input: PromptInput::Single(prompt.into())
          , params
        }
    }

    pub fn batch(
      prompts: Vec<String>
    , params: GenerationParams
    ) -> Self
    {   QueryRequest
        {   input: PromptInput::Batch(prompts)
          , params
        }
    }
}

/// Why an item resolved to an empty answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradeReason
{   /// Key manager answered 429
    RateLimited
  , /// Key manager answered another non-200 status
    HttpStatus(u16)
  , /// Connection-level failure
    Transport
  , /// Body did not have the expected shape
    Malformed
  , /// Retry policy gave up
    RetriesExhausted
}

/// Outcome of one prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus
{   Answered
  , Degraded(DegradeReason)
}

/// One answer slot of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryItem
{   /// Generated text; always empty when degraded
    pub text: String
  , pub status: ItemStatus
}

impl QueryItem
{   pub fn answered(text: impl Into<String>) -> Self
    {   QueryItem
        {   text: text.into()
          , status: ItemStatus::Answered
        }
    }

    pub fn degraded(reason: DegradeReason) -> Self
    {   QueryItem
        {   text: String::new()
          , status: ItemStatus::Degraded(reason)
        }
    }

    pub fn is_degraded(&self) -> bool
    {   matches!(self.status, ItemStatus::Degraded(_))
    }
}

/// Mirrors the shape of the request it answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResponse
{   Single(QueryItem)
  , Batch(Vec<QueryItem>)
}

impl QueryResponse
{   pub fn len(&self) -> usize
    {   match self
        {   QueryResponse::Single(_) => 1
          , QueryResponse::Batch(items) => items.len()
        }
    }

    pub fn is_empty(&self) -> bool
    {   self.len() == 0
    }

    pub fn into_items(self) -> Vec<QueryItem>
    {   match self
        {   QueryResponse::Single(item) => vec![item]
          , QueryResponse::Batch(items) => items
        }
    }
}

/// Shape `input` for the wire format of `kind`.
///
/// `params` must already be merged (defaults < profile < caller).
/// Chat and content-generation payloads take exactly one prompt;
/// handing them a batch is a `Format` error.
pub fn format(
  input: &PromptInput
, kind: ProviderKind
, params: &GenerationParams
) -> Result<Value, crate::error::Error>
{   let payload = match kind
    {   ProviderKind::Completion => format_completion(input, params)
      , ProviderKind::Chat => format_chat(input, params)?
      , ProviderKind::Generative
      | ProviderKind::Proxied => format_generative(input, params)?
    };
    trace!("Formatted {:?} payload: {}", kind, payload);
    Ok(payload)
}

fn format_completion(
  input: &PromptInput
, params: &GenerationParams
) -> Value
{   let prompt = match input
    {   PromptInput::Single(p) => json!(p)
      , PromptInput::Batch(ps) => json!(ps)
    };

    let mut body = Map::new();
    body.insert("prompt".into(), prompt);
    body.insert("max_tokens".into(), json!(1000));
    body.insert("top_p".into(), json!(1));
    body.insert("n".into(), json!(1));
    body.insert("frequency_penalty".into(), json!(0));
    body.insert("presence_penalty".into(), json!(0));
    body.insert("stream".into(), json!(false));
    body.insert("logprobs".into(), Value::Null);
    body.insert("stop".into(), Value::Null);
    extend_openai(&mut body, params);
    Value::Object(body)
}

fn format_chat(
  input: &PromptInput
, params: &GenerationParams
) -> Result<Value, crate::error::Error>
{   let prompt = match input
    {   PromptInput::Single(p) => p
      , PromptInput::Batch(_) => {
          return Err(crate::error::Error::Format(
            "chat transport takes a single prompt".to_string()
          ));
        }
    };

    let mut body = Map::new();
    body.insert("messages".into(), json!([
      { "role": "system", "content": CHAT_SYSTEM_INSTRUCTION },
      { "role": "user", "content": prompt }
    ]));
    extend_openai(&mut body, params);
    Ok(Value::Object(body))
}

fn extend_openai(
  body: &mut Map<String, Value>
, params: &GenerationParams
)
{   for (k, v) in params.as_map()
    {   if GENERATIVE_ONLY_KEYS.contains(&k.as_str())
          || k == "prompt"
          || k == "messages"
        {   continue;
        }
        body.insert(k.clone(), v.clone());
    }
}

fn format_generative(
  input: &PromptInput
, params: &GenerationParams
) -> Result<Value, crate::error::Error>
{   let text = match input
    {   PromptInput::Single(p) => p
      , PromptInput::Batch(_) => {
          return Err(crate::error::Error::Format(
            "content generation takes a single prompt string"
              .to_string()
          ));
        }
    };

    let mut generation_config = Map::new();
    if let Some(Value::Object(explicit))
      = params.get("generationConfig")
    {   for (k, v) in explicit
        {   generation_config.insert(k.clone(), v.clone());
        }
    }
    for (flat, wire) in GENERATION_CONFIG_KEYS
    {   match params.get(flat)
        {   None | Some(Value::Null) => {}
          , Some(Value::String(s)) if wire == "stopSequences" => {
              generation_config.insert(wire.into(), json!([s]));
            }
          , Some(v) => {
              generation_config.insert(wire.into(), v.clone());
            }
        }
    }

    let mut body = Map::new();
    body.insert(
      "contents".into()
    , json!([{ "parts": [{ "text": text }] }])
    );
    body.insert(
      "generationConfig".into()
    , Value::Object(generation_config)
    );
    for key in ["tools", "safetySettings"]
    {   if let Some(v) = params.get(key)
        {   if !v.is_null()
            {   body.insert(key.into(), v.clone());
            }
        }
    }
    Ok(Value::Object(body))
}
