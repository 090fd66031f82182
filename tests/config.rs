use std::io::Write;
use std::time::Duration;

use bbh_harness::config::{
  ApiFlavor, HarnessConfig, ProviderConfig, ProviderKind,
};
use bbh_harness::Error;
use serde_json::json;

const AUTH: &str = r#"
davinci:
  default:
    api_key: sk-davinci
turbo:
  default:
    api_key: sk-turbo
    model: gpt-4o-mini
    temperature: 0.5
  azure:
    api_key: az-key
    api_type: azure
    api_base: https://example.openai.azure.com/
    api_version: 2024-02-01
    model: gpt35
gemini:
  default:
    api_key: g-key
    api_type: gemini
    generationConfig:
      maxOutputTokens: 512
    safetySettings:
      - category: HARM_CATEGORY_HARASSMENT
        threshold: BLOCK_NONE
  pooled:
    api_type: gemini
    use_key_manager: true
    api_base: http://localhost:8000
    timeout_secs: 30
"#;

#[test]
fn test_davinci_resolves_to_completion()
{   let cfg = ProviderConfig::from_yaml(AUTH, "davinci", "default")
      .unwrap();
    assert_eq!(cfg.kind, ProviderKind::Completion);
    assert_eq!(cfg.api_key, "sk-davinci");
    assert_eq!(cfg.model_name, "text-davinci-003");
    assert_eq!(cfg.base_url_or_default(), "https://api.openai.com/v1");
}

#[test]
fn test_turbo_keeps_extra_keys_as_defaults()
{   let cfg = ProviderConfig::from_yaml(AUTH, "turbo", "default")
      .unwrap();
    assert_eq!(cfg.kind, ProviderKind::Chat);
    assert_eq!(cfg.flavor, ApiFlavor::OpenAi);
    assert_eq!(cfg.model_name, "gpt-4o-mini");
    assert_eq!(cfg.default_params.get("temperature"), Some(&json!(0.5)));
    assert!(cfg.default_params.get("api_key").is_none());
}

#[test]
fn test_azure_profile()
{   let cfg = ProviderConfig::from_yaml(AUTH, "turbo", "azure")
      .unwrap();
    assert_eq!(cfg.flavor, ApiFlavor::Azure);
    assert_eq!(cfg.api_version.as_deref(), Some("2024-02-01"));
    assert_eq!(
      cfg.base_url_or_default()
    , "https://example.openai.azure.com"
    );
}

#[test]
fn test_gemini_profile_carries_provider_settings()
{   let cfg = ProviderConfig::from_yaml(AUTH, "gemini", "default")
      .unwrap();
    assert_eq!(cfg.kind, ProviderKind::Generative);
    assert_eq!(cfg.model_name, "gemini-2.0-flash");
    assert_eq!(
      cfg.default_params.get("generationConfig")
    , Some(&json!({ "maxOutputTokens": 512 }))
    );
    assert!(cfg.default_params.get("safetySettings").is_some());
}

#[test]
fn test_key_manager_profile()
{   let cfg = ProviderConfig::from_yaml(AUTH, "gemini", "pooled")
      .unwrap();
    assert_eq!(cfg.kind, ProviderKind::Proxied);
    assert_eq!(cfg.api_key, "");
    assert_eq!(cfg.timeout, Duration::from_secs(30));
    assert_eq!(cfg.base_url_or_default(), "http://localhost:8000");
}

#[test]
fn test_missing_profile_is_configuration_error()
{   let err = ProviderConfig::from_yaml(AUTH, "turbo", "nope")
      .unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));
}

#[test]
fn test_missing_key_is_reported()
{   let yaml = "turbo:\n  default:\n    model: gpt-4\n";
    let err = ProviderConfig::from_yaml(yaml, "turbo", "default")
      .unwrap_err();
    assert_eq!(err, Error::MissingApiKey("turbo/default".to_string()));
}

#[test]
fn test_key_manager_needs_base()
{   let yaml = "gemini:\n  default:\n    use_key_manager: true\n";
    let err = ProviderConfig::from_yaml(yaml, "gemini", "default")
      .unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));
}

#[test]
fn test_load_from_file()
{   let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(AUTH.as_bytes()).unwrap();
    let cfg = ProviderConfig::load(file.path(), "gemini", "default")
      .unwrap();
    assert_eq!(cfg.api_key, "g-key");

    let err = ProviderConfig::load(
      "/definitely/not/here.yaml", "gemini", "default"
    ).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_harness_defaults()
{   let harness = HarnessConfig::default();
    assert_eq!(harness.batch_size, 20);
    assert_eq!(harness.retry_policy().max_attempts, Some(10));
    let pauses = harness.proxy_pauses();
    assert_eq!(pauses.rate_limited, Duration::from_secs(60));
    assert_eq!(pauses.transport_error, Duration::from_secs(5));
}
