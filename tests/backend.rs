use std::time::Duration;

use bbh_harness::config::{ApiFlavor, HarnessConfig, ProviderConfig, ProviderKind};
use bbh_harness::dispatch::{Dispatcher, QueryFn};
use bbh_harness::request::{DegradeReason, GenerationParams, ItemStatus};
use bbh_harness::QueryBackend;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Echoes the user message of a chat request
struct EchoChat;

impl Respond for EchoChat
{   fn respond(&self, request: &Request) -> ResponseTemplate
    {   let body: Value = serde_json::from_slice(&request.body).unwrap();
        let content = body["messages"][1]["content"].as_str().unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
          "choices": [{ "message": { "content": content.to_uppercase() } }]
        }))
    }
}

fn harness() -> HarnessConfig
{   HarnessConfig
    {   batch_size: 2
      , max_attempts: Some(2)
      , max_elapsed_secs: None
      , rate_limit_pause_secs: 0
      , transport_error_pause_secs: 0
    }
}

fn chat_profile(base: &str) -> ProviderConfig
{   ProviderConfig
    {   kind: ProviderKind::Chat
      , flavor: ApiFlavor::OpenAi
      , api_key: "sk-test".to_string()
      , base_url: Some(base.to_string())
      , api_version: None
      , model_name: "test-model".to_string()
      , default_params: GenerationParams::new()
      , timeout: Duration::from_secs(5)
    }
}

#[tokio::test]
async fn test_backend_answers_in_order()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(EchoChat)
      .expect(5)
      .mount(&server)
      .await;

    let dispatcher = Dispatcher::from_config(
      chat_profile(&server.uri())
    , &harness()
    ).unwrap();
    let backend = QueryBackend::new(dispatcher);

    let first = backend
      .query(vec!["a".into(), "b".into(), "c".into()], &GenerationParams::new())
      .await
      .unwrap();
    let texts: Vec<&str> = first.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts, vec!["A", "B", "C"]);

    let mut rx = backend
      .send_prompts(vec!["d".into(), "e".into()], GenerationParams::new())
      .await
      .unwrap();
    let second = rx.recv().await.unwrap().unwrap();
    assert_eq!(second[0].text, "D");
    assert_eq!(second[1].text, "E");

    tokio_test::assert_ok!(backend.shutdown().await);
}

#[tokio::test]
async fn test_backend_reports_degraded_items()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
      .expect(2)
      .mount(&server)
      .await;

    let dispatcher = Dispatcher::from_config(
      chat_profile(&server.uri())
    , &harness()
    ).unwrap();
    let backend = QueryBackend::new(dispatcher);

    let items = backend
      .query(vec!["a".into()], &GenerationParams::new())
      .await
      .unwrap();
    assert_eq!(
      items[0].status
    , ItemStatus::Degraded(DegradeReason::RetriesExhausted)
    );
    assert_eq!(items[0].text, "");

    backend.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_queued_prompts_answered_before_shutdown()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(EchoChat)
      .expect(3)
      .mount(&server)
      .await;

    let dispatcher = Dispatcher::from_config(
      chat_profile(&server.uri())
    , &harness()
    ).unwrap();
    let backend = QueryBackend::new(dispatcher);

    let mut first = backend
      .send_prompts(vec!["x".into(), "y".into()], GenerationParams::new())
      .await
      .unwrap();
    let mut second = backend
      .send_prompts(vec!["z".into()], GenerationParams::new())
      .await
      .unwrap();
    backend.shutdown().await.unwrap();

    let first = first.recv().await.unwrap().unwrap();
    assert_eq!(first[0].text, "X");
    assert_eq!(first[1].text, "Y");
    let second = second.recv().await.unwrap().unwrap();
    assert_eq!(second[0].text, "Z");
}
