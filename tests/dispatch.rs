use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use bbh_harness::client::Router;
use bbh_harness::config::{ApiFlavor, ProviderConfig, ProviderKind};
use bbh_harness::dispatch::{
  batchify, paraphrase, truncate_first_paragraph, Dispatcher, QueryFn,
};
use bbh_harness::failover::{ProxyPauses, RetryPolicy, WaitStrategy};
use bbh_harness::providers::Transport;
use bbh_harness::request::{GenerationParams, QueryItem};
use bbh_harness::Error;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn dispatcher(kind: ProviderKind, base: &str, batch_size: usize) -> Dispatcher
{   let config = Arc::new(ProviderConfig
    {   kind
      , flavor: ApiFlavor::OpenAi
      , api_key: "sk-test".to_string()
      , base_url: Some(base.to_string())
      , api_version: None
      , model_name: "test-model".to_string()
      , default_params: GenerationParams::new()
      , timeout: Duration::from_secs(5)
    });
    let router = Router::with_transport(
      Transport::new(config).unwrap()
    , RetryPolicy::new(2).with_wait(WaitStrategy::Fixed(Duration::ZERO))
    , ProxyPauses
      {   rate_limited: Duration::ZERO
        , transport_error: Duration::ZERO
      }
    );
    Dispatcher::new(router, batch_size).unwrap()
}

/// Answers every completion prompt with `echo:<prompt>`
struct EchoCompletion;

impl Respond for EchoCompletion
{   fn respond(&self, request: &Request) -> ResponseTemplate
    {   let body: Value = serde_json::from_slice(&request.body).unwrap();
        let prompts: Vec<String> = match &body["prompt"]
        {   Value::Array(items) => items
              .iter()
              .map(|p| p.as_str().unwrap().to_string())
              .collect()
          , Value::String(p) => vec![p.clone()]
          , other => panic!("unexpected prompt {:?}", other)
        };
        let choices: Vec<Value> = prompts
          .iter()
          .enumerate()
          .map(|(i, p)| json!({ "text": format!("echo:{}", p), "index": i }))
          .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "choices": choices }))
    }
}

/// Answers a chat request with `echo:<user content>`
struct EchoChat;

impl Respond for EchoChat
{   fn respond(&self, request: &Request) -> ResponseTemplate
    {   let body: Value = serde_json::from_slice(&request.body).unwrap();
        let content = body["messages"][1]["content"].as_str().unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
          "choices": [{ "message": { "content": format!("echo:{}", content) } }]
        }))
    }
}

fn prompts(n: usize) -> Vec<String>
{   (0..n).map(|i| format!("prompt {}", i)).collect()
}

#[test]
fn test_batchify_partitions_in_order()
{   for n in 0..50usize
    {   let items: Vec<usize> = (0..n).collect();
        for size in 1..8usize
        {   let chunks = batchify(&items, size);
            assert_eq!(chunks.len(), (n + size - 1) / size);
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= size));
            let flat: Vec<usize> = chunks.concat();
            assert_eq!(flat, items);
        }
    }
}

#[test]
fn test_first_paragraph()
{   assert_eq!(
      truncate_first_paragraph("  The answer is (A).\n\nExplanation: ...")
    , "The answer is (A)."
    );
    assert_eq!(truncate_first_paragraph("one line\n"), "one line");
}

#[test]
fn test_zero_batch_size_rejected()
{   let config = Arc::new(ProviderConfig
    {   kind: ProviderKind::Chat
      , flavor: ApiFlavor::OpenAi
      , api_key: "k".into()
      , base_url: None
      , api_version: None
      , model_name: "m".into()
      , default_params: GenerationParams::new()
      , timeout: Duration::from_secs(1)
    });
    let router = Router::with_transport(
      Transport::new(config).unwrap()
    , RetryPolicy::default()
    , ProxyPauses::default()
    );
    let err = Dispatcher::new(router, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_completion_chunks_go_out_whole()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/completions"))
      .respond_with(EchoCompletion)
      .expect(3)
      .mount(&server)
      .await;

    let dispatcher = dispatcher(ProviderKind::Completion, &server.uri(), 20);
    let input = prompts(45);
    let items = dispatcher
      .dispatch(&input, &GenerationParams::new())
      .await
      .unwrap();

    assert_eq!(items.len(), 45);
    for (item, prompt) in items.iter().zip(&input)
    {   assert_eq!(item.text, format!("echo:{}", prompt));
    }
}

#[tokio::test]
async fn test_chat_prompts_go_out_one_by_one()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(EchoChat)
      .expect(5)
      .mount(&server)
      .await;

    let dispatcher = dispatcher(ProviderKind::Chat, &server.uri(), 2)
      .with_progress(true);
    let input = prompts(5);
    let items = dispatcher
      .query(input.clone(), &GenerationParams::new())
      .await
      .unwrap();

    let texts: Vec<String> = items.into_iter().map(|i| i.text).collect();
    let expected: Vec<String> =
      input.iter().map(|p| format!("echo:{}", p)).collect();
    assert_eq!(texts, expected);

    let received = server.received_requests().await.unwrap();
    let order: Vec<String> = received
      .iter()
      .map(|r| {
        let body: Value = serde_json::from_slice(&r.body).unwrap();
        body["messages"][1]["content"].as_str().unwrap().to_string()
      })
      .collect();
    assert_eq!(order, input);
}

#[tokio::test]
async fn test_empty_input_sends_nothing()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(EchoCompletion)
      .expect(0)
      .mount(&server)
      .await;

    let dispatcher = dispatcher(ProviderKind::Completion, &server.uri(), 20);
    let items = dispatcher
      .dispatch(&[], &GenerationParams::new())
      .await
      .unwrap();
    assert!(items.is_empty());
}

/// Records what it was asked and answers with a fixed text
struct Recorder
{   seen: Mutex<Vec<String>>
}

impl QueryFn for Recorder
{   async fn query(
      &self
    , prompts: Vec<String>
    , _params: &GenerationParams
    ) -> Result<Vec<QueryItem>, Error>
    {   self.seen.lock().unwrap().extend(prompts.iter().cloned());
        Ok(prompts.iter().map(|_| QueryItem::answered("Think carefully.")).collect())
    }
}

#[tokio::test]
async fn test_paraphrase_template()
{   let recorder = Recorder { seen: Mutex::new(vec![]) };
    let out = paraphrase(
      &recorder
    , &["Solve the task.".to_string()]
    , &GenerationParams::new()
    ).await.unwrap();

    assert_eq!(out, vec!["Think carefully.".to_string()]);
    assert_eq!(
      recorder.seen.lock().unwrap()[0]
    , "Generate a variation of the following instruction while keeping the semantic meaning.\nInput:Solve the task.\nOutput:"
    );
}
