use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc;

use crate::config::{HarnessConfig, ProviderConfig};
use crate::dispatch::{Dispatcher, QueryFn};
use crate::failover::{self, ProxyPauses, RetryOutcome, RetryPolicy};
use crate::providers::Transport;
use crate::request::{
  DegradeReason, GenerationParams, PromptInput, QueryItem,
  QueryRequest, QueryResponse,
};
use crate::QueryFoot;

/// Routes requests to the one transport chosen at startup
#[derive(Debug, Clone)]
pub struct Router
{   transport: Transport
  , retry: RetryPolicy
  , pauses: ProxyPauses
}

impl Router
{   /// Router for `config`, tuned by `harness`
    pub fn new(
      config: Arc<ProviderConfig>
    , harness: &HarnessConfig
    ) -> Result<Self, crate::error::Error>
    {   debug!("Creating Router for {:?}", config.kind);
        Ok(Router::with_transport(
          Transport::new(config)?
        , harness.retry_policy()
        , harness.proxy_pauses()
        ))
    }

    pub fn with_transport(
      transport: Transport
    , retry: RetryPolicy
    , pauses: ProxyPauses
    ) -> Self
    {   Router
        {   transport
          , retry
          , pauses
        }
    }

    pub fn config(&self) -> &ProviderConfig
    {   self.transport.config()
    }

    pub fn supports_batch(&self) -> bool
    {   self.transport.supports_batch()
    }

    /// Answer `request`, one item per prompt, in order.
    ///
    /// Per-item failures come back as degraded items. `Err` is
    /// reserved for failures no retry can fix (request shape,
    /// local configuration).
    pub async fn route(
      &self
    , request: &QueryRequest
    ) -> Result<QueryResponse, crate::error::Error>
    {   let params = self.config().default_params
          .merged(&request.params);
        trace!("Routing {} prompt(s)", request.input.len());

        match &request.input
        {   PromptInput::Single(_) => {
              let mut items = self
                .route_call(&request.input, 1, &params)
                .await?;
              Ok(QueryResponse::Single(items.remove(0)))
            }
          , PromptInput::Batch(prompts) if self.supports_batch() => {
              if prompts.is_empty()
              {   return Ok(QueryResponse::Batch(vec![]));
              }
              let items = self
                .route_call(&request.input, prompts.len(), &params)
                .await?;
              Ok(QueryResponse::Batch(items))
            }
          , PromptInput::Batch(prompts) => {
              let mut items = Vec::with_capacity(prompts.len());
              for prompt in prompts
              {   let input = PromptInput::Single(prompt.clone());
                  let mut one = self
                    .route_call(&input, 1, &params)
                    .await?;
                  items.push(one.remove(0));
              }
              Ok(QueryResponse::Batch(items))
            }
        }
    }

    async fn route_call(
      &self
    , input: &PromptInput
    , expected: usize
    , params: &GenerationParams
    ) -> Result<Vec<QueryItem>, crate::error::Error>
    {   let payload = self.transport.format(input, params)?;
        if self.transport.is_direct()
        {   self.call_direct(&payload, expected).await
        } else
        {   Ok(vec![self.call_proxy(&payload).await])
        }
    }

    async fn call_direct(
      &self
    , payload: &serde_json::Value
    , expected: usize
    ) -> Result<Vec<QueryItem>, crate::error::Error>
    {   let transport = &self.transport;
        let outcome = failover::execute(&self.retry, move || async move {
          let raw = transport.send(payload).await?;
          let texts = transport.extract_text(&raw)?;
          if texts.len() != expected
          {   return Err(crate::error::Error::ParseError(format!(
                "expected {} answers, got {}",
                expected,
                texts.len()
              )));
          }
          Ok(texts)
        }).await;

        match outcome
        {   RetryOutcome::Success { value, .. } => {
              Ok(value
                .into_iter()
                .map(|t| QueryItem::answered(t.trim()))
                .collect())
            }
          , RetryOutcome::Exhausted { attempts, last_error } => {
              error!(
                "Dropping {} prompt(s) after {} attempts: {}",
                expected, attempts, last_error
              );
              Ok(vec![
                QueryItem::degraded(DegradeReason::RetriesExhausted);
                expected
              ])
            }
          , RetryOutcome::Rejected { error } => Err(error)
        }
    }

    async fn call_proxy(
      &self
    , payload: &serde_json::Value
    ) -> QueryItem
    {   let result = match self.transport.send(payload).await
        {   Ok(raw) => self.transport.extract_text(&raw)
          , Err(e) => Err(e)
        };

        match result
        {   Ok(texts) => QueryItem::answered(texts.concat().trim())
          , Err(crate::error::Error::RateLimitExceeded(_)) => {
              warn!(
                "Key manager rate limited, pausing {:?}",
                self.pauses.rate_limited
              );
              tokio::time::sleep(self.pauses.rate_limited).await;
              QueryItem::degraded(DegradeReason::RateLimited)
            }
          , Err(crate::error::Error::ApiError { status, body }) => {
              error!("Key manager status {}: {}", status, body);
              QueryItem::degraded(DegradeReason::HttpStatus(status))
            }
          , Err(crate::error::Error::HttpError(e)) => {
              error!("Key manager transport error: {}", e);
              tokio::time::sleep(self.pauses.transport_error).await;
              QueryItem::degraded(DegradeReason::Transport)
            }
          , Err(e) => {
              error!("Key manager reply unusable: {}", e);
              QueryItem::degraded(DegradeReason::Malformed)
            }
        }
    }
}

/// Public API for the query backend - owns the task
pub struct QueryBackend
{   hand: crate::QueryHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl QueryBackend
{   /// Spawn the backend loop around `dispatcher`.
    /// Returns immediately.
    pub fn new(dispatcher: Dispatcher) -> Self
    {   debug!("Creating QueryBackend with task ownership");

        let (send_prompts_tx, send_prompts_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::QueryHand
        {   send_prompts_tx
          , kill_process_tx
        };

        let foot = crate::QueryFoot
        {   send_prompts_rx
          , kill_process_rx
        };

        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, dispatcher).await
        });

        QueryBackend
        {   hand
          , _task_handle
        }
    }

    /// Queue prompts - returns almost immediately
    pub async fn send_prompts(
      &self
    , prompts: Vec<String>
    , params: GenerationParams
    ) -> Result<
        mpsc::UnboundedReceiver<crate::SendPromptsReply>,
        crate::error::Error
      >
    {   debug!("send_prompts queuing {} prompts", prompts.len());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::SendPromptsArgs
        {   prompts
          , params
          , reply: reply_tx
        };

        self.hand.send_prompts_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            crate::error::Error::Other(
              "Backend disconnected".to_string()
            )
          })?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down QueryBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillProcessArgs
        {   reply: reply_tx
        };

        self.hand.kill_process_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Other(
              "Backend already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend dropped shutdown reply");
            Err(crate::error::Error::Other(
              "Backend gone before confirming shutdown".to_string()
            ))
        }
    }
}

impl QueryFn for QueryBackend
{   async fn query(
      &self
    , prompts: Vec<String>
    , params: &GenerationParams
    ) -> Result<Vec<QueryItem>, crate::error::Error>
    {   let mut reply_rx = self
          .send_prompts(prompts, params.clone())
          .await?;
        match reply_rx.recv().await
        {   Some(result) => result
          , None => Err(crate::error::Error::Other(
              "Backend dropped reply".to_string()
            ))
        }
    }
}

/// Main backend event loop
///
/// Commands are served one at a time, so replies leave in the
/// order requests arrived. Queued prompts are answered before a
/// pending shutdown.
async fn run_backend_loop(
  foot: QueryFoot
, dispatcher: Dispatcher
)
{   debug!("Starting QueryBackend event loop");
    let QueryFoot
    {   mut send_prompts_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { biased;
        Some(cmd) = send_prompts_rx.recv() => {
          debug!("Received SendPrompts ({})", cmd.prompts.len());
          let result = dispatcher
            .dispatch(&cmd.prompts, &cmd.params)
            .await;
          let _ = cmd.reply.send(result);
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("QueryBackend shutting down");
          break;
        }
      , else => {
          debug!("All command channels closed");
          break;
        }
      }
    }
}
