//! Batch dispatcher: chunks prompts and drives the router

use std::future::Future;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use crate::client::Router;
use crate::config::{HarnessConfig, ProviderConfig};
use crate::request::{
  GenerationParams, QueryItem, QueryRequest, QueryResponse,
};

pub const DEFAULT_BATCH_SIZE: usize = 20;

const PARAPHRASE_INSTRUCTION: &str
  = "Generate a variation of the following instruction while keeping the semantic meaning.";

/// Something that answers an ordered list of prompts
/// with the same number of items, in the same order.
pub trait QueryFn
{   fn query(
      &self
    , prompts: Vec<String>
    , params: &GenerationParams
    ) -> impl Future<
        Output = Result<Vec<QueryItem>, crate::error::Error>
      > + Send;
}

/// Consecutive chunks of at most `size` items (`size` 0 acts as 1)
pub fn batchify<T>(items: &[T], size: usize) -> Vec<&[T]>
{   items.chunks(size.max(1)).collect()
}

/// Text before the first blank line, trimmed
pub fn truncate_first_paragraph(text: &str) -> &str
{   let text = text.trim();
    match text.find("\n\n")
    {   Some(end) => &text[..end]
      , None => text
    }
}

/// Sequential chunk-by-chunk driver around one router
#[derive(Debug, Clone)]
pub struct Dispatcher
{   router: Router
  , batch_size: usize
  , show_progress: bool
}

impl Dispatcher
{   pub fn new(
      router: Router
    , batch_size: usize
    ) -> Result<Self, crate::error::Error>
    {   if batch_size == 0
        {   return Err(crate::error::Error::InvalidConfiguration(
              "batch_size must be at least 1".to_string()
            ));
        }
        Ok(Dispatcher
        {   router
          , batch_size
          , show_progress: false
        })
    }

    /// Router and dispatcher for a resolved provider profile
    pub fn from_config(
      provider: ProviderConfig
    , harness: &HarnessConfig
    ) -> Result<Self, crate::error::Error>
    {   let router = Router::new(Arc::new(provider), harness)?;
        Dispatcher::new(router, harness.batch_size)
    }

    /// Draw a per-chunk progress bar on stderr
    pub fn with_progress(mut self, show: bool) -> Self
    {   self.show_progress = show;
        self
    }

    pub fn batch_size(&self) -> usize
    {   self.batch_size
    }

    pub fn router(&self) -> &Router
    {   &self.router
    }

    /// Answer every prompt, preserving count and order.
    pub async fn dispatch(
      &self
    , prompts: &[String]
    , params: &GenerationParams
    ) -> Result<Vec<QueryItem>, crate::error::Error>
    {   let chunks = batchify(prompts, self.batch_size);
        let bar = self.progress_bar(chunks.len());
        let mut answers = Vec::with_capacity(prompts.len());

        for (index, chunk) in chunks.iter().enumerate()
        {   debug!(
              "Dispatching chunk {}/{} ({} prompts)",
              index + 1, chunks.len(), chunk.len()
            );
            if self.router.supports_batch()
            {   let request = QueryRequest::batch(
                  chunk.to_vec()
                , params.clone()
                );
                let response = self.router.route(&request).await?;
                answers.extend(response.into_items());
            } else
            {   for prompt in chunk.iter()
                {   let request = QueryRequest::single(
                      prompt.as_str()
                    , params.clone()
                    );
                    match self.router.route(&request).await?
                    {   QueryResponse::Single(item) => answers.push(item)
                      , other => answers.extend(other.into_items())
                    }
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        let degraded = answers.iter().filter(|a| a.is_degraded()).count();
        if degraded > 0
        {   info!("{} of {} prompts degraded", degraded, answers.len());
        }
        Ok(answers)
    }

    fn progress_bar(&self, chunks: usize) -> ProgressBar
    {   if !self.show_progress
        {   return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(chunks as u64);
        if let Ok(style) = ProgressStyle::with_template(
          "{elapsed_precise} [{bar:40}] {pos}/{len} chunks"
        )
        {   bar.set_style(style);
        }
        bar
    }
}

impl QueryFn for Dispatcher
{   async fn query(
      &self
    , prompts: Vec<String>
    , params: &GenerationParams
    ) -> Result<Vec<QueryItem>, crate::error::Error>
    {   self.dispatch(&prompts, params).await
    }
}

/// Rewrite each instruction while keeping its meaning.
///
/// Degraded answers come back as empty strings.
pub async fn paraphrase<Q: QueryFn>(
  query_fn: &Q
, sentences: &[String]
, params: &GenerationParams
) -> Result<Vec<String>, crate::error::Error>
{   let prompts: Vec<String> = sentences
      .iter()
      .map(|s| {
        format!("{}\nInput:{}\nOutput:", PARAPHRASE_INSTRUCTION, s)
      })
      .collect();
    debug!("Paraphrasing {} instructions", prompts.len());

    let items = query_fn.query(prompts, params).await?;
    Ok(items.into_iter().map(|item| item.text).collect())
}
