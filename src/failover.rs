//! Retry policy and backoff executor for provider calls

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::time::Instant;

/// Wait used when an error carries no usable hint
pub const DEFAULT_WAIT_SECS: u64 = 60;

/// Longest wait a hint may ask for
pub const MAX_HINT_SECS: u64 = 3600;

/// Pull a "retry after N seconds" hint out of a free-text error.
///
/// The first whitespace-delimited word containing `second` is
/// located and the word before it is read as an integer.
/// Anything else yields `DEFAULT_WAIT_SECS`; hints are capped at
/// `MAX_HINT_SECS`.
pub fn extract_seconds(message: &str) -> u64
{   let words: Vec<&str> = message.split_whitespace().collect();
    for (i, word) in words.iter().enumerate()
    {   if word.contains("second")
        {   return i.checked_sub(1)
              .and_then(|prev| words[prev].parse::<u64>().ok())
              .map_or(DEFAULT_WAIT_SECS, |secs| secs.min(MAX_HINT_SECS));
        }
    }
    DEFAULT_WAIT_SECS
}

/// How long to sleep before the next attempt
#[derive(Clone, Copy)]
pub enum WaitStrategy
{   /// Scrape the error text with `extract_seconds`
    ErrorHint
  , Fixed(Duration)
  , /// `initial * multiplier^(attempt - 1)`
    Exponential
    {   initial: Duration
      , multiplier: f32
    }
  , /// Caller-supplied: (error text, attempt) -> wait
    Custom(fn(&str, usize) -> Duration)
}

impl WaitStrategy
{   /// Wait after failed attempt number `attempt` (1-based)
    pub fn wait_for(
      &self
    , error: &crate::error::Error
    , attempt: usize
    ) -> Duration
    {   match self
        {   WaitStrategy::ErrorHint => Duration::from_secs(
              extract_seconds(&error.to_string())
            )
          , WaitStrategy::Fixed(d) => *d
          , WaitStrategy::Exponential { initial, multiplier } => {
              backoff_for_attempt(*initial, *multiplier, attempt)
            }
          , WaitStrategy::Custom(f) => f(&error.to_string(), attempt)
        }
    }
}

impl fmt::Debug for WaitStrategy
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   match self
        {   WaitStrategy::ErrorHint => write!(f, "ErrorHint")
          , WaitStrategy::Fixed(d) => write!(f, "Fixed({:?})", d)
          , WaitStrategy::Exponential { initial, multiplier } => {
              write!(
                f,
                "Exponential({:?} x{})",
                initial, multiplier
              )
            }
          , WaitStrategy::Custom(_) => write!(f, "Custom")
        }
    }
}

fn backoff_for_attempt(
  initial: Duration
, multiplier: f32
, attempt: usize
) -> Duration
{   debug!("Calculating backoff for attempt {}", attempt);
    let factor = multiplier
      .powi(attempt.saturating_sub(1) as i32);
    Duration::from_millis(
      (initial.as_millis() as f32 * factor) as u64
    )
}

/// Retry policy for direct provider calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy
{   /// `None` retries until success
    pub max_attempts: Option<usize>
  , /// Give up once the next wait would cross this bound
    pub max_elapsed: Option<Duration>
  , pub wait: WaitStrategy
}

impl RetryPolicy
{   /// Bounded policy using the error-text heuristic
    pub fn new(max_attempts: usize) -> Self
    {   RetryPolicy
        {   max_attempts: Some(max_attempts.max(1))
          , max_elapsed: None
          , wait: WaitStrategy::ErrorHint
        }
    }

    /// Retry forever; must be opted into explicitly
    pub fn unbounded() -> Self
    {   RetryPolicy
        {   max_attempts: None
          , max_elapsed: None
          , wait: WaitStrategy::ErrorHint
        }
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self
    {   self.wait = wait;
        self
    }

    pub fn with_max_elapsed(mut self, bound: Duration) -> Self
    {   self.max_elapsed = Some(bound);
        self
    }

    fn attempts_left(&self, made: usize) -> bool
    {   match self.max_attempts
        {   Some(max) => made < max.max(1)
          , None => true
        }
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::new(10)
    }
}

/// Fixed pauses applied to key-manager failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyPauses
{   /// After HTTP 429
    pub rate_limited: Duration
  , /// After a connection-level error
    pub transport_error: Duration
}

impl Default for ProxyPauses
{   fn default() -> Self
    {   ProxyPauses
        {   rate_limited: Duration::from_secs(60)
          , transport_error: Duration::from_secs(5)
        }
    }
}

/// Result of running a call under a retry policy
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T>
{   Success
    {   value: T
      , attempts: usize
    }
  , /// Policy bound reached while the error stayed transient
    Exhausted
    {   attempts: usize
      , last_error: crate::error::Error
    }
  , /// Error is not worth retrying
    Rejected
    {   error: crate::error::Error
    }
}

impl<T> RetryOutcome<T>
{   pub fn into_result(self) -> Result<T, crate::error::Error>
    {   match self
        {   RetryOutcome::Success { value, .. } => Ok(value)
          , RetryOutcome::Exhausted { last_error, .. } => {
              Err(last_error)
            }
          , RetryOutcome::Rejected { error } => Err(error)
        }
    }
}

/// Run `call` until it succeeds or `policy` gives up.
///
/// Non-transient errors stop the loop at once.
pub async fn execute<T, F, Fut>(
  policy: &RetryPolicy
, mut call: F
) -> RetryOutcome<T>
where
  F: FnMut() -> Fut
, Fut: Future<Output = Result<T, crate::error::Error>>
{   let started = Instant::now();
    let mut attempt = 0usize;

    loop
    {   attempt += 1;
        let err = match call().await
        {   Ok(value) => {
              if attempt > 1
              {   debug!("Succeeded after {} attempts", attempt);
              }
              return RetryOutcome::Success
              {   value
                , attempts: attempt
              };
            }
          , Err(e) => e
        };

        if !err.is_transient()
        {   error!("Not retrying: {}", err);
            return RetryOutcome::Rejected { error: err };
        }

        if !policy.attempts_left(attempt)
        {   error!("Giving up after {} attempts: {}", attempt, err);
            return RetryOutcome::Exhausted
            {   attempts: attempt
              , last_error: err
            };
        }

        let wait = policy.wait.wait_for(&err, attempt);
        if let Some(bound) = policy.max_elapsed
        {   let crosses = started.elapsed()
              .checked_add(wait)
              .map_or(true, |at| at > bound);
            if crosses
            {   error!(
                  "Giving up after {:?} ({} attempts): {}",
                  started.elapsed(), attempt, err
                );
                return RetryOutcome::Exhausted
                {   attempts: attempt
                  , last_error: err
                };
            }
        }

        warn!("retrying (attempt {}) in {:?}: {}", attempt, wait, err);
        tokio::time::sleep(wait).await;
    }
}
