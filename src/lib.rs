//! # bbh-harness
//!
//! Query dispatch and scoring for BIG-Bench-Hard style evaluation.
//!
//! A run resolves one provider profile from the auth file, builds a
//! `Router` for it (completion, chat, content generation, or the
//! key-manager proxy), and drives prompts through a `Dispatcher`
//! in fixed-size chunks. `eval::evaluate` assembles few-shot
//! prompts for a task, queries, extracts answers, and scores them.
//!
//! The dispatcher can also live inside a `QueryBackend` task, which
//! is driven through the channel types below.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod failover;
pub mod providers;
pub mod request;

pub use client::{QueryBackend, Router};
pub use config::{HarnessConfig, ProviderConfig, ProviderKind};
pub use dispatch::{batchify, Dispatcher, QueryFn};
pub use error::Error;
pub use request::{
  DegradeReason, GenerationParams, ItemStatus, PromptInput,
  QueryItem, QueryRequest, QueryResponse,
};

// BACKEND API INTERFACE:

// ===== SendPrompts =====

pub type SendPromptsReply
  = Result<Vec<crate::request::QueryItem>, crate::error::Error>;
pub type SendPromptsReplySender
  = tokio::sync::mpsc::UnboundedSender<SendPromptsReply>;

pub struct SendPromptsArgs
{   pub prompts: Vec<String>
  , pub params: crate::request::GenerationParams
  , pub reply: SendPromptsReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== QueryHand (sender side) =====

pub struct QueryHand
{   pub send_prompts_tx
      : tokio::sync::mpsc::UnboundedSender<SendPromptsArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== QueryFoot (receiver side) =====

pub struct QueryFoot
{   pub send_prompts_rx
      : tokio::sync::mpsc::UnboundedReceiver<SendPromptsArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}
