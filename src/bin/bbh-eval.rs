//! Score one BBH task against one provider profile
//!
//! ```bash
//! RUST_LOG=info bbh-eval --llm-type turbo --task temporal_sequences
//! ```

use std::path::PathBuf;

use bbh_harness::config::{HarnessConfig, ProviderConfig};
use bbh_harness::dispatch::Dispatcher;
use bbh_harness::eval::task::{load_task_data, FEW_SHOT_COUNT};
use bbh_harness::eval::{evaluate_report, EvalOptions, Task};
use bbh_harness::QueryBackend;
use clap::Parser;
use log::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "bbh-eval")]
#[command(about = "Evaluate an LLM provider on a BIG-Bench-Hard task")]
#[command(version)]
struct Cli
{   /// Auth file with provider profiles
    #[arg(long, default_value = "auth.yaml", env = "BBH_AUTH_FILE")]
    auth: PathBuf

  , /// Top-level key of the auth file (davinci, turbo, gemini, ...)
    #[arg(long, default_value = "turbo")]
    llm_type: String

  , /// Profile under the LLM type
    #[arg(long, default_value = "default")]
    setting: String

  , /// Task name; `{data_dir}/{task}.json` holds its examples
    #[arg(long)]
    task: String

  , #[arg(long, default_value = "data")]
    data_dir: PathBuf

  , /// Instruction template; `<prompt>` becomes the CoT directive
    #[arg(long, default_value = "<prompt>")]
    instruction: String

  , #[arg(long, default_value = "Let's think step by step.")]
    cot: String

  , /// Leave the instruction out of each prompt
    #[arg(long)]
    no_demon: bool

  , /// Score the whole output, not only its first paragraph
    #[arg(long)]
    full_output: bool

  , /// Evaluate at most this many questions
    #[arg(long)]
    limit: Option<usize>

  , #[arg(long, default_value_t = 20)]
    batch_size: usize

  , /// Attempts per direct call
    #[arg(long, default_value_t = 10, conflicts_with = "retry_forever")]
    max_attempts: usize

  , /// Retry direct calls until they succeed
    #[arg(long)]
    retry_forever: bool

  , /// Draw a progress bar per dispatched chunk
    #[arg(long)]
    progress: bool
}

#[tokio::main]
async fn main() -> Result<(), bbh_harness::Error>
{   env_logger::init();
    let cli = Cli::parse();
    debug!("{:?}", cli);

    let provider = ProviderConfig::load(
      &cli.auth
    , &cli.llm_type
    , &cli.setting
    )?;
    info!(
      "Using {:?} model {}",
      provider.kind, provider.model_name
    );

    let harness = HarnessConfig
    {   batch_size: cli.batch_size
      , max_attempts: if cli.retry_forever
        {   None
        } else
        {   Some(cli.max_attempts)
        }
      , ..HarnessConfig::default()
    };
    let dispatcher = Dispatcher::from_config(provider, &harness)?
      .with_progress(cli.progress);
    let backend = QueryBackend::new(dispatcher);

    let data = load_task_data(&cli.data_dir, &cli.task)?;
    let split = FEW_SHOT_COUNT.min(data.examples.len());
    let (few_shot, rest) = data.examples.split_at(split);
    let eval_examples = match cli.limit
    {   Some(n) => &rest[..n.min(rest.len())]
      , None => rest
    };
    info!(
      "{}: {} few-shot, {} evaluation examples",
      cli.task, few_shot.len(), eval_examples.len()
    );

    let task = Task::new(&cli.task, &cli.instruction, &cli.cot);
    let options = EvalOptions
    {   demon: !cli.no_demon
      , first_paragraph: !cli.full_output
      , data_dir: cli.data_dir.clone()
      , ..EvalOptions::default()
    };

    let report = evaluate_report(
      &task,
      &task.instruction_template,
      &task.cot_prompt,
      eval_examples,
      &backend,
      Some(few_shot),
      &options,
    ).await;

    backend.shutdown().await?;
    let report = report?;
    info!(
      "{}: {}/{} correct, {} degraded",
      report.task, report.correct, report.total, report.degraded
    );
    Ok(())
}
