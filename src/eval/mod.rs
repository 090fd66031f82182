//! Evaluation harness: few-shot prompts in, accuracy out

pub mod answer;
pub mod prompt;
pub mod task;

use std::path::PathBuf;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::dispatch::{truncate_first_paragraph, QueryFn};
use crate::request::GenerationParams;

pub use answer::extract_answer;
pub use prompt::{build_prompt, few_shot_block, ground_truth};
pub use task::{load_few_shot, Example, Task, TaskMode};

/// Knobs of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalOptions
{   /// Lead each prompt with the instruction
    pub demon: bool
  , /// Score only the text before the first blank line
    pub first_paragraph: bool
  , /// Where `{task}.json` few-shot files live
    pub data_dir: PathBuf
  , /// Extra generation params; temperature is always forced to 0
    pub params: GenerationParams
}

impl Default for EvalOptions
{   fn default() -> Self
    {   EvalOptions
        {   demon: true
          , first_paragraph: true
          , data_dir: PathBuf::from("data")
          , params: GenerationParams::new()
        }
    }
}

/// Tally of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport
{   pub task: String
  , pub correct: usize
  , pub total: usize
  , /// Items whose call failed and scored as empty answers
    pub degraded: usize
  , pub accuracy: f64
}

/// `matches / total`; 0 for an empty run
pub fn accuracy(matches: usize, total: usize) -> f64
{   if total == 0
    {   return 0.0;
    }
    matches as f64 / total as f64
}

/// Accuracy of `query_fn` on `eval_examples`.
///
/// Without `few_shot`, up to three examples are read from
/// `{data_dir}/{task}.json`; a missing or broken file only
/// costs the few-shot block.
pub async fn evaluate<Q: QueryFn>(
  task: &Task
, instruction_template: &str
, cot_prompt: &str
, eval_examples: &[Example]
, query_fn: &Q
, few_shot: Option<&[Example]>
, options: &EvalOptions
) -> Result<f64, crate::error::Error>
{   let report = evaluate_report(
      task,
      instruction_template,
      cot_prompt,
      eval_examples,
      query_fn,
      few_shot,
      options,
    ).await?;
    Ok(report.accuracy)
}

/// Same as `evaluate`, with the full tally
pub async fn evaluate_report<Q: QueryFn>(
  task: &Task
, instruction_template: &str
, cot_prompt: &str
, eval_examples: &[Example]
, query_fn: &Q
, few_shot: Option<&[Example]>
, options: &EvalOptions
) -> Result<EvalReport, crate::error::Error>
{   if eval_examples.is_empty()
    {   return Err(crate::error::Error::InvalidConfiguration(
          format!("no evaluation examples for {}", task.name)
        ));
    }

    let few_shot: Vec<Example> = match few_shot
    {   Some(examples) => examples.to_vec()
      , None => match load_few_shot(&options.data_dir, &task.name)
        {   Ok(examples) => examples
          , Err(e) => {
              warn!(
                "Could not load few-shot examples for task {}: {}",
                task.name, e
              );
              vec![]
            }
        }
    };
    debug!("{} few-shot examples for {}", few_shot.len(), task.name);

    let block = few_shot_block(task.mode, &few_shot);
    let prompts: Vec<String> = eval_examples
      .iter()
      .map(|ex| build_prompt(
        instruction_template,
        cot_prompt,
        &block,
        &ex.input,
        options.demon,
      ))
      .collect();

    info!("First prompt: ");
    info!("{}", prompts[0]);

    let params = options.params.merged(
      &GenerationParams::new().with("temperature", 0)
    );
    let items = query_fn.query(prompts, &params).await?;
    if items.len() != eval_examples.len()
    {   return Err(crate::error::Error::Other(format!(
          "{} answers for {} questions",
          items.len(),
          eval_examples.len()
        )));
    }

    let mut correct = 0;
    let mut degraded = 0;
    for (item, example) in items.iter().zip(eval_examples)
    {   if item.is_degraded()
        {   degraded += 1;
        }
        let text = if options.first_paragraph
        {   truncate_first_paragraph(&item.text)
        } else
        {   item.text.trim()
        };
        let answer = extract_answer(text, task.mode);
        if answer == ground_truth(&example.target, task.mode)
        {   correct += 1;
        }
    }

    let report = EvalReport
    {   task: task.name.clone()
      , correct
      , total: eval_examples.len()
      , degraded
      , accuracy: accuracy(correct, eval_examples.len())
    };
    println!("{} acc {:.4}", report.task, report.accuracy);
    if report.degraded > 0
    {   warn!(
          "{}: {} of {} answers were failed calls",
          report.task, report.degraded, report.total
        );
    }
    Ok(report)
}
