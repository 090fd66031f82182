use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

/// Number of examples taken from a task file as few-shot pool
pub const FEW_SHOT_COUNT: usize = 3;

pub const MULTIPLE_CHOICE_TASKS: [&str; 17] =
  [ "temporal_sequences", "disambiguation_qa", "date_understanding"
  , "tracking_shuffled_objects_three_objects", "penguins_in_a_table"
  , "geometric_shapes", "snarks", "ruin_names"
  , "tracking_shuffled_objects_seven_objects"
  , "tracking_shuffled_objects_five_objects"
  , "logical_deduction_three_objects", "hyperbaton"
  , "logical_deduction_five_objects", "logical_deduction_seven_objects"
  , "movie_recommendation", "salient_translation_error_detection"
  , "reasoning_about_colored_objects"
  ];

pub const FREE_FORM_TASKS: [&str; 10] =
  [ "multistep_arithmetic_two", "navigate", "dyck_languages"
  , "word_sorting", "sports_understanding", "boolean_expressions"
  , "object_counting", "formal_fallacies", "causal_judgement"
  , "web_of_lies"
  ];

/// Answer format of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode
{   /// Targets look like `(B)`
    MultipleChoice
  , FreeForm
}

impl TaskMode
{   /// Mode of a BBH task by name; unknown names are free form
    pub fn for_task(name: &str) -> Self
    {   if MULTIPLE_CHOICE_TASKS.contains(&name)
        {   TaskMode::MultipleChoice
        } else
        {   TaskMode::FreeForm
        }
    }
}

/// A benchmark task and the prompt pieces to evaluate it with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task
{   pub name: String
  , pub mode: TaskMode
  , /// May contain `<prompt>`, replaced by the CoT directive
    pub instruction_template: String
  , pub cot_prompt: String
}

impl Task
{   pub fn new(
      name: impl Into<String>
    , instruction_template: impl Into<String>
    , cot_prompt: impl Into<String>
    ) -> Self
    {   let name = name.into();
        Task
        {   mode: TaskMode::for_task(&name)
          , name
          , instruction_template: instruction_template.into()
          , cot_prompt: cot_prompt.into()
        }
    }
}

/// One question with its reference answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example
{   pub input: String
  , pub target: String
}

impl Example
{   pub fn new(
      input: impl Into<String>
    , target: impl Into<String>
    ) -> Self
    {   Example
        {   input: input.into()
          , target: target.into()
        }
    }
}

/// On-disk shape of `{task}.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskData
{   pub examples: Vec<Example>
}

/// Read every example of `{data_dir}/{task}.json`
pub fn load_task_data(
  data_dir: &Path
, task: &str
) -> Result<TaskData, crate::error::Error>
{   let path = data_dir.join(format!("{}.json", task));
    debug!("Loading task data {}", path.display());
    let text = std::fs::read_to_string(&path)
      .map_err(|e| {
        crate::error::Error::Io(format!("{}: {}", path.display(), e))
      })?;
    let data: TaskData = serde_json::from_str(&text)?;
    Ok(data)
}

/// First `FEW_SHOT_COUNT` examples of a task file
pub fn load_few_shot(
  data_dir: &Path
, task: &str
) -> Result<Vec<Example>, crate::error::Error>
{   let mut data = load_task_data(data_dir, task)?;
    data.examples.truncate(FEW_SHOT_COUNT);
    Ok(data.examples)
}
