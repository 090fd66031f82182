//! Few-shot block and per-question prompt assembly

use super::task::{Example, TaskMode};

pub const PROMPT_PLACEHOLDER: &str = "<prompt>";

/// Letter of a `(X)` target: its second character.
/// Targets too short for that are returned whole.
pub fn choice_letter(target: &str) -> String
{   target.chars()
      .nth(1)
      .map(String::from)
      .unwrap_or_else(|| target.to_string())
}

/// What a correct extracted answer must equal
pub fn ground_truth(target: &str, mode: TaskMode) -> String
{   match mode
    {   TaskMode::MultipleChoice => choice_letter(target)
      , TaskMode::FreeForm => target.to_string()
    }
}

/// `Example:\n ... \n\nProblem:\n`, or empty without examples
pub fn few_shot_block(mode: TaskMode, examples: &[Example]) -> String
{   if examples.is_empty()
    {   return String::new();
    }

    let parts: Vec<String> = examples
      .iter()
      .map(|ex| match mode
      {   TaskMode::MultipleChoice => format!(
            "{}\nAnswer is ({})",
            ex.input,
            choice_letter(&ex.target)
          )
        , TaskMode::FreeForm => format!(
            "{}\nAnswer is {}",
            ex.input,
            ex.target
          )
      })
      .collect();

    format!("Example:\n{}\n\nProblem:\n", parts.join("\n\n"))
}

/// Full prompt for one question.
///
/// With `demon` the instruction leads, then the block, then the
/// question; without it the instruction is left out.
pub fn build_prompt(
  instruction_template: &str
, cot_prompt: &str
, few_shot: &str
, input: &str
, demon: bool
) -> String
{   if demon
    {   let instruction = instruction_template
          .replace(PROMPT_PLACEHOLDER, cot_prompt);
        format!(
          "{}\n{}\n\nQ: {}\nA: {}",
          instruction, few_shot, input, cot_prompt
        )
    } else
    {   format!("{}Q: {}\nA: {}", few_shot, input, cot_prompt)
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn letter_is_inside_parentheses()
    {   assert_eq!(choice_letter("(B)"), "B");
        assert_eq!(choice_letter("X"), "X");
    }

    #[test]
    fn empty_pool_gives_empty_block()
    {   assert_eq!(few_shot_block(TaskMode::FreeForm, &[]), "");
    }

    #[test]
    fn free_form_block_keeps_target()
    {   let block = few_shot_block(
          TaskMode::FreeForm
        , &[Example::new("2 + 2 =", "4"), Example::new("1 + 1 =", "2")]
        );
        assert_eq!(
          block
        , "Example:\n2 + 2 =\nAnswer is 4\n\n1 + 1 =\nAnswer is 2\n\nProblem:\n"
        );
    }

    #[test]
    fn zero_shot_prompt_without_instruction()
    {   let prompt = build_prompt(
          "Solve: <prompt>"
        , "Let's think step by step."
        , ""
        , "True and False is"
        , false
        );
        assert_eq!(
          prompt
        , "Q: True and False is\nA: Let's think step by step."
        );
    }
}
