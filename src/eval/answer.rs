use super::task::TaskMode;

const ANSWER_MARKER: &str = "answer is ";

/// Pull the final answer out of free-text model output.
///
/// Only the text after the last `answer is ` counts; output
/// without the marker is returned as-is. Multiple choice keeps the
/// letter of the first option `(A)`..`(R)` found there; free form
/// drops one trailing period.
pub fn extract_answer(output: &str, mode: TaskMode) -> String
{   let segments: Vec<&str> = output.split(ANSWER_MARKER).collect();
    if segments.len() == 1
    {   return output.to_string();
    }
    let answer = segments[segments.len() - 1].trim();

    match mode
    {   TaskMode::MultipleChoice => {
          for letter in 'A'..='R'
          {   if answer.contains(&format!("({})", letter))
              {   return letter.to_string();
              }
          }
          answer.to_string()
        }
      , TaskMode::FreeForm => answer
          .strip_suffix('.')
          .unwrap_or(answer)
          .to_string()
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn choice_letter_after_marker()
    {   assert_eq!(
          extract_answer(
            "Y comes first. So the answer is (A).",
            TaskMode::MultipleChoice
          )
        , "A"
        );
    }

    #[test]
    fn last_marker_wins()
    {   assert_eq!(
          extract_answer(
            "the answer is (C)? No, the answer is (D).",
            TaskMode::MultipleChoice
          )
        , "D"
        );
    }

    #[test]
    fn free_form_drops_period()
    {   assert_eq!(
          extract_answer("So the answer is 24.", TaskMode::FreeForm)
        , "24"
        );
    }

    #[test]
    fn no_marker_returns_output()
    {   assert_eq!(extract_answer("True", TaskMode::FreeForm), "True");
        assert_eq!(extract_answer("", TaskMode::MultipleChoice), "");
    }

    #[test]
    fn choice_without_option_returns_segment()
    {   assert_eq!(
          extract_answer("the answer is B", TaskMode::MultipleChoice)
        , "B"
        );
    }
}
