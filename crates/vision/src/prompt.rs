//! Structured prompt construction for the vision model.

use vigil_core_types::ExpectedChange;

const BASE_PROMPT: &str = "You are a visual regression testing expert. Analyze the two \
screenshots and identify ALL visual differences.

First screenshot: BEFORE (baseline)
Second screenshot: AFTER (current)

Your task:
1. Identify ALL visual changes (both intended and unintended)
2. For each change, provide:
   - Description: what specifically changed (e.g. \"padding increased by 2px on top of card\")
   - Severity: critical, major, or minor
   - Bounding box: approximate [x, y, width, height] if possible
3. Distinguish intended vs unintended changes based on the expected changes below.
";

const SCHEMA_PROMPT: &str = "
Return your analysis as a JSON object with this structure:
{
  \"changes\": [
    {
      \"description\": \"specific change description\",
      \"severity\": \"critical|major|minor\",
      \"intended\": true|false|null,
      \"bbox\": [x, y, width, height],
      \"confidence\": 0.95
    }
  ],
  \"overall_confidence\": 0.85,
  \"summary\": \"brief summary of changes\"
}

Be precise and thorough. Even 1px changes matter.";

/// Build the analysis prompt, embedding any expected changes as a
/// numbered list.
pub fn build_analysis_prompt(expected: &[ExpectedChange]) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    if expected.is_empty() {
        prompt.push_str(
            "\nNo expected changes provided - mark all changes as 'intended': null (unknown).\n",
        );
    } else {
        prompt.push_str("\nExpected changes:\n");
        for (index, change) in expected.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", index + 1, change.description));
        }
        prompt.push_str(
            "\nChanges matching the expected list should be marked 'intended': true.\n\
             Changes NOT in the expected list should be marked 'intended': false.\n",
        );
    }

    prompt.push_str(SCHEMA_PROMPT);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_changes_are_numbered() {
        let expected = vec![
            ExpectedChange::new("button moves right"),
            ExpectedChange::new("header color darkened"),
        ];
        let prompt = build_analysis_prompt(&expected);
        assert!(prompt.contains("1. button moves right"));
        assert!(prompt.contains("2. header color darkened"));
        assert!(prompt.contains("'intended': true"));
    }

    #[test]
    fn empty_expected_list_requests_unknown_intent() {
        let prompt = build_analysis_prompt(&[]);
        assert!(prompt.contains("'intended': null"));
        assert!(prompt.contains("overall_confidence"));
    }
}
