//! Prompt and suffix rendering for script completion.

use crate::core::types::ScriptSpecification;

/// Suffix sent after the prompt so the model fills in the script body.
pub const SCRIPT_SUFFIX: &str = "# End of script";

/// Goal used when the user did not describe one.
pub const DEFAULT_GOAL: &str = "print Hello World!";

/// Render the completion prompt and suffix for `spec`.
///
/// The prompt is a comment header in the target language's comment syntax,
/// ending right where the script body should start.
pub fn render_prompt(spec: &ScriptSpecification) -> (String, String) {
    let goal = spec.goal.trim();
    let goal = if goal.is_empty() { DEFAULT_GOAL } else { goal };

    let mut prompt = String::new();
    prompt.push_str(&format!("# A {} script to {}\n", spec.lang, goal));

    if !spec.requirements.is_empty() {
        prompt.push_str("#\n");
        prompt.push_str("# Additional Requirements & Information\n");
        for requirement in &spec.requirements {
            let bulleted = if requirement.starts_with('-') {
                requirement.clone()
            } else {
                format!("- {requirement}")
            };
            for line in bulleted.lines() {
                prompt.push_str("# ");
                prompt.push_str(line);
                prompt.push('\n');
            }
        }
    }

    prompt.push_str("#\n");
    prompt.push_str("# Start of script:\n");
    (prompt, SCRIPT_SUFFIX.to_string())
}
