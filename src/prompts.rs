//! Prompt templates for the travel agent

/// Base system prompt for the tool-calling agent
pub const SYSTEM_PROMPT: &str = "\
You are a helpful travel assistant with access to tools for current weather, \
local time, and facts about cities.

When the user asks about a place, use the tools to gather fresh information \
before answering. Format responses with:
- Current weather summary
- Local time
- A couple of interesting city facts
- Clear reasoning for your recommendations

Maintain a natural conversation flow and use the conversation summary and \
recent messages for context.";

/// Instruction used when folding older turns into the running summary
pub const SUMMARY_PROMPT: &str = "\
Progressively summarize the conversation below. Merge the previous summary \
with the new lines into a single concise summary that preserves names, \
places, decisions, and open questions. Reply with the summary text only.";

/// Build the full system prompt, injecting the running summary when present
pub fn system_prompt_with_summary(summary: &str) -> String {
    if summary.is_empty() {
        SYSTEM_PROMPT.to_string()
    } else {
        format!("{SYSTEM_PROMPT}\n\nConversation so far (summarized):\n{summary}")
    }
}

/// Build the summarization request body from the prior summary and a transcript
pub fn summarization_input(prior_summary: &str, transcript: &str) -> String {
    if prior_summary.is_empty() {
        format!("{SUMMARY_PROMPT}\n\nNew lines:\n{transcript}")
    } else {
        format!(
            "{SUMMARY_PROMPT}\n\nPrevious summary:\n{prior_summary}\n\nNew lines:\n{transcript}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_injected_into_system_prompt() {
        let plain = system_prompt_with_summary("");
        assert_eq!(plain, SYSTEM_PROMPT);

        let with_summary = system_prompt_with_summary("User is planning a Tokyo trip.");
        assert!(with_summary.contains("Tokyo trip"));
        assert!(with_summary.starts_with(SYSTEM_PROMPT));
    }

    #[test]
    fn test_summarization_input_shape() {
        let first = summarization_input("", "User: hi\n");
        assert!(!first.contains("Previous summary"));

        let later = summarization_input("Earlier chat about Paris.", "User: hi\n");
        assert!(later.contains("Previous summary:\nEarlier chat about Paris."));
    }
}
