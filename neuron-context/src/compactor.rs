//! Whole-conversation compaction.
//!
//! [`Compactor`] implements [`ContextStrategy`] by repeatedly folding the
//! oldest assistant/tool-result pair into a single synthesized `Text`
//! part until the session fits under a configured high-water mark. The
//! latest user turn is always preserved verbatim, matching the ordinary
//! expectation that the model always sees what was just asked.

use neuron_turn::context::ContextStrategy;
use neuron_turn::types::{ContentPart, ProviderMessage, Role};

/// Folds old assistant/tool-result exchanges into summaries once the
/// session exceeds `max_tokens`.
pub struct Compactor {
    max_tokens: usize,
    chars_per_token: usize,
}

impl Compactor {
    /// Create a compactor with the given token high-water mark.
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            chars_per_token: 4,
        }
    }

    fn estimate_message_tokens(&self, msg: &ProviderMessage) -> usize {
        msg.content
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.len() / self.chars_per_token,
                ContentPart::ToolUse { input, .. } => {
                    input.to_string().len() / self.chars_per_token
                }
                ContentPart::ToolResult { content, .. } => content.len() / self.chars_per_token,
                ContentPart::Image { .. } => 1000,
            })
            .sum::<usize>()
            + 4
    }

    fn fold_one(&self, messages: &mut Vec<ProviderMessage>) -> bool {
        if messages.len() < 2 {
            return false;
        }
        let last_index = messages.len() - 1;
        let fold_at = messages.iter().enumerate().position(|(i, m)| {
            i + 1 < last_index
                && m.role == Role::Assistant
                && is_tool_result_message(&messages[i + 1])
        });

        let Some(i) = fold_at else {
            return false;
        };

        let summary = synthesize_summary(&messages[i], &messages[i + 1]);
        let folded = ProviderMessage {
            role: Role::Assistant,
            content: vec![ContentPart::Text { text: summary }],
        };
        messages.splice(i..=i + 1, [folded]);
        true
    }
}

impl ContextStrategy for Compactor {
    fn token_estimate(&self, messages: &[ProviderMessage]) -> usize {
        messages.iter().map(|m| self.estimate_message_tokens(m)).sum()
    }

    fn should_compact(&self, messages: &[ProviderMessage], limit: usize) -> bool {
        self.token_estimate(messages) > limit
    }

    fn compact(&self, mut messages: Vec<ProviderMessage>) -> Vec<ProviderMessage> {
        while self.token_estimate(&messages) > self.max_tokens {
            if !self.fold_one(&mut messages) {
                break;
            }
        }
        messages
    }
}

fn is_tool_result_message(msg: &ProviderMessage) -> bool {
    msg.role == Role::User
        && !msg.content.is_empty()
        && msg
            .content
            .iter()
            .all(|p| matches!(p, ContentPart::ToolResult { .. }))
}

fn synthesize_summary(assistant_msg: &ProviderMessage, tool_result_msg: &ProviderMessage) -> String {
    let tool_names: Vec<&str> = assistant_msg
        .content
        .iter()
        .filter_map(|p| match p {
            ContentPart::ToolUse { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();

    let result_excerpt: String = tool_result_msg
        .content
        .iter()
        .filter_map(|p| match p {
            ContentPart::ToolResult { content, .. } => Some(content.chars().take(160).collect::<String>()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" / ");

    if tool_names.is_empty() {
        format!("[earlier exchange condensed] {result_excerpt}")
    } else {
        format!(
            "[earlier tool use condensed: {}] {result_excerpt}",
            tool_names.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_use_message(id: &str, name: &str) -> ProviderMessage {
        ProviderMessage {
            role: Role::Assistant,
            content: vec![ContentPart::ToolUse {
                id: id.into(),
                name: name.into(),
                input: serde_json::json!({}),
            }],
        }
    }

    fn tool_result_message(id: &str, content: &str) -> ProviderMessage {
        ProviderMessage {
            role: Role::User,
            content: vec![ContentPart::ToolResult {
                tool_use_id: id.into(),
                content: content.into(),
                is_error: false,
            }],
        }
    }

    fn text_message(role: Role, text: &str) -> ProviderMessage {
        ProviderMessage {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    #[test]
    fn below_threshold_is_unchanged() {
        let compactor = Compactor::new(1_000_000);
        let messages = vec![text_message(Role::User, "hi")];
        let compacted = compactor.compact(messages.clone());
        assert_eq!(compacted, messages);
    }

    #[test]
    fn folds_oldest_pair_first() {
        let compactor = Compactor::new(1);
        let messages = vec![
            text_message(Role::User, "first question"),
            tool_use_message("t1", "grep_search"),
            tool_result_message("t1", &"match\n".repeat(200)),
            text_message(Role::User, "second question"),
        ];

        let compacted = compactor.compact(messages);
        assert!(compacted.len() < 4);
        assert!(matches!(compacted[0].content[0], ContentPart::Text { .. }) || compacted[0].role == Role::User);
        assert_eq!(
            compacted.last().unwrap().content[0],
            ContentPart::Text {
                text: "second question".into()
            }
        );
    }

    #[test]
    fn last_user_message_is_never_touched() {
        let compactor = Compactor::new(1);
        let messages = vec![
            tool_use_message("t1", "grep_search"),
            tool_result_message("t1", &"x".repeat(500)),
            tool_use_message("t2", "read_file"),
            tool_result_message("t2", &"y".repeat(500)),
            text_message(Role::User, "latest question"),
        ];

        let compacted = compactor.compact(messages.clone());
        assert_eq!(compacted.last(), messages.last());
    }

    #[test]
    fn no_more_pairs_to_fold_stops_without_looping_forever() {
        let compactor = Compactor::new(1);
        let messages = vec![text_message(Role::User, "only message")];
        let compacted = compactor.compact(messages.clone());
        assert_eq!(compacted, messages);
    }

    #[test]
    fn folded_summary_mentions_tool_name() {
        let compactor = Compactor::new(1);
        let messages = vec![
            tool_use_message("t1", "grep_search"),
            tool_result_message("t1", &"z".repeat(500)),
            text_message(Role::User, "latest"),
        ];
        let compacted = compactor.compact(messages);
        match &compacted[0].content[0] {
            ContentPart::Text { text } => assert!(text.contains("grep_search")),
            _ => panic!("expected folded text part"),
        }
    }
}
