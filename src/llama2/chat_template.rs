use crate::types::{FormattingError, Turn};
use serde::{Deserialize, Serialize};

/// Delimiters wrapped around each part of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMarkers {
    pub inst_begin: String,
    pub inst_end: String,
    pub sys_begin: String,
    pub sys_end: String,
    pub turn_end: String,
}

impl PromptMarkers {
    /// Llama 2 chat markers
    pub fn llama2() -> Self {
        Self {
            inst_begin: "[INST]".to_string(),
            inst_end: "[/INST]".to_string(),
            sys_begin: "<<SYS>>\n".to_string(),
            sys_end: "\n<</SYS>>\n\n".to_string(),
            turn_end: "</s><s>".to_string(),
        }
    }
}

impl Default for PromptMarkers {
    fn default() -> Self {
        Self::llama2()
    }
}

/// Linearizes a conversation into a single instruction prompt.
#[derive(Debug, Clone, Default)]
pub struct ChatTemplate {
    markers: PromptMarkers,
}

impl ChatTemplate {
    pub fn new(markers: PromptMarkers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &PromptMarkers {
        &self.markers
    }

    /// Build the prompt for `message` given prior turns.
    ///
    /// The prompt ends with an open instruction so the model continues with
    /// the assistant reply. Every text field is trimmed before insertion.
    pub fn format(
        &self,
        history: &[Turn],
        message: &str,
        system_directive: &str,
    ) -> Result<String, FormattingError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(FormattingError::EmptyMessage);
        }

        let m = &self.markers;
        let mut prompt = format!(
            "{} {}{}{} ",
            m.inst_begin,
            m.sys_begin,
            system_directive.trim(),
            m.sys_end
        );

        for turn in history {
            prompt.push_str(&format!(
                "{} {} {} {} {} ",
                turn.user_message.trim(),
                m.inst_end,
                turn.assistant_message.trim(),
                m.turn_end,
                m.inst_begin
            ));
        }

        prompt.push_str(&format!("{} {} ", message, m.inst_end));
        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history() {
        let template = ChatTemplate::default();
        let prompt = template.format(&[], "Hello", "Be nice.").unwrap();
        assert_eq!(prompt, "[INST] <<SYS>>\nBe nice.\n<</SYS>>\n\n Hello [/INST] ");
    }

    #[test]
    fn test_two_turns_in_order() {
        let template = ChatTemplate::default();
        let history = vec![
            Turn::new("Hi", "Hello!"),
            Turn::new("How are you?", "Good."),
        ];
        let prompt = template.format(&history, "Bye", "Be nice.").unwrap();
        assert_eq!(
            prompt,
            "[INST] <<SYS>>\nBe nice.\n<</SYS>>\n\n \
             Hi [/INST] Hello! </s><s> [INST] \
             How are you? [/INST] Good. </s><s> [INST] \
             Bye [/INST] "
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let template = ChatTemplate::default();
        let history = vec![Turn::new("  Hi\n", "\tHello!  ")];
        let prompt = template.format(&history, "\n Bye  ", "  Be nice. \n").unwrap();
        let expected = template
            .format(&[Turn::new("Hi", "Hello!")], "Bye", "Be nice.")
            .unwrap();
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_format_is_idempotent() {
        let template = ChatTemplate::default();
        let history = vec![Turn::new("Hi", "Hello!")];
        let first = template.format(&history, "Again", "sys").unwrap();
        let second = template.format(&history, "Again", "sys").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_blank_message() {
        let template = ChatTemplate::default();
        assert_eq!(
            template.format(&[], "   \n", "sys"),
            Err(FormattingError::EmptyMessage)
        );
    }

    #[test]
    fn test_custom_markers() {
        let template = ChatTemplate::new(PromptMarkers {
            inst_begin: "<u>".to_string(),
            inst_end: "</u>".to_string(),
            sys_begin: "<sys>".to_string(),
            sys_end: "</sys>".to_string(),
            turn_end: "<eot>".to_string(),
        });
        let prompt = template
            .format(&[Turn::new("a", "b")], "c", "s")
            .unwrap();
        assert_eq!(prompt, "<u> <sys>s</sys> a </u> b <eot> <u> c </u> ");
    }
}
