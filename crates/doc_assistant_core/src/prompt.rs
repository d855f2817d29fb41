//! crates/doc_assistant_core/src/prompt.rs
//!
//! Selects the system guidance for a classified intent and builds the
//! outbound prompt. This is a pure state-to-prompt mapping with a single
//! early-exit failure path (editing with nothing selected).

use crate::domain::{Intent, PendingEdit, SectionSelection};

/// Guide prepended for full-document generation. The marker contract here is
/// what the stream segmenter relies on.
const DOCUMENT_GUIDE: &str = r#"You are a document-writing assistant. When you produce the requested document, follow these rules exactly:

- Briefly introduce what you wrote in one or two conversational sentences.
- Then emit a line containing exactly three hyphens: ---
- Then emit the full document body as Markdown. Use at most two heading levels, bullet or numbered lists where they help, and **bold**, *italic*, or `code` emphasis where appropriate.
- Close the document with another line containing exactly three hyphens: ---
- Never place the three-hyphen marker inside the document body, and never split the marker line across your output.
- After the closing marker you may add a short closing remark.

USER REQUEST:
"#;

/// Guide used when the user asked to edit the currently selected section.
const EDIT_GUIDE: &str = r#"You are editing one section of the user's document. The section currently reads:

{original}

The user asked for this change:

{request}

Explain the change you are making in one or two sentences. Then emit a line containing exactly three hyphens: ---
Then emit ONLY the revised section content, nothing else. Close with another line containing exactly three hyphens: ---
Do not repeat the rest of the document and do not split the marker line across your output."#;

/// Longer interactive guide used when an explicit content span accompanies
/// the request.
const SECTION_GUIDE: &str = r#"You are an interactive document-editing assistant. The user has highlighted a span of their document and will discuss it with you. Follow these rules:

- Section selection: treat the highlighted content below as the section under discussion until the user selects something else.
- Editing: when the user asks for a change, describe the change briefly before showing revised text, and wait for them to accept or reject it before treating it as final.
- Confirmation: an accepted change replaces the highlighted content; a rejected change leaves it untouched and the selection stays active.
- Formatting: preserve the Markdown structure of the highlighted content (headings, lists, emphasis) unless the user asks otherwise.
- State: only one change can be pending at a time; do not stack proposals.

HIGHLIGHTED CONTENT:
{content}

USER MESSAGE:
"#;

/// Terminal reply when an edit intent arrives with nothing selected.
pub const SELECT_SECTION_FIRST_MESSAGE: &str =
    "Please select a section of the document first, then ask me to edit it.";

/// A fully composed prompt plus the marker-close behavior flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub text: String,
    /// Marker-close stages the buffered body as the proposed edit.
    pub edit_flag: bool,
    /// Marker-close materializes the buffered body into a file.
    pub download_flag: bool,
}

/// Outcome of composition: a prompt for the engine, or a terminal
/// user-visible message that replaces the whole generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composed {
    Prompt(ComposedPrompt),
    ShortCircuit(String),
}

/// Builds the outbound prompt for an intent, in priority order:
/// document-producing intents, then edit intents (which require a selected
/// section), then requests carrying an explicit span, then plain chat.
pub fn compose(
    intent: Intent,
    question: &str,
    pending: Option<&PendingEdit>,
    selection: Option<&SectionSelection>,
) -> Composed {
    match intent {
        Intent::CreateDocument | Intent::DownloadDocument | Intent::ExportDocument => {
            Composed::Prompt(ComposedPrompt {
                text: format!("{DOCUMENT_GUIDE}{question}"),
                edit_flag: false,
                download_flag: true,
            })
        }
        Intent::EditSection | Intent::ContinueEditing => {
            let selected = pending
                .map(|edit| edit.selected_content.as_str())
                .filter(|content| !content.trim().is_empty());
            match selected {
                Some(original) => Composed::Prompt(ComposedPrompt {
                    text: EDIT_GUIDE
                        .replace("{original}", original)
                        .replace("{request}", question),
                    edit_flag: true,
                    download_flag: false,
                }),
                None => Composed::ShortCircuit(SELECT_SECTION_FIRST_MESSAGE.to_string()),
            }
        }
        _ => match selection {
            Some(span) => Composed::Prompt(ComposedPrompt {
                text: format!(
                    "{}{}",
                    SECTION_GUIDE.replace("{content}", &span.content),
                    question
                ),
                edit_flag: false,
                download_flag: false,
            }),
            None => Composed::Prompt(ComposedPrompt {
                text: question.to_string(),
                edit_flag: false,
                download_flag: false,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_with(selected: &str) -> PendingEdit {
        PendingEdit::new(selected.to_string(), None, None)
    }

    fn selection(content: &str) -> SectionSelection {
        SectionSelection {
            start: 10,
            end: 10 + content.len(),
            content: content.to_string(),
        }
    }

    #[test]
    fn document_intents_get_the_document_guide_and_download_flag() {
        for intent in [
            Intent::CreateDocument,
            Intent::DownloadDocument,
            Intent::ExportDocument,
        ] {
            let composed = compose(intent, "Write an onboarding outline", None, None);
            match composed {
                Composed::Prompt(prompt) => {
                    assert!(prompt.download_flag);
                    assert!(!prompt.edit_flag);
                    assert!(prompt.text.contains("exactly three hyphens"));
                    assert!(prompt.text.ends_with("Write an onboarding outline"));
                }
                Composed::ShortCircuit(_) => panic!("expected a prompt"),
            }
        }
    }

    #[test]
    fn edit_intent_requires_a_selected_section() {
        let composed = compose(Intent::EditSection, "make it formal", None, None);
        assert_eq!(
            composed,
            Composed::ShortCircuit(SELECT_SECTION_FIRST_MESSAGE.to_string())
        );

        // An empty selection is as good as none.
        let empty = pending_with("   ");
        let composed = compose(Intent::ContinueEditing, "again", Some(&empty), None);
        assert_eq!(
            composed,
            Composed::ShortCircuit(SELECT_SECTION_FIRST_MESSAGE.to_string())
        );
    }

    #[test]
    fn edit_intent_embeds_the_original_and_the_request() {
        let pending = pending_with("## Old heading\nOld body.");
        let composed = compose(Intent::EditSection, "make it formal", Some(&pending), None);
        match composed {
            Composed::Prompt(prompt) => {
                assert!(prompt.edit_flag);
                assert!(!prompt.download_flag);
                assert!(prompt.text.contains("## Old heading"));
                assert!(prompt.text.contains("make it formal"));
            }
            Composed::ShortCircuit(_) => panic!("expected a prompt"),
        }
    }

    #[test]
    fn edit_intent_outranks_an_explicit_span() {
        let pending = pending_with("selected earlier");
        let span = selection("freshly highlighted");
        let composed = compose(Intent::EditSection, "shorten", Some(&pending), Some(&span));
        match composed {
            Composed::Prompt(prompt) => {
                assert!(prompt.edit_flag);
                assert!(prompt.text.contains("selected earlier"));
            }
            Composed::ShortCircuit(_) => panic!("expected a prompt"),
        }
    }

    #[test]
    fn explicit_span_gets_the_interactive_guide() {
        let span = selection("The highlighted paragraph.");
        let composed = compose(Intent::SelectSection, "what about this part?", None, Some(&span));
        match composed {
            Composed::Prompt(prompt) => {
                assert!(!prompt.edit_flag);
                assert!(!prompt.download_flag);
                assert!(prompt.text.contains("The highlighted paragraph."));
                assert!(prompt.text.ends_with("what about this part?"));
            }
            Composed::ShortCircuit(_) => panic!("expected a prompt"),
        }
    }

    #[test]
    fn plain_chat_passes_the_question_through_unmodified() {
        let composed = compose(Intent::Chat, "what is this document about?", None, None);
        assert_eq!(
            composed,
            Composed::Prompt(ComposedPrompt {
                text: "what is this document about?".to_string(),
                edit_flag: false,
                download_flag: false,
            })
        );
    }
}
