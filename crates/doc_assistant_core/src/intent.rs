//! crates/doc_assistant_core/src/intent.rs
//!
//! Maps a raw user utterance to one discrete intent tag using a single
//! constrained call to the generation engine, with a parse-and-validate
//! fallback to `chat` for anything the reply fails to name.

use std::sync::Arc;

use tracing::debug;

use crate::domain::Intent;
use crate::ports::{GenerationService, PortResult};

/// Conversation thread reserved for classification calls, isolated from the
/// user's content thread so classification never leaks into document context.
pub const CLASSIFIER_THREAD_ID: &str = "intent-classifier";

const CLASSIFIER_PROMPT: &str = r#"You are an intent classifier for a document assistant. Read the user's message and answer with EXACTLY ONE of the following intent labels, and nothing else:

- create_document: the user asks you to write a full document, report, or similar deliverable from scratch.
- upload_document: the user is providing or describing a file they want ingested for later questions.
- generate_outline: the user wants an outline or structure for a document rather than the full text.
- select_section: the user is pointing at a specific part of the document they want to work on.
- suggest_section: the user wants you to propose which section to work on next.
- confirm_section: the user is confirming that the currently discussed section is the right one.
- edit_section: the user asks you to change, rewrite, or improve the currently selected section.
- continue_editing: the user wants another revision of the section you just edited.
- reject_change: the user declines the proposed change.
- accept_change: the user approves the proposed change and wants it applied.
- download_document: the user wants to download the document being worked on.
- export_document: the user wants the document delivered in a file format.
- chat: anything else, including general questions about the document's content.

Answer with a single lowercase label from the list. Do not explain.

USER MESSAGE:
{question}"#;

/// Classifies utterances through the generation engine.
///
/// Malformed model output never raises; the sole error-handling path for
/// unrecognized replies is the silent downgrade to [`Intent::Chat`].
pub struct IntentClassifier {
    engine: Arc<dyn GenerationService>,
}

impl IntentClassifier {
    pub fn new(engine: Arc<dyn GenerationService>) -> Self {
        Self { engine }
    }

    /// Resolves the utterance to an intent tag.
    ///
    /// Transport failures of the engine call propagate; content-level
    /// ambiguity does not.
    pub async fn classify(&self, utterance: &str) -> PortResult<Intent> {
        let prompt = CLASSIFIER_PROMPT.replace("{question}", utterance);
        let reply = self.engine.complete(CLASSIFIER_THREAD_ID, &prompt).await?;
        let intent = Intent::parse(&reply);
        debug!("Classified utterance as '{}' (raw reply: '{}')", intent.as_str(), reply.trim());
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GenerationRequest;
    use crate::ports::{PortError, TokenStream};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine stub that records the thread it was called on and replies with
    /// a canned string.
    struct CannedEngine {
        reply: String,
        seen_thread: Mutex<Option<String>>,
    }

    impl CannedEngine {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen_thread: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl GenerationService for CannedEngine {
        async fn complete(&self, thread_id: &str, _prompt: &str) -> PortResult<String> {
            *self.seen_thread.lock().unwrap() = Some(thread_id.to_string());
            Ok(self.reply.clone())
        }

        async fn stream(&self, _request: GenerationRequest) -> PortResult<TokenStream> {
            Err(PortError::Unexpected("not used in this test".to_string()))
        }
    }

    #[tokio::test]
    async fn classify_accepts_a_clean_label() {
        let engine = Arc::new(CannedEngine::new("create_document"));
        let classifier = IntentClassifier::new(engine.clone());

        let intent = classifier.classify("Write me a report").await.unwrap();
        assert_eq!(intent, Intent::CreateDocument);
        assert_eq!(
            engine.seen_thread.lock().unwrap().as_deref(),
            Some(CLASSIFIER_THREAD_ID)
        );
    }

    #[tokio::test]
    async fn classify_normalizes_noisy_labels() {
        let engine = Arc::new(CannedEngine::new("  Edit_Section.\n"));
        let classifier = IntentClassifier::new(engine);

        let intent = classifier.classify("make it shorter").await.unwrap();
        assert_eq!(intent, Intent::EditSection);
    }

    #[tokio::test]
    async fn classify_downgrades_unknown_labels_to_chat() {
        let engine = Arc::new(CannedEngine::new("I believe this is about editing"));
        let classifier = IntentClassifier::new(engine);

        let intent = classifier.classify("hmm").await.unwrap();
        assert_eq!(intent, Intent::Chat);
    }

    #[tokio::test]
    async fn classify_propagates_engine_transport_failures() {
        struct FailingEngine;

        #[async_trait]
        impl GenerationService for FailingEngine {
            async fn complete(&self, _thread_id: &str, _prompt: &str) -> PortResult<String> {
                Err(PortError::Unexpected("engine down".to_string()))
            }

            async fn stream(&self, _request: GenerationRequest) -> PortResult<TokenStream> {
                Err(PortError::Unexpected("engine down".to_string()))
            }
        }

        let classifier = IntentClassifier::new(Arc::new(FailingEngine));
        assert!(classifier.classify("anything").await.is_err());
    }
}
