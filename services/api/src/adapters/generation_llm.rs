//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the generation engine. It implements
//! the `GenerationService` port from the `core` crate over OpenAI chat
//! completions: a non-streaming entry point for constrained calls and a
//! streaming entry point that drives the retrieval tool loop, tags tokens
//! with their source node, and maintains per-thread conversation memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequestArgs, FinishReason,
        FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{info, warn};

use doc_assistant_core::domain::{ChatTurn, EngineToken, GenerationRequest, SectionTag, TurnRole};
use doc_assistant_core::ports::{
    ConversationStore, GenerationService, PortError, PortResult, TokenStream, VectorSearchService,
};

/// Tool name the model uses to reach the vector index.
const SEARCH_TOOL_NAME: &str = "search_document";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM
/// with document retrieval exposed as a callable tool.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    vectors: Arc<dyn VectorSearchService>,
    conversations: Arc<dyn ConversationStore>,
    top_k: usize,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: String,
        vectors: Arc<dyn VectorSearchService>,
        conversations: Arc<dyn ConversationStore>,
        top_k: usize,
    ) -> Self {
        Self {
            client,
            model,
            vectors,
            conversations,
            top_k,
        }
    }
}

/// The retrieval tool definition: mirrors the structured search query the
/// engine is asked to emit (free-text query plus a section bucket).
fn search_tool() -> Result<ChatCompletionTool, OpenAIError> {
    Ok(ChatCompletionTool {
        function: FunctionObjectArgs::default()
                .name(SEARCH_TOOL_NAME)
                .description(
                    "Search the user's uploaded document for passages relevant to a query.",
                )
                .parameters(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query to run."
                        },
                        "section": {
                            "type": "string",
                            "enum": ["beginning", "middle", "end"],
                            "description": "Section of the document to query."
                        }
                    },
                    "required": ["query"]
                }))
                .build()?,
    })
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    section: Option<String>,
}

/// Executes one retrieval tool call and formats the passages for the model.
async fn run_search(
    vectors: &Arc<dyn VectorSearchService>,
    namespace: &str,
    top_k: usize,
    arguments_json: &str,
) -> PortResult<String> {
    let args: SearchArgs = serde_json::from_str(arguments_json)
        .map_err(|e| PortError::Unexpected(format!("Malformed search arguments: {e}")))?;
    let section = args.section.as_deref().and_then(section_from_arg);

    info!(
        "Retrieval tool call: query='{}', section={:?}",
        args.query,
        section.map(|s| s.as_str())
    );
    let passages = vectors.search(namespace, &args.query, section, top_k).await?;
    if passages.is_empty() {
        return Ok("No matching passages found.".to_string());
    }
    Ok(passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

/// Maps a tool-call section argument onto a tag; anything unexpected means
/// an unfiltered search.
fn section_from_arg(raw: &str) -> Option<SectionTag> {
    match raw {
        "beginning" => Some(SectionTag::Beginning),
        "middle" => Some(SectionTag::Middle),
        "end" => Some(SectionTag::End),
        _ => None,
    }
}

fn history_to_messages(history: &[ChatTurn]) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut messages = Vec::with_capacity(history.len());
    for turn in history {
        let message: ChatCompletionRequestMessage = match turn.role {
            TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.clone())
                .build()?
                .into(),
            TurnRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.clone())
                .build()?
                .into(),
        };
        messages.push(message);
    }
    Ok(messages)
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    /// Runs a single stateless completion (used for intent classification).
    async fn complete(&self, _thread_id: &str, prompt: &str) -> PortResult<String> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "Completion response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Completion returned no choices in its response.".to_string(),
            ))
        }
    }

    /// Streams a response, resolving retrieval tool calls as they complete.
    ///
    /// The user turn and the final assistant text are appended to the
    /// thread's memory after the stream drains; tool plumbing is not
    /// remembered.
    async fn stream(&self, request: GenerationRequest) -> PortResult<TokenStream> {
        let history = self.conversations.get(&request.thread_id).await?;
        let mut messages = history_to_messages(&history)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let client = self.client.clone();
        let model = self.model.clone();
        let vectors = self.vectors.clone();
        let conversations = self.conversations.clone();
        let top_k = self.top_k;
        let GenerationRequest {
            prompt, namespace, thread_id, ..
        } = request;

        Ok(Box::pin(stream! {
            let mut transcript = String::new();

            loop {
                let tool = match search_tool() {
                    Ok(tool) => tool,
                    Err(e) => {
                        yield Err(PortError::Unexpected(e.to_string()));
                        return;
                    }
                };
                let chat_request = match CreateChatCompletionRequestArgs::default()
                    .model(&model)
                    .messages(messages.clone())
                    .tools(vec![ChatCompletionTools::Function(tool)])
                    .build()
                {
                    Ok(chat_request) => chat_request,
                    Err(e) => {
                        yield Err(PortError::Unexpected(e.to_string()));
                        return;
                    }
                };

                let mut token_stream = match client.chat().create_stream(chat_request).await {
                    Ok(token_stream) => token_stream,
                    Err(e) => {
                        yield Err(PortError::Unexpected(e.to_string()));
                        return;
                    }
                };

                // Tool-call fragments accumulate per index until the round ends.
                let mut pending_calls: BTreeMap<_, (String, String, String)> = BTreeMap::new();
                let mut finish = None;

                while let Some(item) = token_stream.next().await {
                    let response = match item {
                        Ok(response) => response,
                        Err(e) => {
                            yield Err(PortError::Unexpected(e.to_string()));
                            return;
                        }
                    };
                    for choice in response.choices {
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() {
                                transcript.push_str(&content);
                                yield Ok(EngineToken::response(content));
                            }
                        }
                        if let Some(tool_calls) = choice.delta.tool_calls {
                            for chunk in tool_calls {
                                let entry = pending_calls.entry(chunk.index).or_default();
                                if let Some(id) = chunk.id {
                                    entry.0 = id;
                                }
                                if let Some(function) = chunk.function {
                                    if let Some(name) = function.name {
                                        entry.1.push_str(&name);
                                    }
                                    if let Some(arguments) = function.arguments {
                                        entry.2.push_str(&arguments);
                                        yield Ok(EngineToken::tool(arguments));
                                    }
                                }
                            }
                        }
                        if let Some(reason) = choice.finish_reason {
                            finish = Some(reason);
                        }
                    }
                }

                if finish != Some(FinishReason::ToolCalls) || pending_calls.is_empty() {
                    break;
                }

                // Echo the tool-call round back, resolve each call, and loop.
                let calls: Vec<ChatCompletionMessageToolCall> = pending_calls
                    .into_values()
                    .map(|(id, name, arguments)| ChatCompletionMessageToolCall {
                        id,
                        function: FunctionCall { name, arguments },
                    })
                    .collect();
                let assistant_message = match ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(
                        calls
                            .iter()
                            .cloned()
                            .map(ChatCompletionMessageToolCalls::Function)
                            .collect::<Vec<_>>(),
                    )
                    .build()
                {
                    Ok(message) => message,
                    Err(e) => {
                        yield Err(PortError::Unexpected(e.to_string()));
                        return;
                    }
                };
                messages.push(assistant_message.into());

                for call in calls {
                    let content =
                        match run_search(&vectors, &namespace, top_k, &call.function.arguments)
                            .await
                        {
                            Ok(content) => content,
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        };
                    let tool_message = match ChatCompletionRequestToolMessageArgs::default()
                        .content(content)
                        .tool_call_id(call.id.clone())
                        .build()
                    {
                        Ok(message) => message,
                        Err(e) => {
                            yield Err(PortError::Unexpected(e.to_string()));
                            return;
                        }
                    };
                    messages.push(tool_message.into());
                }
            }

            // Remember the exchange so the thread persists across turns.
            let mut turns = history;
            turns.push(ChatTurn::user(prompt));
            turns.push(ChatTurn::assistant(transcript));
            if let Err(e) = conversations.put(&thread_id, turns).await {
                warn!("Failed to persist conversation memory for '{}': {}", thread_id, e);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_assistant_core::domain::{IndexableChunk, Passage};
    use std::sync::Mutex;

    struct StubVectors {
        passages: Vec<Passage>,
        seen: Mutex<Vec<(String, String, Option<SectionTag>)>>,
    }

    #[async_trait]
    impl VectorSearchService for StubVectors {
        async fn upsert(&self, _namespace: &str, _chunks: &[IndexableChunk]) -> PortResult<()> {
            Ok(())
        }

        async fn search(
            &self,
            namespace: &str,
            query: &str,
            section: Option<SectionTag>,
            _top_k: usize,
        ) -> PortResult<Vec<Passage>> {
            self.seen
                .lock()
                .unwrap()
                .push((namespace.to_string(), query.to_string(), section));
            Ok(self.passages.clone())
        }
    }

    fn stub(passages: Vec<Passage>) -> Arc<dyn VectorSearchService> {
        Arc::new(StubVectors {
            passages,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn run_search_parses_arguments_and_joins_passages() {
        let vectors = stub(vec![
            Passage {
                text: "First passage.".to_string(),
                section: SectionTag::Beginning,
                score: 0.9,
            },
            Passage {
                text: "Second passage.".to_string(),
                section: SectionTag::Beginning,
                score: 0.7,
            },
        ]);

        let result = run_search(
            &vectors,
            "ns",
            4,
            r#"{"query": "onboarding", "section": "beginning"}"#,
        )
        .await
        .unwrap();

        assert_eq!(result, "First passage.\n\nSecond passage.");
    }

    #[tokio::test]
    async fn run_search_tolerates_a_missing_section() {
        let vectors = stub(Vec::new());
        let result = run_search(&vectors, "ns", 4, r#"{"query": "anything"}"#)
            .await
            .unwrap();
        assert_eq!(result, "No matching passages found.");
    }

    #[tokio::test]
    async fn run_search_rejects_malformed_arguments() {
        let vectors = stub(Vec::new());
        let result = run_search(&vectors, "ns", 4, "{not json").await;
        assert!(matches!(result, Err(PortError::Unexpected(_))));
    }

    #[test]
    fn section_arguments_map_onto_tags() {
        assert_eq!(section_from_arg("beginning"), Some(SectionTag::Beginning));
        assert_eq!(section_from_arg("middle"), Some(SectionTag::Middle));
        assert_eq!(section_from_arg("end"), Some(SectionTag::End));
        assert_eq!(section_from_arg("everywhere"), None);
    }

    #[test]
    fn search_tool_definition_builds() {
        let tool = search_tool().unwrap();
        assert_eq!(tool.function.name, SEARCH_TOOL_NAME);
    }
}
