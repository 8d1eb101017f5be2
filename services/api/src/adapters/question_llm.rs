//! services/api/src/adapters/question_llm.rs
//!
//! This module contains the adapters for the question-generating LLM.
//! Both implement the `QuestionService` port from the `core` crate: one
//! calls an OpenAI-compatible chat-completions endpoint with retries, the
//! other is a stub used when no credential is configured and in tests.

use std::future::Future;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use reading_companion_core::ports::{PortError, PortResult, QuestionService};

const GENERATE_SYSTEM_PROMPT: &str = "You are a thoughtful reading assistant helping users reflect more deeply on highlighted passages from books.
Your task is to generate a meaningful, open-ended question about the following passage that encourages the user to think critically and make connections.
The question should:
1. Be open-ended (not answerable with a plain yes or no).
2. Encourage deeper reflection on the concept.
3. Help the user connect the idea to their own experience or other knowledge.
4. Be clear and concise.
Return only the question text, nothing else. One sentence only.";

const REGENERATE_SYSTEM_PROMPT: &str = "You are a thoughtful reading assistant helping users reflect more deeply on highlighted passages from books.
Your task is to generate an alternative question about the following passage. The user was not satisfied with the previous question and wants a different angle.
Generate a new question that:
1. Is open-ended (not answerable with a plain yes or no).
2. Offers a materially different angle or perspective than the previous question.
3. Encourages deeper reflection on the concept.
4. Helps the user connect the idea to their own experience or other knowledge.
5. Is clear and concise.
Return only the text of the new question, nothing else. One sentence only.";

/// Attempts per generation call, including the first.
const MAX_ATTEMPTS: u32 = 3;

//=========================================================================================
// Retry Helper
//=========================================================================================

/// Runs `call` up to [`MAX_ATTEMPTS`] times with linear backoff between
/// attempts (1s before the second, 2s before the third). Exhausting every
/// attempt yields `PortError::Unavailable` wrapping the last failure.
async fn with_retries<F, Fut>(mut call: F) -> PortResult<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortResult<String>>,
{
    let mut last_err = PortError::Unexpected("no attempts made".to_string());

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(Duration::from_secs(u64::from(attempt - 1))).await;
        }

        match call().await {
            Ok(content) => return Ok(content),
            Err(err) => last_err = err,
        }
    }

    Err(PortError::Unavailable(format!(
        "failed to get response after retries: {}",
        last_err
    )))
}

//=========================================================================================
// The Live Adapter
//=========================================================================================

/// An adapter that implements `QuestionService` against an OpenAI-compatible
/// chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiQuestionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
}

impl OpenAiQuestionAdapter {
    /// Creates a new `OpenAiQuestionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, max_tokens: u32) -> Self {
        Self {
            client,
            model,
            max_tokens,
        }
    }

    /// One chat-completion attempt. Transport failures, explicit API errors
    /// and empty choice lists all surface as errors so the retry loop can
    /// take over.
    async fn complete_chat(&self, system_prompt: &str, user_message: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // The first candidate's content is returned verbatim.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PortError::Unexpected("no choices in response".to_string()))
    }
}

#[async_trait]
impl QuestionService for OpenAiQuestionAdapter {
    async fn generate(&self, highlight_text: &str) -> PortResult<String> {
        let user_message = format!(
            "Generate a question for the following passage:\n\"{}\"",
            highlight_text
        );

        with_retries(|| self.complete_chat(GENERATE_SYSTEM_PROMPT, &user_message)).await
    }

    async fn regenerate(
        &self,
        highlight_text: &str,
        previous_question: &str,
    ) -> PortResult<String> {
        let user_message = format!(
            "Highlighted passage: \"{}\"\nPrevious question: \"{}\"\nGenerate an alternative question.",
            highlight_text, previous_question
        );

        with_retries(|| self.complete_chat(REGENERATE_SYSTEM_PROMPT, &user_message)).await
    }
}

//=========================================================================================
// The Stub Adapter
//=========================================================================================

/// A stub `QuestionService` that returns placeholder questions immediately.
/// Selected at wiring time when no LLM credential is configured.
pub struct StubQuestionAdapter;

#[async_trait]
impl QuestionService for StubQuestionAdapter {
    async fn generate(&self, _highlight_text: &str) -> PortResult<String> {
        Ok("What are your thoughts on this highlight?".to_string())
    }

    async fn regenerate(
        &self,
        _highlight_text: &str,
        _previous_question: &str,
    ) -> PortResult<String> {
        Ok("Can you elaborate on your understanding of this point?".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn retry_returns_the_first_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result = with_retries(move || {
            let counter = counter.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(PortError::Unexpected("connection reset".to_string()))
                } else {
                    Ok("Why does this matter?".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "Why does this matter?");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_three_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result = with_retries(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(PortError::Unexpected("connection reset".to_string()))
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        match result {
            Err(PortError::Unavailable(msg)) => {
                assert!(msg.contains("failed to get response after retries"));
                assert!(msg.contains("connection reset"));
            }
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn retry_does_not_sleep_before_the_first_attempt() {
        let start = tokio::time::Instant::now();
        let result = with_retries(|| async { Ok("immediate".to_string()) }).await;

        assert_eq!(result.unwrap(), "immediate");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stub_answers_instantly_with_placeholders() {
        let stub = StubQuestionAdapter;

        let question = stub.generate("some highlight").await.unwrap();
        assert_eq!(question, "What are your thoughts on this highlight?");

        let alternative = stub
            .regenerate("some highlight", &question)
            .await
            .unwrap();
        assert_eq!(
            alternative,
            "Can you elaborate on your understanding of this point?"
        );
    }
}
