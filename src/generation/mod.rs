// Answer generation
// Grounded prompt construction and the Ollama chat call


use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{GenerationConfig, OllamaConfig};
use crate::embeddings::{Chunk, OllamaClient};
use crate::{LoreError, Result};

/// Fixed instruction sent with every question
pub const SYSTEM_DIRECTIVE: &str = "You are an expert Dungeons and Dragons assistant. \
Use provided context to answer consistently, prioritizing campaign lore. \
Answer ONLY using the provided context. If the answer is not present in the context, \
reply strictly with \"I don't know\" and do NOT make up information. Example:\n\
Context: [empty]\nQuestion: Who is the king?\nAnswer: I don't know";

/// Returned without consulting the model when retrieval finds nothing
pub const NO_GROUNDED_ANSWER: &str =
    "I don't know. None of your notes matched this question closely enough to answer it.";

const ANSWER_INSTRUCTION: &str = "Provide a detailed response only based on the context. \
Answer ONLY using the provided context. If the answer is not present in the context, \
let the user know truthfully.";

/// Writes an answer from retrieved chunks
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, question: &str, context: &[Chunk]) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Index text of every chunk, separated by blank lines
#[inline]
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(Chunk::index_text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The system directive followed by the question with its context
#[inline]
pub fn build_messages(question: &str, chunks: &[Chunk]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_DIRECTIVE),
        ChatMessage::user(format!(
            "Context:\n{}\n\nQuestion: {}\n\n{}",
            format_context(chunks),
            question,
            ANSWER_INSTRUCTION
        )),
    ]
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// [`AnswerGenerator`] backed by Ollama's `/api/chat`
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(ollama: &OllamaConfig, generation: &GenerationConfig) -> anyhow::Result<Self> {
        let client = OllamaClient::new(ollama)
            .context("Failed to create Ollama client for generation")?
            .with_model(generation.model.clone())
            .with_timeout(Duration::from_secs(generation.timeout_seconds));

        Ok(Self {
            client,
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        self.client.model()
    }

    fn chat(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: self.client.model(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Requesting answer from {} ({} bytes of prompt)",
            self.client.model(),
            request_json.len()
        );

        let response_text = self
            .client
            .post_json("/api/chat", &request_json)
            .context("Failed to generate answer")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let answer = response.message.content.trim().to_string();
        if answer.is_empty() {
            anyhow::bail!("Model returned an empty answer");
        }

        Ok(answer)
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    async fn answer(&self, question: &str, context: &[Chunk]) -> Result<String> {
        let generator = self.clone();
        let messages = build_messages(question, context);

        tokio::task::spawn_blocking(move || generator.chat(&messages))
            .await
            .map_err(|e| LoreError::Generation(format!("Generation task failed: {}", e)))?
            .map_err(|e| LoreError::Generation(format!("{:#}", e)))
    }
}
