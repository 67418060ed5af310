//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：complete（非流式，返回完整 JSON 文本）、
//! complete_stream（流式 Token）。取消语义依赖 future / stream 的 drop：超时或调用方放弃时
//! 直接丢弃返回值，底层 HTTP 请求随之中止。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::error::SkillError;
use crate::llm::Message;

/// Token 流：每项为一段增量文本
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// 模型调用错误（传输层）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("model returned no content")]
    EmptyResponse,

    #[error("stream error: {0}")]
    Stream(String),
}

impl From<LlmError> for SkillError {
    fn from(e: LlmError) -> Self {
        SkillError::ModelInvocation(e.to_string())
    }
}

/// 单次 Chat Completion 请求：模型、有序消息、生成参数、是否要求严格 JSON 对象输出
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_mode: bool,
}

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// 流式完成，返回 Token 流
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError>;
}
