//! Mock LLM 客户端（用于测试与本地演示，无需 API）
//!
//! 按脚本返回：固定 JSON、分段流式输出，或永不返回（用于验证超时）。
//! 每次调用都会记录请求，便于断言消息拼装顺序与生成参数。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{CompletionRequest, LlmClient, LlmError, TokenStream};

#[derive(Debug, Clone)]
enum Script {
    /// 非流式返回整段；流式按原样一次性返回
    Respond(String),
    /// 流式依次返回各段；非流式返回拼接结果
    Chunks(Vec<String>),
    /// 永不返回
    Hang,
    Fail(String),
}

/// Mock 客户端
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    script: Script,
    chunk_delay: Duration,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::with_response(r#"{"message":"Mock response","isOffTopic":false}"#)
    }
}

impl MockLlmClient {
    fn scripted(script: Script) -> Self {
        Self {
            script,
            chunk_delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(json: impl Into<String>) -> Self {
        Self::scripted(Script::Respond(json.into()))
    }

    pub fn with_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(Script::Chunks(chunks.into_iter().map(Into::into).collect()))
    }

    pub fn hanging() -> Self {
        Self::scripted(Script::Hang)
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::scripted(Script::Fail(reason.into()))
    }

    /// 流式输出时每段之间的延迟
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &CompletionRequest) {
        if let Ok(mut r) = self.requests.lock() {
            r.push(request.clone());
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.record(request);
        match &self.script {
            Script::Respond(text) if text.is_empty() => Err(LlmError::EmptyResponse),
            Script::Respond(text) => Ok(text.clone()),
            Script::Chunks(chunks) => Ok(chunks.concat()),
            Script::Hang => std::future::pending().await,
            Script::Fail(reason) => Err(LlmError::Request(reason.clone())),
        }
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        self.record(request);
        let chunks = match &self.script {
            Script::Respond(text) => vec![text.clone()],
            Script::Chunks(chunks) => chunks.clone(),
            Script::Hang => return Ok(Box::pin(stream::pending())),
            Script::Fail(reason) => return Err(LlmError::Request(reason.clone())),
        };

        let delay = self.chunk_delay;
        let tokens = stream::unfold(chunks.into_iter(), move |mut rest| async move {
            let next = rest.next()?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Some((Ok(next), rest))
        });
        Ok(Box::pin(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use futures_util::StreamExt;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "mock".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: 16,
            json_mode: true,
        }
    }

    #[tokio::test]
    async fn test_chunks_stream_in_order_and_record_request() {
        let mock = MockLlmClient::with_chunks(["a", "b", "c"]);
        let stream = mock.complete_stream(&request()).await.unwrap();
        let parts: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(parts, vec!["a", "b", "c"]);
        assert_eq!(mock.complete(&request()).await.unwrap(), "abc");
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error() {
        let mock = MockLlmClient::with_response("");
        assert_eq!(
            mock.complete(&request()).await,
            Err(LlmError::EmptyResponse)
        );
    }
}
