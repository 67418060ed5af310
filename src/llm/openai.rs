//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenAI、DeepSeek、自建代理等。
//! json_mode 时请求 `response_format = json_object`，流式时逐段返回 delta.content。

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, Role, TokenStream};

/// OpenAI 兼容客户端：持有 async_openai Client；模型名随请求传入（技能可覆盖）
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
        }
    }

    fn to_openai_messages(
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                let built = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                built.map_err(|e| LlmError::Request(e.to_string()))
            })
            .collect()
    }

    fn build_request(
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model)
            .messages(Self::to_openai_messages(&request.messages)?)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens)
            .stream(stream);
        if request.json_mode {
            args.response_format(ResponseFormat::JsonObject);
        }
        args.build().map_err(|e| LlmError::Request(e.to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let req = Self::build_request(request, false)?;

        let response = self
            .client
            .chat()
            .create(req)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                model = %request.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "llm usage"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        let req = Self::build_request(request, true)?;

        let stream = self
            .client
            .chat()
            .create_stream(req)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let tokens = stream.filter_map(|item| async move {
            match item {
                Ok(chunk) => chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(LlmError::Stream(e.to_string()))),
            }
        });

        Ok(Box::pin(tokens))
    }
}
