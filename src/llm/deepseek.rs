//! DeepSeek API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com
//! - 支持 `response_format = json_object`，可直接作为技能执行后端

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DeepSeek 客户端
///
/// - API Key 优先级：参数 > `DEEPSEEK_API_KEY` > `OPENAI_API_KEY`
/// - base_url 未指定时使用官方端点
pub fn create_deepseek_client(base_url: Option<&str>, api_key: Option<&str>) -> OpenAiClient {
    let api_key = api_key
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());

    OpenAiClient::new(
        Some(base_url.unwrap_or(DEEPSEEK_BASE_URL)),
        api_key.as_deref(),
    )
}
