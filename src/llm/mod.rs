//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock），以及按需构造的共享客户端

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::{Arc, OnceLock};

pub use deepseek::{create_deepseek_client, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{CompletionRequest, LlmClient, LlmError, TokenStream};

use crate::config::LlmSection;

type ClientFactory = Box<dyn Fn() -> Arc<dyn LlmClient> + Send + Sync>;

/// 首次使用时构造、之后复用的 LLM 客户端；构造后只读，可被并发调用共享
pub struct LazyLlmClient {
    cell: OnceLock<Arc<dyn LlmClient>>,
    factory: ClientFactory,
}

impl LazyLlmClient {
    pub fn new(factory: impl Fn() -> Arc<dyn LlmClient> + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceLock::new(),
            factory: Box::new(factory),
        }
    }

    /// 已构造好的客户端（测试注入 Mock 时使用）
    pub fn ready(client: Arc<dyn LlmClient>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Arc::clone(&client));
        Self {
            cell,
            factory: Box::new(move || Arc::clone(&client)),
        }
    }

    /// 根据 [llm] 配置延迟构造对应后端
    pub fn from_config(section: &LlmSection) -> Self {
        let section = section.clone();
        Self::new(move || create_client(&section))
    }

    pub fn get(&self) -> Arc<dyn LlmClient> {
        Arc::clone(self.cell.get_or_init(|| (self.factory)()))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// 按 provider 创建客户端；未知 provider 回退到 OpenAI 兼容客户端
pub fn create_client(section: &LlmSection) -> Arc<dyn LlmClient> {
    tracing::info!(provider = %section.provider, model = %section.model, "creating llm client");
    match section.provider.as_str() {
        "deepseek" => Arc::new(create_deepseek_client(
            section.base_url.as_deref(),
            section.api_key.as_deref(),
        )),
        "mock" => Arc::new(MockLlmClient::default()),
        "openai" => Arc::new(OpenAiClient::new(
            section.base_url.as_deref(),
            section.api_key.as_deref(),
        )),
        other => {
            tracing::warn!(provider = %other, "unknown llm provider, using openai-compatible client");
            Arc::new(OpenAiClient::new(
                section.base_url.as_deref(),
                section.api_key.as_deref(),
            ))
        }
    }
}
