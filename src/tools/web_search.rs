//! Web 搜索工具：封装外部搜索服务（Tavily），结果格式化为可直接嵌入 prompt 的文本
//!
//! 搜索后端缺失（未配置 API Key）、超时或出错时都不会向上抛错，
//! 而是降级为「无搜索数据」文本，只削弱 prompt 质量，不让整次调用失败。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SearchSection;
use crate::error::ToolError;
use crate::tools::schema::{check_params, parameters_schema, parse_params};
use crate::tools::Tool;

pub const WEB_SEARCH_TOOL_ID: &str = "web-search";

/// 搜索不可用时嵌入 prompt 的占位文本
pub const NO_SEARCH_DATA: &str =
    "No live web search data is available. Rely on your own up-to-date knowledge.";

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// 搜索服务抽象：query -> 排序后的结果
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, String>;
}

/// Tavily 搜索 API
pub struct TavilyProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skilltree/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, String> {
        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": max_results,
                "search_depth": "basic",
                "include_answer": false,
            }))
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        Ok(body.results)
    }
}

/// web-search 工具参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct WebSearchParams {
    /// 查询词；mode 为 trending / resources 时分别是领域名和技能名
    query: String,
    /// general（默认）/ trending / resources
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
}

/// Web 搜索工具：搜索客户端首次使用时构造，之后复用
pub struct WebSearchTool {
    provider: OnceLock<Option<Arc<dyn SearchProvider>>>,
    section: SearchSection,
}

impl WebSearchTool {
    /// 按配置延迟构造 Tavily 客户端；无 API Key 时工具始终降级
    pub fn from_config(section: &SearchSection) -> Self {
        Self {
            provider: OnceLock::new(),
            section: section.clone(),
        }
    }

    pub fn with_provider(provider: Arc<dyn SearchProvider>, section: &SearchSection) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(provider));
        Self {
            provider: cell,
            section: section.clone(),
        }
    }

    /// 没有搜索后端的工具（用于测试或显式关闭搜索）
    pub fn unavailable() -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(None);
        Self {
            provider: cell,
            section: SearchSection::default(),
        }
    }

    fn provider(&self) -> Option<Arc<dyn SearchProvider>> {
        self.provider
            .get_or_init(|| match self.section.resolved_api_key() {
                Some(key) => Some(Arc::new(TavilyProvider::new(
                    key,
                    self.section.base_url.clone(),
                    self.section.timeout(),
                )) as Arc<dyn SearchProvider>),
                None => {
                    tracing::warn!("web search api key not configured, search results disabled");
                    None
                }
            })
            .clone()
    }

    /// 原始搜索；后端缺失或超时返回 Unavailable
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        let provider = self
            .provider()
            .ok_or_else(|| ToolError::Unavailable(WEB_SEARCH_TOOL_ID.to_string()))?;

        match tokio::time::timeout(self.section.timeout(), provider.search(query, max_results)).await {
            Ok(Ok(hits)) => Ok(hits),
            Ok(Err(detail)) => Err(ToolError::Failed {
                tool: WEB_SEARCH_TOOL_ID.to_string(),
                detail,
            }),
            Err(_) => Err(ToolError::Unavailable(WEB_SEARCH_TOOL_ID.to_string())),
        }
    }

    /// 搜索并格式化；任何失败都降级为 NO_SEARCH_DATA
    pub async fn search_text(&self, query: &str, max_results: usize) -> (String, Vec<SearchHit>) {
        match self.search(query, max_results).await {
            Ok(hits) if !hits.is_empty() => {
                let text = format_results(query, &hits, self.section.max_result_chars);
                (text, hits)
            }
            Ok(_) => (NO_SEARCH_DATA.to_string(), Vec::new()),
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "web search degraded");
                (NO_SEARCH_DATA.to_string(), Vec::new())
            }
        }
    }

    /// 某领域的热门技术
    pub async fn search_trending(&self, field: &str) -> String {
        self.search_text(&trending_query(field), self.section.max_results)
            .await
            .0
    }

    /// 某技能的学习资源
    pub async fn search_resources(&self, skill: &str) -> String {
        self.search_text(&resources_query(skill), self.section.max_results)
            .await
            .0
    }
}

pub fn trending_query(field: &str) -> String {
    format!("latest trending technologies, tools and skills for {field} in demand this year")
}

pub fn resources_query(skill: &str) -> String {
    format!("best tutorials, courses, documentation and books to learn {skill}")
}

/// 格式化为编号列表；每条摘要截断到 max_chars 个字符
pub fn format_results(query: &str, hits: &[SearchHit], max_chars: usize) -> String {
    let mut out = format!("Web search results for \"{}\":\n", query);
    for (i, hit) in hits.iter().enumerate() {
        let snippet = hit.content.trim();
        let snippet = if snippet.chars().count() > max_chars {
            format!("{}...", snippet.chars().take(max_chars).collect::<String>())
        } else {
            snippet.to_string()
        };
        out.push_str(&format!(
            "\n[{}] {}\nURL: {}\n{}\n",
            i + 1,
            hit.title.trim(),
            hit.url.trim(),
            snippet
        ));
    }
    out
}

#[async_trait]
impl Tool for WebSearchTool {
    fn id(&self) -> &str {
        WEB_SEARCH_TOOL_ID
    }

    fn description(&self) -> &str {
        "Search the web and return results formatted for prompt embedding. Params: {\"query\": \"...\", \"mode\": \"general\"|\"trending\"|\"resources\", \"maxResults\": 5}"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(parameters_schema::<WebSearchParams>())
    }

    fn validate_params(&self, params: &Value) -> Result<(), String> {
        check_params::<WebSearchParams>(params)
    }

    /// 始终返回 Ok：`available=false` 时 text 为占位文本
    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: WebSearchParams = parse_params(WEB_SEARCH_TOOL_ID, params)?;

        let query = match params.mode.as_deref().unwrap_or("general") {
            "trending" => trending_query(&params.query),
            "resources" => resources_query(&params.query),
            _ => params.query.clone(),
        };
        let max_results = params.max_results.unwrap_or(self.section.max_results).max(1);

        tracing::info!(query = %query, "web search");
        let (text, hits) = self.search_text(&query, max_results).await;
        Ok(serde_json::json!({
            "available": !hits.is_empty(),
            "text": text,
            "results": hits,
        }))
    }
}
