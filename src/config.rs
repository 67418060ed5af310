//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SKILLTREE__*` 覆盖（双下划线表示嵌套，如 `SKILLTREE__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub context: ContextSection,
    pub tools: ToolsSection,
}

/// [llm] 段：后端选择、默认生成参数与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次模型调用（含流式全过程）的截止时间（秒）
    #[serde(default = "default_request_timeout")]
    pub request_secs: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [context] 段：上下文最小化参数
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    /// 注入 prompt 的最近对话条数
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    #[serde(default)]
    pub search: SearchSection,
}

/// [tools.search] 段：Tavily 搜索；api_key 缺失时搜索降级为「无数据」
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    pub api_key: Option<String>,
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_base_url(),
            timeout_secs: default_search_timeout_secs(),
            max_results: default_max_results(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_search_timeout_secs() -> u64 {
    8
}

fn default_max_results() -> usize {
    5
}

fn default_max_result_chars() -> usize {
    600
}

impl SearchSection {
    /// api_key 优先取配置，其次取环境变量 TAVILY_API_KEY
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("TAVILY_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 从 config 目录加载配置，环境变量 SKILLTREE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SKILLTREE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SKILLTREE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.timeouts.request_secs, 60);
        assert_eq!(cfg.context.history_limit, 10);
        assert_eq!(cfg.tools.search.max_results, 5);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"mock\"\nmodel = \"test-model\"\n\n[llm.timeouts]\nrequest_secs = 5\n\n[context]\nhistory_limit = 4\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.model, "test-model");
        assert_eq!(cfg.llm.timeouts.request_secs, 5);
        assert_eq!(cfg.context.history_limit, 4);
        assert_eq!(cfg.tools.search.timeout_secs, 8);
    }
}
