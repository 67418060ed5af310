//! 工具层：注册表、参数校验与具体工具（web-search / graph-ops）

pub mod graph_ops;
pub mod registry;
pub mod schema;
pub mod web_search;

pub use graph_ops::{GraphApplication, GraphOpsTool, GRAPH_OPS_TOOL_ID};
pub use registry::{Tool, ToolRegistry};
pub use web_search::{
    SearchHit, SearchProvider, TavilyProvider, WebSearchTool, NO_SEARCH_DATA, WEB_SEARCH_TOOL_ID,
};

use crate::config::AppConfig;

/// 默认工具集：web-search（按配置延迟构造搜索客户端）+ graph-ops
pub fn default_tool_registry(config: &AppConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(WebSearchTool::from_config(&config.tools.search));
    tools.register(GraphOpsTool);
    tools
}
