//! 工具注册表
//!
//! 所有工具实现 Tool trait（id / description / parameters_schema / execute），由 ToolRegistry 按 id 注册与查找。
//! execute_tool 先按参数类型校验再委托执行，并输出一条结构化审计日志（JSON）。
//! 注册表在启动时构建一次，之后只读，可被并发调用共享。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// 工具 trait：技能只能通过 preExecute / postProcess 经注册表调用工具
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具 id（如 "web-search"）
    fn id(&self) -> &str;

    /// 工具描述
    fn description(&self) -> &str;

    /// 参数 JSON Schema（工具清单展示用）
    fn parameters_schema(&self) -> Option<Value> {
        None
    }

    /// 执行前的参数校验；默认不校验
    fn validate_params(&self, _params: &Value) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError>;
}

/// 工具注册表：按 id 存储 Arc<dyn Tool>
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let id = tool.id().to_string();
        if self.tools.insert(id.clone(), tool).is_some() {
            tracing::warn!(tool = %id, "tool registered twice, replacing previous");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    /// 校验参数后执行工具
    pub async fn execute_tool(&self, id: &str, params: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(id)
            .ok_or_else(|| ToolError::NotFound(id.to_string()))?;

        tool.validate_params(&params)
            .map_err(|detail| ToolError::InvalidParams {
                tool: id.to_string(),
                detail,
            })?;

        let start = Instant::now();
        let args_preview = args_preview(&params);
        let result = tool.execute(params).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::Unavailable(_)) => "unavailable",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        result
    }

    /// 只包含 `ids` 中工具的子注册表（技能 hook 只能看到自己声明的工具）
    pub fn scoped<S: AsRef<str>>(&self, ids: &[S]) -> ToolRegistry {
        let mut tools = HashMap::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            match self.tools.get(id) {
                Some(tool) => {
                    tools.insert(id.to_string(), Arc::clone(tool));
                }
                None => tracing::warn!(tool = %id, "declared tool is not registered"),
            }
        }
        ToolRegistry { tools }
    }

    /// 按字母序返回所有工具 id
    pub fn tool_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 返回 (id, description) 列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tool_ids()
            .into_iter()
            .filter_map(|id| {
                self.tools
                    .get(&id)
                    .map(|t| (id.clone(), t.description().to_string()))
            })
            .collect()
    }

    /// 工具清单 JSON（含参数 schema）
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tool_ids()
            .iter()
            .filter_map(|id| self.tools.get(id))
            .map(|tool| {
                serde_json::json!({
                    "id": tool.id(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema().unwrap_or(Value::Null),
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
