//! 引擎错误类型
//!
//! 每次技能调用的终态失败都映射为 SkillError，调用方据此决定重试还是直接提示用户。
//! 本层不做任何重试或静默降级（工具层的 Unavailable 例外，由工具自身吞掉）。

use std::time::Duration;

use thiserror::Error;

/// 技能调用过程中可能出现的错误（路由配置、模型调用、超时、解析、校验）
#[derive(Error, Debug)]
pub enum SkillError {
    /// 未注册兜底技能或注册了多个；属于启动期配置错误
    #[error("Routing configuration error: {0}")]
    RoutingConfiguration(String),

    /// 模型调用失败（网络错误、空响应等非超时错误）
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("Model call timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// 调用方通过 CancellationToken 主动取消
    #[error("Invocation cancelled")]
    Cancelled,

    #[error("Response is not valid JSON: {0}")]
    ResponseParse(String),

    /// JSON 合法但不满足技能的响应 schema；detail 仅用于日志排查，不直接展示给用户
    #[error("Response for skill '{skill}' failed validation: {detail}")]
    ResponseValidation { skill: String, detail: String },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl SkillError {
    /// 失败发生在状态机的哪一步
    pub fn step(&self) -> &'static str {
        match self {
            SkillError::RoutingConfiguration(_) => "routing",
            SkillError::ModelInvocation(_) => "model_call",
            SkillError::Timeout { .. } => "model_call",
            SkillError::Cancelled => "model_call",
            SkillError::ResponseParse(_) => "parse",
            SkillError::ResponseValidation { .. } => "validation",
            SkillError::Tool(_) => "tool",
        }
    }

    /// 是否属于瞬时故障（调用方可选择重试）；解析/校验失败是模型质量问题，重试意义不大
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SkillError::Timeout { .. } | SkillError::ModelInvocation(_)
        )
    }
}

/// 工具层错误：注册表查找、参数校验、后端不可用、执行失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid params for tool '{tool}': {detail}")]
    InvalidParams { tool: String, detail: String },

    /// 软错误：后端缺失或不可达，调用方应降级而非失败
    #[error("Tool '{0}' is unavailable")]
    Unavailable(String),

    #[error("Tool '{tool}' failed: {detail}")]
    Failed { tool: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_steps_and_retryability() {
        let timeout = SkillError::Timeout {
            after: Duration::from_millis(50),
        };
        assert_eq!(timeout.step(), "model_call");
        assert!(timeout.is_retryable());
        assert!(timeout.to_string().contains("50ms"));

        let invalid = SkillError::ResponseValidation {
            skill: "expand".into(),
            detail: "missing field `message`".into(),
        };
        assert_eq!(invalid.step(), "validation");
        assert!(!invalid.is_retryable());
    }
}
