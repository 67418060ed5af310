//! SkillTree - 技能树对话引擎
//!
//! 把一条聊天消息路由到某个技能（扩展技能树、热门技术、学习资源、通用对话），
//! 为该技能裁剪最小上下文，按需预先调用工具（联网搜索），调用 LLM 并按 schema 校验结构化响应。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **context**: 完整上下文 / 最小上下文与上下文构造器
//! - **engine**: 执行引擎（缓冲 / 流式）
//! - **error**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **skills**: 技能定义、路由、响应 schema 与内置技能
//! - **tools**: 工具注册表与工具（web-search、graph-ops）

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod llm;
pub mod observability;
pub mod skills;
pub mod tools;

pub use context::{FullContext, SkillContext};
pub use engine::{EngineConfig, ExecuteOptions, SkillEngine, SkillEvent};
pub use error::{SkillError, ToolError};
pub use skills::{MatchType, SkillDefinition, SkillResult, SkillRouter};
