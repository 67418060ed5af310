//! 技能系统
//!
//! 技能（Skill）是一条纯数据记录：路由信息（斜杠命令 / 别名 / 意图正则）、上下文需求、
//! 可用工具、系统提示词、响应 schema，以及可选的 preExecute / postProcess 钩子。
//! 新增技能只需向注册表追加一条定义，引擎本身不需要改动。
//!
//! - **definition**: SkillDefinition 与钩子类型
//! - **router**: 斜杠命令 > 意图 > 兜底 的路由
//! - **schemas**: 模型响应的结构化类型与最终 SkillResult
//! - **builtin**: 内置技能（expand / trending / resources / chat）

pub mod builtin;
mod definition;
mod router;
mod schemas;

pub use builtin::{builtin_skills, default_router};
pub use definition::{
    ContextRequirements, CustomContextBuilder, DynamicPrompt, PostProcessHook, PreExecuteHook,
    ResponseSchema, SkillDefinition, SystemPrompt,
};
pub use router::{MatchType, RouteResult, SkillRouter, SlashCommandInfo};
pub use schemas::{
    LearningResource, ModificationResponse, NodeUpdate, OptionalModificationResponse,
    ResourcesResponse, SkillModifications, SkillNodePatch, SkillResult, SourceCitation,
    TrendingResponse,
};
