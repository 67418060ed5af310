//! 技能定义
//!
//! 技能是一条声明式记录（数据 + 纯函数），启动时构造一次、之后只读。
//! Router 与 Engine 只依赖这里的字段，新增技能只需再注册一条记录，无需改动分发逻辑。

use std::sync::Arc;

use futures_util::future::BoxFuture;
use regex::Regex;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::{FullContext, SkillContext};
use crate::error::SkillError;
use crate::skills::SkillResult;
use crate::tools::ToolRegistry;

/// 自定义上下文构造器。
///
/// **完全替代**默认裁剪策略（不与声明的 flags 合并）：输出的每个字段都由构造器自己负责。
pub type CustomContextBuilder = fn(&FullContext) -> SkillContext;

/// 由最小上下文渲染系统提示词
pub type DynamicPrompt = fn(&SkillContext) -> String;

/// 构造 prompt 前执行的异步 hook（如联网搜索），可向 custom_data 追加数据
pub type PreExecuteHook = fn(SkillContext, Arc<ToolRegistry>) -> BoxFuture<'static, SkillContext>;

/// 将校验后的响应对象整形为调用方结果
pub type PostProcessHook = fn(Value, &SkillContext) -> Result<SkillResult, SkillError>;

/// 上下文需求：哪些字段需要注入 prompt，以及技能列表的条数上限
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextRequirements {
    pub needs_career_info: bool,
    pub needs_skill_list: bool,
    /// 0 表示不限制
    pub max_skills_in_context: usize,
    pub needs_chat_history: bool,
    pub needs_user_maps: bool,
    /// 把全部现有节点 id（不受列表上限截断）写入 custom_data 的 existingNodeIds
    pub needs_node_ids: bool,
    pub custom_builder: Option<CustomContextBuilder>,
}

/// 系统提示词：固定文本或由上下文渲染
#[derive(Debug, Clone)]
pub enum SystemPrompt {
    Static(String),
    Dynamic(DynamicPrompt),
}

impl SystemPrompt {
    pub fn render(&self, context: &SkillContext) -> String {
        match self {
            SystemPrompt::Static(text) => text.clone(),
            SystemPrompt::Dynamic(render) => render(context),
        }
    }
}

/// 响应 schema：以类型 `T` 描述模型 JSON 输出的结构
///
/// 校验即「反序列化为 T 再序列化回 JSON」，因此省略的可选字段会被规范化为默认值。
#[derive(Debug, Clone, Copy)]
pub struct ResponseSchema {
    name: &'static str,
    validate: fn(Value) -> Result<Value, String>,
    json_schema: fn() -> RootSchema,
}

impl ResponseSchema {
    pub fn of<T>(name: &'static str) -> Self
    where
        T: DeserializeOwned + Serialize + JsonSchema,
    {
        Self {
            name,
            validate: validate_as::<T>,
            json_schema: schema_of::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 校验并规范化；Err 为可读的违例描述
    pub fn validate(&self, value: Value) -> Result<Value, String> {
        (self.validate)(value)
    }

    pub fn json_schema(&self) -> RootSchema {
        (self.json_schema)()
    }

    /// 供 prompt 嵌入的 JSON Schema 文本
    pub fn describe(&self) -> String {
        serde_json::to_string_pretty(&self.json_schema()).unwrap_or_default()
    }
}

fn validate_as<T>(value: Value) -> Result<Value, String>
where
    T: DeserializeOwned + Serialize,
{
    if !value.is_object() {
        return Err(format!("expected a JSON object, got {}", json_kind(&value)));
    }
    let typed: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
    serde_json::to_value(typed).map_err(|e| e.to_string())
}

fn schema_of<T: JsonSchema>() -> RootSchema {
    schemars::schema_for!(T)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 技能定义
#[derive(Debug, Clone)]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    /// 同义词：可作为斜杠命令参与查找，不参与意图匹配
    pub aliases: Vec<String>,
    /// 如 "/expand"；None 表示只能被意图匹配或作为兜底
    pub slash_command: Option<String>,
    /// 按声明顺序匹配；为空表示兜底技能
    pub intent_patterns: Vec<Regex>,
    pub context: ContextRequirements,
    /// 允许 / 预期使用的工具 id
    pub tools: Vec<String>,
    pub system_prompt: SystemPrompt,
    pub response_schema: ResponseSchema,
    pub pre_execute: Option<PreExecuteHook>,
    pub post_process: Option<PostProcessHook>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl SkillDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: SystemPrompt,
        response_schema: ResponseSchema,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            aliases: Vec::new(),
            slash_command: None,
            intent_patterns: Vec::new(),
            context: ContextRequirements::default(),
            tools: Vec::new(),
            system_prompt,
            response_schema,
            pre_execute: None,
            post_process: None,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_slash_command(mut self, command: impl Into<String>) -> Self {
        self.slash_command = Some(command.into());
        self
    }

    /// 编译并追加意图模式；非法正则属于配置错误
    pub fn with_intent_patterns(mut self, patterns: &[&str]) -> Result<Self, SkillError> {
        for pattern in patterns {
            let re = Regex::new(pattern).map_err(|e| {
                SkillError::RoutingConfiguration(format!(
                    "invalid intent pattern for skill '{}': {}",
                    self.id, e
                ))
            })?;
            self.intent_patterns.push(re);
        }
        Ok(self)
    }

    pub fn with_context(mut self, context: ContextRequirements) -> Self {
        self.context = context;
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pre_execute(mut self, hook: PreExecuteHook) -> Self {
        self.pre_execute = Some(hook);
        self
    }

    pub fn with_post_process(mut self, hook: PostProcessHook) -> Self {
        self.post_process = Some(hook);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// 没有意图模式的技能即兜底技能
    pub fn is_fallback(&self) -> bool {
        self.intent_patterns.is_empty()
    }

    /// 斜杠命令去掉前导 `/` 后的小写 token
    pub fn command_token(&self) -> Option<String> {
        self.slash_command
            .as_deref()
            .map(|c| c.trim().trim_start_matches('/').to_lowercase())
            .filter(|c| !c.is_empty())
    }

    /// 用于日志 / UI 的单行摘要
    pub fn summary(&self) -> String {
        format!("[{}] {}: {}", self.id, self.name, self.description)
    }
}
