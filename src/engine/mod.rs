//! 执行引擎：一次完整的技能调用
//!
//! 路由 → 构造最小上下文 → [preExecute] → 渲染系统提示词 → 调用模型（缓冲 / 流式）
//! → 解析 JSON → 按 schema 校验 → [postProcess] → SkillResult。
//!
//! 每次调用的状态都在局部变量中传递，引擎本身只持有启动后只读的路由表、工具注册表与客户端，
//! 因此可被多个会话并发调用。模型调用受截止时间与可选的 CancellationToken 约束，
//! 超时或取消时直接丢弃 in-flight future / stream，底层 HTTP 请求随之中止。
//! 本层不做重试，所有失败原样返回给调用方。

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, LlmSection};
use crate::context::{estimate_tokens, ContextBuilder, FullContext, SkillContext, ROUTE_PARAMS_KEY};
use crate::error::SkillError;
use crate::llm::{CompletionRequest, LazyLlmClient, LlmClient, Message};
use crate::skills::{
    default_router, RouteResult, SkillDefinition, SkillResult, SkillRouter, SlashCommandInfo,
};
use crate::tools::{default_tool_registry, ToolRegistry};

/// 引擎级默认值：技能未覆盖 model / temperature / max_tokens 时使用
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 单次模型调用的默认截止时间（可被 ExecuteOptions::timeout 覆盖）
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&LlmSection::default())
    }
}

impl From<&LlmSection> for EngineConfig {
    fn from(section: &LlmSection) -> Self {
        Self {
            default_model: section.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            timeout: Duration::from_secs(section.timeouts.request_secs),
        }
    }
}

/// 单次调用选项
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// 流式事件：增量文本仅供展示，最终结果只出现一次且位于最后
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillEvent {
    Chunk(String),
    Result(SkillResult),
}

/// 模型调用前已就绪的一次调用
struct Prepared {
    route: RouteResult,
    context: SkillContext,
    request: CompletionRequest,
}

/// 技能执行引擎（克隆开销为几个 Arc）
#[derive(Clone)]
pub struct SkillEngine {
    router: Arc<SkillRouter>,
    tools: Arc<ToolRegistry>,
    llm: Arc<LazyLlmClient>,
    context_builder: ContextBuilder,
    config: EngineConfig,
}

impl SkillEngine {
    pub fn new(
        router: SkillRouter,
        tools: ToolRegistry,
        llm: LazyLlmClient,
        config: EngineConfig,
    ) -> Self {
        Self {
            router: Arc::new(router),
            tools: Arc::new(tools),
            llm: Arc::new(llm),
            context_builder: ContextBuilder::default(),
            config,
        }
    }

    /// 内置技能 + 默认工具集 + 按 [llm] 配置延迟构造的客户端
    pub fn from_config(config: &AppConfig) -> Result<Self, SkillError> {
        let engine = Self::new(
            default_router()?,
            default_tool_registry(config),
            LazyLlmClient::from_config(&config.llm),
            EngineConfig::from(&config.llm),
        )
        .with_context_builder(ContextBuilder::new(config.context.history_limit));
        Ok(engine)
    }

    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        self.context_builder = builder;
        self
    }

    /// 替换模型客户端（测试注入 Mock）
    pub fn with_llm(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm = Arc::new(LazyLlmClient::ready(client));
        self
    }

    pub fn route(&self, message: &str) -> RouteResult {
        self.router.route(message)
    }

    /// 斜杠命令列表（UI 自动补全）
    pub fn list_commands(&self) -> Vec<SlashCommandInfo> {
        self.router.list_commands()
    }

    pub fn router(&self) -> &SkillRouter {
        &self.router
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 缓冲执行：等待完整响应后解析、校验并返回结果
    pub async fn execute(
        &self,
        message: &str,
        full: &FullContext,
        options: ExecuteOptions,
    ) -> Result<SkillResult, SkillError> {
        let started = std::time::Instant::now();
        let prepared = self.prepare(message, full).await;
        let after = options.timeout.unwrap_or(self.config.timeout);
        let cancel = options.cancel.unwrap_or_default();

        let client = self.llm.get();
        let outcome = guarded(
            client.complete(&prepared.request),
            deadline_after(after),
            after,
            &cancel,
        )
        .await
        .and_then(|raw| raw.map_err(SkillError::from))
        .and_then(|raw| finish(&prepared, &raw));

        log_outcome(&prepared, &outcome, started);
        outcome
    }

    /// 流式执行：每段增量文本立即作为 Chunk 产出，流结束后解析校验并产出唯一的 Result
    ///
    /// 超时或取消时产出对应错误后结束，不会再产出 Result。丢弃返回的流即放弃本次调用。
    pub fn execute_stream(
        &self,
        message: impl Into<String>,
        full: FullContext,
        options: ExecuteOptions,
    ) -> impl Stream<Item = Result<SkillEvent, SkillError>> + Send + 'static {
        let engine = self.clone();
        let message = message.into();

        try_stream! {
            let started = std::time::Instant::now();
            let prepared = engine.prepare(&message, &full).await;
            let after = options.timeout.unwrap_or(engine.config.timeout);
            let deadline = deadline_after(after);
            let cancel = options.cancel.unwrap_or_default();

            let client = engine.llm.get();
            let opened = guarded(client.complete_stream(&prepared.request), deadline, after, &cancel)
                .await
                .and_then(|s| s.map_err(SkillError::from));
            let mut tokens = match opened {
                Ok(tokens) => tokens,
                Err(e) => {
                    log_failure(&prepared, &e);
                    Err(e)?
                }
            };

            let mut buffer = String::new();
            loop {
                let next = guarded(tokens.next(), deadline, after, &cancel).await;
                let token = match next {
                    Ok(Some(Ok(token))) => token,
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        let e = SkillError::from(e);
                        log_failure(&prepared, &e);
                        Err(e)?
                    }
                    Err(e) => {
                        log_failure(&prepared, &e);
                        Err(e)?
                    }
                };
                buffer.push_str(&token);
                yield SkillEvent::Chunk(token);
            }

            let outcome = finish(&prepared, &buffer);
            log_outcome(&prepared, &outcome, started);
            yield SkillEvent::Result(outcome?);
        }
    }

    /// 路由、构造上下文、运行 preExecute、拼装模型请求；本地步骤，不会失败
    async fn prepare(&self, message: &str, full: &FullContext) -> Prepared {
        let route = self.router.route(message);
        let skill = Arc::clone(&route.skill);
        tracing::info!(skill = %skill.id, match_type = ?route.match_type, "message routed");

        let mut context = self.context_builder.build(&skill, full);
        if let Some(params) = &route.params {
            let params = params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            context
                .custom_data
                .insert(ROUTE_PARAMS_KEY.to_string(), Value::Object(params));
        }

        if let Some(hook) = skill.pre_execute {
            let declared = context.clone();
            let tools = Arc::new(self.tools.scoped(skill.tools.as_slice()));
            context = hook(context, tools).await;
            context.restore_declared_from(&declared);
        }

        let system_prompt = skill.system_prompt.render(&context);
        tracing::debug!(
            skill = %skill.id,
            estimated_tokens = estimate_tokens(&context),
            prompt_chars = system_prompt.len(),
            "prompt ready"
        );

        let request = self.build_request(&skill, &context, system_prompt, message);
        Prepared {
            route,
            context,
            request,
        }
    }

    /// 消息顺序：system，历史（原始时间顺序），最后是用户消息
    fn build_request(
        &self,
        skill: &SkillDefinition,
        context: &SkillContext,
        system_prompt: String,
        message: &str,
    ) -> CompletionRequest {
        let history = context.chat_history.as_deref().unwrap_or_default();
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(message));

        CompletionRequest {
            model: skill
                .model
                .clone()
                .unwrap_or_else(|| self.config.default_model.clone()),
            messages,
            temperature: skill.temperature.unwrap_or(self.config.temperature),
            max_tokens: skill.max_tokens.unwrap_or(self.config.max_tokens),
            json_mode: true,
        }
    }
}

/// 超时过大（如 `Duration::MAX`）时退化为约 30 年后的截止时间
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

/// 在截止时间与取消令牌的约束下等待 `fut`；两者任一触发即丢弃 `fut`
async fn guarded<F>(
    fut: F,
    deadline: Instant,
    after: Duration,
    cancel: &CancellationToken,
) -> Result<F::Output, SkillError>
where
    F: std::future::Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SkillError::Cancelled),
        res = tokio::time::timeout_at(deadline, fut) => res.map_err(|_| SkillError::Timeout { after }),
    }
}

/// 解析 → 校验 → postProcess，并标记结果来源
fn finish(prepared: &Prepared, raw: &str) -> Result<SkillResult, SkillError> {
    let skill = &prepared.route.skill;
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| SkillError::ResponseParse(e.to_string()))?;

    let validated =
        skill
            .response_schema
            .validate(value)
            .map_err(|detail| SkillError::ResponseValidation {
                skill: skill.id.clone(),
                detail,
            })?;

    let mut result = match skill.post_process {
        Some(hook) => hook(validated, &prepared.context)?,
        None => SkillResult::from_validated(validated).map_err(|e| {
            SkillError::ResponseValidation {
                skill: skill.id.clone(),
                detail: e.to_string(),
            }
        })?,
    };
    result.skill_id = skill.id.clone();
    result.match_type = Some(prepared.route.match_type);
    Ok(result)
}

fn log_outcome(
    prepared: &Prepared,
    outcome: &Result<SkillResult, SkillError>,
    started: std::time::Instant,
) {
    match outcome {
        Ok(result) => tracing::info!(
            skill = %prepared.route.skill.id,
            match_type = ?prepared.route.match_type,
            off_topic = result.is_off_topic,
            modifications = !result.modifications.is_empty(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "skill invocation succeeded"
        ),
        Err(e) => log_failure(prepared, e),
    }
}

fn log_failure(prepared: &Prepared, error: &SkillError) {
    tracing::warn!(
        skill = %prepared.route.skill.id,
        step = error.step(),
        error = %error,
        "skill invocation failed"
    );
}
