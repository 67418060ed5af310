//! 技能路由器
//!
//! 三级优先：斜杠命令 > 意图模式 > 兜底技能。路由本身永不失败；
//! 「没有兜底技能」在构造 Router 时就会被拒绝。

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::SkillError;
use crate::skills::SkillDefinition;

/// 命中方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    SlashCommand,
    Intent,
    Fallback,
}

/// 路由结果：单次调用内创建并立即消费
#[derive(Debug, Clone)]
pub struct RouteResult {
    pub skill: Arc<SkillDefinition>,
    /// 斜杠命令的 `args`，或意图模式的命名捕获组
    pub params: Option<BTreeMap<String, String>>,
    pub match_type: MatchType,
}

/// UI 自动补全项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlashCommandInfo {
    pub command: String,
    pub name: String,
    pub description: String,
}

static SLASH_RE: OnceLock<Regex> = OnceLock::new();

/// `/command [args]`
fn slash_regex() -> &'static Regex {
    SLASH_RE.get_or_init(|| Regex::new(r"^/(\w+)(?:\s+(.*))?$").unwrap())
}

/// 只读路由表：技能按注册顺序保存，id / 别名 / 斜杠命令 token 统一索引（小写）
#[derive(Debug)]
pub struct SkillRouter {
    skills: Vec<Arc<SkillDefinition>>,
    lookup: HashMap<String, usize>,
    fallback: usize,
}

impl SkillRouter {
    /// 构建路由表；必须恰好有一个兜底技能（无意图模式）
    pub fn new(skills: Vec<SkillDefinition>) -> Result<Self, SkillError> {
        let fallbacks: Vec<usize> = skills
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_fallback())
            .map(|(i, _)| i)
            .collect();
        let fallback = match fallbacks.as_slice() {
            [only] => *only,
            [] => {
                return Err(SkillError::RoutingConfiguration(
                    "no fallback skill registered (a skill with empty intent patterns)".into(),
                ))
            }
            many => {
                let ids: Vec<&str> = many.iter().map(|&i| skills[i].id.as_str()).collect();
                return Err(SkillError::RoutingConfiguration(format!(
                    "multiple fallback skills registered: {}",
                    ids.join(", ")
                )));
            }
        };

        let mut lookup = HashMap::new();
        for (idx, skill) in skills.iter().enumerate() {
            tracing::debug!(skill = %skill.summary(), "skill registered");
            let keys = std::iter::once(skill.id.to_lowercase())
                .chain(skill.aliases.iter().map(|a| a.to_lowercase()))
                .chain(skill.command_token());
            for key in keys {
                if let Some(prev) = lookup.insert(key.clone(), idx) {
                    if prev != idx {
                        tracing::warn!(
                            key = %key,
                            previous = %skills[prev].id,
                            skill = %skill.id,
                            "skill lookup key registered twice, later registration wins"
                        );
                    }
                }
            }
        }

        tracing::info!(
            skills = skills.len(),
            fallback = %skills[fallback].id,
            "skill router ready"
        );

        Ok(Self {
            skills: skills.into_iter().map(Arc::new).collect(),
            lookup,
            fallback,
        })
    }

    /// 将消息映射为一个技能
    pub fn route(&self, message: &str) -> RouteResult {
        if let Some(result) = self.match_slash_command(message) {
            return result;
        }

        for (idx, skill) in self.skills.iter().enumerate() {
            if idx == self.fallback {
                continue;
            }
            for pattern in &skill.intent_patterns {
                if let Some(caps) = pattern.captures(message) {
                    let params: BTreeMap<String, String> = pattern
                        .capture_names()
                        .flatten()
                        .filter_map(|name| {
                            caps.name(name)
                                .map(|m| (name.to_string(), m.as_str().trim().to_string()))
                        })
                        .collect();
                    return RouteResult {
                        skill: Arc::clone(skill),
                        params: (!params.is_empty()).then_some(params),
                        match_type: MatchType::Intent,
                    };
                }
            }
        }

        RouteResult {
            skill: Arc::clone(&self.skills[self.fallback]),
            params: None,
            match_type: MatchType::Fallback,
        }
    }

    fn match_slash_command(&self, message: &str) -> Option<RouteResult> {
        let caps = slash_regex().captures(message.trim())?;
        let token = caps.get(1)?.as_str().to_lowercase();
        let idx = *self.lookup.get(&token)?;
        let params = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .filter(|args| !args.is_empty())
            .map(|args| BTreeMap::from([("args".to_string(), args.to_string())]));
        Some(RouteResult {
            skill: Arc::clone(&self.skills[idx]),
            params,
            match_type: MatchType::SlashCommand,
        })
    }

    /// 所有斜杠命令（去重，按命令 token 字母序）
    pub fn list_commands(&self) -> Vec<SlashCommandInfo> {
        let mut commands: Vec<SlashCommandInfo> = self
            .skills
            .iter()
            .filter_map(|s| {
                s.command_token().map(|token| SlashCommandInfo {
                    command: format!("/{token}"),
                    name: s.name.clone(),
                    description: s.description.clone(),
                })
            })
            .collect();
        commands.sort_by(|a, b| a.command.cmp(&b.command));
        commands.dedup_by(|a, b| a.command == b.command);
        commands
    }

    /// 按 id、别名或命令 token 查找（大小写不敏感，可带前导 `/`）
    pub fn get(&self, key: &str) -> Option<Arc<SkillDefinition>> {
        let key = key.trim().trim_start_matches('/').to_lowercase();
        self.lookup.get(&key).map(|&i| Arc::clone(&self.skills[i]))
    }

    /// 形如 `/word ...` 即视为斜杠命令（不要求已注册）
    pub fn is_slash_command(message: &str) -> bool {
        slash_regex().is_match(message.trim())
    }

    /// 单行帮助文本，如 `/expand - Expand Tree: Add new skills to your tree`
    pub fn command_help(&self, command: &str) -> Option<String> {
        let skill = self.get(command)?;
        let token = skill.command_token()?;
        Some(format!("/{} - {}: {}", token, skill.name, skill.description))
    }

    pub fn skills(&self) -> &[Arc<SkillDefinition>] {
        &self.skills
    }

    pub fn fallback(&self) -> Arc<SkillDefinition> {
        Arc::clone(&self.skills[self.fallback])
    }
}
