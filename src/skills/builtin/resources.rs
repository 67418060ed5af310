//! resources：为某个技能查找学习资源（课程、文档、书籍、视频）

use std::collections::HashSet;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::{
    career_block, output_rules, search_block, skills_block, sources_from_search, stash_search,
    validation_error, Tools,
};
use crate::context::SkillContext;
use crate::error::SkillError;
use crate::skills::{
    ContextRequirements, ResourcesResponse, ResponseSchema, SkillDefinition, SkillResult,
    SystemPrompt,
};
use crate::tools::WEB_SEARCH_TOOL_ID;

fn schema() -> ResponseSchema {
    ResponseSchema::of::<ResourcesResponse>("resources")
}

pub(super) fn skill() -> Result<SkillDefinition, SkillError> {
    SkillDefinition::new(
        "resources",
        "Learning Resources",
        "Get courses, docs and tutorials for a skill",
        SystemPrompt::Dynamic(system_prompt),
        schema(),
    )
    .with_slash_command("/resources")
    .with_aliases(["learn", "resource", "tutorials"])
    .with_intent_patterns(&[
        r"(?i)\b(?:resources?|tutorials?|courses?|books?|docs|documentation)\s+(?:for|on|about|to learn)\s+(?:learning\s+)?(?P<skill>.+?)\s*[?.!]*$",
        r"(?i)\bhow\s+(?:do|can|should)\s+i\s+(?:learn|study|get better at)\s+(?P<skill>.+?)\s*[?.!]*$",
        r"(?i)\bwhere\s+(?:can|do|should)\s+i\s+learn\s+(?P<skill>.+?)\s*[?.!]*$",
    ])
    .map(|s| {
        s.with_context(ContextRequirements {
            needs_career_info: true,
            needs_skill_list: true,
            max_skills_in_context: 30,
            needs_chat_history: false,
            needs_user_maps: false,
            needs_node_ids: false,
            custom_builder: None,
        })
        .with_tools([WEB_SEARCH_TOOL_ID])
        .with_pre_execute(pre_execute)
        .with_post_process(post_process)
        .with_temperature(0.4)
        .with_max_tokens(2500)
    })
}

/// 目标技能：意图捕获组 > 斜杠参数 > 职业名
fn target_skill(ctx: &SkillContext) -> String {
    ctx.route_param("skill")
        .or_else(|| ctx.route_param("args"))
        .map(str::to_string)
        .unwrap_or_else(|| ctx.career_title_or("software development").to_string())
}

fn pre_execute(mut ctx: SkillContext, tools: Tools) -> BoxFuture<'static, SkillContext> {
    Box::pin(async move {
        let skill = target_skill(&ctx);
        stash_search(&mut ctx, &tools, &skill, "resources").await;
        ctx
    })
}

fn system_prompt(ctx: &SkillContext) -> String {
    format!(
        "You are a learning advisor. Recommend the best resources to learn \"{skill}\" for someone \
         on the career path below, matched to their current level.\n\n\
         {career}\n\n\
         Current skills in the tree:\n{skills}\n\n\
         Recent web search results:\n{search}\n\n\
         Rules:\n\
         - Return 4 to 8 resources mixing official documentation, courses, books, videos and tutorials.\n\
         - \"type\" is one of: course, documentation, video, book, article, tutorial.\n\
         - Prefer urls from the search results; never invent urls you are not confident exist.\n\
         - Summarize in \"message\" how to work through the resources.\n\n\
         {rules}",
        skill = target_skill(ctx),
        career = career_block(ctx),
        skills = skills_block(ctx),
        search = search_block(ctx),
        rules = output_rules(ctx, &schema()),
    )
}

fn post_process(value: Value, ctx: &SkillContext) -> Result<SkillResult, SkillError> {
    let mut result = SkillResult::from_validated(value).map_err(validation_error("resources"))?;
    let mut seen = HashSet::new();
    result
        .resources
        .retain(|r| !r.url.trim().is_empty() && seen.insert(r.url.trim().to_lowercase()));
    if result.sources.is_empty() {
        result.sources = sources_from_search(ctx);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ROUTE_PARAMS_KEY;
    use serde_json::json;

    #[test]
    fn test_target_skill_precedence() {
        let mut ctx = SkillContext {
            career_title: Some("Backend Developer".into()),
            ..Default::default()
        };
        assert_eq!(target_skill(&ctx), "Backend Developer");

        ctx.custom_data
            .insert(ROUTE_PARAMS_KEY.into(), json!({"args": "react"}));
        assert_eq!(target_skill(&ctx), "react");

        ctx.custom_data
            .insert(ROUTE_PARAMS_KEY.into(), json!({"skill": "Go", "args": "react"}));
        assert_eq!(target_skill(&ctx), "Go");
    }

    #[test]
    fn test_post_process_dedupes_resources() {
        let result = post_process(
            json!({
                "message": "Start with the book",
                "resources": [
                    {"title": "Book", "url": "https://doc.rust-lang.org/book/", "type": "book"},
                    {"title": "Book again", "url": "https://DOC.rust-lang.org/book/", "type": "book"},
                    {"title": "No url", "url": " ", "type": "video"}
                ]
            }),
            &SkillContext::default(),
        )
        .unwrap();
        assert_eq!(result.resources.len(), 1);
        assert_eq!(result.resources[0].title, "Book");
    }
}
