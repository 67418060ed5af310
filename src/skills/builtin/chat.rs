//! chat：兜底技能，回答一般性的职业 / 学习问题，必要时提出小范围修改

use super::{career_block, output_rules, skills_block, user_maps_block};
use crate::context::SkillContext;
use crate::skills::{
    ContextRequirements, OptionalModificationResponse, ResponseSchema, SkillDefinition,
    SystemPrompt,
};

fn schema() -> ResponseSchema {
    ResponseSchema::of::<OptionalModificationResponse>("chat")
}

/// 无意图模式：所有无法匹配的消息都落到这里
pub(super) fn skill() -> SkillDefinition {
    SkillDefinition::new(
        "chat",
        "Chat",
        "Ask anything about your career path and skill tree",
        SystemPrompt::Dynamic(system_prompt),
        schema(),
    )
    .with_slash_command("/chat")
    .with_aliases(["ask", "help"])
    .with_context(ContextRequirements {
        needs_career_info: true,
        needs_skill_list: true,
        max_skills_in_context: 40,
        needs_chat_history: true,
        needs_user_maps: true,
        needs_node_ids: false,
        custom_builder: None,
    })
    .with_temperature(0.7)
    .with_max_tokens(2000)
}

fn system_prompt(ctx: &SkillContext) -> String {
    format!(
        "You are a friendly career coach inside a skill-tree app. Answer questions about the user's \
         career path, learning plan and skill tree concisely.\n\n\
         {career}\n\n\
         Current skills in the tree:\n{skills}\n\n\
         The user's other skill maps:\n{maps}\n\n\
         Rules:\n\
         - Only include \"modifications\" when the user explicitly asks to change the tree \
         (add, remove, rename, re-level, update progress); otherwise omit it.\n\
         - Refer to existing skills by their id.\n\n\
         {rules}",
        career = career_block(ctx),
        skills = skills_block(ctx),
        maps = user_maps_block(ctx),
        rules = output_rules(ctx, &schema()),
    )
}
