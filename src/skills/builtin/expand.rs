//! expand：按用户请求向技能树追加新技能与前置边

use std::collections::HashSet;

use serde_json::Value;

use super::{career_block, output_rules, skills_block, validation_error};
use crate::context::{SkillContext, SkillEdge};
use crate::error::SkillError;
use crate::skills::{
    ContextRequirements, ModificationResponse, ResponseSchema, SkillDefinition, SkillModifications,
    SkillResult, SystemPrompt,
};
use crate::tools::graph_ops::{edge_id, generate_node_id};
use crate::tools::GRAPH_OPS_TOOL_ID;

pub(super) fn schema() -> ResponseSchema {
    ResponseSchema::of::<ModificationResponse>("expand")
}

pub(super) fn skill() -> Result<SkillDefinition, SkillError> {
    SkillDefinition::new(
        "expand",
        "Expand Tree",
        "Add new skills and branches to your skill tree",
        SystemPrompt::Dynamic(system_prompt),
        schema(),
    )
    .with_slash_command("/expand")
    .with_aliases(["add", "grow", "extend"])
    .with_intent_patterns(&[
        r"(?i)\b(?:add|expand|extend|grow|more|include|insert)\b.*\b(?:skills?|nodes?|topics?|branch(?:es)?|tree|technolog(?:y|ies)|tools?|frameworks?)\b",
        r"(?i)^\s*(?:add|include)\s+(?P<topic>.+?)\s*[.!]*$",
    ])
    .map(|s| {
        s.with_context(ContextRequirements {
            needs_career_info: true,
            needs_skill_list: true,
            max_skills_in_context: 60,
            needs_chat_history: true,
            needs_user_maps: false,
            needs_node_ids: true,
            custom_builder: None,
        })
        .with_tools([GRAPH_OPS_TOOL_ID])
        .with_post_process(post_process)
        .with_temperature(0.7)
        .with_max_tokens(4000)
    })
}

fn system_prompt(ctx: &SkillContext) -> String {
    format!(
        "You are a career skill-tree architect. You extend a user's skill tree with new, \
         well-structured skills.\n\n\
         {career}\n\n\
         Current skills in the tree:\n{skills}\n\n\
         Rules:\n\
         - Add only skills that do not already exist; refer to existing skills by their id.\n\
         - New node ids are unique, lowercase and hyphenated (e.g. \"react-testing-library\").\n\
         - \"level\" is difficulty from 1 (basics) to 5 (expert); \"progress\" starts at 0; \"icon\" is one emoji.\n\
         - Every prerequisite is an existing id or the id of another new node, and gets a matching edge \
         with source = prerequisite and target = new node.\n\
         - Prefer 2 to 6 focused additions over long lists.\n\n\
         {rules}",
        career = career_block(ctx),
        skills = skills_block(ctx),
        rules = output_rules(ctx, &schema()),
    )
}

fn post_process(value: Value, ctx: &SkillContext) -> Result<SkillResult, SkillError> {
    let mut result = SkillResult::from_validated(value).map_err(validation_error("expand"))?;
    let existing: HashSet<String> = ctx
        .skills
        .iter()
        .flatten()
        .map(|s| s.id.as_str())
        .chain(ctx.existing_node_ids())
        .map(str::to_string)
        .collect();
    normalize_additions(&mut result.modifications, &existing);
    Ok(result)
}

/// 为缺失或冲突的新节点分配 id，补齐前置边，去重边
fn normalize_additions(mods: &mut SkillModifications, existing: &HashSet<String>) {
    let removed: HashSet<&String> = mods.remove_nodes.iter().collect();
    let mut taken: HashSet<String> = existing
        .iter()
        .filter(|id| !removed.contains(id))
        .cloned()
        .collect();

    for node in &mut mods.add_nodes {
        if node.id.trim().is_empty() || taken.contains(&node.id) {
            let id = generate_node_id(&node.name, &taken);
            tracing::debug!(from = %node.id, to = %id, "assigned id to new node");
            node.id = id;
        }
        taken.insert(node.id.clone());
    }

    for edge in &mut mods.add_edges {
        if edge.id.trim().is_empty() {
            edge.id = edge_id(&edge.source, &edge.target);
        }
    }

    let derived: Vec<SkillEdge> = mods
        .add_nodes
        .iter()
        .flat_map(|node| {
            node.prerequisites.iter().map(|pre| SkillEdge {
                id: edge_id(pre, &node.id),
                source: pre.clone(),
                target: node.id.clone(),
            })
        })
        .collect();
    for edge in derived {
        let exists = mods
            .add_edges
            .iter()
            .any(|e| e.source == edge.source && e.target == edge.target);
        if !exists {
            mods.add_edges.push(edge);
        }
    }

    let mut seen = HashSet::new();
    mods.add_edges.retain(|e| seen.insert(e.id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SkillNode;

    fn new_node(id: &str, name: &str, prerequisites: &[&str]) -> SkillNode {
        SkillNode {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            icon: "🧪".into(),
            level: 3,
            category: "Testing".into(),
            progress: 0,
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize_assigns_ids_and_derives_edges() {
        let existing: HashSet<String> = ["react".to_string()].into();
        let mut mods = SkillModifications {
            add_nodes: vec![
                new_node("", "Jest", &["react"]),
                new_node("react", "React Hooks", &["react"]),
            ],
            add_edges: vec![
                SkillEdge {
                    id: String::new(),
                    source: "react".into(),
                    target: "jest".into(),
                },
                SkillEdge {
                    id: "react-to-jest".into(),
                    source: "react".into(),
                    target: "jest".into(),
                },
            ],
            ..Default::default()
        };

        normalize_additions(&mut mods, &existing);

        let ids: Vec<&str> = mods.add_nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["jest", "react-hooks"]);
        let edge_ids: Vec<&str> = mods.add_edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(edge_ids, vec!["react-to-jest", "react-to-react-hooks"]);
    }

    #[test]
    fn test_prompt_mentions_career_and_skills() {
        let ctx = SkillContext {
            locale: "en".into(),
            career_title: Some("Frontend Developer".into()),
            skills: Some(vec![crate::context::SkillSummary {
                id: "react".into(),
                name: "React".into(),
                level: 4,
                category: "Framework".into(),
            }]),
            ..Default::default()
        };
        let prompt = system_prompt(&ctx);
        assert!(prompt.contains("Career: Frontend Developer"));
        assert!(prompt.contains("- React (id: react, level 4, Framework)"));
        assert!(prompt.contains("addNodes"));
    }

    #[test]
    fn test_post_process_sees_ids_beyond_skill_list_cap() {
        let mut ctx = SkillContext {
            locale: "en".into(),
            skills: Some(vec![crate::context::SkillSummary {
                id: "react".into(),
                name: "React".into(),
                level: 4,
                category: "Framework".into(),
            }]),
            ..Default::default()
        };
        ctx.custom_data.insert(
            crate::context::EXISTING_NODE_IDS_KEY.into(),
            serde_json::json!(["react", "jest"]),
        );
        let response = serde_json::json!({
            "message": "Added Jest",
            "modifications": {
                "addNodes": [{
                    "id": "jest",
                    "name": "Jest",
                    "description": "",
                    "icon": "🧪",
                    "level": 3,
                    "category": "Testing",
                    "progress": 0,
                    "prerequisites": ["react"]
                }]
            },
            "isOffTopic": false
        });
        let value = schema().validate(response).unwrap();

        let result = post_process(value, &ctx).unwrap();
        let node = &result.modifications.add_nodes[0];
        assert_eq!(node.id, "jest-2");
        assert!(result
            .modifications
            .add_edges
            .iter()
            .any(|e| e.source == "react" && e.target == node.id));
    }
}
