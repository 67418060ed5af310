//! 执行引擎集成测试：脚本化 Mock 模型 + 桩搜索服务，走完整的公开 API

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use skilltree::config::SearchSection;
use skilltree::context::{FullContext, SkillNode};
use skilltree::llm::{LazyLlmClient, MockLlmClient, Role};
use skilltree::skills::default_router;
use skilltree::tools::{GraphOpsTool, SearchHit, SearchProvider, ToolRegistry, WebSearchTool};
use skilltree::{
    EngineConfig, ExecuteOptions, MatchType, SkillEngine, SkillError, SkillEvent,
};
use tokio_util::sync::CancellationToken;

const EXPAND_RESPONSE: &str = r#"{"message":"Added 2 skills","modifications":{"addNodes":[{"id":"jest","name":"Jest","description":"...","icon":"🧪","level":3,"category":"Testing","progress":0,"prerequisites":["react"]},{"id":"react-testing-library","name":"React Testing Library","description":"...","icon":"🧪","level":4,"category":"Testing","progress":0,"prerequisites":["jest"]}],"updateNodes":[],"removeNodes":[],"addEdges":[{"id":"react-to-jest","source":"react","target":"jest"}],"removeEdges":[]},"isOffTopic":false}"#;

struct StubSearch {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>, String> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![SearchHit {
            title: "State of Frontend".into(),
            url: "https://example.com/state-of-frontend".into(),
            content: "Signals and server components keep growing.".into(),
        }])
    }
}

fn tools_with(search: Option<Arc<StubSearch>>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    match search {
        Some(stub) => tools.register(WebSearchTool::with_provider(stub, &SearchSection::default())),
        None => tools.register(WebSearchTool::unavailable()),
    }
    tools.register(GraphOpsTool);
    tools
}

fn engine(mock: &MockLlmClient) -> SkillEngine {
    engine_with_tools(mock, tools_with(None))
}

fn engine_with_tools(mock: &MockLlmClient, tools: ToolRegistry) -> SkillEngine {
    SkillEngine::new(
        default_router().unwrap(),
        tools,
        LazyLlmClient::ready(Arc::new(mock.clone())),
        EngineConfig::default(),
    )
}

fn frontend_context() -> FullContext {
    FullContext {
        locale: "en".into(),
        career_title: "Frontend Developer".into(),
        career_description: "Builds web user interfaces".into(),
        nodes: vec![SkillNode {
            id: "react".into(),
            name: "React".into(),
            description: String::new(),
            icon: String::new(),
            level: 4,
            category: "Framework".into(),
            progress: 0,
            prerequisites: vec![],
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_expand_end_to_end() {
    let mock = MockLlmClient::with_response(EXPAND_RESPONSE);
    let result = engine(&mock)
        .execute(
            "add more testing skills",
            &frontend_context(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.skill_id, "expand");
    assert_eq!(result.match_type, Some(MatchType::Intent));
    assert_eq!(result.message, "Added 2 skills");
    assert_eq!(result.modifications.add_nodes.len(), 2);
    assert!(result
        .modifications
        .add_edges
        .iter()
        .any(|e| e.source == "react" && e.target == "jest"));
    assert!(!result.is_off_topic);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let system = &requests[0].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("Frontend Developer"));
    assert!(system.content.contains("React (id: react"));
}

#[tokio::test]
async fn test_slash_trending_without_args() {
    let mock = MockLlmClient::with_response(r#"{"message":"Signals are hot","isOffTopic":false}"#);
    let search = Arc::new(StubSearch {
        queries: Mutex::new(Vec::new()),
    });
    let engine = engine_with_tools(&mock, tools_with(Some(Arc::clone(&search))));

    let route = engine.route("/trending");
    assert_eq!(route.skill.id, "trending");
    assert_eq!(route.match_type, MatchType::SlashCommand);
    assert!(route.params.is_none());

    let result = engine
        .execute("/trending", &frontend_context(), ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(result.match_type, Some(MatchType::SlashCommand));
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].url, "https://example.com/state-of-frontend");

    let queries = search.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("Frontend Developer"));
    assert!(mock.requests()[0].messages[0]
        .content
        .contains("State of Frontend"));
}

#[tokio::test]
async fn test_search_unavailable_degrades() {
    let mock = MockLlmClient::with_response(
        r#"{"message":"Start with the docs","resources":[{"title":"Docs","url":"https://kubernetes.io/docs/","type":"documentation"}]}"#,
    );
    let result = engine(&mock)
        .execute(
            "How do I learn Kubernetes?",
            &frontend_context(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.skill_id, "resources");
    assert_eq!(result.resources.len(), 1);
    assert!(result.sources.is_empty());
    let prompt = &mock.requests()[0].messages[0].content;
    assert!(prompt.contains("Kubernetes"));
}

#[tokio::test]
async fn test_off_topic_chat() {
    for body in [
        r#"{"message":"I can only help with careers and learning.","isOffTopic":true}"#,
        r#"{"message":"I can only help with careers and learning.","modifications":null,"isOffTopic":true}"#,
    ] {
        let mock = MockLlmClient::with_response(body);
        let result = engine(&mock)
            .execute(
                "what's the weather like?",
                &frontend_context(),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result.skill_id, "chat");
        assert_eq!(result.match_type, Some(MatchType::Fallback));
        assert!(result.is_off_topic);
        assert!(result.modifications.is_empty());
    }
}

#[tokio::test]
async fn test_timeout_enforced() {
    let mock = MockLlmClient::hanging();
    let start = Instant::now();
    let err = engine(&mock)
        .execute(
            "hello",
            &FullContext::default(),
            ExecuteOptions::default().with_timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_millis(200));
    assert!(matches!(err, SkillError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_stream_chunks_then_single_result() {
    let mock = MockLlmClient::with_chunks([
        r#"{"message":"#,
        r#""Hello there","#,
        r#""isOffTopic":false}"#,
    ]);
    let events: Vec<_> = engine(&mock)
        .execute_stream("hello", frontend_context(), ExecuteOptions::default())
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    let chunks: Vec<String> = events[..3]
        .iter()
        .map(|e| match e {
            Ok(SkillEvent::Chunk(text)) => text.clone(),
            other => panic!("expected chunk, got {other:?}"),
        })
        .collect();
    assert_eq!(
        chunks,
        vec![r#"{"message":"#, r#""Hello there","#, r#""isOffTopic":false}"#]
    );
    match &events[3] {
        Ok(SkillEvent::Result(result)) => {
            assert_eq!(result.message, "Hello there");
            assert_eq!(result.skill_id, "chat");
        }
        other => panic!("expected result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_timeout_yields_no_result() {
    let mock = MockLlmClient::with_chunks([r#"{"message":"#, r#""late"}"#])
        .with_chunk_delay(Duration::from_millis(100));
    let events: Vec<_> = engine(&mock)
        .execute_stream(
            "hello",
            FullContext::default(),
            ExecuteOptions::default().with_timeout(Duration::from_millis(150)),
        )
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Ok(SkillEvent::Chunk(_))));
    assert!(matches!(events[1], Err(SkillError::Timeout { .. })));
}

#[tokio::test]
async fn test_stream_cancelled() {
    let mock = MockLlmClient::hanging();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let events: Vec<_> = engine(&mock)
        .execute_stream(
            "hello",
            FullContext::default(),
            ExecuteOptions::default().with_cancel(token),
        )
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(SkillError::Cancelled)));
}

#[tokio::test]
async fn test_model_failures_surface_unmodified() {
    let err = engine(&MockLlmClient::failing("connection reset"))
        .execute("hello", &FullContext::default(), ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::ModelInvocation(_)));
    assert_eq!(err.step(), "model_call");

    let err = engine(&MockLlmClient::with_response(""))
        .execute("hello", &FullContext::default(), ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::ModelInvocation(_)));

    let err = engine(&MockLlmClient::with_response("Sure! Here you go"))
        .execute("hello", &FullContext::default(), ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SkillError::ResponseParse(_)));

    // expand 要求 modifications 字段
    let err = engine(&MockLlmClient::with_response(r#"{"message":"done"}"#))
        .execute(
            "add more testing skills",
            &frontend_context(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();
    match err {
        SkillError::ResponseValidation { skill, .. } => assert_eq!(skill, "expand"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_invocations_do_not_interfere() {
    let mock = MockLlmClient::default();
    let engine = engine(&mock);

    let a = engine.clone();
    let b = engine.clone();
    let ctx_a = frontend_context();
    let ctx_b = FullContext::default();
    let (ra, rb) = tokio::join!(
        a.execute("hello", &ctx_a, ExecuteOptions::default()),
        b.execute("/chat hi", &ctx_b, ExecuteOptions::default()),
    );
    assert_eq!(ra.unwrap().match_type, Some(MatchType::Fallback));
    assert_eq!(rb.unwrap().match_type, Some(MatchType::SlashCommand));
    assert_eq!(mock.requests().len(), 2);
}

#[tokio::test]
async fn test_expand_renames_collisions_beyond_skill_list_cap() {
    let mut full = frontend_context();
    let template = full.nodes[0].clone();
    full.nodes.extend((0..60).map(|i| SkillNode {
        id: format!("n{i}"),
        name: format!("Topic {i}"),
        ..template.clone()
    }));
    full.nodes.push(SkillNode {
        id: "jest".into(),
        name: "Jest".into(),
        ..template
    });

    let mock = MockLlmClient::with_response(EXPAND_RESPONSE);
    let result = engine(&mock)
        .execute("add more testing skills", &full, ExecuteOptions::default())
        .await
        .unwrap();

    let ids: Vec<&str> = result
        .modifications
        .add_nodes
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(ids, vec!["jest-2", "react-testing-library"]);
    let applied = result.modifications.apply_to(&full.nodes, &full.edges);
    assert!(applied.skipped_nodes.is_empty());
    assert_eq!(applied.nodes.len(), full.nodes.len() + 2);
}
