//! SkillTree 演示程序
//!
//! 用法：`skilltree "<message>" [context.json]`
//! 加载配置、构建引擎，以流式方式执行一次技能调用：增量文本写到 stderr，最终结果 JSON 写到 stdout。

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use futures_util::StreamExt;
use skilltree::{
    config::load_config, observability, ExecuteOptions, FullContext, SkillEngine, SkillEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args = std::env::args().skip(1);
    let message = args
        .next()
        .context("usage: skilltree \"<message>\" [context.json]")?;
    let full = match args.next() {
        Some(path) => read_context(PathBuf::from(path))?,
        None => FullContext::default(),
    };

    let cfg = load_config(None).context("Failed to load config")?;
    let engine = SkillEngine::from_config(&cfg).context("Failed to build skill engine")?;

    if message.trim() == "/help" {
        for cmd in engine.list_commands() {
            println!("{:<12} {} - {}", cmd.command, cmd.name, cmd.description);
        }
        return Ok(());
    }

    let mut events = Box::pin(engine.execute_stream(message, full, ExecuteOptions::default()));
    let mut stderr = std::io::stderr();
    while let Some(event) = events.next().await {
        match event? {
            SkillEvent::Chunk(text) => {
                let _ = write!(stderr, "{}", text);
                let _ = stderr.flush();
            }
            SkillEvent::Result(result) => {
                eprintln!();
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
    }

    Ok(())
}

fn read_context(path: PathBuf) -> anyhow::Result<FullContext> {
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid context JSON in {}", path.display()))
}
