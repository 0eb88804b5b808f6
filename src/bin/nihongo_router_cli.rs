//! nihongo-router-cli：路由引擎的运维命令行工具
//!
//! Usage:
//!   nihongo-router-cli ask <text> [--task T] [--provider P] [--timeout-ms N]
//!   nihongo-router-cli classify <text>
//!   nihongo-router-cli routes
//!   nihongo-router-cli status [--probe]
//!   nihongo-router-cli benchmark [prompt]

use ai_nihongo_router::{
    OrchestrationRequest, Orchestrator, OrchestratorBuilder, OrchestratorConfig, TaskCategory,
};
use anyhow::{anyhow, bail, Context};
use std::path::PathBuf;
use std::time::Duration;

fn print_usage() {
    println!(
        r#"nihongo-router-cli: AI-Nihongo 模型路由命令行工具

USAGE:
    nihongo-router-cli [--config <path>] <COMMAND> [OPTIONS]

COMMANDS:
    ask <text> [--task T] [--provider P] [--timeout-ms N]
                                Route one request and print the answer
    classify <text>             Show the task category for a text
    routes                      Print the routing table
    status [--probe]            Provider health, metrics and capabilities (JSON)
    benchmark [prompt]          Send a prompt to every provider at once (JSON)
    version                     Show version information
    help                        Show this help message

TASKS:
    chat, translation, grammar, analysis, quick, creative

ENVIRONMENT:
    NIHONGO_CONFIG              Config file (YAML or JSON) when --config is absent
    RUST_LOG                    Log filter (default: info)
    ANTHROPIC_API_KEY, OPENAI_API_KEY, GROQ_API_KEY, GEMINI_API_KEY, OLLAMA_HOST"#
    );
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor flag values.
fn positional(args: &[String], flags_with_values: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if flags_with_values.contains(&arg.as_str()) {
            skip = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn build_orchestrator(config_path: Option<PathBuf>) -> anyhow::Result<Orchestrator> {
    let config = OrchestratorConfig::load(config_path.as_deref()).context("loading configuration")?;
    OrchestratorBuilder::from_config(config)
        .build()
        .context("building orchestrator")
}

async fn cmd_ask(orchestrator: &Orchestrator, args: &[String]) -> anyhow::Result<()> {
    let text = positional(args, &["--task", "--provider", "--timeout-ms"]).join(" ");
    if text.trim().is_empty() {
        bail!("ask needs some text");
    }
    let mut request = OrchestrationRequest::new(text);
    if let Some(task) = flag_value(args, "--task") {
        request = request.with_task_hint(task.parse::<TaskCategory>()?);
    }
    if let Some(provider) = flag_value(args, "--provider") {
        request = request.with_provider(provider);
    }
    if let Some(ms) = flag_value(args, "--timeout-ms") {
        let ms: u64 = ms
            .parse()
            .map_err(|_| anyhow!("--timeout-ms expects milliseconds, got '{}'", ms))?;
        request = request.with_timeout(Duration::from_millis(ms));
    }

    let response = orchestrator.execute(request).await?;
    println!("{}", response.response_text);
    eprintln!(
        "[{} via {} · {} attempt(s) · {} ms{}]",
        response.task_category,
        response.provider_used,
        response.attempts,
        response.elapsed_ms,
        if response.used_fallback() { " · fallback" } else { "" }
    );
    Ok(())
}

fn cmd_classify(orchestrator: &Orchestrator, args: &[String]) -> anyhow::Result<()> {
    let text = positional(args, &[]).join(" ");
    println!("{}", orchestrator.classify(&text, None));
    Ok(())
}

fn cmd_routes(orchestrator: &Orchestrator) {
    let table = orchestrator.policy().table();
    for (category, ids) in table.iter() {
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        println!("{:<12} {}", category.as_str(), ids.join(" → "));
    }
}

async fn cmd_status(orchestrator: &Orchestrator, args: &[String]) -> anyhow::Result<()> {
    if args.iter().any(|a| a == "--probe") {
        orchestrator.probe_providers().await;
    }
    println!("{}", serde_json::to_string_pretty(&orchestrator.status())?);
    Ok(())
}

async fn cmd_benchmark(orchestrator: &Orchestrator, args: &[String]) -> anyhow::Result<()> {
    let prompt = positional(args, &[]).join(" ");
    let prompt = (!prompt.trim().is_empty()).then_some(prompt.as_str());
    let results = orchestrator.benchmark(prompt).await;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow!("--config expects a path"))?;
            args.drain(i..=i + 1);
            Some(PathBuf::from(path))
        }
        None => None,
    };

    let Some(command) = args.first().cloned() else {
        print_usage();
        std::process::exit(1);
    };
    let rest = &args[1..];

    match command.as_str() {
        "version" | "--version" | "-V" => {
            println!("nihongo-router-cli {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return Ok(());
        }
        _ => {}
    }

    let orchestrator = build_orchestrator(config_path)?;
    match command.as_str() {
        "ask" => cmd_ask(&orchestrator, rest).await,
        "classify" => cmd_classify(&orchestrator, rest),
        "routes" => {
            cmd_routes(&orchestrator);
            Ok(())
        }
        "status" => cmd_status(&orchestrator, rest).await,
        "benchmark" => cmd_benchmark(&orchestrator, rest).await,
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
