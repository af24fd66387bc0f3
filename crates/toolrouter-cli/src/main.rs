use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use toolrouter_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use toolrouter_contracts::events::EventWriter;
use toolrouter_contracts::results::ToolResult;
use toolrouter_contracts::tools::{RoutingTable, TOOL_VEO3_VIDEO};
use toolrouter_engine::{
    new_session_id, Explanation, IdStrategy, RouterConfig, RouterState, SubmitOutcome, ToolRouter,
};

const PROGRESS_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(
    name = "toolrouter",
    version,
    about = "Routes free-text requests to mock creative tools"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Append JSONL events to this file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Routing override merged on top of the built-in table.
    #[arg(long, global = true)]
    routing_table: Option<PathBuf>,
    #[arg(long, global = true)]
    no_delay: bool,
    #[arg(long, global = true)]
    deterministic_ids: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refine, classify and execute one request.
    Route(PromptArgs),
    /// Refine one request and send it straight to the video generator.
    Video(PromptArgs),
    /// List the tools in the routing table.
    Tools,
    /// Interactive session.
    Chat,
}

#[derive(Debug, Args)]
struct PromptArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    json: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("toolrouter error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = router_config(&cli.global, RouterConfig::from_env());
    match cli.command {
        Command::Route(args) => {
            let router = build_router(&cli.global, &config)?;
            let outcome = with_progress(&router, !args.json, || router.submit(&args.prompt));
            print_outcome(outcome, args.json)
        }
        Command::Video(args) => {
            let router = build_router(&cli.global, &config)?;
            let outcome = with_progress(&router, !args.json, || {
                router.submit_direct(&args.prompt, TOOL_VEO3_VIDEO)
            });
            print_outcome(outcome, args.json)
        }
        Command::Tools => {
            let table = config.load_routing_table()?;
            print!("{}", render_tools(&table));
            Ok(0)
        }
        Command::Chat => {
            let router = build_router(&cli.global, &config)?;
            run_chat(&router)?;
            Ok(0)
        }
    }
}

/// Command-line flags win over the environment.
fn router_config(global: &GlobalArgs, base: RouterConfig) -> RouterConfig {
    let mut config = if global.no_delay {
        base.without_delays()
    } else {
        base
    };
    if global.deterministic_ids {
        config.id_strategy = IdStrategy::Deterministic;
    }
    if let Some(path) = &global.routing_table {
        config.routing_table_path = Some(path.clone());
    }
    config
}

fn build_router(global: &GlobalArgs, config: &RouterConfig) -> Result<ToolRouter> {
    let session_id = new_session_id();
    let events = match &global.events {
        Some(path) => EventWriter::new(path, session_id),
        None => EventWriter::detached(session_id),
    };
    ToolRouter::new(config, events)
}

/// Runs `work` while a scoped watcher prints stage changes to stderr.
fn with_progress<T>(router: &ToolRouter, enabled: bool, work: impl FnOnce() -> T) -> T {
    if !enabled {
        return work();
    }
    let done = AtomicBool::new(false);
    thread::scope(|scope| {
        scope.spawn(|| {
            let mut last: Option<String> = None;
            while !done.load(Ordering::Relaxed) {
                let status = router.status_message();
                if status.is_some() && status != last {
                    if let Some(text) = &status {
                        eprintln!("{text}");
                    }
                    last = status;
                }
                thread::sleep(PROGRESS_POLL);
            }
        });
        let value = work();
        done.store(true, Ordering::Relaxed);
        value
    })
}

fn print_outcome(outcome: SubmitOutcome, json: bool) -> Result<i32> {
    let (result, code) = match outcome {
        SubmitOutcome::Rejected => {
            eprintln!("Request rejected: input is blank.");
            return Ok(2);
        }
        SubmitOutcome::Completed(result) => (result, 0),
        SubmitOutcome::Failed(result) => (result, 1),
        SubmitOutcome::Superseded { result, .. } => (result, 0),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_result(&result)?);
    }
    Ok(code)
}

fn render_result(result: &ToolResult) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!("Refined prompt: {}\n", result.refined_prompt));
    out.push_str(&format!(
        "Selected tool: {} (confidence {:.2})\n",
        result.selected_tool, result.confidence
    ));
    out.push_str(&format!("{}\n", result.final_message));
    if result.is_error() {
        return Ok(out);
    }
    out.push_str("Output:\n");
    out.push_str(&serde_json::to_string_pretty(&result.output_json())?);
    out.push('\n');
    if let Some(metadata) = &result.metadata {
        if let Some(version) = &metadata.tool_version {
            out.push_str(&format!("Tool version: {version}\n"));
        }
        if let Some(ms) = metadata.processing_time {
            out.push_str(&format!("Processing time: {ms}ms\n"));
        }
    }
    Ok(out)
}

fn render_tools(table: &RoutingTable) -> String {
    let mut out = String::new();
    for spec in table.tools.list() {
        out.push_str(&format!(
            "{} ({}) - {}\n  keywords: {}\n",
            spec.name,
            spec.version_label,
            spec.description,
            spec.keywords.join(", ")
        ));
    }
    out
}

fn render_explanation(explanation: &Explanation) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!(
        "Refined prompt: {}\n",
        explanation.refinement.refined
    ));
    out.push_str(&format!(
        "Category: {}\n",
        explanation.refinement.category.as_deref().unwrap_or("none")
    ));
    for score in &explanation.scores {
        out.push_str(&format!(
            "  {:<12} weight {} [{}]\n",
            score.tool,
            score.weight,
            score.matched.join(", ")
        ));
    }
    let classification = &explanation.classification;
    out.push_str(&format!(
        "Selected tool: {} (confidence {:.2})\n{}\n",
        classification.tool, classification.confidence, classification.reasoning
    ));
    out.push_str(&format!(
        "Parameters: {}\n",
        serde_json::to_string(&Value::Object(classification.parameters.clone()))?
    ));
    Ok(out)
}

fn render_status(state: &RouterState) -> String {
    if let Some(message) = state.status_message() {
        return format!("{}: {message}\n", state.name());
    }
    match state.result() {
        Some(result) => format!(
            "{}: last request went to {} ({})\n",
            state.name(),
            result.selected_tool,
            result.original_input
        ),
        None => format!("{}\n", state.name()),
    }
}

fn run_chat(router: &ToolRouter) -> Result<()> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    println!("Tool router chat started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match reader.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => continue,
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
            "list_tools" => print!("{}", render_tools(router.routing_table())),
            "status" => print!("{}", render_status(&router.state())),
            "reset" => {
                router.reset();
                println!("Session reset.");
            }
            "quit" => break,
            "refine" => match intent.prompt.as_deref() {
                Some(prompt) => println!("{}", router.refine(prompt).refined),
                None => println!("/refine requires a prompt"),
            },
            "explain" => match intent.prompt.as_deref() {
                Some(prompt) => print!("{}", render_explanation(&router.explain(prompt))?),
                None => println!("/explain requires a prompt"),
            },
            "video" => match intent.prompt.as_deref() {
                Some(prompt) => {
                    let outcome =
                        with_progress(router, true, || router.submit_direct(prompt, TOOL_VEO3_VIDEO));
                    print_outcome(outcome, false)?;
                }
                None => println!("/video requires a prompt"),
            },
            "route" => match intent.prompt.as_deref() {
                Some(prompt) => {
                    let outcome = with_progress(router, true, || router.submit(prompt));
                    print_outcome(outcome, false)?;
                }
                None => println!("/route requires a prompt"),
            },
            _ => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }
    Ok(())
}
