//! stepwise - interactive terminal entry point
//!
//! Reads one query per line from stdin and runs it through the agent until
//! the user types `exit`, `quit` or `bye`, or presses Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use stepwise::agent::{Agent, AgentEvent, PromptProfile, StepKind, TurnOutcome};
use stepwise::config::Config;
use stepwise::llm::GeminiClient;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_WORDS: &[&str] = &["exit", "quit", "bye"];
const PREVIEW_CHARS: usize = 500;
const FAREWELL: &str = "\n👋 Thank you for using stepwise. Goodbye!";
const PERSONA_FAREWELL: &str =
    "\n🤖 Thik hai ji, chai thandi mat hone dena. Fir milte hai kisi naye topic ke saath! Happy coding ji ☕👋";

#[derive(Parser)]
#[command(name = "stepwise", about = "Coding agent that works in plan/action/observe steps")]
struct Cli {
    /// Model to use (overrides AGENT_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Directory tools operate in (overrides WORKSPACE_PATH)
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Session profile: coding, reasoning, weather or persona
    #[arg(long, default_value = "coding")]
    profile: PromptProfile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    // Logs go to stderr, the conversation to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env()?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(workspace) = cli.workspace {
        config.workspace_path = workspace;
    }
    info!(
        "Loaded configuration: model={}, workspace={}, profile={}",
        config.model,
        config.workspace_path.display(),
        cli.profile
    );

    let llm = GeminiClient::new(
        config.api_key.clone(),
        config.api_host.clone(),
        config.model.clone(),
    )?;
    let agent = Agent::new(&config, Arc::new(llm));
    let mut session = agent.new_session(cli.profile);
    info!(session = %session.id(), "Session started");

    let farewell = match cli.profile {
        PromptProfile::Persona => PERSONA_FAREWELL,
        _ => FAREWELL,
    };
    println!("\n🤖 stepwise {} agent initialized!", cli.profile);
    println!("🚀 How can I help you today?");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n🧑‍💻 You: ");
        tokio::io::stdout().flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("{}", farewell);
                return Ok(());
            }
        };
        let Some(query) = line else {
            println!("{}", farewell);
            return Ok(());
        };
        let query = query.trim();
        if query.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&query.to_lowercase().as_str()) {
            println!("{}", farewell);
            return Ok(());
        }

        let mut on_event = |event: AgentEvent| print_event(event);
        let outcome = tokio::select! {
            outcome = agent.run_query(&mut session, query, &mut on_event) => outcome?,
            _ = tokio::signal::ctrl_c() => {
                println!("{}", farewell);
                return Ok(());
            }
        };
        report(&outcome);
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

fn print_event(event: AgentEvent) {
    match event {
        AgentEvent::Step { kind, content } => match kind {
            StepKind::Output | StepKind::Result => println!("\n🤖 {}: {}", kind.as_str().to_uppercase(), content),
            _ => println!("\n🧠 {}: {}", kind.as_str().to_uppercase(), content),
        },
        AgentEvent::Action { tool, content } => {
            println!("\n⚙️ ACTION: Calling {}... {}", tool, content)
        }
        AgentEvent::Observation { output, .. } => {
            let shown = match &output {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            };
            println!("\n🔍 OBSERVATION: {}", preview(&shown));
        }
        AgentEvent::InvalidJson { attempt, .. } => {
            println!("\n[ERROR] Received invalid JSON response from the model (attempt {}). Retrying...", attempt)
        }
        AgentEvent::TransportRetry { attempt, error } => {
            println!("\n[ERROR] Error during API call (attempt {}): {}. Retrying...", attempt, error)
        }
        AgentEvent::Warning(message) => println!("\n[WARNING] {}", message),
    }
}

fn report(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Answered(_) | TurnOutcome::UnknownTool(_) | TurnOutcome::UnknownStep(_) => {}
        TurnOutcome::MalformedReplies => {
            println!("\n[ERROR] The model kept replying with invalid JSON. Please rephrase and try again.")
        }
        TurnOutcome::TransportFailed(error) => {
            println!("\n[ERROR] Could not reach the model: {}", error)
        }
        TurnOutcome::StepLimit => {
            println!("\n[WARNING] Stopped after reaching the step limit for this query.")
        }
    }
}
