//! A terminal front end for the travel assistant.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use itinera::config::parse_duration;
use itinera::core::conversation::{Message, Role};
use itinera::core::{
    ConversationError, ConversationOutcome, DEFAULT_MAX_TURNS, Stage,
    TerminationReason,
};
use itinera::{Config, ProviderKind, Session, SessionBuilder};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::select;
use tokio::sync::mpsc;

const BAR_CHAR: &str = "▎";

/// Ask a travel assistant about flights, hotels and destinations.
#[derive(Debug, Parser)]
#[command(name = "itinera", version, about)]
struct Cli {
    /// Question to answer. Starts an interactive prompt when omitted.
    query: Option<String>,

    /// Model backend: `openai` or `ollama`.
    #[arg(long, env = "ITINERA_PROVIDER", default_value_t = ProviderKind::OpenAI)]
    provider: ProviderKind,

    /// Model name, defaults to the provider's default model.
    #[arg(long, env = "ITINERA_MODEL")]
    model: Option<String>,

    /// Endpoint of the chat-completions API.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// API key for the provider.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Sampling temperature between 0 and 1.
    #[arg(long, env = "ITINERA_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Maximum planner turns per question.
    #[arg(long, env = "ITINERA_MAX_TURNS", default_value_t = DEFAULT_MAX_TURNS)]
    max_turns: usize,

    /// Give up when the model takes longer than this to reply, e.g. `60s`.
    #[arg(long, env = "ITINERA_PLANNER_TIMEOUT", value_parser = parse_duration)]
    planner_timeout: Option<Duration>,

    /// Fail a tool call that takes longer than this, e.g. `5s`.
    #[arg(long, env = "ITINERA_TOOL_TIMEOUT", value_parser = parse_duration)]
    tool_timeout: Option<Duration>,

    /// Print each outcome as JSON instead of the chat history.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            provider: self.provider,
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            temperature: self.temperature,
            max_turns: self.max_turns,
            planner_timeout: self.planner_timeout,
            tool_timeout: self.tool_timeout,
        }
    }
}

enum SessionEvent {
    Stage(Stage),
    Message(Message),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            warn!("failed to load .env: {err}");
        }
    }
    let cli = Cli::parse();

    let config = cli.to_config();
    if let Err(err) = config.validate() {
        eprintln!("{} {err}", "error:".bright_red().bold());
        return ExitCode::from(2);
    }
    debug!("starting with {config:?}");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let session = SessionBuilder::with_config(&config)
        .on_stage_change({
            let event_tx = event_tx.clone();
            move |stage| {
                event_tx.send(SessionEvent::Stage(stage)).ok();
            }
        })
        .on_message({
            let event_tx = event_tx.clone();
            move |msg| {
                event_tx.send(SessionEvent::Message(msg.clone())).ok();
            }
        })
        .build();
    let mut session = match session {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{} {err}", "error:".bright_red().bold());
            return ExitCode::FAILURE;
        }
    };

    if let Some(query) = &cli.query {
        return if ask(&mut session, &mut event_rx, query, cli.json).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    // One reader for the whole session, so piped lines it has already
    // buffered are not lost between prompts.
    let mut input = io::BufReader::new(io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut input).await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        ask(&mut session, &mut event_rx, line, cli.json).await;
    }
    ExitCode::SUCCESS
}

/// Runs one question to completion. Returns `false` if the planner failed.
async fn ask(
    session: &mut Session,
    event_rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
    query: &str,
    json: bool,
) -> bool {
    let progress_bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
        progress_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    progress_bar.set_message("🤔 Thinking...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let mut outcome_fut = pin!(session.send_message(query));
    let result = loop {
        select! {
            result = &mut outcome_fut => break result,
            Some(event) = event_rx.recv() => {
                handle_event(&progress_bar, event, json);
            }
        }
    };
    // Messages appended right before the outcome may still be queued.
    while let Ok(event) = event_rx.try_recv() {
        handle_event(&progress_bar, event, json);
    }
    progress_bar.finish_and_clear();

    match result {
        Ok(outcome) => {
            print_outcome(&outcome, json);
            true
        }
        Err(err) => {
            print_error(&err);
            false
        }
    }
}

fn handle_event(progress_bar: &ProgressBar, event: SessionEvent, json: bool) {
    match event {
        SessionEvent::Stage(Stage::ExecutingTool) => {
            progress_bar.set_message("🔧 Calling tools...");
        }
        SessionEvent::Stage(_) => {
            progress_bar.set_message("🤔 Thinking...");
        }
        SessionEvent::Message(msg) if !json => {
            progress_bar.suspend(|| print_message(&msg));
        }
        SessionEvent::Message(_) => {}
    }
}

fn print_message(msg: &Message) {
    match msg.role() {
        Role::User => {
            println!("{}🧑 {}", BAR_CHAR.bright_blue(), msg.content());
        }
        Role::Planner => {
            let text = msg.content().to_string();
            if !text.trim().is_empty() {
                println!("{}🤖 {}", BAR_CHAR.bright_cyan(), text.bright_white());
            }
            for call in msg.tool_calls() {
                println!(
                    "{}   ↳ {} {}",
                    BAR_CHAR.bright_cyan(),
                    call.name.bold(),
                    call.arguments.dimmed()
                );
            }
        }
        Role::Tool => {
            let name = msg.tool_call().map(|call| call.name.as_str());
            let name = name.unwrap_or("tool");
            match msg.tool_result() {
                Some(result) if result.is_success() => println!(
                    "{}🔧 {} {}",
                    BAR_CHAR.bright_green(),
                    name,
                    result.value().dimmed()
                ),
                Some(result) => println!(
                    "{}🔧 {} {}",
                    BAR_CHAR.bright_red(),
                    name,
                    result.error_message().unwrap_or_default().bright_red()
                ),
                None => println!("{}🔧 {}", BAR_CHAR.bright_green(), name),
            }
        }
    }
}

fn print_outcome(outcome: &ConversationOutcome, json: bool) {
    if json {
        match serde_json::to_string_pretty(outcome) {
            Ok(text) => println!("{text}"),
            Err(err) => error!("failed to serialize the outcome: {err}"),
        }
        return;
    }

    if let TerminationReason::TurnLimitExceeded { limit } = outcome.reason {
        println!(
            "\n{}",
            format!("⚠️  Stopped after reaching the limit of {limit} turns.")
                .bright_yellow()
        );
    }
    println!("\n{}", "Summary".bold().underline());
    if outcome.summary.is_empty() {
        println!("{}", "(no answer)".dimmed());
    } else {
        println!("{}", outcome.summary);
    }
    println!();
}

fn print_error(err: &ConversationError) {
    eprintln!("{} {err}", "error:".bright_red().bold());
    eprintln!(
        "{}",
        format!(
            "The conversation stopped after {} message(s).",
            err.transcript().len()
        )
        .dimmed()
    );
}

async fn read_line<R>(input: &mut Lines<R>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    match input.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_keeps_buffered_input() {
        let piped: &[u8] =
            b"Status of AA100?\nHotels in Paris\n\nWeather in Rome";
        let mut input = io::BufReader::new(piped).lines();

        assert_eq!(
            read_line(&mut input).await.as_deref(),
            Some("Status of AA100?")
        );
        assert_eq!(
            read_line(&mut input).await.as_deref(),
            Some("Hotels in Paris")
        );
        assert_eq!(read_line(&mut input).await.as_deref(), Some(""));
        assert_eq!(
            read_line(&mut input).await.as_deref(),
            Some("Weather in Rome")
        );
        assert_eq!(read_line(&mut input).await, None);
    }
}
