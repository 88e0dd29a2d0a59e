use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, DefaultEditor, Editor, Helper};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use ttd_application::{Progress, ProtocolUseCase, TurnError, TurnOutcome};
use ttd_core::assistant::AssistantClient;
use ttd_core::conversation::MessageRole;
use ttd_core::phase::Phase;
use ttd_core::session::Session;
use ttd_infrastructure::{
    ClipboardSink, ConfigService, FileDownloadSink, FileKeyValueStore, SnapshotGateway, TtdPaths,
};
use ttd_interaction::ClaudeApiAgent;

const COMMANDS: [&str; 5] = ["/download", "/copy", "/status", "/reset", "/help"];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// A finished turn, reported back to the REPL by the background task.
enum TurnEvent {
    Finished(Result<TurnOutcome, TurnError>),
}

/// Routes logs to a daily file so they never interleave with the prompt.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let logs_dir = match TtdPaths::logs_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{}", format!("Logging disabled: {}", e).yellow());
            return None;
        }
    };
    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("{}", format!("Logging disabled: {}", e).yellow());
        return None;
    }

    let appender = tracing_appender::rolling::daily(logs_dir, "ttd.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn print_messages(session: &Session) {
    for message in session.messages() {
        match message.role {
            MessageRole::Researcher => {
                println!("{}", format!("> {}", message.content).green());
            }
            MessageRole::Assistant => {
                for line in message.content.lines() {
                    println!("{}", line.bright_blue());
                }
            }
        }
        println!();
    }
}

fn print_status(progress: &Progress, save_status: &str) {
    println!(
        "{}",
        format!("Phase: {}", progress.phase.label()).bright_magenta()
    );
    if !progress.research_question.is_empty() {
        println!("Research question: {}", progress.research_question);
    }
    if let Some(item) = progress.current_item {
        println!("Current item: {} {}", item.code(), item.title());
    }
    for (heading, items) in [
        ("Specification", &progress.specification),
        ("Emulation", &progress.emulation),
    ] {
        println!("{}", heading.bold());
        for (item, done) in items.iter() {
            let mark = if *done { "x".green() } else { " ".normal() };
            println!("  [{}] {} {}", mark, item.code(), item.title());
        }
    }
    println!("{}", format!("Save status: {}", save_status).bright_black());
}

fn print_help() {
    println!("{}", "Type your answers to the methodologist at the prompt.".bright_black());
    println!("{}", "  /download [dir]  Save the protocol as a Markdown file".bright_black());
    println!("{}", "  /copy            Copy the protocol to the clipboard".bright_black());
    println!("{}", "  /status          Show the current phase and item progress".bright_black());
    println!("{}", "  /reset           Discard this session and start over".bright_black());
    println!("{}", "  quit             Exit".bright_black());
}

fn print_outcome(result: Result<TurnOutcome, TurnError>) {
    match result {
        Ok(TurnOutcome::Replied {
            reply,
            entered_phase,
            ..
        }) => {
            for line in reply.lines() {
                println!("{}", line.bright_blue());
            }
            match entered_phase {
                Some(Phase::Complete) => println!(
                    "{}",
                    "Protocol complete. Use /download or /copy to export it.".bright_green()
                ),
                Some(phase) => println!("{}", format!("Now in: {}", phase.label()).bright_magenta()),
                None => {}
            }
        }
        Ok(TurnOutcome::Failed { apology, .. }) => println!("{}", apology.red()),
        Err(TurnError::Busy) => {
            println!("{}", "Still waiting for the previous reply...".yellow())
        }
        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
    }
    println!();
}

/// Asks a yes/no question on a plain editor; anything but "y"/"yes" is no.
fn confirm(question: &str) -> bool {
    let Ok(mut editor) = DefaultEditor::new() else {
        return false;
    };
    match editor.readline(&format!("{} [y/N] ", question)) {
        Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

/// Entry point for the `ttd` REPL.
///
/// Restores the last session (or greets a new one), then sends each line to
/// the methodologist on a background task so the prompt stays responsive.
/// Slash commands export, inspect, or reset the protocol.
#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_tracing();

    // ===== Backend Initialization =====
    let config = ConfigService::new().get_config();

    let store = match &config.storage.data_dir {
        Some(dir) => FileKeyValueStore::new(dir),
        None => FileKeyValueStore::default_location()
            .context("Cannot locate the data directory for session state")?,
    };
    let gateway = SnapshotGateway::new(Arc::new(store));

    let agent = ClaudeApiAgent::try_from_config(&config.assistant).map_err(|e| {
        eprintln!(
            "{}",
            "Set ANTHROPIC_API_KEY or add a \"claude\" entry to secret.json.".yellow()
        );
        anyhow::Error::new(e)
    })?;
    let model = agent
        .model_override()
        .unwrap_or(&config.assistant.model)
        .to_string();
    let assistant: Arc<dyn AssistantClient> = Arc::new(agent);

    let usecase = Arc::new(ProtocolUseCase::new(gateway, assistant, &config.assistant));
    let restored = usecase.restore_or_start().await;
    tracing::info!(
        "[ttd] Session ready (restored: {}, model: {})",
        restored,
        model
    );

    let download_dir = config
        .export
        .download_dir
        .clone()
        .unwrap_or_else(TtdPaths::default_download_dir);
    let file_sink = FileDownloadSink::new(download_dir);
    let clipboard_sink = ClipboardSink::new();

    let (event_tx, mut event_rx) = mpsc::channel::<TurnEvent>(8);

    let event_handler = tokio::spawn(async move {
        while let Some(TurnEvent::Finished(result)) = event_rx.recv().await {
            print_outcome(result);
        }
    });

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Target Trial Designer ===".bright_magenta().bold());
    println!(
        "{}",
        "Type '/help' for commands, or 'quit' to exit.".bright_black()
    );
    println!();

    let session = usecase.session().await;
    if restored {
        println!(
            "{}",
            format!("Resuming your session ({}).", session.phase.label()).bright_black()
        );
        println!();
    }
    print_messages(&session);

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                match trimmed {
                    "/help" => print_help(),
                    "/status" => {
                        let progress = usecase.progress().await;
                        let save_status = usecase.save_status().await;
                        print_status(&progress, save_status.as_str());
                    }
                    command if command == "/download" || command.starts_with("/download ") => {
                        let dir = command["/download".len()..].trim();
                        let sink = if dir.is_empty() {
                            file_sink.clone()
                        } else {
                            FileDownloadSink::new(dir)
                        };
                        match usecase.export(&sink).await {
                            Ok(path) => println!("{}", format!("Saved to {}", path).bright_green()),
                            Err(e) => eprintln!("{}", e.to_string().red()),
                        }
                    }
                    "/copy" => match usecase.export(&clipboard_sink).await {
                        Ok(_) => println!("{}", "Copied to clipboard.".bright_green()),
                        Err(e) => eprintln!("{}", e.to_string().red()),
                    },
                    "/reset" => {
                        if usecase.is_busy() {
                            println!("{}", "Still waiting for the previous reply...".yellow());
                            continue;
                        }
                        let question = if usecase.phase().await.is_complete() {
                            "Your protocol is complete. Export it first with /download or /copy. Reset anyway?"
                        } else {
                            "Discard this session and start over?"
                        };
                        if !confirm(question) {
                            continue;
                        }
                        match usecase.reset().await {
                            Ok(()) => print_messages(&usecase.session().await),
                            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                        }
                    }
                    command if command.starts_with('/') => {
                        println!("{}", "Unknown command".bright_black());
                    }
                    input => {
                        if usecase.is_busy() {
                            println!("{}", "Still waiting for the previous reply...".yellow());
                            continue;
                        }
                        println!("{}", format!("> {}", input).green());

                        let tx = event_tx.clone();
                        let usecase = Arc::clone(&usecase);
                        let input = input.to_string();
                        tokio::spawn(async move {
                            let result = usecase.submit(&input).await;
                            let _ = tx.send(TurnEvent::Finished(result)).await;
                        });
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    // Pending turns hold senders; the handler ends once they finish.
    drop(event_tx);
    let _ = event_handler.await;
    usecase.flush_saves().await;

    Ok(())
}
