use std::io::{self, Write};
use std::sync::Arc;

use color_eyre::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use parlance::adapters::{InMemoryStore, ReqwestHttpClient, StaticIdentity};
use parlance::config::ClientConfig;
use parlance::controller::{ChatController, ChatEvent, RejectReason, SubmitOutcome};
use parlance::models::{provider, MessageRole, ASSISTANT_PLACEHOLDER};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print the assistant reply as it is revealed.
///
/// Only the growth of the streaming assistant message is written, so stdout
/// reads like a transcript.
fn spawn_printer(mut events: mpsc::UnboundedReceiver<ChatEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut busy = false;
        let mut printed = String::new();
        while let Some(event) = events.recv().await {
            match event {
                ChatEvent::StateChanged(state) => {
                    if busy && !state.is_busy() && !printed.is_empty() {
                        println!();
                        printed.clear();
                    }
                    busy = state.is_busy();
                }
                ChatEvent::DisplayChanged(messages) if busy => {
                    let Some(last) = messages
                        .iter()
                        .rev()
                        .find(|m| m.role == MessageRole::Assistant)
                    else {
                        continue;
                    };
                    if !last.is_complete && last.content == ASSISTANT_PLACEHOLDER {
                        continue;
                    }
                    match last.content.strip_prefix(printed.as_str()) {
                        Some(delta) => print!("{}", delta),
                        // Rewritten (e.g. replaced by an error); start over.
                        None => print!("\n{}", last.content),
                    }
                    let _ = io::stdout().flush();
                    printed = last.content.clone();
                }
                ChatEvent::TitleUpdated { title, .. } => {
                    tracing::info!(%title, "chat title");
                }
                _ => {}
            }
        }
    })
}

async fn run_turn(controller: &ChatController, prompt: &str) -> bool {
    match controller.submit(prompt).await {
        SubmitOutcome::Completed { .. } => true,
        SubmitOutcome::Rejected(RejectReason::EmptyInput) => true,
        SubmitOutcome::Rejected(reason) => {
            eprintln!("Not sent: {:?}", reason);
            false
        }
        SubmitOutcome::Failed(err) => {
            eprintln!("{} ({})", err.user_message(), err.recovery_hint());
            false
        }
    }
}

/// Next prompt from the interactive loop; `None` at end of input or on an
/// empty line.
async fn next_prompt<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> io::Result<Option<String>> {
    eprint!("> ");
    let _ = io::stderr().flush();
    Ok(lines.next_line().await?.filter(|line| !line.trim().is_empty()))
}

fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("parlance {}", VERSION);
        return Ok(());
    }

    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = ClientConfig::load()?;
    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config, prompt))
}

async fn run(config: ClientConfig, prompt: String) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_printer(rx);

    let model_name = provider::model_display_name(&config.provider, &config.resolved_model());
    let controller = ChatController::builder(
        Arc::new(InMemoryStore::new()),
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(StaticIdentity::from_env("local")),
    )
    .with_config(config)
    .with_events(tx)
    .build()?;

    if !prompt.trim().is_empty() {
        let ok = run_turn(&controller, &prompt).await;
        drop(controller);
        let _ = printer.await;
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    eprintln!("parlance {} ({}), empty line to quit", VERSION, model_name);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = next_prompt(&mut lines).await? {
        run_turn(&controller, &line).await;
    }
    drop(controller);
    let _ = printer.await;
    Ok(())
}
