//! Line-oriented terminal chat against a local Ollama server.
//!
//! Reads `~/.config/ollama-chat/config.json` (written with defaults on first
//! run) and keeps conversations in `~/.local/share/ollama-chat`.
//!
//! Run with:
//!
//! ```sh
//! RUST_LOG=murmur_engine=debug cargo run --example chat -p murmur
//! ```
//!
//! Commands: `/models`, `/model NAME`, `/new`, `/history`, `/load ID`,
//! `/stop`, `/quit`. Anything else is sent as a message; `@file` mentions
//! and the first URL are inlined.

use std::io::Write as _;
use std::sync::Arc;

use murmur::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

struct TerminalSink;

impl TerminalSink {
    fn flush() {
        let _ = std::io::stdout().flush();
    }
}

impl EventSink for TerminalSink {
    fn on_delta(&mut self, text: &str) {
        print!("{text}");
        Self::flush();
    }

    fn on_generation_finished(&mut self, _message: &ChatMessage) {
        println!();
    }

    fn on_generation_cancelled(&mut self, _message: &ChatMessage) {
        println!(" [stopped]");
    }

    fn on_generation_failed(&mut self, reason: &str) {
        println!();
        eprintln!("error: {reason}");
    }

    fn on_catalog_replaced(&mut self, catalog: &Catalog, selected: Option<&str>) {
        eprintln!(
            "{} model(s) available, using {}",
            catalog.len(),
            selected.unwrap_or("none")
        );
    }

    fn on_status(&mut self, text: &str, kind: StatusKind) {
        match kind {
            StatusKind::Error => eprintln!("[{text}]"),
            StatusKind::Success | StatusKind::Info => eprintln!("({text})"),
        }
    }
}

enum Command<'a> {
    Models,
    Model(&'a str),
    New,
    History,
    Load(&'a str),
    Stop,
    Quit,
    Say(&'a str),
}

fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    match line.split_once(' ') {
        Some(("/model", name)) => Command::Model(name.trim()),
        Some(("/load", id)) => Command::Load(id.trim()),
        _ => match line {
            "/models" => Command::Models,
            "/new" => Command::New,
            "/history" => Command::History,
            "/stop" => Command::Stop,
            "/quit" => Command::Quit,
            _ => Command::Say(line),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config_store = ConfigStore::default_location()?;
    let mut config = match config_store.load().await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "using default config");
            ChatConfig::default()
        }
    };

    let mut client = ChatClient::new(Arc::new(HttpTransport::new()), TerminalSink)
        .with_settings(config.engine_settings())
        .with_options(config.inference_options())
        .with_web_search(config.web_search_enabled)
        .with_preferred_model(config.selected_model.clone());
    if let Some(history) = FsConversationStore::default_location() {
        client = client.with_store(Arc::new(history));
    }

    let (lines_tx, mut lines) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = stdin.next_line().await {
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });

    client.refresh_models();

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match parse(&line) {
                    Command::Quit => break,
                    Command::Models => {
                        let state = client.state();
                        for name in state.catalog().names() {
                            let marker = if Some(name) == state.selected_model() { '*' } else { ' ' };
                            println!("{marker} {name}");
                        }
                        client.refresh_models();
                    }
                    Command::Model(name) => {
                        if client.select_model(name) {
                            config.selected_model = Some(name.to_owned());
                            if let Err(e) = config_store.save(&config).await {
                                tracing::warn!(error = %e, "could not save config");
                            }
                        } else if client.state().selected_model() != Some(name) {
                            eprintln!("unknown model: {name}");
                        }
                    }
                    Command::New => match client.new_conversation().await {
                        Ok(id) => eprintln!("(new conversation {id})"),
                        Err(e) => eprintln!("error: {e}"),
                    },
                    Command::History => match client.saved_conversations().await {
                        Ok(ids) => ids.iter().for_each(|id| println!("  {id}")),
                        Err(e) => eprintln!("error: {e}"),
                    },
                    Command::Load(id) => match client.load_conversation(id).await {
                        Ok(()) => {
                            for message in client.state().conversation().messages() {
                                let who = match message.role {
                                    Role::User => "you",
                                    Role::Assistant => "model",
                                };
                                println!("{who}: {}", message.content);
                            }
                        }
                        Err(e) => eprintln!("error: {e}"),
                    },
                    Command::Stop => {
                        if !client.cancel() {
                            eprintln!("(nothing to stop)");
                        }
                    }
                    Command::Say(text) => {
                        if let Err(e) = client.send_chat(text) {
                            eprintln!("error: {e}");
                        }
                    }
                }
            }
            _ = client.next_event() => {}
        }
    }

    if client.state().generation().is_busy() {
        client.cancel();
        client.run_until_idle().await;
    }
    client.flush_saves().await;
    Ok(())
}
