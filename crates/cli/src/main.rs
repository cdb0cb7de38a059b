//! `lale`: Turkish natural-language calendar and task assistant.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::debug;

use lale_core::{IntentTag, Settings};
use lale_dispatch::{Assistant, Reply};
use lale_llm::RemoteClassifier;
use lale_observability::init_tracing;
use lale_storage::Store;

#[derive(Parser)]
#[command(name = "lale", version, about = "Türkçe doğal dilden ajanda ve görev asistanı")]
struct Cli {
    /// Database URL; `memory` keeps everything in process.
    #[arg(long, env = "LALE_DATABASE_URL", default_value = "sqlite://lale.db")]
    database_url: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interpret and execute a single utterance.
    Process {
        /// The utterance, given as one or more words.
        text: Vec<String>,
        /// Print the structured reply instead of the message.
        #[arg(long)]
        json: bool,
    },
    /// Interactive session; `çık` ends it.
    Chat,
    /// List calendar events.
    Events {
        /// One of: today, week, month, upcoming, all.
        #[arg(long, default_value = "all")]
        range: String,
    },
    /// List tasks.
    Tasks {
        /// Include completed tasks.
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let settings = Settings::from_env();
    let store = Store::connect(&cli.database_url)
        .await
        .with_context(|| format!("opening store at {}", cli.database_url))?;
    let remote = settings
        .remote
        .clone()
        .map(RemoteClassifier::new)
        .transpose()
        .context("building remote classifier")?;
    debug!(remote = remote.is_some(), "assistant configured");
    let assistant = Assistant::new(store, settings, remote);

    match cli.command {
        Command::Process { text, json } => {
            let text = text.join(" ");
            let reply = assistant.handle(&text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            } else {
                println!("{}", reply.message);
            }
        }
        Command::Chat => chat(&assistant).await?,
        Command::Events { range } => {
            let reply = assistant
                .dispatch(
                    action(IntentTag::ListEvents, "range", &range),
                    local_now(&assistant),
                )
                .await?;
            print_events(&reply);
        }
        Command::Tasks { all } => {
            let scope = if all { "all" } else { "today" };
            let reply = assistant
                .dispatch(
                    action(IntentTag::ListTasks, "scope", scope),
                    local_now(&assistant),
                )
                .await?;
            print_tasks(&reply);
        }
    }
    Ok(())
}

async fn chat(assistant: &Assistant<Store>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Lale hazır. Çıkmak için 'çık' yazın.");
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "çık" | "exit" | "quit") {
            break;
        }
        match assistant.handle(line).await {
            Ok(reply) => println!("{}", reply.message),
            Err(err) => eprintln!("hata: {err}"),
        }
    }
    Ok(())
}

fn local_now(assistant: &Assistant<Store>) -> chrono::DateTime<chrono_tz::Tz> {
    Utc::now().with_timezone(&assistant.settings().timezone())
}

fn action(intent: IntentTag, key: &str, value: &str) -> lale_core::Action {
    let mut payload = Map::new();
    payload.insert(key.to_string(), json!(value));
    lale_core::Action::new(intent, payload)
}

fn print_events(reply: &Reply) {
    println!("{}", reply.message);
    for event in array(&reply.data, "events") {
        let when = event
            .get("start")
            .and_then(Value::as_str)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|at| at.format("%d.%m.%Y %H:%M UTC").to_string())
            .unwrap_or_else(|| "tarihsiz".to_string());
        println!(
            "  #{} {} | {}",
            event.get("id").and_then(Value::as_i64).unwrap_or_default(),
            when,
            event.get("title").and_then(Value::as_str).unwrap_or(""),
        );
    }
}

fn print_tasks(reply: &Reply) {
    println!("{}", reply.message);
    for task in array(&reply.data, "tasks") {
        let status = task.get("status").and_then(Value::as_str).unwrap_or("open");
        let marker = if status == "done" { "[x]" } else { "[ ]" };
        println!(
            "  {} #{} {}",
            marker,
            task.get("id").and_then(Value::as_i64).unwrap_or_default(),
            task.get("title").and_then(Value::as_str).unwrap_or(""),
        );
    }
}

fn array<'a>(data: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}
