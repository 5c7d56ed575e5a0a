use std::fs::File;
use std::sync::Mutex;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod config;
mod conversation;
mod format;
mod handler;
mod report;
mod session;
mod tui;
mod ui;

use app::App;
use client::HttpQueryService;
use config::Config;
use conversation::Conversation;
use format::format_amount;
use report::{classify, ReportView};
use session::Session;

#[derive(Parser)]
#[command(name = "agrichat")]
#[command(version)]
#[command(about = "Chat client for the agricultural sales analytics backend")]
struct Cli {
    /// Backend URL (overrides AGRICHAT_URL and the config file)
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single query and print the reply
    Ask {
        /// Your question about the sales data
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_default();
    let backend_url = cli
        .url
        .clone()
        .unwrap_or_else(|| config::resolve_backend_url(&config));

    // The auth gate: without a session token nothing else runs.
    let Some(session) = Session::resolve(&config) else {
        eprintln!("{}", "No session token found.".red());
        eprintln!(
            "Set {} or add {} to your config file.",
            "AGRICHAT_TOKEN".bold(),
            "api_token".bold()
        );
        std::process::exit(1);
    };

    init_logging()?;

    match cli.command {
        Some(Commands::Ask { question }) => ask_once(session, &backend_url, &question).await,
        None => run_tui(session, &backend_url).await,
    }
}

/// Log to the file named by `AGRICHAT_LOG`, or not at all. The TUI owns the
/// terminal, so stderr output would tear the screen.
fn init_logging() -> Result<()> {
    let Ok(path) = std::env::var("AGRICHAT_LOG") else {
        return Ok(());
    };

    let file = File::create(&path)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run_tui(session: Session, backend_url: &str) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(session, backend_url);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;
        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event).await?;
        }
    }

    tui::restore()?;
    Ok(())
}

/// One round-trip on stdout, driven by the same conversation state machine
/// as the TUI.
async fn ask_once(session: Session, backend_url: &str, question: &str) -> Result<()> {
    let service = HttpQueryService::new(backend_url, Some(session.token().to_string()));
    let mut conversation = Conversation::new();

    if conversation.submit(&service, question).await.is_err() {
        bail!("question is empty");
    }

    let Some(reply) = conversation.last_message() else {
        bail!("no reply recorded");
    };

    if conversation.status() == conversation::RequestStatus::Failed {
        eprintln!("{}", reply.text.red());
        std::process::exit(1);
    }

    println!("{}", reply.text);

    if let Some(view) = reply.payload.as_ref().and_then(|p| classify(p)) {
        println!();
        print_report(&view);
    }

    Ok(())
}

fn print_report(view: &ReportView) {
    match view {
        ReportView::Totals { estimated, value } => {
            println!(
                "{:<24} {}",
                "Estimated Sales".bold().green(),
                format_amount(*estimated)
            );
            println!(
                "{:<24} {}",
                "Total Value".bold().green(),
                format_amount(*value)
            );
        }
        ReportView::CropSales { rows } => print_sales_table("Crop", rows),
        ReportView::ZoneSales { rows } => print_sales_table("Zone", rows),
        ReportView::TopCrops { rows } => {
            println!("{}", "Top Performing Crops".bold().green());
            for (i, row) in rows.iter().enumerate() {
                println!(
                    "{}. {:<16} {:>14}",
                    (i + 1).to_string().bold().blue(),
                    row.label,
                    format_amount(row.value)
                );
            }
        }
        ReportView::Distribution { rows } => {
            println!(
                "{}",
                format!("{:<14} {:<14} {:>8}", "Zone", "Crop", "Records")
                    .bold()
                    .green()
            );
            for row in rows {
                // Counts print bare, unlike the formatted sales cells
                println!("{:<14} {:<14} {:>8}", row.zone, row.crop, row.count);
            }
        }
        ReportView::Raw(value) => {
            let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            println!("{}", text.dimmed());
        }
    }
}

fn print_sales_table(label_header: &str, rows: &[report::SalesRow]) {
    println!(
        "{}",
        format!("{:<16} {:>14} {:>14}", label_header, "Estimated", "Value")
            .bold()
            .green()
    );
    for row in rows {
        println!(
            "{:<16} {:>14} {:>14}",
            row.label,
            format_amount(row.estimated),
            format_amount(row.value)
        );
    }
}
