use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ditd::core::models::{Card, VerificationMode};
use ditd::rpc::{CommandResult, DaemonStatus, RpcClient};
use ditd::{adapters, cli, config, context, core::Orchestrator, logging};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "ditd")]
#[command(about = "DIT card offload and verification daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to /etc/ditd/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Daemon RPC address, for client commands
    #[arg(long, global = true)]
    addr: Option<SocketAddr>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the offload engine and RPC server
    Daemon(ServerArgs),
    /// Print daemon status and the card deck
    Status,
    /// Interactive terminal dashboard
    Tui,
    /// Print the effective configuration as TOML
    Config,
    /// Send a single command to the daemon
    #[command(subcommand)]
    Ctl(CtlCommand),
}

#[derive(Args, Serialize)]
struct ServerArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, value_parser = parse_mode)]
    verification_mode: Option<VerificationMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    rpc_bind: Option<SocketAddr>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    json_logs: Option<bool>,

    /// Read `mount <id>` / `eject <id>` lines from stdin as reader events
    #[serde(skip)]
    #[arg(long)]
    stdin_control: bool,
}

#[derive(Subcommand)]
enum CtlCommand {
    Start { id: String },
    Pause { id: String },
    StartAll,
    Speed { id: String },
    Eject { id: String },
    Mount { id: String },
    Lock { id: String },
    PanelLock,
    Verify {
        #[arg(value_parser = parse_mode)]
        mode: VerificationMode,
    },
    Path { id: String, path: String },
    Name { id: String, name: String },
    History { id: String },
    Report { id: String },
    /// Dailies transcode desk
    #[command(subcommand)]
    Transcode(TranscodeCommand),
}

#[derive(Subcommand)]
enum TranscodeCommand {
    /// Show the current render settings
    Settings,
    /// Merge a JSON object of fields into the settings
    Set { json: String },
    Estimate { clip: String },
    Render { clip: String },
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn parse_mode(s: &str) -> Result<VerificationMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "quick" => Ok(VerificationMode::Quick),
        "full" => Ok(VerificationMode::Full),
        other => Err(format!("unknown verification mode '{other}' (quick|full)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.as_deref();

    let config = match &cli.command {
        Commands::Daemon(args) => config::AppConfig::new(Some(args), path)?,
        _ => config::AppConfig::new(None::<&ServerArgs>, path)?,
    };
    let addr = cli.addr.unwrap_or(config.rpc_bind);

    match &cli.command {
        Commands::Daemon(args) => {
            logging::init(logging::LogConfig::from(&config))?;
            let stdin_control = args.stdin_control;
            let ctx = context::AppContext::new(config);
            run_daemon(ctx, stdin_control).await.context("Failed to start daemon")?
        }
        Commands::Status => run_status(addr).await.context("Failed to check status of daemon")?,
        Commands::Tui => cli::tui::run(addr).await?,
        Commands::Config => print!("{}", config.to_toml()?),
        Commands::Ctl(command) => run_ctl(addr, command).await?,
    }

    Ok(())
}

async fn run_daemon(ctx: context::AppContext, stdin_control: bool) -> Result<()> {
    let card_ids = ctx
        .engine
        .lock()
        .await
        .cards()
        .iter()
        .map(|c| c.id.clone())
        .collect();
    let monitor = adapters::get_monitor(card_ids, stdin_control);
    Orchestrator::new(ctx, monitor).start().await
}

async fn run_status(addr: SocketAddr) -> Result<()> {
    let client = RpcClient::new(addr);
    let status: DaemonStatus = client.call_no_params("daemon.status").await?;
    let cards: Vec<Card> = client.call_no_params("cards.list").await?;

    println!(
        "ditd v{}  up {}s  verify: {}  active: {}{}",
        status.version,
        status.uptime_secs,
        status.verification_mode.as_str(),
        status.active_cards,
        if status.panel_locked { "  [panel locked]" } else { "" }
    );
    for card in cards {
        println!(
            "  {:<8} {:<8} {:<16} {:<10} {:>5.1}%{}",
            card.id,
            card.slot_label,
            card.label,
            card.status.as_str(),
            card.progress,
            if card.is_locked { "  locked" } else { "" }
        );
    }
    Ok(())
}

async fn run_ctl(addr: SocketAddr, command: &CtlCommand) -> Result<()> {
    let client = RpcClient::new(addr);
    let result: Value = match command {
        CtlCommand::Start { id } => client.call_card("cards.start", id).await?,
        CtlCommand::Pause { id } => client.call_card("cards.pause", id).await?,
        CtlCommand::Speed { id } => client.call_card("cards.toggle_speed", id).await?,
        CtlCommand::Eject { id } => client.call_card("cards.eject", id).await?,
        CtlCommand::Mount { id } => client.call_card("cards.mount", id).await?,
        CtlCommand::Lock { id } => client.call_card("cards.toggle_lock", id).await?,
        CtlCommand::History { id } => client.call_card("cards.history", id).await?,
        CtlCommand::Report { id } => client.call_card("report.generate", id).await?,
        CtlCommand::StartAll => {
            let result: CommandResult = client.call_no_params("cards.start_all").await?;
            serde_json::to_value(result)?
        }
        CtlCommand::PanelLock => client.call_no_params("panel.toggle_lock").await?,
        CtlCommand::Verify { mode } => {
            client
                .call("verification.set", Some(serde_json::json!({ "mode": mode })))
                .await?
        }
        CtlCommand::Path { id, path } => {
            client
                .call("cards.set_path", Some(serde_json::json!({ "id": id, "path": path })))
                .await?
        }
        CtlCommand::Name { id, name } => {
            client
                .call("cards.set_slot_name", Some(serde_json::json!({ "id": id, "name": name })))
                .await?
        }
        CtlCommand::Transcode(command) => run_transcode(&client, command).await?,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_transcode(client: &RpcClient, command: &TranscodeCommand) -> Result<Value> {
    let result = match command {
        TranscodeCommand::Settings => client.call_no_params("transcode.settings.get").await?,
        TranscodeCommand::Set { json } => {
            let fields: Value = serde_json::from_str(json).context("Settings must be a JSON object")?;
            client.call("transcode.settings.set", Some(fields)).await?
        }
        TranscodeCommand::Estimate { clip } => {
            client
                .call("transcode.estimate", Some(serde_json::json!({ "clip": clip })))
                .await?
        }
        TranscodeCommand::Render { clip } => {
            client
                .call("transcode.render", Some(serde_json::json!({ "clip": clip })))
                .await?
        }
        TranscodeCommand::History { limit } => {
            client
                .call("transcode.history", Some(serde_json::json!({ "limit": limit })))
                .await?
        }
    };
    Ok(result)
}
