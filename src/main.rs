//! postcrew - run agents and inspect the posting queue
//!
//! Usage:
//!   postcrew run content_creator        → generate a batch and hand it to review
//!   postcrew run reviewer               → quality-gate pending entries
//!   postcrew run publisher              → package verified entries for upload
//!   postcrew monitor                    → one self-healing pass + health report
//!   postcrew status [--json]            → agents, inboxes, queue depth
//!   postcrew confirm 12                 → mark entry 12 as posted
//!   postcrew init-config > postcrew.toml

use clap::{Parser, Subcommand};
use postcrew::config::PostcrewConfig;
use postcrew::events::EventLog;
use postcrew::queue::{self, QueueManager};
use postcrew::relay::AgentRelay;
use postcrew::status::StatusView;
use postcrew::stock::Stock;
use postcrew::Runner;
use postcrew_core::{AgentId, TaskKind};
use postcrew_store::DocumentStore;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "postcrew",
    about = "Agent coordination and posting queue for a social content pipeline",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML). Defaults to $POSTCREW_CONFIG, then ./postcrew.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config and $POSTCREW_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log as JSON lines instead of text
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one agent invocation
    Run {
        agent: AgentId,
        /// Heal a failed agent before running it
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Run the health monitor (same as `run health_monitor`)
    Monitor,
    /// Show agent and queue status
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Confirm that a ready entry was posted
    Confirm { id: u64 },
    /// Mark an entry failed
    Fail {
        id: u64,
        #[arg(long)]
        reason: String,
    },
    /// Send a failed entry back to pending
    Retry { id: u64 },
    /// Put a task in an agent's inbox
    Task {
        from: AgentId,
        to: AgentId,
        kind: TaskKind,
        #[arg(long, default_value = "")]
        details: String,
        /// Requested batch size for generation tasks
        #[arg(long)]
        count: Option<usize>,
    },
    /// Print the generation plan the creator would use now
    Plan {
        #[arg(long)]
        count: Option<usize>,
    },
    /// Print the default config as TOML
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_ref(), cli.log_json);

    if let Commands::InitConfig = cli.command {
        print!("{}", PostcrewConfig::default().to_toml());
        return ExitCode::SUCCESS;
    }

    let config = load_config(&cli);
    let store = match DocumentStore::open(&config.paths.data_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: data dir {}: {e}", config.paths.data_dir.display());
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(cli.command, config, store).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn load_config(cli: &Cli) -> PostcrewConfig {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("POSTCREW_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("postcrew.toml"));
    let mut config = PostcrewConfig::load(&path).with_env_overrides();
    if let Some(dir) = &cli.data_dir {
        config.paths.data_dir = dir.clone();
    }
    config
}

async fn run(
    command: Commands,
    config: PostcrewConfig,
    store: DocumentStore,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Run { agent, force } => invoke(config, agent, force).await,
        Commands::Monitor => invoke(config, AgentId::HealthMonitor, false).await,

        Commands::Status { json } => {
            let view = StatusView::collect(&store);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", view.render());
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Confirm { id } => {
            QueueManager::new(store).confirm_posted(id)?;
            EventLog::new(config.events_path()).info("entry_posted", json!({ "id": id }))?;
            println!("entry {id} posted");
            Ok(ExitCode::SUCCESS)
        }

        Commands::Fail { id, reason } => {
            QueueManager::new(store).fail(id, &reason)?;
            EventLog::new(config.events_path())
                .warn("entry_failed", json!({ "id": id, "reason": reason }))?;
            println!("entry {id} failed");
            Ok(ExitCode::SUCCESS)
        }

        Commands::Retry { id } => {
            QueueManager::new(store).retry(id)?;
            EventLog::new(config.events_path()).info("entry_retried", json!({ "id": id }))?;
            println!("entry {id} back to pending");
            Ok(ExitCode::SUCCESS)
        }

        Commands::Task { from, to, kind, details, count } => {
            let id = AgentRelay::new(store).create_task(from, to, kind, &details, count)?;
            println!("{id}");
            Ok(ExitCode::SUCCESS)
        }

        Commands::Plan { count } => {
            let stock = Stock::load(&config.paths.stock_catalog)?;
            let n = count.unwrap_or(config.plan.batch_size);
            let plan = queue::plan_batch(
                &config.plan.targets.ratios(),
                &stock,
                n,
                config.plan.soft_fraction,
            );
            for (i, slot) in plan.iter().enumerate() {
                println!("{:>2}  {:<8} {}", i + 1, slot.category.as_str(), slot.cta_type);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::InitConfig => Ok(ExitCode::SUCCESS),
    }
}

async fn invoke(config: PostcrewConfig, agent: AgentId, force: bool) -> anyhow::Result<ExitCode> {
    let runner = Runner::from_config(config)?;
    match runner.invoke(agent, force).await {
        Ok(summary) => {
            tracing::info!(
                %agent,
                tasks = summary.tasks.len(),
                appended = summary.appended.len(),
                handoffs = summary.handoffs.len(),
                "done"
            );
            if let Some(report) = &summary.health {
                print!("{}", report.render());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {agent} failed: {e}");
            Ok(ExitCode::from(EXIT_FAILED))
        }
    }
}

fn init_tracing(
    log_file: Option<&PathBuf>,
    json: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let dir = dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "postcrew.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (text_layer, json_layer) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postcrew=info,postcrew_store=info".into()),
        )
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .init();
    guard
}
