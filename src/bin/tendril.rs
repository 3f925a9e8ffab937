//! tendril - capability-secured scripting kernel
//!
//! Usage:
//!   tendril eval script.json                 → evaluate an expression file
//!   tendril eval -e '["+", 1, 2]' --compile  → evaluate inline, compiled
//!   tendril run --seed world.json --entity 1 --verb look
//!   tendril serve --seed world.json          → run the scheduler until Ctrl-C
//!   tendril opcodes                          → list opcode metadata as JSON
//!   tendril config                           → print the effective config as TOML

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tendril_core::{EntityId, Expr, LogConfig, Strategy, TendrilConfig};
use tendril_engine::{create_default_registry, Kernel, TaskRequest, Value};
use tendril_scheduler::Scheduler;
use tendril_world::{default_classes, MemoryStore, Seed, World};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "tendril",
    about = "Capability-secured scripting kernel",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML)
    #[arg(long, global = true, default_value = "tendril.toml")]
    config: PathBuf,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    /// Execution strategy: interpret or compile
    #[arg(long, global = true)]
    strategy: Option<Strategy>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single expression
    Eval {
        /// File holding the expression as JSON
        file: Option<PathBuf>,
        /// Inline expression instead of a file
        #[arg(short, long)]
        expr: Option<String>,
        /// Shorthand for --strategy compile
        #[arg(long, default_value_t = false)]
        compile: bool,
        /// Gas budget for this evaluation
        #[arg(long)]
        gas: Option<u64>,
        /// Seed world to evaluate against
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Entity to evaluate as
        #[arg(long)]
        this: Option<EntityId>,
    },
    /// Invoke a verb on an entity
    Run {
        #[arg(long)]
        seed: PathBuf,
        #[arg(long)]
        entity: EntityId,
        #[arg(long)]
        verb: String,
        /// Arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,
        /// Calling entity (default: the target itself)
        #[arg(long)]
        caller: Option<EntityId>,
    },
    /// Load a world and run scheduled tasks until interrupted
    Serve {
        #[arg(long)]
        seed: PathBuf,
    },
    /// List registered opcodes
    Opcodes,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = TendrilConfig::load(&cli.config);
    if let Some(strategy) = cli.strategy {
        config.engine.strategy = strategy;
    }
    let _guard = init_tracing(&config.log, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Eval { file, expr, compile, gas, seed, this } => {
            let source = match (expr, file) {
                (Some(inline), _) => inline,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("eval needs a file or --expr"),
            };
            let expr = Expr::parse(&source).context("expression is not valid JSON")?;
            if compile {
                config.engine.strategy = Strategy::Compile;
            }
            if let Some(gas) = gas {
                config.engine.gas_limit = gas;
            }
            let strategy = config.engine.strategy;
            let kernel = build_kernel(&config, seed.as_deref()).await?.0;
            let value = kernel.eval(&expr, this, strategy).await?;
            print_value(&value)?;
        }

        Commands::Run { seed, entity, verb, args, caller } => {
            let args: Vec<serde_json::Value> =
                serde_json::from_str(&args).context("--args must be a JSON array")?;
            let (kernel, _) = build_kernel(&config, Some(&seed)).await?;
            let args = args.iter().map(Value::from_json).collect();
            let value = kernel.invoke(entity, &verb, args, caller.unwrap_or(entity)).await?;
            print_value(&value)?;
        }

        Commands::Serve { seed } => serve(&config, &seed).await?,

        Commands::Opcodes => {
            let registry = create_default_registry();
            println!("{}", serde_json::to_string_pretty(&registry.list_metadata())?);
        }

        Commands::Config => print!("{}", config.to_toml()),
    }

    Ok(())
}

/// Stderr logging, plus JSON lines to a file when one is configured. The
/// returned guard flushes the file writer on drop.
fn init_tracing(log: &LogConfig, log_file: Option<&str>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));

    let (file_layer, guard) = match log_file.or(log.file.as_deref()) {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("log file path has no file name: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().json().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Kernel over an in-memory world, populated from `seed` when given.
async fn build_kernel(config: &TendrilConfig, seed: Option<&Path>) -> anyhow::Result<(Arc<Kernel>, Seed)> {
    let seed = match seed {
        Some(path) => Seed::load(path)?,
        None => Seed::default(),
    };
    let store = Arc::new(MemoryStore::new());
    seed.apply(store.as_ref()).await?;

    let kernel = Kernel::new(
        Arc::new(create_default_registry()),
        World::new(store),
        Arc::new(default_classes()),
        config.engine.clone(),
    );
    Ok((Arc::new(kernel), seed))
}

async fn serve(config: &TendrilConfig, seed: &Path) -> anyhow::Result<()> {
    let (kernel, seed) = build_kernel(config, Some(seed)).await?;
    let scheduler = Arc::new(Scheduler::new(kernel.clone(), config.scheduler.tick_ms)?);
    kernel.set_task_sink(scheduler.clone());

    for task in &seed.tasks {
        scheduler.schedule(TaskRequest::from(task));
    }
    info!(
        entities = seed.entities.len(),
        tasks = seed.tasks.len(),
        strategy = %config.engine.strategy,
        "world loaded"
    );

    let cancel = CancellationToken::new();
    let ticker = tokio::spawn({
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    ticker.await?;
    Ok(())
}

fn print_value(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value.to_json()?)?);
    Ok(())
}
