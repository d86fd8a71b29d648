use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fixture::generator::{FixtureConfig, IncidentGenerator};
use fixture::server::{self, FixtureState};
use log::info;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use watch::config::{FilterArgs, MonitorConfig, ViewKind, WatchOverrides};

mod fixture;
mod watch;

#[derive(Parser)]
#[command(author, version, about = "Fall-incident monitor: live view reconciliation and a fixture backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mount a list or live view against a backend and render it
    Watch(WatchArgs),
    /// Run a local fixture backend serving /events and /ws/events
    Serve(ServeArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Load the monitor config from YAML; any flag passed below overrides it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Backend base URL [default: http://localhost:8000]
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long, env = "INCIDENT_TOKEN")]
    token: Option<String>,
    /// View preset [default: list]
    #[arg(long, value_enum)]
    view: Option<ViewKind>,
    #[arg(long)]
    camera: Option<String>,
    /// new | acknowledged
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long)]
    timezone: Option<String>,
    #[arg(long)]
    capacity: Option<usize>,
    #[arg(long)]
    max_rows: Option<usize>,
    /// Reload the snapshot every N seconds
    #[arg(long)]
    refresh_secs: Option<u64>,
}

#[derive(Args)]
struct ServeArgs {
    /// Load the fixture config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    history: Option<usize>,
    #[arg(long)]
    interval_ms: Option<u64>,
    #[arg(long)]
    token: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating monitor runtime")?;

    match cli.command {
        Command::Watch(args) => {
            let config = watch_config(args)?;
            runtime.block_on(watch::runner::run(config))
        }
        Command::Serve(args) => {
            let config = fixture_config(&args)?;
            runtime.block_on(serve(args.bind, config))
        }
    }
}

fn watch_config(args: WatchArgs) -> anyhow::Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    config.apply(WatchOverrides {
        api_url: args.api_url,
        token: args.token,
        view: args.view,
        filters: FilterArgs {
            from: args.from,
            to: args.to,
            camera: args.camera,
            status: args.status,
        },
        limit: args.limit,
        timezone: args.timezone,
        capacity: args.capacity,
        max_rows: args.max_rows,
        refresh_secs: args.refresh_secs,
    })?;
    Ok(config)
}

fn fixture_config(args: &ServeArgs) -> anyhow::Result<FixtureConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("reading fixture config {}", path.display()))?;
            serde_yaml::from_str::<FixtureConfig>(&contents)
                .with_context(|| format!("parsing fixture config {}", path.display()))?
        }
        None => FixtureConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(history) = args.history {
        config.history = history;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.interval_ms = interval_ms;
    }
    if args.token.is_some() {
        config.token = args.token.clone();
    }
    Ok(config)
}

async fn serve(bind: SocketAddr, config: FixtureConfig) -> anyhow::Result<()> {
    let interval = Duration::from_millis(config.interval_ms.max(1));
    let token = config.token.clone();
    let mut generator = IncidentGenerator::new(config);
    let state = FixtureState::new(generator.history(chrono::Utc::now()), token);

    info!("[fixture] serving on http://{}", bind);
    println!("Fixture backend running on http://{} (Ctrl+C to stop)...", bind);
    tokio::select! {
        _ = warp::serve(server::routes(state.clone())).run(bind) => {}
        _ = server::run_feed(state, generator, interval) => {}
        result = signal::ctrl_c() => {
            result.context("awaiting Ctrl+C to exit")?;
        }
    }
    Ok(())
}
