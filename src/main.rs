use clap::Parser;
use std::path::PathBuf;
use surreal_rpc::{Auth, DriverConfig, Outcome, UseConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "surreal-rpc")]
#[command(about = "Connect to a database over WebSocket RPC and run queries", long_about = None)]
struct Args {
    /// Configuration file (defaults to ./surreal-rpc.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server endpoint, e.g. http://127.0.0.1:8000
    #[arg(long)]
    host: Option<String>,

    /// Root user name
    #[arg(short, long)]
    user: Option<String>,

    /// Root password
    #[arg(short, long)]
    pass: Option<String>,

    /// Namespace to use
    #[arg(long)]
    ns: Option<String>,

    /// Database to use
    #[arg(long)]
    db: Option<String>,

    /// Query to run once connected
    #[arg(short, long)]
    query: Option<String>,

    /// Stay connected and log lifecycle events and notifications until Ctrl-C
    #[arg(short, long)]
    watch: bool,
}

fn load_config(args: &Args) -> anyhow::Result<DriverConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
            }
            let mut config = DriverConfig::from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => {
            let cwd = std::env::current_dir()?;
            if cwd.join(surreal_rpc::config::CONFIG_FILE_NAME).exists() {
                DriverConfig::load(&cwd)?
            } else {
                DriverConfig::from_env()
            }
        }
    };

    // Command line wins over file and environment
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let (Some(user), Some(pass)) = (&args.user, &args.pass) {
        config.auth = Some(Auth::root(user, pass));
    }
    if let (Some(ns), Some(db)) = (&args.ns, &args.db) {
        config.use_config = Some(UseConfig::new(ns, db));
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surreal_rpc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args)?;
    if !config.client_config().is_complete(true) {
        anyhow::bail!(
            "Incomplete configuration: host, credentials, namespace and database are required"
        );
    }

    let client = config.builder().build();

    if args.watch {
        client.on_connection_open(|| tracing::info!("Connection open"));
        client.on_connection_end(|| tracing::info!("Connection closed"));
        client.on_lost_connection(|| tracing::warn!("Connection lost, reconnecting"));
        client.on_reconnected(|attempts| tracing::info!("Reconnected after {} attempts", attempts));
        client.on_connection_failure(|e| tracing::error!("Connection failure: {}", e));
        client.on_notify(|value| tracing::info!("Notification: {}", value));
    }

    let flow = client.start_connection_flow().await;
    if flow.did_fail() {
        let stage = flow
            .failure_stage()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        anyhow::bail!(
            "Connection flow failed at stage '{}': {}",
            stage,
            flow.error().unwrap_or("no details")
        );
    }
    tracing::info!("Connected to {}", config.host);

    if let Some(query) = &args.query {
        let result = client.query(query, None).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if args.watch {
        tracing::info!("Watching, press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
    }

    client.close();
    Ok(())
}
