use clap::{Parser, Subcommand};
use lib::config::{self, Config};
use lib::{AlertCatalog, ChatTransport, Dispatcher, PollLoop, Session, SlackTransport};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "assist-bot")]
#[command(about = "Watches Slack for firing Prometheus alerts and replies in the alert's thread", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Connect to Slack and answer firing alerts until interrupted (the default when no command is given).
    Run {
        /// Config file path (default: ASSIST_CONFIG_PATH or ./config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Write a default config file and an empty alert catalog if they do not exist.
    Init {
        /// Config file path (default: ASSIST_CONFIG_PATH or ./config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print the alert name that would be extracted from TEXT.
    Check {
        /// Message text, e.g. "[FIRING:1](HighCPU prod-cluster)"
        text: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("assist-bot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { text }) => {
            println!("{}", describe_alert(&text));
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_bot(config).await {
                log::error!("assist-bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = run_bot(None).await {
                log::error!("assist-bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let paths = lib::init::init_config(&path)?;
    println!(
        "initialized config at {} and alert catalog at {}",
        paths.config.display(),
        paths.catalog.display()
    );
    Ok(())
}

fn describe_alert(text: &str) -> String {
    match lib::extract_alert(text) {
        Some(alert) if alert.is_empty() => "alert: (empty name)".to_string(),
        Some(alert) => format!("alert: {}", alert),
        None => "no alert".to_string(),
    }
}

fn slack_transport(config: &Config) -> anyhow::Result<SlackTransport> {
    let token = config::resolve_slack_token(config)
        .ok_or_else(|| anyhow::anyhow!("slack bot token not configured; set SLACK_BOT_TOKEN"))?;
    Ok(SlackTransport::new(token, &config.slack)?)
}

/// Connect the session, then load the alert catalog. Running means both succeeded.
async fn start<T: ChatTransport>(
    transport: T,
    catalog_path: &Path,
) -> anyhow::Result<(Session<T>, AlertCatalog)> {
    let session = Session::establish(transport).await?;
    let catalog = AlertCatalog::load(catalog_path)?;
    Ok((session, catalog))
}

async fn run_bot(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, path) = config::load_config(config_path)?;
    let catalog_path = config::resolve_catalog_path(&config, &path);

    let started = match slack_transport(&config) {
        Ok(transport) => start(transport, &catalog_path).await,
        Err(e) => Err(e),
    };
    let (mut session, catalog) = match started {
        Ok(started) => {
            println!("Assist bot connected and running!");
            started
        }
        Err(e) => {
            println!("Connection failed.");
            return Err(e);
        }
    };

    let poll_loop = PollLoop::new(
        Dispatcher::from_mode(config.reply.mode),
        catalog,
        config.poll.interval(),
    );

    let stop = poll_loop.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, stopping");
            stop.stop();
        }
    });

    poll_loop.run(&mut session).await?;
    Ok(())
}
