use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::clock::{SharedClock, SystemClock};
use crate::config::ConfigLoader;
use crate::store;

pub mod commands;

use self::commands::{
    ButtonArgs, CommandContext, ContactArgs, PressArgs, ProfileArgs, SessionArgs, TimelineArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "careline",
    version,
    about = "Quick-action press logger with a merged per-profile timeline"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over CARELINE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over CARELINE_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Act on behalf of this user instead of the configured one
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List, create or remove profiles
    Profile(ProfileArgs),
    /// Manage a profile's quick-action buttons
    Button(ButtonArgs),
    /// Manage a profile's emergency contacts
    Contact(ContactArgs),
    /// Press one button once
    Press(PressArgs),
    /// Keep a profile open and press buttons read from stdin, one per line
    Session(SessionArgs),
    /// Show the merged timeline of every profile
    Timeline(TimelineArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("CARELINE_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("CARELINE_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let mut config = loader.load_or_init()?;
    if let Some(user) = &cli.user {
        config.set_user(user).context("applying --user")?;
    }

    let clock: SharedClock = Arc::new(SystemClock);
    let store = store::init(&config.storage, clock.clone())?;
    let ctx = CommandContext {
        config: Arc::new(config),
        store: Arc::new(store),
        clock,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(commands::dispatch(&ctx, cli.command))
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
