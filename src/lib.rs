pub mod cli;
pub mod core;
pub mod fetcher;
pub mod providers;
pub mod web;

use crate::core::Period;
use crate::core::config::AppConfig;
use crate::fetcher::RateFetcher;
use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

pub enum AppCommand {
    Serve,
    Config,
    Rates {
        crypto: bool,
        date: Option<NaiveDate>,
    },
    History {
        code: String,
        period: Period,
        from: Option<String>,
        to: Option<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("rubrates starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_with_env(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        host = %config.server.host,
        port = config.server.port,
        environment = config.deployment.name(),
        "Loaded config"
    );

    match command {
        AppCommand::Serve => web::run_server(config).await,
        AppCommand::Config => {
            cli::config::run(&config);
            Ok(())
        }
        AppCommand::Rates { crypto, date } => {
            let fetcher = RateFetcher::from_config(&config)?;
            cli::rates::run(&fetcher, crypto, date).await
        }
        AppCommand::History {
            code,
            period,
            from,
            to,
        } => {
            let fetcher = RateFetcher::from_config(&config)?;
            cli::history::run(&fetcher, &code, period, from.as_deref(), to.as_deref()).await
        }
    }
}
