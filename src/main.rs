use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use rubrates::core::Period;
use rubrates::core::config::AppConfig;
use rubrates::core::log::init_logging;
use rubrates::core::range::parse_date;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for rubrates::AppCommand {
    fn from(cmd: Commands) -> rubrates::AppCommand {
        match cmd {
            Commands::Serve => rubrates::AppCommand::Serve,
            Commands::Config => rubrates::AppCommand::Config,
            Commands::Rates { crypto, date } => rubrates::AppCommand::Rates { crypto, date },
            Commands::History {
                code,
                period,
                from,
                to,
            } => rubrates::AppCommand::History {
                code,
                period,
                from,
                to,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the web dashboard
    Serve,
    /// Display the loaded configuration
    Config,
    /// Display current exchange rates against RUB
    Rates {
        /// Show cryptocurrencies instead of fiat currencies
        #[arg(long)]
        crypto: bool,
        /// Fiat rates published on this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Display the rate history of one currency
    History {
        /// Currency code, e.g. USD or BTC
        code: String,
        /// One of 7d, 30d, 90d, 1y
        #[arg(short, long, default_value_t = Period::SevenDays)]
        period: Period,
        /// Start of a custom range (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// End of a custom range (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    AppConfig::load_dotenv();

    let result = match cli.command {
        Some(Commands::Setup) => rubrates::cli::setup::setup(),
        Some(cmd) => rubrates::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
