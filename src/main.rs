use clap::{Parser, Subcommand};

use updown::app::{self, Config};

#[derive(Parser)]
#[command(name = "updown", about = "Automated trading agent for binary prediction markets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the trading agent.
    Run {
        /// Path to the TOML configuration file.
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Validate a configuration file and exit.
    Check {
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => {
            let config = Config::load(&config)?;
            app::run(config).await?;
        }
        Command::Check { config } => {
            Config::load(&config)?;
            println!("configuration ok");
        }
    }

    Ok(())
}
