use clap::Parser;

use sa_gateway::cli::{config_path, Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Run) => {
            let config = sa_domain::config::Config::load()?;
            let provider = sa_gateway::telemetry::init(&config.observability);
            let result = sa_gateway::cli::run::run(config).await;
            if let Some(provider) = provider {
                let _ = provider.shutdown();
            }
            result
        }
        Some(Command::Doctor) => {
            let config = sa_domain::config::Config::load()?;
            let passed = sa_gateway::cli::doctor::run(&config, &config_path()).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let config = sa_domain::config::Config::load()?;
            let valid = sa_gateway::cli::config::validate(&config, &config_path());
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = sa_domain::config::Config::load()?;
            sa_gateway::cli::config::show(&config);
            Ok(())
        }
    }
}
