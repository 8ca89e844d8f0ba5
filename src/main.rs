use clap::Parser;
use reward_sweep::cli::{self, Cli};
use reward_sweep::config::{AppConfig, LoggingConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config error: {}", e);
        }
        anyhow::bail!("invalid configuration ({} error(s))", errors.len());
    }

    match cli::commands::run(cli, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let rejected = e
                .downcast_ref::<reward_sweep::SweepError>()
                .is_some_and(|e| e.is_user_rejection());
            if rejected {
                tracing::info!("Cancelled by user");
                return Ok(());
            }
            Err(e)
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},reward_sweep=debug", logging.level))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
