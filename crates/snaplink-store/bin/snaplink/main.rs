mod cli;
mod logging;

use crate::cli::{BackendArg, Command, CLI};
use anyhow::{bail, Context};
use clap::Parser;
use snaplink_core::{Backend, ShortCode};
use snaplink_generator::{RandomGenerator, RandomGeneratorSettings};
use snaplink_storage::{FileLogBackend, FileLogSettings, MemoryBackend, MySqlBackend, MySqlSettings};
use snaplink_store::{ResolveError, ShortLinkStore, StoreSettings};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    logging::init(config.json_logs)?;

    debug!(
        backend = %config.backend,
        id_length = config.id_length,
        max_attempts = config.max_attempts,
        "starting snaplink"
    );

    let generator = RandomGenerator::new(
        RandomGeneratorSettings::builder()
            .length(config.id_length)
            .build(),
    )?;
    let settings = StoreSettings::builder()
        .max_attempts(config.max_attempts)
        .build();

    match config.backend {
        BackendArg::Memory => run(MemoryBackend::new(), generator, settings, &config).await,
        BackendArg::FileLog => {
            let backend = FileLogBackend::new(
                FileLogSettings::builder()
                    .path(config.log_path.clone())
                    .build(),
            );
            run(backend, generator, settings, &config).await
        }
        BackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when backend is mysql")?;
            let backend = MySqlBackend::connect(dsn, MySqlSettings::default())
                .await
                .context("failed to connect to mysql")?;
            run(backend, generator, settings, &config).await
        }
    }
}

async fn run<B: Backend>(
    backend: B,
    generator: RandomGenerator,
    settings: StoreSettings,
    config: &CLI,
) -> anyhow::Result<()> {
    let store = ShortLinkStore::open(backend, generator, settings).await?;
    let outcome = execute(&store, config).await;
    store.close().await?;
    outcome
}

async fn execute<B: Backend>(
    store: &ShortLinkStore<B, RandomGenerator>,
    config: &CLI,
) -> anyhow::Result<()> {
    match &config.command {
        Command::Shorten { urls } => {
            for url in urls {
                let code = store
                    .save(url)
                    .await
                    .with_context(|| format!("failed to shorten {url}"))?;
                info!(code = %code, "shortened");
                println!("{code}\t{}", code.to_url(&config.base_url));
            }
            Ok(())
        }
        Command::Resolve { code } => {
            let code = ShortCode::new(code.as_str())?;
            match store.resolve(&code).await {
                Ok(target) => {
                    println!("{target}");
                    Ok(())
                }
                Err(ResolveError::NotFound(code)) => bail!("not found: {code}"),
                Err(err) => Err(err.into()),
            }
        }
    }
}
