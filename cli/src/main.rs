//! weeslack - run Slack API calls on the cooperative task runtime.
//!
//! ```text
//! main() -> Command::parse -> TokioHost + Runtime -> create_final_task
//!                                   |
//!                                   v
//!                     Dispatcher::run until idle -> report uncaught errors
//! ```

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use weeslack::commands::{self, Command, USAGE};
use weeslack::TokioHost;
use weeslack_config::WeeslackConfig;
use weeslack_core::{Runtime, format_uncaught_error};

fn init_tracing(config: Option<&WeeslackConfig>) {
    let fallback = config.and_then(WeeslackConfig::log_filter).unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> ExitCode {
    let command = match Command::parse(env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("error: {err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let config = match WeeslackConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.as_ref());

    match run(command, config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: Option<WeeslackConfig>) -> Result<ExitCode> {
    let tokio_rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let (host, mut dispatcher) = TokioHost::new(tokio_rt.handle().clone());
    let rt = Runtime::new(host);

    start(&rt, command, config)?;
    let delivered = tokio_rt.block_on(dispatcher.run(&rt));
    tracing::debug!(delivered, "event loop finished");

    let errors = rt.uncaught_errors();
    if errors.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("{} uncaught error(s):", errors.len());
    for error in errors.all() {
        eprintln!("{}", format_uncaught_error(error));
        eprint!("{}", error.describe());
    }
    Ok(ExitCode::FAILURE)
}

fn start(rt: &Runtime, command: Command, config: Option<WeeslackConfig>) -> Result<()> {
    match command {
        Command::Fetch {
            workspace,
            method,
            params,
            list_key,
            pages,
        } => {
            let config = config.with_context(|| {
                let path = weeslack_config::config_path().map_or_else(
                    || "~/.weeslack/config.toml".to_string(),
                    |p| p.display().to_string(),
                );
                format!("no configuration found at {path}")
            })?;
            let api = commands::workspace_api(rt, &config, &workspace)?;
            rt.create_final_task(async move {
                let reply =
                    commands::fetch(&api, &method, &params, list_key.as_deref(), pages).await?;
                println!("{}", serde_json::to_string_pretty(&reply)?);
                Ok(())
            })?;
        }
        Command::Sleep { milliseconds } => {
            let sleeper = rt.clone();
            rt.create_final_task(async move {
                let fire_count = sleeper.sleep(milliseconds).await?;
                println!("slept {milliseconds} ms (fire count {fire_count})");
                Ok(())
            })?;
        }
    }
    Ok(())
}
