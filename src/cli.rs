use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::Token;
use crate::config::Config;
use crate::output;
use crate::providers::{GitHubClient, NapCatClient};
use crate::release::{AlertDeduplicator, ReleaseCheck, ReleaseSettings, VersionSource};
use crate::service::{schedule_startup_check, CommandRouter};

#[derive(Parser)]
#[command(name = "release-herald")]
#[command(author, version, about = "Release notes for every deployment", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, JSON or YAML); environment variables override it
    #[arg(short, long, global = true, env = "RELEASE_HERALD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one release check and report the result
    Check,

    /// Run the startup check after a delay and accept operator commands on stdin
    Serve {
        /// Seconds to wait before the startup check (overrides STARTUP_DELAY_SECS)
        #[arg(long)]
        startup_delay: Option<u64>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Check => Self::execute_check(&config).await,
            Commands::Serve { startup_delay } => {
                let delay = startup_delay.unwrap_or(config.release.startup_delay_secs);
                Self::execute_serve(&config, Duration::from_secs(delay)).await
            }
        }
    }

    async fn execute_check(config: &Config) -> Result<()> {
        let workflow = build_workflow(config)?;

        let result = workflow.run_check().await;
        output::print_run_result(&result);

        if result.is_failure() {
            anyhow::bail!("Release check failed");
        }

        Ok(())
    }

    async fn execute_serve(config: &Config, delay: Duration) -> Result<()> {
        let workflow = build_workflow(config)?;
        let router = Arc::new(CommandRouter::new(workflow.clone(), &config.superusers));

        let startup = schedule_startup_check(workflow, delay);
        tokio::spawn(async move {
            if let Ok(result) = startup.await {
                output::print_run_result(&result);
            }
        });

        info!("Listening for operator commands on stdin");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                line = lines.next_line(), if stdin_open => match line? {
                    Some(line) => {
                        router.spawn_dispatch(line, |replies| {
                            for reply in replies {
                                println!("{reply}");
                            }
                        });
                    }
                    None => {
                        info!("stdin closed, no longer accepting commands");
                        stdin_open = false;
                    }
                },
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("Shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Wire the GitHub gateway, NapCat publisher and alerting into a workflow.
fn build_workflow(config: &Config) -> Result<Arc<ReleaseCheck>> {
    let gateway = GitHubClient::new(
        &config.github.base_url,
        config.github.owner.clone(),
        config.github.repo.clone(),
        config.github.token.clone().map(Token::from),
        Duration::from_secs(config.github.timeout_secs),
    )?;
    info!("Tracking deployments of {}", gateway.repository());

    let napcat = Arc::new(NapCatClient::new(
        &config.napcat.api_base,
        config.napcat.access_token.clone().map(Token::from),
        Duration::from_secs(config.napcat.timeout_secs),
    )?);

    let alerts = Arc::new(AlertDeduplicator::new(
        napcat.clone(),
        config.primary_superuser(),
    ));

    Ok(Arc::new(ReleaseCheck::new(
        Arc::new(gateway),
        napcat,
        alerts,
        VersionSource::from_config(config),
        ReleaseSettings::from_config(config),
    )))
}
