use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelrelay::output::ConsoleSink;
use reelrelay::utils;
use reelrelay::{Cli, Commands, Config, RelayPipeline, Trigger, Workspace};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Pick up API credentials from a local .env, as the bot deployment does
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = Config::load().await?;

    match cli.command {
        Commands::Link {
            url,
            requester,
            output,
        } => {
            return run_request(&config, Trigger::Command, &url, &requester, output, cli.quiet)
                .await
        }
        Commands::Scan {
            message,
            requester,
            output,
        } => {
            return run_request(
                &config,
                Trigger::PassiveScan,
                &message,
                &requester,
                output,
                cli.quiet,
            )
            .await
        }
        Commands::Sweep { max_age } => {
            let workspace = Workspace::new(config.workspace_dir());
            workspace.ensure_exists()?;

            let max_age = Duration::from_secs(max_age.unwrap_or(config.app.retention_secs));
            let removed = workspace.sweep_expired(max_age).await?;
            println!(
                "Removed {} expired files from {}",
                removed,
                workspace.root().display()
            );
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.interactive_setup().await?;
            }
        }
        Commands::Platforms => {
            println!("Supported platforms:");
            println!("  • Instagram reels and posts (instagram.com/reel, instagram.com/p)");
            println!("  • Facebook videos (watch, video.php, share/r, share/v, /videos/)");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "reelrelay=debug" } else { "reelrelay=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_request(
    config: &Config,
    trigger: Trigger,
    text: &str,
    requester: &str,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<ExitCode> {
    // Check for required external dependencies (non-fatal)
    let missing_deps =
        utils::check_dependencies(&config.app.ffmpeg_path, &config.app.ffprobe_path).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    config.validate()?;
    let pipeline = RelayPipeline::from_config(config)?;

    let output_dir = output.unwrap_or_else(|| config.app.output_dir.clone());
    let sink = Arc::new(ConsoleSink::new(output_dir, quiet));
    let request_id = uuid::Uuid::new_v4().simple().to_string();

    let Some(outcome) = pipeline
        .handle(trigger, &request_id, text, requester, sink)
        .await
    else {
        if trigger == Trigger::PassiveScan {
            println!("No supported video link found in message");
        }
        return Ok(ExitCode::from(2));
    };

    let elapsed = (outcome.finished_at - outcome.started_at).num_milliseconds() as f64 / 1000.0;
    tracing::info!(
        request = %outcome.request_id,
        stage = ?outcome.stage,
        "Finished in {}",
        utils::format_duration(elapsed)
    );

    if !outcome.is_delivered() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
