use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use std::str::FromStr;
use uuid::Uuid;
use veracity_common::observability::{LogConfig, LogFormat, init_logging};
use veracity_common::{ExpertiseLevel, InputError, VeracityError};
use veracity_config::{VeracityConfig, VeracityConfigLoader};

mod app;
mod cli;

use cli::{CheckArgs, Cli, Commands};

/// Exit status for requests rejected as bad input.
const EXIT_INPUT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_input_error(&err) => {
            eprintln!("{}", error_json(&err));
            ExitCode::from(EXIT_INPUT)
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "app.failed");
            eprintln!("{}", error_json(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // env wins over the file
    let cfg: VeracityConfig = VeracityConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;

    init_logging(LogConfig {
        app_name: "veracity",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: LogFormat::from_str(&cfg.logging.format).unwrap_or_default(),
        default_filter: cfg.logging.filter.clone(),
    })?;

    match cli.command {
        Commands::Check(args) => check(&cfg, &args, cli.compact).await,
        Commands::History { user } => {
            let store = app::open_store(&cfg).await?;
            let history = store.list_by_user(&user).await?;
            print_json(&history, cli.compact)
        }
        Commands::Show { id } => {
            let id = Uuid::parse_str(id.trim())
                .map_err(|e| InputError::InvalidSetting(format!("report id `{id}`: {e}")))?;
            let store = app::open_store(&cfg).await?;
            let report = store.require(id).await?;
            print_json(&report, cli.compact)
        }
        Commands::Sources {
            urls,
            expertise,
            suggest,
        } => {
            let detail = ExpertiseLevel::from_str(&expertise)?.source_detail();
            let scorer = app::build_scorer(&cfg)?;
            let summary = scorer.evaluate_many(&urls, detail).await;
            match suggest {
                Some(max) => print_json(
                    &serde_json::json!({
                        "summary": summary,
                        "suggested_sources": scorer.suggest_sources(0.8, max),
                    }),
                    cli.compact,
                ),
                None => print_json(&summary, cli.compact),
            }
        }
    }
}

async fn check(cfg: &VeracityConfig, args: &CheckArgs, compact: bool) -> Result<()> {
    let request = app::request_from(args)?;
    let ocr_text = args.ocr_text.as_deref().map(app::read_text).transpose()?;
    let transcript = args.transcript.as_deref().map(app::read_text).transpose()?;

    let store = app::open_store(cfg).await?;
    let orchestrator = app::build_orchestrator(cfg, store, ocr_text, transcript).await?;
    let report = orchestrator.run(request).await?;
    print_json(&report, compact)
}

fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{out}");
    Ok(())
}

fn is_input_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<InputError>().is_some()
        || matches!(err.downcast_ref::<VeracityError>(), Some(VeracityError::Input(_)))
}

fn error_json(err: &anyhow::Error) -> serde_json::Value {
    serde_json::json!({ "error": format!("{err:#}") })
}
