use crate::{
    config::{Config, Credential},
    convert::{Converter, Pandoc},
    error::StartupError,
    ocr::mistral::MistralOcr,
    pipeline::Pipeline,
    report::BatchReport,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ocrtex")]
#[command(about = "Batch PDF to LaTeX orchestrator (Mistral OCR + pandoc)")]
pub struct Args {
    /// Defaults to `run`.
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Path to config TOML. If omitted, uses ./ocrtex.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum Command {
    /// Process every PDF in the intake directory.
    Run,
    /// Report converter and credential availability as JSON.
    Doctor,
}

pub fn dispatch(args: Args) -> Result<()> {
    // A missing .env is normal; the variable may come from the environment.
    let _ = dotenvy::dotenv();

    let cfg = Config::resolve(args.config.as_deref())?;
    let _guard = init_logging(&args, &cfg)?;

    match args.cmd.unwrap_or(Command::Run) {
        Command::Run => run(&cfg),
        Command::Doctor => doctor(&cfg),
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match resolve_log_path(cfg) {
        Some(path) => {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            ensure_dir(parent)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file: {}", path.display()))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file || cfg.logging.file_path.is_empty() {
        return None;
    }
    Some(PathBuf::from(&cfg.logging.file_path))
}

/// Startup checks. Any failure here means no document is touched.
fn check_converter(converter: &Pandoc) -> Result<String, StartupError> {
    converter
        .version()
        .map_err(|e| StartupError::ConverterUnavailable {
            program: converter.program().to_string(),
            detail: e.to_string(),
        })
}

fn run(cfg: &Config) -> Result<()> {
    let credential = Credential::from_env(&cfg.ocr.api_key_env)?;
    info!("loaded API key {}", credential.redacted());

    let converter = Pandoc::new(cfg);
    let version = check_converter(&converter)?;
    info!("converter: {version}");

    let ocr = MistralOcr::new(cfg, credential)?;
    let pipeline = Pipeline::new(cfg, ocr, converter);
    let report = pipeline.run_batch().context("batch aborted")?;

    write_report(cfg, &report)?;
    Ok(())
}

fn write_report(cfg: &Config, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if cfg.output.write_report_json {
        let path = &cfg.paths.report_file;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        std::fs::write(path, &json)
            .with_context(|| format!("writing report: {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    if cfg.global.print_summary {
        println!("{json}");
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let converter = Pandoc::new(cfg);
    let (converter_ok, converter_detail) = match check_converter(&converter) {
        Ok(v) => (true, v),
        Err(e) => (false, e.to_string()),
    };
    let credential = Credential::from_env(&cfg.ocr.api_key_env).ok();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "converter": {
                "program": converter.program(),
                "ok": converter_ok,
                "detail": converter_detail,
            },
            "credential": {
                "env": cfg.ocr.api_key_env,
                "present": credential.is_some(),
            },
            "ocr": {
                "base_url": cfg.ocr.base_url,
                "model": cfg.ocr.model,
                "upload_mode": cfg.ocr.upload_mode,
            },
            "paths": cfg.paths,
        }))?
    );
    Ok(())
}
