//! Magic Eye: watches folders for files whose content does not match
//! their extension.
//!
//! This is the entry point for the CLI application.

use magic_eye::core::config::Config;
use magic_eye::core::error::{Error, Result};
use magic_eye::scanner::{forward_to, ContentSniffer, DirectoryWatcher};
use magic_eye::ui::cli::{Cli, Commands, ConfigAction, OutputFormat};
use magic_eye::utils::format::{format_size, hex_dump};
use magic_eye::utils::logging::{init_logging, LogConfig};
use magic_eye::DetectionRecord;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.category(), e);
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            config.validate()?;
            config
        }
        None => Config::load_or_default(),
    };

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::from_config(&config)
    };
    init_logging(log_config)?;

    log::info!("Magic Eye v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Watch {
            folders,
            settle_ms,
            suspicious_only,
        }) => run_watch(config, folders, settle_ms, suspicious_only, cli.format).await,
        Some(Commands::Identify { files }) => run_identify(&config, &files, cli.format),
        Some(Commands::Config { action }) => {
            run_config(action, &config, cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("Magic Eye - extension/content mismatch detector");
            println!();
            println!("Use --help for usage information");
            println!();
            println!("Quick start:");
            println!("  magic-eye watch                  Watch the configured folders");
            println!("  magic-eye watch -f ~/Downloads   Watch a specific folder");
            println!("  magic-eye identify FILE...       Check files once");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Watch folders until Ctrl-C.
async fn run_watch(
    mut config: Config,
    folders: Vec<PathBuf>,
    settle_ms: Option<u64>,
    suspicious_only: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    if !folders.is_empty() {
        config.watch.folders = folders;
    }
    if let Some(ms) = settle_ms {
        config.watch.settle_delay_ms = ms;
    }
    config.validate()?;

    // Records cross from the watcher thread to this task over a channel.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let sniffer = ContentSniffer::from_config(&config.watch);
    let watcher = Arc::new(DirectoryWatcher::with_sniffer(
        config.watch.clone(),
        sniffer,
        forward_to(tx),
    ));
    watcher.start()?;

    println!("Monitoring folders:");
    for target in watcher.watched_folders() {
        let status = if target.exists { "" } else { " (not found)" };
        println!("  - {}{}", target.path.display(), status);
    }
    println!("Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            record = rx.recv() => match record {
                Some(record) => {
                    if !suspicious_only || record.is_suspicious() {
                        print_line(&record, format)?;
                    }
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    log::warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    let stopper = Arc::clone(&watcher);
    tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .map_err(|e| Error::Internal(format!("Failed to stop watcher: {}", e)))?;

    let stats = watcher.stats();
    println!();
    println!("=== Session Summary ===");
    println!("Files Analyzed:  {}", stats.files_analyzed);
    println!("Threats Found:   {}", stats.threats_found);
    println!("Errors:          {}", stats.errors);
    println!("Ignored:         {}", stats.ignored);
    Ok(ExitCode::SUCCESS)
}

/// Analyse files once. Exits with failure if any file is suspicious.
fn run_identify(config: &Config, files: &[PathBuf], format: OutputFormat) -> Result<ExitCode> {
    let sniffer = ContentSniffer::from_config(&config.watch);
    let mut suspicious = false;

    for path in files {
        let record = sniffer.analyze(path);
        suspicious |= record.is_suspicious();
        print_record(&record, format)?;
    }

    Ok(if suspicious {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

/// One line per record, for the live watch output.
fn print_line(record: &DetectionRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(record)?),
        OutputFormat::Text => match record.content() {
            Some(content) => println!(
                "{} {} {}  {}",
                record.detected_at().with_timezone(&chrono::Local).format("%H:%M:%S"),
                record,
                format_size(content.file_size_bytes),
                hex_dump(&content.magic_bytes)
            ),
            None => println!(
                "{} {}",
                record.detected_at().with_timezone(&chrono::Local).format("%H:%M:%S"),
                record
            ),
        },
    }
    Ok(())
}

fn print_record(record: &DetectionRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(record)?);
        }
        OutputFormat::Text => {
            println!();
            println!("File:              {}", record.file_name());
            println!("Path:              {}", record.file_path().display());
            if let Some(err) = record.error() {
                println!("Error:             {}", err);
                return Ok(());
            }
            if let Some(content) = record.content() {
                println!("Size:              {}", format_size(content.file_size_bytes));
                println!("Detected type:     {}", content.description);
                println!("MIME type:         {}", content.mime_type);
                println!("True extension:    .{}", content.true_extension);
                println!(
                    "Current extension: .{}",
                    record.current_extension_display().unwrap_or_default()
                );
                println!("Magic bytes:       {}", hex_dump(&content.magic_bytes));
            }
            if record.is_suspicious() {
                println!("WARNING: extension does NOT match the actual file type!");
            } else if record.current_extension() == Some("") {
                println!("No file extension provided.");
            } else {
                println!("Extension matches detected type.");
            }
        }
    }
    Ok(())
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_config_path);
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset { yes } => {
            if !yes {
                println!("This will overwrite {}. Re-run with --yes to confirm.", path.display());
                return Ok(());
            }
            log::info!("Resetting configuration to defaults...");
            Config::default().save(&path)?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
