//! Shared components for CLI commands
//!
//! Logging setup and the coloured run summary used by every subcommand.

use crate::cli::args::LoggingArgs;
use crate::error::Result;
use crate::models::ProcessingStats;
use colored::*;
use std::path::Path;
use tracing::debug;

/// Set up structured logging for a command
pub fn setup_logging(args: &LoggingArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snodas_processor={}", log_level)));

    let initialised = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    // A subscriber is already installed when commands run in-process more than once
    if initialised.is_err() {
        debug!("Logging already initialized");
    } else {
        debug!("Logging initialized at level: {}", log_level);
    }
    Ok(())
}

/// Format a byte count in human-readable units
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Print a coloured summary of a finished run
pub fn print_summary(title: &str, stats: &ProcessingStats, logging: &LoggingArgs) {
    if !logging.show_progress() {
        return;
    }

    println!("\n{}", title.bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_skipped > 0 {
        println!(
            "  {} {}",
            "Files skipped:".bright_yellow(),
            stats.files_skipped.to_string().bright_yellow()
        );
    }
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Total rows:".bright_cyan(),
        stats.total_rows.to_string().bright_white().bold()
    );
    println!(
        "  {} {}{}",
        "Output:".bright_cyan(),
        stats.output_path.display(),
        output_size(&stats.output_path)
            .map(|size| format!(" ({})", size))
            .unwrap_or_default()
    );
}

fn output_size(path: &Path) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    metadata.is_file().then(|| format_size(metadata.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_setup_logging_twice_is_harmless() {
        let args = LoggingArgs::default();
        assert!(setup_logging(&args).is_ok());
        assert!(setup_logging(&args).is_ok());
    }
}
