//! Logging setup
//!
//! Level comes from `--verbose` or the SHELF_LOG environment variable
//! (default `warn`). Logs go to `config.log_file` when set, else stderr.

use std::fs::OpenOptions;

use tracing::info;
use tracing_subscriber::EnvFilter;

use shelf_core::Config;

const DEFAULT_LEVEL: &str = "warn";

/// Level for the shelf crates' log filter
fn log_level(verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    std::env::var("SHELF_LOG")
        .ok()
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn filter_directive(level: &str) -> String {
    format!("shelf_core={},shelf_cli={}", level, level)
}

/// Initialize the global subscriber (ignored if already initialized)
pub fn init(config: &Config, verbose: bool) {
    let level = log_level(verbose);
    let env_filter = EnvFilter::new(filter_directive(&level));

    if let Some(log_path) = &config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(file)
                    .try_init();
                info!("Logging to {:?}", log_path);
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter_directive(&level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_wins() {
        assert_eq!(log_level(true), "debug");
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("info"), "shelf_core=info,shelf_cli=info");
    }
}
