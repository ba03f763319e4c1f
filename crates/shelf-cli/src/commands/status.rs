//! Status command handler

use anyhow::Result;

use shelf_core::Library;

use crate::output::{format_size, Output, OutputFormat};

/// Show remote configuration and cache usage
pub fn show(library: &Library, output: &Output) -> Result<()> {
    let stats = library.cache_stats()?;
    let config = library.config();
    let linked = library
        .cached_files()?
        .iter()
        .filter(|entry| entry.remote_id.is_some())
        .count();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "remote": {
                        "configured": library.is_remote_configured(),
                        "base_url": config.remote.base_url
                    },
                    "cache": {
                        "path": config.cache_db_path(),
                        "files": stats.files,
                        "linked": linked,
                        "total_bytes": stats.total_bytes,
                        "limit_bytes": stats.limit_bytes
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", stats.files);
        }
        OutputFormat::Human => {
            println!("Shelf Status");
            println!("============");
            println!();
            println!("Remote:");
            println!(
                "  Status: {}",
                if library.is_remote_configured() {
                    "configured"
                } else {
                    "not configured (offline)"
                }
            );
            println!("  Server: {}", config.remote.base_url);
            println!();
            println!("Cache:");
            println!("  Location: {}", config.cache_db_path().display());
            println!("  Files:    {} ({} linked)", stats.files, linked);
            println!("  Size:     {}", format_size(stats.total_bytes));
            if let Some(limit) = stats.limit_bytes {
                println!("  Limit:    {}", format_size(limit));
            }
        }
    }

    Ok(())
}
