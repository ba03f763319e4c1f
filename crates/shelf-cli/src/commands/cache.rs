//! Cache command handlers

use anyhow::Result;

use shelf_core::Library;

use crate::output::{format_size, Output, OutputFormat};

/// List cached files with their sizes
pub fn list(library: &Library, output: &Output) -> Result<()> {
    let entries = library.cached_files()?;
    output.print_cache_entries(&entries);

    if output.format == OutputFormat::Human && !entries.is_empty() {
        let stats = library.cache_stats()?;
        match stats.limit_bytes {
            Some(limit) => println!(
                "{} of {} used",
                format_size(stats.total_bytes),
                format_size(limit)
            ),
            None => println!("{} used (no limit)", format_size(stats.total_bytes)),
        }
    }
    Ok(())
}

/// Evict least recently read files down to the configured budget
pub fn evict(library: &Library, output: &Output) -> Result<()> {
    if library.config().cache_limit_mb.is_none() {
        output.message("No cache_limit_mb configured; nothing to evict.");
        return Ok(());
    }

    let evicted = library.evict()?;
    match output.format {
        OutputFormat::Json => output.json(&evicted),
        OutputFormat::Quiet => {
            for name in &evicted {
                println!("{}", name);
            }
        }
        OutputFormat::Human => {
            if evicted.is_empty() {
                println!("Cache is within its limit.");
            } else {
                for name in &evicted {
                    println!("Evicted {}", name);
                }
            }
        }
    }
    Ok(())
}

/// Drop a file from the local cache only
pub fn remove(library: &Library, file_name: String, output: &Output) -> Result<()> {
    if library.remove_cached(&file_name)? {
        output.success(&format!("Removed {} from the cache", file_name));
    } else {
        output.message(&format!("{} is not cached", file_name));
    }
    Ok(())
}
