//! Pure formatting functions for UI output.
//!
//! The `format_*` functions build plain strings and are unit tested; the
//! `display_*` functions add terminal styling and print.

use crate::cache::{CacheStats, TagCache};
use crate::git::short_hash;
use console::style;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a warning message in yellow.
pub fn display_warning(message: &str) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// One-line summary of a tag cache load.
pub fn format_cache_stats(cache: &TagCache, stats: &CacheStats) -> String {
    let mode = if stats.full_rebuild {
        "full rebuild"
    } else {
        "incremental"
    };
    format!(
        "{} tags on {} commits ({}: {} added, {} deleted, {} modified, {} unchanged)",
        cache.tag_count(),
        cache.commit_count(),
        mode,
        stats.added,
        stats.deleted,
        stats.modified,
        stats.unchanged
    )
}

/// One line per tagged commit: short hash followed by its tag names.
pub fn format_tag_listing(cache: &TagCache) -> Vec<String> {
    cache
        .commits()
        .map(|(commit, tags)| {
            let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
            format!("{}  {}", short_hash(commit), names.join(", "))
        })
        .collect()
}

/// Display the contents of a tag cache and how it was obtained.
pub fn display_tag_cache(cache: &TagCache, stats: &CacheStats) {
    for line in format_tag_listing(cache) {
        let (hash, names) = line.split_at(line.find(' ').unwrap_or(line.len()));
        println!("{}{}", style(hash).cyan(), names);
    }
    display_success(&format_cache_stats(cache, stats));
}
