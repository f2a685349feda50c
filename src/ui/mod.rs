//! User interface module - output selection and formatting.
//!
//! Separates concerns:
//! - `formatter` - Styled messages and tag cache listings
//! - This module - Rendering a resolved version in the requested format

use crate::describe::VersionMetadata;
use crate::error::Result;

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_error, display_status, display_success, display_tag_cache, display_warning,
};

/// How a resolved version is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// The version exactly as resolved (`1.2.3.4`)
    #[default]
    Plain,
    /// SemVer rendering, a fourth component becomes build metadata
    Semver,
    /// Version plus commit metadata as JSON
    Json,
}

/// Render a resolved version for stdout.
pub fn render_version(metadata: &VersionMetadata, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Plain => metadata.version.to_string(),
        OutputFormat::Semver => metadata.version.to_semver().to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(metadata)?,
    })
}
