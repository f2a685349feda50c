pub mod cache;
pub mod config;
pub mod describe;
pub mod error;
pub mod git;
pub mod refs;
pub mod resolver;
pub mod ui;
pub mod version;

pub use cache::{load_or_build_tag_cache, CacheStats, CacheStore, TagCache, TagInfo};
pub use describe::{describe, resolve_version, DescribeOptions, VersionMetadata};
pub use error::{AutoverError, Result};
pub use version::Version;
