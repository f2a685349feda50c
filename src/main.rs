use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_autover::config;
use git_autover::git::Git2Repository;
use git_autover::ui::{self, OutputFormat};
use git_autover::{describe, load_or_build_tag_cache, DescribeOptions};

#[derive(clap::Parser)]
#[command(
    name = "git-autover",
    version,
    about = "Derive a version number from git history and version tags"
)]
struct Args {
    #[arg(help = "Revision to describe (default: HEAD)")]
    revision: Option<String>,

    #[arg(short = 'C', long = "repo", default_value = ".", help = "Repository path")]
    repo: PathBuf,

    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, help = "Bump once more when the working tree has changes")]
    check_working_tree: bool,

    #[arg(long, help = "Read tags directly instead of through the tag cache")]
    no_cache: bool,

    #[arg(long, help = "Directory holding tag cache files")]
    cache_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Plain, help = "Output format")]
    format: OutputFormat,

    #[arg(long, help = "Print the tag cache and how it was loaded")]
    tags: bool,

    #[arg(long, help = "Delete all tag cache files and exit")]
    clear_cache: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match config::load_config(args.config.as_deref(), Some(args.repo.as_path())) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };
    let store = config.cache.store(args.cache_dir.as_deref());

    if args.clear_cache {
        ui::display_status(&format!("Clearing tag cache in {}", store.dir().display()));
        let removed = store.clear();
        ui::display_success(&format!(
            "Removed {} cache files from {}",
            removed,
            store.dir().display()
        ));
        return Ok(());
    }

    if args.tags {
        let repo = match Git2Repository::open(&args.repo) {
            Ok(repo) => repo,
            Err(e) => {
                ui::display_error(&e.to_string());
                std::process::exit(1);
            }
        };
        ui::display_status(&format!("Loading tag cache for {}", repo.root().display()));
        match load_or_build_tag_cache(repo.root(), &store) {
            Ok((cache, stats)) => ui::display_tag_cache(&cache, &stats),
            Err(e) => {
                ui::display_error(&format!("Failed to load tag cache: {}", e));
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let use_cache = config.resolution.use_tag_cache && !args.no_cache;
    let options = DescribeOptions {
        revision: args.revision,
        check_working_tree: args.check_working_tree || config.resolution.check_working_tree,
        cache: use_cache.then_some(&store),
    };

    match describe(&args.repo, &options) {
        Some(metadata) => println!("{}", ui::render_version(&metadata, args.format)?),
        None => ui::display_warning(&format!(
            "No version metadata for {} ({})",
            args.repo.display(),
            options.revision.as_deref().unwrap_or("HEAD")
        )),
    }

    Ok(())
}
