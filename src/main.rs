use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use monkey_patcher::{
    load_from_path, Axis, AxisSnapshot, Origin, PatchConfiguration, PatchManager, RewriteCache,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const CONFIG_ENV: &str = "MONKEY_PATCHER_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "monkey-patcher.toml";

#[derive(Parser)]
#[command(name = "monkey-patcher")]
#[command(about = "Load-time call rewriting for PHP test suites", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $MONKEY_PATCHER_CONFIG, then ./monkey-patcher.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the source the runtime would load for a file
    Patch {
        file: PathBuf,

        /// Show a unified diff against the file on disk instead
        #[arg(short, long)]
        diff: bool,
    },

    /// Tell whether a path is rewritten
    Scope { path: PathBuf },

    /// Compare the cache's axis records with the current configuration
    Status,

    /// Resolve every in-scope .php file so later loads hit the cache
    Warm,

    /// Drop every cached rewrite
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config_path = resolve_config_path(cli.config)?;
    let config = load_from_path(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Commands::Patch { file, diff } => cmd_patch(config, &file, diff),
        Commands::Scope { path } => cmd_scope(config, &path),
        Commands::Status => cmd_status(&config),
        Commands::Warm => cmd_warm(config),
        Commands::Clear => cmd_clear(config),
    }
}

/// Locate the config file.
///
/// Priority order:
/// 1. Explicit --config flag
/// 2. MONKEY_PATCHER_CONFIG environment variable
/// 3. monkey-patcher.toml in the current directory
fn resolve_config_path(cli_config: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_config {
        return Ok(path);
    }

    if let Ok(env_path) = env::var(CONFIG_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path);
        }
        eprintln!(
            "{}",
            format!("Warning: {CONFIG_ENV} is set but path doesn't exist: {env_path}").yellow()
        );
    }

    let local = env::current_dir()?.join(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    anyhow::bail!(
        "No config found. Pass --config, set {CONFIG_ENV}, or create ./{DEFAULT_CONFIG_FILE}"
    )
}

fn describe(origin: Origin) -> colored::ColoredString {
    match origin {
        Origin::OutOfScope => "out of scope".dimmed(),
        Origin::CacheHit => "cache hit".cyan(),
        Origin::Patched => "patched".green(),
        Origin::Unchanged => "unchanged".normal(),
    }
}

/// Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_patch(config: PatchConfiguration, file: &Path, show_diff: bool) -> Result<()> {
    let mut manager = PatchManager::new(config);
    let resolved = manager.resolve(file)?;
    eprintln!("{}: {}", file.display(), describe(resolved.origin));

    if show_diff {
        let original = std::fs::read(file)
            .with_context(|| format!("reading {}", file.display()))?;
        if original == resolved.bytes {
            println!("{}", "No changes".dimmed());
        } else {
            display_diff(
                file,
                &String::from_utf8_lossy(&original),
                &String::from_utf8_lossy(&resolved.bytes),
            );
        }
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    stdout.write_all(&resolved.bytes)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_scope(config: PatchConfiguration, path: &Path) -> Result<()> {
    let manager = PatchManager::new(config);
    if manager.in_scope(path) {
        println!("{} {}: in scope", "✓".green(), path.display());
    } else {
        println!("{} {}: out of scope", "⊘".cyan(), path.display());
    }
    Ok(())
}

fn cmd_status(config: &PatchConfiguration) -> Result<()> {
    let cache_dir = config.require_cache_dir()?;
    let snapshot = AxisSnapshot::from_configuration(config);
    let cache = RewriteCache::open(cache_dir, snapshot.generation())?;
    let changed = cache.changed_axes(&snapshot);

    println!("Cache: {}", cache_dir.display());
    println!("Generation: {:016x}", snapshot.generation());
    println!();

    for axis in Axis::ALL {
        if changed.contains(&axis) {
            println!(
                "{} {}: changed ({} entries)",
                "✗".yellow(),
                axis,
                snapshot.values(axis).len()
            );
        } else {
            println!("{} {}: up to date", "✓".green(), axis);
        }
    }

    println!();
    println!("Cached rewrites: {}", cache.entry_count());
    if !changed.is_empty() {
        println!(
            "{}",
            "The next load will clear the cache and record the new configuration.".dimmed()
        );
    }
    Ok(())
}

fn cmd_warm(config: PatchConfiguration) -> Result<()> {
    let mut manager = PatchManager::new(config);
    manager.lock()?;

    for axis in manager.changed_axes() {
        println!("{} {} changed, cache cleared", "⊙".yellow(), axis);
    }

    let mut patched = 0;
    let mut unchanged = 0;
    let mut cached = 0;
    let mut failed = 0;

    let roots: Vec<PathBuf> = manager.configuration().include_paths().to_vec();
    for root in roots {
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    eprintln!("{} {}", "✗".red(), err);
                    failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|s| s.to_str()) != Some("php")
                || !manager.in_scope(path)
            {
                continue;
            }

            match manager.resolve(path) {
                Ok(resolved) => match resolved.origin {
                    Origin::Patched => patched += 1,
                    Origin::Unchanged => unchanged += 1,
                    Origin::CacheHit => cached += 1,
                    Origin::OutOfScope => {}
                },
                Err(err) => {
                    eprintln!("{} {}: {}", "✗".red(), path.display(), err);
                    failed += 1;
                }
            }
        }
    }

    println!();
    println!("Summary:");
    println!("  Patched: {}", patched);
    println!("  Unchanged: {}", unchanged);
    println!("  Already cached: {}", cached);
    if failed > 0 {
        println!("  {}: {}", "Failed".red(), failed);
        anyhow::bail!("{} file(s) could not be resolved", failed);
    }
    Ok(())
}

fn cmd_clear(config: PatchConfiguration) -> Result<()> {
    let mut manager = PatchManager::new(config);
    manager.clear_cache()?;
    println!("{} cache cleared", "✓".green());
    Ok(())
}
