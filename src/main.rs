use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use section_sync::config::{load_from_path, run_jobs, JobError, JobResult, RunOptions, SyncConfig};
use section_sync::extract::{extract, AddressingMode, BoundaryPolicy};
use section_sync::locate::Marker;
use section_sync::Document;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use walkdir::WalkDir;

/// Directory under the root holding job files.
const CONFIG_DIR: &str = ".section-sync";

#[derive(Parser)]
#[command(name = "section-sync")]
#[command(about = "Keep marker-delimited sections of documents in sync", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy sections from sources into destinations
    Sync {
        /// Root directory job paths resolve under (default: $SECTION_SYNC_ROOT or cwd)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Specific job file (otherwise every .toml in <root>/.section-sync/)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report destinations that have drifted from their sources
    Check {
        #[arg(short, long)]
        root: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the block between two markers of a file
    Extract {
        file: PathBuf,

        #[arg(short, long)]
        start: String,

        #[arg(short, long)]
        end: String,

        /// Treat the markers as regular expressions
        #[arg(short, long)]
        pattern: bool,

        /// offset | line
        #[arg(short, long, default_value = "offset")]
        addressing: AddressingMode,

        /// include-start-exclude-end | exclude-start-exclude-end | include-both
        #[arg(short, long, default_value = "include-start-exclude-end")]
        boundary: BoundaryPolicy,
    },

    /// List configured jobs
    List {
        #[arg(short, long)]
        root: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to install tracing subscriber")?;
    }

    match cli.command {
        Commands::Sync {
            root,
            config,
            dry_run,
            diff,
        } => cmd_sync(root, config, dry_run, diff),

        Commands::Check { root, config, json } => cmd_check(root, config, json),

        Commands::Extract {
            file,
            start,
            end,
            pattern,
            addressing,
            boundary,
        } => cmd_extract(&file, &start, &end, pattern, addressing, boundary),

        Commands::List { root, config } => cmd_list(root, config),
    }
}

/// Resolve the sync root.
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. SECTION_SYNC_ROOT environment variable
/// 3. Current directory
fn resolve_root(cli_root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_root {
        return path
            .canonicalize()
            .with_context(|| format!("root does not exist: {}", path.display()));
    }

    if let Ok(env_path) = env::var("SECTION_SYNC_ROOT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: SECTION_SYNC_ROOT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?)
}

/// Job files: the explicit one, or every .toml in `<root>/.section-sync/`.
fn config_files(root: &Path, explicit: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(vec![path]);
    }

    let config_dir = root.join(CONFIG_DIR);
    let mut files = Vec::new();
    if config_dir.exists() {
        for entry in WalkDir::new(&config_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    files.sort();

    if files.is_empty() {
        anyhow::bail!(
            "No .toml job files found in {} (pass --config to name one)",
            config_dir.display()
        );
    }
    Ok(files)
}

fn load_configs(root: &Path, explicit: Option<PathBuf>) -> Result<Vec<(PathBuf, SyncConfig)>> {
    config_files(root, explicit)?
        .into_iter()
        .map(|path| {
            let config = load_from_path(&path)?;
            Ok((path, config))
        })
        .collect()
}

/// Helper: Show unified diff between original and synchronized content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (current)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (synced)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        println!("{}", format!("{}", hunk.header()).cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{}", change).red(),
                ChangeTag::Insert => format!("+{}", change).green(),
                ChangeTag::Equal => format!(" {}", change).normal(),
            };
            print!("{}", line);
            if change.missing_newline() {
                println!();
            }
        }
    }
}

fn report_error(job_id: &str, error: &JobError) {
    eprintln!("{} {}: Error - {}", "✗".red(), job_id, error);
    if error.is_marker_not_found() {
        eprintln!("  {}", "CONFLICT: Markers could not be resolved".red());
        eprintln!("  The document was left untouched. Possible causes:");
        eprintln!("    - A marker was edited or removed");
        eprintln!("    - The end marker now precedes the start marker");
    }
}

fn cmd_sync(
    root: Option<PathBuf>,
    config: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let root = resolve_root(root)?;
    let configs = load_configs(&root, config)?;

    println!("Root: {}", root.display());
    println!();

    let mut total_updated = 0;
    let mut total_unchanged = 0;
    let mut total_failed = 0;

    for (path, config) in configs {
        println!("Loading jobs from {}...", path.display());
        if dry_run {
            println!("{}", "  [DRY RUN - showing what would be synced]".cyan());
        }

        let options = RunOptions {
            dry_run,
            capture_preview: show_diff,
        };

        for (job_id, result) in run_jobs(&config, &root, options) {
            match result {
                Ok(JobResult::Updated {
                    file,
                    written,
                    preview,
                }) => {
                    let verb = if written { "Updated" } else { "Would update" };
                    println!("{} {}: {} {}", "✓".green(), job_id, verb, file.display());
                    total_updated += 1;

                    if let Some(preview) = preview {
                        display_diff(&file, &preview.before, &preview.after);
                    }
                }
                Ok(JobResult::Unchanged { file }) => {
                    println!(
                        "{} {}: Up to date {}",
                        "⊙".yellow(),
                        job_id,
                        file.display()
                    );
                    total_unchanged += 1;
                }
                Err(e) => {
                    report_error(&job_id, &e);
                    total_failed += 1;
                }
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    let updated_label = if dry_run { "would update" } else { "updated" };
    println!("  {} {}", format!("{}", total_updated).green(), updated_label);
    println!("  {} up to date", format!("{}", total_unchanged).yellow());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Serialize)]
struct CheckEntry {
    job: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn cmd_check(root: Option<PathBuf>, config: Option<PathBuf>, json: bool) -> Result<()> {
    let root = resolve_root(root)?;
    let configs = load_configs(&root, config)?;

    let mut entries = Vec::new();
    for (_, config) in &configs {
        let results = run_jobs(
            config,
            &root,
            RunOptions {
                dry_run: true,
                capture_preview: false,
            },
        );
        for (job, result) in results {
            let entry = match result {
                Ok(JobResult::Unchanged { file }) => CheckEntry {
                    job,
                    status: "in-sync",
                    file: Some(file),
                    error: None,
                },
                Ok(JobResult::Updated { file, .. }) => CheckEntry {
                    job,
                    status: "drifted",
                    file: Some(file),
                    error: None,
                },
                Err(e) => CheckEntry {
                    job,
                    status: "error",
                    file: None,
                    error: Some(e.to_string()),
                },
            };
            entries.push(entry);
        }
    }

    let failing = entries.iter().filter(|e| e.status != "in-sync").count();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{}", "Section Sync Report".bold());
        println!("Root: {}", root.display());
        println!();

        for entry in &entries {
            match entry.status {
                "in-sync" => println!("{} {}: In sync", "✓".green(), entry.job),
                "drifted" => println!(
                    "{} {}: DRIFTED ({})",
                    "⊙".yellow(),
                    entry.job,
                    entry
                        .file
                        .as_deref()
                        .map(|f| f.display().to_string())
                        .unwrap_or_default()
                ),
                _ => eprintln!(
                    "{} {}: Error - {}",
                    "✗".red(),
                    entry.job,
                    entry.error.as_deref().unwrap_or("")
                ),
            }
        }

        println!();
        println!("{}", "Summary:".bold());
        println!(
            "  {} in sync",
            format!("{}", entries.len() - failing).green()
        );
        println!("  {} drifted or failed", format!("{}", failing).red());
    }

    if failing > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_extract(
    file: &Path,
    start: &str,
    end: &str,
    pattern: bool,
    addressing: AddressingMode,
    boundary: BoundaryPolicy,
) -> Result<()> {
    let (start, end) = if pattern {
        (Marker::pattern(start)?, Marker::pattern(end)?)
    } else {
        (Marker::literal(start), Marker::literal(end))
    };

    let document =
        Document::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let extraction = extract(document.text(), &start, &end, boundary, addressing)
        .with_context(|| format!("in {}", file.display()))?;

    tracing::debug!(region = %extraction.region, "extracted block");
    print!("{}", extraction.block);

    Ok(())
}

fn cmd_list(root: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let configs = load_configs(&root, config)?;

    for (path, config) in configs {
        let title = if config.meta.name.is_empty() {
            path.display().to_string()
        } else {
            format!("{} ({})", config.meta.name, path.display())
        };
        println!("{}", title.bold());
        if let Some(description) = &config.meta.description {
            println!("  {}", description.dimmed());
        }

        for job in &config.jobs {
            let source = job.source.as_deref().unwrap_or("<inline>");
            println!(
                "  - {}: {} -> {} ({} section{})",
                job.id,
                source,
                job.destination,
                1 + job.secondary.len(),
                if job.secondary.is_empty() { "" } else { "s" }
            );
        }
        println!();
    }

    Ok(())
}
