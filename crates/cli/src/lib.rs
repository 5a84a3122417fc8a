//! `ai-audit`: multi-persona LLM code review from the command line.

use anyhow::{Context as AnyhowContext, Result};
use audit_inference::InferenceClient;
use audit_pipeline::{Pipeline, Severity};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "ai-audit")]
#[command(about = "Review source code with LLM personas", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Simultaneous model calls (overrides AI_AUDIT_CONCURRENCY)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Character ceiling for chunks and prompts (overrides AI_AUDIT_CHAR_LIMIT)
    #[arg(long, global = true)]
    char_limit: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a file or every supported file below a directory
    Audit(AuditArgs),

    /// Extract the design rationale of each function and class
    #[command(name = "extract-why")]
    ExtractWhy(ExtractWhyArgs),

    /// Show stored design rationale
    #[command(name = "list-why")]
    ListWhy(ListWhyArgs),

    /// Review the architecture of a directory from file skeletons
    #[command(name = "review-architecture")]
    ReviewArchitecture(ReviewArchitectureArgs),

    /// Generate internal and external design documents
    #[command(name = "design-doc")]
    DesignDoc(DesignDocArgs),

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Args)]
struct AuditArgs {
    /// File or directory to audit
    path: PathBuf,

    /// Ignore cached results and ask the model again
    #[arg(long)]
    force: bool,

    /// Write artifacts here instead of next to the sources
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ExtractWhyArgs {
    dir: PathBuf,

    /// Re-extract chunks that already have rationale
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ListWhyArgs {
    dir: PathBuf,

    /// Only entries whose chunk id or text contains this (case-insensitive)
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Args)]
struct ReviewArchitectureArgs {
    dir: PathBuf,

    /// Write the Markdown review to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct DesignDocArgs {
    dir: PathBuf,

    /// Directory for the design documents (default: the audited directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Regenerate both documents from scratch
    #[arg(long)]
    force: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // HTTP client internals are noisy below warn
    builder.filter_module("reqwest", log::LevelFilter::Warn);
    builder.filter_module("hyper", log::LevelFilter::Warn);
    builder.target(env_logger::Target::Stderr).init();

    let settings = Settings::load()?.with_overrides(cli.concurrency, cli.char_limit);

    if let Commands::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&settings.to_masked_json())?);
        return Ok(());
    }

    let pipeline = open_pipeline(&settings).await?;
    let outcome = match cli.command {
        Commands::Audit(args) => run_audit(&pipeline, args).await,
        Commands::ExtractWhy(args) => run_extract_why(&pipeline, args).await,
        Commands::ListWhy(args) => run_list_why(&pipeline, args).await,
        Commands::ReviewArchitecture(args) => run_review_architecture(&pipeline, args).await,
        Commands::DesignDoc(args) => run_design_doc(&pipeline, args).await,
        Commands::Config => Ok(()),
    };

    let stats = pipeline.stats();
    log::debug!(
        "Model calls: {}, cache hits: {}, processing errors: {}",
        stats.calls,
        stats.cache_hits,
        stats.processing_errors
    );
    if let Err(e) = pipeline.close().await {
        log::warn!("Failed to close the cache: {e}");
    }
    outcome
}

async fn open_pipeline(settings: &Settings) -> Result<Pipeline> {
    let model = settings.model_config()?;
    log::info!("Model {} at {}", model.model_name, model.api_base_url);
    let client = InferenceClient::new(model).context("Failed to create the model client")?;
    Pipeline::open(settings.pipeline_config(), client)
        .await
        .with_context(|| format!("Failed to open data dir {}", settings.data_dir.display()))
}

async fn run_audit(pipeline: &Pipeline, args: AuditArgs) -> Result<()> {
    let output_dir = args.output_dir.as_deref();
    if args.path.is_file() {
        let audited = pipeline
            .audit_single(&args.path, args.force, output_dir)
            .await
            .with_context(|| format!("Audit of {} failed", args.path.display()))?;
        match audited {
            None => println!("{}: nothing to audit", args.path.display()),
            Some((result, artifact)) => {
                println!(
                    "{}: {} issues ({} high) in {} chunks",
                    result.source_file.display(),
                    result.total_issues,
                    result.high_severity(),
                    result.chunks.len()
                );
                for chunk in &result.chunks {
                    for issue in chunk.issues.iter().filter(|i| i.severity == Severity::High) {
                        println!(
                            "  line {}: [{}] {}",
                            issue.absolute_line.unwrap_or(chunk.start_line + 1),
                            issue.issue_type,
                            issue.description
                        );
                    }
                }
                println!("Report: {}", artifact.display());
            }
        }
        return Ok(());
    }

    let summary = pipeline
        .audit_directory(&args.path, args.force, output_dir)
        .await
        .with_context(|| format!("Audit of {} failed", args.path.display()))?;
    println!(
        "Audited {}/{} files ({} skipped, {} failed): {} issues, {} high",
        summary.audited_files,
        summary.total_files,
        summary.skipped_files,
        summary.failed.len(),
        summary.total_issues,
        summary.high_severity_total
    );
    for file in summary.files.iter().filter(|f| f.total_issues > 0).take(10) {
        println!("  {:>4}  {}", file.total_issues, file.file);
    }
    for failed in &summary.failed {
        eprintln!("  failed: {} ({})", failed.file, failed.reason);
    }
    println!("Summary: {}", summary.summary_path.display());
    Ok(())
}

async fn run_extract_why(pipeline: &Pipeline, args: ExtractWhyArgs) -> Result<()> {
    let report = pipeline
        .extract_rationale(&args.dir, args.force)
        .await
        .with_context(|| format!("Rationale extraction for {} failed", args.dir.display()))?;
    println!(
        "Extracted {}, skipped {}, failed {}; {} entries in {}",
        report.extracted,
        report.skipped,
        report.failed,
        report.total_entries,
        report.store_path.display()
    );
    Ok(())
}

async fn run_list_why(pipeline: &Pipeline, args: ListWhyArgs) -> Result<()> {
    let entries = pipeline
        .list_rationale(&args.dir, args.filter.as_deref())
        .await
        .with_context(|| format!("Failed to read rationale for {}", args.dir.display()))?;
    if entries.is_empty() {
        println!("No rationale stored for {}", args.dir.display());
        return Ok(());
    }
    for entry in entries {
        println!("## {} ({})\n\n{}\n", entry.chunk_id, entry.kind, entry.rationale.trim());
    }
    Ok(())
}

async fn run_review_architecture(pipeline: &Pipeline, args: ReviewArchitectureArgs) -> Result<()> {
    let report = pipeline
        .review_architecture(&args.dir, args.output.as_deref())
        .await
        .with_context(|| format!("Architecture review of {} failed", args.dir.display()))?;
    match report.output_path {
        Some(path) => println!(
            "Reviewed {} files in {} batches: {}",
            report.file_count,
            report.batch_count,
            path.display()
        ),
        None => println!("{}", report.markdown),
    }
    Ok(())
}

async fn run_design_doc(pipeline: &Pipeline, args: DesignDocArgs) -> Result<()> {
    let report = pipeline
        .generate_design_doc(&args.dir, args.output_dir.as_deref(), args.force)
        .await
        .with_context(|| format!("Design document for {} failed", args.dir.display()))?;
    if report.stage1_skipped {
        println!("Reused {}", report.detail_path.display());
    } else {
        println!("Wrote {}", report.detail_path.display());
    }
    println!("Wrote {}", report.overview_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ai-audit",
            "audit",
            "src",
            "--force",
            "--concurrency",
            "8",
            "--char-limit",
            "3000",
        ])
        .unwrap();
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(cli.char_limit, Some(3000));
        match cli.command {
            Commands::Audit(args) => {
                assert!(args.force);
                assert_eq!(args.path, PathBuf::from("src"));
                assert!(args.output_dir.is_none());
            }
            _ => panic!("expected audit"),
        }
    }

    #[test]
    fn review_architecture_short_output_flag() {
        let cli = Cli::try_parse_from(["ai-audit", "review-architecture", ".", "-o", "arch.md"]).unwrap();
        match cli.command {
            Commands::ReviewArchitecture(args) => assert_eq!(args.output, Some(PathBuf::from("arch.md"))),
            _ => panic!("expected review-architecture"),
        }
    }
}
