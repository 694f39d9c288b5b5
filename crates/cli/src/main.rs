use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use core_types::BuildError;
use core_types::config::{AppConfig, load_config};
use embed_build::args::{BuildArgs, Cli, Command, VerifyArgs};
use embed_build::logging::init_tracing;
use embed_build::{VERSION, run_build};
use embedder::{BatchProgress, provider_from_config};
use indicatif::{ProgressBar, ProgressStyle};
use semantic_index::verify_index;
use std::path::Path;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref())?;
    cli.apply_logging(&mut cfg);
    let _guard = init_tracing(&cfg.logging)?;
    tracing::debug!(version = VERSION, "embed-build starting");

    match &cli.command {
        Command::Build(args) => build(cfg, args),
        Command::Verify(args) => verify(args),
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} embedding [{bar:40.cyan/blue}] {pos}/{len} batches ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn build(mut cfg: AppConfig, args: &BuildArgs) -> Result<()> {
    args.apply(&mut cfg);
    cfg.validate().context("invalid build configuration")?;

    let provider = provider_from_config(&cfg.embedding)
        .context("failed to initialise embedding provider")?;

    let bar = progress_bar();
    let mut on_progress = |p: BatchProgress| {
        bar.set_length(p.total as u64);
        bar.set_position(p.completed as u64);
    };
    let outcome = run_build(&cfg, provider, &mut on_progress);
    bar.finish_and_clear();

    match outcome {
        Ok(summary) => {
            println!(
                "{} {} documents → {} chunks ({} split) embedded with {} [{}]",
                style("✔").green().bold(),
                summary.documents,
                summary.chunks,
                summary.chunked,
                style(&summary.model).cyan(),
                summary.profile,
            );
            println!(
                "  wrote {} vector shard(s), HNSW graph (max level {}) and manifest to {} in {:.1}s",
                summary.shards,
                summary.max_level,
                style(summary.out_dir.display()).bold(),
                summary.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(BuildError::NoInputData) => {
            tracing::info!(input = %cfg.input.jsonl.display(), "no input documents; nothing to build");
            println!(
                "{} no input found in {}; run the site build first to emit JSONL",
                style("!").yellow().bold(),
                cfg.input.jsonl.display()
            );
            Ok(())
        }
        Err(err) => Err(err).context("index build failed; previous output left unchanged"),
    }
}

fn verify(args: &VerifyArgs) -> Result<()> {
    let dir: &Path = &args.dir;
    let report =
        verify_index(dir).with_context(|| format!("verification of {} failed", dir.display()))?;
    println!(
        "{} {}: {} rows × {} dims in {} shard(s); {} graph level(s), {} edges, max degree {}",
        style("✔").green().bold(),
        dir.display(),
        report.rows,
        report.dims,
        report.shards,
        report.levels,
        report.edges,
        report.max_degree
    );
    Ok(())
}
