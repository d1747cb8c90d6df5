mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

use cli::{Cli, Commands, TagCommand};
use cmdseek::config::{self, Config};
use cmdseek::discovery::{self, FileContentSource};
use cmdseek::embedder::{LoadProgress, ProgressFn};
use cmdseek::lifecycle::LifecycleManager;
use cmdseek::pipeline::{embedding, summary, Progress};
use cmdseek::summariser::ollama::OllamaClient;
use cmdseek::{migration, search};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::load()?;

    let lifecycle = LifecycleManager::with_defaults(config::models_dir(), Some(model_progress()));
    let root = cli.root.as_path();

    let result = match cli.command {
        Commands::Search(args) => cmd_search(&lifecycle, &config, root, args).await,
        Commands::Refresh(args) => cmd_refresh(&lifecycle, &config, root, &args.manifest).await,
        Commands::Summarise(args) => cmd_summarise(&lifecycle, &config, root, &args.manifest).await,
        Commands::Embed => cmd_embed(&lifecycle, root).await,
        Commands::Migrate => cmd_migrate(&lifecycle, root).await,
        Commands::Tag(command) => cmd_tag(&lifecycle, root, command).await,
        Commands::Status => cmd_status(&lifecycle, root).await,
        Commands::Config => cmd_config(&config),
    };

    lifecycle.dispose_all().await;
    result
}

async fn cmd_search(
    lifecycle: &LifecycleManager,
    config: &Config,
    root: &Path,
    args: cli::SearchArgs,
) -> Result<()> {
    let mut options = search::SearchOptions::from(config);
    if let Some(limit) = args.limit {
        options.top_k = limit;
    }

    let ranked = search::search(lifecycle, root, &args.query, options)
        .await
        .map_err(|e| anyhow::anyhow!("search failed: {}", e))?;

    if ranked.is_empty() {
        if args.json {
            println!("[]");
        } else {
            eprintln!("{} No matches for \"{}\"", "Info:".blue(), args.query);
        }
        return Ok(());
    }

    let store = lifecycle.get_store()?;
    let hits = search::describe_hits(&store, &ranked)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} (score: {:.4})",
            (i + 1).to_string().bold(),
            hit.command_id,
            hit.score
        );
        if let Some(summary) = &hit.summary {
            println!("   {}", summary);
        }
        if let Some(warning) = &hit.security_warning {
            println!("   {} {}", "security:".red().bold(), warning.red());
        }
        println!();
    }

    Ok(())
}

async fn cmd_refresh(
    lifecycle: &LifecycleManager,
    config: &Config,
    root: &Path,
    manifest: &Path,
) -> Result<()> {
    cmd_migrate(lifecycle, root).await?;

    // Each sweep fails on its own; report both before giving up.
    let summarised = cmd_summarise(lifecycle, config, root, manifest).await;
    if let Err(e) = &summarised {
        eprintln!("{} {:#}", "Warning:".yellow(), e);
    }
    cmd_embed(lifecycle, root).await?;
    summarised
}

async fn cmd_summarise(
    lifecycle: &LifecycleManager,
    config: &Config,
    root: &Path,
    manifest: &Path,
) -> Result<()> {
    let commands = discovery::load_manifest(manifest)
        .with_context(|| format!("Failed to load manifest {:?}", manifest))?;
    let store = lifecycle.init_store(root).await?;

    if !config.summarise_enabled {
        for item in &commands {
            store.register_command(&item.id, "")?;
        }
        eprintln!(
            "{} Summarisation is disabled in {}",
            "Note:".yellow(),
            config::config_path().display()
        );
        return Ok(());
    }

    let client = OllamaClient::new(&config.ollama_url, &config.summary_model);
    let pb = pipeline_bar("summarising");
    let report = summary::run_summary_pipeline(
        &store,
        &client,
        &FileContentSource,
        &commands,
        &summary::SummaryOptions::from_config(config),
        |p| update_bar(&pb, p),
    )
    .await;
    pb.finish_and_clear();

    let report = report.context("Summary pipeline failed")?;
    eprintln!(
        "{} {} summarised, {} failed{}",
        "→".green(),
        report.succeeded,
        report.failed,
        if report.aborted { " (stopped early)" } else { "" }
    );
    Ok(())
}

async fn cmd_embed(lifecycle: &LifecycleManager, root: &Path) -> Result<()> {
    let store = lifecycle.init_store(root).await?;
    if store.get_rows_missing_embedding()?.is_empty() {
        eprintln!("{} All summaries are embedded", "→".green());
        return Ok(());
    }

    let embedder = lifecycle.get_or_create_embedder(root).await?;
    let pb = pipeline_bar("embedding");
    let report =
        embedding::run_embedding_pipeline(&store, embedder.as_ref(), |p| update_bar(&pb, p)).await;
    pb.finish_and_clear();

    let report = report.context("Embedding pipeline failed")?;
    eprintln!(
        "{} {} embedded, {} failed",
        "→".green(),
        report.succeeded,
        report.failed
    );
    Ok(())
}

async fn cmd_migrate(lifecycle: &LifecycleManager, root: &Path) -> Result<()> {
    let store = lifecycle.init_store(root).await?;
    let report = migration::migrate_if_needed(&store, root).await?;
    if report.found > 0 {
        eprintln!(
            "{} Imported {} of {} legacy records",
            "→".green(),
            report.imported,
            report.found
        );
    }
    Ok(())
}

async fn cmd_tag(lifecycle: &LifecycleManager, root: &Path, command: TagCommand) -> Result<()> {
    let store = lifecycle.init_store(root).await?;

    match command {
        TagCommand::Add { tag, command_id } => {
            if !store.add_tag(&command_id, &tag)? {
                eprintln!("{} {} already tagged {}", "Note:".yellow(), command_id, tag);
            }
        }
        TagCommand::Remove { tag, command_id } => {
            if !store.remove_tag(&command_id, &tag)? {
                eprintln!("{} {} was not tagged {}", "Note:".yellow(), command_id, tag);
            }
        }
        TagCommand::Move {
            tag,
            command_id,
            index,
        } => store.move_in_tag(&command_id, &tag, index)?,
        TagCommand::List { tag: Some(tag) } => {
            for id in store.get_command_ids_by_tag(&tag)? {
                println!("{}", id);
            }
        }
        TagCommand::List { tag: None } => {
            for tag in store.list_tags()? {
                println!("{}", tag);
            }
        }
    }

    Ok(())
}

async fn cmd_status(lifecycle: &LifecycleManager, root: &Path) -> Result<()> {
    let store = lifecycle.init_store(root).await?;
    let stats = store.stats()?;
    println!("{} {}", "Store:".bold(), config::db_path(root).display());
    println!("  commands:   {}", stats.commands);
    println!("  summarised: {}", stats.summarised);
    println!("  embedded:   {}", stats.embedded);
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let path = config::config_path();

    println!("{} {}\n", "Config file:".bold(), path.display());
    println!("{}", toml::to_string_pretty(config)?);

    if !path.exists() {
        println!(
            "\n{} No config file found. Creating default at {}",
            "Note:".yellow(),
            path.display()
        );
        config.save()?;
    }

    Ok(())
}

fn pipeline_bar(label: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(label.to_string());
    pb
}

fn update_bar(pb: &ProgressBar, p: Progress) {
    pb.set_length(p.total as u64);
    pb.set_position(p.done as u64);
    pb.set_message(format!("{} ok, {} failed", p.succeeded, p.failed));
}

/// Renders model download progress on stderr
fn model_progress() -> Arc<ProgressFn> {
    let pb = ProgressBar::hidden();
    Arc::new(move |p: LoadProgress| match p {
        LoadProgress::Downloading {
            file,
            downloaded,
            total,
        } => {
            if pb.is_hidden() {
                pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("  {spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
            }
            pb.set_message(file);
            pb.set_length(total.unwrap_or(0));
            pb.set_position(downloaded);
        }
        LoadProgress::Loading => pb.set_message("loading model"),
        LoadProgress::Ready => pb.finish_and_clear(),
    })
}
