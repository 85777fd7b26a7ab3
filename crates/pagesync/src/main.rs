use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pagesync_core::config::{SyncConfig, load_config};
use pagesync_core::extract::{extract_updates, parse_commit_message};
use pagesync_core::patch::apply_updates;
use pagesync_core::store::{ConfluenceClient, ConfluenceClientConfig, ContentStore};
use pagesync_core::sync::run_sync;

const DEFAULT_CONFIG_PATH: &str = "pagesync.toml";

#[derive(Debug, Parser)]
#[command(
    name = "pagesync",
    version,
    about = "Sync wiki page fields from commit messages"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Parse a commit message, resolve the page, and sync it")]
    Sync(SyncArgs),
    #[command(about = "Show what a commit message would update, offline")]
    Preview(PreviewArgs),
    #[command(about = "Patch a local body file with a commit message, offline")]
    Apply(ApplyArgs),
    #[command(about = "List spaces visible to the configured account")]
    Spaces,
    #[command(about = "List pages in a space")]
    Pages(PagesArgs),
}

#[derive(Debug, Args)]
struct SyncArgs {
    message: String,
    #[arg(long, help = "Print the full report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct PreviewArgs {
    message: String,
}

#[derive(Debug, Args)]
struct ApplyArgs {
    #[arg(long, value_name = "PATH", help = "Storage-format body file to patch")]
    file: PathBuf,
    message: String,
    #[arg(long, help = "Write the patched body back to the file")]
    write: bool,
}

#[derive(Debug, Args)]
struct PagesArgs {
    space_key: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_cli_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync(args) => run_sync_command(&config, args),
        Commands::Preview(args) => run_preview(args),
        Commands::Apply(args) => run_apply(args),
        Commands::Spaces => run_spaces(&config),
        Commands::Pages(args) => run_pages(&config, args),
    }
}

fn load_cli_config(path: Option<&Path>) -> Result<SyncConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    load_config(path)
}

fn build_client(config: &SyncConfig) -> Result<ConfluenceClient> {
    ConfluenceClient::new(ConfluenceClientConfig::from_config(config))
}

fn run_sync_command(config: &SyncConfig, args: SyncArgs) -> Result<()> {
    let mut client = build_client(config)?;
    let report = run_sync(&mut client, &args.message)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("outcome: {}", report.outcome.as_str());
    if let Some(reason) = &report.reason {
        println!("reason: {reason}");
    }
    if let Some(space_key) = &report.space_key {
        println!("space_key: {space_key}");
    }
    if let Some(page_id) = &report.page_id {
        println!("page_id: {page_id}");
    }
    if let Some(page_title) = &report.page_title {
        println!("page_title: {page_title}");
    }
    if let Some(new_version) = report.new_version {
        println!("new_version: {new_version}");
    }
    for patch in &report.patches {
        println!(
            "patch: {} -> {} ({})",
            patch.field,
            patch.value,
            patch.action.as_str()
        );
    }
    println!("request_count: {}", report.request_count);
    Ok(())
}

fn run_preview(args: PreviewArgs) -> Result<()> {
    match parse_commit_message(&args.message) {
        Some(commit) => {
            println!("project: {}", commit.project);
            println!("module: {}", commit.module);
            println!("component: {}", commit.component);
            let updates = extract_updates(&commit.description);
            if updates.is_empty() {
                println!("updates: <none>");
            } else {
                for update in &updates {
                    println!("update: {} -> {}", update.field, update.value);
                }
            }
        }
        None => {
            println!("commit_ref: <none> (expected [project][module][component] prefix)");
        }
    }
    Ok(())
}

fn run_apply(args: ApplyArgs) -> Result<()> {
    let body = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let description = match parse_commit_message(&args.message) {
        Some(commit) => commit.description,
        None => args.message.clone(),
    };
    let updates = extract_updates(&description);
    let report = apply_updates(&body, &updates);

    println!("changed: {}", report.changed);
    for patch in &report.patches {
        println!(
            "patch: {} -> {} ({})",
            patch.field,
            patch.value,
            patch.action.as_str()
        );
    }
    if args.write {
        if report.changed {
            fs::write(&args.file, &report.body)
                .with_context(|| format!("failed to write {}", args.file.display()))?;
            println!("wrote: {}", args.file.display());
        } else {
            println!("wrote: <nothing to do>");
        }
    } else {
        println!("{}", report.body);
    }
    Ok(())
}

fn run_spaces(config: &SyncConfig) -> Result<()> {
    let mut client = build_client(config)?;
    let spaces = client.list_spaces()?;
    println!("spaces.count: {}", spaces.len());
    for space in &spaces {
        println!("space: {} ({})", space.key, space.name);
    }
    Ok(())
}

fn run_pages(config: &SyncConfig, args: PagesArgs) -> Result<()> {
    let mut client = build_client(config)?;
    let pages = client.list_pages(&args.space_key)?;
    println!("pages.count: {}", pages.len());
    for page in &pages {
        match &page.parent_id {
            Some(parent_id) => println!("page: {} {} (parent {})", page.id, page.title, parent_id),
            None => println!("page: {} {}", page.id, page.title),
        }
    }
    Ok(())
}
