use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::Colorize;
use osr_resource::{ObjectMetadata, ResourceConfig, ResourceLoader, TargetKind};
use osr_store::{FsObjectStore, ObjectStoreClient};
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let (store, loader) = open_store(&cli)?;
    let result = match cli.command {
        Command::Buckets => cmd_buckets(store.as_ref(), cli.format),
        Command::Mb(args) => cmd_mb(&loader, &args.location),
        Command::Put(args) => cmd_put(&loader, args, cli.format),
        Command::Cat(args) => cmd_cat(&loader, &args.location),
        Command::Stat(args) => cmd_stat(&loader, &args.location, cli.format),
    };
    loader.shutdown();
    result
}

fn open_store(cli: &Cli) -> anyhow::Result<(Arc<FsObjectStore>, ResourceLoader)> {
    let mut config = match &cli.config {
        Some(path) => ResourceConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ResourceConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.store_root = root.clone();
    }
    let store = Arc::new(
        FsObjectStore::open(&config.store_root)
            .with_context(|| format!("opening store at {}", config.store_root.display()))?,
    );
    let loader = ResourceLoader::new(config, store.clone())?;
    Ok((store, loader))
}

fn cmd_buckets(store: &dyn ObjectStoreClient, format: OutputFormat) -> anyhow::Result<()> {
    let buckets = store.list_buckets()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&buckets)?),
        OutputFormat::Text => {
            if buckets.is_empty() {
                println!("No buckets.");
            }
            for bucket in buckets {
                println!("{}  {}", bucket.created.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(), bucket.name.bold());
            }
        }
    }
    Ok(())
}

fn cmd_mb(loader: &ResourceLoader, location: &str) -> anyhow::Result<()> {
    let resource = loader.load(location)?;
    let bucket = resource.create_bucket()?;
    println!("{} Bucket {} ready", "✓".green().bold(), bucket.name().yellow());
    Ok(())
}

fn cmd_put(loader: &ResourceLoader, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let meta = match &args.file {
        Some(path) => {
            let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            upload(loader, &args.location, &mut file, args.no_create)?
        }
        None => upload(loader, &args.location, &mut io::stdin().lock(), args.no_create)?,
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
        OutputFormat::Text => println!(
            "{} Stored {} ({} bytes, etag {})",
            "✓".green().bold(),
            args.location.yellow(),
            meta.content_length,
            meta.etag.get(..12).unwrap_or(meta.etag.as_str()).cyan()
        ),
    }
    Ok(())
}

/// Stream `source` into `location`. The upload outcome takes precedence over
/// a local copy error, since a failed upload usually breaks the pipe first.
pub fn upload(
    loader: &ResourceLoader,
    location: &str,
    source: &mut dyn Read,
    no_create: bool,
) -> anyhow::Result<ObjectMetadata> {
    let resource = loader.load(location)?.with_auto_create_files(!no_create);
    let mut writer = resource.open_write_stream()?;
    let copied = io::copy(source, &mut writer);
    let meta = writer
        .close()
        .with_context(|| format!("uploading to {location}"))?;
    copied.context("streaming data to the upload")?;
    Ok(meta)
}

fn cmd_cat(loader: &ResourceLoader, location: &str) -> anyhow::Result<()> {
    let resource = loader.load(location)?;
    let mut reader = resource.open_read_stream()?;
    io::copy(&mut reader, &mut io::stdout().lock())?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct StatReport {
    pub location: String,
    pub kind: &'static str,
    pub exists: bool,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

pub fn stat_report(loader: &ResourceLoader, location: &str) -> anyhow::Result<StatReport> {
    let resource = loader.load(location)?;
    let exists = resource.exists()?;
    let meta = match resource.kind() {
        TargetKind::Object if exists => Some(resource.metadata()?),
        _ => None,
    };
    Ok(StatReport {
        location: resource.uri(),
        kind: match resource.kind() {
            TargetKind::Bucket => "bucket",
            TargetKind::Object => "object",
        },
        exists,
        content_length: meta.as_ref().map(|m| m.content_length),
        last_modified: meta.as_ref().map(|m| m.last_modified),
        etag: meta.map(|m| m.etag),
    })
}

fn cmd_stat(loader: &ResourceLoader, location: &str, format: OutputFormat) -> anyhow::Result<()> {
    let report = stat_report(loader, location)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            let status = if report.exists { "exists".green() } else { "missing".red() };
            println!("{} ({}) {}", report.location.bold(), report.kind, status);
            if let Some(len) = report.content_length {
                println!("  Size: {len} bytes");
            }
            if let Some(modified) = report.last_modified {
                println!("  Modified: {}", modified.to_rfc3339());
            }
            if let Some(etag) = report.etag {
                println!("  ETag: {}", etag.cyan());
            }
        }
    }
    Ok(())
}
