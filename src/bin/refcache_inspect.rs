//! refcache inspection tool
//!
//! Builds a cache over a JSON fixture, runs the startup preload, optionally
//! replays a file of push events through the handler table and prints the
//! resulting cache contents as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use refcache::{logging, CacheConfig, CacheStats, HandlerTable, InMemorySource, PreloadSummary, ReferenceCache};

/// Command-line options
#[derive(Default)]
struct Args {
    /// TOML configuration file
    config: Option<PathBuf>,
    /// InMemorySource snapshot (JSON)
    fixture: Option<PathBuf>,
    /// JSON array of events to replay after init
    replay: Option<PathBuf>,
    /// Extra categories to preload
    categories: Vec<String>,
}

fn value_of(args: &[String], i: usize, flag: &str) -> String {
    args.get(i + 1).cloned().unwrap_or_else(|| {
        eprintln!("error: {flag} requires a value");
        std::process::exit(1);
    })
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                parsed.config = Some(PathBuf::from(value_of(&args, i, "--config")));
                i += 2;
            }
            "--fixture" | "-f" => {
                parsed.fixture = Some(PathBuf::from(value_of(&args, i, "--fixture")));
                i += 2;
            }
            "--replay" | "-r" => {
                parsed.replay = Some(PathBuf::from(value_of(&args, i, "--replay")));
                i += 2;
            }
            "--category" => {
                parsed.categories.push(value_of(&args, i, "--category"));
                i += 2;
            }
            "--help" | "-h" => {
                println!("refcache-inspect - preload a reference cache and print its contents");
                println!();
                println!("USAGE:");
                println!("    refcache-inspect [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -c, --config <FILE>       TOML configuration");
                println!("    -f, --fixture <FILE>      JSON source snapshot [default: empty source]");
                println!("    -r, --replay <FILE>       JSON array of events to dispatch after init");
                println!("        --category <NAME>     Category to preload (repeatable)");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }
    parsed
}

#[derive(Serialize)]
struct CategoryReport {
    category: String,
    references: usize,
    with_metrics: usize,
    with_segments: usize,
}

#[derive(Serialize)]
struct Report {
    preloaded: Vec<PreloadSummary>,
    replayed: usize,
    categories: Vec<CategoryReport>,
    stats: CacheStats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let mut config = match &args.config {
        Some(path) => CacheConfig::from_file(path)?,
        None => CacheConfig::default(),
    };
    for category in args.categories {
        if !config.preload_categories.contains(&category) {
            config.preload_categories.push(category);
        }
    }
    logging::init(&config.logging)?;

    let source = match &args.fixture {
        Some(path) => InMemorySource::from_json_str(&std::fs::read_to_string(path)?)?,
        None => InMemorySource::default(),
    };

    let cache = Arc::new(ReferenceCache::new(Arc::new(source), config)?);
    let preloaded = cache.init().await?;

    let mut replayed = 0;
    if let Some(path) = &args.replay {
        let events: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let table = HandlerTable::for_cache(Arc::clone(&cache));
        for event in events {
            let name = event.get("event").and_then(Value::as_str).unwrap_or_default().to_string();
            replayed += table.dispatch(&name, event).await?;
        }
    }

    let categories = cache
        .config()
        .preload_categories
        .iter()
        .map(|category| {
            let references = cache.references_in(category);
            CategoryReport {
                category: category.clone(),
                references: references.len(),
                with_metrics: references.iter().filter(|r| cache.get_metrics(&r.id).is_some()).count(),
                with_segments: references
                    .iter()
                    .filter(|r| !cache.get_reference_segments(&r.id).is_empty())
                    .count(),
            }
        })
        .collect();

    let report = Report {
        preloaded,
        replayed,
        categories,
        stats: cache.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    cache.dispose();
    Ok(())
}
