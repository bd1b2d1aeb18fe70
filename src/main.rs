use anyhow::{Context, Result};
use reverse_search_bot::chat::ChatSink;
use reverse_search_bot::commands;
use reverse_search_bot::config::BotConfig;
use reverse_search_bot::console::{self, ConsoleSink, TracingOperatorChannel};
use reverse_search_bot::engines::EngineRegistry;
use reverse_search_bot::hosting::{DirectoryHost, ImageHost};
use reverse_search_bot::search::{best_match_pass, fan_out, gate};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "engines" => print_engines(args.get(2).map(|s| s.as_str()))?,
            "host" => host_file(args.get(2).map(|s| s.as_str())).await?,
            "search" => run_search(args.get(2).map(|s| s.as_str())).await?,
            "--help" | "-h" => print_help(),
            _ => {
                println!("Unknown command: {}", args[1]);
                print_help();
            }
        }
    } else {
        print_help();
    }

    Ok(())
}

fn print_engines(mode: Option<&str>) -> Result<()> {
    let config = BotConfig::from_env();
    let registry = EngineRegistry::standard(&config)?;
    let more = mode == Some("more");
    println!(
        "{}",
        console::strip_html(&commands::engines_overview(&registry, more))
    );
    Ok(())
}

/// Put a local image into the data directory and print its public URL.
async fn host_file(path: Option<&str>) -> Result<()> {
    let Some(path) = path else {
        println!("Usage: reverse-search-bot host <image-file>");
        return Ok(());
    };

    let config = BotConfig::from_env();
    let base_url = env::var("BOT_BASE_URL")
        .unwrap_or_else(|_| format!("file://{}/images", config.data_dir));
    let host = DirectoryHost::new(&config.data_dir, &base_url)?;

    let name = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image.jpg");

    if host.file_exists(name).await? {
        println!("already hosted: {}", host.get_url(name).await?);
        return Ok(());
    }

    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path))?;
    println!("hosted: {}", host.upload(bytes, name).await?);
    Ok(())
}

/// Run both search passes for an already hosted image URL, printing every
/// message the bot would send.
async fn run_search(image_url: Option<&str>) -> Result<()> {
    let Some(image_url) = image_url else {
        println!("Usage: reverse-search-bot search <image-url>");
        return Ok(());
    };

    let config = BotConfig::from_env();
    let registry = Arc::new(EngineRegistry::standard(&config)?);
    let sink: Arc<dyn ChatSink> = Arc::new(ConsoleSink::new());
    let operator = TracingOperatorChannel;

    let (release, waiter) = gate();
    let fanout = tokio::spawn({
        let registry = Arc::clone(&registry);
        let sink = Arc::clone(&sink);
        let config = config.clone();
        let image_url = image_url.to_string();
        async move { fan_out(&registry, sink.as_ref(), &config, &image_url, None, release).await }
    });

    best_match_pass(
        &registry,
        sink.as_ref(),
        &operator,
        image_url,
        None,
        Some(waiter),
    )
    .await?;

    // wait until every placeholder button has resolved
    fanout.await??;

    Ok(())
}

fn print_help() {
    println!("reverse-search-bot - reverse image search front-end\n");
    println!("Usage:");
    println!("  reverse-search-bot engines [more]      # list the supported engines");
    println!("  reverse-search-bot host <image-file>   # put a local image into the data directory");
    println!("  reverse-search-bot search <image-url>  # search a hosted image from the console");
    println!("  reverse-search-bot --help              # show this help\n");
    println!("Environment:");
    println!("  SAUCENAO_API_KEY   enable SauceNAO best-match lookups");
    println!("  BOT_DATA_DIR       data directory for hosted images (default ./data)");
    println!("  BOT_BASE_URL       public base URL the data directory is served from");
    println!("  RUST_LOG           log filter (default info)");
}
