use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use photo_metadata::fetch::{HttpFetcher, ImageFetcher};
use photo_metadata::pipeline::{self, MetadataRequest};
use photo_metadata::{config, exif, server};

// ANSI styles for --show-exif
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(
    name = "photo-metadata",
    version,
    about = "Serve the GetPhotoMetadata function, or look up a single image URL"
)]
struct Cli {
    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Listen port (overrides config and FUNCTIONS_CUSTOMHANDLER_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Look up one image URL, print the JSON result and exit
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Include diagnostics in the --url output
    #[arg(long, requires = "url")]
    debug: bool,

    /// Print every decoded EXIF tag of --url instead of the summary
    #[arg(long = "show-exif", requires = "url")]
    show_exif: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;
    config.apply_env();
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let fetcher = Arc::new(HttpFetcher::from_config(&config.fetch)?);

    if let Some(url) = cli.url {
        if cli.show_exif {
            return show_exif(&url, fetcher.as_ref()).await;
        }
        return lookup(url, cli.debug, fetcher.as_ref()).await;
    }

    server::serve(&config, fetcher).await
}

/// One-shot lookup: same pipeline and messages as the HTTP endpoint.
async fn lookup(url: String, debug: bool, fetcher: &dyn ImageFetcher) -> Result<()> {
    let request = MetadataRequest::new(url, debug)?;
    let result = pipeline::process(&request, fetcher).await;

    match result.into_body(debug) {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err((err, info)) => {
            if let Some(body) = err.debug_body(&info).filter(|_| debug) {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Err(err.into())
        }
    }
}

async fn show_exif(url: &str, fetcher: &dyn ImageFetcher) -> Result<()> {
    let raw = fetcher.fetch(url).await?;
    let extraction = exif::extract(&raw.bytes)?;
    let tags = &extraction.tags;

    println!();
    println!("{BOLD}URL:{RESET} {url}");
    println!(
        "{DIM}{} {}x{}, {} bytes{RESET}",
        extraction.image.format_name(),
        extraction.image.width,
        extraction.image.height,
        raw.bytes.len()
    );
    println!("{DIM}{}{RESET}", "═".repeat(72));

    if tags.is_empty() {
        println!("  No EXIF data found.");
        println!();
        return Ok(());
    }

    if !tags.tags.is_empty() {
        println!("  {BOLD}Image{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (key, value) in &tags.tags {
            print_row(&key.to_string(), &value.to_string());
        }
        println!();
    }

    if let Some(gps) = &tags.gps {
        println!("  {BOLD}GPSInfo{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (key, value) in gps.entries() {
            print_row(&key.to_string(), &value.to_string());
        }
        println!();
    }

    let meta = exif::normalize(tags);
    println!("  {BOLD}Summary{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    print_row("date_time", meta.date_time.as_deref().unwrap_or("-"));
    print_row("latitude", &meta.latitude.map_or("-".to_string(), |v| v.to_string()));
    print_row("longitude", &meta.longitude.map_or("-".to_string(), |v| v.to_string()));
    println!();

    Ok(())
}

fn print_row(tag: &str, value: &str) {
    println!("    {DIM}{tag:<28}{RESET} {value}");
}
