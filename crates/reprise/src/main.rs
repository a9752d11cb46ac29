//! Reprise CLI
//!
//! Sends one request through a record/replay client, so fixtures can be
//! recorded or checked from the shell.
//!
//! Usage:
//!   reprise --mode record --fixtures ./fixtures https://api.example.com/users
//!   reprise -X POST -H 'content-type: application/json' -d '{"a":1}' --config reprise.yaml URL

use anyhow::Context;
use clap::Parser;
use reprise::{metrics, Client, Config, Mode, Request};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Reprise - record and replay HTTP traffic
#[derive(Parser, Debug)]
#[command(name = "reprise")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Absolute URL to request
    url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request header, `name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    data: Option<String>,

    /// YAML configuration file
    #[arg(short, long, env = "REPRISE_CONFIG")]
    config: Option<PathBuf>,

    /// Mode override: bloody, cheat, record or replay
    #[arg(short, long, env = "REPRISE_MODE")]
    mode: Option<Mode>,

    /// Fixtures directory override
    #[arg(short, long, env = "REPRISE_FIXTURES")]
    fixtures: Option<PathBuf>,

    /// Print status line and response headers
    #[arg(short, long)]
    include: bool,

    /// Print Prometheus metrics to stderr after the request
    #[arg(long)]
    metrics: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(mode) = args.mode {
        config = config.with_mode(mode);
    }
    if let Some(ref dir) = args.fixtures {
        config = config.with_fixtures_dir(dir);
    }
    config.validate()?;
    Ok(config)
}

fn build_request(args: &Args) -> anyhow::Result<Request> {
    let method = args
        .method
        .to_uppercase()
        .parse()
        .with_context(|| format!("Invalid method '{}'", args.method))?;
    let mut request = Request::new(method, &args.url)?;
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Invalid header '{header}', expected 'name: value'"))?;
        request = request.header(name.trim(), value.trim())?;
    }
    if let Some(ref data) = args.data {
        request = request.body(data.clone());
    }
    Ok(request)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = load_config(&args)?;
    debug!("Effective configuration: {:?}", config);
    let client = Client::from_config(&config)?;
    let request = build_request(&args)?;

    let result = client.send(request).await;
    if args.metrics {
        eprintln!("{}", metrics::collect_metrics());
    }
    let response = result?;

    if args.include {
        println!("HTTP/{} {} {}", response.version, response.status, response.status_message);
        for (name, value) in &response.headers {
            println!("{name}: {value}");
        }
        println!();
    }
    print!("{}", response.text());
    Ok(())
}
