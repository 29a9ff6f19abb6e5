use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use media_value::api::AnalyzeRequest;
use media_value::auth::AuthState;
use media_value::config::{AppConfig, DetectionMode};
use media_value::history::HistoryStore;
use media_value::server::{self, AppState, ServeOptions};
use media_value::{analyzer_from_config, format_currency, format_number, AnalysisResult};

#[derive(Parser)]
#[command(name = "media-value", about = "Social post media value estimator")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Analyze(AnalyzeArgs),
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct AnalyzeArgs {
    #[arg(long)]
    url: String,
    #[arg(long = "brand", required = true)]
    brands: Vec<String>,
    #[arg(long)]
    detect: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 8787)]
    port: u16,
    #[arg(long)]
    web_root: Option<String>,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let (mut config, config_path) = AppConfig::load(cli.config)?;
    init_tracing(&config.log_level)?;
    if let Some(path) = config_path.as_ref().filter(|path| path.exists()) {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    match cli.command {
        Command::Analyze(args) => {
            if let Some(mode) = args.detect.as_deref() {
                DetectionMode::from_str(mode)
                    .ok_or_else(|| format!("invalid detection mode: {}", mode))?;
                config.detection.mode = mode.to_string();
            }
            // A one-off run has nobody watching a loading screen.
            config.metrics.latency_ms = 0;
            run_analyze(args, &config).await
        }
        Command::Serve(args) => run_serve(args, &config).await,
    }
}

async fn run_analyze(args: AnalyzeArgs, config: &AppConfig) -> Result<(), String> {
    let input = AnalyzeRequest {
        post_url: Some(args.url),
        brand_logos: Some(args.brands),
        request_id: None,
    }
    .into_input()
    .map_err(|err| err.to_string())?;

    let analyzer = analyzer_from_config(config, args.seed)?;
    let result = analyzer.analyze_post(&input.post_url, &input.brands).await;

    if args.json {
        let payload = serde_json::to_string_pretty(&result)
            .map_err(|err| format!("failed to serialize result: {}", err))?;
        println!("{}", payload);
        return Ok(());
    }

    if let AnalysisResult::Error { error, .. } = &result {
        return Err(format!("analysis failed: {}", error));
    }
    print_result(&result);
    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!("Platform: {}", result.platform());
    match result {
        AnalysisResult::Error { error, .. } => {
            println!("Error: {}", error);
        }
        AnalysisResult::NoDetection { message, .. } => {
            println!("{}", message);
        }
        AnalysisResult::Detected {
            brand,
            metrics,
            media_value,
            ..
        } => {
            println!("Brand detected: {}", brand);
            println!(
                "Estimated impressions: {}",
                format_number(metrics.impressions)
            );
            println!(
                "Engagements: likes {} | shares {} | comments {} (total {})",
                format_number(metrics.engagements.likes),
                format_number(metrics.engagements.shares),
                format_number(metrics.engagements.comments),
                format_number(metrics.engagements.total())
            );
            println!("Clicks: {}", format_number(metrics.clicks));
            println!("Media value: {}", format_currency(*media_value));
        }
    }
}

async fn run_serve(args: ServeArgs, config: &AppConfig) -> Result<(), String> {
    let analyzer = analyzer_from_config(config, None)?;
    let history = match config.history.path.clone() {
        Some(path) => HistoryStore::load(path, config.history.capacity).await?,
        None => HistoryStore::in_memory(config.history.capacity),
    };
    let state = AppState::new(analyzer, Arc::new(history));
    let auth = AuthState::from_env();

    server::serve(
        state,
        auth,
        ServeOptions {
            host: args.host,
            port: args.port,
            web_root: args.web_root,
        },
    )
    .await
}

fn init_tracing(log_level: &str) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|err| format!("invalid log level: {}", err))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
