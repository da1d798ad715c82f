use std::path::Path;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use sentiment_function::config::{Config, DEFAULT_CONFIG_FILE};
use sentiment_function::error::FunctionResult;
use sentiment_function::telemetry::init_telemetry;
use sentiment_function::{InvocationEvent, InvocationResponse, SentimentHandler, SentimentModel};

// Path of the invoke endpoint of the Lambda runtime interface emulator.
const INVOKE_PATH: &str = "/2015-03-31/functions/function/invocations";

#[derive(Parser)]
#[command(author, version, about = "Serve the sentiment function over local HTTP", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config_file, args.opt_config)?;
    init_telemetry(config.otlp_endpoint(), config.console)?;

    let model = SentimentModel::load(Path::new(&config.model_dir), config.max_length)?;

    let router = Router::new()
        .route(INVOKE_PATH, post(handle_invoke_request))
        .route("/health", get(|| async { StatusCode::OK }))
        .layer(TraceLayer::new_for_http())
        .with_state(model);

    let listener = TcpListener::bind(format!("{}:{}", config.address, config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[axum_macros::debug_handler]
async fn handle_invoke_request(
    State(model): State<SentimentModel>,
    payload: Bytes,
) -> FunctionResult<Json<InvocationResponse>> {
    // Any content type is accepted.
    let event = InvocationEvent::from_slice(&payload)?;
    Ok(Json(model.run_sentiment(&event)?))
}
