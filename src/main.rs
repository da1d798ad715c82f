use std::path::Path;

use anyhow::Result;
use clap::Parser;
use clap_serde_derive::ClapSerde;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::info;

use sentiment_function::config::{Config, DEFAULT_CONFIG_FILE};
use sentiment_function::telemetry::init_telemetry;
use sentiment_function::{InvocationEvent, InvocationResponse, SentimentHandler, SentimentModel};

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
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

    // Loaded once during init and shared by every invocation of this instance.
    let model = SentimentModel::load(Path::new(&config.model_dir), config.max_length)?;
    info!(
        "Supported features: avx: {}, neon: {}, simd128: {}, f16c: {}",
        candle_core::utils::with_avx(),
        candle_core::utils::with_neon(),
        candle_core::utils::with_simd128(),
        candle_core::utils::with_f16c()
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<InvocationEvent>| {
        let model = model.clone();
        async move { handle_event(&model, event) }
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}

#[tracing::instrument(level = "info", skip_all, fields(request_id = %event.context.request_id))]
fn handle_event(
    model: &SentimentModel,
    event: LambdaEvent<InvocationEvent>,
) -> Result<InvocationResponse, Error> {
    Ok(model.run_sentiment(&event.payload)?)
}
