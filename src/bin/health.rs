use anyhow::{bail, Result};
use clap::Parser;
use url::Url;

#[derive(Parser)]
#[command(author, version, about = "Probe the local sentiment function", long_about = None)]
struct Args {
    /// Health endpoint of the local listener
    #[arg(env = "HEALTH_URL", default_value = "http://127.0.0.1:9000/health")]
    url: Url,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let response = reqwest::blocking::get(args.url.clone())?;
    if !response.status().is_success() {
        bail!("Health check against {} failed: {}", args.url, response.status());
    }

    Ok(())
}
