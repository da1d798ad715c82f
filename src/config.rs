use anyhow::Result;
use clap_serde_derive::ClapSerde;

pub const DEFAULT_CONFIG_FILE: &str = "SentimentFunction.toml";

#[derive(ClapSerde, Debug)]
pub struct Config {
    /// Directory holding config.json, tokenizer.json and the model weights
    #[default(String::from("model"))]
    #[arg(short, long, env)]
    pub model_dir: String,

    /// Fixed sequence length inputs are padded or truncated to
    #[default(128)]
    #[arg(long, env)]
    pub max_length: usize,

    /// The address the local listener binds to
    #[default(String::from("0.0.0.0"))]
    #[arg(short, long, env)]
    pub address: String,

    /// The port the local listener binds to
    #[default(9000)]
    #[arg(short, long, env)]
    pub port: u16,

    /// OTLP collector endpoint, traces and metrics are only exported when set
    #[default(String::new())]
    #[arg(long, env)]
    pub otlp_endpoint: String,

    /// Keep console logging even when exporting to an OTLP collector
    #[default(false)]
    #[arg(long, env)]
    pub console: bool,
}

impl Config {
    pub fn otlp_endpoint(&self) -> Option<String> {
        Some(self.otlp_endpoint.clone()).filter(|endpoint| !endpoint.is_empty())
    }

    pub fn from_toml(path: &str) -> Result<Self> {
        let str = std::fs::read_to_string(path)?;
        let opt: <Config as ClapSerde>::Opt = toml::from_str(&str)?;
        Ok(Config::from(opt))
    }

    /// Reads `path` and layers the command line options over it.
    ///
    /// Only the default config file may be absent.
    pub fn load(path: &str, opt: <Config as ClapSerde>::Opt) -> Result<Self> {
        match Config::from_toml(path) {
            Ok(conf) => Ok(conf.merge(opt)),
            Err(_) if path == DEFAULT_CONFIG_FILE && !std::path::Path::new(path).exists() => {
                Ok(Config::default().merge(opt))
            }
            Err(err) => Err(err.context(format!("Failed to read configuration file {path}"))),
        }
    }
}
