use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub api_url: String,
    /// Absent key is not a startup failure; requests fail with a 401 instead.
    pub api_key: Option<String>,
    /// Model used by the single-call generator and the response synthesizer.
    pub model: String,
    /// Cheaper/faster tier used by the chain generator.
    pub chain_model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the DuckDB database file
    #[arg(long)]
    pub database: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder();
        let mut have_file = false;

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
            have_file = true;
        } else {
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/workbench-qa/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    have_file = true;
                    break;
                }
            }
        }

        // A broken config file is a startup error; no file at all means the
        // built-in defaults.
        let mut config: AppConfig = if have_file {
            config_builder.build()?.try_deserialize()?
        } else {
            AppConfig::default()
        };

        // Command line args win over file values
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        // The key never lives in the config file in real deployments;
        // the environment is the source of last resort.
        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "workbench.db".to_string(),
                pool_size: 5,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                api_url: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key: None,
                model: "gpt-4".to_string(),
                chain_model: "gpt-3.5-turbo".to_string(),
            },
        }
    }
}
