use std::path::PathBuf;
use structopt::StructOpt;

use geoguard::config::Config;
use geoguard::geolocation::{self, GeoLocator, LookupTarget};
use geoguard::model::{Decision, LayersModel, RiskModel};
use geoguard::persistence::PersistenceClient;

/// geoguard command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "geoguard", about = "Adaptive login backend tools")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "geoguard.toml")]
        output: PathBuf,
    },
    /// Load configuration and report which providers are usable
    Check {
        /// Path to configuration file
        #[structopt(short, long, default_value = "geoguard.toml")]
        config: PathBuf,
    },
    /// Score a pair of coordinates with a model
    Predict {
        /// Path to model.json
        #[structopt(short, long, default_value = "model.json")]
        model: PathBuf,
        #[structopt(long, allow_hyphen_values = true)]
        latitude: f64,
        #[structopt(long, allow_hyphen_values = true)]
        longitude: f64,
        /// Decision threshold
        #[structopt(short, long, default_value = "0.5")]
        threshold: f64,
    },
    /// Resolve an IP address through the configured geolocation provider
    Lookup {
        /// Path to configuration file
        #[structopt(short, long, default_value = "geoguard.toml")]
        config: PathBuf,
        /// Address to locate
        ip: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Check { config } => {
            let config = Config::load(Some(config.as_path()))?;
            let mark = |ok: bool| if ok { "ok" } else { "missing" };

            println!("Listen address:     {}:{}", config.server.host, config.server.port);
            println!("Geolocation:        {:?}", config.geolocation.provider);
            println!(
                "  ipstack key:      {}",
                mark(!config.geolocation.access_key.is_empty())
            );
            println!(
                "  GeoIP database:   {}",
                mark(config.geolocation.database_path.exists())
            );
            println!(
                "SMS credentials:    {}",
                mark(
                    !config.sms.account_sid.is_empty()
                        && !config.sms.auth_token.is_empty()
                        && !config.sms.from_number.is_empty()
                )
            );
            let persistence = PersistenceClient::new(&config.persistence);
            println!("Persistence:        {}", mark(persistence.is_configured()));

            match LayersModel::load(&config.model.path) {
                Ok(model) => println!(
                    "Risk model:         ok ({} inputs, threshold {})",
                    model.input_width(),
                    config.model.threshold
                ),
                Err(e) => {
                    println!("Risk model:         {}", e);
                    std::process::exit(1);
                }
            }
        }
        Cli::Predict {
            model,
            latitude,
            longitude,
            threshold,
        } => {
            let model = LayersModel::load(&model)?;
            let score = model.predict(&[latitude, longitude])?;
            println!("Score:    {:.6}", score);
            println!("Decision: {}", Decision::from_score(score, threshold));
        }
        Cli::Lookup { config, ip } => {
            let config = Config::load(Some(config.as_path()))?;
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.server.upstream_timeout_secs))
                .build()?;
            let locator = geolocation::from_config(&config.geolocation, client)?;
            let payload = locator.lookup(&LookupTarget::Address(ip)).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}
