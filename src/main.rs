use clap::Parser;
use tracing_subscriber::EnvFilter;

use ranker_api::config::{
    Config, DatabaseConfig, GenerationConfig, QuotaConfig, ServerConfig, SessionConfig,
};
use ranker_api::daemon;
use ranker_api::error::Result;

#[derive(Parser, Debug)]
#[command(name = "ranker-api")]
#[command(about = "Airbnb listing SEO/conversion diagnosis API")]
struct Cli {
    #[arg(long, env = "RANKER_CONFIG", help = "Path to a JSON config file")]
    config: Option<String>,

    #[arg(long, env = "RANKER_HOST")]
    host: Option<String>,

    #[arg(long, env = "RANKER_PORT")]
    port: Option<u16>,

    #[arg(long, env = "RANKER_DB")]
    db: Option<String>,

    #[arg(long, env = "RANKER_SESSION_SECRET")]
    session_secret: Option<String>,

    #[arg(long, env = "RANKER_CORS_ORIGIN")]
    cors_origin: Option<String>,

    #[arg(long, env = "RANKER_MAX_MESSAGES_PER_DAY")]
    max_messages_per_day: Option<i64>,

    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    #[arg(long, env = "RANKER_MODEL")]
    model: Option<String>,

    #[arg(long, env = "RANKER_OPENAI_BASE_URL")]
    base_url: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if self.host.is_some() || self.port.is_some() || self.cors_origin.is_some() {
            let server = config.server.get_or_insert_with(ServerConfig::default);
            if self.host.is_some() {
                server.host = self.host;
            }
            if self.port.is_some() {
                server.port = self.port;
            }
            if self.cors_origin.is_some() {
                server.cors_origin = self.cors_origin;
            }
        }
        if self.session_secret.is_some() {
            config
                .session
                .get_or_insert_with(SessionConfig::default)
                .secret = self.session_secret;
        }
        if self.max_messages_per_day.is_some() {
            config
                .quota
                .get_or_insert_with(QuotaConfig::default)
                .max_messages_per_day = self.max_messages_per_day;
        }
        if self.db.is_some() {
            config
                .database
                .get_or_insert_with(DatabaseConfig::default)
                .sqlite_path = self.db;
        }
        if self.openai_api_key.is_some() || self.model.is_some() || self.base_url.is_some() {
            let generation = config
                .generation
                .get_or_insert_with(GenerationConfig::default);
            if self.openai_api_key.is_some() {
                generation.api_key = self.openai_api_key;
            }
            if self.model.is_some() {
                generation.model = self.model;
            }
            if self.base_url.is_some() {
                generation.base_url = self.base_url;
            }
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ranker_api=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = cli.into_config()?;
    daemon::run(config).await
}
