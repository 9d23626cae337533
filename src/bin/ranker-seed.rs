use clap::Parser;
use tracing_subscriber::EnvFilter;

use ranker_api::config::DEFAULT_SQLITE_PATH;
use ranker_api::error::Result;
use ranker_api::seed::{self, ADMIN_EMAIL};
use ranker_api::users::UserStore;

#[derive(Parser, Debug)]
#[command(name = "ranker-seed")]
#[command(about = "Bootstraps the initial admin account")]
struct Cli {
    #[arg(long, env = "RANKER_DB", default_value = DEFAULT_SQLITE_PATH)]
    db: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ranker_api=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let users = UserStore::new(&cli.db).await?;
    if seed::seed_admin(&users).await? {
        println!("Admin account created: {ADMIN_EMAIL}");
    } else {
        println!("Admin account already exists.");
    }
    Ok(())
}
