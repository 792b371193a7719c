use tracing_subscriber::EnvFilter;

use hailer::config::Config;
use hailer::db::{MemoryStore, PgStore};
use hailer::engine::Engine;
use hailer::error::Error;
use hailer::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let engine = match &config.database_url {
        Some(url) => Engine::new(PgStore::new(url, config.max_connections).await?)?,
        None => {
            tracing::warn!("DATABASE_URL not set, rides will only be kept in memory");
            Engine::new(MemoryStore::default())?
        }
    };

    serve(engine, config.listen_addr).await
}
