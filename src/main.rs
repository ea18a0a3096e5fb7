use dotenv::dotenv;
use log::*;

use std::io::{Error, ErrorKind};
use std::sync::Arc;

use yesnovote::auth::{CallerResolver, JwtResolver};
use yesnovote::config::{AuthConfig, Config};
use yesnovote::dao::{MemoryVoteStore, PgVoteStore, VoteStore};
use yesnovote::service::VoteService;
use yesnovote::storage::S3Presigner;
use yesnovote::AppState;

fn other<E: std::fmt::Display>(err: E) -> Error {
    Error::new(ErrorKind::Other, err.to_string())
}

/**
 * Connect to PostgreSQL when a database is configured, otherwise keep votes in memory
 */
async fn init_store(config: &Config) -> Result<Arc<dyn VoteStore>, sqlx::Error> {
    match &config.database_url {
        Some(url) => {
            let store = PgVoteStore::connect(url, config.database_max_connections).await?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryVoteStore::new())),
    }
}

async fn init_resolver(config: &Config) -> Result<Arc<dyn CallerResolver>, Error> {
    let audience = config.auth_audience.as_deref();
    let resolver = match &config.auth {
        AuthConfig::Secret(secret) => JwtResolver::hs256(secret.as_bytes(), audience),
        AuthConfig::PublicKeyFile(path) => {
            let pem = async_std::fs::read(path).await?;
            JwtResolver::rs256_pem(&pem, audience).map_err(other)?
        }
    };
    Ok(Arc::new(resolver))
}

#[async_std::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv().ok();
    pretty_env_logger::init();

    let config = Config::from_env().map_err(|err| {
        error!("Invalid configuration: {}", err);
        other(err)
    })?;

    let store = init_store(&config).await.map_err(|err| {
        error!("Could not initialize the vote store! {:?}", err);
        other(err)
    })?;

    let attachments = &config.attachments;
    let objects = S3Presigner::new(
        &attachments.bucket,
        &attachments.region,
        attachments.credentials.clone(),
        attachments.url_expiration,
    );

    let resolver = init_resolver(&config).await?;
    let state = AppState::new(VoteService::new(store, Arc::new(objects)));
    let app = yesnovote::app(state, resolver, &config.cors_origin).map_err(other)?;

    info!("Listening on {}", config.listen_addr);
    app.listen(config.listen_addr.clone()).await?;
    Ok(())
}
