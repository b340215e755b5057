use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use env_logger::Env;
use foodgram_sdk::{postgres::PgStore, routes::routes, Config};
use log::{error, info};
use warp::Filter;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let store = match PgStore::connect(&config.database_url, config.max_connections).await {
        Ok(store) => store,
        Err(e) => {
            error!("Could not connect to database: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = store.migrate().await {
        error!("Could not migrate database: {e}");
        return ExitCode::FAILURE;
    }

    let api = routes(Arc::new(store), &config.jwt_secret).with(warp::log("foodgram_sdk::api"));
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {address}");
    warp::serve(api).run(address).await;

    ExitCode::SUCCESS
}
