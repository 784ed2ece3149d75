pub mod config;
pub mod db;
pub mod handlers;
pub mod service;
pub mod models;
pub mod dto;
pub mod errors;
#[cfg(test)]
mod test_support;

use std::{io, sync::Arc};

use actix_web::{HttpServer, App, web};
use db::{init_db_pool, PgStore};
use log::{error, info};
use mockable::{Clock, DefaultClock};
use sqlx::{postgres::Postgres, Pool};

use config::Settings;
use service::{auth::jwt::TokenService, log::{init_logger, LoggerMiddleware}};

type PGPool = Pool<Postgres>;

#[actix_web::main]
async fn main() -> io::Result<()> {
    init_logger();
    let settings = Settings::from_env().map_err(|e| {
        error!("invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    let pool: PGPool = init_db_pool(&settings.database_url, settings.max_connections)
        .await
        .map_err(|e| {
            error!("failed to initialise database: {}", e);
            io::Error::new(io::ErrorKind::Other, e)
        })?;

    let store = web::Data::new(PgStore::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let tokens = web::Data::new(TokenService::new(
        settings.jwt_secret.clone(),
        settings.token_ttl,
        Arc::clone(&clock),
    ));
    let clock: web::Data<dyn Clock> = web::Data::from(clock);

    info!("listening on {}", settings.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(store.clone())
            .app_data(tokens.clone())
            .app_data(clock.clone())
            .configure(handlers::configure::<PgStore>)
    })
    .bind(settings.bind_addr.as_str())?
    .run()
    .await
}
