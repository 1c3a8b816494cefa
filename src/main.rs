use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use actix_web_httpauth::extractors::basic;

use studio_booking::{
    auth::{hash_password, AUTH_REALM},
    config::{AdminSecret, Config, StoreConfig},
    routes,
    services::content::DEFAULT_CONTENT,
    state::{AdminCredentials, AppState},
    store::{PocketBaseClient, RecordStore, SqliteStore},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    match config {
        StoreConfig::PocketBase { url, superuser } => {
            let client = PocketBaseClient::new(url)?;
            match client.health().await {
                Ok(health) => log::info!("PocketBase at {url}: {}", health.message),
                Err(err) => log::warn!("PocketBase at {url} is not healthy yet: {err}"),
            }
            if let Some((email, password)) = superuser {
                client.auth_with_password(email, password).await?;
                log::info!("authenticated to PocketBase as {email}");
            }
            Ok(Arc::new(client))
        }
        StoreConfig::Sqlite { database_url } => {
            let store = SqliteStore::connect(database_url).await?;
            log::info!("using local record store at {database_url}");
            Ok(Arc::new(store))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env()?;
    let store = open_store(&config.store).await?;

    if config.uses_default_admin_password() {
        log::warn!("ADMIN_PASSWORD is not set; the admin API accepts the default password");
    }
    let password_hash = match &config.admin_secret {
        AdminSecret::Hash(hash) => hash.clone(),
        AdminSecret::Plain(password) => {
            hash_password(password).map_err(|err| format!("hashing admin password: {err}"))?
        }
    };

    let state = AppState::new(
        store,
        config.status_policy,
        AdminCredentials {
            username: config.admin_user.clone(),
            password_hash,
        },
    );

    if config.seed_content {
        // Anonymous PocketBase sessions cannot write site_content.
        if let Err(err) = state.content.ensure_defaults(DEFAULT_CONTENT).await {
            log::warn!("could not seed site content: {err}");
        }
    }

    let address = format!("0.0.0.0:{}", config.port);
    log::info!(
        "Starting studio booking on http://{address} (status transitions: {})",
        config.status_policy
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(basic::Config::default().realm(AUTH_REALM))
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
