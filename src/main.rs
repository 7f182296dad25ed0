use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

mod auth;
mod contact;
mod error;
mod expenses;
mod notifier;
mod payments;
mod routes;
mod schemas;
mod settings;
mod store;
mod token;
mod verification;

use crate::notifier::Notifiers;
use crate::routes::AppState;
use crate::settings::Settings;
use crate::store::{JsonFileSnapshot, Store};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("failed to load configuration")?;
    if settings.auth.uses_default_secret() {
        tracing::warn!("auth.token_secret is not set, using the development secret");
    }

    tracing::info!(path = %settings.store.path, "loading data snapshot");
    let snapshot = Arc::new(JsonFileSnapshot::new(&settings.store.path));
    let store = Arc::new(Store::open(snapshot).context("failed to load data snapshot")?);

    let notifiers = Notifiers::from_webhooks(
        settings.notifier.sms_webhook.clone(),
        settings.notifier.email_webhook.clone(),
    );
    let state = web::Data::new(AppState::new(&settings, store, notifiers));

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "starting http server"
    );
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await?;
    Ok(())
}
