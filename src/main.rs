use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use tilda_kaiten_bridge::{
    add_layers, env_utils, env_utils::Settings, get_main_router, kaiten::KaitenClient, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("initializing app state ...");

    let settings = Settings::from_env().context("invalid configuration")?;
    tracing::debug!("Loaded settings: {:?}", settings);

    let kaiten_client = KaitenClient::new(&settings.kaiten, settings.kaiten_timeout)?;
    let state = AppState::new(settings.kaiten.clone(), Arc::new(kaiten_client));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    let host_uri = env_utils::get_host_uri();

    tracing::info!("Starting server at host: {}", host_uri);

    axum::Server::bind(&addr)
        .serve(add_layers(get_main_router(state), settings.request_timeout).into_make_service())
        .await
        .context("error while starting API server")?;

    Ok(())
}
