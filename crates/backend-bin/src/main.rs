use backend_lib::{
    auth::DefaultAuth, config::Settings, handlers, storage::FlatFileStorage, ws_router, AppState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    let storage = Arc::new(FlatFileStorage::new(&settings.data_dir)?);
    let auth = Arc::new(DefaultAuth::new());
    let bind_addr = settings.bind_addr;
    let state = Arc::new(AppState::new(auth, storage, settings));

    let app = handlers::create_router(state.clone())
        .merge(ws_router::create_router(state))
        // the web and mobile frontends are served from other origins
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
