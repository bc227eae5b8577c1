use alfresco_desk::config::Config;
use alfresco_desk::db::LocalStore;
use alfresco_desk::router::{DeskState, desk_router};
use alfresco_desk::runtime::{PortFile, install_panic_hook, shutdown_signal};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg: Config = alfresco_desk::config::CONFIG.clone();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    install_panic_hook(cfg.is_production());

    let data_dir = cfg.resolved_data_dir();
    let database_url = cfg.resolved_database_url();
    info!(
        data_dir = %data_dir.display(),
        database_url = %database_url,
        environment = ?cfg.environment,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel,
    );

    let store = LocalStore::open(&database_url, cfg.migrations_dir.as_deref()).await?;

    let listener = TcpListener::bind((cfg.host.as_str(), cfg.port)).await?;
    let addr = listener.local_addr()?;
    let port_file = PortFile::new(cfg.port_file());

    let state = DeskState::new(store.clone(), cfg, addr)?;
    let app = desk_router(state);

    port_file.publish(addr.port()).await?;
    info!(%addr, port_file = %port_file.path().display(), "HTTP server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    port_file.remove().await;
    store.close().await;
    info!("backend stopped");
    served?;
    Ok(())
}
