use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use parley_server::config::Config;
use parley_server::routes::AppState;
use parley_server::{app, seed_users};
use parley_store::{EtcdKv, Kv, MailboxStore, MemoryKv};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let kv: Arc<dyn Kv> = match &config.store_url {
        Some(url) => {
            info!("using etcd store at {}", url);
            Arc::new(EtcdKv::new(url.clone(), config.store_timeout)?)
        }
        None => {
            info!("PARLEY_STORE_URL unset, using in-memory store");
            Arc::new(MemoryKv::new())
        }
    };
    let store = MailboxStore::new(kv);
    seed_users(&store).await?;

    let state = Arc::new(AppState {
        store,
        delivery: config.delivery(),
        fail_fast: config.fail_fast,
    });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
