use docfilter_storage::Catalog;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod metrics;

use app::{router, AppState};

const DEFAULT_CONFIG: &str = "demos/books.json";
const DEFAULT_ADDR: &str = "0.0.0.0:8080";

struct Settings {
    config: PathBuf,
    fixtures: Option<PathBuf>,
    addr: SocketAddr,
}

impl Settings {
    fn from_env() -> anyhow::Result<Self> {
        let config = std::env::var("DOCFILTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG));
        let fixtures = std::env::var("DOCFILTER_FIXTURES").ok().map(PathBuf::from);
        let addr = std::env::var("DOCFILTER_ADDR")
            .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
            .parse()?;
        Ok(Settings {
            config,
            fixtures,
            addr,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let catalog = Catalog::load(&settings.config, settings.fixtures.as_deref())?;
    for name in catalog.names() {
        info!(set = name, "serving filter set");
    }
    let app = router(AppState {
        catalog: Arc::new(catalog),
    });

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    info!("http listening on {}", settings.addr);
    axum::serve(listener, app).await?;
    Ok(())
}
