use anyhow::Result;
use fansite::{web, Site};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let site = tokio::task::spawn_blocking(Site::from_environment).await??;
    web::serve(web::AppState::new(site)).await
}
