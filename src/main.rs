//! Taskboard server entrypoint.

use taskboard::{api, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taskboard=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    api::serve(config).await
}
