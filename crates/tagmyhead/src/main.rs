use tagmyhead::prelude::*;
use tagmyhead::DEFAULT_ADDR;

#[tokio::main]
async fn main() -> Result<(), TagmyheadError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let addr =
        std::env::var("TAGMYHEAD_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let server = TagmyheadServer::builder().bind(&addr).build().await?;
    match server.local_addr() {
        Ok(local) => tracing::info!(addr = %local, "listening"),
        Err(e) => tracing::warn!(error = %e, "could not read local address"),
    }

    server.run().await
}
