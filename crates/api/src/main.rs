use anyhow::Context;

use cafeops_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    cafeops_observability::init_with(config.log_format);

    let services = cafeops_api::app::services::build_services(&config)
        .await
        .context("failed to initialise storage")?;
    tracing::info!(backend = services.backend(), "services ready");

    let app = cafeops_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
